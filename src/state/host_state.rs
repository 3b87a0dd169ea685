use std::time::{Duration, Instant};

/// Smallest increase applied when a host starts failing
pub const MIN_BACKOFF_STEP: Duration = Duration::from_millis(250);

/// Consecutive successes needed before the delay decays
pub const SUCCESSES_BEFORE_DECAY: u32 = 5;

/// Tracks the politeness budget of one host during crawling
///
/// This structure maintains the per-host information needed for adaptive
/// rate limiting: the current spacing between requests, the floor it may not
/// drop below, and the next instant a request may start.
#[derive(Debug, Clone)]
pub struct HostState {
    /// Current required spacing between request starts
    pub delay: Duration,

    /// Lower bound for `delay` (base delay, or robots crawl-delay if larger)
    pub floor: Duration,

    /// Failures (transport errors, 429, 5xx) since the last success
    pub consecutive_failures: u32,

    /// Successes since the last failure or decay step
    pub consecutive_successes: u32,

    /// Earliest instant the next request may start
    pub next_allowed: Option<Instant>,

    /// Number of request slots handed out for this host
    pub request_count: u32,

    /// Number of responses that carried a Retry-After hint
    pub throttled_count: u32,
}

impl HostState {
    /// Creates a new HostState starting at the given floor delay
    pub fn new(floor: Duration) -> Self {
        Self {
            delay: floor,
            floor,
            consecutive_failures: 0,
            consecutive_successes: 0,
            next_allowed: None,
            request_count: 0,
            throttled_count: 0,
        }
    }

    /// Raises the floor (e.g. from a robots.txt crawl-delay)
    ///
    /// Never lowers it; the current delay is lifted to the new floor.
    pub fn raise_floor(&mut self, floor: Duration) {
        if floor > self.floor {
            self.floor = floor;
        }
        if self.delay < self.floor {
            self.set_delay(self.floor);
        }
    }

    /// Changes the delay; growth also pushes out an already reserved next
    /// slot so the gap after the last handed-out slot is the new delay
    fn set_delay(&mut self, delay: Duration) {
        if delay > self.delay {
            if let Some(next) = self.next_allowed.as_mut() {
                *next += delay - self.delay;
            }
        }
        self.delay = delay;
    }

    /// Reserves the next request slot for this host
    ///
    /// # Arguments
    ///
    /// * `now` - The current time instant
    ///
    /// # Returns
    ///
    /// How long the caller must wait before starting its request. Successive
    /// reservations are spaced by the delay in force when each was made.
    pub fn reserve(&mut self, now: Instant) -> Duration {
        let slot = match self.next_allowed {
            Some(next) if next > now => next,
            _ => now,
        };
        self.next_allowed = Some(slot + self.delay);
        self.request_count += 1;
        slot - now
    }

    /// Records a failed or throttled request
    ///
    /// The delay doubles (by at least [`MIN_BACKOFF_STEP`]) up to `max_delay`.
    /// A Retry-After hint lifts the delay to at least the hint and pushes the
    /// next slot out accordingly.
    pub fn record_failure(&mut self, retry_after: Option<Duration>, max_delay: Duration, now: Instant) {
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;

        let step = self.delay.max(MIN_BACKOFF_STEP);
        self.set_delay((self.delay + step).min(max_delay).max(self.floor));

        if let Some(hint) = retry_after {
            self.throttled_count += 1;
            let hint = hint.min(max_delay);
            if hint > self.delay {
                self.set_delay(hint);
            }
            let earliest = now + hint;
            if self.next_allowed.map_or(true, |next| next < earliest) {
                self.next_allowed = Some(earliest);
            }
        }
    }

    /// Records a successful request
    ///
    /// Every [`SUCCESSES_BEFORE_DECAY`] consecutive successes shrink the delay
    /// by a quarter, never below the floor.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.consecutive_successes += 1;

        if self.consecutive_successes >= SUCCESSES_BEFORE_DECAY {
            self.consecutive_successes = 0;
            let decayed = self.delay.mul_f64(0.75);
            self.delay = decayed.max(self.floor);
        }
    }
}

impl Default for HostState {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}
