//! Per-host adaptive rate control
//!
//! Each host gets its own [`HostState`]. The map lock is only taken to find
//! a host's state; all spacing decisions happen under that host's own lock.
//! [`PacedExecutor`] puts every request of a crawl through the controller.

use crate::crawler::fetcher::{FetchError, FetchRequest, FetchResponse, RequestExecutor};
use crate::state::{HostState, PageState};
use crate::url::host_key;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Rate limiter settings
#[derive(Debug, Clone, Copy)]
pub struct RateSettings {
    /// Starting (and minimum) delay between request starts per host
    pub base_delay: Duration,

    /// Ceiling for the adaptive delay
    pub max_delay: Duration,

    /// Whether outcomes adjust the delay
    pub adaptive: bool,
}

/// Hands out request slots per host and adapts spacing to outcomes
#[derive(Debug)]
pub struct RateController {
    settings: RateSettings,
    hosts: Mutex<HashMap<String, Arc<Mutex<HostState>>>>,
}

impl RateController {
    pub fn new(settings: RateSettings) -> Self {
        Self {
            settings,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// A controller that never adapts: fixed base delay per host
    pub fn fixed(base_delay: Duration) -> Self {
        Self::new(RateSettings {
            base_delay,
            max_delay: base_delay,
            adaptive: false,
        })
    }

    fn host(&self, host: &str) -> Arc<Mutex<HostState>> {
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            hosts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(HostState::new(self.settings.base_delay)))),
        )
    }

    fn with_host<T>(&self, host: &str, f: impl FnOnce(&mut HostState) -> T) -> T {
        let state = self.host(host);
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Current required spacing between requests to `host`
    pub fn delay_before(&self, host: &str) -> Duration {
        self.with_host(host, |state| state.delay)
    }

    /// Raises the host's floor to a robots.txt crawl-delay
    ///
    /// The floor is lifted even when adaptation is off, but never above the
    /// configured ceiling.
    pub fn apply_crawl_delay(&self, host: &str, crawl_delay: Duration) {
        let ceiling = self.settings.max_delay.max(self.settings.base_delay);
        let floor = crawl_delay.min(ceiling);
        self.with_host(host, |state| state.raise_floor(floor));
    }

    /// Reserves the next slot for `host` and sleeps until it
    ///
    /// # Returns
    ///
    /// * `true` - The slot was reached; the caller may send its request
    /// * `false` - Cancellation fired while waiting
    pub async fn wait_turn(&self, host: &str, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }

        let wait = self.with_host(host, |state| state.reserve(Instant::now()));
        if wait.is_zero() {
            return true;
        }

        tracing::trace!("Waiting {:?} for a slot on {}", wait, host);
        tokio::select! {
            _ = tokio::time::sleep(wait) => true,
            _ = cancel.cancelled() => false,
        }
    }

    /// Records the outcome of a request to `host`
    ///
    /// # Arguments
    ///
    /// * `success` - False for transport errors, throttling, and server errors
    /// * `retry_after` - A Retry-After hint from the response, if any
    pub fn record_outcome(&self, host: &str, success: bool, retry_after: Option<Duration>) {
        if !self.settings.adaptive {
            return;
        }

        let max_delay = self.settings.max_delay;
        let delay = self.with_host(host, |state| {
            if success {
                state.record_success();
            } else {
                state.record_failure(retry_after, max_delay, Instant::now());
            }
            state.delay
        });

        if !success {
            tracing::debug!("Backing off {}: delay now {:?}", host, delay);
        }
    }

    /// Snapshot of a host's state, if it has been seen
    pub fn host_state(&self, host: &str) -> Option<HostState> {
        let hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        hosts
            .get(host)
            .map(|state| state.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

/// Executor wrapper that takes a host slot before every request and feeds
/// the outcome back into the [`RateController`]
///
/// Page fetches, robots.txt, and sitemap/feed probes all go through one of
/// these, so no request to a host skips its spacing.
pub struct PacedExecutor {
    inner: Arc<dyn RequestExecutor>,
    rate: Arc<RateController>,
}

impl PacedExecutor {
    pub fn new(inner: Arc<dyn RequestExecutor>, rate: Arc<RateController>) -> Self {
        Self { inner, rate }
    }
}

#[async_trait]
impl RequestExecutor for PacedExecutor {
    async fn send(
        &self,
        request: FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        let Some(host) = host_key(&request.url) else {
            return self.inner.send(request, cancel).await;
        };

        if !self.rate.wait_turn(&host, cancel).await {
            return Err(FetchError::Cancelled);
        }

        let outcome = self.inner.send(request, cancel).await;
        match &outcome {
            Ok(response) => {
                let state = PageState::from_status(response.status);
                self.rate.record_outcome(
                    &host,
                    !state.is_host_failure(Some(response.status)),
                    response.retry_after(),
                );
            }
            Err(FetchError::Cancelled) => {}
            Err(_) => self.rate.record_outcome(&host, false, None),
        }
        outcome
    }
}
