/// Page state definitions for classifying fetch attempts
///
/// Every attempted page ends up in exactly one of these states.
use std::fmt;

/// Outcome of a single fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    // ===== Terminal Success States =====
    /// Page was fetched with a 2xx status and processed
    Processed,

    // ===== Terminal Error States =====
    /// Page returned HTTP 404 or 410 (permanent failure)
    DeadLink,

    /// Page returned HTTP 429
    RateLimited,

    /// Page returned some other non-2xx status
    HttpError,

    /// Request exceeded the per-request timeout
    TimedOut,

    /// Page could not be reached (connection refused, DNS failure, TLS error)
    Unreachable,

    /// Page fetch failed for other reasons
    Failed,
}

impl PageState {
    /// Classifies an HTTP status code
    ///
    /// # Arguments
    ///
    /// * `status` - The numeric status of the final response
    ///
    /// # Returns
    ///
    /// `Processed` for any 2xx, otherwise the matching error state
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Processed,
            404 | 410 => Self::DeadLink,
            429 => Self::RateLimited,
            _ => Self::HttpError,
        }
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Processed)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    /// Returns true if the host should be treated as struggling
    ///
    /// Dead links and other client errors are the page's fault, not the
    /// server's, so they do not slow the host down.
    ///
    /// # Arguments
    ///
    /// * `status` - The response status, if a response arrived
    pub fn is_host_failure(&self, status: Option<u16>) -> bool {
        match self {
            Self::Processed | Self::DeadLink => false,
            Self::HttpError => status.map_or(true, |s| s >= 500),
            Self::RateLimited | Self::TimedOut | Self::Unreachable | Self::Failed => true,
        }
    }

    /// Converts the page state to a database string representation
    ///
    /// This is used for storing the state in the SQLite export.
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::DeadLink => "dead_link",
            Self::RateLimited => "rate_limited",
            Self::HttpError => "http_error",
            Self::TimedOut => "timed_out",
            Self::Unreachable => "unreachable",
            Self::Failed => "failed",
        }
    }

    /// Parses a page state from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "processed" => Some(Self::Processed),
            "dead_link" => Some(Self::DeadLink),
            "rate_limited" => Some(Self::RateLimited),
            "http_error" => Some(Self::HttpError),
            "timed_out" => Some(Self::TimedOut),
            "unreachable" => Some(Self::Unreachable),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible page states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Processed,
            Self::DeadLink,
            Self::RateLimited,
            Self::HttpError,
            Self::TimedOut,
            Self::Unreachable,
            Self::Failed,
        ]
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
