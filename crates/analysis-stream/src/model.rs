use std::fmt;
use std::time::Duration;

use crate::errors::StreamClientError;

/// Identifier of the backend job whose analysis is streamed.
///
/// Always positive; zero is treated as "no target" and cannot be constructed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Creates a correlation id, returning `None` for zero.
    pub fn new(value: u64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    /// Returns the raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a session controller.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session has run yet, or the last one was cancelled.
    #[default]
    Idle,
    /// A transport is open and frames are being accumulated.
    Streaming,
    /// The last session ended with a stream-end frame.
    Completed,
    /// The last session ended with a remote or transport error.
    Failed,
}

impl SessionStatus {
    /// Returns true when a session is currently open.
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::Streaming)
    }
}

/// Point-in-time view of a controller, published on every status or text change.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    /// Fragments of the current (or last) session concatenated in arrival order.
    pub text: String,
    pub error: Option<String>,
    /// Correlation id the current (or last) session was opened for.
    pub correlation_id: Option<CorrelationId>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Runtime options for a session controller.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct StreamOptions {
    /// Wait between observing a new correlation id and auto-starting a session.
    ///
    /// Gives the backend job a head start before the client connects.
    pub settle_delay: Duration,
    /// Fail a session whose transport stays silent for this long.
    pub idle_timeout: Option<Duration>,
    /// Bounded buffer between a transport task and the controller.
    pub buffer_capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            idle_timeout: None,
            buffer_capacity: 128,
        }
    }
}

impl StreamOptions {
    /// Overrides the auto-start settling delay.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Enables the inactivity timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Overrides the transport buffer capacity.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), StreamClientError> {
        if self.buffer_capacity == 0 {
            return Err(StreamClientError::Validation(
                "buffer_capacity must be greater than 0".into(),
            ));
        }
        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(StreamClientError::Validation(
                "idle_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
