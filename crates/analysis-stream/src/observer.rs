use crate::model::CorrelationId;

/// Payload delivered when a session completes successfully.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CompletionNotice {
    /// Correlation id the completed session streamed.
    pub id: Option<CorrelationId>,
    pub message: String,
    /// Id of the stored analysis, when the backend reported one.
    pub record_id: Option<u64>,
}

/// Callbacks fired by a session controller.
///
/// Every method defaults to a no-op. Callbacks run on the controller's task,
/// so they should return quickly.
pub trait SessionObserver: Send {
    /// Fired once per session start.
    fn on_start(&mut self, _message: &str) {}
    /// Fired once per non-empty delta with just the new fragment.
    fn on_content(&mut self, _fragment: &str) {}
    /// Fired once when a session fails.
    fn on_error(&mut self, _message: &str) {}
    /// Fired once when a session completes.
    fn on_complete(&mut self, _notice: &CompletionNotice) {}
}

/// Observer that ignores every callback.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
