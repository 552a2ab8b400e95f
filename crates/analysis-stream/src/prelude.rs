//! Common imports for typical client usage.
pub use crate::{
    AnalysisStreamHandle, CompletionNotice, CorrelationId, HttpTransport, SessionController,
    SessionObserver, SessionSnapshot, SessionStatus, StreamClientConfig, StreamClientError,
    StreamOptions,
};
