use std::time::Duration;

/// Failures raised by a stream transport.
///
/// The controller collapses every variant into a single "connection lost"
/// outcome; the variants exist so logs can say what actually happened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or the connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),
    /// Server answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    /// Reading the response body failed mid-stream.
    #[error("stream read failed: {0}")]
    Read(String),
    /// Server closed the stream before a terminal frame arrived.
    #[error("stream closed before completion")]
    Closed,
    /// No message arrived within the configured inactivity window.
    #[error("no data received for {after:?}")]
    Idle { after: Duration },
}

impl TransportError {
    /// Creates a connect error from any displayable cause.
    pub fn connect(cause: impl std::fmt::Display) -> Self {
        Self::Connect(cause.to_string())
    }

    /// Creates a read error from any displayable cause.
    pub fn read(cause: impl std::fmt::Display) -> Self {
        Self::Read(cause.to_string())
    }
}

/// Top-level error type for configuring and driving the client.
///
/// Session failures are never returned through this type; they are reported
/// through `SessionStatus::Failed` and `SessionObserver::on_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid option values.
    #[error("validation error: {0}")]
    Validation(String),
    /// Transport error surfaced outside a session.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The driver task is gone and can no longer accept commands.
    #[error("analysis stream driver closed")]
    DriverClosed,
}
