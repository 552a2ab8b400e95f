//! Streaming analysis client with a single-session lifecycle.
//!
//! A [`SessionController`] opens one server-sent-events stream at a time for a
//! bound [`CorrelationId`], classifies every message with [`parse_frame`], and
//! accumulates delta text until the stream ends, fails, or is cancelled.
//! Binding a new id starts a session automatically after a settling delay.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use analysis_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), StreamClientError> {
//! let transport = HttpTransport::new(StreamClientConfig::new("http://localhost:8080"))?;
//! let handle = SessionController::new(Arc::new(transport), StreamOptions::default())?.spawn();
//!
//! handle.bind(CorrelationId::new(42)).await?;
//! let snapshot = handle.wait_terminal().await?;
//! println!("{}", snapshot.text);
//!
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

/// Transport client configuration.
pub mod config;
/// Session state machine.
pub mod controller;
/// Task-backed handle around a controller.
pub mod driver;
/// Public error types.
pub mod errors;
/// Raw message classification.
pub mod frame;
/// Correlation ids, status, snapshots, and options.
pub mod model;
/// Logging setup.
pub mod observability;
/// Session lifecycle callbacks.
pub mod observer;
/// Common imports for typical usage.
pub mod prelude;
/// Stream transports and session handles.
pub mod transport;
/// Auto-start policy for changing correlation ids.
pub mod trigger;

pub use config::StreamClientConfig;
pub use controller::{CONNECTION_LOST_MESSAGE, SessionController};
pub use driver::AnalysisStreamHandle;
pub use errors::{StreamClientError, TransportError};
pub use frame::{DONE_SENTINEL, RawMessage, StreamFrame, parse_frame};
pub use model::{CorrelationId, SessionSnapshot, SessionStatus, StreamOptions};
pub use observer::{CompletionNotice, NoopObserver, SessionObserver};
pub use transport::{
    HttpTransport, MessageStream, SessionHandle, StreamTransport, TransportRequest,
};
pub use trigger::AutoTrigger;
