use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::StreamClientError;
use crate::frame::{StreamFrame, parse_frame};
use crate::model::{CorrelationId, SessionSnapshot, SessionStatus, StreamOptions};
use crate::observer::{CompletionNotice, NoopObserver, SessionObserver};
use crate::transport::{
    SessionHandle, SessionKey, StreamTransport, TransportNotice, TransportRequest,
};
use crate::trigger::AutoTrigger;

/// Message recorded when the transport drops, whatever the underlying cause.
pub const CONNECTION_LOST_MESSAGE: &str = "Connection to analysis stream lost";

struct ActiveSession {
    handle: SessionHandle,
    session_id: uuid::Uuid,
    correlation_id: Option<CorrelationId>,
    started: Instant,
    seq: u64,
}

/// Owns at most one streaming session and drives its state machine.
///
/// All methods run on the caller's task; transport tasks only forward raw
/// messages, which are applied by [`SessionController::step`]. The controller
/// is usually handed to [`SessionController::spawn`], but it can be driven by
/// hand as well.
pub struct SessionController {
    options: StreamOptions,
    transport: Arc<dyn StreamTransport>,
    observer: Box<dyn SessionObserver>,
    trigger: AutoTrigger,
    bound_id: Option<CorrelationId>,
    active: Option<ActiveSession>,
    next_key: SessionKey,
    notices_tx: mpsc::Sender<TransportNotice>,
    notices_rx: mpsc::Receiver<TransportNotice>,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    /// Creates an idle controller using `transport` for every session.
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        options: StreamOptions,
    ) -> Result<Self, StreamClientError> {
        options.validate()?;
        let (notices_tx, notices_rx) = mpsc::channel(options.buffer_capacity);
        let (state, _) = watch::channel(SessionSnapshot::default());
        Ok(Self {
            trigger: AutoTrigger::new(options.settle_delay),
            options,
            transport,
            observer: Box::new(NoopObserver),
            bound_id: None,
            active: None,
            next_key: 0,
            notices_tx,
            notices_rx,
            state,
        })
    }

    /// Replaces the lifecycle callbacks.
    pub fn with_observer(mut self, observer: impl SessionObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Binds the correlation id that future sessions stream.
    ///
    /// A changed id may schedule an automatic start after the settling delay.
    pub fn bind(&mut self, id: Option<CorrelationId>) {
        if self.bound_id == id {
            return;
        }
        self.bound_id = id;
        let scheduled = self
            .trigger
            .observe(id, self.is_streaming(), Instant::now());
        debug!(correlation_id = ?id, scheduled, "correlation id bound");
    }

    /// Currently bound correlation id.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.bound_id
    }

    /// Returns true while a session is open.
    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// Snapshot of status, accumulated text, and last error.
    pub fn state(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that changes on every status or text change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Time since the open session started.
    pub fn elapsed(&self) -> Option<Duration> {
        self.active.as_ref().map(|active| active.started.elapsed())
    }

    /// Starts a session for the bound correlation id.
    ///
    /// Returns false without side effects when a session is already streaming.
    /// Connection failures surface later as a `Failed` status.
    pub fn start(&mut self) -> bool {
        if self.active.is_some() {
            debug!("start ignored: a session is already streaming");
            return false;
        }

        let correlation_id = self.bound_id;
        let session_id = uuid::Uuid::new_v4();
        self.next_key = self.next_key.wrapping_add(1);
        let handle = SessionHandle::open(
            self.transport.clone(),
            TransportRequest {
                session_id,
                correlation_id,
            },
            self.next_key,
            self.options.idle_timeout,
            self.notices_tx.clone(),
        );
        self.trigger.record_start(correlation_id);
        self.active = Some(ActiveSession {
            handle,
            session_id,
            correlation_id,
            started: Instant::now(),
            seq: 0,
        });
        self.state.send_modify(|s| {
            s.status = SessionStatus::Streaming;
            s.text.clear();
            s.error = None;
            s.correlation_id = correlation_id;
            s.started_at = Some(chrono::Utc::now());
        });
        info!(%session_id, correlation_id = ?correlation_id, "analysis session started");

        let message = match correlation_id {
            Some(id) => format!("Streaming analysis for processed record {id}"),
            None => "Streaming analysis for the latest processed data".to_string(),
        };
        self.observer.on_start(&message);
        true
    }

    /// Closes the open session, if any, and returns to `Idle` without
    /// firing error or completion callbacks.
    ///
    /// Text accumulated so far is kept until the next start.
    pub fn cancel(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.handle.close();
        self.state.send_modify(|s| {
            s.status = SessionStatus::Idle;
            s.error = None;
            s.started_at = None;
        });
        info!(session_id = %active.session_id, correlation_id = ?active.correlation_id, "analysis session cancelled");
        self.reobserve();
    }

    /// Tears down the controller: cancels the open session and any pending
    /// automatic start.
    pub fn shutdown(&mut self) {
        self.cancel();
        self.trigger.observe(None, false, Instant::now());
    }

    /// Waits for the next transport notice or pending automatic start and
    /// applies it.
    ///
    /// Cancel-safe: nothing is applied unless the wait completes.
    pub async fn step(&mut self) {
        let deadline = self.trigger.deadline();
        tokio::select! {
            Some(notice) = self.notices_rx.recv() => self.handle_notice(notice),
            _ = sleep_until(deadline) => self.fire_auto_trigger(),
        }
    }

    pub(crate) fn handle_notice(&mut self, notice: TransportNotice) {
        let live = self
            .active
            .as_ref()
            .filter(|active| active.handle.key() == notice.session())
            .map(|active| active.correlation_id);
        let Some(correlation_id) = live else {
            debug!(session = notice.session(), "ignoring notice from a closed session");
            return;
        };

        match notice {
            TransportNotice::Message { message, .. } => {
                match parse_frame(&message, correlation_id) {
                    Some(StreamFrame::Delta { text }) => self.append(text),
                    Some(StreamFrame::StreamError { message }) => {
                        warn!(correlation_id = ?correlation_id, error = %message, "remote stream error");
                        self.fail(message);
                    }
                    Some(StreamFrame::StreamEnd {
                        correlation_id,
                        note,
                        record_id,
                    }) => self.complete(CompletionNotice {
                        id: correlation_id,
                        message: note,
                        record_id,
                    }),
                    None => {}
                }
            }
            TransportNotice::Failed { error, .. } => {
                warn!(correlation_id = ?correlation_id, %error, "analysis transport failed");
                self.fail(CONNECTION_LOST_MESSAGE.to_string());
            }
        }
    }

    fn append(&mut self, text: String) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        debug!(session_id = %active.session_id, seq = active.seq, len = text.len(), "analysis delta");
        active.seq = active.seq.saturating_add(1);
        if text.is_empty() {
            return;
        }
        self.state.send_modify(|s| s.text.push_str(&text));
        self.observer.on_content(&text);
    }

    fn fail(&mut self, message: String) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.handle.close();
        self.state.send_modify(|s| {
            s.status = SessionStatus::Failed;
            s.error = Some(message.clone());
        });
        info!(session_id = %active.session_id, frames = active.seq, "analysis session failed");
        self.observer.on_error(&message);
        self.reobserve();
    }

    fn complete(&mut self, notice: CompletionNotice) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.handle.close();
        self.state.send_modify(|s| s.status = SessionStatus::Completed);
        info!(
            session_id = %active.session_id,
            correlation_id = ?notice.id,
            frames = active.seq,
            elapsed = ?active.started.elapsed(),
            "analysis session completed"
        );
        self.observer.on_complete(&notice);
        self.reobserve();
    }

    fn fire_auto_trigger(&mut self) {
        if let Some(id) = self.trigger.due(Instant::now(), self.is_streaming()) {
            info!(correlation_id = %id, "auto-starting analysis session");
            self.start();
        }
    }

    // An id bound while streaming gets its turn once the session ends.
    fn reobserve(&mut self) {
        self.trigger.observe(self.bound_id, false, Instant::now());
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => futures::future::pending().await,
    }
}
