use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::controller::SessionController;
use crate::errors::StreamClientError;
use crate::model::{CorrelationId, SessionSnapshot, SessionStatus};

const COMMAND_BUFFER: usize = 32;

enum Command {
    Bind(Option<CorrelationId>),
    Start,
    Cancel,
    Shutdown,
}

/// Handle to a controller running on its own task.
///
/// Commands are applied in the order they are sent. Dropping the handle
/// closes the command channel, which tears the controller down.
pub struct AnalysisStreamHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl SessionController {
    /// Moves the controller onto a dedicated task.
    pub fn spawn(self) -> AnalysisStreamHandle {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let state = self.subscribe();
        let task = tokio::spawn(drive(self, rx));
        AnalysisStreamHandle {
            commands,
            state,
            task,
        }
    }
}

impl AnalysisStreamHandle {
    /// Binds the correlation id; a new id may auto-start a session.
    pub async fn bind(&self, id: Option<CorrelationId>) -> Result<(), StreamClientError> {
        self.send(Command::Bind(id)).await
    }

    /// Requests a manual start. Ignored while a session is streaming.
    pub async fn start(&self) -> Result<(), StreamClientError> {
        self.send(Command::Start).await
    }

    /// Cancels the open session without firing error or completion callbacks.
    pub async fn cancel(&self) -> Result<(), StreamClientError> {
        self.send(Command::Cancel).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that changes on every status or text change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    /// Waits until the controller reports `Completed` or `Failed`.
    ///
    /// Returns immediately if the latest snapshot is already terminal, so call
    /// it after the session of interest has started.
    pub async fn wait_terminal(&self) -> Result<SessionSnapshot, StreamClientError> {
        let mut state = self.state.clone();
        let snapshot = state
            .wait_for(|s| matches!(s.status, SessionStatus::Completed | SessionStatus::Failed))
            .await
            .map_err(|_| StreamClientError::DriverClosed)?;
        Ok(snapshot.clone())
    }

    /// Tears the controller down and waits for its task to exit.
    pub async fn shutdown(self) -> Result<(), StreamClientError> {
        let _ = self.commands.send(Command::Shutdown).await;
        self.task.await.map_err(|_| StreamClientError::DriverClosed)
    }

    async fn send(&self, command: Command) -> Result<(), StreamClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| StreamClientError::DriverClosed)
    }
}

async fn drive(mut controller: SessionController, mut commands: mpsc::Receiver<Command>) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Bind(id)) => controller.bind(id),
                Some(Command::Start) => {
                    controller.start();
                }
                Some(Command::Cancel) => controller.cancel(),
                Some(Command::Shutdown) | None => {
                    controller.shutdown();
                    break;
                }
            },
            _ = controller.step() => {}
        }
    }
    debug!("analysis stream driver stopped");
}
