//! Streams the analysis for a processed record and prints it as it arrives.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use analysis_stream::observability::{LogSettings, init_observability};
use analysis_stream::prelude::*;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "analysis-stream",
    about = "Stream an LLM analysis of processed pipeline data"
)]
struct Args {
    /// Backend base URL.
    #[arg(long, env = "ANALYSIS_API_BASE_URL", default_value = "http://localhost:8080")]
    base_url: String,
    /// Processed record to analyse. Without it the latest data is analysed immediately.
    #[arg(long, env = "ANALYSIS_PROCESSED_ID")]
    processed_id: Option<u64>,
    /// Wait before auto-starting once a processed id is bound.
    #[arg(long, default_value_t = 500)]
    settle_ms: u64,
    /// Fail the session if the stream stays silent this long.
    #[arg(long)]
    idle_timeout_secs: Option<u64>,
    #[arg(long, env = "ANALYSIS_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    connect_timeout_secs: u64,
    /// Write JSON-lines logs to this file instead of stderr.
    #[arg(long, value_name = "PATH")]
    log_json: Option<PathBuf>,
}

/// Prints fragments to stdout as they arrive; diagnostics go to the log.
struct StdoutPresenter;

impl SessionObserver for StdoutPresenter {
    fn on_start(&mut self, message: &str) {
        tracing::info!("{message}");
    }

    fn on_content(&mut self, fragment: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(fragment.as_bytes());
        let _ = stdout.flush();
    }

    fn on_error(&mut self, message: &str) {
        println!();
        tracing::error!(error = %message, "analysis failed");
    }

    fn on_complete(&mut self, notice: &CompletionNotice) {
        println!();
        tracing::info!(correlation_id = ?notice.id, record_id = ?notice.record_id, "{}", notice.message);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let mut log_settings = LogSettings::from_env();
    if let Some(path) = args.log_json.clone() {
        log_settings = log_settings.json_path(path);
    }
    init_observability(&log_settings);

    match run(args).await {
        Ok(snapshot) => {
            if let Some(started_at) = snapshot.started_at {
                let secs = (chrono::Utc::now() - started_at).num_seconds();
                tracing::info!(status = ?snapshot.status, chars = snapshot.text.len(), "streamed for {secs}s");
            }
            if snapshot.status == SessionStatus::Completed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "analysis stream could not run");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<SessionSnapshot, StreamClientError> {
    let correlation_id = match args.processed_id {
        Some(raw) => Some(CorrelationId::new(raw).ok_or_else(|| {
            StreamClientError::Validation("--processed-id must be greater than 0".into())
        })?),
        None => None,
    };

    let mut options = StreamOptions::default().settle_delay(Duration::from_millis(args.settle_ms));
    if let Some(secs) = args.idle_timeout_secs {
        options = options.idle_timeout(Duration::from_secs(secs));
    }
    let config = StreamClientConfig::new(args.base_url)
        .connect_timeout(Duration::from_secs(args.connect_timeout_secs));
    let transport = HttpTransport::new(config)?;
    let handle = SessionController::new(Arc::new(transport), options)?
        .with_observer(StdoutPresenter)
        .spawn();

    match correlation_id {
        Some(id) => handle.bind(Some(id)).await?,
        None => handle.start().await?,
    }

    let snapshot = tokio::select! {
        snapshot = handle.wait_terminal() => snapshot?,
        _ = tokio::signal::ctrl_c() => {
            handle.cancel().await?;
            let mut updates = handle.subscribe();
            let snapshot = updates
                .wait_for(|s| !s.status.is_streaming())
                .await
                .map_err(|_| StreamClientError::DriverClosed)?
                .clone();
            snapshot
        }
    };
    handle.shutdown().await?;
    Ok(snapshot)
}
