use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::config::StreamClientConfig;
use crate::errors::{StreamClientError, TransportError};
use crate::frame::RawMessage;

use super::sse::SseDecoder;
use super::{MessageStream, StreamTransport, TransportRequest};

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Server-sent-events transport over HTTP `GET`.
pub struct HttpTransport {
    client: reqwest::Client,
    config: StreamClientConfig,
}

impl HttpTransport {
    /// Creates a transport from explicit client configuration.
    pub fn new(config: StreamClientConfig) -> Result<Self, StreamClientError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| StreamClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a transport from `ANALYSIS_API_BASE_URL` and friends.
    pub fn from_env() -> Result<Self, StreamClientError> {
        Self::new(StreamClientConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl StreamTransport for HttpTransport {
    async fn connect(&self, request: TransportRequest) -> Result<MessageStream, TransportError> {
        let url = self.config.stream_url();
        debug!(session_id = %request.session_id, correlation_id = ?request.correlation_id, %url, "opening analysis stream");

        let response = self
            .client
            .get(&url)
            .query(&StreamClientConfig::stream_query(request.correlation_id))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(TransportError::connect)?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        Ok(Box::pin(sse_message_stream(bytes_stream)))
    }
}

fn sse_message_stream(
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<RawMessage, TransportError>> + Send {
    struct State {
        bytes_stream: ByteStream,
        decoder: SseDecoder,
        pending: VecDeque<RawMessage>,
        done: bool,
    }

    stream::try_unfold(
        State {
            bytes_stream,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(message) = state.pending.pop_front() {
                    return Ok(Some((message, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        state.pending.extend(state.decoder.push_chunk(&chunk));
                    }
                    Some(Err(e)) => return Err(TransportError::read(e)),
                    None => {
                        state.done = true;
                        state.pending.extend(state.decoder.finish());
                    }
                }
            }
        },
    )
}
