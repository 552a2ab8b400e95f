use std::time::Duration;

use crate::errors::StreamClientError;
use crate::model::CorrelationId;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_ENDPOINT_PATH: &str = "stream_analysis_openai";

/// Configuration for the HTTP stream transport.
#[derive(Clone, Debug)]
pub struct StreamClientConfig {
    /// Base URL of the analysis backend (for example `http://localhost:8080/api`).
    pub base_url: String,
    /// Path of the streaming endpoint, relative to `base_url`.
    pub endpoint_path: String,
    /// Timeout for establishing the connection.
    ///
    /// Only the connect phase is bounded. Use `StreamOptions::idle_timeout`
    /// to bound silence on an open stream.
    pub connect_timeout: Duration,
}

impl Default for StreamClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl StreamClientConfig {
    /// Creates a config pointing at the given backend.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Builds a config from `ANALYSIS_API_BASE_URL` and
    /// `ANALYSIS_CONNECT_TIMEOUT_SECS`, falling back to defaults when unset.
    pub fn from_env() -> Result<Self, StreamClientError> {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("ANALYSIS_API_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config.base_url = base_url.trim().to_string();
        }
        if let Ok(raw) = std::env::var("ANALYSIS_CONNECT_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                StreamClientError::Config(format!(
                    "ANALYSIS_CONNECT_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}"
                ))
            })?;
            config.connect_timeout = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the endpoint path.
    pub fn endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.endpoint_path = path.into();
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), StreamClientError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(StreamClientError::Config("base_url must not be empty".into()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(StreamClientError::Config(format!(
                "base_url must be an http(s) URL, got {base:?}"
            )));
        }
        if self.connect_timeout.is_zero() {
            return Err(StreamClientError::Config(
                "connect_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn stream_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim().trim_end_matches('/'),
            self.endpoint_path.trim_start_matches('/')
        )
    }

    pub(crate) fn stream_query(correlation_id: Option<CorrelationId>) -> Vec<(&'static str, String)> {
        correlation_id
            .map(|id| vec![("processed_id", id.to_string())])
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_joins_base_and_path() {
        let config = StreamClientConfig::new("http://localhost:8080/api/");
        assert_eq!(
            config.stream_url(),
            "http://localhost:8080/api/stream_analysis_openai"
        );
        let config = config.endpoint_path("/custom");
        assert_eq!(config.stream_url(), "http://localhost:8080/api/custom");
    }

    #[test]
    fn query_omits_processed_id_when_unbound() {
        assert!(StreamClientConfig::stream_query(None).is_empty());
        assert_eq!(
            StreamClientConfig::stream_query(CorrelationId::new(42)),
            vec![("processed_id", "42".to_string())]
        );
    }

    #[test]
    fn validate_rejects_non_http_base() {
        let err = StreamClientConfig::new("localhost:8080").validate();
        assert!(matches!(err, Err(StreamClientError::Config(msg)) if msg.contains("http(s)")));
        assert!(StreamClientConfig::default().validate().is_ok());
    }
}
