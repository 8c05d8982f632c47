use reqwest::StatusCode;

/// Errors surfaced to callers of the session manager and the player.
///
/// Probe failures never show up here: the classifier recovers from them
/// locally (see [`ProbeError`]).
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("HLS engine unavailable: {reason}")]
    EngineUnavailable { reason: String },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("session disposed while initialization was in flight")]
    Cancelled,

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl PlaybackError {
    pub fn engine_unavailable(reason: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            reason: reason.into(),
        }
    }

    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// True when no library playback path exists at all, as opposed to a
    /// failure while playing.
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(self, Self::EngineUnavailable { .. })
    }
}

/// Errors raised by the network probes used during content detection.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("invalid header `{name}`")]
    InvalidHeader { name: String },

    #[error("invalid proxy `{endpoint}`: {source}")]
    Proxy {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Failure reported by a custom [`crate::net::HttpClient`] implementation.
    #[error("client error: {reason}")]
    Client { reason: String },
}

impl ProbeError {
    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
