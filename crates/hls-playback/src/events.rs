use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::engine::EngineErrorPayload;
use crate::quality::QualityLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Network,
    Media,
    Mux,
    KeySystem,
    Other,
}

impl ErrorCategory {
    /// Maps the engine's error type string.
    pub fn from_engine_type(error_type: &str) -> Self {
        match error_type {
            "networkError" => ErrorCategory::Network,
            "mediaError" => ErrorCategory::Media,
            "muxError" => ErrorCategory::Mux,
            "keySystemError" => ErrorCategory::KeySystem,
            _ => ErrorCategory::Other,
        }
    }

    /// Code reported to the player event stream.
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Network => "MEDIA_ERR_NETWORK",
            ErrorCategory::Media => "MEDIA_ERR_DECODE",
            ErrorCategory::Mux => "MEDIA_ERR_MUX",
            ErrorCategory::KeySystem => "MEDIA_ERR_ENCRYPTED",
            ErrorCategory::Other => "MEDIA_ERR_UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Media => "media",
            ErrorCategory::Mux => "mux",
            ErrorCategory::KeySystem => "key system",
            ErrorCategory::Other => "other",
        };
        f.write_str(name)
    }
}

/// Engine error translated into the player's vocabulary. Transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub category: ErrorCategory,
    pub detail: String,
    pub fatal: bool,
}

impl From<&EngineErrorPayload> for ErrorEvent {
    fn from(payload: &EngineErrorPayload) -> Self {
        Self {
            category: ErrorCategory::from_engine_type(&payload.error_type),
            detail: payload.details.clone(),
            fatal: payload.fatal,
        }
    }
}

/// Fatal error notification in the `{code, message, details}` shape the
/// player expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackFailure {
    pub code: String,
    pub message: String,
    pub details: String,
}

impl From<&ErrorEvent> for PlaybackFailure {
    fn from(event: &ErrorEvent) -> Self {
        Self {
            code: event.category.code().to_string(),
            message: format!("HLS {} error", event.category),
            details: event.detail.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The media element can play; emitted once per playback attempt.
    Initialized {
        duration: Duration,
        width: u32,
        height: u32,
    },
    /// A manifest was parsed and the level list replaced.
    QualityLevelsChanged(Vec<QualityLevel>),
    Error(PlaybackFailure),
}

/// Receiver of player events.
pub trait PlayerEventSink: Send + Sync {
    fn emit(&self, event: PlayerEvent);
}

impl PlayerEventSink for mpsc::UnboundedSender<PlayerEvent> {
    fn emit(&self, event: PlayerEvent) {
        // Receiver gone means nobody is listening any more.
        let _ = self.send(event);
    }
}
