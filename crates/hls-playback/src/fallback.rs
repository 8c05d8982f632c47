// Fallback Coordinator: retries a failed native playback through the HLS engine, once.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::classifier::ContentClassifier;
use crate::error::PlaybackError;
use crate::headers::StreamHeaders;
use crate::session::HlsSession;

/// Error codes reported by the native media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NativeMediaError {
    Aborted = 1,
    Network = 2,
    Decode = 3,
    SrcNotSupported = 4,
}

impl NativeMediaError {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Aborted),
            2 => Some(Self::Network),
            3 => Some(Self::Decode),
            4 => Some(Self::SrcNotSupported),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Fallback progress for the current playback attempt.
///
/// Leaves `NotAttempted` at most once; only a new attempt (dispose) resets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FallbackState {
    #[default]
    NotAttempted,
    InProgress,
    Completed {
        handled: bool,
    },
}

impl FallbackState {
    pub fn is_attempted(self) -> bool {
        !matches!(self, FallbackState::NotAttempted)
    }

    /// Claims the single fallback slot. Returns false if it was already taken.
    pub(crate) fn try_begin(&mut self) -> bool {
        if self.is_attempted() {
            return false;
        }
        *self = FallbackState::InProgress;
        true
    }

    pub(crate) fn complete(&mut self, handled: bool) {
        if *self == FallbackState::InProgress {
            *self = FallbackState::Completed { handled };
        }
    }
}

#[derive(Clone)]
pub struct FallbackCoordinator {
    session: HlsSession,
    classifier: Arc<ContentClassifier>,
}

impl FallbackCoordinator {
    pub fn new(session: HlsSession, classifier: Arc<ContentClassifier>) -> Self {
        Self {
            session,
            classifier,
        }
    }

    /// Reacts to a native playback error.
    ///
    /// Returns `Ok(true)` when the HLS engine took over and the native error
    /// should not be surfaced.
    #[instrument(skip(self, headers), level = "debug")]
    pub async fn handle_native_playback_error(
        &self,
        error_code: u16,
        uri: &str,
        headers: &StreamHeaders,
    ) -> Result<bool, PlaybackError> {
        if NativeMediaError::from_code(error_code) != Some(NativeMediaError::SrcNotSupported) {
            debug!("Native error is not a source-support failure; leaving it alone");
            return Ok(false);
        }
        if uri.is_empty() {
            return Ok(false);
        }
        let Some(ticket) = self.session.begin_fallback() else {
            debug!("Fallback already attempted or engine active; not re-evaluating");
            return Ok(false);
        };

        let approved = self
            .classifier
            .should_use_library_playback_async(uri, headers)
            .await;
        if !approved {
            self.session.complete_fallback(ticket, false);
            debug!("Classifier rejected HLS fallback");
            return Ok(false);
        }

        info!("Native playback unsupported; retrying through HLS engine");
        match self.session.initialize_fallback(ticket, uri, headers).await {
            Ok(()) => {
                self.session.complete_fallback(ticket, true);
                Ok(true)
            }
            Err(PlaybackError::Cancelled) => {
                // A newer attempt owns the session now.
                debug!("Playback attempt ended during classification; discarding result");
                self.session.complete_fallback(ticket, false);
                Ok(false)
            }
            Err(e) => {
                self.session.complete_fallback(ticket, false);
                Err(e)
            }
        }
    }
}
