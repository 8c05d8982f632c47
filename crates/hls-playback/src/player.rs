// Player facade: wires classification, the engine session and native-error fallback together.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::classifier::ContentClassifier;
use crate::config::PlaybackConfig;
use crate::engine::{HlsEngineFactory, MediaElement};
use crate::error::{PlaybackError, ProbeError};
use crate::events::{PlayerEvent, PlayerEventSink};
use crate::fallback::FallbackCoordinator;
use crate::headers::StreamSource;
use crate::net::{HttpClient, ReqwestHttpClient};
use crate::policy::HeaderPolicy;
use crate::quality::{QualityLevel, QualitySelection};
use crate::session::HlsSession;

/// Which path a playback attempt took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackRoute {
    /// The HLS engine drives the media element.
    Library,
    /// The caller should hand the URI to the media element directly.
    Native,
}

/// Media element state reported with the can-play notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaInfo {
    pub duration: Duration,
    pub width: u32,
    pub height: u32,
}

pub struct HlsPlayer {
    session: HlsSession,
    classifier: Arc<ContentClassifier>,
    fallback: FallbackCoordinator,
    sink: Arc<dyn PlayerEventSink>,
    source: Mutex<Option<StreamSource>>,
    initialized: AtomicBool,
}

impl HlsPlayer {
    pub fn new(
        factory: Arc<dyn HlsEngineFactory>,
        media: Arc<dyn MediaElement>,
        http: Arc<dyn HttpClient>,
        sink: Arc<dyn PlayerEventSink>,
        config: PlaybackConfig,
    ) -> Self {
        let policy = HeaderPolicy::new(config.document_origin.as_ref());
        let classifier = Arc::new(
            ContentClassifier::new(
                Arc::clone(&factory),
                Arc::clone(&media),
                http,
                policy.clone(),
            )
            .with_probe_window(config.probe.probe_window),
        );
        let session = HlsSession::new(
            factory,
            media,
            Arc::clone(&sink),
            config.engine,
            policy,
            config.with_credentials,
        );
        let fallback = FallbackCoordinator::new(session.clone(), Arc::clone(&classifier));

        Self {
            session,
            classifier,
            fallback,
            sink,
            source: Mutex::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    /// Builds a player whose probes go through a `reqwest` client configured
    /// from `config.probe`.
    pub fn with_reqwest(
        factory: Arc<dyn HlsEngineFactory>,
        media: Arc<dyn MediaElement>,
        sink: Arc<dyn PlayerEventSink>,
        config: PlaybackConfig,
    ) -> Result<Self, ProbeError> {
        let http = Arc::new(ReqwestHttpClient::new(&config.probe)?);
        Ok(Self::new(factory, media, http, sink, config))
    }

    /// Starts a new playback attempt, replacing whatever was playing.
    pub async fn play(&self, source: StreamSource) -> Result<PlaybackRoute, PlaybackError> {
        if source.uri().trim().is_empty() {
            return Err(PlaybackError::invalid_url(source.uri(), "empty URI"));
        }

        self.session.dispose();
        self.initialized.store(false, Ordering::SeqCst);
        *self.source.lock() = Some(source.clone());

        if self
            .classifier
            .should_use_library_playback(source.uri(), source.headers())
        {
            info!(uri = %source.uri(), "Playing through HLS engine");
            self.session
                .initialize(source.uri(), source.headers())
                .await?;
            Ok(PlaybackRoute::Library)
        } else {
            debug!(uri = %source.uri(), "Playing natively");
            Ok(PlaybackRoute::Native)
        }
    }

    /// Native media element reported `error_code` for the current source.
    /// Returns true when the HLS engine took over.
    pub async fn handle_native_error(&self, error_code: u16) -> Result<bool, PlaybackError> {
        let Some(source) = self.source.lock().clone() else {
            return Ok(false);
        };
        self.fallback
            .handle_native_playback_error(error_code, source.uri(), source.headers())
            .await
    }

    /// Emits `Initialized` the first time the element can play in this attempt.
    pub fn handle_can_play(&self, info: MediaInfo) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sink.emit(PlayerEvent::Initialized {
            duration: info.duration,
            width: info.width,
            height: info.height,
        });
    }

    pub fn available_qualities(&self) -> Vec<QualityLevel> {
        self.session.available_qualities()
    }

    pub fn set_quality_level(&self, index: i32) {
        self.session.set_quality_level(index);
    }

    pub fn current_quality_level(&self) -> i32 {
        self.session.current_quality_level()
    }

    pub fn quality_selection(&self) -> QualitySelection {
        self.session.quality_selection()
    }

    pub fn session(&self) -> &HlsSession {
        &self.session
    }

    pub fn classifier(&self) -> &ContentClassifier {
        &self.classifier
    }

    pub fn dispose(&self) {
        self.session.dispose();
        *self.source.lock() = None;
        self.initialized.store(false, Ordering::SeqCst);
    }
}
