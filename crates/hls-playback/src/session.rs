// HLS Session Manager: owns the engine instance bound to one media element.
//
// Engine callbacks may race caller-initiated calls such as `dispose`. The
// state lock is never held while calling into the engine or the event sink,
// and every callback re-checks the session generation and engine handle so a
// late event observes a torn-down session instead of a half-built one.

use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::HlsEngineConfig;
use crate::engine::{
    EngineConfig, EngineErrorPayload, EngineEvent, EngineEventKind, EventListener, HlsEngine,
    HlsEngineFactory, LevelDescriptor, MediaElement,
};
use crate::error::PlaybackError;
use crate::events::{ErrorEvent, PlaybackFailure, PlayerEvent, PlayerEventSink};
use crate::fallback::FallbackState;
use crate::headers::StreamHeaders;
use crate::policy::{HeaderPolicy, RequestSetup};
use crate::quality::{AUTO_LEVEL, QualityLevel, QualitySelection, levels_from_descriptors};

#[derive(Debug, thiserror::Error)]
enum HandlerError {
    #[error("media attached but no source is recorded")]
    NoSource,

    #[error("switched to level {level} but only {available} levels are known")]
    LevelOutOfRange { level: i32, available: usize },
}

/// A listener registration. Dropping it cancels the listener.
struct Subscription {
    kind: EngineEventKind,
    _guard: DropGuard,
}

/// Claim on the fallback slot of one playback attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FallbackTicket {
    attempt: u64,
}

/// Engine and listeners detached from the state, released outside the lock.
struct Released {
    engine: Option<Arc<dyn HlsEngine>>,
    subscriptions: Vec<Subscription>,
}

impl Released {
    fn destroy(self) {
        drop(self.subscriptions);
        if let Some(engine) = self.engine {
            engine.destroy();
            debug!("HLS engine destroyed");
        }
    }
}

#[derive(Default)]
struct SessionState {
    engine: Option<Arc<dyn HlsEngine>>,
    current_uri: Option<String>,
    current_headers: Option<StreamHeaders>,
    fallback: FallbackState,
    quality_levels: Vec<QualityLevel>,
    switched_level: Option<usize>,
    subscriptions: Vec<Subscription>,
    /// Bumped on every teardown and engine build; stale callbacks compare against it.
    generation: u64,
    /// Bumped when a playback attempt ends; fallback tickets compare against it.
    attempt: u64,
}

impl SessionState {
    /// Detaches the engine and clears per-source state. The fallback flag
    /// survives unless the playback attempt ends.
    fn release(&mut self, end_attempt: bool) -> Released {
        self.generation = self.generation.wrapping_add(1);
        self.quality_levels.clear();
        self.switched_level = None;
        self.current_uri = None;
        self.current_headers = None;
        if end_attempt {
            self.attempt = self.attempt.wrapping_add(1);
            self.fallback = FallbackState::NotAttempted;
        }
        Released {
            engine: self.engine.take(),
            subscriptions: mem::take(&mut self.subscriptions),
        }
    }

    fn holds(&self, ticket: FallbackTicket) -> bool {
        self.attempt == ticket.attempt && self.fallback == FallbackState::InProgress
    }
}

struct SessionShared {
    factory: Arc<dyn HlsEngineFactory>,
    media: Arc<dyn MediaElement>,
    sink: Arc<dyn PlayerEventSink>,
    engine_config: HlsEngineConfig,
    policy: HeaderPolicy,
    with_credentials: bool,
    state: Mutex<SessionState>,
}

/// Lifecycle of an HLS engine attached to a single media element.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct HlsSession {
    shared: Arc<SessionShared>,
}

impl HlsSession {
    pub fn new(
        factory: Arc<dyn HlsEngineFactory>,
        media: Arc<dyn MediaElement>,
        sink: Arc<dyn PlayerEventSink>,
        engine_config: HlsEngineConfig,
        policy: HeaderPolicy,
        with_credentials: bool,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                factory,
                media,
                sink,
                engine_config,
                policy,
                with_credentials,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// Builds an engine for `uri`, subscribes to its events and attaches it
    /// to the media element. Loading starts once the engine reports
    /// media-attached.
    #[instrument(skip(self, headers), level = "debug")]
    pub async fn initialize(&self, uri: &str, headers: &StreamHeaders) -> Result<(), PlaybackError> {
        self.build_engine(uri, headers, None).await
    }

    /// Like [`HlsSession::initialize`], but only while `ticket` still owns the
    /// fallback slot of the current attempt. Otherwise returns `Cancelled`
    /// and leaves the session untouched.
    pub(crate) async fn initialize_fallback(
        &self,
        ticket: FallbackTicket,
        uri: &str,
        headers: &StreamHeaders,
    ) -> Result<(), PlaybackError> {
        self.build_engine(uri, headers, Some(ticket)).await
    }

    async fn build_engine(
        &self,
        uri: &str,
        headers: &StreamHeaders,
        ticket: Option<FallbackTicket>,
    ) -> Result<(), PlaybackError> {
        if !self.shared.factory.is_supported() {
            return Err(PlaybackError::engine_unavailable(
                "HLS engine is not supported in this environment",
            ));
        }
        self.shared.engine_config.validate()?;

        // At most one engine per session: drop any previous one first.
        let (released, generation) = {
            let mut state = self.shared.state.lock();
            if ticket.is_some_and(|ticket| !state.holds(ticket)) {
                debug!("Fallback ticket belongs to a finished attempt");
                return Err(PlaybackError::Cancelled);
            }
            let released = state.release(false);
            (released, state.generation)
        };
        released.destroy();

        let request_setup = RequestSetup::new(
            self.shared.policy.clone(),
            headers,
            self.shared.with_credentials,
        );
        let config = EngineConfig::new(&self.shared.engine_config, request_setup);
        debug!(?config, "Creating HLS engine");

        let engine = self
            .shared
            .factory
            .create(config)
            .await
            .map_err(PlaybackError::engine_unavailable)?;

        let subscriptions = self.subscribe(&engine, generation);

        {
            let mut state = self.shared.state.lock();
            if state.generation != generation {
                drop(state);
                drop(subscriptions);
                engine.destroy();
                debug!("Session torn down while the engine was being created");
                return Err(PlaybackError::Cancelled);
            }
            state.engine = Some(Arc::clone(&engine));
            state.current_uri = Some(uri.to_string());
            state.current_headers = Some(headers.clone());
            state.quality_levels.clear();
            state.switched_level = None;
            state.subscriptions = subscriptions;
        }

        engine.attach_media(Arc::clone(&self.shared.media));
        info!("HLS engine attached to media element");
        Ok(())
    }

    fn subscribe(&self, engine: &Arc<dyn HlsEngine>, generation: u64) -> Vec<Subscription> {
        EngineEventKind::ALL
            .iter()
            .map(|&kind| {
                let token = CancellationToken::new();
                let listener_token = token.clone();
                let session = Arc::downgrade(&self.shared);
                let listener: EventListener = Arc::new(move |event: &EngineEvent| {
                    if listener_token.is_cancelled() || event.kind() != kind {
                        return;
                    }
                    if let Some(shared) = Weak::upgrade(&session) {
                        shared.dispatch(generation, event);
                    }
                });
                engine.on(kind, listener);
                Subscription {
                    kind,
                    _guard: token.drop_guard(),
                }
            })
            .collect()
    }

    /// Snapshot of the current levels; empty until a manifest is parsed.
    pub fn available_qualities(&self) -> Vec<QualityLevel> {
        self.shared.state.lock().quality_levels.clone()
    }

    /// Forwards to the engine. `-1` selects automatic switching. No-op
    /// without an engine.
    pub fn set_quality_level(&self, index: i32) {
        match self.engine() {
            Some(engine) => {
                debug!(index, "Setting quality level");
                engine.set_current_level(index);
            }
            None => trace!(index, "No engine attached; ignoring quality change"),
        }
    }

    /// Engine-reported level, or `-1` when no engine is attached. See
    /// [`HlsSession::quality_selection`] to tell the two apart.
    pub fn current_quality_level(&self) -> i32 {
        self.engine()
            .map_or(AUTO_LEVEL, |engine| engine.current_level())
    }

    pub fn quality_selection(&self) -> QualitySelection {
        self.engine()
            .map_or(QualitySelection::Detached, |engine| {
                QualitySelection::from_engine_level(engine.current_level())
            })
    }

    /// Last level the engine reported switching to.
    pub fn switched_level(&self) -> Option<usize> {
        self.shared.state.lock().switched_level
    }

    pub fn has_engine(&self) -> bool {
        self.shared.state.lock().engine.is_some()
    }

    pub fn current_uri(&self) -> Option<String> {
        self.shared.state.lock().current_uri.clone()
    }

    pub fn current_headers(&self) -> Option<StreamHeaders> {
        self.shared.state.lock().current_headers.clone()
    }

    pub fn fallback_state(&self) -> FallbackState {
        self.shared.state.lock().fallback
    }

    /// Event kinds with a live listener.
    pub fn subscribed_events(&self) -> Vec<EngineEventKind> {
        self.shared
            .state
            .lock()
            .subscriptions
            .iter()
            .map(|subscription| subscription.kind)
            .collect()
    }

    /// Claims the fallback slot, only when no engine is active.
    pub(crate) fn begin_fallback(&self) -> Option<FallbackTicket> {
        let mut state = self.shared.state.lock();
        (state.engine.is_none() && state.fallback.try_begin()).then_some(FallbackTicket {
            attempt: state.attempt,
        })
    }

    /// Records the outcome, unless the attempt behind `ticket` already ended.
    pub(crate) fn complete_fallback(&self, ticket: FallbackTicket, handled: bool) {
        let mut state = self.shared.state.lock();
        if state.attempt == ticket.attempt {
            state.fallback.complete(handled);
        }
    }

    /// Destroys the engine, cancels every subscription and forgets the
    /// current source. Idempotent.
    pub fn dispose(&self) {
        let released = self.shared.state.lock().release(true);
        released.destroy();
    }

    fn engine(&self) -> Option<Arc<dyn HlsEngine>> {
        self.shared.state.lock().engine.clone()
    }
}

impl SessionShared {
    /// Live engine for `generation`, if the session has not moved on.
    fn live_engine(&self, generation: u64) -> Option<Arc<dyn HlsEngine>> {
        let state = self.state.lock();
        if state.generation != generation {
            return None;
        }
        state.engine.clone()
    }

    fn dispatch(&self, generation: u64, event: &EngineEvent) {
        let Some(engine) = self.live_engine(generation) else {
            trace!(event = ?event.kind(), "Dropping event for a torn-down session");
            return;
        };

        let result = match event {
            EngineEvent::MediaAttached => self.on_media_attached(generation, engine.as_ref()),
            EngineEvent::ManifestParsed { levels } => {
                self.on_manifest_parsed(generation, engine.as_ref(), levels);
                Ok(())
            }
            EngineEvent::LevelSwitched { level } => self.on_level_switched(generation, *level),
            EngineEvent::Error(payload) => {
                self.on_error(payload);
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!(event = ?event.kind(), error = %e, "Engine event handler failed");
        }
    }

    fn on_media_attached(&self, generation: u64, engine: &dyn HlsEngine) -> Result<(), HandlerError> {
        let uri = {
            let state = self.state.lock();
            if state.generation != generation {
                return Ok(());
            }
            state.current_uri.clone().ok_or(HandlerError::NoSource)?
        };
        debug!(uri = %uri, "Media attached; loading source");
        engine.load_source(&uri);
        Ok(())
    }

    fn on_manifest_parsed(
        &self,
        generation: u64,
        engine: &dyn HlsEngine,
        reported: &[LevelDescriptor],
    ) {
        let levels = if reported.is_empty() {
            levels_from_descriptors(&engine.levels())
        } else {
            levels_from_descriptors(reported)
        };

        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.quality_levels = levels.clone();
            state.switched_level = None;
        }

        debug!(count = levels.len(), "Manifest parsed; quality levels replaced");
        self.sink.emit(PlayerEvent::QualityLevelsChanged(levels));
    }

    fn on_level_switched(&self, generation: u64, level: i32) -> Result<(), HandlerError> {
        let mut state = self.state.lock();
        if state.generation != generation {
            return Ok(());
        }
        let available = state.quality_levels.len();
        match usize::try_from(level) {
            Ok(index) if index < available => {
                state.switched_level = Some(index);
                drop(state);
                debug!(level = index, "Quality level switched");
                Ok(())
            }
            _ => Err(HandlerError::LevelOutOfRange { level, available }),
        }
    }

    fn on_error(&self, payload: &EngineErrorPayload) {
        let event = ErrorEvent::from(payload);
        if event.fatal {
            error!(
                category = %event.category,
                details = %event.detail,
                "Fatal HLS engine error"
            );
            self.sink.emit(PlayerEvent::Error(PlaybackFailure::from(&event)));
        } else {
            warn!(
                category = %event.category,
                details = %event.detail,
                "Recoverable HLS engine error"
            );
        }
    }
}
