// HLS playback support for video players: source detection, header policy,
// engine session lifecycle and native-error fallback.

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fallback;
pub mod headers;
pub mod net;
pub mod player;
pub mod policy;
pub mod proxy;
pub mod quality;
pub mod session;

// Re-exports for easier access
pub use classifier::{ByteRange, ContentClassifier, is_hls_mime, looks_like_hls, probe_range};
pub use config::{
    DEFAULT_PROBE_WINDOW, DEFAULT_USER_AGENT, HlsEngineConfig, PlaybackConfig,
    PlaybackConfigBuilder, ProbeConfig,
};
pub use engine::{
    EngineConfig, EngineErrorPayload, EngineEvent, EngineEventKind, EventListener,
    HLS_MIME_TYPES, HlsEngine, HlsEngineFactory, LevelDescriptor, MediaElement, OutboundRequest,
    can_play_hls_natively,
};
pub use error::{PlaybackError, ProbeError};
pub use events::{ErrorCategory, ErrorEvent, PlaybackFailure, PlayerEvent, PlayerEventSink};
pub use fallback::{FallbackCoordinator, FallbackState, NativeMediaError};
pub use headers::{StreamHeaders, StreamSource};
pub use net::{HttpClient, ProbeResponse, ReqwestHttpClient, install_rustls_provider};
pub use player::{HlsPlayer, MediaInfo, PlaybackRoute};
pub use policy::{ALLOWED_HEADERS, HeaderPolicy, RequestSetup, is_header_safe};
pub use proxy::{ProxyConfig, ProxyCredentials, ProxyKind};
pub use quality::{AUTO_LEVEL, QualityLevel, QualitySelection, level_name};
pub use session::HlsSession;
