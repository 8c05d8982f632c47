// External collaborators: the HLS engine capability and the media element it drives.
//
// The engine is treated as an opaque capability object. Implementations bind
// to a concrete library; tests substitute a fake.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::HlsEngineConfig;
use crate::policy::RequestSetup;

/// MIME types a media element may report native HLS support for.
pub const HLS_MIME_TYPES: [&str; 4] = [
    "application/vnd.apple.mpegurl",
    "application/x-mpegURL",
    "audio/mpegurl",
    "audio/x-mpegurl",
];

/// The native media element the engine attaches to.
pub trait MediaElement: Send + Sync {
    /// Mirrors `canPlayType`: an empty string means unsupported.
    fn can_play_type(&self, mime_type: &str) -> String;
}

/// True when the element reports support for any HLS MIME type.
pub fn can_play_hls_natively(media: &dyn MediaElement) -> bool {
    HLS_MIME_TYPES
        .iter()
        .any(|mime| !media.can_play_type(mime).is_empty())
}

/// Descriptor of one variant as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelDescriptor {
    pub height: u32,
    pub width: u32,
    pub bitrate: u64,
    pub name: Option<String>,
}

/// Raw error payload as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineErrorPayload {
    /// Engine error type, e.g. `networkError` or `mediaError`.
    pub error_type: String,
    pub details: String,
    pub fatal: bool,
}

/// The closed set of engine events a session listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineEventKind {
    MediaAttached,
    ManifestParsed,
    LevelSwitched,
    Error,
}

impl EngineEventKind {
    pub const ALL: [EngineEventKind; 4] = [
        EngineEventKind::MediaAttached,
        EngineEventKind::ManifestParsed,
        EngineEventKind::LevelSwitched,
        EngineEventKind::Error,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    MediaAttached,
    ManifestParsed { levels: Vec<LevelDescriptor> },
    LevelSwitched { level: i32 },
    Error(EngineErrorPayload),
}

impl EngineEvent {
    pub fn kind(&self) -> EngineEventKind {
        match self {
            EngineEvent::MediaAttached => EngineEventKind::MediaAttached,
            EngineEvent::ManifestParsed { .. } => EngineEventKind::ManifestParsed,
            EngineEvent::LevelSwitched { .. } => EngineEventKind::LevelSwitched,
            EngineEvent::Error(_) => EngineEventKind::Error,
        }
    }
}

pub type EventListener = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// An outbound request the engine is about to issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub with_credentials: bool,
}

impl OutboundRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some((_, existing_value)) => *existing_value = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Configuration object passed to the engine constructor.
#[derive(Clone)]
pub struct EngineConfig {
    pub request_setup: RequestSetup,
    pub max_buffer_length: Duration,
    pub max_max_buffer_length: Duration,
    pub manifest_loading_timeout: Duration,
    pub manifest_loading_max_retry: u32,
    pub frag_loading_timeout: Duration,
    pub frag_loading_max_retry: u32,
}

impl EngineConfig {
    pub fn new(settings: &HlsEngineConfig, request_setup: RequestSetup) -> Self {
        Self {
            request_setup,
            max_buffer_length: settings.max_buffer_length,
            max_max_buffer_length: settings.max_max_buffer_length,
            manifest_loading_timeout: settings.manifest_loading_timeout,
            manifest_loading_max_retry: settings.manifest_loading_max_retry,
            frag_loading_timeout: settings.frag_loading_timeout,
            frag_loading_max_retry: settings.frag_loading_max_retry,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("forwarded_headers", &self.request_setup.headers().len())
            .field("max_buffer_length", &self.max_buffer_length)
            .field("max_max_buffer_length", &self.max_max_buffer_length)
            .field("manifest_loading_timeout", &self.manifest_loading_timeout)
            .field("manifest_loading_max_retry", &self.manifest_loading_max_retry)
            .field("frag_loading_timeout", &self.frag_loading_timeout)
            .field("frag_loading_max_retry", &self.frag_loading_max_retry)
            .finish()
    }
}

/// A live engine instance.
pub trait HlsEngine: Send + Sync {
    fn attach_media(&self, media: Arc<dyn MediaElement>);

    /// Only valid once media-attached has fired.
    fn load_source(&self, uri: &str);

    /// Registers `listener` for events of `kind`.
    fn on(&self, kind: EngineEventKind, listener: EventListener);

    /// Ordered variant list of the current manifest.
    fn levels(&self) -> Vec<LevelDescriptor>;

    /// -1 means automatic selection.
    fn current_level(&self) -> i32;

    fn set_current_level(&self, level: i32);

    fn stop_load(&self);

    /// Releases every resource held by the instance.
    fn destroy(&self);
}

/// Constructs engine instances.
#[async_trait]
pub trait HlsEngineFactory: Send + Sync {
    /// Whether the engine can run in the current environment.
    fn is_supported(&self) -> bool;

    async fn create(&self, config: EngineConfig) -> Result<Arc<dyn HlsEngine>, String>;
}
