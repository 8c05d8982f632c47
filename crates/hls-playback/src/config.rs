use std::time::Duration;

use url::Url;

use crate::error::PlaybackError;
use crate::proxy::ProxyConfig;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Number of bytes requested by the manifest sniffing probe.
pub const DEFAULT_PROBE_WINDOW: u64 = 1024;

/// Buffering and loader settings handed to every engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HlsEngineConfig {
    /// Forward buffer the engine tries to keep filled
    pub max_buffer_length: Duration,
    /// Hard cap on the forward buffer
    pub max_max_buffer_length: Duration,
    pub manifest_loading_timeout: Duration,
    pub manifest_loading_max_retry: u32,
    pub frag_loading_timeout: Duration,
    pub frag_loading_max_retry: u32,
}

impl Default for HlsEngineConfig {
    fn default() -> Self {
        Self {
            max_buffer_length: Duration::from_secs(30),
            max_max_buffer_length: Duration::from_secs(600),
            manifest_loading_timeout: Duration::from_secs(10),
            manifest_loading_max_retry: 1,
            frag_loading_timeout: Duration::from_secs(20),
            frag_loading_max_retry: 3,
        }
    }
}

impl HlsEngineConfig {
    /// Rejects settings the engine cannot honour.
    pub fn validate(&self) -> Result<(), PlaybackError> {
        if self.max_buffer_length > self.max_max_buffer_length {
            return Err(PlaybackError::configuration(format!(
                "max_buffer_length ({:?}) exceeds max_max_buffer_length ({:?})",
                self.max_buffer_length, self.max_max_buffer_length
            )));
        }
        if self.manifest_loading_timeout.is_zero() || self.frag_loading_timeout.is_zero() {
            return Err(PlaybackError::configuration(
                "loader timeouts must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Settings for the HEAD/GET probes issued by the content classifier.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Size of the ranged GET window (bytes)
    pub probe_window: u64,

    /// Overall request timeout. Zero leaves timing to the HTTP layer.
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            probe_window: DEFAULT_PROBE_WINDOW,
            timeout: Duration::ZERO,
            connect_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            proxy: None,
            use_system_proxy: true,
        }
    }
}

/// Top-level configuration for a player instance.
#[derive(Debug, Clone, Default)]
pub struct PlaybackConfig {
    pub engine: HlsEngineConfig,
    pub probe: ProbeConfig,

    /// Whether the caller wants cookies attached. They are only ever sent to
    /// the document origin.
    pub with_credentials: bool,

    /// Origin of the hosting document, used for the same-origin check.
    pub document_origin: Option<Url>,
}

impl PlaybackConfig {
    pub fn builder() -> PlaybackConfigBuilder {
        PlaybackConfigBuilder::new()
    }
}

#[derive(Debug, Default)]
pub struct PlaybackConfigBuilder {
    config: PlaybackConfig,
}

impl PlaybackConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine_config(mut self, engine: HlsEngineConfig) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn with_probe_config(mut self, probe: ProbeConfig) -> Self {
        self.config.probe = probe;
        self
    }

    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        self.config.with_credentials = with_credentials;
        self
    }

    pub fn with_document_origin(mut self, origin: Url) -> Self {
        self.config.document_origin = Some(origin);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.probe.user_agent = user_agent.into();
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe.timeout = timeout;
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.probe.proxy = Some(proxy);
        self
    }

    pub fn build(self) -> PlaybackConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_defaults_match_loader_policy() {
        let config = HlsEngineConfig::default();
        assert_eq!(config.max_buffer_length, Duration::from_secs(30));
        assert_eq!(config.max_max_buffer_length, Duration::from_secs(600));
        assert_eq!(config.manifest_loading_timeout, Duration::from_secs(10));
        assert_eq!(config.manifest_loading_max_retry, 1);
        assert_eq!(config.frag_loading_timeout, Duration::from_secs(20));
        assert_eq!(config.frag_loading_max_retry, 3);
    }

    #[test]
    fn engine_config_validation() {
        assert!(HlsEngineConfig::default().validate().is_ok());

        let inverted = HlsEngineConfig {
            max_buffer_length: Duration::from_secs(900),
            ..HlsEngineConfig::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(PlaybackError::Configuration { .. })
        ));

        let no_timeout = HlsEngineConfig {
            frag_loading_timeout: Duration::ZERO,
            ..HlsEngineConfig::default()
        };
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn builder_sets_fields() {
        let origin = Url::parse("https://app.example.com").unwrap();
        let config = PlaybackConfig::builder()
            .with_credentials(true)
            .with_document_origin(origin.clone())
            .with_user_agent("test-agent")
            .with_probe_timeout(Duration::from_secs(5))
            .build();

        assert!(config.with_credentials);
        assert_eq!(config.document_origin, Some(origin));
        assert_eq!(config.probe.user_agent, "test-agent");
        assert_eq!(config.probe.timeout, Duration::from_secs(5));
        assert_eq!(config.probe.probe_window, DEFAULT_PROBE_WINDOW);
    }
}
