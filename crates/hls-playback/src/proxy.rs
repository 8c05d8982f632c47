// Outbound proxy for the detection probes.

use reqwest::Proxy;

use crate::error::ProbeError;

/// Protocol spoken to the proxy server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// Proxies plain `http://` probe requests only.
    Http,
    /// Proxies `https://` probe requests only.
    Https,
    /// Tunnels every probe request.
    Socks5,
}

impl ProxyKind {
    fn default_scheme(self) -> &'static str {
        match self {
            ProxyKind::Http => "http",
            ProxyKind::Https => "https",
            ProxyKind::Socks5 => "socks5",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: String,
}

/// Proxy the classifier probes are routed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// `scheme://host:port`, or a bare `host:port`.
    pub address: String,
    pub kind: ProxyKind,
    pub credentials: Option<ProxyCredentials>,
}

impl ProxyConfig {
    pub fn new(kind: ProxyKind, address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            kind,
            credentials: None,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(ProxyCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// The proxy address with a scheme; a bare `host:port` gets the one
    /// implied by [`ProxyKind`].
    pub fn endpoint(&self) -> String {
        let address = self.address.trim();
        if address.contains("://") {
            address.to_string()
        } else {
            format!("{}://{address}", self.kind.default_scheme())
        }
    }

    pub(crate) fn to_reqwest(&self) -> Result<Proxy, ProbeError> {
        let endpoint = self.endpoint();
        let proxy = match self.kind {
            ProxyKind::Http => Proxy::http(&endpoint),
            ProxyKind::Https => Proxy::https(&endpoint),
            ProxyKind::Socks5 => Proxy::all(&endpoint),
        }
        .map_err(|source| ProbeError::Proxy {
            endpoint: endpoint.clone(),
            source,
        })?;

        Ok(match &self.credentials {
            Some(credentials) => proxy.basic_auth(&credentials.username, &credentials.password),
            None => proxy,
        })
    }
}
