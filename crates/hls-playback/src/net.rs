// HTTP transport used by the content classifier probes.

use std::sync::OnceLock;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use tracing::{debug, trace};
use url::Url;

use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::headers::StreamHeaders;

/// Outcome of a HEAD probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
}

/// Minimal HTTP surface needed for content detection.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn head(&self, url: &str, headers: &StreamHeaders) -> Result<ProbeResponse, ProbeError>;

    /// GETs `url` and returns at most `limit` bytes of the body.
    async fn get(
        &self,
        url: &str,
        headers: &StreamHeaders,
        limit: usize,
    ) -> Result<Bytes, ProbeError>;
}

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        install_rustls_provider();

        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout);

        if config.timeout > std::time::Duration::ZERO {
            builder = builder.timeout(config.timeout);
        }

        if let Some(proxy_config) = &config.proxy {
            debug!(proxy = %proxy_config.endpoint(), "Routing probes through proxy");
            builder = builder.proxy(proxy_config.to_reqwest()?);
        } else if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        let client = builder.build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client, e.g. one shared with the rest of the application.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn header_map(headers: &StreamHeaders) -> Result<HeaderMap, ProbeError> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (key, value) in headers.iter() {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                ProbeError::InvalidHeader {
                    name: key.to_string(),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| ProbeError::InvalidHeader {
                name: key.to_string(),
            })?;
            map.insert(name, value);
        }
        Ok(map)
    }

    fn parse_url(url: &str) -> Result<Url, ProbeError> {
        Url::parse(url).map_err(|e| ProbeError::invalid_url(url, e.to_string()))
    }

    fn check_status(
        response: Response,
        url: &str,
        operation: &'static str,
    ) -> Result<Response, ProbeError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ProbeError::http_status(status, url, operation))
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn head(&self, url: &str, headers: &StreamHeaders) -> Result<ProbeResponse, ProbeError> {
        let response = self
            .client
            .head(Self::parse_url(url)?)
            .headers(Self::header_map(headers)?)
            .send()
            .await?;
        let response = Self::check_status(response, url, "content-type probe")?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(ProbeResponse {
            status: response.status().as_u16(),
            content_type,
        })
    }

    async fn get(
        &self,
        url: &str,
        headers: &StreamHeaders,
        limit: usize,
    ) -> Result<Bytes, ProbeError> {
        let response = self
            .client
            .get(Self::parse_url(url)?)
            .headers(Self::header_map(headers)?)
            .send()
            .await?;
        let response = Self::check_status(response, url, "manifest sniff")?;

        // Servers may ignore the Range header, so stop reading once `limit` is reached.
        let mut body = BytesMut::with_capacity(limit.min(64 * 1024));
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let remaining = limit.saturating_sub(body.len());
            body.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
            if body.len() >= limit {
                trace!(url = %url, limit, "Probe body truncated at limit");
                break;
            }
        }

        Ok(body.freeze())
    }
}
