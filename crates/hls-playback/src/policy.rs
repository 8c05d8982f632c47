// Header Sanitizer: decides which caller headers and credentials may leave the process.

use tracing::debug;
use url::{Origin, Url};

use crate::engine::OutboundRequest;
use crate::headers::StreamHeaders;

/// Header names (lower-case) that may be forwarded to the stream origin.
pub const ALLOWED_HEADERS: [&str; 6] = [
    "authorization",
    "x-auth-token",
    "x-api-key",
    "referer",
    "user-agent",
    "range",
];

/// Returns true when `key` is on the allow-list and `value` cannot split the
/// request (no CR or LF).
pub fn is_header_safe(key: &str, value: &str) -> bool {
    let key = key.to_ascii_lowercase();
    ALLOWED_HEADERS.contains(&key.as_str()) && !value.contains(['\r', '\n'])
}

/// Origin policy for outbound requests.
///
/// Without a document origin nothing is considered same-origin, so
/// credentials are never attached.
#[derive(Debug, Clone, Default)]
pub struct HeaderPolicy {
    document_origin: Option<Origin>,
}

impl HeaderPolicy {
    pub fn new(document_origin: Option<&Url>) -> Self {
        Self {
            document_origin: document_origin.map(Url::origin),
        }
    }

    /// Compares scheme, host and port of `url` with the document origin.
    /// Unparseable URLs are cross-origin.
    pub fn is_same_origin(&self, url: &str) -> bool {
        let Some(document_origin) = &self.document_origin else {
            return false;
        };
        match Url::parse(url) {
            Ok(parsed) => {
                let origin = parsed.origin();
                origin.is_tuple() && &origin == document_origin
            }
            Err(_) => false,
        }
    }

    /// Keeps only the headers that pass [`is_header_safe`].
    pub fn sanitize(&self, headers: &StreamHeaders) -> StreamHeaders {
        headers
            .iter()
            .filter(|(key, value)| {
                let safe = is_header_safe(key, value);
                if !safe {
                    debug!(header = %key, "Dropping header rejected by policy");
                }
                safe
            })
            .collect()
    }
}

/// Per-request interception hook handed to the HLS engine.
///
/// Every manifest, fragment and key request passes through [`RequestSetup::apply`]
/// before it is sent.
#[derive(Debug, Clone, Default)]
pub struct RequestSetup {
    policy: HeaderPolicy,
    headers: StreamHeaders,
    with_credentials: bool,
}

impl RequestSetup {
    pub fn new(policy: HeaderPolicy, headers: &StreamHeaders, with_credentials: bool) -> Self {
        let headers = policy.sanitize(headers);
        Self {
            policy,
            headers,
            with_credentials,
        }
    }

    pub fn headers(&self) -> &StreamHeaders {
        &self.headers
    }

    pub fn apply(&self, request: &mut OutboundRequest) {
        for (key, value) in self.headers.iter() {
            if is_header_safe(key, value) {
                request.set_header(key, value);
            }
        }
        request.with_credentials = self.with_credentials && self.policy.is_same_origin(&request.url);
    }
}
