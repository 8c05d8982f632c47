// Content Classifier: decides whether a stream should be played through the HLS engine.
//
// Cheap textual heuristics run first; network probes are only used by the
// asynchronous path and every probe failure degrades to the next heuristic.

use std::fmt;
use std::sync::Arc;

use memchr::memmem;
use tracing::{debug, instrument, trace};
use url::Url;

use crate::config::DEFAULT_PROBE_WINDOW;
use crate::engine::{HLS_MIME_TYPES, HlsEngineFactory, MediaElement, can_play_hls_natively};
use crate::headers::StreamHeaders;
use crate::net::HttpClient;
use crate::policy::HeaderPolicy;

const MANIFEST_MARKER: &str = "m3u8";
const MANIFEST_EXTENSION: &str = ".m3u8";
const PLAYLIST_HEADER: &[u8] = b"#EXTM3U";

/// Inclusive byte range sent with the sniffing GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn to_header_value(self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// Number of bytes covered (the range is inclusive).
    pub fn span(self) -> u64 {
        self.end - self.start + 1
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Computes the probe range from an optional caller `Range` header.
///
/// A well-formed `bytes=S-E` or `bytes=S-` keeps its start and is capped to
/// `window` bytes; anything else falls back to `0..window`.
pub fn probe_range(headers: &StreamHeaders, window: u64) -> ByteRange {
    let window = window.max(1);
    let default = ByteRange {
        start: 0,
        end: window - 1,
    };

    let Some(value) = headers.get("range") else {
        return default;
    };
    match parse_range(value) {
        Some((start, end)) => {
            let capped = start.saturating_add(window - 1);
            ByteRange {
                start,
                end: end.map_or(capped, |end| end.min(capped)),
            }
        }
        None => {
            debug!(range = %value, "Ignoring malformed Range header");
            default
        }
    }
}

fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let ranges = value.trim().strip_prefix("bytes=")?;
    let (start, end) = ranges.split_once('-')?;
    let start = start.trim().parse::<u64>().ok()?;
    let end = end.trim();
    if end.is_empty() {
        return Some((start, None));
    }
    let end = end.parse::<u64>().ok()?;
    (end >= start).then_some((start, Some(end)))
}

/// True if `content_type` (parameters ignored) is one of the HLS MIME types.
pub fn is_hls_mime(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    HLS_MIME_TYPES
        .iter()
        .any(|mime| mime.eq_ignore_ascii_case(essence))
}

/// Synchronous heuristic: the `m3u8` marker in any case, an HLS
/// `Content-Type` hint, a `.m3u` path, or a `format`/`type`/`ext` query of
/// `m3u8` or `hls`.
pub fn looks_like_hls(url: &str, headers: &StreamHeaders) -> bool {
    if url.to_ascii_lowercase().contains(MANIFEST_MARKER) {
        return true;
    }
    if headers.get("content-type").is_some_and(is_hls_mime) {
        return true;
    }
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if parsed.path().to_ascii_lowercase().ends_with(".m3u") {
        return true;
    }
    parsed.query_pairs().any(|(key, value)| {
        matches!(key.as_ref(), "format" | "type" | "ext")
            && (value.eq_ignore_ascii_case("m3u8") || value.eq_ignore_ascii_case("hls"))
    })
}

pub struct ContentClassifier {
    factory: Arc<dyn HlsEngineFactory>,
    media: Arc<dyn MediaElement>,
    http: Arc<dyn HttpClient>,
    policy: HeaderPolicy,
    probe_window: u64,
}

impl ContentClassifier {
    pub fn new(
        factory: Arc<dyn HlsEngineFactory>,
        media: Arc<dyn MediaElement>,
        http: Arc<dyn HttpClient>,
        policy: HeaderPolicy,
    ) -> Self {
        Self {
            factory,
            media,
            http,
            policy,
            probe_window: DEFAULT_PROBE_WINDOW,
        }
    }

    pub fn with_probe_window(mut self, probe_window: u64) -> Self {
        self.probe_window = probe_window.max(1);
        self
    }

    fn native_hls(&self) -> bool {
        can_play_hls_natively(self.media.as_ref())
    }

    /// Decides without touching the network.
    pub fn should_use_library_playback(&self, url: &str, headers: &StreamHeaders) -> bool {
        self.factory.is_supported() && looks_like_hls(url, headers) && !self.native_hls()
    }

    /// Same decision, but falls back to network detection when the URL
    /// carries no manifest marker.
    pub async fn should_use_library_playback_async(
        &self,
        url: &str,
        headers: &StreamHeaders,
    ) -> bool {
        if !self.factory.is_supported() || self.native_hls() {
            return false;
        }
        url.contains(MANIFEST_MARKER) || self.detect_hls_content(url, headers).await
    }

    /// Probes the stream: HEAD content-type, then the `.m3u8` literal, then a
    /// ranged GET looking for `#EXTM3U`.
    #[instrument(skip(self, headers), level = "debug")]
    pub async fn detect_hls_content(&self, url: &str, headers: &StreamHeaders) -> bool {
        let reachable = Url::parse(url).is_ok();
        let mut probe_headers = self.policy.sanitize(headers);

        if reachable {
            match self.http.head(url, &probe_headers).await {
                Ok(response) => match response.content_type.as_deref() {
                    Some(content_type) if is_hls_mime(content_type) => {
                        debug!(
                            status = response.status,
                            content_type, "HEAD probe matched HLS content type"
                        );
                        return true;
                    }
                    content_type => {
                        trace!(
                            status = response.status,
                            ?content_type,
                            "HEAD probe content type not conclusive"
                        );
                    }
                },
                Err(e) => debug!(error = %e, "HEAD probe failed"),
            }
        } else {
            debug!("Skipping network probes for unparseable URL");
        }

        if url.contains(MANIFEST_EXTENSION) {
            return true;
        }

        if !reachable {
            return false;
        }

        let range = probe_range(headers, self.probe_window);
        probe_headers.insert("range", range.to_header_value());
        let limit = usize::try_from(range.span()).unwrap_or(usize::MAX);
        match self.http.get(url, &probe_headers, limit).await {
            Ok(body) => {
                let found = memmem::find(&body, PLAYLIST_HEADER).is_some();
                debug!(range = %range, bytes = body.len(), found, "Ranged GET probe finished");
                found
            }
            Err(e) => {
                debug!(error = %e, "Ranged GET probe failed");
                false
            }
        }
    }
}
