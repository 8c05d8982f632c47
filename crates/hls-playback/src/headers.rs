// Stream source description: the URI plus caller-supplied request headers.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Header map with case-insensitive keys.
///
/// Keys are stored lower-cased, so `Range` and `range` address the same
/// entry. Iteration order is the sorted key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamHeaders {
    inner: BTreeMap<String, String>,
}

impl StreamHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a header, replacing any value stored under the same key in a
    /// different letter case.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.inner
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.inner.remove(&key.to_ascii_lowercase())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(&key.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for StreamHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (key, value) in iter {
            headers.insert(key, value);
        }
        headers
    }
}

/// A single playback request. Immutable once handed to a session; a new one
/// is built for every playback attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSource {
    uri: Arc<str>,
    headers: Arc<StreamHeaders>,
}

impl StreamSource {
    pub fn new(uri: impl Into<String>, headers: StreamHeaders) -> Self {
        Self {
            uri: Arc::from(uri.into()),
            headers: Arc::new(headers),
        }
    }

    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self::new(uri, StreamHeaders::new())
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn headers(&self) -> &StreamHeaders {
        &self.headers
    }
}
