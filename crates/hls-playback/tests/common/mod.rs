#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use hls_playback::{
    EngineConfig, EngineEvent, EngineEventKind, EventListener, HLS_MIME_TYPES, HeaderPolicy,
    HlsEngine, HlsEngineConfig, HlsEngineFactory, HlsSession, HttpClient, LevelDescriptor,
    MediaElement, PlayerEvent, PlayerEventSink, ProbeError, ProbeResponse, StreamHeaders,
};
use parking_lot::Mutex;
use tokio::sync::Notify;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("hls_playback=trace")
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    AttachMedia,
    LoadSource(String),
    SetLevel(i32),
    StopLoad,
    Destroy,
}

pub struct FakeEngine {
    pub config: EngineConfig,
    calls: Mutex<Vec<EngineCall>>,
    listeners: Mutex<Vec<(EngineEventKind, EventListener)>>,
    levels: Mutex<Vec<LevelDescriptor>>,
    current_level: Mutex<i32>,
}

impl FakeEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            calls: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            levels: Mutex::new(Vec::new()),
            current_level: Mutex::new(-1),
        }
    }

    /// Delivers `event` to every registered listener of its kind.
    pub fn emit(&self, event: EngineEvent) {
        let listeners: Vec<EventListener> = self
            .listeners
            .lock()
            .iter()
            .filter(|(kind, _)| *kind == event.kind())
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn listener_kinds(&self) -> Vec<EngineEventKind> {
        self.listeners.lock().iter().map(|(kind, _)| *kind).collect()
    }

    pub fn set_levels(&self, levels: Vec<LevelDescriptor>) {
        *self.levels.lock() = levels;
    }
}

impl HlsEngine for FakeEngine {
    fn attach_media(&self, _media: Arc<dyn MediaElement>) {
        self.calls.lock().push(EngineCall::AttachMedia);
    }

    fn load_source(&self, uri: &str) {
        self.calls.lock().push(EngineCall::LoadSource(uri.to_string()));
    }

    fn on(&self, kind: EngineEventKind, listener: EventListener) {
        self.listeners.lock().push((kind, listener));
    }

    fn levels(&self) -> Vec<LevelDescriptor> {
        self.levels.lock().clone()
    }

    fn current_level(&self) -> i32 {
        *self.current_level.lock()
    }

    fn set_current_level(&self, level: i32) {
        self.calls.lock().push(EngineCall::SetLevel(level));
        *self.current_level.lock() = level;
    }

    fn stop_load(&self) {
        self.calls.lock().push(EngineCall::StopLoad);
    }

    fn destroy(&self) {
        self.calls.lock().push(EngineCall::Destroy);
    }
}

pub struct FakeFactory {
    supported: AtomicBool,
    failure: Mutex<Option<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
    created: Mutex<Vec<Arc<FakeEngine>>>,
    create_calls: AtomicUsize,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            supported: AtomicBool::new(true),
            failure: Mutex::new(None),
            gate: Mutex::new(None),
            created: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_supported(&self, supported: bool) {
        self.supported.store(supported, Ordering::SeqCst);
    }

    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    /// Makes `create` wait until the returned handle is notified.
    pub fn gate(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock() = Some(Arc::clone(&notify));
        notify
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn engines(&self) -> Vec<Arc<FakeEngine>> {
        self.created.lock().clone()
    }

    pub fn last_engine(&self) -> Arc<FakeEngine> {
        self.created
            .lock()
            .last()
            .cloned()
            .expect("no engine created")
    }
}

#[async_trait]
impl HlsEngineFactory for FakeFactory {
    fn is_supported(&self) -> bool {
        self.supported.load(Ordering::SeqCst)
    }

    async fn create(&self, config: EngineConfig) -> Result<Arc<dyn HlsEngine>, String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(reason) = self.failure.lock().clone() {
            return Err(reason);
        }
        let engine = Arc::new(FakeEngine::new(config));
        self.created.lock().push(Arc::clone(&engine));
        Ok(engine)
    }
}

// ============================================================================
// Media element
// ============================================================================

pub struct FakeMedia {
    native_hls: bool,
}

impl FakeMedia {
    pub fn without_hls() -> Arc<Self> {
        Arc::new(Self { native_hls: false })
    }

    pub fn with_native_hls() -> Arc<Self> {
        Arc::new(Self { native_hls: true })
    }
}

impl MediaElement for FakeMedia {
    fn can_play_type(&self, mime_type: &str) -> String {
        if self.native_hls && HLS_MIME_TYPES.contains(&mime_type) {
            "maybe".to_string()
        } else {
            String::new()
        }
    }
}

// ============================================================================
// HTTP
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub headers: StreamHeaders,
    pub limit: Option<usize>,
}

pub struct FakeHttp {
    head: Mutex<Result<Option<String>, String>>,
    body: Mutex<Result<Vec<u8>, String>>,
    requests: Mutex<Vec<RecordedRequest>>,
    held: Mutex<HashMap<String, Arc<Notify>>>,
}

impl FakeHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            head: Mutex::new(Ok(None)),
            body: Mutex::new(Ok(Vec::new())),
            requests: Mutex::new(Vec::new()),
            held: Mutex::new(HashMap::new()),
        })
    }

    /// Makes HEAD requests for `url` wait until the returned handle is notified.
    pub fn hold_head(&self, url: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.held.lock().insert(url.to_string(), Arc::clone(&notify));
        notify
    }

    /// Waits until a request for `url` has been issued.
    pub async fn wait_for_request(&self, url: &str) {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while !self.requests.lock().iter().any(|r| r.url == url) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("request was never issued");
    }

    pub fn head_content_type(&self, content_type: &str) {
        *self.head.lock() = Ok(Some(content_type.to_string()));
    }

    pub fn head_fails(&self) {
        *self.head.lock() = Err("connection refused".to_string());
    }

    pub fn body(&self, body: &[u8]) {
        *self.body.lock() = Ok(body.to_vec());
    }

    pub fn get_fails(&self) {
        *self.body.lock() = Err("connection reset".to_string());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn last_get(&self) -> Option<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .rev()
            .find(|r| r.method == "GET")
            .cloned()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn head(&self, url: &str, headers: &StreamHeaders) -> Result<ProbeResponse, ProbeError> {
        self.requests.lock().push(RecordedRequest {
            method: "HEAD",
            url: url.to_string(),
            headers: headers.clone(),
            limit: None,
        });
        let held = self.held.lock().get(url).cloned();
        if let Some(held) = held {
            held.notified().await;
        }
        match self.head.lock().clone() {
            Ok(content_type) => Ok(ProbeResponse {
                status: 200,
                content_type,
            }),
            Err(reason) => Err(ProbeError::Client { reason }),
        }
    }

    async fn get(
        &self,
        url: &str,
        headers: &StreamHeaders,
        limit: usize,
    ) -> Result<Bytes, ProbeError> {
        self.requests.lock().push(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            headers: headers.clone(),
            limit: Some(limit),
        });
        match self.body.lock().clone() {
            Ok(body) => Ok(Bytes::from(body)),
            Err(reason) => Err(ProbeError::Client { reason }),
        }
    }
}

// ============================================================================
// Event sink
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PlayerEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }
}

impl PlayerEventSink for RecordingSink {
    fn emit(&self, event: PlayerEvent) {
        self.events.lock().push(event);
    }
}

// ============================================================================
// Session harness
// ============================================================================

pub struct SessionHarness {
    pub factory: Arc<FakeFactory>,
    pub media: Arc<FakeMedia>,
    pub sink: Arc<RecordingSink>,
    pub session: HlsSession,
}

impl SessionHarness {
    pub fn new() -> Self {
        Self::with_policy(HeaderPolicy::default(), false)
    }

    pub fn with_policy(policy: HeaderPolicy, with_credentials: bool) -> Self {
        Self::build(policy, with_credentials, HlsEngineConfig::default())
    }

    pub fn with_engine_config(engine_config: HlsEngineConfig) -> Self {
        Self::build(HeaderPolicy::default(), false, engine_config)
    }

    fn build(policy: HeaderPolicy, with_credentials: bool, engine_config: HlsEngineConfig) -> Self {
        init_tracing();
        let factory = FakeFactory::new();
        let media = FakeMedia::without_hls();
        let sink = RecordingSink::new();
        let session = HlsSession::new(
            factory.clone(),
            media.clone(),
            sink.clone(),
            engine_config,
            policy,
            with_credentials,
        );
        Self {
            factory,
            media,
            sink,
            session,
        }
    }
}

pub fn level(height: u32, bitrate: u64, name: Option<&str>) -> LevelDescriptor {
    LevelDescriptor {
        height,
        width: height * 16 / 9,
        bitrate,
        name: name.map(str::to_string),
    }
}
