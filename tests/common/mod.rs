//! Shared test harness: a scripted authorization window and a local mock
//! backend implementing the credential store contract on a random port.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use integration_hub::config::HubConfig;
use integration_hub::connect::{ConnectionOrchestrator, ConnectionState};
use integration_hub::popup::{AuthWindow, PopupError, PopupGeometry, WindowOpener};
use integration_hub::AppContext;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ─── Scripted window ─────────────────────────────────────────────────────────

/// Authorization window that reports closed after a fixed number of polls.
pub struct ScriptedWindow {
    polls_until_closed: usize,
    polls: AtomicUsize,
    closed: AtomicBool,
}

impl ScriptedWindow {
    pub fn closes_after(polls_until_closed: usize) -> Arc<Self> {
        Arc::new(Self {
            polls_until_closed,
            polls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn never_closing() -> Arc<Self> {
        Self::closes_after(usize::MAX)
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AuthWindow for ScriptedWindow {
    async fn is_closed(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return true;
        }
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= self.polls_until_closed {
            self.closed.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Opener handing out one pre-scripted window, or refusing every open.
pub struct ScriptedOpener {
    window: Option<Arc<ScriptedWindow>>,
    pub opened: AtomicUsize,
}

impl ScriptedOpener {
    pub fn with_window(window: Arc<ScriptedWindow>) -> Arc<Self> {
        Arc::new(Self {
            window: Some(window),
            opened: AtomicUsize::new(0),
        })
    }

    pub fn blocked() -> Arc<Self> {
        Arc::new(Self {
            window: None,
            opened: AtomicUsize::new(0),
        })
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl WindowOpener for ScriptedOpener {
    fn open(
        &self,
        _url: &str,
        _title: &str,
        _geometry: PopupGeometry,
    ) -> Result<Arc<dyn AuthWindow>, PopupError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        match &self.window {
            Some(window) => Ok(window.clone() as Arc<dyn AuthWindow>),
            None => Err(PopupError::Blocked("scripted refusal".into())),
        }
    }
}

// ─── Mock backend ────────────────────────────────────────────────────────────

/// Canned responses and request counters for the mock backend.
#[derive(Clone)]
pub struct BackendState {
    pub credential_fetches: Arc<AtomicUsize>,
    /// Body served by the credentials endpoint; `None` answers 404.
    pub credential: Arc<Mutex<Option<Value>>>,
    /// Artificial latency before the credentials endpoint answers.
    pub credential_delay: Arc<Mutex<Duration>>,
    /// `(provider, user, org)` of the last credentials request.
    pub last_credential_request: Arc<Mutex<Option<(String, String, String)>>>,
    /// Status and body served by the load endpoint.
    pub load: Arc<Mutex<(u16, Value)>>,
    /// Parsed `credentials` form field of the last load submission.
    pub last_submitted: Arc<Mutex<Option<Value>>>,
    /// Body served by the items endpoint.
    pub items: Arc<Mutex<Value>>,
}

impl BackendState {
    fn new() -> Self {
        Self {
            credential_fetches: Arc::new(AtomicUsize::new(0)),
            credential: Arc::new(Mutex::new(None)),
            credential_delay: Arc::new(Mutex::new(Duration::ZERO)),
            last_credential_request: Arc::new(Mutex::new(None)),
            load: Arc::new(Mutex::new((200, json!({})))),
            last_submitted: Arc::new(Mutex::new(None)),
            items: Arc::new(Mutex::new(json!([]))),
        }
    }

    pub fn set_credential(&self, body: Option<Value>) {
        *self.credential.lock().unwrap() = body;
    }

    pub fn set_credential_delay(&self, delay: Duration) {
        *self.credential_delay.lock().unwrap() = delay;
    }

    pub fn set_load(&self, status: u16, body: Value) {
        *self.load.lock().unwrap() = (status, body);
    }

    pub fn set_items(&self, body: Value) {
        *self.items.lock().unwrap() = body;
    }

    pub fn fetch_count(&self) -> usize {
        self.credential_fetches.load(Ordering::SeqCst)
    }
}

pub struct MockBackend {
    pub addr: std::net::SocketAddr,
    pub state: BackendState,
}

impl MockBackend {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn credentials_handler(
    State(state): State<BackendState>,
    Path((provider, user)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    state.credential_fetches.fetch_add(1, Ordering::SeqCst);
    let org = params.get("org").cloned().unwrap_or_default();
    *state.last_credential_request.lock().unwrap() = Some((provider, user, org));

    let delay = *state.credential_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    match state.credential.lock().unwrap().clone() {
        Some(body) => (StatusCode::OK, Json(body)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "No credentials found for this user" })),
        )
            .into_response(),
    }
}

async fn load_handler(
    State(state): State<BackendState>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Some(raw) = form.get("credentials") {
        *state.last_submitted.lock().unwrap() = serde_json::from_str(raw).ok();
    }
    let (status, body) = state.load.lock().unwrap().clone();
    (
        StatusCode::from_u16(status).unwrap(),
        Json(body),
    )
        .into_response()
}

async fn items_handler(State(state): State<BackendState>) -> impl IntoResponse {
    Json(state.items.lock().unwrap().clone())
}

/// Bind the mock backend on a free local port and serve it in the
/// background for the remainder of the test.
pub async fn spawn_backend() -> MockBackend {
    let state = BackendState::new();
    let app = Router::new()
        .route(
            "/integrations/{provider}/credentials/{user}",
            get(credentials_handler),
        )
        .route("/integrations/{provider}/load", post(load_handler))
        .route("/integrations/{provider}/items/{id}", get(items_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockBackend { addr, state }
}

// ─── Context helpers ─────────────────────────────────────────────────────────

/// Config pointed at the mock backend with test-friendly intervals.
pub fn test_config(base_url: &str) -> HubConfig {
    let mut config = HubConfig::default();
    config.backend.base_url = base_url.to_string();
    config.popup.poll_interval_ms = 10;
    config.connect.timeout_secs = 5;
    config
}

pub fn make_ctx(backend: &MockBackend, opener: Arc<dyn WindowOpener>) -> AppContext {
    AppContext::new(test_config(&backend.base_url()), opener)
}

/// Poll until the orchestrator leaves `Connecting`, panicking after 5 s.
pub async fn wait_until_settled(orchestrator: &ConnectionOrchestrator) -> ConnectionState {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let state = orchestrator.current_state().await;
        if !matches!(state, ConnectionState::Connecting) {
            return state;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("attempt did not settle, still {state:?}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
