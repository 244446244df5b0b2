//! Shared doubles for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use imagegen_studio::account::{BackendClient, FunctionResponse, Session, SessionStore, User};
use imagegen_studio::config::Settings;
use imagegen_studio::error::{AppError, Result};
use imagegen_studio::provider::registry::ProviderRegistry;
use imagegen_studio::provider::{ImageProvider, ProviderKind, ProviderRequest};
use imagegen_studio::storage::blob::{BlobMode, BlobStore};
use imagegen_studio::storage::clock::ManualClock;
use imagegen_studio::storage::kv::MemoryStore;
use imagegen_studio::{AppParts, AppState};

pub const T0: i64 = 1_709_294_400_000;

/// One provider call as seen by a scripted provider
#[derive(Debug, Clone)]
pub struct Call {
    /// Order in which this attempt first reached the provider
    pub attempt: usize,
    /// Sends made so far for this attempt, starting at 1
    pub send: u32,
    pub request: ProviderRequest,
}

type Responder = dyn Fn(&Call) -> Result<Vec<String>> + Send + Sync;

/// Provider whose answers come from a closure. Attempts are told apart by
/// the per-attempt seed the dispatcher assigns.
pub struct ScriptedProvider {
    kind: ProviderKind,
    selects_model: bool,
    responder: Box<Responder>,
    seeds: Mutex<HashMap<Option<u64>, (usize, u32)>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    pub fn new(
        kind: ProviderKind,
        selects_model: bool,
        responder: impl Fn(&Call) -> Result<Vec<String>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            selects_model,
            responder: Box::new(responder),
            seeds: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Model-selecting provider, like the direct inference API
    pub fn by_model(responder: impl Fn(&Call) -> Result<Vec<String>> + Send + Sync + 'static) -> Self {
        Self::new(ProviderKind::HuggingFace, true, responder)
    }

    /// Provider that answers every attempt with a distinct URL
    pub fn always_ok() -> Self {
        Self::by_model(|call| Ok(vec![format!("https://img.test/{}.png", call.attempt)]))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn calls_for_model(&self, model: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.request.model.as_deref() == Some(model))
            .count()
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn selects_model(&self) -> bool {
        self.selects_model
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<Vec<String>> {
        let call = {
            let mut seeds = self.seeds.lock();
            let next = seeds.len();
            let entry = seeds.entry(request.seed).or_insert((next, 0));
            entry.1 += 1;
            Call {
                attempt: entry.0,
                send: entry.1,
                request: request.clone(),
            }
        };
        self.calls.lock().push(call.clone());
        (self.responder)(&call)
    }
}

/// In-memory stand-in for the backend-as-a-service
pub struct MockBackend {
    password: String,
    functions: Mutex<HashMap<String, FunctionResponse>>,
    pub invocations: Mutex<Vec<(String, Value)>>,
    pub sign_ups: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            password: "secret".to_string(),
            functions: Mutex::new(HashMap::new()),
            invocations: Mutex::new(Vec::new()),
            sign_ups: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(&self, function: &str, status: u16, body: Value) {
        self.functions
            .lock()
            .insert(function.to_string(), FunctionResponse { status, body });
    }

    fn session_for(email: &str) -> Session {
        Session {
            access_token: format!("token-{}", email),
            refresh_token: "refresh".to_string(),
            expires_at_ms: T0 + 3_600_000,
            user: User {
                id: format!("user-{}", email.split('@').next().unwrap_or("x")),
                email: email.to_string(),
            },
        }
    }
}

#[async_trait]
impl BackendClient for MockBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        if password != self.password {
            return Err(AppError::AuthenticationFailed("Invalid login credentials".to_string()));
        }
        Ok(Self::session_for(email))
    }

    async fn sign_up(&self, email: &str, _password: &str) -> Result<Option<Session>> {
        self.sign_ups.lock().push(email.to_string());
        Ok(Some(Self::session_for(email)))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<()> {
        Ok(())
    }

    async fn invoke(&self, function: &str, _access_token: Option<&str>, payload: Value) -> Result<FunctionResponse> {
        self.invocations.lock().push((function.to_string(), payload));
        Ok(self
            .functions
            .lock()
            .get(function)
            .cloned()
            .unwrap_or(FunctionResponse {
                status: 404,
                body: json!({ "error": format!("Function {} not found", function) }),
            }))
    }
}

/// Settings with short timings for tests
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.generation.base_delay_ms = 10;
    settings.generation.stagger_ms = 10;
    settings.generation.attempt_timeout_ms = 1_000;
    settings.storage.blob_mode = "data_url".to_string();
    settings
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub backend: Arc<MockBackend>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

pub fn test_app(settings: Settings, provider: Arc<ScriptedProvider>) -> TestApp {
    let backend = Arc::new(MockBackend::new());
    backend.respond(
        &settings.backend.premium_function,
        200,
        json!({ "data": { "premium_status": null, "premium_expiry": null, "credits": 0 } }),
    );
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(T0));

    let state = AppState::assemble(
        settings,
        AppParts {
            store: store.clone(),
            backend: backend.clone(),
            clock: clock.clone(),
            sessions: Arc::new(SessionStore::new()),
            blobs: Arc::new(BlobStore::new(BlobMode::DataUrl)),
            providers: ProviderRegistry::new().with(provider),
        },
    )
    .expect("test state");

    TestApp {
        state: Arc::new(state),
        backend,
        store,
        clock,
    }
}
