#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use goldrush_api::auth::jwt::JwtConfig;
use goldrush_api::config::{ServerConfig, StoreBackend};
use goldrush_api::router::build_app_router;
use goldrush_api::services::BackgroundServices;
use goldrush_api::state::AppState;
use goldrush_engine::{Engine, EngineConfig, PlanService, Stores};
use async_trait::async_trait;
use goldrush_core::generation::GenerationKind;
use goldrush_core::types::DbId;
use goldrush_provider::{GenerationOutput, GenerationProvider, ProviderError, StubProvider};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Build a test `ServerConfig` on the in-memory backend.
pub fn test_config(generation_wait_secs: u64) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        generation_wait_secs,
        store_backend: StoreBackend::Memory,
        database_url: None,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            expiry_mins: 60,
        },
    }
}

/// The full router over fresh in-memory stores, plus the engine for direct
/// inspection.
pub struct TestApp {
    pub router: Router,
    pub engine: Engine,
    services: Option<BackgroundServices>,
}

/// Rejects every request as a permanent provider error.
pub struct RejectingProvider;

#[async_trait]
impl GenerationProvider for RejectingProvider {
    async fn generate(
        &self,
        _kind: GenerationKind,
        _payload: &Value,
    ) -> Result<GenerationOutput, ProviderError> {
        Err(ProviderError::Permanent("content policy violation".into()))
    }
}

impl TestApp {
    /// Workers running against the stub provider; generator calls wait up
    /// to five seconds for their job.
    pub fn with_workers() -> Self {
        Self::with_provider(Arc::new(StubProvider::new()))
    }

    /// Workers running against `provider`, waiting up to five seconds.
    pub fn with_provider(provider: Arc<dyn GenerationProvider>) -> Self {
        Self::build(Some(provider), 5)
    }

    /// No workers: every admitted job stays QUEUED and generator calls
    /// answer 202 immediately.
    pub fn idle() -> Self {
        Self::build(None, 0)
    }

    /// No workers, but generator calls wait up to `generation_wait_secs`.
    pub fn idle_waiting(generation_wait_secs: u64) -> Self {
        Self::build(None, generation_wait_secs)
    }

    fn build(provider: Option<Arc<dyn GenerationProvider>>, generation_wait_secs: u64) -> Self {
        let engine_config = EngineConfig {
            worker_count: 2,
            ..EngineConfig::default()
        };
        let engine = Engine::new(Stores::in_memory(), PlanService::default(), &engine_config);

        let services = provider
            .map(|provider| BackgroundServices::start(&engine, provider, &engine_config));

        let config = test_config(generation_wait_secs);
        let state = AppState {
            engine: engine.clone(),
            pool: None,
            config: Arc::new(config.clone()),
        };

        Self {
            router: build_app_router(state, &config),
            engine,
            services,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Sign up a new free-tier account and return its token.
    pub async fn signup(&self, email: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/signup",
                json!({ "email": email, "password": "correct-horse", "name": "Ada" }),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn account_id(&self, email: &str) -> DbId {
        self.engine
            .stores
            .accounts
            .find_by_email(email)
            .await
            .unwrap()
            .expect("account exists")
            .id
    }

    pub async fn shutdown(mut self) {
        if let Some(services) = self.services.take() {
            services.shutdown(std::time::Duration::from_secs(5)).await;
        }
    }
}
