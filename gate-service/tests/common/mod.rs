#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use gate_service::config::{
    DatabaseConfig, Environment, GateConfig, GatePolicyConfig, SessionConfig,
};
use gate_service::models::{EntitlementSnapshot, Identity, PaymentStatus};
use gate_service::services::memory::MemoryStore;
use gate_service::services::routes::RouteTable;
use gate_service::startup::{build_router, build_state};
use gate_service::utils::jwt::SessionTokenCodec;
use gate_service::AppState;
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const EXEMPT_EMAIL: &str = "owner@example.com";

pub fn test_config() -> GateConfig {
    GateConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "gate-service".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: Secret::new("postgres://unused".to_string()),
            max_connections: 1,
            min_connections: 1,
        },
        session: SessionConfig {
            cookie_name: "session".to_string(),
            jwt_secret: Secret::new(JWT_SECRET.to_string()),
            refresh_window_seconds: 300,
            ttl_seconds: 3600,
        },
        gate: GatePolicyConfig {
            exempt_emails: vec![EXEMPT_EMAIL.to_string()],
            entitlement_timeout_ms: 100,
            routes: RouteTable::default(),
        },
        notify_webhook_url: None,
        static_dir: "tests/fixtures/static".to_string(),
        assets_dir: "tests/fixtures/assets".to_string(),
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub codec: SessionTokenCodec,
}

pub fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = build_state(test_config(), store.clone());

    TestApp {
        store,
        state,
        codec: SessionTokenCodec::new(JWT_SECRET.as_bytes()),
    }
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn seed_user(&self, user_id: &str, email: &str) -> Identity {
        self.store
            .insert_snapshot(EntitlementSnapshot::new(user_id, email));
        Identity::new(user_id, email)
    }

    pub fn seed_paid(&self, user_id: &str, email: &str) -> Identity {
        let mut snapshot = EntitlementSnapshot::new(user_id, email);
        snapshot.payment_status = PaymentStatus::Paid.as_str().to_string();
        self.store.insert_snapshot(snapshot);
        Identity::new(user_id, email)
    }

    pub fn seed_admin(&self, user_id: &str, email: &str) -> Identity {
        let mut snapshot = EntitlementSnapshot::new(user_id, email);
        snapshot.is_admin = true;
        self.store.insert_snapshot(snapshot);
        Identity::new(user_id, email)
    }

    pub fn cookie_for(&self, identity: &Identity, ttl: chrono::Duration) -> String {
        let token = self.codec.issue(identity, ttl).unwrap();
        format!("session={}", token)
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        identity: Option<&Identity>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(identity) = identity {
            builder = builder.header(header::COOKIE, self.cookie_for(identity, chrono::Duration::hours(1)));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.router().oneshot(request).await.unwrap()
    }

    /// POST an arbitrary body, for exercising body rejections.
    pub async fn post_raw(
        &self,
        path: &str,
        identity: Option<&Identity>,
        content_type: Option<&str>,
        body: &str,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(Method::POST).uri(path);
        if let Some(identity) = identity {
            builder = builder.header(header::COOKIE, self.cookie_for(identity, chrono::Duration::hours(1)));
        }
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }

        let request = builder.body(Body::from(body.to_string())).unwrap();
        self.router().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, path: &str, identity: Option<&Identity>) -> Response<Body> {
        self.request(Method::GET, path, identity, None).await
    }

    pub async fn post_json(
        &self,
        path: &str,
        identity: Option<&Identity>,
        body: Value,
    ) -> Response<Body> {
        self.request(Method::POST, path, identity, Some(body)).await
    }

    pub async fn delete(&self, path: &str, identity: Option<&Identity>) -> Response<Body> {
        self.request(Method::DELETE, path, identity, None).await
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}
