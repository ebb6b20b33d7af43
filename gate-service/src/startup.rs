//! Application startup and lifecycle management.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::GateConfig;
use crate::handlers::{
    access_requests::{list_access_requests, submit_access_request},
    admin::{approve_payment, set_admin_flag},
    app::{health_check, readiness_check},
    entitlement::my_entitlement,
    metrics::metrics,
    share::{create_share, delete_share, get_share},
};
use crate::middleware::gate::gate_middleware;
use crate::services::{
    approval::ApprovalWorkflow,
    database::Database,
    gate::RequestGate,
    notifier::{LogNotifier, Notifier, WebhookNotifier},
    session::JwtSessionResolver,
    store::{AccessRequestQueue, EntitlementStore, ShareStore},
};
use crate::utils::jwt::SessionTokenCodec;
use crate::AppState;

/// Wire the gate, session resolver and workflow over one store.
pub fn build_state<S>(config: GateConfig, store: Arc<S>) -> AppState
where
    S: EntitlementStore + AccessRequestQueue + ShareStore + 'static,
{
    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };

    let sessions = JwtSessionResolver::new(
        SessionTokenCodec::new(config.session.jwt_secret.expose_secret().as_bytes()),
        config.session.cookie_name.clone(),
        chrono::Duration::seconds(config.session.refresh_window_seconds),
        chrono::Duration::seconds(config.session.ttl_seconds),
        config.secure_cookies(),
    );

    let gate = Arc::new(RequestGate::new(
        config.gate.routes.clone(),
        config.gate.exempt_emails.clone(),
        store.clone(),
        config.gate.entitlement_timeout(),
    ));

    let workflow = Arc::new(ApprovalWorkflow::new(
        gate.clone(),
        store.clone(),
        store.clone(),
        notifier,
    ));

    AppState {
        config: Arc::new(config),
        gate,
        sessions: Arc::new(sessions),
        workflow,
        entitlements: store.clone(),
        shares: store,
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/access-requests",
            post(submit_access_request).get(list_access_requests),
        )
        .route("/admin/approve-payment", post(approve_payment))
        .route("/admin/users/:user_id/admin", post(set_admin_flag))
        .route("/me/entitlement", get(my_entitlement))
        .route("/share", post(create_share))
        .route("/share/:id", get(get_share).delete(delete_share));

    let static_dir = state.config.static_dir.clone();
    let assets_dir = state.config.assets_dir.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .nest("/api", api)
        .nest_service("/static", ServeDir::new(&assets_dir))
        // Pages are static files and reach the browser only through the gate.
        .fallback_service(ServeDir::new(&static_dir).append_index_html_on_directories(true))
        .layer(from_fn_with_state(state.clone(), gate_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    pub async fn build(config: GateConfig) -> Result<Self, AppError> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let state = build_state(config, Arc::new(db));

        tracing::info!(port = port, "gate-service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "gate-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}
