use secrecy::{ExposeSecret, Secret};
use service_core::config::Config as CoreConfig;
use service_core::error::AppError;
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::services::routes::RouteTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub common: CoreConfig,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub gate: GatePolicyConfig,
    pub notify_webhook_url: Option<String>,
    pub static_dir: String,
    /// Served under `/static` without gating; must not overlap `static_dir`.
    pub assets_dir: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub jwt_secret: Secret<String>,
    pub refresh_window_seconds: i64,
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct GatePolicyConfig {
    pub exempt_emails: Vec<String>,
    pub entitlement_timeout_ms: u64,
    pub routes: RouteTable,
}

impl GatePolicyConfig {
    pub fn entitlement_timeout(&self) -> Duration {
        Duration::from_millis(self.entitlement_timeout_ms)
    }
}

impl GateConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let environment: Environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "dev".to_string())
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let routes = match env::var("GATE_ROUTES") {
            Ok(raw) if !raw.trim().is_empty() => RouteTable::parse(&raw)
                .map_err(|e| AppError::ConfigError(anyhow::anyhow!("GATE_ROUTES: {}", e)))?,
            _ => RouteTable::default(),
        };

        let config = GateConfig {
            common: CoreConfig::load()?,
            environment,
            service_name: get_env("SERVICE_NAME", Some("gate-service"), false)?,
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: optional_env("OTLP_ENDPOINT"),
            database: DatabaseConfig {
                url: Secret::new(get_env("DATABASE_URL", None, is_prod)?),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 1)?,
            },
            session: SessionConfig {
                cookie_name: get_env("SESSION_COOKIE_NAME", Some("session"), false)?,
                jwt_secret: Secret::new(get_env("SESSION_JWT_SECRET", None, is_prod)?),
                refresh_window_seconds: parse_env("SESSION_REFRESH_WINDOW_SECONDS", 300)?,
                ttl_seconds: parse_env("SESSION_TTL_SECONDS", 3600)?,
            },
            gate: GatePolicyConfig {
                exempt_emails: env::var("GATE_EXEMPT_EMAILS")
                    .unwrap_or_default()
                    .split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect(),
                entitlement_timeout_ms: parse_env("GATE_ENTITLEMENT_TIMEOUT_MS", 2000)?,
                routes,
            },
            notify_webhook_url: optional_env("NOTIFY_WEBHOOK_URL"),
            static_dir: get_env("STATIC_DIR", Some("static"), false)?,
            assets_dir: get_env("ASSETS_DIR", Some("assets"), false)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.session.jwt_secret.expose_secret().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_JWT_SECRET must not be empty"
            )));
        }

        if self.session.ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_TTL_SECONDS must be positive"
            )));
        }

        if self.session.refresh_window_seconds < 0
            || self.session.refresh_window_seconds >= self.session.ttl_seconds
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_REFRESH_WINDOW_SECONDS must be between 0 and SESSION_TTL_SECONDS"
            )));
        }

        if self.gate.entitlement_timeout_ms == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GATE_ENTITLEMENT_TIMEOUT_MS must be greater than 0"
            )));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS exceeds DATABASE_MAX_CONNECTIONS"
            )));
        }

        if dirs_overlap(&self.static_dir, &self.assets_dir) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ASSETS_DIR must not overlap STATIC_DIR"
            )));
        }

        if self.environment == Environment::Prod && self.session.jwt_secret.expose_secret().len() < 32
        {
            tracing::warn!("SESSION_JWT_SECRET is shorter than 32 bytes in production");
        }

        Ok(())
    }

    /// Session cookies are only marked `Secure` outside local development.
    pub fn secure_cookies(&self) -> bool {
        self.environment == Environment::Prod
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Gated pages must never be reachable through the ungated asset mount.
fn dirs_overlap(pages: &str, assets: &str) -> bool {
    let pages = Path::new(pages.trim_start_matches("./"));
    let assets = Path::new(assets.trim_start_matches("./"));
    assets.starts_with(pages) || pages.starts_with(assets)
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
