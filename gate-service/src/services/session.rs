//! Caller identity resolution from the session cookie.

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};

use crate::models::Identity;
use crate::utils::jwt::SessionTokenCodec;

/// Identity found on a request plus response headers the resolver wants set
/// (a refreshed session cookie). Header mutations are independent of the
/// gate's allow/redirect decision and apply to whichever response is sent.
#[derive(Debug, Default)]
pub struct SessionResolution {
    pub identity: Option<Identity>,
    pub header_mutations: Vec<(HeaderName, HeaderValue)>,
}

impl SessionResolution {
    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> SessionResolution;
}

/// Resolves identity from an HS256 session JWT stored in a cookie and
/// re-issues the cookie when the token is close to expiry.
#[derive(Clone)]
pub struct JwtSessionResolver {
    codec: SessionTokenCodec,
    cookie_name: String,
    refresh_window: Duration,
    ttl: Duration,
    secure_cookie: bool,
}

impl JwtSessionResolver {
    pub fn new(
        codec: SessionTokenCodec,
        cookie_name: impl Into<String>,
        refresh_window: Duration,
        ttl: Duration,
        secure_cookie: bool,
    ) -> Self {
        Self {
            codec,
            cookie_name: cookie_name.into(),
            refresh_window,
            ttl,
            secure_cookie,
        }
    }

    pub fn codec(&self) -> &SessionTokenCodec {
        &self.codec
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), token))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.ttl.num_seconds()))
            .build()
    }

    fn refreshed_cookie(&self, identity: &Identity) -> Option<(HeaderName, HeaderValue)> {
        let token = match self.codec.issue(identity, self.ttl) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %identity.subject, "Failed to refresh session token");
                return None;
            }
        };

        HeaderValue::from_str(&self.session_cookie(token).to_string())
            .ok()
            .map(|value| (header::SET_COOKIE, value))
    }
}

#[async_trait]
impl IdentityResolver for JwtSessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> SessionResolution {
        let jar = CookieJar::from_headers(headers);
        let Some(cookie) = jar.get(&self.cookie_name) else {
            return SessionResolution::anonymous();
        };

        let claims = match self.codec.verify(cookie.value()) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid session cookie");
                return SessionResolution::anonymous();
            }
        };

        let identity = claims.identity();
        let remaining = claims.exp - Utc::now().timestamp();

        let mut header_mutations = Vec::new();
        if remaining <= self.refresh_window.num_seconds() {
            if let Some(mutation) = self.refreshed_cookie(&identity) {
                tracing::debug!(user_id = %identity.subject, remaining, "Session cookie refreshed");
                header_mutations.push(mutation);
            }
        }

        SessionResolution {
            identity: Some(identity),
            header_mutations,
        }
    }
}
