//! Request gate: decides per request whether to pass through or redirect.
//!
//! Decision table, evaluated against the path's route class:
//!
//! | class       | identity | result                                                   |
//! |-------------|----------|----------------------------------------------------------|
//! | protected   | none     | redirect `/auth/signin`                                  |
//! | admin       | none     | redirect `/auth/signin`                                  |
//! | protected   | some     | paid, premium, admin or exempt allows; lookup failure allows; else `/auth/subscription` |
//! | admin       | some     | `is_admin` allows; anything else (lookup failure included) `/dashboard` |
//! | auth        | some     | redirect `/dashboard`                                    |
//! | otherwise   |          | allow                                                    |
//!
//! At most one entitlement read happens per evaluation and the gate never writes.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::models::{EntitlementSnapshot, Identity};
use crate::services::metrics::{record_fail_open, record_gate_decision, ENTITLEMENT_FETCH_DURATION};
use crate::services::routes::{RouteClass, RouteTable};
use crate::services::session::{IdentityResolver, SessionResolution};
use crate::services::store::{EntitlementStore, StoreError};

pub const SIGNIN_PATH: &str = "/auth/signin";
pub const SUBSCRIPTION_PATH: &str = "/auth/subscription";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectTo(&'static str),
}

impl GateDecision {
    fn label(&self) -> &'static str {
        match self {
            GateDecision::Allow => "allow",
            GateDecision::RedirectTo(SIGNIN_PATH) => "redirect_signin",
            GateDecision::RedirectTo(SUBSCRIPTION_PATH) => "redirect_subscription",
            GateDecision::RedirectTo(DASHBOARD_PATH) => "redirect_dashboard",
            GateDecision::RedirectTo(_) => "redirect",
        }
    }
}

/// Decision plus what session resolution produced for the same request.
#[derive(Debug)]
pub struct GateOutcome {
    pub decision: GateDecision,
    pub identity: Option<Identity>,
    pub header_mutations: Vec<(HeaderName, HeaderValue)>,
}

/// Result of resolving whether an identity is an administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCheck {
    Granted,
    Denied,
    /// The entitlement store failed or timed out.
    Unavailable,
}

pub struct RequestGate {
    routes: RouteTable,
    exempt_emails: HashSet<String>,
    entitlements: Arc<dyn EntitlementStore>,
    lookup_timeout: Duration,
}

impl RequestGate {
    pub fn new(
        routes: RouteTable,
        exempt_emails: impl IntoIterator<Item = String>,
        entitlements: Arc<dyn EntitlementStore>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            routes,
            exempt_emails: exempt_emails
                .into_iter()
                .map(|email| email.trim().to_lowercase())
                .filter(|email| !email.is_empty())
                .collect(),
            entitlements,
            lookup_timeout,
        }
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        self.routes.classify(path)
    }

    /// Static assets and images never reach the gate.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.routes.is_excluded(path)
    }

    pub fn is_exempt(&self, email: &str) -> bool {
        self.exempt_emails.contains(&email.trim().to_lowercase())
    }

    /// Resolve the caller through `sessions` and evaluate `path`.
    pub async fn guard(
        &self,
        path: &str,
        headers: &HeaderMap,
        sessions: &dyn IdentityResolver,
    ) -> GateOutcome {
        let SessionResolution {
            identity,
            header_mutations,
        } = sessions.resolve(headers).await;

        let decision = self.evaluate(path, identity.as_ref()).await;

        GateOutcome {
            decision,
            identity,
            header_mutations,
        }
    }

    pub async fn evaluate(&self, path: &str, identity: Option<&Identity>) -> GateDecision {
        let class = self.classify(path);

        let decision = match (class, identity) {
            (RouteClass::Protected | RouteClass::Admin, None) => GateDecision::RedirectTo(SIGNIN_PATH),
            (RouteClass::Protected, Some(identity)) => self.payment_check(identity).await,
            (RouteClass::Admin, Some(identity)) => match self.check_admin(identity).await {
                AdminCheck::Granted => GateDecision::Allow,
                AdminCheck::Denied | AdminCheck::Unavailable => {
                    GateDecision::RedirectTo(DASHBOARD_PATH)
                }
            },
            (RouteClass::Auth, Some(_)) => GateDecision::RedirectTo(DASHBOARD_PATH),
            (RouteClass::Auth | RouteClass::Payment | RouteClass::Public, _) => GateDecision::Allow,
        };

        record_gate_decision(class.as_str(), decision.label());
        debug!(path = %path, route_class = %class, decision = decision.label(), "Gate evaluated");

        decision
    }

    /// Shared admin resolution for admin pages and admin-only operations.
    pub async fn check_admin(&self, identity: &Identity) -> AdminCheck {
        match self.fetch_snapshot(&identity.subject).await {
            Ok(Some(snapshot)) if snapshot.is_admin => AdminCheck::Granted,
            Ok(_) => AdminCheck::Denied,
            Err(e) => {
                warn!(
                    user_id = %identity.subject,
                    error = %e,
                    "Admin check failed, denying access"
                );
                AdminCheck::Unavailable
            }
        }
    }

    async fn payment_check(&self, identity: &Identity) -> GateDecision {
        if self.is_exempt(&identity.email) {
            return GateDecision::Allow;
        }

        match self.fetch_snapshot(&identity.subject).await {
            Ok(Some(snapshot)) if self.has_access(&snapshot) => GateDecision::Allow,
            // No record is the same as an unpaid record.
            Ok(_) => GateDecision::RedirectTo(SUBSCRIPTION_PATH),
            Err(e) => {
                let reason = match e {
                    StoreError::Timeout(_) => "timeout",
                    _ => "store_error",
                };
                warn!(
                    fail_open = true,
                    user_id = %identity.subject,
                    reason,
                    error = %e,
                    "Entitlement lookup failed, allowing request"
                );
                record_fail_open(RouteClass::Protected.as_str(), reason);
                GateDecision::Allow
            }
        }
    }

    fn has_access(&self, snapshot: &EntitlementSnapshot) -> bool {
        snapshot.is_admin || snapshot.has_paid_access() || self.is_exempt(&snapshot.email)
    }

    async fn fetch_snapshot(&self, user_id: &str) -> Result<Option<EntitlementSnapshot>, StoreError> {
        let started = Instant::now();

        let result = match tokio::time::timeout(
            self.lookup_timeout,
            self.entitlements.fetch_snapshot(user_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.lookup_timeout)),
        };

        let outcome = match &result {
            Ok(Some(_)) => "found",
            Ok(None) => "missing",
            Err(StoreError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        ENTITLEMENT_FETCH_DURATION
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());

        result
    }
}
