use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::convert::Infallible;

use crate::models::Identity;
use crate::services::gate::{GateDecision, GateOutcome};
use crate::AppState;

/// Runs every non-asset request through the request gate.
///
/// Allowed requests carry the resolved `Identity` in their extensions.
/// Refreshed session cookies are attached to the response either way.
pub async fn gate_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if state.gate.is_excluded(&path) {
        return next.run(request).await;
    }

    let GateOutcome {
        decision,
        identity,
        header_mutations,
    } = state
        .gate
        .guard(&path, request.headers(), state.sessions.as_ref())
        .await;

    let mut response = match decision {
        GateDecision::Allow => {
            if let Some(identity) = identity {
                request.extensions_mut().insert(identity);
            }
            next.run(request).await
        }
        GateDecision::RedirectTo(target) => Redirect::to(target).into_response(),
    };

    let headers = response.headers_mut();
    for (name, value) in header_mutations {
        headers.append(name, value);
    }

    response
}

/// The caller resolved by `gate_middleware`, if any.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Option<Identity>);

impl CurrentIdentity {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentIdentity(parts.extensions.get::<Identity>().cloned()))
    }
}
