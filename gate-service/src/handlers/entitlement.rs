use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::middleware::gate::CurrentIdentity;
use crate::models::EntitlementSnapshot;
use crate::AppState;

/// `GET /api/me/entitlement`
pub async fn my_entitlement(
    State(state): State<AppState>,
    caller: CurrentIdentity,
) -> Result<Json<EntitlementSnapshot>, AppError> {
    let caller = caller
        .identity()
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))?;

    let snapshot = state
        .entitlements
        .fetch_snapshot(&caller.subject)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No entitlement record")))?;

    Ok(Json(snapshot))
}
