use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::admin::{ApprovePaymentRequest, SetAdminRequest, SuccessResponse};
use crate::handlers::json_body;
use crate::middleware::gate::CurrentIdentity;
use crate::AppState;

/// `POST /api/admin/approve-payment`
///
/// The caller is resolved before the body is read, so anonymous and
/// non-admin callers get 401/403 whatever they send.
pub async fn approve_payment(
    State(state): State<AppState>,
    caller: CurrentIdentity,
    payload: Result<Json<ApprovePaymentRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let admin = state.workflow.require_admin(caller.identity()).await?;
    let payload = json_body(payload)?;

    state
        .workflow
        .review(admin, &payload.request_id, &payload.action)
        .await?;

    Ok(Json(SuccessResponse::ok()))
}

/// `POST /api/admin/users/{user_id}/admin`
pub async fn set_admin_flag(
    State(state): State<AppState>,
    caller: CurrentIdentity,
    Path(user_id): Path<String>,
    payload: Result<Json<SetAdminRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let admin = state.workflow.require_admin(caller.identity()).await?;
    let payload = json_body(payload)?;

    state
        .workflow
        .update_admin_flag(admin, &user_id, payload.is_admin)
        .await?;

    Ok(Json(SuccessResponse::ok()))
}
