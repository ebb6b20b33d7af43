use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::dtos::access_request::{ListAccessRequestsQuery, SubmitAccessRequest, SubmitAccessResponse};
use crate::handlers::json_body;
use crate::middleware::gate::CurrentIdentity;
use crate::services::approval::WorkflowError;
use crate::AppState;

/// `POST /api/access-requests`
pub async fn submit_access_request(
    State(state): State<AppState>,
    payload: Result<Json<SubmitAccessRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let record = state.workflow.submit(json_body(payload)?).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitAccessResponse {
            success: true,
            id: record.id,
        }),
    ))
}

/// `GET /api/access-requests`: the caller's own requests, or with `admin=1`
/// the whole pending queue for admins.
pub async fn list_access_requests(
    State(state): State<AppState>,
    caller: CurrentIdentity,
    Query(query): Query<ListAccessRequestsQuery>,
) -> Result<impl IntoResponse, AppError> {
    if query.wants_admin_view() {
        state.workflow.require_admin(caller.identity()).await?;
        return Ok(Json(state.workflow.pending_requests().await));
    }

    let caller = caller.identity().ok_or(WorkflowError::Unauthorized)?;
    Ok(Json(state.workflow.requests_for(caller).await?))
}
