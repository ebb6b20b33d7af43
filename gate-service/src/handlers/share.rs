use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::share::CreateShareRequest;
use crate::handlers::json_body;
use crate::middleware::gate::CurrentIdentity;
use crate::models::{NewSharedProject, SharedProject};
use crate::AppState;

fn share_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Shared project not found"))
}

fn parse_share_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| share_not_found())
}

/// `POST /api/share`
pub async fn create_share(
    State(state): State<AppState>,
    caller: CurrentIdentity,
    payload: Result<Json<CreateShareRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    payload.validate()?;

    let share = state
        .shares
        .create_share(NewSharedProject {
            title: payload.title,
            payload: payload.payload,
            created_by: caller.identity().map(|identity| identity.subject.clone()),
        })
        .await?;

    tracing::info!(share_id = %share.id, "Shared project created");
    Ok((StatusCode::CREATED, Json(share)))
}

/// `GET /api/share/{id}`
pub async fn get_share(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SharedProject>, AppError> {
    let id = parse_share_id(&id)?;
    let share = state
        .shares
        .get_share(id)
        .await?
        .ok_or_else(share_not_found)?;

    Ok(Json(share))
}

/// `DELETE /api/share/{id}`: only the creator may delete; anonymous shares
/// cannot be deleted through the API.
pub async fn delete_share(
    State(state): State<AppState>,
    caller: CurrentIdentity,
    Path(id): Path<String>,
) -> Result<Json<SharedProject>, AppError> {
    let caller = caller
        .identity()
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))?;
    let id = parse_share_id(&id)?;

    let share = state
        .shares
        .get_share(id)
        .await?
        .ok_or_else(share_not_found)?;

    if share.created_by.as_deref() != Some(caller.subject.as_str()) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Only the creator can delete a shared project"
        )));
    }

    if !state.shares.delete_share(id).await? {
        return Err(share_not_found());
    }

    tracing::info!(share_id = %id, user_id = %caller.subject, "Shared project deleted");
    Ok(Json(share))
}
