pub mod access_requests;
pub mod admin;
pub mod app;
pub mod entitlement;
pub mod metrics;
pub mod share;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use service_core::error::AppError;

/// Unwrap a JSON body, turning extractor rejections (wrong content type,
/// malformed or mistyped JSON) into the service's 400 error shape.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            tracing::debug!(
                status = rejection.status().as_u16(),
                reason = %rejection.body_text(),
                "Rejected request body"
            );
            Err(AppError::BadRequest(anyhow::anyhow!("Invalid request body")))
        }
    }
}
