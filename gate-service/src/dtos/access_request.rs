use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::NewAccessRequest;

/// Body of `POST /api/access-requests`. Fields are optional so a missing
/// field is a validation failure rather than a JSON rejection.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAccessRequest {
    #[validate(required(message = "userId is required"), length(min = 1))]
    #[serde(default)]
    pub user_id: Option<String>,

    #[validate(required(message = "userEmail is required"), length(min = 1))]
    #[serde(default)]
    pub user_email: Option<String>,

    #[validate(required(message = "paymentConfirmation is required"), length(min = 1))]
    #[serde(default)]
    pub payment_confirmation: Option<String>,

    #[serde(default)]
    pub requested_at: Option<DateTime<Utc>>,
}

impl SubmitAccessRequest {
    /// Trimmed required fields, `None` if any is missing or blank.
    pub fn into_new_request(self) -> Option<NewAccessRequest> {
        fn present(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Some(NewAccessRequest {
            user_id: present(self.user_id)?,
            user_email: present(self.user_email)?,
            payment_confirmation: present(self.payment_confirmation)?,
            requested_at: self.requested_at,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitAccessResponse {
    pub success: bool,
    pub id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListAccessRequestsQuery {
    /// `admin=1` lists every pending request instead of the caller's own.
    #[serde(default)]
    pub admin: Option<String>,
}

impl ListAccessRequestsQuery {
    pub fn wants_admin_view(&self) -> bool {
        matches!(self.admin.as_deref(), Some("1") | Some("true"))
    }
}
