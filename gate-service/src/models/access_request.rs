//! Access request model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Review state of an access request. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl AccessRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRequestStatus::Pending => "pending",
            AccessRequestStatus::Approved => "approved",
            AccessRequestStatus::Rejected => "rejected",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "approved" => AccessRequestStatus::Approved,
            "rejected" => AccessRequestStatus::Rejected,
            _ => AccessRequestStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AccessRequestStatus::Pending)
    }
}

/// Admin decision on a pending access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
        }
    }

    /// Status the request moves to when this action is applied.
    pub fn target_status(&self) -> AccessRequestStatus {
        match self {
            ReviewAction::Approve => AccessRequestStatus::Approved,
            ReviewAction::Reject => AccessRequestStatus::Rejected,
        }
    }
}

impl FromStr for ReviewAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(ReviewAction::Approve),
            "reject" => Ok(ReviewAction::Reject),
            other => Err(format!("Invalid action: {}", other)),
        }
    }
}

/// A user's claim of having paid, awaiting admin review.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub id: Uuid,
    pub user_id: String,
    pub user_email: String,
    pub payment_confirmation: String,
    pub status: String,
    pub requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
}

impl AccessRequest {
    pub fn status(&self) -> AccessRequestStatus {
        AccessRequestStatus::from_string(&self.status)
    }
}

/// Input for queueing an access request.
#[derive(Debug, Clone)]
pub struct NewAccessRequest {
    pub user_id: String,
    pub user_email: String,
    pub payment_confirmation: String,
    pub requested_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_actions_only() {
        assert_eq!("approve".parse::<ReviewAction>(), Ok(ReviewAction::Approve));
        assert_eq!("reject".parse::<ReviewAction>(), Ok(ReviewAction::Reject));
        assert!("APPROVE".parse::<ReviewAction>().is_err());
        assert!("delete".parse::<ReviewAction>().is_err());
    }

    #[test]
    fn only_pending_is_open() {
        assert!(!AccessRequestStatus::Pending.is_terminal());
        assert!(AccessRequestStatus::Approved.is_terminal());
        assert!(AccessRequestStatus::Rejected.is_terminal());
    }

    #[test]
    fn actions_map_to_terminal_statuses() {
        assert_eq!(
            ReviewAction::Approve.target_status(),
            AccessRequestStatus::Approved
        );
        assert_eq!(
            ReviewAction::Reject.target_status(),
            AccessRequestStatus::Rejected
        );
    }
}
