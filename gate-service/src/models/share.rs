//! Shared project model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A project snapshot published under a share link.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SharedProject {
    pub id: Uuid,
    pub title: String,
    pub payload: serde_json::Value,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSharedProject {
    pub title: String,
    pub payload: serde_json::Value,
    pub created_by: Option<String>,
}
