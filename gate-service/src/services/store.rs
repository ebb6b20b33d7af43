//! Storage contracts the gate and the approval workflow depend on.
//!
//! The gate only reads entitlements. The approval workflow resolves requests
//! on the queue, which grants the entitlement in the same write. Both go
//! through these traits
//! so the PostgreSQL store and the in-memory store are interchangeable.

use async_trait::async_trait;
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AccessRequest, EntitlementSnapshot, NewAccessRequest, NewSharedProject, ReviewAction,
    SharedProject,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// `Ok(None)` means the user has no entitlement record.
    async fn fetch_snapshot(&self, user_id: &str)
        -> Result<Option<EntitlementSnapshot>, StoreError>;

    /// Admin-management path for the `is_admin` flag. Returns `false` when
    /// the user has no record.
    async fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AccessRequestQueue: Send + Sync {
    async fn submit(&self, request: NewAccessRequest) -> Result<AccessRequest, StoreError>;

    /// The request with `id`, only while it is still pending.
    async fn find_pending(&self, id: Uuid) -> Result<Option<AccessRequest>, StoreError>;

    /// Pending requests, newest first.
    async fn list_pending(&self) -> Result<Vec<AccessRequest>, StoreError>;

    /// All requests submitted by `user_id`, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<AccessRequest>, StoreError>;

    /// Apply `action` to a pending request, stamping the reviewer. On
    /// approve the requester's profile is marked premium and paid, created
    /// if missing.
    ///
    /// The pending check, the status write and the grant are one atomic
    /// unit: of two concurrent calls for one id exactly one gets `Some`, the
    /// other `None`, and an `Err` leaves both the request and the profile
    /// untouched.
    async fn resolve(
        &self,
        id: Uuid,
        action: ReviewAction,
        reviewed_by: &str,
    ) -> Result<Option<AccessRequest>, StoreError>;
}

#[async_trait]
pub trait ShareStore: Send + Sync {
    async fn create_share(&self, share: NewSharedProject) -> Result<SharedProject, StoreError>;

    async fn get_share(&self, id: Uuid) -> Result<Option<SharedProject>, StoreError>;

    /// Returns `false` when nothing was deleted.
    async fn delete_share(&self, id: Uuid) -> Result<bool, StoreError>;
}
