//! Access-request submission and admin review.

use service_core::error::AppError;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::dtos::access_request::SubmitAccessRequest;
use crate::models::{AccessRequest, Identity, ReviewAction};
use crate::services::gate::{AdminCheck, RequestGate};
use crate::services::metrics::record_access_request_operation;
use crate::services::notifier::Notifier;
use crate::services::store::{AccessRequestQueue, EntitlementStore, StoreError};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Admin access required")]
    Forbidden,

    #[error("Access request not found or already processed")]
    NotFound,

    #[error("Invalid action")]
    InvalidArgument(String),

    #[error("Missing required fields")]
    MissingFields,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Unauthorized => {
                AppError::Unauthorized(anyhow::anyhow!("Authentication required"))
            }
            WorkflowError::Forbidden => AppError::Forbidden(anyhow::anyhow!("Admin access required")),
            WorkflowError::NotFound => AppError::NotFound(anyhow::anyhow!(
                "Access request not found or already processed"
            )),
            WorkflowError::InvalidArgument(_) => AppError::BadRequest(anyhow::anyhow!("Invalid action")),
            WorkflowError::MissingFields => {
                AppError::BadRequest(anyhow::anyhow!("Missing required fields"))
            }
            WorkflowError::StoreUnavailable(e) => AppError::from(e),
        }
    }
}

pub struct ApprovalWorkflow {
    gate: Arc<RequestGate>,
    queue: Arc<dyn AccessRequestQueue>,
    entitlements: Arc<dyn EntitlementStore>,
    notifier: Arc<dyn Notifier>,
}

impl ApprovalWorkflow {
    pub fn new(
        gate: Arc<RequestGate>,
        queue: Arc<dyn AccessRequestQueue>,
        entitlements: Arc<dyn EntitlementStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gate,
            queue,
            entitlements,
            notifier,
        }
    }

    /// Admin resolution shared with the gate. A failed lookup denies.
    pub async fn require_admin<'a>(
        &self,
        caller: Option<&'a Identity>,
    ) -> Result<&'a Identity, WorkflowError> {
        let caller = caller.ok_or(WorkflowError::Unauthorized)?;
        match self.gate.check_admin(caller).await {
            AdminCheck::Granted => Ok(caller),
            AdminCheck::Denied | AdminCheck::Unavailable => Err(WorkflowError::Forbidden),
        }
    }

    /// Approve or reject a pending request on behalf of `caller`.
    pub async fn resolve(
        &self,
        caller: Option<&Identity>,
        request_id: &str,
        action: &str,
    ) -> Result<AccessRequest, WorkflowError> {
        let admin = self.require_admin(caller).await?;
        self.review(admin, request_id, action).await
    }

    /// Approve or reject a pending request for an already resolved admin.
    ///
    /// The queue applies the status change and, on approval, the entitlement
    /// grant as one atomic write, so of two concurrent reviews for one id
    /// exactly one succeeds and a failed grant leaves the request pending.
    #[instrument(skip(self, admin), fields(admin_id = %admin.subject))]
    pub async fn review(
        &self,
        admin: &Identity,
        request_id: &str,
        action: &str,
    ) -> Result<AccessRequest, WorkflowError> {
        let id = Uuid::parse_str(request_id.trim()).map_err(|_| WorkflowError::NotFound)?;
        self.queue
            .find_pending(id)
            .await?
            .ok_or(WorkflowError::NotFound)?;

        let action = ReviewAction::from_str(action).map_err(WorkflowError::InvalidArgument)?;

        let resolved = match self.queue.resolve(id, action, &admin.subject).await {
            Ok(Some(resolved)) => resolved,
            Ok(None) => {
                // Another reviewer got there between the read and the write.
                record_access_request_operation(action.as_str(), "conflict");
                return Err(WorkflowError::NotFound);
            }
            Err(e) => {
                error!(request_id = %id, error = %e, "Failed to resolve access request");
                record_access_request_operation(action.as_str(), "error");
                return Err(e.into());
            }
        };

        record_access_request_operation(action.as_str(), "success");
        info!(
            request_id = %id,
            user_id = %resolved.user_id,
            action = action.as_str(),
            "Access request resolved"
        );

        Ok(resolved)
    }

    /// Queue a new pending request and notify operators without waiting.
    #[instrument(skip(self, payload))]
    pub async fn submit(&self, payload: SubmitAccessRequest) -> Result<AccessRequest, WorkflowError> {
        let request = match payload.validate() {
            Ok(()) => payload.into_new_request(),
            Err(_) => None,
        }
        .ok_or_else(|| {
            record_access_request_operation("submit", "invalid");
            WorkflowError::MissingFields
        })?;

        let record = match self.queue.submit(request).await {
            Ok(record) => record,
            Err(e) => {
                record_access_request_operation("submit", "error");
                return Err(e.into());
            }
        };

        record_access_request_operation("submit", "success");
        info!(request_id = %record.id, user_id = %record.user_id, "Access request submitted");

        let notifier = self.notifier.clone();
        let notified = record.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_access_request(&notified).await {
                warn!(request_id = %notified.id, error = %e, "Access request notification failed");
            }
        });

        Ok(record)
    }

    /// Pending requests newest first; a store failure reads as an empty queue.
    pub async fn pending_requests(&self) -> Vec<AccessRequest> {
        match self.queue.list_pending().await {
            Ok(requests) => requests,
            Err(e) => {
                warn!(error = %e, "Failed to list pending access requests");
                Vec::new()
            }
        }
    }

    pub async fn requests_for(&self, caller: &Identity) -> Result<Vec<AccessRequest>, WorkflowError> {
        Ok(self.queue.list_for_user(&caller.subject).await?)
    }

    /// Grant or revoke the admin flag on behalf of `caller`.
    pub async fn set_admin(
        &self,
        caller: Option<&Identity>,
        user_id: &str,
        is_admin: bool,
    ) -> Result<(), WorkflowError> {
        let admin = self.require_admin(caller).await?;
        self.update_admin_flag(admin, user_id, is_admin).await
    }

    /// Returns `NotFound` if the user has no entitlement record.
    #[instrument(skip(self, admin), fields(admin_id = %admin.subject))]
    pub async fn update_admin_flag(
        &self,
        admin: &Identity,
        user_id: &str,
        is_admin: bool,
    ) -> Result<(), WorkflowError> {
        if !self.entitlements.set_admin(user_id, is_admin).await? {
            return Err(WorkflowError::NotFound);
        }

        info!(
            admin_id = %admin.subject,
            user_id = %user_id,
            is_admin,
            "Admin flag updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessRequestStatus, EntitlementSnapshot, NewAccessRequest, PaymentStatus};
    use crate::services::memory::MemoryStore;
    use crate::services::notifier::LogNotifier;
    use crate::services::routes::RouteTable;
    use std::time::Duration;

    fn workflow(store: Arc<MemoryStore>) -> ApprovalWorkflow {
        let gate = Arc::new(RequestGate::new(
            RouteTable::default(),
            Vec::new(),
            store.clone(),
            Duration::from_millis(200),
        ));
        ApprovalWorkflow::new(gate, store.clone(), store, Arc::new(LogNotifier))
    }

    fn store_with_admin() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let mut admin = EntitlementSnapshot::new("admin", "root@x.com");
        admin.is_admin = true;
        store.insert_snapshot(admin);
        store
    }

    async fn pending(store: &MemoryStore, user_id: &str) -> AccessRequest {
        store
            .submit(NewAccessRequest {
                user_id: user_id.to_string(),
                user_email: format!("{}@x.com", user_id),
                payment_confirmation: "txn123".to_string(),
                requested_at: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn approve_grants_paid_access() {
        let store = store_with_admin();
        let request = pending(&store, "u1").await;
        let admin = Identity::new("admin", "root@x.com");

        let resolved = workflow(store.clone())
            .resolve(Some(&admin), &request.id.to_string(), "approve")
            .await
            .unwrap();

        assert_eq!(resolved.status(), AccessRequestStatus::Approved);
        assert_eq!(resolved.reviewed_by.as_deref(), Some("admin"));
        assert!(resolved.reviewed_at.is_some());
        let snapshot = store.snapshot("u1").unwrap();
        assert!(snapshot.is_premium);
        assert_eq!(snapshot.payment_status(), PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn reject_leaves_entitlement_alone() {
        let store = store_with_admin();
        store.insert_snapshot(EntitlementSnapshot::new("u1", "u1@x.com"));
        let request = pending(&store, "u1").await;
        let admin = Identity::new("admin", "root@x.com");

        workflow(store.clone())
            .resolve(Some(&admin), &request.id.to_string(), "reject")
            .await
            .unwrap();

        let snapshot = store.snapshot("u1").unwrap();
        assert!(!snapshot.is_premium);
        assert_eq!(snapshot.payment_status(), PaymentStatus::Unpaid);
        assert_eq!(
            store.request(request.id).unwrap().status(),
            AccessRequestStatus::Rejected
        );
    }

    #[tokio::test]
    async fn second_resolution_is_not_found() {
        let store = store_with_admin();
        let request = pending(&store, "u1").await;
        let admin = Identity::new("admin", "root@x.com");
        let workflow = workflow(store);

        workflow
            .resolve(Some(&admin), &request.id.to_string(), "approve")
            .await
            .unwrap();
        let second = workflow
            .resolve(Some(&admin), &request.id.to_string(), "approve")
            .await;

        assert!(matches!(second, Err(WorkflowError::NotFound)));
    }

    #[tokio::test]
    async fn caller_checks_come_first() {
        let store = store_with_admin();
        store.insert_snapshot(EntitlementSnapshot::new("u1", "u1@x.com"));
        let workflow = workflow(store);

        let anonymous = workflow.resolve(None, "whatever", "approve").await;
        let user = Identity::new("u1", "u1@x.com");
        let non_admin = workflow.resolve(Some(&user), "whatever", "approve").await;

        assert!(matches!(anonymous, Err(WorkflowError::Unauthorized)));
        assert!(matches!(non_admin, Err(WorkflowError::Forbidden)));
    }

    #[tokio::test]
    async fn unknown_action_is_invalid_and_keeps_request_pending() {
        let store = store_with_admin();
        let request = pending(&store, "u1").await;
        let admin = Identity::new("admin", "root@x.com");

        let result = workflow(store.clone())
            .resolve(Some(&admin), &request.id.to_string(), "escalate")
            .await;

        assert!(matches!(result, Err(WorkflowError::InvalidArgument(_))));
        assert_eq!(
            store.request(request.id).unwrap().status(),
            AccessRequestStatus::Pending
        );
    }

    #[tokio::test]
    async fn malformed_id_is_not_found() {
        let store = store_with_admin();
        let admin = Identity::new("admin", "root@x.com");

        let result = workflow(store)
            .resolve(Some(&admin), "not-a-uuid", "approve")
            .await;

        assert!(matches!(result, Err(WorkflowError::NotFound)));
    }

    #[tokio::test]
    async fn failed_grant_keeps_request_pending() {
        let store = store_with_admin();
        let request = pending(&store, "u1").await;
        store.set_fail_entitlement_writes(true);
        let admin = Identity::new("admin", "root@x.com");

        let result = workflow(store.clone())
            .resolve(Some(&admin), &request.id.to_string(), "approve")
            .await;

        assert!(matches!(result, Err(WorkflowError::StoreUnavailable(_))));
        let untouched = store.request(request.id).unwrap();
        assert_eq!(untouched.status(), AccessRequestStatus::Pending);
        assert!(untouched.reviewed_by.is_none());
        assert!(store.snapshot("u1").is_none());

        store.set_fail_entitlement_writes(false);
        let retried = workflow(store.clone())
            .resolve(Some(&admin), &request.id.to_string(), "approve")
            .await
            .unwrap();
        assert_eq!(retried.status(), AccessRequestStatus::Approved);
        assert!(store.snapshot("u1").unwrap().is_premium);
    }

    #[tokio::test]
    async fn rejected_request_stays_rejected_after_failed_approve() {
        let store = store_with_admin();
        let request = pending(&store, "u1").await;
        let admin = Identity::new("admin", "root@x.com");
        let workflow = workflow(store.clone());

        workflow
            .resolve(Some(&admin), &request.id.to_string(), "reject")
            .await
            .unwrap();
        store.set_fail_entitlement_writes(true);
        let late = workflow
            .resolve(Some(&admin), &request.id.to_string(), "approve")
            .await;

        assert!(matches!(late, Err(WorkflowError::NotFound)));
        assert_eq!(
            store.request(request.id).unwrap().status(),
            AccessRequestStatus::Rejected
        );
        assert!(store.snapshot("u1").is_none());
    }

    #[tokio::test]
    async fn missing_confirmation_creates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let payload = SubmitAccessRequest {
            user_id: Some("u1".to_string()),
            user_email: Some("u1@x.com".to_string()),
            payment_confirmation: None,
            requested_at: None,
        };

        let result = workflow(store.clone()).submit(payload).await;

        assert!(matches!(result, Err(WorkflowError::MissingFields)));
        assert_eq!(store.request_count(), 0);
    }

    #[tokio::test]
    async fn pending_requests_swallow_store_errors() {
        let store = Arc::new(MemoryStore::new());
        pending(&store, "u1").await;
        store.set_unavailable(true);

        assert!(workflow(store).pending_requests().await.is_empty());
    }

    #[tokio::test]
    async fn set_admin_requires_existing_record() {
        let store = store_with_admin();
        store.insert_snapshot(EntitlementSnapshot::new("u1", "u1@x.com"));
        let admin = Identity::new("admin", "root@x.com");
        let workflow = workflow(store.clone());

        workflow.set_admin(Some(&admin), "u1", true).await.unwrap();
        let missing = workflow.set_admin(Some(&admin), "nobody", true).await;

        assert!(store.snapshot("u1").unwrap().is_admin);
        assert!(matches!(missing, Err(WorkflowError::NotFound)));
    }
}
