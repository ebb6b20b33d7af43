//! In-memory store with fault injection, used by tests and local runs
//! without PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

use crate::models::{
    AccessRequest, AccessRequestStatus, EntitlementSnapshot, NewAccessRequest, NewSharedProject,
    PaymentStatus, ReviewAction, SharedProject,
};
use crate::services::store::{AccessRequestQueue, EntitlementStore, ShareStore, StoreError};

pub struct MemoryStore {
    profiles: Mutex<HashMap<String, EntitlementSnapshot>>,
    requests: Mutex<Vec<AccessRequest>>,
    shares: Mutex<HashMap<Uuid, SharedProject>>,
    unavailable: AtomicBool,
    fail_entitlement_writes: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, StoreError> {
    mutex
        .lock()
        .map_err(|e| StoreError::Unavailable(format!("Memory {} mutex poisoned: {}", name, e)))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            shares: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            fail_entitlement_writes: AtomicBool::new(false),
            latency: Mutex::new(None),
        }
    }

    /// Every call fails with `StoreError::Unavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Only entitlement writes fail while set; reads and the queue still work.
    pub fn set_fail_entitlement_writes(&self, fail: bool) {
        self.fail_entitlement_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay every call, to exercise caller timeouts.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    pub fn insert_snapshot(&self, snapshot: EntitlementSnapshot) {
        if let Ok(mut profiles) = self.profiles.lock() {
            profiles.insert(snapshot.user_id.clone(), snapshot);
        }
    }

    pub fn snapshot(&self, user_id: &str) -> Option<EntitlementSnapshot> {
        self.profiles
            .lock()
            .ok()
            .and_then(|profiles| profiles.get(user_id).cloned())
    }

    /// Request by id regardless of status.
    pub fn request(&self, id: Uuid) -> Option<AccessRequest> {
        self.requests
            .lock()
            .ok()
            .and_then(|requests| requests.iter().find(|r| r.id == id).cloned())
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    async fn enter(&self) -> Result<(), StoreError> {
        let latency = self.latency.lock().ok().and_then(|guard| *guard);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn newest_first(mut requests: Vec<AccessRequest>) -> Vec<AccessRequest> {
        // Reverse first so equal timestamps keep latest-inserted first.
        requests.reverse();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests
    }
}

#[async_trait]
impl EntitlementStore for MemoryStore {
    async fn fetch_snapshot(
        &self,
        user_id: &str,
    ) -> Result<Option<EntitlementSnapshot>, StoreError> {
        self.enter().await?;
        Ok(lock(&self.profiles, "profiles")?.get(user_id).cloned())
    }

    async fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<bool, StoreError> {
        self.enter().await?;
        if self.fail_entitlement_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "entitlement writes disabled".to_string(),
            ));
        }

        let mut profiles = lock(&self.profiles, "profiles")?;
        match profiles.get_mut(user_id) {
            Some(profile) => {
                profile.is_admin = is_admin;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.enter().await
    }
}

#[async_trait]
impl AccessRequestQueue for MemoryStore {
    async fn submit(&self, request: NewAccessRequest) -> Result<AccessRequest, StoreError> {
        self.enter().await?;
        let record = AccessRequest {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            user_email: request.user_email,
            payment_confirmation: request.payment_confirmation,
            status: AccessRequestStatus::Pending.as_str().to_string(),
            requested_at: request.requested_at,
            created_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
        };
        lock(&self.requests, "requests")?.push(record.clone());
        Ok(record)
    }

    async fn find_pending(&self, id: Uuid) -> Result<Option<AccessRequest>, StoreError> {
        self.enter().await?;
        Ok(lock(&self.requests, "requests")?
            .iter()
            .find(|r| r.id == id && r.status() == AccessRequestStatus::Pending)
            .cloned())
    }

    async fn list_pending(&self) -> Result<Vec<AccessRequest>, StoreError> {
        self.enter().await?;
        let pending = lock(&self.requests, "requests")?
            .iter()
            .filter(|r| r.status() == AccessRequestStatus::Pending)
            .cloned()
            .collect();
        Ok(Self::newest_first(pending))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<AccessRequest>, StoreError> {
        self.enter().await?;
        let own = lock(&self.requests, "requests")?
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(own))
    }

    async fn resolve(
        &self,
        id: Uuid,
        action: ReviewAction,
        reviewed_by: &str,
    ) -> Result<Option<AccessRequest>, StoreError> {
        self.enter().await?;
        // Check, grant and status write happen under the same guards.
        let mut requests = lock(&self.requests, "requests")?;
        let Some(record) = requests
            .iter_mut()
            .find(|r| r.id == id && !r.status().is_terminal())
        else {
            return Ok(None);
        };

        if action == ReviewAction::Approve {
            if self.fail_entitlement_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable(
                    "entitlement writes disabled".to_string(),
                ));
            }

            let mut profiles = lock(&self.profiles, "profiles")?;
            let profile = profiles
                .entry(record.user_id.clone())
                .or_insert_with(|| EntitlementSnapshot::new(&record.user_id, &record.user_email));
            profile.is_premium = true;
            profile.payment_status = PaymentStatus::Paid.as_str().to_string();
        }

        record.status = action.target_status().as_str().to_string();
        record.reviewed_at = Some(Utc::now());
        record.reviewed_by = Some(reviewed_by.to_string());
        Ok(Some(record.clone()))
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn create_share(&self, share: NewSharedProject) -> Result<SharedProject, StoreError> {
        self.enter().await?;
        let record = SharedProject {
            id: Uuid::new_v4(),
            title: share.title,
            payload: share.payload,
            created_by: share.created_by,
            created_at: Utc::now(),
        };
        lock(&self.shares, "shares")?.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_share(&self, id: Uuid) -> Result<Option<SharedProject>, StoreError> {
        self.enter().await?;
        Ok(lock(&self.shares, "shares")?.get(&id).cloned())
    }

    async fn delete_share(&self, id: Uuid) -> Result<bool, StoreError> {
        self.enter().await?;
        Ok(lock(&self.shares, "shares")?.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_request(user_id: &str) -> NewAccessRequest {
        NewAccessRequest {
            user_id: user_id.to_string(),
            user_email: format!("{}@x.com", user_id),
            payment_confirmation: "txn123".to_string(),
            requested_at: None,
        }
    }

    #[tokio::test]
    async fn resolve_only_succeeds_once() {
        let store = MemoryStore::new();
        let request = store.submit(new_request("u1")).await.unwrap();

        let first = store
            .resolve(request.id, ReviewAction::Approve, "admin")
            .await
            .unwrap();
        let second = store
            .resolve(request.id, ReviewAction::Reject, "admin")
            .await
            .unwrap();

        assert_eq!(first.unwrap().status(), AccessRequestStatus::Approved);
        assert!(second.is_none());
        assert!(store.find_pending(request.id).await.unwrap().is_none());
        assert_eq!(
            store.request(request.id).unwrap().status(),
            AccessRequestStatus::Approved
        );
    }

    #[tokio::test]
    async fn approve_creates_missing_profile() {
        let store = MemoryStore::new();
        let request = store.submit(new_request("u9")).await.unwrap();

        store
            .resolve(request.id, ReviewAction::Approve, "admin")
            .await
            .unwrap();

        let snapshot = store.snapshot("u9").unwrap();
        assert!(snapshot.is_premium);
        assert_eq!(snapshot.payment_status(), PaymentStatus::Paid);
        assert_eq!(snapshot.email, "u9@x.com");
        assert!(!snapshot.is_admin);
    }

    #[tokio::test]
    async fn reject_leaves_entitlement_untouched() {
        let store = MemoryStore::new();
        let request = store.submit(new_request("u1")).await.unwrap();

        let rejected = store
            .resolve(request.id, ReviewAction::Reject, "admin")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(rejected.status(), AccessRequestStatus::Rejected);
        assert!(store.snapshot("u1").is_none());
    }

    #[tokio::test]
    async fn failed_grant_writes_nothing() {
        let store = MemoryStore::new();
        let request = store.submit(new_request("u1")).await.unwrap();
        store.set_fail_entitlement_writes(true);

        let result = store
            .resolve(request.id, ReviewAction::Approve, "admin")
            .await;

        assert!(result.is_err());
        let untouched = store.find_pending(request.id).await.unwrap().unwrap();
        assert!(untouched.reviewed_by.is_none());
        assert!(untouched.reviewed_at.is_none());
        assert!(store.snapshot("u1").is_none());
    }

    #[tokio::test]
    async fn pending_list_is_newest_first() {
        let store = MemoryStore::new();
        let older = store.submit(new_request("u1")).await.unwrap();
        let newer = store.submit(new_request("u2")).await.unwrap();

        let pending = store.list_pending().await.unwrap();

        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, newer.id);
        assert_eq!(pending[1].id, older.id);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert!(store.fetch_snapshot("u1").await.is_err());
        assert!(store.list_pending().await.is_err());
        assert!(store.health_check().await.is_err());
    }
}
