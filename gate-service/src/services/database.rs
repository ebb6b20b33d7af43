//! PostgreSQL store for gate-service.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    AccessRequest, AccessRequestStatus, EntitlementSnapshot, NewAccessRequest, NewSharedProject, PaymentStatus,
    ReviewAction, SharedProject,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{AccessRequestQueue, EntitlementStore, ShareStore, StoreError};

const ACCESS_REQUEST_COLUMNS: &str = "id, user_id, user_email, payment_confirmation, status, requested_at, created_at, reviewed_at, reviewed_by";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "gate-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Insert a profile row, used by signup integrations and tests.
    #[instrument(skip(self, snapshot), fields(user_id = %snapshot.user_id))]
    pub async fn upsert_profile(&self, snapshot: &EntitlementSnapshot) -> Result<(), StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_profile"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, email, is_premium, payment_status, is_admin, subscription_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE
            SET email = EXCLUDED.email,
                is_premium = EXCLUDED.is_premium,
                payment_status = EXCLUDED.payment_status,
                is_admin = EXCLUDED.is_admin,
                subscription_expires_at = EXCLUDED.subscription_expires_at,
                updated_utc = NOW()
            "#,
        )
        .bind(&snapshot.user_id)
        .bind(&snapshot.email)
        .bind(snapshot.is_premium)
        .bind(snapshot.payment_status().as_str())
        .bind(snapshot.is_admin)
        .bind(snapshot.subscription_expires_at)
        .execute(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(())
    }
}

#[async_trait]
impl EntitlementStore for Database {
    #[instrument(skip(self))]
    async fn fetch_snapshot(
        &self,
        user_id: &str,
    ) -> Result<Option<EntitlementSnapshot>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["fetch_snapshot"])
            .start_timer();

        let snapshot = sqlx::query_as::<_, EntitlementSnapshot>(
            r#"
            SELECT user_id, email, is_premium, payment_status, is_admin, subscription_expires_at
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    async fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<bool, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_admin"])
            .start_timer();

        let result = sqlx::query(
            "UPDATE profiles SET is_admin = $2, updated_utc = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(is_admin)
        .execute(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1").execute(&self.pool).await?;

        timer.observe_duration();
        Ok(())
    }
}

#[async_trait]
impl AccessRequestQueue for Database {
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    async fn submit(&self, request: NewAccessRequest) -> Result<AccessRequest, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["submit_access_request"])
            .start_timer();

        let record = sqlx::query_as::<_, AccessRequest>(&format!(
            r#"
            INSERT INTO access_requests (id, user_id, user_email, payment_confirmation, status, requested_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ACCESS_REQUEST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&request.user_id)
        .bind(&request.user_email)
        .bind(&request.payment_confirmation)
        .bind(AccessRequestStatus::Pending.as_str())
        .bind(request.requested_at)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();
        info!(request_id = %record.id, "Access request queued");
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn find_pending(&self, id: Uuid) -> Result<Option<AccessRequest>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_pending_access_request"])
            .start_timer();

        let record = sqlx::query_as::<_, AccessRequest>(&format!(
            "SELECT {ACCESS_REQUEST_COLUMNS} FROM access_requests WHERE id = $1 AND status = 'pending'"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn list_pending(&self) -> Result<Vec<AccessRequest>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_pending_access_requests"])
            .start_timer();

        let records = sqlx::query_as::<_, AccessRequest>(&format!(
            "SELECT {ACCESS_REQUEST_COLUMNS} FROM access_requests WHERE status = 'pending' ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<AccessRequest>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_user_access_requests"])
            .start_timer();

        let records = sqlx::query_as::<_, AccessRequest>(&format!(
            "SELECT {ACCESS_REQUEST_COLUMNS} FROM access_requests WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(records)
    }

    #[instrument(skip(self, action), fields(action = action.as_str()))]
    async fn resolve(
        &self,
        id: Uuid,
        action: ReviewAction,
        reviewed_by: &str,
    ) -> Result<Option<AccessRequest>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["resolve_access_request"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        // The status predicate makes this a compare-and-swap.
        let record = sqlx::query_as::<_, AccessRequest>(&format!(
            r#"
            UPDATE access_requests
            SET status = $2, reviewed_at = NOW(), reviewed_by = $3
            WHERE id = $1 AND status = 'pending'
            RETURNING {ACCESS_REQUEST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(action.target_status().as_str())
        .bind(reviewed_by)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = record else {
            tx.rollback().await.ok();
            timer.observe_duration();
            return Ok(None);
        };

        if action == ReviewAction::Approve {
            sqlx::query(
                r#"
                INSERT INTO profiles (user_id, email, is_premium, payment_status)
                VALUES ($1, $2, TRUE, $3)
                ON CONFLICT (user_id) DO UPDATE
                SET is_premium = TRUE, payment_status = $3, updated_utc = NOW()
                "#,
            )
            .bind(&record.user_id)
            .bind(&record.user_email)
            .bind(PaymentStatus::Paid.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        timer.observe_duration();
        info!(
            request_id = %id,
            user_id = %record.user_id,
            status = action.target_status().as_str(),
            "Access request resolved"
        );
        Ok(Some(record))
    }
}

#[async_trait]
impl ShareStore for Database {
    #[instrument(skip(self, share))]
    async fn create_share(&self, share: NewSharedProject) -> Result<SharedProject, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_share"])
            .start_timer();

        let record = sqlx::query_as::<_, SharedProject>(
            r#"
            INSERT INTO shared_projects (id, title, payload, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, payload, created_by, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&share.title)
        .bind(&share.payload)
        .bind(&share.created_by)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn get_share(&self, id: Uuid) -> Result<Option<SharedProject>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_share"])
            .start_timer();

        let record = sqlx::query_as::<_, SharedProject>(
            "SELECT id, title, payload, created_by, created_at FROM shared_projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn delete_share(&self, id: Uuid) -> Result<bool, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_share"])
            .start_timer();

        let result = sqlx::query("DELETE FROM shared_projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }
}
