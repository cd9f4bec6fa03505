use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::params;
use tracing::debug;
use uuid::Uuid;
use vigil::{CheckResult, CheckStore, MonitoredTarget, StoreError, TargetRegistry, User, UserDirectory};

use super::models::{
    TargetSummary, bool_to_i64, check_from_row, target_from_row, timestamp_to_i64, user_from_row,
};
use crate::pool::{LibsqlManager, LibsqlPool};
use crate::validation::validate_target_url;

const TARGET_COLUMNS: &str = "id, owner_id, name, url, status, active";
const CHECK_COLUMNS: &str = "target_id, owner_id, checked_at, success, status_code, latency_ms";

/// libsql-backed registry, check store and user directory
pub struct LibsqlRepository {
    pool: LibsqlPool,
}

impl LibsqlRepository {
    pub fn new(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        self.pool.get().await.map_err(|e| anyhow!("Failed to get database connection: {}", e))
    }

    pub async fn create_user(&self, name: &str, email: &str) -> Result<User> {
        let conn = self.get_conn().await?;
        let user = User { id: Uuid::new_v4(), name: name.to_string(), email: email.to_string() };

        conn.execute(
            "INSERT INTO users (id, name, email, created_at) VALUES (?, ?, ?, ?)",
            params![user.id.to_string(), user.name.clone(), user.email.clone(), timestamp_to_i64(Utc::now())],
        )
        .await?;

        Ok(user)
    }

    /// Register a new active target, assumed up until the first check
    pub async fn create_target(&self, owner_id: Uuid, name: &str, url: &str) -> Result<MonitoredTarget> {
        validate_target_url(url)?;
        self.get_user(owner_id).await?.ok_or_else(|| anyhow!("No user with id {}", owner_id))?;

        let conn = self.get_conn().await?;
        let target = MonitoredTarget::new(owner_id, name, url);
        let now = timestamp_to_i64(Utc::now());

        conn.execute(
            "INSERT INTO targets (id, owner_id, name, url, status, active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                target.id.to_string(),
                target.owner_id.to_string(),
                target.name.clone(),
                target.url.clone(),
                bool_to_i64(target.status.is_up()),
                bool_to_i64(target.active),
                now,
                now
            ],
        )
        .await?;

        Ok(target)
    }

    pub async fn set_active(&self, target_id: Uuid, active: bool) -> Result<()> {
        let conn = self.get_conn().await?;
        let updated = conn
            .execute(
                "UPDATE targets SET active = ?, updated_at = ? WHERE id = ?",
                params![bool_to_i64(active), timestamp_to_i64(Utc::now()), target_id.to_string()],
            )
            .await?;

        if updated == 0 {
            return Err(anyhow!("No target with id {}", target_id));
        }
        Ok(())
    }

    /// Delete a target together with its check history
    pub async fn delete_target(&self, target_id: Uuid) -> Result<u64> {
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        let checks = tx.execute("DELETE FROM checks WHERE target_id = ?", params![target_id.to_string()]).await?;
        let deleted = tx.execute("DELETE FROM targets WHERE id = ?", params![target_id.to_string()]).await?;

        if deleted == 0 {
            tx.rollback().await?;
            return Err(anyhow!("No target with id {}", target_id));
        }

        tx.commit().await?;
        Ok(checks)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT id, name, email FROM users WHERE id = ?", params![user_id.to_string()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(user_from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_target(&self, target_id: Uuid) -> Result<Option<MonitoredTarget>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {} FROM targets WHERE id = ?", TARGET_COLUMNS);
        let mut rows = conn.query(&sql, params![target_id.to_string()]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(target_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Every target, active or not, ordered by name
    pub async fn list_targets(&self) -> Result<Vec<MonitoredTarget>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {} FROM targets ORDER BY name, id", TARGET_COLUMNS);
        let mut rows = conn.query(&sql, ()).await?;

        let mut targets = Vec::new();
        while let Some(row) = rows.next().await? {
            targets.push(target_from_row(&row)?);
        }
        Ok(targets)
    }

    pub async fn list_summaries(&self) -> Result<Vec<TargetSummary>> {
        let mut summaries = Vec::new();
        for target in self.list_targets().await? {
            let last_check = self.recent_checks(target.id, 1).await?.into_iter().next();
            summaries.push(TargetSummary { target, last_check });
        }
        Ok(summaries)
    }

    /// Newest checks of a target first
    pub async fn recent_checks(&self, target_id: Uuid, limit: usize) -> Result<Vec<CheckResult>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM checks WHERE target_id = ? ORDER BY checked_at DESC, id DESC LIMIT ?",
            CHECK_COLUMNS
        );
        let mut rows = conn.query(&sql, params![target_id.to_string(), limit as i64]).await?;

        let mut checks = Vec::new();
        while let Some(row) = rows.next().await? {
            checks.push(check_from_row(&row)?);
        }
        Ok(checks)
    }

    /// Delete checks older than `cutoff`, returning how many were removed
    pub async fn delete_checks_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM checks WHERE checked_at < ?", params![timestamp_to_i64(cutoff)])
            .await?;
        Ok(deleted)
    }
}

#[async_trait]
impl TargetRegistry for LibsqlRepository {
    async fn list_active(&self) -> Result<Vec<MonitoredTarget>, StoreError> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {} FROM targets WHERE active = 1", TARGET_COLUMNS);
        let mut rows = conn.query(&sql, ()).await.map_err(anyhow::Error::from)?;

        let mut targets = Vec::new();
        while let Some(row) = rows.next().await.map_err(anyhow::Error::from)? {
            targets.push(target_from_row(&row)?);
        }
        Ok(targets)
    }

    async fn update_status(&self, target_id: Uuid, success: bool) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        let updated = conn
            .execute(
                "UPDATE targets SET status = ?, updated_at = ? WHERE id = ?",
                params![bool_to_i64(success), timestamp_to_i64(Utc::now()), target_id.to_string()],
            )
            .await
            .map_err(anyhow::Error::from)?;

        if updated == 0 {
            debug!(target_id = %target_id, "Status update for a target that no longer exists");
        }
        Ok(())
    }
}

#[async_trait]
impl CheckStore for LibsqlRepository {
    async fn append(&self, result: &CheckResult) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO checks (target_id, owner_id, checked_at, success, status_code, latency_ms) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                result.target_id.to_string(),
                result.owner_id.to_string(),
                timestamp_to_i64(result.checked_at),
                bool_to_i64(result.success),
                result.status_code as i64,
                result.latency_ms as i64
            ],
        )
        .await
        .map_err(anyhow::Error::from)?;

        Ok(())
    }
}

#[async_trait]
impl UserDirectory for LibsqlRepository {
    async fn find_by_id(&self, user_id: Uuid) -> Result<User, StoreError> {
        self.get_user(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))
    }
}
