//! SQLite-backed lease store.

use crate::error::{StoreError, StoreResult};
use crate::store::{CommitOutcome, LeaseStore};
use async_trait::async_trait;
use sluice_core::{Lease, LeasePath, LeaseState, LeaseToken};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration as StdDuration;
use time::{Duration, OffsetDateTime};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS leases (
    token TEXT PRIMARY KEY,
    key_id TEXT NOT NULL,
    lease_path TEXT NOT NULL,
    repository TEXT NOT NULL,
    issued TEXT NOT NULL,
    expires TEXT NOT NULL,
    protocol_version INTEGER NOT NULL,
    state TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_leases_repository_state ON leases (repository, state);
CREATE INDEX IF NOT EXISTS idx_leases_state_expires ON leases (state, expires);
"#;

/// Raw lease row as stored.
#[derive(sqlx::FromRow)]
struct LeaseRow {
    token: String,
    key_id: String,
    lease_path: String,
    issued: OffsetDateTime,
    expires: OffsetDateTime,
    protocol_version: i64,
    state: String,
}

impl TryFrom<LeaseRow> for Lease {
    type Error = StoreError;

    fn try_from(row: LeaseRow) -> StoreResult<Self> {
        Ok(Lease {
            token: LeaseToken::parse(&row.token)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            key_id: row.key_id,
            lease_path: LeasePath::parse(&row.lease_path)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            issued: row.issued,
            expires: row.expires,
            protocol_version: row.protocol_version as u32,
            state: LeaseState::parse(&row.state)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        })
    }
}

/// SQLite-based lease store.
///
/// A single-connection pool serializes all writers, so the overlap
/// check and insert in [`new_lease`](LeaseStore::new_lease) execute in
/// one critical section without explicit locking.
pub struct SqliteLeaseStore {
    pool: Pool<Sqlite>,
}

impl SqliteLeaseStore {
    /// Open (and create if missing) the lease database at `path`.
    pub async fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Config(format!("cannot create {parent:?}: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(StdDuration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers; the lease store's
            // critical sections rely on it.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "lease database opened");
        Ok(store)
    }

    async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_lease(&self, token: &LeaseToken) -> StoreResult<Lease> {
        let row = sqlx::query_as::<_, LeaseRow>("SELECT * FROM leases WHERE token = ?")
            .bind(token.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::InvalidToken)?;
        row.try_into()
    }
}

#[async_trait]
impl LeaseStore for SqliteLeaseStore {
    async fn new_lease(
        &self,
        key_id: &str,
        lease_path: &LeasePath,
        protocol_version: u32,
        ttl: Duration,
    ) -> StoreResult<LeaseToken> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.pool.begin().await?;

        // Overlap can only come from the same repository; the index on
        // (repository, state) keeps this scan small.
        let candidates = sqlx::query_as::<_, LeaseRow>(
            "SELECT * FROM leases WHERE repository = ? AND state IN ('active', 'committing')",
        )
        .bind(lease_path.repository())
        .fetch_all(&mut *tx)
        .await?;

        for row in candidates {
            let existing: Lease = row.try_into()?;
            if existing.lease_path.overlaps(lease_path) {
                return Err(StoreError::PathBusy {
                    remaining: existing.remaining(now),
                });
            }
        }

        let lease = Lease::new(key_id, lease_path.clone(), protocol_version, ttl, now);
        sqlx::query(
            r#"
            INSERT INTO leases (token, key_id, lease_path, repository, issued, expires, protocol_version, state)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(lease.token.as_str())
        .bind(&lease.key_id)
        .bind(lease.lease_path.as_str())
        .bind(lease.lease_path.repository())
        .bind(lease.issued)
        .bind(lease.expires)
        .bind(lease.protocol_version as i64)
        .bind(lease.state.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(lease.token)
    }

    async fn get_lease(&self, token: &LeaseToken) -> StoreResult<Lease> {
        self.fetch_lease(token).await
    }

    async fn get_leases(&self) -> StoreResult<HashMap<String, Lease>> {
        let rows = sqlx::query_as::<_, LeaseRow>(
            "SELECT * FROM leases WHERE state IN ('active', 'committing')",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut leases = HashMap::with_capacity(rows.len());
        for row in rows {
            let lease: Lease = row.try_into()?;
            leases.insert(lease.lease_path.as_str().to_string(), lease);
        }
        Ok(leases)
    }

    async fn cancel_lease(&self, token: &LeaseToken) -> StoreResult<()> {
        let lease = self.fetch_lease(token).await?;
        if lease.state != LeaseState::Active {
            return Err(StoreError::InvalidState(lease.state));
        }

        let result =
            sqlx::query("UPDATE leases SET state = 'cancelled' WHERE token = ? AND state = 'active'")
                .bind(token.as_str())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            // Lost a race with the reaper or another canceller.
            let lease = self.fetch_lease(token).await?;
            return Err(StoreError::InvalidState(lease.state));
        }
        Ok(())
    }

    async fn cancel_leases_under(&self, repo_path: &str) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, LeaseRow>("SELECT * FROM leases WHERE state = 'active'")
            .fetch_all(&mut *tx)
            .await?;

        let mut cancelled = 0;
        for row in rows {
            let lease: Lease = row.try_into()?;
            if lease.lease_path.is_under(repo_path) {
                sqlx::query("UPDATE leases SET state = 'cancelled' WHERE token = ?")
                    .bind(lease.token.as_str())
                    .execute(&mut *tx)
                    .await?;
                cancelled += 1;
            }
        }

        tx.commit().await?;
        Ok(cancelled)
    }

    async fn begin_commit(&self, token: &LeaseToken) -> StoreResult<Lease> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LeaseRow>("SELECT * FROM leases WHERE token = ?")
            .bind(token.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::InvalidToken)?;
        let mut lease: Lease = row.try_into()?;

        if lease.state != LeaseState::Active {
            return Err(StoreError::InvalidState(lease.state));
        }
        if lease.is_expired(now) {
            // The reaper owns the expiry transition; just refuse.
            return Err(StoreError::ExpiredLease);
        }

        sqlx::query("UPDATE leases SET state = 'committing' WHERE token = ? AND state = 'active'")
            .bind(token.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        lease.state = LeaseState::Committing;
        Ok(lease)
    }

    async fn finish_commit(&self, token: &LeaseToken, outcome: CommitOutcome) -> StoreResult<()> {
        let target = match outcome {
            CommitOutcome::Success => "committed",
            CommitOutcome::Failure => "cancelled",
        };

        let result = sqlx::query(
            "UPDATE leases SET state = ? WHERE token = ? AND state = 'committing'",
        )
        .bind(target)
        .bind(token.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let lease = self.fetch_lease(token).await?;
            return Err(StoreError::InvalidState(lease.state));
        }
        Ok(())
    }

    async fn reap_expired(&self, now: OffsetDateTime) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE leases SET state = 'expired' \
             WHERE state IN ('active', 'committing') AND expires <= ?",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.pool.close().await;
        Ok(())
    }
}
