// ABOUTME: SQLite Plan Version Store using sqlx with inline migrations
// ABOUTME: A partial unique index enforces one active version per user; each commit is one transaction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{stale_commit, PlanCommit, PlanStore};
use crate::config::PlannerConfig;
use async_trait::async_trait;
use cadence_core::errors::{AppError, AppResult};
use cadence_core::models::{AdjustmentRecord, ControlLoop, ControllerState, PlanStatus, PlanVersion};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

fn db_error(context: &str, error: sqlx::Error) -> AppError {
    AppError::database(format!("{context}: {error}")).with_source(error)
}

/// Plan store persisted in `SQLite`
#[derive(Debug, Clone)]
pub struct SqlitePlanStore {
    pool: SqlitePool,
}

impl SqlitePlanStore {
    /// Connect and run migrations
    ///
    /// In-memory URLs get a single connection so every query sees the same database.
    ///
    /// # Errors
    ///
    /// Returns a database error if the connection or a migration fails
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| db_error("invalid database URL", e))?
            .create_if_missing(true);
        let pool_options = if database_url.contains(":memory:") {
            // Closing the only connection would drop the database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| db_error("failed to open database", e))?;

        let store = Self { pool };
        store.migrate().await?;
        info!(database_url, "plan store ready");
        Ok(store)
    }

    /// Connect to the store named by `config.database_url`
    ///
    /// # Errors
    ///
    /// Returns a database error if the connection or a migration fails
    pub async fn from_config(config: &PlannerConfig) -> AppResult<Self> {
        Self::connect(&config.database_url).await
    }

    /// Get a reference to the database pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes if missing
    ///
    /// # Errors
    ///
    /// Returns a database error if a statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS plan_versions (
                user_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('active', 'superseded', 'archived')),
                valid_from TEXT NOT NULL,
                valid_until TEXT,
                body TEXT NOT NULL,
                PRIMARY KEY (user_id, version)
            )
            ",
            r"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_plan_versions_one_active
                ON plan_versions(user_id) WHERE status = 'active'
            ",
            r"
            CREATE TABLE IF NOT EXISTS adjustment_records (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                from_version INTEGER NOT NULL,
                to_version INTEGER NOT NULL,
                outcome TEXT NOT NULL,
                created_at TEXT NOT NULL,
                body TEXT NOT NULL
            )
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_adjustment_records_versions
                ON adjustment_records(user_id, from_version, to_version)
            ",
            r"
            CREATE TABLE IF NOT EXISTS controller_state (
                user_id TEXT NOT NULL,
                control_loop TEXT NOT NULL,
                accumulated_error REAL NOT NULL,
                previous_error REAL NOT NULL,
                weeks_since_last_deload INTEGER NOT NULL,
                PRIMARY KEY (user_id, control_loop)
            )
            ",
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("migration failed", e))?;
        }
        Ok(())
    }

    fn plan_from_row(row: &SqliteRow) -> AppResult<PlanVersion> {
        let body: String = row.try_get("body").map_err(|e| db_error("plan body", e))?;
        let status: String = row.try_get("status").map_err(|e| db_error("plan status", e))?;
        let valid_until: Option<DateTime<Utc>> = row
            .try_get("valid_until")
            .map_err(|e| db_error("plan validity", e))?;

        let mut plan: PlanVersion = serde_json::from_str(&body)?;
        plan.status = PlanStatus::parse(&status).ok_or_else(|| {
            AppError::database(format!("unknown plan status '{status}'"))
                .with_user_id(plan.user_id)
        })?;
        plan.valid_until = valid_until;
        Ok(plan)
    }

    async fn active_version_in(
        tx: &mut Transaction<'_, Sqlite>,
        user_id: Uuid,
    ) -> AppResult<Option<u32>> {
        let row = sqlx::query(
            "SELECT version FROM plan_versions WHERE user_id = ?1 AND status = 'active'",
        )
        .bind(user_id.to_string())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| db_error("failed to read active version", e))?;
        row.map(|r| r.try_get::<u32, _>("version"))
            .transpose()
            .map_err(|e| db_error("active version", e))
    }
}

#[async_trait]
impl PlanStore for SqlitePlanStore {
    async fn active_plan(&self, user_id: Uuid) -> AppResult<Option<PlanVersion>> {
        let row = sqlx::query(
            "SELECT status, valid_until, body FROM plan_versions WHERE user_id = ?1 AND status = 'active'",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("failed to read active plan", e))?;
        row.as_ref().map(Self::plan_from_row).transpose()
    }

    async fn plan_version(&self, user_id: Uuid, version: u32) -> AppResult<Option<PlanVersion>> {
        let row = sqlx::query(
            "SELECT status, valid_until, body FROM plan_versions WHERE user_id = ?1 AND version = ?2",
        )
        .bind(user_id.to_string())
        .bind(version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("failed to read plan version", e))?;
        row.as_ref().map(Self::plan_from_row).transpose()
    }

    async fn plan_versions(&self, user_id: Uuid) -> AppResult<Vec<PlanVersion>> {
        let rows = sqlx::query(
            "SELECT status, valid_until, body FROM plan_versions WHERE user_id = ?1 ORDER BY version ASC",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("failed to list plan versions", e))?;
        rows.iter().map(Self::plan_from_row).collect()
    }

    async fn adjustment_records(&self, user_id: Uuid) -> AppResult<Vec<AdjustmentRecord>> {
        let rows = sqlx::query(
            "SELECT body FROM adjustment_records WHERE user_id = ?1 ORDER BY to_version ASC, created_at ASC",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("failed to list adjustment records", e))?;
        rows.iter()
            .map(|row| {
                let body: String = row
                    .try_get("body")
                    .map_err(|e| db_error("adjustment body", e))?;
                Ok(serde_json::from_str(&body)?)
            })
            .collect()
    }

    async fn controller_state(
        &self,
        user_id: Uuid,
        control_loop: ControlLoop,
    ) -> AppResult<ControllerState> {
        let row = sqlx::query(
            r"
            SELECT accumulated_error, previous_error, weeks_since_last_deload
            FROM controller_state WHERE user_id = ?1 AND control_loop = ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(control_loop.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("failed to read controller state", e))?;

        let Some(row) = row else {
            return Ok(ControllerState::default());
        };
        Ok(ControllerState {
            accumulated_error: row
                .try_get("accumulated_error")
                .map_err(|e| db_error("accumulated_error", e))?,
            previous_error: row
                .try_get("previous_error")
                .map_err(|e| db_error("previous_error", e))?,
            weeks_since_last_deload: row
                .try_get("weeks_since_last_deload")
                .map_err(|e| db_error("weeks_since_last_deload", e))?,
        })
    }

    async fn commit(&self, commit: PlanCommit) -> AppResult<()> {
        commit.check_shape()?;
        let user = commit.user_id.to_string();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("failed to begin commit", e))?;

        let actual = Self::active_version_in(&mut tx, commit.user_id).await?;
        if actual != commit.expected_active {
            // Dropping the transaction rolls it back
            return Err(stale_commit(commit.user_id, commit.expected_active, actual));
        }

        if let Some(version) = &commit.version {
            sqlx::query(
                r"
                UPDATE plan_versions SET status = ?1, valid_until = ?2
                WHERE user_id = ?3 AND status = 'active'
                ",
            )
            .bind(commit.retire_as.as_str())
            .bind(commit.committed_at)
            .bind(&user)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("failed to retire active version", e))?;

            sqlx::query(
                r"
                INSERT INTO plan_versions (user_id, version, status, valid_from, valid_until, body)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(&user)
            .bind(version.version)
            .bind(version.status.as_str())
            .bind(version.valid_from)
            .bind(version.valid_until)
            .bind(serde_json::to_string(version)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("failed to insert plan version", e))?;
        }

        if let Some(record) = &commit.record {
            sqlx::query(
                r"
                INSERT INTO adjustment_records (id, user_id, from_version, to_version, outcome, created_at, body)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(record.id.to_string())
            .bind(&user)
            .bind(record.from_version)
            .bind(record.to_version)
            .bind(record.outcome.as_str())
            .bind(record.created_at)
            .bind(serde_json::to_string(record)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("failed to append adjustment record", e))?;
        }

        for (control_loop, state) in &commit.controller_states {
            sqlx::query(
                r"
                INSERT INTO controller_state
                    (user_id, control_loop, accumulated_error, previous_error, weeks_since_last_deload)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (user_id, control_loop) DO UPDATE SET
                    accumulated_error = excluded.accumulated_error,
                    previous_error = excluded.previous_error,
                    weeks_since_last_deload = excluded.weeks_since_last_deload
                ",
            )
            .bind(&user)
            .bind(control_loop.as_str())
            .bind(state.accumulated_error)
            .bind(state.previous_error)
            .bind(state.weeks_since_last_deload)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("failed to save controller state", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("failed to commit", e))?;
        debug!(user_id = %commit.user_id, new_version = ?commit.version.as_ref().map(|v| v.version), "commit applied");
        Ok(())
    }
}
