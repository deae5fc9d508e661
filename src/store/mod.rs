// ABOUTME: Plan Version Store abstraction - append-only ledger of plan versions, adjustment records and controller state
// ABOUTME: Exactly one active version per user; every change lands through one atomic commit
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Plan Version Store
//!
//! Logical layout:
//! - plan versions keyed by `(user_id, version)`, at most one `active` per user
//! - adjustment records keyed by `(user_id, from_version, to_version)`, append-only
//! - controller state keyed by `(user_id, loop)`
//!
//! Writers never touch rows directly; they describe the change as a [`PlanCommit`] and the
//! backend applies it all-or-nothing after checking the active version it was computed
//! against.

/// In-memory backend
pub mod memory;
/// `SQLite` backend
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryPlanStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqlitePlanStore;

use async_trait::async_trait;
use cadence_core::errors::{AppError, AppResult};
use cadence_core::models::{
    AdjustmentRecord, ControlLoop, ControllerState, PlanStatus, PlanVersion,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One atomic change to a user's ledger
#[derive(Debug, Clone, PartialEq)]
pub struct PlanCommit {
    /// Owner
    pub user_id: Uuid,
    /// Active version the change was computed against, `None` for a first intake
    pub expected_active: Option<u32>,
    /// New active version, if the change creates one
    pub version: Option<PlanVersion>,
    /// Status given to the replaced version
    pub retire_as: PlanStatus,
    /// Audit record to append
    pub record: Option<AdjustmentRecord>,
    /// Controller states to overwrite
    pub controller_states: BTreeMap<ControlLoop, ControllerState>,
    /// Commit timestamp, stamped as the replaced version's validity end
    pub committed_at: DateTime<Utc>,
}

impl PlanCommit {
    /// Reject malformed commits before a backend touches storage
    ///
    /// # Errors
    ///
    /// Returns an error when the new version is not the next number, is not active,
    /// belongs to another user, or the record belongs to another user.
    pub fn check_shape(&self) -> AppResult<()> {
        if let Some(version) = &self.version {
            let expected_number = self.expected_active.map_or(1, |v| v + 1);
            if version.user_id != self.user_id {
                return Err(AppError::invalid_input("plan version belongs to another user")
                    .with_user_id(self.user_id));
            }
            if version.version != expected_number {
                return Err(AppError::invalid_input(format!(
                    "plan version {} does not follow {:?}",
                    version.version, self.expected_active
                ))
                .with_user_id(self.user_id));
            }
            if version.status != PlanStatus::Active {
                return Err(AppError::invalid_input("new plan version must be active")
                    .with_user_id(self.user_id));
            }
        }
        if self.retire_as == PlanStatus::Active {
            return Err(AppError::invalid_input(
                "replaced version cannot stay active",
            ));
        }
        if let Some(record) = &self.record {
            if record.user_id != self.user_id {
                return Err(AppError::invalid_input("adjustment record belongs to another user")
                    .with_user_id(self.user_id));
            }
        }
        Ok(())
    }
}

/// Stale commit: another writer moved the active version first
pub(crate) fn stale_commit(user_id: Uuid, expected: Option<u32>, actual: Option<u32>) -> AppError {
    AppError::concurrent_reassessment(user_id).with_details(serde_json::json!({
        "expected_active": expected,
        "actual_active": actual,
    }))
}

/// Persistent ledger of plan versions per user
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// The user's active version
    async fn active_plan(&self, user_id: Uuid) -> AppResult<Option<PlanVersion>>;

    /// One version by number
    async fn plan_version(&self, user_id: Uuid, version: u32) -> AppResult<Option<PlanVersion>>;

    /// Every version, ascending
    async fn plan_versions(&self, user_id: Uuid) -> AppResult<Vec<PlanVersion>>;

    /// Every adjustment record, ordered by target version then creation time
    async fn adjustment_records(&self, user_id: Uuid) -> AppResult<Vec<AdjustmentRecord>>;

    /// Persisted controller state, default when the loop has never run
    async fn controller_state(
        &self,
        user_id: Uuid,
        control_loop: ControlLoop,
    ) -> AppResult<ControllerState>;

    /// Apply a commit atomically
    ///
    /// Fails with `CONCURRENT_REASSESSMENT` when the active version differs from
    /// `commit.expected_active`; nothing is written in that case.
    async fn commit(&self, commit: PlanCommit) -> AppResult<()>;
}
