// ABOUTME: In-memory Plan Version Store backed by a tokio RwLock over per-user ledgers
// ABOUTME: Commits apply under one write guard so readers never observe a partial change
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{stale_commit, PlanCommit, PlanStore};
use async_trait::async_trait;
use cadence_core::errors::AppResult;
use cadence_core::models::{AdjustmentRecord, ControlLoop, ControllerState, PlanVersion};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct UserLedger {
    versions: Vec<PlanVersion>,
    records: Vec<AdjustmentRecord>,
    controller: BTreeMap<ControlLoop, ControllerState>,
}

impl UserLedger {
    fn active(&self) -> Option<&PlanVersion> {
        self.versions.iter().rev().find(|v| v.is_active())
    }
}

/// Plan store kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    ledgers: RwLock<HashMap<Uuid, UserLedger>>,
}

impl InMemoryPlanStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn active_plan(&self, user_id: Uuid) -> AppResult<Option<PlanVersion>> {
        let ledgers = self.ledgers.read().await;
        Ok(ledgers
            .get(&user_id)
            .and_then(UserLedger::active)
            .cloned())
    }

    async fn plan_version(&self, user_id: Uuid, version: u32) -> AppResult<Option<PlanVersion>> {
        let ledgers = self.ledgers.read().await;
        Ok(ledgers
            .get(&user_id)
            .and_then(|l| l.versions.iter().find(|v| v.version == version))
            .cloned())
    }

    async fn plan_versions(&self, user_id: Uuid) -> AppResult<Vec<PlanVersion>> {
        let ledgers = self.ledgers.read().await;
        Ok(ledgers
            .get(&user_id)
            .map(|l| l.versions.clone())
            .unwrap_or_default())
    }

    async fn adjustment_records(&self, user_id: Uuid) -> AppResult<Vec<AdjustmentRecord>> {
        let ledgers = self.ledgers.read().await;
        let mut records = ledgers
            .get(&user_id)
            .map(|l| l.records.clone())
            .unwrap_or_default();
        records.sort_by(|a, b| {
            a.to_version
                .cmp(&b.to_version)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(records)
    }

    async fn controller_state(
        &self,
        user_id: Uuid,
        control_loop: ControlLoop,
    ) -> AppResult<ControllerState> {
        let ledgers = self.ledgers.read().await;
        Ok(ledgers
            .get(&user_id)
            .and_then(|l| l.controller.get(&control_loop).copied())
            .unwrap_or_default())
    }

    async fn commit(&self, commit: PlanCommit) -> AppResult<()> {
        commit.check_shape()?;
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers.entry(commit.user_id).or_default();

        let actual = ledger.active().map(|v| v.version);
        if actual != commit.expected_active {
            return Err(stale_commit(commit.user_id, commit.expected_active, actual));
        }

        if let Some(version) = commit.version {
            if let Some(previous) = ledger.versions.iter_mut().find(|v| v.is_active()) {
                previous.status = commit.retire_as;
                previous.valid_until = Some(commit.committed_at);
            }
            ledger.versions.push(version);
        }
        if let Some(record) = commit.record {
            ledger.records.push(record);
        }
        ledger.controller.extend(commit.controller_states);

        debug!(user_id = %commit.user_id, active = ?ledger.active().map(|v| v.version), "commit applied");
        Ok(())
    }
}
