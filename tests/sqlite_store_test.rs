// ABOUTME: Integration tests for the SQLite plan store
// ABOUTME: Full planner flow on sqlite, rejected progress data, stale and malformed commits, reconnects
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![cfg(feature = "sqlite")]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use cadence_core::errors::ErrorCode;
use cadence_core::models::{
    AdjustmentOutcome, ControlLoop, ControllerState, PlanStatus, PlanVersion, ReassessmentTrigger,
};
use cadence_planner::config::PlannerConfig;
use cadence_planner::store::{PlanCommit, PlanStore, SqlitePlanStore};
use common::{observed, Harness};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

async fn memory_store() -> Arc<SqlitePlanStore> {
    Arc::new(SqlitePlanStore::connect("sqlite::memory:").await.unwrap())
}

#[tokio::test]
async fn test_planner_flow_on_sqlite() {
    let store = memory_store().await;
    let h = Harness::new(Arc::clone(&store) as Arc<dyn PlanStore>);
    let user_id = h.enrolled_user().await;

    h.aggregator.set_outcome(observed(0.15, 0.85));
    h.advance_period();
    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(record.outcome, AdjustmentOutcome::Applied);

    let history = h.planner.history(user_id).await.unwrap();
    assert_eq!(history.versions.len(), 2);
    assert_eq!(history.versions[0].status, PlanStatus::Superseded);
    assert_eq!(history.versions[0].valid_until, Some(history.versions[1].valid_from));
    assert_eq!(history.versions[1].status, PlanStatus::Active);
    assert_eq!(history.adjustments.len(), 1);
    assert_eq!(history.adjustments[0].id, record.id);
    assert_eq!(history.adjustments[0].outcome, AdjustmentOutcome::Applied);
    assert_eq!(history.adjustments[0].new_volume, record.new_volume);

    let state = store
        .controller_state(user_id, ControlLoop::Calorie)
        .await
        .unwrap();
    assert_eq!(state, record.calorie_step.unwrap().new_state);

    let again = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Manual)
        .await
        .unwrap();
    assert_eq!(again.outcome, AdjustmentOutcome::AlreadyApplied);
}

#[tokio::test]
async fn test_non_finite_progress_never_reaches_sqlite() {
    let store = memory_store().await;
    let h = Harness::new(Arc::clone(&store) as Arc<dyn PlanStore>);
    let user_id = h.enrolled_user().await;

    h.aggregator.set_outcome(observed(f64::NAN, 0.85));
    h.advance_period();
    let err = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::AggregationUnavailable);
    assert_eq!(store.plan_versions(user_id).await.unwrap().len(), 1);
    assert!(store.adjustment_records(user_id).await.unwrap().is_empty());

    // Next tick with real data commits normally
    h.aggregator.set_outcome(observed(0.15, 0.85));
    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(record.outcome, AdjustmentOutcome::Applied);
    let state = store
        .controller_state(user_id, ControlLoop::Calorie)
        .await
        .unwrap();
    assert!(state.accumulated_error.is_finite());
    assert!(state.previous_error.is_finite());
}

#[tokio::test]
async fn test_stale_commit_is_rejected_atomically() {
    let store = memory_store().await;
    let h = Harness::new(Arc::clone(&store) as Arc<dyn PlanStore>);
    let user_id = h.enrolled_user().await;
    let active = store.active_plan(user_id).await.unwrap().unwrap();

    // Computed against a version that is no longer active
    let stale = PlanCommit {
        user_id,
        expected_active: Some(7),
        version: Some(PlanVersion {
            version: 8,
            ..active.clone()
        }),
        retire_as: PlanStatus::Superseded,
        record: None,
        controller_states: BTreeMap::from([(
            ControlLoop::Calorie,
            ControllerState {
                accumulated_error: 1.0,
                ..ControllerState::default()
            },
        )]),
        committed_at: active.valid_from,
    };
    let err = store.commit(stale).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ConcurrentReassessment);

    assert_eq!(store.active_plan(user_id).await.unwrap(), Some(active));
    assert_eq!(store.plan_versions(user_id).await.unwrap().len(), 1);
    assert_eq!(
        store
            .controller_state(user_id, ControlLoop::Calorie)
            .await
            .unwrap(),
        ControllerState::default()
    );
}

#[tokio::test]
async fn test_malformed_commit_is_rejected() {
    let store = memory_store().await;
    let h = Harness::new(Arc::clone(&store) as Arc<dyn PlanStore>);
    let user_id = h.enrolled_user().await;
    let active = store.active_plan(user_id).await.unwrap().unwrap();
    let committed_at = active.valid_from;

    let skipping = PlanCommit {
        user_id,
        expected_active: Some(1),
        version: Some(PlanVersion {
            version: 3,
            ..active
        }),
        retire_as: PlanStatus::Superseded,
        record: None,
        controller_states: BTreeMap::new(),
        committed_at,
    };
    let err = store.commit(skipping).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
    assert_eq!(store.plan_versions(user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_file_database_survives_reconnect() {
    let dir = TempDir::new().unwrap();
    let config = PlannerConfig {
        database_url: format!("sqlite://{}", dir.path().join("plans.db").display()),
        ..PlannerConfig::default()
    };

    let user_id = {
        let store = Arc::new(SqlitePlanStore::from_config(&config).await.unwrap());
        let h = Harness::with_config(config.clone(), store as Arc<dyn PlanStore>);
        h.enrolled_user().await
    };

    let reopened = SqlitePlanStore::from_config(&config).await.unwrap();
    let active = reopened.active_plan(user_id).await.unwrap().unwrap();
    assert_eq!(active.version, 1);
    assert_eq!(active.status, PlanStatus::Active);
    assert!(reopened.plan_version(user_id, 2).await.unwrap().is_none());
}
