// ABOUTME: Integration tests for the periodic reassessment loop
// ABOUTME: Applied corrections, bounds clamps, idempotency, insufficient data, timeouts, bad data, locking, deload cycle
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use cadence_core::errors::ErrorCode;
use cadence_core::models::{
    AdjustmentOutcome, AvailabilityWindow, BoundsViolation, ControlLoop, ControllerState,
    Correction, DataQuality, DiagnosticCode, GoalRequest, GoalSpec, MuscleGroup, ObservedOutcome,
    PlanOrigin, PlanStatus, ReassessmentTrigger, TrainingPhase,
};
use cadence_planner::config::PlannerConfig;
use cadence_planner::store::InMemoryPlanStore;
use cadence_planner::PlannerPhase;
use common::{gain_request, observed, Harness};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn harness() -> Harness {
    Harness::new(Arc::new(InMemoryPlanStore::new()))
}

async fn active_count(h: &Harness, user_id: Uuid) -> usize {
    h.planner
        .history(user_id)
        .await
        .unwrap()
        .versions
        .iter()
        .filter(|v| v.status == PlanStatus::Active)
        .count()
}

#[tokio::test]
async fn test_under_target_gain_raises_calories() {
    let h = harness();
    let user_id = h.enrolled_user().await;
    let before = h.planner.active_plan(user_id).await.unwrap();
    assert!((before.variables.daily_calories - 2_975.0).abs() < f64::EPSILON);

    h.aggregator.set_outcome(observed(0.15, 0.85));
    h.advance_period();
    assert_eq!(
        h.planner.phase(user_id).await.unwrap(),
        PlannerPhase::AwaitingReassessment
    );

    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();

    assert_eq!(record.outcome, AdjustmentOutcome::Applied);
    assert_eq!((record.from_version, record.to_version), (1, 2));
    assert_eq!(record.period_start, before.valid_from);
    assert_eq!(record.period_end, before.valid_from + common::period());
    assert!((record.calorie_delta() - 50.0).abs() < f64::EPSILON);
    assert!((record.confidence - 1.0).abs() < f64::EPSILON);
    assert_eq!(record.new_volume, before.variables.weekly_volume);
    assert!(record.bounds_notes.is_empty());
    assert!(record.rationale.contains("Calories +50 kcal/day"));

    let calorie_step = record.calorie_step.unwrap();
    assert_eq!(calorie_step.correction, Correction::Delta { amount: 50.0 });

    let active = h.planner.active_plan(user_id).await.unwrap();
    assert_eq!(active.version, 2);
    assert_eq!(active.origin, PlanOrigin::Reassessment);
    assert!((active.variables.daily_calories - 3_025.0).abs() < f64::EPSILON);
    assert_eq!(active.goal.timeline_weeks(), 10);

    let history = h.planner.history(user_id).await.unwrap();
    assert_eq!(history.versions[0].status, PlanStatus::Superseded);
    assert_eq!(history.versions[0].valid_until, Some(active.valid_from));
    assert_eq!(history.adjustments, vec![record]);
    assert_eq!(active_count(&h, user_id).await, 1);

    let state = h
        .store
        .controller_state(user_id, ControlLoop::Calorie)
        .await
        .unwrap();
    assert!((state.previous_error - 0.1).abs() < 1e-9);
    assert_eq!(h.planner.phase(user_id).await.unwrap(), PlannerPhase::Active);
}

#[tokio::test]
async fn test_second_trigger_in_same_period_is_idempotent() {
    let h = harness();
    let user_id = h.enrolled_user().await;
    h.aggregator.set_outcome(observed(0.15, 0.85));
    h.advance_period();

    let first = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(first.outcome, AdjustmentOutcome::Applied);

    h.clock.advance(chrono::Duration::days(2));
    for trigger in [ReassessmentTrigger::Scheduled, ReassessmentTrigger::Manual] {
        let again = h.planner.reassess(user_id, trigger).await.unwrap();
        assert_eq!(again.outcome, AdjustmentOutcome::AlreadyApplied);
        assert_eq!((again.from_version, again.to_version), (2, 2));
    }

    assert_eq!(h.aggregator.calls(), 1);
    let history = h.planner.history(user_id).await.unwrap();
    assert_eq!(history.versions.len(), 2);
    assert_eq!(history.adjustments.len(), 1);
}

#[tokio::test]
async fn test_scheduled_tick_before_period_end_is_not_due() {
    let h = harness();
    let user_id = h.enrolled_user().await;
    h.clock.advance(chrono::Duration::days(3));

    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(record.outcome, AdjustmentOutcome::NotDue);
    assert_eq!(record.to_version, 1);
    assert_eq!(h.aggregator.calls(), 0);
    assert!(h
        .planner
        .history(user_id)
        .await
        .unwrap()
        .adjustments
        .is_empty());
}

#[tokio::test]
async fn test_manual_trigger_opens_early_window_after_intake() {
    let h = harness();
    let user_id = h.enrolled_user().await;
    h.clock.advance(chrono::Duration::days(10));

    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Manual)
        .await
        .unwrap();
    assert!(record.outcome.consumes_period());
    assert_eq!(record.period_start, common::start_time());
    assert_eq!(h.aggregator.calls(), 1);
}

#[tokio::test]
async fn test_insufficient_data_keeps_version_and_records_period() {
    let h = harness();
    let user_id = h.enrolled_user().await;
    h.aggregator.set_outcome(cadence_core::models::ObservedOutcome {
        logged_days: 3,
        data_quality: DataQuality::Low,
        ..observed(0.0, 0.4)
    });
    h.advance_period();

    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(record.outcome, AdjustmentOutcome::InsufficientData);
    assert_eq!((record.from_version, record.to_version), (1, 1));
    assert!(record.calorie_step.is_none());
    assert!(record.rationale.contains("Only 3 of 14 days"));

    let history = h.planner.history(user_id).await.unwrap();
    assert_eq!(history.versions.len(), 1);
    assert_eq!(history.adjustments.len(), 1);
    for control_loop in ControlLoop::ALL {
        let state = h
            .store
            .controller_state(user_id, control_loop)
            .await
            .unwrap();
        assert_eq!(state, Default::default());
    }

    let again = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(again.outcome, AdjustmentOutcome::AlreadyApplied);
}

#[tokio::test]
async fn test_aggregation_timeout_leaves_plan_untouched() {
    let config = PlannerConfig {
        aggregation_timeout: Duration::from_millis(50),
        ..PlannerConfig::default()
    };
    let h = Harness::with_config(config, Arc::new(InMemoryPlanStore::new()));
    let user_id = h.enrolled_user().await;
    h.aggregator.set_delay(Duration::from_millis(500));
    h.advance_period();

    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(record.outcome, AdjustmentOutcome::AggregationTimedOut);
    assert_eq!(record.to_version, 1);

    let history = h.planner.history(user_id).await.unwrap();
    assert_eq!(history.versions.len(), 1);
    assert!(history.adjustments.is_empty());

    // Next tick succeeds once the aggregator responds in time
    h.aggregator.set_delay(Duration::ZERO);
    h.aggregator.set_outcome(observed(0.15, 0.85));
    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(record.outcome, AdjustmentOutcome::Applied);
}

#[tokio::test]
async fn test_aggregator_failure_is_retryable() {
    let h = harness();
    let user_id = h.enrolled_user().await;
    h.aggregator.set_failing(true);
    h.advance_period();

    let err = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::AggregationUnavailable);
    assert!(err.is_retryable());
    assert_eq!(h.planner.active_plan(user_id).await.unwrap().version, 1);

    h.aggregator.set_failing(false);
    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert!(record.outcome.consumes_period());
}

#[tokio::test]
async fn test_reassessment_without_plan_is_not_found() {
    let h = harness();
    let err = h
        .planner
        .reassess(Uuid::new_v4(), ReassessmentTrigger::Manual)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_reassessment_is_rejected() {
    let h = harness();
    let user_id = h.enrolled_user().await;
    h.aggregator.set_outcome(observed(0.15, 0.85));
    h.aggregator.set_delay(Duration::from_millis(300));
    h.advance_period();

    let planner = Arc::clone(&h.planner);
    let first = tokio::spawn(async move {
        planner
            .reassess(user_id, ReassessmentTrigger::Scheduled)
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        h.planner.phase(user_id).await.unwrap(),
        PlannerPhase::Reassessing
    );
    let err = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Manual)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConcurrentReassessment);
    assert!(err.is_retryable());
    let err = h
        .planner
        .intake(common::gain_goal(user_id))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConcurrentReassessment);

    let record = first.await.unwrap().unwrap();
    assert_eq!(record.outcome, AdjustmentOutcome::Applied);
    assert_eq!(active_count(&h, user_id).await, 1);
    assert_eq!(h.planner.active_plan(user_id).await.unwrap().version, 2);
}

#[tokio::test]
async fn test_on_target_period_records_no_change() {
    let h = harness();
    let user_id = h.enrolled_user().await;
    h.advance_period();

    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(record.outcome, AdjustmentOutcome::NoChange);
    assert_eq!((record.from_version, record.to_version), (1, 1));
    assert!(record.calorie_delta().abs() < f64::EPSILON);

    let volume = h
        .store
        .controller_state(user_id, ControlLoop::Volume)
        .await
        .unwrap();
    assert_eq!(volume.weeks_since_last_deload, 2);
}

#[tokio::test]
async fn test_deload_then_restoration() {
    let h = harness();
    let user_id = h.enrolled_user().await;
    let baseline = h.planner.active_plan(user_id).await.unwrap();

    // Weeks since deload: 2, 4, 6
    for _ in 0..3 {
        h.advance_period();
        let record = h
            .planner
            .reassess(user_id, ReassessmentTrigger::Scheduled)
            .await
            .unwrap();
        assert_eq!(record.outcome, AdjustmentOutcome::NoChange);
    }

    h.advance_period();
    let deload = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(deload.outcome, AdjustmentOutcome::Applied);
    assert_eq!(
        deload.volume_step.unwrap().correction,
        Correction::Deload { reduction: 0.5 }
    );
    assert!(deload.rationale.contains("Deload week"));
    let deload_plan = h.planner.active_plan(user_id).await.unwrap();
    assert_eq!(deload_plan.version, 2);
    assert_eq!(deload_plan.phase, TrainingPhase::Deload);
    assert_eq!(deload_plan.variables.weekly_volume[&MuscleGroup::Chest], 6);
    assert_eq!(deload_plan.variables.weekly_volume[&MuscleGroup::Core], 3);
    assert_eq!(
        h.store
            .controller_state(user_id, ControlLoop::Volume)
            .await
            .unwrap()
            .weeks_since_last_deload,
        0
    );

    h.advance_period();
    let restored = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(restored.outcome, AdjustmentOutcome::Applied);
    assert!(restored.rationale.contains("restored from version 1"));
    let active = h.planner.active_plan(user_id).await.unwrap();
    assert_eq!(active.version, 3);
    assert_eq!(active.phase, TrainingPhase::Accumulation);
    assert_eq!(
        active.variables.weekly_volume,
        baseline.variables.weekly_volume
    );
    assert_eq!(active_count(&h, user_id).await, 1);
}

#[tokio::test]
async fn test_unusable_progress_data_is_rejected_without_side_effects() {
    let h = harness();
    let user_id = h.enrolled_user().await;
    h.advance_period();

    for reading in [
        observed(f64::NAN, 0.85),
        observed(f64::INFINITY, 0.85),
        observed(0.15, f64::NAN),
        observed(0.15, 1.4),
    ] {
        h.aggregator.set_outcome(reading);
        let err = h
            .planner
            .reassess(user_id, ReassessmentTrigger::Scheduled)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AggregationUnavailable);
        assert!(err.is_retryable());
    }

    let history = h.planner.history(user_id).await.unwrap();
    assert_eq!(history.versions.len(), 1);
    assert!(history.adjustments.is_empty());
    for control_loop in ControlLoop::ALL {
        let state = h
            .store
            .controller_state(user_id, control_loop)
            .await
            .unwrap();
        assert_eq!(state, ControllerState::default());
    }

    // Same period goes through once the tracker reports real numbers
    h.aggregator.set_outcome(observed(0.15, 0.85));
    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(record.outcome, AdjustmentOutcome::Applied);
    let active = h.planner.active_plan(user_id).await.unwrap();
    assert!((active.variables.daily_calories - 3_025.0).abs() < f64::EPSILON);
    assert!(active.variables.satisfies_calorie_identity());
}

#[tokio::test]
async fn test_correction_past_surplus_ceiling_is_clamped_and_noted() {
    let h = harness();
    let user_id = h.enrolled_user().await;
    // Losing weight on a gain plan: error of 1 kg/week drives a 350 kcal raise
    h.aggregator.set_outcome(observed(-0.75, 0.85));
    h.advance_period();

    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();

    assert_eq!(record.outcome, AdjustmentOutcome::Applied);
    assert_eq!(
        record.calorie_step.unwrap().correction,
        Correction::Delta { amount: 350.0 }
    );
    // 2700 kcal baseline with a 15% surplus ceiling, on the 25 kcal grid
    assert!((record.new_calories - 3_100.0).abs() < f64::EPSILON);

    assert_eq!(record.bounds_notes.len(), 1);
    let note = &record.bounds_notes[0];
    assert_eq!(note.code, DiagnosticCode::CalorieBoundsViolated);
    assert_eq!(note.variable, "daily_calories");
    assert!((note.proposed - 3_325.0).abs() < f64::EPSILON);
    assert!((note.clamped_to - 3_100.0).abs() < f64::EPSILON);
    let expected: Vec<_> = record
        .bounds_notes
        .iter()
        .map(BoundsViolation::to_diagnostic)
        .collect();
    assert_eq!(record.diagnostics, expected);
    assert!(record
        .rationale
        .contains("Adjusted to stay within safe bounds: daily_calories"));

    let active = h.planner.active_plan(user_id).await.unwrap();
    assert_eq!(active.version, 2);
    assert!((active.variables.daily_calories - 3_100.0).abs() < f64::EPSILON);
    assert!(active.variables.satisfies_calorie_identity());
    assert_eq!(h.planner.history(user_id).await.unwrap().adjustments, vec![record]);
}

#[tokio::test]
async fn test_high_adherence_guarantees_one_more_set() {
    let h = harness();
    let user_id = Uuid::new_v4();
    // Long sessions leave room above the adaptive midpoint
    let goal = GoalSpec::try_from(GoalRequest {
        session_minutes: Some(AvailabilityWindow::fixed(75, 75)),
        ..gain_request(user_id)
    })
    .unwrap();
    let outcome = h.planner.intake(goal).await.unwrap();
    assert!(outcome.is_feasible());
    let before = h.planner.active_plan(user_id).await.unwrap();

    // Low-confidence data keeps the raw PID step below one set
    h.aggregator.set_outcome(ObservedOutcome {
        data_quality: DataQuality::Low,
        logged_days: 7,
        ..observed(0.25, 0.9)
    });
    h.advance_period();

    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();

    assert_eq!(record.outcome, AdjustmentOutcome::Applied);
    let volume_step = record.volume_step.unwrap();
    assert!(volume_step.overload_floor_applied);
    assert_eq!(volume_step.correction, Correction::Delta { amount: 1.0 });
    assert!(record.bounds_notes.is_empty());
    assert!(record.rationale.contains("progressive overload"));

    let active = h.planner.active_plan(user_id).await.unwrap();
    assert_eq!(active.version, 2);
    assert_eq!(
        active.variables.total_weekly_sets(),
        before.variables.total_weekly_sets() + 1
    );
    let calorie_change = active.variables.daily_calories - before.variables.daily_calories;
    assert!(calorie_change.abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_unchanged_periods_still_shorten_timeline() {
    let h = harness();
    let user_id = h.enrolled_user().await;

    h.advance_period();
    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(record.outcome, AdjustmentOutcome::NoChange);

    h.aggregator.set_outcome(observed(0.15, 0.85));
    h.advance_period();
    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(record.outcome, AdjustmentOutcome::Applied);

    // Four weeks since the 12-week plan started
    let active = h.planner.active_plan(user_id).await.unwrap();
    assert_eq!(active.version, 2);
    assert_eq!(active.goal.timeline_weeks(), 8);
}

#[tokio::test]
async fn test_collapsed_adherence_triggers_early_deload() {
    let h = harness();
    let user_id = h.enrolled_user().await;

    // Two on-target periods put four weeks on the deload counter
    for _ in 0..2 {
        h.advance_period();
        let record = h
            .planner
            .reassess(user_id, ReassessmentTrigger::Scheduled)
            .await
            .unwrap();
        assert_eq!(record.outcome, AdjustmentOutcome::NoChange);
    }

    h.aggregator.set_outcome(observed(0.25, 0.5));
    h.advance_period();
    let record = h
        .planner
        .reassess(user_id, ReassessmentTrigger::Scheduled)
        .await
        .unwrap();
    assert_eq!(record.outcome, AdjustmentOutcome::Applied);
    assert!(record.volume_step.unwrap().correction.is_deload());

    let active = h.planner.active_plan(user_id).await.unwrap();
    assert_eq!(active.phase, TrainingPhase::Deload);
    assert_eq!(active.variables.weekly_volume[&MuscleGroup::Chest], 6);
}
