// ABOUTME: Shared harness for planner integration tests
// ABOUTME: Scripted progress aggregator, manual clock, goal builders and planner wiring
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::unwrap_used
)]
//! Shared test utilities for `cadence_planner`

use async_trait::async_trait;
use cadence_core::errors::{AppError, AppResult};
use cadence_core::models::{
    AthleteProfile, AvailabilityWindow, DataQuality, Equipment, ExperienceTier, GoalRequest,
    GoalSpec, Objective, ObservedOutcome, Sex,
};
use cadence_planner::config::PlannerConfig;
use cadence_planner::providers::{Clock, ManualClock, ProgressAggregator};
use cadence_planner::store::PlanStore;
use cadence_planner::AdaptivePlanner;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };
        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// Fixed start instant so every run sees the same calendar
pub fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_735_689_600, 0).unwrap()
}

/// One assessment period with the standard catalog
pub fn period() -> Duration {
    Duration::days(14)
}

/// Fully logged period at the given rate and adherence
pub fn observed(rate: f64, adherence: f64) -> ObservedOutcome {
    ObservedOutcome {
        observed_rate_kg_per_week: rate,
        adherence_fraction: adherence,
        data_quality: DataQuality::High,
        logged_days: 14,
        weeks_since_last_deload: 52,
    }
}

/// Aggregator whose answer, latency and availability the test controls
pub struct ScriptedAggregator {
    outcome: Mutex<ObservedOutcome>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
    calls: AtomicUsize,
}

impl ScriptedAggregator {
    pub fn new(outcome: ObservedOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            failing: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_outcome(&self, outcome: ObservedOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: std::time::Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressAggregator for ScriptedAggregator {
    async fn observed_outcome(
        &self,
        _user_id: Uuid,
        _period_start: DateTime<Utc>,
        _period_end: DateTime<Utc>,
    ) -> AppResult<ObservedOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::internal("progress tracker offline"));
        }
        let outcome = *self.outcome.lock().unwrap();
        Ok(outcome)
    }
}

/// Intermediate male lifter asking for a moderate gain on a flexible schedule
pub fn gain_request(user_id: Uuid) -> GoalRequest {
    GoalRequest {
        user_id: Some(user_id),
        objective: Some(Objective::MuscleGain),
        target_rate_kg_per_week: Some(0.25),
        timeline_weeks: Some(12),
        days_per_week: Some(AvailabilityWindow::flexible(3, 4, 2, 5)),
        session_minutes: Some(AvailabilityWindow::flexible(45, 75, 30, 90)),
        equipment: Some(BTreeSet::from([Equipment::Dumbbells, Equipment::Barbell])),
        weekly_budget: Some(150.0),
        profile: Some(AthleteProfile {
            sex: Sex::Male,
            body_mass_kg: 80.0,
            baseline_kcal: 2_700.0,
            experience: ExperienceTier::Intermediate,
        }),
    }
}

pub fn gain_goal(user_id: Uuid) -> GoalSpec {
    GoalSpec::try_from(gain_request(user_id)).unwrap()
}

/// Fat-loss goal asking for more deficit than the calorie floor allows
pub fn aggressive_cut_goal(user_id: Uuid) -> GoalSpec {
    GoalSpec::try_from(GoalRequest {
        objective: Some(Objective::FatLoss),
        target_rate_kg_per_week: Some(-0.5),
        profile: Some(AthleteProfile {
            sex: Sex::Female,
            body_mass_kg: 60.0,
            baseline_kcal: 1_500.0,
            experience: ExperienceTier::Beginner,
        }),
        ..gain_request(user_id)
    })
    .unwrap()
}

/// Planner wired to a store with handles to every collaborator
pub struct Harness {
    pub planner: Arc<AdaptivePlanner>,
    pub store: Arc<dyn PlanStore>,
    pub aggregator: Arc<ScriptedAggregator>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(store: Arc<dyn PlanStore>) -> Self {
        Self::with_config(PlannerConfig::default(), store)
    }

    pub fn with_config(config: PlannerConfig, store: Arc<dyn PlanStore>) -> Self {
        init_test_logging();
        let aggregator = Arc::new(ScriptedAggregator::new(observed(0.25, 0.85)));
        let clock = Arc::new(ManualClock::new(start_time()));
        let planner = AdaptivePlanner::builder(
            config,
            Arc::clone(&store),
            Arc::clone(&aggregator) as Arc<dyn ProgressAggregator>,
        )
        .clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .build()
        .unwrap();
        Self {
            planner: Arc::new(planner),
            store,
            aggregator,
            clock,
        }
    }

    /// Run a feasible intake for a fresh user and return the user id
    pub async fn enrolled_user(&self) -> Uuid {
        let user_id = Uuid::new_v4();
        let outcome = self.planner.intake(gain_goal(user_id)).await.unwrap();
        assert!(outcome.is_feasible());
        user_id
    }

    pub fn advance_period(&self) {
        self.clock.advance(period());
    }
}
