// ABOUTME: Reassessment Orchestrator - drives one user's periodic loop from aggregation to committed plan version
// ABOUTME: Per-user locking, period idempotency, aggregation timeout, PID corrections, tolerant clamping, deload restoration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Reassessment Orchestrator
//!
//! One call walks `AwaitingReassessment -> Reassessing -> Active(v+1)`:
//!
//! 1. take the user's lock without waiting
//! 2. resolve the assessment window from the lineage anchor (latest intake or latest
//!    period-consuming reassessment) and return a no-op record when nothing is due
//! 3. aggregate progress under a timeout
//! 4. skip the correction when too few days were logged
//! 5. run both controller loops, apply the corrections to the active version, clamp the
//!    candidate into bounds
//! 6. commit version, record and controller state in one store operation
//!
//! Anything failing before step 6 leaves the active version untouched.

use crate::config::PlannerConfig;
use crate::locks::{ReassessmentGuard, ReassessmentLocks};
use crate::providers::{BoundsProvider, Clock, ProgressAggregator};
use crate::store::{PlanCommit, PlanStore};
use cadence_core::bounds::BoundsCatalog;
use cadence_core::errors::{AppError, AppResult};
use cadence_core::models::{
    AdjustmentOutcome, AdjustmentRecord, BoundsViolation, ControlLoop, ControllerStep, Correction,
    DataQuality, DecisionVariables, MuscleGroup, ObservedOutcome, PlanOrigin, PlanStatus,
    PlanVersion, ReassessmentTrigger, TrainingPhase,
};
use cadence_intelligence::controller::{adjust, observation_confidence, Observation};
use cadence_intelligence::solver::{FeasibilitySolver, TolerantCheck, TolerantOutcome};
use cadence_intelligence::trend::classify_trend;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where the current assessment cadence is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lineage {
    /// Start of the open assessment period
    pub anchor: DateTime<Utc>,
    /// Whether the anchor comes from a reassessment that already consumed a period
    pub consumed: bool,
}

/// What a trigger arriving now should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Schedule {
    /// Assess `[start, end]`
    Due {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Scheduled tick before the period elapsed
    NotDue { next_due: DateTime<Utc> },
    /// The open period already has a consuming reassessment
    AlreadyApplied { next_due: DateTime<Utc> },
}

impl Lineage {
    /// Anchor of the latest intake lineage, `None` before the first intake
    pub fn resolve(versions: &[PlanVersion], records: &[AdjustmentRecord]) -> Option<Self> {
        let intake = versions
            .iter()
            .rev()
            .find(|v| v.origin == PlanOrigin::Intake)?;
        let last_consumed = records
            .iter()
            .filter(|r| r.from_version >= intake.version && r.outcome.consumes_period())
            .map(|r| r.period_end)
            .max();
        Some(match last_consumed {
            Some(end) => Self {
                anchor: end.max(intake.valid_from),
                consumed: true,
            },
            None => Self {
                anchor: intake.valid_from,
                consumed: false,
            },
        })
    }

    /// Decide what a trigger at `now` should do
    ///
    /// A due window covers at most the last `period`. A manual trigger may open an early
    /// window right after intake; once a period has been consumed every trigger waits for
    /// the next boundary.
    pub fn schedule(
        &self,
        now: DateTime<Utc>,
        period: Duration,
        trigger: ReassessmentTrigger,
    ) -> Schedule {
        let next_due = self.anchor + period;
        if now >= next_due {
            return Schedule::Due {
                start: self.anchor.max(now - period),
                end: now,
            };
        }
        if self.consumed {
            return Schedule::AlreadyApplied { next_due };
        }
        match trigger {
            ReassessmentTrigger::Manual => Schedule::Due {
                start: self.anchor,
                end: now,
            },
            ReassessmentTrigger::Scheduled => Schedule::NotDue { next_due },
        }
    }
}

/// Volumes cut for a deload, keeping `1 - reduction` of each muscle's sets
pub(crate) fn deload_volume(
    volume: &BTreeMap<MuscleGroup, u32>,
    reduction: f64,
) -> BTreeMap<MuscleGroup, u32> {
    let keep = (1.0 - reduction).clamp(0.0, 1.0);
    volume
        .iter()
        .map(|(muscle, sets)| (*muscle, (f64::from(*sets) * keep).round() as u32))
        .collect()
}

/// Spread a whole-set weekly change across muscles in proportion to their current sets
///
/// Largest-remainder apportionment keeps the total exact; ties go to the earlier muscle.
pub(crate) fn distribute_sets(
    volume: &BTreeMap<MuscleGroup, u32>,
    amount: i64,
) -> BTreeMap<MuscleGroup, u32> {
    if amount == 0 || volume.is_empty() {
        return volume.clone();
    }
    let magnitude = amount.unsigned_abs();
    let total: u64 = volume.values().map(|s| u64::from(*s)).sum();
    let weights: Vec<u64> = volume
        .values()
        .map(|s| if total == 0 { 1 } else { u64::from(*s) })
        .collect();
    let weight_sum: u64 = weights.iter().sum();

    let mut shares: Vec<(u64, u64)> = weights
        .iter()
        .map(|w| (magnitude * w / weight_sum, magnitude * w % weight_sum))
        .collect();
    let assigned: u64 = shares.iter().map(|(share, _)| share).sum();
    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|a, b| shares[*b].1.cmp(&shares[*a].1).then(a.cmp(b)));
    for idx in order.into_iter().take((magnitude - assigned) as usize) {
        shares[idx].0 += 1;
    }

    volume
        .iter()
        .zip(shares)
        .map(|((muscle, sets), (share, _))| {
            let share = u32::try_from(share).unwrap_or(u32::MAX);
            let sets = if amount > 0 {
                sets.saturating_add(share)
            } else {
                sets.saturating_sub(share)
            };
            (*muscle, sets)
        })
        .collect()
}

/// Runs reassessments for any number of users
pub struct ReassessmentOrchestrator {
    store: Arc<dyn PlanStore>,
    aggregator: Arc<dyn ProgressAggregator>,
    bounds: Arc<dyn BoundsProvider>,
    clock: Arc<dyn Clock>,
    locks: Arc<ReassessmentLocks>,
    config: Arc<PlannerConfig>,
}

/// Controller output for one period, before it becomes a plan
struct PeriodCorrections {
    calorie: ControllerStep,
    volume: ControllerStep,
    confidence: f64,
}

impl ReassessmentOrchestrator {
    /// Wire the orchestrator to its collaborators
    #[must_use]
    pub fn new(
        store: Arc<dyn PlanStore>,
        aggregator: Arc<dyn ProgressAggregator>,
        bounds: Arc<dyn BoundsProvider>,
        clock: Arc<dyn Clock>,
        locks: Arc<ReassessmentLocks>,
        config: Arc<PlannerConfig>,
    ) -> Self {
        Self {
            store,
            aggregator,
            bounds,
            clock,
            locks,
            config,
        }
    }

    /// Reassess one user
    ///
    /// Calling this twice inside one assessment period commits at most one new version;
    /// the second call returns an `AlreadyApplied` record describing the committed state.
    ///
    /// # Errors
    ///
    /// - `CONCURRENT_REASSESSMENT` when another transition holds the user's lock or
    ///   committed first
    /// - `RESOURCE_NOT_FOUND` when the user has no active plan
    /// - `AGGREGATION_UNAVAILABLE` when the progress aggregator fails or reports a
    ///   non-finite rate or an adherence outside `[0, 1]`
    /// - store and config errors from collaborators
    // Long function: Single critical section from lock acquisition through commit
    #[allow(clippy::too_many_lines)]
    pub async fn reassess(
        &self,
        user_id: Uuid,
        trigger: ReassessmentTrigger,
    ) -> AppResult<AdjustmentRecord> {
        let guard = self.locks.try_acquire(user_id)?;

        let active = self.store.active_plan(user_id).await?.ok_or_else(|| {
            AppError::not_found(format!("Active plan for user {user_id}")).with_user_id(user_id)
        })?;
        let catalog = self.bounds.catalog_for(user_id)?;
        let now = self.clock.now();

        let versions = self.store.plan_versions(user_id).await?;
        let records = self.store.adjustment_records(user_id).await?;
        let lineage = Lineage::resolve(&versions, &records).unwrap_or(Lineage {
            anchor: active.valid_from,
            consumed: false,
        });
        let period = Duration::days(i64::from(catalog.assessment_period_days));

        let (start, end) = match lineage.schedule(now, period, trigger) {
            Schedule::Due { start, end } => (start, end),
            Schedule::NotDue { next_due } => {
                debug!(user_id = %user_id, %trigger, %next_due, "reassessment not due");
                let mut record = blank_record(
                    &active,
                    trigger,
                    AdjustmentOutcome::NotDue,
                    lineage.anchor,
                    now,
                    now,
                );
                record.rationale = format!(
                    "Assessment period still open; next scheduled reassessment at {}.",
                    next_due.format("%Y-%m-%d %H:%M UTC")
                );
                return Ok(record);
            }
            Schedule::AlreadyApplied { next_due } => {
                info!(
                    user_id = %user_id,
                    %trigger,
                    version = active.version,
                    "period already reassessed"
                );
                let mut record = blank_record(
                    &active,
                    trigger,
                    AdjustmentOutcome::AlreadyApplied,
                    lineage.anchor,
                    now,
                    now,
                );
                record.rationale = format!(
                    "This assessment period was already reassessed; version {} stays active until {}.",
                    active.version,
                    next_due.format("%Y-%m-%d %H:%M UTC")
                );
                return Ok(record);
            }
        };

        info!(
            user_id = %user_id,
            %trigger,
            version = active.version,
            %start,
            %end,
            "reassessment started"
        );

        let observed = match tokio::time::timeout(
            self.config.aggregation_timeout,
            self.aggregator.observed_outcome(user_id, start, end),
        )
        .await
        {
            Err(_) => {
                warn!(
                    user_id = %user_id,
                    timeout_ms = self.config.aggregation_timeout.as_millis() as u64,
                    "progress aggregation timed out"
                );
                let mut record = blank_record(
                    &active,
                    trigger,
                    AdjustmentOutcome::AggregationTimedOut,
                    start,
                    end,
                    now,
                );
                record.rationale =
                    "Progress data could not be gathered in time; the plan is unchanged and will be reassessed on the next tick.".into();
                return Ok(record);
            }
            Ok(Err(error)) => {
                warn!(user_id = %user_id, error = %error, "progress aggregation failed");
                return Err(AppError::aggregation_unavailable(format!(
                    "Progress aggregation failed for user {user_id}"
                ))
                .with_user_id(user_id)
                .with_source(error));
            }
            Ok(Ok(observed)) => observed,
        };
        if let Err(error) = observed.validate() {
            warn!(
                user_id = %user_id,
                error = %error,
                "progress aggregation returned unusable data"
            );
            return Err(AppError::aggregation_unavailable(format!(
                "Progress aggregation returned unusable data for user {user_id}"
            ))
            .with_user_id(user_id)
            .with_source(error));
        }

        let confidence = observation_confidence(
            observed.data_quality,
            observed.logged_days,
            catalog.assessment_period_days,
        );

        if observed.data_quality == DataQuality::Insufficient
            || observed.logged_days < self.config.min_logged_days
        {
            info!(
                user_id = %user_id,
                logged_days = observed.logged_days,
                min_logged_days = self.config.min_logged_days,
                "insufficient data, correction skipped"
            );
            let mut record = blank_record(
                &active,
                trigger,
                AdjustmentOutcome::InsufficientData,
                start,
                end,
                now,
            );
            record.confidence = confidence;
            record.rationale = format!(
                "Only {} of {} days were logged (minimum {}); targets are unchanged this period.",
                observed.logged_days, catalog.assessment_period_days, self.config.min_logged_days
            );
            let commit = PlanCommit {
                user_id,
                expected_active: Some(active.version),
                version: None,
                retire_as: PlanStatus::Superseded,
                record: Some(record.clone()),
                controller_states: BTreeMap::new(),
                committed_at: now,
            };
            self.commit(guard, commit).await?;
            return Ok(record);
        }

        let corrections = self.run_controllers(&active, &observed, confidence, &catalog).await?;
        // Periods that changed nothing still count against the active version's timeline
        let elapsed_weeks = u32::try_from((end - active.valid_from).num_weeks()).unwrap_or(0);
        let (phase, base, clamped) = self
            .corrected_variables(&active, &corrections, elapsed_weeks, &catalog)
            .await?;

        let changed = clamped.variables != active.variables || phase != active.phase;
        let (outcome, to_version) = if changed {
            (AdjustmentOutcome::Applied, active.version + 1)
        } else {
            (AdjustmentOutcome::NoChange, active.version)
        };

        let trend = classify_trend(
            active.variables.weekly_rate_target_kg,
            observed.observed_rate_kg_per_week,
            catalog.controller.maintenance_tolerance,
        );

        let mut record = blank_record(&active, trigger, outcome, start, end, now);
        record.to_version = to_version;
        record.new_calories = clamped.variables.daily_calories;
        record.new_volume.clone_from(&clamped.variables.weekly_volume);
        record.confidence = confidence;
        record.trend = Some(trend);
        record.calorie_step = Some(corrections.calorie);
        record.volume_step = Some(corrections.volume);
        record.diagnostics = clamped
            .notes
            .iter()
            .map(BoundsViolation::to_diagnostic)
            .collect();
        record.rationale = rationale(&RationaleInput {
            active: &active,
            observed: &observed,
            corrections: &corrections,
            clamped: &clamped,
            restored_from: (active.phase == TrainingPhase::Deload && phase != TrainingPhase::Deload)
                .then_some(base.version),
            trend_phrase: trend.describe(),
        });
        record.bounds_notes = clamped.notes.clone();

        let version = changed.then(|| PlanVersion {
            user_id,
            version: to_version,
            status: PlanStatus::Active,
            origin: PlanOrigin::Reassessment,
            phase,
            goal: active.goal.for_next_period(elapsed_weeks),
            variables: clamped.variables.clone(),
            created_at: now,
            valid_from: now,
            valid_until: None,
        });

        let commit = PlanCommit {
            user_id,
            expected_active: Some(active.version),
            version,
            retire_as: PlanStatus::Superseded,
            record: Some(record.clone()),
            controller_states: BTreeMap::from([
                (ControlLoop::Calorie, corrections.calorie.new_state),
                (ControlLoop::Volume, corrections.volume.new_state),
            ]),
            committed_at: now,
        };
        self.commit(guard, commit).await?;

        info!(
            user_id = %user_id,
            %trigger,
            outcome = %record.outcome,
            from_version = record.from_version,
            to_version = record.to_version,
            calorie_delta = record.calorie_delta(),
            clamps = record.bounds_notes.len(),
            "reassessment committed"
        );
        Ok(record)
    }

    /// Run the commit on its own task so a dropped caller cannot leave it half-applied
    ///
    /// The lock guard moves into the task and is released only once the commit finishes.
    async fn commit(&self, guard: ReassessmentGuard, commit: PlanCommit) -> AppResult<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let _guard = guard;
            store.commit(commit).await
        })
        .await
        .map_err(|e| AppError::internal(format!("commit task failed: {e}")))?
    }

    async fn run_controllers(
        &self,
        active: &PlanVersion,
        observed: &ObservedOutcome,
        confidence: f64,
        catalog: &BoundsCatalog,
    ) -> AppResult<PeriodCorrections> {
        let user_id = active.user_id;
        let calorie_state = self
            .store
            .controller_state(user_id, ControlLoop::Calorie)
            .await?;
        let mut volume_state = self
            .store
            .controller_state(user_id, ControlLoop::Volume)
            .await?;
        // A deload the user took outside the plan resets the interval too
        volume_state.weeks_since_last_deload = volume_state
            .weeks_since_last_deload
            .min(observed.weeks_since_last_deload);

        let calorie = adjust(
            ControlLoop::Calorie,
            Observation {
                target: active.variables.weekly_rate_target_kg,
                observed: observed.observed_rate_kg_per_week,
                confidence,
            },
            calorie_state,
            catalog,
        );
        let volume = adjust(
            ControlLoop::Volume,
            Observation {
                target: catalog.controller.target_adherence,
                observed: observed.adherence_fraction,
                confidence,
            },
            volume_state,
            catalog,
        );
        Ok(PeriodCorrections {
            calorie,
            volume,
            confidence,
        })
    }

    /// Apply corrections to the active version and clamp the result into bounds
    ///
    /// Returns the phase, the version whose volumes the correction started from, and the
    /// clamped variables.
    async fn corrected_variables(
        &self,
        active: &PlanVersion,
        corrections: &PeriodCorrections,
        elapsed_weeks: u32,
        catalog: &BoundsCatalog,
    ) -> AppResult<(TrainingPhase, PlanVersion, TolerantOutcome)> {
        let mut base = active.clone();
        let (phase, volume) = match corrections.volume.correction {
            Correction::Deload { reduction } => (
                TrainingPhase::Deload,
                deload_volume(&active.variables.weekly_volume, reduction),
            ),
            Correction::Delta { amount } => {
                if active.phase == TrainingPhase::Deload {
                    // Restart from the volumes the deload replaced
                    if let Some(before) = self
                        .store
                        .plan_version(active.user_id, active.version.saturating_sub(1))
                        .await?
                    {
                        base = before;
                    }
                }
                (
                    TrainingPhase::Accumulation,
                    distribute_sets(&base.variables.weekly_volume, amount.round() as i64),
                )
            }
        };

        let candidate = DecisionVariables {
            weekly_volume: volume,
            daily_calories: active.variables.daily_calories
                + corrections.calorie.correction.amount(),
            ..active.variables.clone()
        };
        let previous = DecisionVariables {
            weekly_volume: base.variables.weekly_volume.clone(),
            ..active.variables.clone()
        };

        let goal = active.goal.for_next_period(elapsed_weeks);
        let solver = FeasibilitySolver::new(catalog, &self.config.solver);
        let clamped = solver.validate_tolerant(
            &candidate,
            TolerantCheck {
                goal: &goal,
                phase,
                previous: Some(&previous),
            },
        )?;
        Ok((phase, base, clamped))
    }
}

/// Record describing an unchanged plan
fn blank_record(
    active: &PlanVersion,
    trigger: ReassessmentTrigger,
    outcome: AdjustmentOutcome,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AdjustmentRecord {
    AdjustmentRecord {
        id: Uuid::new_v4(),
        user_id: active.user_id,
        from_version: active.version,
        to_version: active.version,
        trigger,
        outcome,
        period_start,
        period_end,
        created_at: now,
        previous_calories: active.variables.daily_calories,
        new_calories: active.variables.daily_calories,
        previous_volume: active.variables.weekly_volume.clone(),
        new_volume: active.variables.weekly_volume.clone(),
        confidence: 0.0,
        trend: None,
        calorie_step: None,
        volume_step: None,
        bounds_notes: Vec::new(),
        diagnostics: Vec::new(),
        rationale: String::new(),
    }
}

struct RationaleInput<'a> {
    active: &'a PlanVersion,
    observed: &'a ObservedOutcome,
    corrections: &'a PeriodCorrections,
    clamped: &'a TolerantOutcome,
    restored_from: Option<u32>,
    trend_phrase: &'static str,
}

fn rationale(input: &RationaleInput<'_>) -> String {
    let before = &input.active.variables;
    let after = &input.clamped.variables;
    let mut text = String::new();

    let calorie_change = after.daily_calories - before.daily_calories;
    let _ = write!(
        text,
        "Observed {:+.2} kg/week against a {:+.2} target; {}. ",
        input.observed.observed_rate_kg_per_week, before.weekly_rate_target_kg, input.trend_phrase
    );
    if calorie_change.abs() < f64::EPSILON {
        let _ = write!(text, "Calories hold at {:.0} kcal/day. ", after.daily_calories);
    } else {
        let _ = write!(
            text,
            "Calories {:+.0} kcal/day ({:.0} -> {:.0}). ",
            calorie_change, before.daily_calories, after.daily_calories
        );
    }

    match input.corrections.volume.correction {
        Correction::Deload { reduction } => {
            let _ = write!(
                text,
                "Deload week: volume cut by {:.0}% for recovery. ",
                reduction * 100.0
            );
        }
        Correction::Delta { .. } => {
            if let Some(version) = input.restored_from {
                let _ = write!(text, "Deload complete; volume restored from version {version}. ");
            }
            let sets_before = i64::from(before.total_weekly_sets());
            let sets_after = i64::from(after.total_weekly_sets());
            let _ = write!(
                text,
                "Training volume {:+} sets/week ({} -> {}) at {:.0}% adherence{}. ",
                sets_after - sets_before,
                sets_before,
                sets_after,
                input.observed.adherence_fraction * 100.0,
                if input.corrections.volume.overload_floor_applied {
                    ", progressive overload"
                } else {
                    ""
                }
            );
        }
    }

    let _ = write!(text, "Confidence {:.2}.", input.corrections.confidence);
    if !input.clamped.notes.is_empty() {
        let names: Vec<&str> = input
            .clamped
            .notes
            .iter()
            .map(|n| n.variable.as_str())
            .collect();
        let _ = write!(
            text,
            " Adjusted to stay within safe bounds: {}.",
            names.join(", ")
        );
    }
    text
}
