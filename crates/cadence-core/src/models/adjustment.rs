// ABOUTME: Adjustment models - observed progress snapshots and the immutable reassessment audit trail
// ABOUTME: Each record links the plan version before and after one assessment period
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{BoundsViolation, ControllerStep, Diagnostic, MuscleGroup, ProgressTrend};
use crate::constants::data_quality::{HIGH_CONFIDENCE, LOW_CONFIDENCE, MEDIUM_CONFIDENCE};
use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Quality grade of aggregated progress data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    /// Dense, consistent logging
    High,
    /// Minor gaps
    Medium,
    /// Sparse logging
    Low,
    /// Too little data to act on
    Insufficient,
}

impl DataQuality {
    /// Confidence scalar for controller output
    #[must_use]
    pub const fn confidence(&self) -> f64 {
        match self {
            Self::High => HIGH_CONFIDENCE,
            Self::Medium => MEDIUM_CONFIDENCE,
            Self::Low => LOW_CONFIDENCE,
            Self::Insufficient => 0.0,
        }
    }
}

/// Progress aggregated over one assessment period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservedOutcome {
    /// Observed body-mass change (kg/week)
    pub observed_rate_kg_per_week: f64,
    /// Fraction of prescribed sets completed
    pub adherence_fraction: f64,
    /// Quality grade of the data
    pub data_quality: DataQuality,
    /// Days with at least one log entry
    pub logged_days: u32,
    /// Weeks since the user's last deload, as tracked by the aggregator
    pub weeks_since_last_deload: u32,
}

impl ObservedOutcome {
    /// Reject readings no progress tracker can legitimately produce
    ///
    /// # Errors
    ///
    /// Returns `VALUE_OUT_OF_RANGE` when the observed rate is not finite or adherence lies
    /// outside `[0, 1]`.
    pub fn validate(&self) -> AppResult<()> {
        if !self.observed_rate_kg_per_week.is_finite() {
            return Err(AppError::out_of_range(format!(
                "observed rate must be finite, got {}",
                self.observed_rate_kg_per_week
            )));
        }
        // NaN fails the range check too
        if !(0.0..=1.0).contains(&self.adherence_fraction) {
            return Err(AppError::out_of_range(format!(
                "adherence fraction must lie within [0, 1], got {}",
                self.adherence_fraction
            )));
        }
        Ok(())
    }
}

/// What initiated a reassessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReassessmentTrigger {
    /// External scheduler tick
    Scheduled,
    /// User or coach request
    Manual,
}

impl ReassessmentTrigger {
    /// Stable storage name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for ReassessmentTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result category of a reassessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentOutcome {
    /// A new plan version was committed
    Applied,
    /// Controller ran but produced no change
    NoChange,
    /// Too little data; correction skipped
    InsufficientData,
    /// The period was already reassessed
    AlreadyApplied,
    /// Scheduled tick arrived before the period elapsed
    NotDue,
    /// Progress aggregation timed out; retried on the next tick
    AggregationTimedOut,
}

impl AdjustmentOutcome {
    /// Stable storage name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::NoChange => "no_change",
            Self::InsufficientData => "insufficient_data",
            Self::AlreadyApplied => "already_applied",
            Self::NotDue => "not_due",
            Self::AggregationTimedOut => "aggregation_timed_out",
        }
    }

    /// Parse a storage name
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "applied" => Some(Self::Applied),
            "no_change" => Some(Self::NoChange),
            "insufficient_data" => Some(Self::InsufficientData),
            "already_applied" => Some(Self::AlreadyApplied),
            "not_due" => Some(Self::NotDue),
            "aggregation_timed_out" => Some(Self::AggregationTimedOut),
            _ => None,
        }
    }

    /// Whether the outcome closes the assessment period and is written to the ledger
    #[must_use]
    pub const fn consumes_period(&self) -> bool {
        matches!(self, Self::Applied | Self::NoChange | Self::InsufficientData)
    }
}

impl fmt::Display for AdjustmentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit entry for one reassessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentRecord {
    /// Record identifier
    pub id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// Active version when the reassessment started
    pub from_version: u32,
    /// Active version afterwards (equal to `from_version` when unchanged)
    pub to_version: u32,
    /// What initiated the reassessment
    pub trigger: ReassessmentTrigger,
    /// Result category
    pub outcome: AdjustmentOutcome,
    /// Start of the assessed period
    pub period_start: DateTime<Utc>,
    /// End of the assessed period
    pub period_end: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Daily calories before
    pub previous_calories: f64,
    /// Daily calories after
    pub new_calories: f64,
    /// Weekly sets per muscle before
    pub previous_volume: BTreeMap<MuscleGroup, u32>,
    /// Weekly sets per muscle after
    pub new_volume: BTreeMap<MuscleGroup, u32>,
    /// Confidence applied to the corrections
    pub confidence: f64,
    /// Progress classification for the calorie loop
    pub trend: Option<ProgressTrend>,
    /// Calorie loop step, when the controller ran
    pub calorie_step: Option<ControllerStep>,
    /// Volume loop step, when the controller ran
    pub volume_step: Option<ControllerStep>,
    /// Values clamped back into bounds
    pub bounds_notes: Vec<BoundsViolation>,
    /// Diagnostic context
    pub diagnostics: Vec<Diagnostic>,
    /// Human-readable explanation
    pub rationale: String,
}

impl AdjustmentRecord {
    /// Whether the record is written to the ledger
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.outcome.consumes_period()
    }

    /// Calorie change applied
    #[must_use]
    pub fn calorie_delta(&self) -> f64 {
        self.new_calories - self.previous_calories
    }
}
