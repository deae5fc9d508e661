// ABOUTME: Plan models - decision variables, diagnostics, trade options, and versioned plan snapshots
// ABOUTME: Encodes the calorie identity invariant and the active/superseded/archived lifecycle
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{GoalSpec, MuscleGroup};
use crate::constants::energy::{
    CALORIE_IDENTITY_TOLERANCE, KCAL_PER_G_CARBS, KCAL_PER_G_FAT, KCAL_PER_G_PROTEIN,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Daily macronutrient split in whole grams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroSplit {
    /// Protein (g/day)
    pub protein_g: u32,
    /// Carbohydrate (g/day)
    pub carbs_g: u32,
    /// Fat (g/day)
    pub fat_g: u32,
}

impl MacroSplit {
    /// Energy represented by the split (kcal/day)
    #[must_use]
    pub fn kcal(&self) -> f64 {
        f64::from(self.protein_g) * KCAL_PER_G_PROTEIN
            + f64::from(self.carbs_g) * KCAL_PER_G_CARBS
            + f64::from(self.fat_g) * KCAL_PER_G_FAT
    }
}

/// One consistent assignment of the solver's decision variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionVariables {
    /// Training sessions per week
    pub sessions_per_week: u32,
    /// Session duration (minutes, 5-minute grid)
    pub session_minutes: u32,
    /// Weekly working sets per muscle group
    pub weekly_volume: BTreeMap<MuscleGroup, u32>,
    /// Daily calorie target (kcal, 25-kcal grid)
    pub daily_calories: f64,
    /// Daily macronutrient split
    pub macros: MacroSplit,
    /// Body-mass change the plan is designed to produce (kg/week)
    pub weekly_rate_target_kg: f64,
}

impl DecisionVariables {
    /// Total weekly working sets across all muscle groups
    #[must_use]
    pub fn total_weekly_sets(&self) -> u32 {
        self.weekly_volume.values().sum()
    }

    /// Relative gap between the calorie target and macro energy
    #[must_use]
    pub fn calorie_identity_error(&self) -> f64 {
        if self.daily_calories <= 0.0 {
            return f64::INFINITY;
        }
        (self.macros.kcal() - self.daily_calories).abs() / self.daily_calories
    }

    /// Whether calories match macro energy within tolerance
    #[must_use]
    pub fn satisfies_calorie_identity(&self) -> bool {
        self.calorie_identity_error() <= CALORIE_IDENTITY_TOLERANCE
    }
}

/// Closed set of infeasibility reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    /// Not enough sessions per week for the objective or rate
    FrequencyTooLow,
    /// Sessions too short to fit the minimum weekly volume
    DurationInsufficient,
    /// Weekly cost exceeds the budget
    BudgetExceeded,
    /// Equipment cannot support the requested rate
    EquipmentMismatch,
    /// Calorie target breaches a floor or deficit/surplus bound
    CalorieBoundsViolated,
    /// A muscle's volume cannot fit inside its landmark triple
    VolumeBoundsViolated,
}

impl DiagnosticCode {
    /// Stable kebab-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FrequencyTooLow => "frequency-too-low",
            Self::DurationInsufficient => "duration-insufficient",
            Self::BudgetExceeded => "budget-exceeded",
            Self::EquipmentMismatch => "equipment-mismatch",
            Self::CalorieBoundsViolated => "calorie-bounds-violated",
            Self::VolumeBoundsViolated => "volume-bounds-violated",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured reason a hard constraint could not be met
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Reason code
    pub code: DiagnosticCode,
    /// Human-readable detail
    pub detail: String,
}

impl Diagnostic {
    /// Create a diagnostic
    pub fn new(code: DiagnosticCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }
}

/// GoalSpec fields a trade option relaxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalField {
    /// Training days per week
    DaysPerWeek,
    /// Session duration
    SessionMinutes,
    /// Target rate of change
    TargetRate,
}

/// Relaxation strategy that produced a trade option, in tie-break priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaxationKind {
    /// Rate held, frequency/duration widened to hard limits
    Schedule,
    /// Frequency/duration held, rate stepped toward zero
    Rate,
    /// Both axes relaxed by half-steps
    Hybrid,
}

/// Expected body-mass change over a horizon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRange {
    /// Horizon the range covers (weeks)
    pub horizon_weeks: u32,
    /// Lower end of the expected change (kg)
    pub low_kg: f64,
    /// Upper end of the expected change (kg)
    pub high_kg: f64,
}

/// Alternative relaxed assignment offered when a goal is infeasible
///
/// Trade options are returned to the caller and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOption {
    /// Option label (A, B, C) in order of increasing relaxation
    pub id: char,
    /// Strategy that produced the option
    pub kind: RelaxationKind,
    /// One-line summary
    pub summary: String,
    /// Goal fields the option relaxes
    pub relaxed_fields: Vec<GoalField>,
    /// Expected change computed from the relaxed variables
    pub expected_outcome: OutcomeRange,
    /// One-line description of what the user gives up
    pub cost: String,
    /// Feasibility score in `[0, 1]`, higher is closer to the original ask
    pub feasibility_score: f64,
    /// The relaxed assignment
    pub variables: DecisionVariables,
}

/// A value clamped back inside a hard bound during tolerant validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundsViolation {
    /// Which family of bound was breached
    pub code: DiagnosticCode,
    /// Variable that was clamped (e.g. `daily_calories`, `volume.legs`)
    pub variable: String,
    /// Value proposed by the correction
    pub proposed: f64,
    /// Legal value used instead
    pub clamped_to: f64,
}

impl BoundsViolation {
    /// Convert to a diagnostic for the adjustment record
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(
            self.code,
            format!(
                "{} proposed {:.0}, clamped to {:.0}",
                self.variable, self.proposed, self.clamped_to
            ),
        )
    }
}

/// Lifecycle status of a plan version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// The single plan currently in force
    Active,
    /// Replaced by a reassessment
    Superseded,
    /// Replaced by a new goal intake
    Archived,
}

impl PlanStatus {
    /// Stable storage name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Superseded => "superseded",
            Self::Archived => "archived",
        }
    }

    /// Parse a storage name
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "superseded" => Some(Self::Superseded),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// How a plan version came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOrigin {
    /// Created by goal intake
    Intake,
    /// Created by a reassessment
    Reassessment,
}

/// Training phase a plan version prescribes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingPhase {
    /// Normal progressive training
    #[default]
    Accumulation,
    /// Planned recovery block with reduced volume
    Deload,
}

/// Immutable snapshot of a user's program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanVersion {
    /// Owner
    pub user_id: Uuid,
    /// Monotonic per-user version number starting at 1
    pub version: u32,
    /// Lifecycle status
    pub status: PlanStatus,
    /// How the version was created
    pub origin: PlanOrigin,
    /// Training phase
    pub phase: TrainingPhase,
    /// Goal in force when the version was created
    pub goal: GoalSpec,
    /// Prescribed variables
    pub variables: DecisionVariables,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Start of validity
    pub valid_from: DateTime<Utc>,
    /// End of validity, stamped when the version stops being active
    pub valid_until: Option<DateTime<Utc>>,
}

impl PlanVersion {
    /// Whether this version is the active one
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == PlanStatus::Active
    }
}
