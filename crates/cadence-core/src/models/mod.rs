// ABOUTME: Core data models for goals, plans, controller state, and adjustment history
// ABOUTME: Closed enumerations shared by the solver, controller, store, and orchestrator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Models
//!
//! Closed vocabularies live here; composite types are split by lifecycle:
//! - `goal`: immutable intake input (`GoalSpec`) and its raw request shape
//! - `plan`: solver output, diagnostics, trade-offs, and versioned plans
//! - `controller`: per-loop PID state and controller step results
//! - `adjustment`: observed progress and the audit trail of reassessments

/// Adjustment history and observed progress
pub mod adjustment;
/// Controller loops, persistent controller state, and corrections
pub mod controller;
/// Goal requests and validated goal specifications
pub mod goal;
/// Decision variables, diagnostics, trade options, and plan versions
pub mod plan;

pub use adjustment::{
    AdjustmentOutcome, AdjustmentRecord, DataQuality, ObservedOutcome, ReassessmentTrigger,
};
pub use controller::{
    ControlLoop, ControllerState, ControllerStep, Correction, PidTerms, ProgressTrend,
};
pub use goal::{AthleteProfile, AvailabilityWindow, GoalRequest, GoalSpec, GoalValidationError};
pub use plan::{
    BoundsViolation, DecisionVariables, Diagnostic, DiagnosticCode, GoalField, MacroSplit,
    OutcomeRange, PlanOrigin, PlanStatus, PlanVersion, RelaxationKind, TradeOption,
    TrainingPhase,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary objective category of a planning cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Lose body fat (negative rate)
    FatLoss,
    /// Gain muscle (positive rate)
    MuscleGain,
    /// Lose fat and gain muscle at roughly stable mass
    Recomposition,
    /// Hold body mass steady
    Maintenance,
    /// Train for performance with small mass drift allowed
    Performance,
}

impl Objective {
    /// Stable lowercase name used in logs and storage
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FatLoss => "fat_loss",
            Self::MuscleGain => "muscle_gain",
            Self::Recomposition => "recomposition",
            Self::Maintenance => "maintenance",
            Self::Performance => "performance",
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sex used for calorie floors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    /// Male calorie floor applies
    Male,
    /// Female calorie floor applies
    Female,
}

/// Training experience tier, selects volume landmark triples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceTier {
    /// Less than a year of structured training
    Beginner,
    /// One to three years of structured training
    Intermediate,
    /// Three or more years of structured training
    Advanced,
}

impl ExperienceTier {
    /// All tiers in catalog order
    pub const ALL: [Self; 3] = [Self::Beginner, Self::Intermediate, Self::Advanced];
}

/// Muscle groups that receive a weekly set prescription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuscleGroup {
    /// Chest
    Chest,
    /// Back
    Back,
    /// Shoulders
    Shoulders,
    /// Biceps and triceps
    Arms,
    /// Quads, hamstrings, glutes, and calves
    Legs,
    /// Trunk and abdominals
    Core,
}

impl MuscleGroup {
    /// All muscle groups in prescription order
    pub const ALL: [Self; 6] = [
        Self::Chest,
        Self::Back,
        Self::Shoulders,
        Self::Arms,
        Self::Legs,
        Self::Core,
    ];

    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chest => "chest",
            Self::Back => "back",
            Self::Shoulders => "shoulders",
            Self::Arms => "arms",
            Self::Legs => "legs",
            Self::Core => "core",
        }
    }
}

impl fmt::Display for MuscleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equipment available to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Equipment {
    /// No equipment
    Bodyweight,
    /// Resistance bands
    Bands,
    /// Dumbbells
    Dumbbells,
    /// Kettlebells
    Kettlebells,
    /// Barbell and rack
    Barbell,
    /// Selectorized or plate-loaded machines
    Machines,
    /// Cable stations
    Cables,
}

impl Equipment {
    /// Equipment that provides progressive external load
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(
            self,
            Self::Dumbbells | Self::Kettlebells | Self::Barbell | Self::Machines | Self::Cables
        )
    }

    /// Equipment that normally requires paid facility access
    #[must_use]
    pub const fn requires_facility(&self) -> bool {
        matches!(self, Self::Barbell | Self::Machines | Self::Cables)
    }
}
