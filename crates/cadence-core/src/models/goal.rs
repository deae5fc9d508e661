// ABOUTME: Goal intake models - raw GoalRequest payloads and validated, immutable GoalSpec values
// ABOUTME: Rejects unknown, missing, or inconsistent fields before any solving takes place
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Goal intake models
//!
//! A [`GoalRequest`] is the loosely-typed shape a caller submits. It is converted into a
//! [`GoalSpec`] exactly once through `TryFrom`, which is also the path serde takes when a
//! stored goal is read back, so an invalid goal can never exist in memory.

use super::{Equipment, ExperienceTier, Objective, Sex};
use crate::constants::granularity::SESSION_MINUTE_STEP;
use crate::constants::intake_limits::{
    BASELINE_KCAL_RANGE, BODY_MASS_RANGE_KG, MAINTENANCE_RATE_TOLERANCE, MAX_ABS_RATE_KG_PER_WEEK,
    MAX_DAYS_PER_WEEK, MAX_SESSION_MINUTES, MAX_TIMELINE_WEEKS, MIN_DAYS_PER_WEEK,
    MIN_SESSION_MINUTES, RECOMPOSITION_RATE_TOLERANCE,
};
use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use thiserror::Error;
use uuid::Uuid;

/// Validation failures raised while constructing a [`GoalSpec`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GoalValidationError {
    /// A required field was absent
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A numeric field lies outside its accepted range
    #[error("{field} out of range: {reason}")]
    OutOfRange {
        /// Offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// An availability window is internally inconsistent
    #[error("invalid {field} window: {reason}")]
    InvalidWindow {
        /// Offending field
        field: &'static str,
        /// Why the window was rejected
        reason: String,
    },

    /// The requested rate points the wrong way for the objective
    #[error("target rate {rate:+.3} kg/week is inconsistent with objective {objective}")]
    RateObjectiveMismatch {
        /// Requested objective
        objective: Objective,
        /// Requested rate
        rate: f64,
    },
}

impl From<GoalValidationError> for AppError {
    fn from(error: GoalValidationError) -> Self {
        match &error {
            GoalValidationError::MissingField(field) => Self::missing_field(field),
            GoalValidationError::OutOfRange { field, .. }
            | GoalValidationError::InvalidWindow { field, .. } => {
                Self::out_of_range(error.to_string()).with_resource_id(*field)
            }
            GoalValidationError::RateObjectiveMismatch { .. } => {
                Self::invalid_input(error.to_string())
            }
        }
    }
}

/// Preferred and hard limits for a schedulable quantity (days/week, minutes/session)
///
/// The preferred window is what the user asked for; the hard window is the most they
/// could accommodate. The hard window always contains the preferred one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    /// Lower bound of the requested range
    pub preferred_min: u32,
    /// Upper bound of the requested range
    pub preferred_max: u32,
    /// Absolute lower bound the user can accommodate
    pub hard_min: u32,
    /// Absolute upper bound the user can accommodate
    pub hard_max: u32,
}

impl AvailabilityWindow {
    /// Window whose hard limits equal the preferred range
    #[must_use]
    pub const fn fixed(min: u32, max: u32) -> Self {
        Self {
            preferred_min: min,
            preferred_max: max,
            hard_min: min,
            hard_max: max,
        }
    }

    /// Window with a distinct hard range
    #[must_use]
    pub const fn flexible(
        preferred_min: u32,
        preferred_max: u32,
        hard_min: u32,
        hard_max: u32,
    ) -> Self {
        Self {
            preferred_min,
            preferred_max,
            hard_min,
            hard_max,
        }
    }

    /// Requested range
    #[must_use]
    pub const fn preferred(&self) -> RangeInclusive<u32> {
        self.preferred_min..=self.preferred_max
    }

    /// Absolute range
    #[must_use]
    pub const fn hard(&self) -> RangeInclusive<u32> {
        self.hard_min..=self.hard_max
    }

    /// Whether the hard range is wider than the preferred range
    #[must_use]
    pub const fn can_widen(&self) -> bool {
        self.hard_min < self.preferred_min || self.hard_max > self.preferred_max
    }

    /// Range halfway between preferred and hard, widened outward in multiples of `step`
    #[must_use]
    pub fn half_widened(&self, step: u32) -> RangeInclusive<u32> {
        let step = step.max(1);
        let half_up = |gap: u32| -> u32 {
            let steps = gap.div_ceil(step);
            steps.div_ceil(2) * step
        };
        let low = self
            .preferred_min
            .saturating_sub(half_up(self.preferred_min - self.hard_min))
            .max(self.hard_min);
        let high =
            (self.preferred_max + half_up(self.hard_max - self.preferred_max)).min(self.hard_max);
        low..=high
    }

    fn validate(
        &self,
        field: &'static str,
        limits: RangeInclusive<u32>,
        step: u32,
    ) -> Result<(), GoalValidationError> {
        let invalid = |reason: String| GoalValidationError::InvalidWindow { field, reason };

        if self.preferred_min > self.preferred_max {
            return Err(invalid(format!(
                "preferred_min {} exceeds preferred_max {}",
                self.preferred_min, self.preferred_max
            )));
        }
        if self.hard_min > self.preferred_min || self.hard_max < self.preferred_max {
            return Err(invalid(
                "hard limits must contain the preferred range".to_owned(),
            ));
        }
        if !limits.contains(&self.hard_min) || !limits.contains(&self.hard_max) {
            return Err(invalid(format!(
                "values must lie within {}..={}",
                limits.start(),
                limits.end()
            )));
        }
        if step > 1
            && [self.preferred_min, self.preferred_max, self.hard_min, self.hard_max]
                .iter()
                .any(|v| v % step != 0)
        {
            return Err(invalid(format!("values must be multiples of {step}")));
        }
        Ok(())
    }
}

/// Physiological snapshot supplied by upstream collaborators
///
/// `baseline_kcal` comes from the ensemble expenditure formulas and has already passed
/// the safety gate; the planner never recomputes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AthleteProfile {
    /// Sex used for the calorie floor
    pub sex: Sex,
    /// Current body mass (kg)
    pub body_mass_kg: f64,
    /// Baseline daily energy expenditure (kcal/day)
    pub baseline_kcal: f64,
    /// Training experience tier
    pub experience: ExperienceTier,
}

/// Raw goal intake payload
///
/// Every field is optional so that a missing field is reported by name instead of
/// failing deserialization with a generic message. Unknown fields are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoalRequest {
    /// User the goal belongs to
    pub user_id: Option<Uuid>,
    /// Primary objective
    pub objective: Option<Objective>,
    /// Target body-mass change (kg/week, negative for loss)
    pub target_rate_kg_per_week: Option<f64>,
    /// Planning horizon in weeks
    pub timeline_weeks: Option<u32>,
    /// Training days per week
    pub days_per_week: Option<AvailabilityWindow>,
    /// Session duration in minutes
    pub session_minutes: Option<AvailabilityWindow>,
    /// Available equipment
    pub equipment: Option<BTreeSet<Equipment>>,
    /// Weekly spending limit for food and facility access
    pub weekly_budget: Option<f64>,
    /// Athlete profile snapshot
    pub profile: Option<AthleteProfile>,
}

/// Validated, immutable goal specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GoalRequest", into = "GoalRequest")]
pub struct GoalSpec {
    user_id: Uuid,
    objective: Objective,
    target_rate_kg_per_week: f64,
    timeline_weeks: u32,
    days_per_week: AvailabilityWindow,
    session_minutes: AvailabilityWindow,
    equipment: BTreeSet<Equipment>,
    weekly_budget: f64,
    profile: AthleteProfile,
}

impl GoalSpec {
    /// User the goal belongs to
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Primary objective
    #[must_use]
    pub const fn objective(&self) -> Objective {
        self.objective
    }

    /// Target body-mass change (kg/week)
    #[must_use]
    pub const fn target_rate_kg_per_week(&self) -> f64 {
        self.target_rate_kg_per_week
    }

    /// Planning horizon in weeks
    #[must_use]
    pub const fn timeline_weeks(&self) -> u32 {
        self.timeline_weeks
    }

    /// Training days per week window
    #[must_use]
    pub const fn days_per_week(&self) -> AvailabilityWindow {
        self.days_per_week
    }

    /// Session duration window (minutes)
    #[must_use]
    pub const fn session_minutes(&self) -> AvailabilityWindow {
        self.session_minutes
    }

    /// Available equipment
    #[must_use]
    pub const fn equipment(&self) -> &BTreeSet<Equipment> {
        &self.equipment
    }

    /// Weekly spending limit
    #[must_use]
    pub const fn weekly_budget(&self) -> f64 {
        self.weekly_budget
    }

    /// Athlete profile snapshot
    #[must_use]
    pub const fn profile(&self) -> &AthleteProfile {
        &self.profile
    }

    /// Whether any available equipment provides external load
    #[must_use]
    pub fn has_loaded_equipment(&self) -> bool {
        self.equipment.iter().any(Equipment::is_loaded)
    }

    /// Whether the equipment set implies paid facility access
    #[must_use]
    pub fn uses_facility(&self) -> bool {
        self.equipment.iter().any(Equipment::requires_facility)
    }

    /// Goal for the next planning cycle after `elapsed_weeks` have passed
    ///
    /// The timeline shrinks but never below one week; all other fields carry over.
    #[must_use]
    pub fn for_next_period(&self, elapsed_weeks: u32) -> Self {
        Self {
            timeline_weeks: self.timeline_weeks.saturating_sub(elapsed_weeks).max(1),
            ..self.clone()
        }
    }
}

fn require<T>(value: Option<T>, field: &'static str) -> Result<T, GoalValidationError> {
    value.ok_or(GoalValidationError::MissingField(field))
}

fn check_rate(objective: Objective, rate: f64) -> Result<(), GoalValidationError> {
    if !rate.is_finite() || rate.abs() > MAX_ABS_RATE_KG_PER_WEEK {
        return Err(GoalValidationError::OutOfRange {
            field: "target_rate_kg_per_week",
            reason: format!("|rate| must be at most {MAX_ABS_RATE_KG_PER_WEEK} kg/week"),
        });
    }
    let consistent = match objective {
        Objective::FatLoss => rate < 0.0,
        Objective::MuscleGain => rate > 0.0,
        Objective::Maintenance => rate.abs() <= MAINTENANCE_RATE_TOLERANCE,
        Objective::Recomposition => rate.abs() <= RECOMPOSITION_RATE_TOLERANCE,
        Objective::Performance => true,
    };
    if consistent {
        Ok(())
    } else {
        Err(GoalValidationError::RateObjectiveMismatch { objective, rate })
    }
}

fn check_profile(profile: &AthleteProfile) -> Result<(), GoalValidationError> {
    let (mass_min, mass_max) = BODY_MASS_RANGE_KG;
    if !(mass_min..=mass_max).contains(&profile.body_mass_kg) {
        return Err(GoalValidationError::OutOfRange {
            field: "profile.body_mass_kg",
            reason: format!("must be between {mass_min} and {mass_max} kg"),
        });
    }
    let (kcal_min, kcal_max) = BASELINE_KCAL_RANGE;
    if !(kcal_min..=kcal_max).contains(&profile.baseline_kcal) {
        return Err(GoalValidationError::OutOfRange {
            field: "profile.baseline_kcal",
            reason: format!("must be between {kcal_min} and {kcal_max} kcal/day"),
        });
    }
    Ok(())
}

impl TryFrom<GoalRequest> for GoalSpec {
    type Error = GoalValidationError;

    fn try_from(request: GoalRequest) -> Result<Self, Self::Error> {
        let user_id = require(request.user_id, "user_id")?;
        let objective = require(request.objective, "objective")?;
        let target_rate = require(request.target_rate_kg_per_week, "target_rate_kg_per_week")?;
        let timeline_weeks = require(request.timeline_weeks, "timeline_weeks")?;
        let days_per_week = require(request.days_per_week, "days_per_week")?;
        let session_minutes = require(request.session_minutes, "session_minutes")?;
        let equipment = require(request.equipment, "equipment")?;
        let weekly_budget = require(request.weekly_budget, "weekly_budget")?;
        let profile = require(request.profile, "profile")?;

        check_rate(objective, target_rate)?;

        if timeline_weeks == 0 || timeline_weeks > MAX_TIMELINE_WEEKS {
            return Err(GoalValidationError::OutOfRange {
                field: "timeline_weeks",
                reason: format!("must be between 1 and {MAX_TIMELINE_WEEKS}"),
            });
        }

        days_per_week.validate(
            "days_per_week",
            u32::from(MIN_DAYS_PER_WEEK)..=u32::from(MAX_DAYS_PER_WEEK),
            1,
        )?;
        session_minutes.validate(
            "session_minutes",
            MIN_SESSION_MINUTES..=MAX_SESSION_MINUTES,
            SESSION_MINUTE_STEP,
        )?;

        if equipment.is_empty() {
            return Err(GoalValidationError::OutOfRange {
                field: "equipment",
                reason: "at least one entry is required (use bodyweight for none)".to_owned(),
            });
        }

        if !weekly_budget.is_finite() || weekly_budget < 0.0 {
            return Err(GoalValidationError::OutOfRange {
                field: "weekly_budget",
                reason: "must be a non-negative amount".to_owned(),
            });
        }

        check_profile(&profile)?;

        Ok(Self {
            user_id,
            objective,
            target_rate_kg_per_week: target_rate,
            timeline_weeks,
            days_per_week,
            session_minutes,
            equipment,
            weekly_budget,
            profile,
        })
    }
}

impl From<GoalSpec> for GoalRequest {
    fn from(goal: GoalSpec) -> Self {
        Self {
            user_id: Some(goal.user_id),
            objective: Some(goal.objective),
            target_rate_kg_per_week: Some(goal.target_rate_kg_per_week),
            timeline_weeks: Some(goal.timeline_weeks),
            days_per_week: Some(goal.days_per_week),
            session_minutes: Some(goal.session_minutes),
            equipment: Some(goal.equipment),
            weekly_budget: Some(goal.weekly_budget),
            profile: Some(goal.profile),
        }
    }
}
