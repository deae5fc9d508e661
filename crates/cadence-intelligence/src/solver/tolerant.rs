// ABOUTME: Tolerant validation - bounds-only check that clamps corrected values to the nearest legal value
// ABOUTME: Used after a controller correction instead of re-solving; every clamp is reported as a note
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::search::{macros_for, muscle_cap, trim_to_capacity};
use super::FeasibilitySolver;
use cadence_core::constants::energy::{KCAL_PER_G_FAT, KCAL_PER_G_PROTEIN};
use cadence_core::constants::granularity::CALORIE_STEP;
use cadence_core::errors::{AppError, AppResult};
use cadence_core::models::{
    BoundsViolation, DecisionVariables, DiagnosticCode, GoalSpec, MuscleGroup, TrainingPhase,
};
use cadence_core::rounding::{round_calories, round_minutes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Inputs for a tolerant validation pass
#[derive(Debug, Clone, Copy)]
pub struct TolerantCheck<'a> {
    /// Goal in force
    pub goal: &'a GoalSpec,
    /// Phase the candidate will run in
    pub phase: TrainingPhase,
    /// Variables of the version being replaced, for the weekly growth cap
    pub previous: Option<&'a DecisionVariables>,
}

/// Legal variables plus every clamp that was needed to reach them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TolerantOutcome {
    /// Variables inside every hard bound
    pub variables: DecisionVariables,
    /// Values that had to be clamped
    pub notes: Vec<BoundsViolation>,
}

fn clamp_note(
    notes: &mut Vec<BoundsViolation>,
    code: DiagnosticCode,
    variable: impl Into<String>,
    proposed: f64,
    clamped_to: f64,
) {
    let note = BoundsViolation {
        code,
        variable: variable.into(),
        proposed,
        clamped_to,
    };
    warn!(
        variable = %note.variable,
        proposed = note.proposed,
        clamped_to = note.clamped_to,
        "value clamped to hard bound"
    );
    notes.push(note);
}

impl FeasibilitySolver<'_> {
    /// Confirm corrected variables stay within hard bounds, clamping where they do not
    ///
    /// No preference optimization takes place: values already legal pass through
    /// unchanged apart from macro re-derivation for the final calorie target.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog lacks the goal's experience tier or the macro
    /// floors cannot be met at any legal calorie level.
    // Long function: Clamps each decision variable against its hard bound in turn
    #[allow(clippy::too_many_lines)]
    pub fn validate_tolerant(
        &self,
        candidate: &DecisionVariables,
        check: TolerantCheck<'_>,
    ) -> AppResult<TolerantOutcome> {
        let goal = check.goal;
        let catalog = self.catalog;
        let tier = catalog.tier(goal.profile().experience)?;
        let mut notes = Vec::new();

        // Schedule
        let days = goal.days_per_week();
        let sessions = candidate
            .sessions_per_week
            .clamp(days.hard_min, days.hard_max);
        if sessions != candidate.sessions_per_week {
            clamp_note(
                &mut notes,
                DiagnosticCode::FrequencyTooLow,
                "sessions_per_week",
                f64::from(candidate.sessions_per_week),
                f64::from(sessions),
            );
        }
        let window = goal.session_minutes();
        let minutes = round_minutes(f64::from(candidate.session_minutes))
            .clamp(window.hard_min, window.hard_max);
        if minutes != candidate.session_minutes {
            clamp_note(
                &mut notes,
                DiagnosticCode::DurationInsufficient,
                "session_minutes",
                f64::from(candidate.session_minutes),
                f64::from(minutes),
            );
        }

        // Calories on the 25 kcal grid, inside the safe range
        let profile = goal.profile();
        let (low, high) = catalog.calories.range_for(profile.sex, profile.baseline_kcal);
        let legal_low = (low / CALORIE_STEP).ceil() * CALORIE_STEP;
        let legal_high = (high / CALORIE_STEP).floor() * CALORIE_STEP;
        let proposed = round_calories(candidate.daily_calories);
        let mut calories = proposed.clamp(legal_low, legal_high.max(legal_low));
        if (calories - candidate.daily_calories).abs() >= CALORIE_STEP / 2.0 {
            clamp_note(
                &mut notes,
                DiagnosticCode::CalorieBoundsViolated,
                "daily_calories",
                candidate.daily_calories,
                calories,
            );
        }

        let macros = if let Some(macros) = macros_for(calories, goal, catalog, self.policy) {
            macros
        } else {
            let raised = self.macro_floor_calories(goal);
            clamp_note(
                &mut notes,
                DiagnosticCode::CalorieBoundsViolated,
                "daily_calories",
                calories,
                raised,
            );
            calories = raised;
            macros_for(calories, goal, catalog, self.policy).ok_or_else(|| {
                AppError::internal("macro floors exceed every legal calorie target")
                    .with_user_id(goal.user_id())
            })?
        };

        // Volume inside the landmark triples
        let deload_keep = 1.0 - catalog.controller.deload.reduction;
        let growth_allowance =
            catalog.training.max_weekly_volume_increase * catalog.period_weeks();
        let mut floors = BTreeMap::new();
        let mut volume = BTreeMap::new();
        for muscle in MuscleGroup::ALL {
            let Some(landmarks) = tier.volume.get(&muscle) else {
                continue;
            };
            let floor = match check.phase {
                TrainingPhase::Accumulation => landmarks.minimum_effective,
                TrainingPhase::Deload => {
                    (f64::from(landmarks.minimum_effective) * deload_keep).floor() as u32
                }
            };
            let mut ceiling = muscle_cap(landmarks, sessions, catalog).max(floor);
            if check.phase == TrainingPhase::Accumulation {
                if let Some(prev) = check.previous.and_then(|p| p.weekly_volume.get(&muscle)) {
                    let allowance = ((f64::from(*prev) * growth_allowance).floor() as u32).max(1);
                    ceiling = ceiling.min(prev + allowance).max(floor);
                }
            }

            let proposed = candidate.weekly_volume.get(&muscle).copied().unwrap_or(0);
            let sets = proposed.clamp(floor, ceiling);
            if sets != proposed {
                clamp_note(
                    &mut notes,
                    DiagnosticCode::VolumeBoundsViolated,
                    format!("volume.{muscle}"),
                    f64::from(proposed),
                    f64::from(sets),
                );
            }
            floors.insert(muscle, floor);
            volume.insert(muscle, sets);
        }

        let capacity = catalog.training.weekly_set_capacity(sessions, minutes);
        let before = volume.clone();
        trim_to_capacity(&mut volume, &floors, &tier.volume, capacity);
        for (muscle, sets) in &volume {
            let original = before.get(muscle).copied().unwrap_or(*sets);
            if original != *sets {
                clamp_note(
                    &mut notes,
                    DiagnosticCode::DurationInsufficient,
                    format!("volume.{muscle}"),
                    f64::from(original),
                    f64::from(*sets),
                );
            }
        }

        Ok(TolerantOutcome {
            variables: DecisionVariables {
                sessions_per_week: sessions,
                session_minutes: minutes,
                weekly_volume: volume,
                daily_calories: calories,
                macros,
                weekly_rate_target_kg: candidate.weekly_rate_target_kg,
            },
            notes,
        })
    }

    /// Smallest calorie target on the 25 kcal grid that covers protein and fat floors
    fn macro_floor_calories(&self, goal: &GoalSpec) -> f64 {
        let catalog = self.catalog;
        let mass = goal.profile().body_mass_kg;
        let protein_kcal = (catalog
            .macros
            .protein_floor_g_per_kg
            .max(self.policy.protein_target(goal.objective()))
            * mass)
            .round()
            * KCAL_PER_G_PROTEIN;
        let fat_fraction = catalog
            .macros
            .fat_min_fraction
            .max(self.policy.fat_target_fraction);
        let fat_floor_kcal = catalog.macros.fat_floor_g_per_kg * mass * KCAL_PER_G_FAT;
        // Fat rounds to whole grams, so leave half a gram of headroom
        let headroom = KCAL_PER_G_FAT / 2.0;
        let needed = ((protein_kcal + headroom) / (1.0 - fat_fraction))
            .max(protein_kcal + fat_floor_kcal + headroom);
        (needed / CALORIE_STEP).ceil() * CALORIE_STEP
    }
}
