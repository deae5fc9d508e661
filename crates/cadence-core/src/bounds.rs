// ABOUTME: Bounds Catalog - versioned hard limits shared by the feasibility solver and the controller
// ABOUTME: Calorie floors, deficit/surplus bounds, volume landmark triples, deload and PID tuning
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Bounds Catalog
//!
//! Pure data. Every numeric limit the solver and controller enforce is read from a
//! [`BoundsCatalog`] snapshot; nothing downstream hard-codes a bound.
//!
//! # Scientific References
//!
//! - Volume landmarks: Israetel, Hoffmann & Smith (2019). *Scientific Principles of
//!   Hypertrophy Training*. Renaissance Periodization.
//! - Protein: Morton et al. (2018) DOI: 10.1136/bjsports-2017-097608
//! - Rate of gain: Iraki et al. (2019) DOI: 10.3390/sports7070154

use crate::errors::{AppError, AppResult};
use crate::models::{ControlLoop, ExperienceTier, MuscleGroup, Objective, Sex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weekly set landmarks for one muscle group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeLandmarks {
    /// Minimum effective volume (floor)
    pub minimum_effective: u32,
    /// Maximum adaptive volume (midpoint the solver aims for)
    pub maximum_adaptive: u32,
    /// Maximum recoverable volume (ceiling)
    pub maximum_recoverable: u32,
}

impl VolumeLandmarks {
    /// Create a landmark triple
    #[must_use]
    pub const fn new(
        minimum_effective: u32,
        maximum_adaptive: u32,
        maximum_recoverable: u32,
    ) -> Self {
        Self {
            minimum_effective,
            maximum_adaptive,
            maximum_recoverable,
        }
    }

    /// Whether `sets` lies within `[floor, ceiling]`
    #[must_use]
    pub const fn contains(&self, sets: u32) -> bool {
        sets >= self.minimum_effective && sets <= self.maximum_recoverable
    }
}

/// Limits that depend on training experience
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBounds {
    /// Landmarks per muscle group
    pub volume: BTreeMap<MuscleGroup, VolumeLandmarks>,
    /// Sustainable gain rate each session beyond the first supports (kg/week)
    pub gain_rate_per_extra_session: f64,
}

/// Calorie safety limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalorieBounds {
    /// Minimum daily calories for women
    pub female_floor_kcal: f64,
    /// Minimum daily calories for men
    pub male_floor_kcal: f64,
    /// Largest deficit as a (negative) fraction of baseline expenditure
    pub max_deficit_fraction: f64,
    /// Largest surplus as a (positive) fraction of baseline expenditure
    pub max_surplus_fraction: f64,
}

impl CalorieBounds {
    /// Sex-specific calorie floor
    #[must_use]
    pub const fn floor_for(&self, sex: Sex) -> f64 {
        match sex {
            Sex::Female => self.female_floor_kcal,
            Sex::Male => self.male_floor_kcal,
        }
    }

    /// Legal daily calorie range for a profile
    #[must_use]
    pub fn range_for(&self, sex: Sex, baseline_kcal: f64) -> (f64, f64) {
        let low = self
            .floor_for(sex)
            .max(baseline_kcal * (1.0 + self.max_deficit_fraction));
        let high = baseline_kcal * (1.0 + self.max_surplus_fraction);
        (low, high)
    }
}

/// Firm macronutrient floors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroBounds {
    /// Protein floor (g per kg body mass)
    pub protein_floor_g_per_kg: f64,
    /// Fat floor (g per kg body mass)
    pub fat_floor_g_per_kg: f64,
    /// Fat floor as a fraction of daily calories
    pub fat_min_fraction: f64,
}

/// Training schedule limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingBounds {
    /// Average minutes one working set occupies, rest included
    pub minutes_per_set: f64,
    /// Warm-up minutes per session that hold no working sets
    pub warmup_minutes: u32,
    /// Most sets one muscle can productively receive in a session
    pub max_sets_per_muscle_per_session: u32,
    /// Largest week-over-week volume increase per muscle (fraction)
    pub max_weekly_volume_increase: f64,
    /// Fewest sessions per week each objective needs
    pub objective_min_sessions: BTreeMap<Objective, u32>,
    /// Highest gain rate achievable without external load (kg/week)
    pub bodyweight_max_gain_rate: f64,
}

impl TrainingBounds {
    /// Minimum sessions for an objective (one if unlisted)
    #[must_use]
    pub fn min_sessions(&self, objective: Objective) -> u32 {
        self.objective_min_sessions
            .get(&objective)
            .copied()
            .unwrap_or(1)
    }

    /// Working sets that fit into a week of sessions
    #[must_use]
    pub fn weekly_set_capacity(&self, sessions: u32, minutes: u32) -> u32 {
        let working = f64::from(minutes.saturating_sub(self.warmup_minutes));
        (f64::from(sessions) * working / self.minutes_per_set).floor() as u32
    }
}

/// Unit costs used for the weekly budget check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBounds {
    /// Food cost per 1000 kcal
    pub food_cost_per_1000_kcal: f64,
    /// Facility fee per session when facility equipment is used
    pub facility_cost_per_session: f64,
}

/// PID tuning and actuation limits for one loop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopTuning {
    /// Proportional gain
    pub kp: f64,
    /// Integral gain
    pub ki: f64,
    /// Derivative gain
    pub kd: f64,
    /// Absolute bound on the integral accumulator
    pub integral_limit: f64,
    /// Largest single-step correction magnitude
    pub max_step: f64,
    /// Rounding granularity of the correction
    pub granularity: f64,
}

/// Deload scheduling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeloadPolicy {
    /// Earliest a deload may be scheduled (weeks)
    pub min_interval_weeks: u32,
    /// Weeks after which a deload is forced
    pub max_interval_weeks: u32,
    /// Adherence at or below which a deload comes early once `min_interval_weeks` have passed
    pub fatigue_adherence_threshold: f64,
    /// Fraction of volume removed during a deload
    pub reduction: f64,
}

/// Controller limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerBounds {
    /// Calorie loop tuning (kcal/day per kg/week of error)
    pub calorie: LoopTuning,
    /// Volume loop tuning (sets/week per unit of adherence error)
    pub volume: LoopTuning,
    /// Deload scheduling
    pub deload: DeloadPolicy,
    /// Adherence the volume loop steers toward
    pub target_adherence: f64,
    /// Adherence above which progression is guaranteed
    pub overload_adherence_threshold: f64,
    /// Smallest positive volume step under high adherence (sets/week)
    pub overload_min_increment: f64,
    /// Ratio band counted as on track when the target is zero (kg/week)
    pub maintenance_tolerance: f64,
}

impl ControllerBounds {
    /// Tuning for one loop
    #[must_use]
    pub const fn tuning(&self, control_loop: ControlLoop) -> &LoopTuning {
        match control_loop {
            ControlLoop::Calorie => &self.calorie,
            ControlLoop::Volume => &self.volume,
        }
    }
}

/// Versioned, read-only set of hard limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundsCatalog {
    /// Catalog version label
    pub version: String,
    /// Days between reassessments
    pub assessment_period_days: u32,
    /// Calorie limits
    pub calories: CalorieBounds,
    /// Macronutrient floors
    pub macros: MacroBounds,
    /// Training schedule limits
    pub training: TrainingBounds,
    /// Unit costs
    pub costs: CostBounds,
    /// Experience-dependent limits
    pub tiers: BTreeMap<ExperienceTier, TierBounds>,
    /// Controller limits
    pub controller: ControllerBounds,
}

impl Default for BoundsCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn landmarks(rows: [(MuscleGroup, u32, u32, u32); 6]) -> BTreeMap<MuscleGroup, VolumeLandmarks> {
    rows.into_iter()
        .map(|(muscle, mev, mav, mrv)| (muscle, VolumeLandmarks::new(mev, mav, mrv)))
        .collect()
}

impl BoundsCatalog {
    /// Standard adult catalog
    // Long function: Every tier, loop and macro bound of the default catalog
    #[allow(clippy::too_many_lines)]
    #[must_use]
    pub fn standard() -> Self {
        use MuscleGroup::{Arms, Back, Chest, Core, Legs, Shoulders};

        let tiers = BTreeMap::from([
            (
                ExperienceTier::Beginner,
                TierBounds {
                    volume: landmarks([
                        (Chest, 4, 10, 16),
                        (Back, 4, 10, 18),
                        (Shoulders, 2, 8, 14),
                        (Arms, 2, 8, 14),
                        (Legs, 4, 10, 18),
                        (Core, 2, 4, 10),
                    ]),
                    gain_rate_per_extra_session: 0.2,
                },
            ),
            (
                ExperienceTier::Intermediate,
                TierBounds {
                    volume: landmarks([
                        (Chest, 6, 12, 20),
                        (Back, 6, 14, 22),
                        (Shoulders, 4, 10, 18),
                        (Arms, 4, 10, 18),
                        (Legs, 6, 14, 22),
                        (Core, 2, 6, 12),
                    ]),
                    gain_rate_per_extra_session: 0.15,
                },
            ),
            (
                ExperienceTier::Advanced,
                TierBounds {
                    volume: landmarks([
                        (Chest, 8, 16, 24),
                        (Back, 8, 18, 26),
                        (Shoulders, 6, 14, 22),
                        (Arms, 6, 14, 22),
                        (Legs, 8, 16, 24),
                        (Core, 4, 8, 14),
                    ]),
                    gain_rate_per_extra_session: 0.1,
                },
            ),
        ]);

        Self {
            version: "2025.1".to_owned(),
            assessment_period_days: 14,
            calories: CalorieBounds {
                female_floor_kcal: 1_200.0,
                male_floor_kcal: 1_500.0,
                max_deficit_fraction: -0.25,
                max_surplus_fraction: 0.15,
            },
            macros: MacroBounds {
                protein_floor_g_per_kg: 1.6,
                fat_floor_g_per_kg: 0.6,
                fat_min_fraction: 0.20,
            },
            training: TrainingBounds {
                minutes_per_set: 3.0,
                warmup_minutes: 10,
                max_sets_per_muscle_per_session: 12,
                max_weekly_volume_increase: 0.10,
                objective_min_sessions: BTreeMap::from([
                    (Objective::FatLoss, 2),
                    (Objective::MuscleGain, 2),
                    (Objective::Recomposition, 3),
                    (Objective::Maintenance, 1),
                    (Objective::Performance, 3),
                ]),
                bodyweight_max_gain_rate: 0.1,
            },
            costs: CostBounds {
                food_cost_per_1000_kcal: 3.0,
                facility_cost_per_session: 5.0,
            },
            tiers,
            controller: ControllerBounds {
                calorie: LoopTuning {
                    kp: 200.0,
                    ki: 50.0,
                    kd: 100.0,
                    integral_limit: 2.0,
                    max_step: 500.0,
                    granularity: 50.0,
                },
                volume: LoopTuning {
                    kp: 20.0,
                    ki: 5.0,
                    kd: 5.0,
                    integral_limit: 1.0,
                    max_step: 20.0,
                    granularity: 1.0,
                },
                deload: DeloadPolicy {
                    min_interval_weeks: 4,
                    max_interval_weeks: 5,
                    fatigue_adherence_threshold: 0.6,
                    reduction: 0.5,
                },
                target_adherence: 0.85,
                overload_adherence_threshold: 0.9,
                overload_min_increment: 1.0,
                maintenance_tolerance: 0.05,
            },
        }
    }

    /// Assessment period length in weeks
    #[must_use]
    pub fn period_weeks(&self) -> f64 {
        f64::from(self.assessment_period_days) / 7.0
    }

    /// Limits for an experience tier
    ///
    /// # Errors
    ///
    /// Returns a config error if the catalog has no entry for the tier.
    pub fn tier(&self, tier: ExperienceTier) -> AppResult<&TierBounds> {
        self.tiers
            .get(&tier)
            .ok_or_else(|| AppError::config(format!("bounds catalog has no {tier:?} tier")))
    }

    /// Validate every catalog invariant
    ///
    /// # Errors
    ///
    /// Returns a config error naming the first violated invariant.
    pub fn validate(&self) -> AppResult<()> {
        if self.assessment_period_days == 0 {
            return Err(AppError::config("assessment_period_days must be positive"));
        }

        let cal = &self.calories;
        if !(-0.30..0.0).contains(&cal.max_deficit_fraction) {
            return Err(AppError::config(
                "max_deficit_fraction must be negative and no lower than -0.30",
            ));
        }
        if cal.max_surplus_fraction <= 0.0 || cal.max_surplus_fraction > 0.25 {
            return Err(AppError::config(
                "max_surplus_fraction must be positive and at most 0.25",
            ));
        }
        if cal.female_floor_kcal <= 0.0 || cal.male_floor_kcal <= 0.0 {
            return Err(AppError::config("calorie floors must be positive"));
        }

        let macros = &self.macros;
        if macros.protein_floor_g_per_kg <= 0.0 || macros.fat_floor_g_per_kg <= 0.0 {
            return Err(AppError::config("macro floors must be positive"));
        }
        if !(0.0..1.0).contains(&macros.fat_min_fraction) {
            return Err(AppError::config("fat_min_fraction must be within [0, 1)"));
        }

        self.validate_training()?;
        self.validate_tiers()?;
        self.validate_controller()
    }

    fn validate_training(&self) -> AppResult<()> {
        let training = &self.training;
        if training.minutes_per_set <= 0.0 {
            return Err(AppError::config("minutes_per_set must be positive"));
        }
        if training.max_sets_per_muscle_per_session == 0 {
            return Err(AppError::config(
                "max_sets_per_muscle_per_session must be positive",
            ));
        }
        if training.max_weekly_volume_increase <= 0.0 {
            return Err(AppError::config("max_weekly_volume_increase must be positive"));
        }
        if training.bodyweight_max_gain_rate < 0.0 {
            return Err(AppError::config(
                "bodyweight_max_gain_rate must not be negative",
            ));
        }
        if training
            .objective_min_sessions
            .values()
            .any(|sessions| !(1..=7).contains(sessions))
        {
            return Err(AppError::config(
                "objective minimum sessions must lie within 1..=7",
            ));
        }
        if self.costs.food_cost_per_1000_kcal < 0.0 || self.costs.facility_cost_per_session < 0.0 {
            return Err(AppError::config("costs must not be negative"));
        }
        Ok(())
    }

    fn validate_tiers(&self) -> AppResult<()> {
        for tier in ExperienceTier::ALL {
            let bounds = self.tier(tier)?;
            if bounds.gain_rate_per_extra_session <= 0.0 {
                return Err(AppError::config(format!(
                    "{tier:?} gain_rate_per_extra_session must be positive"
                )));
            }
            for muscle in MuscleGroup::ALL {
                let Some(triple) = bounds.volume.get(&muscle) else {
                    return Err(AppError::config(format!(
                        "{tier:?} tier is missing volume landmarks for {muscle}"
                    )));
                };
                if triple.minimum_effective > triple.maximum_adaptive
                    || triple.maximum_adaptive > triple.maximum_recoverable
                {
                    return Err(AppError::config(format!(
                        "{tier:?} {muscle} landmarks must satisfy floor <= midpoint <= ceiling"
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_controller(&self) -> AppResult<()> {
        let controller = &self.controller;
        for control_loop in ControlLoop::ALL {
            let tuning = controller.tuning(control_loop);
            if tuning.kp < 0.0 || tuning.ki < 0.0 || tuning.kd < 0.0 {
                return Err(AppError::config(format!(
                    "{control_loop} gains must not be negative"
                )));
            }
            if tuning.integral_limit <= 0.0 || tuning.max_step <= 0.0 || tuning.granularity <= 0.0
            {
                return Err(AppError::config(format!(
                    "{control_loop} integral_limit, max_step and granularity must be positive"
                )));
            }
            let steps = tuning.max_step / tuning.granularity;
            if (steps - steps.round()).abs() > 1e-9 {
                return Err(AppError::config(format!(
                    "{control_loop} max_step must be a multiple of granularity"
                )));
            }
        }

        let deload = &controller.deload;
        if deload.min_interval_weeks == 0 || deload.min_interval_weeks > deload.max_interval_weeks
        {
            return Err(AppError::config(
                "deload interval must satisfy 0 < min <= max",
            ));
        }
        if !(0.4..=0.6).contains(&deload.reduction) {
            return Err(AppError::config("deload reduction must lie within 0.4..=0.6"));
        }

        if !(0.0..=1.0).contains(&controller.target_adherence)
            || !(0.0..=1.0).contains(&controller.overload_adherence_threshold)
        {
            return Err(AppError::config("adherence thresholds must lie within [0, 1]"));
        }
        if !(0.0..controller.target_adherence).contains(&deload.fatigue_adherence_threshold) {
            return Err(AppError::config(
                "fatigue_adherence_threshold must lie within [0, target_adherence)",
            ));
        }
        if controller.overload_min_increment < 0.0
            || controller.overload_min_increment > controller.volume.max_step
        {
            return Err(AppError::config(
                "overload_min_increment must lie within [0, volume max_step]",
            ));
        }
        if controller.maintenance_tolerance < 0.0 {
            return Err(AppError::config("maintenance_tolerance must not be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_standard_catalog_is_valid() {
        BoundsCatalog::standard().validate().unwrap();
    }

    #[test]
    fn test_inverted_triple_rejected() {
        let mut catalog = BoundsCatalog::standard();
        catalog
            .tiers
            .get_mut(&ExperienceTier::Beginner)
            .unwrap()
            .volume
            .insert(MuscleGroup::Chest, VolumeLandmarks::new(10, 8, 16));
        let err = catalog.validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalid);
    }

    #[test]
    fn test_surplus_outside_range_rejected() {
        let mut catalog = BoundsCatalog::standard();
        catalog.calories.max_surplus_fraction = 0.3;
        assert!(catalog.validate().is_err());

        let mut catalog = BoundsCatalog::standard();
        catalog.calories.max_deficit_fraction = 0.05;
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_step_must_be_multiple_of_granularity() {
        let mut catalog = BoundsCatalog::standard();
        catalog.controller.calorie.max_step = 520.0;
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_deload_reduction_range() {
        let mut catalog = BoundsCatalog::standard();
        catalog.controller.deload.reduction = 0.7;
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_deload_intervals_must_be_ordered() {
        let mut catalog = BoundsCatalog::standard();
        catalog.controller.deload.min_interval_weeks = 6;
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_fatigue_threshold_below_target_adherence() {
        let mut catalog = BoundsCatalog::standard();
        catalog.controller.deload.fatigue_adherence_threshold =
            catalog.controller.target_adherence;
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_weekly_set_capacity() {
        let training = BoundsCatalog::standard().training;
        // 3 x (60 - 10) / 3 = 50
        assert_eq!(training.weekly_set_capacity(3, 60), 50);
        assert_eq!(training.weekly_set_capacity(2, 10), 0);
    }

    #[test]
    fn test_calorie_range_respects_floor() {
        let calories = BoundsCatalog::standard().calories;
        let (low, high) = calories.range_for(Sex::Female, 1_500.0);
        assert!((low - 1_200.0).abs() < f64::EPSILON);
        assert!((high - 1_725.0).abs() < 1e-9);
    }
}
