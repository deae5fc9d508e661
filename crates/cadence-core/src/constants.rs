// ABOUTME: Domain constants for energy balance, rounding granularity, and intake limits
// ABOUTME: Pure data constants organized by domain, shared by solver, controller, and orchestrator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped by domain. Values that vary by user population belong in the
//! [`BoundsCatalog`](crate::bounds::BoundsCatalog), not here.

/// Energy density and body-mass energy equivalents
///
/// References:
/// - Atwater general factors (USDA Handbook No. 74)
/// - Hall, K.D. (2008). What is the required energy deficit per unit weight loss?
///   <https://doi.org/10.1038/sj.ijo.0803720>
pub mod energy {
    /// Kilocalories per gram of protein
    pub const KCAL_PER_G_PROTEIN: f64 = 4.0;
    /// Kilocalories per gram of carbohydrate
    pub const KCAL_PER_G_CARBS: f64 = 4.0;
    /// Kilocalories per gram of fat
    pub const KCAL_PER_G_FAT: f64 = 9.0;
    /// Approximate energy content of one kilogram of body-mass change
    pub const KCAL_PER_KG_BODY_MASS: f64 = 7700.0;
    /// Days per week, for converting weekly rates into daily energy
    pub const DAYS_PER_WEEK: f64 = 7.0;
    /// Maximum tolerated drift between calories and macro energy (fraction)
    pub const CALORIE_IDENTITY_TOLERANCE: f64 = 0.01;
}

/// Rounding granularity for prescribed values
pub mod granularity {
    /// Daily calorie targets round to the nearest 25 kcal
    pub const CALORIE_STEP: f64 = 25.0;
    /// Session durations round to 5-minute increments
    pub const SESSION_MINUTE_STEP: u32 = 5;
    /// Target rates round to the nearest gram per week
    pub const RATE_STEP_KG: f64 = 0.001;
}

/// Hard limits on what a goal request may ask for
pub mod intake_limits {
    /// Fewest training days per week accepted
    pub const MIN_DAYS_PER_WEEK: u8 = 1;
    /// Most training days per week accepted
    pub const MAX_DAYS_PER_WEEK: u8 = 7;
    /// Shortest session accepted (minutes)
    pub const MIN_SESSION_MINUTES: u32 = 15;
    /// Longest session accepted (minutes)
    pub const MAX_SESSION_MINUTES: u32 = 180;
    /// Largest absolute body-mass change rate accepted (kg/week)
    pub const MAX_ABS_RATE_KG_PER_WEEK: f64 = 1.5;
    /// Maximum |rate| for a maintenance goal (kg/week)
    pub const MAINTENANCE_RATE_TOLERANCE: f64 = 0.1;
    /// Maximum |rate| for a recomposition goal (kg/week)
    pub const RECOMPOSITION_RATE_TOLERANCE: f64 = 0.25;
    /// Longest planning timeline accepted (weeks)
    pub const MAX_TIMELINE_WEEKS: u32 = 104;
    /// Plausible body-mass range (kg)
    pub const BODY_MASS_RANGE_KG: (f64, f64) = (30.0, 300.0);
    /// Plausible baseline expenditure range (kcal/day)
    pub const BASELINE_KCAL_RANGE: (f64, f64) = (1000.0, 6000.0);
}

/// Progress data thresholds
pub mod data_quality {
    /// Confidence applied when progress data quality is high
    pub const HIGH_CONFIDENCE: f64 = 1.0;
    /// Confidence applied when progress data quality is medium
    pub const MEDIUM_CONFIDENCE: f64 = 0.9;
    /// Confidence applied when progress data quality is low
    pub const LOW_CONFIDENCE: f64 = 0.6;
}
