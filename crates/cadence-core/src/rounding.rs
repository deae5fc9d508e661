// ABOUTME: Numeric rounding policy for prescribed calories, durations, volumes, and rates
// ABOUTME: Round-half-away-from-zero helpers shared by the solver and the controller
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::constants::granularity::{CALORIE_STEP, RATE_STEP_KG, SESSION_MINUTE_STEP};

/// Round `value` to the nearest multiple of `step` (half away from zero)
#[must_use]
pub fn round_to_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    (value / step).round() * step
}

/// Round a daily calorie target to the nearest 25 kcal
#[must_use]
pub fn round_calories(kcal: f64) -> f64 {
    round_to_step(kcal, CALORIE_STEP)
}

/// Round a rate of change to whole grams per week
///
/// Relaxation steps subtract binary fractions repeatedly; snapping to grams keeps
/// `0.3 - 3 * 0.05` equal to `0.15` instead of `0.15000000000000002`.
#[must_use]
pub fn round_rate(kg_per_week: f64) -> f64 {
    let scale = RATE_STEP_KG.recip();
    let rounded = (kg_per_week * scale).round() / scale;
    // Normalise -0.0 so serialized output stays stable
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Round session minutes to the nearest 5-minute increment
#[must_use]
pub fn round_minutes(minutes: f64) -> u32 {
    let step = f64::from(SESSION_MINUTE_STEP);
    round_to_step(minutes.max(0.0), step) as u32
}

/// Ceiling that ignores floating-point noise just above an integer
#[must_use]
pub fn ceil_tolerant(value: f64) -> f64 {
    (value - 1e-9).ceil()
}

/// Clamp `value` into `[min, max]`, preferring `min` if the range is inverted
#[must_use]
pub fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if max < min {
        return min;
    }
    value.clamp(min, max)
}
