// ABOUTME: Adjustment Controller - discrete-time PID run once per assessment period for each loop
// ABOUTME: Windup clamp, confidence scaling, step clamp, granularity rounding, deload and overload rules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Adjustment Controller
//!
//! `error = target - observed` in the loop's native unit (kg/week for calories,
//! adherence fraction for volume).
//!
//! ```text
//! P = Kp * e
//! I = Ki * clamp(acc + e * T, -limit, +limit)
//! D = Kd * (e - e_prev) / T
//! correction = round(clamp(direction * (P + I + D) * confidence, -max, +max), granularity)
//! ```
//!
//! `T` is the assessment period in weeks. The volume loop actuates inversely: adherence
//! below target means the plan asks too much, so volume comes down.
//!
//! For the volume loop a due deload overrides the PID output before it is computed and
//! leaves the accumulator untouched.

use cadence_core::bounds::BoundsCatalog;
use cadence_core::models::{
    ControlLoop, ControllerState, ControllerStep, Correction, DataQuality, PidTerms,
};
use cadence_core::rounding::round_to_step;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One loop's input for a single period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Planned value in the loop's unit
    pub target: f64,
    /// Observed value in the loop's unit
    pub observed: f64,
    /// Confidence in the observation, `[0, 1]`
    pub confidence: f64,
}

/// Confidence from data quality scaled by how much of the period was logged
#[must_use]
pub fn observation_confidence(quality: DataQuality, logged_days: u32, period_days: u32) -> f64 {
    let coverage = if period_days == 0 {
        0.0
    } else {
        (f64::from(logged_days) / f64::from(period_days)).min(1.0)
    };
    (quality.confidence() * coverage).clamp(0.0, 1.0)
}

const fn direction(control_loop: ControlLoop) -> f64 {
    match control_loop {
        ControlLoop::Calorie => 1.0,
        ControlLoop::Volume => -1.0,
    }
}

/// Whole weeks in one assessment period, at least one
fn whole_period_weeks(catalog: &BoundsCatalog) -> u32 {
    (catalog.period_weeks().round() as u32).max(1)
}

/// Whether the volume loop deloads this period
///
/// A deload is forced at the maximum interval. Between the minimum and maximum interval
/// it comes early when adherence has collapsed to the fatigue threshold; before the
/// minimum interval it never happens.
#[must_use]
pub fn deload_due(state: &ControllerState, adherence: f64, catalog: &BoundsCatalog) -> bool {
    let policy = &catalog.controller.deload;
    let weeks = state.weeks_since_last_deload;
    weeks >= policy.max_interval_weeks
        || (weeks >= policy.min_interval_weeks && adherence <= policy.fatigue_adherence_threshold)
}

/// Compute one bounded correction and the state to persist
///
/// The returned correction magnitude never exceeds the loop's `max_step`. A non-finite
/// observation yields a zero correction and leaves the state untouched.
#[must_use]
pub fn adjust(
    control_loop: ControlLoop,
    observation: Observation,
    state: ControllerState,
    catalog: &BoundsCatalog,
) -> ControllerStep {
    let controller = &catalog.controller;
    let tuning = controller.tuning(control_loop);
    let period = catalog.period_weeks();
    let confidence = observation.confidence.clamp(0.0, 1.0);
    let error = observation.target - observation.observed;

    if !error.is_finite() || !observation.confidence.is_finite() {
        warn!(
            control_loop = %control_loop,
            target = observation.target,
            observed = observation.observed,
            "non-finite observation, holding controller state"
        );
        return ControllerStep {
            control_loop,
            correction: Correction::Delta { amount: 0.0 },
            terms: PidTerms::default(),
            new_state: state,
            overload_floor_applied: false,
        };
    }

    if control_loop == ControlLoop::Volume && deload_due(&state, observation.observed, catalog) {
        debug!(
            weeks_since_last_deload = state.weeks_since_last_deload,
            reduction = controller.deload.reduction,
            "deload override"
        );
        return ControllerStep {
            control_loop,
            correction: Correction::Deload {
                reduction: controller.deload.reduction,
            },
            terms: PidTerms {
                error,
                confidence,
                ..PidTerms::default()
            },
            new_state: ControllerState {
                weeks_since_last_deload: 0,
                ..state
            },
            overload_floor_applied: false,
        };
    }

    let accumulated = (state.accumulated_error + error * period)
        .clamp(-tuning.integral_limit, tuning.integral_limit);
    let proportional = tuning.kp * error;
    let integral = tuning.ki * accumulated;
    let derivative = tuning.kd * (error - state.previous_error) / period;
    let raw = proportional + integral + derivative;

    let scaled = direction(control_loop) * raw * confidence;
    let mut amount = round_to_step(
        scaled.clamp(-tuning.max_step, tuning.max_step),
        tuning.granularity,
    );

    let mut overload_floor_applied = false;
    if control_loop == ControlLoop::Volume
        && observation.observed >= controller.overload_adherence_threshold
    {
        let floor = (controller.overload_min_increment / tuning.granularity).ceil()
            * tuning.granularity;
        let floor = floor.min(tuning.max_step);
        if amount < floor {
            amount = floor;
            overload_floor_applied = true;
        }
    }
    // Normalise -0.0 from rounding a small negative value
    if amount == 0.0 {
        amount = 0.0;
    }

    let weeks_since_last_deload = match control_loop {
        ControlLoop::Volume => state
            .weeks_since_last_deload
            .saturating_add(whole_period_weeks(catalog)),
        ControlLoop::Calorie => state.weeks_since_last_deload,
    };

    debug!(
        control_loop = %control_loop,
        error,
        proportional,
        integral,
        derivative,
        confidence,
        correction = amount,
        "controller step"
    );

    ControllerStep {
        control_loop,
        correction: Correction::Delta { amount },
        terms: PidTerms {
            error,
            proportional,
            integral,
            derivative,
            raw,
            confidence,
        },
        new_state: ControllerState {
            accumulated_error: accumulated,
            previous_error: error,
            weeks_since_last_deload,
        },
        overload_floor_applied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_scales_confidence() {
        let full = observation_confidence(DataQuality::High, 14, 14);
        let half = observation_confidence(DataQuality::Medium, 7, 14);
        assert!((full - 1.0).abs() < f64::EPSILON);
        assert!((half - 0.45).abs() < 1e-12);
        assert!(observation_confidence(DataQuality::High, 20, 14) <= 1.0);
        assert!(observation_confidence(DataQuality::High, 5, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_deload_due_at_max_interval() {
        let catalog = BoundsCatalog::standard();
        let state = ControllerState {
            weeks_since_last_deload: 4,
            ..ControllerState::default()
        };
        assert!(!deload_due(&state, 0.85, &catalog));
        let state = ControllerState {
            weeks_since_last_deload: 5,
            ..state
        };
        assert!(deload_due(&state, 0.85, &catalog));
    }

    #[test]
    fn test_fatigue_deload_respects_min_interval() {
        let catalog = BoundsCatalog::standard();
        let early = ControllerState {
            weeks_since_last_deload: 2,
            ..ControllerState::default()
        };
        let eligible = ControllerState {
            weeks_since_last_deload: 4,
            ..early
        };
        assert!(!deload_due(&early, 0.3, &catalog));
        assert!(deload_due(&eligible, 0.6, &catalog));
        assert!(!deload_due(&eligible, 0.61, &catalog));
    }
}
