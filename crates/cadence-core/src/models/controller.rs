// ABOUTME: Controller models - control loops, persistent PID state, and per-step results
// ABOUTME: State is mutated once per completed assessment period and never rolled back
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two independent feedback loops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlLoop {
    /// Daily calories driven by observed body-mass rate (kg/week)
    Calorie,
    /// Weekly sets driven by training adherence (fraction)
    Volume,
}

impl ControlLoop {
    /// Both loops in evaluation order
    pub const ALL: [Self; 2] = [Self::Calorie, Self::Volume];

    /// Stable storage name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Calorie => "calorie",
            Self::Volume => "volume",
        }
    }

    /// Parse a storage name
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "calorie" => Some(Self::Calorie),
            "volume" => Some(Self::Volume),
            _ => None,
        }
    }

    /// Unit of the loop's correction
    #[must_use]
    pub const fn unit(&self) -> &'static str {
        match self {
            Self::Calorie => "kcal/day",
            Self::Volume => "sets/week",
        }
    }
}

impl fmt::Display for ControlLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent per-user, per-loop controller memory
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControllerState {
    /// Integral accumulator (error x weeks), kept within the windup limit
    pub accumulated_error: f64,
    /// Error observed in the previous period
    pub previous_error: f64,
    /// Weeks of training since the last deload
    pub weeks_since_last_deload: u32,
}

/// Individual controller contributions before confidence scaling
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidTerms {
    /// Error for the period (target - observed)
    pub error: f64,
    /// Proportional contribution
    pub proportional: f64,
    /// Integral contribution
    pub integral: f64,
    /// Derivative contribution
    pub derivative: f64,
    /// Sum of the three contributions
    pub raw: f64,
    /// Confidence scalar applied to the raw output
    pub confidence: f64,
}

/// Correction emitted by one controller step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Correction {
    /// Additive change in the loop's unit, already clamped and rounded
    Delta {
        /// Signed change
        amount: f64,
    },
    /// Explicit deload override
    Deload {
        /// Fraction of volume removed (0.4..=0.6)
        reduction: f64,
    },
}

impl Correction {
    /// No change
    pub const NONE: Self = Self::Delta { amount: 0.0 };

    /// Additive amount, zero for a deload
    #[must_use]
    pub const fn amount(&self) -> f64 {
        match self {
            Self::Delta { amount } => *amount,
            Self::Deload { .. } => 0.0,
        }
    }

    /// Whether this is a deload override
    #[must_use]
    pub const fn is_deload(&self) -> bool {
        matches!(self, Self::Deload { .. })
    }

    /// Whether the correction leaves the plan unchanged
    #[must_use]
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Delta { amount } if *amount == 0.0)
    }
}

/// Outcome of one controller invocation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerStep {
    /// Loop the step belongs to
    pub control_loop: ControlLoop,
    /// Final correction
    pub correction: Correction,
    /// PID contributions (all zero for a deload)
    pub terms: PidTerms,
    /// State to persist for the next period
    pub new_state: ControllerState,
    /// Whether the progressive-overload floor replaced the PID output
    pub overload_floor_applied: bool,
}

/// Bucket for observed/target progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressTrend {
    /// Above 130% of target, same sign
    Exceeding,
    /// Between 70% and 130% of target
    OnTrack,
    /// Between 30% and 70% of target
    Slow,
    /// Below 30% of target in magnitude
    Stalled,
    /// Moving opposite to the target
    Regressing,
}

impl ProgressTrend {
    /// Short phrase for rationale text
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Exceeding => "progress is exceeding target",
            Self::OnTrack => "progress is on track",
            Self::Slow => "progress is slower than planned",
            Self::Stalled => "progress has stalled",
            Self::Regressing => "progress is moving away from target",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correction_serializes_tagged() {
        let json = serde_json::to_value(Correction::Deload { reduction: 0.5 }).unwrap();
        assert_eq!(json["kind"], "deload");
        assert!((json["reduction"].as_f64().unwrap() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_correction_helpers() {
        assert!(Correction::NONE.is_zero());
        assert!(!Correction::Delta { amount: 50.0 }.is_zero());
        assert!(Correction::Deload { reduction: 0.5 }.is_deload());
        assert!(Correction::Deload { reduction: 0.5 }.amount().abs() < f64::EPSILON);
    }

    #[test]
    fn test_loop_names() {
        for control_loop in ControlLoop::ALL {
            assert_eq!(ControlLoop::parse(control_loop.as_str()), Some(control_loop));
        }
    }
}
