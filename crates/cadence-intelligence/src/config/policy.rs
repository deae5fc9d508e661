// ABOUTME: Solver policy - relaxation step sizes, trade-option count, and objective weights
// ABOUTME: Empirically chosen knobs kept configurable rather than baked into the search
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Solver policy configuration
//!
//! # Scientific References
//!
//! - Protein: Morton et al. (2018) DOI: 10.1136/bjsports-2017-097608
//! - Protein in energy deficit: Helms et al. (2014) DOI: 10.1186/1550-2783-11-20

use super::error::ConfigError;
use cadence_core::models::Objective;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest number of trade options the solver will ever report
pub const MAX_TRADE_OPTIONS: usize = 3;

/// Weights of the soft-constraint objective terms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    /// Preference for more sessions per week
    pub frequency: f64,
    /// Preference for shorter sessions
    pub short_sessions: f64,
    /// Preference for per-muscle volume near the adaptive midpoint
    pub balance: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            short_sessions: 0.5,
            balance: 2.0,
        }
    }
}

/// Tunable solver policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverPolicy {
    /// Step by which the rate relaxation moves the target toward zero (kg/week)
    pub rate_step_kg: f64,
    /// Trade options reported when infeasible (1..=3)
    pub max_trade_options: usize,
    /// Soft-constraint weights
    pub weights: ObjectiveWeights,
    /// Objective-specific protein targets (g per kg body mass)
    pub protein_targets_g_per_kg: BTreeMap<Objective, f64>,
    /// Preferred fat share of daily calories
    pub fat_target_fraction: f64,
    /// Relative half-width of reported outcome ranges
    pub outcome_uncertainty: f64,
    /// Score penalty for fully widening frequency/duration
    pub schedule_penalty: f64,
    /// Score penalty for relaxing the rate all the way to zero
    pub rate_penalty: f64,
}

impl Default for SolverPolicy {
    fn default() -> Self {
        Self {
            rate_step_kg: 0.05,
            max_trade_options: MAX_TRADE_OPTIONS,
            weights: ObjectiveWeights::default(),
            protein_targets_g_per_kg: BTreeMap::from([
                (Objective::FatLoss, 2.2),
                (Objective::MuscleGain, 2.0),
                (Objective::Recomposition, 2.2),
                (Objective::Maintenance, 1.6),
                (Objective::Performance, 1.8),
            ]),
            fat_target_fraction: 0.25,
            outcome_uncertainty: 0.25,
            schedule_penalty: 0.4,
            rate_penalty: 0.6,
        }
    }
}

impl SolverPolicy {
    /// Protein target for an objective (0 if unlisted, so the catalog floor applies)
    #[must_use]
    pub fn protein_target(&self, objective: Objective) -> f64 {
        self.protein_targets_g_per_kg
            .get(&objective)
            .copied()
            .unwrap_or(0.0)
    }

    /// Validate the policy
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` naming the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rate_step_kg > 0.0 && self.rate_step_kg <= 0.5) {
            return Err(ConfigError::InvalidRange(
                "rate_step_kg must lie within (0, 0.5]",
            ));
        }
        if !(1..=MAX_TRADE_OPTIONS).contains(&self.max_trade_options) {
            return Err(ConfigError::InvalidRange(
                "max_trade_options must lie within 1..=3",
            ));
        }
        let weights = self.weights;
        if weights.frequency < 0.0 || weights.short_sessions < 0.0 || weights.balance < 0.0 {
            return Err(ConfigError::InvalidWeights(
                "objective weights must not be negative",
            ));
        }
        if weights.frequency + weights.short_sessions + weights.balance <= 0.0 {
            return Err(ConfigError::InvalidWeights(
                "at least one objective weight must be positive",
            ));
        }
        if self.protein_targets_g_per_kg.values().any(|g| *g < 0.0) {
            return Err(ConfigError::InvalidRange(
                "protein targets must not be negative",
            ));
        }
        if !(0.0..1.0).contains(&self.fat_target_fraction) {
            return Err(ConfigError::InvalidRange(
                "fat_target_fraction must lie within [0, 1)",
            ));
        }
        if !(0.0..1.0).contains(&self.outcome_uncertainty) {
            return Err(ConfigError::InvalidRange(
                "outcome_uncertainty must lie within [0, 1)",
            ));
        }
        if self.schedule_penalty < 0.0 || self.rate_penalty < 0.0 {
            return Err(ConfigError::InvalidWeights(
                "relaxation penalties must not be negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        SolverPolicy::default().validate().unwrap();
    }

    #[test]
    fn test_trade_option_count_bounded() {
        let policy = SolverPolicy {
            max_trade_options: 4,
            ..SolverPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(ConfigError::InvalidRange(_))
        ));

        let policy = SolverPolicy {
            max_trade_options: 0,
            ..SolverPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_zero_rate_step_rejected() {
        let policy = SolverPolicy {
            rate_step_kg: 0.0,
            ..SolverPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_all_zero_weights_rejected() {
        let policy = SolverPolicy {
            weights: ObjectiveWeights {
                frequency: 0.0,
                short_sessions: 0.0,
                balance: 0.0,
            },
            ..SolverPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(ConfigError::InvalidWeights(_))
        ));
    }
}
