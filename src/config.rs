// ABOUTME: Planner service configuration loaded from defaults, CADENCE_* environment overrides and validation
// ABOUTME: Carries the aggregation timeout, data sufficiency threshold, storage URL, solver policy and catalog
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use cadence_core::bounds::BoundsCatalog;
use cadence_intelligence::{ConfigError, SolverPolicy};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default upper bound on one progress aggregation call
pub const DEFAULT_AGGREGATION_TIMEOUT_MS: u64 = 5_000;
/// Default minimum logged days per assessment period before a correction is computed
pub const DEFAULT_MIN_LOGGED_DAYS: u32 = 7;
/// Default store location
pub const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";

/// Planner service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Upper bound on one progress aggregation call
    pub aggregation_timeout: Duration,
    /// Logged days below which a period counts as insufficient data
    pub min_logged_days: u32,
    /// Store connection string
    pub database_url: String,
    /// Relaxation and objective policy for the solver
    pub solver: SolverPolicy,
    /// Bounds catalog served by the static provider
    pub catalog: BoundsCatalog,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            aggregation_timeout: Duration::from_millis(DEFAULT_AGGREGATION_TIMEOUT_MS),
            min_logged_days: DEFAULT_MIN_LOGGED_DAYS,
            database_url: DEFAULT_DATABASE_URL.into(),
            solver: SolverPolicy::default(),
            catalog: BoundsCatalog::standard(),
        }
    }
}

impl PlannerConfig {
    /// Load configuration: defaults, then environment overrides, then validation
    ///
    /// # Errors
    ///
    /// Returns an error if an override fails to parse or the result is inconsistent
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::default().apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Check every cross-field constraint
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aggregation_timeout.is_zero() {
            return Err(ConfigError::InvalidRange(
                "aggregation timeout must be positive",
            ));
        }
        if self.min_logged_days > self.catalog.assessment_period_days {
            return Err(ConfigError::InvalidRange(
                "min_logged_days cannot exceed the assessment period",
            ));
        }
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Parse("database URL must not be empty".into()));
        }
        self.solver.validate()?;
        self.catalog
            .validate()
            .map_err(|e| ConfigError::Catalog(e.message))
    }

    /// Helper function to parse and apply an environment variable override
    fn apply_env_var<T: FromStr>(env_var_name: &str, target: &mut T) -> Result<(), ConfigError> {
        if let Ok(val) = env::var(env_var_name) {
            *target = val
                .parse()
                .map_err(|_| ConfigError::Parse(format!("Invalid {env_var_name}")))?;
        }
        Ok(())
    }

    fn apply_env_overrides(mut self) -> Result<Self, ConfigError> {
        let mut timeout_ms = u64::try_from(self.aggregation_timeout.as_millis())
            .unwrap_or(DEFAULT_AGGREGATION_TIMEOUT_MS);
        Self::apply_env_var("CADENCE_AGGREGATION_TIMEOUT_MS", &mut timeout_ms)?;
        self.aggregation_timeout = Duration::from_millis(timeout_ms);

        Self::apply_env_var("CADENCE_MIN_LOGGED_DAYS", &mut self.min_logged_days)?;
        Self::apply_env_var("CADENCE_DATABASE_URL", &mut self.database_url)?;

        // Solver policy
        Self::apply_env_var("CADENCE_RELAXATION_RATE_STEP", &mut self.solver.rate_step_kg)?;
        Self::apply_env_var(
            "CADENCE_MAX_TRADE_OPTIONS",
            &mut self.solver.max_trade_options,
        )?;

        // Catalog
        Self::apply_env_var(
            "CADENCE_ASSESSMENT_PERIOD_DAYS",
            &mut self.catalog.assessment_period_days,
        )?;
        Self::apply_env_var(
            "CADENCE_DELOAD_MAX_INTERVAL_WEEKS",
            &mut self.catalog.controller.deload.max_interval_weeks,
        )?;
        Self::apply_env_var(
            "CADENCE_CALORIE_MAX_STEP",
            &mut self.catalog.controller.calorie.max_step,
        )?;
        Self::apply_env_var(
            "CADENCE_VOLUME_MAX_STEP",
            &mut self.catalog.controller.volume.max_step,
        )?;

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(PlannerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_min_logged_days_bounded_by_period() {
        let config = PlannerConfig {
            min_logged_days: 30,
            ..PlannerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = PlannerConfig {
            aggregation_timeout: Duration::ZERO,
            ..PlannerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
