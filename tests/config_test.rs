// ABOUTME: Integration tests for environment-driven planner configuration
// ABOUTME: Runs serially because every case mutates process environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use cadence_intelligence::ConfigError;
use cadence_planner::config::{PlannerConfig, DEFAULT_DATABASE_URL};
use serial_test::serial;
use std::env;
use std::time::Duration;

const VARS: [&str; 9] = [
    "CADENCE_AGGREGATION_TIMEOUT_MS",
    "CADENCE_MIN_LOGGED_DAYS",
    "CADENCE_DATABASE_URL",
    "CADENCE_RELAXATION_RATE_STEP",
    "CADENCE_MAX_TRADE_OPTIONS",
    "CADENCE_ASSESSMENT_PERIOD_DAYS",
    "CADENCE_DELOAD_MAX_INTERVAL_WEEKS",
    "CADENCE_CALORIE_MAX_STEP",
    "CADENCE_VOLUME_MAX_STEP",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_load_without_overrides_matches_defaults() {
    clear_env();
    let config = PlannerConfig::load().unwrap();
    assert_eq!(config, PlannerConfig::default());
    assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
}

#[test]
#[serial]
fn test_environment_overrides_apply() {
    clear_env();
    env::set_var("CADENCE_AGGREGATION_TIMEOUT_MS", "250");
    env::set_var("CADENCE_MIN_LOGGED_DAYS", "10");
    env::set_var("CADENCE_DATABASE_URL", "sqlite://plans.db");
    env::set_var("CADENCE_MAX_TRADE_OPTIONS", "2");
    env::set_var("CADENCE_ASSESSMENT_PERIOD_DAYS", "21");
    env::set_var("CADENCE_CALORIE_MAX_STEP", "300");

    let config = PlannerConfig::load().unwrap();
    clear_env();

    assert_eq!(config.aggregation_timeout, Duration::from_millis(250));
    assert_eq!(config.min_logged_days, 10);
    assert_eq!(config.database_url, "sqlite://plans.db");
    assert_eq!(config.solver.max_trade_options, 2);
    assert_eq!(config.catalog.assessment_period_days, 21);
    assert!((config.catalog.controller.calorie.max_step - 300.0).abs() < f64::EPSILON);
}

#[test]
#[serial]
fn test_unparseable_override_is_reported() {
    clear_env();
    env::set_var("CADENCE_MIN_LOGGED_DAYS", "a week");
    let result = PlannerConfig::load();
    clear_env();

    match result {
        Err(ConfigError::Parse(message)) => assert!(message.contains("CADENCE_MIN_LOGGED_DAYS")),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_inconsistent_override_fails_validation() {
    clear_env();
    env::set_var("CADENCE_ASSESSMENT_PERIOD_DAYS", "5");
    let result = PlannerConfig::load();
    clear_env();

    // Default minimum of seven logged days cannot fit in a five-day period
    assert!(matches!(result, Err(ConfigError::InvalidRange(_))));
}

#[test]
#[serial]
fn test_zero_period_rejected_by_catalog() {
    clear_env();
    env::set_var("CADENCE_ASSESSMENT_PERIOD_DAYS", "0");
    env::set_var("CADENCE_MIN_LOGGED_DAYS", "0");
    let result = PlannerConfig::load();
    clear_env();

    assert!(matches!(result, Err(ConfigError::Catalog(_))));
}
