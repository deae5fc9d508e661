// ABOUTME: Configuration error types for solver policy and planner configuration validation
// ABOUTME: Defines error variants for invalid ranges, parse failures, and weight misconfiguration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration error types.

use cadence_core::errors::AppError;
use std::env;
use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Value outside acceptable range
    #[error("Invalid range: {0}")]
    InvalidRange(&'static str),

    /// Environment variable access error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] env::VarError),

    /// Failed to parse configuration value
    #[error("Parse error: {0}")]
    Parse(String),

    /// Objective weights are unusable
    #[error("Invalid weights: {0}")]
    InvalidWeights(&'static str),

    /// Bounds catalog failed validation
    #[error("Invalid bounds catalog: {0}")]
    Catalog(String),
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        Self::config(error.to_string())
    }
}
