// ABOUTME: Configuration for the solver and controller algorithms
// ABOUTME: Exposes the solver policy and the shared configuration error type
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Configuration error types
pub mod error;
/// Solver policy knobs
pub mod policy;

pub use error::ConfigError;
pub use policy::{ObjectiveWeights, SolverPolicy, MAX_TRADE_OPTIONS};
