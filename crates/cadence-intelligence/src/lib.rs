// ABOUTME: Feasibility solver and adaptive controller for Cadence program planning
// ABOUTME: Pure functions over explicit inputs; no shared mutable state, no I/O
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Cadence Intelligence
//!
//! The two algorithmic subsystems of the planner:
//!
//! - **solver**: constraint feasibility search producing decision variables or trade options
//! - **controller**: per-period PID correction for the calorie and volume loops
//! - **trend**: progress classification used to annotate adjustment records
//! - **config**: solver policy and configuration errors
//!
//! Everything here is synchronous and stateless with respect to its arguments, so calls
//! for different users may run on any number of threads concurrently.

/// Solver policy and configuration errors
pub mod config;
/// PID adjustment controller
pub mod controller;
/// Feasibility solver
pub mod solver;
/// Progress trend classification
pub mod trend;

pub use config::{ConfigError, SolverPolicy};
pub use controller::{adjust, observation_confidence, Observation};
pub use solver::{solve, FeasibilitySolver, SolveOutcome, TolerantCheck, TolerantOutcome};
pub use trend::classify_trend;
