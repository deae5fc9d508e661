// ABOUTME: Core types and constants for the Cadence adaptive planning platform
// ABOUTME: Foundation crate with error handling, goal/plan models, bounds catalog, and rounding policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Cadence Core
//!
//! Foundation crate providing shared types for the Cadence planner. It holds no
//! algorithms and performs no I/O, so the solver, the controller, and the service
//! layer can all depend on it without pulling in each other.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Energy, granularity, and intake constants organized by domain
//! - **rounding**: Rounding policy for calories, durations, and rates
//! - **models**: Goals, decision variables, plan versions, controller state, adjustment records
//! - **bounds**: The Bounds Catalog of hard numeric limits

/// Unified error handling system with standard error codes
pub mod errors;

/// Domain constants organized by concern
pub mod constants;

/// Numeric rounding policy
pub mod rounding;

/// Core data models
pub mod models;

/// Versioned hard limits shared by solver and controller
pub mod bounds;

pub use bounds::BoundsCatalog;
pub use errors::{AppError, AppResult, ErrorCode};
