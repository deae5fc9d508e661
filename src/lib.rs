// ABOUTME: Main library entry point for the Cadence adaptive planner service layer
// ABOUTME: Wires feasibility solving and PID reassessment to versioned plan storage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Cadence Planner
//!
//! An adaptive training and nutrition planner. A goal goes through a feasibility
//! solver that either produces concrete weekly targets or explains which constraints
//! conflict and what to trade. Once a plan is active, periodic reassessments compare
//! observed progress with the plan and let two PID loops nudge calories and training
//! volume, always inside the bounds catalog. Every change lands as a new immutable plan
//! version with an adjustment record explaining it.
//!
//! ## Architecture
//!
//! - **cadence-core**: errors, models, bounds catalog, rounding
//! - **cadence-intelligence**: solver, controller, trend classification
//! - **store**: plan version store with in-memory and `SQLite` backends
//! - **orchestrator**: one reassessment from aggregation to committed version
//! - **planner**: the `AdaptivePlanner` facade callers talk to
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_planner::config::PlannerConfig;
//! use cadence_planner::store::SqlitePlanStore;
//! use cadence_planner::providers::ProgressAggregator;
//! use cadence_planner::AdaptivePlanner;
//! use std::sync::Arc;
//!
//! # async fn run(aggregator: Arc<dyn ProgressAggregator>) -> cadence_core::AppResult<()> {
//! let config = PlannerConfig::load()?;
//! let store = SqlitePlanStore::from_config(&config).await?;
//! let planner = AdaptivePlanner::builder(config, Arc::new(store), aggregator).build()?;
//! # let _ = planner;
//! # Ok(())
//! # }
//! ```

/// Environment-driven planner configuration
pub mod config;

/// Per-user reassessment locks
pub mod locks;

/// Structured logging setup
pub mod logging;

/// Reassessment orchestration
pub mod orchestrator;

/// Service facade
pub mod planner;

/// External collaborator contracts
pub mod providers;

/// Plan version store
pub mod store;

pub use cadence_core;
pub use cadence_intelligence;

pub use config::PlannerConfig;
pub use orchestrator::ReassessmentOrchestrator;
pub use planner::{AdaptivePlanner, AdaptivePlannerBuilder, PlanHistory, PlannerPhase};
pub use providers::{
    BoundsProvider, Clock, ManualClock, ProgressAggregator, StaticBoundsProvider, SystemClock,
};
#[cfg(feature = "sqlite")]
pub use store::SqlitePlanStore;
pub use store::{InMemoryPlanStore, PlanCommit, PlanStore};
