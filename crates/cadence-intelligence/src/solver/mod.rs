// ABOUTME: Feasibility Solver - turns a GoalSpec into decision variables or ranked trade options
// ABOUTME: Deterministic constraint search over a small discrete space, plus tolerant and batch modes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Feasibility Solver
//!
//! Hard constraints:
//! - calorie identity (macro energy within 1% of the calorie target)
//! - volume inside each muscle's landmark triple
//! - sessions/week and minutes inside the requested windows
//! - weekly cost within budget, calories inside the safe range, equipment able to
//!   support the rate
//!
//! Soft constraints are folded into one objective: more sessions, shorter sessions, and
//! per-muscle volume close to the adaptive midpoint, weighted by [`SolverPolicy`].
//!
//! When nothing in the preferred space is feasible the solver reports diagnostics and
//! up to three [`TradeOption`]s built from independent relaxations.

mod relaxation;
mod search;
mod tolerant;

pub use tolerant::{TolerantCheck, TolerantOutcome};

use crate::config::SolverPolicy;
use cadence_core::bounds::BoundsCatalog;
use cadence_core::errors::AppResult;
use cadence_core::models::{DecisionVariables, Diagnostic, GoalSpec, TradeOption};
use rayon::prelude::*;
use relaxation::Relaxer;
use search::{RateContext, SearchSpace};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Result of solving one goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SolveOutcome {
    /// One consistent assignment
    Feasible {
        /// The assignment
        variables: DecisionVariables,
    },
    /// No assignment satisfies every hard constraint
    Infeasible {
        /// Violated constraint families, ordered by code
        diagnostics: Vec<Diagnostic>,
        /// Relaxed alternatives ranked A (least relaxed) to C
        options: Vec<TradeOption>,
    },
}

impl SolveOutcome {
    /// Whether the goal was feasible as stated
    #[must_use]
    pub const fn is_feasible(&self) -> bool {
        matches!(self, Self::Feasible { .. })
    }

    /// The assignment, when feasible
    #[must_use]
    pub const fn variables(&self) -> Option<&DecisionVariables> {
        match self {
            Self::Feasible { variables } => Some(variables),
            Self::Infeasible { .. } => None,
        }
    }
}

/// Solver bound to one catalog snapshot and policy
#[derive(Debug, Clone, Copy)]
pub struct FeasibilitySolver<'a> {
    catalog: &'a BoundsCatalog,
    policy: &'a SolverPolicy,
}

impl<'a> FeasibilitySolver<'a> {
    /// Create a solver over a catalog snapshot
    #[must_use]
    pub const fn new(catalog: &'a BoundsCatalog, policy: &'a SolverPolicy) -> Self {
        Self { catalog, policy }
    }

    /// Catalog this solver validates against
    #[must_use]
    pub const fn catalog(&self) -> &'a BoundsCatalog {
        self.catalog
    }

    /// Solve a goal
    ///
    /// Identical inputs always produce identical outputs, including option order.
    ///
    /// # Errors
    ///
    /// Returns a config error if the catalog has no entry for the goal's experience tier.
    pub fn solve(&self, goal: &GoalSpec) -> AppResult<SolveOutcome> {
        let tier = self.catalog.tier(goal.profile().experience)?;
        let space = SearchSpace {
            sessions: goal.days_per_week().preferred(),
            minutes: goal.session_minutes().preferred(),
        };
        let context = RateContext::new(
            goal,
            self.catalog,
            self.policy,
            tier,
            goal.target_rate_kg_per_week(),
        );

        match context.search(&space, |candidate| (candidate.objective, 0.0)) {
            Ok(candidate) => {
                debug!(
                    user_id = %goal.user_id(),
                    sessions = candidate.variables.sessions_per_week,
                    minutes = candidate.variables.session_minutes,
                    calories = candidate.variables.daily_calories,
                    "goal feasible"
                );
                Ok(SolveOutcome::Feasible {
                    variables: candidate.variables,
                })
            }
            Err(diagnostics) => {
                let options = Relaxer {
                    goal,
                    catalog: self.catalog,
                    policy: self.policy,
                    tier,
                }
                .trade_options();
                info!(
                    user_id = %goal.user_id(),
                    diagnostics = diagnostics.len(),
                    options = options.len(),
                    "goal infeasible"
                );
                Ok(SolveOutcome::Infeasible {
                    diagnostics,
                    options,
                })
            }
        }
    }

    /// Solve many goals in parallel, returning results in input order
    #[must_use]
    pub fn solve_batch(&self, goals: &[GoalSpec]) -> Vec<AppResult<SolveOutcome>> {
        goals.par_iter().map(|goal| self.solve(goal)).collect()
    }
}

/// Solve a goal with the default policy
///
/// # Errors
///
/// Returns a config error if the catalog has no entry for the goal's experience tier.
pub fn solve(goal: &GoalSpec, catalog: &BoundsCatalog) -> AppResult<SolveOutcome> {
    FeasibilitySolver::new(catalog, &SolverPolicy::default()).solve(goal)
}
