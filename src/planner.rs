// ABOUTME: AdaptivePlanner facade - goal intake, reassessment, active plan and history reads, lifecycle phase
// ABOUTME: Wires the solver, orchestrator, store and external collaborators behind one async API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Adaptive Planner
//!
//! ```text
//! NoPlan --intake--> Active --period elapses / manual--> AwaitingReassessment
//!        --lock + aggregate--> Reassessing --commit--> Active(v+1)
//! ```

use crate::config::PlannerConfig;
use crate::locks::ReassessmentLocks;
use crate::orchestrator::{Lineage, ReassessmentOrchestrator};
use crate::providers::{
    BoundsProvider, Clock, ProgressAggregator, StaticBoundsProvider, SystemClock,
};
use crate::store::{PlanCommit, PlanStore};
use cadence_core::errors::{AppError, AppResult};
use cadence_core::models::{
    AdjustmentRecord, ControlLoop, ControllerState, GoalRequest, GoalSpec, PlanOrigin,
    PlanStatus, PlanVersion, ReassessmentTrigger, TrainingPhase,
};
use cadence_intelligence::solver::{FeasibilitySolver, SolveOutcome};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Where a user sits in the planning lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerPhase {
    /// No goal has been accepted yet
    NoPlan,
    /// A plan is in force and its period is still open
    Active,
    /// The assessment period has elapsed
    AwaitingReassessment,
    /// A reassessment holds the user's lock
    Reassessing,
}

impl fmt::Display for PlannerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoPlan => "no_plan",
            Self::Active => "active",
            Self::AwaitingReassessment => "awaiting_reassessment",
            Self::Reassessing => "reassessing",
        })
    }
}

/// Every plan version and adjustment record for one user, ascending by version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanHistory {
    /// Plan versions
    pub versions: Vec<PlanVersion>,
    /// Adjustment records
    pub adjustments: Vec<AdjustmentRecord>,
}

/// Service entry point for intake, reassessment and plan reads
pub struct AdaptivePlanner {
    store: Arc<dyn PlanStore>,
    bounds: Arc<dyn BoundsProvider>,
    clock: Arc<dyn Clock>,
    locks: Arc<ReassessmentLocks>,
    config: Arc<PlannerConfig>,
    orchestrator: ReassessmentOrchestrator,
}

/// Builder for [`AdaptivePlanner`]
pub struct AdaptivePlannerBuilder {
    config: PlannerConfig,
    store: Arc<dyn PlanStore>,
    aggregator: Arc<dyn ProgressAggregator>,
    bounds: Option<Arc<dyn BoundsProvider>>,
    clock: Arc<dyn Clock>,
}

impl AdaptivePlannerBuilder {
    /// Override the bounds provider; defaults to the configured catalog for every user
    #[must_use]
    pub fn bounds(mut self, bounds: Arc<dyn BoundsProvider>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Override the clock; defaults to system time
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration and build the planner
    ///
    /// # Errors
    ///
    /// Returns a config error if the configuration or catalog is inconsistent
    pub fn build(self) -> AppResult<AdaptivePlanner> {
        self.config.validate()?;
        let bounds = match self.bounds {
            Some(bounds) => bounds,
            None => Arc::new(StaticBoundsProvider::new(self.config.catalog.clone())?),
        };
        let config = Arc::new(self.config);
        let locks = Arc::new(ReassessmentLocks::new());
        let orchestrator = ReassessmentOrchestrator::new(
            Arc::clone(&self.store),
            self.aggregator,
            Arc::clone(&bounds),
            Arc::clone(&self.clock),
            Arc::clone(&locks),
            Arc::clone(&config),
        );
        Ok(AdaptivePlanner {
            store: self.store,
            bounds,
            clock: self.clock,
            locks,
            config,
            orchestrator,
        })
    }
}

impl AdaptivePlanner {
    /// Start building a planner over a store and progress aggregator
    #[must_use]
    pub fn builder(
        config: PlannerConfig,
        store: Arc<dyn PlanStore>,
        aggregator: Arc<dyn ProgressAggregator>,
    ) -> AdaptivePlannerBuilder {
        AdaptivePlannerBuilder {
            config,
            store,
            aggregator,
            bounds: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Configuration in force
    #[must_use]
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Validate a raw request and run intake
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the offending field, or any error from
    /// [`Self::intake`]
    pub async fn intake_request(&self, request: GoalRequest) -> AppResult<SolveOutcome> {
        let goal = GoalSpec::try_from(request)?;
        self.intake(goal).await
    }

    /// Solve a goal and, when feasible, make it the user's active plan
    ///
    /// A user with an existing plan gets a fresh intake version; the old one is archived
    /// and controller state starts over. Infeasible goals persist nothing.
    ///
    /// # Errors
    ///
    /// Returns `CONCURRENT_REASSESSMENT` if a reassessment for the user is in flight, or
    /// store and config errors from collaborators
    pub async fn intake(&self, goal: GoalSpec) -> AppResult<SolveOutcome> {
        let user_id = goal.user_id();
        let catalog = self.bounds.catalog_for(user_id)?;
        let outcome = FeasibilitySolver::new(&catalog, &self.config.solver).solve(&goal)?;

        let Some(variables) = outcome.variables().cloned() else {
            info!(user_id = %user_id, "intake infeasible, nothing persisted");
            return Ok(outcome);
        };

        let _guard = self.locks.try_acquire(user_id)?;
        let current = self.store.active_plan(user_id).await?;
        let now = self.clock.now();
        let version = PlanVersion {
            user_id,
            version: current.as_ref().map_or(1, |v| v.version + 1),
            status: PlanStatus::Active,
            origin: PlanOrigin::Intake,
            phase: TrainingPhase::Accumulation,
            goal,
            variables,
            created_at: now,
            valid_from: now,
            valid_until: None,
        };
        let number = version.version;

        self.store
            .commit(PlanCommit {
                user_id,
                expected_active: current.as_ref().map(|v| v.version),
                version: Some(version),
                retire_as: PlanStatus::Archived,
                record: None,
                controller_states: ControlLoop::ALL
                    .into_iter()
                    .map(|l| (l, ControllerState::default()))
                    .collect::<BTreeMap<_, _>>(),
                committed_at: now,
            })
            .await?;

        info!(
            user_id = %user_id,
            version = number,
            replaced = ?current.map(|v| v.version),
            "intake accepted"
        );
        Ok(outcome)
    }

    /// Run one reassessment for a user
    ///
    /// # Errors
    ///
    /// See [`ReassessmentOrchestrator::reassess`]
    pub async fn reassess(
        &self,
        user_id: Uuid,
        trigger: ReassessmentTrigger,
    ) -> AppResult<AdjustmentRecord> {
        self.orchestrator.reassess(user_id, trigger).await
    }

    /// The user's active plan
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` before the first successful intake
    pub async fn active_plan(&self, user_id: Uuid) -> AppResult<PlanVersion> {
        self.store.active_plan(user_id).await?.ok_or_else(|| {
            AppError::not_found(format!("Active plan for user {user_id}")).with_user_id(user_id)
        })
    }

    /// Every version and adjustment record for the user
    ///
    /// # Errors
    ///
    /// Returns store errors
    pub async fn history(&self, user_id: Uuid) -> AppResult<PlanHistory> {
        Ok(PlanHistory {
            versions: self.store.plan_versions(user_id).await?,
            adjustments: self.store.adjustment_records(user_id).await?,
        })
    }

    /// Lifecycle phase of the user right now
    ///
    /// # Errors
    ///
    /// Returns store or config errors
    pub async fn phase(&self, user_id: Uuid) -> AppResult<PlannerPhase> {
        if self.locks.is_held(user_id) {
            return Ok(PlannerPhase::Reassessing);
        }
        let versions = self.store.plan_versions(user_id).await?;
        if !versions.iter().any(PlanVersion::is_active) {
            return Ok(PlannerPhase::NoPlan);
        }
        let records = self.store.adjustment_records(user_id).await?;
        let Some(lineage) = Lineage::resolve(&versions, &records) else {
            return Ok(PlannerPhase::Active);
        };
        let catalog = self.bounds.catalog_for(user_id)?;
        let period = Duration::days(i64::from(catalog.assessment_period_days));
        if self.clock.now() >= lineage.anchor + period {
            Ok(PlannerPhase::AwaitingReassessment)
        } else {
            Ok(PlannerPhase::Active)
        }
    }
}
