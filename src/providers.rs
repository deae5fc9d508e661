// ABOUTME: External collaborator contracts consumed by the planner: progress aggregation, bounds lookup, time
// ABOUTME: Ships a static bounds provider plus system and manually driven clocks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # External Collaborators
//!
//! The planner never computes observed progress or clinical bounds itself. It pulls them
//! through these traits; implementations live with the caller.

use async_trait::async_trait;
use cadence_core::bounds::BoundsCatalog;
use cadence_core::errors::AppResult;
use cadence_core::models::ObservedOutcome;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Source of aggregated progress for one user and period
///
/// This is the only I/O-bound collaborator; the orchestrator bounds every call with a
/// timeout.
#[async_trait]
pub trait ProgressAggregator: Send + Sync {
    /// Aggregate logged progress between `period_start` and `period_end`
    async fn observed_outcome(
        &self,
        user_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> AppResult<ObservedOutcome>;
}

/// Source of the bounds catalog that applies to a user
///
/// The returned catalog is a point-in-time snapshot for one solve or adjust call.
pub trait BoundsProvider: Send + Sync {
    /// Catalog for `user_id`
    ///
    /// # Errors
    ///
    /// Returns an error if no catalog can be produced for the user
    fn catalog_for(&self, user_id: Uuid) -> AppResult<Arc<BoundsCatalog>>;
}

/// Serves one catalog to every user
#[derive(Debug, Clone)]
pub struct StaticBoundsProvider {
    catalog: Arc<BoundsCatalog>,
}

impl StaticBoundsProvider {
    /// Serve `catalog` after validating it
    ///
    /// # Errors
    ///
    /// Returns a config error if the catalog is inconsistent
    pub fn new(catalog: BoundsCatalog) -> AppResult<Self> {
        catalog.validate()?;
        Ok(Self {
            catalog: Arc::new(catalog),
        })
    }
}

impl Default for StaticBoundsProvider {
    fn default() -> Self {
        Self {
            catalog: Arc::new(BoundsCatalog::standard()),
        }
    }
}

impl BoundsProvider for StaticBoundsProvider {
    fn catalog_for(&self, _user_id: Uuid) -> AppResult<Arc<BoundsCatalog>> {
        Ok(Arc::clone(&self.catalog))
    }
}

/// Wall-clock source
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to, for schedulers and tests
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Start at `start`
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    /// Jump to `at`
    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::days(14));
        assert_eq!(clock.now() - start, Duration::days(14));
    }

    #[test]
    fn test_static_provider_rejects_bad_catalog() {
        let mut catalog = BoundsCatalog::standard();
        catalog.assessment_period_days = 0;
        assert!(StaticBoundsProvider::new(catalog).is_err());
    }
}
