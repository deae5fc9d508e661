// ABOUTME: Per-user reassessment locks built on DashMap and owned tokio mutex guards
// ABOUTME: Acquisition never waits; a held lock surfaces as a retryable concurrent-reassessment error
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use cadence_core::errors::{AppError, AppResult};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;
use uuid::Uuid;

/// One mutex per user; users never contend with each other
#[derive(Debug, Default)]
pub struct ReassessmentLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

/// Held for the duration of one transition; released on drop
#[derive(Debug)]
pub struct ReassessmentGuard {
    user_id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl ReassessmentGuard {
    /// User the guard belongs to
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.user_id
    }
}

impl ReassessmentLocks {
    /// Create an empty lock table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        // Clone out of the shard before locking so the map entry is not held
        Arc::clone(self.locks.entry(user_id).or_default().value())
    }

    /// Take the user's lock without waiting
    ///
    /// # Errors
    ///
    /// Returns `CONCURRENT_REASSESSMENT` if another transition holds the lock
    pub fn try_acquire(&self, user_id: Uuid) -> AppResult<ReassessmentGuard> {
        self.lock_for(user_id)
            .try_lock_owned()
            .map(|guard| ReassessmentGuard {
                user_id,
                _guard: guard,
            })
            .map_err(|_| {
                warn!(user_id = %user_id, "reassessment lock contended");
                AppError::concurrent_reassessment(user_id)
            })
    }

    /// Whether a transition currently holds the user's lock
    #[must_use]
    pub fn is_held(&self, user_id: Uuid) -> bool {
        self.locks
            .get(&user_id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }
}
