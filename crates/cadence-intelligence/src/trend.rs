// ABOUTME: Progress trend classification from the observed/target ratio
// ABOUTME: Annotates adjustment records only; never gates the controller
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use cadence_core::models::ProgressTrend;

/// Ratio above which progress counts as exceeding the target
pub const EXCEEDING_RATIO: f64 = 1.3;
/// Ratio at or above which progress counts as on track
pub const ON_TRACK_RATIO: f64 = 0.7;
/// Ratio at or above which progress counts as slow rather than stalled
pub const SLOW_RATIO: f64 = 0.3;

/// Bucket observed progress against its target
///
/// A zero target has no meaningful ratio, so `zero_target_tolerance` decides between
/// on-track and exceeding instead.
#[must_use]
pub fn classify_trend(target: f64, observed: f64, zero_target_tolerance: f64) -> ProgressTrend {
    if target.abs() < f64::EPSILON {
        return if observed.abs() <= zero_target_tolerance {
            ProgressTrend::OnTrack
        } else {
            ProgressTrend::Exceeding
        };
    }
    if observed * target < 0.0 {
        return ProgressTrend::Regressing;
    }

    let ratio = observed / target;
    if ratio > EXCEEDING_RATIO {
        ProgressTrend::Exceeding
    } else if ratio >= ON_TRACK_RATIO {
        ProgressTrend::OnTrack
    } else if ratio >= SLOW_RATIO {
        ProgressTrend::Slow
    } else {
        ProgressTrend::Stalled
    }
}
