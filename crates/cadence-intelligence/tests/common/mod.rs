// ABOUTME: Shared goal builders for solver and controller integration tests
// ABOUTME: Produces validated GoalSpec values with overridable fields
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(dead_code)]

use cadence_core::models::{
    AthleteProfile, AvailabilityWindow, Equipment, ExperienceTier, GoalRequest, GoalSpec,
    Objective, Sex,
};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Intermediate male lifter asking for a moderate gain on a flexible schedule
pub fn gain_request() -> GoalRequest {
    GoalRequest {
        user_id: Some(Uuid::new_v4()),
        objective: Some(Objective::MuscleGain),
        target_rate_kg_per_week: Some(0.25),
        timeline_weeks: Some(12),
        days_per_week: Some(AvailabilityWindow::flexible(3, 4, 2, 5)),
        session_minutes: Some(AvailabilityWindow::flexible(45, 75, 30, 90)),
        equipment: Some(BTreeSet::from([Equipment::Dumbbells, Equipment::Barbell])),
        weekly_budget: Some(150.0),
        profile: Some(AthleteProfile {
            sex: Sex::Male,
            body_mass_kg: 80.0,
            baseline_kcal: 2_700.0,
            experience: ExperienceTier::Intermediate,
        }),
    }
}

pub fn goal(request: GoalRequest) -> GoalSpec {
    GoalSpec::try_from(request).unwrap()
}

/// +0.3 kg/week on a hard two-day, one-hour schedule
pub fn two_day_gain_goal() -> GoalSpec {
    goal(GoalRequest {
        target_rate_kg_per_week: Some(0.3),
        days_per_week: Some(AvailabilityWindow::fixed(2, 2)),
        session_minutes: Some(AvailabilityWindow::fixed(60, 60)),
        ..gain_request()
    })
}

/// Female fat-loss goal asking for more deficit than the calorie floor allows
pub fn aggressive_cut_goal() -> GoalSpec {
    goal(GoalRequest {
        objective: Some(Objective::FatLoss),
        target_rate_kg_per_week: Some(-0.5),
        profile: Some(AthleteProfile {
            sex: Sex::Female,
            body_mass_kg: 60.0,
            baseline_kcal: 1_500.0,
            experience: ExperienceTier::Beginner,
        }),
        ..gain_request()
    })
}
