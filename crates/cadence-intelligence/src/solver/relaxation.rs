// ABOUTME: Single-axis and hybrid relaxations that turn an infeasible goal into ranked trade options
// ABOUTME: Widen schedule to hard limits, step the rate toward zero, or relax both by half-steps
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::search::{rate_for_calories, Candidate, RateContext, SearchSpace};
use crate::config::SolverPolicy;
use cadence_core::bounds::{BoundsCatalog, TierBounds};
use cadence_core::constants::granularity::SESSION_MINUTE_STEP;
use cadence_core::models::{
    AvailabilityWindow, GoalField, GoalSpec, Objective, OutcomeRange, RelaxationKind, TradeOption,
};
use cadence_core::rounding::{round_rate, round_to_step};

/// How far `value` sits from the preferred range, as a fraction of the way to the hard limit
fn axis_deviation(value: u32, window: &AvailabilityWindow) -> f64 {
    if value < window.preferred_min {
        let reach = window.preferred_min - window.hard_min;
        f64::from(window.preferred_min - value) / f64::from(reach.max(1))
    } else if value > window.preferred_max {
        let reach = window.hard_max - window.preferred_max;
        f64::from(value - window.preferred_max) / f64::from(reach.max(1))
    } else {
        0.0
    }
}

fn schedule_distance(candidate: &Candidate, goal: &GoalSpec) -> f64 {
    let days = axis_deviation(candidate.variables.sessions_per_week, &goal.days_per_week());
    let minutes = axis_deviation(candidate.variables.session_minutes, &goal.session_minutes());
    days.max(minutes)
}

fn rate_distance(original: f64, relaxed: f64) -> f64 {
    if original == 0.0 {
        return 0.0;
    }
    ((original - relaxed) / original).abs().min(1.0)
}

/// Rates stepped from `original` toward zero
///
/// Directional objectives stop before zero so a fat-loss goal never becomes maintenance;
/// other objectives may end exactly at zero.
fn rate_ladder(objective: Objective, original: f64, step: f64) -> Vec<f64> {
    let directional = matches!(objective, Objective::FatLoss | Objective::MuscleGain);
    let sign = original.signum();
    let mut rates = Vec::new();
    if original == 0.0 || step <= 0.0 {
        return rates;
    }
    for k in 1_u32.. {
        let rate = round_rate(original - sign * f64::from(k) * step);
        if rate * sign <= 0.0 {
            if !directional {
                rates.push(0.0);
            }
            break;
        }
        rates.push(rate);
    }
    rates
}

/// Best-effort builder for the trade options of one infeasible goal
pub(crate) struct Relaxer<'a> {
    pub goal: &'a GoalSpec,
    pub catalog: &'a BoundsCatalog,
    pub policy: &'a SolverPolicy,
    pub tier: &'a TierBounds,
}

impl Relaxer<'_> {
    fn context(&self, rate: f64) -> RateContext<'_> {
        RateContext::new(self.goal, self.catalog, self.policy, self.tier, rate)
    }

    fn preferred_space(&self) -> SearchSpace {
        SearchSpace {
            sessions: self.goal.days_per_week().preferred(),
            minutes: self.goal.session_minutes().preferred(),
        }
    }

    fn schedule_can_widen(&self) -> bool {
        self.goal.days_per_week().can_widen() || self.goal.session_minutes().can_widen()
    }

    /// Rank relaxed candidates by least widening, then by objective
    fn closest_first<'g>(goal: &'g GoalSpec) -> impl Fn(&Candidate) -> (f64, f64) + 'g {
        move |candidate| (-schedule_distance(candidate, goal), candidate.objective)
    }

    /// Hold the rate, widen frequency/duration to the hard limits
    fn widen_schedule(&self) -> Option<TradeOption> {
        if !self.schedule_can_widen() {
            return None;
        }
        let space = SearchSpace {
            sessions: self.goal.days_per_week().hard(),
            minutes: self.goal.session_minutes().hard(),
        };
        let candidate = self
            .context(self.goal.target_rate_kg_per_week())
            .search(&space, Self::closest_first(self.goal))
            .ok()?;
        Some(self.option(RelaxationKind::Schedule, candidate))
    }

    /// Hold frequency/duration, step the rate toward zero
    fn reduce_rate(&self) -> Option<TradeOption> {
        let space = self.preferred_space();
        rate_ladder(
            self.goal.objective(),
            self.goal.target_rate_kg_per_week(),
            self.policy.rate_step_kg,
        )
        .into_iter()
        .find_map(|rate| {
            self.context(rate)
                .search(&space, |candidate| (candidate.objective, 0.0))
                .ok()
        })
        .map(|candidate| self.option(RelaxationKind::Rate, candidate))
    }

    /// Relax both axes by half-steps
    ///
    /// Yields nothing when the closest candidate stays inside the preferred schedule, since
    /// that is only a finer-grained rate relaxation.
    fn hybrid(&self) -> Option<TradeOption> {
        if !self.schedule_can_widen() || self.goal.target_rate_kg_per_week() == 0.0 {
            return None;
        }
        let space = SearchSpace {
            sessions: self.goal.days_per_week().half_widened(1),
            minutes: self.goal.session_minutes().half_widened(SESSION_MINUTE_STEP),
        };
        rate_ladder(
            self.goal.objective(),
            self.goal.target_rate_kg_per_week(),
            self.policy.rate_step_kg / 2.0,
        )
        .into_iter()
        .find_map(|rate| {
            self.context(rate)
                .search(&space, Self::closest_first(self.goal))
                .ok()
        })
        .filter(|candidate| schedule_distance(candidate, self.goal) > 0.0)
        .map(|candidate| self.option(RelaxationKind::Hybrid, candidate))
    }

    fn option(&self, kind: RelaxationKind, candidate: Candidate) -> TradeOption {
        let goal = self.goal;
        let variables = candidate.variables.clone();
        let original_rate = goal.target_rate_kg_per_week();
        let rate = variables.weekly_rate_target_kg;
        let sessions = variables.sessions_per_week;
        let minutes = variables.session_minutes;

        let mut relaxed_fields = Vec::new();
        if !goal.days_per_week().preferred().contains(&sessions) {
            relaxed_fields.push(GoalField::DaysPerWeek);
        }
        if !goal.session_minutes().preferred().contains(&minutes) {
            relaxed_fields.push(GoalField::SessionMinutes);
        }
        if (rate - original_rate).abs() > f64::EPSILON {
            relaxed_fields.push(GoalField::TargetRate);
        }

        let score = (1.0
            - self.policy.schedule_penalty * schedule_distance(&candidate, goal)
            - self.policy.rate_penalty * rate_distance(original_rate, rate))
        .clamp(0.0, 1.0);

        let (summary, cost) = match kind {
            RelaxationKind::Schedule => (
                format!("Train {sessions} days/week for {minutes} min and keep {rate:+.2} kg/week"),
                format!(
                    "Schedule grows beyond the preferred {}-{} days of {}-{} min",
                    goal.days_per_week().preferred_min,
                    goal.days_per_week().preferred_max,
                    goal.session_minutes().preferred_min,
                    goal.session_minutes().preferred_max
                ),
            ),
            RelaxationKind::Rate => (
                format!("Keep {sessions} days/week at {minutes} min and target {rate:+.2} kg/week"),
                format!("Progress slows from {original_rate:+.2} to {rate:+.2} kg/week"),
            ),
            RelaxationKind::Hybrid => (
                format!("Train {sessions} days/week for {minutes} min and target {rate:+.2} kg/week"),
                format!(
                    "Schedule stretches to {sessions} x {minutes} min and progress slows to {rate:+.2} kg/week"
                ),
            ),
        };

        TradeOption {
            id: 'A',
            kind,
            summary,
            relaxed_fields,
            expected_outcome: self.outcome(variables.daily_calories),
            cost,
            feasibility_score: score,
            variables,
        }
    }

    /// Expected change over the goal timeline implied by the relaxed calories
    fn outcome(&self, daily_calories: f64) -> OutcomeRange {
        let horizon_weeks = self.goal.timeline_weeks();
        let weekly = rate_for_calories(self.goal.profile().baseline_kcal, daily_calories);
        let expected = weekly * f64::from(horizon_weeks);
        let spread = self.policy.outcome_uncertainty;
        let a = round_to_step(expected * (1.0 - spread), 0.01);
        let b = round_to_step(expected * (1.0 + spread), 0.01);
        OutcomeRange {
            horizon_weeks,
            low_kg: a.min(b),
            high_kg: a.max(b),
        }
    }

    /// Run every applicable relaxation and return the options ranked A, B, C
    pub fn trade_options(&self) -> Vec<TradeOption> {
        let mut options: Vec<TradeOption> =
            [self.widen_schedule(), self.reduce_rate(), self.hybrid()]
                .into_iter()
                .flatten()
                .collect();

        options.sort_by(|a, b| {
            b.feasibility_score
                .total_cmp(&a.feasibility_score)
                .then(a.kind.cmp(&b.kind))
        });
        options.truncate(self.policy.max_trade_options);
        for (label, option) in (b'A'..).zip(options.iter_mut()) {
            option.id = char::from(label);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_ladder_stops_before_zero_for_directional_goals() {
        let ladder = rate_ladder(Objective::MuscleGain, 0.3, 0.05);
        assert_eq!(ladder, vec![0.25, 0.2, 0.15, 0.1, 0.05]);

        let ladder = rate_ladder(Objective::FatLoss, -0.1, 0.05);
        assert_eq!(ladder, vec![-0.05]);
    }

    #[test]
    fn test_rate_ladder_reaches_zero_for_recomposition() {
        let ladder = rate_ladder(Objective::Recomposition, 0.1, 0.05);
        assert_eq!(ladder, vec![0.05, 0.0]);
        assert!(rate_ladder(Objective::Maintenance, 0.0, 0.05).is_empty());
    }

    #[test]
    fn test_axis_deviation() {
        let window = AvailabilityWindow::flexible(3, 4, 1, 6);
        assert!(axis_deviation(3, &window).abs() < f64::EPSILON);
        assert!((axis_deviation(1, &window) - 1.0).abs() < f64::EPSILON);
        assert!((axis_deviation(5, &window) - 0.5).abs() < f64::EPSILON);
    }
}
