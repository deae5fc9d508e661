// ABOUTME: Bounded discrete search over sessions/week and session minutes for one target rate
// ABOUTME: Hard-constraint evaluation, volume allocation around the adaptive midpoint, objective scoring
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::config::SolverPolicy;
use cadence_core::bounds::{BoundsCatalog, TierBounds, VolumeLandmarks};
use cadence_core::constants::energy::{
    DAYS_PER_WEEK, KCAL_PER_G_CARBS, KCAL_PER_G_FAT, KCAL_PER_G_PROTEIN, KCAL_PER_KG_BODY_MASS,
};
use cadence_core::constants::granularity::SESSION_MINUTE_STEP;
use cadence_core::models::{
    DecisionVariables, Diagnostic, DiagnosticCode, GoalSpec, MacroSplit, MuscleGroup,
};
use cadence_core::rounding::{ceil_tolerant, round_calories};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;
use tracing::debug;

/// Sessions and minutes the search may choose from
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SearchSpace {
    pub sessions: RangeInclusive<u32>,
    pub minutes: RangeInclusive<u32>,
}

/// A fully evaluated feasible assignment
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub variables: DecisionVariables,
    pub objective: f64,
}

/// Daily calories for a target rate
pub(crate) fn calories_for_rate(baseline_kcal: f64, rate_kg_per_week: f64) -> f64 {
    round_calories(baseline_kcal + rate_kg_per_week * KCAL_PER_KG_BODY_MASS / DAYS_PER_WEEK)
}

/// Expected weekly body-mass change implied by a calorie target
pub(crate) fn rate_for_calories(baseline_kcal: f64, daily_calories: f64) -> f64 {
    (daily_calories - baseline_kcal) * DAYS_PER_WEEK / KCAL_PER_KG_BODY_MASS
}

/// Macro split for a calorie target with protein and fat floors held firm
///
/// Returns `None` when the floors alone exceed the calories.
pub(crate) fn macros_for(
    daily_calories: f64,
    goal: &GoalSpec,
    catalog: &BoundsCatalog,
    policy: &SolverPolicy,
) -> Option<MacroSplit> {
    let mass = goal.profile().body_mass_kg;
    let protein_g_per_kg = catalog
        .macros
        .protein_floor_g_per_kg
        .max(policy.protein_target(goal.objective()));
    let protein_g = (protein_g_per_kg * mass).round();

    let fat_fraction = catalog.macros.fat_min_fraction.max(policy.fat_target_fraction);
    let fat_g = (catalog.macros.fat_floor_g_per_kg * mass)
        .max(fat_fraction * daily_calories / KCAL_PER_G_FAT)
        .round();

    let remainder = daily_calories - protein_g * KCAL_PER_G_PROTEIN - fat_g * KCAL_PER_G_FAT;
    if remainder < 0.0 {
        return None;
    }
    Some(MacroSplit {
        protein_g: protein_g as u32,
        carbs_g: (remainder / KCAL_PER_G_CARBS).round() as u32,
        fat_g: fat_g as u32,
    })
}

/// Weekly spend for food plus facility access
pub(crate) fn weekly_cost(
    daily_calories: f64,
    sessions: u32,
    goal: &GoalSpec,
    catalog: &BoundsCatalog,
) -> f64 {
    let food = DAYS_PER_WEEK * daily_calories / 1000.0 * catalog.costs.food_cost_per_1000_kcal;
    let facility = if goal.uses_facility() {
        f64::from(sessions) * catalog.costs.facility_cost_per_session
    } else {
        0.0
    };
    food + facility
}

/// Per-muscle weekly cap imposed by session count and the recoverable ceiling
pub(crate) fn muscle_cap(
    landmarks: &VolumeLandmarks,
    sessions: u32,
    catalog: &BoundsCatalog,
) -> u32 {
    landmarks
        .maximum_recoverable
        .min(sessions * catalog.training.max_sets_per_muscle_per_session)
}

/// Which muscle gives up a set first: the one currently closest to its midpoint
///
/// Relative deficits are compared by cross-multiplication so the choice is exact.
fn trim_order(a: (u32, &VolumeLandmarks), b: (u32, &VolumeLandmarks)) -> Ordering {
    let deficit =
        |(sets, l): (u32, &VolumeLandmarks)| u64::from(l.maximum_adaptive.saturating_sub(sets));
    let span = |(_, l): (u32, &VolumeLandmarks)| {
        u64::from(l.maximum_adaptive.saturating_sub(l.minimum_effective).max(1))
    };
    (deficit(a) * span(b)).cmp(&(deficit(b) * span(a)))
}

/// Remove sets one at a time until the total fits `capacity`, never going below `floors`
pub(crate) fn trim_to_capacity(
    volume: &mut BTreeMap<MuscleGroup, u32>,
    floors: &BTreeMap<MuscleGroup, u32>,
    landmarks: &BTreeMap<MuscleGroup, VolumeLandmarks>,
    capacity: u32,
) {
    while volume.values().sum::<u32>() > capacity {
        let pick = volume
            .iter()
            .filter(|(muscle, sets)| **sets > floors.get(muscle).copied().unwrap_or(0))
            .filter_map(|(muscle, sets)| landmarks.get(muscle).map(|l| (*muscle, *sets, l)))
            .min_by(|a, b| trim_order((a.1, a.2), (b.1, b.2)));
        let Some((muscle, _, _)) = pick else {
            return;
        };
        if let Some(sets) = volume.get_mut(&muscle) {
            *sets -= 1;
        }
    }
}

/// Balance score in `[0, 1]`: 1 when every muscle sits at its midpoint
pub(crate) fn balance_score(
    volume: &BTreeMap<MuscleGroup, u32>,
    landmarks: &BTreeMap<MuscleGroup, VolumeLandmarks>,
) -> f64 {
    if volume.is_empty() {
        return 0.0;
    }
    let total: f64 = volume
        .iter()
        .map(|(muscle, sets)| {
            landmarks.get(muscle).map_or(0.0, |l| {
                let span = l.maximum_adaptive.saturating_sub(l.minimum_effective);
                if span == 0 {
                    return 1.0;
                }
                let deviation =
                    f64::from(l.maximum_adaptive.abs_diff(*sets)) / f64::from(span);
                1.0 - deviation.min(1.0).powi(2)
            })
        })
        .sum();
    total / volume.len() as f64
}

fn normalized(value: u32, range: &RangeInclusive<u32>) -> f64 {
    let (low, high) = (*range.start(), *range.end());
    if high <= low {
        return 1.0;
    }
    f64::from(value.saturating_sub(low)) / f64::from(high - low)
}

/// Everything about a search that depends only on the goal and target rate
pub(crate) struct RateContext<'a> {
    goal: &'a GoalSpec,
    catalog: &'a BoundsCatalog,
    policy: &'a SolverPolicy,
    tier: &'a TierBounds,
    rate: f64,
    required_sessions: u32,
    calories: f64,
    macros: Option<MacroSplit>,
    rate_violations: Vec<Diagnostic>,
}

impl<'a> RateContext<'a> {
    pub fn new(
        goal: &'a GoalSpec,
        catalog: &'a BoundsCatalog,
        policy: &'a SolverPolicy,
        tier: &'a TierBounds,
        rate: f64,
    ) -> Self {
        let profile = goal.profile();
        let base_sessions = catalog.training.min_sessions(goal.objective());
        let required_sessions = if rate > 0.0 {
            let extra = ceil_tolerant(rate / tier.gain_rate_per_extra_session) as u32;
            base_sessions.max(1 + extra)
        } else {
            base_sessions
        };

        let calories = calories_for_rate(profile.baseline_kcal, rate);
        let macros = macros_for(calories, goal, catalog, policy);
        let mut rate_violations = Vec::new();

        let (low, high) = catalog
            .calories
            .range_for(profile.sex, profile.baseline_kcal);
        if calories < low || calories > high {
            rate_violations.push(Diagnostic::new(
                DiagnosticCode::CalorieBoundsViolated,
                format!(
                    "{calories:.0} kcal/day for {rate:+.2} kg/week lies outside the safe range {low:.0}-{high:.0} kcal/day"
                ),
            ));
        } else if macros.is_none() {
            rate_violations.push(Diagnostic::new(
                DiagnosticCode::CalorieBoundsViolated,
                format!("{calories:.0} kcal/day cannot cover the protein and fat floors"),
            ));
        }

        if rate > catalog.training.bodyweight_max_gain_rate && !goal.has_loaded_equipment() {
            rate_violations.push(Diagnostic::new(
                DiagnosticCode::EquipmentMismatch,
                format!(
                    "{rate:+.2} kg/week needs external load; bodyweight training supports at most {:+.2} kg/week",
                    catalog.training.bodyweight_max_gain_rate
                ),
            ));
        }

        Self {
            goal,
            catalog,
            policy,
            tier,
            rate,
            required_sessions,
            calories,
            macros,
            rate_violations,
        }
    }

    /// Evaluate every hard constraint for one (sessions, minutes) pair
    fn evaluate(
        &self,
        sessions: u32,
        minutes: u32,
        space: &SearchSpace,
    ) -> Result<Candidate, Vec<Diagnostic>> {
        let mut violations = Vec::new();

        if sessions < self.required_sessions {
            violations.push(Diagnostic::new(
                DiagnosticCode::FrequencyTooLow,
                format!(
                    "{sessions} sessions/week is below the {} required for {} at {:+.2} kg/week",
                    self.required_sessions,
                    self.goal.objective(),
                    self.rate
                ),
            ));
        }

        let landmarks = &self.tier.volume;
        let floors: BTreeMap<MuscleGroup, u32> = landmarks
            .iter()
            .map(|(muscle, l)| (*muscle, l.minimum_effective))
            .collect();
        let floor_total: u32 = floors.values().sum();
        let capacity = self.catalog.training.weekly_set_capacity(sessions, minutes);
        if capacity < floor_total {
            violations.push(Diagnostic::new(
                DiagnosticCode::DurationInsufficient,
                format!(
                    "{sessions} x {minutes} min fits {capacity} working sets/week, minimum effective volume needs {floor_total}"
                ),
            ));
        }

        let crowded: Vec<String> = landmarks
            .iter()
            .filter(|(_, l)| l.minimum_effective > muscle_cap(l, sessions, self.catalog))
            .map(|(muscle, _)| muscle.to_string())
            .collect();
        if !crowded.is_empty() {
            violations.push(Diagnostic::new(
                DiagnosticCode::VolumeBoundsViolated,
                format!(
                    "{} cannot reach minimum effective volume in {sessions} sessions",
                    crowded.join(", ")
                ),
            ));
        }

        let cost = weekly_cost(self.calories, sessions, self.goal, self.catalog);
        if cost > self.goal.weekly_budget() + 1e-9 {
            violations.push(Diagnostic::new(
                DiagnosticCode::BudgetExceeded,
                format!(
                    "weekly cost {cost:.2} exceeds budget {:.2}",
                    self.goal.weekly_budget()
                ),
            ));
        }

        let Some(macros) = self.macros else {
            return Err(violations);
        };
        if !violations.is_empty() || !self.rate_violations.is_empty() {
            return Err(violations);
        }

        let mut volume: BTreeMap<MuscleGroup, u32> = landmarks
            .iter()
            .map(|(muscle, l)| {
                let cap = muscle_cap(l, sessions, self.catalog);
                (*muscle, l.maximum_adaptive.min(cap))
            })
            .collect();
        trim_to_capacity(&mut volume, &floors, landmarks, capacity);

        let weights = self.policy.weights;
        let objective = weights.frequency * normalized(sessions, &space.sessions)
            + weights.short_sessions * (1.0 - normalized(minutes, &space.minutes))
            + weights.balance * balance_score(&volume, landmarks);

        Ok(Candidate {
            variables: DecisionVariables {
                sessions_per_week: sessions,
                session_minutes: minutes,
                weekly_volume: volume,
                daily_calories: self.calories,
                macros,
                weekly_rate_target_kg: self.rate,
            },
            objective,
        })
    }

    /// Search `space` and keep the candidate with the highest `rank`
    ///
    /// Sessions are visited high to low and minutes short to long; only a strictly
    /// better rank replaces the incumbent, so ties resolve toward more, shorter sessions.
    pub fn search<F>(&self, space: &SearchSpace, rank: F) -> Result<Candidate, Vec<Diagnostic>>
    where
        F: Fn(&Candidate) -> (f64, f64),
    {
        let mut best: Option<((f64, f64), Candidate)> = None;
        let mut failures: Vec<Vec<Diagnostic>> = Vec::new();
        let mut feasible = 0_usize;

        for sessions in space.sessions.clone().rev() {
            for minutes in space.minutes.clone().step_by(SESSION_MINUTE_STEP as usize) {
                match self.evaluate(sessions, minutes, space) {
                    Ok(candidate) => {
                        feasible += 1;
                        let key = rank(&candidate);
                        let better = match &best {
                            None => true,
                            Some((incumbent, _)) => {
                                key.partial_cmp(incumbent) == Some(Ordering::Greater)
                            }
                        };
                        if better {
                            best = Some((key, candidate));
                        }
                    }
                    Err(violations) => failures.push(violations),
                }
            }
        }

        debug!(
            rate = self.rate,
            evaluated = failures.len() + feasible,
            feasible,
            "feasibility search finished"
        );

        match best {
            Some((_, candidate)) => Ok(candidate),
            None => Err(self.summarize(failures)),
        }
    }

    /// Reduce per-candidate failures to one diagnostic per violated family
    fn summarize(&self, failures: Vec<Vec<Diagnostic>>) -> Vec<Diagnostic> {
        let codes_of = |violations: &[Diagnostic]| -> BTreeSet<DiagnosticCode> {
            violations.iter().map(|d| d.code).collect()
        };

        // Families no candidate could satisfy
        let mut blocking: Option<BTreeSet<DiagnosticCode>> = None;
        for violations in &failures {
            let codes = codes_of(violations);
            blocking = Some(match blocking {
                None => codes,
                Some(acc) => acc.intersection(&codes).copied().collect(),
            });
        }
        let mut blocking = blocking.unwrap_or_default();
        let some_candidate_clean = failures.iter().any(Vec::is_empty);

        // Families that only conflict jointly: report the least-violating candidate
        if blocking.is_empty() && !some_candidate_clean {
            if let Some(fewest) = failures
                .iter()
                .filter(|v| !v.is_empty())
                .min_by_key(|v| codes_of(v).len())
            {
                blocking = codes_of(fewest);
            }
        }

        let mut diagnostics: BTreeMap<DiagnosticCode, Diagnostic> = self
            .rate_violations
            .iter()
            .map(|d| (d.code, d.clone()))
            .collect();
        for violations in &failures {
            for diagnostic in violations {
                if blocking.contains(&diagnostic.code) {
                    diagnostics
                        .entry(diagnostic.code)
                        .or_insert_with(|| diagnostic.clone());
                }
            }
        }
        diagnostics.into_values().collect()
    }
}
