//! Branching heuristic: a time- and spatially-decayed score per PL
//! constraint maintained in an ordered multiset, so the constraint with
//! the highest score can always be found in O(log n).
//!
//! Scores start at 1; `update_score` erases the stale
//! `(score, constraint)` pair before reinserting the new one (a
//! `BTreeSet` entry is immutable in place), `update_spatial` folds a
//! child's score into its parent's temporary accumulator, and
//! `update_time` blends the temporary accumulator into the persisted
//! score on a decay schedule. Of the possible ways to keep a live
//! priority order under constant rescoring, this keeps the sorted set
//! consistent with every score change rather than rebuilding it
//! periodically.

use std::collections::{BTreeSet, HashMap};

use ordered_float::OrderedFloat;

use crate::plconstraint::ConstraintId;

const DEFAULT_ALPHA_TIME: f64 = 0.4;
const DEFAULT_ALPHA_SPATIAL: f64 = 0.8;

pub struct BranchingHeuristic {
    alpha_time: f64,
    alpha_spatial: f64,
    score: HashMap<ConstraintId, f64>,
    temp_score: HashMap<ConstraintId, f64>,
    ordered: BTreeSet<(OrderedFloat<f64>, ConstraintId)>,
}

impl BranchingHeuristic {
    pub fn new() -> Self {
        Self::with_decay(DEFAULT_ALPHA_TIME, DEFAULT_ALPHA_SPATIAL)
    }

    pub fn with_decay(alpha_time: f64, alpha_spatial: f64) -> Self {
        Self {
            alpha_time,
            alpha_spatial,
            score: HashMap::new(),
            temp_score: HashMap::new(),
            ordered: BTreeSet::new(),
        }
    }

    /// Registers `constraint` with the initial score of 1, as every
    /// constraint starts out equally eligible for splitting.
    pub fn initialize_constraint(&mut self, constraint: ConstraintId) {
        self.score.insert(constraint, 1.0);
        self.temp_score.insert(constraint, 0.0);
        self.ordered.insert((OrderedFloat(1.0), constraint));
    }

    fn erase_then_reinsert(&mut self, constraint: ConstraintId, new_score: f64) {
        if let Some(&old) = self.score.get(&constraint) {
            self.ordered.remove(&(OrderedFloat(old), constraint));
        }
        self.ordered.insert((OrderedFloat(new_score), constraint));
        self.score.insert(constraint, new_score);
    }

    pub fn update_score(&mut self, constraint: ConstraintId, new_score: f64) {
        self.erase_then_reinsert(constraint, new_score);
    }

    /// Registers a violation report as this round's time-decay signal
    /// `Δ` (the caller's current violation-streak length, so a
    /// constraint violated on every iteration pushes an ever-larger
    /// signal rather than a flat constant) and immediately blends it
    /// into the persisted score via `update_time`, so a constraint
    /// violated repeatedly across main loop iterations climbs in the
    /// ordered set rather than sitting at its initial score forever.
    pub fn record_violation(&mut self, constraint: ConstraintId, violation_streak: f64) {
        *self.temp_score.entry(constraint).or_insert(0.0) += violation_streak;
        self.update_time(constraint);
    }

    /// Folds a child constraint's current score into its parent's
    /// temporary accumulator: `temp[parent] += 0.5 * (score[child] *
    /// alpha_spatial + num_fixed)`, matching the C++ `updateSpatial`.
    pub fn update_spatial(&mut self, parent: ConstraintId, child: ConstraintId, num_fixed: f64) {
        let child_score = *self.score.get(&child).unwrap_or(&0.0);
        let delta = 0.5 * (child_score * self.alpha_spatial + num_fixed);
        *self.temp_score.entry(parent).or_insert(0.0) += delta;
    }

    /// Blends the temporary accumulator into the persisted score:
    /// `score[c] = score[c]*alpha_time + temp[c]*(1-alpha_time)`, then
    /// resets the temporary accumulator to zero, matching `updateTime`.
    pub fn update_time(&mut self, constraint: ConstraintId) {
        let old = *self.score.get(&constraint).unwrap_or(&1.0);
        let temp = *self.temp_score.get(&constraint).unwrap_or(&0.0);
        let new_score = old * self.alpha_time + temp * (1.0 - self.alpha_time);
        self.erase_then_reinsert(constraint, new_score);
        self.temp_score.insert(constraint, 0.0);
    }

    /// Scans the ordered set by descending score, returning the first
    /// constraint that `is_active_and_unfixed` accepts.
    pub fn pick_splitting_constraint(
        &self,
        is_active_and_unfixed: impl Fn(ConstraintId) -> bool,
    ) -> Option<ConstraintId> {
        self.ordered
            .iter()
            .rev()
            .map(|&(_, c)| c)
            .find(|&c| is_active_and_unfixed(c))
    }

    /// Picks the highest-scoring constraint among a supplied candidate
    /// set, used by `chooseViolatedConstraintForFixing`.
    pub fn pick_among(&self, candidates: &[ConstraintId]) -> Option<ConstraintId> {
        candidates
            .iter()
            .copied()
            .max_by(|&a, &b| {
                let sa = self.score.get(&a).copied().unwrap_or(0.0);
                let sb = self.score.get(&b).copied().unwrap_or(0.0);
                sa.total_cmp(&sb)
            })
    }
}

impl Default for BranchingHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_splitting_constraint_scans_descending() {
        let mut h = BranchingHeuristic::new();
        let a = ConstraintId(0);
        let b = ConstraintId(1);
        h.initialize_constraint(a);
        h.initialize_constraint(b);
        h.update_score(a, 5.0);
        h.update_score(b, 2.0);

        let picked = h.pick_splitting_constraint(|_| true);
        assert_eq!(picked, Some(a));
    }

    #[test]
    fn ordered_set_stays_consistent_after_rescoring() {
        let mut h = BranchingHeuristic::new();
        let a = ConstraintId(0);
        h.initialize_constraint(a);
        h.update_score(a, 10.0);
        h.update_score(a, -3.0);
        assert_eq!(h.ordered.len(), 1);
        assert_eq!(h.score.get(&a), Some(&-3.0));
    }

    #[test]
    fn record_violation_with_growing_streak_climbs_above_initial_score() {
        let mut h = BranchingHeuristic::new();
        let a = ConstraintId(0);
        h.initialize_constraint(a);
        for streak in 1..=5 {
            h.record_violation(a, streak as f64);
        }
        assert!(h.score.get(&a).copied().unwrap_or(0.0) > 1.0);
    }

    #[test]
    fn update_spatial_then_time_lifts_parent_score() {
        let mut h = BranchingHeuristic::new();
        let parent = ConstraintId(0);
        let child = ConstraintId(1);
        h.initialize_constraint(parent);
        h.initialize_constraint(child);
        h.update_score(child, 8.0);

        h.update_spatial(parent, child, 3.0);
        h.update_time(parent);

        assert!(h.score.get(&parent).copied().unwrap_or(0.0) > 1.0);
    }
}
