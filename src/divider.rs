//! Query divider (C8): input-interval bisection and ReLU-based subquery
//! generation for the divide-and-conquer manager.

use crate::plconstraint::{PlConstraint, PlConstraintBehavior};
use crate::smt::{BoundKind, CaseSplit, Tightening};
use crate::{E, I};

pub use crate::config::DivideStrategy;

/// A case split packaged with a timeout for DnC distribution. `id` is a
/// human-readable path (`"sq-0-1"`) recording which bisection branch
/// produced it; `implied_splits` carries any valid splits accumulated
/// before division so a worker can replay tree state when
/// `restore_tree_states` is enabled.
#[derive(Debug, Clone)]
pub struct SubQuery {
    pub id: String,
    pub case_split: CaseSplit,
    pub timeout_seconds: E,
    pub implied_splits: Vec<CaseSplit>,
}

#[derive(Debug, Clone, Copy)]
pub struct QueryDivider {
    strategy: DivideStrategy,
    timeout_factor: E,
}

impl QueryDivider {
    pub fn new(strategy: DivideStrategy, timeout_factor: E) -> Self {
        Self { strategy, timeout_factor }
    }

    /// Produces `2^num_divides` initial subqueries by iterated
    /// bisection starting from the query's raw bounds.
    pub fn create_initial_subqueries(
        &self,
        bounds: &[(E, E)],
        constraints: &[PlConstraint],
        num_divides: u32,
        initial_timeout: E,
    ) -> Vec<SubQuery> {
        let frontier = self.bisect_frontier(CaseSplit::new(), bounds, constraints, num_divides);
        frontier
            .into_iter()
            .enumerate()
            .map(|(i, (split, _))| SubQuery {
                id: format!("sq-{i}"),
                case_split: split,
                timeout_seconds: initial_timeout,
                implied_splits: Vec::new(),
            })
            .collect()
    }

    /// Online re-division on timeout: bisects a timed-out subquery
    /// into `2^num_divides` children, each with
    /// timeout `parent.timeout_seconds * timeout_factor`.
    pub fn subdivide(
        &self,
        parent: &SubQuery,
        bounds: &[(E, E)],
        constraints: &[PlConstraint],
        num_divides: u32,
    ) -> Vec<SubQuery> {
        let frontier = self.bisect_frontier(parent.case_split.clone(), bounds, constraints, num_divides);
        let child_timeout = parent.timeout_seconds * self.timeout_factor;
        frontier
            .into_iter()
            .enumerate()
            .map(|(i, (split, _))| SubQuery {
                id: format!("{}-{i}", parent.id),
                case_split: split,
                timeout_seconds: child_timeout,
                implied_splits: parent.implied_splits.clone(),
            })
            .collect()
    }

    fn bisect_frontier(
        &self,
        root: CaseSplit,
        bounds: &[(E, E)],
        constraints: &[PlConstraint],
        num_divides: u32,
    ) -> Vec<(CaseSplit, Vec<(E, E)>)> {
        let mut frontier = vec![(root, bounds.to_vec())];
        for _ in 0..num_divides {
            let mut next = Vec::with_capacity(frontier.len() * 2);
            for (split, local_bounds) in frontier {
                next.extend(self.bisect_once(&split, &local_bounds, constraints));
            }
            frontier = next;
        }
        frontier
    }

    fn bisect_once(
        &self,
        parent: &CaseSplit,
        bounds: &[(E, E)],
        constraints: &[PlConstraint],
    ) -> Vec<(CaseSplit, Vec<(E, E)>)> {
        match self.strategy {
            DivideStrategy::LargestInterval => bisect_largest_interval(parent, bounds),
            DivideStrategy::ReluViolation => bisect_relu(parent, bounds, constraints),
        }
    }
}

/// Bisects the variable with the largest finite `[lb, ub]` range at its
/// midpoint. Falls back to returning the parent unchanged if every
/// variable is unbounded on at least one side.
fn bisect_largest_interval(parent: &CaseSplit, bounds: &[(E, E)]) -> Vec<(CaseSplit, Vec<(E, E)>)> {
    let chosen = bounds
        .iter()
        .enumerate()
        .filter(|(_, (lb, ub))| lb.is_finite() && ub.is_finite())
        .max_by(|(_, (lb_a, ub_a)), (_, (lb_b, ub_b))| (ub_a - lb_a).total_cmp(&(ub_b - lb_b)))
        .map(|(v, &b)| (v, b));

    let Some((var, (lb, ub))) = chosen else {
        return vec![(parent.clone(), bounds.to_vec())];
    };
    let mid = (lb + ub) / 2.0;

    let left = parent.clone().with_tightening(Tightening { variable: var, value: mid, kind: BoundKind::Upper });
    let right = parent.clone().with_tightening(Tightening { variable: var, value: mid, kind: BoundKind::Lower });

    let mut left_bounds = bounds.to_vec();
    left_bounds[var] = (lb, mid);
    let mut right_bounds = bounds.to_vec();
    right_bounds[var] = (mid, ub);

    vec![(left, left_bounds), (right, right_bounds)]
}

/// Among unfixed, active ReLU constraints passing a runtime-estimate
/// filter (`threshold ~= max(constraint_count/20, 5)`, taken as the
/// first `threshold` candidates by ascending id), picks the one with
/// the smallest "balance estimate" — `|lb(b) + ub(b)|`, smallest when
/// the input is centered around zero and hardest to phase-fix by bound
/// propagation alone — ties broken by id, and splits on its phases.
fn bisect_relu(
    parent: &CaseSplit,
    bounds: &[(E, E)],
    constraints: &[PlConstraint],
) -> Vec<(CaseSplit, Vec<(E, E)>)> {
    let threshold = ((constraints.len() as E / 20.0).floor() as usize).max(5);

    let mut candidates: Vec<&PlConstraint> = constraints
        .iter()
        .filter(|c| matches!(c, PlConstraint::Relu(_)) && c.is_active() && !c.phase_fixed())
        .collect();
    candidates.sort_by_key(|c| c.id().0);
    candidates.truncate(threshold);

    let balance = |c: &PlConstraint, bounds: &[(E, E)]| -> E {
        let vars = c.participating_variables();
        let b: I = vars[0];
        (bounds[b].0 + bounds[b].1).abs()
    };

    let chosen = candidates
        .into_iter()
        .min_by(|a, b| balance(a, bounds).total_cmp(&balance(b, bounds)).then(a.id().0.cmp(&b.id().0)));

    let Some(chosen) = chosen else {
        return vec![(parent.clone(), bounds.to_vec())];
    };

    chosen
        .get_case_splits()
        .into_iter()
        .map(|s| (s.extend_with_parent(parent), bounds.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bisection_splits_largest_interval_at_midpoint() {
        let divider = QueryDivider::new(DivideStrategy::LargestInterval, 1.5);
        let bounds = vec![(0.0, 10.0), (0.0, 4.0)];
        let subqueries = divider.create_initial_subqueries(&bounds, &[], 1, 1.0);
        assert_eq!(subqueries.len(), 2);

        let has_tightening = |value: E, kind: BoundKind| {
            subqueries.iter().any(|sq| {
                sq.case_split
                    .tightenings
                    .iter()
                    .any(|t| t.variable == 0 && (t.value - value).abs() < 1e-9 && t.kind == kind)
            })
        };
        assert!(has_tightening(5.0, BoundKind::Upper));
        assert!(has_tightening(5.0, BoundKind::Lower));
    }

    #[test]
    fn initial_divides_produce_power_of_two_subqueries() {
        let divider = QueryDivider::new(DivideStrategy::LargestInterval, 1.5);
        let bounds = vec![(0.0, 10.0), (0.0, 4.0)];
        let subqueries = divider.create_initial_subqueries(&bounds, &[], 2, 1.0);
        assert_eq!(subqueries.len(), 4);
    }

    #[test]
    fn subdivide_scales_timeout_by_factor() {
        let divider = QueryDivider::new(DivideStrategy::LargestInterval, 1.5);
        let bounds = vec![(0.0, 10.0), (0.0, 4.0)];
        let parent = SubQuery {
            id: "sq-0".to_string(),
            case_split: CaseSplit::new(),
            timeout_seconds: 1.0,
            implied_splits: Vec::new(),
        };
        let children = divider.subdivide(&parent, &bounds, &[], 1);
        assert_eq!(children.len(), 2);
        for child in &children {
            assert!((child.timeout_seconds - 1.5).abs() < 1e-9);
        }
    }
}
