//! Cost-function manager and entry strategy (C2): Phase-1 reduced
//! costs plus a Devex-style projected-steepest-edge pricing rule.
//!
//! The cost function measures the sum of out-of-bounds excess of
//! basic variables. It is `INVALID` until a basis is available,
//! `UPDATED` once reduced costs are known but not freshly
//! recomputed from scratch, and `JUST_COMPUTED` right after a full
//! recomputation.

use std::collections::HashMap;

use crate::tableau::Tableau;
use crate::{E, I};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostStatus {
    Invalid,
    Updated,
    JustComputed,
}

pub struct CostFunctionManager {
    status: CostStatus,
    /// Phase-1 cost per basic variable: `+1` if over its upper bound,
    /// `-1` if under its lower bound, `0` otherwise.
    basic_costs: HashMap<I, E>,
    reduced_costs: HashMap<I, E>,
    /// Devex reference weights, keyed by variable id, initialized to 1.
    reference_weights: HashMap<I, E>,
}

impl CostFunctionManager {
    pub fn new() -> Self {
        Self {
            status: CostStatus::Invalid,
            basic_costs: HashMap::new(),
            reduced_costs: HashMap::new(),
            reference_weights: HashMap::new(),
        }
    }

    pub fn status(&self) -> CostStatus {
        self.status
    }

    pub fn invalidate(&mut self) {
        self.status = CostStatus::Invalid;
    }

    fn weight(&self, x: I) -> E {
        *self.reference_weights.get(&x).unwrap_or(&1.0)
    }

    /// Recomputes Phase-1 basic costs from current out-of-bounds
    /// basics, then reduced costs for every non-basic variable via
    /// `y = c_B^T B⁻¹` (cheap: `B⁻¹` is explicit) and `reducedCost_j =
    /// -y · A_{:,j}` (no structural cost term in Phase 1).
    pub fn recompute(&mut self, tableau: &Tableau) {
        self.basic_costs.clear();
        for &var in tableau.basic_variables() {
            let value = tableau.value(var);
            let cost = if value > tableau.upper_bound(var) + 1e-9 {
                1.0
            } else if value < tableau.lower_bound(var) - 1e-9 {
                -1.0
            } else {
                0.0
            };
            self.basic_costs.insert(var, cost);
        }

        self.reduced_costs.clear();
        for id in 0..tableau.num_variables() {
            if tableau.is_basic(id) {
                continue;
            }
            let column = tableau.compute_change_column(id);
            let mut reduced = 0.0;
            for (row, &basic_var) in tableau.basic_variables().iter().enumerate() {
                let cb = *self.basic_costs.get(&basic_var).unwrap_or(&0.0);
                if cb != 0.0 {
                    reduced -= cb * column[row];
                }
            }
            self.reduced_costs.insert(id, reduced);
            self.reference_weights.entry(id).or_insert(1.0);
        }
        self.status = CostStatus::JustComputed;
    }

    pub fn reduced_cost(&self, x: I) -> E {
        *self.reduced_costs.get(&x).unwrap_or(&0.0)
    }

    pub fn reduced_costs(&self) -> &HashMap<I, E> {
        &self.reduced_costs
    }

    pub fn total_infeasibility(&self) -> E {
        self.basic_costs
            .iter()
            .map(|(_, &c)| if c != 0.0 { 1.0 } else { 0.0 })
            .sum()
    }

    /// Among `candidates`, picks the entrant with the largest
    /// `reducedCost² / referenceWeight` ratio (projected steepest
    /// edge). The main loop may retry with the next-best candidate if
    /// the tableau rejects the chosen one (e.g. its pivot element is
    /// degenerate), up to `k` attempts, keeping whichever attempted
    /// pivot had the largest entry magnitude.
    pub fn rank_entry_candidates(&self, candidates: &[I]) -> Vec<I> {
        let mut scored: Vec<(E, I)> = candidates
            .iter()
            .map(|&c| {
                let rc = self.reduced_cost(c);
                (rc * rc / self.weight(c), c)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().map(|(_, c)| c).collect()
    }

    /// Updates Devex reference weights after a pivot: for every
    /// candidate `j` with pivot-row entry `alpha_j` (and the entering
    /// variable's own weight `gamma_q` before the pivot, with pivot
    /// element `alpha_r`), `gamma_j <- max(gamma_j, (alpha_j/alpha_r)^2
    /// * gamma_q)`; the leaving variable's weight becomes `gamma_q /
    /// alpha_r^2`.
    pub fn update_reference_weights(
        &mut self,
        entering: I,
        leaving: I,
        pivot_row: &[E],
        pivot_element: E,
    ) {
        let gamma_q = self.weight(entering);
        if pivot_element.abs() < 1e-12 {
            return;
        }
        for (j, &alpha_j) in pivot_row.iter().enumerate() {
            if j == entering || alpha_j == 0.0 {
                continue;
            }
            let candidate = (alpha_j / pivot_element).powi(2) * gamma_q;
            let entry = self.reference_weights.entry(j).or_insert(1.0);
            if candidate > *entry {
                *entry = candidate;
            }
        }
        self.reference_weights
            .insert(leaving, (gamma_q / pivot_element.powi(2)).max(1.0));
        self.status = CostStatus::Updated;
    }
}

impl Default for CostFunctionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_entry_candidates_prefers_larger_score() {
        let mut mgr = CostFunctionManager::new();
        mgr.reduced_costs.insert(0, 2.0);
        mgr.reduced_costs.insert(1, -5.0);
        mgr.reference_weights.insert(0, 1.0);
        mgr.reference_weights.insert(1, 1.0);
        let ranked = mgr.rank_entry_candidates(&[0, 1]);
        assert_eq!(ranked[0], 1);
    }

    #[test]
    fn weight_defaults_to_one() {
        let mgr = CostFunctionManager::new();
        assert_eq!(mgr.weight(42), 1.0);
    }
}
