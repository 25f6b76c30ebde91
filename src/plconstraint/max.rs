//! `Max(out, elements, id)`: `out = max(elements)`. Phase is either
//! `Unfixed` or `ArgMax(i)` naming which element realizes the max. One
//! case split per candidate element: `out = elements[i]` and
//! `elements[i] >= elements[j]` for every other `j`.

use crate::equation::{Equation, EquationType};
use crate::plconstraint::{ConstraintId, Fix, Phase, PlConstraintBehavior};
use crate::smt::{CaseSplit, Tightening};
use crate::tableau::Tableau;
use crate::{E, I};

const SATISFACTION_TOLERANCE: E = 1e-5;

#[derive(Debug, Clone)]
pub struct MaxConstraint {
    id: ConstraintId,
    out: I,
    elements: Vec<I>,
    eliminated: Vec<bool>,
    lb: Vec<E>,
    ub: Vec<E>,
    phase: Phase,
    active: bool,
}

impl MaxConstraint {
    pub fn new(id: ConstraintId, out: I, elements: Vec<I>) -> Self {
        let eliminated = vec![false; elements.len()];
        let lb = vec![E::NEG_INFINITY; elements.len()];
        let ub = vec![E::INFINITY; elements.len()];
        Self { id, out, elements, eliminated, lb, ub, phase: Phase::Unfixed, active: true }
    }

    /// An element is the forced arg-max once either it is the sole
    /// surviving candidate, or its lower bound already dominates every
    /// other live element's upper bound.
    fn recompute_phase(&mut self) {
        if !matches!(self.phase, Phase::Unfixed) {
            return;
        }
        let live = self.live_indices();
        if live.len() == 1 {
            self.phase = Phase::ArgMax(live[0]);
            return;
        }
        for &i in &live {
            let others_ub = live.iter().filter(|&&j| j != i).map(|&j| self.ub[j]).fold(E::NEG_INFINITY, E::max);
            if self.lb[i] >= others_ub {
                self.phase = Phase::ArgMax(i);
                return;
            }
        }
    }

    fn live_indices(&self) -> Vec<usize> {
        (0..self.elements.len()).filter(|&i| !self.eliminated[i]).collect()
    }

    fn split_for(&self, i: usize) -> CaseSplit {
        let mut split = CaseSplit::new();
        let mut eq = Equation::new(EquationType::Equality);
        eq.add_addend(1.0, self.out);
        eq.add_addend(-1.0, self.elements[i]);
        eq.set_scalar(0.0);
        split = split.with_equation(eq);
        for (j, &elem_j) in self.elements.iter().enumerate() {
            if j == i || self.eliminated[j] {
                continue;
            }
            let mut ge = Equation::new(EquationType::GreaterOrEqual);
            ge.add_addend(1.0, self.elements[i]);
            ge.add_addend(-1.0, elem_j);
            ge.set_scalar(0.0);
            split = split.with_equation(ge);
        }
        split
    }
}

impl PlConstraintBehavior for MaxConstraint {
    fn id(&self) -> ConstraintId {
        self.id
    }

    fn participating_variables(&self) -> Vec<I> {
        let mut vars = vec![self.out];
        vars.extend(self.elements.iter().copied());
        vars
    }

    fn notify_lower_bound(&mut self, variable: I, value: E) {
        if let Some(i) = self.elements.iter().position(|&e| e == variable) {
            if value > self.lb[i] {
                self.lb[i] = value;
                self.recompute_phase();
            }
        }
    }

    fn notify_upper_bound(&mut self, variable: I, value: E) {
        if let Some(i) = self.elements.iter().position(|&e| e == variable) {
            if value < self.ub[i] {
                self.ub[i] = value;
                self.recompute_phase();
            }
        }
    }

    fn notify_variable_value(&mut self, _variable: I, _value: E) {}

    fn satisfied(&self, assignment: &dyn Fn(I) -> E) -> bool {
        let out = assignment(self.out);
        let max = self
            .elements
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.eliminated[*i])
            .map(|(_, &e)| assignment(e))
            .fold(E::NEG_INFINITY, E::max);
        (out - max).abs() <= SATISFACTION_TOLERANCE
    }

    fn get_case_splits(&self) -> Vec<CaseSplit> {
        self.live_indices().into_iter().map(|i| self.split_for(i)).collect()
    }

    fn phase_fixed(&self) -> bool {
        !matches!(self.phase, Phase::Unfixed)
    }

    fn get_valid_case_split(&self) -> Option<CaseSplit> {
        match self.phase {
            Phase::ArgMax(i) => Some(self.split_for(i)),
            _ => None,
        }
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn case_split_for_phase(&self, phase: Phase) -> Option<CaseSplit> {
        match phase {
            Phase::ArgMax(i) if i < self.elements.len() && !self.eliminated[i] => Some(self.split_for(i)),
            _ => None,
        }
    }

    fn get_possible_fixes(&self, assignment: &dyn Fn(I) -> E) -> Vec<Fix> {
        if self.satisfied(assignment) {
            return Vec::new();
        }
        let out = assignment(self.out);
        let (best_idx, best_val) = self
            .elements
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.eliminated[*i])
            .map(|(i, &e)| (i, assignment(e)))
            .fold((0usize, E::NEG_INFINITY), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
        let _ = best_idx;
        vec![Fix { variable: self.out, value: best_val }]
    }

    fn get_smart_fixes(&self, tableau: &Tableau) -> Vec<Fix> {
        let value = |v: I| tableau.value(v);
        self.get_possible_fixes(&value)
    }

    fn eliminate_variable(&mut self, variable: I, fixed_value: E) {
        if variable == self.out {
            self.active = false;
            return;
        }
        if let Some(pos) = self.elements.iter().position(|&e| e == variable) {
            self.eliminated[pos] = true;
            self.lb[pos] = fixed_value;
            self.ub[pos] = fixed_value;
            self.recompute_phase();
            if self.live_indices().len() <= 1 {
                self.active = false;
            }
        }
    }

    fn update_variable_index(&mut self, old_index: I, new_index: I) {
        if self.out == old_index {
            self.out = new_index;
        }
        for elem in self.elements.iter_mut() {
            if *elem == old_index {
                *elem = new_index;
            }
        }
    }

    fn constraint_obsolete(&self) -> bool {
        !self.active
    }

    fn entailed_tightenings(&self) -> Vec<Tightening> {
        Vec::new()
    }

    fn serialize_to_string(&self) -> String {
        let elems: Vec<String> = self.elements.iter().map(|e| e.to_string()).collect();
        format!("max,{},{}", self.out, elems.join(","))
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn direction(&self) -> Phase {
        self.phase
    }

    fn update_direction(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfied_checks_true_max() {
        let c = MaxConstraint::new(ConstraintId(0), 0, vec![1, 2, 3]);
        let values = [5.0, 1.0, 5.0, 2.0];
        assert!(c.satisfied(&|v| values[v]));
        let values_bad = [5.0, 1.0, 2.0, 2.0];
        assert!(!c.satisfied(&|v| values_bad[v]));
    }

    #[test]
    fn case_splits_one_per_element() {
        let c = MaxConstraint::new(ConstraintId(0), 0, vec![1, 2, 3]);
        assert_eq!(c.get_case_splits().len(), 3);
    }

    #[test]
    fn eliminating_all_but_one_deactivates() {
        let mut c = MaxConstraint::new(ConstraintId(0), 0, vec![1, 2, 3]);
        c.eliminate_variable(1, 0.0);
        c.eliminate_variable(2, 0.0);
        assert!(c.constraint_obsolete());
    }
}
