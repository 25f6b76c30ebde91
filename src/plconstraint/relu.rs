//! `ReLU(b, f, id)`: `f = max(b, 0)`. Phases: Active (`b >= 0, f = b`),
//! Inactive (`b <= 0, f = 0`), or Unfixed. Grounded in the original
//! `ReluConstraint`/`SignConstraint.h` shape: a pair of watched
//! variables, a phase, a direction (which phase to try first), and an
//! `active` flag cleared once a valid split eliminates the constraint.

use crate::equation::{Equation, EquationType};
use crate::plconstraint::{ConstraintId, Fix, Phase, PlConstraintBehavior};
use crate::smt::{BoundKind, CaseSplit, Tightening};
use crate::{E, I};

const SATISFACTION_TOLERANCE: E = 1e-5;

#[derive(Debug, Clone)]
pub struct ReluConstraint {
    id: ConstraintId,
    b: I,
    f: I,
    lb_b: E,
    ub_b: E,
    lb_f: E,
    ub_f: E,
    phase: Phase,
    direction: Phase,
    active: bool,
}

impl ReluConstraint {
    pub fn new(id: ConstraintId, b: I, f: I) -> Self {
        Self {
            id,
            b,
            f,
            lb_b: E::NEG_INFINITY,
            ub_b: E::INFINITY,
            lb_f: 0.0,
            ub_f: E::INFINITY,
            phase: Phase::Unfixed,
            direction: Phase::Active,
            active: true,
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    fn recompute_phase(&mut self) {
        if matches!(self.phase, Phase::Unfixed) {
            if self.lb_b >= -1e-12 {
                self.set_phase(Phase::Active);
            } else if self.ub_b <= 1e-12 {
                self.set_phase(Phase::Inactive);
            }
        }
    }

    fn active_split(&self) -> CaseSplit {
        let mut eq = Equation::new(EquationType::Equality);
        eq.add_addend(1.0, self.f);
        eq.add_addend(-1.0, self.b);
        eq.set_scalar(0.0);
        CaseSplit::new()
            .with_tightening(Tightening { variable: self.b, value: 0.0, kind: BoundKind::Lower })
            .with_equation(eq)
    }

    fn inactive_split(&self) -> CaseSplit {
        CaseSplit::new()
            .with_tightening(Tightening { variable: self.b, value: 0.0, kind: BoundKind::Upper })
            .with_tightening(Tightening { variable: self.f, value: 0.0, kind: BoundKind::Upper })
    }
}

impl PlConstraintBehavior for ReluConstraint {
    fn id(&self) -> ConstraintId {
        self.id
    }

    fn participating_variables(&self) -> Vec<I> {
        vec![self.b, self.f]
    }

    fn notify_lower_bound(&mut self, variable: I, value: E) {
        if variable == self.b && value > self.lb_b {
            self.lb_b = value;
            self.recompute_phase();
        } else if variable == self.f && value > self.lb_f {
            self.lb_f = value;
        }
    }

    fn notify_upper_bound(&mut self, variable: I, value: E) {
        if variable == self.b && value < self.ub_b {
            self.ub_b = value;
            self.recompute_phase();
        } else if variable == self.f && value < self.ub_f {
            self.ub_f = value;
        }
    }

    fn notify_variable_value(&mut self, _variable: I, _value: E) {}

    fn satisfied(&self, assignment: &dyn Fn(I) -> E) -> bool {
        let b = assignment(self.b);
        let f = assignment(self.f);
        (f - b.max(0.0)).abs() <= SATISFACTION_TOLERANCE
    }

    fn get_case_splits(&self) -> Vec<CaseSplit> {
        match self.direction {
            Phase::Inactive => vec![self.inactive_split(), self.active_split()],
            _ => vec![self.active_split(), self.inactive_split()],
        }
    }

    fn phase_fixed(&self) -> bool {
        !matches!(self.phase, Phase::Unfixed)
    }

    fn get_valid_case_split(&self) -> Option<CaseSplit> {
        match self.phase {
            Phase::Active => Some(self.active_split()),
            Phase::Inactive => Some(self.inactive_split()),
            _ => None,
        }
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn case_split_for_phase(&self, phase: Phase) -> Option<CaseSplit> {
        match phase {
            Phase::Active => Some(self.active_split()),
            Phase::Inactive => Some(self.inactive_split()),
            _ => None,
        }
    }

    fn get_possible_fixes(&self, assignment: &dyn Fn(I) -> E) -> Vec<Fix> {
        let b = assignment(self.b);
        let f = assignment(self.f);
        if (f - b.max(0.0)).abs() <= SATISFACTION_TOLERANCE {
            return Vec::new();
        }
        if b >= 0.0 {
            vec![Fix { variable: self.f, value: b }, Fix { variable: self.b, value: f }]
        } else {
            vec![Fix { variable: self.f, value: 0.0 }, Fix { variable: self.b, value: 0.0 }]
        }
    }

    fn eliminate_variable(&mut self, variable: I, fixed_value: E) {
        if variable == self.b || variable == self.f {
            self.active = false;
            let _ = fixed_value;
        }
    }

    fn update_variable_index(&mut self, old_index: I, new_index: I) {
        if self.b == old_index {
            self.b = new_index;
        }
        if self.f == old_index {
            self.f = new_index;
        }
    }

    fn constraint_obsolete(&self) -> bool {
        !self.active
    }

    fn entailed_tightenings(&self) -> Vec<Tightening> {
        match self.phase {
            Phase::Active => vec![
                Tightening { variable: self.f, value: self.lb_b.max(0.0), kind: BoundKind::Lower },
            ],
            Phase::Inactive => vec![
                Tightening { variable: self.f, value: 0.0, kind: BoundKind::Upper },
            ],
            Phase::Unfixed => Vec::new(),
            _ => Vec::new(),
        }
    }

    fn serialize_to_string(&self) -> String {
        format!("relu,{},{}", self.f, self.b)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn direction(&self) -> Phase {
        self.direction
    }

    fn update_direction(&mut self) {
        self.direction = if (self.ub_b + self.lb_b) >= 0.0 { Phase::Active } else { Phase::Inactive };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assign(b: E, f: E) -> impl Fn(I) -> E {
        move |v| if v == 0 { b } else { f }
    }

    #[test]
    fn satisfied_on_active_branch() {
        let c = ReluConstraint::new(ConstraintId(0), 0, 1);
        assert!(c.satisfied(&assign(3.0, 3.0)));
        assert!(!c.satisfied(&assign(3.0, 0.0)));
    }

    #[test]
    fn lower_bound_on_b_fixes_active_phase() {
        let mut c = ReluConstraint::new(ConstraintId(0), 0, 1);
        c.notify_lower_bound(0, 0.0);
        assert!(c.phase_fixed());
        assert_eq!(c.phase, Phase::Active);
    }

    #[test]
    fn upper_bound_on_b_fixes_inactive_phase() {
        let mut c = ReluConstraint::new(ConstraintId(0), 0, 1);
        c.notify_upper_bound(0, 0.0);
        assert!(c.phase_fixed());
        assert_eq!(c.phase, Phase::Inactive);
    }

    #[test]
    fn case_splits_are_complementary() {
        let c = ReluConstraint::new(ConstraintId(0), 0, 1);
        let splits = c.get_case_splits();
        assert_eq!(splits.len(), 2);
    }
}
