//! `Sign(b, f, id)`: `f = +1` if `b >= 0` else `f = -1`. Phases:
//! `Positive` (`b >= 0, f = 1`), `Negative` (`b <= 0, f = -1`), or
//! `Unfixed`. Serialization format follows the original
//! `SignConstraint::serializeToString`: `"sign,<f>,<b>"`.

use crate::plconstraint::{ConstraintId, Fix, Phase, PlConstraintBehavior};
use crate::smt::{BoundKind, CaseSplit, Tightening};
use crate::{E, I};

const SATISFACTION_TOLERANCE: E = 1e-5;

#[derive(Debug, Clone)]
pub struct SignConstraint {
    id: ConstraintId,
    b: I,
    f: I,
    lb_b: E,
    ub_b: E,
    phase: Phase,
    direction: Phase,
    active: bool,
}

impl SignConstraint {
    pub fn new(id: ConstraintId, b: I, f: I) -> Self {
        Self {
            id,
            b,
            f,
            lb_b: E::NEG_INFINITY,
            ub_b: E::INFINITY,
            phase: Phase::Unfixed,
            direction: Phase::Positive,
            active: true,
        }
    }

    fn recompute_phase(&mut self) {
        if matches!(self.phase, Phase::Unfixed) {
            if self.lb_b >= -1e-12 {
                self.phase = Phase::Positive;
            } else if self.ub_b <= 1e-12 {
                self.phase = Phase::Negative;
            }
        }
    }

    fn positive_split(&self) -> CaseSplit {
        CaseSplit::new()
            .with_tightening(Tightening { variable: self.b, value: 0.0, kind: BoundKind::Lower })
            .with_tightening(Tightening { variable: self.f, value: 1.0, kind: BoundKind::Lower })
            .with_tightening(Tightening { variable: self.f, value: 1.0, kind: BoundKind::Upper })
    }

    fn negative_split(&self) -> CaseSplit {
        CaseSplit::new()
            .with_tightening(Tightening { variable: self.b, value: 0.0, kind: BoundKind::Upper })
            .with_tightening(Tightening { variable: self.f, value: -1.0, kind: BoundKind::Lower })
            .with_tightening(Tightening { variable: self.f, value: -1.0, kind: BoundKind::Upper })
    }
}

impl PlConstraintBehavior for SignConstraint {
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
        }
    }

    fn notify_upper_bound(&mut self, variable: I, value: E) {
        if variable == self.b && value < self.ub_b {
            self.ub_b = value;
            self.recompute_phase();
        }
    }

    fn notify_variable_value(&mut self, _variable: I, _value: E) {}

    fn satisfied(&self, assignment: &dyn Fn(I) -> E) -> bool {
        let b = assignment(self.b);
        let f = assignment(self.f);
        let expected = if b >= 0.0 { 1.0 } else { -1.0 };
        (f - expected).abs() <= SATISFACTION_TOLERANCE
    }

    fn get_case_splits(&self) -> Vec<CaseSplit> {
        match self.direction {
            Phase::Negative => vec![self.negative_split(), self.positive_split()],
            _ => vec![self.positive_split(), self.negative_split()],
        }
    }

    fn phase_fixed(&self) -> bool {
        !matches!(self.phase, Phase::Unfixed)
    }

    fn get_valid_case_split(&self) -> Option<CaseSplit> {
        match self.phase {
            Phase::Positive => Some(self.positive_split()),
            Phase::Negative => Some(self.negative_split()),
            _ => None,
        }
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn case_split_for_phase(&self, phase: Phase) -> Option<CaseSplit> {
        match phase {
            Phase::Positive => Some(self.positive_split()),
            Phase::Negative => Some(self.negative_split()),
            _ => None,
        }
    }

    fn get_possible_fixes(&self, assignment: &dyn Fn(I) -> E) -> Vec<Fix> {
        let b = assignment(self.b);
        let f = assignment(self.f);
        let expected = if b >= 0.0 { 1.0 } else { -1.0 };
        if (f - expected).abs() <= SATISFACTION_TOLERANCE {
            return Vec::new();
        }
        let b_fix = if f >= 0.0 { 0.0 } else { -SATISFACTION_TOLERANCE };
        vec![Fix { variable: self.f, value: expected }, Fix { variable: self.b, value: b_fix }]
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
            Phase::Positive => vec![
                Tightening { variable: self.f, value: 1.0, kind: BoundKind::Lower },
                Tightening { variable: self.f, value: 1.0, kind: BoundKind::Upper },
            ],
            Phase::Negative => vec![
                Tightening { variable: self.f, value: -1.0, kind: BoundKind::Lower },
                Tightening { variable: self.f, value: -1.0, kind: BoundKind::Upper },
            ],
            _ => Vec::new(),
        }
    }

    fn serialize_to_string(&self) -> String {
        format!("sign,{},{}", self.f, self.b)
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
        self.direction = if (self.ub_b + self.lb_b) >= 0.0 { Phase::Positive } else { Phase::Negative };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfied_checks_sign() {
        let c = SignConstraint::new(ConstraintId(0), 0, 1);
        let values = [3.0, 1.0];
        assert!(c.satisfied(&|v| values[v]));
        let values_neg = [-3.0, -1.0];
        assert!(c.satisfied(&|v| values_neg[v]));
        let values_bad = [-3.0, 1.0];
        assert!(!c.satisfied(&|v| values_bad[v]));
    }

    #[test]
    fn lower_bound_fixes_positive_phase() {
        let mut c = SignConstraint::new(ConstraintId(0), 0, 1);
        c.notify_lower_bound(0, 0.0);
        assert_eq!(c.phase, Phase::Positive);
    }

    #[test]
    fn serialization_matches_expected_format() {
        let c = SignConstraint::new(ConstraintId(0), 5, 7);
        assert_eq!(c.serialize_to_string(), "sign,7,5");
    }
}
