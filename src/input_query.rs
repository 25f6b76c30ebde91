//! The `InputQuery` front-end record: variable count, per-variable
//! bounds, equations, and owned piecewise-linear constraints. Owned by
//! the front-end until handed to the engine for preprocessing, which
//! may eliminate fixed variables or merge aliases.

use std::collections::HashMap;

use crate::equation::Equation;
use crate::error::{EngineError, EngineResult};
use crate::plconstraint::PlConstraint;
use crate::{E, I};

#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub lower: E,
    pub upper: E,
}

#[derive(Clone)]
pub struct InputQuery {
    bounds: Vec<Bounds>,
    equations: Vec<Equation>,
    constraints: Vec<PlConstraint>,
    /// Maps an eliminated variable to the one it was merged/aliased into.
    merged: HashMap<I, I>,
    /// An optional reference assignment used by the `DebuggingMismatch` check.
    debug_assignment: Option<Vec<E>>,
}

impl InputQuery {
    pub fn new(num_variables: I) -> Self {
        Self {
            bounds: vec![Bounds { lower: E::NEG_INFINITY, upper: E::INFINITY }; num_variables],
            equations: Vec::new(),
            constraints: Vec::new(),
            merged: HashMap::new(),
            debug_assignment: None,
        }
    }

    pub fn num_variables(&self) -> I {
        self.bounds.len()
    }

    pub fn set_lower_bound(&mut self, variable: I, value: E) {
        self.bounds[variable].lower = value;
    }

    pub fn set_upper_bound(&mut self, variable: I, value: E) {
        self.bounds[variable].upper = value;
    }

    pub fn bounds(&self, variable: I) -> Bounds {
        self.bounds[variable]
    }

    pub fn all_bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    pub fn add_equation(&mut self, equation: Equation) {
        self.equations.push(equation);
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn add_constraint(&mut self, constraint: PlConstraint) {
        self.constraints.push(constraint);
    }

    pub fn constraints(&self) -> &[PlConstraint] {
        &self.constraints
    }

    pub fn constraints_mut(&mut self) -> &mut [PlConstraint] {
        &mut self.constraints
    }

    pub fn set_debug_assignment(&mut self, assignment: Vec<E>) {
        self.debug_assignment = Some(assignment);
    }

    pub fn debug_assignment(&self) -> Option<&[E]> {
        self.debug_assignment.as_deref()
    }

    /// Eliminates every variable whose bounds have collapsed to a point
    /// (`lb == ub`) before the query reaches the tableau, per the
    /// data-model lifecycle note that the engine "may eliminate or merge"
    /// variables during preprocessing. Rejects variables that are
    /// unbounded on either side, raising the fatal-at-preprocessing
    /// `UnboundedVariable` error.
    pub fn preprocess(&mut self) -> EngineResult<Vec<I>> {
        let mut fixed = Vec::new();
        for (id, bounds) in self.bounds.iter().enumerate() {
            if bounds.lower.is_infinite() || bounds.upper.is_infinite() {
                return Err(EngineError::UnboundedVariable(id));
            }
            if (bounds.upper - bounds.lower).abs() < 1e-9 {
                fixed.push(id);
            }
        }
        for constraint in &mut self.constraints {
            for &id in &fixed {
                let value = self.bounds[id].lower;
                constraint.notify_variable_value(id, value);
            }
        }
        Ok(fixed)
    }

    /// Merges `x2` into `x1` (used to optimise `x1 = x2` equations),
    /// recording the mapping so later references of `x2` resolve to
    /// `x1`. Tightens `x1`'s bounds to the intersection of both.
    pub fn merge_variables(&mut self, x1: I, x2: I) {
        let b1 = self.bounds[x1];
        let b2 = self.bounds[x2];
        self.bounds[x1] = Bounds {
            lower: b1.lower.max(b2.lower),
            upper: b1.upper.min(b2.upper),
        };
        self.merged.insert(x2, x1);
        for constraint in &mut self.constraints {
            constraint.update_variable_index(x2, x1);
        }
    }

    pub fn resolve(&self, variable: I) -> I {
        let mut current = variable;
        while let Some(&mapped) = self.merged.get(&current) {
            current = mapped;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_rejects_unbounded_variables() {
        let query = InputQuery::new(2);
        let mut query = query;
        query.set_lower_bound(0, 0.0);
        query.set_upper_bound(0, 1.0);
        // variable 1 left unbounded
        assert!(matches!(
            query.preprocess(),
            Err(EngineError::UnboundedVariable(1))
        ));
    }

    #[test]
    fn preprocess_reports_fixed_variables() {
        let mut query = InputQuery::new(2);
        query.set_lower_bound(0, 1.0);
        query.set_upper_bound(0, 1.0);
        query.set_lower_bound(1, 0.0);
        query.set_upper_bound(1, 5.0);

        let fixed = query.preprocess().unwrap();
        assert_eq!(fixed, vec![0]);
    }
}
