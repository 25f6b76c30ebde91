//! Piecewise-linear constraint abstraction: a closed, tagged variant
//! over `{ReLU, Max, Sign}` dispatched through `enum_dispatch` rather
//! than an open trait-object hierarchy, since the set of supported
//! activation shapes is small and fixed.

pub mod max;
pub mod relu;
pub mod sign;

use enum_dispatch::enum_dispatch;

use crate::smt::{CaseSplit, Tightening};
use crate::tableau::Tableau;
use crate::{E, I};

pub use max::MaxConstraint;
pub use relu::ReluConstraint;
pub use sign::SignConstraint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub I);

/// The affine piece currently selected. Not every variant of a given
/// constraint kind is meaningful for every other kind (`ArgMax` only
/// applies to `Max`); each constraint only ever produces the phases it
/// understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unfixed,
    Active,
    Inactive,
    Positive,
    Negative,
    ArgMax(I),
}

/// A proposed repair for a single variable that would move an
/// unsatisfied constraint closer to satisfaction.
#[derive(Debug, Clone, Copy)]
pub struct Fix {
    pub variable: I,
    pub value: E,
}

/// Shared capability set every PL constraint variant implements.
/// `enum_dispatch` generates the `impl PlConstraintBehavior for
/// PlConstraint` delegating match arms, so adding a new variant only
/// requires implementing this trait for the new struct and listing it
/// in the `PlConstraint` enum below.
#[enum_dispatch]
pub trait PlConstraintBehavior {
    fn id(&self) -> ConstraintId;
    fn participating_variables(&self) -> Vec<I>;
    fn participates(&self, variable: I) -> bool {
        self.participating_variables().contains(&variable)
    }

    fn notify_lower_bound(&mut self, variable: I, value: E);
    fn notify_upper_bound(&mut self, variable: I, value: E);
    fn notify_variable_value(&mut self, variable: I, value: E);

    /// `true` iff the current assignment satisfies the constraint to
    /// within `1e-5`.
    fn satisfied(&self, assignment: &dyn Fn(I) -> E) -> bool;

    /// Complementary, covering case splits: the disjunction over this
    /// list is valid given the participants' current bounds.
    fn get_case_splits(&self) -> Vec<CaseSplit>;

    fn phase_fixed(&self) -> bool;
    fn get_valid_case_split(&self) -> Option<CaseSplit>;

    /// The phase currently selected (`Unfixed` until bounds or an
    /// external fixing pin it down). Exposed for the look-ahead
    /// preprocessor, which needs to read back which branch a probe
    /// settled into rather than just the fact that one did.
    fn phase(&self) -> Phase;

    /// The case split that realizes `phase`, independent of which
    /// element of `get_case_splits()` currently occupies that slot
    /// (branching direction can reorder that list). `None` if this
    /// constraint variant has no such phase or it no longer applies
    /// (e.g. an eliminated `Max` element). Used by the look-ahead
    /// preprocessor to impose a phase another worker already proved,
    /// without going through the SMT split stack.
    fn case_split_for_phase(&self, phase: Phase) -> Option<CaseSplit>;

    fn get_possible_fixes(&self, assignment: &dyn Fn(I) -> E) -> Vec<Fix>;
    /// Pivot-aware fix proposals using tableau row information. Falls
    /// back to `get_possible_fixes` when a variant has nothing smarter
    /// to offer.
    fn get_smart_fixes(&self, tableau: &Tableau) -> Vec<Fix> {
        let value = |v: I| tableau.value(v);
        self.get_possible_fixes(&value)
    }

    fn eliminate_variable(&mut self, variable: I, fixed_value: E);
    fn update_variable_index(&mut self, old_index: I, new_index: I);
    fn constraint_obsolete(&self) -> bool;

    fn entailed_tightenings(&self) -> Vec<Tightening>;
    fn serialize_to_string(&self) -> String;

    fn is_active(&self) -> bool;
    fn set_active(&mut self, active: bool);

    /// Which child to explore first when this constraint is split on.
    fn direction(&self) -> Phase;
    fn update_direction(&mut self);
}

#[enum_dispatch(PlConstraintBehavior)]
#[derive(Debug, Clone)]
pub enum PlConstraint {
    Relu(ReluConstraint),
    Max(MaxConstraint),
    Sign(SignConstraint),
}

impl PlConstraint {
    /// Clones the constraint's current state, used by the SMT core to
    /// snapshot at a split frame and by the precision restorer to
    /// replay from a clean state.
    pub fn duplicate_constraint(&self) -> PlConstraint {
        self.clone()
    }

    pub fn restore_state(&mut self, snapshot: &PlConstraint) {
        *self = snapshot.clone();
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn relu_participates_in_both_variables() {
        let c = ReluConstraint::new(ConstraintId(0), 0, 1);
        let wrapped: PlConstraint = c.into();
        assert!(wrapped.participates(0));
        assert!(wrapped.participates(1));
        assert!(!wrapped.participates(2));
    }

    /// Every two-variable variant's `b`/`f` participate, a fresh
    /// constraint is never phase-fixed, and it never reports itself
    /// obsolete before any variable is eliminated — the same contract
    /// `PlConstraintBehavior` promises regardless of which activation
    /// shape is behind it.
    #[rstest]
    #[case::relu(ReluConstraint::new(ConstraintId(0), 0, 1).into())]
    #[case::sign(SignConstraint::new(ConstraintId(0), 0, 1).into())]
    fn fresh_two_variable_constraint_is_unfixed_and_active(#[case] wrapped: PlConstraint) {
        assert!(wrapped.participates(0));
        assert!(wrapped.participates(1));
        assert!(!wrapped.phase_fixed());
        assert!(wrapped.is_active());
        assert!(!wrapped.constraint_obsolete());
        assert_eq!(wrapped.get_case_splits().len(), 2);
    }
}
