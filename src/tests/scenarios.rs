use crate::config::{DivideStrategy, EngineOptions};
use crate::divider::QueryDivider;
use crate::engine::Engine;
use crate::input_query::InputQuery;
use crate::plconstraint::{ConstraintId, MaxConstraint};
use crate::ExitCode;

/// `out = max{x1, x2, x3}`, `x1 in [0,1]`, `x2 in [2,3]`, `x3 in [0,1]`,
/// `out in [0,5]`. `x2`'s lower bound already exceeds every other
/// element's upper bound, so the only satisfying arg-max is `x2`:
/// expect SAT with `out in [2,3]` and `out == x2`.
#[test]
fn max_constraint_arg_max_picks_the_only_feasible_element() {
    let mut query = InputQuery::new(4);
    query.set_lower_bound(0, 0.0);
    query.set_upper_bound(0, 5.0);
    query.set_lower_bound(1, 0.0);
    query.set_upper_bound(1, 1.0);
    query.set_lower_bound(2, 2.0);
    query.set_upper_bound(2, 3.0);
    query.set_lower_bound(3, 0.0);
    query.set_upper_bound(3, 1.0);
    query.add_constraint(MaxConstraint::new(ConstraintId(0), 0, vec![1, 2, 3]).into());

    let options = EngineOptions::new();
    let mut engine = Engine::new(query, &options).unwrap();
    let code = engine.solve();
    assert_eq!(code, ExitCode::Sat);

    let out = engine.value(0);
    let x2 = engine.value(2);
    assert!(out >= 2.0 - 1e-4 && out <= 3.0 + 1e-4, "out={out}");
    assert!((out - x2).abs() < 1e-4, "out={out} x2={x2}");
}

/// With `initialDivides = 2`, `initialTimeout = 1s`, the queue must
/// initially hold `2^2 = 4` subqueries each carrying a 1s budget; a
/// subquery that times out and is re-split with `onlineDivides = 1`,
/// `timeoutFactor = 1.5` must produce `2^1 = 2` children each carrying
/// a `1.5s` budget.
#[test]
fn timeout_partitioning_matches_divide_and_factor_arithmetic() {
    let divider = QueryDivider::new(DivideStrategy::LargestInterval, 1.5);
    let bounds = vec![(0.0, 10.0), (0.0, 4.0)];

    let initial = divider.create_initial_subqueries(&bounds, &[], 2, 1.0);
    assert_eq!(initial.len(), 4);
    for sq in &initial {
        assert!((sq.timeout_seconds - 1.0).abs() < 1e-9);
    }

    let timed_out = &initial[0];
    let children = divider.subdivide(timed_out, &bounds, &[], 1);
    assert_eq!(children.len(), 2);
    for child in &children {
        assert!((child.timeout_seconds - 1.5).abs() < 1e-9);
    }
}
