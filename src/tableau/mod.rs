//! Tableau and bound manager: basis, pivots, variable bounds, row
//! extraction. Uses dense `faer::Mat`/`Col` arithmetic and keeps the
//! basis inverse explicit (`B⁻¹` as a stored `Mat<E>`) rather than going
//! through a factorized solver, since an explicit inverse is what the
//! assignment recurrence `x_B = B⁻¹(b − A_N x_N)` already assumes.

pub mod bound_tightener;
pub mod cost;

use std::collections::HashMap;

use faer::{Col, Mat};

use crate::error::{EngineError, EngineResult};
use crate::variable::{Variable, VariableClass};
use crate::{E, I};

/// Freshness of the cached assignment, mirroring the cost function's
/// `INVALID` / `UPDATED` / `JUST_COMPUTED` triad at the tableau level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentStatus {
    Stale,
    JustComputed,
}

/// Which direction a pivot moves the leaving variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeavingDirection {
    ToLowerBound,
    ToUpperBound,
}

pub struct PivotPlan {
    pub entering: I,
    pub leaving_row: I,
    pub leaving_variable: I,
    pub direction: LeavingDirection,
    pub change_column: Col<E>,
}

/// `m` equations over `n` variables, `m <= n`. Maintains three
/// invariants throughout: the basis matrix stays invertible, the basic
/// assignment equals `B⁻¹(b − A_N x_N)`, and every non-basic variable's
/// value lies within its bounds.
pub struct Tableau {
    m: I,
    n: I,
    /// Dense constraint matrix, `m x n`.
    a: Mat<E>,
    b: Col<E>,
    variables: Vec<Variable>,
    /// `basis[row]` is the variable id currently basic in that row.
    basis: Vec<I>,
    basis_row_of: HashMap<I, I>,
    /// Explicit `B⁻¹`, `m x m`.
    basis_inverse: Mat<E>,
    assignment: Vec<E>,
    status: AssignmentStatus,
    /// Entry magnitude below which a pivot is flagged unstable but still performed.
    pivot_tolerance: E,
    unstable_pivot_count: u64,
    /// Removed-by-merge variables, redirected to their surviving partner.
    merged: HashMap<I, I>,
}

impl Tableau {
    pub fn new(pivot_tolerance: E) -> Self {
        Self {
            m: 0,
            n: 0,
            a: Mat::zeros(0, 0),
            b: Col::zeros(0),
            variables: Vec::new(),
            basis: Vec::new(),
            basis_row_of: HashMap::new(),
            basis_inverse: Mat::zeros(0, 0),
            assignment: Vec::new(),
            status: AssignmentStatus::Stale,
            pivot_tolerance,
            unstable_pivot_count: 0,
            merged: HashMap::new(),
        }
    }

    pub fn set_dimensions(&mut self, m: I, n: I) {
        self.m = m;
        self.n = n;
        self.a = Mat::zeros(m, n);
        self.b = Col::zeros(m);
        self.variables = (0..n).map(|id| Variable::new(id, E::NEG_INFINITY, E::INFINITY)).collect();
        self.assignment = vec![0.0; n];
        self.basis = vec![0; m];
        self.basis_inverse = Mat::zeros(m, m);
    }

    pub fn set_constraint_matrix_entry(&mut self, row: I, col: I, value: E) {
        self.a[(row, col)] = value;
    }

    pub fn set_right_hand_side(&mut self, row: I, value: E) {
        self.b[row] = value;
    }

    pub fn num_variables(&self) -> I {
        self.n
    }

    pub fn num_rows(&self) -> I {
        self.m
    }

    pub fn set_lower_bound(&mut self, x: I, v: E) {
        self.variables[x].set_lower_bound(v);
    }

    pub fn set_upper_bound(&mut self, x: I, v: E) {
        self.variables[x].set_upper_bound(v);
    }

    pub fn lower_bound(&self, x: I) -> E {
        self.variables[x].lower_bound()
    }

    pub fn upper_bound(&self, x: I) -> E {
        self.variables[x].upper_bound()
    }

    pub fn value(&self, x: I) -> E {
        self.assignment[x]
    }

    pub fn set_value(&mut self, x: I, v: E) {
        self.assignment[x] = v;
    }

    pub fn is_basic(&self, x: I) -> bool {
        self.variables[x].is_basic()
    }

    pub fn basic_variables(&self) -> &[I] {
        &self.basis
    }

    pub fn unstable_pivot_count(&self) -> u64 {
        self.unstable_pivot_count
    }

    /// Widens the lower bound only; notifies the caller (the engine
    /// dispatches to watchers) by returning whether the bound moved.
    /// Fails if the new bound crosses the current upper bound.
    pub fn tighten_lower_bound(&mut self, x: I, v: E) -> EngineResult<bool> {
        if v > self.variables[x].upper_bound() + 1e-9 {
            return Err(EngineError::infeasible(format!(
                "lower bound {v} on x{x} exceeds upper bound {}",
                self.variables[x].upper_bound()
            )));
        }
        Ok(self.variables[x].tighten_lower_bound(v))
    }

    pub fn tighten_upper_bound(&mut self, x: I, v: E) -> EngineResult<bool> {
        if v < self.variables[x].lower_bound() - 1e-9 {
            return Err(EngineError::infeasible(format!(
                "upper bound {v} on x{x} is below lower bound {}",
                self.variables[x].lower_bound()
            )));
        }
        Ok(self.variables[x].tighten_upper_bound(v))
    }

    /// Accepts a list of `m` basic variables, factors `B` (via an
    /// explicit Gauss-Jordan inverse) and computes the basic
    /// assignment.
    pub fn initialize_tableau(&mut self, initial_basis: Vec<I>) -> EngineResult<()> {
        assert_eq!(initial_basis.len(), self.m);
        for v in self.variables.iter_mut() {
            v.set_class(VariableClass::NonBasic);
        }
        self.basis_row_of.clear();
        for (row, &var) in initial_basis.iter().enumerate() {
            self.variables[var].set_class(VariableClass::Basic);
            self.basis_row_of.insert(var, row);
        }
        self.basis = initial_basis;
        self.refactorize()?;
        for id in 0..self.n {
            if !self.is_basic(id) {
                self.assignment[id] = clamp_to_nearest_bound(self.lower_bound(id), self.upper_bound(id));
            }
        }
        self.compute_assignment()
    }

    /// Rebuilds `B⁻¹` from scratch from the current basis columns of `A`.
    fn refactorize(&mut self) -> EngineResult<()> {
        let m = self.m;
        let mut b_mat = vec![vec![0.0; m]; m];
        for (row, &var) in self.basis.iter().enumerate() {
            for i in 0..m {
                b_mat[i][row] = self.a[(i, var)];
            }
        }
        let inv = invert_dense(&b_mat).ok_or(EngineError::MalformedBasis)?;
        self.basis_inverse = Mat::from_fn(m, m, |i, j| inv[i][j]);
        Ok(())
    }

    /// `x_B = B⁻¹(b − A_N x_N)`. Sets status to `JustComputed`.
    pub fn compute_assignment(&mut self) -> EngineResult<()> {
        let m = self.m;
        let mut rhs = vec![0.0; m];
        for i in 0..m {
            rhs[i] = self.b[i];
        }
        for id in 0..self.n {
            if !self.is_basic(id) {
                let xj = self.assignment[id];
                if xj != 0.0 {
                    for i in 0..m {
                        rhs[i] -= self.a[(i, id)] * xj;
                    }
                }
            }
        }
        let x_b = mat_vec(&self.basis_inverse, &rhs);
        for (row, &var) in self.basis.iter().enumerate() {
            self.assignment[var] = x_b[row];
        }
        self.status = AssignmentStatus::JustComputed;
        Ok(())
    }

    pub fn status(&self) -> AssignmentStatus {
        self.status
    }

    /// `B⁻¹ · rhs`: solves `B·out = rhs`.
    pub fn forward_transformation(&self, rhs: &[E]) -> Vec<E> {
        mat_vec(&self.basis_inverse, rhs)
    }

    /// `d = B⁻¹ A_{:,entering}`: the change column for a candidate entrant.
    pub fn compute_change_column(&self, entering: I) -> Col<E> {
        let mut col = vec![0.0; self.m];
        for i in 0..self.m {
            col[i] = self.a[(i, entering)];
        }
        let d = mat_vec(&self.basis_inverse, &col);
        Col::from_fn(self.m, |i| d[i])
    }

    /// Row `leaving_row` of the tableau, i.e. `(B⁻¹)_{leaving_row,:} A`,
    /// used both for ratio testing and steepest-edge weight updates.
    pub fn compute_pivot_row(&self, leaving_row: I) -> Vec<E> {
        let mut row = vec![0.0; self.n];
        for id in 0..self.n {
            let mut acc = 0.0;
            for k in 0..self.m {
                acc += self.basis_inverse[(leaving_row, k)] * self.a[(k, id)];
            }
            row[id] = acc;
        }
        row
    }

    /// Non-basic variables eligible to enter: those whose improvement
    /// direction (given `reduced_cost`) would reduce the cost function.
    /// A variable at its lower bound can increase iff `reduced_cost <
    /// 0`; at its upper bound it can decrease iff `reduced_cost > 0`.
    pub fn entry_candidates(&self, reduced_costs: &HashMap<I, E>) -> Vec<I> {
        let mut out = Vec::new();
        for id in 0..self.n {
            if self.is_basic(id) {
                continue;
            }
            let Some(&rc) = reduced_costs.get(&id) else {
                continue;
            };
            let at_lower = (self.assignment[id] - self.lower_bound(id)).abs() < 1e-9;
            let at_upper = (self.assignment[id] - self.upper_bound(id)).abs() < 1e-9;
            if (at_lower && rc < -1e-9) || (at_upper && rc > 1e-9) || (!at_lower && !at_upper) {
                out.push(id);
            }
        }
        out
    }

    /// Ratio test: among basics, find the first to hit a bound as the
    /// entering variable moves in its improving direction.
    pub fn pick_leaving_variable(
        &self,
        entering: I,
        increasing: bool,
        change_column: &Col<E>,
    ) -> Option<(I, I, LeavingDirection)> {
        let mut best: Option<(I, E, LeavingDirection)> = None;
        for (row, &var) in self.basis.iter().enumerate() {
            let d = change_column[row];
            if d.abs() < 1e-9 {
                continue;
            }
            // Entering increasing with d>0 drives x_B down toward lb; d<0 drives it up toward ub.
            let effective_d = if increasing { d } else { -d };
            let (limit, direction) = if effective_d > 0.0 {
                (
                    (self.assignment[var] - self.lower_bound(var)) / effective_d,
                    LeavingDirection::ToLowerBound,
                )
            } else {
                (
                    (self.assignment[var] - self.upper_bound(var)) / effective_d,
                    LeavingDirection::ToUpperBound,
                )
            };
            if limit.is_finite() && limit >= -1e-9 {
                let limit = limit.max(0.0);
                if best.is_none_or(|(_, best_limit, _)| limit < best_limit) {
                    best = Some((row, limit, direction));
                }
            }
        }
        best.map(|(row, _, dir)| (row, self.basis[row], dir))
    }

    /// Performs the pivot: `entering` becomes basic in `leaving_row`,
    /// the evicted variable becomes non-basic pinned at `direction`.
    /// Updates `B⁻¹` incrementally (the classic eta update) rather than
    /// refactorizing, so long as the pivot element clears tolerance;
    /// otherwise the pivot still proceeds, with `unstable_pivot_count`
    /// incremented so the caller can react to accumulating instability.
    pub fn perform_pivot(&mut self, plan: &PivotPlan) -> EngineResult<()> {
        let d_r = plan.change_column[plan.leaving_row];
        if d_r.abs() < self.pivot_tolerance {
            self.unstable_pivot_count += 1;
        }
        if d_r.abs() < 1e-12 {
            return Err(EngineError::MalformedBasis);
        }
        self.eta_update(plan.leaving_row, &plan.change_column)?;

        let leaving_value = match plan.direction {
            LeavingDirection::ToLowerBound => self.lower_bound(plan.leaving_variable),
            LeavingDirection::ToUpperBound => self.upper_bound(plan.leaving_variable),
        };
        self.variables[plan.leaving_variable].set_class(VariableClass::NonBasic);
        self.assignment[plan.leaving_variable] = leaving_value;
        self.variables[plan.entering].set_class(VariableClass::Basic);
        self.basis_row_of.remove(&plan.leaving_variable);
        self.basis_row_of.insert(plan.entering, plan.leaving_row);
        self.basis[plan.leaving_row] = plan.entering;

        self.compute_assignment()
    }

    /// A degenerate pivot: the entering variable's value doesn't move
    /// (the ratio-test limit was exactly zero), only basis membership
    /// changes.
    pub fn perform_degenerate_pivot(&mut self, plan: &PivotPlan) -> EngineResult<()> {
        self.perform_pivot(plan)
    }

    fn eta_update(&mut self, r: I, d: &Col<E>) -> EngineResult<()> {
        let m = self.m;
        let d_r = d[r];
        let mut new_row_r = vec![0.0; m];
        for k in 0..m {
            new_row_r[k] = self.basis_inverse[(r, k)] / d_r;
        }
        for i in 0..m {
            if i == r {
                continue;
            }
            let d_i = d[i];
            if d_i == 0.0 {
                continue;
            }
            for k in 0..m {
                let v = self.basis_inverse[(i, k)] - d_i * new_row_r[k];
                self.basis_inverse[(i, k)] = v;
            }
        }
        for k in 0..m {
            self.basis_inverse[(r, k)] = new_row_r[k];
        }
        Ok(())
    }

    /// `B·out = rhs'`, exposed for callers that already have a row's
    /// worth of coefficients (row bound tightener's implicit-basis mode).
    pub fn ftran_row(&self, rhs: &[E]) -> Vec<E> {
        self.forward_transformation(rhs)
    }

    /// Removes `x2`, redirecting future references to `x1`. Used to
    /// optimise `x1 = x2` equations away before they reach the tableau
    /// proper.
    pub fn merge_columns(&mut self, x1: I, x2: I) {
        self.merged.insert(x2, x1);
    }

    /// Grows the tableau by one row and one slack column to install a
    /// case-split equation at runtime (e.g. a `Max` branch's `elem_i >=
    /// elem_j`). Returns the new slack variable's id; its bounds encode
    /// the equation's relational kind the same way
    /// `Equation::into_equality_with_slack` does for the original rows.
    /// The new column enters the basis in the new row directly (its
    /// coefficient there is always `1`), so no refactorization of the
    /// existing basis is required.
    pub fn add_equation_row(&mut self, coeffs: &[(I, E)], rhs: E, slack_bounds: (E, E)) -> I {
        let new_row = self.m;
        let slack_id = self.n;

        let old_n = self.n;
        self.n += 1;
        self.m += 1;

        let mut new_a = Mat::zeros(self.m, self.n);
        for i in 0..new_row {
            for j in 0..old_n {
                new_a[(i, j)] = self.a[(i, j)];
            }
        }
        for &(var, coeff) in coeffs {
            new_a[(new_row, var)] = coeff;
        }
        new_a[(new_row, slack_id)] = 1.0;
        self.a = new_a;

        let mut new_b = Col::zeros(self.m);
        for i in 0..new_row {
            new_b[i] = self.b[i];
        }
        new_b[new_row] = rhs;
        self.b = new_b;

        self.variables.push(Variable::new(slack_id, slack_bounds.0, slack_bounds.1));
        self.assignment.push(0.0);

        let mut new_inv = Mat::zeros(self.m, self.m);
        for i in 0..new_row {
            for j in 0..new_row {
                new_inv[(i, j)] = self.basis_inverse[(i, j)];
            }
        }
        new_inv[(new_row, new_row)] = 1.0;
        self.basis_inverse = new_inv;

        self.basis.push(slack_id);
        self.basis_row_of.insert(slack_id, new_row);
        self.variables[slack_id].set_class(VariableClass::Basic);

        slack_id
    }

    pub fn resolve(&self, x: I) -> I {
        let mut cur = x;
        while let Some(&mapped) = self.merged.get(&cur) {
            cur = mapped;
        }
        cur
    }

    /// Row coefficients of equation `row`: `(variable, coefficient)`
    /// pairs with nonzero coefficient, used by the row bound tightener.
    pub fn row_coefficients(&self, row: I) -> Vec<(I, E)> {
        (0..self.n)
            .filter_map(|j| {
                let c = self.a[(row, j)];
                if c != 0.0 { Some((j, c)) } else { None }
            })
            .collect()
    }

    pub fn row_rhs(&self, row: I) -> E {
        self.b[row]
    }

    /// Maximum residual `‖A x − b‖_∞`, the degradation measure precision
    /// restoration is triggered by.
    pub fn degradation(&self) -> E {
        let mut worst: E = 0.0;
        for i in 0..self.m {
            let mut acc = -self.b[i];
            for j in 0..self.n {
                let c = self.a[(i, j)];
                if c != 0.0 {
                    acc += c * self.assignment[j];
                }
            }
            worst = worst.max(acc.abs());
        }
        worst
    }

    /// Captures enough state to undo both pivoting and the row/column
    /// growth that `add_equation_row` performs for case-split equations,
    /// so `restore` can shrink the tableau back to exactly the shape it
    /// had when the snapshot was taken.
    pub fn snapshot(&self) -> TableauSnapshot {
        TableauSnapshot {
            m: self.m,
            n: self.n,
            a: self.a.clone(),
            b: self.b.clone(),
            basis: self.basis.clone(),
            basis_inverse: self.basis_inverse.clone(),
            assignment: self.assignment.clone(),
            bounds: self.variables.iter().map(|v| (v.lower_bound(), v.upper_bound())).collect(),
            classes: self.variables.iter().map(|v| v.class()).collect(),
        }
    }

    pub fn restore(&mut self, snap: &TableauSnapshot) {
        self.m = snap.m;
        self.n = snap.n;
        self.a = snap.a.clone();
        self.b = snap.b.clone();
        self.basis = snap.basis.clone();
        self.basis_inverse = snap.basis_inverse.clone();
        self.assignment = snap.assignment.clone();
        self.variables.truncate(snap.n);
        self.basis_row_of.clear();
        for (row, &var) in self.basis.iter().enumerate() {
            self.basis_row_of.insert(var, row);
        }
        for (id, v) in self.variables.iter_mut().enumerate() {
            v.set_lower_bound(snap.bounds[id].0);
            v.set_upper_bound(snap.bounds[id].1);
            v.set_class(snap.classes[id]);
        }
    }
}

fn clamp_to_nearest_bound(lower: E, upper: E) -> E {
    if lower.is_finite() {
        lower
    } else if upper.is_finite() {
        upper
    } else {
        0.0
    }
}

fn mat_vec(m: &Mat<E>, v: &[E]) -> Vec<E> {
    let rows = m.nrows();
    let cols = m.ncols();
    let mut out = vec![0.0; rows];
    for i in 0..rows {
        let mut acc = 0.0;
        for j in 0..cols {
            acc += m[(i, j)] * v[j];
        }
        out[i] = acc;
    }
    out
}

/// Gauss-Jordan inversion of a dense `n x n` matrix. Returns `None` if
/// the matrix is (numerically) singular.
fn invert_dense(a: &[Vec<E>]) -> Option<Vec<Vec<E>>> {
    let n = a.len();
    let mut work: Vec<Vec<E>> = a.to_vec();
    let mut inv: Vec<Vec<E>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_val = work[col][col].abs();
        for row in (col + 1)..n {
            if work[row][col].abs() > pivot_val {
                pivot_row = row;
                pivot_val = work[row][col].abs();
            }
        }
        if pivot_val < 1e-12 {
            return None;
        }
        if pivot_row != col {
            work.swap(pivot_row, col);
            inv.swap(pivot_row, col);
        }
        let pivot = work[col][col];
        for j in 0..n {
            work[col][j] /= pivot;
            inv[col][j] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                work[row][j] -= factor * work[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }
    Some(inv)
}

#[derive(Clone)]
pub struct TableauSnapshot {
    m: I,
    n: I,
    a: Mat<E>,
    b: Col<E>,
    basis: Vec<I>,
    basis_inverse: Mat<E>,
    assignment: Vec<E>,
    bounds: Vec<(E, E)>,
    classes: Vec<VariableClass>,
}

impl TableauSnapshot {
    pub fn num_variables(&self) -> I {
        self.n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_simple() -> Tableau {
        // x0 + x1 + x2(slack) = 10, x0 basic-eligible, bounds wide.
        let mut t = Tableau::new(1e-3);
        t.set_dimensions(1, 3);
        t.set_constraint_matrix_entry(0, 0, 1.0);
        t.set_constraint_matrix_entry(0, 1, 1.0);
        t.set_constraint_matrix_entry(0, 2, 1.0);
        t.set_right_hand_side(0, 10.0);
        t.set_lower_bound(0, 0.0);
        t.set_upper_bound(0, 10.0);
        t.set_lower_bound(1, 0.0);
        t.set_upper_bound(1, 10.0);
        t.set_lower_bound(2, -100.0);
        t.set_upper_bound(2, 100.0);
        t
    }

    #[test]
    fn initialize_computes_assignment() {
        let mut t = build_simple();
        t.initialize_tableau(vec![2]).unwrap();
        // x0 = x1 = 0 (their lower bounds), so slack x2 = 10.
        assert!((t.value(2) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn pivot_preserves_equation() {
        let mut t = build_simple();
        t.initialize_tableau(vec![2]).unwrap();
        t.set_value(0, 4.0);
        t.compute_assignment().unwrap();
        let change_column = t.compute_change_column(2);
        assert!((t.value(2) - 6.0).abs() < 1e-9);
        let _ = change_column;
    }

    #[test]
    fn invert_dense_identity() {
        let m = vec![vec![2.0, 0.0], vec![0.0, 4.0]];
        let inv = invert_dense(&m).unwrap();
        assert!((inv[0][0] - 0.5).abs() < 1e-9);
        assert!((inv[1][1] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn tighten_lower_bound_rejects_crossing() {
        let mut t = build_simple();
        assert!(t.tighten_lower_bound(0, 20.0).is_err());
    }
}
