//! Engine main loop (C6) and precision restorer (C7): orchestrates
//! pivoting, piecewise-linear fixups, bound tightening and the
//! case-split search over a preprocessed [`InputQuery`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use macros::use_option;

use crate::config::EngineOptions;
use crate::equation::{Equation, EquationType};
use crate::error::{EngineError, EngineResult};
use crate::input_query::InputQuery;
use crate::plconstraint::{ConstraintId, PlConstraint, PlConstraintBehavior};
use crate::smt::{BoundKind, CaseSplit, SmtCore, Tightening};
use crate::tableau::bound_tightener::RowBoundTightener;
use crate::tableau::cost::{CostFunctionManager, CostStatus};
use crate::tableau::{PivotPlan, Tableau, TableauSnapshot};
use crate::{ExitCode, E, I};

const DEFAULT_PIVOT_TOLERANCE: E = 1e-3;
const DEFAULT_SATISFIED_TOLERANCE: E = 1e-5;
const DEFAULT_DEGRADATION_THRESHOLD: E = 1e-6;
const DEFAULT_DEGRADATION_CHECK_FREQUENCY: u32 = 100;
const DEFAULT_SPLIT_THRESHOLD: u32 = 20;
const DEFAULT_ROW_TIGHTENER_ITERATIONS: u32 = 5;
const MAX_ENTRY_CANDIDATES: usize = 5;

/// Snapshot of everything needed to resume or replay a search node: the
/// tableau's basis/assignment/bounds, a duplicate of every PL
/// constraint's internal state, and how many constraints had already
/// been disabled by valid splits at that point.
#[derive(Clone)]
pub struct EngineState {
    tableau: TableauSnapshot,
    constraints: Vec<PlConstraint>,
    disabled_count: u32,
}

impl EngineState {
    /// A placeholder with no rows or constraints, used by tests that
    /// only exercise the SMT stack's bookkeeping.
    pub fn empty() -> Self {
        Self {
            tableau: Tableau::new(DEFAULT_PIVOT_TOLERANCE).snapshot(),
            constraints: Vec::new(),
            disabled_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestorationKind {
    Strong,
    Weak,
}

#[use_option(name = "pivot_tolerance", type_ = f64, default = "1e-3", description = "Minimum pivot entry magnitude accepted without incrementing the SimplexUnstablePivot counter")]
#[use_option(name = "satisfied_tolerance", type_ = f64, default = "1e-5", description = "Maximum slack at which an equation or PL constraint is considered satisfied")]
#[use_option(name = "split_threshold", type_ = u32, default = "20", description = "Violation count for the attention constraint above which needToSplit fires")]
#[use_option(name = "degradation_threshold", type_ = f64, default = "1e-6", description = "Maximum tableau residual before precision restoration is triggered")]
#[use_option(name = "degradation_check_frequency", type_ = u32, default = "100", description = "Main-loop iterations between degradation checks")]
pub struct Engine {
    tableau: Tableau,
    cost: CostFunctionManager,
    row_tightener: RowBoundTightener,
    smt: SmtCore,
    constraints: Vec<PlConstraint>,
    /// variable id -> indices into `constraints` watching it; an
    /// indexed notification table rather than mutual references.
    watchers: HashMap<I, Vec<usize>>,
    initial_state: EngineState,
    restoration_pending: Option<RestorationKind>,
    iterations_since_degradation_check: u32,
    degradation_threshold: E,
    degradation_check_frequency: u32,
    satisfied_tolerance: E,
    malformed_basis_strikes: u32,
    restoration_failures: u32,
    start: Instant,
    timeout: Option<Duration>,
    quit: Arc<AtomicBool>,
    last_exit_code: ExitCode,
    iterations: u64,
    max_iterations: Option<u64>,
    pivot_count: u64,
    pivot_time: Duration,
}

impl Engine {
    /// Preprocesses `query` (eliminating fixed variables), converts
    /// every equation into an equality via a slack column, and builds
    /// an initial tableau whose basis is the all-slacks basis — the
    /// standard Phase-1 starting point.
    pub fn new(mut query: InputQuery, options: &EngineOptions) -> EngineResult<Self> {
        let pivot_tolerance = options.get_option::<f64>("pivot_tolerance").unwrap_or(DEFAULT_PIVOT_TOLERANCE);
        let satisfied_tolerance =
            options.get_option::<f64>("satisfied_tolerance").unwrap_or(DEFAULT_SATISFIED_TOLERANCE);
        let split_threshold = options.get_option::<u32>("split_threshold").unwrap_or(DEFAULT_SPLIT_THRESHOLD);
        let degradation_threshold =
            options.get_option::<f64>("degradation_threshold").unwrap_or(DEFAULT_DEGRADATION_THRESHOLD);
        let degradation_check_frequency = options
            .get_option::<u32>("degradation_check_frequency")
            .unwrap_or(DEFAULT_DEGRADATION_CHECK_FREQUENCY);

        query.preprocess()?;

        let num_original = query.num_variables();
        let equations = query.equations().to_vec();
        let m = equations.len();
        let n = num_original + m;

        let mut tableau = Tableau::new(pivot_tolerance);
        tableau.set_dimensions(m, n);

        for id in 0..num_original {
            let bounds = query.bounds(id);
            tableau.set_lower_bound(id, bounds.lower);
            tableau.set_upper_bound(id, bounds.upper);
        }

        let mut initial_basis = Vec::with_capacity(m);
        for (row, equation) in equations.iter().enumerate() {
            let slack_id = num_original + row;
            for &(var, coeff) in equation.addends() {
                tableau.set_constraint_matrix_entry(row, var, coeff);
            }
            tableau.set_constraint_matrix_entry(row, slack_id, 1.0);
            tableau.set_right_hand_side(row, equation.scalar());
            let (lb, ub) = match equation.kind() {
                EquationType::Equality => (0.0, 0.0),
                EquationType::LessOrEqual => (0.0, E::INFINITY),
                EquationType::GreaterOrEqual => (E::NEG_INFINITY, 0.0),
            };
            tableau.set_lower_bound(slack_id, lb);
            tableau.set_upper_bound(slack_id, ub);
            initial_basis.push(slack_id);
        }

        tableau.initialize_tableau(initial_basis)?;

        let constraints: Vec<PlConstraint> = query.constraints().to_vec();
        let mut watchers: HashMap<I, Vec<usize>> = HashMap::new();
        let mut smt = SmtCore::new(split_threshold);
        for (idx, c) in constraints.iter().enumerate() {
            for var in c.participating_variables() {
                watchers.entry(var).or_default().push(idx);
            }
            smt.heuristic_mut().initialize_constraint(c.id());
        }

        let mut engine = Self {
            tableau,
            cost: CostFunctionManager::new(),
            row_tightener: RowBoundTightener::new(DEFAULT_ROW_TIGHTENER_ITERATIONS),
            smt,
            constraints,
            watchers,
            initial_state: EngineState::empty(),
            restoration_pending: None,
            iterations_since_degradation_check: 0,
            degradation_threshold,
            degradation_check_frequency,
            satisfied_tolerance,
            malformed_basis_strikes: 0,
            restoration_failures: 0,
            start: Instant::now(),
            timeout: None,
            quit: Arc::new(AtomicBool::new(false)),
            last_exit_code: ExitCode::NotDone,
            iterations: 0,
            max_iterations: None,
            pivot_count: 0,
            pivot_time: Duration::ZERO,
        };

        // Seed every watcher with the bounds already known so a
        // constraint whose participant is already fixed starts with a
        // correct phase rather than waiting for the first tightening.
        for id in 0..engine.tableau.num_variables() {
            let lb = engine.tableau.lower_bound(id);
            let ub = engine.tableau.upper_bound(id);
            engine.notify_watchers_lower(id, lb);
            engine.notify_watchers_upper(id, ub);
        }

        engine.initial_state = engine.snapshot_state();
        Ok(engine)
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
        self.start = Instant::now();
    }

    pub fn quit_handle(&self) -> Arc<AtomicBool> {
        self.quit.clone()
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::Release);
    }

    pub fn last_exit_code(&self) -> ExitCode {
        self.last_exit_code
    }

    pub fn value(&self, variable: I) -> E {
        self.tableau.value(variable)
    }

    pub fn tableau(&self) -> &Tableau {
        &self.tableau
    }

    /// Builds the `RESULT` record for the search so far:
    /// wall-clock elapsed since the last `set_timeout`/construction,
    /// the caller-supplied pending-or-fixed count (a DnC manager's
    /// remaining subqueries, or a look-ahead preprocessor's fixed-count),
    /// and the average wall-clock time per simplex pivot.
    pub fn summary(&self, pending_or_fixed: u64) -> crate::summary::Summary {
        let avg_pivot_micros =
            if self.pivot_count == 0 { 0.0 } else { self.pivot_time.as_secs_f64() * 1e6 / self.pivot_count as f64 };
        crate::summary::Summary::new(
            self.last_exit_code,
            self.start.elapsed().as_secs_f64(),
            pending_or_fixed,
            avg_pivot_micros,
        )
    }

    pub fn snapshot_state(&self) -> EngineState {
        EngineState {
            tableau: self.tableau.snapshot(),
            constraints: self.constraints.clone(),
            disabled_count: self.constraints.iter().filter(|c| !c.is_active()).count() as u32,
        }
    }

    pub fn restore_state(&mut self, state: &EngineState) {
        self.tableau.restore(&state.tableau);
        self.constraints = state.constraints.clone();
        self.cost.invalidate();
    }

    /// Restores the tableau and constraints to the state captured at
    /// construction, used by DnC workers before applying a popped
    /// subquery's split: every pop restores to the stored initial state,
    /// not only after a timeout.
    pub fn restore_to_initial_state(&mut self) {
        let initial = self.initial_state.clone();
        self.restore_state(&initial);
        self.malformed_basis_strikes = 0;
        self.restoration_failures = 0;
        self.restoration_pending = None;
    }

    /// Applies a root `CaseSplit` (the subquery's defining split in DnC
    /// mode, or a replayed implied split during precision restoration).
    pub fn apply_root_case_split(&mut self, split: &CaseSplit) -> EngineResult<()> {
        self.apply_case_split(split)
    }

    pub fn constraints(&self) -> &[PlConstraint] {
        &self.constraints
    }

    /// Runs row bound tightening and valid-case-split propagation to a
    /// fixpoint without stepping the simplex or the SMT search. Used by
    /// the look-ahead preprocessor to apply a batch of externally-fixed
    /// phases before probing further constraints.
    pub fn saturate_valid_splits(&mut self) -> EngineResult<()> {
        self.propagate_implied_splits()
    }

    /// Runs the main loop to completion (bounded only by timeout / quit
    /// flag), returning the terminal exit code.
    pub fn solve(&mut self) -> ExitCode {
        self.max_iterations = None;
        self.run()
    }

    /// Runs the main loop for at most `max_iterations` steps, used by
    /// the look-ahead preprocessor's bounded-depth probing. Returns
    /// `NotDone` if the cap is hit before a terminal verdict.
    pub fn solve_bounded(&mut self, max_iterations: u64) -> ExitCode {
        self.max_iterations = Some(max_iterations);
        self.run()
    }

    fn run(&mut self) -> ExitCode {
        loop {
            match self.step() {
                Ok(Some(code)) => {
                    self.last_exit_code = code;
                    return code;
                }
                Ok(None) => continue,
                Err(EngineError::InfeasibleQuery(reason)) => {
                    debug!("infeasible query: {reason}, backtracking");
                    if !self.backtrack() {
                        self.last_exit_code = ExitCode::Unsat;
                        return ExitCode::Unsat;
                    }
                }
                Err(EngineError::MalformedBasis) => match self.handle_malformed_basis() {
                    Ok(()) => continue,
                    Err(e) => {
                        warn!("fatal after malformed basis escalation: {e}");
                        self.last_exit_code = ExitCode::Error;
                        return ExitCode::Error;
                    }
                },
                Err(e) => {
                    warn!("engine error: {e}");
                    self.last_exit_code = ExitCode::Error;
                    return ExitCode::Error;
                }
            }
        }
    }

    fn step(&mut self) -> EngineResult<Option<ExitCode>> {
        if let Some(timeout) = self.timeout {
            if self.start.elapsed() >= timeout {
                return Ok(Some(ExitCode::Timeout));
            }
        }
        if self.quit.load(Ordering::Acquire) {
            return Ok(Some(ExitCode::QuitRequested));
        }
        if let Some(max) = self.max_iterations {
            if self.iterations >= max {
                return Ok(Some(ExitCode::NotDone));
            }
        }
        self.iterations += 1;

        if let Some(kind) = self.restoration_pending.take() {
            self.restore_precision(kind)?;
            return Ok(None);
        }

        self.iterations_since_degradation_check += 1;
        if self.iterations_since_degradation_check >= self.degradation_check_frequency {
            self.iterations_since_degradation_check = 0;
            if self.tableau.degradation() > self.degradation_threshold {
                self.restoration_pending = Some(RestorationKind::Strong);
                return Ok(None);
            }
        }

        let tightenings = self.row_tightener.tighten(&self.tableau);
        self.apply_tightenings(&tightenings)?;

        let violated = self.collect_violated_constraint_ids();
        for &id in &violated {
            self.smt.report_violated_constraint(id);
        }
        if let Some(candidate) = self.select_split_candidate(&violated) {
            self.apply_split_for_constraint(candidate)?;
            self.propagate_implied_splits()?;
            return Ok(None);
        }

        if self.any_bound_crossed() {
            return Err(EngineError::infeasible("a variable's lower bound exceeds its upper bound"));
        }

        if self.all_basics_within_bounds() {
            if violated.is_empty() {
                self.tableau.compute_assignment()?;
                info!("solve finished: SAT");
                return Ok(Some(ExitCode::Sat));
            }
            self.apply_constraint_fix(violated[0])?;
            let more = self.row_tightener.tighten(&self.tableau);
            self.apply_tightenings(&more)?;
            self.propagate_implied_splits()?;
            return Ok(None);
        }

        self.simplex_step()?;
        Ok(None)
    }

    fn select_split_candidate(&self, violated: &[ConstraintId]) -> Option<ConstraintId> {
        let exceeding: Vec<ConstraintId> = violated.iter().copied().filter(|&id| self.smt.needs_split(id)).collect();
        if exceeding.is_empty() {
            return None;
        }
        let active_and_unfixed = |id: ConstraintId| {
            self.index_of(id).is_some_and(|idx| self.constraints[idx].is_active() && !self.constraints[idx].phase_fixed())
        };
        self.smt
            .heuristic()
            .pick_splitting_constraint(active_and_unfixed)
            .filter(|id| exceeding.contains(id))
            .or_else(|| exceeding.first().copied())
    }

    fn apply_split_for_constraint(&mut self, id: ConstraintId) -> EngineResult<()> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| EngineError::Other(format!("unknown constraint {id:?}")))?;
        let alternatives = self.constraints[idx].get_case_splits();
        let state = self.snapshot_state();
        let first = self.smt.perform_split(id, alternatives, state);
        self.apply_case_split(&first)
    }

    /// After a split (or a backtrack restoring one), repeatedly tighten
    /// rows and apply every constraint whose phase just became fixed,
    /// recording each as an implied valid split, until nothing changes.
    fn propagate_implied_splits(&mut self) -> EngineResult<()> {
        loop {
            let mut changed = false;

            let row_tightenings = self.row_tightener.tighten(&self.tableau);
            if self.apply_tightenings(&row_tightenings)? {
                changed = true;
            }

            let fixed_indices: Vec<usize> = self
                .constraints
                .iter()
                .enumerate()
                .filter(|(_, c)| c.is_active() && c.phase_fixed())
                .map(|(idx, _)| idx)
                .collect();

            for idx in fixed_indices {
                if let Some(split) = self.constraints[idx].get_valid_case_split() {
                    self.apply_case_split(&split)?;
                    self.smt.record_implied_valid_split(split);
                    self.constraints[idx].set_active(false);
                    changed = true;
                }
                let entailed = self.constraints[idx].entailed_tightenings();
                if self.apply_tightenings(&entailed)? {
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }
        Ok(())
    }

    fn apply_case_split(&mut self, split: &CaseSplit) -> EngineResult<()> {
        self.apply_tightenings(&split.tightenings)?;
        for eq in &split.equations {
            self.install_equation(eq);
        }
        self.tableau.compute_assignment()?;
        if self.any_bound_crossed() {
            return Err(EngineError::infeasible("case split produced crossed bounds"));
        }
        Ok(())
    }

    fn install_equation(&mut self, eq: &Equation) {
        let slack_bounds = match eq.kind() {
            EquationType::Equality => (0.0, 0.0),
            EquationType::LessOrEqual => (0.0, E::INFINITY),
            EquationType::GreaterOrEqual => (E::NEG_INFINITY, 0.0),
        };
        self.tableau.add_equation_row(eq.addends(), eq.scalar(), slack_bounds);
        self.cost.invalidate();
    }

    fn apply_tightenings(&mut self, tightenings: &[Tightening]) -> EngineResult<bool> {
        let mut changed = false;
        for t in tightenings {
            let applied = match t.kind {
                BoundKind::Lower => self.tableau.tighten_lower_bound(t.variable, t.value)?,
                BoundKind::Upper => self.tableau.tighten_upper_bound(t.variable, t.value)?,
            };
            if applied {
                changed = true;
                match t.kind {
                    BoundKind::Lower => self.notify_watchers_lower(t.variable, t.value),
                    BoundKind::Upper => self.notify_watchers_upper(t.variable, t.value),
                }
            }
        }
        if changed {
            self.cost.invalidate();
        }
        Ok(changed)
    }

    fn notify_watchers_lower(&mut self, variable: I, value: E) {
        if let Some(indices) = self.watchers.get(&variable).cloned() {
            for idx in indices {
                self.constraints[idx].notify_lower_bound(variable, value);
            }
        }
    }

    fn notify_watchers_upper(&mut self, variable: I, value: E) {
        if let Some(indices) = self.watchers.get(&variable).cloned() {
            for idx in indices {
                self.constraints[idx].notify_upper_bound(variable, value);
            }
        }
    }

    fn notify_watchers_value(&mut self, variable: I, value: E) {
        if let Some(indices) = self.watchers.get(&variable).cloned() {
            for idx in indices {
                self.constraints[idx].notify_variable_value(variable, value);
            }
        }
    }

    fn collect_violated_constraint_ids(&self) -> Vec<ConstraintId> {
        let value = |v: I| self.tableau.value(v);
        self.constraints
            .iter()
            .filter(|c| c.is_active() && !c.satisfied(&value))
            .map(|c| c.id())
            .collect()
    }

    fn apply_constraint_fix(&mut self, id: ConstraintId) -> EngineResult<()> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| EngineError::Other(format!("unknown constraint {id:?}")))?;
        let fixes = self.constraints[idx].get_smart_fixes(&self.tableau);
        if let Some(fix) = fixes.into_iter().next() {
            self.tableau.set_value(fix.variable, fix.value);
            self.tableau.compute_assignment()?;
            self.notify_watchers_value(fix.variable, fix.value);
        }
        Ok(())
    }

    fn index_of(&self, id: ConstraintId) -> Option<usize> {
        self.constraints.iter().position(|c| c.id() == id)
    }

    fn all_basics_within_bounds(&self) -> bool {
        self.tableau.basic_variables().iter().all(|&v| {
            let value = self.tableau.value(v);
            value >= self.tableau.lower_bound(v) - self.satisfied_tolerance
                && value <= self.tableau.upper_bound(v) + self.satisfied_tolerance
        })
    }

    fn any_bound_crossed(&self) -> bool {
        (0..self.tableau.num_variables()).any(|v| self.tableau.lower_bound(v) > self.tableau.upper_bound(v) + 1e-9)
    }

    fn simplex_step(&mut self) -> EngineResult<()> {
        if self.cost.status() == CostStatus::Invalid {
            self.cost.recompute(&self.tableau);
        }
        let candidates = self.tableau.entry_candidates(self.cost.reduced_costs());
        if candidates.is_empty() {
            return Err(EngineError::infeasible("no entry candidate improves the Phase-1 cost"));
        }
        let ranked = self.cost.rank_entry_candidates(&candidates);
        let k = ranked.len().min(MAX_ENTRY_CANDIDATES);

        let mut best: Option<(I, PivotPlan, E)> = None;
        for &entering in ranked.iter().take(k) {
            let change_column = self.tableau.compute_change_column(entering);
            let rc = self.cost.reduced_cost(entering);
            let increasing = rc < 0.0;
            if let Some((leaving_row, leaving_variable, direction)) =
                self.tableau.pick_leaving_variable(entering, increasing, &change_column)
            {
                let magnitude = change_column[leaving_row].abs();
                if best.as_ref().is_none_or(|(_, _, best_mag)| magnitude > *best_mag) {
                    best = Some((
                        entering,
                        PivotPlan { entering, leaving_row, leaving_variable, direction, change_column },
                        magnitude,
                    ));
                }
            }
        }

        let Some((entering, plan, _)) = best else {
            return Err(EngineError::infeasible("no ratio-test leaving variable found for any candidate"));
        };

        let pivot_row = self.tableau.compute_pivot_row(plan.leaving_row);
        let pivot_element = pivot_row[entering];
        let leaving_variable = plan.leaving_variable;
        let pivot_start = Instant::now();
        self.tableau.perform_pivot(&plan)?;
        self.pivot_count += 1;
        self.pivot_time += pivot_start.elapsed();
        self.cost.update_reference_weights(entering, leaving_variable, &pivot_row, pivot_element);
        self.cost.invalidate();

        let leaving_value = self.tableau.value(leaving_variable);
        let entering_value = self.tableau.value(entering);
        self.notify_watchers_value(leaving_variable, leaving_value);
        self.notify_watchers_value(entering, entering_value);
        Ok(())
    }

    fn restore_precision(&mut self, kind: RestorationKind) -> EngineResult<()> {
        self.tableau.restore(&self.initial_state.tableau);
        self.constraints = self.initial_state.constraints.clone();

        let implied: Vec<CaseSplit> = self.smt.all_implied_valid_splits().cloned().collect();
        for split in &implied {
            self.apply_case_split(split)?;
        }

        if matches!(kind, RestorationKind::Weak) {
            self.tableau.compute_assignment()?;
        }

        if self.tableau.degradation() > self.degradation_threshold {
            self.restoration_failures += 1;
            if self.restoration_failures >= 2 {
                return Err(EngineError::RestorationFailed(self.restoration_failures));
            }
            return self.restore_precision(RestorationKind::Weak);
        }
        self.restoration_failures = 0;
        self.cost.invalidate();
        Ok(())
    }

    fn handle_malformed_basis(&mut self) -> EngineResult<()> {
        self.malformed_basis_strikes += 1;
        match self.malformed_basis_strikes {
            1 => self.restore_precision(RestorationKind::Strong),
            2 => self.restore_precision(RestorationKind::Weak),
            _ => Err(EngineError::RestorationFailed(self.malformed_basis_strikes)),
        }
    }

    fn backtrack(&mut self) -> bool {
        loop {
            match self.smt.pop_split() {
                None => return false,
                Some((split, state)) => {
                    self.restore_state(&state);
                    if self.apply_case_split(&split).is_ok() {
                        return true;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_query::InputQuery;
    use crate::plconstraint::ReluConstraint;

    fn options() -> EngineOptions {
        EngineOptions::new()
    }

    #[test]
    fn minimal_relu_sat() {
        // b, f in [-1, 1], f = ReLU(b).
        let mut query = InputQuery::new(2);
        query.set_lower_bound(0, -1.0);
        query.set_upper_bound(0, 1.0);
        query.set_lower_bound(1, -1.0);
        query.set_upper_bound(1, 1.0);
        query.add_constraint(ReluConstraint::new(ConstraintId(0), 0, 1).into());

        let opts = options();
        let mut engine = Engine::new(query, &opts).unwrap();
        let code = engine.solve();
        assert_eq!(code, ExitCode::Sat);

        let b = engine.value(0);
        let f = engine.value(1);
        assert!(f >= -1e-5);
        if b > 1e-6 {
            assert!((f - b).abs() < 1e-4);
        } else if b < -1e-6 {
            assert!(f.abs() < 1e-4);
        }
    }

    #[test]
    fn summary_reports_terminal_code_and_elapsed_time() {
        let mut query = InputQuery::new(2);
        query.set_lower_bound(0, -1.0);
        query.set_upper_bound(0, 1.0);
        query.set_lower_bound(1, -1.0);
        query.set_upper_bound(1, 1.0);
        query.add_constraint(ReluConstraint::new(ConstraintId(0), 0, 1).into());

        let opts = options();
        let mut engine = Engine::new(query, &opts).unwrap();
        let code = engine.solve();

        let summary = engine.summary(0);
        assert_eq!(summary.result, code);
        assert_eq!(summary.pending_or_fixed, 0);
        assert!(summary.elapsed_seconds >= 0.0);
        assert!(summary.avg_pivot_micros >= 0.0);
    }

    #[test]
    fn minimal_relu_unsat() {
        // b in [1, 2], f in [-1, 0]: Active phase forces f = b >= 1, contradicting ub(f) = 0.
        let mut query = InputQuery::new(2);
        query.set_lower_bound(0, 1.0);
        query.set_upper_bound(0, 2.0);
        query.set_lower_bound(1, -1.0);
        query.set_upper_bound(1, 0.0);
        query.add_constraint(ReluConstraint::new(ConstraintId(0), 0, 1).into());

        let opts = options();
        let mut engine = Engine::new(query, &opts).unwrap();
        let code = engine.solve();
        assert_eq!(code, ExitCode::Unsat);
    }

    #[test]
    fn bound_crossed_is_detected() {
        let mut query = InputQuery::new(1);
        query.set_lower_bound(0, 0.0);
        query.set_upper_bound(0, 5.0);
        let opts = options();
        let engine = Engine::new(query, &opts).unwrap();
        assert!(!engine.any_bound_crossed());
    }
}
