//! Look-ahead preprocessor: before the main solve, try every phase of
//! every still-unfixed PL constraint behind a short bounded-depth
//! probe, and fix the ones where only one (or a common) phase survives.
//!
//! One queue is seeded with every constraint id per round; a pool of
//! worker threads drains it concurrently against a shared, mutex-guarded
//! `idToPhase` map, each worker running its own private `Engine` built
//! from its own clone of the preprocessed query. A round ends when the
//! queue is empty; the whole preprocessor ends once a round fixes
//! nothing new, i.e. a worker observes a whole queue pass without
//! change.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{unbounded, TryRecvError};
use log::{debug, info};
use macros::use_option;

use crate::config::EngineOptions;
use crate::engine::Engine;
use crate::input_query::InputQuery;
use crate::plconstraint::{ConstraintId, Phase, PlConstraint, PlConstraintBehavior};
use crate::ExitCode;

const DEFAULT_DEPTH_DIVISOR: u64 = 4;

/// Outcome of a full look-ahead pass: every phase fixing discovered,
/// keyed by constraint id, plus whether a constraint's every branch was
/// found infeasible (global UNSAT, independent of the main search).
#[derive(Debug, Default, Clone)]
pub struct LookAheadResult {
    pub fixed: HashMap<ConstraintId, Phase>,
    pub unsat: bool,
}

/// Reads back every active, phase-fixed constraint's id and phase —
/// the "impliedIdToPhaseAtRoot" a probe branch leaves behind once row
/// tightening and valid-split propagation have saturated under it.
fn collect_fixed_phases(constraints: &[PlConstraint]) -> HashMap<ConstraintId, Phase> {
    constraints
        .iter()
        .filter(|c| c.is_active() && c.phase_fixed())
        .map(|c| (c.id(), c.phase()))
        .collect()
}

/// Applies every phase already known in `fixed` to `engine`, via the
/// constraint's own `case_split_for_phase` rather than mutating it
/// directly, then saturates row tightening and implied splits. Returns
/// `false` if any of those fixings turns out to be infeasible against
/// this worker's current state.
fn apply_known_fixings(engine: &mut Engine, fixed: &Mutex<HashMap<ConstraintId, Phase>>) -> bool {
    let snapshot: Vec<(ConstraintId, Phase)> = fixed.lock().unwrap().iter().map(|(&k, &v)| (k, v)).collect();
    for (id, phase) in snapshot {
        let Some(constraint) = engine.constraints().iter().find(|c| c.id() == id) else {
            continue;
        };
        if constraint.phase_fixed() {
            continue;
        }
        let Some(split) = constraint.case_split_for_phase(phase) else {
            continue;
        };
        if engine.apply_root_case_split(&split).is_err() {
            return false;
        }
    }
    engine.saturate_valid_splits().is_ok()
}

/// Runs the parallel look-ahead algorithm over `query` using
/// `num_workers` worker threads, probing each unfixed constraint
/// to a depth of `remainingConstraints / depth_divisor`.
#[use_option(name = "lookahead_depth_divisor", type_ = u64, default = "4", description = "Divisor applied to the remaining unfixed constraint count to bound a look-ahead probe's depth")]
pub struct LookAheadPreprocessor {
    num_workers: usize,
    depth_divisor: u64,
}

impl LookAheadPreprocessor {
    pub fn new(num_workers: usize) -> Self {
        Self { num_workers: num_workers.max(1), depth_divisor: DEFAULT_DEPTH_DIVISOR }
    }

    pub fn with_depth_divisor(num_workers: usize, depth_divisor: u64) -> Self {
        Self { num_workers: num_workers.max(1), depth_divisor: depth_divisor.max(1) }
    }

    pub fn run(&self, query: &InputQuery, options: &EngineOptions) -> LookAheadResult {
        let depth_divisor =
            options.get_option::<u64>("lookahead_depth_divisor").unwrap_or(self.depth_divisor).max(1);

        let mut seed = match Engine::new(query.clone(), options) {
            Ok(engine) => engine,
            Err(err) => {
                debug!("look-ahead: base preprocessing failed: {err}");
                return LookAheadResult { fixed: HashMap::new(), unsat: true };
            }
        };
        let all_ids: Vec<ConstraintId> = seed.constraints().iter().map(|c| c.id()).collect();
        if all_ids.is_empty() {
            return LookAheadResult::default();
        }

        // Constraints the raw input bounds already pin down (no probing
        // needed) still have to be validated: saturating them here once
        // catches a query that is already UNSAT from bound propagation
        // alone, before any worker thread is spun up.
        let initial_fixed = collect_fixed_phases(seed.constraints());
        if seed.saturate_valid_splits().is_err() {
            debug!("look-ahead: bound-implied phase fixings are already infeasible");
            return LookAheadResult { fixed: initial_fixed, unsat: true };
        }
        drop(seed);

        let fixed: Arc<Mutex<HashMap<ConstraintId, Phase>>> = Arc::new(Mutex::new(initial_fixed));
        let unsat = Arc::new(AtomicBool::new(false));
        let mut round = 0u32;

        loop {
            let pending: Vec<ConstraintId> = {
                let guard = fixed.lock().unwrap();
                all_ids.iter().copied().filter(|id| !guard.contains_key(id)).collect()
            };
            if pending.is_empty() || unsat.load(Ordering::Acquire) {
                break;
            }
            round += 1;
            debug!("look-ahead round {round}: {} constraints pending", pending.len());

            let (sender, receiver) = unbounded::<ConstraintId>();
            for id in &pending {
                let _ = sender.send(*id);
            }
            drop(sender);

            let last_fixed_this_round: Arc<Mutex<Option<ConstraintId>>> = Arc::new(Mutex::new(None));

            thread::scope(|scope| {
                for worker_id in 0..self.num_workers {
                    let receiver = receiver.clone();
                    let fixed = fixed.clone();
                    let unsat = unsat.clone();
                    let last_fixed_this_round = last_fixed_this_round.clone();
                    let query = query.clone();

                    scope.spawn(move || {
                        run_worker(worker_id, query, options, receiver, &fixed, &unsat, &last_fixed_this_round, depth_divisor);
                    });
                }
            });

            if last_fixed_this_round.lock().unwrap().is_none() {
                debug!("look-ahead: round {round} made no progress, stopping");
                break;
            }
        }

        let fixed_map = fixed.lock().unwrap().clone();
        info!("look-ahead finished: {} constraints fixed, unsat={}", fixed_map.len(), unsat.load(Ordering::Acquire));
        LookAheadResult { fixed: fixed_map, unsat: unsat.load(Ordering::Acquire) }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
    worker_id: usize,
    query: InputQuery,
    options: &EngineOptions,
    receiver: crossbeam_channel::Receiver<ConstraintId>,
    fixed: &Mutex<HashMap<ConstraintId, Phase>>,
    unsat: &AtomicBool,
    last_fixed_this_round: &Mutex<Option<ConstraintId>>,
    depth_divisor: u64,
) {
    let mut engine = match Engine::new(query, options) {
        Ok(engine) => engine,
        Err(err) => {
            debug!("look-ahead worker {worker_id} failed to build its engine: {err}");
            unsat.store(true, Ordering::Release);
            return;
        }
    };

    loop {
        if unsat.load(Ordering::Acquire) {
            return;
        }
        let id = match receiver.try_recv() {
            Ok(id) => id,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return,
        };

        // Step 1: re-apply every phase fixing known so far —
        // including ones a peer published since this worker's last pop —
        // and saturate before deciding whether `id` still needs probing.
        if !apply_known_fixings(&mut engine, fixed) {
            unsat.store(true, Ordering::Release);
            return;
        }

        if fixed.lock().unwrap().contains_key(&id) {
            continue;
        }
        let Some(idx) = engine.constraints().iter().position(|c| c.id() == id) else {
            continue;
        };
        if !engine.constraints()[idx].is_active() || engine.constraints()[idx].phase_fixed() {
            continue;
        }

        let snapshot = engine.snapshot_state();
        let splits = engine.constraints()[idx].get_case_splits();
        let remaining =
            engine.constraints().iter().filter(|c| c.is_active() && !c.phase_fixed()).count().max(1) as u64;
        let depth = (remaining / depth_divisor).max(1);

        let mut implied_per_feasible_split: Vec<HashMap<ConstraintId, Phase>> = Vec::new();
        for split in &splits {
            engine.restore_state(&snapshot);
            if engine.apply_root_case_split(split).is_err() {
                continue;
            }
            let code = engine.solve_bounded(depth);
            if code != ExitCode::Unsat {
                implied_per_feasible_split.push(collect_fixed_phases(engine.constraints()));
            }
        }
        engine.restore_state(&snapshot);

        if implied_per_feasible_split.is_empty() {
            debug!("look-ahead worker {worker_id}: constraint {id:?} has no feasible phase");
            unsat.store(true, Ordering::Release);
            return;
        } else if implied_per_feasible_split.len() == 1 {
            let implied = implied_per_feasible_split.into_iter().next().unwrap();
            let mut guard = fixed.lock().unwrap();
            for (cid, phase) in implied {
                guard.entry(cid).or_insert(phase);
            }
            drop(guard);
            *last_fixed_this_round.lock().unwrap() = Some(id);
        } else {
            // Multiple branches feasible for `id` itself, but some
            // *other* constraint may have settled into the same phase
            // down every branch — intersect the implied maps.
            let mut common = implied_per_feasible_split[0].clone();
            for other in &implied_per_feasible_split[1..] {
                common.retain(|cid, phase| other.get(cid).copied() == Some(*phase));
            }
            common.remove(&id);
            if !common.is_empty() {
                let mut guard = fixed.lock().unwrap();
                for (cid, phase) in common {
                    guard.entry(cid).or_insert(phase);
                }
                drop(guard);
                *last_fixed_this_round.lock().unwrap() = Some(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plconstraint::ReluConstraint;

    /// `b` already pinned nonnegative: the Inactive branch is
    /// infeasible immediately, so look-ahead should fix the ReLU to
    /// Active without the main search ever splitting on it.
    #[test]
    fn fixes_relu_forced_active_by_bounds() {
        let mut query = InputQuery::new(2);
        query.set_lower_bound(0, 0.0);
        query.set_upper_bound(0, 5.0);
        query.set_lower_bound(1, -5.0);
        query.set_upper_bound(1, 5.0);
        query.add_constraint(ReluConstraint::new(ConstraintId(0), 0, 1).into());

        let options = EngineOptions::new();
        let result = LookAheadPreprocessor::new(2).run(&query, &options);
        assert!(!result.unsat);
        assert_eq!(result.fixed.get(&ConstraintId(0)), Some(&Phase::Active));
    }

    /// Both branches of a ReLU whose bounds make it infeasible either
    /// way should be reported as a global UNSAT from look-ahead alone.
    #[test]
    fn detects_unsat_relu_during_lookahead() {
        let mut query = InputQuery::new(2);
        query.set_lower_bound(0, 1.0);
        query.set_upper_bound(0, 2.0);
        query.set_lower_bound(1, -1.0);
        query.set_upper_bound(1, 0.0);
        query.add_constraint(ReluConstraint::new(ConstraintId(0), 0, 1).into());

        let options = EngineOptions::new();
        let result = LookAheadPreprocessor::new(2).run(&query, &options);
        assert!(result.unsat);
    }

    /// An already-unfixed query with no constraints should return
    /// immediately with nothing fixed and no claim of infeasibility.
    #[test]
    fn empty_constraint_set_is_a_no_op() {
        let mut query = InputQuery::new(1);
        query.set_lower_bound(0, 0.0);
        query.set_upper_bound(0, 1.0);

        let options = EngineOptions::new();
        let result = LookAheadPreprocessor::new(2).run(&query, &options);
        assert!(!result.unsat);
        assert!(result.fixed.is_empty());
    }
}
