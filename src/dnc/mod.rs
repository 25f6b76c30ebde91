//! Divide-and-conquer manager and workers: partitions a query across a
//! pool of worker engines that pull `SubQuery` work items off a shared
//! lock-free queue, each restoring its engine to the stored initial
//! state before applying the split.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use log::{debug, info, warn};

use crate::config::EngineOptions;
use crate::divider::{QueryDivider, SubQuery};
use crate::engine::Engine;
use crate::input_query::InputQuery;
use crate::interrupt::QuitFlag;
use crate::{ExitCode, E};

const QUEUE_EMPTY_BACKOFF: Duration = Duration::from_millis(100);

/// Outcome precedence: a higher-precedence terminal code always wins
/// once multiple workers report different ones. `Sat` short-circuits
/// the whole run; an `Unsat` only wins once every subquery has reported
/// in (`pending` reaches zero).
fn precedence(code: ExitCode) -> u8 {
    match code {
        ExitCode::Sat => 5,
        ExitCode::Timeout => 4,
        ExitCode::QuitRequested => 3,
        ExitCode::Error => 2,
        ExitCode::Unsat => 1,
        ExitCode::NotDone => 0,
    }
}

struct SharedExit {
    code: ExitCode,
}

fn record_outcome(shared: &Mutex<SharedExit>, candidate: ExitCode) {
    let mut guard = shared.lock().unwrap();
    if precedence(candidate) > precedence(guard.code) {
        guard.code = candidate;
    }
}

fn finish_unsat(pending: &AtomicU64, should_quit: &AtomicBool, shared_exit: &Mutex<SharedExit>) {
    record_outcome(shared_exit, ExitCode::Unsat);
    if pending.fetch_sub(1, Ordering::AcqRel) == 1 {
        should_quit.store(true, Ordering::Release);
    }
}

/// Owns the work queue and spawns the worker pool. One manager instance
/// solves exactly one base query; it is consumed by `solve`.
pub struct DnCManager {
    num_workers: usize,
    divider: QueryDivider,
    initial_divides: u32,
    online_divides: u32,
    initial_timeout: E,
    overall_timeout: Option<Duration>,
    external_quit: Option<QuitFlag>,
}

impl DnCManager {
    pub fn new(
        num_workers: usize,
        divider: QueryDivider,
        initial_divides: u32,
        online_divides: u32,
        initial_timeout: E,
        overall_timeout: Option<Duration>,
    ) -> Self {
        Self {
            num_workers: num_workers.max(1),
            divider,
            initial_divides,
            online_divides,
            initial_timeout,
            overall_timeout,
            external_quit: None,
        }
    }

    /// Polls `flag` alongside the overall timeout; a caller (e.g. an
    /// [`crate::interrupt::InterruptHandle`] reacting to Ctrl-C) setting
    /// it stops the search and reports `QuitRequested`.
    pub fn with_external_quit_flag(mut self, flag: QuitFlag) -> Self {
        self.external_quit = Some(flag);
        self
    }

    /// Preprocesses `base_query` once, seeds the queue with
    /// `2^initial_divides` subqueries, and runs the worker pool to
    /// completion. Returns the terminal exit code and, on `Sat`, a full
    /// variable assignment recovered from whichever worker found it.
    pub fn solve(&self, base_query: InputQuery, options: EngineOptions) -> (ExitCode, Option<Vec<E>>) {
        let bounds: Vec<(E, E)> = base_query.all_bounds().iter().map(|b| (b.lower, b.upper)).collect();

        let seed_engine = match Engine::new(base_query.clone(), &options) {
            Ok(engine) => engine,
            Err(err) => {
                warn!("DnC base preprocessing failed: {err}");
                return (ExitCode::Error, None);
            }
        };
        let constraints = seed_engine.constraints().to_vec();
        drop(seed_engine);

        let subqueries =
            self.divider.create_initial_subqueries(&bounds, &constraints, self.initial_divides, self.initial_timeout);
        info!("DnC: seeding queue with {} initial subqueries", subqueries.len());

        let pending = Arc::new(AtomicU64::new(subqueries.len() as u64));
        let should_quit = Arc::new(AtomicBool::new(false));
        let shared_exit = Arc::new(Mutex::new(SharedExit { code: ExitCode::NotDone }));
        let solution: Arc<Mutex<Option<Vec<E>>>> = Arc::new(Mutex::new(None));

        let (sender, receiver) = unbounded::<SubQuery>();
        for subquery in subqueries {
            let _ = sender.send(subquery);
        }

        let start = Instant::now();

        thread::scope(|scope| {
            for worker_id in 0..self.num_workers {
                let receiver = receiver.clone();
                let sender = sender.clone();
                let pending = pending.clone();
                let should_quit = should_quit.clone();
                let shared_exit = shared_exit.clone();
                let solution = solution.clone();
                let divider = self.divider;
                let query = base_query.clone();
                let options = &options;
                let bounds = &bounds;
                let online_divides = self.online_divides;

                scope.spawn(move || {
                    run_worker(
                        worker_id,
                        query,
                        options,
                        receiver,
                        sender,
                        &pending,
                        &should_quit,
                        &shared_exit,
                        &solution,
                        divider,
                        bounds,
                        online_divides,
                    );
                });
            }
            drop(sender);
            drop(receiver);

            loop {
                if should_quit.load(Ordering::Acquire) {
                    break;
                }
                if let Some(flag) = &self.external_quit {
                    if flag.is_set() {
                        record_outcome(&shared_exit, ExitCode::QuitRequested);
                        should_quit.store(true, Ordering::Release);
                        break;
                    }
                }
                if let Some(timeout) = self.overall_timeout {
                    if start.elapsed() >= timeout {
                        record_outcome(&shared_exit, ExitCode::Timeout);
                        should_quit.store(true, Ordering::Release);
                        break;
                    }
                }
                thread::sleep(QUEUE_EMPTY_BACKOFF);
            }
        });

        let code = shared_exit.lock().unwrap().code;
        let assignment = solution.lock().unwrap().clone();
        info!("DnC search finished with exit code {code:?}");
        (code, assignment)
    }
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
    worker_id: usize,
    base_query: InputQuery,
    options: &EngineOptions,
    receiver: Receiver<SubQuery>,
    sender: Sender<SubQuery>,
    pending: &AtomicU64,
    should_quit: &AtomicBool,
    shared_exit: &Mutex<SharedExit>,
    solution: &Mutex<Option<Vec<E>>>,
    divider: QueryDivider,
    bounds: &[(E, E)],
    online_divides: u32,
) {
    let mut engine = match Engine::new(base_query, options) {
        Ok(engine) => engine,
        Err(err) => {
            warn!("worker {worker_id} failed to build its engine: {err}");
            record_outcome(shared_exit, ExitCode::Error);
            should_quit.store(true, Ordering::Release);
            return;
        }
    };

    loop {
        if should_quit.load(Ordering::Acquire) {
            return;
        }
        match receiver.try_recv() {
            Ok(subquery) => {
                debug!("worker {worker_id} picked up {}", subquery.id);
                // Every pop restores first, not just the ones after a
                // timeout re-split: a worker may have left its engine
                // mid-search on the previous iteration.
                engine.restore_to_initial_state();

                let mut infeasible = engine.apply_root_case_split(&subquery.case_split).is_err();
                if !infeasible {
                    for implied in &subquery.implied_splits {
                        if engine.apply_root_case_split(implied).is_err() {
                            infeasible = true;
                            break;
                        }
                    }
                }
                if infeasible {
                    finish_unsat(pending, should_quit, shared_exit);
                    continue;
                }

                engine.set_timeout(Some(Duration::from_secs_f64(subquery.timeout_seconds.max(0.0))));
                match engine.solve() {
                    ExitCode::Unsat => finish_unsat(pending, should_quit, shared_exit),
                    ExitCode::Sat => {
                        let num_variables = engine.tableau().num_variables();
                        let assignment: Vec<E> = (0..num_variables).map(|v| engine.value(v)).collect();
                        *solution.lock().unwrap() = Some(assignment);
                        record_outcome(shared_exit, ExitCode::Sat);
                        should_quit.store(true, Ordering::Release);
                    }
                    ExitCode::Timeout => {
                        let children = divider.subdivide(&subquery, bounds, engine.constraints(), online_divides);
                        debug!("worker {worker_id}: {} timed out, re-split into {}", subquery.id, children.len());
                        pending.fetch_add(children.len() as u64, Ordering::AcqRel);
                        for child in children {
                            if sender.send(child).is_err() {
                                record_outcome(shared_exit, ExitCode::Error);
                                should_quit.store(true, Ordering::Release);
                            }
                        }
                        pending.fetch_sub(1, Ordering::AcqRel);
                    }
                    code @ (ExitCode::QuitRequested | ExitCode::Error) => {
                        record_outcome(shared_exit, code);
                        should_quit.store(true, Ordering::Release);
                    }
                    ExitCode::NotDone => {}
                }
            }
            Err(TryRecvError::Empty) => thread::sleep(QUEUE_EMPTY_BACKOFF),
            Err(TryRecvError::Disconnected) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DivideStrategy;
    use crate::input_query::InputQuery;

    /// An unconstrained single-variable query with no PL constraints is
    /// immediately satisfiable: the single worker should find it SAT on
    /// the very first subquery without ever subdividing.
    #[test]
    fn single_worker_solves_trivial_sat_query() {
        let mut query = InputQuery::new(1);
        query.set_lower_bound(0, 0.0);
        query.set_upper_bound(0, 10.0);

        let divider = QueryDivider::new(DivideStrategy::LargestInterval, 1.5);
        let manager = DnCManager::new(1, divider, 0, 1, 5.0, Some(Duration::from_secs(5)));
        let (code, assignment) = manager.solve(query, EngineOptions::new());
        assert_eq!(code, ExitCode::Sat);
        assert!(assignment.is_some());
    }

    /// Two variables pinned to disjoint ranges by contradictory bounds
    /// make the query infeasible at preprocessing; the manager should
    /// report this as `Error` rather than hang.
    #[test]
    fn contradictory_bounds_reported_as_error() {
        let mut query = InputQuery::new(1);
        query.set_lower_bound(0, 5.0);
        query.set_upper_bound(0, 1.0);

        let divider = QueryDivider::new(DivideStrategy::LargestInterval, 1.5);
        let manager = DnCManager::new(1, divider, 0, 1, 5.0, Some(Duration::from_secs(5)));
        let (code, _assignment) = manager.solve(query, EngineOptions::new());
        assert_eq!(code, ExitCode::Error);
    }
}
