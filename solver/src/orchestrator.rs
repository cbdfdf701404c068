use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use log::debug;
use thiserror::Error;

use crate::bruteforce::BruteForce;
use crate::cancel::CancelToken;
use crate::cdcl::Cdcl;
use crate::cnf::CNF;
use crate::config::{Config, Console, SolverKind};
use crate::divide::complete_worker_count;
use crate::dpll::Dpll;
use crate::resource::virtual_memory_usage;
use crate::solution::{ProblemType, Solution};
use crate::walksat::WalkSat;

/// How often the monitor reassesses its budgets when nothing wakes it.
const MONITOR_INTERVAL: Duration = Duration::from_millis(500);

/// How many consecutive memory-query failures are tolerated before the
/// run is aborted.
const MEMORY_QUERY_ATTEMPTS: u32 = 5;

/// Outcome class of a portfolio run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// A definite answer: either a satisfying assignment or a proof
    /// that none exists (see the solution's validity flag).
    Success,
    OutOfTime,
    OutOfMemory,
    ThreadPanic,
    IntSig,
}

/// Errors the orchestrator itself surfaces; everything else is folded
/// into the returned status.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("a solver thread failed unexpectedly")]
    WorkerPanic,
    #[error("the virtual memory usage could not be read from \"/proc/self/stat\".")]
    MemoryQuery,
}

/// The single piece of shared mutable state: the result latch and the
/// active-worker counters, all behind one mutex, plus the condition
/// variable the monitor sleeps on.
struct Shared {
    latch: Mutex<Latch>,
    finish: Condvar,
}

struct Latch {
    finished: bool,
    status: Status,
    solution: Solution,
    active_complete: usize,
    active_incomplete: usize,
}

impl Shared {
    fn new(solution: Solution, active_complete: usize, active_incomplete: usize) -> Shared {
        Shared {
            latch: Mutex::new(Latch {
                finished: false,
                status: Status::Success,
                solution,
                active_complete,
                active_incomplete,
            }),
            finish: Condvar::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Latch> {
        self.latch.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The reporting channel handed to every worker. All methods take the
/// shared mutex briefly and do O(1) work under it; the first result to
/// arrive wins and later reports become no-ops.
#[derive(Clone, Copy)]
pub struct Reporter<'a> {
    shared: &'a Shared,
    console: &'a Console,
}

impl<'a> Reporter<'a> {
    /// Latches a satisfying assignment as the portfolio's result.
    pub fn report_solution(&self, mut sol: Solution, kind: SolverKind) {
        let mut latch = self.shared.lock();
        if !latch.finished {
            sol.stats_mut()
                .insert("SOLVER".to_string(), kind.name().to_string());
            if sol.is_valid() {
                self.console
                    .comment(2, &format!("a solution was found by {}", kind.name()));
            }
            latch.solution = sol;
            latch.finished = true;
            latch.status = Status::Success;
            self.shared.finish.notify_all();
        }
    }

    /// Records that a complete worker exhausted its part of the search
    /// space. When the last one does and no solution was latched, the
    /// formula is proven unsatisfiable.
    pub fn report_no_solution(&self) {
        let mut latch = self.shared.lock();
        latch.active_complete = latch.active_complete.saturating_sub(1);
        if latch.active_complete == 0 && !latch.finished {
            latch.finished = true;
            latch.status = Status::Success;
            self.console.comment(2, "no solution exists");
            self.shared.finish.notify_all();
        }
    }

    /// Records an unexpected worker failure. A failing complete worker
    /// invalidates the whole run; a failing incomplete worker only costs
    /// the portfolio one searcher.
    pub fn report_error(&self, is_complete_solver: bool) {
        let mut latch = self.shared.lock();
        if !latch.finished {
            if is_complete_solver {
                latch.finished = true;
                latch.status = Status::ThreadPanic;
                self.shared.finish.notify_all();
            } else {
                latch.active_incomplete = latch.active_incomplete.saturating_sub(1);
                self.console
                    .warn("an error was encountered while executing an incomplete solver");
            }
        }
    }

    /// Verbosity-gated diagnostic comment, for worker startup notes.
    pub fn comment(&self, level: u8, message: &str) {
        self.console.comment(level, message);
    }
}

/// Derives a distinct per-worker seed from the master seed.
fn worker_seed(master: u64, index: usize) -> u64 {
    master ^ (index as u64 + 1).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

/// Runs a portfolio of solver workers over one formula under wall-clock
/// and memory budgets, with cooperative cancellation and first-winner
/// result aggregation.
pub struct Orchestrator {
    config: Config,
    interrupt: Arc<AtomicUsize>,
}

impl Orchestrator {
    /// `interrupt` is the process-wide interrupt flag; the orchestrator
    /// only ever reads it. Pass a fresh zero when no signal handling is
    /// wired up.
    pub fn new(config: Config, interrupt: Arc<AtomicUsize>) -> Orchestrator {
        Orchestrator { config, interrupt }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Solves the given formula. Returns the outcome status and the
    /// winning assignment; every variable of the formula is assigned in
    /// the returned solution (unconstrained ones arbitrarily, to true).
    pub fn run(&self, expr: &CNF) -> Result<(Status, Solution), RuntimeError> {
        let console = Console::new(self.config.verbosity);

        // the answer of record until some worker wins
        let mut default_sol = Solution::new();
        default_sol.set_max_var(expr.max_var());
        default_sol.set_num_clauses(expr.declared_clauses());
        default_sol.set_problem_type(ProblemType::Cnf);

        if self.interrupt.load(Ordering::Relaxed) != 0 {
            console.comment(1, "interrupt signal received");
            return Ok((Status::IntSig, default_sol));
        }

        let num_complete = complete_worker_count(self.config.threads);
        let master_seed = self.config.seed.unwrap_or_else(rand::random);
        debug!("portfolio master seed {}", master_seed);

        let mut dpll_workers: Vec<Dpll> = Vec::new();
        let mut cdcl_workers: Vec<Cdcl> = Vec::new();
        let mut brute_workers: Vec<BruteForce> = Vec::new();
        let mut search_workers: Vec<WalkSat> = Vec::new();

        match self.config.solver {
            SolverKind::Auto => {
                dpll_workers = Dpll::new(expr).divide(num_complete);
                let num_incomplete = self.config.threads.saturating_sub(num_complete);
                search_workers = (0..num_incomplete)
                    .map(|i| WalkSat::new(expr, worker_seed(master_seed, i)))
                    .collect();
            }
            SolverKind::Dpll => {
                dpll_workers = Dpll::new(expr).divide(num_complete);
            }
            SolverKind::Cdcl => {
                cdcl_workers = Cdcl::new(expr).divide(num_complete);
            }
            SolverKind::BruteForce => {
                brute_workers = BruteForce::new(expr).divide(num_complete);
            }
            SolverKind::LocalSearch => {
                search_workers = (0..self.config.threads)
                    .map(|i| WalkSat::new(expr, worker_seed(master_seed, i)))
                    .collect();
            }
        }

        let active_complete =
            dpll_workers.len() + cdcl_workers.len() + brute_workers.len();
        let shared = Shared::new(default_sol, active_complete, search_workers.len());
        let token = CancelToken::new();
        let start_time = Instant::now();

        console.comment(1, "solving...");

        let status = crossbeam::thread::scope(|scope| {
            let reporter = Reporter {
                shared: &shared,
                console: &console,
            };
            for engine in dpll_workers {
                let token = token.clone();
                scope.spawn(move |_| run_worker(true, reporter, || engine.run(&token, &reporter)));
            }
            for engine in cdcl_workers {
                let token = token.clone();
                scope.spawn(move |_| run_worker(true, reporter, || engine.run(&token, &reporter)));
            }
            for engine in brute_workers {
                let token = token.clone();
                scope.spawn(move |_| run_worker(true, reporter, || engine.run(&token, &reporter)));
            }
            for engine in search_workers {
                let token = token.clone();
                scope.spawn(move |_| run_worker(false, reporter, || engine.run(&token, &reporter)));
            }

            let outcome = self.monitor(&shared, &console, start_time);

            // tell running solvers to stop; the scope joins them all
            console.comment(2, "shutting down solvers");
            token.cancel();
            outcome
        })
        .map_err(|_| RuntimeError::WorkerPanic)??;

        console.comment(2, "solvers stopped");
        if status == Status::ThreadPanic {
            return Err(RuntimeError::WorkerPanic);
        }

        let mut sol = {
            let latch = shared.lock();
            latch.solution.clone()
        };

        // assign arbitrary values to any variables the winner left open
        for var in expr.variables() {
            if sol.value(var).is_none() {
                sol.assign(var, true);
            }
        }

        Ok((status, sol))
    }

    /// Periodically reassesses the wall-clock and memory budgets and the
    /// interrupt flag until the run is finished, then reports the final
    /// status.
    fn monitor(
        &self,
        shared: &Shared,
        console: &Console,
        start_time: Instant,
    ) -> Result<Status, RuntimeError> {
        let mut mem_failures: u32 = 0;
        let mut latch = shared.lock();
        while !latch.finished {
            let (reacquired, _) = shared
                .finish
                .wait_timeout(latch, MONITOR_INTERVAL)
                .unwrap_or_else(|e| e.into_inner());
            latch = reacquired;

            if !latch.finished && start_time.elapsed() >= self.config.duration {
                latch.finished = true;
                latch.status = Status::OutOfTime;
                console.comment(1, "time limit reached");
            }

            match virtual_memory_usage() {
                Ok(usage) => {
                    mem_failures = 0;
                    if !latch.finished && usage >= self.config.memory {
                        latch.finished = true;
                        latch.status = Status::OutOfMemory;
                        console.comment(1, "memory limit reached");
                    }
                }
                Err(_) => {
                    mem_failures += 1;
                    if mem_failures >= MEMORY_QUERY_ATTEMPTS {
                        latch.finished = true;
                        return Err(RuntimeError::MemoryQuery);
                    }
                    console.warn(&format!(
                        "could not get memory usage from system; will try {} more times",
                        MEMORY_QUERY_ATTEMPTS - mem_failures
                    ));
                }
            }

            if !latch.finished
                && latch.active_complete == 0
                && latch.active_incomplete == 0
            {
                // every worker went away without an answer
                latch.finished = true;
                latch.status = Status::ThreadPanic;
            }

            if !latch.finished && self.interrupt.load(Ordering::Relaxed) != 0 {
                latch.finished = true;
                latch.status = Status::IntSig;
                console.comment(1, "interrupt signal received");
            }
        }
        Ok(latch.status)
    }
}

/// Worker entry point: converts any panic escaping a solver into an
/// error report so it never unwinds into the orchestrator.
fn run_worker<F: FnOnce()>(is_complete: bool, reporter: Reporter<'_>, body: F) {
    if panic::catch_unwind(AssertUnwindSafe(body)).is_err() {
        debug!("a solver worker panicked");
        reporter.report_error(is_complete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_latch() -> Shared {
        Shared::new(Solution::new(), 2, 0)
    }

    fn winning(var: i32) -> Solution {
        let mut sol = Solution::new();
        sol.assign(var, true);
        sol.set_valid(true);
        sol
    }

    #[test]
    fn first_solution_wins() {
        let console = Console::new(0);
        let shared = empty_latch();
        let reporter = Reporter {
            shared: &shared,
            console: &console,
        };

        reporter.report_solution(winning(1), SolverKind::Dpll);
        reporter.report_solution(winning(2), SolverKind::LocalSearch);

        let latch = shared.lock();
        assert!(latch.finished);
        assert_eq!(latch.status, Status::Success);
        assert_eq!(latch.solution.value(1), Some(true));
        assert_eq!(latch.solution.value(2), None);
        assert_eq!(
            latch.solution.stats().get("SOLVER").map(String::as_str),
            Some("dpll")
        );
    }

    #[test]
    fn last_complete_worker_proves_unsatisfiability() {
        let console = Console::new(0);
        let shared = empty_latch();
        let reporter = Reporter {
            shared: &shared,
            console: &console,
        };

        reporter.report_no_solution();
        {
            let latch = shared.lock();
            assert!(!latch.finished);
        }
        reporter.report_no_solution();
        let latch = shared.lock();
        assert!(latch.finished);
        assert_eq!(latch.status, Status::Success);
        assert!(!latch.solution.is_valid());
    }

    #[test]
    fn no_solution_after_a_win_is_a_no_op() {
        let console = Console::new(0);
        let shared = empty_latch();
        let reporter = Reporter {
            shared: &shared,
            console: &console,
        };

        reporter.report_solution(winning(1), SolverKind::Dpll);
        reporter.report_no_solution();
        reporter.report_no_solution();

        let latch = shared.lock();
        assert_eq!(latch.status, Status::Success);
        assert!(latch.solution.is_valid());
    }

    #[test]
    fn complete_worker_errors_poison_the_run() {
        let console = Console::new(0);
        let shared = empty_latch();
        let reporter = Reporter {
            shared: &shared,
            console: &console,
        };

        reporter.report_error(true);
        let latch = shared.lock();
        assert!(latch.finished);
        assert_eq!(latch.status, Status::ThreadPanic);
    }

    #[test]
    fn incomplete_worker_errors_only_cost_a_searcher() {
        let console = Console::new(0);
        let shared = Shared::new(Solution::new(), 1, 2);
        let reporter = Reporter {
            shared: &shared,
            console: &console,
        };

        reporter.report_error(false);
        let latch = shared.lock();
        assert!(!latch.finished);
        assert_eq!(latch.active_incomplete, 1);
    }

    #[test]
    fn distinct_worker_seeds() {
        let seeds: Vec<u64> = (0..8).map(|i| worker_seed(42, i)).collect();
        for (i, a) in seeds.iter().enumerate() {
            for b in seeds.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        // reproducible for a fixed master seed
        assert_eq!(worker_seed(42, 3), worker_seed(42, 3));
    }
}
