use std::time::Instant;

use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cancel::{CancelToken, StopCheck};
use crate::cnf::{Literal, Variable, CNF};
use crate::config::SolverKind;
use crate::orchestrator::Reporter;
use crate::solution::Solution;

/// Probability of a random-walk move instead of a greedy one.
const RANDOM_WALK_PROB: f64 = 0.2;

/// Random clause and literal selection draw from a prefix of at most
/// this many elements. The bias toward early elements is deliberate; it
/// bounds the cost of a draw.
const SELECTION_CAP: usize = 20;

/// An incomplete solver: stochastic local search in the WalkSAT family.
/// Repeatedly repairs a random total assignment by flipping variables in
/// unsatisfied clauses, mixing greedy break-count minimization with
/// random walks. Runs until it finds a model or is cancelled; it can
/// never prove unsatisfiability.
pub struct WalkSat {
    expr: CNF,
    sol: Solution,
    rng: StdRng,
}

impl WalkSat {
    pub fn new(expr: &CNF, seed: u64) -> WalkSat {
        let mut sol = Solution::new();
        sol.set_max_var(expr.max_var());
        sol.set_num_clauses(expr.declared_clauses());
        WalkSat {
            expr: expr.clone(),
            sol,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Number of currently satisfied clauses that flipping `var` would
    /// leave unsatisfied: the clauses satisfied only by this variable's
    /// present polarity.
    fn break_count(&self, var: Variable) -> usize {
        let val = match self.sol.value(var) {
            Some(val) => val,
            None => return 0,
        };
        let supporting = if val { var } else { -var };
        self.expr
            .clauses_of(supporting)
            .filter(|&cl| {
                self.expr.get_clause(cl).map_or(false, |lits| {
                    !lits.iter().any(|&other| {
                        other != supporting
                            && self.sol.value(other.abs()) == Some(other > 0)
                    })
                })
            })
            .count()
    }

    /// Picks the variable to flip in the chosen clause: usually the one
    /// breaking the fewest satisfied clauses, ties to the earliest.
    fn pick_flip(&mut self, clause_lits: &[Literal]) -> Variable {
        if self.rng.gen_bool(RANDOM_WALK_PROB) {
            let bound = clause_lits.len().min(SELECTION_CAP);
            clause_lits[self.rng.gen_range(0..bound)].abs()
        } else {
            let mut best = clause_lits[0].abs();
            let mut best_breaks = usize::MAX;
            for &lit in clause_lits {
                let breaks = self.break_count(lit.abs());
                if breaks < best_breaks {
                    best_breaks = breaks;
                    best = lit.abs();
                }
            }
            best
        }
    }

    /// Runs the search until a model is found, reporting it. Returns
    /// silently when cancelled.
    pub fn run(mut self, token: &CancelToken, reporter: &Reporter<'_>) {
        reporter.comment(2, "local_search solver starting");
        let start_time = Instant::now();
        let mut check = StopCheck::new();

        // random initial assignment over the variables that appear
        for var in self.expr.variables() {
            let val = self.rng.gen_bool(0.5);
            self.sol.assign(var, val);
        }

        loop {
            match self.expr.eval(&self.sol) {
                Ok(true) => break,
                Ok(false) => {}
                Err(_) => {
                    reporter.report_error(false);
                    return;
                }
            }
            if check.stop_requested(token) {
                return;
            }

            let unsat = self.expr.unsatisfied_clauses(&self.sol);
            let bound = unsat.len().min(SELECTION_CAP);
            if bound == 0 {
                break;
            }
            let target = unsat[self.rng.gen_range(0..bound)];
            let clause_lits: Vec<Literal> = match self.expr.get_clause(target) {
                Some(lits) if !lits.is_empty() => lits.iter().copied().collect(),
                // an empty clause can never be repaired by flipping
                _ => {
                    reporter.report_error(false);
                    return;
                }
            };

            let flip = self.pick_flip(&clause_lits);
            if let Some(val) = self.sol.value(flip) {
                trace!("flipping {} to {}", flip, !val);
                self.sol.reassign(flip, !val);
            }
        }

        self.sol.set_valid(true);
        self.sol.stats_mut().insert(
            "ELAPSED_TIME_SECONDS".to_string(),
            format!("{:.6}", start_time.elapsed().as_secs_f64()),
        );
        reporter.report_solution(self.sol, SolverKind::LocalSearch);
    }
}
