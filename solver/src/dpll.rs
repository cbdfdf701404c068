use std::time::Instant;

use log::trace;

use crate::cancel::{CancelToken, StopCheck};
use crate::cnf::CNF;
use crate::config::SolverKind;
use crate::divide::divide_problem;
use crate::orchestrator::Reporter;
use crate::solution::Solution;

/// A complete solver: unit propagation, pure-literal elimination, and
/// two-way branching over an explicit work stack. Exhausting the stack
/// without finding a model proves this worker's part of the search space
/// unsatisfiable.
pub struct Dpll {
    expr: CNF,
    sol: Solution,
}

/// Applies unit propagation and then pure-literal elimination to a fixed
/// point, recording the forced assignments.
pub(crate) fn simplify(expr: &mut CNF, sol: &mut Solution) {
    while let Some((_, lit)) = expr.unit_clause() {
        let val = lit > 0;
        sol.assign(lit.abs(), val);
        expr.assign_and_simplify(lit.abs(), val);
    }
    while let Some(lit) = expr.pure_literal() {
        let val = lit > 0;
        sol.assign(lit.abs(), val);
        expr.assign_and_simplify(lit.abs(), val);
    }
}

enum Search {
    Sat(Solution),
    Exhausted,
    Cancelled,
}

impl Dpll {
    pub fn new(expr: &CNF) -> Dpll {
        let mut sol = Solution::new();
        sol.set_max_var(expr.max_var());
        sol.set_num_clauses(expr.declared_clauses());
        Dpll {
            expr: expr.clone(),
            sol,
        }
    }

    /// Splits this solver into `num_sub` independent sub-solvers covering
    /// disjoint parts of the search space.
    pub fn divide(self, num_sub: usize) -> Vec<Dpll> {
        divide_problem(&self.expr, &self.sol, num_sub)
            .into_iter()
            .map(|(expr, sol)| Dpll { expr, sol })
            .collect()
    }

    /// Runs the search to completion, reporting the outcome. Returns
    /// silently when cancelled.
    pub fn run(mut self, token: &CancelToken, reporter: &Reporter<'_>) {
        reporter.comment(2, "dpll solver starting");
        let start_time = Instant::now();
        let mut check = StopCheck::new();

        simplify(&mut self.expr, &mut self.sol);
        let remaining_vars = self.expr.variables();

        match self.search(token, &mut check) {
            Search::Cancelled => {}
            Search::Exhausted => reporter.report_no_solution(),
            Search::Sat(mut sol) => {
                // assign arbitrary values to the variables branching
                // never reached
                for var in remaining_vars {
                    sol.assign(var, true);
                }
                sol.stats_mut().insert(
                    "ELAPSED_TIME_SECONDS".to_string(),
                    format!("{:.6}", start_time.elapsed().as_secs_f64()),
                );
                reporter.report_solution(sol, SolverKind::Dpll);
            }
        }
    }

    fn search(&mut self, token: &CancelToken, check: &mut StopCheck) -> Search {
        let mut work = vec![(self.expr.clone(), self.sol.clone())];

        while let Some((mut expr, mut sol)) = work.pop() {
            if check.stop_requested(token) {
                return Search::Cancelled;
            }

            simplify(&mut expr, &mut sol);

            if expr.num_clauses() == 0 {
                sol.set_valid(true);
                return Search::Sat(sol);
            }
            if expr.has_empty_clause() {
                // conflict; abandon this branch
                continue;
            }

            let branch_var = match expr.pick_var() {
                Some(var) => var,
                None => continue,
            };
            trace!("branching on {}", branch_var);

            // false is explored first, so push its frame last
            for &val in &[true, false] {
                let mut sub_expr = expr.clone();
                let mut sub_sol = sol.clone();
                sub_sol.assign(branch_var, val);
                sub_expr.assign_and_simplify(branch_var, val);
                work.push((sub_expr, sub_sol));
            }
        }
        Search::Exhausted
    }
}
