use std::time::Instant;

use crate::cancel::{CancelToken, StopCheck};
use crate::cnf::{Variable, CNF};
use crate::config::SolverKind;
use crate::divide::divide_problem;
use crate::orchestrator::Reporter;
use crate::solution::Solution;

/// The enumeration fallback: checks every assignment of the variables
/// still appearing in the formula, counting upward in binary. Complete
/// but exponential; only ever selected explicitly.
pub struct BruteForce {
    expr: CNF,
    sol: Solution,
}

impl BruteForce {
    pub fn new(expr: &CNF) -> BruteForce {
        let mut sol = Solution::new();
        sol.set_max_var(expr.max_var());
        sol.set_num_clauses(expr.declared_clauses());
        BruteForce {
            expr: expr.clone(),
            sol,
        }
    }

    /// Splits this solver into `num_sub` independent sub-solvers covering
    /// disjoint parts of the search space.
    pub fn divide(self, num_sub: usize) -> Vec<BruteForce> {
        divide_problem(&self.expr, &self.sol, num_sub)
            .into_iter()
            .map(|(expr, sol)| BruteForce { expr, sol })
            .collect()
    }

    /// Runs the enumeration, reporting the outcome. Returns silently
    /// when cancelled.
    pub fn run(mut self, token: &CancelToken, reporter: &Reporter<'_>) {
        reporter.comment(2, "brute_force solver starting");
        let start_time = Instant::now();
        let mut check = StopCheck::new();

        if self.expr.num_clauses() == 0 {
            self.sol.set_valid(true);
        } else if self.expr.has_empty_clause() {
            self.sol.set_valid(false);
        } else {
            let vars: Vec<Variable> = self.expr.variables().into_iter().collect();
            for &var in &vars {
                self.sol.assign(var, false);
            }
            loop {
                match self.expr.eval(&self.sol) {
                    Ok(true) => {
                        self.sol.set_valid(true);
                        break;
                    }
                    Ok(false) => {}
                    Err(_) => {
                        reporter.report_error(true);
                        return;
                    }
                }
                // binary increment: clear trailing trues, set the next
                let mut carry = vars.len();
                for (i, &var) in vars.iter().enumerate() {
                    if self.sol.value(var) == Some(true) {
                        self.sol.reassign(var, false);
                    } else {
                        carry = i;
                        break;
                    }
                }
                if carry == vars.len() {
                    // wrapped around: every assignment was checked
                    break;
                }
                self.sol.reassign(vars[carry], true);

                if check.stop_requested(token) {
                    return;
                }
            }
        }

        if self.sol.is_valid() {
            self.sol.stats_mut().insert(
                "ELAPSED_TIME_SECONDS".to_string(),
                format!("{:.6}", start_time.elapsed().as_secs_f64()),
            );
            reporter.report_solution(self.sol, SolverKind::BruteForce);
        } else {
            reporter.report_no_solution();
        }
    }
}
