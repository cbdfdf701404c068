use std::time::Instant;

use indexmap::IndexSet;
use log::trace;

use crate::cancel::{CancelToken, StopCheck};
use crate::cnf::{ClauseId, Literal, CNF};
use crate::config::SolverKind;
use crate::divide::divide_problem;
use crate::orchestrator::Reporter;
use crate::solution::Solution;

/// One assignment on the trail. `reason` is `None` for a decision and
/// the id of the clause that forced the propagation otherwise.
#[derive(Clone, Copy, Debug)]
struct TrailEntry {
    var: i32,
    val: bool,
    level: usize,
    reason: Option<ClauseId>,
}

/// A complete solver with conflict-driven clause learning.
///
/// The engine keeps two formulas: the working copy, simplified as the
/// trail grows, and the original extended with every learned clause.
/// Conflict analysis resolves over the original because simplification
/// destroys the clauses it would need.
pub struct Cdcl {
    expr: CNF,
    sol: Solution,
}

/// Removes every complementary pair from the union of the two clauses.
fn resolve(clause: &IndexSet<Literal>, reason: &IndexSet<Literal>) -> IndexSet<Literal> {
    let mut resolved = clause.clone();
    for &lit in reason {
        if resolved.contains(&-lit) {
            resolved.shift_remove(&-lit);
        } else {
            resolved.insert(lit);
        }
    }
    resolved
}

/// Decision level of a variable: the level of its most recent trail
/// entry, scanning from the back.
fn level_of(trail: &[TrailEntry], var: i32) -> Option<usize> {
    trail.iter().rev().find(|t| t.var == var).map(|t| t.level)
}

/// The first-UIP condition: at most one literal of the clause was
/// assigned at the current decision level.
fn is_first_uip(clause: &IndexSet<Literal>, trail: &[TrailEntry], level: usize) -> bool {
    clause
        .iter()
        .filter(|&&lit| level_of(trail, lit.abs()) == Some(level))
        .take(2)
        .count()
        <= 1
}

/// Walks the trail backward from the conflict, resolving the conflict
/// clause against the reason of each implicated assignment until the
/// first unique implication point. Returns the learned clause.
fn analyze_conflict(
    conflict: ClauseId,
    trail: &[TrailEntry],
    level: usize,
    original: &CNF,
) -> IndexSet<Literal> {
    let mut clause = original
        .get_clause(conflict)
        .cloned()
        .unwrap_or_default();
    let mut index = trail.len();
    while !is_first_uip(&clause, trail, level) && index > 0 {
        index -= 1;
        let entry = &trail[index];
        let reason = match entry.reason {
            Some(reason) => reason,
            // a decision has no reason to resolve against
            None => break,
        };
        if !clause.iter().any(|&lit| lit.abs() == entry.var) {
            continue;
        }
        if let Some(reason_lits) = original.get_clause(reason) {
            clause = resolve(&clause, reason_lits);
        }
    }
    clause
}

/// The backjump target: the second-highest decision level among the
/// learned clause's literals, or the ground level when the clause has a
/// single level. `None` means the clause is empty or depends only on
/// ground-level assignments, so the formula is unsatisfiable.
fn backjump_level(clause: &IndexSet<Literal>, trail: &[TrailEntry]) -> Option<usize> {
    let levels: Vec<usize> = clause
        .iter()
        .filter_map(|&lit| level_of(trail, lit.abs()))
        .collect();
    if levels.is_empty() || levels.iter().all(|&l| l == 0) {
        return None;
    }
    let highest = levels.iter().copied().max().unwrap_or(0);
    levels.iter().copied().filter(|&l| l < highest).max().or(Some(0))
}

/// Runs unit propagation at the given decision level, pushing each
/// forced assignment with its reason clause. Returns the id of an empty
/// clause on conflict.
fn unit_propagate(
    expr: &mut CNF,
    trail: &mut Vec<TrailEntry>,
    level: usize,
) -> Option<ClauseId> {
    while let Some((cl, lit)) = expr.unit_clause() {
        let val = lit > 0;
        trail.push(TrailEntry {
            var: lit.abs(),
            val,
            level,
            reason: Some(cl),
        });
        expr.assign_and_simplify(lit.abs(), val);
        if let Some(conflict) = expr.empty_clause() {
            return Some(conflict);
        }
    }
    expr.empty_clause()
}

impl Cdcl {
    pub fn new(expr: &CNF) -> Cdcl {
        let mut sol = Solution::new();
        sol.set_max_var(expr.max_var());
        sol.set_num_clauses(expr.declared_clauses());
        Cdcl {
            expr: expr.clone(),
            sol,
        }
    }

    /// Splits this solver into `num_sub` independent sub-solvers covering
    /// disjoint parts of the search space.
    pub fn divide(self, num_sub: usize) -> Vec<Cdcl> {
        divide_problem(&self.expr, &self.sol, num_sub)
            .into_iter()
            .map(|(expr, sol)| Cdcl { expr, sol })
            .collect()
    }

    /// Runs the search to completion, reporting the outcome. Returns
    /// silently when cancelled.
    pub fn run(mut self, token: &CancelToken, reporter: &Reporter<'_>) {
        reporter.comment(2, "cdcl solver starting");
        let start_time = Instant::now();
        let mut check = StopCheck::new();

        // the reference formula; grows as clauses are learned
        let mut original = self.expr.clone();
        let mut expr = self.expr.clone();
        let mut trail: Vec<TrailEntry> = Vec::new();
        let mut level: usize = 0;
        let mut next_val = false;
        let mut sat = true;

        let mut conflict = unit_propagate(&mut expr, &mut trail, 0);
        loop {
            if let Some(empty) = conflict.take() {
                let learned = analyze_conflict(empty, &trail, level, &original);
                let target = backjump_level(&learned, &trail);
                original.add_clause(learned.iter().copied());

                match target {
                    None => {
                        sat = false;
                        break;
                    }
                    Some(backjump) => {
                        trace!("backjumping to level {}", backjump);
                        // drop the trail down to and including the
                        // backjump level, then rebuild the working
                        // formula from the survivors
                        while trail.last().map_or(false, |t| t.level >= backjump) {
                            trail.pop();
                        }
                        expr = original.clone();
                        for entry in trail.iter() {
                            expr.assign_and_simplify(entry.var, entry.val);
                        }
                        level = backjump;
                        next_val = true;
                        conflict = unit_propagate(&mut expr, &mut trail, level);
                        continue;
                    }
                }
            }

            if expr.num_clauses() == 0 {
                break;
            }
            if check.stop_requested(token) {
                return;
            }

            level += 1;
            let branch_var = match expr.pick_var() {
                Some(var) => var,
                // only empty clauses are left
                None => {
                    sat = false;
                    break;
                }
            };
            trace!("decision {} = {} at level {}", branch_var, next_val, level);
            trail.push(TrailEntry {
                var: branch_var,
                val: next_val,
                level,
                reason: None,
            });
            expr.assign_and_simplify(branch_var, next_val);
            if next_val {
                next_val = false;
            }
            conflict = unit_propagate(&mut expr, &mut trail, level);
        }

        if sat {
            for entry in &trail {
                self.sol.assign(entry.var, entry.val);
            }
            self.sol.set_valid(true);
        }

        if self.sol.is_valid() {
            self.sol.stats_mut().insert(
                "ELAPSED_TIME_SECONDS".to_string(),
                format!("{:.6}", start_time.elapsed().as_secs_f64()),
            );
            reporter.report_solution(self.sol, SolverKind::Cdcl);
        } else {
            reporter.report_no_solution();
        }
    }
}
