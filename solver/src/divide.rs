//! Search-space division for the complete solver engines.

use crate::cnf::{Variable, CNF};
use crate::solution::Solution;

/// Splits a problem into `num_sub` sub-instances by enumerating truth
/// assignments for the first log2(`num_sub`) variables in order.
/// Sub-instance `i` pre-applies the bit pattern of `i` (least significant
/// bit on the first variable) via `assign_and_simplify`, so the
/// sub-instances partition the search space and unsatisfiability of the
/// whole follows from unsatisfiability of every part.
///
/// `num_sub` is expected to be a power of two. When the formula has fewer
/// variables than bits, the surplus sub-instances coincide; that wastes
/// workers but keeps the partition exhaustive.
pub(crate) fn divide_problem(
    expr: &CNF,
    sol: &Solution,
    num_sub: usize,
) -> Vec<(CNF, Solution)> {
    let vars: Vec<Variable> = expr.variables().into_iter().collect();
    let mut parts = Vec::with_capacity(num_sub);
    for i in 0..num_sub {
        let mut sub_expr = expr.clone();
        let mut sub_sol = sol.clone();
        let mut pattern = i;
        let mut remaining = num_sub.saturating_sub(1);
        let mut next_var = 0;
        while remaining > 0 && next_var < vars.len() {
            let val = pattern % 2 == 1;
            sub_sol.assign(vars[next_var], val);
            sub_expr.assign_and_simplify(vars[next_var], val);
            pattern /= 2;
            remaining /= 2;
            next_var += 1;
        }
        parts.push((sub_expr, sub_sol));
    }
    parts
}

/// The largest power of two not exceeding `threads`; the number of
/// complete-solver workers a given thread budget supports.
pub fn complete_worker_count(threads: usize) -> usize {
    let mut count = 1;
    while count * 2 <= threads {
        count *= 2;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnf::ClauseId;

    fn formula(clauses: &[&[i32]]) -> CNF {
        let mut expr = CNF::new();
        for (i, lits) in clauses.iter().enumerate() {
            for &lit in lits.iter() {
                expr.add_literal(lit, (i + 1) as ClauseId);
            }
        }
        expr
    }

    #[test]
    fn power_of_two_budgets() {
        assert_eq!(complete_worker_count(1), 1);
        assert_eq!(complete_worker_count(2), 2);
        assert_eq!(complete_worker_count(3), 2);
        assert_eq!(complete_worker_count(7), 4);
        assert_eq!(complete_worker_count(8), 8);
        assert_eq!(complete_worker_count(9), 8);
    }

    #[test]
    fn two_way_division_splits_on_the_first_variable() {
        let expr = formula(&[&[1, 2], &[-1, 2]]);
        let parts = divide_problem(&expr, &Solution::new(), 2);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].1.value(1), Some(false));
        assert_eq!(parts[1].1.value(1), Some(true));
        // with 1 false, clause 1 shrinks to {2}; clause 2 is satisfied
        assert_eq!(parts[0].0.num_clauses(), 1);
        assert_eq!(parts[1].0.num_clauses(), 1);
    }

    #[test]
    fn four_way_division_enumerates_bit_patterns() {
        let expr = formula(&[&[1, 2, 3]]);
        let parts = divide_problem(&expr, &Solution::new(), 4);
        let patterns: Vec<(Option<bool>, Option<bool>)> = parts
            .iter()
            .map(|(_, sol)| (sol.value(1), sol.value(2)))
            .collect();
        assert_eq!(
            patterns,
            vec![
                (Some(false), Some(false)),
                (Some(true), Some(false)),
                (Some(false), Some(true)),
                (Some(true), Some(true)),
            ]
        );
    }

    #[test]
    fn division_stops_when_variables_run_out() {
        let expr = formula(&[&[1]]);
        let parts = divide_problem(&expr, &Solution::new(), 4);
        assert_eq!(parts.len(), 4);
        // only one variable exists, so patterns collapse onto it
        assert_eq!(parts[0].1.len(), 1);
        assert_eq!(parts[3].1.len(), 1);
    }
}
