use thiserror::Error;

use crate::cnf::{MissingAssignment, CNF};
use crate::solution::{ProblemType, Solution};

/// Ways a proposed solution can fail to line up with its problem before
/// the assignment is even evaluated.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("the type of the problem and solution must be the same.")]
    TypeMismatch,
    #[error("the solution must report the same number of clauses as the problem.")]
    ClauseCountMismatch,
    #[error("the maximum variable name must match between the problem and solution.")]
    MaxVarMismatch,
    #[error("the list of variables given in the solution does not match the problem.")]
    VariableListMismatch,
    #[error("the proposed solution does not claim to be valid.")]
    InvalidClaim,
    #[error(transparent)]
    Missing(#[from] MissingAssignment),
}

/// Checks a proposed solution against the problem it claims to answer:
/// metadata must agree, the assignment must cover the problem's
/// variables and nothing outside the declared range, and the formula
/// must evaluate to true under it.
pub fn verify_solution(sol: &Solution, expr: &CNF) -> Result<bool, VerifyError> {
    if sol.problem_type() != ProblemType::Cnf {
        return Err(VerifyError::TypeMismatch);
    }
    if sol.num_clauses() != expr.declared_clauses() {
        return Err(VerifyError::ClauseCountMismatch);
    }
    if sol.max_var() != expr.max_var() {
        return Err(VerifyError::MaxVarMismatch);
    }
    if !sol.is_valid() {
        return Err(VerifyError::InvalidClaim);
    }
    for var in expr.variables() {
        if sol.value(var).is_none() {
            return Err(VerifyError::VariableListMismatch);
        }
    }
    if sol.map().keys().any(|&var| var < 1 || var > sol.max_var()) {
        return Err(VerifyError::VariableListMismatch);
    }
    Ok(expr.eval(sol)?)
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
        expr.set_declared_clauses(clauses.len());
        expr
    }

    fn claimed(expr: &CNF, pairs: &[(i32, bool)]) -> Solution {
        let mut sol = Solution::new();
        sol.set_max_var(expr.max_var());
        sol.set_num_clauses(expr.declared_clauses());
        sol.set_valid(true);
        for &(var, val) in pairs {
            sol.assign(var, val);
        }
        sol
    }

    #[test]
    fn accepts_a_correct_solution() {
        let expr = formula(&[&[1, 2], &[-1, 2]]);
        let sol = claimed(&expr, &[(1, false), (2, true)]);
        assert!(verify_solution(&sol, &expr).unwrap());
    }

    #[test]
    fn reports_a_falsifying_assignment() {
        let expr = formula(&[&[1], &[2]]);
        let sol = claimed(&expr, &[(1, true), (2, false)]);
        assert!(!verify_solution(&sol, &expr).unwrap());
    }

    #[test]
    fn rejects_metadata_mismatches() {
        let expr = formula(&[&[1, 2], &[-1, 2]]);

        let mut wrong_count = claimed(&expr, &[(1, false), (2, true)]);
        wrong_count.set_num_clauses(3);
        assert!(matches!(
            verify_solution(&wrong_count, &expr),
            Err(VerifyError::ClauseCountMismatch)
        ));

        let mut wrong_max = claimed(&expr, &[(1, false), (2, true)]);
        wrong_max.set_max_var(5);
        assert!(matches!(
            verify_solution(&wrong_max, &expr),
            Err(VerifyError::MaxVarMismatch)
        ));

        let mut wrong_type = claimed(&expr, &[(1, false), (2, true)]);
        wrong_type.set_problem_type(ProblemType::Sat);
        assert!(matches!(
            verify_solution(&wrong_type, &expr),
            Err(VerifyError::TypeMismatch)
        ));
    }

    #[test]
    fn rejects_unclaimed_solutions() {
        let expr = formula(&[&[1]]);
        let mut sol = claimed(&expr, &[(1, true)]);
        sol.set_valid(false);
        assert!(matches!(
            verify_solution(&sol, &expr),
            Err(VerifyError::InvalidClaim)
        ));
    }

    #[test]
    fn rejects_incomplete_variable_lists() {
        let expr = formula(&[&[1, 2], &[-1, 2]]);
        let sol = claimed(&expr, &[(1, false)]);
        assert!(matches!(
            verify_solution(&sol, &expr),
            Err(VerifyError::VariableListMismatch)
        ));
    }
}
