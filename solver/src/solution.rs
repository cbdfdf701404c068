use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;
use std::num::IntErrorKind;

use thiserror::Error;

use crate::cnf::Variable;

/// Format of the problem a solution answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProblemType {
    Cnf,
    Sat,
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemType::Cnf => write!(f, "cnf"),
            ProblemType::Sat => write!(f, "sat"),
        }
    }
}

/// A (possibly partial) variable assignment, doubling as the answer the
/// portfolio returns. Carries the problem metadata echoed on the solution
/// line and a free-form statistics map; the statistics never influence
/// correctness.
#[derive(Clone, Debug)]
pub struct Solution {
    variables: BTreeMap<Variable, bool>,
    stats: BTreeMap<String, String>,
    max_var: Variable,
    num_clauses: usize,
    problem_type: ProblemType,
    valid: bool,
}

impl Default for Solution {
    fn default() -> Solution {
        Solution {
            variables: BTreeMap::new(),
            stats: BTreeMap::new(),
            max_var: 0,
            num_clauses: 0,
            problem_type: ProblemType::Cnf,
            valid: false,
        }
    }
}

impl Solution {
    pub fn new() -> Solution {
        Solution::default()
    }

    /// Assigns a variable. Returns false (and changes nothing) if the
    /// variable already has a value.
    pub fn assign(&mut self, var: Variable, val: bool) -> bool {
        use std::collections::btree_map::Entry;
        match self.variables.entry(var) {
            Entry::Vacant(e) => {
                e.insert(val);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Drops a variable's value. Returns false if it had none.
    pub fn unassign(&mut self, var: Variable) -> bool {
        self.variables.remove(&var).is_some()
    }

    /// Overwrites a variable's value, assigned or not.
    pub fn reassign(&mut self, var: Variable, val: bool) {
        self.variables.insert(var, val);
    }

    /// The value of a variable, if assigned.
    pub fn value(&self, var: Variable) -> Option<bool> {
        self.variables.get(&var).copied()
    }

    /// Number of assigned variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// The underlying assignment map.
    pub fn map(&self) -> &BTreeMap<Variable, bool> {
        &self.variables
    }

    /// Whether this assignment has been shown to satisfy the original
    /// formula. False until proven.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn max_var(&self) -> Variable {
        self.max_var
    }

    pub fn set_max_var(&mut self, max_var: Variable) {
        self.max_var = max_var;
    }

    pub fn num_clauses(&self) -> usize {
        self.num_clauses
    }

    pub fn set_num_clauses(&mut self, num_clauses: usize) {
        self.num_clauses = num_clauses;
    }

    pub fn problem_type(&self) -> ProblemType {
        self.problem_type
    }

    pub fn set_problem_type(&mut self, problem_type: ProblemType) {
        self.problem_type = problem_type;
    }

    pub fn stats(&self) -> &BTreeMap<String, String> {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.stats
    }
}

impl fmt::Display for Solution {
    /// SOL format: an `s` line, `t` statistics lines, `v` variable lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.problem_type {
            ProblemType::Cnf => writeln!(
                f,
                "s cnf {} {} {}",
                if self.valid { 1 } else { 0 },
                self.max_var,
                self.num_clauses
            )?,
            ProblemType::Sat => writeln!(
                f,
                "s sat {} {}",
                if self.valid { 1 } else { 0 },
                self.max_var
            )?,
        }
        for (key, val) in &self.stats {
            writeln!(f, "t {} {}", key, val)?;
        }
        for (&var, &val) in &self.variables {
            writeln!(f, "v {}", if val { var } else { -var })?;
        }
        Ok(())
    }
}

/// Ways reading a SOL stream can fail.
#[derive(Debug, Error)]
pub enum SolError {
    #[error("the solution line is not formatted correctly.")]
    SolutionLine,
    #[error("the solution body is not formatted correctly.")]
    BodyFormat,
    #[error("the number of clauses and/or variables must not exceed the signed 32-bit integer.")]
    Overflow,
    #[error("0 is not a valid variable name")]
    VariableZero,
    #[error("named variables must not exceed the provided maximum")]
    InvalidVariable,
    #[error("a variable appears more than once in the solution")]
    RepeatedVariable,
    #[error("an I/O Error was encountered while parsing input")]
    Io(#[from] std::io::Error),
}

fn parse_i32(token: &str, overflow: SolError, format: SolError) -> Result<i32, SolError> {
    token.parse::<i32>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => overflow,
        _ => format,
    })
}

/// Parses `s <type> <valid> <max_var> [<clauses>]`.
fn parse_solution_line(line: &str, sol: &mut Solution) -> Result<(), SolError> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("s") {
        return Err(SolError::SolutionLine);
    }
    let problem_type = match tokens.next() {
        Some("cnf") => ProblemType::Cnf,
        Some("sat") => ProblemType::Sat,
        _ => return Err(SolError::SolutionLine),
    };
    sol.set_problem_type(problem_type);

    let valid = tokens.next().ok_or(SolError::SolutionLine)?;
    let valid = parse_i32(valid, SolError::Overflow, SolError::SolutionLine)?;
    sol.set_valid(valid == 1);

    let max_var = tokens.next().ok_or(SolError::SolutionLine)?;
    sol.set_max_var(parse_i32(max_var, SolError::Overflow, SolError::SolutionLine)?);

    if problem_type == ProblemType::Cnf {
        let clauses = tokens.next().ok_or(SolError::SolutionLine)?;
        let clauses = parse_i32(clauses, SolError::Overflow, SolError::SolutionLine)?;
        if clauses < 0 {
            return Err(SolError::SolutionLine);
        }
        sol.set_num_clauses(clauses as usize);
    }
    if tokens.next().is_some() {
        return Err(SolError::SolutionLine);
    }
    Ok(())
}

/// Reads a SOL-formatted solution from a byte stream. Blank lines and `c`
/// lines are ignored everywhere; `t` lines are ignored in the body.
pub fn read_solution<R: BufRead>(reader: R) -> Result<Solution, SolError> {
    let mut sol = Solution::new();
    let mut lines = reader.lines();

    // find and parse the solution line
    loop {
        let line = match lines.next() {
            Some(line) => line?,
            None => return Err(SolError::SolutionLine),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('c') {
            continue;
        }
        parse_solution_line(trimmed, &mut sol)?;
        break;
    }

    // parse the variable lines
    for line in lines {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('c') || trimmed.starts_with('t') {
            continue;
        }
        let body = match trimmed.strip_prefix('v') {
            Some(rest) => rest.trim(),
            None => return Err(SolError::BodyFormat),
        };
        let lit = parse_i32(body, SolError::InvalidVariable, SolError::BodyFormat)?;
        if lit == 0 {
            return Err(SolError::VariableZero);
        }
        if lit.abs() > sol.max_var() {
            return Err(SolError::InvalidVariable);
        }
        if !sol.assign(lit.abs(), lit > 0) {
            return Err(SolError::RepeatedVariable);
        }
    }
    Ok(sol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn assign_respects_existing_values() {
        let mut sol = Solution::new();
        assert!(sol.assign(3, true));
        assert!(!sol.assign(3, false));
        assert_eq!(sol.value(3), Some(true));
        sol.reassign(3, false);
        assert_eq!(sol.value(3), Some(false));
        assert!(sol.unassign(3));
        assert!(!sol.unassign(3));
    }

    #[test]
    fn display_emits_sol_format() {
        let mut sol = Solution::new();
        sol.set_max_var(3);
        sol.set_num_clauses(2);
        sol.set_valid(true);
        sol.assign(1, true);
        sol.assign(2, false);
        sol.assign(3, true);
        sol.stats_mut()
            .insert("SOLVER".to_string(), "dpll".to_string());

        assert_eq!(
            format!("{}", sol),
            "s cnf 1 3 2\nt SOLVER dpll\nv 1\nv -2\nv 3\n"
        );
    }

    #[test]
    fn reads_back_what_it_prints() {
        let text = "c a comment\n\ns cnf 1 3 2\nt ELAPSED_TIME_SECONDS 0.5\nv 1\nv -2\nv 3\n";
        let sol = read_solution(Cursor::new(text)).unwrap();
        assert!(sol.is_valid());
        assert_eq!(sol.max_var(), 3);
        assert_eq!(sol.num_clauses(), 2);
        assert_eq!(sol.value(1), Some(true));
        assert_eq!(sol.value(2), Some(false));
        assert_eq!(sol.value(3), Some(true));
    }

    #[test]
    fn rejects_malformed_bodies() {
        let zero = "s cnf 1 2 1\nv 0\n";
        assert!(matches!(
            read_solution(Cursor::new(zero)),
            Err(SolError::VariableZero)
        ));

        let too_big = "s cnf 1 2 1\nv 3\n";
        assert!(matches!(
            read_solution(Cursor::new(too_big)),
            Err(SolError::InvalidVariable)
        ));

        let repeated = "s cnf 1 2 1\nv 1\nv -1\n";
        assert!(matches!(
            read_solution(Cursor::new(repeated)),
            Err(SolError::RepeatedVariable)
        ));

        let garbage = "s cnf 1 2 1\nw 1\n";
        assert!(matches!(
            read_solution(Cursor::new(garbage)),
            Err(SolError::BodyFormat)
        ));

        let header = "s dnf 1 2 1\n";
        assert!(matches!(
            read_solution(Cursor::new(header)),
            Err(SolError::SolutionLine)
        ));
    }
}
