use std::io::BufRead;
use std::num::IntErrorKind;

use thiserror::Error;

use crate::cnf::{ClauseId, CNF};

/// Ways reading a CNF problem stream can fail. All of these abort before
/// any solving starts.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("the problem line is not formatted correctly.")]
    ProblemLine,
    #[error("the problem expression is not formatted correctly.")]
    ExpressionFormat,
    #[error("the number of variables and/or clauses must be strictly positive.")]
    ClauseVarCount,
    #[error("the number of clauses and/or variables must not exceed the signed 32-bit integer.")]
    Overflow,
    #[error("named variables must not exceed the provided maximum")]
    InvalidVariable,
    #[error("the problem expression does not contain the correct number of clauses.")]
    WrongClauseCount,
    #[error("an I/O Error was encountered while parsing input")]
    Io(#[from] std::io::Error),
}

fn parse_i32(token: &str, format: InputError) -> Result<i32, InputError> {
    token.parse::<i32>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => InputError::Overflow,
        _ => format,
    })
}

/// Parses `p cnf V C` into the declared variable ceiling and clause count.
fn parse_problem_line(line: &str) -> Result<(i32, i32), InputError> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("p") || tokens.next() != Some("cnf") {
        return Err(InputError::ProblemLine);
    }
    let max_var = tokens.next().ok_or(InputError::ProblemLine)?;
    let max_var = parse_i32(max_var, InputError::ProblemLine)?;
    let clauses = tokens.next().ok_or(InputError::ProblemLine)?;
    let clauses = parse_i32(clauses, InputError::ProblemLine)?;
    if tokens.next().is_some() {
        return Err(InputError::ProblemLine);
    }
    if max_var <= 0 || clauses <= 0 {
        return Err(InputError::ClauseVarCount);
    }
    Ok((max_var, clauses))
}

/// Reads a CNF-formatted problem from a byte stream.
///
/// Blank lines and lines starting with `c` are skipped. The first
/// remaining line must be the problem line; the body is a stream of
/// whitespace-separated integers where every `0` terminates a clause.
/// At end of stream the number of completed clauses must equal the
/// declared count.
pub fn read_cnf<R: BufRead>(reader: R) -> Result<CNF, InputError> {
    let mut expr = CNF::new();
    let mut lines = reader.lines();

    // find and parse the problem line
    loop {
        let line = match lines.next() {
            Some(line) => line?,
            None => return Err(InputError::ProblemLine),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('c') {
            continue;
        }
        let (max_var, clauses) = parse_problem_line(trimmed)?;
        expr.set_max_var(max_var);
        expr.set_declared_clauses(clauses as usize);
        break;
    }

    // parse the expression body
    let mut completed: usize = 0;
    let mut current: ClauseId = 1;
    for line in lines {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.starts_with('c') {
            continue;
        }
        for token in trimmed.split_whitespace() {
            let lit = parse_i32(token, InputError::ExpressionFormat)?;
            if lit == 0 {
                completed += 1;
                current += 1;
            } else if lit.abs() > expr.max_var() {
                return Err(InputError::InvalidVariable);
            } else {
                expr.add_literal(lit, current);
            }
        }
    }

    // ensure the promised number of clauses was provided
    if completed != expr.declared_clauses() {
        return Err(InputError::WrongClauseCount);
    }
    Ok(expr)
}
