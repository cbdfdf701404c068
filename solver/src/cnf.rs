use std::collections::BTreeSet;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::solution::Solution;

/// A boolean variable; strictly positive.
pub type Variable = i32;

/// A boolean literal; negative values indicate negation, never zero.
pub type Literal = i32;

/// A disjunctive clause identifier; strictly positive and never reused
/// within one formula instance.
pub type ClauseId = u32;

/// Raised when a formula is evaluated under an assignment that leaves
/// a referenced variable unset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("variable {0} is referenced by the formula but not assigned")]
pub struct MissingAssignment(pub Variable);

/// A CNF formula with a bidirectional literal/clause index.
///
/// Clauses are stored as sets of literals keyed by clause id; the reverse
/// index maps every literal to the set of clauses it appears in. Both sides
/// are maintained together, so polarity queries (pure literals, occurrence
/// counts) are cheap. Edges are plain integer keys, which keeps the
/// structure trivially cloneable; every solver worker mutates its own copy.
#[derive(Clone, Debug, Default)]
pub struct CNF {
    clauses: IndexMap<ClauseId, IndexSet<Literal>>,
    literals: FxHashMap<Literal, FxHashSet<ClauseId>>,
    max_var: Variable,
    declared_clauses: usize,
    next_clause_id: ClauseId,
}

impl CNF {
    /// Creates an empty formula.
    pub fn new() -> CNF {
        CNF::default()
    }

    /// Largest variable the formula may name, as declared by the input
    /// header (or grown by inserts).
    pub fn max_var(&self) -> Variable {
        self.max_var
    }

    pub fn set_max_var(&mut self, max_var: Variable) {
        self.max_var = self.max_var.max(max_var);
    }

    /// Number of clauses the input header promised.
    pub fn declared_clauses(&self) -> usize {
        self.declared_clauses
    }

    pub fn set_declared_clauses(&mut self, count: usize) {
        self.declared_clauses = count;
    }

    /// Number of clauses currently active.
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Number of distinct variables still appearing in some clause.
    pub fn num_variables(&self) -> usize {
        self.variables().len()
    }

    /// Inserts `lit` into clause `cl`, creating the clause and both index
    /// entries for the underlying variable as needed. Inserting a literal
    /// that is already present is a no-op.
    pub fn add_literal(&mut self, lit: Literal, cl: ClauseId) {
        debug_assert!(lit != 0, "literals are nonzero");
        let var = lit.abs();
        self.literals.entry(var).or_default();
        self.literals.entry(-var).or_default();
        self.literals.entry(lit).or_default().insert(cl);
        self.clauses.entry(cl).or_insert_with(IndexSet::new).insert(lit);
        self.max_var = self.max_var.max(var);
        self.next_clause_id = self.next_clause_id.max(cl + 1);
    }

    /// Inserts a whole clause under a fresh id and returns the id.
    /// Used for learned clauses; the id is guaranteed not to collide with
    /// any id ever handed out by this instance.
    pub fn add_clause<I>(&mut self, lits: I) -> ClauseId
    where
        I: IntoIterator<Item = Literal>,
    {
        let cl = self.next_clause_id.max(1);
        self.next_clause_id = cl + 1;
        // An empty iterator still creates the clause: an empty clause is a
        // meaningful conflict marker.
        self.clauses.entry(cl).or_insert_with(IndexSet::new);
        for lit in lits {
            self.add_literal(lit, cl);
        }
        cl
    }

    /// Removes `lit` from clause `cl` and `cl` from the literal's index
    /// entry. A clause emptied this way remains in the formula: an empty
    /// clause signals a conflict.
    pub fn remove_literal(&mut self, lit: Literal, cl: ClauseId) {
        if let Some(cls) = self.literals.get_mut(&lit) {
            cls.remove(&cl);
        }
        if let Some(lits) = self.clauses.get_mut(&cl) {
            lits.shift_remove(&lit);
        }
    }

    /// Removes clause `cl` entirely, dropping it from the index entry of
    /// every literal it contained.
    pub fn remove_clause(&mut self, cl: ClauseId) {
        if let Some(lits) = self.clauses.shift_remove(&cl) {
            for lit in lits {
                if let Some(cls) = self.literals.get_mut(&lit) {
                    cls.remove(&cl);
                }
            }
        }
    }

    /// The literal set of clause `cl`, if the clause is active.
    pub fn get_clause(&self, cl: ClauseId) -> Option<&IndexSet<Literal>> {
        self.clauses.get(&cl)
    }

    /// Ids of the clauses the given literal currently appears in.
    pub fn clauses_of(&self, lit: Literal) -> impl Iterator<Item = ClauseId> + '_ {
        self.literals.get(&lit).into_iter().flatten().copied()
    }

    /// Iterates over the active clauses in a deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (ClauseId, &IndexSet<Literal>)> {
        self.clauses.iter().map(|(&cl, lits)| (cl, lits))
    }

    /// Assigns variable `var` to `val` and simplifies: clauses containing
    /// the satisfied polarity are deleted outright, the falsified polarity
    /// is removed from every clause it appears in (possibly leaving empty
    /// clauses behind). Safe to call for a variable that no longer appears.
    ///
    /// Deletions are staged on id lists collected up front, so the index
    /// entries are never mutated while being iterated.
    pub fn assign_and_simplify(&mut self, var: Variable, val: bool) {
        let sat_lit = if val { var } else { -var };

        let satisfied: Vec<ClauseId> = self.clauses_of(sat_lit).collect();
        for cl in satisfied {
            self.remove_clause(cl);
        }

        let weakened: Vec<ClauseId> = self.clauses_of(-sat_lit).collect();
        for cl in weakened {
            self.remove_literal(-sat_lit, cl);
        }
    }

    /// Any clause whose literal set has exactly one member, together with
    /// that literal. When several unit clauses exist the choice is
    /// arbitrary but deterministic for a given formula state.
    pub fn unit_clause(&self) -> Option<(ClauseId, Literal)> {
        self.clauses.iter().find_map(|(&cl, lits)| {
            if lits.len() == 1 {
                lits.iter().next().map(|&lit| (cl, lit))
            } else {
                None
            }
        })
    }

    /// A literal whose complement no longer appears in any clause, or
    /// `None` if the formula has no pure literal.
    pub fn pure_literal(&self) -> Option<Literal> {
        self.literals
            .iter()
            .filter(|(_, cls)| !cls.is_empty())
            .find(|(lit, _)| {
                self.literals
                    .get(&-**lit)
                    .map_or(true, |compl| compl.is_empty())
            })
            .map(|(&lit, _)| lit)
    }

    /// Whether the formula contains an empty (conflict) clause.
    pub fn has_empty_clause(&self) -> bool {
        self.empty_clause().is_some()
    }

    /// Id of some empty clause, if one exists.
    pub fn empty_clause(&self) -> Option<ClauseId> {
        self.clauses
            .iter()
            .find(|(_, lits)| lits.is_empty())
            .map(|(&cl, _)| cl)
    }

    /// Evaluates the formula under the given assignment: true iff every
    /// clause has at least one satisfied literal. Referencing an unassigned
    /// variable is an error, not a `false`.
    pub fn eval(&self, sol: &Solution) -> Result<bool, MissingAssignment> {
        for lits in self.clauses.values() {
            let mut satisfied = false;
            for &lit in lits {
                let val = sol
                    .value(lit.abs())
                    .ok_or(MissingAssignment(lit.abs()))?;
                if val == (lit > 0) {
                    satisfied = true;
                    break;
                }
            }
            if !satisfied {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Ids of the clauses not satisfied under the assignment, in
    /// deterministic clause order. An unassigned variable never satisfies
    /// a clause.
    pub fn unsatisfied_clauses(&self, sol: &Solution) -> Vec<ClauseId> {
        self.clauses
            .iter()
            .filter(|(_, lits)| {
                !lits
                    .iter()
                    .any(|&lit| sol.value(lit.abs()) == Some(lit > 0))
            })
            .map(|(&cl, _)| cl)
            .collect()
    }

    /// The ordered set of variables still appearing in some clause.
    pub fn variables(&self) -> BTreeSet<Variable> {
        self.literals
            .iter()
            .filter(|(_, cls)| !cls.is_empty())
            .map(|(lit, _)| lit.abs())
            .collect()
    }

    /// Some variable appearing in a remaining clause: the first literal of
    /// the first active non-empty clause. Deterministic for identical
    /// formula states, which keeps worker divisions reproducible.
    pub fn pick_var(&self) -> Option<Variable> {
        self.clauses
            .values()
            .find_map(|lits| lits.iter().next())
            .map(|&lit| lit.abs())
    }
}

impl fmt::Display for CNF {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for lits in self.clauses.values() {
            writeln!(f, "{{ {} }}", lits.iter().join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula(clauses: &[&[Literal]]) -> CNF {
        let mut expr = CNF::new();
        for (i, lits) in clauses.iter().enumerate() {
            for &lit in lits.iter() {
                expr.add_literal(lit, (i + 1) as ClauseId);
            }
        }
        expr
    }

    fn assignment(pairs: &[(Variable, bool)]) -> Solution {
        let mut sol = Solution::new();
        for &(var, val) in pairs {
            sol.assign(var, val);
        }
        sol
    }

    /// Checks the index consistency the rest of the crate relies on:
    /// both polarities of every seen variable are indexed, and the two
    /// sides of the clause/literal relation agree.
    fn check_indices(expr: &CNF) {
        for (cl, lits) in expr.iter() {
            for &lit in lits {
                assert!(
                    expr.clauses_of(lit).any(|c| c == cl),
                    "clause {} missing from index of literal {}",
                    cl,
                    lit
                );
                assert!(expr.literals.contains_key(&-lit));
            }
        }
        for (&lit, cls) in &expr.literals {
            for &cl in cls {
                assert!(
                    expr.get_clause(cl).map_or(false, |lits| lits.contains(&lit)),
                    "literal {} missing from clause {}",
                    lit,
                    cl
                );
            }
        }
    }

    #[test]
    fn add_and_remove_keep_both_index_sides() {
        let mut expr = formula(&[&[1, -2], &[2, 3]]);
        check_indices(&expr);

        expr.remove_literal(-2, 1);
        check_indices(&expr);
        assert_eq!(expr.get_clause(1).unwrap().len(), 1);

        expr.remove_clause(2);
        check_indices(&expr);
        assert_eq!(expr.num_clauses(), 1);
        assert!(expr.clauses_of(3).next().is_none());
    }

    #[test]
    fn emptied_clause_remains_as_conflict() {
        let mut expr = formula(&[&[1]]);
        expr.remove_literal(1, 1);
        assert_eq!(expr.num_clauses(), 1);
        assert_eq!(expr.empty_clause(), Some(1));
    }

    #[test]
    fn clause_ids_are_never_reused() {
        let mut expr = formula(&[&[1, 2], &[-1, 3]]);
        expr.remove_clause(2);
        let fresh = expr.add_clause(vec![2, 3]);
        assert!(fresh > 2);
        let fresher = expr.add_clause(vec![-3]);
        assert!(fresher > fresh);
    }

    #[test]
    fn assign_and_simplify_deletes_and_shrinks() {
        let mut expr = formula(&[&[1, 2], &[-1, 2], &[-1, -2]]);
        expr.assign_and_simplify(1, true);
        check_indices(&expr);
        // clause 1 satisfied and gone; clauses 2 and 3 lose -1
        assert_eq!(expr.num_clauses(), 2);
        assert_eq!(expr.get_clause(2).unwrap().len(), 1);
        assert_eq!(expr.get_clause(3).unwrap().len(), 1);
        // assigning a variable that no longer appears is harmless
        expr.assign_and_simplify(1, false);
        assert_eq!(expr.num_clauses(), 2);
    }

    #[test]
    fn assign_and_simplify_agrees_with_eval() {
        // F restricted by v=b must evaluate like F under any total
        // assignment extending v=b.
        let expr = formula(&[&[1, -2], &[2, 3], &[-1, -3], &[-2, -3]]);
        for var in 1..=3 {
            for &val in &[false, true] {
                for bits in 0..8u8 {
                    let total = assignment(&[
                        (1, bits & 1 != 0),
                        (2, bits & 2 != 0),
                        (3, bits & 4 != 0),
                    ]);
                    if total.value(var) != Some(val) {
                        continue;
                    }
                    let mut reduced = expr.clone();
                    reduced.assign_and_simplify(var, val);
                    assert_eq!(
                        expr.eval(&total).unwrap(),
                        reduced.eval(&total).unwrap(),
                        "divergence at var {} = {} under {:?}",
                        var,
                        val,
                        total.map()
                    );
                }
            }
        }
    }

    #[test]
    fn unit_and_pure_detection() {
        let expr = formula(&[&[1], &[-1, 2], &[3, 2]]);
        assert_eq!(expr.unit_clause(), Some((1, 1)));
        // 2 and 3 appear only positively; 1 appears in both polarities
        let pure = expr.pure_literal().unwrap();
        assert!(pure == 2 || pure == 3);

        let tight = formula(&[&[1, -2], &[-1, 2]]);
        assert_eq!(tight.unit_clause(), None);
        assert_eq!(tight.pure_literal(), None);
    }

    #[test]
    fn eval_requires_full_assignment() {
        let expr = formula(&[&[1, 2]]);
        let partial = assignment(&[(1, false)]);
        assert_eq!(expr.eval(&partial), Err(MissingAssignment(2)));
        let total = assignment(&[(1, false), (2, true)]);
        assert_eq!(expr.eval(&total), Ok(true));
    }

    #[test]
    fn unsatisfied_clauses_under_assignment() {
        let expr = formula(&[&[1, 2], &[-1], &[-2, -1]]);
        let sol = assignment(&[(1, true), (2, false)]);
        assert_eq!(expr.unsatisfied_clauses(&sol), vec![2]);
    }

    #[test]
    fn pick_var_is_deterministic() {
        let expr = formula(&[&[2, 3], &[1]]);
        assert_eq!(expr.pick_var(), expr.clone().pick_var());
        assert_eq!(expr.pick_var(), Some(2));
        assert_eq!(
            expr.variables().into_iter().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn display_prints_one_clause_per_line() {
        let expr = formula(&[&[1, -2], &[3]]);
        assert_eq!(format!("{}", expr), "{ 1 -2 }\n{ 3 }\n");
    }
}
