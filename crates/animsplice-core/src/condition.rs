//! # Condition Algebra
//!
//! Guards over the parameter namespace, kept in disjunctive normal form.
//!
//! A [`Dnf`] is a list of clauses; a clause is a conjunction of
//! [`Condition`]s. Every combinator (`and`, `or`, `not`) returns a simplified
//! expression, because each surviving clause becomes one real transition edge
//! once the guard is materialised into a graph.
//!
//! ## Boundary negation
//!
//! The guard language has no `<=` or `>=`. Negating `x > t` therefore yields
//! `x < nextUp(t)`, and negating `x < t` yields `x > nextDown(t)`, which
//! classify the boundary value exactly like the strict originals would.
//!
//! ## Simplification
//!
//! 1. Per clause: subsumed conditions on one parameter are dropped, duplicates
//!    removed, the clause sorted canonically.
//! 2. Clauses that can never hold are dropped.
//! 3. Duplicate clauses are dropped.
//! 4. Clauses that are proper supersets of another clause are dropped.
//!
//! The result is equivalent to the input for every assignment. It is free of
//! duplicates, impossible clauses and subsumed clauses, but not minimal.

use crate::primitives::comparator_codes;
use crate::types::SpliceError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Concrete parameter values used to evaluate guards.
///
/// Booleans and triggers are stored as `0.0` / `1.0`; parameters that are
/// absent read as `0.0`.
pub type Assignment = BTreeMap<String, f32>;

// =============================================================================
// COMPARATOR
// =============================================================================

/// Comparison applied by a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Comparator {
    /// Boolean parameter is set.
    If,
    /// Boolean parameter is not set.
    IfNot,
    Greater,
    Less,
    Equals,
    NotEqual,
}

impl Comparator {
    /// The host's integer code for this comparator.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::If => comparator_codes::IF,
            Self::IfNot => comparator_codes::IF_NOT,
            Self::Greater => comparator_codes::GREATER,
            Self::Less => comparator_codes::LESS,
            Self::Equals => comparator_codes::EQUALS,
            Self::NotEqual => comparator_codes::NOT_EQUAL,
        }
    }

    /// True for the comparators that only apply to boolean parameters.
    #[must_use]
    pub const fn is_boolean(self) -> bool {
        matches!(self, Self::If | Self::IfNot)
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::If => "",
            Self::IfNot => "!",
            Self::Greater => ">",
            Self::Less => "<",
            Self::Equals => "==",
            Self::NotEqual => "!=",
        }
    }
}

impl TryFrom<i32> for Comparator {
    type Error = SpliceError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            comparator_codes::IF => Ok(Self::If),
            comparator_codes::IF_NOT => Ok(Self::IfNot),
            comparator_codes::GREATER => Ok(Self::Greater),
            comparator_codes::LESS => Ok(Self::Less),
            comparator_codes::EQUALS => Ok(Self::Equals),
            comparator_codes::NOT_EQUAL => Ok(Self::NotEqual),
            other => Err(SpliceError::UnknownComparator(other)),
        }
    }
}

// =============================================================================
// CONDITION
// =============================================================================

/// One atomic comparison `(parameter, comparator, threshold)`.
///
/// Equality and ordering compare thresholds by their total order, so a
/// condition can live in sorted, deduplicated clauses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub parameter: String,
    pub comparator: Comparator,
    #[serde(default)]
    pub threshold: f32,
}

impl Condition {
    /// Create a new condition.
    #[must_use]
    pub fn new(parameter: impl Into<String>, comparator: Comparator, threshold: f32) -> Self {
        Self {
            parameter: parameter.into(),
            comparator,
            threshold,
        }
    }

    #[must_use]
    pub fn greater(parameter: impl Into<String>, threshold: f32) -> Self {
        Self::new(parameter, Comparator::Greater, threshold)
    }

    #[must_use]
    pub fn less(parameter: impl Into<String>, threshold: f32) -> Self {
        Self::new(parameter, Comparator::Less, threshold)
    }

    #[must_use]
    pub fn equals(parameter: impl Into<String>, threshold: f32) -> Self {
        Self::new(parameter, Comparator::Equals, threshold)
    }

    #[must_use]
    pub fn not_equal(parameter: impl Into<String>, threshold: f32) -> Self {
        Self::new(parameter, Comparator::NotEqual, threshold)
    }

    #[must_use]
    pub fn is_true(parameter: impl Into<String>) -> Self {
        Self::new(parameter, Comparator::If, 0.0)
    }

    #[must_use]
    pub fn is_false(parameter: impl Into<String>) -> Self {
        Self::new(parameter, Comparator::IfNot, 0.0)
    }

    /// The condition that holds exactly when `self` does not.
    #[must_use]
    pub fn negate(&self) -> Self {
        let (comparator, threshold) = match self.comparator {
            Comparator::If => (Comparator::IfNot, self.threshold),
            Comparator::IfNot => (Comparator::If, self.threshold),
            Comparator::Equals => (Comparator::NotEqual, self.threshold),
            Comparator::NotEqual => (Comparator::Equals, self.threshold),
            // `> +inf` and `< -inf` never hold; `!= NaN` always does.
            Comparator::Greater if self.threshold == f32::INFINITY => {
                (Comparator::NotEqual, f32::NAN)
            }
            Comparator::Less if self.threshold == f32::NEG_INFINITY => {
                (Comparator::NotEqual, f32::NAN)
            }
            Comparator::Greater => (Comparator::Less, self.threshold.next_up()),
            Comparator::Less => (Comparator::Greater, self.threshold.next_down()),
        };
        Self::new(self.parameter.clone(), comparator, threshold)
    }

    /// Evaluate against concrete parameter values.
    #[must_use]
    pub fn evaluate(&self, values: &Assignment) -> bool {
        let value = values.get(&self.parameter).copied().unwrap_or(0.0);
        match self.comparator {
            Comparator::If => value != 0.0,
            Comparator::IfNot => value == 0.0,
            Comparator::Greater => value > self.threshold,
            Comparator::Less => value < self.threshold,
            Comparator::Equals => value == self.threshold,
            Comparator::NotEqual => value != self.threshold,
        }
    }

    /// Same condition over a renamed parameter.
    #[must_use]
    pub fn renamed(&self, rename: &mut impl FnMut(&str) -> String) -> Self {
        Self::new(rename(&self.parameter), self.comparator, self.threshold)
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Condition {}

impl PartialOrd for Condition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Condition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parameter
            .cmp(&other.parameter)
            .then(self.comparator.cmp(&other.comparator))
            .then(self.threshold.total_cmp(&other.threshold))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.comparator.is_boolean() {
            write!(f, "{}{}", self.comparator.symbol(), self.parameter)
        } else {
            write!(
                f,
                "{} {} {}",
                self.parameter,
                self.comparator.symbol(),
                self.threshold
            )
        }
    }
}

// =============================================================================
// DNF
// =============================================================================

/// A guard: a disjunction of conjunctions of conditions.
///
/// No clauses means "never"; a single empty clause means "always".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dnf {
    clauses: Vec<Vec<Condition>>,
}

impl Dnf {
    /// The guard that never holds.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    /// The guard that always holds.
    #[must_use]
    pub fn always() -> Self {
        Self {
            clauses: vec![Vec::new()],
        }
    }

    /// A single-condition guard.
    #[must_use]
    pub fn condition(condition: Condition) -> Self {
        Self {
            clauses: vec![vec![condition]],
        }
    }

    /// Wrap raw clauses without simplifying them.
    #[must_use]
    pub fn from_clauses(clauses: Vec<Vec<Condition>>) -> Self {
        Self { clauses }
    }

    #[must_use]
    pub fn clauses(&self) -> &[Vec<Condition>] {
        &self.clauses
    }

    #[must_use]
    pub fn into_clauses(self) -> Vec<Vec<Condition>> {
        self.clauses
    }

    #[must_use]
    pub fn is_never(&self) -> bool {
        self.clauses.is_empty()
    }

    #[must_use]
    pub fn is_always(&self) -> bool {
        self.clauses.iter().any(Vec::is_empty)
    }

    /// Disjunction of `self` and `other`.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        let clauses = self
            .clauses
            .iter()
            .chain(other.clauses.iter())
            .cloned()
            .collect();
        simplify(&Self { clauses })
    }

    /// Conjunction of `self` and `other` (cartesian product of clauses).
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        let mut clauses =
            Vec::with_capacity(self.clauses.len().saturating_mul(other.clauses.len()));
        for left in &self.clauses {
            for right in &other.clauses {
                let mut clause = Vec::with_capacity(left.len().saturating_add(right.len()));
                clause.extend(left.iter().cloned());
                clause.extend(right.iter().cloned());
                clauses.push(clause);
            }
        }
        simplify(&Self { clauses })
    }

    /// Negation via De Morgan.
    ///
    /// Each clause negates to the disjunction of its negated conditions; the
    /// clauses are then folded together with `and`, simplifying after every
    /// step so intermediate products stay small.
    #[must_use]
    pub fn not(&self) -> Self {
        let mut result = Self::always();
        for clause in &self.clauses {
            let negated = Self {
                clauses: clause.iter().map(|c| vec![c.negate()]).collect(),
            };
            result = result.and(&negated);
            if result.is_never() {
                break;
            }
        }
        result
    }

    /// Simplified copy of this guard.
    #[must_use]
    pub fn simplify(&self) -> Self {
        simplify(self)
    }

    /// Evaluate against concrete parameter values.
    #[must_use]
    pub fn evaluate(&self, values: &Assignment) -> bool {
        self.clauses
            .iter()
            .any(|clause| clause.iter().all(|c| c.evaluate(values)))
    }

    /// Same guard over renamed parameters.
    #[must_use]
    pub fn rename_parameters(&self, mut rename: impl FnMut(&str) -> String) -> Self {
        Self {
            clauses: self
                .clauses
                .iter()
                .map(|clause| clause.iter().map(|c| c.renamed(&mut rename)).collect())
                .collect(),
        }
    }
}

impl fmt::Display for Dnf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            return write!(f, "false");
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " || ")?;
            }
            if clause.is_empty() {
                write!(f, "true")?;
                continue;
            }
            write!(f, "(")?;
            for (j, condition) in clause.iter().enumerate() {
                if j > 0 {
                    write!(f, " && ")?;
                }
                write!(f, "{condition}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

// =============================================================================
// FREE FUNCTIONS
// =============================================================================

/// `a || b`, simplified.
#[must_use]
pub fn or(a: &Dnf, b: &Dnf) -> Dnf {
    a.or(b)
}

/// `a && b`, simplified.
#[must_use]
pub fn and(a: &Dnf, b: &Dnf) -> Dnf {
    a.and(b)
}

/// `!a`, simplified.
#[must_use]
pub fn not(a: &Dnf) -> Dnf {
    a.not()
}

/// Run the simplification pipeline over a guard.
#[must_use]
pub fn simplify(dnf: &Dnf) -> Dnf {
    let mut clauses: Vec<Vec<Condition>> = Vec::with_capacity(dnf.clauses.len());
    for clause in &dnf.clauses {
        let Some(reduced) = simplify_clause(clause) else {
            continue;
        };
        if !clauses.contains(&reduced) {
            clauses.push(reduced);
        }
    }

    let kept = clauses
        .iter()
        .filter(|clause| {
            !clauses
                .iter()
                .any(|other| is_proper_subset(other, clause))
        })
        .cloned()
        .collect();

    Dnf { clauses: kept }
}

/// `small` ⊊ `big`; both sorted.
fn is_proper_subset(small: &[Condition], big: &[Condition]) -> bool {
    small.len() < big.len() && small.iter().all(|c| big.binary_search(c).is_ok())
}

/// Reduce one conjunction. `None` when it can never hold.
fn simplify_clause(clause: &[Condition]) -> Option<Vec<Condition>> {
    let mut by_parameter: BTreeMap<&str, ParameterBounds> = BTreeMap::new();
    for condition in clause {
        by_parameter
            .entry(condition.parameter.as_str())
            .or_default()
            .add(condition.comparator, condition.threshold);
    }

    let mut reduced = Vec::with_capacity(clause.len());
    for (parameter, bounds) in by_parameter {
        bounds.reduce(parameter, &mut reduced)?;
    }
    reduced.sort();
    reduced.dedup();
    Some(reduced)
}

/// -0.0 and 0.0 compare equal but order differently; keep one spelling.
fn canonical(threshold: f32) -> f32 {
    if threshold == 0.0 { 0.0 } else { threshold }
}

/// Everything one clause says about a single parameter.
#[derive(Default)]
struct ParameterBounds {
    set: bool,
    unset: bool,
    unsatisfiable: bool,
    equals: Vec<f32>,
    not_equal: Vec<f32>,
    greater: Option<f32>,
    less: Option<f32>,
}

impl ParameterBounds {
    fn add(&mut self, comparator: Comparator, threshold: f32) {
        if threshold.is_nan() {
            // Ordered comparisons against NaN never hold; `!= NaN` always does.
            if !matches!(comparator, Comparator::NotEqual) && !comparator.is_boolean() {
                self.unsatisfiable = true;
            }
            if !comparator.is_boolean() {
                return;
            }
        }
        let threshold = canonical(threshold);
        match comparator {
            Comparator::If => self.set = true,
            Comparator::IfNot => self.unset = true,
            Comparator::Equals => self.equals.push(threshold),
            Comparator::NotEqual => self.not_equal.push(threshold),
            Comparator::Greater => {
                self.greater = Some(self.greater.map_or(threshold, |g| g.max(threshold)));
            }
            Comparator::Less => {
                self.less = Some(self.less.map_or(threshold, |l| l.min(threshold)));
            }
        }
    }

    /// Push the tightest equivalent conditions; `None` when contradictory.
    fn reduce(self, parameter: &str, out: &mut Vec<Condition>) -> Option<()> {
        if self.unsatisfiable || (self.set && self.unset) {
            return None;
        }
        if self.set {
            out.push(Condition::is_true(parameter));
        }
        if self.unset {
            out.push(Condition::is_false(parameter));
        }

        if let Some(&value) = self.equals.first() {
            if self.equals.iter().any(|&other| other != value) {
                return None;
            }
            if self.greater.is_some_and(|g| value <= g) || self.less.is_some_and(|l| value >= l) {
                return None;
            }
            if self.not_equal.contains(&value) {
                return None;
            }
            out.push(Condition::equals(parameter, value));
            return Some(());
        }

        if let (Some(g), Some(l)) = (self.greater, self.less) {
            // No representable value strictly between g and l.
            if l <= g.next_up() {
                return None;
            }
        }
        if let Some(g) = self.greater {
            out.push(Condition::greater(parameter, g));
        }
        if let Some(l) = self.less {
            out.push(Condition::less(parameter, l));
        }
        for value in self.not_equal {
            let excluded_by_bounds =
                self.greater.is_some_and(|g| value <= g) || self.less.is_some_and(|l| value >= l);
            if !excluded_by_bounds {
                out.push(Condition::not_equal(parameter, value));
            }
        }
        Some(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(clauses: Vec<Vec<Condition>>) -> Dnf {
        Dnf::from_clauses(clauses)
    }

    fn values(pairs: &[(&str, f32)]) -> Assignment {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn comparator_codes_roundtrip() {
        for comparator in [
            Comparator::If,
            Comparator::IfNot,
            Comparator::Greater,
            Comparator::Less,
            Comparator::Equals,
            Comparator::NotEqual,
        ] {
            assert_eq!(Comparator::try_from(comparator.code()).ok(), Some(comparator));
        }
    }

    #[test]
    fn unknown_comparator_code_is_rejected() {
        let result = Comparator::try_from(5);
        assert!(matches!(result, Err(SpliceError::UnknownComparator(5))));
    }

    #[test]
    fn tighter_bound_subsumes_looser() {
        let dnf = guard(vec![vec![
            Condition::greater("x", 5.0),
            Condition::greater("x", 10.0),
        ]])
        .simplify();
        assert_eq!(dnf.clauses(), &[vec![Condition::greater("x", 10.0)]]);
    }

    #[test]
    fn contradictory_clauses_are_dropped() {
        let cases = vec![
            vec![Condition::greater("x", 10.0), Condition::less("x", 5.0)],
            vec![Condition::equals("x", 3.0), Condition::equals("x", 4.0)],
            vec![Condition::is_true("b"), Condition::is_false("b")],
            vec![Condition::equals("x", 3.0), Condition::not_equal("x", 3.0)],
        ];
        for clause in cases {
            assert!(guard(vec![clause]).simplify().is_never());
        }
    }

    #[test]
    fn equals_absorbs_compatible_bounds() {
        let dnf = guard(vec![vec![
            Condition::equals("x", 3.0),
            Condition::greater("x", 1.0),
            Condition::less("x", 4.0),
            Condition::not_equal("x", 7.0),
        ]])
        .simplify();
        assert_eq!(dnf.clauses(), &[vec![Condition::equals("x", 3.0)]]);
    }

    #[test]
    fn not_equal_outside_range_is_redundant() {
        let dnf = guard(vec![vec![
            Condition::greater("x", 1.0),
            Condition::not_equal("x", 0.0),
            Condition::not_equal("x", 2.0),
        ]])
        .simplify();
        assert_eq!(
            dnf.clauses(),
            &[vec![Condition::greater("x", 1.0), Condition::not_equal("x", 2.0)]]
        );
    }

    #[test]
    fn supersets_and_duplicates_are_dropped() {
        let a = Condition::is_true("a");
        let b = Condition::is_true("b");
        let dnf = guard(vec![
            vec![a.clone(), b.clone()],
            vec![a.clone()],
            vec![a.clone()],
        ])
        .simplify();
        assert_eq!(dnf.clauses(), &[vec![a]]);
    }

    #[test]
    fn empty_clause_makes_always() {
        let dnf = guard(vec![vec![Condition::is_true("a")], vec![]]).simplify();
        assert_eq!(dnf, Dnf::always());
        assert!(dnf.is_always());
    }

    #[test]
    fn negating_strict_bounds_nudges_threshold() {
        let negated = Condition::greater("x", 5.0).negate();
        assert_eq!(negated.comparator, Comparator::Less);
        assert_eq!(negated.threshold, 5.0f32.next_up());

        let at_boundary = values(&[("x", 5.0)]);
        assert!(!Condition::greater("x", 5.0).evaluate(&at_boundary));
        assert!(negated.evaluate(&at_boundary));
    }

    #[test]
    fn double_negation_of_greater() {
        let original = Dnf::condition(Condition::greater("x", 5.0));
        let twice = original.not().not();
        for x in [4.0f32, 5.0, 5.0f32.next_up(), 6.0] {
            let v = values(&[("x", x)]);
            assert_eq!(original.evaluate(&v), twice.evaluate(&v));
        }
    }

    #[test]
    fn negating_unreachable_infinite_bounds_always_holds() {
        for guard in [
            Dnf::condition(Condition::greater("x", f32::INFINITY)),
            Dnf::condition(Condition::less("x", f32::NEG_INFINITY)),
        ] {
            let negated = guard.not();
            assert!(negated.is_always());
            for x in [f32::NEG_INFINITY, 0.0, f32::INFINITY] {
                let v = values(&[("x", x)]);
                assert_ne!(guard.evaluate(&v), negated.evaluate(&v));
            }
            assert!(negated.not().is_never());
        }
    }

    #[test]
    fn and_with_negation_can_be_empty() {
        let a = Dnf::condition(Condition::greater("x", 10.0));
        let b = Dnf::condition(Condition::greater("x", 5.0));
        assert!(and(&a, &not(&b)).is_never());
    }

    #[test]
    fn not_of_constants() {
        assert_eq!(Dnf::never().not(), Dnf::always());
        assert_eq!(Dnf::always().not(), Dnf::never());
    }

    #[test]
    fn or_then_not_expands_de_morgan() {
        let a = Dnf::condition(Condition::is_true("a"));
        let b = Dnf::condition(Condition::is_true("b"));
        let negated = or(&a, &b).not();
        assert_eq!(
            negated.clauses(),
            &[vec![Condition::is_false("a"), Condition::is_false("b")]]
        );
    }

    #[test]
    fn negative_zero_is_canonical() {
        let dnf = guard(vec![vec![
            Condition::equals("x", 0.0),
            Condition::equals("x", -0.0),
        ]])
        .simplify();
        assert_eq!(dnf.clauses(), &[vec![Condition::equals("x", 0.0)]]);
    }

    #[test]
    fn rename_parameters_keeps_shape() {
        let dnf = Dnf::condition(Condition::greater("Speed", 0.0));
        let renamed = dnf.rename_parameters(|name| format!("Foo_{name}"));
        assert_eq!(renamed.clauses(), &[vec![Condition::greater("Foo_Speed", 0.0)]]);
    }

    #[test]
    fn display_is_readable() {
        let dnf = guard(vec![
            vec![Condition::greater("x", 1.0), Condition::is_false("b")],
            vec![Condition::is_true("c")],
        ]);
        assert_eq!(dnf.to_string(), "(x > 1 && !b) || (c)");
        assert_eq!(Dnf::never().to_string(), "false");
    }
}
