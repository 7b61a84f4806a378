//! Proof obligations and the obligation list

use crate::state::PogState;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use vdm_core::ast::Expr;
use vdm_core::span::Span;

/// What an obligation is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationKind {
    MapApply,
    SeqApply,
    FunctionApply,
    OperationCall,
    NonZero,
    NonEmptySet,
    NonEmptySeq,
    MapCompatible,
    MapSetOfCompatible,
    MapCompose,
    MapIteration,
    FunctionCompose,
    FunctionIteration,
    SeqModification,
    Subtype,
    TypeInvariant,
    StateInvariant,
    LetBeExists,
    UniqueExistence,
    CasesExhaustive,
    FiniteSet,
    FiniteMap,
    WhileLoopTermination,
    FunctionPostCondition,
    FunctionSatisfiability,
    FunctionParamPatterns,
    OperationPostCondition,
    OperationSatisfiability,
    OperationParamPatterns,
    ValueBinding,
}

impl ObligationKind {
    pub fn name(self) -> &'static str {
        match self {
            ObligationKind::MapApply => "map apply",
            ObligationKind::SeqApply => "sequence apply",
            ObligationKind::FunctionApply => "function apply",
            ObligationKind::OperationCall => "operation call precondition",
            ObligationKind::NonZero => "non-zero",
            ObligationKind::NonEmptySet => "non-empty set",
            ObligationKind::NonEmptySeq => "non-empty sequence",
            ObligationKind::MapCompatible => "map compatible",
            ObligationKind::MapSetOfCompatible => "map set of compatible",
            ObligationKind::MapCompose => "map compose",
            ObligationKind::MapIteration => "map iteration",
            ObligationKind::FunctionCompose => "function compose",
            ObligationKind::FunctionIteration => "function iteration",
            ObligationKind::SeqModification => "sequence modification",
            ObligationKind::Subtype => "subtype",
            ObligationKind::TypeInvariant => "type invariant",
            ObligationKind::StateInvariant => "state invariant",
            ObligationKind::LetBeExists => "let be st existence",
            ObligationKind::UniqueExistence => "unique existence",
            ObligationKind::CasesExhaustive => "cases exhaustive",
            ObligationKind::FiniteSet => "finite set",
            ObligationKind::FiniteMap => "finite map",
            ObligationKind::WhileLoopTermination => "while loop termination",
            ObligationKind::FunctionPostCondition => "function post condition",
            ObligationKind::FunctionSatisfiability => "function satisfiability",
            ObligationKind::FunctionParamPatterns => "function parameter patterns",
            ObligationKind::OperationPostCondition => "operation post condition",
            ObligationKind::OperationSatisfiability => "operation satisfiability",
            ObligationKind::OperationParamPatterns => "operation parameter patterns",
            ObligationKind::ValueBinding => "value binding",
        }
    }
}

impl fmt::Display for ObligationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why an obligation cannot be checked soundly as emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UncheckedReason {
    LoopStatement,
    NonDeterministic,
    NotYetSupported,
    HasUpdatedState,
    HasAmbiguousState,
    OpaqueOperationCall,
}

impl fmt::Display for UncheckedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UncheckedReason::LoopStatement => "LOOP_STATEMENT",
            UncheckedReason::NonDeterministic => "NON_DETERMINISTIC",
            UncheckedReason::NotYetSupported => "NOT_YET_SUPPORTED",
            UncheckedReason::HasUpdatedState => "HAS_UPDATED_STATE",
            UncheckedReason::HasAmbiguousState => "HAS_AMBIGUOUS_STATE",
            UncheckedReason::OpaqueOperationCall => "OPAQUE_OPERATION_CALL",
        })
    }
}

/// Status of an obligation; only an external evaluator moves it past
/// `Unchecked`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum PoStatus {
    #[default]
    Unchecked,
    Proved,
    Failed,
    Maybe,
}

impl fmt::Display for PoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PoStatus::Unchecked => "Unchecked",
            PoStatus::Proved => "Proved",
            PoStatus::Failed => "Failed",
            PoStatus::Maybe => "Maybe",
        })
    }
}

/// A single proof obligation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProofObligation {
    /// 1-based, assigned by [`ObligationList::renumber`]
    pub number: usize,
    pub kind: ObligationKind,
    /// Definition the obligation arises in
    pub name: String,
    pub module: String,
    pub file: String,
    pub span: Span,
    /// Predicate rendered under its context
    pub text: String,
    pub status: PoStatus,
    pub checkable: bool,
    /// Unchecked reason, if any
    pub message: Option<String>,
    /// Filled in by an evaluator that finds a counterexample
    pub counterexample: Option<BTreeMap<String, String>>,
    /// Filled in by an evaluator that finds a witness
    pub witness: Option<String>,
    /// Names free in the predicate
    pub free_names: BTreeSet<String>,
}

impl ProofObligation {
    pub fn new(
        kind: ObligationKind,
        name: impl Into<String>,
        module: impl Into<String>,
        file: impl Into<String>,
        span: Span,
        text: String,
    ) -> Self {
        Self {
            number: 0,
            kind,
            name: name.into(),
            module: module.into(),
            file: file.into(),
            span,
            text,
            status: PoStatus::Unchecked,
            checkable: true,
            message: None,
            counterexample: None,
            witness: None,
            free_names: BTreeSet::new(),
        }
    }

    pub fn with_free_names(mut self, names: BTreeSet<String>) -> Self {
        self.free_names = names;
        self
    }

    /// Flag as not soundly checkable; the first reason given is kept
    pub fn mark_unchecked(&mut self, reason: UncheckedReason) {
        if self.checkable {
            self.checkable = false;
            self.message = Some(reason.to_string());
        }
    }

    /// `Name: kind obligation in 'M' (file) at line L:C`
    pub fn location_line(&self) -> String {
        format!(
            "{}: {} obligation in '{}' ({}) at {}",
            self.name, self.kind, self.module, self.file, self.span
        )
    }

    /// Predicate lines, long ones wrapped on logical connectives
    pub fn display_lines(&self, width: usize) -> Vec<String> {
        self.text
            .lines()
            .flat_map(|line| wrap_line(line, width))
            .collect()
    }

    /// Full textual layout with predicate lines wrapped at `width`
    pub fn render(&self, width: usize) -> String {
        let mut out = format!("Proof Obligation {}: ({})", self.number, self.status);
        if let Some(message) = &self.message {
            out.push_str(&format!(" [{}]", message));
        }
        out.push('\n');
        out.push_str(&self.location_line());
        for line in self.display_lines(width) {
            out.push('\n');
            out.push_str(&line);
        }
        out
    }
}

impl fmt::Display for ProofObligation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(usize::MAX))
    }
}

const CONNECTIVES: [&str; 4] = [" and ", " or ", " => ", " <=> "];

/// Split `line` before connectives so no piece exceeds `width` where possible
///
/// Continuation lines keep the original indentation plus two spaces.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if line.len() <= width {
        return vec![line.to_string()];
    }
    let indent_len = line.len() - line.trim_start().len();
    let continuation = format!("{}  ", &line[..indent_len]);

    let mut pieces = Vec::new();
    let mut rest = line;
    let mut prefix: &str = "";
    while prefix.len() + rest.len() > width {
        let limit = width.saturating_sub(prefix.len());
        let split = CONNECTIVES
            .iter()
            .filter_map(|c| rest[..floor_boundary(rest, limit.saturating_add(c.len()))].rfind(c))
            .filter(|&pos| pos <= limit && !rest[..pos].trim().is_empty())
            .max();
        match split {
            Some(pos) => {
                pieces.push(format!("{}{}", prefix, &rest[..pos]));
                rest = rest[pos..].trim_start();
                prefix = continuation.as_str();
            }
            None => break,
        }
    }
    pieces.push(format!("{}{}", prefix, rest));
    pieces
}

/// Largest char boundary of `s` not past `index`
fn floor_boundary(s: &str, index: usize) -> usize {
    let mut index = index.min(s.len());
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Ordered list of obligations
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ObligationList {
    obligations: Vec<ProofObligation>,
}

impl ObligationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, obligation: ProofObligation) {
        self.obligations.push(obligation);
    }

    pub fn add_all(&mut self, other: ObligationList) {
        self.obligations.extend(other.obligations);
    }

    /// Stamp every obligation with `reason`
    pub fn mark_unchecked(&mut self, reason: UncheckedReason) {
        for po in &mut self.obligations {
            po.mark_unchecked(reason);
        }
    }

    /// Stamp every obligation if `expr` reads ambiguous state
    pub fn mark_if_ambiguous(&mut self, state: &PogState, expr: &Expr) {
        if state.has_ambiguous_state(&expr.free_vars()) {
            self.mark_unchecked(UncheckedReason::HasAmbiguousState);
        }
    }

    /// Stamp every obligation if `expr` reads a variable updated on this path
    pub fn mark_if_updated(&mut self, state: &PogState, expr: &Expr) {
        if expr.free_vars().iter().any(|n| state.is_updated(n)) {
            self.mark_unchecked(UncheckedReason::HasUpdatedState);
        }
    }

    /// Assign numbers `1..=N` in list order
    pub fn renumber(&mut self) {
        for (i, po) in self.obligations.iter_mut().enumerate() {
            po.number = i + 1;
        }
    }

    pub fn len(&self) -> usize {
        self.obligations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProofObligation> {
        self.obligations.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ProofObligation> {
        self.obligations.get(index)
    }

    pub fn retain(&mut self, f: impl FnMut(&ProofObligation) -> bool) {
        self.obligations.retain(f);
    }
}

impl IntoIterator for ObligationList {
    type Item = ProofObligation;
    type IntoIter = std::vec::IntoIter<ProofObligation>;

    fn into_iter(self) -> Self::IntoIter {
        self.obligations.into_iter()
    }
}

impl<'a> IntoIterator for &'a ObligationList {
    type Item = &'a ProofObligation;
    type IntoIter = std::slice::Iter<'a, ProofObligation>;

    fn into_iter(self) -> Self::IntoIter {
        self.obligations.iter()
    }
}

impl fmt::Display for ObligationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, po) in self.obligations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}", po)?;
        }
        Ok(())
    }
}
