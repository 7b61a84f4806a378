//! Context stack
//!
//! The assumptions in force at a point of the walk: branch conditions,
//! quantifier bindings, local definitions and the substitutions produced by
//! assignments. Every obligation renders the whole stack around its predicate
//! at the moment it is created, so later pushes, pops and removals never
//! change obligations that were already emitted.
//!
//! Frames hold rendered text. Scoped guards ([`ContextStack::scope`],
//! [`ContextStack::scoped`]) truncate the stack back to its size on entry when
//! they are dropped, on every exit path including `?`.

use std::ops::{Deref, DerefMut};
use tracing::trace;
use vdm_core::span::Span;

/// A single assumption or effect on the context stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextFrame {
    /// `(p) =>`
    Implies(String),
    /// `not (p) =>`
    NotImplies(String),
    /// `(forall binds &` or `(forall binds & (p) =>`
    ForAll { binds: String, pred: Option<String> },
    /// Substitution of new values for updated variables, rendered as a `let`
    Assignment {
        targets: Vec<String>,
        values: Vec<String>,
    },
    /// Variables whose value is not known past this point; renders nothing
    AmbiguousMarker {
        names: Vec<String>,
        reason: String,
        span: Span,
    },
    /// `(let defs in`
    LetDef(String),
}

impl ContextFrame {
    pub fn implies(pred: impl Into<String>) -> Self {
        ContextFrame::Implies(pred.into())
    }

    pub fn not_implies(pred: impl Into<String>) -> Self {
        ContextFrame::NotImplies(pred.into())
    }

    pub fn forall(binds: impl Into<String>) -> Self {
        ContextFrame::ForAll {
            binds: binds.into(),
            pred: None,
        }
    }

    pub fn forall_such_that(binds: impl Into<String>, pred: impl Into<String>) -> Self {
        ContextFrame::ForAll {
            binds: binds.into(),
            pred: Some(pred.into()),
        }
    }

    pub fn assignment(target: impl Into<String>, value: impl Into<String>) -> Self {
        ContextFrame::Assignment {
            targets: vec![target.into()],
            values: vec![value.into()],
        }
    }

    /// Opening text of the frame and whether it opens a parenthesis
    fn render(&self) -> Option<(String, bool)> {
        match self {
            ContextFrame::Implies(p) => Some((format!("({}) =>", p), false)),
            ContextFrame::NotImplies(p) => Some((format!("not ({}) =>", p), false)),
            ContextFrame::ForAll { binds, pred: None } => {
                Some((format!("(forall {} &", binds), true))
            }
            ContextFrame::ForAll {
                binds,
                pred: Some(p),
            } => Some((format!("(forall {} & ({}) =>", binds, p), true)),
            ContextFrame::Assignment { targets, values } => {
                if targets.len() == 1 && values.len() == 1 {
                    Some((format!("(let {} = {} in", targets[0], values[0]), true))
                } else {
                    Some((
                        format!(
                            "(let mk_({}) = mk_({}) in",
                            targets.join(", "),
                            values.join(", ")
                        ),
                        true,
                    ))
                }
            }
            ContextFrame::LetDef(defs) => Some((format!("(let {} in", defs), true)),
            ContextFrame::AmbiguousMarker { .. } => None,
        }
    }
}

/// Ordered stack of context frames
#[derive(Debug, Clone, Default)]
pub struct ContextStack {
    frames: Vec<ContextFrame>,
    indent: usize,
}

impl ContextStack {
    /// Create an empty stack rendering `indent` spaces per nesting level
    pub fn new(indent: usize) -> Self {
        Self {
            frames: Vec::new(),
            indent,
        }
    }

    pub fn push(&mut self, frame: ContextFrame) {
        trace!(depth = self.frames.len(), ?frame, "push context");
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<ContextFrame> {
        self.frames.pop()
    }

    /// Push a frame and return its index, for a later [`Self::remove`]
    pub fn push_at(&mut self, frame: ContextFrame) -> usize {
        self.push(frame);
        self.frames.len() - 1
    }

    /// Pop frames until only `size` remain
    pub fn pop_to(&mut self, size: usize) {
        self.frames.truncate(size);
    }

    /// Excise the frame at `index`; frames above it shift down by one
    pub fn remove(&mut self, index: usize) -> Option<ContextFrame> {
        if index < self.frames.len() {
            Some(self.frames.remove(index))
        } else {
            None
        }
    }

    pub fn size(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[ContextFrame] {
        &self.frames
    }

    /// Is `name` covered by an ambiguity marker currently on the stack?
    pub fn is_marked_ambiguous(&self, name: &str) -> bool {
        self.frames.iter().any(|f| match f {
            ContextFrame::AmbiguousMarker { names, .. } => names.iter().any(|n| n == name),
            _ => false,
        })
    }

    /// Render `predicate` under every frame, bottom to top
    pub fn render(&self, predicate: &str) -> String {
        let mut out = String::new();
        let mut depth = 0;
        let mut closers = 0;
        for (text, opens) in self.frames.iter().filter_map(ContextFrame::render) {
            out.push_str(&" ".repeat(depth * self.indent));
            out.push_str(&text);
            out.push('\n');
            depth += 1;
            if opens {
                closers += 1;
            }
        }
        if depth == 0 {
            return predicate.to_string();
        }
        out.push_str(&" ".repeat(depth * self.indent));
        out.push('(');
        out.push_str(predicate);
        out.push(')');
        out.push_str(&")".repeat(closers));
        out
    }

    /// Guard that restores the current size when dropped
    pub fn scope(&mut self) -> ContextScope<'_> {
        let size = self.frames.len();
        ContextScope { stack: self, size }
    }

    /// Push `frame` for the lifetime of the returned guard
    pub fn scoped(&mut self, frame: ContextFrame) -> ContextScope<'_> {
        let mut scope = self.scope();
        scope.push(frame);
        scope
    }
}

/// Scoped view of a [`ContextStack`]; truncates the stack on drop
pub struct ContextScope<'a> {
    stack: &'a mut ContextStack,
    size: usize,
}

impl Deref for ContextScope<'_> {
    type Target = ContextStack;

    fn deref(&self) -> &ContextStack {
        self.stack
    }
}

impl DerefMut for ContextScope<'_> {
    fn deref_mut(&mut self) -> &mut ContextStack {
        self.stack
    }
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        self.stack.pop_to(self.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_nested_frames() {
        let mut ctx = ContextStack::new(2);
        ctx.push(ContextFrame::implies("x > 0"));
        ctx.push(ContextFrame::assignment("y", "1"));
        assert_eq!(
            ctx.render("y > 0"),
            "(x > 0) =>\n  (let y = 1 in\n    (y > 0))"
        );
    }

    #[test]
    fn test_render_empty_stack_is_bare_predicate() {
        let ctx = ContextStack::new(2);
        assert_eq!(ctx.render("x <> 0"), "x <> 0");
    }

    #[test]
    fn test_simultaneous_assignment() {
        let mut ctx = ContextStack::new(2);
        ctx.push(ContextFrame::Assignment {
            targets: vec!["x".into(), "y".into()],
            values: vec!["y".into(), "x".into()],
        });
        assert_eq!(
            ctx.render("x < y"),
            "(let mk_(x, y) = mk_(y, x) in\n  (x < y))"
        );
    }

    #[test]
    fn test_forall_with_predicate() {
        let mut ctx = ContextStack::new(1);
        ctx.push(ContextFrame::forall_such_that("e in set S", "e > 1"));
        ctx.push(ContextFrame::not_implies("e = 2"));
        assert_eq!(
            ctx.render("e <> 0"),
            "(forall e in set S & (e > 1) =>\n not (e = 2) =>\n  (e <> 0))"
        );
    }

    #[test]
    fn test_marker_renders_nothing() {
        let mut ctx = ContextStack::new(2);
        ctx.push(ContextFrame::AmbiguousMarker {
            names: vec!["x".into()],
            reason: "operation call".into(),
            span: Span::dummy(),
        });
        assert_eq!(ctx.render("x > 0"), "x > 0");
        assert!(ctx.is_marked_ambiguous("x"));
        assert!(!ctx.is_marked_ambiguous("y"));
    }

    #[test]
    fn test_scope_restores_size() {
        let mut ctx = ContextStack::new(2);
        ctx.push(ContextFrame::implies("a"));
        {
            let mut scope = ctx.scoped(ContextFrame::implies("b"));
            scope.push(ContextFrame::implies("c"));
            assert_eq!(scope.size(), 3);
        }
        assert_eq!(ctx.size(), 1);
    }

    #[test]
    fn test_remove_shifts_frames() {
        let mut ctx = ContextStack::new(2);
        let first = ctx.push_at(ContextFrame::assignment("x", "1"));
        ctx.push(ContextFrame::assignment("y", "2"));
        assert_eq!(ctx.remove(first), Some(ContextFrame::assignment("x", "1")));
        assert_eq!(ctx.render("y > 0"), "(let y = 2 in\n  (y > 0))");
        assert_eq!(ctx.remove(7), None);
    }
}
