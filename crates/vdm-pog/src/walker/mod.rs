//! Obligation walker
//!
//! A depth-first walk over one definition at a time, threading a
//! [`ContextStack`] and a [`PogState`] by `&mut`. The rules live in
//! submodules, split by the kind of node they handle:
//!
//! - `stmt`: statements, forking and joining path states at branches
//! - `designator`: assignment targets and the values they produce
//! - `expr`: partial operators, quantifiers and other expression rules
//! - `extract`: lifting operation calls out of expressions
//! - `defs`: definitions (functions, operations, values, types, state)

mod defs;
mod designator;
mod expr;
mod extract;
mod stmt;

use crate::config::PogOptions;
use crate::context::{ContextFrame, ContextStack};
use crate::error::{PogError, PogResult};
use crate::obligation::{ObligationKind, ObligationList, ProofObligation, UncheckedReason};
use crate::state::PogState;
use std::collections::{BTreeMap, BTreeSet};
use vdm_core::ast::{Expr, ExprKind, Pattern, Stmt, StmtKind};
use vdm_core::env::{Environment, Footprint, OperationInfo, SymbolKind};
use vdm_core::pretty::{pretty_expr, pretty_operand, pretty_pattern, pretty_type};
use vdm_core::span::Span;
use vdm_core::types::{is_subtype, Type};
use vdm_core::visit::walk_stmt;

/// Generates the obligations of a module's definitions
pub struct Walker<'a> {
    env: &'a Environment,
    options: &'a PogOptions,
    /// Name of the definition being walked
    definition: String,
    /// Result type of the operation being walked, for `return`
    result_type: Option<Type>,
    /// Next placeholder number per extracted operation
    placeholders: BTreeMap<String, usize>,
    obligations: ObligationList,
}

impl<'a> Walker<'a> {
    pub fn new(env: &'a Environment, options: &'a PogOptions) -> Self {
        Self {
            env,
            options,
            definition: String::new(),
            result_type: None,
            placeholders: BTreeMap::new(),
            obligations: ObligationList::new(),
        }
    }

    /// Obligations emitted so far, in traversal order
    pub fn finish(self) -> ObligationList {
        self.obligations
    }

    fn new_context(&self) -> ContextStack {
        ContextStack::new(self.options.indent)
    }

    /// Create an obligation for `predicate` rendered under `ctx`
    fn make(
        &self,
        ctx: &ContextStack,
        kind: ObligationKind,
        predicate: &str,
        reads: BTreeSet<String>,
        span: Span,
    ) -> ProofObligation {
        ProofObligation::new(
            kind,
            self.definition.clone(),
            self.env.module_name(),
            self.env.file(),
            span,
            ctx.render(predicate),
        )
        .with_free_names(reads)
    }

    /// Stamp `po` if it reads ambiguous state, then append it
    fn push(&mut self, state: &PogState, mut po: ProofObligation) {
        if state.has_ambiguous_state(&po.free_names) {
            if state.opaque_call().is_some() {
                po.mark_unchecked(UncheckedReason::OpaqueOperationCall);
            } else {
                po.mark_unchecked(UncheckedReason::HasAmbiguousState);
            }
        }
        self.obligations.push(po);
    }

    fn emit(
        &mut self,
        ctx: &ContextStack,
        state: &PogState,
        kind: ObligationKind,
        predicate: &str,
        reads: BTreeSet<String>,
        span: Span,
    ) {
        let po = self.make(ctx, kind, predicate, reads, span);
        self.push(state, po);
    }

    /// Run `f` with a fresh obligation list and return what it emitted
    fn collect<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> PogResult<T>,
    ) -> PogResult<(T, ObligationList)> {
        let outer = std::mem::take(&mut self.obligations);
        let result = f(self);
        let inner = std::mem::replace(&mut self.obligations, outer);
        result.map(|value| (value, inner))
    }

    /// Subtype obligation unless `expr` provably fits `expected`
    fn subtype(&mut self, ctx: &ContextStack, state: &PogState, expr: &Expr, expected: &Type) {
        if is_subtype(&expr.ty, expected) {
            return;
        }
        if self.options.skip_trivial && literal_fits(expr, expected) {
            return;
        }
        let predicate = format!("is_({}, {})", pretty_expr(expr), pretty_type(expected));
        self.emit(
            ctx,
            state,
            ObligationKind::Subtype,
            &predicate,
            expr.free_vars(),
            expr.span,
        );
    }

    /// State invariant obligation after an update of the state
    fn state_invariant(&mut self, ctx: &ContextStack, state: &PogState, span: Span) {
        let Some(info) = self.env.state() else {
            return;
        };
        let Some(inv) = &info.inv else {
            return;
        };
        let fields = info.field_names();
        let identity = match &inv.pattern {
            Pattern::Record { fields: pats, .. } => {
                pats.len() == fields.len()
                    && pats
                        .iter()
                        .zip(&fields)
                        .all(|(p, f)| matches!(p, Pattern::Ident(n) if n == f))
            }
            _ => false,
        };
        let mut reads = inv.body.free_vars();
        let predicate = if identity {
            pretty_expr(&inv.body)
        } else {
            reads.extend(fields.iter().cloned());
            format!(
                "let {} = mk_{}({}) in {}",
                pretty_pattern(&inv.pattern),
                info.name,
                fields.join(", "),
                pretty_expr(&inv.body)
            )
        };
        self.emit(
            ctx,
            state,
            ObligationKind::StateInvariant,
            &predicate,
            reads,
            span,
        );
    }

    /// Error if `name` resolves to something other than an operation
    fn check_callable(&self, name: &str, span: Span) -> PogResult<()> {
        match self.env.lookup(name) {
            Some(sym) if sym.kind != SymbolKind::Operation => Err(PogError::structural(
                format!("call to `{}`, which is not an operation", name),
                span,
            )),
            _ => Ok(()),
        }
    }

    /// Argument, subtype and precondition obligations of a call to `name`
    fn call_obligations(
        &mut self,
        ctx: &ContextStack,
        state: &PogState,
        name: &str,
        args: &[Expr],
        span: Span,
    ) -> PogResult<Option<&'a OperationInfo>> {
        self.check_callable(name, span)?;
        let op = self.env.operation(name);
        self.call_conditions(ctx, state, name, args, span);
        Ok(op)
    }

    /// Subtype and precondition obligations of a call to a known operation
    fn call_conditions(
        &mut self,
        ctx: &ContextStack,
        state: &PogState,
        name: &str,
        args: &[Expr],
        span: Span,
    ) {
        let env = self.env;
        let Some(op) = env.operation(name) else {
            return;
        };
        for (arg, ty) in args.iter().zip(&op.param_types) {
            self.subtype(ctx, state, arg, ty);
        }
        if op.has_pre {
            let predicate = format!(
                "pre_{}({})",
                name,
                args.iter().map(pretty_expr).collect::<Vec<_>>().join(", ")
            );
            let reads = args.iter().flat_map(Expr::free_vars).collect();
            let mut po = self.make(ctx, ObligationKind::OperationCall, &predicate, reads, span);
            if state.has_updated_state() {
                po.mark_unchecked(UncheckedReason::HasUpdatedState);
            }
            self.push(state, po);
        }
    }

    /// Apply a callee's footprint: the state it may write becomes ambiguous
    fn apply_footprint(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        callee: Option<&OperationInfo>,
        span: Span,
        reason: String,
    ) {
        let names: Vec<String> = match callee.map(|op| &op.footprint) {
            Some(Footprint::Names(names)) => names.iter().cloned().collect(),
            Some(Footprint::All) | None => {
                state.did_update_all_state(span);
                self.env.state_names()
            }
        };
        self.mark_ambiguous(ctx, state, names, span, reason);
    }

    /// Mark `names` ambiguous and record a marker frame for them
    fn mark_ambiguous(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        names: Vec<String>,
        span: Span,
        reason: String,
    ) {
        for name in &names {
            state.did_update_state(name, span, true);
        }
        if !names.is_empty() {
            ctx.push(ContextFrame::AmbiguousMarker {
                names,
                reason,
                span,
            });
        }
    }

    /// Placeholder variable for the `n`th extracted call of `op`
    fn placeholder(&mut self, op: &str) -> String {
        let n = self.placeholders.entry(op.to_string()).or_insert(0);
        *n += 1;
        format!("${}{}", op.replace('`', "_"), n)
    }

    /// Can executing `stmt` change variables that outlive it?
    fn updates_state(&self, stmt: &Stmt) -> bool {
        if !stmt.assigned_names().is_empty() {
            return true;
        }
        let mut called = Vec::new();
        let mut embedded = Vec::new();
        let mut object_call = false;
        walk_stmt(
            stmt,
            &mut |s| match &s.kind {
                StmtKind::Call { name, .. } => called.push(name.clone()),
                StmtKind::CallObject { .. } => object_call = true,
                _ => {}
            },
            &mut |e| {
                if let ExprKind::OpCall { name, .. } = &e.kind {
                    embedded.push(name.clone());
                }
            },
        );
        object_call
            || called
                .iter()
                .chain(&embedded)
                .any(|name| match self.env.operation(name) {
                    Some(op) => !op.footprint.is_empty(),
                    None => true,
                })
    }
}

/// Is `expr` a literal that obviously belongs to `expected`?
fn literal_fits(expr: &Expr, expected: &Type) -> bool {
    use num_bigint::Sign;
    match (&expr.kind, expected.resolved()) {
        (ExprKind::Int(n), Type::Nat1) => n.sign() == Sign::Plus,
        (ExprKind::Int(n), Type::Nat) => n.sign() != Sign::Minus,
        (ExprKind::Int(_), Type::Int | Type::Rat | Type::Real) => true,
        _ => false,
    }
}

/// Condition under which `subject` matches one of `patterns`
fn match_condition(patterns: &[Pattern], subject: &Expr) -> String {
    patterns
        .iter()
        .map(|p| single_match(p, subject))
        .collect::<Vec<_>>()
        .join(" or ")
}

fn single_match(pattern: &Pattern, subject: &Expr) -> String {
    if pattern.is_simple() {
        "true".to_string()
    } else if pattern.idents().is_empty() {
        format!("{} = {}", pretty_operand(subject), pretty_pattern(pattern))
    } else {
        format!(
            "exists {}:{} & {} = {}",
            pretty_pattern(pattern),
            pretty_type(&subject.ty),
            pretty_pattern(pattern),
            pretty_operand(subject)
        )
    }
}

/// Push the assumptions of entering a cases alternative
fn push_match(ctx: &mut ContextStack, patterns: &[Pattern], subject: &Expr) {
    match patterns {
        [Pattern::Ignore] => {}
        [Pattern::Ident(name)] => {
            ctx.push(ContextFrame::LetDef(format!(
                "{} = {}",
                name,
                pretty_expr(subject)
            )));
        }
        [pattern] if !pattern.idents().is_empty() => {
            ctx.push(ContextFrame::implies(single_match(pattern, subject)));
            ctx.push(ContextFrame::LetDef(format!(
                "{} = {}",
                pretty_pattern(pattern),
                pretty_expr(subject)
            )));
        }
        _ => ctx.push(ContextFrame::implies(match_condition(patterns, subject))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdm_core::span::FileId;

    fn var(name: &str, ty: Type) -> Expr {
        Expr::new(ExprKind::Var(name.into()), ty, Span::point(FileId(0), 1, 1))
    }

    #[test]
    fn test_match_conditions() {
        let s = var("s", Type::Nat);
        assert_eq!(
            match_condition(&[Pattern::Int(1.into()), Pattern::Int(2.into())], &s),
            "s = 1 or s = 2"
        );
        let tuple = Pattern::Tuple(vec![Pattern::Ident("a".into()), Pattern::Int(0.into())]);
        assert_eq!(
            single_match(&tuple, &s),
            "exists mk_(a, 0):nat & mk_(a, 0) = s"
        );
        assert_eq!(single_match(&Pattern::Ignore, &s), "true");
    }

    #[test]
    fn test_literal_fits() {
        let one = Expr::new(ExprKind::Int(1.into()), Type::Nat1, Span::dummy());
        let zero = Expr::new(ExprKind::Int(0.into()), Type::Nat, Span::dummy());
        assert!(literal_fits(&one, &Type::Nat1));
        assert!(!literal_fits(&zero, &Type::Nat1));
        assert!(literal_fits(&zero, &Type::Nat));
    }
}
