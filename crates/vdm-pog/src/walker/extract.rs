//! Operation-call extraction
//!
//! An operation call embedded in an expression is evaluated before the
//! expression itself. Where the evaluation order is defined, the call is
//! lifted out: its obligations are emitted, its result is bound to a fresh
//! placeholder `$Op1` under a `forall`, and its footprint is applied to the
//! path state. Where the order is not defined (a quantifier body, the right
//! operand of `and`, an `if` branch, ...) nothing is lifted and the caller is
//! told the value is ambiguous.

use super::Walker;
use crate::context::{ContextFrame, ContextStack};
use crate::error::PogResult;
use crate::obligation::{ObligationList, UncheckedReason};
use crate::state::PogState;
use tracing::warn;
use vdm_core::ast::{BinaryOp, Expr, ExprKind};
use vdm_core::pretty::pretty_type;
use vdm_core::span::Span;
use vdm_core::visit::{for_each_child, walk_expr};

/// An expression with its liftable operation calls replaced by placeholders
pub(crate) struct Extraction {
    pub expr: Expr,
    /// Calls could not be lifted; the value of `expr` is not known
    pub ambiguous: bool,
}

impl Walker<'_> {
    /// Lift the operation calls out of `expr`
    ///
    /// `conditional` is set for expressions that are themselves evaluated a
    /// data-dependent number of times, such as `while` conditions.
    pub(super) fn extract(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        expr: &Expr,
        conditional: bool,
    ) -> PogResult<Extraction> {
        if !expr.contains_op_call() {
            return Ok(Extraction {
                expr: expr.clone(),
                ambiguous: false,
            });
        }

        if conditional || has_unliftable_call(expr) {
            warn!(
                definition = %self.definition,
                at = %expr.span,
                "operation call in a position with undefined evaluation order"
            );
            let mut calls: Vec<(String, Span)> = Vec::new();
            walk_expr(expr, &mut |e| {
                if let ExprKind::OpCall { name, .. } = &e.kind {
                    calls.push((name.clone(), e.span));
                }
            });
            let env = self.env;
            for (name, span) in calls {
                self.check_callable(&name, span)?;
                self.apply_footprint(
                    ctx,
                    state,
                    env.operation(&name),
                    span,
                    format!("call to {} cannot be ordered", name),
                );
            }
            return Ok(Extraction {
                expr: expr.clone(),
                ambiguous: true,
            });
        }

        let mut lifted = expr.clone();
        self.lift(ctx, state, &mut lifted)?;
        Ok(Extraction {
            expr: lifted,
            ambiguous: false,
        })
    }

    fn lift(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        expr: &mut Expr,
    ) -> PogResult<()> {
        if !expr.contains_op_call() {
            return Ok(());
        }
        for child in liftable_children(expr) {
            self.lift(ctx, state, child)?;
        }

        let span = expr.span;
        let ExprKind::OpCall { name, args } = &expr.kind else {
            return Ok(());
        };
        for arg in args {
            self.expr_obligations(ctx, state, arg);
        }
        let callee = self.call_obligations(ctx, state, name, args, span)?;
        let placeholder = self.placeholder(name);
        ctx.push(ContextFrame::forall(format!(
            "{}:{}",
            placeholder,
            pretty_type(&expr.ty)
        )));
        let reason = format!("call to {}", name);
        self.apply_footprint(ctx, state, callee, span, reason);
        expr.kind = ExprKind::Var(placeholder);
        Ok(())
    }

    /// Extract, then emit the obligations of the resulting expression
    ///
    /// Obligations of an expression whose calls could not be lifted are
    /// stamped as reading ambiguous state.
    pub(super) fn prepare(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        expr: &Expr,
        conditional: bool,
    ) -> PogResult<Extraction> {
        let extraction = self.extract(ctx, state, expr, conditional)?;
        self.extracted_obligations(ctx, state, &extraction)?;
        Ok(extraction)
    }

    /// Emit the obligations of an already extracted expression
    pub(super) fn extracted_obligations(
        &mut self,
        ctx: &mut ContextStack,
        state: &PogState,
        extraction: &Extraction,
    ) -> PogResult<()> {
        let ((), mut emitted) = self.collect(|w| {
            w.expr_obligations(ctx, state, &extraction.expr);
            Ok(())
        })?;
        if extraction.ambiguous {
            emitted.mark_unchecked(UncheckedReason::HasAmbiguousState);
        }
        self.add(emitted);
        Ok(())
    }

    pub(super) fn prepare_expr(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        expr: &Expr,
    ) -> PogResult<Extraction> {
        self.prepare(ctx, state, expr, false)
    }

    pub(super) fn add(&mut self, list: ObligationList) {
        self.obligations.add_all(list);
    }
}

/// Sub-expressions evaluated unconditionally, before their parent
fn liftable_children(expr: &mut Expr) -> Vec<&mut Expr> {
    let mut out: Vec<&mut Expr> = Vec::new();
    match &mut expr.kind {
        ExprKind::Unary(_, e)
        | ExprKind::TupleSelect(e, _)
        | ExprKind::FieldSelect(e, _)
        | ExprKind::IsType(e, _) => out.push(e),
        ExprKind::Binary(BinaryOp::And | BinaryOp::Or | BinaryOp::Implies, l, _) => out.push(l),
        ExprKind::Binary(_, l, r) | ExprKind::SetRange(l, r) => {
            out.push(l);
            out.push(r);
        }
        ExprKind::Apply { root, args } | ExprKind::PreApply { func: root, args } => {
            out.push(root);
            out.extend(args.iter_mut());
        }
        ExprKind::OpCall { args, .. }
        | ExprKind::MkRecord { args, .. }
        | ExprKind::SetEnum(args)
        | ExprKind::SeqEnum(args)
        | ExprKind::Tuple(args) => out.extend(args.iter_mut()),
        ExprKind::If { cond, .. } => out.push(cond),
        ExprKind::Cases { subject, .. } => out.push(subject),
        ExprKind::Let { defs, .. } => {
            if let Some(first) = defs.first_mut() {
                out.push(&mut first.value);
            }
        }
        ExprKind::SubSeq { seq, from, to } => {
            out.push(seq);
            out.push(from);
            out.push(to);
        }
        ExprKind::MapEnum(maplets) => {
            for m in maplets.iter_mut() {
                out.push(&mut m.key);
                out.push(&mut m.value);
            }
        }
        ExprKind::Mu { record, mods } => {
            out.push(record);
            out.extend(mods.iter_mut().map(|(_, v)| v));
        }
        _ => {}
    }
    out
}

/// Read-only counterpart of [`liftable_children`]
fn liftable_refs(expr: &Expr) -> Vec<&Expr> {
    let mut out: Vec<&Expr> = Vec::new();
    match &expr.kind {
        ExprKind::Unary(_, e)
        | ExprKind::TupleSelect(e, _)
        | ExprKind::FieldSelect(e, _)
        | ExprKind::IsType(e, _) => out.push(e),
        ExprKind::Binary(BinaryOp::And | BinaryOp::Or | BinaryOp::Implies, l, _) => out.push(l),
        ExprKind::Binary(_, l, r) | ExprKind::SetRange(l, r) => {
            out.push(l);
            out.push(r);
        }
        ExprKind::Apply { root, args } | ExprKind::PreApply { func: root, args } => {
            out.push(root);
            out.extend(args);
        }
        ExprKind::OpCall { args, .. }
        | ExprKind::MkRecord { args, .. }
        | ExprKind::SetEnum(args)
        | ExprKind::SeqEnum(args)
        | ExprKind::Tuple(args) => out.extend(args),
        ExprKind::If { cond, .. } => out.push(cond),
        ExprKind::Cases { subject, .. } => out.push(subject),
        ExprKind::Let { defs, .. } => out.extend(defs.first().map(|d| &d.value)),
        ExprKind::SubSeq { seq, from, to } => {
            out.push(seq);
            out.push(from);
            out.push(to);
        }
        ExprKind::MapEnum(maplets) => {
            for m in maplets {
                out.push(&m.key);
                out.push(&m.value);
            }
        }
        ExprKind::Mu { record, mods } => {
            out.push(record);
            out.extend(mods.iter().map(|(_, v)| v));
        }
        _ => {}
    }
    out
}

/// Does `expr` embed a call that [`liftable_children`] cannot reach?
fn has_unliftable_call(expr: &Expr) -> bool {
    let liftable = liftable_refs(expr);
    let mut found = false;
    for_each_child(expr, &mut |child| {
        if found {
            return;
        }
        found = if liftable.iter().any(|c| std::ptr::eq(*c, child)) {
            has_unliftable_call(child)
        } else {
            child.contains_op_call()
        };
    });
    found
}
