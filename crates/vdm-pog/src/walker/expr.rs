//! Expression rules

use super::{push_match, single_match, Walker};
use crate::context::{ContextFrame, ContextStack};
use crate::obligation::ObligationKind;
use crate::state::PogState;
use vdm_core::ast::{BinaryOp, Bind, Expr, ExprKind, MultipleBind, UnaryOp};
use vdm_core::pretty::{
    pretty_bind, pretty_binds, pretty_expr, pretty_local_defs, pretty_operand, pretty_type,
};
use vdm_core::types::Type;

const COMPATIBLE: &str =
    "forall d3 in set dom m1, d4 in set dom m2 & d3 = d4 => m1(d3) = m2(d4)";

impl Walker<'_> {
    /// Emit the obligations of `expr` and all its sub-expressions
    pub(crate) fn expr_obligations(
        &mut self,
        ctx: &mut ContextStack,
        state: &PogState,
        expr: &Expr,
    ) {
        match &expr.kind {
            ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Real(_)
            | ExprKind::Char(_)
            | ExprKind::Text(_)
            | ExprKind::Quote(_)
            | ExprKind::Nil
            | ExprKind::Var(_)
            | ExprKind::Old(_) => {}

            ExprKind::Unary(op, operand) => {
                self.expr_obligations(ctx, state, operand);
                self.unary_obligation(ctx, state, expr, *op, operand);
            }

            ExprKind::Binary(BinaryOp::And, l, r) => {
                self.expr_obligations(ctx, state, l);
                let mut scope = ctx.scoped(ContextFrame::implies(pretty_expr(l)));
                self.expr_obligations(&mut scope, state, r);
            }
            ExprKind::Binary(BinaryOp::Or, l, r) => {
                self.expr_obligations(ctx, state, l);
                let mut scope = ctx.scoped(ContextFrame::not_implies(pretty_expr(l)));
                self.expr_obligations(&mut scope, state, r);
            }
            ExprKind::Binary(BinaryOp::Implies, l, r) => {
                self.expr_obligations(ctx, state, l);
                let mut scope = ctx.scoped(ContextFrame::implies(pretty_expr(l)));
                self.expr_obligations(&mut scope, state, r);
            }
            ExprKind::Binary(op, l, r) => {
                self.expr_obligations(ctx, state, l);
                self.expr_obligations(ctx, state, r);
                self.binary_obligation(ctx, state, expr, *op, l, r);
            }

            ExprKind::Apply { root, args } => {
                self.expr_obligations(ctx, state, root);
                for arg in args {
                    self.expr_obligations(ctx, state, arg);
                }
                self.apply_obligation(ctx, state, expr, root, args);
            }

            // Only reached when the call could not be lifted out
            ExprKind::OpCall { name, args } => {
                for arg in args {
                    self.expr_obligations(ctx, state, arg);
                }
                self.call_conditions(ctx, state, name, args, expr.span);
            }

            ExprKind::If {
                cond,
                then,
                elseifs,
                else_,
            } => {
                self.expr_obligations(ctx, state, cond);
                let mut scope = ctx.scope();
                {
                    let mut branch = scope.scoped(ContextFrame::implies(pretty_expr(cond)));
                    self.expr_obligations(&mut branch, state, then);
                }
                scope.push(ContextFrame::not_implies(pretty_expr(cond)));
                for elseif in elseifs {
                    self.expr_obligations(&mut scope, state, &elseif.cond);
                    {
                        let mut branch =
                            scope.scoped(ContextFrame::implies(pretty_expr(&elseif.cond)));
                        self.expr_obligations(&mut branch, state, &elseif.then);
                    }
                    scope.push(ContextFrame::not_implies(pretty_expr(&elseif.cond)));
                }
                self.expr_obligations(&mut scope, state, else_);
            }

            ExprKind::Cases {
                subject,
                alts,
                others,
            } => {
                self.expr_obligations(ctx, state, subject);
                let exhaustive = others.is_some() || alts.iter().any(|a| a.pattern.is_simple());
                if !exhaustive {
                    let predicate = alts
                        .iter()
                        .map(|a| format!("({})", single_match(&a.pattern, subject)))
                        .collect::<Vec<_>>()
                        .join(" or ");
                    self.emit(
                        ctx,
                        state,
                        ObligationKind::CasesExhaustive,
                        &predicate,
                        subject.free_vars(),
                        expr.span,
                    );
                }
                let mut scope = ctx.scope();
                for alt in alts {
                    {
                        let mut branch = scope.scope();
                        push_match(&mut branch, std::slice::from_ref(&alt.pattern), subject);
                        self.expr_obligations(&mut branch, state, &alt.body);
                    }
                    scope.push(ContextFrame::not_implies(single_match(&alt.pattern, subject)));
                }
                if let Some(others) = others {
                    self.expr_obligations(&mut scope, state, others);
                }
            }

            ExprKind::Let { defs, body } => {
                for def in defs {
                    self.expr_obligations(ctx, state, &def.value);
                    if let Some(ty) = &def.ty {
                        self.subtype(ctx, state, &def.value, ty);
                    }
                }
                let mut scope = ctx.scoped(ContextFrame::LetDef(pretty_local_defs(defs)));
                self.expr_obligations(&mut scope, state, body);
            }

            ExprKind::LetBeSt {
                bind,
                suchthat,
                body,
            } => {
                let bind: &MultipleBind = bind;
                let binds = pretty_binds(std::slice::from_ref(bind));
                let st = suchthat
                    .as_ref()
                    .map(|e| pretty_expr(e))
                    .unwrap_or_else(|| "true".to_string());
                self.emit(
                    ctx,
                    state,
                    ObligationKind::LetBeExists,
                    &format!("exists {} & {}", binds, st),
                    expr.free_vars(),
                    expr.span,
                );
                self.multiple_bind_domains(ctx, state, std::slice::from_ref(bind));
                if let Some(suchthat) = suchthat {
                    let mut scope = ctx.scoped(ContextFrame::forall(binds.clone()));
                    self.expr_obligations(&mut scope, state, suchthat);
                }
                let frame = match suchthat {
                    Some(_) => ContextFrame::forall_such_that(binds, st),
                    None => ContextFrame::forall(binds),
                };
                let mut scope = ctx.scoped(frame);
                self.expr_obligations(&mut scope, state, body);
            }

            ExprKind::Forall { binds, pred } | ExprKind::Exists { binds, pred } => {
                self.multiple_bind_domains(ctx, state, binds);
                let mut scope = ctx.scoped(ContextFrame::forall(pretty_binds(binds)));
                self.expr_obligations(&mut scope, state, pred);
            }
            ExprKind::Exists1 { bind, pred } => {
                self.bind_domain(ctx, state, bind);
                let mut scope = ctx.scoped(ContextFrame::forall(pretty_bind(bind)));
                self.expr_obligations(&mut scope, state, pred);
            }
            ExprKind::Iota { bind, pred } => {
                self.bind_domain(ctx, state, bind);
                self.emit(
                    ctx,
                    state,
                    ObligationKind::UniqueExistence,
                    &format!("exists1 {} & {}", pretty_bind(bind), pretty_expr(pred)),
                    expr.free_vars(),
                    expr.span,
                );
                let mut scope = ctx.scoped(ContextFrame::forall(pretty_bind(bind)));
                self.expr_obligations(&mut scope, state, pred);
            }

            ExprKind::SetEnum(items) | ExprKind::SeqEnum(items) | ExprKind::Tuple(items) => {
                for item in items {
                    self.expr_obligations(ctx, state, item);
                }
            }
            ExprKind::SetRange(lo, hi) => {
                self.expr_obligations(ctx, state, lo);
                self.expr_obligations(ctx, state, hi);
            }
            ExprKind::SetComp { first, binds, pred } => {
                self.comprehension(ctx, state, binds, pred.as_deref(), |w, scope| {
                    w.expr_obligations(scope, state, first);
                });
                if has_type_bind(binds) {
                    let predicate = finiteness(
                        &pretty_type(&first.ty),
                        binds,
                        pred.as_deref(),
                        &pretty_expr(first),
                    );
                    self.emit(
                        ctx,
                        state,
                        ObligationKind::FiniteSet,
                        &predicate,
                        expr.free_vars(),
                        expr.span,
                    );
                }
            }
            ExprKind::SeqComp { first, bind, pred } => {
                self.bind_domain(ctx, state, bind);
                let binds = pretty_bind(bind);
                if let Some(pred) = pred {
                    let mut scope = ctx.scoped(ContextFrame::forall(binds.clone()));
                    self.expr_obligations(&mut scope, state, pred);
                }
                let frame = match pred {
                    Some(p) => ContextFrame::forall_such_that(binds, pretty_expr(p)),
                    None => ContextFrame::forall(binds),
                };
                let mut scope = ctx.scoped(frame);
                self.expr_obligations(&mut scope, state, first);
            }
            ExprKind::SubSeq { seq, from, to } => {
                self.expr_obligations(ctx, state, seq);
                self.expr_obligations(ctx, state, from);
                self.expr_obligations(ctx, state, to);
            }
            ExprKind::MapEnum(maplets) => {
                for m in maplets {
                    self.expr_obligations(ctx, state, &m.key);
                    self.expr_obligations(ctx, state, &m.value);
                }
                let trivial = self.options.skip_trivial && distinct_literal_keys(expr);
                if maplets.len() > 1 && !trivial {
                    let singles = maplets
                        .iter()
                        .map(|m| {
                            format!("{{{} |-> {}}}", pretty_expr(&m.key), pretty_expr(&m.value))
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    self.emit(
                        ctx,
                        state,
                        ObligationKind::MapCompatible,
                        &format!("forall m1, m2 in set {{{}}} & {}", singles, COMPATIBLE),
                        expr.free_vars(),
                        expr.span,
                    );
                }
            }
            ExprKind::MapComp { first, binds, pred } => {
                self.comprehension(ctx, state, binds, pred.as_deref(), |w, scope| {
                    w.expr_obligations(scope, state, &first.key);
                    w.expr_obligations(scope, state, &first.value);
                });
                let maplet = format!(
                    "{{{} |-> {}}}",
                    pretty_expr(&first.key),
                    pretty_expr(&first.value)
                );
                let filter = pred
                    .as_ref()
                    .map(|p| format!(" & {}", pretty_expr(p)))
                    .unwrap_or_default();
                self.emit(
                    ctx,
                    state,
                    ObligationKind::MapCompatible,
                    &format!(
                        "forall m1, m2 in set {{{} | {}{}}} & {}",
                        maplet,
                        pretty_binds(binds),
                        filter,
                        COMPATIBLE
                    ),
                    expr.free_vars(),
                    expr.span,
                );
                if has_type_bind(binds) {
                    let predicate =
                        finiteness(&pretty_type(&expr.ty), binds, pred.as_deref(), &maplet);
                    self.emit(
                        ctx,
                        state,
                        ObligationKind::FiniteMap,
                        &predicate,
                        expr.free_vars(),
                        expr.span,
                    );
                }
            }

            ExprKind::TupleSelect(e, _) | ExprKind::FieldSelect(e, _) | ExprKind::IsType(e, _) => {
                self.expr_obligations(ctx, state, e);
            }
            ExprKind::MkRecord { args, .. } => {
                for arg in args {
                    self.expr_obligations(ctx, state, arg);
                }
                if let Some(fields) = expr.ty.record_fields() {
                    for (arg, field) in args.iter().zip(fields) {
                        self.subtype(ctx, state, arg, &field.ty);
                    }
                }
                self.type_invariant(ctx, state, expr, &expr.ty);
            }
            ExprKind::Mu { record, mods } => {
                self.expr_obligations(ctx, state, record);
                for (_, value) in mods {
                    self.expr_obligations(ctx, state, value);
                }
                if let Some(fields) = record.ty.record_fields() {
                    for (name, value) in mods {
                        if let Some(field) = fields.iter().find(|f| &f.name == name) {
                            self.subtype(ctx, state, value, &field.ty);
                        }
                    }
                }
                self.type_invariant(ctx, state, expr, &record.ty);
            }
            ExprKind::PreApply { func, args } => {
                self.expr_obligations(ctx, state, func);
                for arg in args {
                    self.expr_obligations(ctx, state, arg);
                }
            }
        }
    }

    fn unary_obligation(
        &mut self,
        ctx: &ContextStack,
        state: &PogState,
        expr: &Expr,
        op: UnaryOp,
        operand: &Expr,
    ) {
        let (kind, predicate) = match op {
            UnaryOp::Hd | UnaryOp::Tl => (
                ObligationKind::NonEmptySeq,
                format!("{} <> []", pretty_operand(operand)),
            ),
            UnaryOp::Dinter => (
                ObligationKind::NonEmptySet,
                format!("{} <> {{}}", pretty_operand(operand)),
            ),
            UnaryOp::Merge => (
                ObligationKind::MapSetOfCompatible,
                format!(
                    "forall m1, m2 in set {} & {}",
                    pretty_operand(operand),
                    COMPATIBLE
                ),
            ),
            _ => return,
        };
        self.emit(ctx, state, kind, &predicate, expr.free_vars(), expr.span);
    }

    fn binary_obligation(
        &mut self,
        ctx: &ContextStack,
        state: &PogState,
        expr: &Expr,
        op: BinaryOp,
        l: &Expr,
        r: &Expr,
    ) {
        let (ls, rs) = (pretty_operand(l), pretty_operand(r));
        let (kind, predicate) = match op {
            BinaryOp::Div | BinaryOp::IntDiv | BinaryOp::Rem | BinaryOp::Mod => {
                if self.options.skip_trivial && is_nonzero_literal(r) {
                    return;
                }
                (ObligationKind::NonZero, format!("{} <> 0", rs))
            }
            BinaryOp::Munion => (
                ObligationKind::MapCompatible,
                format!(
                    "forall ldom1 in set dom {}, rdom2 in set dom {} & \
                     ldom1 = rdom2 => {}(ldom1) = {}(rdom2)",
                    ls, rs, ls, rs
                ),
            ),
            BinaryOp::Override if l.ty.is_seq() => (
                ObligationKind::SeqModification,
                format!("dom {} subset inds {}", rs, ls),
            ),
            BinaryOp::Comp if l.ty.is_map() => (
                ObligationKind::MapCompose,
                format!("rng {} subset dom {}", rs, ls),
            ),
            BinaryOp::Comp if l.ty.is_function() => {
                let Some(outer) = self.function_with_pre(l) else {
                    return;
                };
                let arg_ty = first_param(&r.ty);
                let predicate = match self.function_with_pre(r) {
                    Some(inner) => format!(
                        "forall arg:{} & pre_{}(arg) => pre_{}({}(arg))",
                        arg_ty, inner, outer, rs
                    ),
                    None => format!("forall arg:{} & pre_{}({}(arg))", arg_ty, outer, rs),
                };
                (ObligationKind::FunctionCompose, predicate)
            }
            BinaryOp::StarStar if l.ty.is_map() => (
                ObligationKind::MapIteration,
                format!("{} > 1 => rng {} subset dom {}", rs, ls, ls),
            ),
            BinaryOp::StarStar if l.ty.is_function() => {
                let Some(name) = self.function_with_pre(l) else {
                    return;
                };
                (
                    ObligationKind::FunctionIteration,
                    format!(
                        "{} > 1 => forall arg:{} & pre_{}(arg) => pre_{}({}(arg))",
                        rs,
                        first_param(&l.ty),
                        name,
                        name,
                        ls
                    ),
                )
            }
            _ => return,
        };
        self.emit(ctx, state, kind, &predicate, expr.free_vars(), expr.span);
    }

    fn apply_obligation(
        &mut self,
        ctx: &ContextStack,
        state: &PogState,
        expr: &Expr,
        root: &Expr,
        args: &[Expr],
    ) {
        let root_text = pretty_operand(root);
        match root.ty.resolved() {
            Type::Map { .. } => {
                if let Some(key) = args.first() {
                    self.emit(
                        ctx,
                        state,
                        ObligationKind::MapApply,
                        &format!("{} in set dom {}", pretty_expr(key), root_text),
                        expr.free_vars(),
                        expr.span,
                    );
                }
            }
            Type::Seq(_) | Type::Seq1(_) => {
                if let Some(index) = args.first() {
                    self.emit(
                        ctx,
                        state,
                        ObligationKind::SeqApply,
                        &format!("{} in set inds {}", pretty_expr(index), root_text),
                        expr.free_vars(),
                        expr.span,
                    );
                }
            }
            Type::Function { params, .. } => {
                for (arg, ty) in args.iter().zip(params) {
                    self.subtype(ctx, state, arg, ty);
                }
                if let Some(name) = self.function_with_pre(root) {
                    let args = args.iter().map(pretty_expr).collect::<Vec<_>>().join(", ");
                    self.emit(
                        ctx,
                        state,
                        ObligationKind::FunctionApply,
                        &format!("pre_{}({})", name, args),
                        expr.free_vars(),
                        expr.span,
                    );
                }
            }
            _ => {}
        }
    }

    /// `inv_T(e)` when `ty` carries an invariant
    fn type_invariant(&mut self, ctx: &ContextStack, state: &PogState, expr: &Expr, ty: &Type) {
        if let Some(inv) = ty.invariant_name() {
            self.emit(
                ctx,
                state,
                ObligationKind::TypeInvariant,
                &format!("{}({})", inv, pretty_expr(expr)),
                expr.free_vars(),
                expr.span,
            );
        }
    }

    /// Name of the function `expr` denotes, if it has a precondition
    fn function_with_pre(&self, expr: &Expr) -> Option<String> {
        match &expr.kind {
            ExprKind::Var(name) => self
                .env
                .function(name)
                .filter(|f| f.has_pre)
                .map(|_| name.clone()),
            _ => None,
        }
    }

    fn bind_domain(&mut self, ctx: &mut ContextStack, state: &PogState, bind: &Bind) {
        if let Some(domain) = bind.domain() {
            self.expr_obligations(ctx, state, domain);
        }
    }

    fn multiple_bind_domains(
        &mut self,
        ctx: &mut ContextStack,
        state: &PogState,
        binds: &[MultipleBind],
    ) {
        for bind in binds {
            if let Some(domain) = bind.domain() {
                self.expr_obligations(ctx, state, domain);
            }
        }
    }

    /// Walk a set or map comprehension: domains, filter, then the element
    fn comprehension(
        &mut self,
        ctx: &mut ContextStack,
        state: &PogState,
        binds: &[MultipleBind],
        pred: Option<&Expr>,
        element: impl FnOnce(&mut Self, &mut ContextStack),
    ) {
        self.multiple_bind_domains(ctx, state, binds);
        let text = pretty_binds(binds);
        if let Some(pred) = pred {
            let mut scope = ctx.scoped(ContextFrame::forall(text.clone()));
            self.expr_obligations(&mut scope, state, pred);
        }
        let frame = match pred {
            Some(p) => ContextFrame::forall_such_that(text, pretty_expr(p)),
            None => ContextFrame::forall(text),
        };
        let mut scope = ctx.scoped(frame);
        element(self, &mut *scope);
    }
}

fn has_type_bind(binds: &[MultipleBind]) -> bool {
    binds.iter().any(|b| matches!(b, MultipleBind::Type { .. }))
}

/// A comprehension over type binds must still be finite
fn finiteness(
    element_ty: &str,
    binds: &[MultipleBind],
    pred: Option<&Expr>,
    element: &str,
) -> String {
    let guard = pred
        .map(|p| format!("{} => ", pretty_operand(p)))
        .unwrap_or_default();
    format!(
        "exists finmap1:map nat to ({}) & forall {} & \
         {}(exists findex2 in set dom finmap1 & finmap1(findex2) = {})",
        element_ty,
        pretty_binds(binds),
        guard,
        element
    )
}

fn first_param(ty: &Type) -> String {
    match ty.resolved() {
        Type::Function { params, .. } => params
            .first()
            .map(pretty_type)
            .unwrap_or_else(|| "?".to_string()),
        _ => "?".to_string(),
    }
}

fn is_nonzero_literal(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Int(n) => n.sign() != num_bigint::Sign::NoSign,
        ExprKind::Real(r) => r.parse::<f64>().map(|v| v != 0.0).unwrap_or(false),
        _ => false,
    }
}

/// Are all keys of a map enumeration distinct literals?
fn distinct_literal_keys(expr: &Expr) -> bool {
    let ExprKind::MapEnum(maplets) = &expr.kind else {
        return false;
    };
    let mut seen = std::collections::BTreeSet::new();
    maplets.iter().all(|m| {
        matches!(
            m.key.kind,
            ExprKind::Int(_)
                | ExprKind::Char(_)
                | ExprKind::Quote(_)
                | ExprKind::Text(_)
                | ExprKind::Bool(_)
        ) && seen.insert(pretty_expr(&m.key))
    })
}
