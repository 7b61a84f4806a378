//! Definition rules

use super::Walker;
use crate::context::{ContextFrame, ContextStack};
use crate::error::{PogError, PogResult};
use crate::obligation::{ObligationKind, UncheckedReason};
use crate::state::PogState;
use std::collections::BTreeSet;
use tracing::debug;
use vdm_core::ast::{
    Definition, ExplicitFunction, Expr, ExplicitOperation, ExtMode, ImplicitFunction,
    ImplicitOperation, Invariant, Pattern, StateDef, Stmt, TypeDef, TypedParam, ValueDef,
};
use vdm_core::pretty::{pretty_expr, pretty_pattern, pretty_type};
use vdm_core::span::{Span, Spanned};
use vdm_core::types::Type;

impl Walker<'_> {
    /// Generate the obligations of one top-level definition
    pub fn walk_definition(&mut self, def: &Spanned<Definition>) -> PogResult<()> {
        self.begin(def.node.name());
        debug!(definition = %self.definition, at = %def.span, "walking definition");

        let mut ctx = self.new_context();
        let span = def.span;
        match &def.node {
            Definition::Type(d) => self.type_def(&mut ctx, d, span),
            Definition::Value(d) => self.value_def(&mut ctx, d, span),
            Definition::ExplicitFunction(d) => self.explicit_function(&mut ctx, d, span),
            Definition::ImplicitFunction(d) => self.implicit_function(&mut ctx, d, span),
            Definition::ExplicitOperation(d) => self.explicit_operation(&mut ctx, d, span)?,
            Definition::ImplicitOperation(d) => self.implicit_operation(&mut ctx, d, span)?,
        }
        self.check_balanced(&ctx, span)
    }

    /// Obligations of the module state's invariant and initialisation
    pub fn walk_state(&mut self, def: &StateDef) -> PogResult<()> {
        self.begin(def.name.clone());
        let mut ctx = self.new_context();
        let state = PogState::new();
        let ty = Type::named(def.name.as_str(), Type::Unknown, false);
        for clause in [&def.inv, &def.init].into_iter().flatten() {
            self.invariant_clause(&mut ctx, &state, clause, &ty);
        }
        self.check_balanced(&ctx, def.span)
    }

    fn begin(&mut self, name: String) {
        self.definition = name;
        self.placeholders.clear();
        self.result_type = None;
    }

    fn check_balanced(&self, ctx: &ContextStack, span: Span) -> PogResult<()> {
        if ctx.is_empty() {
            Ok(())
        } else {
            Err(PogError::structural(
                format!(
                    "context stack not balanced after `{}` ({} frames left)",
                    self.definition,
                    ctx.size()
                ),
                span,
            ))
        }
    }

    fn invariant_clause(
        &mut self,
        ctx: &mut ContextStack,
        state: &PogState,
        clause: &Invariant,
        ty: &Type,
    ) {
        let binding = format!("{}:{}", pretty_pattern(&clause.pattern), pretty_type(ty));
        let mut scope = ctx.scoped(ContextFrame::forall(binding));
        self.expr_obligations(&mut scope, state, &clause.body);
    }

    fn type_def(&mut self, ctx: &mut ContextStack, def: &TypeDef, _span: Span) {
        if let Some(inv) = &def.inv {
            let ty = Type::named(def.name.as_str(), Type::Unknown, false);
            self.invariant_clause(ctx, &PogState::new(), inv, &ty);
        }
    }

    fn value_def(&mut self, ctx: &mut ContextStack, def: &ValueDef, span: Span) {
        let state = PogState::new();
        self.expr_obligations(ctx, &state, &def.value);
        if !def.pattern.is_simple() {
            let ty = def.ty.as_ref().unwrap_or(&def.value.ty);
            let pattern = pretty_pattern(&def.pattern);
            self.emit(
                ctx,
                &state,
                ObligationKind::ValueBinding,
                &format!(
                    "exists {}:{} & {} = {}",
                    pattern,
                    pretty_type(ty),
                    pattern,
                    pretty_expr(&def.value)
                ),
                def.value.free_vars(),
                span,
            );
        }
        if let Some(ty) = &def.ty {
            self.subtype(ctx, &state, &def.value, ty);
        }
    }

    /// `forall arg1:T1, ... & (exists p1:T1 & p1 = arg1) and ...` over
    /// parameters whose patterns might not match
    fn param_patterns(
        &mut self,
        ctx: &ContextStack,
        state: &PogState,
        params: &[(&Pattern, &Type)],
        kind: ObligationKind,
        span: Span,
    ) {
        let checked: Vec<(usize, &Pattern, &Type)> = params
            .iter()
            .enumerate()
            .filter(|(_, (p, _))| !p.is_simple())
            .map(|(i, (p, t))| (i + 1, *p, *t))
            .collect();
        if checked.is_empty() {
            return;
        }
        let binds = checked
            .iter()
            .map(|(i, _, t)| format!("arg{}:{}", i, pretty_type(t)))
            .collect::<Vec<_>>()
            .join(", ");
        let matches = checked
            .iter()
            .map(|(i, p, t)| {
                let p = pretty_pattern(p);
                format!("(exists {}:{} & {} = arg{})", p, pretty_type(t), p, i)
            })
            .collect::<Vec<_>>()
            .join(" and ");
        self.emit(
            ctx,
            state,
            kind,
            &format!("forall {} & {}", binds, matches),
            BTreeSet::new(),
            span,
        );
    }

    /// Push the parameter bindings and precondition of a definition
    fn enter_signature(
        &mut self,
        ctx: &mut ContextStack,
        state: &PogState,
        params: &[(&Pattern, &Type)],
        pre: Option<&Expr>,
    ) {
        if !params.is_empty() {
            ctx.push(ContextFrame::forall(typed_binds(params)));
        }
        if let Some(pre) = pre {
            self.expr_obligations(ctx, state, pre);
            ctx.push(ContextFrame::implies(pretty_expr(pre)));
        }
    }

    fn explicit_function(&mut self, ctx: &mut ContextStack, def: &ExplicitFunction, span: Span) {
        let state = PogState::new();
        let params: Vec<(&Pattern, &Type)> = def.params.iter().zip(&def.param_types).collect();
        self.param_patterns(ctx, &state, &params, ObligationKind::FunctionParamPatterns, span);

        let mut scope = ctx.scope();
        self.enter_signature(&mut scope, &state, &params, def.pre.as_ref());
        self.expr_obligations(&mut scope, &state, &def.body);
        self.subtype(&scope, &state, &def.body, &def.result);

        if let Some(post) = &def.post {
            {
                let result = format!("RESULT:{}", pretty_type(&def.result));
                let mut inner = scope.scoped(ContextFrame::forall(result));
                self.expr_obligations(&mut inner, &state, post);
            }
            let mut args: Vec<String> = def.params.iter().map(pretty_pattern).collect();
            args.push(pretty_expr(&def.body));
            self.emit(
                &scope,
                &state,
                ObligationKind::FunctionPostCondition,
                &format!("post_{}({})", def.name, args.join(", ")),
                def.body.free_vars(),
                span,
            );
        }
    }

    fn implicit_function(&mut self, ctx: &mut ContextStack, def: &ImplicitFunction, span: Span) {
        let state = PogState::new();
        let params = typed_params(&def.params);
        self.param_patterns(ctx, &state, &params, ObligationKind::FunctionParamPatterns, span);

        let mut scope = ctx.scope();
        self.enter_signature(&mut scope, &state, &params, def.pre.as_ref());
        let result = format!("{}:{}", def.result.name, pretty_type(&def.result.ty));
        {
            let mut inner = scope.scoped(ContextFrame::forall(result.as_str()));
            self.expr_obligations(&mut inner, &state, &def.post);
        }
        self.emit(
            &scope,
            &state,
            ObligationKind::FunctionSatisfiability,
            &format!("exists {} & {}", result, pretty_expr(&def.post)),
            BTreeSet::new(),
            span,
        );
    }

    fn explicit_operation(
        &mut self,
        ctx: &mut ContextStack,
        def: &ExplicitOperation,
        span: Span,
    ) -> PogResult<()> {
        self.result_type = Some(def.result.clone());
        let params: Vec<(&Pattern, &Type)> = def.params.iter().zip(&def.param_types).collect();
        let locals: Vec<String> = def.params.iter().flat_map(Pattern::idents).collect();
        self.param_patterns(
            ctx,
            &PogState::new(),
            &params,
            ObligationKind::OperationParamPatterns,
            span,
        );

        let mut scope = ctx.scope();
        self.enter_signature(&mut scope, &PogState::new(), &params, def.pre.as_ref());
        let result =
            (def.result != Type::Void).then(|| format!("RESULT:{}", pretty_type(&def.result)));
        self.operation_body(&mut scope, locals, &def.body, def.post.as_ref(), result, span)
    }

    fn implicit_operation(
        &mut self,
        ctx: &mut ContextStack,
        def: &ImplicitOperation,
        span: Span,
    ) -> PogResult<()> {
        self.result_type = def.result.as_ref().map(|r| r.ty.clone());
        let state = PogState::new();
        let params = typed_params(&def.params);
        self.param_patterns(ctx, &state, &params, ObligationKind::OperationParamPatterns, span);

        let mut scope = ctx.scope();
        self.enter_signature(&mut scope, &state, &params, def.pre.as_ref());

        let mut binds: Vec<String> = def
            .result
            .iter()
            .map(|r| format!("{}:{}", r.name, pretty_type(&r.ty)))
            .collect();
        for ext in def.externals.iter().filter(|e| e.mode == ExtMode::Wr) {
            for name in &ext.names {
                let ty = ext
                    .ty
                    .as_ref()
                    .or_else(|| self.env.state_variable_type(name))
                    .map(pretty_type)
                    .unwrap_or_else(|| "?".to_string());
                binds.push(format!("{}:{}", name, ty));
            }
        }

        if let Some(post) = &def.post {
            {
                let mut inner = scope.scope();
                if !binds.is_empty() {
                    inner.push(ContextFrame::forall(binds.join(", ")));
                }
                self.expr_obligations(&mut inner, &state, post);
            }
            let predicate = if binds.is_empty() {
                pretty_expr(post)
            } else {
                format!("exists {} & {}", binds.join(", "), pretty_expr(post))
            };
            self.emit(
                &scope,
                &state,
                ObligationKind::OperationSatisfiability,
                &predicate,
                BTreeSet::new(),
                span,
            );
        }

        for err in &def.errs {
            self.expr_obligations(&mut scope, &state, &err.lhs);
            let mut inner = scope.scoped(ContextFrame::implies(pretty_expr(&err.lhs)));
            self.expr_obligations(&mut inner, &state, &err.rhs);
        }

        let Some(body) = &def.body else {
            return Ok(());
        };
        let locals: Vec<String> = def.params.iter().flat_map(|p| p.pattern.idents()).collect();
        let result = def
            .result
            .as_ref()
            .map(|r| format!("{}:{}", r.name, pretty_type(&r.ty)));
        self.operation_body(&mut scope, locals, body, None, result, span)
    }

    /// Walk an operation body from a fresh state, then its postcondition
    fn operation_body(
        &mut self,
        ctx: &mut ContextStack,
        params: Vec<String>,
        body: &Stmt,
        post: Option<&Expr>,
        result: Option<String>,
        span: Span,
    ) -> PogResult<()> {
        let mut state = PogState::new();
        for param in params {
            state.declare_local(param);
        }
        let size = ctx.size();
        self.walk_stmt(ctx, &mut state, body)?;
        ctx.pop_to(size);

        let Some(post) = post else {
            return Ok(());
        };
        let mut scope = ctx.scope();
        if let Some(result) = result {
            scope.push(ContextFrame::forall(result));
        }
        let fresh = PogState::new();
        let ((), mut emitted) = self.collect(|w| {
            w.expr_obligations(&mut scope, &fresh, post);
            Ok(())
        })?;
        emitted.mark_if_updated(&state, post);
        self.add(emitted);
        let mut po = self.make(
            &scope,
            ObligationKind::OperationPostCondition,
            &pretty_expr(post),
            post.free_vars(),
            span,
        );
        if state.has_updated_state() {
            po.mark_unchecked(UncheckedReason::HasUpdatedState);
        }
        self.push(&state, po);
        Ok(())
    }
}

/// `p1:T1, p2:T2`
fn typed_binds(params: &[(&Pattern, &Type)]) -> String {
    params
        .iter()
        .map(|(p, t)| format!("{}:{}", pretty_pattern(p), pretty_type(t)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn typed_params(params: &[TypedParam]) -> Vec<(&Pattern, &Type)> {
    params.iter().map(|p| (&p.pattern, &p.ty)).collect()
}
