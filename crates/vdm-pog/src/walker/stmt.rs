//! Statement rules
//!
//! Effect frames (assignments, extracted call results, ambiguity markers)
//! stay on the stack for the statements that follow. Assumption frames
//! (branch conditions, loop bindings) are scoped to the construct that
//! pushed them. Every construct that can take more than one path walks each
//! path on its own copy of the state and joins the copies afterwards.

use super::designator::{designator_reads, update_value};
use super::{match_condition, push_match, Walker};
use crate::context::{ContextFrame, ContextStack};
use crate::error::{PogError, PogResult};
use crate::obligation::{ObligationKind, UncheckedReason};
use crate::state::PogState;
use tracing::warn;
use vdm_core::ast::{
    Assignment, CaseStmtAlt, ElseIfStmt, Expr, LocalDecl, LocalDef, MultipleBind, Pattern,
    PatternBind, SpecificationStmt, Stmt, StmtKind, TixeHandler,
};
use vdm_core::pretty::{
    pretty_bind, pretty_binds, pretty_expr, pretty_local_defs, pretty_operand, pretty_pattern,
};
use vdm_core::span::Span;
use vdm_core::types::Type;

impl Walker<'_> {
    pub(super) fn walk_stmt(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        stmt: &Stmt,
    ) -> PogResult<()> {
        match &stmt.kind {
            StmtKind::Assign(assignment) => self.assign(ctx, state, assignment),
            StmtKind::Atomic(assignments) => self.atomic(ctx, state, assignments, stmt.span),
            StmtKind::Block { dcls, stmts } => self.block(ctx, state, dcls, stmts),
            StmtKind::Call { name, args } => self.call(ctx, state, name, args, stmt.span),
            StmtKind::CallObject { object, name, args } => {
                self.designator_obligations(ctx, state, object);
                for arg in args {
                    self.prepare_expr(ctx, state, arg)?;
                }
                let reason = format!("call to {}.{}", object, name);
                self.apply_footprint(ctx, state, None, stmt.span, reason);
                Ok(())
            }
            StmtKind::Cases {
                subject,
                alts,
                others,
            } => self.cases(ctx, state, subject, alts, others.as_deref(), stmt.span),
            StmtKind::ForAllSet { pattern, set, body } => {
                let set = self.prepare_expr(ctx, state, set)?;
                let binding = format!(
                    "{} in set {}",
                    pretty_pattern(pattern),
                    pretty_operand(&set.expr)
                );
                self.walk_loop(ctx, state, ContextFrame::forall(binding), pattern.idents(), body)
            }
            StmtKind::ForIndex {
                var,
                from,
                to,
                by,
                body,
            } => {
                let from = self.prepare_expr(ctx, state, from)?;
                let to = self.prepare_expr(ctx, state, to)?;
                if let Some(by) = by {
                    self.prepare_expr(ctx, state, by)?;
                }
                let binding = format!(
                    "{} in set {{{}, ..., {}}}",
                    var,
                    pretty_expr(&from.expr),
                    pretty_expr(&to.expr)
                );
                self.walk_loop(ctx, state, ContextFrame::forall(binding), vec![var.clone()], body)
            }
            StmtKind::ForPattern { bind, seq, body, .. } => {
                let seq = self.prepare_expr(ctx, state, seq)?;
                let pattern = match bind {
                    PatternBind::Pattern(p) => p,
                    PatternBind::Bind(b) => b.pattern(),
                };
                let binding = format!(
                    "{} in set elems {}",
                    pretty_pattern(pattern),
                    pretty_operand(&seq.expr)
                );
                self.walk_loop(ctx, state, ContextFrame::forall(binding), pattern.idents(), body)
            }
            StmtKind::If {
                cond,
                then,
                elseifs,
                else_,
            } => self.if_stmt(ctx, state, cond, then, elseifs, else_.as_deref(), stmt.span),
            StmtKind::LetBeSt {
                bind,
                suchthat,
                body,
            } => self.let_be(ctx, state, bind, suchthat.as_ref(), body, stmt.span),
            StmtKind::LetDef { defs, body } => self.let_def(ctx, state, defs, body),
            StmtKind::NonDet(alternatives) => self.non_det(ctx, state, alternatives, stmt.span),
            StmtKind::Return(value) => {
                let Some(value) = value else {
                    return Ok(());
                };
                let value = self.prepare_expr(ctx, state, value)?;
                if let Some(result) = self.result_type.clone() {
                    if result != Type::Void {
                        self.subtype(ctx, state, &value.expr, &result);
                    }
                }
                Ok(())
            }
            StmtKind::Specification(spec) => self.specification(ctx, state, spec),
            StmtKind::Sporadic { args, .. } | StmtKind::Periodic { args, .. } => {
                for arg in args {
                    self.prepare_expr(ctx, state, arg)?;
                }
                Ok(())
            }
            StmtKind::Cycles { cycles: e, body } | StmtKind::Duration { duration: e, body } => {
                self.prepare_expr(ctx, state, e)?;
                self.walk_stmt(ctx, state, body)
            }
            StmtKind::Stop(e) | StmtKind::Exit(Some(e)) => {
                self.prepare_expr(ctx, state, e)?;
                Ok(())
            }
            StmtKind::Tixe { handlers, body } => {
                let handlers: Vec<_> = handlers
                    .iter()
                    .map(|TixeHandler { bind, body }| (Some(bind), body))
                    .collect();
                self.guarded(ctx, state, body, handlers, true, stmt.span)
            }
            StmtKind::Trap {
                bind,
                handler,
                body,
            } => self.guarded(ctx, state, body, vec![(Some(bind), &**handler)], true, stmt.span),
            StmtKind::Always { always, body } => {
                self.guarded(ctx, state, body, vec![(None, &**always)], false, stmt.span)
            }
            StmtKind::While { cond, body } => {
                let cond = self.prepare(ctx, state, cond, true)?;
                let text = pretty_expr(&cond.expr);
                self.emit(
                    ctx,
                    state,
                    ObligationKind::WhileLoopTermination,
                    &format!("while ({}) do ...", text),
                    cond.expr.free_vars(),
                    stmt.span,
                );
                self.walk_loop(ctx, state, ContextFrame::implies(text), Vec::new(), body)
            }
            StmtKind::Exit(None) | StmtKind::Error | StmtKind::Skip => Ok(()),
        }
    }

    /// Error unless `name` can be the target of an assignment
    fn check_target(&self, name: &str, state: &PogState, span: Span) -> PogResult<()> {
        if self.env.is_state_variable(name) || state.is_local(name) {
            Ok(())
        } else {
            Err(PogError::structural(
                format!("assignment to `{}`, which is neither state nor local", name),
                span,
            ))
        }
    }

    fn is_state_target(&self, name: &str, state: &PogState) -> bool {
        self.env.is_state_variable(name) && !state.is_local(name)
    }

    fn assign(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        assignment: &Assignment,
    ) -> PogResult<()> {
        let root = assignment.target.root();
        self.check_target(root, state, assignment.span)?;
        let value = self.prepare_expr(ctx, state, &assignment.value)?;
        self.designator_obligations(ctx, state, &assignment.target);
        self.subtype(ctx, state, &value.expr, &assignment.target_ty);

        let ambiguous = value.ambiguous
            || state.has_ambiguous_state(&value.expr.free_vars())
            || state.has_ambiguous_state(&designator_reads(&assignment.target));
        if ambiguous {
            let reason = format!("{} is assigned an unknown value", root);
            self.mark_ambiguous(ctx, state, vec![root.to_string()], assignment.span, reason);
        } else {
            let new_value = update_value(&assignment.target, &pretty_expr(&value.expr), root);
            ctx.push(ContextFrame::assignment(root, new_value));
            state.did_update_state(root, assignment.span, false);
        }

        if self.is_state_target(root, state) {
            self.state_invariant(ctx, state, assignment.span);
        }
        Ok(())
    }

    /// All right-hand sides are evaluated first, then bound simultaneously
    fn atomic(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        assignments: &[Assignment],
        span: Span,
    ) -> PogResult<()> {
        let mut values = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            self.check_target(assignment.target.root(), state, assignment.span)?;
            let value = self.prepare_expr(ctx, state, &assignment.value)?;
            self.designator_obligations(ctx, state, &assignment.target);
            self.subtype(ctx, state, &value.expr, &assignment.target_ty);
            values.push(value);
        }

        let mut targets: Vec<String> = Vec::new();
        let mut new_values: Vec<String> = Vec::new();
        let mut unknown: Vec<String> = Vec::new();
        for (assignment, value) in assignments.iter().zip(&values) {
            let root = assignment.target.root();
            let ambiguous = value.ambiguous
                || state.has_ambiguous_state(&value.expr.free_vars())
                || state.has_ambiguous_state(&designator_reads(&assignment.target));
            if ambiguous {
                if !unknown.iter().any(|n| n == root) {
                    unknown.push(root.to_string());
                }
                continue;
            }
            let text = pretty_expr(&value.expr);
            match targets.iter().position(|t| t == root) {
                Some(i) => new_values[i] = update_value(&assignment.target, &text, &new_values[i]),
                None => {
                    targets.push(root.to_string());
                    new_values.push(update_value(&assignment.target, &text, root));
                }
            }
        }
        while let Some(i) = targets.iter().position(|t| unknown.contains(t)) {
            targets.remove(i);
            new_values.remove(i);
        }

        if !targets.is_empty() {
            for target in &targets {
                state.did_update_state(target, span, false);
            }
            ctx.push(ContextFrame::Assignment {
                targets,
                values: new_values,
            });
        }
        self.mark_ambiguous(
            ctx,
            state,
            unknown,
            span,
            "assigned an unknown value in atomic".to_string(),
        );

        if assignments
            .iter()
            .any(|a| self.is_state_target(a.target.root(), state))
        {
            self.state_invariant(ctx, state, span);
        }
        Ok(())
    }

    /// Run `f` in a child scope declaring `locals`
    fn in_scope<T>(
        &mut self,
        state: &mut PogState,
        locals: impl IntoIterator<Item = String>,
        f: impl FnOnce(&mut Self, &mut PogState) -> PogResult<T>,
    ) -> PogResult<T> {
        let mut inner = std::mem::take(state).link();
        for local in locals {
            inner.declare_local(local);
        }
        let result = f(self, &mut inner);
        *state = inner.unlink();
        result
    }

    fn block(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        dcls: &[LocalDecl],
        stmts: &[Stmt],
    ) -> PogResult<()> {
        let locals = dcls.iter().map(|d| d.name.clone());
        self.in_scope(state, locals, |w, inner| {
            // Local -> index of the frame binding its current value
            let mut bound: Vec<(String, usize)> = Vec::new();
            for dcl in dcls {
                let Some(init) = &dcl.init else {
                    continue;
                };
                let value = w.prepare_expr(ctx, inner, init)?;
                w.subtype(ctx, inner, &value.expr, &dcl.ty);
                if value.ambiguous || inner.has_ambiguous_state(&value.expr.free_vars()) {
                    let reason = format!("{} is initialised to an unknown value", dcl.name);
                    w.mark_ambiguous(ctx, inner, vec![dcl.name.clone()], dcl.span, reason);
                } else {
                    let index = ctx.push_at(ContextFrame::assignment(
                        dcl.name.as_str(),
                        pretty_expr(&value.expr),
                    ));
                    inner.did_update_state(&dcl.name, dcl.span, false);
                    bound.push((dcl.name.clone(), index));
                }
            }

            for stmt in stmts {
                w.walk_stmt(ctx, inner, stmt)?;
                let mut i = 0;
                while i < bound.len() {
                    if inner.is_ambiguous(&bound[i].0) {
                        let (_, index) = bound.remove(i);
                        ctx.remove(index);
                        for (_, other) in bound.iter_mut() {
                            if *other > index {
                                *other -= 1;
                            }
                        }
                    } else {
                        i += 1;
                    }
                }
            }
            Ok(())
        })
    }

    fn call(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        name: &str,
        args: &[Expr],
        span: Span,
    ) -> PogResult<()> {
        self.check_callable(name, span)?;
        let mut lifted = Vec::with_capacity(args.len());
        for arg in args {
            lifted.push(self.prepare_expr(ctx, state, arg)?.expr);
        }
        let callee = self.call_obligations(ctx, state, name, &lifted, span)?;
        self.apply_footprint(ctx, state, callee, span, format!("call to {}", name));
        Ok(())
    }

    /// Walk `stmt` on a copy of `base`, under `frame` if given
    fn walk_branch(
        &mut self,
        ctx: &mut ContextStack,
        base: &PogState,
        frame: Option<ContextFrame>,
        stmt: &Stmt,
    ) -> PogResult<PogState> {
        let mut scope = ctx.scope();
        if let Some(frame) = frame {
            scope.push(frame);
        }
        let mut branch = base.clone();
        self.walk_stmt(&mut scope, &mut branch, stmt)?;
        Ok(branch)
    }

    /// Merge branch states into `state`, marking what became ambiguous
    fn join(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        branches: Vec<PogState>,
        span: Span,
    ) {
        if branches.is_empty() {
            return;
        }
        let before = state.ambiguous_names();
        *state = PogState::combine(branches);
        let names: Vec<String> = state
            .ambiguous_names()
            .difference(&before)
            .cloned()
            .collect();
        if !names.is_empty() {
            ctx.push(ContextFrame::AmbiguousMarker {
                names,
                reason: "updated differently on different paths".to_string(),
                span,
            });
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn if_stmt(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        cond: &Expr,
        then: &Stmt,
        elseifs: &[ElseIfStmt],
        else_: Option<&Stmt>,
        span: Span,
    ) -> PogResult<()> {
        let cond = self.prepare_expr(ctx, state, cond)?.expr;
        let mut base = state.clone();
        let mut branches = Vec::new();
        let mut guards = vec![cond];
        {
            let mut scope = ctx.scope();
            let frame = ContextFrame::implies(pretty_expr(&guards[0]));
            let (branch, mut emitted) =
                self.collect(|w| w.walk_branch(&mut scope, &base, Some(frame), then))?;
            emitted.mark_if_ambiguous(&base, &guards[0]);
            self.add(emitted);
            branches.push(branch);
            scope.push(ContextFrame::not_implies(pretty_expr(&guards[0])));

            for elseif in elseifs {
                let cond = self.prepare(&mut scope, &mut base, &elseif.cond, true)?.expr;
                let frame = ContextFrame::implies(pretty_expr(&cond));
                let (branch, mut emitted) = self
                    .collect(|w| w.walk_branch(&mut scope, &base, Some(frame), &elseif.then))?;
                scope.push(ContextFrame::not_implies(pretty_expr(&cond)));
                guards.push(cond);
                for guard in &guards {
                    emitted.mark_if_ambiguous(&base, guard);
                }
                self.add(emitted);
                branches.push(branch);
            }

            match else_ {
                Some(else_) => {
                    let (branch, mut emitted) =
                        self.collect(|w| w.walk_branch(&mut scope, &base, None, else_))?;
                    for guard in &guards {
                        emitted.mark_if_ambiguous(&base, guard);
                    }
                    self.add(emitted);
                    branches.push(branch);
                }
                None => branches.push(base),
            }
        }
        self.join(ctx, state, branches, span);
        Ok(())
    }

    fn cases(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        subject: &Expr,
        alts: &[CaseStmtAlt],
        others: Option<&Stmt>,
        span: Span,
    ) -> PogResult<()> {
        let subject = self.prepare_expr(ctx, state, subject)?.expr;
        let mut branches = Vec::new();
        {
            let mut scope = ctx.scope();
            for alt in alts {
                let mut branch = scope.scope();
                push_match(&mut branch, &alt.patterns, &subject);
                branches.push(self.walk_branch(&mut branch, state, None, &alt.body)?);
                drop(branch);
                scope.push(ContextFrame::not_implies(match_condition(
                    &alt.patterns,
                    &subject,
                )));
            }
            let covered = alts
                .iter()
                .any(|a| a.patterns.iter().any(Pattern::is_simple));
            match others {
                Some(others) => {
                    branches.push(self.walk_branch(&mut scope, state, None, others)?)
                }
                None if covered => {}
                None => branches.push(state.clone()),
            }
        }
        self.join(ctx, state, branches, span);
        Ok(())
    }

    /// Walk a loop body on a copy of the state and join it back
    ///
    /// Obligations from a body that updates state are stamped, since the
    /// body's frames only describe its first iteration.
    fn walk_loop(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        frame: ContextFrame,
        locals: Vec<String>,
        body: &Stmt,
    ) -> PogResult<()> {
        let updates = self.updates_state(body);
        let mut inner = state.clone().link();
        for local in locals {
            inner.declare_local(local);
        }
        let ((), mut emitted) = self.collect(|w| {
            let mut scope = ctx.scoped(frame);
            w.walk_stmt(&mut scope, &mut inner, body)
        })?;
        if updates {
            emitted.mark_unchecked(UncheckedReason::LoopStatement);
        }
        self.add(emitted);
        let branches = vec![state.clone(), inner.unlink()];
        self.join(ctx, state, branches, body.span);
        Ok(())
    }

    fn let_def(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        defs: &[LocalDef],
        body: &Stmt,
    ) -> PogResult<()> {
        let mut prepared = Vec::with_capacity(defs.len());
        for def in defs {
            let value = self.prepare_expr(ctx, state, &def.value)?;
            if let Some(ty) = &def.ty {
                self.subtype(ctx, state, &value.expr, ty);
            }
            prepared.push(LocalDef {
                pattern: def.pattern.clone(),
                ty: def.ty.clone(),
                value: value.expr,
            });
        }
        ctx.push(ContextFrame::LetDef(pretty_local_defs(&prepared)));
        let locals: Vec<String> = defs.iter().flat_map(|d| d.pattern.idents()).collect();
        self.in_scope(state, locals, |w, inner| w.walk_stmt(ctx, inner, body))
    }

    fn let_be(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        bind: &MultipleBind,
        suchthat: Option<&Expr>,
        body: &Stmt,
        span: Span,
    ) -> PogResult<()> {
        let extraction = match bind.domain() {
            Some(domain) => Some(self.extract(ctx, state, domain, false)?),
            None => None,
        };
        let bind = match &extraction {
            Some(extraction) => with_domain(bind, extraction.expr.clone()),
            None => bind.clone(),
        };
        let binds = pretty_binds(std::slice::from_ref(&bind));
        let st = suchthat.map(pretty_expr);
        let mut reads = bind.domain().map(Expr::free_vars).unwrap_or_default();
        if let Some(suchthat) = suchthat {
            reads.extend(suchthat.free_vars());
        }
        self.emit(
            ctx,
            state,
            ObligationKind::LetBeExists,
            &format!("exists {} & {}", binds, st.as_deref().unwrap_or("true")),
            reads,
            span,
        );
        if let Some(extraction) = &extraction {
            self.extracted_obligations(ctx, state, extraction)?;
        }
        if let Some(suchthat) = suchthat {
            let mut scope = ctx.scoped(ContextFrame::forall(binds.as_str()));
            self.expr_obligations(&mut scope, state, suchthat);
        }
        ctx.push(match st {
            Some(st) => ContextFrame::forall_such_that(binds, st),
            None => ContextFrame::forall(binds),
        });
        self.in_scope(state, bind.idents(), |w, inner| w.walk_stmt(ctx, inner, body))
    }

    fn non_det(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        alternatives: &[Stmt],
        span: Span,
    ) -> PogResult<()> {
        let mut branches = Vec::with_capacity(alternatives.len());
        let mut updating = 0;
        for alternative in alternatives {
            let updates = self.updates_state(alternative);
            let (branch, mut emitted) =
                self.collect(|w| w.walk_branch(ctx, state, None, alternative))?;
            if updates {
                emitted.mark_unchecked(UncheckedReason::NonDeterministic);
                updating += 1;
            }
            self.add(emitted);
            branches.push(branch);
        }
        if updating > 0 && alternatives.len() > 1 {
            warn!(
                definition = %self.definition,
                at = %span,
                updating,
                "non-deterministic statement updates state; some orders may be unreachable"
            );
        }
        self.join(ctx, state, branches, span);
        Ok(())
    }

    fn specification(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        spec: &SpecificationStmt,
    ) -> PogResult<()> {
        let mut scope = ctx.scope();
        if let Some(pre) = &spec.pre {
            self.expr_obligations(&mut scope, state, pre);
            scope.push(ContextFrame::implies(pretty_expr(pre)));
        }
        self.expr_obligations(&mut scope, state, &spec.post);
        for err in &spec.errs {
            self.expr_obligations(&mut scope, state, &err.lhs);
            let mut inner = scope.scoped(ContextFrame::implies(pretty_expr(&err.lhs)));
            self.expr_obligations(&mut inner, state, &err.rhs);
        }
        Ok(())
    }

    /// Body of a trap, tixe or always, then its handlers
    ///
    /// A handler may start from any point of the body, so it runs on the join
    /// of the entry and exit states. Afterwards no state has a known value.
    fn guarded(
        &mut self,
        ctx: &mut ContextStack,
        state: &mut PogState,
        body: &Stmt,
        handlers: Vec<(Option<&PatternBind>, &Stmt)>,
        unsupported: bool,
        span: Span,
    ) -> PogResult<()> {
        let after_body = self.walk_branch(ctx, state, None, body)?;
        let entry = PogState::combine([state.clone(), after_body.clone()]);
        let mut branches = vec![after_body];

        for (bind, handler) in handlers {
            let (branch, mut emitted) = self.collect(|w| {
                let mut scope = ctx.scope();
                let mut handler_state = entry.clone();
                match bind {
                    Some(PatternBind::Bind(bind)) => {
                        if let Some(domain) = bind.domain() {
                            w.expr_obligations(&mut scope, &handler_state, domain);
                        }
                        scope.push(ContextFrame::forall(pretty_bind(bind)));
                    }
                    Some(PatternBind::Pattern(pattern)) if !pattern.is_simple() => {
                        scope.push(ContextFrame::implies(format!(
                            "exists {} & true",
                            pretty_pattern(pattern)
                        )));
                    }
                    _ => {}
                }
                w.walk_stmt(&mut scope, &mut handler_state, handler)?;
                Ok(handler_state)
            })?;
            if unsupported {
                emitted.mark_unchecked(UncheckedReason::NotYetSupported);
            }
            self.add(emitted);
            branches.push(branch);
        }

        self.join(ctx, state, branches, span);
        let names = self.env.state_names();
        self.mark_ambiguous(
            ctx,
            state,
            names,
            span,
            "exception handling".to_string(),
        );
        Ok(())
    }
}

/// `bind` ranging over `domain` instead of its own set or sequence
fn with_domain(bind: &MultipleBind, domain: Expr) -> MultipleBind {
    match bind {
        MultipleBind::Set { patterns, .. } => MultipleBind::Set {
            patterns: patterns.clone(),
            set: domain,
        },
        MultipleBind::Seq { patterns, .. } => MultipleBind::Seq {
            patterns: patterns.clone(),
            seq: domain,
        },
        MultipleBind::Type { .. } => bind.clone(),
    }
}
