//! Read-only queries over the typed tree
//!
//! - Free variables of expressions (respecting binders)
//! - Names bound by patterns
//! - Embedded operation calls
//! - Variables assigned by statements, and whether statements call operations

use crate::ast::*;
use std::collections::BTreeSet;

impl Pattern {
    /// Identifiers bound by this pattern, in order of appearance
    pub fn idents(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_pattern_idents(self, &mut out);
        out
    }

    /// Is this a plain identifier (or don't-care) pattern that always matches?
    pub fn is_simple(&self) -> bool {
        matches!(self, Pattern::Ident(_) | Pattern::Ignore)
    }
}

fn collect_pattern_idents(pattern: &Pattern, out: &mut Vec<String>) {
    match pattern {
        Pattern::Ident(name) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Pattern::Ignore
        | Pattern::Bool(_)
        | Pattern::Int(_)
        | Pattern::Real(_)
        | Pattern::Char(_)
        | Pattern::Text(_)
        | Pattern::Quote(_)
        | Pattern::Nil
        | Pattern::Expr(_) => {}
        Pattern::Tuple(items) | Pattern::Set(items) | Pattern::Seq(items) => {
            for p in items {
                collect_pattern_idents(p, out);
            }
        }
        Pattern::Record { fields, .. } => {
            for p in fields {
                collect_pattern_idents(p, out);
            }
        }
        Pattern::Union(l, r) | Pattern::Concat(l, r) => {
            collect_pattern_idents(l, out);
            collect_pattern_idents(r, out);
        }
    }
}

impl Bind {
    pub fn pattern(&self) -> &Pattern {
        match self {
            Bind::Set { pattern, .. } | Bind::Type { pattern, .. } | Bind::Seq { pattern, .. } => {
                pattern
            }
        }
    }
}

impl MultipleBind {
    pub fn patterns(&self) -> &[Pattern] {
        match self {
            MultipleBind::Set { patterns, .. }
            | MultipleBind::Type { patterns, .. }
            | MultipleBind::Seq { patterns, .. } => patterns,
        }
    }

    /// The set or sequence expression ranged over, if any
    pub fn domain(&self) -> Option<&Expr> {
        match self {
            MultipleBind::Set { set, .. } => Some(set),
            MultipleBind::Seq { seq, .. } => Some(seq),
            MultipleBind::Type { .. } => None,
        }
    }

    pub fn idents(&self) -> Vec<String> {
        let mut out = Vec::new();
        for p in self.patterns() {
            collect_pattern_idents(p, &mut out);
        }
        out
    }
}

impl Bind {
    /// The set or sequence expression ranged over, if any
    pub fn domain(&self) -> Option<&Expr> {
        match self {
            Bind::Set { set, .. } => Some(set),
            Bind::Seq { seq, .. } => Some(seq),
            Bind::Type { .. } => None,
        }
    }
}

impl Expr {
    /// Variables occurring free in this expression
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        free_vars(self, &BTreeSet::new(), &mut out);
        out
    }

    /// Does this expression embed an operation call anywhere?
    pub fn contains_op_call(&self) -> bool {
        let mut found = false;
        walk_expr(self, &mut |e| {
            if matches!(e.kind, ExprKind::OpCall { .. }) {
                found = true;
            }
        });
        found
    }
}

/// Visit every sub-expression (pre-order), including those inside patterns
/// and binds
pub fn walk_expr(expr: &Expr, f: &mut impl FnMut(&Expr)) {
    f(expr);
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
        ExprKind::Unary(_, e) | ExprKind::TupleSelect(e, _) | ExprKind::FieldSelect(e, _) => {
            walk_expr(e, f)
        }
        ExprKind::IsType(e, _) => walk_expr(e, f),
        ExprKind::Binary(_, l, r) | ExprKind::SetRange(l, r) => {
            walk_expr(l, f);
            walk_expr(r, f);
        }
        ExprKind::Apply { root, args } => {
            walk_expr(root, f);
            args.iter().for_each(|a| walk_expr(a, f));
        }
        ExprKind::PreApply { func, args } => {
            walk_expr(func, f);
            args.iter().for_each(|a| walk_expr(a, f));
        }
        ExprKind::OpCall { args, .. }
        | ExprKind::MkRecord { args, .. }
        | ExprKind::SetEnum(args)
        | ExprKind::SeqEnum(args)
        | ExprKind::Tuple(args) => args.iter().for_each(|a| walk_expr(a, f)),
        ExprKind::If {
            cond,
            then,
            elseifs,
            else_,
        } => {
            walk_expr(cond, f);
            walk_expr(then, f);
            for ei in elseifs {
                walk_expr(&ei.cond, f);
                walk_expr(&ei.then, f);
            }
            walk_expr(else_, f);
        }
        ExprKind::Cases {
            subject,
            alts,
            others,
        } => {
            walk_expr(subject, f);
            for alt in alts {
                walk_pattern_exprs(&alt.pattern, f);
                walk_expr(&alt.body, f);
            }
            if let Some(o) = others {
                walk_expr(o, f);
            }
        }
        ExprKind::Let { defs, body } => {
            for d in defs {
                walk_expr(&d.value, f);
            }
            walk_expr(body, f);
        }
        ExprKind::LetBeSt {
            bind,
            suchthat,
            body,
        } => {
            walk_multiple_bind(bind, f);
            if let Some(st) = suchthat {
                walk_expr(st, f);
            }
            walk_expr(body, f);
        }
        ExprKind::Forall { binds, pred } | ExprKind::Exists { binds, pred } => {
            binds.iter().for_each(|b| walk_multiple_bind(b, f));
            walk_expr(pred, f);
        }
        ExprKind::Exists1 { bind, pred } | ExprKind::Iota { bind, pred } => {
            walk_bind(bind, f);
            walk_expr(pred, f);
        }
        ExprKind::SetComp { first, binds, pred } => {
            walk_expr(first, f);
            binds.iter().for_each(|b| walk_multiple_bind(b, f));
            if let Some(p) = pred {
                walk_expr(p, f);
            }
        }
        ExprKind::SeqComp { first, bind, pred } => {
            walk_expr(first, f);
            walk_bind(bind, f);
            if let Some(p) = pred {
                walk_expr(p, f);
            }
        }
        ExprKind::SubSeq { seq, from, to } => {
            walk_expr(seq, f);
            walk_expr(from, f);
            walk_expr(to, f);
        }
        ExprKind::MapEnum(maplets) => {
            for m in maplets {
                walk_expr(&m.key, f);
                walk_expr(&m.value, f);
            }
        }
        ExprKind::MapComp { first, binds, pred } => {
            walk_expr(&first.key, f);
            walk_expr(&first.value, f);
            binds.iter().for_each(|b| walk_multiple_bind(b, f));
            if let Some(p) = pred {
                walk_expr(p, f);
            }
        }
        ExprKind::Mu { record, mods } => {
            walk_expr(record, f);
            for (_, v) in mods {
                walk_expr(v, f);
            }
        }
    }
}

fn walk_pattern_exprs(pattern: &Pattern, f: &mut impl FnMut(&Expr)) {
    match pattern {
        Pattern::Expr(e) => walk_expr(e, f),
        Pattern::Tuple(items) | Pattern::Set(items) | Pattern::Seq(items) => {
            items.iter().for_each(|p| walk_pattern_exprs(p, f))
        }
        Pattern::Record { fields, .. } => fields.iter().for_each(|p| walk_pattern_exprs(p, f)),
        Pattern::Union(l, r) | Pattern::Concat(l, r) => {
            walk_pattern_exprs(l, f);
            walk_pattern_exprs(r, f);
        }
        _ => {}
    }
}

fn walk_bind(bind: &Bind, f: &mut impl FnMut(&Expr)) {
    if let Some(d) = bind.domain() {
        walk_expr(d, f);
    }
}

fn walk_multiple_bind(bind: &MultipleBind, f: &mut impl FnMut(&Expr)) {
    if let Some(d) = bind.domain() {
        walk_expr(d, f);
    }
}

fn with_bound(
    bound: &BTreeSet<String>,
    names: impl IntoIterator<Item = String>,
) -> BTreeSet<String> {
    let mut inner = bound.clone();
    inner.extend(names);
    inner
}

fn free_vars(expr: &Expr, bound: &BTreeSet<String>, out: &mut BTreeSet<String>) {
    match &expr.kind {
        ExprKind::Var(name) => {
            if !bound.contains(name) {
                out.insert(name.clone());
            }
        }
        ExprKind::Let { defs, body } => {
            let mut inner = bound.clone();
            for d in defs {
                free_vars(&d.value, &inner, out);
                inner.extend(d.pattern.idents());
            }
            free_vars(body, &inner, out);
        }
        ExprKind::LetBeSt {
            bind,
            suchthat,
            body,
        } => {
            if let Some(d) = bind.domain() {
                free_vars(d, bound, out);
            }
            let inner = with_bound(bound, bind.idents());
            if let Some(st) = suchthat {
                free_vars(st, &inner, out);
            }
            free_vars(body, &inner, out);
        }
        ExprKind::Forall { binds, pred } | ExprKind::Exists { binds, pred } => {
            let mut inner = bound.clone();
            for b in binds {
                if let Some(d) = b.domain() {
                    free_vars(d, bound, out);
                }
                inner.extend(b.idents());
            }
            free_vars(pred, &inner, out);
        }
        ExprKind::Exists1 { bind, pred } | ExprKind::Iota { bind, pred } => {
            if let Some(d) = bind.domain() {
                free_vars(d, bound, out);
            }
            let inner = with_bound(bound, bind.pattern().idents());
            free_vars(pred, &inner, out);
        }
        ExprKind::SetComp { first, binds, pred } => {
            let mut inner = bound.clone();
            for b in binds {
                if let Some(d) = b.domain() {
                    free_vars(d, bound, out);
                }
                inner.extend(b.idents());
            }
            free_vars(first, &inner, out);
            if let Some(p) = pred {
                free_vars(p, &inner, out);
            }
        }
        ExprKind::MapComp { first, binds, pred } => {
            let mut inner = bound.clone();
            for b in binds {
                if let Some(d) = b.domain() {
                    free_vars(d, bound, out);
                }
                inner.extend(b.idents());
            }
            free_vars(&first.key, &inner, out);
            free_vars(&first.value, &inner, out);
            if let Some(p) = pred {
                free_vars(p, &inner, out);
            }
        }
        ExprKind::SeqComp { first, bind, pred } => {
            if let Some(d) = bind.domain() {
                free_vars(d, bound, out);
            }
            let inner = with_bound(bound, bind.pattern().idents());
            free_vars(first, &inner, out);
            if let Some(p) = pred {
                free_vars(p, &inner, out);
            }
        }
        ExprKind::Cases {
            subject,
            alts,
            others,
        } => {
            free_vars(subject, bound, out);
            for alt in alts {
                let inner = with_bound(bound, alt.pattern.idents());
                free_vars(&alt.body, &inner, out);
            }
            if let Some(o) = others {
                free_vars(o, bound, out);
            }
        }
        // Everything else binds nothing
        _ => for_each_child(expr, &mut |child| free_vars(child, bound, out)),
    }
}

/// Immediate sub-expressions of a node
pub fn for_each_child<'a>(expr: &'a Expr, f: &mut impl FnMut(&'a Expr)) {
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
        ExprKind::Unary(_, e)
        | ExprKind::TupleSelect(e, _)
        | ExprKind::FieldSelect(e, _)
        | ExprKind::IsType(e, _) => f(e),
        ExprKind::Binary(_, l, r) | ExprKind::SetRange(l, r) => {
            f(l);
            f(r);
        }
        ExprKind::Apply { root, args } | ExprKind::PreApply { func: root, args } => {
            f(root);
            args.iter().for_each(|a| f(a));
        }
        ExprKind::OpCall { args, .. }
        | ExprKind::MkRecord { args, .. }
        | ExprKind::SetEnum(args)
        | ExprKind::SeqEnum(args)
        | ExprKind::Tuple(args) => args.iter().for_each(|a| f(a)),
        ExprKind::If {
            cond,
            then,
            elseifs,
            else_,
        } => {
            f(cond);
            f(then);
            for ei in elseifs {
                f(&ei.cond);
                f(&ei.then);
            }
            f(else_);
        }
        ExprKind::Cases {
            subject,
            alts,
            others,
        } => {
            f(subject);
            alts.iter().for_each(|a| f(&a.body));
            if let Some(o) = others {
                f(o);
            }
        }
        ExprKind::Let { defs, body } => {
            defs.iter().for_each(|d| f(&d.value));
            f(body);
        }
        ExprKind::LetBeSt {
            bind,
            suchthat,
            body,
        } => {
            if let Some(d) = bind.domain() {
                f(d);
            }
            if let Some(st) = suchthat {
                f(st);
            }
            f(body);
        }
        ExprKind::Forall { binds, pred } | ExprKind::Exists { binds, pred } => {
            binds.iter().filter_map(|b| b.domain()).for_each(|d| f(d));
            f(pred);
        }
        ExprKind::Exists1 { bind, pred } | ExprKind::Iota { bind, pred } => {
            if let Some(d) = bind.domain() {
                f(d);
            }
            f(pred);
        }
        ExprKind::SetComp { first, binds, pred } => {
            f(first);
            binds.iter().filter_map(|b| b.domain()).for_each(|d| f(d));
            if let Some(p) = pred {
                f(p);
            }
        }
        ExprKind::SeqComp { first, bind, pred } => {
            f(first);
            if let Some(d) = bind.domain() {
                f(d);
            }
            if let Some(p) = pred {
                f(p);
            }
        }
        ExprKind::SubSeq { seq, from, to } => {
            f(seq);
            f(from);
            f(to);
        }
        ExprKind::MapEnum(maplets) => maplets.iter().for_each(|m| {
            f(&m.key);
            f(&m.value);
        }),
        ExprKind::MapComp { first, binds, pred } => {
            f(&first.key);
            f(&first.value);
            binds.iter().filter_map(|b| b.domain()).for_each(|d| f(d));
            if let Some(p) = pred {
                f(p);
            }
        }
        ExprKind::Mu { record, mods } => {
            f(record);
            mods.iter().for_each(|(_, v)| f(v));
        }
    }
}

impl Stmt {
    /// Variables assigned anywhere in this statement, excluding locals it
    /// declares itself
    pub fn assigned_names(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        collect_assigned(self, &BTreeSet::new(), &mut out);
        out
    }

    /// Does this statement call an operation (directly or from an expression)?
    pub fn calls_operations(&self) -> bool {
        let mut calls = false;
        let mut embedded = false;
        walk_stmt(
            self,
            &mut |s| {
                if matches!(s.kind, StmtKind::Call { .. } | StmtKind::CallObject { .. }) {
                    calls = true;
                }
            },
            &mut |e| {
                if matches!(e.kind, ExprKind::OpCall { .. }) {
                    embedded = true;
                }
            },
        );
        calls || embedded
    }
}

fn collect_assigned(stmt: &Stmt, locals: &BTreeSet<String>, out: &mut BTreeSet<String>) {
    match &stmt.kind {
        StmtKind::Assign(a) => {
            if !locals.contains(a.target.root()) {
                out.insert(a.target.root().to_string());
            }
        }
        StmtKind::Atomic(assigns) => {
            for a in assigns {
                if !locals.contains(a.target.root()) {
                    out.insert(a.target.root().to_string());
                }
            }
        }
        StmtKind::Block { dcls, stmts } => {
            let inner = with_bound(locals, dcls.iter().map(|d| d.name.clone()));
            for s in stmts {
                collect_assigned(s, &inner, out);
            }
        }
        StmtKind::ForIndex { var, body, .. } => {
            let inner = with_bound(locals, [var.clone()]);
            collect_assigned(body, &inner, out);
        }
        _ => for_each_child_stmt(stmt, &mut |s| collect_assigned(s, locals, out)),
    }
}

/// Immediate sub-statements of a statement
pub fn for_each_child_stmt<'a>(stmt: &'a Stmt, f: &mut impl FnMut(&'a Stmt)) {
    match &stmt.kind {
        StmtKind::Assign(_)
        | StmtKind::Atomic(_)
        | StmtKind::Call { .. }
        | StmtKind::CallObject { .. }
        | StmtKind::Return(_)
        | StmtKind::Specification(_)
        | StmtKind::Sporadic { .. }
        | StmtKind::Periodic { .. }
        | StmtKind::Stop(_)
        | StmtKind::Exit(_)
        | StmtKind::Error
        | StmtKind::Skip => {}
        StmtKind::Block { stmts, .. } | StmtKind::NonDet(stmts) => stmts.iter().for_each(|s| f(s)),
        StmtKind::Cases { alts, others, .. } => {
            alts.iter().for_each(|a| f(&a.body));
            if let Some(o) = others {
                f(o);
            }
        }
        StmtKind::ForAllSet { body, .. }
        | StmtKind::ForIndex { body, .. }
        | StmtKind::ForPattern { body, .. }
        | StmtKind::LetBeSt { body, .. }
        | StmtKind::LetDef { body, .. }
        | StmtKind::Cycles { body, .. }
        | StmtKind::Duration { body, .. }
        | StmtKind::While { body, .. } => f(body),
        StmtKind::If {
            then,
            elseifs,
            else_,
            ..
        } => {
            f(then);
            elseifs.iter().for_each(|ei| f(&ei.then));
            if let Some(e) = else_ {
                f(e);
            }
        }
        StmtKind::Tixe { handlers, body } => {
            f(body);
            handlers.iter().for_each(|h| f(&h.body));
        }
        StmtKind::Trap { handler, body, .. } => {
            f(body);
            f(handler);
        }
        StmtKind::Always { always, body } => {
            f(body);
            f(always);
        }
    }
}

/// Immediate expressions of a statement (not those of sub-statements)
pub fn for_each_stmt_expr<'a>(stmt: &'a Stmt, f: &mut impl FnMut(&'a Expr)) {
    match &stmt.kind {
        StmtKind::Assign(a) => {
            designator_exprs(&a.target, f);
            f(&a.value);
        }
        StmtKind::Atomic(assigns) => {
            for a in assigns {
                designator_exprs(&a.target, f);
                f(&a.value);
            }
        }
        StmtKind::Block { dcls, .. } => {
            dcls.iter().filter_map(|d| d.init.as_ref()).for_each(|e| f(e))
        }
        StmtKind::Call { args, .. }
        | StmtKind::Sporadic { args, .. }
        | StmtKind::Periodic { args, .. } => args.iter().for_each(|a| f(a)),
        StmtKind::CallObject { object, args, .. } => {
            designator_exprs(object, f);
            args.iter().for_each(|a| f(a));
        }
        StmtKind::Cases { subject, .. } => f(subject),
        StmtKind::ForAllSet { set, .. } => f(set),
        StmtKind::ForIndex { from, to, by, .. } => {
            f(from);
            f(to);
            if let Some(by) = by {
                f(by);
            }
        }
        StmtKind::ForPattern { seq, .. } => f(seq),
        StmtKind::If { cond, elseifs, .. } => {
            f(cond);
            elseifs.iter().for_each(|ei| f(&ei.cond));
        }
        StmtKind::LetBeSt { bind, suchthat, .. } => {
            if let Some(d) = bind.domain() {
                f(d);
            }
            if let Some(st) = suchthat {
                f(st);
            }
        }
        StmtKind::LetDef { defs, .. } => defs.iter().for_each(|d| f(&d.value)),
        StmtKind::Return(e) | StmtKind::Exit(e) => {
            if let Some(e) = e {
                f(e);
            }
        }
        StmtKind::Specification(spec) => {
            if let Some(pre) = &spec.pre {
                f(pre);
            }
            f(&spec.post);
            for err in &spec.errs {
                f(&err.lhs);
                f(&err.rhs);
            }
        }
        StmtKind::Cycles { cycles: e, .. }
        | StmtKind::Duration { duration: e, .. }
        | StmtKind::Stop(e)
        | StmtKind::While { cond: e, .. } => f(e),
        StmtKind::NonDet(_)
        | StmtKind::Tixe { .. }
        | StmtKind::Trap { .. }
        | StmtKind::Always { .. }
        | StmtKind::Error
        | StmtKind::Skip => {}
    }
}

fn designator_exprs<'a>(designator: &'a Designator, f: &mut impl FnMut(&'a Expr)) {
    match designator {
        Designator::Name(_) => {}
        Designator::Field { object, .. } => designator_exprs(object, f),
        Designator::MapSeq { object, index, .. } => {
            designator_exprs(object, f);
            f(index);
        }
    }
}

/// Visit every statement (pre-order) and every expression reachable from it
pub fn walk_stmt(stmt: &Stmt, on_stmt: &mut impl FnMut(&Stmt), on_expr: &mut impl FnMut(&Expr)) {
    on_stmt(stmt);
    for_each_stmt_expr(stmt, &mut |e| walk_expr(e, on_expr));
    for_each_child_stmt(stmt, &mut |s| walk_stmt(s, on_stmt, on_expr));
}
