//! Pretty printer for the typed tree
//!
//! Converts expressions, patterns, binds, designators and types back to VDM
//! source notation. Used for:
//! - Rendering proof obligation predicates and their contexts
//! - Error message context
//!
//! Output is single-line and deterministic: composite operands are always
//! parenthesized rather than relying on operator precedence.

use crate::ast::*;
use crate::types::Type;
use std::fmt;

/// Writer accumulating VDM source text
pub struct PrettyPrinter {
    output: String,
}

impl Default for PrettyPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl PrettyPrinter {
    pub fn new() -> Self {
        Self {
            output: String::new(),
        }
    }

    pub fn finish(self) -> String {
        self.output
    }

    fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn write_sep<T>(&mut self, items: &[T], sep: &str, mut f: impl FnMut(&mut Self, &T)) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.write(sep);
            }
            f(self, item);
        }
    }
}

/// Pretty print an expression
pub fn pretty_expr(expr: &Expr) -> String {
    let mut pp = PrettyPrinter::new();
    pp.print_expr(expr);
    pp.finish()
}

/// Pretty print an expression, parenthesized if it is compound
pub fn pretty_operand(expr: &Expr) -> String {
    let mut pp = PrettyPrinter::new();
    pp.print_operand(expr);
    pp.finish()
}

/// Pretty print a pattern
pub fn pretty_pattern(pattern: &Pattern) -> String {
    let mut pp = PrettyPrinter::new();
    pp.print_pattern(pattern);
    pp.finish()
}

/// Pretty print a type
pub fn pretty_type(ty: &Type) -> String {
    let mut pp = PrettyPrinter::new();
    pp.print_type(ty);
    pp.finish()
}

/// Pretty print a single bind
pub fn pretty_bind(bind: &Bind) -> String {
    let mut pp = PrettyPrinter::new();
    pp.print_bind(bind);
    pp.finish()
}

/// Pretty print a list of multiple binds, comma separated
pub fn pretty_binds(binds: &[MultipleBind]) -> String {
    let mut pp = PrettyPrinter::new();
    pp.write_sep(binds, ", ", |pp, b| pp.print_multiple_bind(b));
    pp.finish()
}

/// Pretty print a state designator
pub fn pretty_designator(designator: &Designator) -> String {
    let mut pp = PrettyPrinter::new();
    pp.print_designator(designator);
    pp.finish()
}

fn unary_op_str(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Not => "not ",
        UnaryOp::Minus => "-",
        UnaryOp::Plus => "+",
        UnaryOp::Abs => "abs ",
        UnaryOp::Floor => "floor ",
        UnaryOp::Card => "card ",
        UnaryOp::Power => "power ",
        UnaryOp::Dunion => "dunion ",
        UnaryOp::Dinter => "dinter ",
        UnaryOp::Len => "len ",
        UnaryOp::Hd => "hd ",
        UnaryOp::Tl => "tl ",
        UnaryOp::Elems => "elems ",
        UnaryOp::Inds => "inds ",
        UnaryOp::Reverse => "reverse ",
        UnaryOp::Conc => "conc ",
        UnaryOp::Dom => "dom ",
        UnaryOp::Rng => "rng ",
        UnaryOp::Merge => "merge ",
        UnaryOp::Inverse => "inverse ",
    }
}

/// Source text of a binary operator
pub fn binary_op_str(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        BinaryOp::Implies => "=>",
        BinaryOp::Equiv => "<=>",
        BinaryOp::Eq => "=",
        BinaryOp::Ne => "<>",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::IntDiv => "div",
        BinaryOp::Rem => "rem",
        BinaryOp::Mod => "mod",
        BinaryOp::StarStar => "**",
        BinaryOp::InSet => "in set",
        BinaryOp::NotInSet => "not in set",
        BinaryOp::Union => "union",
        BinaryOp::Inter => "inter",
        BinaryOp::Diff => "\\",
        BinaryOp::Subset => "subset",
        BinaryOp::PSubset => "psubset",
        BinaryOp::Concat => "^",
        BinaryOp::Munion => "munion",
        BinaryOp::Override => "++",
        BinaryOp::DomResTo => "<:",
        BinaryOp::DomResBy => "<-:",
        BinaryOp::RngResTo => ":>",
        BinaryOp::RngResBy => ":->",
        BinaryOp::Comp => "comp",
    }
}

/// Does this expression need parentheses when used as an operand?
fn is_compound(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Unary(..)
            | ExprKind::Binary(..)
            | ExprKind::If { .. }
            | ExprKind::Cases { .. }
            | ExprKind::Let { .. }
            | ExprKind::LetBeSt { .. }
            | ExprKind::Forall { .. }
            | ExprKind::Exists { .. }
            | ExprKind::Exists1 { .. }
            | ExprKind::Iota { .. }
    )
}

impl PrettyPrinter {
    fn print_operand(&mut self, expr: &Expr) {
        if is_compound(expr) {
            self.write("(");
            self.print_expr(expr);
            self.write(")");
        } else {
            self.print_expr(expr);
        }
    }

    fn print_args(&mut self, args: &[Expr]) {
        self.write("(");
        self.write_sep(args, ", ", |pp, a| pp.print_expr(a));
        self.write(")");
    }

    pub fn print_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Bool(b) => self.write(if *b { "true" } else { "false" }),
            ExprKind::Int(n) => self.write(&n.to_string()),
            ExprKind::Real(r) => self.write(r),
            ExprKind::Char(c) => self.write(&format!("'{}'", c)),
            ExprKind::Text(s) => self.write(&format!("{:?}", s)),
            ExprKind::Quote(q) => self.write(&format!("<{}>", q)),
            ExprKind::Nil => self.write("nil"),
            ExprKind::Var(name) => self.write(name),
            ExprKind::Old(name) => {
                self.write(name);
                self.write("~");
            }
            ExprKind::Unary(op, e) => {
                self.write(unary_op_str(*op));
                self.print_operand(e);
            }
            ExprKind::Binary(op, l, r) => {
                self.print_operand(l);
                self.write(" ");
                self.write(binary_op_str(*op));
                self.write(" ");
                self.print_operand(r);
            }
            ExprKind::Apply { root, args } => {
                self.print_operand(root);
                self.print_args(args);
            }
            ExprKind::OpCall { name, args } => {
                self.write(name);
                self.print_args(args);
            }
            ExprKind::If {
                cond,
                then,
                elseifs,
                else_,
            } => {
                self.write("if ");
                self.print_expr(cond);
                self.write(" then ");
                self.print_expr(then);
                for elseif in elseifs {
                    self.write(" elseif ");
                    self.print_expr(&elseif.cond);
                    self.write(" then ");
                    self.print_expr(&elseif.then);
                }
                self.write(" else ");
                self.print_expr(else_);
            }
            ExprKind::Cases {
                subject,
                alts,
                others,
            } => {
                self.write("cases ");
                self.print_expr(subject);
                self.write(": ");
                self.write_sep(alts, ", ", |pp, alt| {
                    pp.print_pattern(&alt.pattern);
                    pp.write(" -> ");
                    pp.print_expr(&alt.body);
                });
                if let Some(others) = others {
                    if !alts.is_empty() {
                        self.write(", ");
                    }
                    self.write("others -> ");
                    self.print_expr(others);
                }
                self.write(" end");
            }
            ExprKind::Let { defs, body } => {
                self.write("let ");
                self.print_local_defs(defs);
                self.write(" in ");
                self.print_expr(body);
            }
            ExprKind::LetBeSt {
                bind,
                suchthat,
                body,
            } => {
                self.write("let ");
                self.print_multiple_bind(bind);
                if let Some(st) = suchthat {
                    self.write(" be st ");
                    self.print_expr(st);
                }
                self.write(" in ");
                self.print_expr(body);
            }
            ExprKind::Forall { binds, pred } => {
                self.write("forall ");
                self.write_sep(binds, ", ", |pp, b| pp.print_multiple_bind(b));
                self.write(" & ");
                self.print_expr(pred);
            }
            ExprKind::Exists { binds, pred } => {
                self.write("exists ");
                self.write_sep(binds, ", ", |pp, b| pp.print_multiple_bind(b));
                self.write(" & ");
                self.print_expr(pred);
            }
            ExprKind::Exists1 { bind, pred } => {
                self.write("exists1 ");
                self.print_bind(bind);
                self.write(" & ");
                self.print_expr(pred);
            }
            ExprKind::Iota { bind, pred } => {
                self.write("iota ");
                self.print_bind(bind);
                self.write(" & ");
                self.print_expr(pred);
            }
            ExprKind::SetEnum(items) => {
                self.write("{");
                self.write_sep(items, ", ", |pp, e| pp.print_expr(e));
                self.write("}");
            }
            ExprKind::SetComp { first, binds, pred } => {
                self.write("{");
                self.print_expr(first);
                self.write(" | ");
                self.write_sep(binds, ", ", |pp, b| pp.print_multiple_bind(b));
                if let Some(pred) = pred {
                    self.write(" & ");
                    self.print_expr(pred);
                }
                self.write("}");
            }
            ExprKind::SetRange(lo, hi) => {
                self.write("{");
                self.print_expr(lo);
                self.write(", ..., ");
                self.print_expr(hi);
                self.write("}");
            }
            ExprKind::SeqEnum(items) => {
                self.write("[");
                self.write_sep(items, ", ", |pp, e| pp.print_expr(e));
                self.write("]");
            }
            ExprKind::SeqComp { first, bind, pred } => {
                self.write("[");
                self.print_expr(first);
                self.write(" | ");
                self.print_bind(bind);
                if let Some(pred) = pred {
                    self.write(" & ");
                    self.print_expr(pred);
                }
                self.write("]");
            }
            ExprKind::SubSeq { seq, from, to } => {
                self.print_operand(seq);
                self.write("(");
                self.print_expr(from);
                self.write(", ..., ");
                self.print_expr(to);
                self.write(")");
            }
            ExprKind::MapEnum(maplets) => {
                if maplets.is_empty() {
                    self.write("{|->}");
                } else {
                    self.write("{");
                    self.write_sep(maplets, ", ", |pp, m| pp.print_maplet(m));
                    self.write("}");
                }
            }
            ExprKind::MapComp { first, binds, pred } => {
                self.write("{");
                self.print_maplet(first);
                self.write(" | ");
                self.write_sep(binds, ", ", |pp, b| pp.print_multiple_bind(b));
                if let Some(pred) = pred {
                    self.write(" & ");
                    self.print_expr(pred);
                }
                self.write("}");
            }
            ExprKind::Tuple(items) => {
                self.write("mk_");
                self.print_args(items);
            }
            ExprKind::TupleSelect(tuple, index) => {
                self.print_operand(tuple);
                self.write(&format!(".#{}", index));
            }
            ExprKind::FieldSelect(record, field) => {
                self.print_operand(record);
                self.write(".");
                self.write(field);
            }
            ExprKind::MkRecord { name, args } => {
                self.write("mk_");
                self.write(name);
                self.print_args(args);
            }
            ExprKind::Mu { record, mods } => {
                self.write("mu(");
                self.print_expr(record);
                for (field, value) in mods {
                    self.write(", ");
                    self.write(field);
                    self.write(" |-> ");
                    self.print_expr(value);
                }
                self.write(")");
            }
            ExprKind::IsType(e, ty) => {
                self.write("is_(");
                self.print_expr(e);
                self.write(", ");
                self.print_type(ty);
                self.write(")");
            }
            ExprKind::PreApply { func, args } => {
                self.write("pre_(");
                self.print_expr(func);
                for arg in args {
                    self.write(", ");
                    self.print_expr(arg);
                }
                self.write(")");
            }
        }
    }

    fn print_maplet(&mut self, maplet: &Maplet) {
        self.print_expr(&maplet.key);
        self.write(" |-> ");
        self.print_expr(&maplet.value);
    }

    pub fn print_local_defs(&mut self, defs: &[LocalDef]) {
        self.write_sep(defs, ", ", |pp, def| {
            pp.print_pattern(&def.pattern);
            if let Some(ty) = &def.ty {
                pp.write(":");
                pp.print_type(ty);
            }
            pp.write(" = ");
            pp.print_expr(&def.value);
        });
    }

    pub fn print_pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Ident(name) => self.write(name),
            Pattern::Ignore => self.write("-"),
            Pattern::Bool(b) => self.write(if *b { "true" } else { "false" }),
            Pattern::Int(n) => self.write(&n.to_string()),
            Pattern::Real(r) => self.write(r),
            Pattern::Char(c) => self.write(&format!("'{}'", c)),
            Pattern::Text(s) => self.write(&format!("{:?}", s)),
            Pattern::Quote(q) => self.write(&format!("<{}>", q)),
            Pattern::Nil => self.write("nil"),
            Pattern::Expr(e) => {
                self.write("(");
                self.print_expr(e);
                self.write(")");
            }
            Pattern::Tuple(items) => {
                self.write("mk_(");
                self.write_sep(items, ", ", |pp, p| pp.print_pattern(p));
                self.write(")");
            }
            Pattern::Record { name, fields } => {
                self.write("mk_");
                self.write(name);
                self.write("(");
                self.write_sep(fields, ", ", |pp, p| pp.print_pattern(p));
                self.write(")");
            }
            Pattern::Set(items) => {
                self.write("{");
                self.write_sep(items, ", ", |pp, p| pp.print_pattern(p));
                self.write("}");
            }
            Pattern::Seq(items) => {
                self.write("[");
                self.write_sep(items, ", ", |pp, p| pp.print_pattern(p));
                self.write("]");
            }
            Pattern::Union(l, r) => {
                self.print_pattern(l);
                self.write(" union ");
                self.print_pattern(r);
            }
            Pattern::Concat(l, r) => {
                self.print_pattern(l);
                self.write(" ^ ");
                self.print_pattern(r);
            }
        }
    }

    pub fn print_bind(&mut self, bind: &Bind) {
        match bind {
            Bind::Set { pattern, set } => {
                self.print_pattern(pattern);
                self.write(" in set ");
                self.print_expr(set);
            }
            Bind::Type { pattern, ty } => {
                self.print_pattern(pattern);
                self.write(":");
                self.print_type(ty);
            }
            Bind::Seq { pattern, seq } => {
                self.print_pattern(pattern);
                self.write(" in seq ");
                self.print_expr(seq);
            }
        }
    }

    pub fn print_multiple_bind(&mut self, bind: &MultipleBind) {
        match bind {
            MultipleBind::Set { patterns, set } => {
                self.write_sep(patterns, ", ", |pp, p| pp.print_pattern(p));
                self.write(" in set ");
                self.print_expr(set);
            }
            MultipleBind::Type { patterns, ty } => {
                self.write_sep(patterns, ", ", |pp, p| pp.print_pattern(p));
                self.write(":");
                self.print_type(ty);
            }
            MultipleBind::Seq { patterns, seq } => {
                self.write_sep(patterns, ", ", |pp, p| pp.print_pattern(p));
                self.write(" in seq ");
                self.print_expr(seq);
            }
        }
    }

    pub fn print_designator(&mut self, designator: &Designator) {
        match designator {
            Designator::Name(name) => self.write(name),
            Designator::Field { object, field } => {
                self.print_designator(object);
                self.write(".");
                self.write(field);
            }
            Designator::MapSeq { object, index, .. } => {
                self.print_designator(object);
                self.write("(");
                self.print_expr(index);
                self.write(")");
            }
        }
    }

    fn print_type_operand(&mut self, ty: &Type) {
        let compound = matches!(
            ty,
            Type::Product(_)
                | Type::Union(_)
                | Type::Function { .. }
                | Type::Operation { .. }
                | Type::Map { .. }
        );
        if compound {
            self.write("(");
            self.print_type(ty);
            self.write(")");
        } else {
            self.print_type(ty);
        }
    }

    pub fn print_type(&mut self, ty: &Type) {
        match ty {
            Type::Bool => self.write("bool"),
            Type::Nat1 => self.write("nat1"),
            Type::Nat => self.write("nat"),
            Type::Int => self.write("int"),
            Type::Rat => self.write("rat"),
            Type::Real => self.write("real"),
            Type::Char => self.write("char"),
            Type::Token => self.write("token"),
            Type::Quote(q) => self.write(&format!("<{}>", q)),
            Type::Void => self.write("()"),
            Type::Nil => self.write("nil"),
            Type::Set(t) => {
                self.write("set of ");
                self.print_type_operand(t);
            }
            Type::Set1(t) => {
                self.write("set1 of ");
                self.print_type_operand(t);
            }
            Type::Seq(t) => {
                self.write("seq of ");
                self.print_type_operand(t);
            }
            Type::Seq1(t) => {
                self.write("seq1 of ");
                self.print_type_operand(t);
            }
            Type::Map {
                from,
                to,
                injective,
            } => {
                self.write(if *injective { "inmap " } else { "map " });
                self.print_type_operand(from);
                self.write(" to ");
                self.print_type_operand(to);
            }
            Type::Product(items) => {
                self.write_sep(items, " * ", |pp, t| pp.print_type_operand(t));
            }
            Type::Union(items) => {
                self.write_sep(items, " | ", |pp, t| pp.print_type_operand(t));
            }
            Type::Optional(t) => {
                self.write("[");
                self.print_type(t);
                self.write("]");
            }
            Type::Function {
                params,
                result,
                partial,
            } => {
                if params.is_empty() {
                    self.write("()");
                } else {
                    self.write_sep(params, " * ", |pp, t| pp.print_type_operand(t));
                }
                self.write(if *partial { " -> " } else { " +> " });
                self.print_type_operand(result);
            }
            Type::Operation { params, result } => {
                if params.is_empty() {
                    self.write("()");
                } else {
                    self.write_sep(params, " * ", |pp, t| pp.print_type_operand(t));
                }
                self.write(" ==> ");
                self.print_type_operand(result);
            }
            Type::Record { name, .. } | Type::Named { name, .. } => self.write(name),
            Type::Unknown => self.write("?"),
        }
    }
}

/// Pretty print the definitions of a `let`, comma separated
pub fn pretty_local_defs(defs: &[LocalDef]) -> String {
    let mut pp = PrettyPrinter::new();
    pp.print_local_defs(defs);
    pp.finish()
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&pretty_expr(self))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&pretty_pattern(self))
    }
}

impl fmt::Display for Bind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&pretty_bind(self))
    }
}

impl fmt::Display for MultipleBind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pp = PrettyPrinter::new();
        pp.print_multiple_bind(self);
        f.write_str(&pp.finish())
    }
}

impl fmt::Display for Designator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&pretty_designator(self))
    }
}
