//! Typed tree for VDM models
//!
//! This is the tree the type checker hands to downstream passes:
//! - Resolved: names refer to definitions the checker has already bound
//! - Typed: every expression carries its static [`Type`]
//! - Span-aware: every statement, expression and definition has a [`Span`]
//! - Read-only: analysis passes borrow it and never mutate it

use crate::span::{Span, Spanned};
use crate::types::Type;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// A VDM module (or flat specification)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    /// Source file the module was read from
    pub file: String,
    #[serde(default)]
    pub state: Option<StateDef>,
    #[serde(default)]
    pub imports: Vec<Import>,
    pub definitions: Vec<Spanned<Definition>>,
}

/// An imported definition, already resolved by the type checker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub from: String,
    pub name: String,
    /// `renamed <alias>`
    #[serde(default)]
    pub rename: Option<String>,
    pub definition: Spanned<Definition>,
}

/// The `state` block of a module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDef {
    pub name: String,
    pub fields: Vec<StateField>,
    #[serde(default)]
    pub inv: Option<Invariant>,
    #[serde(default)]
    pub init: Option<Invariant>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateField {
    pub name: String,
    pub ty: Type,
}

/// `inv p == e` (also used for `init p == e`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invariant {
    pub pattern: Pattern,
    pub body: Expr,
}

/// A top-level definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Definition {
    Type(TypeDef),
    Value(ValueDef),
    ExplicitFunction(ExplicitFunction),
    ImplicitFunction(ImplicitFunction),
    ExplicitOperation(ExplicitOperation),
    ImplicitOperation(ImplicitOperation),
}

impl Definition {
    pub fn name(&self) -> String {
        match self {
            Definition::Type(d) => d.name.clone(),
            Definition::Value(d) => d.pattern.to_string(),
            Definition::ExplicitFunction(d) => d.name.clone(),
            Definition::ImplicitFunction(d) => d.name.clone(),
            Definition::ExplicitOperation(d) => d.name.clone(),
            Definition::ImplicitOperation(d) => d.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub inv: Option<Invariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueDef {
    pub pattern: Pattern,
    #[serde(default)]
    pub ty: Option<Type>,
    pub value: Expr,
}

/// `f: T1 * T2 -> R  f(p1, p2) == body pre ... post ...`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplicitFunction {
    pub name: String,
    pub params: Vec<Pattern>,
    pub param_types: Vec<Type>,
    pub result: Type,
    #[serde(default)]
    pub partial: bool,
    pub body: Expr,
    #[serde(default)]
    pub pre: Option<Expr>,
    #[serde(default)]
    pub post: Option<Expr>,
}

/// A typed parameter `p: T` of an implicit definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedParam {
    pub pattern: Pattern,
    pub ty: Type,
}

/// The named result `r: T` of an implicit definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedResult {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplicitFunction {
    pub name: String,
    pub params: Vec<TypedParam>,
    pub result: NamedResult,
    #[serde(default)]
    pub pre: Option<Expr>,
    pub post: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplicitOperation {
    pub name: String,
    pub params: Vec<Pattern>,
    pub param_types: Vec<Type>,
    pub result: Type,
    pub body: Stmt,
    #[serde(default)]
    pub pre: Option<Expr>,
    #[serde(default)]
    pub post: Option<Expr>,
    #[serde(default)]
    pub pure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtMode {
    Rd,
    Wr,
}

/// `ext wr x, y : T`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct External {
    pub mode: ExtMode,
    pub names: Vec<String>,
    #[serde(default)]
    pub ty: Option<Type>,
}

/// `errs NAME : lhs -> rhs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorCase {
    pub name: String,
    pub lhs: Expr,
    pub rhs: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplicitOperation {
    pub name: String,
    pub params: Vec<TypedParam>,
    #[serde(default)]
    pub result: Option<NamedResult>,
    #[serde(default)]
    pub externals: Vec<External>,
    #[serde(default)]
    pub pre: Option<Expr>,
    #[serde(default)]
    pub post: Option<Expr>,
    #[serde(default)]
    pub errs: Vec<ErrorCase>,
    /// Optional executable body of an extended implicit operation
    #[serde(default)]
    pub body: Option<Stmt>,
}

// === Patterns and binds ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    Ident(String),
    /// Don't-care pattern `-`
    Ignore,
    Bool(bool),
    Int(BigInt),
    Real(String),
    Char(char),
    Text(String),
    Quote(String),
    Nil,
    /// `(e)`: matches a value equal to an expression
    Expr(Box<Expr>),
    /// `mk_(p1, ..., pn)`
    Tuple(Vec<Pattern>),
    /// `mk_R(p1, ..., pn)`
    Record { name: String, fields: Vec<Pattern> },
    Set(Vec<Pattern>),
    Seq(Vec<Pattern>),
    /// `p1 union p2`
    Union(Box<Pattern>, Box<Pattern>),
    /// `p1 ^ p2`
    Concat(Box<Pattern>, Box<Pattern>),
}

/// `p in set S`, `p : T`, `p in seq s`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Bind {
    Set { pattern: Pattern, set: Box<Expr> },
    Type { pattern: Pattern, ty: Type },
    Seq { pattern: Pattern, seq: Box<Expr> },
}

/// `p1, p2 in set S`, `p1, p2 : T`, `p1, p2 in seq s`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MultipleBind {
    Set { patterns: Vec<Pattern>, set: Expr },
    Type { patterns: Vec<Pattern>, ty: Type },
    Seq { patterns: Vec<Pattern>, seq: Expr },
}

/// Either a plain pattern or a bind (for loops, trap handlers)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatternBind {
    Pattern(Pattern),
    Bind(Bind),
}

// === Expressions ===

/// A typed expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
    Abs,
    Floor,
    Card,
    Power,
    Dunion,
    Dinter,
    Len,
    Hd,
    Tl,
    Elems,
    Inds,
    Reverse,
    Conc,
    Dom,
    Rng,
    Merge,
    Inverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    And,
    Or,
    Implies,
    Equiv,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Rem,
    Mod,
    /// `**` (power, function/map iteration)
    StarStar,
    InSet,
    NotInSet,
    Union,
    Inter,
    Diff,
    Subset,
    PSubset,
    /// `^`
    Concat,
    Munion,
    /// `++`
    Override,
    /// `<:`
    DomResTo,
    /// `<-:`
    DomResBy,
    /// `:>`
    RngResTo,
    /// `:->`
    RngResBy,
    Comp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElseIfExpr {
    pub cond: Expr,
    pub then: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseAlt {
    pub pattern: Pattern,
    pub body: Expr,
}

/// `p : T = e` in a `let`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDef {
    pub pattern: Pattern,
    #[serde(default)]
    pub ty: Option<Type>,
    pub value: Expr,
}

/// `d |-> r` in a map enumeration or comprehension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maplet {
    pub key: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    // === Literals ===
    Bool(bool),
    Int(BigInt),
    Real(String),
    Char(char),
    Text(String),
    Quote(String),
    Nil,

    // === Names ===
    Var(String),
    /// `x~` in a postcondition
    Old(String),

    // === Operators ===
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Function, map or sequence application (decided by the root's type)
    Apply { root: Box<Expr>, args: Vec<Expr> },
    /// Operation call embedded in an expression
    OpCall { name: String, args: Vec<Expr> },

    // === Control ===
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        elseifs: Vec<ElseIfExpr>,
        else_: Box<Expr>,
    },
    Cases {
        subject: Box<Expr>,
        alts: Vec<CaseAlt>,
        others: Option<Box<Expr>>,
    },
    Let { defs: Vec<LocalDef>, body: Box<Expr> },
    LetBeSt {
        bind: Box<MultipleBind>,
        suchthat: Option<Box<Expr>>,
        body: Box<Expr>,
    },

    // === Quantifiers ===
    Forall { binds: Vec<MultipleBind>, pred: Box<Expr> },
    Exists { binds: Vec<MultipleBind>, pred: Box<Expr> },
    Exists1 { bind: Box<Bind>, pred: Box<Expr> },
    Iota { bind: Box<Bind>, pred: Box<Expr> },

    // === Collections ===
    SetEnum(Vec<Expr>),
    SetComp {
        first: Box<Expr>,
        binds: Vec<MultipleBind>,
        pred: Option<Box<Expr>>,
    },
    SetRange(Box<Expr>, Box<Expr>),
    SeqEnum(Vec<Expr>),
    SeqComp {
        first: Box<Expr>,
        bind: Box<Bind>,
        pred: Option<Box<Expr>>,
    },
    SubSeq {
        seq: Box<Expr>,
        from: Box<Expr>,
        to: Box<Expr>,
    },
    MapEnum(Vec<Maplet>),
    MapComp {
        first: Box<Maplet>,
        binds: Vec<MultipleBind>,
        pred: Option<Box<Expr>>,
    },

    // === Tuples and records ===
    Tuple(Vec<Expr>),
    /// `t.#n` (1-based)
    TupleSelect(Box<Expr>, usize),
    FieldSelect(Box<Expr>, String),
    MkRecord { name: String, args: Vec<Expr> },
    Mu {
        record: Box<Expr>,
        mods: Vec<(String, Expr)>,
    },

    // === Type tests ===
    IsType(Box<Expr>, Type),
    /// `pre_(f, args)`
    PreApply { func: Box<Expr>, args: Vec<Expr> },
}

// === Statements ===

/// A state designator: the left-hand side of an assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Designator {
    Name(String),
    Field {
        object: Box<Designator>,
        field: String,
    },
    /// `d(i)` where `d` denotes a map or sequence of type `object_ty`
    MapSeq {
        object: Box<Designator>,
        index: Box<Expr>,
        object_ty: Type,
    },
}

impl Designator {
    /// The variable ultimately updated by an assignment through this designator
    pub fn root(&self) -> &str {
        match self {
            Designator::Name(n) => n,
            Designator::Field { object, .. } | Designator::MapSeq { object, .. } => {
                object.root()
            }
        }
    }
}

/// `t := e`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub target: Designator,
    /// Declared type of the designated slot
    pub target_ty: Type,
    pub value: Expr,
    pub span: Span,
}

/// `dcl x : T := e`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElseIfStmt {
    pub cond: Expr,
    pub then: Stmt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseStmtAlt {
    pub patterns: Vec<Pattern>,
    pub body: Stmt,
}

/// `p |-> s` inside `tixe`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TixeHandler {
    pub bind: PatternBind,
    pub body: Stmt,
}

/// `[ext ... pre ... post ... errs ...]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationStmt {
    #[serde(default)]
    pub externals: Vec<ExternalClause>,
    #[serde(default)]
    pub pre: Option<Expr>,
    pub post: Expr,
    #[serde(default)]
    pub errs: Vec<ErrorClause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalClause {
    pub mode: ExtMode,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorClause {
    pub name: String,
    pub lhs: Expr,
    pub rhs: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Assign(Assignment),
    Atomic(Vec<Assignment>),
    Block {
        dcls: Vec<LocalDecl>,
        stmts: Vec<Stmt>,
    },
    /// `Op(args)`
    Call { name: String, args: Vec<Expr> },
    /// `obj.Op(args)`
    CallObject {
        object: Designator,
        name: String,
        args: Vec<Expr>,
    },
    Cases {
        subject: Expr,
        alts: Vec<CaseStmtAlt>,
        others: Option<Box<Stmt>>,
    },
    /// `for all p in set S do s`
    ForAllSet {
        pattern: Pattern,
        set: Expr,
        body: Box<Stmt>,
    },
    /// `for i = a to b by c do s`
    ForIndex {
        var: String,
        from: Expr,
        to: Expr,
        by: Option<Expr>,
        body: Box<Stmt>,
    },
    /// `for p in [reverse] s do stmt`
    ForPattern {
        bind: PatternBind,
        seq: Expr,
        reverse: bool,
        body: Box<Stmt>,
    },
    If {
        cond: Expr,
        then: Box<Stmt>,
        elseifs: Vec<ElseIfStmt>,
        else_: Option<Box<Stmt>>,
    },
    LetBeSt {
        bind: MultipleBind,
        suchthat: Option<Expr>,
        body: Box<Stmt>,
    },
    LetDef {
        defs: Vec<LocalDef>,
        body: Box<Stmt>,
    },
    /// `||(s1, s2, ...)`
    NonDet(Vec<Stmt>),
    Return(Option<Expr>),
    Specification(SpecificationStmt),
    /// `sporadic(d, j, o)(Op)`
    Sporadic { args: Vec<Expr>, op: String },
    /// `periodic(p, j, d, o)(Op)`
    Periodic { args: Vec<Expr>, op: String },
    /// `cycles(e) s`
    Cycles { cycles: Expr, body: Box<Stmt> },
    /// `duration(e) s`
    Duration { duration: Expr, body: Box<Stmt> },
    /// `stop(obj)`
    Stop(Expr),
    Tixe {
        handlers: Vec<TixeHandler>,
        body: Box<Stmt>,
    },
    /// `trap p with handler in body`
    Trap {
        bind: PatternBind,
        handler: Box<Stmt>,
        body: Box<Stmt>,
    },
    /// `always s1 in s2`
    Always { always: Box<Stmt>, body: Box<Stmt> },
    While { cond: Expr, body: Box<Stmt> },
    Exit(Option<Expr>),
    Error,
    Skip,
}
