//! vdm-core - Typed tree and shared infrastructure for VDM models
//!
//! This crate holds everything analysis passes share:
//!
//! - [`ast`]: the typed, resolved tree produced by the type checker
//! - [`span`]: source locations
//! - [`types`]: the type model and the conservative subtype test
//! - [`pretty`]: rendering of expressions, patterns, binds and types back to
//!   VDM notation
//! - [`visit`]: tree walkers (free variables, assigned names, call detection)
//! - [`env`]: the module-level name environment
//!
//! The tree is deserialised from JSON (see `serde` derives on every node) and
//! is read-only to every pass.

pub mod ast;
pub mod env;
pub mod pretty;
pub mod span;
pub mod types;
pub mod visit;

pub use ast::{
    Bind, Definition, Designator, Expr, ExprKind, Module, MultipleBind, Pattern, Stmt, StmtKind,
};
pub use env::{Environment, Footprint, ResolveError, SymbolKind};
pub use pretty::{pretty_expr, pretty_pattern, pretty_type};
pub use span::{FileId, LineCol, Span, Spanned};
pub use types::{is_subtype, Type};
