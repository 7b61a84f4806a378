//! Name environment for analysis passes
//!
//! Built once from a type-checked [`Module`], the environment answers the
//! questions a pass cannot answer from the node it is looking at:
//! - Is this name a state variable, and what is its declared type?
//! - Which operation does a call name, what are its parameter types, does it
//!   have a precondition, and which state may it write (its footprint)?
//! - Does a function have a pre- or postcondition?
//!
//! Renamed and qualified imports are resolved to their underlying definition
//! here, so passes never need to unwrap import wrappers themselves.

use crate::ast::{Definition, ExtMode, Import, Invariant, Module, StateField};
use crate::span::{Span, Spanned};
use crate::types::Type;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// The kind of a module-level symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Field of the module `state` block
    StateVariable,
    Value,
    Type,
    Function,
    Operation,
}

/// A module-level symbol with metadata
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Span of the definition site
    pub def_span: Span,
}

/// State an operation may write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Footprint {
    /// Only these state variables
    Names(BTreeSet<String>),
    /// Unknown: any state may change
    All,
}

impl Footprint {
    pub fn is_empty(&self) -> bool {
        matches!(self, Footprint::Names(names) if names.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct OperationInfo {
    pub name: String,
    pub param_types: Vec<Type>,
    pub result: Type,
    pub has_pre: bool,
    pub has_post: bool,
    pub footprint: Footprint,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    pub param_types: Vec<Type>,
    pub result: Type,
    pub has_pre: bool,
    pub has_post: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StateInfo {
    pub name: String,
    pub fields: Vec<StateField>,
    pub inv: Option<Invariant>,
    pub span: Span,
}

impl StateInfo {
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

/// Errors building the environment
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("duplicate definition of `{name}` at {span} (first defined at {first_def})")]
    Duplicate {
        name: String,
        first_def: Span,
        span: Span,
    },
}

impl ResolveError {
    pub fn span(&self) -> Span {
        match self {
            ResolveError::Duplicate { span, .. } => *span,
        }
    }
}

/// Module-level name environment
#[derive(Debug, Clone)]
pub struct Environment {
    module: String,
    file: String,
    state: Option<StateInfo>,
    symbols: HashMap<String, Symbol>,
    operations: HashMap<String, OperationInfo>,
    functions: HashMap<String, FunctionInfo>,
}

impl Environment {
    /// Create an empty environment for module `module` in `file`
    pub fn new(module: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            file: file.into(),
            state: None,
            symbols: HashMap::new(),
            operations: HashMap::new(),
            functions: HashMap::new(),
        }
    }

    /// Build the environment of a module
    pub fn from_module(module: &Module) -> Result<Self, ResolveError> {
        let mut env = Self::new(module.name.clone(), module.file.clone());

        if let Some(state) = &module.state {
            for field in &state.fields {
                env.define(&field.name, SymbolKind::StateVariable, state.span)?;
            }
            env.state = Some(StateInfo {
                name: state.name.clone(),
                fields: state.fields.clone(),
                inv: state.inv.clone(),
                span: state.span,
            });
        }

        for def in &module.definitions {
            env.add_definition(None, def)?;
        }
        for import in &module.imports {
            env.add_import(import)?;
        }
        Ok(env)
    }

    pub fn module_name(&self) -> &str {
        &self.module
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn state(&self) -> Option<&StateInfo> {
        self.state.as_ref()
    }

    /// Names of all state variables, in declaration order
    pub fn state_names(&self) -> Vec<String> {
        self.state
            .as_ref()
            .map(StateInfo::field_names)
            .unwrap_or_default()
    }

    pub fn is_state_variable(&self, name: &str) -> bool {
        matches!(
            self.symbols.get(name),
            Some(Symbol {
                kind: SymbolKind::StateVariable,
                ..
            })
        )
    }

    pub fn state_variable_type(&self, name: &str) -> Option<&Type> {
        self.state
            .as_ref()
            .and_then(|s| s.fields.iter().find(|f| f.name == name))
            .map(|f| &f.ty)
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn operation(&self, name: &str) -> Option<&OperationInfo> {
        self.operations.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.get(name)
    }

    fn define(&mut self, name: &str, kind: SymbolKind, span: Span) -> Result<(), ResolveError> {
        if let Some(existing) = self.symbols.get(name) {
            return Err(ResolveError::Duplicate {
                name: name.to_string(),
                first_def: existing.def_span,
                span,
            });
        }
        self.symbols.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                kind,
                def_span: span,
            },
        );
        Ok(())
    }

    fn add_import(&mut self, import: &Import) -> Result<(), ResolveError> {
        let qualified = format!("{}`{}", import.from, import.name);
        self.add_definition(Some(&qualified), &import.definition)?;
        if let Some(alias) = &import.rename {
            self.add_definition(Some(alias), &import.definition)?;
        }
        Ok(())
    }

    /// Register a definition, optionally under a name other than its own
    fn add_definition(
        &mut self,
        alias: Option<&str>,
        def: &Spanned<Definition>,
    ) -> Result<(), ResolveError> {
        let span = def.span;
        match &def.node {
            Definition::Type(t) => {
                self.define(alias.unwrap_or(&t.name), SymbolKind::Type, span)?;
            }
            Definition::Value(v) => {
                if let Some(alias) = alias {
                    self.define(alias, SymbolKind::Value, span)?;
                } else {
                    for name in v.pattern.idents() {
                        self.define(&name, SymbolKind::Value, span)?;
                    }
                }
            }
            Definition::ExplicitFunction(f) => {
                let name = alias.unwrap_or(&f.name).to_string();
                self.define(&name, SymbolKind::Function, span)?;
                self.functions.insert(
                    name.clone(),
                    FunctionInfo {
                        name,
                        param_types: f.param_types.clone(),
                        result: f.result.clone(),
                        has_pre: f.pre.is_some(),
                        has_post: f.post.is_some(),
                        span,
                    },
                );
            }
            Definition::ImplicitFunction(f) => {
                let name = alias.unwrap_or(&f.name).to_string();
                self.define(&name, SymbolKind::Function, span)?;
                self.functions.insert(
                    name.clone(),
                    FunctionInfo {
                        name,
                        param_types: f.params.iter().map(|p| p.ty.clone()).collect(),
                        result: f.result.ty.clone(),
                        has_pre: f.pre.is_some(),
                        has_post: true,
                        span,
                    },
                );
            }
            Definition::ExplicitOperation(op) => {
                let name = alias.unwrap_or(&op.name).to_string();
                self.define(&name, SymbolKind::Operation, span)?;
                let footprint = if op.pure {
                    Footprint::Names(BTreeSet::new())
                } else if op.body.calls_operations() {
                    Footprint::All
                } else {
                    Footprint::Names(
                        op.body
                            .assigned_names()
                            .into_iter()
                            .filter(|n| self.is_state_variable(n))
                            .collect(),
                    )
                };
                self.operations.insert(
                    name.clone(),
                    OperationInfo {
                        name,
                        param_types: op.param_types.clone(),
                        result: op.result.clone(),
                        has_pre: op.pre.is_some(),
                        has_post: op.post.is_some(),
                        footprint,
                        span,
                    },
                );
            }
            Definition::ImplicitOperation(op) => {
                let name = alias.unwrap_or(&op.name).to_string();
                self.define(&name, SymbolKind::Operation, span)?;
                let mut writes: BTreeSet<String> = op
                    .externals
                    .iter()
                    .filter(|e| e.mode == ExtMode::Wr)
                    .flat_map(|e| e.names.iter().cloned())
                    .collect();
                let footprint = match &op.body {
                    Some(body) if body.calls_operations() => Footprint::All,
                    Some(body) => {
                        writes.extend(
                            body.assigned_names()
                                .into_iter()
                                .filter(|n| self.is_state_variable(n)),
                        );
                        Footprint::Names(writes)
                    }
                    None => Footprint::Names(writes),
                };
                self.operations.insert(
                    name.clone(),
                    OperationInfo {
                        name,
                        param_types: op.params.iter().map(|p| p.ty.clone()).collect(),
                        result: op
                            .result
                            .as_ref()
                            .map(|r| r.ty.clone())
                            .unwrap_or(Type::Void),
                        has_pre: op.pre.is_some(),
                        has_post: op.post.is_some(),
                        footprint,
                        span,
                    },
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::span::FileId;

    fn span(line: u32) -> Span {
        Span::point(FileId(0), line, 1)
    }

    fn int(n: i64) -> Expr {
        Expr::new(ExprKind::Int(n.into()), Type::Nat, span(0))
    }

    fn assign(name: &str) -> Stmt {
        Stmt::new(
            StmtKind::Assign(Assignment {
                target: Designator::Name(name.into()),
                target_ty: Type::Nat,
                value: int(1),
                span: span(0),
            }),
            span(0),
        )
    }

    fn module_with(defs: Vec<Definition>) -> Module {
        Module {
            name: "M".into(),
            file: "m.vdmsl".into(),
            state: Some(StateDef {
                name: "St".into(),
                fields: vec![
                    StateField {
                        name: "x".into(),
                        ty: Type::Nat,
                    },
                    StateField {
                        name: "y".into(),
                        ty: Type::Nat,
                    },
                ],
                inv: None,
                init: None,
                span: span(1),
            }),
            imports: vec![],
            definitions: defs
                .into_iter()
                .enumerate()
                .map(|(i, d)| Spanned::new(d, span(i as u32 + 2)))
                .collect(),
        }
    }

    fn explicit_op(name: &str, body: Stmt) -> Definition {
        Definition::ExplicitOperation(ExplicitOperation {
            name: name.into(),
            params: vec![],
            param_types: vec![],
            result: Type::Void,
            body,
            pre: None,
            post: None,
            pure: false,
        })
    }

    #[test]
    fn test_explicit_operation_footprint_is_assigned_state() {
        let m = module_with(vec![explicit_op("SetX", assign("x"))]);
        let env = Environment::from_module(&m).unwrap();
        let op = env.operation("SetX").unwrap();
        assert_eq!(
            op.footprint,
            Footprint::Names(["x".to_string()].into_iter().collect())
        );
        assert!(env.is_state_variable("y"));
        assert_eq!(env.state_names(), vec!["x", "y"]);
    }

    #[test]
    fn test_calling_operation_has_unknown_footprint() {
        let call = Stmt::new(
            StmtKind::Call {
                name: "SetX".into(),
                args: vec![],
            },
            span(0),
        );
        let m = module_with(vec![
            explicit_op("SetX", assign("x")),
            explicit_op("Outer", call),
        ]);
        let env = Environment::from_module(&m).unwrap();
        assert_eq!(env.operation("Outer").unwrap().footprint, Footprint::All);
    }

    #[test]
    fn test_renamed_import_resolves_to_definition() {
        let mut m = module_with(vec![]);
        m.imports.push(Import {
            from: "Lib".into(),
            name: "Reset".into(),
            rename: Some("LibReset".into()),
            definition: Spanned::new(explicit_op("Reset", assign("x")), span(9)),
        });
        let env = Environment::from_module(&m).unwrap();
        assert!(env.operation("LibReset").is_some());
        assert!(env.operation("Lib`Reset").is_some());
        assert!(env.operation("Reset").is_none());
    }

    #[test]
    fn test_duplicate_definition_is_error() {
        let m = module_with(vec![
            explicit_op("Op", assign("x")),
            explicit_op("Op", assign("y")),
        ]);
        let err = Environment::from_module(&m).unwrap_err();
        assert_eq!(err.span(), span(3));
    }
}
