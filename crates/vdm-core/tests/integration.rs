//! Integration tests for vdm-core: JSON input, environment and pretty printing

use serde_json::json;
use vdm_core::ast::{BinaryOp, MultipleBind, UnaryOp};
use vdm_core::env::OperationInfo;
use vdm_core::{
    pretty_expr, pretty_pattern, pretty_type, Environment, Expr, ExprKind, Footprint, Module,
    Pattern, Span, SymbolKind, Type,
};

fn var(name: &str, ty: Type) -> Expr {
    Expr::new(ExprKind::Var(name.into()), ty, Span::dummy())
}

fn bin(op: BinaryOp, l: Expr, r: Expr) -> Expr {
    Expr::new(
        ExprKind::Binary(op, Box::new(l), Box::new(r)),
        Type::Bool,
        Span::dummy(),
    )
}

fn span_json(line: u32) -> serde_json::Value {
    json!({
        "file": 0,
        "start": { "line": line, "col": 1 },
        "end": { "line": line, "col": 1 }
    })
}

fn var_json(name: &str, line: u32) -> serde_json::Value {
    json!({ "kind": { "Var": name }, "ty": "Nat", "span": span_json(line) })
}

/// `state St of x: nat y: nat end` with `Copy() == x := y` and a pure `Peek`
fn module_json() -> serde_json::Value {
    json!({
        "name": "Counter",
        "file": "counter.vdmsl",
        "state": {
            "name": "St",
            "fields": [
                { "name": "x", "ty": "Nat" },
                { "name": "y", "ty": "Nat" }
            ],
            "span": span_json(1)
        },
        "definitions": [
            {
                "node": { "ExplicitOperation": {
                    "name": "Copy",
                    "params": [],
                    "param_types": [],
                    "result": "Void",
                    "body": {
                        "kind": { "Assign": {
                            "target": { "Name": "x" },
                            "target_ty": "Nat",
                            "value": var_json("y", 5),
                            "span": span_json(5)
                        }},
                        "span": span_json(5)
                    }
                }},
                "span": span_json(4)
            },
            {
                "node": { "ExplicitOperation": {
                    "name": "Peek",
                    "params": [],
                    "param_types": [],
                    "result": "Nat",
                    "body": {
                        "kind": { "Return": var_json("x", 8) },
                        "span": span_json(8)
                    },
                    "pure": true
                }},
                "span": span_json(7)
            }
        ]
    })
}

// ============================================================================
// Environment over a deserialized module
// ============================================================================

#[test]
fn test_module_from_json_builds_environment() {
    let module: Module = serde_json::from_value(module_json()).unwrap();
    assert_eq!(module.definitions.len(), 2);
    assert!(module.imports.is_empty());

    let env = Environment::from_module(&module).unwrap();
    assert_eq!(env.module_name(), "Counter");
    assert_eq!(env.file(), "counter.vdmsl");
    assert_eq!(env.state_names(), vec!["x", "y"]);
    assert_eq!(env.state_variable_type("y"), Some(&Type::Nat));
    assert_eq!(env.lookup("Copy").map(|s| s.kind), Some(SymbolKind::Operation));
    assert_eq!(
        env.lookup("x").map(|s| s.kind),
        Some(SymbolKind::StateVariable)
    );
}

#[test]
fn test_footprints_from_json_module() {
    let module: Module = serde_json::from_value(module_json()).unwrap();
    let env = Environment::from_module(&module).unwrap();

    let copy: &OperationInfo = env.operation("Copy").unwrap();
    assert_eq!(
        copy.footprint,
        Footprint::Names(["x".to_string()].into_iter().collect())
    );
    assert!(!copy.has_pre);

    let peek = env.operation("Peek").unwrap();
    assert!(peek.footprint.is_empty());
    assert_eq!(peek.result, Type::Nat);
}

#[test]
fn test_module_without_state_has_no_state_names() {
    let mut value = module_json();
    value["state"] = serde_json::Value::Null;
    value["definitions"] = json!([]);
    let module: Module = serde_json::from_value(value).unwrap();
    let env = Environment::from_module(&module).unwrap();
    assert!(env.state().is_none());
    assert!(env.state_names().is_empty());
    assert!(!env.is_state_variable("x"));
}

// ============================================================================
// Pretty printing
// ============================================================================

#[test]
fn test_compound_operands_are_parenthesized() {
    let sum = bin(BinaryOp::Add, var("a", Type::Int), var("b", Type::Int));
    let product = bin(BinaryOp::Mul, sum, var("c", Type::Int));
    assert_eq!(pretty_expr(&product), "(a + b) * c");

    let neg = Expr::new(
        ExprKind::Unary(UnaryOp::Minus, Box::new(var("a", Type::Int))),
        Type::Int,
        Span::dummy(),
    );
    assert_eq!(pretty_expr(&neg), "-a");
}

#[test]
fn test_quantifier_prints_binds_and_body() {
    let set = var("S", Type::set_of(Type::Nat));
    let pred = bin(
        BinaryOp::Implies,
        bin(BinaryOp::Gt, var("e", Type::Nat), var("k", Type::Nat)),
        bin(BinaryOp::Ne, var("e", Type::Nat), var("k", Type::Nat)),
    );
    let forall = Expr::new(
        ExprKind::Forall {
            binds: vec![MultipleBind::Set {
                patterns: vec![Pattern::Ident("e".into())],
                set,
            }],
            pred: Box::new(pred),
        },
        Type::Bool,
        Span::dummy(),
    );
    assert_eq!(
        pretty_expr(&forall),
        "forall e in set S & (e > k) => (e <> k)"
    );
    assert_eq!(
        forall.free_vars().into_iter().collect::<Vec<_>>(),
        vec!["S", "k"]
    );
}

#[test]
fn test_record_update_and_application() {
    let r = var("r", Type::Unknown);
    let m = Expr::new(
        ExprKind::FieldSelect(Box::new(r.clone()), "m".into()),
        Type::map_of(Type::Nat, Type::Nat),
        Span::dummy(),
    );
    let lookup = Expr::new(
        ExprKind::Apply {
            root: Box::new(m),
            args: vec![var("k", Type::Nat)],
        },
        Type::Nat,
        Span::dummy(),
    );
    let mu = Expr::new(
        ExprKind::Mu {
            record: Box::new(r),
            mods: vec![("n".into(), lookup)],
        },
        Type::Unknown,
        Span::dummy(),
    );
    assert_eq!(pretty_expr(&mu), "mu(r, n |-> r.m(k))");
}

#[test]
fn test_pattern_and_type_notation() {
    let pattern = Pattern::Record {
        name: "St".into(),
        fields: vec![Pattern::Ident("x".into()), Pattern::Ignore],
    };
    assert_eq!(pretty_pattern(&pattern), "mk_St(x, -)");

    let ty = Type::map_of(
        Type::Product(vec![Type::Nat, Type::Char]),
        Type::seq_of(Type::Int),
    );
    assert_eq!(pretty_type(&ty), "map (nat * char) to seq of int");

    let f = Type::Function {
        params: vec![Type::Nat],
        result: Box::new(Type::Optional(Box::new(Type::Bool))),
        partial: true,
    };
    assert_eq!(pretty_type(&f), "nat -> [bool]");
    assert_eq!(f.to_string(), "nat -> [bool]");
}
