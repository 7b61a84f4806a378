//! End-to-end generation over small hand-built modules

use num_bigint::BigInt;
use vdm_core::ast::*;
use vdm_core::span::{FileId, Span, Spanned};
use vdm_core::types::Type;
use vdm_pog::{
    generate, generate_module, CancelToken, ObligationKind, ObligationList, PogError, PogOptions,
    ProofObligation,
};

// ============================================================================
// Tree builders
// ============================================================================

fn at(line: u32) -> Span {
    Span::point(FileId(0), line, 1)
}

fn var(name: &str, ty: Type) -> Expr {
    Expr::new(ExprKind::Var(name.into()), ty, at(1))
}

fn nat1(n: i64) -> Expr {
    Expr::new(ExprKind::Int(BigInt::from(n)), Type::Nat1, at(1))
}

fn binary(op: BinaryOp, l: Expr, r: Expr, ty: Type) -> Expr {
    Expr::new(ExprKind::Binary(op, Box::new(l), Box::new(r)), ty, at(1))
}

fn gt_zero(name: &str) -> Expr {
    binary(
        BinaryOp::Gt,
        var(name, Type::Nat),
        Expr::new(ExprKind::Int(BigInt::from(0)), Type::Nat, at(1)),
        Type::Bool,
    )
}

fn assign(name: &str, value: Expr, line: u32) -> Stmt {
    Stmt::new(
        StmtKind::Assign(Assignment {
            target: Designator::Name(name.into()),
            target_ty: Type::Nat,
            value,
            span: at(line),
        }),
        at(line),
    )
}

fn block(stmts: Vec<Stmt>) -> Stmt {
    Stmt::new(
        StmtKind::Block {
            dcls: vec![],
            stmts,
        },
        at(1),
    )
}

fn call(name: &str, args: Vec<Expr>, line: u32) -> Stmt {
    Stmt::new(
        StmtKind::Call {
            name: name.into(),
            args,
        },
        at(line),
    )
}

fn operation(
    name: &str,
    params: &[(&str, Type)],
    pre: Option<Expr>,
    body: Stmt,
    line: u32,
) -> Spanned<Definition> {
    Spanned::new(
        Definition::ExplicitOperation(ExplicitOperation {
            name: name.into(),
            params: params.iter().map(|(p, _)| Pattern::Ident((*p).into())).collect(),
            param_types: params.iter().map(|(_, t)| t.clone()).collect(),
            result: Type::Void,
            body,
            pre,
            post: None,
            pure: false,
        }),
        at(line),
    )
}

fn function(
    name: &str,
    params: &[(&str, Type)],
    result: Type,
    body: Expr,
) -> Spanned<Definition> {
    Spanned::new(
        Definition::ExplicitFunction(ExplicitFunction {
            name: name.into(),
            params: params.iter().map(|(p, _)| Pattern::Ident((*p).into())).collect(),
            param_types: params.iter().map(|(_, t)| t.clone()).collect(),
            result,
            partial: false,
            body,
            pre: None,
            post: None,
        }),
        at(1),
    )
}

/// State `St` of `x, y: nat` with `inv mk_St(x, y) == <inv_on> > 0`
fn state(inv_on: &str) -> StateDef {
    StateDef {
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
        inv: Some(Invariant {
            pattern: Pattern::Record {
                name: "St".into(),
                fields: vec![Pattern::Ident("x".into()), Pattern::Ident("y".into())],
            },
            body: gt_zero(inv_on),
        }),
        init: None,
        span: at(1),
    }
}

fn module(state: Option<StateDef>, definitions: Vec<Spanned<Definition>>) -> Module {
    Module {
        name: "M".into(),
        file: "m.vdmsl".into(),
        state,
        imports: vec![],
        definitions,
    }
}

fn obligations_of<'a>(list: &'a ObligationList, definition: &str) -> Vec<&'a ProofObligation> {
    list.iter().filter(|po| po.name == definition).collect()
}

fn choose_module() -> Module {
    let body = Stmt::new(
        StmtKind::If {
            cond: gt_zero("x"),
            then: Box::new(assign("y", nat1(1), 3)),
            elseifs: vec![],
            else_: Some(Box::new(assign("y", nat1(2), 4))),
        },
        at(2),
    );
    module(Some(state("y")), vec![operation("Choose", &[], None, body, 2)])
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_if_else_state_invariants_end_to_end() {
    let pos = generate(&choose_module(), &PogOptions::default()).unwrap();
    assert_eq!(pos.len(), 2);

    let first = pos.get(0).unwrap();
    assert_eq!(first.number, 1);
    assert_eq!(first.kind, ObligationKind::StateInvariant);
    assert_eq!(first.text, "(x > 0) =>\n  (let y = 1 in\n    (y > 0))");
    assert!(first.checkable);
    assert_eq!(first.message, None);

    let second = pos.get(1).unwrap();
    assert_eq!(second.number, 2);
    assert_eq!(second.kind, ObligationKind::StateInvariant);
    assert_eq!(second.text, "not (x > 0) =>\n  (let y = 2 in\n    (y > 0))");
    assert!(second.checkable);
}

#[test]
fn test_generation_is_deterministic() {
    let module = choose_module();
    let first = generate(&module, &PogOptions::default()).unwrap();
    let second = generate(&module, &PogOptions::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_render_classic_layout() {
    let pos = generate(&choose_module(), &PogOptions::default()).unwrap();
    let text = pos.get(0).unwrap().render(100);
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("Proof Obligation 1: (Unchecked)"));
    assert_eq!(
        lines.next(),
        Some("Choose: state invariant obligation in 'M' (m.vdmsl) at line 3:1")
    );
    assert_eq!(lines.next(), Some("(x > 0) =>"));
}

#[test]
fn test_branch_join_keeps_prior_ambiguity() {
    let touch = operation("Touch", &[], None, assign("x", nat1(2), 2), 2);
    let body = block(vec![
        call("Touch", vec![], 5),
        Stmt::new(
            StmtKind::If {
                cond: gt_zero("y"),
                then: Box::new(assign("x", nat1(1), 7)),
                elseifs: vec![],
                else_: None,
            },
            at(6),
        ),
        assign("y", nat1(1), 8),
    ]);
    let main = operation("Main", &[], None, body, 4);
    let m = module(Some(state("x")), vec![touch, main]);
    let pos = generate(&m, &PogOptions::default()).unwrap();

    let main_pos = obligations_of(&pos, "Main");
    assert_eq!(main_pos.len(), 2);
    // Inside the branch x has a known value again
    assert!(main_pos[0].checkable);
    assert_eq!(
        main_pos[0].text,
        "(y > 0) =>\n  (let x = 1 in\n    (x > 0))"
    );
    // After the join it does not
    assert!(!main_pos[1].checkable);
    assert_eq!(main_pos[1].message.as_deref(), Some("HAS_AMBIGUOUS_STATE"));
}

#[test]
fn test_atomic_assignment_is_simultaneous() {
    let body = Stmt::new(
        StmtKind::Atomic(vec![
            Assignment {
                target: Designator::Name("x".into()),
                target_ty: Type::Nat,
                value: var("y", Type::Nat),
                span: at(3),
            },
            Assignment {
                target: Designator::Name("y".into()),
                target_ty: Type::Nat,
                value: var("x", Type::Nat),
                span: at(4),
            },
        ]),
        at(2),
    );
    let pos = generate(
        &module(Some(state("y")), vec![operation("Swap", &[], None, body, 2)]),
        &PogOptions::default(),
    )
    .unwrap();

    assert_eq!(pos.len(), 1);
    let po = pos.get(0).unwrap();
    assert_eq!(po.kind, ObligationKind::StateInvariant);
    assert_eq!(po.text, "(let mk_(x, y) = mk_(y, x) in\n  (y > 0))");
}

fn loop_module(callee_updates: bool) -> Module {
    let callee_body = if callee_updates {
        assign("x", var("e", Type::Nat), 2)
    } else {
        Stmt::new(StmtKind::Skip, at(2))
    };
    let callee = operation(
        "Op",
        &[("e", Type::Nat)],
        Some(gt_zero("e")),
        callee_body,
        2,
    );
    let body = Stmt::new(
        StmtKind::ForAllSet {
            pattern: Pattern::Ident("e".into()),
            set: var("S", Type::set_of(Type::Nat)),
            body: Box::new(call("Op", vec![var("e", Type::Nat)], 6)),
        },
        at(5),
    );
    let main = operation("Main", &[("S", Type::set_of(Type::Nat))], None, body, 4);
    module(Some(state("y")), vec![callee, main])
}

#[test]
fn test_loop_calling_updating_operation_is_stamped() {
    let pos = generate(&loop_module(true), &PogOptions::default()).unwrap();
    let main_pos = obligations_of(&pos, "Main");
    assert_eq!(main_pos.len(), 1);
    assert_eq!(main_pos[0].kind, ObligationKind::OperationCall);
    assert_eq!(
        main_pos[0].text,
        "(forall S:set of nat &\n  (forall e in set S &\n    (pre_Op(e))))"
    );
    assert_eq!(main_pos[0].message.as_deref(), Some("LOOP_STATEMENT"));
}

#[test]
fn test_loop_with_read_only_body_is_not_stamped() {
    let pos = generate(&loop_module(false), &PogOptions::default()).unwrap();
    let main_pos = obligations_of(&pos, "Main");
    assert_eq!(main_pos.len(), 1);
    assert!(main_pos[0].checkable);
    assert_eq!(main_pos[0].message, None);
}

// ============================================================================
// Extraction and expressions
// ============================================================================

#[test]
fn test_embedded_call_is_lifted_to_placeholder() {
    let get = Spanned::new(
        Definition::ExplicitOperation(ExplicitOperation {
            name: "Get".into(),
            params: vec![],
            param_types: vec![],
            result: Type::Nat,
            body: Stmt::new(StmtKind::Return(Some(var("x", Type::Nat))), at(2)),
            pre: None,
            post: None,
            pure: false,
        }),
        at(2),
    );
    let value = binary(
        BinaryOp::Add,
        Expr::new(
            ExprKind::OpCall {
                name: "Get".into(),
                args: vec![],
            },
            Type::Nat,
            at(5),
        ),
        nat1(1),
        Type::Nat,
    );
    let main = operation("Main", &[], None, assign("y", value, 5), 4);
    let pos = generate(&module(Some(state("y")), vec![get, main]), &PogOptions::default()).unwrap();

    let main_pos = obligations_of(&pos, "Main");
    assert_eq!(main_pos.len(), 1);
    assert_eq!(
        main_pos[0].text,
        "(forall $Get1:nat &\n  (let y = $Get1 + 1 in\n    (y > 0)))"
    );
    assert!(main_pos[0].checkable);
}

#[test]
fn test_division_needs_non_zero_divisor() {
    let body = binary(
        BinaryOp::IntDiv,
        var("a", Type::Int),
        var("b", Type::Int),
        Type::Int,
    );
    let f = function("f", &[("a", Type::Int), ("b", Type::Int)], Type::Int, body);
    let pos = generate(&module(None, vec![f]), &PogOptions::default()).unwrap();

    assert_eq!(pos.len(), 1);
    let po = pos.get(0).unwrap();
    assert_eq!(po.kind, ObligationKind::NonZero);
    assert_eq!(po.text, "(forall a:int, b:int &\n  (b <> 0))");
}

#[test]
fn test_skip_trivial_drops_literal_divisor() {
    let body = binary(BinaryOp::IntDiv, var("a", Type::Int), nat1(2), Type::Int);
    let m = module(None, vec![function("half", &[("a", Type::Int)], Type::Int, body)]);

    assert_eq!(generate(&m, &PogOptions::default()).unwrap().len(), 1);
    let options = PogOptions {
        skip_trivial: true,
        ..PogOptions::default()
    };
    assert!(generate(&m, &options).unwrap().is_empty());
}

#[test]
fn test_map_application_needs_key_in_domain() {
    let map_ty = Type::map_of(Type::Nat, Type::Nat);
    let body = Expr::new(
        ExprKind::Apply {
            root: Box::new(var("m", map_ty.clone())),
            args: vec![var("k", Type::Nat)],
        },
        Type::Nat,
        at(1),
    );
    let g = function("g", &[("m", map_ty), ("k", Type::Nat)], Type::Nat, body);
    let pos = generate(&module(None, vec![g]), &PogOptions::default()).unwrap();

    assert_eq!(pos.len(), 1);
    let po = pos.get(0).unwrap();
    assert_eq!(po.kind, ObligationKind::MapApply);
    assert_eq!(po.text, "(forall m:map nat to nat, k:nat &\n  (k in set dom m))");
}

// ============================================================================
// Statement forms
// ============================================================================

fn touch() -> Spanned<Definition> {
    operation("Touch", &[], None, assign("x", nat1(2), 2), 2)
}

fn main_of(pos: &ObligationList) -> Vec<&ProofObligation> {
    obligations_of(pos, "Main")
}

fn messages<'a>(pos: &[&'a ProofObligation]) -> Vec<Option<&'a str>> {
    pos.iter().map(|po| po.message.as_deref()).collect()
}

#[test]
fn test_while_emits_termination_then_stamped_body() {
    let body = Stmt::new(
        StmtKind::While {
            cond: gt_zero("x"),
            body: Box::new(assign("y", nat1(1), 4)),
        },
        at(3),
    );
    let m = module(Some(state("y")), vec![operation("Main", &[], None, body, 2)]);
    let pos = generate(&m, &PogOptions::default()).unwrap();

    assert_eq!(pos.len(), 2);
    let termination = pos.get(0).unwrap();
    assert_eq!(termination.kind, ObligationKind::WhileLoopTermination);
    assert_eq!(termination.text, "while (x > 0) do ...");
    assert!(termination.checkable);

    let invariant = pos.get(1).unwrap();
    assert_eq!(invariant.kind, ObligationKind::StateInvariant);
    assert_eq!(invariant.text, "(x > 0) =>\n  (let y = 1 in\n    (y > 0))");
    assert_eq!(invariant.message.as_deref(), Some("LOOP_STATEMENT"));
}

#[test]
fn test_non_deterministic_alternatives_that_update_are_stamped() {
    let body = Stmt::new(
        StmtKind::NonDet(vec![
            assign("x", nat1(1), 3),
            assign("y", nat1(1), 4),
            Stmt::new(StmtKind::Skip, at(5)),
        ]),
        at(3),
    );
    let m = module(Some(state("y")), vec![operation("Main", &[], None, body, 2)]);
    let pos = generate(&m, &PogOptions::default()).unwrap();

    let texts: Vec<&str> = pos.iter().map(|po| po.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["(let x = 1 in\n  (y > 0))", "(let y = 1 in\n  (y > 0))"]
    );
    assert!(pos
        .iter()
        .all(|po| po.message.as_deref() == Some("NON_DETERMINISTIC")));
}

#[test]
fn test_trap_handler_is_stamped_and_state_is_unknown_after() {
    let trap = Stmt::new(
        StmtKind::Trap {
            bind: PatternBind::Pattern(Pattern::Ident("e".into())),
            handler: Box::new(assign("y", nat1(1), 4)),
            body: Box::new(assign("x", nat1(1), 3)),
        },
        at(3),
    );
    let body = block(vec![trap, assign("x", nat1(2), 6)]);
    let m = module(Some(state("y")), vec![operation("Main", &[], None, body, 2)]);
    let pos = generate(&m, &PogOptions::default()).unwrap();

    assert_eq!(pos.len(), 3);
    let texts: Vec<&str> = pos.iter().map(|po| po.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "(let x = 1 in\n  (y > 0))",
            "(let y = 1 in\n  (y > 0))",
            "(let x = 2 in\n  (y > 0))",
        ]
    );
    let main = main_of(&pos);
    assert_eq!(
        messages(&main),
        vec![None, Some("NOT_YET_SUPPORTED"), Some("HAS_AMBIGUOUS_STATE")]
    );
}

#[test]
fn test_block_drops_frame_of_local_that_becomes_unknown() {
    let body = Stmt::new(
        StmtKind::Block {
            dcls: vec![LocalDecl {
                name: "n".into(),
                ty: Type::Nat,
                init: Some(nat1(1)),
                span: at(5),
            }],
            stmts: vec![
                call("Touch", vec![], 6),
                assign("n", var("x", Type::Nat), 7),
                assign("y", nat1(1), 8),
            ],
        },
        at(5),
    );
    let main = operation("Main", &[], None, body, 4);
    let pos = generate(&module(Some(state("y")), vec![touch(), main]), &PogOptions::default())
        .unwrap();

    let main = main_of(&pos);
    assert_eq!(main.len(), 1);
    assert_eq!(main[0].text, "(let y = 1 in\n  (y > 0))");
    assert!(main[0].checkable);
}

fn cases_module(pattern: Pattern) -> Module {
    let cases = Stmt::new(
        StmtKind::Cases {
            subject: var("x", Type::Nat),
            alts: vec![CaseStmtAlt {
                patterns: vec![pattern],
                body: assign("y", nat1(1), 4),
            }],
            others: None,
        },
        at(3),
    );
    let body = block(vec![cases, assign("x", nat1(1), 6)]);
    module(Some(state("y")), vec![operation("Main", &[], None, body, 2)])
}

#[test]
fn test_cases_without_others_falls_through() {
    let pos = generate(&cases_module(Pattern::Int(1.into())), &PogOptions::default()).unwrap();

    assert_eq!(pos.len(), 2);
    let alt = pos.get(0).unwrap();
    assert_eq!(alt.text, "(x = 1) =>\n  (let y = 1 in\n    (y > 0))");
    assert!(alt.checkable);
    // y is updated on one path only
    let after = pos.get(1).unwrap();
    assert_eq!(after.message.as_deref(), Some("HAS_AMBIGUOUS_STATE"));
}

#[test]
fn test_cases_with_catch_all_pattern_has_no_fall_through() {
    let pos = generate(&cases_module(Pattern::Ident("v".into())), &PogOptions::default()).unwrap();

    assert_eq!(pos.len(), 2);
    assert_eq!(
        pos.get(0).unwrap().text,
        "(let v = x in\n  (let y = 1 in\n    (y > 0)))"
    );
    assert!(pos.get(1).unwrap().checkable);
}

#[test]
fn test_let_be_statement_emits_existence_first() {
    let set = Expr::new(
        ExprKind::SetEnum(vec![
            nat1(1),
            binary(BinaryOp::IntDiv, nat1(2), var("y", Type::Nat), Type::Nat),
        ]),
        Type::set_of(Type::Nat),
        at(3),
    );
    let body = Stmt::new(
        StmtKind::LetBeSt {
            bind: MultipleBind::Set {
                patterns: vec![Pattern::Ident("e".into())],
                set,
            },
            suchthat: Some(gt_zero("e")),
            body: Box::new(Stmt::new(StmtKind::Skip, at(3))),
        },
        at(3),
    );
    let m = module(Some(state("y")), vec![operation("Main", &[], None, body, 2)]);
    let pos = generate(&m, &PogOptions::default()).unwrap();

    let kinds: Vec<ObligationKind> = pos.iter().map(|po| po.kind).collect();
    assert_eq!(kinds, vec![ObligationKind::LetBeExists, ObligationKind::NonZero]);
    assert_eq!(
        pos.get(0).unwrap().text,
        "exists e in set {1, 2 div y} & e > 0"
    );
    assert_eq!(pos.get(1).unwrap().text, "y <> 0");
}

#[test]
fn test_let_be_expression_emits_existence_first() {
    let set = Expr::new(
        ExprKind::SetEnum(vec![
            nat1(1),
            binary(BinaryOp::IntDiv, nat1(2), var("a", Type::Nat), Type::Nat),
        ]),
        Type::set_of(Type::Nat),
        at(1),
    );
    let body = Expr::new(
        ExprKind::LetBeSt {
            bind: Box::new(MultipleBind::Set {
                patterns: vec![Pattern::Ident("e".into())],
                set,
            }),
            suchthat: Some(Box::new(gt_zero("e"))),
            body: Box::new(var("e", Type::Nat)),
        },
        Type::Nat,
        at(1),
    );
    let f = function("pick", &[("a", Type::Nat)], Type::Nat, body);
    let pos = generate(&module(None, vec![f]), &PogOptions::default()).unwrap();

    let kinds: Vec<ObligationKind> = pos.iter().map(|po| po.kind).collect();
    assert_eq!(kinds, vec![ObligationKind::LetBeExists, ObligationKind::NonZero]);
    assert_eq!(
        pos.get(0).unwrap().text,
        "(forall a:nat &\n  (exists e in set {1, 2 div a} & e > 0))"
    );
}

#[test]
fn test_specification_statement_post_under_pre() {
    let post = binary(
        BinaryOp::Gt,
        binary(
            BinaryOp::IntDiv,
            var("y", Type::Nat),
            var("x", Type::Nat),
            Type::Nat,
        ),
        Expr::new(ExprKind::Int(BigInt::from(0)), Type::Nat, at(1)),
        Type::Bool,
    );
    let body = Stmt::new(
        StmtKind::Specification(SpecificationStmt {
            externals: vec![],
            pre: Some(gt_zero("x")),
            post,
            errs: vec![],
        }),
        at(3),
    );
    let m = module(Some(state("y")), vec![operation("Main", &[], None, body, 2)]);
    let pos = generate(&m, &PogOptions::default()).unwrap();

    assert_eq!(pos.len(), 1);
    let po = pos.get(0).unwrap();
    assert_eq!(po.kind, ObligationKind::NonZero);
    assert_eq!(po.text, "(x > 0) =>\n  (x <> 0)");
}

#[test]
fn test_object_call_makes_all_state_opaque() {
    let call_object = Stmt::new(
        StmtKind::CallObject {
            object: Designator::Name("obj".into()),
            name: "Op".into(),
            args: vec![],
        },
        at(3),
    );
    let body = block(vec![call_object, assign("x", nat1(1), 4)]);
    let m = module(Some(state("y")), vec![operation("Main", &[], None, body, 2)]);
    let pos = generate(&m, &PogOptions::default()).unwrap();

    assert_eq!(pos.len(), 1);
    let po = pos.get(0).unwrap();
    assert_eq!(po.text, "(let x = 1 in\n  (y > 0))");
    assert_eq!(po.message.as_deref(), Some("OPAQUE_OPERATION_CALL"));
}

#[test]
fn test_branch_on_unknown_condition_is_stamped() {
    let branch = Stmt::new(
        StmtKind::If {
            cond: gt_zero("x"),
            then: Box::new(assign("y", nat1(1), 7)),
            elseifs: vec![],
            else_: None,
        },
        at(6),
    );
    let body = block(vec![call("Touch", vec![], 5), branch]);
    let main = operation("Main", &[], None, body, 4);
    let pos = generate(&module(Some(state("y")), vec![touch(), main]), &PogOptions::default())
        .unwrap();

    let main = main_of(&pos);
    assert_eq!(main.len(), 1);
    assert_eq!(main[0].text, "(x > 0) =>\n  (let y = 1 in\n    (y > 0))");
    assert_eq!(main[0].message.as_deref(), Some("HAS_AMBIGUOUS_STATE"));
}

#[test]
fn test_post_condition_reading_updated_state_is_stamped() {
    let post = binary(
        BinaryOp::Gt,
        binary(BinaryOp::IntDiv, nat1(10), var("y", Type::Nat), Type::Nat),
        Expr::new(ExprKind::Int(BigInt::from(0)), Type::Nat, at(1)),
        Type::Bool,
    );
    let bump = Spanned::new(
        Definition::ExplicitOperation(ExplicitOperation {
            name: "Bump".into(),
            params: vec![],
            param_types: vec![],
            result: Type::Void,
            body: assign("y", nat1(1), 3),
            pre: None,
            post: Some(post),
            pure: false,
        }),
        at(2),
    );
    let pos = generate(&module(Some(state("y")), vec![bump]), &PogOptions::default()).unwrap();

    let kinds: Vec<ObligationKind> = pos.iter().map(|po| po.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ObligationKind::StateInvariant,
            ObligationKind::NonZero,
            ObligationKind::OperationPostCondition,
        ]
    );
    assert_eq!(pos.get(1).unwrap().text, "y <> 0");
    assert_eq!(
        pos.get(1).unwrap().message.as_deref(),
        Some("HAS_UPDATED_STATE")
    );
    assert_eq!(
        pos.get(2).unwrap().message.as_deref(),
        Some("HAS_UPDATED_STATE")
    );
}

#[test]
fn test_unliftable_call_keeps_its_precondition() {
    let get = Spanned::new(
        Definition::ExplicitOperation(ExplicitOperation {
            name: "Get".into(),
            params: vec![Pattern::Ident("a".into())],
            param_types: vec![Type::Nat],
            result: Type::Nat,
            body: Stmt::new(StmtKind::Return(Some(var("a", Type::Nat))), at(2)),
            pre: Some(gt_zero("a")),
            post: None,
            pure: false,
        }),
        at(2),
    );
    let guarded = Expr::new(
        ExprKind::If {
            cond: Box::new(gt_zero("x")),
            then: Box::new(Expr::new(
                ExprKind::OpCall {
                    name: "Get".into(),
                    args: vec![var("x", Type::Nat)],
                },
                Type::Nat,
                at(5),
            )),
            elseifs: vec![],
            else_: Box::new(nat1(1)),
        },
        Type::Nat,
        at(5),
    );
    let main = operation("Main", &[], None, assign("y", guarded, 5), 4);
    let pos = generate(&module(Some(state("y")), vec![get, main]), &PogOptions::default())
        .unwrap();

    let main = main_of(&pos);
    assert_eq!(main.len(), 2);
    assert_eq!(main[0].kind, ObligationKind::OperationCall);
    assert_eq!(main[0].text, "(x > 0) =>\n  (pre_Get(x))");
    assert_eq!(main[0].message.as_deref(), Some("HAS_AMBIGUOUS_STATE"));
    assert_eq!(main[1].kind, ObligationKind::StateInvariant);
    assert_eq!(main[1].text, "y > 0");
    assert_eq!(main[1].message.as_deref(), Some("HAS_AMBIGUOUS_STATE"));
}

// ============================================================================
// Errors and cancellation
// ============================================================================

#[test]
fn test_assignment_to_unknown_name_is_structural_error() {
    let bad = operation("Bad", &[], None, assign("z", nat1(1), 3), 2);
    let err = generate(&module(Some(state("y")), vec![bad]), &PogOptions::default()).unwrap_err();
    assert!(matches!(err, PogError::Structural { .. }));
    assert_eq!(err.span(), Some(at(3)));
}

#[test]
fn test_cancelled_generation_stops() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = generate_module(&choose_module(), &PogOptions::default(), &cancel);
    assert!(matches!(result, Err(PogError::Cancelled)));
}
