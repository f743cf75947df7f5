use arbor_ir::{
    Arg, ArrayOp, Block, BlockKind, ClassId, Expr, FieldIdx, Param, ProgramBuilder,
    SharedInterner, Signature, Slot, Upvalue,
};
use pretty_assertions::assert_eq;

use super::validate;
use crate::bindings::{Bindings, ClassBinding};
use crate::ScriptErrorKind;

fn setup() -> (ProgramBuilder, Bindings) {
    let interner = SharedInterner::new();
    (
        ProgramBuilder::new(interner.clone()),
        Bindings::with_prelude(interner),
    )
}

fn check(builder: ProgramBuilder, bindings: &Bindings) -> Result<(), ScriptErrorKind> {
    validate(&builder.finish(), bindings).map_err(|err| err.kind)
}

#[test]
fn test_well_formed_program_passes() {
    let (mut builder, bindings) = setup();
    let trace = bindings.find_func("trace").unwrap();
    let helper = builder.func(
        "helper",
        Signature::new(1)
            .param(Param::new(Slot::new(0)).with_default(Expr::num(3.0)))
            .returns(1),
        Block::seq(vec![Expr::ret(vec![Expr::var(Slot::new(0))])]),
    );
    builder.func(
        "main",
        Signature::new(1),
        Block::seq(vec![
            Expr::declare(Slot::new(0), Some(Expr::call(helper, vec![Arg::Default]))),
            Expr::native(trace, vec![Arg::value(Expr::str("hi"))]),
            Expr::while_loop(Expr::bool(true), Block::seq(vec![Expr::Break])),
        ]),
    );
    assert_eq!(check(builder, &bindings), Ok(()));
}

#[test]
fn test_slot_out_of_range() {
    let (mut builder, bindings) = setup();
    builder.func(
        "main",
        Signature::new(1),
        Block::seq(vec![Expr::assign(Slot::new(1), Expr::num(1.0))]),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::SlotOutOfRange {
            slot: Slot::new(1),
            locals: 1,
        })
    );
}

#[test]
fn test_argument_count_mismatch() {
    let (mut builder, bindings) = setup();
    let trace = bindings.find_func("trace").unwrap();
    builder.func(
        "main",
        Signature::new(0),
        Block::seq(vec![Expr::native(trace, Vec::new())]),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::ArgCount {
            callee: "trace".to_owned(),
            expected: 1,
            got: 0,
        })
    );
}

#[test]
fn test_ref_flags_must_match() {
    let (mut builder, bindings) = setup();
    let inc = builder.func(
        "inc",
        Signature::new(1).param(Param::new(Slot::new(0)).by_ref()),
        Block::seq(Vec::new()),
    );
    let plain = builder.func(
        "plain",
        Signature::new(1).param(Param::new(Slot::new(0))),
        Block::seq(Vec::new()),
    );
    builder.func(
        "by_value",
        Signature::new(1),
        Block::seq(vec![Expr::call(inc, vec![Arg::value(Expr::num(1.0))])]),
    );
    builder.func(
        "by_ref",
        Signature::new(1),
        Block::seq(vec![Expr::call(plain, vec![Arg::Ref(Slot::new(0))])]),
    );
    let program = builder.finish();
    let err = validate(&program, &bindings).unwrap_err();
    assert_eq!(
        err.kind,
        ScriptErrorKind::RefRequired {
            callee: "inc".to_owned(),
            index: 0,
        }
    );
    assert_eq!(err.func, "by_value");
}

#[test]
fn test_ref_on_value_param() {
    let (mut builder, bindings) = setup();
    let plain = builder.func(
        "plain",
        Signature::new(1).param(Param::new(Slot::new(0))),
        Block::seq(Vec::new()),
    );
    builder.func(
        "main",
        Signature::new(1),
        Block::seq(vec![Expr::call(plain, vec![Arg::Ref(Slot::new(0))])]),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::RefNotAllowed {
            callee: "plain".to_owned(),
            index: 0,
        })
    );
}

#[test]
fn test_default_without_declared_default() {
    let (mut builder, bindings) = setup();
    let trace = bindings.find_func("trace").unwrap();
    builder.func(
        "main",
        Signature::new(0),
        Block::seq(vec![Expr::native(trace, vec![Arg::Default])]),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::MissingDefault {
            callee: "trace".to_owned(),
            index: 0,
        })
    );
}

#[test]
fn test_break_outside_loop() {
    let (mut builder, bindings) = setup();
    builder.func("main", Signature::new(0), Block::seq(vec![Expr::Continue]));
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::LoopControl("continue"))
    );
}

#[test]
fn test_break_inside_forever() {
    let (mut builder, bindings) = setup();
    builder.func(
        "main",
        Signature::new(0),
        Block::seq(vec![Expr::block(BlockKind::Forever, vec![Expr::Break])]),
    );
    assert_eq!(check(builder, &bindings), Ok(()));
}

#[test]
fn test_return_count_counts_call_results() {
    let (mut builder, bindings) = setup();
    let pair = builder.func(
        "pair",
        Signature::new(0).returns(2),
        Block::seq(vec![Expr::ret(vec![Expr::num(1.0), Expr::str("a")])]),
    );
    builder.func(
        "forward",
        Signature::new(0).returns(2),
        Block::seq(vec![Expr::ret(vec![Expr::call(pair, Vec::new())])]),
    );
    builder.func(
        "short",
        Signature::new(0).returns(2),
        Block::seq(vec![Expr::ret(vec![Expr::num(1.0)])]),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::ReturnCount {
            expected: 2,
            got: 1,
        })
    );
}

#[test]
fn test_lambda_parentage() {
    let (mut builder, bindings) = setup();
    let owner = builder.declare("owner", Signature::new(1));
    let lambda = builder.lambda(
        owner,
        Signature::new(1),
        vec![Upvalue::by_ref(Slot::new(0), Slot::new(0))],
        Block::seq(Vec::new()),
    );
    builder.define(owner, Block::seq(vec![Expr::discard(Expr::Lambda(lambda), 1)]));
    builder.func(
        "thief",
        Signature::new(1),
        Block::seq(vec![Expr::discard(Expr::Lambda(lambda), 1)]),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::LambdaParent(lambda))
    );
}

#[test]
fn test_lambda_expression_needs_lambda_decl() {
    let (mut builder, bindings) = setup();
    let plain = builder.func("plain", Signature::new(0), Block::seq(Vec::new()));
    builder.func(
        "main",
        Signature::new(0),
        Block::seq(vec![Expr::discard(Expr::Lambda(plain), 1)]),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::NotALambda(plain))
    );
}

#[test]
fn test_upvalue_source_checked_against_parent() {
    let (mut builder, bindings) = setup();
    let owner = builder.func("owner", Signature::new(1), Block::seq(Vec::new()));
    builder.lambda(
        owner,
        Signature::new(1),
        vec![Upvalue::by_value(Slot::new(4), Slot::new(0))],
        Block::seq(Vec::new()),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::SlotOutOfRange {
            slot: Slot::new(4),
            locals: 1,
        })
    );
}

#[test]
fn test_unresolved_targets() {
    let (mut builder, bindings) = setup();
    builder.func(
        "main",
        Signature::new(0),
        Block::seq(vec![Expr::call(arbor_ir::FuncId::new(99), Vec::new())]),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::UnresolvedFunc(arbor_ir::FuncId::new(99)))
    );
}

#[test]
fn test_fields_resolve_against_class_binding() {
    let (mut builder, mut bindings) = setup();
    let name = bindings.interner().intern("Point");
    let num = bindings.interner().intern("float");
    let x = bindings.interner().intern("x");
    let point = bindings.define_class(ClassBinding::new(name).stored(x, num));
    builder.func(
        "main",
        Signature::new(0),
        Block::seq(vec![Expr::discard(
            Expr::New {
                class: point,
                fields: vec![(FieldIdx::new(1), Expr::num(1.0))],
            },
            1,
        )]),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::UnresolvedField {
            class: point,
            field: FieldIdx::new(1),
        })
    );

    let (mut builder, bindings) = setup();
    builder.func(
        "main",
        Signature::new(0),
        Block::seq(vec![Expr::discard(
            Expr::get_field(Expr::nil(), ClassId::new(0), FieldIdx::new(0)),
            1,
        )]),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::UnresolvedClass(ClassId::new(0)))
    );
}

#[test]
fn test_array_op_arity() {
    let (mut builder, bindings) = setup();
    builder.func(
        "main",
        Signature::new(0),
        Block::seq(vec![Expr::array_op(ArrayOp::Add, vec![Expr::nil()])]),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::ArgCount {
            callee: "Add".to_owned(),
            expected: 2,
            got: 1,
        })
    );
}

#[test]
fn test_defaults_may_not_name_slots() {
    let (mut builder, bindings) = setup();
    builder.func(
        "f",
        Signature::new(1).param(Param::new(Slot::new(0)).with_default(Expr::var(Slot::new(0)))),
        Block::seq(Vec::new()),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::SlotOutOfRange {
            slot: Slot::new(0),
            locals: 0,
        })
    );
}

#[test]
fn test_field_refs_need_stored_fields() {
    let (mut builder, mut bindings) = setup();
    let interner = bindings.interner().clone();
    let float = interner.intern("float");
    let counter = bindings.define_class(
        ClassBinding::new(interner.intern("Counter"))
            .stored(interner.intern("total"), float)
            .computed(interner.intern("n"), float, |_| crate::Value::Nil, None),
    );
    let bump = builder.func(
        "bump",
        Signature::new(1).param(Param::new(Slot::new(0)).by_ref()),
        Block::seq(Vec::new()),
    );
    let object = Expr::New {
        class: counter,
        fields: Vec::new(),
    };
    builder.func(
        "main",
        Signature::new(0),
        Block::seq(vec![
            Expr::call(bump, vec![Arg::field_ref(object.clone(), counter, FieldIdx::new(0))]),
            Expr::call(bump, vec![Arg::field_ref(object, counter, FieldIdx::new(1))]),
        ]),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::FieldNotRef {
            class: counter,
            field: FieldIdx::new(1),
        })
    );
}

#[test]
fn test_field_ref_on_value_param() {
    let (mut builder, mut bindings) = setup();
    let interner = bindings.interner().clone();
    let point = bindings.define_class(
        ClassBinding::new(interner.intern("Point")).stored(interner.intern("x"), interner.intern("float")),
    );
    let show = builder.func(
        "show",
        Signature::new(1).param(Param::new(Slot::new(0))),
        Block::seq(Vec::new()),
    );
    builder.func(
        "main",
        Signature::new(0),
        Block::seq(vec![Expr::call(
            show,
            vec![Arg::field_ref(
                Expr::New {
                    class: point,
                    fields: Vec::new(),
                },
                point,
                FieldIdx::new(0),
            )],
        )]),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::RefNotAllowed {
            callee: "show".to_owned(),
            index: 0,
        })
    );
}

#[test]
fn test_class_cast_target_resolves() {
    let (mut builder, bindings) = setup();
    builder.func(
        "main",
        Signature::new(0),
        Block::seq(vec![Expr::discard(
            Expr::cast(arbor_ir::CastKind::Class(ClassId::new(3)), Expr::nil()),
            1,
        )]),
    );
    assert_eq!(
        check(builder, &bindings),
        Err(ScriptErrorKind::UnresolvedClass(ClassId::new(3)))
    );
}
