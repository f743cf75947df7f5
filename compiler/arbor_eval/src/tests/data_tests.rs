//! Arrays, objects, operators and reference counting.

use std::any::Any;

use arbor_ir::{
    Arg, ArrayOp, BinaryOp, CastKind, ClassId, Expr, FieldIdx, LogicalOp, Param, Signature,
};
use pretty_assertions::assert_eq;

use super::{assert_idle, binary, call, output, seq, slot, Fixture};
use crate::{ClassBinding, EvalError, RefOp, Status, Value};

fn field(index: u16) -> FieldIdx {
    FieldIdx::new(index)
}

#[test]
fn test_array_operations() {
    let mut f = Fixture::new();
    f.program.func(
        "test",
        Signature::new(1).returns(2),
        seq(vec![
            Expr::declare(
                slot(0),
                Some(Expr::Array(vec![Expr::num(1.0), Expr::num(2.0)])),
            ),
            Expr::array_op(ArrayOp::Add, vec![Expr::var(slot(0)), Expr::num(3.0)]),
            Expr::array_op(ArrayOp::RemoveAt, vec![Expr::var(slot(0)), Expr::num(0.0)]),
            Expr::array_op(
                ArrayOp::SetAt,
                vec![Expr::var(slot(0)), Expr::num(0.0), Expr::num(20.0)],
            ),
            Expr::ret(vec![
                Expr::array_op(ArrayOp::Count, vec![Expr::var(slot(0))]),
                binary(
                    BinaryOp::Add,
                    Expr::array_op(ArrayOp::At, vec![Expr::var(slot(0)), Expr::num(0.0)]),
                    Expr::array_op(ArrayOp::At, vec![Expr::var(slot(0)), Expr::num(1.0)]),
                ),
            ]),
        ]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        interp.exec_node(&mut node, 2).unwrap().values,
        vec![Value::Num(2.0), Value::Num(23.0)]
    );
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

#[test]
fn test_array_index_out_of_bounds_aborts() {
    let mut f = Fixture::new();
    f.program.func(
        "test",
        Signature::new(0).returns(1),
        seq(vec![Expr::ret(vec![Expr::array_op(
            ArrayOp::At,
            vec![Expr::Array(vec![Expr::num(1.0)]), Expr::num(5.0)],
        )])]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        node.run(&mut interp),
        Err(EvalError::IndexOutOfBounds { index: 5, len: 1 })
    );
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

#[test]
fn test_returned_array_outlives_the_call() {
    let mut f = Fixture::new();
    let make = f.program.func(
        "make",
        Signature::new(0).returns(1),
        seq(vec![Expr::ret(vec![Expr::Array(vec![Expr::str("x")])])]),
    );
    f.program.func(
        "test",
        Signature::new(0).returns(1),
        seq(vec![Expr::ret(vec![Expr::array_op(
            ArrayOp::At,
            vec![call(make), Expr::num(0.0)],
        )])]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        interp.exec_node(&mut node, 1).unwrap().values,
        vec![Value::str("x")]
    );
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

fn point_class(f: &mut Fixture) -> ClassId {
    let interner = f.bindings.interner().clone();
    let float = interner.intern("float");
    let class = ClassBinding::new(interner.intern("Point"))
        .stored(interner.intern("x"), float)
        .stored(interner.intern("y"), float)
        .stored(interner.intern("tags"), interner.intern("array"));
    f.bindings.define_class(class)
}

#[test]
fn test_stored_fields() {
    let mut f = Fixture::new();
    let point = point_class(&mut f);
    f.program.func(
        "test",
        Signature::new(1).returns(1),
        seq(vec![
            Expr::declare(
                slot(0),
                Some(Expr::New {
                    class: point,
                    fields: vec![
                        (field(0), Expr::num(1.0)),
                        (field(1), Expr::num(2.0)),
                        (field(2), Expr::Array(vec![Expr::str("a")])),
                    ],
                }),
            ),
            Expr::set_field(Expr::var(slot(0)), point, field(0), Expr::num(5.0)),
            Expr::ret(vec![binary(
                BinaryOp::Add,
                Expr::get_field(Expr::var(slot(0)), point, field(0)),
                Expr::get_field(Expr::var(slot(0)), point, field(1)),
            )]),
        ]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        interp.exec_node(&mut node, 1).unwrap().values,
        vec![Value::Num(7.0)]
    );
    node.release(&mut interp).unwrap();
    assert_eq!(interp.heap_stats().objects.count, 1);
    assert_eq!(interp.heap_stats().lists.count, 1);
    assert_idle(&interp);
}

#[test]
fn test_field_access_on_non_object() {
    let mut f = Fixture::new();
    let point = point_class(&mut f);
    f.program.func(
        "test",
        Signature::new(0).returns(1),
        seq(vec![Expr::ret(vec![Expr::get_field(
            Expr::Array(Vec::new()),
            point,
            field(0),
        )])]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        node.run(&mut interp),
        Err(EvalError::TypeMismatch {
            expected: "object",
            found: "array",
        })
    );
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

/// `bump(ref n) { n = n + 10 }`.
fn bump_func(f: &mut Fixture) -> arbor_ir::FuncId {
    f.program.func(
        "bump",
        Signature::new(1).param(Param::new(slot(0)).by_ref()),
        seq(vec![Expr::assign(
            slot(0),
            binary(BinaryOp::Add, Expr::var(slot(0)), Expr::num(10.0)),
        )]),
    )
}

#[test]
fn test_stored_field_passed_by_ref() {
    let mut f = Fixture::new();
    let point = point_class(&mut f);
    let bump = bump_func(&mut f);
    let x = || Arg::field_ref(Expr::var(slot(0)), point, field(0));
    f.program.func(
        "test",
        Signature::new(1).returns(2),
        seq(vec![
            Expr::declare(
                slot(0),
                Some(Expr::New {
                    class: point,
                    fields: vec![(field(0), Expr::num(1.0))],
                }),
            ),
            Expr::call(bump, vec![x()]),
            Expr::set_field(
                Expr::var(slot(0)),
                point,
                field(0),
                binary(
                    BinaryOp::Mul,
                    Expr::get_field(Expr::var(slot(0)), point, field(0)),
                    Expr::num(2.0),
                ),
            ),
            Expr::call(bump, vec![x()]),
            Expr::ret(vec![
                Expr::get_field(Expr::var(slot(0)), point, field(0)),
                Expr::get_field(Expr::var(slot(0)), point, field(1)),
            ]),
        ]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        interp.exec_node(&mut node, 2).unwrap().values,
        vec![Value::Num(32.0), Value::Nil]
    );
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

#[test]
fn test_field_ref_outlives_temporary_object() {
    let mut f = Fixture::new();
    let point = point_class(&mut f);
    let inc = f.program.func(
        "inc",
        Signature::new(1).param(Param::new(slot(0)).by_ref()).returns(1),
        seq(vec![Expr::ret(vec![binary(
            BinaryOp::Add,
            Expr::var(slot(0)),
            Expr::num(1.0),
        )])]),
    );
    let temporary = Expr::New {
        class: point,
        fields: vec![(field(0), Expr::num(4.0))],
    };
    f.program.func(
        "test",
        Signature::new(0).returns(1),
        seq(vec![Expr::ret(vec![Expr::call(
            inc,
            vec![Arg::field_ref(temporary, point, field(0))],
        )])]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        interp.exec_node(&mut node, 1).unwrap().values,
        vec![Value::Num(5.0)]
    );
    node.release(&mut interp).unwrap();
    assert_eq!(interp.heap_stats().objects.count, 1);
    assert_idle(&interp);
}

/// `Color { r, g }` and `ColorAlpha: Color { a }`.
fn color_classes(f: &mut Fixture) -> (ClassId, ClassId) {
    let interner = f.bindings.interner().clone();
    let float = interner.intern("float");
    let color = f.bindings.define_class(
        ClassBinding::new(interner.intern("Color"))
            .stored(interner.intern("r"), float)
            .stored(interner.intern("g"), float),
    );
    let alpha = f.bindings.define_class(
        ClassBinding::new(interner.intern("ColorAlpha"))
            .extends(color)
            .stored(interner.intern("a"), float),
    );
    (color, alpha)
}

#[test]
fn test_subclass_fields_through_parent_class() {
    let mut f = Fixture::new();
    let (color, alpha) = color_classes(&mut f);
    let k = || Expr::var(slot(0));
    let c = || Expr::var(slot(1));
    f.program.func(
        "test",
        Signature::new(2).param(Param::new(slot(0))).returns(1),
        seq(vec![
            Expr::declare(
                slot(1),
                Some(Expr::New {
                    class: alpha,
                    fields: Vec::new(),
                }),
            ),
            Expr::set_field(c(), color, field(0), binary(BinaryOp::Mul, k(), Expr::num(1.0))),
            Expr::set_field(c(), color, field(1), binary(BinaryOp::Mul, k(), Expr::num(100.0))),
            Expr::set_field(c(), alpha, field(2), Expr::num(1000.0)),
            Expr::ret(vec![binary(
                BinaryOp::Add,
                binary(
                    BinaryOp::Add,
                    Expr::get_field(c(), alpha, field(0)),
                    Expr::get_field(c(), alpha, field(1)),
                ),
                Expr::get_field(c(), alpha, field(2)),
            )]),
        ]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    node.set_args(&mut interp, vec![Value::Num(2.0)]).unwrap();
    assert_eq!(
        interp.exec_node(&mut node, 1).unwrap().values,
        vec![Value::Num(1202.0)]
    );
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

#[test]
fn test_explicit_up_and_down_casts() {
    let mut f = Fixture::new();
    let (color, alpha) = color_classes(&mut f);
    f.program.func(
        "test",
        Signature::new(3).returns(1),
        seq(vec![
            Expr::declare(
                slot(0),
                Some(Expr::New {
                    class: alpha,
                    fields: vec![(field(2), Expr::num(1000.0))],
                }),
            ),
            Expr::declare(
                slot(1),
                Some(Expr::cast(CastKind::Class(color), Expr::var(slot(0)))),
            ),
            Expr::set_field(Expr::var(slot(1)), color, field(0), Expr::num(1.0)),
            Expr::set_field(Expr::var(slot(1)), color, field(1), Expr::num(100.0)),
            Expr::declare(
                slot(2),
                Some(Expr::cast(CastKind::Class(alpha), Expr::var(slot(1)))),
            ),
            Expr::ret(vec![binary(
                BinaryOp::Add,
                binary(
                    BinaryOp::Add,
                    Expr::get_field(Expr::var(slot(2)), alpha, field(0)),
                    Expr::get_field(Expr::var(slot(2)), alpha, field(1)),
                ),
                Expr::get_field(Expr::var(slot(2)), alpha, field(2)),
            )]),
        ]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        interp.exec_node(&mut node, 1).unwrap().values,
        vec![Value::Num(1101.0)]
    );
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

#[test]
fn test_incompatible_down_cast_aborts() {
    let mut f = Fixture::new();
    let (color, alpha) = color_classes(&mut f);
    f.program.func(
        "test",
        Signature::new(0).returns(1),
        seq(vec![Expr::ret(vec![Expr::cast(
            CastKind::Class(alpha),
            Expr::New {
                class: color,
                fields: Vec::new(),
            },
        )])]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        node.run(&mut interp),
        Err(EvalError::ClassMismatch {
            expected: alpha,
            found: color,
        })
    );
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

#[test]
fn test_subclass_field_on_parent_instance_aborts() {
    let mut f = Fixture::new();
    let (color, alpha) = color_classes(&mut f);
    f.program.func(
        "test",
        Signature::new(0).returns(1),
        seq(vec![Expr::ret(vec![Expr::get_field(
            Expr::New {
                class: color,
                fields: Vec::new(),
            },
            alpha,
            field(2),
        )])]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        node.run(&mut interp),
        Err(EvalError::ClassMismatch {
            expected: alpha,
            found: color,
        })
    );
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

struct Counter {
    n: f64,
}

fn counter_get(host: &dyn Any) -> Value {
    Value::Num(host.downcast_ref::<Counter>().map_or(0.0, |c| c.n))
}

fn counter_set(host: &mut dyn Any, value: &Value) {
    if let Some(counter) = host.downcast_mut::<Counter>() {
        counter.n = value.as_num().unwrap_or_default();
    }
}

fn counter_class(f: &mut Fixture, settable: bool) -> ClassId {
    let interner = f.bindings.interner().clone();
    let class = ClassBinding::new(interner.intern("Counter"))
        .computed(
            interner.intern("n"),
            interner.intern("float"),
            counter_get,
            settable.then_some(counter_set as crate::FieldSetter),
        )
        .with_ctor(|| Box::new(Counter { n: 1.0 }));
    f.bindings.define_class(class)
}

#[test]
fn test_computed_fields_use_host_data() {
    let mut f = Fixture::new();
    let counter = counter_class(&mut f, true);
    f.program.func(
        "test",
        Signature::new(1).returns(2),
        seq(vec![
            Expr::declare(
                slot(0),
                Some(Expr::New {
                    class: counter,
                    fields: Vec::new(),
                }),
            ),
            Expr::ret(vec![
                Expr::get_field(Expr::var(slot(0)), counter, field(0)),
                Expr::get_field(
                    Expr::New {
                        class: counter,
                        fields: vec![(field(0), Expr::num(4.0))],
                    },
                    counter,
                    field(0),
                ),
            ]),
        ]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        interp.exec_node(&mut node, 2).unwrap().values,
        vec![Value::Num(1.0), Value::Num(4.0)]
    );
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

#[test]
fn test_read_only_computed_field() {
    let mut f = Fixture::new();
    let counter = counter_class(&mut f, false);
    f.program.func(
        "test",
        Signature::new(0),
        seq(vec![Expr::set_field(
            Expr::New {
                class: counter,
                fields: Vec::new(),
            },
            counter,
            field(0),
            Expr::num(2.0),
        )]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        node.run(&mut interp),
        Err(EvalError::native("field", "assignment to a read-only field"))
    );
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

#[test]
fn test_ref_event_log() {
    let mut f = Fixture::new();
    f.program.func(
        "test",
        Signature::new(1),
        seq(vec![Expr::declare(slot(0), Some(Expr::Array(Vec::new())))]),
    );
    let mut interp = f.build_with(|b| b.record_ref_events(true));

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(node.run(&mut interp).unwrap(), Status::Success);
    node.release(&mut interp).unwrap();

    let events: Vec<_> = interp
        .heap_mut()
        .take_events()
        .into_iter()
        .map(|e| (e.op, e.refs))
        .collect();
    assert_eq!(
        events,
        vec![
            (RefOp::Retain, 1),
            (RefOp::Retain, 2),
            (RefOp::Release, 1),
            (RefOp::Release, 0),
            (RefOp::Delete, 0),
        ]
    );
    assert_idle(&interp);
}

#[test]
fn test_logical_operators_short_circuit() {
    let mut f = Fixture::new();
    let side_body = seq(vec![
        f.trace("S"),
        Expr::ret(vec![Expr::bool(true)]),
    ]);
    let side = f.program.func("side", Signature::new(0).returns(1), side_body);
    f.program.func(
        "test",
        Signature::new(0).returns(3),
        seq(vec![Expr::ret(vec![
            Expr::logical(LogicalOp::And, Expr::bool(false), call(side)),
            Expr::logical(LogicalOp::Or, Expr::bool(true), call(side)),
            Expr::logical(LogicalOp::And, Expr::num(1.0), call(side)),
        ])]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        interp.exec_node(&mut node, 3).unwrap().values,
        vec![Value::Bool(false), Value::Bool(true), Value::Bool(true)]
    );
    assert_eq!(output(&interp), "S");
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

#[test]
fn test_operators_and_casts() {
    let mut f = Fixture::new();
    let body = seq(vec![
        f.trace_value(binary(BinaryOp::Add, Expr::str("n="), Expr::cast(CastKind::Str, Expr::num(4.0)))),
        f.trace_value(Expr::cast(CastKind::Str, binary(BinaryOp::Mod, Expr::num(7.0), Expr::num(4.0)))),
        f.trace_value(Expr::cast(CastKind::Str, binary(BinaryOp::Eq, Expr::str("a"), Expr::str("a")))),
    ]);
    f.program.func("test", Signature::new(0), body);
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(node.run(&mut interp).unwrap(), Status::Success);
    assert_eq!(output(&interp), "n=43true");
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

#[test]
fn test_type_errors_abort() {
    let mut f = Fixture::new();
    f.program.func(
        "test",
        Signature::new(0).returns(1),
        seq(vec![Expr::ret(vec![binary(
            BinaryOp::Sub,
            Expr::Array(Vec::new()),
            Expr::num(1.0),
        )])]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert!(matches!(
        node.run(&mut interp),
        Err(EvalError::TypeMismatch { .. })
    ));
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}
