//! Lambdas, upvalue capture and function values.

use arbor_ir::{Arg, BinaryOp, BlockKind, Callee, Expr, Param, Signature, Slot, Upvalue};
use pretty_assertions::assert_eq;

use super::{assert_idle, binary, call, output, seq, slot, Fixture};
use crate::{Status, Value};

/// `a = 1; f = lambda { a = a + 10; return a }; return f(), a` with the
/// given capture of `a`.
fn capture_program(capture: fn(Slot, Slot) -> Upvalue) -> Vec<Value> {
    let mut f = Fixture::new();
    let test = f.program.declare("test", Signature::new(2).returns(2));
    let lambda = f.program.lambda(
        test,
        Signature::new(1).returns(1),
        vec![capture(slot(0), slot(0))],
        seq(vec![
            Expr::assign(
                slot(0),
                binary(BinaryOp::Add, Expr::var(slot(0)), Expr::num(10.0)),
            ),
            Expr::ret(vec![Expr::var(slot(0))]),
        ]),
    );
    f.program.define(
        test,
        seq(vec![
            Expr::declare(slot(0), Some(Expr::num(1.0))),
            Expr::declare(slot(1), Some(Expr::Lambda(lambda))),
            Expr::ret(vec![
                Expr::call_value(Expr::var(slot(1)), Vec::new()),
                Expr::var(slot(0)),
            ]),
        ]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    let result = interp.exec_node(&mut node, 2).unwrap();
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
    result.values
}

#[test]
fn test_by_ref_capture_shares_storage() {
    assert_eq!(
        capture_program(Upvalue::by_ref),
        vec![Value::Num(11.0), Value::Num(11.0)]
    );
}

#[test]
fn test_by_value_capture_copies_at_creation() {
    assert_eq!(
        capture_program(Upvalue::by_value),
        vec![Value::Num(11.0), Value::Num(1.0)]
    );
}

#[test]
fn test_by_value_capture_keeps_state_between_calls() {
    let mut f = Fixture::new();
    let test = f.program.declare("test", Signature::new(2).returns(1));
    let counter = f.program.lambda(
        test,
        Signature::new(1).returns(1),
        vec![Upvalue::by_value(slot(0), slot(0))],
        seq(vec![
            Expr::assign(
                slot(0),
                binary(BinaryOp::Add, Expr::var(slot(0)), Expr::num(1.0)),
            ),
            Expr::ret(vec![Expr::var(slot(0))]),
        ]),
    );
    f.program.define(
        test,
        seq(vec![
            Expr::declare(slot(0), Some(Expr::num(0.0))),
            Expr::declare(slot(1), Some(Expr::Lambda(counter))),
            Expr::discard(Expr::call_value(Expr::var(slot(1)), Vec::new()), 1),
            Expr::discard(Expr::call_value(Expr::var(slot(1)), Vec::new()), 1),
            Expr::ret(vec![Expr::call_value(Expr::var(slot(1)), Vec::new())]),
        ]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        interp.exec_node(&mut node, 1).unwrap().values,
        vec![Value::Num(3.0)]
    );
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

#[test]
fn test_lambda_outlives_its_frame() {
    let mut f = Fixture::new();
    let make = f.program.declare("make", Signature::new(1).returns(1));
    let get = f.program.lambda(
        make,
        Signature::new(1).returns(1),
        vec![Upvalue::by_ref(slot(0), slot(0))],
        seq(vec![Expr::ret(vec![Expr::var(slot(0))])]),
    );
    f.program.define(
        make,
        seq(vec![
            Expr::declare(slot(0), Some(Expr::str("kept"))),
            Expr::ret(vec![Expr::Lambda(get)]),
        ]),
    );
    f.program.func(
        "test",
        Signature::new(0).returns(1),
        seq(vec![Expr::ret(vec![Expr::call_value(call(make), Vec::new())])]),
    );
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(
        interp.exec_node(&mut node, 1).unwrap().values,
        vec![Value::str("kept")]
    );
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

#[test]
fn test_function_references() {
    let mut f = Fixture::new();
    let trace = f.bindings.find_func("trace").unwrap();
    let double = f.program.func(
        "double",
        Signature::new(1)
            .param(Param::new(slot(0)))
            .returns(1),
        seq(vec![Expr::ret(vec![binary(
            BinaryOp::Mul,
            Expr::var(slot(0)),
            Expr::num(2.0),
        )])]),
    );
    let body = seq(vec![
        Expr::call_value(
            Expr::FuncRef(Callee::Native(trace)),
            vec![Arg::value(Expr::str("n="))],
        ),
        f.trace_value(Expr::call_value(
            Expr::FuncRef(Callee::Func(double)),
            vec![Arg::value(Expr::num(21.0))],
        )),
    ]);
    f.program.func("test", Signature::new(0), body);
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(node.run(&mut interp).unwrap(), Status::Success);
    assert_eq!(output(&interp), "n=42");
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

#[test]
fn test_run_script_ticks_closure_as_child() {
    let mut f = Fixture::new();
    let test = f.program.declare("test", Signature::new(0));
    let body = seq(vec![
        f.trace("A"),
        f.native("YIELD", Vec::new()),
        f.trace("B"),
    ]);
    let script = f.program.lambda(test, Signature::new(0), Vec::new(), body);
    let run = f.native("RunScript", vec![Expr::Lambda(script)]);
    f.program.define(test, seq(vec![run]));
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(node.run(&mut interp).unwrap(), Status::Running);
    assert_eq!(output(&interp), "A");
    assert_eq!(node.run(&mut interp).unwrap(), Status::Success);
    assert_eq!(output(&interp), "AB");
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}

#[test]
fn test_stopping_run_script_stops_the_closure() {
    let mut f = Fixture::new();
    let test = f.program.declare("test", Signature::new(0));
    let body = seq(vec![
        Expr::block(BlockKind::Defer, vec![f.trace("D")]),
        f.native("RUNNING", Vec::new()),
    ]);
    let script = f.program.lambda(test, Signature::new(0), Vec::new(), body);
    let run = f.native("RunScript", vec![Expr::Lambda(script)]);
    f.program.define(test, seq(vec![run]));
    let mut interp = f.build();

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(node.run(&mut interp).unwrap(), Status::Running);
    assert_eq!(node.run(&mut interp).unwrap(), Status::Running);
    assert_eq!(output(&interp), "");
    node.stop(&mut interp).unwrap();
    assert_eq!(output(&interp), "D");
    node.release(&mut interp).unwrap();
    assert_idle(&interp);
}
