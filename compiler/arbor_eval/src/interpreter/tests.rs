use arbor_ir::{Block, Expr, ModuleId, ProgramBuilder, SharedInterner, Signature, Slot};
use pretty_assertions::assert_eq;

use super::*;
use crate::output::buffer_output;
use crate::{NodeStatus, ScriptErrorKind};

fn interpreter(build: impl FnOnce(&mut ProgramBuilder)) -> Interpreter {
    let interner = SharedInterner::new();
    let mut builder = ProgramBuilder::new(interner.clone());
    build(&mut builder);
    InterpreterBuilder::new(builder.finish(), Bindings::with_prelude(interner))
        .output(buffer_output())
        .build()
        .unwrap()
}

#[test]
fn test_func_node_lookup() {
    let mut interp = interpreter(|b| {
        b.func("test", Signature::new(0), Block::seq(Vec::new()));
        b.set_module(ModuleId::new(1));
        b.func("other", Signature::new(0), Block::seq(Vec::new()));
    });

    assert!(interp.func_node("test").is_ok());
    assert!(interp.func_node_in(ModuleId::new(1), "other").is_ok());
    assert_eq!(
        interp.func_node_in(ModuleId::MAIN, "other").err(),
        Some(EvalError::UndefinedFunction {
            name: "other".to_owned()
        })
    );
    assert_eq!(
        interp.func_node("missing").err(),
        Some(EvalError::UndefinedFunction {
            name: "missing".to_owned()
        })
    );

    let mut node = interp.func_node("test").unwrap();
    assert_eq!(node.status(), NodeStatus::Fresh);
    assert_eq!(node.run(&mut interp).unwrap(), Status::Success);
    assert_eq!(node.status(), NodeStatus::Success);
}

#[test]
fn test_push_and_pop_helpers() {
    let mut interp = interpreter(|_| {});
    interp.push_value(Value::Num(4.0)).unwrap();
    interp.push_value(Value::Bool(true)).unwrap();
    interp.push_value(Value::str("hi")).unwrap();
    assert_eq!(interp.stack_count(), 3);

    assert_eq!(interp.pop_str().unwrap(), "hi");
    assert!(interp.pop_bool().unwrap());
    assert_eq!(interp.pop_num().unwrap(), 4.0);
    assert_eq!(interp.pop_num(), Err(EvalError::StackUnderflow));
}

#[test]
fn test_pop_mismatch_releases_value() {
    let mut interp = interpreter(|_| {});
    let list = interp.heap_mut().new_list().unwrap();
    interp.push_value(Value::List(list)).unwrap();

    assert_eq!(
        interp.pop_num(),
        Err(EvalError::TypeMismatch {
            expected: "number",
            found: "array",
        })
    );
    assert!(interp.heap_stats().is_balanced());
}

#[test]
fn test_pop_ref_rejects_values() {
    let mut interp = interpreter(|_| {});
    interp.push_value(Value::Num(1.0)).unwrap();
    assert_eq!(interp.pop_ref(), Err(EvalError::ExpectedRef));
    assert_eq!(interp.stack_count(), 0);
}

#[test]
fn test_exec_node_checks_result_count() {
    let mut interp = interpreter(|b| {
        b.func(
            "one",
            Signature::new(0).returns(1),
            Block::seq(vec![Expr::ret(vec![Expr::num(7.0)])]),
        );
    });

    let mut node = interp.func_node("one").unwrap();
    let result = interp.exec_node(&mut node, 1).unwrap();
    assert_eq!(result.status, Status::Success);
    assert_eq!(result.values, vec![Value::Num(7.0)]);

    assert_eq!(
        interp.exec_node(&mut node, 2),
        Err(EvalError::ReturnCountMismatch {
            func: "one".to_owned(),
            expected: 2,
            got: 1,
        })
    );
    assert_eq!(interp.stack_count(), 0);
}

#[test]
fn test_build_rejects_invalid_program() {
    let interner = SharedInterner::new();
    let mut builder = ProgramBuilder::new(interner.clone());
    builder.func(
        "bad",
        Signature::new(1),
        Block::seq(vec![Expr::var(Slot::new(3))]),
    );
    let err = InterpreterBuilder::new(builder.finish(), Bindings::new(interner))
        .build()
        .unwrap_err();

    assert_eq!(err.func, "bad");
    assert_eq!(
        err.kind,
        ScriptErrorKind::SlotOutOfRange {
            slot: Slot::new(3),
            locals: 1,
        }
    );
}

#[test]
fn test_builder_applies_config() {
    let interp = InterpreterBuilder::new(
        ProgramBuilder::new(SharedInterner::new()).finish(),
        Bindings::new(SharedInterner::new()),
    )
    .max_call_depth(8)
    .stack_limit(32)
    .record_ref_events(true)
    .build()
    .unwrap();

    assert_eq!(
        *interp.config(),
        EvalConfig {
            max_call_depth: 8,
            stack_limit: 32,
            record_ref_events: true,
        }
    );
    assert_eq!(interp.call_depth(), 0);
    assert_eq!(interp.script_count(), 0);
}

#[test]
fn test_operand_stack_limit() {
    let interp = InterpreterBuilder::new(
        ProgramBuilder::new(SharedInterner::new()).finish(),
        Bindings::new(SharedInterner::new()),
    )
    .stack_limit(2)
    .build();
    let mut interp = interp.unwrap();

    interp.push_value(Value::Nil).unwrap();
    interp.push_value(Value::Nil).unwrap();
    assert_eq!(
        interp.push_value(Value::Nil),
        Err(EvalError::OperandStackOverflow { limit: 2 })
    );
}
