use super::*;
use crate::{Expr, Slot};
use pretty_assertions::assert_eq;

#[test]
fn test_declare_then_define() {
    let mut builder = ProgramBuilder::new(SharedInterner::new());
    let foo = builder.declare("foo", Signature::new(0).returns(1));
    builder.define(foo, Block::seq(vec![Expr::ret(vec![Expr::num(1.0)])]));
    let program = builder.finish();

    let decl = program.func(foo).unwrap();
    assert_eq!(decl.returns, 1);
    assert_eq!(decl.body.stmts.len(), 1);
    assert_eq!(program.lookup_str("foo"), Some(foo));
}

#[test]
fn test_lambdas_are_not_indexed() {
    let mut builder = ProgramBuilder::new(SharedInterner::new());
    let main = builder.declare("main", Signature::new(1));
    let lambda = builder.lambda(
        main,
        Signature::new(1),
        vec![Upvalue::by_value(Slot::new(0), Slot::new(0))],
        Block::seq(Vec::new()),
    );
    let program = builder.finish();

    assert_eq!(program.len(), 2);
    assert_eq!(program.func_name(lambda), "<lambda>");
    assert_eq!(
        program.func(lambda).unwrap().kind,
        FuncKind::Lambda { parent: main }
    );
}

#[test]
fn test_same_name_in_two_modules() {
    let mut builder = ProgramBuilder::new(SharedInterner::new());
    let first = builder.declare("test", Signature::new(0));
    builder.set_module(ModuleId::new(1));
    let second = builder.declare("test", Signature::new(0));
    let name = builder.name("test");
    let program = builder.finish();

    assert_eq!(program.lookup(ModuleId::MAIN, name), Some(first));
    assert_eq!(program.lookup(ModuleId::new(1), name), Some(second));
    assert_eq!(program.lookup_str("test"), Some(first));
}
