use arbor_ir::{ClassId, Expr, FieldIdx, SharedInterner};
use pretty_assertions::assert_eq;

use super::*;

struct Nop;

impl NativeNode for Nop {
    fn execute(&mut self, _interp: &mut Interpreter) -> EvalResult<Status> {
        Ok(Status::Success)
    }
}

#[test]
fn test_prelude_is_registered() {
    let bindings = Bindings::with_prelude(SharedInterner::new());
    for name in [
        "trace",
        "SUCCESS",
        "FAILURE",
        "RUNNING",
        "YIELD",
        "WaitTicks",
        "StartScript",
        "RunScript",
    ] {
        assert!(bindings.find_func(name).is_some(), "missing {name}");
    }
    let wait = bindings.find_func("WaitTicks").unwrap();
    assert_eq!(bindings.func(wait).unwrap().args.len(), 2);
    assert_eq!(bindings.func_name(wait), "WaitTicks");
}

#[test]
fn test_define_kinds() {
    let mut bindings = Bindings::new(SharedInterner::new());
    let node = bindings.define_node("Nop", Vec::new(), 0, || Nop);
    let simple = bindings.define_simple("Ok", Vec::new(), 1, |_| Ok(Status::Success));
    let config = bindings.define_config("Configured", Vec::new(), || Nop);

    assert_eq!(format!("{:?}", bindings.func(node).unwrap().kind), "Node");
    assert_eq!(format!("{:?}", bindings.func(simple).unwrap().kind), "Simple");
    assert!(bindings.func(config).unwrap().is_config());
    assert!(!bindings.func(node).unwrap().is_config());
    assert_eq!(bindings.func(simple).unwrap().returns, 1);
    assert_eq!(bindings.find_func("Missing"), None);
}

#[test]
fn test_redefinition_keeps_old_id() {
    let mut bindings = Bindings::new(SharedInterner::new());
    let first = bindings.define_simple("f", Vec::new(), 0, |_| Ok(Status::Success));
    let second = bindings.define_simple("f", Vec::new(), 0, |_| Ok(Status::Failure));

    assert_eq!(bindings.find_func("f"), Some(second));
    assert!(bindings.func(first).is_some());
    assert!(first != second);
}

#[test]
fn test_arg_declarations() {
    let bindings = Bindings::new(SharedInterner::new());
    let arg = bindings.arg("speed", "float").with_default(Expr::num(1.0));
    assert_eq!(bindings.interner().lookup(arg.name), "speed");
    assert_eq!(bindings.interner().lookup(arg.ty), "float");
    assert_eq!(arg.default, Some(Expr::num(1.0)));
    assert!(!arg.is_ref);
    assert!(bindings.arg("out", "int").by_ref().is_ref);
}

#[test]
fn test_class_fields() {
    let mut bindings = Bindings::new(SharedInterner::new());
    let interner = bindings.interner().clone();
    let class = ClassBinding::new(interner.intern("Color"))
        .stored(interner.intern("r"), interner.intern("float"))
        .computed(
            interner.intern("g"),
            interner.intern("float"),
            |_| Value::Num(0.0),
            None,
        );
    let id = bindings.define_class(class);

    assert_eq!(bindings.find_class("Color"), Some(id));
    let class = bindings.class(id).unwrap();
    assert!(matches!(
        class.field(FieldIdx::new(0)).unwrap().access,
        FieldAccess::Stored
    ));
    assert!(matches!(
        class.field(FieldIdx::new(1)).unwrap().access,
        FieldAccess::Computed { set: None, .. }
    ));
    assert!(class.field(FieldIdx::new(2)).is_none());
}

#[test]
fn test_subclass_lays_out_parent_fields_first() {
    let mut bindings = Bindings::new(SharedInterner::new());
    let interner = bindings.interner().clone();
    let float = interner.intern("float");
    let color = bindings.define_class(
        ClassBinding::new(interner.intern("Color"))
            .stored(interner.intern("r"), float)
            .stored(interner.intern("g"), float)
            .with_ctor(|| Box::new(0_u8)),
    );
    let alpha = bindings.define_class(
        ClassBinding::new(interner.intern("ColorAlpha"))
            .extends(color)
            .stored(interner.intern("a"), float),
    );

    let class = bindings.class(alpha).unwrap();
    let names: Vec<_> = class.fields.iter().map(|f| interner.lookup(f.name)).collect();
    assert_eq!(names, vec!["r", "g", "a"]);
    assert!(class.ctor.is_some());
    assert_eq!(class.parent, Some(color));

    assert!(bindings.is_subclass(alpha, color));
    assert!(bindings.is_subclass(color, color));
    assert!(!bindings.is_subclass(color, alpha));
}

#[test]
fn test_undefined_parent_is_dropped() {
    let mut bindings = Bindings::new(SharedInterner::new());
    let name = bindings.interner().intern("Orphan");
    let id = bindings.define_class(ClassBinding::new(name).extends(ClassId::new(7)));
    assert_eq!(bindings.class(id).unwrap().parent, None);
    assert!(!bindings.is_subclass(id, ClassId::new(7)));
}
