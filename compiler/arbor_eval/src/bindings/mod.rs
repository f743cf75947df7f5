//! Native binding surface.
//!
//! Hosts extend the language with native functions and classes. A native
//! function is one of:
//!
//! - a [`NativeNode`] factory: a fresh node per call site, with the full
//!   lifecycle (it may run for several ticks);
//! - a simple function: one call per tick, no per-call state;
//! - a config node factory: like a node, but the call carries a literal
//!   record delivered through [`NativeNode::configure`].
//!
//! Native nodes read their arguments from the operand stack in `init`
//! (last argument on top) and push results before returning success.

mod config;
mod prelude;

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use arbor_ir::{ClassId, Expr, FieldIdx, Name, NativeId, SharedInterner};
use rustc_hash::FxHashMap;

pub use config::ConfigValue;
pub(crate) use config::ConfigShape;

use crate::node::Status;
use crate::value::Value;
use crate::{EvalResult, Interpreter};

/// A native behavior. Mirrors the lifecycle of script nodes: `init` once per
/// activation, `execute` once per tick until it returns a terminal status,
/// then `deinit` and `defer`. A running node that is cancelled sees `stop`
/// first.
pub trait NativeNode {
    /// Receives the call's config record before `init`. Config bindings only.
    fn configure(&mut self, _interp: &mut Interpreter, _config: &ConfigValue) -> EvalResult<()> {
        Ok(())
    }

    fn init(&mut self, _interp: &mut Interpreter) -> EvalResult<()> {
        Ok(())
    }

    fn execute(&mut self, interp: &mut Interpreter) -> EvalResult<Status>;

    fn deinit(&mut self, _interp: &mut Interpreter) -> EvalResult<()> {
        Ok(())
    }

    fn defer(&mut self, _interp: &mut Interpreter) -> EvalResult<()> {
        Ok(())
    }

    fn stop(&mut self, _interp: &mut Interpreter) -> EvalResult<()> {
        Ok(())
    }
}

pub type NodeFactory = Rc<dyn Fn() -> Box<dyn NativeNode>>;

/// Stateless native: pops its arguments, pushes its results.
pub type SimpleFn = fn(&mut Interpreter) -> EvalResult<Status>;

#[derive(Clone)]
pub enum NativeKind {
    Node(NodeFactory),
    Simple(SimpleFn),
    Config(NodeFactory),
}

impl fmt::Debug for NativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeKind::Node(_) => write!(f, "Node"),
            NativeKind::Simple(_) => write!(f, "Simple"),
            NativeKind::Config(_) => write!(f, "Config"),
        }
    }
}

struct SimpleNode(SimpleFn);

impl NativeNode for SimpleNode {
    fn execute(&mut self, interp: &mut Interpreter) -> EvalResult<Status> {
        (self.0)(interp)
    }
}

/// Declared parameter of a native function.
#[derive(Clone, Debug, PartialEq)]
pub struct ArgDecl {
    pub name: Name,
    /// Type name, for diagnostics.
    pub ty: Name,
    pub is_ref: bool,
    pub default: Option<Expr>,
}

impl ArgDecl {
    #[must_use]
    pub fn by_ref(mut self) -> Self {
        self.is_ref = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Clone, Debug)]
pub struct FuncBinding {
    pub name: Name,
    pub args: Vec<ArgDecl>,
    pub returns: u8,
    pub kind: NativeKind,
}

impl FuncBinding {
    /// A fresh node for one call site.
    pub fn instantiate(&self) -> Box<dyn NativeNode> {
        match &self.kind {
            NativeKind::Node(factory) | NativeKind::Config(factory) => factory(),
            NativeKind::Simple(f) => Box::new(SimpleNode(*f)),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self.kind, NativeKind::Config(_))
    }
}

pub type HostCtor = Rc<dyn Fn() -> Box<dyn Any>>;
pub type FieldGetter = fn(&dyn Any) -> Value;
pub type FieldSetter = fn(&mut dyn Any, &Value);

#[derive(Copy, Clone)]
pub enum FieldAccess {
    /// Engine-managed slot on the object; holds a reference.
    Stored,
    /// Primitive field backed by the object's host data.
    Computed {
        get: FieldGetter,
        set: Option<FieldSetter>,
    },
}

impl fmt::Debug for FieldAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldAccess::Stored => write!(f, "Stored"),
            FieldAccess::Computed { set, .. } => f
                .debug_struct("Computed")
                .field("settable", &set.is_some())
                .finish(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldBinding {
    pub name: Name,
    pub ty: Name,
    pub access: FieldAccess,
}

/// A bound class. A subclass lays out its parent's fields first, so a
/// parent's [`FieldIdx`] addresses the same field on every descendant.
#[derive(Clone)]
pub struct ClassBinding {
    pub name: Name,
    pub parent: Option<ClassId>,
    pub fields: Vec<FieldBinding>,
    pub ctor: Option<HostCtor>,
}

impl ClassBinding {
    pub fn new(name: Name) -> Self {
        ClassBinding {
            name,
            parent: None,
            fields: Vec::new(),
            ctor: None,
        }
    }

    /// Derive from an already defined class. Fields declared on `self` are
    /// numbered after the parent's; without its own constructor the class
    /// uses the parent's.
    #[must_use]
    pub fn extends(mut self, parent: ClassId) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn stored(mut self, name: Name, ty: Name) -> Self {
        self.fields.push(FieldBinding {
            name,
            ty,
            access: FieldAccess::Stored,
        });
        self
    }

    #[must_use]
    pub fn computed(
        mut self,
        name: Name,
        ty: Name,
        get: FieldGetter,
        set: Option<FieldSetter>,
    ) -> Self {
        self.fields.push(FieldBinding {
            name,
            ty,
            access: FieldAccess::Computed { get, set },
        });
        self
    }

    #[must_use]
    pub fn with_ctor(mut self, ctor: impl Fn() -> Box<dyn Any> + 'static) -> Self {
        self.ctor = Some(Rc::new(ctor));
        self
    }

    pub fn field(&self, field: FieldIdx) -> Option<&FieldBinding> {
        self.fields.get(field.index())
    }
}

impl fmt::Debug for ClassBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBinding")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("fields", &self.fields)
            .field("ctor", &self.ctor.is_some())
            .finish()
    }
}

/// Registry of native functions and classes, shared with the program's
/// interner so names compare directly.
pub struct Bindings {
    interner: SharedInterner,
    funcs: Vec<FuncBinding>,
    classes: Vec<ClassBinding>,
    indices: FxHashMap<Name, NativeId>,
}

impl Bindings {
    pub fn new(interner: SharedInterner) -> Self {
        Bindings {
            interner,
            funcs: Vec::new(),
            classes: Vec::new(),
            indices: FxHashMap::default(),
        }
    }

    /// Registry with `trace`, `SUCCESS`, `FAILURE`, `RUNNING`, `YIELD`,
    /// `WaitTicks`, `StartScript` and `RunScript` already defined.
    pub fn with_prelude(interner: SharedInterner) -> Self {
        let mut bindings = Bindings::new(interner);
        prelude::register(&mut bindings);
        bindings
    }

    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    /// Parameter declaration with interned names.
    pub fn arg(&self, name: &str, ty: &str) -> ArgDecl {
        ArgDecl {
            name: self.interner.intern(name),
            ty: self.interner.intern(ty),
            is_ref: false,
            default: None,
        }
    }

    /// Register a native. Redefining a name replaces the index entry; the
    /// old id stays valid.
    pub fn define(&mut self, name: &str, args: Vec<ArgDecl>, returns: u8, kind: NativeKind) -> NativeId {
        let name = self.interner.intern(name);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "native counts are far below u32::MAX"
        )]
        let id = NativeId::new(self.funcs.len() as u32);
        self.funcs.push(FuncBinding {
            name,
            args,
            returns,
            kind,
        });
        self.indices.insert(name, id);
        id
    }

    pub fn define_node<N, F>(&mut self, name: &str, args: Vec<ArgDecl>, returns: u8, factory: F) -> NativeId
    where
        N: NativeNode + 'static,
        F: Fn() -> N + 'static,
    {
        let factory: NodeFactory = Rc::new(move || Box::new(factory()));
        self.define(name, args, returns, NativeKind::Node(factory))
    }

    pub fn define_simple(&mut self, name: &str, args: Vec<ArgDecl>, returns: u8, f: SimpleFn) -> NativeId {
        self.define(name, args, returns, NativeKind::Simple(f))
    }

    pub fn define_config<N, F>(&mut self, name: &str, args: Vec<ArgDecl>, factory: F) -> NativeId
    where
        N: NativeNode + 'static,
        F: Fn() -> N + 'static,
    {
        let factory: NodeFactory = Rc::new(move || Box::new(factory()));
        self.define(name, args, 0, NativeKind::Config(factory))
    }

    pub fn define_class(&mut self, mut class: ClassBinding) -> ClassId {
        if let Some(parent) = class.parent {
            match self.classes.get(parent.index()) {
                Some(binding) => {
                    let own = std::mem::replace(&mut class.fields, binding.fields.clone());
                    class.fields.extend(own);
                    if class.ctor.is_none() {
                        class.ctor.clone_from(&binding.ctor);
                    }
                }
                None => {
                    tracing::warn!(?parent, "parent class is not defined, ignoring it");
                    class.parent = None;
                }
            }
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "class counts are far below u32::MAX"
        )]
        let id = ClassId::new(self.classes.len() as u32);
        self.classes.push(class);
        id
    }

    pub fn func(&self, id: NativeId) -> Option<&FuncBinding> {
        self.funcs.get(id.index())
    }

    pub fn find_func(&self, name: &str) -> Option<NativeId> {
        let name = self.interner.get(name)?;
        self.indices.get(&name).copied()
    }

    pub fn class(&self, id: ClassId) -> Option<&ClassBinding> {
        self.classes.get(id.index())
    }

    /// Whether `class` is `ancestor` or derives from it.
    pub fn is_subclass(&self, class: ClassId, ancestor: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.class(id).and_then(|c| c.parent);
        }
        false
    }

    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        let name = self.interner.get(name)?;
        self.classes
            .iter()
            .position(|c| c.name == name)
            .and_then(|i| u32::try_from(i).ok())
            .map(ClassId::new)
    }

    /// Display name of a native, for diagnostics.
    pub fn func_name(&self, id: NativeId) -> &'static str {
        self.func(id)
            .map_or("<unknown native>", |f| self.interner.lookup(f.name))
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings")
            .field("funcs", &self.funcs.len())
            .field("classes", &self.classes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
