//! Arbor Eval - behavior-tree execution engine for the Arbor scripting
//! language.
//!
//! Scripts arrive as a resolved [`arbor_ir::Program`]. Each function body is
//! lowered once into a tree of execution nodes that is ticked: every tick
//! resumes the running nodes where they left off and yields `Success`,
//! `Failure` or `Running`.
//!
//! # Architecture
//!
//! - [`Interpreter`]: owns the heap, the operand stack, frames, the call
//!   stack, the node cache and the script scheduler
//! - [`FuncNode`]: host handle on a declared function; `set_args`, `run`
//!   and `stop`
//! - [`Heap`]: pooled, reference counted strings, lists, closures, objects
//!   and storage cells
//! - [`Bindings`]: native functions, config bindings and classes
//! - `node`: the composite, decorator, call and leaf nodes
//!
//! Values are refcounted by whoever stores them; see [`value`](Value) for
//! the ownership rules.

mod bindings;
mod diagnostics;
mod errors;
mod eval_config;
mod frame;
mod interpreter;
mod node;
mod operand_stack;
mod ops;
mod output;
mod scheduler;
mod stack;
mod validate;
mod value;

/// Nested function activations allowed by default.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

pub use bindings::{
    ArgDecl, Bindings, ClassBinding, ConfigValue, FieldAccess, FieldBinding, FieldGetter,
    FieldSetter, FuncBinding, HostCtor, NativeKind, NativeNode, NodeFactory, SimpleFn,
};
pub use diagnostics::{CallFrame, CallStack};
pub use errors::{EvalError, EvalResult, ScriptError, ScriptErrorKind};
pub use eval_config::{EvalConfig, DEFAULT_STACK_LIMIT};
pub use frame::{Frame, FrameId};
pub use interpreter::{ExecResult, FuncNode, Interpreter, InterpreterBuilder, ScriptNode};
pub use node::{NodeStatus, Status};
pub use ops::{evaluate_binary, evaluate_cast, evaluate_unary, values_equal};
pub use output::{buffer_output, silent_output, stdout_output, OutputHandler, SharedOutput};
pub use stack::ensure_sufficient_stack;
pub use validate::validate;
pub use value::{
    Cell, CellId, Closure, ClosureId, Heap, HeapRef, HeapStats, Id, ListId, Object, ObjectId,
    Operand, Pool, PoolStats, RefEvent, RefOp, Upval, Value, ValueList,
};

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
