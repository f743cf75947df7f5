//! Error types for the execution engine.
//!
//! Two classes of error leave the engine as `Err`:
//!
//! - [`ScriptError`]: authoring errors found while validating the resolved
//!   tree, before any node is built. Fatal to loading, never retried.
//! - [`EvalError`]: host/engine invariant violations while running (stack
//!   underflow, call depth exceeded, stale pool handles). Fatal to the
//!   current top-level invocation.
//!
//! Ordinary script failure is not an error: it is the `Failure` status
//! flowing through the node tree.

use arbor_ir::{ClassId, FieldIdx, FuncId, NativeId, Slot, Span};
use thiserror::Error;

/// Result type for engine operations.
pub type EvalResult<T = ()> = Result<T, EvalError>;

/// Invariant violation or host error raised while running.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("operand stack exceeded {limit} entries")]
    OperandStackOverflow { limit: usize },

    /// Call depth bound exceeded. `backtrace` lists the innermost call first.
    #[error("maximum call depth of {depth} exceeded")]
    StackOverflow { depth: usize, backtrace: Vec<String> },

    #[error("stale {pool} handle #{index}")]
    StaleHandle { pool: &'static str, index: u32 },

    #[error("reference count of {pool} #{index} dropped below zero")]
    NegativeRefs { pool: &'static str, index: u32 },

    #[error("{pool} pool exhausted")]
    PoolExhausted { pool: &'static str },

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("expected a by-ref operand")]
    ExpectedRef,

    #[error("{slot:?} is not bound in the current frame")]
    UnboundSlot { slot: Slot },

    #[error("no active call frame")]
    NoFrame,

    #[error("function {0:?} is not declared")]
    UnknownFunc(FuncId),

    #[error("native {0:?} is not registered")]
    UnknownNative(NativeId),

    #[error("class {0:?} is not registered")]
    UnknownClass(ClassId),

    #[error("{class:?} has no {field:?}")]
    UnknownField { class: ClassId, field: FieldIdx },

    #[error("expected an instance of {expected:?}, found {found:?}")]
    ClassMismatch { expected: ClassId, found: ClassId },

    #[error("function `{name}` not found")]
    UndefinedFunction { name: String },

    #[error("`{func}` produced {got} values, expected {expected}")]
    ReturnCountMismatch {
        func: String,
        expected: usize,
        got: usize,
    },

    #[error("`{func}` takes {expected} arguments, {got} given")]
    ArgCount {
        func: String,
        expected: usize,
        got: usize,
    },

    #[error("`break` or `continue` escaped the body of `{func}`")]
    LoopControlEscape { func: String },

    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("argument {index} of `{callee}` has no default value")]
    MissingDefault { callee: String, index: usize },

    /// Raised by host bindings.
    #[error("{native}: {message}")]
    Native { native: String, message: String },

    #[error(transparent)]
    Script(#[from] ScriptError),
}

impl EvalError {
    pub fn native(native: impl Into<String>, message: impl Into<String>) -> Self {
        EvalError::Native {
            native: native.into(),
            message: message.into(),
        }
    }

    /// Whether this is the call depth bound.
    pub fn is_stack_overflow(&self) -> bool {
        matches!(self, EvalError::StackOverflow { .. })
    }
}

/// Authoring error with the location it was found at.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind} (in `{func}` at {span})")]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    pub func: String,
    pub span: Span,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScriptErrorKind {
    #[error("unresolved function {0:?}")]
    UnresolvedFunc(FuncId),

    #[error("unresolved native {0:?}")]
    UnresolvedNative(NativeId),

    #[error("unresolved class {0:?}")]
    UnresolvedClass(ClassId),

    #[error("{class:?} has no {field:?}")]
    UnresolvedField { class: ClassId, field: FieldIdx },

    #[error("`{callee}` takes {expected} arguments, {got} given")]
    ArgCount {
        callee: String,
        expected: usize,
        got: usize,
    },

    #[error("argument {index} of `{callee}` must be passed by ref")]
    RefRequired { callee: String, index: usize },

    #[error("argument {index} of `{callee}` is not a ref parameter")]
    RefNotAllowed { callee: String, index: usize },

    #[error("{field:?} of {class:?} is computed and cannot be passed by ref")]
    FieldNotRef { class: ClassId, field: FieldIdx },

    #[error("argument {index} of `{callee}` has no default value")]
    MissingDefault { callee: String, index: usize },

    #[error("{slot:?} out of range for {locals} slots")]
    SlotOutOfRange { slot: Slot, locals: u16 },

    #[error("lambda {0:?} is not declared inside this function")]
    LambdaParent(FuncId),

    #[error("{0:?} is not a lambda")]
    NotALambda(FuncId),

    #[error("`return` yields {got} values, function declares {expected}")]
    ReturnCount { expected: u8, got: usize },

    #[error("`{0}` outside of a loop")]
    LoopControl(&'static str),

    #[error("config binding `{0}` called without a config literal")]
    ConfigMissing(String),

    #[error("`{0}` does not accept a config literal")]
    ConfigUnexpected(String),
}
