//! Resolved syntax tree for the Arbor scripting language.
//!
//! The frontend (parser, symbol resolution, type checking) is an external
//! collaborator. What it hands to the execution engine is described here:
//! every name is already resolved to a numeric identity, every call knows its
//! argument count and by-ref flags, and every lambda carries a flat list of
//! upvalue descriptors.
//!
//! # Layout
//!
//! - [`ids`]: numeric identities (`FuncId`, `NativeId`, `Slot`, ...)
//! - [`Name`] / [`StringInterner`]: interned identifiers
//! - [`ast`]: declarations, blocks and expressions
//! - [`Program`]: the full set of declarations plus a name index
//! - [`ProgramBuilder`]: assembles a [`Program`] the way the frontend does

pub mod ast;
mod builder;
pub mod ids;
mod interner;
mod name;
mod program;
mod span;

pub use ast::{
    Arg, ArrayOp, BinaryOp, Block, BlockKind, Call, CallTarget, Capture, CastKind, ConfigLiteral,
    Expr, FuncDecl, FuncKind, IfArm, Literal, LogicalOp, Param, Target, UnaryOp, Upvalue,
};
pub use builder::{ProgramBuilder, Signature};
pub use ids::{Callee, ClassId, FieldIdx, FuncId, ModuleId, NativeId, Slot};
pub use interner::{SharedInterner, StringInterner};
pub use name::Name;
pub use program::Program;
pub use span::Span;
