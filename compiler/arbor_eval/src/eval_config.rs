//! Engine limits and debugging switches.

use crate::DEFAULT_MAX_CALL_DEPTH;

/// Default bound on live operand stack entries.
pub const DEFAULT_STACK_LIMIT: usize = 1 << 16;

/// Configuration of one [`Interpreter`](crate::Interpreter).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EvalConfig {
    /// Nested function activations allowed before `StackOverflow`.
    pub max_call_depth: usize,
    /// Operand stack capacity.
    pub stack_limit: usize,
    /// Record every refcount operation on the heap (see `Heap::take_events`).
    pub record_ref_events: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            stack_limit: DEFAULT_STACK_LIMIT,
            record_ref_events: false,
        }
    }
}
