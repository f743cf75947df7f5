//! `InterpreterBuilder` for creating Interpreter instances.

use std::rc::Rc;

use arbor_ir::Program;

use super::Interpreter;
use crate::bindings::Bindings;
use crate::output::{stdout_output, SharedOutput};
use crate::validate::validate;
use crate::{EvalConfig, ScriptError};

/// Builder for [`Interpreter`].
///
/// The program and the bindings it was resolved against are required; limits
/// default to [`EvalConfig::default`] and output goes to stdout unless a
/// handler is set.
pub struct InterpreterBuilder {
    program: Rc<Program>,
    bindings: Rc<Bindings>,
    config: EvalConfig,
    output: Option<SharedOutput>,
}

impl InterpreterBuilder {
    pub fn new(program: impl Into<Rc<Program>>, bindings: impl Into<Rc<Bindings>>) -> Self {
        Self {
            program: program.into(),
            bindings: bindings.into(),
            config: EvalConfig::default(),
            output: None,
        }
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    /// Nested activations allowed before `StackOverflow`.
    #[must_use]
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.config.max_call_depth = depth;
        self
    }

    #[must_use]
    pub fn stack_limit(mut self, limit: usize) -> Self {
        self.config.stack_limit = limit;
        self
    }

    /// Record refcount operations for inspection through
    /// `Heap::take_events`.
    #[must_use]
    pub fn record_ref_events(mut self, enabled: bool) -> Self {
        self.config.record_ref_events = enabled;
        self
    }

    /// Set where `trace` and other script output goes.
    #[must_use]
    pub fn output(mut self, output: SharedOutput) -> Self {
        self.output = Some(output);
        self
    }

    /// Validate the program against the bindings and build the interpreter.
    pub fn build(self) -> Result<Interpreter, ScriptError> {
        validate(&self.program, &self.bindings)?;
        let output = self.output.unwrap_or_else(stdout_output);
        Ok(Interpreter::new(self.program, self.bindings, self.config, output))
    }
}
