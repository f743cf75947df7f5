//! Call stack tracking.
//!
//! Every running function body pushes a [`CallFrame`] while it ticks. The
//! depth of this stack is the recursion depth, and it is bounded: a script
//! recursing without end gets `EvalError::StackOverflow` with a backtrace
//! instead of exhausting the host.

use arbor_ir::{FuncId, Program};

use crate::frame::FrameId;
use crate::{EvalError, EvalResult};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CallFrame {
    pub func: FuncId,
    pub frame: FrameId,
}

#[derive(Clone, Debug)]
pub struct CallStack {
    frames: Vec<CallFrame>,
    max_depth: usize,
}

/// Frames shown in a stack overflow backtrace.
const BACKTRACE_LIMIT: usize = 16;

impl CallStack {
    pub fn new(max_depth: usize) -> Self {
        CallStack {
            frames: Vec::new(),
            max_depth,
        }
    }

    /// Push a frame, checking the depth bound. The frame is not pushed on
    /// overflow.
    pub fn push(&mut self, frame: CallFrame, program: &Program) -> EvalResult<()> {
        if self.frames.len() >= self.max_depth {
            return Err(EvalError::StackOverflow {
                depth: self.max_depth,
                backtrace: self.backtrace(program),
            });
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Push without the bound. Unwinding must not fail on depth.
    pub fn push_unchecked(&mut self, frame: CallFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) {
        debug_assert!(!self.frames.is_empty(), "CallStack::pop on empty stack");
        self.frames.pop();
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    #[inline]
    pub fn current(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Function names, innermost first.
    pub fn backtrace(&self, program: &Program) -> Vec<String> {
        self.frames
            .iter()
            .rev()
            .take(BACKTRACE_LIMIT)
            .map(|f| program.func_name(f.func).to_owned())
            .collect()
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new(crate::DEFAULT_MAX_CALL_DEPTH)
    }
}
