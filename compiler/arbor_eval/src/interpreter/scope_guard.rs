//! RAII guard for call frames.
//!
//! A function body ticks its root inside a [`ScopedCall`]: the guard pushes
//! the body's [`CallFrame`] on creation and pops it on drop, so the call
//! stack is balanced on every exit path, including `?` on an error.
//!
//! The guard holds `&mut Interpreter` and implements `Deref`/`DerefMut`, so
//! the root node is ticked with the guard in place of the interpreter:
//!
//! ```text
//! let mut scope = interp.enter_call(func, frame)?;
//! root.tick(&mut scope)?;
//! // frame popped here
//! ```

use std::ops::{Deref, DerefMut};

use arbor_ir::FuncId;

use super::Interpreter;
use crate::diagnostics::CallFrame;
use crate::frame::FrameId;
use crate::EvalResult;

pub(crate) struct ScopedCall<'a> {
    interp: &'a mut Interpreter,
}

impl Drop for ScopedCall<'_> {
    fn drop(&mut self) {
        self.interp.call_stack.pop();
    }
}

impl Deref for ScopedCall<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Self::Target {
        self.interp
    }
}

impl DerefMut for ScopedCall<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.interp
    }
}

impl Interpreter {
    /// Make `frame` current for the guard's lifetime, enforcing the call
    /// depth bound.
    pub(crate) fn enter_call(&mut self, func: FuncId, frame: FrameId) -> EvalResult<ScopedCall<'_>> {
        self.call_stack
            .push(CallFrame { func, frame }, &self.program)?;
        Ok(ScopedCall { interp: self })
    }

    /// Like [`Interpreter::enter_call`] without the bound. Used while
    /// unwinding, which must reach every running body.
    pub(crate) fn enter_call_unchecked(&mut self, func: FuncId, frame: FrameId) -> ScopedCall<'_> {
        self.call_stack.push_unchecked(CallFrame { func, frame });
        ScopedCall { interp: self }
    }
}
