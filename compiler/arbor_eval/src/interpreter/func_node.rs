//! Host-facing roots: a declared function with its arguments, and a closure
//! run as a script.

use arbor_ir::FuncId;

use super::Interpreter;
use crate::node::{CallNode, Node, NodeKind, NodeStatus, Status};
use crate::value::Value;
use crate::{EvalError, EvalResult};

/// Outcome of [`Interpreter::exec_node`].
#[derive(Clone, Debug, PartialEq)]
pub struct ExecResult {
    pub status: Status,
    /// Return values, first declared first. Each holds one reference.
    pub values: Vec<Value>,
}

/// Root node of a declared function.
///
/// Arguments set with [`FuncNode::set_args`] are pushed at the start of each
/// activation. The function body comes from the interpreter's node cache.
pub struct FuncNode {
    func: FuncId,
    call: Node,
    args: Vec<Value>,
    results: Vec<Value>,
}

impl FuncNode {
    pub(crate) fn new(func: FuncId) -> Self {
        FuncNode {
            func,
            call: Node::new(NodeKind::Call(CallNode::user(func))),
            args: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn func(&self) -> FuncId {
        self.func
    }

    pub fn status(&self) -> NodeStatus {
        self.call.status()
    }

    /// Arguments for the next activations, first parameter first. The node
    /// keeps a reference on each until replaced or released. Every
    /// parameter must be given.
    pub fn set_args(&mut self, interp: &mut Interpreter, args: Vec<Value>) -> EvalResult<()> {
        let expected = interp
            .program
            .func(self.func)
            .ok_or(EvalError::UnknownFunc(self.func))?
            .params
            .len();
        if args.len() != expected {
            return Err(EvalError::ArgCount {
                func: interp.program.func_name(self.func).to_owned(),
                expected,
                got: args.len(),
            });
        }
        for arg in &args {
            interp.heap.retain(arg)?;
        }
        for old in std::mem::replace(&mut self.args, args) {
            interp.release(&old)?;
        }
        Ok(())
    }

    /// Tick once. A fatal error stops the node, unwinding its defers, and
    /// resets the interpreter's stacks before it is returned.
    pub fn run(&mut self, interp: &mut Interpreter) -> EvalResult<Status> {
        let fresh = !self.call.is_running();
        let flow = self.tick(interp, fresh);
        let status = match flow {
            Ok(status) => status,
            Err(err) => {
                interp.abort(&mut self.call, &err);
                return Err(err);
            }
        };
        if status == Status::Success {
            let returns = interp
                .program
                .func(self.func)
                .map_or(0, |decl| usize::from(decl.returns));
            let mut values = Vec::with_capacity(returns);
            for _ in 0..returns {
                values.push(interp.pop_value()?);
            }
            values.reverse();
            self.results.extend(values);
        }
        Ok(status)
    }

    fn tick(&mut self, interp: &mut Interpreter, fresh: bool) -> EvalResult<Status> {
        if fresh {
            for arg in &self.args {
                interp.push_value(arg.clone())?;
            }
        }
        Ok(self.call.tick(interp)?.status())
    }

    /// Results of the activations that succeeded since the last call. The
    /// caller owns one reference on each.
    pub fn take_results(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.results)
    }

    /// Cancel a running activation, running its defers.
    pub fn stop(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        self.call.stop(interp)
    }

    /// Stop the node and drop its arguments and pending results.
    pub fn release(mut self, interp: &mut Interpreter) -> EvalResult<()> {
        self.stop(interp)?;
        for value in self.args.drain(..).chain(self.results.drain(..)) {
            interp.release(&value)?;
        }
        Ok(())
    }
}

/// A closure run as a behavior. Holds one reference on the closure.
pub struct ScriptNode {
    closure: Value,
    call: Node,
}

impl ScriptNode {
    pub(crate) fn new(closure: Value) -> Self {
        ScriptNode {
            closure,
            call: Node::new(NodeKind::Call(CallNode::dynamic())),
        }
    }

    pub fn closure(&self) -> &Value {
        &self.closure
    }

    pub fn status(&self) -> NodeStatus {
        self.call.status()
    }

    /// Tick once. Errors propagate to the caller, which owns the unwinding:
    /// a script ticked from inside another node is stopped by its parent.
    pub fn run(&mut self, interp: &mut Interpreter) -> EvalResult<Status> {
        if !self.call.is_running() {
            interp.push_value(self.closure.clone())?;
        }
        Ok(self.call.tick(interp)?.status())
    }

    /// Unwind after a fatal error at the top level.
    pub(crate) fn abort(&mut self, interp: &mut Interpreter, err: &EvalError) {
        interp.abort(&mut self.call, err);
    }

    pub fn stop(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        self.call.stop(interp)
    }

    /// Stop the script and drop its closure. The closure is dropped even
    /// if stopping fails.
    pub fn release(mut self, interp: &mut Interpreter) -> EvalResult<()> {
        let stopped = self.call.stop(interp);
        interp.release(&self.closure)?;
        stopped
    }
}
