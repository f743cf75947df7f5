//! Call sites and function bodies.
//!
//! Arguments are on the operand stack when a call site initializes (its
//! chain put them there). A user call acquires a pooled body for the callee
//! and the body pops its parameters into a fresh frame; a native call hands
//! the stack to the native node. Results are pushed when the callee
//! succeeds.

use std::rc::Rc;

use arbor_ir::{Callee, FuncId, NativeId};

use super::{Flow, Lifecycle, Node};
use crate::bindings::{ConfigShape, ConfigValue, NativeNode};
use crate::frame::{Frame, FrameId};
use crate::value::{ClosureId, Operand, Value};
use crate::{EvalError, EvalResult, Interpreter};

/// Call to a script function.
pub(crate) struct UserCall {
    func: FuncId,
    body: Option<Box<Node>>,
}

impl UserCall {
    fn new(func: FuncId) -> Self {
        UserCall { func, body: None }
    }

    fn start(&mut self, interp: &mut Interpreter, closure: Option<ClosureId>) -> EvalResult<()> {
        let mut body = interp.acquire_body(self.func)?;
        if let Some(closure) = closure {
            body.bind_closure(closure);
        }
        self.body = Some(body);
        Ok(())
    }

    fn tick(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        match &mut self.body {
            Some(body) => body.tick(interp),
            None => Err(EvalError::NoFrame),
        }
    }

    fn finish(&mut self, interp: &mut Interpreter) {
        if let Some(body) = self.body.take() {
            interp.nodes.release(self.func, body);
        }
    }

    fn stop(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        match &mut self.body {
            Some(body) => body.stop(interp),
            None => Ok(()),
        }
    }
}

/// Call to a native binding.
pub(crate) struct NativeCall {
    native: NativeId,
    node: Box<dyn NativeNode>,
    config: Option<ConfigShape>,
    record: Option<ConfigValue>,
    initialized: bool,
}

impl NativeCall {
    pub(crate) fn new(native: NativeId, node: Box<dyn NativeNode>, config: Option<ConfigShape>) -> Self {
        NativeCall {
            native,
            node,
            config,
            record: None,
            initialized: false,
        }
    }

    /// Assemble the config record, then configure and initialize the native.
    /// On error whatever was acquired is released by `finish`.
    fn start(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        tracing::trace!(native = ?self.native, "native call");
        if let Some(shape) = &self.config {
            let leaves = interp.stack.pop_n(shape.leaves())?;
            let mut values = Vec::with_capacity(leaves.len());
            for leaf in leaves {
                values.push(interp.into_value(leaf)?);
            }
            let record = self.record.insert(shape.assemble(&mut values.into_iter()));
            self.node.configure(interp, record)?;
        }
        self.node.init(interp)?;
        self.initialized = true;
        Ok(())
    }

    fn tick(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        let status = self.node.execute(interp)?;
        Ok(Flow::from(status))
    }

    fn finish(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        if std::mem::take(&mut self.initialized) {
            self.node.deinit(interp)?;
        }
        if let Some(record) = self.record.take() {
            record.release(&mut interp.heap)?;
        }
        Ok(())
    }
}

/// Call through a function value popped from the stack at init.
pub(crate) struct DynamicCall {
    callee: Value,
    target: Target,
}

enum Target {
    User(UserCall),
    Native(NativeCall),
}

pub(crate) enum CallNode {
    User(UserCall),
    Native(NativeCall),
    Dynamic(Option<DynamicCall>),
}

impl CallNode {
    pub(crate) fn user(func: FuncId) -> Self {
        CallNode::User(UserCall::new(func))
    }

    pub(crate) fn native(native: NativeCall) -> Self {
        CallNode::Native(native)
    }

    pub(crate) fn dynamic() -> Self {
        CallNode::Dynamic(None)
    }
}

impl DynamicCall {
    /// Pop the callee and pick the call target. Nothing is started yet.
    fn resolve(interp: &mut Interpreter) -> EvalResult<Self> {
        let callee = interp.pop_value()?;
        let Some(closure) = callee.as_func() else {
            interp.release(&callee)?;
            return Err(EvalError::TypeMismatch {
                expected: "function",
                found: callee.type_name(),
            });
        };
        let target = match interp.heap.closure(closure).map(|c| c.callee()) {
            Ok(Callee::Func(func)) => Ok(Target::User(UserCall::new(func))),
            Ok(Callee::Native(native)) => interp
                .instantiate_native(native)
                .map(|node| Target::Native(NativeCall::new(native, node, None))),
            Err(err) => Err(err),
        };
        match target {
            Ok(target) => Ok(DynamicCall { callee, target }),
            Err(err) => {
                interp.release(&callee)?;
                Err(err)
            }
        }
    }

    fn start(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        match &mut self.target {
            Target::User(call) => call.start(interp, self.callee.as_func()),
            Target::Native(call) => call.start(interp),
        }
    }
}

impl Lifecycle for CallNode {
    fn init(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        match self {
            CallNode::User(call) => call.start(interp, None),
            CallNode::Native(call) => call.start(interp),
            CallNode::Dynamic(active) => active.insert(DynamicCall::resolve(interp)?).start(interp),
        }
    }

    fn execute(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        match self {
            CallNode::User(call) => call.tick(interp),
            CallNode::Native(call) => call.tick(interp),
            CallNode::Dynamic(Some(DynamicCall { target, .. })) => match target {
                Target::User(call) => call.tick(interp),
                Target::Native(call) => call.tick(interp),
            },
            CallNode::Dynamic(None) => Err(EvalError::NoFrame),
        }
    }

    fn deinit(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        match self {
            CallNode::User(call) => {
                call.finish(interp);
                Ok(())
            }
            CallNode::Native(call) => call.finish(interp),
            CallNode::Dynamic(active) => {
                let Some(DynamicCall { callee, target }) = active else {
                    return Ok(());
                };
                match target {
                    Target::User(call) => call.finish(interp),
                    Target::Native(call) => call.finish(interp)?,
                }
                interp.release(&std::mem::take(callee))
            }
        }
    }

    fn defer(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        match self {
            CallNode::Native(call) => call.node.defer(interp),
            CallNode::Dynamic(active) => match active.take() {
                Some(DynamicCall {
                    target: Target::Native(mut call),
                    ..
                }) => call.node.defer(interp),
                _ => Ok(()),
            },
            CallNode::User(_) => Ok(()),
        }
    }

    fn stop_children(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        match self {
            CallNode::User(call) => call.stop(interp),
            CallNode::Native(call) => call.node.stop(interp),
            CallNode::Dynamic(Some(DynamicCall { target, .. })) => match target {
                Target::User(call) => call.stop(interp),
                Target::Native(call) => call.node.stop(interp),
            },
            CallNode::Dynamic(None) => Ok(()),
        }
    }
}

/// A function's body with its activation state: the frame holding the
/// parameter, upvalue and local cells, and the closure whose upvalues are
/// bound into it.
pub(crate) struct FuncBody {
    func: FuncId,
    root: Box<Node>,
    frame: Option<FrameId>,
    closure: Option<ClosureId>,
}

impl FuncBody {
    pub(crate) fn new(func: FuncId, root: Node) -> Self {
        FuncBody {
            func,
            root: Box::new(root),
            frame: None,
            closure: None,
        }
    }

    pub(crate) fn bind_closure(&mut self, closure: ClosureId) {
        self.closure = Some(closure);
    }

    fn frame(&self) -> EvalResult<FrameId> {
        self.frame.ok_or(EvalError::NoFrame)
    }
}

impl Lifecycle for FuncBody {
    fn init(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        let program = Rc::clone(&interp.program);
        let decl = program.func(self.func).ok_or(EvalError::UnknownFunc(self.func))?;
        let frame = interp.frames.alloc(Frame::new(decl.locals))?;
        self.frame = Some(frame);

        for param in decl.params.iter().rev() {
            let cell = match (param.is_ref, interp.stack.pop()?) {
                (true, Operand::Ref(cell)) => cell,
                (true, Operand::Value(value)) => {
                    interp.release(&value)?;
                    return Err(EvalError::ExpectedRef);
                }
                (false, operand) => {
                    let value = interp.into_value(operand)?;
                    let cell = interp.heap.new_cell()?;
                    interp.heap.retain_cell(cell)?;
                    interp.heap.assign(cell, &value)?;
                    interp.release(&value)?;
                    cell
                }
            };
            interp.frame_bind(frame, param.slot, cell)?;
        }

        if let Some(closure) = self.closure {
            let upvals = interp.heap.closure(closure)?.upvalues().to_vec();
            for (decl_up, up) in decl.upvalues.iter().zip(upvals) {
                interp.heap.retain_cell(up.cell)?;
                interp.frame_bind(frame, decl_up.dst, up.cell)?;
            }
        }
        Ok(())
    }

    fn execute(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        let frame = self.frame()?;
        let flow = {
            let mut scope = interp.enter_call(self.func, frame)?;
            self.root.tick(&mut scope)?
        };
        match flow {
            Flow::Running | Flow::Failure => Ok(flow),
            Flow::Success | Flow::Return => {
                let returns = interp.frames.get_mut(frame)?.take_returns();
                let expected = interp
                    .program
                    .func(self.func)
                    .map_or(0, |decl| usize::from(decl.returns));
                if returns.len() != expected {
                    let got = returns.len();
                    for operand in returns {
                        interp.release_operand(operand)?;
                    }
                    return Err(EvalError::ReturnCountMismatch {
                        func: interp.program.func_name(self.func).to_owned(),
                        expected,
                        got,
                    });
                }
                interp.stack.extend(returns)?;
                Ok(Flow::Success)
            }
            Flow::Break | Flow::Continue => Err(EvalError::LoopControlEscape {
                func: interp.program.func_name(self.func).to_owned(),
            }),
        }
    }

    fn deinit(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        self.closure = None;
        let Some(id) = self.frame.take() else {
            return Ok(());
        };
        let mut frame = interp.frames.free(id)?;
        for operand in frame.take_returns() {
            interp.release_operand(operand)?;
        }
        for cell in frame.take_cells() {
            interp.heap.release_cell(cell)?;
        }
        Ok(())
    }

    fn stop_children(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        let frame = self.frame()?;
        let mut scope = interp.enter_call_unchecked(self.func, frame);
        self.root.stop(&mut scope)
    }
}
