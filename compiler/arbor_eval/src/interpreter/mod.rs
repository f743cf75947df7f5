//! The driver: execution context for every node operation.
//!
//! An [`Interpreter`] owns everything that outlives a single node: the heap,
//! the operand stack, frames, the call stack, the node cache and the script
//! scheduler. Nodes receive it as `&mut Interpreter` on every lifecycle
//! call; there is no global instance.
//!
//! Hosts obtain a [`FuncNode`] for a declared function and tick it with
//! [`FuncNode::run`] (or [`Interpreter::exec_node`]). Native bindings use
//! the push/pop helpers to exchange values with the operand stack.

mod builder;
mod func_node;
mod scope_guard;

use std::rc::Rc;

use arbor_ir::{ClassId, FieldIdx, FuncId, ModuleId, Name, NativeId, Program, Slot};

pub use builder::InterpreterBuilder;
pub use func_node::{ExecResult, FuncNode, ScriptNode};

use crate::bindings::{Bindings, FieldAccess, NativeNode};
use crate::diagnostics::CallStack;
use crate::frame::{Frame, FrameId};
use crate::node::{Node, NodeBuilder, NodeCache, Status};
use crate::operand_stack::OperandStack;
use crate::output::{OutputHandler, SharedOutput};
use crate::scheduler::Scheduler;
use crate::value::{CellId, Heap, HeapStats, ObjectId, Operand, Pool, PoolStats, Value};
use crate::{EvalConfig, EvalError, EvalResult};

pub struct Interpreter {
    pub(crate) program: Rc<Program>,
    pub(crate) bindings: Rc<Bindings>,
    builder: NodeBuilder,
    pub(crate) heap: Heap,
    pub(crate) stack: OperandStack,
    pub(crate) frames: Pool<Frame>,
    pub(crate) call_stack: CallStack,
    pub(crate) nodes: NodeCache,
    pub(crate) scheduler: Scheduler,
    output: SharedOutput,
    config: EvalConfig,
}

impl Interpreter {
    fn new(
        program: Rc<Program>,
        bindings: Rc<Bindings>,
        config: EvalConfig,
        output: SharedOutput,
    ) -> Self {
        let mut heap = Heap::new();
        heap.record_events(config.record_ref_events);
        Interpreter {
            builder: NodeBuilder::new(Rc::clone(&program), Rc::clone(&bindings)),
            program,
            bindings,
            heap,
            stack: OperandStack::new(config.stack_limit),
            frames: Pool::new("frame"),
            call_stack: CallStack::new(config.max_call_depth),
            nodes: NodeCache::new(),
            scheduler: Scheduler::default(),
            output,
            config,
        }
    }

    // Accessors

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn output(&self) -> &OutputHandler {
        &self.output
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Intern `text` in the shared interner.
    pub fn name(&self, text: &str) -> Name {
        self.program.interner().intern(text)
    }

    // Entry points

    /// Root node for a function of the main module, or the lowest module
    /// declaring `name`.
    pub fn func_node(&self, name: &str) -> EvalResult<FuncNode> {
        let func = self
            .program
            .lookup_str(name)
            .ok_or_else(|| EvalError::UndefinedFunction {
                name: name.to_owned(),
            })?;
        self.func_node_by_id(func)
    }

    pub fn func_node_in(&self, module: ModuleId, name: &str) -> EvalResult<FuncNode> {
        let undefined = || EvalError::UndefinedFunction {
            name: name.to_owned(),
        };
        let name = self.program.interner().get(name).ok_or_else(undefined)?;
        let func = self.program.lookup(module, name).ok_or_else(undefined)?;
        self.func_node_by_id(func)
    }

    pub fn func_node_by_id(&self, func: FuncId) -> EvalResult<FuncNode> {
        if self.program.func(func).is_none() {
            return Err(EvalError::UnknownFunc(func));
        }
        Ok(FuncNode::new(func))
    }

    /// Tick `node` once and collect its results. On success exactly
    /// `expected` values must come back.
    pub fn exec_node(&mut self, node: &mut FuncNode, expected: usize) -> EvalResult<ExecResult> {
        let status = node.run(self)?;
        let values = node.take_results();
        if status == Status::Success && values.len() != expected {
            let got = values.len();
            for value in &values {
                self.release(value)?;
            }
            return Err(EvalError::ReturnCountMismatch {
                func: self.program.func_name(node.func()).to_owned(),
                expected,
                got,
            });
        }
        Ok(ExecResult { status, values })
    }

    /// Node running a closure with no arguments. The node holds a reference
    /// on the closure until [`ScriptNode::release`].
    pub fn script_node(&mut self, closure: crate::value::ClosureId) -> EvalResult<ScriptNode> {
        let value = Value::Func(closure);
        self.heap.retain(&value)?;
        Ok(ScriptNode::new(value))
    }

    // Scheduler

    /// Schedule an independent copy of `closure`. With `now`, the copy gets
    /// its first tick immediately.
    pub fn start_script(&mut self, closure: crate::value::ClosureId, now: bool) -> EvalResult<()> {
        let copy = self.heap.clone_closure(closure)?;
        let mut script = self.script_node(copy)?;
        tracing::debug!(?closure, now, "script started");
        if now {
            match script.run(self) {
                Ok(status) if status.is_terminal() => {
                    tracing::debug!(?closure, "script finished on its first tick");
                    return script.release(self);
                }
                Ok(_) => {}
                Err(err) => {
                    if let Err(secondary) = script.release(self) {
                        tracing::warn!(error = %secondary, "error releasing a failed script");
                    }
                    return Err(err);
                }
            }
        }
        self.scheduler.add(script);
        Ok(())
    }

    /// Tick every scheduled script once. Finished scripts are released.
    /// Returns how many are still running.
    pub fn tick_scripts(&mut self) -> EvalResult<usize> {
        let mut pending = self.scheduler.take().into_iter();
        let mut running = Vec::new();
        let mut result = Ok(());
        for mut script in pending.by_ref() {
            match script.run(self) {
                Ok(Status::Running) => running.push(script),
                Ok(status) => {
                    tracing::debug!(?status, "script finished");
                    self.scheduler.record_finished();
                    if let Err(err) = script.release(self) {
                        result = Err(err);
                        break;
                    }
                }
                Err(err) => {
                    script.abort(self, &err);
                    if let Err(secondary) = script.release(self) {
                        tracing::warn!(error = %secondary, "error releasing a failed script");
                    }
                    result = Err(err);
                    break;
                }
            }
        }
        running.extend(pending);
        self.scheduler.restore(running);
        result.map(|()| self.scheduler.len())
    }

    /// Stop and release every scheduled script, newest first. All scripts
    /// are released even if one fails; the first error is returned.
    pub fn stop_scripts(&mut self) -> EvalResult<()> {
        let scripts = self.scheduler.take();
        let mut result = Ok(());
        for script in scripts.into_iter().rev() {
            let released = script.release(self);
            if result.is_ok() {
                result = released;
            }
        }
        result
    }

    pub fn script_count(&self) -> usize {
        self.scheduler.len()
    }

    // Introspection

    /// Live operand stack entries. Zero between top-level ticks.
    pub fn stack_count(&self) -> usize {
        self.stack.len()
    }

    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    pub fn frame_stats(&self) -> PoolStats {
        self.frames.stats()
    }

    /// Function bodies ever built, over all functions.
    pub fn node_pool_count(&self) -> usize {
        self.nodes.total().count
    }

    /// Function bodies currently idle in the cache.
    pub fn node_pool_count_free(&self) -> usize {
        self.nodes.total().free
    }

    pub fn node_pool_stats(&self, func: FuncId) -> PoolStats {
        self.nodes.stats(func)
    }

    /// Drop every cached function body.
    pub fn clear_node_cache(&mut self) {
        self.nodes.clear();
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.depth()
    }

    // Operand stack helpers for natives

    /// Push a borrowed value; the stack takes its own reference.
    pub fn push_value(&mut self, value: Value) -> EvalResult<()> {
        self.heap.retain(&value)?;
        self.stack.push(Operand::Value(value))
    }

    /// Pop a value, taking over the stack's reference. Release it with
    /// [`Interpreter::release`] when done.
    pub fn pop_value(&mut self) -> EvalResult<Value> {
        let operand = self.stack.pop()?;
        self.into_value(operand)
    }

    pub fn pop_num(&mut self) -> EvalResult<f64> {
        self.pop_as("number", Value::as_num)
    }

    pub fn pop_bool(&mut self) -> EvalResult<bool> {
        self.pop_as("bool", Value::as_bool)
    }

    pub fn pop_str(&mut self) -> EvalResult<String> {
        self.pop_as("string", |v| v.as_str().map(str::to_owned))
    }

    /// Pop and convert a primitive; a mismatched value is released.
    fn pop_as<T>(
        &mut self,
        expected: &'static str,
        convert: impl FnOnce(&Value) -> Option<T>,
    ) -> EvalResult<T> {
        let value = self.pop_value()?;
        let converted = convert(&value);
        self.release(&value)?;
        converted.ok_or(EvalError::TypeMismatch {
            expected,
            found: value.type_name(),
        })
    }

    /// Pop a `ref` argument. The caller owns one reference on the cell and
    /// gives it back with `heap_mut().release_cell`.
    pub fn pop_ref(&mut self) -> EvalResult<CellId> {
        match self.stack.pop()? {
            Operand::Ref(cell) => Ok(cell),
            Operand::Value(value) => {
                self.release(&value)?;
                Err(EvalError::ExpectedRef)
            }
        }
    }

    /// Drop one reference. No-op for primitives.
    pub fn release(&mut self, value: &Value) -> EvalResult<()> {
        self.heap.release(value)
    }

    // Crate internals

    /// Resolve an operand to a value owning one reference.
    pub(crate) fn into_value(&mut self, operand: Operand) -> EvalResult<Value> {
        match operand {
            Operand::Value(value) => Ok(value),
            Operand::Ref(cell) => {
                let value = self.heap.load(cell)?;
                self.heap.retain(&value)?;
                self.heap.release_cell(cell)?;
                Ok(value)
            }
        }
    }

    pub(crate) fn release_operand(&mut self, operand: Operand) -> EvalResult<()> {
        match operand {
            Operand::Value(value) => self.heap.release(&value),
            Operand::Ref(cell) => self.heap.release_cell(cell),
        }
    }

    pub(crate) fn pop_truthy(&mut self) -> EvalResult<bool> {
        let value = self.pop_value()?;
        let truthy = value.is_truthy();
        self.release(&value)?;
        Ok(truthy)
    }

    pub(crate) fn pop_index(&mut self) -> EvalResult<usize> {
        self.pop_as("index", Value::as_index)
    }

    fn current_frame(&self) -> EvalResult<FrameId> {
        self.call_stack
            .current()
            .map(|c| c.frame)
            .ok_or(EvalError::NoFrame)
    }

    /// Declared return count of the function whose body is ticking.
    pub(crate) fn current_returns(&self) -> EvalResult<usize> {
        let func = self.call_stack.current().ok_or(EvalError::NoFrame)?.func;
        let decl = self.program.func(func).ok_or(EvalError::UnknownFunc(func))?;
        Ok(usize::from(decl.returns))
    }

    pub(crate) fn current_frame_mut(&mut self) -> EvalResult<&mut Frame> {
        let id = self.current_frame()?;
        self.frames.get_mut(id)
    }

    pub(crate) fn slot_cell(&self, slot: Slot) -> EvalResult<CellId> {
        let id = self.current_frame()?;
        self.frames.get(id)?.cell(slot)
    }

    pub(crate) fn push_ref(&mut self, slot: Slot) -> EvalResult<()> {
        let cell = self.slot_cell(slot)?;
        self.heap.retain_cell(cell)?;
        self.stack.push(Operand::Ref(cell))
    }

    /// Bind `slot` of the current frame, taking over one reference on `cell`.
    pub(crate) fn bind_slot(&mut self, slot: Slot, cell: CellId) -> EvalResult<()> {
        let frame = self.current_frame()?;
        self.frame_bind(frame, slot, cell)
    }

    pub(crate) fn frame_bind(&mut self, frame: FrameId, slot: Slot, cell: CellId) -> EvalResult<()> {
        if let Some(old) = self.frames.get_mut(frame)?.bind(slot, cell)? {
            self.heap.release_cell(old)?;
        }
        Ok(())
    }

    pub(crate) fn acquire_body(&mut self, func: FuncId) -> EvalResult<Box<Node>> {
        self.nodes.acquire(func, &self.builder)
    }

    pub(crate) fn instantiate_native(&self, native: NativeId) -> EvalResult<Box<dyn NativeNode>> {
        self.bindings
            .func(native)
            .map(crate::bindings::FuncBinding::instantiate)
            .ok_or(EvalError::UnknownNative(native))
    }

    pub(crate) fn new_object(&mut self, class: ClassId) -> EvalResult<ObjectId> {
        let binding = self.bindings.class(class).ok_or(EvalError::UnknownClass(class))?;
        let host = binding.ctor.as_ref().map(|ctor| ctor());
        let fields = binding.fields.len();
        self.heap.new_object(class, fields, host)
    }

    fn field_access(&self, class: ClassId, field: FieldIdx) -> EvalResult<FieldAccess> {
        self.bindings
            .class(class)
            .ok_or(EvalError::UnknownClass(class))?
            .field(field)
            .map(|f| f.access)
            .ok_or(EvalError::UnknownField { class, field })
    }

    fn host_missing(&self, class: ClassId) -> EvalError {
        let name = self
            .bindings
            .class(class)
            .map_or("<unknown class>", |c| self.program.interner().lookup(c.name));
        EvalError::native(name, "object has no host data")
    }

    /// Check that `value` is an instance of `class` or of a subclass.
    pub(crate) fn check_instance(&self, value: &Value, class: ClassId) -> EvalResult<()> {
        let Value::Object(object) = value else {
            return Err(EvalError::TypeMismatch {
                expected: "object",
                found: value.type_name(),
            });
        };
        self.check_class(*object, class)
    }

    fn check_class(&self, object: ObjectId, class: ClassId) -> EvalResult<()> {
        let found = self.heap.object(object)?.class();
        if self.bindings.is_subclass(found, class) {
            Ok(())
        } else {
            Err(EvalError::ClassMismatch {
                expected: class,
                found,
            })
        }
    }

    /// Field value, borrowed (no reference taken).
    pub(crate) fn get_field(&self, object: ObjectId, class: ClassId, field: FieldIdx) -> EvalResult<Value> {
        self.check_class(object, class)?;
        match self.field_access(class, field)? {
            FieldAccess::Stored => self.heap.field(object, field.index()),
            FieldAccess::Computed { get, .. } => {
                let host = self
                    .heap
                    .object(object)?
                    .host_any()
                    .ok_or_else(|| self.host_missing(class))?;
                Ok(get(host))
            }
        }
    }

    pub(crate) fn set_field(
        &mut self,
        object: ObjectId,
        class: ClassId,
        field: FieldIdx,
        value: &Value,
    ) -> EvalResult<()> {
        self.check_class(object, class)?;
        match self.field_access(class, field)? {
            FieldAccess::Stored => self.heap.set_field(object, field.index(), value),
            FieldAccess::Computed { set: Some(set), .. } => {
                let missing = self.host_missing(class);
                let host = self.heap.object_mut(object)?.host_any_mut().ok_or(missing)?;
                set(host, value);
                Ok(())
            }
            FieldAccess::Computed { set: None, .. } => {
                Err(EvalError::native("field", "assignment to a read-only field"))
            }
        }
    }

    /// Push a reference to a field's storage for a `ref` parameter. Only
    /// engine-managed fields have storage to share.
    pub(crate) fn push_field_ref(&mut self, object: ObjectId, class: ClassId, field: FieldIdx) -> EvalResult<()> {
        self.check_class(object, class)?;
        let cell = match self.field_access(class, field)? {
            FieldAccess::Stored => self.heap.field_cell(object, field.index())?,
            FieldAccess::Computed { .. } => {
                return Err(EvalError::native("field", "a computed field has no storage to reference"));
            }
        };
        self.heap.retain_cell(cell)?;
        self.stack.push(Operand::Ref(cell))
    }

    /// Unwind after a fatal error: stop `root` (running its defers), then
    /// drop whatever the aborted tick left on the operand and call stacks.
    pub(crate) fn abort(&mut self, root: &mut Node, err: &EvalError) {
        tracing::debug!(error = %err, "aborting invocation");
        if let Err(secondary) = root.stop(self) {
            tracing::warn!(error = %secondary, "error while unwinding an aborted invocation");
        }
        for operand in self.stack.take_all() {
            if let Err(secondary) = self.release_operand(operand) {
                tracing::warn!(error = %secondary, "error releasing an abandoned operand");
            }
        }
        self.call_stack.clear();
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("program", &self.program)
            .field("bindings", &self.bindings)
            .field("stack", &self.stack.len())
            .field("call_depth", &self.call_stack.depth())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
