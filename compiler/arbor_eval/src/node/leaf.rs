//! Leaf nodes: single-tick operations on the operand stack and the frame.
//!
//! Operands are already on the stack when a leaf runs (its enclosing chain
//! put them there); the leaf pops them, takes ownership, and pushes its
//! results.

use std::rc::Rc;

use arbor_ir::{
    ArrayOp, BinaryOp, Callee, Capture, CastKind, ClassId, FieldIdx, FuncId, Slot, Target, UnaryOp,
};
use smallvec::SmallVec;

use super::{Flow, Lifecycle};
use crate::ops::{evaluate_binary, evaluate_cast, evaluate_unary};
use crate::value::{ListId, ObjectId, Upval, Value};
use crate::{EvalError, EvalResult, Interpreter};

pub(crate) enum Leaf {
    /// Literal.
    Push(Value),
    Load(Slot),
    /// Push the slot's cell for a `ref` parameter.
    LoadRef(Slot),
    /// Pop an object and push the storage cell of one of its fields.
    LoadFieldRef { class: ClassId, field: FieldIdx },
    /// Fresh storage for `slot`, initialized from the stack if `init`.
    Declare { slot: Slot, init: bool },
    Store(Slot),
    StoreMany(Vec<Target>),
    Discard(u8),
    Binary(BinaryOp),
    Unary(UnaryOp),
    Cast(CastKind),
    Closure(FuncId),
    FuncRef(Callee),
    /// Pop the current function's declared number of return values.
    Return,
    Break,
    Continue,
    MakeArray(usize),
    Array(ArrayOp),
    New { class: ClassId, fields: Vec<FieldIdx> },
    GetField { class: ClassId, field: FieldIdx },
    SetField { class: ClassId, field: FieldIdx },
}

impl Lifecycle for Leaf {
    fn execute(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        match self {
            Leaf::Push(value) => interp.push_value(value.clone())?,
            Leaf::Load(slot) => {
                let cell = interp.slot_cell(*slot)?;
                let value = interp.heap.load(cell)?;
                interp.push_value(value)?;
            }
            Leaf::LoadRef(slot) => interp.push_ref(*slot)?,
            Leaf::LoadFieldRef { class, field } => {
                let (object, id) = pop_object(interp)?;
                // The cell is retained before the object can go away.
                let pushed = interp.push_field_ref(id, *class, *field);
                interp.release(&object)?;
                pushed?;
            }
            Leaf::Declare { slot, init } => declare(interp, *slot, *init)?,
            Leaf::Store(slot) => store(interp, *slot)?,
            Leaf::StoreMany(targets) => {
                for target in targets.iter().rev() {
                    if target.declare {
                        declare(interp, target.slot, true)?;
                    } else {
                        store(interp, target.slot)?;
                    }
                }
            }
            Leaf::Discard(count) => {
                for operand in interp.stack.pop_n(usize::from(*count))? {
                    interp.release_operand(operand)?;
                }
            }
            Leaf::Binary(op) => {
                let rhs = interp.pop_value()?;
                let lhs = interp.pop_value()?;
                let result = evaluate_binary(*op, &lhs, &rhs);
                interp.release(&lhs)?;
                interp.release(&rhs)?;
                interp.push_value(result?)?;
            }
            Leaf::Unary(op) => {
                let operand = interp.pop_value()?;
                let result = evaluate_unary(*op, &operand);
                interp.release(&operand)?;
                interp.push_value(result?)?;
            }
            Leaf::Cast(CastKind::Class(class)) => {
                let operand = interp.pop_value()?;
                let pushed = interp
                    .check_instance(&operand, *class)
                    .and_then(|()| interp.push_value(operand.clone()));
                interp.release(&operand)?;
                pushed?;
            }
            Leaf::Cast(to) => {
                let operand = interp.pop_value()?;
                let result = evaluate_cast(*to, &operand);
                interp.release(&operand)?;
                interp.push_value(result?)?;
            }
            Leaf::Closure(func) => make_closure(interp, *func)?,
            Leaf::FuncRef(callee) => {
                let closure = interp.heap.new_closure(*callee, SmallVec::new())?;
                interp.push_value(Value::Func(closure))?;
            }
            Leaf::Return => {
                let count = interp.current_returns()?;
                let values = interp.stack.pop_n(count)?;
                interp.current_frame_mut()?.set_returns(values);
                return Ok(Flow::Return);
            }
            Leaf::Break => return Ok(Flow::Break),
            Leaf::Continue => return Ok(Flow::Continue),
            Leaf::MakeArray(count) => {
                let items = interp.stack.pop_n(*count)?;
                let list = interp.heap.new_list()?;
                for item in items {
                    let value = interp.into_value(item)?;
                    interp.heap.list_push(list, &value)?;
                    interp.release(&value)?;
                }
                interp.push_value(Value::List(list))?;
            }
            Leaf::Array(op) => array_op(interp, *op)?,
            Leaf::New { class, fields } => {
                let values = interp.stack.pop_n(fields.len())?;
                let object = interp.new_object(*class)?;
                // Keep the object alive while field setters run.
                interp.push_value(Value::Object(object))?;
                let mut result = Ok(());
                for (field, operand) in fields.iter().zip(values) {
                    let value = interp.into_value(operand)?;
                    if result.is_ok() {
                        result = interp.set_field(object, *class, *field, &value);
                    }
                    interp.release(&value)?;
                }
                result?;
            }
            Leaf::GetField { class, field } => {
                let (object, id) = pop_object(interp)?;
                let value = interp.get_field(id, *class, *field);
                let pushed = value.and_then(|value| interp.push_value(value));
                interp.release(&object)?;
                pushed?;
            }
            Leaf::SetField { class, field } => {
                let value = interp.pop_value()?;
                let stored = pop_object(interp).and_then(|(object, id)| {
                    let stored = interp.set_field(id, *class, *field, &value);
                    interp.release(&object)?;
                    stored
                });
                interp.release(&value)?;
                stored?;
            }
        }
        Ok(Flow::Success)
    }
}

fn declare(interp: &mut Interpreter, slot: Slot, init: bool) -> EvalResult<()> {
    let cell = interp.heap.new_cell()?;
    interp.heap.retain_cell(cell)?;
    if init {
        let value = interp.pop_value()?;
        interp.heap.assign(cell, &value)?;
        interp.release(&value)?;
    }
    interp.bind_slot(slot, cell)
}

fn store(interp: &mut Interpreter, slot: Slot) -> EvalResult<()> {
    let value = interp.pop_value()?;
    let cell = interp.slot_cell(slot)?;
    interp.heap.assign(cell, &value)?;
    interp.release(&value)
}

/// Capture the current frame's slots per the lambda's upvalue list.
fn make_closure(interp: &mut Interpreter, func: FuncId) -> EvalResult<()> {
    let program = Rc::clone(&interp.program);
    let decl = program.func(func).ok_or(EvalError::UnknownFunc(func))?;
    let mut upvalues = SmallVec::with_capacity(decl.upvalues.len());
    for up in &decl.upvalues {
        let source = interp.slot_cell(up.src)?;
        let cell = match up.capture {
            Capture::ByRef => source,
            Capture::ByValue => {
                let value = interp.heap.load(source)?;
                let cell = interp.heap.new_cell()?;
                interp.heap.assign(cell, &value)?;
                cell
            }
        };
        interp.heap.retain_cell(cell)?;
        upvalues.push(Upval {
            cell,
            capture: up.capture,
        });
    }
    let closure = interp.heap.new_closure(Callee::Func(func), upvalues)?;
    interp.push_value(Value::Func(closure))
}

fn pop_object(interp: &mut Interpreter) -> EvalResult<(Value, ObjectId)> {
    let value = interp.pop_value()?;
    match value.as_object() {
        Some(id) => Ok((value, id)),
        None => {
            let found = value.type_name();
            interp.release(&value)?;
            Err(EvalError::TypeMismatch {
                expected: "object",
                found,
            })
        }
    }
}

fn pop_list(interp: &mut Interpreter) -> EvalResult<(Value, ListId)> {
    let value = interp.pop_value()?;
    match value.as_list() {
        Some(list) => Ok((value, list)),
        None => {
            let found = value.type_name();
            interp.release(&value)?;
            Err(EvalError::TypeMismatch {
                expected: "array",
                found,
            })
        }
    }
}

/// Pop the array operand, run `f` on it, then drop the array. The array is
/// released on every path.
fn on_list<T>(
    interp: &mut Interpreter,
    f: impl FnOnce(&mut Interpreter, ListId) -> EvalResult<T>,
) -> EvalResult<T> {
    let (array, list) = pop_list(interp)?;
    let result = f(interp, list);
    interp.release(&array)?;
    result
}

fn array_op(interp: &mut Interpreter, op: ArrayOp) -> EvalResult<()> {
    match op {
        ArrayOp::New => {
            let list = interp.heap.new_list()?;
            interp.push_value(Value::List(list))?;
        }
        ArrayOp::Add => {
            let item = interp.pop_value()?;
            let pushed = on_list(interp, |interp, list| interp.heap.list_push(list, &item));
            interp.release(&item)?;
            pushed?;
        }
        ArrayOp::At => {
            let index = interp.pop_index()?;
            on_list(interp, |interp, list| {
                let item = interp.heap.list_get(list, index)?;
                interp.push_value(item)
            })?;
        }
        ArrayOp::SetAt => {
            let item = interp.pop_value()?;
            let stored = interp.pop_index().and_then(|index| {
                on_list(interp, |interp, list| interp.heap.list_set(list, index, &item))
            });
            interp.release(&item)?;
            stored?;
        }
        ArrayOp::RemoveAt => {
            let index = interp.pop_index()?;
            on_list(interp, |interp, list| interp.heap.list_remove_at(list, index))?;
        }
        ArrayOp::Count => {
            let len = on_list(interp, |interp, list| interp.heap.list_len(list))?;
            #[expect(
                clippy::cast_precision_loss,
                reason = "array lengths are far below 2^52"
            )]
            interp.push_value(Value::Num(len as f64))?;
        }
    }
    Ok(())
}
