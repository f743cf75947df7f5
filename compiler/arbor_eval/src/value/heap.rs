//! Reference-counted pools for storage cells, arrays, closures and objects.
//!
//! # Ownership protocol
//!
//! - Heap objects start at `refs == 0`. The first holder performs the first
//!   retain.
//! - [`Heap::assign`] retains the new value before releasing the old one, so
//!   `r = r` never transiently reaches zero.
//! - Storing into a list, an object field or a cell is a retain; removing is
//!   a release.
//! - Reaching zero on a release deletes the object and releases everything
//!   it owned. The cascade runs on an explicit work list.
//!
//! Storage cells are what variables and upvalues point at. A by-ref capture
//! or a `ref` argument shares the cell; a by-value capture gets a new one.

use std::any::Any;
use std::fmt;

use arbor_ir::{Callee, Capture, ClassId};
use smallvec::SmallVec;

use super::{CellId, ClosureId, ListId, ObjectId, Pool, PoolStats, Value};
use crate::{EvalError, EvalResult};

/// Variable storage.
#[derive(Debug)]
pub struct Cell {
    value: Value,
    refs: i32,
}

/// Array storage. Every element holds one reference.
#[derive(Debug)]
pub struct ValueList {
    items: Vec<Value>,
    refs: i32,
}

impl ValueList {
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn refs(&self) -> i32 {
        self.refs
    }
}

/// One captured variable of a closure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Upval {
    pub cell: CellId,
    pub capture: Capture,
}

/// Function context: what to call plus the captured cells, one reference
/// held per cell.
#[derive(Debug)]
pub struct Closure {
    callee: Callee,
    upvalues: SmallVec<[Upval; 4]>,
    refs: i32,
}

impl Closure {
    pub fn callee(&self) -> Callee {
        self.callee
    }

    pub fn upvalues(&self) -> &[Upval] {
        &self.upvalues
    }

    pub fn refs(&self) -> i32 {
        self.refs
    }
}

/// Storage of one engine-managed field. A field starts inline and moves into
/// a cell the first time a reference to it is taken; the object then owns
/// one reference on that cell.
#[derive(Clone, Debug)]
enum FieldSlot {
    Inline(Value),
    Cell(CellId),
}

/// Instance of a bound class.
///
/// `fields` are the engine-managed fields and hold references. `host` is
/// opaque data owned by the binding.
pub struct Object {
    class: ClassId,
    fields: Vec<FieldSlot>,
    host: Option<Box<dyn Any>>,
    refs: i32,
}

impl Object {
    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn refs(&self) -> i32 {
        self.refs
    }

    pub fn host<T: Any>(&self) -> Option<&T> {
        self.host.as_ref()?.downcast_ref()
    }

    pub fn host_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.host.as_mut()?.downcast_mut()
    }

    pub(crate) fn host_any(&self) -> Option<&dyn Any> {
        self.host.as_deref()
    }

    pub(crate) fn host_any_mut(&mut self) -> Option<&mut dyn Any> {
        self.host.as_deref_mut()
    }

    fn slot(&self, index: usize) -> EvalResult<&FieldSlot> {
        self.fields.get(index).ok_or(EvalError::IndexOutOfBounds {
            index,
            len: self.fields.len(),
        })
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class)
            .field("fields", &self.fields)
            .field("refs", &self.refs)
            .finish_non_exhaustive()
    }
}

/// A reference-counted heap object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HeapRef {
    List(ListId),
    Func(ClosureId),
    Object(ObjectId),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RefOp {
    Retain,
    Release,
    Delete,
}

/// One refcount operation, with the count after it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RefEvent {
    pub handle: HeapRef,
    pub op: RefOp,
    pub refs: i32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub cells: PoolStats,
    pub lists: PoolStats,
    pub closures: PoolStats,
    pub objects: PoolStats,
}

impl HeapStats {
    /// Every pool has all of its allocations back.
    pub fn is_balanced(&self) -> bool {
        self.cells.is_balanced()
            && self.lists.is_balanced()
            && self.closures.is_balanced()
            && self.objects.is_balanced()
    }
}

pub struct Heap {
    cells: Pool<Cell>,
    lists: Pool<ValueList>,
    closures: Pool<Closure>,
    objects: Pool<Object>,
    events: Option<Vec<RefEvent>>,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            cells: Pool::new("cell"),
            lists: Pool::new("array"),
            closures: Pool::new("closure"),
            objects: Pool::new("object"),
            events: None,
        }
    }

    /// Start or stop recording [`RefEvent`]s.
    pub fn record_events(&mut self, enabled: bool) {
        self.events = enabled.then(Vec::new);
    }

    /// Drain the recorded events.
    pub fn take_events(&mut self) -> Vec<RefEvent> {
        self.events.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            cells: self.cells.stats(),
            lists: self.lists.stats(),
            closures: self.closures.stats(),
            objects: self.objects.stats(),
        }
    }

    fn log(&mut self, handle: HeapRef, op: RefOp, refs: i32) {
        tracing::trace!(?handle, ?op, refs, "refcount");
        if let Some(events) = &mut self.events {
            events.push(RefEvent { handle, op, refs });
        }
    }

    fn refs_mut(&mut self, handle: HeapRef) -> EvalResult<&mut i32> {
        Ok(match handle {
            HeapRef::List(id) => &mut self.lists.get_mut(id)?.refs,
            HeapRef::Func(id) => &mut self.closures.get_mut(id)?.refs,
            HeapRef::Object(id) => &mut self.objects.get_mut(id)?.refs,
        })
    }

    /// Current count of a heap value. `None` for primitives and stale handles.
    pub fn refs(&self, value: &Value) -> Option<i32> {
        match value.heap_ref()? {
            HeapRef::List(id) => self.lists.get(id).ok().map(|l| l.refs),
            HeapRef::Func(id) => self.closures.get(id).ok().map(|c| c.refs),
            HeapRef::Object(id) => self.objects.get(id).ok().map(|o| o.refs),
        }
    }

    /// Whether the handle inside `value` (if any) still points at a live object.
    pub fn is_live(&self, value: &Value) -> bool {
        value.heap_ref().is_none() || self.refs(value).is_some()
    }

    /// `refs += 1`. No-op for primitives.
    pub fn retain(&mut self, value: &Value) -> EvalResult<()> {
        let Some(handle) = value.heap_ref() else {
            return Ok(());
        };
        let refs = self.refs_mut(handle)?;
        *refs += 1;
        let refs = *refs;
        self.log(handle, RefOp::Retain, refs);
        Ok(())
    }

    /// `refs -= 1`, deleting at zero.
    pub fn release(&mut self, value: &Value) -> EvalResult<()> {
        self.release_with(value, true)
    }

    /// `refs -= 1`; deletes at zero only if `can_delete`.
    ///
    /// A value released without deletion is left for [`Heap::try_del`].
    pub fn release_with(&mut self, value: &Value, can_delete: bool) -> EvalResult<()> {
        let Some(handle) = value.heap_ref() else {
            return Ok(());
        };
        if self.decrement(handle)? == 0 && can_delete {
            self.delete(handle)?;
        }
        Ok(())
    }

    /// Delete `value` iff nothing holds it. Returns whether it was deleted.
    pub fn try_del(&mut self, value: &Value) -> EvalResult<bool> {
        let Some(handle) = value.heap_ref() else {
            return Ok(false);
        };
        if *self.refs_mut(handle)? != 0 {
            return Ok(false);
        }
        self.delete(handle)?;
        Ok(true)
    }

    fn decrement(&mut self, handle: HeapRef) -> EvalResult<i32> {
        let refs = self.refs_mut(handle)?;
        *refs -= 1;
        let refs = *refs;
        self.log(handle, RefOp::Release, refs);
        if refs < 0 {
            let (pool, index) = match handle {
                HeapRef::List(id) => ("array", id.index()),
                HeapRef::Func(id) => ("closure", id.index()),
                HeapRef::Object(id) => ("object", id.index()),
            };
            return Err(EvalError::NegativeRefs { pool, index });
        }
        Ok(refs)
    }

    fn delete(&mut self, handle: HeapRef) -> EvalResult<()> {
        let mut values = Vec::new();
        let mut cells = Vec::new();
        self.free_one(handle, &mut values, &mut cells)?;
        loop {
            if let Some(cell) = cells.pop() {
                if let Some(value) = self.unref_cell(cell)? {
                    values.push(value);
                }
                continue;
            }
            let Some(value) = values.pop() else {
                break;
            };
            if let Some(handle) = value.heap_ref() {
                if self.decrement(handle)? == 0 {
                    self.free_one(handle, &mut values, &mut cells)?;
                }
            }
        }
        Ok(())
    }

    fn free_one(
        &mut self,
        handle: HeapRef,
        values: &mut Vec<Value>,
        cells: &mut Vec<CellId>,
    ) -> EvalResult<()> {
        match handle {
            HeapRef::List(id) => values.extend(self.lists.free(id)?.items),
            HeapRef::Func(id) => {
                cells.extend(self.closures.free(id)?.upvalues.iter().map(|up| up.cell));
            }
            HeapRef::Object(id) => {
                for slot in self.objects.free(id)?.fields {
                    match slot {
                        FieldSlot::Inline(value) => values.push(value),
                        FieldSlot::Cell(cell) => cells.push(cell),
                    }
                }
            }
        }
        self.log(handle, RefOp::Delete, 0);
        Ok(())
    }

    // Cells

    /// New cell holding nil, not yet retained by anyone.
    pub fn new_cell(&mut self) -> EvalResult<CellId> {
        self.cells.alloc(Cell {
            value: Value::Nil,
            refs: 0,
        })
    }

    pub fn retain_cell(&mut self, cell: CellId) -> EvalResult<()> {
        self.cells.get_mut(cell)?.refs += 1;
        Ok(())
    }

    /// Drop one reference; at zero the cell is freed and its value released.
    pub fn release_cell(&mut self, cell: CellId) -> EvalResult<()> {
        if let Some(value) = self.unref_cell(cell)? {
            self.release(&value)?;
        }
        Ok(())
    }

    fn unref_cell(&mut self, cell: CellId) -> EvalResult<Option<Value>> {
        let entry = self.cells.get_mut(cell)?;
        entry.refs -= 1;
        if entry.refs < 0 {
            return Err(EvalError::NegativeRefs {
                pool: "cell",
                index: cell.index(),
            });
        }
        if entry.refs > 0 {
            return Ok(None);
        }
        Ok(Some(self.cells.free(cell)?.value))
    }

    pub fn cell_refs(&self, cell: CellId) -> EvalResult<i32> {
        Ok(self.cells.get(cell)?.refs)
    }

    /// Current content of a cell.
    pub fn load(&self, cell: CellId) -> EvalResult<Value> {
        Ok(self.cells.get(cell)?.value.clone())
    }

    /// Store into a cell: retain the new value, then release the old one.
    pub fn assign(&mut self, cell: CellId, value: &Value) -> EvalResult<()> {
        self.cells.get(cell)?;
        self.retain(value)?;
        let old = std::mem::replace(&mut self.cells.get_mut(cell)?.value, value.clone());
        self.release(&old)
    }

    // Arrays

    pub fn new_list(&mut self) -> EvalResult<ListId> {
        self.lists.alloc(ValueList {
            items: Vec::new(),
            refs: 0,
        })
    }

    pub fn list(&self, id: ListId) -> EvalResult<&ValueList> {
        self.lists.get(id)
    }

    pub fn list_push(&mut self, id: ListId, value: &Value) -> EvalResult<()> {
        self.lists.get(id)?;
        self.retain(value)?;
        self.lists.get_mut(id)?.items.push(value.clone());
        Ok(())
    }

    pub fn list_get(&self, id: ListId, index: usize) -> EvalResult<Value> {
        let list = self.lists.get(id)?;
        list.items
            .get(index)
            .cloned()
            .ok_or(EvalError::IndexOutOfBounds {
                index,
                len: list.items.len(),
            })
    }

    pub fn list_set(&mut self, id: ListId, index: usize, value: &Value) -> EvalResult<()> {
        let len = self.lists.get(id)?.items.len();
        if index >= len {
            return Err(EvalError::IndexOutOfBounds { index, len });
        }
        self.retain(value)?;
        let old = std::mem::replace(&mut self.lists.get_mut(id)?.items[index], value.clone());
        self.release(&old)
    }

    pub fn list_remove_at(&mut self, id: ListId, index: usize) -> EvalResult<()> {
        let list = self.lists.get_mut(id)?;
        if index >= list.items.len() {
            return Err(EvalError::IndexOutOfBounds {
                index,
                len: list.items.len(),
            });
        }
        let removed = list.items.remove(index);
        self.release(&removed)
    }

    pub fn list_clear(&mut self, id: ListId) -> EvalResult<()> {
        let items = std::mem::take(&mut self.lists.get_mut(id)?.items);
        for item in &items {
            self.release(item)?;
        }
        Ok(())
    }

    pub fn list_len(&self, id: ListId) -> EvalResult<usize> {
        Ok(self.lists.get(id)?.items.len())
    }

    // Closures

    /// New closure owning one reference on each upvalue cell, which the
    /// caller has already taken.
    pub fn new_closure(
        &mut self,
        callee: Callee,
        upvalues: SmallVec<[Upval; 4]>,
    ) -> EvalResult<ClosureId> {
        self.closures.alloc(Closure {
            callee,
            upvalues,
            refs: 0,
        })
    }

    pub fn closure(&self, id: ClosureId) -> EvalResult<&Closure> {
        self.closures.get(id)
    }

    /// Independent copy for running the same closure concurrently.
    ///
    /// By-value upvalues get fresh cells holding the current values; by-ref
    /// upvalues share the original cells.
    pub fn clone_closure(&mut self, id: ClosureId) -> EvalResult<ClosureId> {
        let source = self.closures.get(id)?;
        let callee = source.callee;
        let upvalues = source.upvalues.clone();
        let mut fresh = SmallVec::with_capacity(upvalues.len());
        for up in upvalues {
            let cell = match up.capture {
                Capture::ByRef => up.cell,
                Capture::ByValue => {
                    let value = self.load(up.cell)?;
                    let cell = self.new_cell()?;
                    self.assign(cell, &value)?;
                    cell
                }
            };
            self.retain_cell(cell)?;
            fresh.push(Upval {
                cell,
                capture: up.capture,
            });
        }
        self.new_closure(callee, fresh)
    }

    // Objects

    pub fn new_object(
        &mut self,
        class: ClassId,
        fields: usize,
        host: Option<Box<dyn Any>>,
    ) -> EvalResult<ObjectId> {
        self.objects.alloc(Object {
            class,
            fields: vec![FieldSlot::Inline(Value::Nil); fields],
            host,
            refs: 0,
        })
    }

    pub fn object(&self, id: ObjectId) -> EvalResult<&Object> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> EvalResult<&mut Object> {
        self.objects.get_mut(id)
    }

    pub fn field(&self, id: ObjectId, index: usize) -> EvalResult<Value> {
        match self.objects.get(id)?.slot(index)? {
            FieldSlot::Inline(value) => Ok(value.clone()),
            FieldSlot::Cell(cell) => self.load(*cell),
        }
    }

    /// Store into an engine-managed field: retain new, release old.
    pub fn set_field(&mut self, id: ObjectId, index: usize, value: &Value) -> EvalResult<()> {
        if let &FieldSlot::Cell(cell) = self.objects.get(id)?.slot(index)? {
            return self.assign(cell, value);
        }
        self.retain(value)?;
        let slot = FieldSlot::Inline(value.clone());
        match std::mem::replace(&mut self.objects.get_mut(id)?.fields[index], slot) {
            FieldSlot::Inline(old) => self.release(&old),
            FieldSlot::Cell(_) => Ok(()),
        }
    }

    /// Storage cell of an engine-managed field, moving the field into a cell
    /// on first use. The object keeps its own reference; callers retain for
    /// theirs.
    pub fn field_cell(&mut self, id: ObjectId, index: usize) -> EvalResult<CellId> {
        let value = match self.objects.get(id)?.slot(index)? {
            &FieldSlot::Cell(cell) => return Ok(cell),
            FieldSlot::Inline(value) => value.clone(),
        };
        let cell = self.cells.alloc(Cell { value, refs: 1 })?;
        self.objects.get_mut(id)?.fields[index] = FieldSlot::Cell(cell);
        Ok(cell)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("cells", &self.cells)
            .field("lists", &self.lists)
            .field("closures", &self.closures)
            .field("objects", &self.objects)
            .finish_non_exhaustive()
    }
}
