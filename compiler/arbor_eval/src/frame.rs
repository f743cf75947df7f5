//! Activation records of running function bodies.

use arbor_ir::Slot;
use smallvec::SmallVec;

use crate::value::{CellId, Id, Operand};
use crate::{EvalError, EvalResult};

pub type FrameId = Id<Frame>;

/// Slot table of one call. Each bound slot holds one reference on its cell.
#[derive(Debug, Default)]
pub struct Frame {
    slots: Vec<Option<CellId>>,
    /// Values of the `return` that ended the body, bottom first.
    returns: SmallVec<[Operand; 2]>,
}

impl Frame {
    pub(crate) fn new(locals: u16) -> Self {
        Frame {
            slots: vec![None; usize::from(locals)],
            returns: SmallVec::new(),
        }
    }

    pub(crate) fn cell(&self, slot: Slot) -> EvalResult<CellId> {
        self.slots
            .get(slot.index())
            .copied()
            .flatten()
            .ok_or(EvalError::UnboundSlot { slot })
    }

    /// Point `slot` at `cell`, handing back the cell it pointed at before.
    pub(crate) fn bind(&mut self, slot: Slot, cell: CellId) -> EvalResult<Option<CellId>> {
        let entry = self
            .slots
            .get_mut(slot.index())
            .ok_or(EvalError::UnboundSlot { slot })?;
        Ok(entry.replace(cell))
    }

    pub(crate) fn take_cells(&mut self) -> Vec<CellId> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    pub(crate) fn set_returns(&mut self, values: impl IntoIterator<Item = Operand>) {
        self.returns.clear();
        self.returns.extend(values);
    }

    pub(crate) fn take_returns(&mut self) -> SmallVec<[Operand; 2]> {
        std::mem::take(&mut self.returns)
    }
}
