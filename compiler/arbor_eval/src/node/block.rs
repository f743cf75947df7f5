//! Composite blocks: `seq`, `seq_`, `paral`, `paral_all`, `prio`, plus the
//! `defer` node they own.
//!
//! A `defer` child does nothing when reached. Its enclosing block registers
//! it and, when the block itself finishes (or is stopped), ticks the
//! registered bodies in reverse registration order.

use super::{stop_all, Flow, Lifecycle, Node};
use crate::{EvalResult, Interpreter};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BlockMode {
    /// Children in order; the first non-success ends the block.
    Seq,
    /// Children in order; failures are ignored.
    SeqSwallow,
    /// All children each tick; the first to finish decides.
    Paral,
    /// All children each tick until every one succeeds; a failure ends it.
    ParalAll,
    /// Children in order until one does not fail.
    Prio,
}

impl BlockMode {
    /// Whether every defer child is registered up front rather than when
    /// reached.
    fn registers_eagerly(self) -> bool {
        matches!(self, BlockMode::Paral | BlockMode::ParalAll | BlockMode::Prio)
    }
}

pub(crate) struct BlockNode {
    mode: BlockMode,
    children: Vec<Node>,
    cursor: usize,
    /// Per-child completion, for `paral_all`.
    done: Vec<bool>,
    /// Registered defer children, by index.
    deferred: Vec<usize>,
}

impl BlockNode {
    pub(crate) fn new(mode: BlockMode, children: Vec<Node>) -> Self {
        let len = children.len();
        BlockNode {
            mode,
            children,
            cursor: 0,
            done: vec![false; len],
            deferred: Vec::new(),
        }
    }

    fn run_seq(&mut self, interp: &mut Interpreter, swallow: bool) -> EvalResult<Flow> {
        while let Some(child) = self.children.get_mut(self.cursor) {
            if child.is_defer() {
                self.deferred.push(self.cursor);
                self.cursor += 1;
                continue;
            }
            match child.tick(interp)? {
                Flow::Success => {}
                Flow::Failure if swallow => {}
                other => return Ok(other),
            }
            self.cursor += 1;
        }
        Ok(Flow::Success)
    }

    fn run_prio(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        while let Some(child) = self.children.get_mut(self.cursor) {
            if !child.is_defer() {
                match child.tick(interp)? {
                    Flow::Failure => {}
                    other => return Ok(other),
                }
            }
            self.cursor += 1;
        }
        Ok(Flow::Failure)
    }

    fn run_paral(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        for i in 0..self.children.len() {
            if self.children[i].is_defer() {
                continue;
            }
            let flow = self.children[i].tick(interp)?;
            if flow != Flow::Running {
                stop_all(&mut self.children, interp)?;
                return Ok(flow);
            }
        }
        let any_branch = self.children.iter().any(|c| !c.is_defer());
        Ok(if any_branch {
            Flow::Running
        } else {
            Flow::Success
        })
    }

    fn run_paral_all(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        let mut running = false;
        for i in 0..self.children.len() {
            if self.done[i] || self.children[i].is_defer() {
                continue;
            }
            match self.children[i].tick(interp)? {
                Flow::Running => running = true,
                Flow::Success => self.done[i] = true,
                other => {
                    stop_all(&mut self.children, interp)?;
                    return Ok(other);
                }
            }
        }
        Ok(if running { Flow::Running } else { Flow::Success })
    }

    /// Tick registered defers, last registered first. A defer that does not
    /// finish in one tick is stopped.
    fn run_deferred(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        while let Some(index) = self.deferred.pop() {
            let Some(child) = self.children.get_mut(index) else {
                continue;
            };
            if child.tick(interp)? == Flow::Running {
                tracing::warn!(index, "defer body did not finish in one tick, stopping it");
                child.stop(interp)?;
            }
        }
        Ok(())
    }
}

impl Lifecycle for BlockNode {
    fn init(&mut self, _interp: &mut Interpreter) -> EvalResult<()> {
        self.cursor = 0;
        self.done.fill(false);
        self.deferred.clear();
        if self.mode.registers_eagerly() {
            self.deferred.extend(
                self.children
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.is_defer())
                    .map(|(i, _)| i),
            );
        }
        Ok(())
    }

    fn execute(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        match self.mode {
            BlockMode::Seq => self.run_seq(interp, false),
            BlockMode::SeqSwallow => self.run_seq(interp, true),
            BlockMode::Prio => self.run_prio(interp),
            BlockMode::Paral => self.run_paral(interp),
            BlockMode::ParalAll => self.run_paral_all(interp),
        }
    }

    fn defer(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        self.run_deferred(interp)
    }

    fn stop_children(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        stop_all(&mut self.children, interp)
    }
}

/// `defer { }`. Reaching it schedules nothing by itself; the enclosing block
/// ticks `body` when it finishes.
pub(crate) struct DeferNode {
    body: Box<Node>,
}

impl DeferNode {
    pub(crate) fn new(body: Node) -> Self {
        DeferNode {
            body: Box::new(body),
        }
    }
}

impl Lifecycle for DeferNode {
    fn execute(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        self.body.tick(interp)
    }

    fn stop_children(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        self.body.stop(interp)
    }
}
