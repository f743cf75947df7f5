//! Execution nodes.
//!
//! A function body is lowered once into a tree of [`Node`]s. Each node is a
//! small state machine that survives across ticks:
//!
//! ```text
//! fresh --init--> running --execute--> success | failure
//!                    ^          |
//!                    +-running--+
//! ```
//!
//! On a terminal result the node runs `deinit` then `defer`, exactly once
//! per activation. A failed `init` is undone by `deinit` alone, so every
//! `deinit` must tolerate partially acquired state. `stop` runs `deinit` and
//! `defer` for a running node, after stopping its running children in
//! reverse order. A terminal node is re-initialized the next time it is
//! ticked.
//!
//! Per-kind state lives in the [`NodeKind`] variants; [`Node::tick`] is the
//! single step function that drives them.

mod block;
mod build;
mod cache;
mod call;
mod chain;
mod control;
mod decorator;
mod leaf;

pub(crate) use build::NodeBuilder;
pub(crate) use cache::NodeCache;
pub(crate) use call::CallNode;

use block::{BlockNode, DeferNode};
use call::FuncBody;
use chain::Chain;
use control::{IfNode, LogicalNode, WhileNode};
use decorator::Decorator;
use leaf::Leaf;

use crate::stack::ensure_sufficient_stack;
use crate::value::ClosureId;
use crate::{EvalResult, Interpreter};

/// Result of one tick, as seen by hosts and native bindings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    Failure,
    Running,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        self != Status::Running
    }
}

/// Result of one tick inside a function body.
///
/// `Return`, `Break` and `Continue` end the node like success does, and
/// propagate up to the function body or loop that handles them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Success,
    Failure,
    Running,
    Return,
    Break,
    Continue,
}

impl From<Status> for Flow {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => Flow::Success,
            Status::Failure => Flow::Failure,
            Status::Running => Flow::Running,
        }
    }
}

impl Flow {
    pub(crate) fn status(self) -> Status {
        match self {
            Flow::Failure => Status::Failure,
            Flow::Running => Status::Running,
            Flow::Success | Flow::Return | Flow::Break | Flow::Continue => Status::Success,
        }
    }
}

/// Lifecycle state of a node.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum NodeStatus {
    #[default]
    Fresh,
    Running,
    Success,
    Failure,
}

/// Per-kind lifecycle hooks.
pub(crate) trait Lifecycle {
    fn init(&mut self, _interp: &mut Interpreter) -> EvalResult<()> {
        Ok(())
    }

    fn execute(&mut self, interp: &mut Interpreter) -> EvalResult<Flow>;

    fn deinit(&mut self, _interp: &mut Interpreter) -> EvalResult<()> {
        Ok(())
    }

    fn defer(&mut self, _interp: &mut Interpreter) -> EvalResult<()> {
        Ok(())
    }

    /// Stop running children, last started first.
    fn stop_children(&mut self, _interp: &mut Interpreter) -> EvalResult<()> {
        Ok(())
    }
}

pub(crate) enum NodeKind {
    Leaf(Leaf),
    Chain(Chain),
    Block(BlockNode),
    Decorator(Decorator),
    Defer(DeferNode),
    If(IfNode),
    While(WhileNode),
    Logical(LogicalNode),
    Call(CallNode),
    Body(FuncBody),
}

impl NodeKind {
    fn lifecycle(&mut self) -> &mut dyn Lifecycle {
        match self {
            NodeKind::Leaf(n) => n,
            NodeKind::Chain(n) => n,
            NodeKind::Block(n) => n,
            NodeKind::Decorator(n) => n,
            NodeKind::Defer(n) => n,
            NodeKind::If(n) => n,
            NodeKind::While(n) => n,
            NodeKind::Logical(n) => n,
            NodeKind::Call(n) => n,
            NodeKind::Body(n) => n,
        }
    }
}

pub(crate) struct Node {
    status: NodeStatus,
    kind: NodeKind,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Node {
            status: NodeStatus::Fresh,
            kind,
        }
    }

    #[inline]
    pub(crate) fn status(&self) -> NodeStatus {
        self.status
    }

    #[inline]
    pub(crate) fn is_running(&self) -> bool {
        self.status == NodeStatus::Running
    }

    pub(crate) fn is_defer(&self) -> bool {
        matches!(self.kind, NodeKind::Defer(_))
    }

    /// Give a function body the closure whose upvalues it binds at init.
    pub(crate) fn bind_closure(&mut self, closure: ClosureId) {
        if let NodeKind::Body(body) = &mut self.kind {
            body.bind_closure(closure);
        }
    }

    /// Advance the node by one tick.
    pub(crate) fn tick(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        ensure_sufficient_stack(|| self.step(interp))
    }

    fn step(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        let kind = self.kind.lifecycle();
        if self.status != NodeStatus::Running {
            self.status = NodeStatus::Fresh;
            if let Err(err) = kind.init(interp) {
                // Undo a partial init; the node stays fresh.
                kind.deinit(interp)?;
                return Err(err);
            }
            // From here on an error leaves the node running, so unwinding
            // through `stop` reaches it.
            self.status = NodeStatus::Running;
        }

        let flow = kind.execute(interp)?;
        if flow == Flow::Running {
            return Ok(flow);
        }

        self.status = if flow == Flow::Failure {
            NodeStatus::Failure
        } else {
            NodeStatus::Success
        };
        kind.deinit(interp)?;
        kind.defer(interp)?;
        Ok(flow)
    }

    /// Cancel a running node: stop children, then `deinit` and `defer`.
    /// No-op unless running.
    pub(crate) fn stop(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        ensure_sufficient_stack(|| {
            if self.status != NodeStatus::Running {
                return Ok(());
            }
            let kind = self.kind.lifecycle();
            kind.stop_children(interp)?;
            kind.deinit(interp)?;
            kind.defer(interp)?;
            self.status = NodeStatus::Fresh;
            Ok(())
        })
    }
}

/// Stop every child, last first.
pub(crate) fn stop_all(children: &mut [Node], interp: &mut Interpreter) -> EvalResult<()> {
    for child in children.iter_mut().rev() {
        child.stop(interp)?;
    }
    Ok(())
}
