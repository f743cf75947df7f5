//! Single-child decorators that remap the child's result.

use super::{Flow, Lifecycle, Node};
use crate::value::Value;
use crate::{EvalResult, Interpreter};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum DecoratorKind {
    Not,
    UntilSuccess,
    UntilFailure,
    UntilFailureSwallow,
    Forever,
    /// Push whether the child succeeded; always succeed.
    Eval,
}

impl DecoratorKind {
    fn map(self, flow: Flow) -> Flow {
        match (self, flow) {
            (DecoratorKind::Not, Flow::Success) => Flow::Failure,
            (DecoratorKind::Not, Flow::Failure) => Flow::Success,
            (DecoratorKind::UntilSuccess, Flow::Failure)
            | (DecoratorKind::UntilFailure | DecoratorKind::UntilFailureSwallow, Flow::Success)
            | (DecoratorKind::Forever, Flow::Success | Flow::Failure | Flow::Continue) => {
                Flow::Running
            }
            (DecoratorKind::UntilFailureSwallow, Flow::Failure)
            | (DecoratorKind::Forever, Flow::Break) => Flow::Success,
            (_, other) => other,
        }
    }
}

/// Decorators re-run their child on the next tick rather than looping within
/// one, so `forever { }` yields once per iteration.
pub(crate) struct Decorator {
    kind: DecoratorKind,
    child: Box<Node>,
}

impl Decorator {
    pub(crate) fn new(kind: DecoratorKind, child: Node) -> Self {
        Decorator {
            kind,
            child: Box::new(child),
        }
    }
}

impl Lifecycle for Decorator {
    fn execute(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        let flow = self.child.tick(interp)?;
        if self.kind == DecoratorKind::Eval {
            if flow == Flow::Running {
                return Ok(flow);
            }
            interp.push_value(Value::Bool(flow == Flow::Success))?;
            return Ok(Flow::Success);
        }
        Ok(self.kind.map(flow))
    }

    fn stop_children(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        self.child.stop(interp)
    }
}
