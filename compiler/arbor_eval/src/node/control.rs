//! Conditionals, loops and short-circuit logic.
//!
//! Conditions are ordinary nodes that push one value; a condition may take
//! several ticks when it calls a behavior.

use arbor_ir::LogicalOp;

use super::{Flow, Lifecycle, Node};
use crate::value::Value;
use crate::{EvalResult, Interpreter};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum IfState {
    Testing(usize),
    Taken(usize),
    Otherwise,
}

pub(crate) struct IfNode {
    arms: Vec<(Node, Node)>,
    otherwise: Option<Box<Node>>,
    state: IfState,
}

impl IfNode {
    pub(crate) fn new(arms: Vec<(Node, Node)>, otherwise: Option<Node>) -> Self {
        IfNode {
            arms,
            otherwise: otherwise.map(Box::new),
            state: IfState::Testing(0),
        }
    }
}

impl Lifecycle for IfNode {
    fn init(&mut self, _interp: &mut Interpreter) -> EvalResult<()> {
        self.state = IfState::Testing(0);
        Ok(())
    }

    fn execute(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        loop {
            match self.state {
                IfState::Testing(i) => {
                    let Some((cond, _)) = self.arms.get_mut(i) else {
                        self.state = IfState::Otherwise;
                        continue;
                    };
                    match cond.tick(interp)? {
                        Flow::Success => {
                            self.state = if interp.pop_truthy()? {
                                IfState::Taken(i)
                            } else {
                                IfState::Testing(i + 1)
                            };
                        }
                        other => return Ok(other),
                    }
                }
                IfState::Taken(i) => {
                    return match self.arms.get_mut(i) {
                        Some((_, body)) => body.tick(interp),
                        None => Ok(Flow::Success),
                    };
                }
                IfState::Otherwise => {
                    return match &mut self.otherwise {
                        Some(body) => body.tick(interp),
                        None => Ok(Flow::Success),
                    };
                }
            }
        }
    }

    fn stop_children(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        if let Some(body) = &mut self.otherwise {
            body.stop(interp)?;
        }
        for (cond, body) in self.arms.iter_mut().rev() {
            body.stop(interp)?;
            cond.stop(interp)?;
        }
        Ok(())
    }
}

/// `while (cond) { body }`. Iterations that finish within a tick continue
/// in the same tick; a running body suspends the loop.
pub(crate) struct WhileNode {
    cond: Box<Node>,
    body: Box<Node>,
    in_body: bool,
}

impl WhileNode {
    pub(crate) fn new(cond: Node, body: Node) -> Self {
        WhileNode {
            cond: Box::new(cond),
            body: Box::new(body),
            in_body: false,
        }
    }
}

impl Lifecycle for WhileNode {
    fn init(&mut self, _interp: &mut Interpreter) -> EvalResult<()> {
        self.in_body = false;
        Ok(())
    }

    fn execute(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        loop {
            if !self.in_body {
                match self.cond.tick(interp)? {
                    Flow::Success => {
                        if !interp.pop_truthy()? {
                            return Ok(Flow::Success);
                        }
                        self.in_body = true;
                    }
                    other => return Ok(other),
                }
            }
            match self.body.tick(interp)? {
                Flow::Success | Flow::Continue => self.in_body = false,
                Flow::Break => return Ok(Flow::Success),
                other => return Ok(other),
            }
        }
    }

    fn stop_children(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        self.body.stop(interp)?;
        self.cond.stop(interp)
    }
}

/// `&&` and `||`: the right side runs only when the left does not decide.
pub(crate) struct LogicalNode {
    op: LogicalOp,
    lhs: Box<Node>,
    rhs: Box<Node>,
    in_rhs: bool,
}

impl LogicalNode {
    pub(crate) fn new(op: LogicalOp, lhs: Node, rhs: Node) -> Self {
        LogicalNode {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            in_rhs: false,
        }
    }
}

impl Lifecycle for LogicalNode {
    fn init(&mut self, _interp: &mut Interpreter) -> EvalResult<()> {
        self.in_rhs = false;
        Ok(())
    }

    fn execute(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        if !self.in_rhs {
            match self.lhs.tick(interp)? {
                Flow::Success => {
                    let lhs = interp.pop_truthy()?;
                    let decided = match self.op {
                        LogicalOp::And => !lhs,
                        LogicalOp::Or => lhs,
                    };
                    if decided {
                        interp.push_value(Value::Bool(lhs))?;
                        return Ok(Flow::Success);
                    }
                    self.in_rhs = true;
                }
                other => return Ok(other),
            }
        }
        match self.rhs.tick(interp)? {
            Flow::Success => {
                let rhs = interp.pop_truthy()?;
                interp.push_value(Value::Bool(rhs))?;
                Ok(Flow::Success)
            }
            other => Ok(other),
        }
    }

    fn stop_children(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        self.rhs.stop(interp)?;
        self.lhs.stop(interp)
    }
}
