//! Operand chains: evaluate operands left to right, then run the operator.
//!
//! Operands may take several ticks (a call argument can itself be a running
//! behavior). Finished operand values are parked in `held` instead of being
//! left on the shared operand stack, so the stack is empty between ticks and
//! parallel branches never see each other's operands. The values go back on
//! the stack right before the operator starts.

use super::{stop_all, Flow, Lifecycle, Node};
use crate::value::Operand;
use crate::{EvalResult, Interpreter};

pub(crate) struct Chain {
    operands: Vec<Node>,
    operator: Box<Node>,
    current: usize,
    held: Vec<Operand>,
}

impl Chain {
    pub(crate) fn new(operands: Vec<Node>, operator: Node) -> Self {
        Chain {
            operands,
            operator: Box::new(operator),
            current: 0,
            held: Vec::new(),
        }
    }
}

impl Lifecycle for Chain {
    fn init(&mut self, _interp: &mut Interpreter) -> EvalResult<()> {
        self.current = 0;
        Ok(())
    }

    fn execute(&mut self, interp: &mut Interpreter) -> EvalResult<Flow> {
        while let Some(operand) = self.operands.get_mut(self.current) {
            let base = interp.stack.len();
            match operand.tick(interp)? {
                Flow::Success => {
                    let values = interp.stack.split_off(base)?;
                    self.held.extend(values);
                    self.current += 1;
                }
                other => return Ok(other),
            }
        }

        if !self.operator.is_running() {
            interp.stack.extend(self.held.drain(..))?;
        }
        self.operator.tick(interp)
    }

    fn deinit(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        for operand in std::mem::take(&mut self.held) {
            interp.release_operand(operand)?;
        }
        Ok(())
    }

    fn stop_children(&mut self, interp: &mut Interpreter) -> EvalResult<()> {
        self.operator.stop(interp)?;
        stop_all(&mut self.operands, interp)
    }
}
