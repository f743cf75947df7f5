//! The shared operand stack.
//!
//! Arguments and results travel between nodes here. Every entry owns one
//! reference to what it holds; moving entries around never touches refcounts.
//! The stack must be empty whenever the interpreter is idle.

use crate::value::Operand;
use crate::{EvalError, EvalResult};

pub(crate) struct OperandStack {
    items: Vec<Operand>,
    limit: usize,
}

impl OperandStack {
    pub(crate) fn new(limit: usize) -> Self {
        OperandStack {
            items: Vec::with_capacity(limit.min(64)),
            limit,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub(crate) fn push(&mut self, operand: Operand) -> EvalResult<()> {
        if self.items.len() >= self.limit {
            return Err(EvalError::OperandStackOverflow { limit: self.limit });
        }
        self.items.push(operand);
        Ok(())
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> EvalResult<Operand> {
        self.items.pop().ok_or(EvalError::StackUnderflow)
    }

    /// Remove everything above `base`, bottom first.
    pub(crate) fn split_off(&mut self, base: usize) -> EvalResult<Vec<Operand>> {
        if base > self.items.len() {
            return Err(EvalError::StackUnderflow);
        }
        Ok(self.items.split_off(base))
    }

    /// Pop `count` entries, returned bottom first.
    pub(crate) fn pop_n(&mut self, count: usize) -> EvalResult<Vec<Operand>> {
        let base = self
            .items
            .len()
            .checked_sub(count)
            .ok_or(EvalError::StackUnderflow)?;
        Ok(self.items.split_off(base))
    }

    pub(crate) fn extend(&mut self, operands: impl IntoIterator<Item = Operand>) -> EvalResult<()> {
        for operand in operands {
            self.push(operand)?;
        }
        Ok(())
    }

    pub(crate) fn take_all(&mut self) -> Vec<Operand> {
        std::mem::take(&mut self.items)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Operand {
        Operand::Value(Value::Num(n))
    }

    #[test]
    fn test_pop_empty_underflows() {
        let mut stack = OperandStack::new(4);
        assert_eq!(stack.pop(), Err(EvalError::StackUnderflow));
        assert_eq!(stack.pop_n(1), Err(EvalError::StackUnderflow));
    }

    #[test]
    fn test_limit() {
        let mut stack = OperandStack::new(1);
        stack.push(num(1.0)).unwrap();
        assert_eq!(
            stack.push(num(2.0)),
            Err(EvalError::OperandStackOverflow { limit: 1 })
        );
    }

    #[test]
    fn test_pop_n_keeps_order() {
        let mut stack = OperandStack::new(8);
        stack.extend([num(1.0), num(2.0), num(3.0)]).unwrap();
        assert_eq!(stack.pop_n(2).unwrap(), vec![num(2.0), num(3.0)]);
        assert_eq!(stack.len(), 1);
    }
}
