//! Lowering of the resolved tree into execution nodes.
//!
//! Every expression with operands becomes a [`Chain`]: the operands in
//! evaluation order, then the operator leaf. Blocks map one to one onto the
//! composite and decorator nodes.

use std::rc::Rc;

use arbor_ir::{Arg, Block, BlockKind, Call, CallTarget, Expr, FuncId, Program};

use super::block::{BlockMode, BlockNode, DeferNode};
use super::call::{CallNode, FuncBody, NativeCall};
use super::chain::Chain;
use super::control::{IfNode, LogicalNode, WhileNode};
use super::decorator::{Decorator, DecoratorKind};
use super::leaf::Leaf;
use super::{Node, NodeKind};
use crate::bindings::{Bindings, ConfigShape};
use crate::value::Value;
use crate::{EvalError, EvalResult};

pub(crate) struct NodeBuilder {
    program: Rc<Program>,
    bindings: Rc<Bindings>,
}

fn leaf(leaf: Leaf) -> Node {
    Node::new(NodeKind::Leaf(leaf))
}

fn chain(operands: Vec<Node>, operator: Node) -> Node {
    if operands.is_empty() {
        return operator;
    }
    Node::new(NodeKind::Chain(Chain::new(operands, operator)))
}

impl NodeBuilder {
    pub(crate) fn new(program: Rc<Program>, bindings: Rc<Bindings>) -> Self {
        NodeBuilder { program, bindings }
    }

    /// A fresh body for `func`.
    pub(crate) fn body(&self, func: FuncId) -> EvalResult<Node> {
        let decl = self.program.func(func).ok_or(EvalError::UnknownFunc(func))?;
        let root = self.block(&decl.body)?;
        Ok(Node::new(NodeKind::Body(FuncBody::new(func, root))))
    }

    fn exprs(&self, exprs: &[Expr]) -> EvalResult<Vec<Node>> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    pub(crate) fn block(&self, block: &Block) -> EvalResult<Node> {
        let children = self.exprs(&block.stmts)?;
        let mode = match block.kind {
            BlockKind::Seq => BlockMode::Seq,
            BlockKind::SeqSwallow => BlockMode::SeqSwallow,
            BlockKind::Paral => BlockMode::Paral,
            BlockKind::ParalAll => BlockMode::ParalAll,
            BlockKind::Prio => BlockMode::Prio,
            BlockKind::Defer => {
                let body = Node::new(NodeKind::Block(BlockNode::new(BlockMode::Seq, children)));
                return Ok(Node::new(NodeKind::Defer(DeferNode::new(body))));
            }
            kind => {
                let decorator = match kind {
                    BlockKind::Not => DecoratorKind::Not,
                    BlockKind::UntilSuccess => DecoratorKind::UntilSuccess,
                    BlockKind::UntilFailure => DecoratorKind::UntilFailure,
                    BlockKind::UntilFailureSwallow => DecoratorKind::UntilFailureSwallow,
                    BlockKind::Forever => DecoratorKind::Forever,
                    _ => DecoratorKind::Eval,
                };
                let body = Node::new(NodeKind::Block(BlockNode::new(BlockMode::Seq, children)));
                return Ok(Node::new(NodeKind::Decorator(Decorator::new(decorator, body))));
            }
        };
        Ok(Node::new(NodeKind::Block(BlockNode::new(mode, children))))
    }

    pub(crate) fn expr(&self, expr: &Expr) -> EvalResult<Node> {
        Ok(match expr {
            Expr::Literal(lit) => leaf(Leaf::Push(Value::from_literal(lit))),
            Expr::Var(slot) => leaf(Leaf::Load(*slot)),
            Expr::DeclVar { slot, init } => match init {
                Some(init) => chain(
                    vec![self.expr(init)?],
                    leaf(Leaf::Declare {
                        slot: *slot,
                        init: true,
                    }),
                ),
                None => leaf(Leaf::Declare {
                    slot: *slot,
                    init: false,
                }),
            },
            Expr::Assign { slot, value } => chain(vec![self.expr(value)?], leaf(Leaf::Store(*slot))),
            Expr::Destructure { targets, value } => chain(
                vec![self.expr(value)?],
                leaf(Leaf::StoreMany(targets.clone())),
            ),
            Expr::Binary { op, lhs, rhs } => chain(
                vec![self.expr(lhs)?, self.expr(rhs)?],
                leaf(Leaf::Binary(*op)),
            ),
            Expr::Logical { op, lhs, rhs } => Node::new(NodeKind::Logical(LogicalNode::new(
                *op,
                self.expr(lhs)?,
                self.expr(rhs)?,
            ))),
            Expr::Unary { op, operand } => chain(vec![self.expr(operand)?], leaf(Leaf::Unary(*op))),
            Expr::Cast { to, operand } => chain(vec![self.expr(operand)?], leaf(Leaf::Cast(*to))),
            Expr::Call(call) => self.call(call)?,
            Expr::Lambda(func) => leaf(Leaf::Closure(*func)),
            Expr::FuncRef(callee) => leaf(Leaf::FuncRef(*callee)),
            Expr::Return(values) => chain(self.exprs(values)?, leaf(Leaf::Return)),
            Expr::Break => leaf(Leaf::Break),
            Expr::Continue => leaf(Leaf::Continue),
            Expr::If { arms, otherwise } => {
                let arms = arms
                    .iter()
                    .map(|arm| Ok((self.expr(&arm.cond)?, self.block(&arm.body)?)))
                    .collect::<EvalResult<Vec<_>>>()?;
                let otherwise = otherwise.as_ref().map(|b| self.block(b)).transpose()?;
                Node::new(NodeKind::If(IfNode::new(arms, otherwise)))
            }
            Expr::While { cond, body } => Node::new(NodeKind::While(WhileNode::new(
                self.expr(cond)?,
                self.block(body)?,
            ))),
            Expr::Block(block) => self.block(block)?,
            Expr::Discard { value, count } => {
                chain(vec![self.expr(value)?], leaf(Leaf::Discard(*count)))
            }
            Expr::Array(items) => chain(self.exprs(items)?, leaf(Leaf::MakeArray(items.len()))),
            Expr::ArrayOp { op, args } => chain(self.exprs(args)?, leaf(Leaf::Array(*op))),
            Expr::New { class, fields } => {
                let operands = fields
                    .iter()
                    .map(|(_, e)| self.expr(e))
                    .collect::<EvalResult<Vec<_>>>()?;
                let fields = fields.iter().map(|(f, _)| *f).collect();
                chain(
                    operands,
                    leaf(Leaf::New {
                        class: *class,
                        fields,
                    }),
                )
            }
            Expr::GetField {
                object,
                class,
                field,
            } => chain(
                vec![self.expr(object)?],
                leaf(Leaf::GetField {
                    class: *class,
                    field: *field,
                }),
            ),
            Expr::SetField {
                object,
                class,
                field,
                value,
            } => chain(
                vec![self.expr(object)?, self.expr(value)?],
                leaf(Leaf::SetField {
                    class: *class,
                    field: *field,
                }),
            ),
        })
    }

    /// Default argument expression of the callee's `index`th parameter.
    fn default_arg(&self, target: &CallTarget, index: usize) -> EvalResult<Node> {
        let (callee, default) = match target {
            CallTarget::Func(func) => (
                self.program.func_name(*func),
                self.program
                    .func(*func)
                    .and_then(|d| d.params.get(index))
                    .and_then(|p| p.default.as_ref()),
            ),
            CallTarget::Native(native) => (
                self.bindings.func_name(*native),
                self.bindings
                    .func(*native)
                    .and_then(|f| f.args.get(index))
                    .and_then(|a| a.default.as_ref()),
            ),
            CallTarget::Value(_) => ("<function value>", None),
        };
        match default {
            Some(expr) => self.expr(expr),
            None => Err(EvalError::MissingDefault {
                callee: callee.to_owned(),
                index,
            }),
        }
    }

    fn call(&self, call: &Call) -> EvalResult<Node> {
        let mut operands = Vec::with_capacity(call.args.len() + 1);
        for (index, arg) in call.args.iter().enumerate() {
            operands.push(match arg {
                Arg::Value(expr) => self.expr(expr)?,
                Arg::Ref(slot) => leaf(Leaf::LoadRef(*slot)),
                Arg::FieldRef {
                    object,
                    class,
                    field,
                } => chain(
                    vec![self.expr(object)?],
                    leaf(Leaf::LoadFieldRef {
                        class: *class,
                        field: *field,
                    }),
                ),
                Arg::Default => self.default_arg(&call.target, index)?,
            });
        }

        let operator = match &call.target {
            CallTarget::Func(func) => CallNode::user(*func),
            CallTarget::Native(native) => {
                let binding = self
                    .bindings
                    .func(*native)
                    .ok_or(EvalError::UnknownNative(*native))?;
                let shape = match &call.config {
                    Some(literal) => {
                        let mut leaves = Vec::new();
                        let shape = ConfigShape::of(literal, &mut leaves);
                        operands.extend(self.exprs(&leaves)?);
                        Some(shape)
                    }
                    None => None,
                };
                CallNode::native(NativeCall::new(*native, binding.instantiate(), shape))
            }
            CallTarget::Value(callee) => {
                operands.push(self.expr(callee)?);
                CallNode::dynamic()
            }
        };
        Ok(chain(operands, Node::new(NodeKind::Call(operator))))
    }
}
