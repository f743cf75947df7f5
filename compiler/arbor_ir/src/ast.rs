//! Declarations, blocks and expressions of the resolved tree.
//!
//! Expressions are a plain recursive `enum`. The engine lowers each function
//! body into execution nodes once and then reuses the nodes, so the tree is
//! walked only at node construction time.

use crate::{Callee, ClassId, FieldIdx, FuncId, ModuleId, Name, NativeId, Slot, Span};

/// Literal constant.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Literal {
    Nil,
    Num(f64),
    Bool(bool),
    Str(String),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BitAnd,
    BitOr,
}

impl BinaryOp {
    pub fn as_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Short-circuit logical operators.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum LogicalOp {
    And,
    Or,
}

/// Explicit conversions inserted by the type checker.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum CastKind {
    /// Truncate a number toward zero.
    Int,
    /// Number to string.
    Str,
    /// Any value to its truthiness.
    Bool,
    /// Checked up or down cast of an object within a class hierarchy.
    Class(ClassId),
}

/// Array intrinsics. Operands are evaluated left to right, array first.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ArrayOp {
    /// `[]`: no operands.
    New,
    /// `arr.Add(v)`
    Add,
    /// `arr[i]`
    At,
    /// `arr[i] = v`
    SetAt,
    /// `arr.RemoveAt(i)`
    RemoveAt,
    /// `arr.Count`
    Count,
}

impl ArrayOp {
    /// Number of operands the intrinsic pops.
    pub fn arity(self) -> usize {
        match self {
            ArrayOp::New => 0,
            ArrayOp::Count => 1,
            ArrayOp::Add | ArrayOp::At | ArrayOp::RemoveAt => 2,
            ArrayOp::SetAt => 3,
        }
    }

    /// Number of values the intrinsic pushes.
    pub fn results(self) -> usize {
        match self {
            ArrayOp::New | ArrayOp::At | ArrayOp::Count => 1,
            ArrayOp::Add | ArrayOp::SetAt | ArrayOp::RemoveAt => 0,
        }
    }
}

/// How a lambda captures an enclosing variable.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Capture {
    /// Snapshot taken when the closure is created.
    ByValue,
    /// Live storage shared with the source variable.
    ByRef,
}

/// Upvalue descriptor of a lambda.
///
/// `src` is a slot of the immediately enclosing declaration. A variable
/// captured from further out is re-exported by every lambda in between.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Upvalue {
    pub name: Name,
    pub src: Slot,
    pub dst: Slot,
    pub capture: Capture,
}

impl Upvalue {
    pub fn by_value(src: Slot, dst: Slot) -> Self {
        Upvalue {
            name: Name::EMPTY,
            src,
            dst,
            capture: Capture::ByValue,
        }
    }

    pub fn by_ref(src: Slot, dst: Slot) -> Self {
        Upvalue {
            name: Name::EMPTY,
            src,
            dst,
            capture: Capture::ByRef,
        }
    }

    #[must_use]
    pub fn named(mut self, name: Name) -> Self {
        self.name = name;
        self
    }
}

/// Function parameter.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Param {
    pub name: Name,
    pub slot: Slot,
    pub is_ref: bool,
    /// Expression evaluated at the call site when the argument is omitted.
    pub default: Option<Expr>,
}

impl Param {
    pub fn new(slot: Slot) -> Self {
        Param {
            name: Name::EMPTY,
            slot,
            is_ref: false,
            default: None,
        }
    }

    #[must_use]
    pub fn named(mut self, name: Name) -> Self {
        self.name = name;
        self
    }

    #[must_use]
    pub fn by_ref(mut self) -> Self {
        self.is_ref = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum FuncKind {
    Func,
    /// Lambda defined inside `parent`; its upvalues read `parent`'s slots.
    Lambda { parent: FuncId },
}

/// A resolved function or lambda declaration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct FuncDecl {
    pub name: Name,
    pub module: ModuleId,
    pub kind: FuncKind,
    pub params: Vec<Param>,
    pub upvalues: Vec<Upvalue>,
    /// Total number of slots (parameters, upvalues and locals).
    pub locals: u16,
    /// Number of values every `return` yields.
    pub returns: u8,
    pub body: Block,
    pub span: Span,
}

impl FuncDecl {
    pub fn is_lambda(&self) -> bool {
        matches!(self.kind, FuncKind::Lambda { .. })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockKind {
    /// `seq { }` and plain `{ }` bodies.
    Seq,
    /// `seq_ { }`: child failures are ignored.
    SeqSwallow,
    Paral,
    ParalAll,
    Prio,
    Not,
    UntilSuccess,
    UntilFailure,
    /// `until_failure_ { }`: finishes with success when the body fails.
    UntilFailureSwallow,
    Forever,
    Defer,
    /// `eval { }`: yields the body's status as a boolean.
    Eval,
}

impl BlockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Seq => "seq",
            BlockKind::SeqSwallow => "seq_",
            BlockKind::Paral => "paral",
            BlockKind::ParalAll => "paral_all",
            BlockKind::Prio => "prio",
            BlockKind::Not => "not",
            BlockKind::UntilSuccess => "until_success",
            BlockKind::UntilFailure => "until_failure",
            BlockKind::UntilFailureSwallow => "until_failure_",
            BlockKind::Forever => "forever",
            BlockKind::Defer => "defer",
            BlockKind::Eval => "eval",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    pub kind: BlockKind,
    pub stmts: Vec<Expr>,
    pub span: Span,
}

impl Block {
    pub fn new(kind: BlockKind, stmts: Vec<Expr>) -> Self {
        Block {
            kind,
            stmts,
            span: Span::DUMMY,
        }
    }

    pub fn seq(stmts: Vec<Expr>) -> Self {
        Block::new(BlockKind::Seq, stmts)
    }

    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// Call argument.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Arg {
    Value(Expr),
    /// `ref x`: alias the caller's slot.
    Ref(Slot),
    /// `ref obj.field`: alias an engine-managed field of an object.
    FieldRef {
        object: Box<Expr>,
        class: ClassId,
        field: FieldIdx,
    },
    /// Omitted argument; the callee signature supplies the default.
    Default,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum CallTarget {
    Func(FuncId),
    Native(NativeId),
    /// Call through a function value, evaluated after the arguments.
    Value(Box<Expr>),
}

/// JSON-like literal handed to config bindings.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ConfigLiteral {
    Leaf(Expr),
    Object(Vec<(Name, ConfigLiteral)>),
    Array(Vec<ConfigLiteral>),
}

impl ConfigLiteral {
    /// Number of leaf expressions, in evaluation order.
    pub fn leaf_count(&self) -> usize {
        match self {
            ConfigLiteral::Leaf(_) => 1,
            ConfigLiteral::Object(fields) => fields.iter().map(|(_, v)| v.leaf_count()).sum(),
            ConfigLiteral::Array(items) => items.iter().map(ConfigLiteral::leaf_count).sum(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Call {
    pub target: CallTarget,
    pub args: Vec<Arg>,
    pub config: Option<ConfigLiteral>,
    pub span: Span,
}

/// Destination of one value in a multi-value assignment.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Target {
    pub slot: Slot,
    /// `float a, string b = f()` declares; `a, b = f()` assigns.
    pub declare: bool,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct IfArm {
    pub cond: Expr,
    pub body: Block,
}

/// Statements and expressions.
///
/// Each variant documents how many values it leaves for its parent. The type
/// checker guarantees the counts line up.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Expr {
    /// One value.
    Literal(Literal),
    /// One value: the current content of a slot.
    Var(Slot),
    /// Declares a slot with fresh storage. No value.
    DeclVar { slot: Slot, init: Option<Box<Expr>> },
    /// No value.
    Assign { slot: Slot, value: Box<Expr> },
    /// Stores a multi-value result left to right. No value.
    Destructure { targets: Vec<Target>, value: Box<Expr> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Cast { to: CastKind, operand: Box<Expr> },
    /// As many values as the callee returns.
    Call(Box<Call>),
    /// One closure value capturing the current frame.
    Lambda(FuncId),
    /// One function value without upvalues.
    FuncRef(Callee),
    Return(Vec<Expr>),
    Break,
    Continue,
    If {
        arms: Vec<IfArm>,
        otherwise: Option<Block>,
    },
    While { cond: Box<Expr>, body: Block },
    Block(Block),
    /// Evaluates `value` and drops `count` results.
    Discard { value: Box<Expr>, count: u8 },
    /// One array value.
    Array(Vec<Expr>),
    ArrayOp { op: ArrayOp, args: Vec<Expr> },
    /// One object value with the listed fields initialized.
    New {
        class: ClassId,
        fields: Vec<(FieldIdx, Expr)>,
    },
    GetField {
        object: Box<Expr>,
        class: ClassId,
        field: FieldIdx,
    },
    SetField {
        object: Box<Expr>,
        class: ClassId,
        field: FieldIdx,
        value: Box<Expr>,
    },
}

impl Expr {
    pub fn nil() -> Self {
        Expr::Literal(Literal::Nil)
    }

    pub fn num(n: f64) -> Self {
        Expr::Literal(Literal::Num(n))
    }

    pub fn bool(b: bool) -> Self {
        Expr::Literal(Literal::Bool(b))
    }

    pub fn str(s: &str) -> Self {
        Expr::Literal(Literal::Str(s.to_owned()))
    }

    pub fn var(slot: Slot) -> Self {
        Expr::Var(slot)
    }

    pub fn declare(slot: Slot, init: Option<Expr>) -> Self {
        Expr::DeclVar {
            slot,
            init: init.map(Box::new),
        }
    }

    pub fn assign(slot: Slot, value: Expr) -> Self {
        Expr::Assign {
            slot,
            value: Box::new(value),
        }
    }

    pub fn destructure(targets: Vec<Target>, value: Expr) -> Self {
        Expr::Destructure {
            targets,
            value: Box::new(value),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn logical(op: LogicalOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Logical {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn cast(to: CastKind, operand: Expr) -> Self {
        Expr::Cast {
            to,
            operand: Box::new(operand),
        }
    }

    fn call_with(target: CallTarget, args: Vec<Arg>, config: Option<ConfigLiteral>) -> Self {
        Expr::Call(Box::new(Call {
            target,
            args,
            config,
            span: Span::DUMMY,
        }))
    }

    /// Call a script function.
    pub fn call(func: FuncId, args: Vec<Arg>) -> Self {
        Expr::call_with(CallTarget::Func(func), args, None)
    }

    /// Call a native binding.
    pub fn native(native: NativeId, args: Vec<Arg>) -> Self {
        Expr::call_with(CallTarget::Native(native), args, None)
    }

    /// Call a config binding with its literal.
    pub fn native_config(native: NativeId, args: Vec<Arg>, config: ConfigLiteral) -> Self {
        Expr::call_with(CallTarget::Native(native), args, Some(config))
    }

    /// Call through a function value.
    pub fn call_value(callee: Expr, args: Vec<Arg>) -> Self {
        Expr::call_with(CallTarget::Value(Box::new(callee)), args, None)
    }

    pub fn ret(values: Vec<Expr>) -> Self {
        Expr::Return(values)
    }

    pub fn if_else(cond: Expr, then: Block, otherwise: Option<Block>) -> Self {
        Expr::If {
            arms: vec![IfArm { cond, body: then }],
            otherwise,
        }
    }

    pub fn while_loop(cond: Expr, body: Block) -> Self {
        Expr::While {
            cond: Box::new(cond),
            body,
        }
    }

    pub fn block(kind: BlockKind, stmts: Vec<Expr>) -> Self {
        Expr::Block(Block::new(kind, stmts))
    }

    pub fn discard(value: Expr, count: u8) -> Self {
        Expr::Discard {
            value: Box::new(value),
            count,
        }
    }

    pub fn array_op(op: ArrayOp, args: Vec<Expr>) -> Self {
        Expr::ArrayOp { op, args }
    }

    pub fn get_field(object: Expr, class: ClassId, field: FieldIdx) -> Self {
        Expr::GetField {
            object: Box::new(object),
            class,
            field,
        }
    }

    pub fn set_field(object: Expr, class: ClassId, field: FieldIdx, value: Expr) -> Self {
        Expr::SetField {
            object: Box::new(object),
            class,
            field,
            value: Box::new(value),
        }
    }
}

impl Arg {
    pub fn value(expr: Expr) -> Self {
        Arg::Value(expr)
    }

    pub fn field_ref(object: Expr, class: ClassId, field: FieldIdx) -> Self {
        Arg::FieldRef {
            object: Box::new(object),
            class,
            field,
        }
    }
}

impl Target {
    pub fn declare(slot: Slot) -> Self {
        Target {
            slot,
            declare: true,
        }
    }

    pub fn assign(slot: Slot) -> Self {
        Target {
            slot,
            declare: false,
        }
    }
}
