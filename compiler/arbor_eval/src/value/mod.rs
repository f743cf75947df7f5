//! Runtime values.
//!
//! [`Value`] is the payload: primitives inline, heap objects as pool
//! handles. Copying a `Value` never changes a reference count; ownership is
//! tracked explicitly by whoever holds it (a storage cell, a list, an object
//! field, an operand stack entry) through the [`Heap`] methods.

mod heap;
mod pool;

use std::fmt;
use std::rc::Rc;

use arbor_ir::Literal;

pub use heap::{
    Cell, Closure, Heap, HeapRef, HeapStats, Object, RefEvent, RefOp, Upval, ValueList,
};
pub use pool::{Id, Pool, PoolStats};

pub type CellId = Id<Cell>;
pub type ListId = Id<ValueList>;
pub type ClosureId = Id<Closure>;
pub type ObjectId = Id<Object>;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Nil,
    Num(f64),
    Bool(bool),
    Str(Rc<str>),
    List(ListId),
    /// Function context: a callable plus captured upvalues.
    Func(ClosureId),
    /// Instance of a bound class.
    Object(ObjectId),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn from_literal(lit: &Literal) -> Self {
        match lit {
            Literal::Nil => Value::Nil,
            Literal::Num(n) => Value::Num(*n),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Str(s) => Value::str(s),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Num(_) => "number",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::List(_) => "array",
            Value::Func(_) => "function",
            Value::Object(_) => "object",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0,
            Value::Str(_) | Value::List(_) | Value::Func(_) | Value::Object(_) => true,
        }
    }

    /// The pooled object this value refers to, if any.
    pub fn heap_ref(&self) -> Option<HeapRef> {
        match self {
            Value::List(id) => Some(HeapRef::List(*id)),
            Value::Func(id) => Some(HeapRef::Func(*id)),
            Value::Object(id) => Some(HeapRef::Object(*id)),
            Value::Nil | Value::Num(_) | Value::Bool(_) | Value::Str(_) => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<ListId> {
        match self {
            Value::List(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<ClosureId> {
        match self {
            Value::Func(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Number as an array index, truncated toward zero.
    pub fn as_index(&self) -> Option<usize> {
        let n = self.as_num()?;
        if n < 0.0 || !n.is_finite() {
            return None;
        }
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "checked non-negative and finite above"
        )]
        Some(n as usize)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "null"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(id) => write!(f, "<array {id:?}>"),
            Value::Func(id) => write!(f, "<func {id:?}>"),
            Value::Object(id) => write!(f, "<object {id:?}>"),
        }
    }
}

/// An operand stack entry. Each entry owns one reference to what it holds.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Value(Value),
    /// Storage cell passed to a `ref` parameter.
    Ref(CellId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_number_display_drops_integral_fraction() {
        assert_eq!(Value::Num(3.0).to_string(), "3");
        assert_eq!(Value::Num(3.5).to_string(), "3.5");
        assert_eq!(Value::Num(-100.0).to_string(), "-100");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Num(0.0).is_truthy());
        assert!(Value::Num(2.0).is_truthy());
        assert!(Value::str("").is_truthy());
        assert!(!Value::Bool(false).is_truthy());
    }

    #[test]
    fn test_primitives_have_no_heap_ref() {
        assert_eq!(Value::str("x").heap_ref(), None);
        assert_eq!(Value::Num(1.0).heap_ref(), None);
    }

    #[test]
    fn test_literal_conversion() {
        assert_eq!(Value::from_literal(&Literal::Str("foo".into())), Value::str("foo"));
        assert_eq!(Value::from_literal(&Literal::Num(100.0)), Value::Num(100.0));
    }
}
