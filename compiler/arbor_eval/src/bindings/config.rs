//! Config records for config bindings.
//!
//! A call like `MoveTo({speed: 2, path: [a, b]})` carries a literal whose
//! leaves are ordinary expressions. The leaves are evaluated as extra call
//! operands; the call site then reassembles them into a [`ConfigValue`]
//! following the literal's [`ConfigShape`].

use arbor_ir::{ConfigLiteral, Expr, Name};

use crate::value::{Heap, Value};
use crate::EvalResult;

/// An evaluated config record. Each leaf value holds one reference, owned by
/// the call site for as long as the native node is active.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigValue {
    Value(Value),
    Object(Vec<(Name, ConfigValue)>),
    Array(Vec<ConfigValue>),
}

impl ConfigValue {
    /// Field of an object record.
    pub fn get(&self, name: Name) -> Option<&ConfigValue> {
        match self {
            ConfigValue::Object(fields) => fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v),
            ConfigValue::Value(_) | ConfigValue::Array(_) => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            ConfigValue::Value(v) => Some(v),
            ConfigValue::Object(_) | ConfigValue::Array(_) => None,
        }
    }

    pub fn num(&self) -> Option<f64> {
        self.value()?.as_num()
    }

    pub fn str(&self) -> Option<&str> {
        self.value()?.as_str()
    }

    /// Elements of an array record; empty for anything else.
    pub fn items(&self) -> &[ConfigValue] {
        match self {
            ConfigValue::Array(items) => items,
            ConfigValue::Value(_) | ConfigValue::Object(_) => &[],
        }
    }

    pub(crate) fn release(self, heap: &mut Heap) -> EvalResult<()> {
        let mut pending = vec![self];
        while let Some(next) = pending.pop() {
            match next {
                ConfigValue::Value(v) => heap.release(&v)?,
                ConfigValue::Object(fields) => pending.extend(fields.into_iter().map(|(_, v)| v)),
                ConfigValue::Array(items) => pending.extend(items),
            }
        }
        Ok(())
    }
}

/// Layout of a config literal with its leaves taken out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ConfigShape {
    Leaf,
    Object(Vec<(Name, ConfigShape)>),
    Array(Vec<ConfigShape>),
}

impl ConfigShape {
    /// Split `literal` into its shape and its leaf expressions in evaluation
    /// order.
    pub(crate) fn of(literal: &ConfigLiteral, leaves: &mut Vec<Expr>) -> Self {
        match literal {
            ConfigLiteral::Leaf(expr) => {
                leaves.push(expr.clone());
                ConfigShape::Leaf
            }
            ConfigLiteral::Object(fields) => ConfigShape::Object(
                fields
                    .iter()
                    .map(|(name, v)| (*name, ConfigShape::of(v, leaves)))
                    .collect(),
            ),
            ConfigLiteral::Array(items) => {
                ConfigShape::Array(items.iter().map(|v| ConfigShape::of(v, leaves)).collect())
            }
        }
    }

    pub(crate) fn leaves(&self) -> usize {
        match self {
            ConfigShape::Leaf => 1,
            ConfigShape::Object(fields) => fields.iter().map(|(_, v)| v.leaves()).sum(),
            ConfigShape::Array(items) => items.iter().map(ConfigShape::leaves).sum(),
        }
    }

    /// Rebuild the record, taking leaf values in order. Missing leaves read
    /// as nil.
    pub(crate) fn assemble(&self, values: &mut impl Iterator<Item = Value>) -> ConfigValue {
        match self {
            ConfigShape::Leaf => ConfigValue::Value(values.next().unwrap_or_default()),
            ConfigShape::Object(fields) => ConfigValue::Object(
                fields
                    .iter()
                    .map(|(name, v)| (*name, v.assemble(values)))
                    .collect(),
            ),
            ConfigShape::Array(items) => {
                ConfigValue::Array(items.iter().map(|v| v.assemble(values)).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_ir::StringInterner;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shape_round_trips_leaf_order() {
        let interner = StringInterner::new();
        let speed = interner.intern("speed");
        let path = interner.intern("path");
        let literal = ConfigLiteral::Object(vec![
            (speed, ConfigLiteral::Leaf(Expr::num(2.0))),
            (
                path,
                ConfigLiteral::Array(vec![
                    ConfigLiteral::Leaf(Expr::str("a")),
                    ConfigLiteral::Leaf(Expr::str("b")),
                ]),
            ),
        ]);

        let mut leaves = Vec::new();
        let shape = ConfigShape::of(&literal, &mut leaves);
        assert_eq!(shape.leaves(), 3);
        assert_eq!(leaves, vec![Expr::num(2.0), Expr::str("a"), Expr::str("b")]);

        let record = shape.assemble(&mut vec![Value::Num(2.0), Value::str("a"), Value::str("b")].into_iter());
        assert_eq!(record.get(speed).and_then(ConfigValue::num), Some(2.0));
        let items: Vec<_> = record
            .get(path)
            .map(ConfigValue::items)
            .unwrap_or_default()
            .iter()
            .filter_map(ConfigValue::str)
            .collect();
        assert_eq!(items, vec!["a", "b"]);
    }
}
