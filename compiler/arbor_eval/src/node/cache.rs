//! Pool of built function bodies, keyed by declaration.
//!
//! Building a body from the resolved tree is the expensive part of a call,
//! so finished bodies go back into a per-function free list. Two activations
//! of the same function that overlap (recursion, parallel branches) each get
//! their own body.

use arbor_ir::FuncId;
use rustc_hash::FxHashMap;

use super::{Node, NodeBuilder};
use crate::value::PoolStats;
use crate::EvalResult;

#[derive(Default)]
struct Entry {
    free: Vec<Box<Node>>,
    /// Bodies ever built for this function.
    count: usize,
}

#[derive(Default)]
pub(crate) struct NodeCache {
    entries: FxHashMap<FuncId, Entry>,
}

impl NodeCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A body for `func`, reused if one is free.
    pub(crate) fn acquire(&mut self, func: FuncId, builder: &NodeBuilder) -> EvalResult<Box<Node>> {
        let entry = self.entries.entry(func).or_default();
        if let Some(node) = entry.free.pop() {
            return Ok(node);
        }
        let node = builder.body(func)?;
        entry.count += 1;
        tracing::debug!(?func, count = entry.count, "built function body");
        Ok(Box::new(node))
    }

    pub(crate) fn release(&mut self, func: FuncId, node: Box<Node>) {
        self.entries.entry(func).or_default().free.push(node);
    }

    pub(crate) fn stats(&self, func: FuncId) -> PoolStats {
        self.entries
            .get(&func)
            .map_or_else(PoolStats::default, |e| PoolStats {
                count: e.count,
                free: e.free.len(),
            })
    }

    pub(crate) fn total(&self) -> PoolStats {
        self.entries.values().fold(PoolStats::default(), |acc, e| PoolStats {
            count: acc.count + e.count,
            free: acc.free + e.free.len(),
        })
    }

    /// Drop every pooled body.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
