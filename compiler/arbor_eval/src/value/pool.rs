//! Generational arena with a free list.
//!
//! Slots are reused LIFO. Every reuse bumps the slot's generation, so a
//! handle kept past its release is detected instead of silently aliasing
//! whatever took its place.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::{EvalError, EvalResult};

/// Typed handle into a [`Pool`].
pub struct Id<T> {
    index: u32,
    generation: u32,
    marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    #[inline]
    fn new(index: u32, generation: u32) -> Self {
        Id {
            index,
            generation,
            marker: PhantomData,
        }
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

struct Entry<T> {
    generation: u32,
    value: Option<T>,
}

/// Allocation counters of one pool.
///
/// `count` never decreases. When every object allocated from the pool has
/// been released, `free == count`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub count: usize,
    pub free: usize,
}

impl PoolStats {
    #[inline]
    pub fn live(self) -> usize {
        self.count - self.free
    }

    #[inline]
    pub fn is_balanced(self) -> bool {
        self.count == self.free
    }
}

pub struct Pool<T> {
    name: &'static str,
    entries: Vec<Entry<T>>,
    free: Vec<u32>,
}

impl<T> Pool<T> {
    pub fn new(name: &'static str) -> Self {
        Pool {
            name,
            entries: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Store `value`, reusing a released slot when one is available.
    pub fn alloc(&mut self, value: T) -> EvalResult<Id<T>> {
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.value = Some(value);
            return Ok(Id::new(index, entry.generation));
        }
        let index =
            u32::try_from(self.entries.len()).map_err(|_| EvalError::PoolExhausted { pool: self.name })?;
        self.entries.push(Entry {
            generation: 0,
            value: Some(value),
        });
        Ok(Id::new(index, 0))
    }

    /// Take the value out and put the slot on the free list.
    pub fn free(&mut self, id: Id<T>) -> EvalResult<T> {
        let name = self.name;
        let entry = self
            .entries
            .get_mut(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
            .ok_or(EvalError::StaleHandle {
                pool: name,
                index: id.index,
            })?;
        let value = entry.value.take().ok_or(EvalError::StaleHandle {
            pool: name,
            index: id.index,
        })?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index);
        Ok(value)
    }

    pub fn get(&self, id: Id<T>) -> EvalResult<&T> {
        self.entries
            .get(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.value.as_ref())
            .ok_or(self.stale(id))
    }

    pub fn get_mut(&mut self, id: Id<T>) -> EvalResult<&mut T> {
        let stale = self.stale(id);
        self.entries
            .get_mut(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.value.as_mut())
            .ok_or(stale)
    }

    /// Total slots ever allocated.
    #[inline]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Slots currently on the free list.
    #[inline]
    pub fn count_free(&self) -> usize {
        self.free.len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            count: self.count(),
            free: self.count_free(),
        }
    }

    fn stale(&self, id: Id<T>) -> EvalError {
        EvalError::StaleHandle {
            pool: self.name,
            index: id.index,
        }
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("count", &self.count())
            .field("free", &self.count_free())
            .finish()
    }
}
