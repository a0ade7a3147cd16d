//! Append-only, ID-indexed storage for kernel entities.
//!
//! Signals and processes are created during elaboration and never removed,
//! so their IDs are plain indices into an [`Arena`]. Lookups with an ID that
//! did not come from the arena are answered with `None` rather than a panic,
//! letting callers turn them into proper errors.

use std::marker::PhantomData;

/// Trait for opaque ID types used as arena keys.
///
/// Implementors must provide a bijection between `u32` indices and the ID type.
pub trait ArenaId: Copy {
    /// Creates an ID from a raw `u32` index.
    fn from_raw(index: u32) -> Self;

    /// Returns the raw `u32` index.
    fn as_raw(self) -> u32;
}

/// A dense container whose IDs stay valid for the lifetime of the arena.
#[derive(Debug, Clone)]
pub struct Arena<I: ArenaId, T> {
    items: Vec<T>,
    _marker: PhantomData<I>,
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    /// Creates a new, empty arena.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Appends an item and returns its ID.
    pub fn alloc(&mut self, item: T) -> I {
        let id = I::from_raw(self.items.len() as u32);
        self.items.push(item);
        id
    }

    /// Returns the item with the given ID, if it exists.
    pub fn get(&self, id: I) -> Option<&T> {
        self.items.get(id.as_raw() as usize)
    }

    /// Returns the item with the given ID mutably, if it exists.
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.items.get_mut(id.as_raw() as usize)
    }

    /// Returns `true` if `id` was handed out by this arena.
    pub fn contains(&self, id: I) -> bool {
        (id.as_raw() as usize) < self.items.len()
    }

    /// Returns the number of items in the arena.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the arena contains no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over `(ID, &T)` pairs in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (I::from_raw(i as u32), item))
    }

    /// Iterates over `(ID, &mut T)` pairs in allocation order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (I, &mut T)> {
        self.items
            .iter_mut()
            .enumerate()
            .map(|(i, item)| (I::from_raw(i as u32), item))
    }

    /// Returns the ID of the first item matching `pred`.
    pub fn position(&self, mut pred: impl FnMut(&T) -> bool) -> Option<I> {
        self.items
            .iter()
            .position(|item| pred(item))
            .map(|i| I::from_raw(i as u32))
    }
}
