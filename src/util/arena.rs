//! Generational arena for scope records.
//!
//! Handles are `(index, generation)` pairs. Removing an entry bumps its
//! generation, so a handle to a removed scope never resolves to the scope
//! that later reuses the same index. A scope's `prev` link is such a handle,
//! never an owning pointer.

use core::fmt;

/// A slot index plus the generation it was issued under.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArenaIndex {
    index: u32,
    generation: u32,
}

impl ArenaIndex {
    /// Builds a handle from raw parts (primarily for testing).
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot position.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation the handle was issued under.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ArenaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaIndex({}:{})", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Entry<T> {
    generation: u32,
    value: Option<T>,
}

/// Slab of values addressed by generational handles.
///
/// Freed slots are reused most-recently-freed first, which matches the LIFO
/// life of a scope stack: a push right after a pop lands in the same slot.
#[derive(Debug)]
pub struct Arena<T> {
    entries: Vec<Entry<T>>,
    free: Vec<u32>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// An empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Number of live values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    /// True if nothing is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores the value built by `make`, which receives the handle it will
    /// live under.
    ///
    /// Returns `None` without calling `make` if the index space or the
    /// allocator is exhausted.
    pub fn try_insert_with<F>(&mut self, make: F) -> Option<ArenaIndex>
    where
        F: FnOnce(ArenaIndex) -> T,
    {
        if let Some(index) = self.free.pop() {
            let entry = self.entries.get_mut(index as usize)?;
            let handle = ArenaIndex::new(index, entry.generation);
            entry.value = Some(make(handle));
            return Some(handle);
        }
        let index = u32::try_from(self.entries.len()).ok()?;
        self.entries.try_reserve(1).ok()?;
        let handle = ArenaIndex::new(index, 0);
        self.entries.push(Entry {
            generation: 0,
            value: Some(make(handle)),
        });
        Some(handle)
    }

    /// Takes the value out and retires the handle.
    pub fn remove(&mut self, handle: ArenaIndex) -> Option<T> {
        let entry = self.entries.get_mut(handle.index as usize)?;
        if entry.generation != handle.generation {
            return None;
        }
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(handle.index);
        Some(value)
    }

    /// The live value under `handle`.
    #[must_use]
    pub fn get(&self, handle: ArenaIndex) -> Option<&T> {
        self.entries
            .get(handle.index as usize)
            .filter(|e| e.generation == handle.generation)
            .and_then(|e| e.value.as_ref())
    }

    /// The live value under `handle`, mutably.
    pub fn get_mut(&mut self, handle: ArenaIndex) -> Option<&mut T> {
        self.entries
            .get_mut(handle.index as usize)
            .filter(|e| e.generation == handle.generation)
            .and_then(|e| e.value.as_mut())
    }

    /// True if `handle` resolves to a live value.
    #[must_use]
    pub fn contains(&self, handle: ArenaIndex) -> bool {
        self.get(handle).is_some()
    }
}
