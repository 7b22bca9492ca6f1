//! Persistent array over a bitmapped trie.
//!
//! This module provides [`PersistentArray`], a random-access sequence with
//! its own head-stack undo/redo, explicit branching through
//! [`PersistentArray::assoc`] and [`PersistentArray::conj`], and cascading
//! undo for arrays stored inside arrays.
//!
//! # Overview
//!
//! Every version is an immutable head (root and size) over a trie whose
//! geometry is fixed by a [`TrieShape`]. A write copies the root-to-leaf
//! path it touches and pushes the new head onto the undo stack; everything
//! off that path stays shared with older heads and with branched arrays.
//!
//! - O(depth) get, set, push and pop
//! - O(N - i) insert and remove at index i, since every later element is
//!   appended again
//! - O(1) clear, undo and redo
//!
//! A [`PersistentArray`] value is a handle: cloning it yields another handle
//! to the same instance, which is what lets a parent array and the code that
//! created a child both observe the child's later mutations. Use
//! [`PersistentArray::fork`] for an independent instance.

mod cascade;
mod trie;

pub use cascade::{ArrayElement, ParentLink};
pub use trie::TrieShape;

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use cascade::Cascade;
use trie::{ArrayHead, Elements};

use super::Persistent;
use crate::error::PersistentError;

// =============================================================================
// ArrayCore
// =============================================================================

/// State behind a [`PersistentArray`] handle.
pub(crate) struct ArrayCore<E> {
    shape: TrieShape,
    head: ArrayHead<E>,
    /// Heads preceding `head`, oldest first.
    undo: Vec<ArrayHead<E>>,
    redo: Vec<ArrayHead<E>>,
    parent: Option<ParentLink>,
    inserted_undo: Vec<Weak<dyn Cascade>>,
    inserted_redo: Vec<Weak<dyn Cascade>>,
}

impl<E> ArrayCore<E> {
    const fn new(shape: TrieShape) -> Self {
        Self {
            shape,
            head: ArrayHead::empty(),
            undo: Vec::new(),
            redo: Vec::new(),
            parent: None,
            inserted_undo: Vec::new(),
            inserted_redo: Vec::new(),
        }
    }

    /// Makes `head` the current version, discarding anything redoable.
    fn record(&mut self, head: ArrayHead<E>) {
        self.undo.push(mem::replace(&mut self.head, head));
        self.redo.clear();
        self.inserted_redo.clear();
    }

    fn check_index(&self, index: usize) -> Result<(), PersistentError> {
        let length = self.head.size();
        if index < length {
            Ok(())
        } else {
            tracing::debug!(index, length, "array index out of bounds");
            Err(PersistentError::index_out_of_bounds(index, length))
        }
    }

    fn check_capacity(&self) -> Result<(), PersistentError> {
        let capacity = self.shape.capacity();
        if self.head.size() < capacity {
            Ok(())
        } else {
            tracing::debug!(capacity, "array capacity exceeded");
            Err(PersistentError::capacity_exceeded(capacity))
        }
    }
}

impl<E: Clone> ArrayCore<E> {
    fn element(&self, index: usize) -> Result<E, PersistentError> {
        self.check_index(index)?;
        self.head
            .get(self.shape, index)
            .cloned()
            .ok_or_else(|| PersistentError::index_out_of_bounds(index, self.head.size()))
    }
}

// =============================================================================
// PersistentArray Definition
// =============================================================================

/// A trie-backed array with undo/redo, branching and cascading undo.
///
/// All operations take `&self`: the value is a handle to shared state, and
/// clones are further handles to the same instance (see [`fork`](Self::fork)
/// for an independent copy). Every successful write pushes a new version and
/// clears the redo stack; failed writes change nothing.
///
/// # Time Complexity
///
/// | Operation       | Complexity |
/// |-----------------|------------|
/// | `get`           | O(depth)   |
/// | `set`           | O(depth)   |
/// | `push`          | O(depth)   |
/// | `pop`           | O(depth)   |
/// | `insert`        | O(N - i)   |
/// | `remove`        | O(N - i)   |
/// | `clear`         | O(1)       |
/// | `undo`/`redo`   | O(1)       |
///
/// # Examples
///
/// ```rust
/// use retrace::prelude::*;
///
/// let array = PersistentArray::with_shape(TrieShape::new(1, 1).unwrap());
/// array.push('a').unwrap();
/// array.push('b').unwrap();
/// assert!(array.push('c').unwrap_err().is_capacity_exceeded());
///
/// array.set(0, 'z').unwrap();
/// array.undo();
/// assert_eq!(array.to_vec(), vec!['a', 'b']);
/// ```
pub struct PersistentArray<E> {
    core: Rc<RefCell<ArrayCore<E>>>,
}

impl<E: ArrayElement> PersistentArray<E> {
    /// Creates an empty array with the default shape.
    #[must_use]
    pub fn new() -> Self {
        Self::with_shape(TrieShape::default())
    }

    /// Creates an empty array with the given shape.
    #[must_use]
    pub fn with_shape(shape: TrieShape) -> Self {
        Self {
            core: Rc::new(RefCell::new(ArrayCore::new(shape))),
        }
    }

    /// Creates an empty array whose shape holds at least `capacity` elements.
    ///
    /// # Errors
    ///
    /// See [`TrieShape::for_capacity`].
    pub fn with_capacity(capacity: usize) -> Result<Self, PersistentError> {
        TrieShape::for_capacity(capacity).map(Self::with_shape)
    }

    /// Returns the shape of the trie.
    pub fn shape(&self) -> TrieShape {
        self.core.borrow().shape
    }

    /// Returns the maximum number of elements.
    pub fn capacity(&self) -> usize {
        self.shape().capacity()
    }

    /// Returns the number of elements in the current version.
    pub fn len(&self) -> usize {
        self.core.borrow().head.size()
    }

    /// Returns `true` if the current version holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if no further element fits.
    pub fn is_full(&self) -> bool {
        let core = self.core.borrow();
        core.head.size() >= core.shape.capacity()
    }

    /// Returns the number of versions reachable with undo and redo,
    /// including the current one.
    pub fn version_count(&self) -> usize {
        let core = self.core.borrow();
        core.undo.len() + 1 + core.redo.len()
    }

    /// Returns `true` if both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    /// Returns the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::IndexOutOfBounds`] if `index >= len()`.
    pub fn get(&self, index: usize) -> Result<E, PersistentError> {
        self.core.borrow().element(index)
    }

    /// Replaces the element at `index` and returns the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::IndexOutOfBounds`] if `index >= len()`.
    pub fn set(&self, index: usize, element: E) -> Result<E, PersistentError> {
        let previous = self.core.borrow().element(index)?;
        self.store(element, |core, element| {
            let mut head = core.head.clone();
            head.update(core.shape, index, element);
            head
        });
        Ok(previous)
    }

    /// Appends `element`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::CapacityExceeded`] if the array is full.
    pub fn push(&self, element: E) -> Result<(), PersistentError> {
        self.core.borrow().check_capacity()?;
        self.store(element, |core, element| {
            let mut head = core.head.clone();
            head.push(core.shape, element);
            head
        });
        Ok(())
    }

    /// Inserts `element` before the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::IndexOutOfBounds`] if `index >= len()` and
    /// [`PersistentError::CapacityExceeded`] if the array is full.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrace::prelude::*;
    ///
    /// let array = PersistentArray::new();
    /// for digit in ["3", "7", "6", "9", "1"] {
    ///     array.push(digit).unwrap();
    /// }
    /// array.insert(3, "8").unwrap();
    /// assert_eq!(array.to_string(), "[3, 7, 6, 8, 9, 1]");
    /// assert!(array.insert(6, "8").is_err());
    /// ```
    pub fn insert(&self, index: usize, element: E) -> Result<(), PersistentError> {
        {
            let core = self.core.borrow();
            core.check_index(index)?;
            core.check_capacity()?;
        }
        self.store(element, |core, element| {
            core.head.inserted(core.shape, index, element)
        });
        Ok(())
    }

    /// Removes and returns the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::IndexOutOfBounds`] if `index >= len()`.
    pub fn remove(&self, index: usize) -> Result<E, PersistentError> {
        let removed = self.core.borrow().element(index)?;
        self.commit(|core| core.head.removed(core.shape, index));
        Ok(removed)
    }

    /// Removes and returns the last element.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::EmptyCollection`] if the array is empty.
    pub fn pop(&self) -> Result<E, PersistentError> {
        let Some(last) = self.len().checked_sub(1) else {
            tracing::debug!("pop on empty array");
            return Err(PersistentError::EmptyCollection);
        };
        let removed = self.core.borrow().element(last)?;
        self.commit(|core| {
            let mut head = core.head.clone();
            head.truncate(core.shape, last);
            head
        });
        Ok(removed)
    }

    /// Removes every element, creating a new (empty) version.
    pub fn clear(&self) {
        self.commit(|_| ArrayHead::empty());
    }

    /// Returns a new array equal to this one with `element` at `index`,
    /// leaving this one untouched.
    ///
    /// The new array starts from this array's undo and redo history and
    /// stays attached to this array's parent, which logs the write.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::IndexOutOfBounds`] if `index >= len()`.
    pub fn assoc(&self, index: usize, element: E) -> Result<Self, PersistentError> {
        let branch = self.branch();
        branch.set(index, element)?;
        Ok(branch)
    }

    /// Returns a new array equal to this one with `element` appended,
    /// leaving this one untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::CapacityExceeded`] if the array is full.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrace::prelude::*;
    ///
    /// let first = PersistentArray::new();
    /// first.push("A").unwrap();
    /// let second = first.conj("B").unwrap();
    /// let third = second.assoc(0, "C").unwrap();
    ///
    /// assert_eq!(first.to_string(), "[A]");
    /// assert_eq!(second.to_string(), "[A, B]");
    /// assert_eq!(third.to_string(), "[C, B]");
    /// ```
    pub fn conj(&self, element: E) -> Result<Self, PersistentError> {
        let branch = self.branch();
        branch.push(element)?;
        Ok(branch)
    }

    /// Returns an independent instance sharing this array's trie nodes and
    /// undo/redo history. The fork has no parent and no nested-undo log,
    /// unlike the branches returned by [`assoc`](Self::assoc) and
    /// [`conj`](Self::conj).
    #[must_use]
    pub fn fork(&self) -> Self {
        let core = self.core.borrow();
        let mut forked = ArrayCore::new(core.shape);
        forked.head = core.head.clone();
        forked.undo.clone_from(&core.undo);
        forked.redo.clone_from(&core.redo);
        Self {
            core: Rc::new(RefCell::new(forked)),
        }
    }

    /// Steps back one version, or undoes the most recent mutation of a
    /// nested array first. No-op at the initial version.
    pub fn undo(&self) {
        Cascade::undo(&*self.core);
    }

    /// Re-applies the most recently undone change, nested or own.
    pub fn redo(&self) {
        Cascade::redo(&*self.core);
    }

    /// Returns an iterator over the current version.
    ///
    /// The iterator keeps that version alive; later writes do not affect it.
    pub fn iter(&self) -> PersistentArrayIterator<E> {
        let core = self.core.borrow();
        PersistentArrayIterator {
            elements: Elements::new(core.head.clone(), core.shape, 0),
        }
    }

    /// Collects the current version into a `Vec`.
    pub fn to_vec(&self) -> Vec<E> {
        self.iter().collect()
    }

    /// A fork still attached to this array's parent.
    fn branch(&self) -> Self {
        let branch = self.fork();
        branch.core.borrow_mut().parent.clone_from(&self.core.borrow().parent);
        branch
    }

    fn cascade(&self) -> Weak<dyn Cascade> {
        let core: Weak<RefCell<ArrayCore<E>>> = Rc::downgrade(&self.core);
        core
    }

    /// Adopts `element`, commits the head built from it and reports the
    /// write to the parent array, if any.
    ///
    /// Only writes that store an element are reported; removals stay in this
    /// array's own history.
    fn store(&self, element: E, build: impl FnOnce(&ArrayCore<E>, E) -> ArrayHead<E>) {
        element.adopt(&ParentLink::new(self.cascade()));
        self.commit(|core| build(core, element));
        let parent = self.core.borrow().parent.clone();
        if let Some(parent) = parent {
            parent.notify(self.cascade());
        }
    }

    /// Records the head built by `build` as a new version.
    fn commit(&self, build: impl FnOnce(&ArrayCore<E>) -> ArrayHead<E>) {
        let mut core = self.core.borrow_mut();
        let head = build(&core);
        core.record(head);
    }
}

// =============================================================================
// Iterator
// =============================================================================

/// Iterator over one version of a [`PersistentArray`].
pub struct PersistentArrayIterator<E> {
    elements: Elements<E>,
}

impl<E: Clone> Iterator for PersistentArrayIterator<E> {
    type Item = E;

    fn next(&mut self) -> Option<Self::Item> {
        self.elements.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.elements.size_hint()
    }
}

impl<E: Clone> ExactSizeIterator for PersistentArrayIterator<E> {}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<E> Clone for PersistentArray<E> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<E: ArrayElement> Persistent for PersistentArray<E> {
    fn undo(&mut self) {
        Self::undo(self);
    }

    fn redo(&mut self) {
        Self::redo(self);
    }
}

impl<E: ArrayElement> Default for PersistentArray<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ArrayElement + PartialEq> PartialEq for PersistentArray<E> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<'a, E: ArrayElement> IntoIterator for &'a PersistentArray<E> {
    type Item = E;
    type IntoIter = PersistentArrayIterator<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<E: ArrayElement + fmt::Display> fmt::Display for PersistentArray<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("[")?;
        for (position, element) in self.iter().enumerate() {
            if position > 0 {
                formatter.write_str(", ")?;
            }
            write!(formatter, "{element}")?;
        }
        formatter.write_str("]")
    }
}

impl<E: ArrayElement + fmt::Debug> fmt::Debug for PersistentArray<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(feature = "serde")]
impl<E: ArrayElement + serde::Serialize> serde::Serialize for PersistentArray<E> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for element in self.iter() {
            seq.serialize_element(&element)?;
        }
        seq.end()
    }
}
