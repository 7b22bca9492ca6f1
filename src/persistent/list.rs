//! Persistent linked list with undo/redo.
//!
//! This module provides [`PersistentLinkedList`], a positional list built
//! from the same version-buffered nodes as
//! [`PersistentOrderedMap`](super::PersistentOrderedMap). The right link of
//! a node is its successor; the left link is unused.
//!
//! # Overview
//!
//! Positional operations walk from the head of the current version, apply a
//! single field edit to the node they land on and propagate replacements
//! back towards the head along the walked path. Propagation stops at the
//! first predecessor with a free modification slot, so the usual cost of a
//! write is the walk itself plus O(1) extra space.
//!
//! - O(i) get, set, insert and remove at index i
//! - O(N) `push_back`
//! - O(1) len and `is_empty`
//!
//! # Examples
//!
//! ```rust
//! use retrace::prelude::*;
//!
//! let mut list = PersistentLinkedList::new();
//! list.push_back('a');
//! list.push_back('c');
//! list.insert(1, 'b').unwrap();
//! assert_eq!(list.to_vec(), vec!['a', 'b', 'c']);
//!
//! list.undo();
//! assert_eq!(list.to_vec(), vec!['a', 'c']);
//! ```

use std::fmt;
use std::marker::PhantomData;

use smallvec::SmallVec;

use super::node::{Edit, Link, Modified, Path, Side, VersionedNode, propagate};
use super::timeline::{Snapshot, Timeline};
use super::{Persistent, ReferenceCounter, Version};
use crate::error::PersistentError;

// =============================================================================
// PersistentLinkedList Definition
// =============================================================================

/// A linked list that keeps every version it has been through.
///
/// Every successful `push_back`, `insert`, `set`, `remove` or `clear` creates
/// a new version. Failed operations leave the timeline untouched.
///
/// # Time Complexity
///
/// | Operation     | Complexity |
/// |---------------|------------|
/// | `get`         | O(i)       |
/// | `set`         | O(i)       |
/// | `insert`      | O(i)       |
/// | `remove`      | O(i)       |
/// | `push_back`   | O(N)       |
/// | `len`         | O(1)       |
/// | `undo`/`redo` | O(1)       |
pub struct PersistentLinkedList<V> {
    timeline: Timeline<VersionedNode<V>>,
}

impl<V> PersistentLinkedList<V> {
    /// Creates a new empty list at version 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeline: Timeline::new(),
        }
    }

    /// Returns the number of elements in the current version.
    #[inline]
    pub fn len(&self) -> usize {
        self.timeline.current().length
    }

    /// Returns `true` if the current version holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the version being read and written.
    #[inline]
    pub const fn current_version(&self) -> Version {
        self.timeline.current_version()
    }

    /// Returns the highest version that can be reached with redo.
    #[inline]
    pub fn last_version(&self) -> Version {
        self.timeline.last_version()
    }

    fn check_index(&self, index: usize) -> Result<(), PersistentError> {
        let length = self.len();
        if index < length {
            Ok(())
        } else {
            tracing::debug!(index, length, "list index out of bounds");
            Err(PersistentError::index_out_of_bounds(index, length))
        }
    }

    /// Walks `index` steps from `root`, returning the predecessors (each
    /// with `Side::Right`) and the node reached.
    fn walk(
        root: Link<V>,
        index: usize,
        version: Version,
    ) -> Option<(Path<V>, ReferenceCounter<VersionedNode<V>>)> {
        let mut path = SmallVec::new();
        let mut cursor = root?;
        for _ in 0..index {
            let next = cursor.right(version)?;
            path.push((cursor, Side::Right));
            cursor = next;
        }
        Some((path, cursor))
    }

    fn locate(
        &self,
        index: usize,
    ) -> Result<(Path<V>, ReferenceCounter<VersionedNode<V>>), PersistentError> {
        self.check_index(index)?;
        Self::walk(
            self.timeline.current().root.clone(),
            index,
            self.current_version(),
        )
        .ok_or_else(|| PersistentError::index_out_of_bounds(index, self.len()))
    }
}

impl<V: Clone> PersistentLinkedList<V> {
    /// Returns the element at `index` in the current version.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::IndexOutOfBounds`] if `index >= len()`.
    pub fn get(&self, index: usize) -> Result<V, PersistentError> {
        let (_, node) = self.locate(index)?;
        Ok(node.value(self.current_version()))
    }

    /// Returns the element at `index` as of `version`, or `None` if the
    /// version does not exist or is shorter than `index + 1`.
    pub fn get_at(&self, index: usize, version: Version) -> Option<V> {
        let snapshot = self.timeline.at(version)?;
        let (_, node) = Self::walk(snapshot.root.clone(), index, version)?;
        Some(node.value(version))
    }

    /// Appends `value` at the end, creating a new version.
    pub fn push_back(&mut self, value: V) {
        let base = self.current_version();
        let tail = self
            .len()
            .checked_sub(1)
            .and_then(|last| Self::walk(self.timeline.current().root.clone(), last, base));

        self.timeline.write(move |version, snapshot, journal| {
            let leaf = ReferenceCounter::new(VersionedNode::leaf(value));
            let root = match tail {
                None => Some(leaf),
                Some((mut path, last)) => {
                    path.push((last, Side::Right));
                    propagate(&path, Some(leaf), version, journal)
                        .unwrap_or_else(|| snapshot.root.clone())
                }
            };
            (Snapshot::new(root, snapshot.length + 1), ())
        });
    }

    /// Inserts `value` before the element at `index`, creating a new version.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::IndexOutOfBounds`] if `index >= len()`;
    /// appending goes through [`push_back`](Self::push_back).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrace::prelude::*;
    ///
    /// let mut list: PersistentLinkedList<i32> = [1, 3].into_iter().collect();
    /// list.insert(1, 2).unwrap();
    /// assert_eq!(list.to_vec(), vec![1, 2, 3]);
    /// assert!(list.insert(3, 4).is_err());
    /// ```
    pub fn insert(&mut self, index: usize, value: V) -> Result<(), PersistentError> {
        let (path, successor) = self.locate(index)?;

        self.timeline.write(move |version, snapshot, journal| {
            let node = ReferenceCounter::new(VersionedNode::new(value, None, Some(successor)));
            let root = propagate(&path, Some(node), version, journal)
                .unwrap_or_else(|| snapshot.root.clone());
            (Snapshot::new(root, snapshot.length + 1), ())
        });
        Ok(())
    }

    /// Replaces the element at `index`, creating a new version, and returns
    /// the previous element.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::IndexOutOfBounds`] if `index >= len()`.
    pub fn set(&mut self, index: usize, value: V) -> Result<V, PersistentError> {
        let base = self.current_version();
        let (path, node) = self.locate(index)?;

        Ok(self.timeline.write(move |version, snapshot, journal| {
            let previous = node.value(base);
            let new_root = match VersionedNode::modify(&node, Edit::Value(value), version, journal) {
                Modified::InPlace => None,
                Modified::Copied(copy) => propagate(&path, Some(copy), version, journal),
            };
            let root = new_root.unwrap_or_else(|| snapshot.root.clone());
            (Snapshot::new(root, snapshot.length), previous)
        }))
    }

    /// Removes the element at `index`, creating a new version, and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::IndexOutOfBounds`] if `index >= len()`.
    pub fn remove(&mut self, index: usize) -> Result<V, PersistentError> {
        let base = self.current_version();
        let (path, node) = self.locate(index)?;

        Ok(self.timeline.write(move |version, snapshot, journal| {
            let removed = node.value(base);
            let root = propagate(&path, node.right(base), version, journal)
                .unwrap_or_else(|| snapshot.root.clone());
            (Snapshot::new(root, snapshot.length - 1), removed)
        }))
    }

    /// Removes the first element equal to `value`. Returns `false`, without
    /// creating a version, if there is none.
    pub fn remove_item(&mut self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.index_of(value)
            .is_some_and(|index| self.remove(index).is_ok())
    }

    /// Removes every element, creating a new (empty) version.
    pub fn clear(&mut self) {
        self.timeline.write(|_, _, _| (Snapshot::empty(), ()));
    }

    /// Returns `true` if the current version contains `value`.
    pub fn contains(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.index_of(value).is_some()
    }

    /// Returns the index of the first element equal to `value`.
    pub fn index_of(&self, value: &V) -> Option<usize>
    where
        V: PartialEq,
    {
        self.iter().position(|candidate| candidate == *value)
    }

    /// Returns the index of the last element equal to `value`.
    pub fn last_index_of(&self, value: &V) -> Option<usize>
    where
        V: PartialEq,
    {
        self.iter()
            .enumerate()
            .filter(|(_, candidate)| candidate == value)
            .map(|(index, _)| index)
            .last()
    }

    /// Returns an iterator over the elements of the current version.
    pub fn iter(&self) -> PersistentLinkedListIterator<'_, V> {
        PersistentLinkedListIterator::new(self.timeline.current(), self.current_version())
    }

    /// Collects the current version into a `Vec`.
    pub fn to_vec(&self) -> Vec<V> {
        self.iter().collect()
    }

    /// Collects the list as of `version`, or `None` for a version past
    /// [`last_version`](Self::last_version).
    pub fn to_vec_at(&self, version: Version) -> Option<Vec<V>> {
        self.timeline
            .at(version)
            .map(|snapshot| PersistentLinkedListIterator::new(snapshot, version).collect())
    }
}

// =============================================================================
// Iterator
// =============================================================================

/// Iterator over one version of a [`PersistentLinkedList`].
pub struct PersistentLinkedListIterator<'a, V> {
    cursor: Link<V>,
    version: Version,
    remaining: usize,
    marker: PhantomData<&'a PersistentLinkedList<V>>,
}

impl<V> PersistentLinkedListIterator<'_, V> {
    fn new(snapshot: &Snapshot<VersionedNode<V>>, version: Version) -> Self {
        Self {
            cursor: snapshot.root.clone(),
            version,
            remaining: snapshot.length,
            marker: PhantomData,
        }
    }
}

impl<V: Clone> Iterator for PersistentLinkedListIterator<'_, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cursor.take()?;
        self.cursor = node.right(self.version);
        self.remaining = self.remaining.saturating_sub(1);
        Some(node.value(self.version))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V: Clone> ExactSizeIterator for PersistentLinkedListIterator<'_, V> {}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<V> Persistent for PersistentLinkedList<V> {
    fn undo(&mut self) {
        self.timeline.undo();
    }

    fn redo(&mut self) {
        self.timeline.redo();
    }
}

impl<V> Default for PersistentLinkedList<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> FromIterator<V> for PersistentLinkedList<V> {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

impl<V: Clone> Extend<V> for PersistentLinkedList<V> {
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value);
        }
    }
}

impl<V: Clone + fmt::Debug> fmt::Debug for PersistentLinkedList<V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(feature = "serde")]
impl<V: Clone + serde::Serialize> serde::Serialize for PersistentLinkedList<V> {
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
