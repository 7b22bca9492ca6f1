//! Persistent (multi-version) collections with undo/redo.
//!
//! This module provides collections that remember every version they have
//! been through and can move back and forth along that history:
//!
//! - [`PersistentOrderedMap`]: ordered map over a binary search tree of
//!   version-buffered nodes
//! - [`PersistentLinkedList`]: linked list over the same nodes
//! - [`PersistentArray`]: bitmapped trie with path copying, explicit
//!   branching ([`PersistentArray::assoc`], [`PersistentArray::conj`]) and
//!   cascading undo for arrays of arrays
//! - [`FatNodeMap`]: a simpler ordered map storing a full version map per
//!   node, kept as a baseline for comparison
//!
//! # Version Timelines
//!
//! Each instance owns a linear timeline. Every successful write creates a
//! new version; [`Persistent::undo`] and [`Persistent::redo`] move the
//! current version and silently stop at either end. Writing after an undo
//! discards the versions that could have been redone, so the timeline never
//! branches.
//!
//! # Examples
//!
//! ## `PersistentOrderedMap`
//!
//! ```rust
//! use retrace::prelude::*;
//!
//! let mut map = PersistentOrderedMap::new();
//! map.put("a", 1);
//! map.put("b", 2);
//! map.undo();
//! assert_eq!(map.get("b"), None);
//! map.redo();
//! assert_eq!(map.get("b"), Some(2));
//! ```
//!
//! ## `PersistentLinkedList`
//!
//! ```rust
//! use retrace::prelude::*;
//!
//! let mut list: PersistentLinkedList<i32> = (1..=3).collect();
//! list.set(1, 20).unwrap();
//! assert_eq!(list.to_vec(), vec![1, 20, 3]);
//! list.undo();
//! assert_eq!(list.to_vec(), vec![1, 2, 3]);
//! ```
//!
//! ## `PersistentArray`
//!
//! ```rust
//! use retrace::prelude::*;
//!
//! let array = PersistentArray::new();
//! array.push("A").unwrap();
//! let branch = array.conj("B").unwrap();
//! assert_eq!(array.to_string(), "[A]");
//! assert_eq!(branch.to_string(), "[A, B]");
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer shared between versions.
///
/// Nodes carry interior mutability for their modification slot, so the
/// collections are single-threaded and this is always `std::rc::Rc`.
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

/// Identifier of one version of a collection. Version 0 is the empty
/// collection every instance starts from.
pub type Version = usize;

mod array;
mod fat_node_map;
mod list;
mod map;
mod node;
mod timeline;

pub use array::{ArrayElement, ParentLink, PersistentArray, PersistentArrayIterator, TrieShape};
pub use fat_node_map::FatNodeMap;
pub use list::{PersistentLinkedList, PersistentLinkedListIterator};
pub use map::{PersistentOrderedMap, PersistentOrderedMapIterator};

use crate::error::PersistentError;

// =============================================================================
// Traits
// =============================================================================

/// A structure that can step back and forth along its version timeline.
///
/// Neither operation fails: both are no-ops at the respective end of the
/// timeline.
pub trait Persistent {
    /// Returns to the previous version.
    fn undo(&mut self);

    /// Returns to the next version, if an undo made one available.
    fn redo(&mut self);
}

/// The key-value interface shared by the map implementations.
///
/// This is all the benchmark driver relies on, so it never depends on how a
/// map stores its versions.
pub trait VersionedMap<K, V>: Persistent {
    /// Inserts or replaces the value for `key` in a new version and returns
    /// the previous value.
    ///
    /// # Errors
    ///
    /// Implementations may reject the write with a [`PersistentError`].
    fn put(&mut self, key: K, value: V) -> Result<Option<V>, PersistentError>;

    /// Returns the value for `key` in the current version.
    fn get(&self, key: &K) -> Option<V>;

    /// Removes the entry for `key` in a new version and returns its value.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::Unsupported`] for maps without removal.
    fn remove(&mut self, key: &K) -> Result<Option<V>, PersistentError>;

    /// Returns the number of entries in the current version.
    fn len(&self) -> usize;

    /// Returns `true` if the current version holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Shared nodes use `Rc` and `RefCell`: instances must stay on one thread.
static_assertions::assert_not_impl_any!(PersistentOrderedMap<i32, i32>: Send, Sync);
static_assertions::assert_not_impl_any!(PersistentLinkedList<i32>: Send, Sync);
static_assertions::assert_not_impl_any!(PersistentArray<i32>: Send, Sync);
static_assertions::assert_not_impl_any!(FatNodeMap<i32, i32>: Send, Sync);
