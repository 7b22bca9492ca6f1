//! Persistent ordered map with undo/redo.
//!
//! This module provides [`PersistentOrderedMap`], an ordered map backed by an
//! unbalanced binary search tree of version-buffered nodes.
//!
//! # Overview
//!
//! Every write creates a new version. Only the nodes on the search path of a
//! write are touched, and most of them absorb the change into their free
//! modification slot instead of being copied (see the `node` module). Old
//! versions stay readable through [`PersistentOrderedMap::get_at`] and
//! [`PersistentOrderedMap::entries_at`], and the current version moves along
//! the timeline with [`Persistent::undo`] and [`Persistent::redo`].
//!
//! - O(depth) get, put and remove
//! - O(1) amortized extra space per write
//! - O(N) entry snapshot
//! - O(1) len and `is_empty`
//!
//! The tree is not rebalanced: inserting keys in sorted order degrades it
//! into a chain and every operation to linear time.
//!
//! # Examples
//!
//! ```rust
//! use retrace::prelude::*;
//!
//! let mut map = PersistentOrderedMap::new();
//! map.put("a", 1);
//! map.put("b", 2);
//! map.undo();
//! map.put("c", 3);
//! map.redo(); // nothing to redo: "b" was discarded by the write
//!
//! let entries: Vec<(&str, i32)> = map.iter().collect();
//! assert_eq!(entries, vec![("a", 1), ("c", 3)]);
//! ```

use std::borrow::Borrow;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use smallvec::SmallVec;

use super::node::{Edit, Link, Modified, Path, Side, VersionedNode, propagate};
use super::timeline::{Journal, Snapshot, Timeline};
use super::{Persistent, ReferenceCounter, Version, VersionedMap};
use crate::error::PersistentError;

type MapNode<K, V> = VersionedNode<(K, V)>;

/// Result of walking the tree towards a key.
struct Search<K, V> {
    /// Ancestors of the found node, or of the empty slot the key belongs in.
    path: Path<(K, V)>,
    found: Link<(K, V)>,
}

// =============================================================================
// PersistentOrderedMap Definition
// =============================================================================

/// An ordered map that keeps every version it has been through.
///
/// Keys must implement `Ord`. Reads and writes address the current version;
/// [`Persistent::undo`] and [`Persistent::redo`] move it along a linear
/// timeline. Writing after an undo discards the versions that could have
/// been redone.
///
/// # Time Complexity
///
/// | Operation      | Complexity |
/// |----------------|------------|
/// | `get`          | O(depth)   |
/// | `put`          | O(depth)   |
/// | `remove`       | O(depth)   |
/// | `entries`      | O(N)       |
/// | `len`          | O(1)       |
/// | `undo`/`redo`  | O(1)       |
///
/// # Examples
///
/// ```rust
/// use retrace::prelude::*;
///
/// let mut map = PersistentOrderedMap::new();
/// map.put(2, "two");
/// map.put(1, "one");
/// assert_eq!(map.get(&1), Some("one"));
///
/// map.undo();
/// assert_eq!(map.get(&1), None);
/// assert_eq!(map.get_at(&1, 2), Some("one"));
/// ```
pub struct PersistentOrderedMap<K, V> {
    timeline: Timeline<MapNode<K, V>>,
    /// Entry snapshot of the current version, present only when memoization
    /// was requested.
    memo: Option<RefCell<Option<Rc<[(K, V)]>>>>,
}

impl<K, V> PersistentOrderedMap<K, V> {
    /// Creates a new empty map at version 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeline: Timeline::new(),
            memo: None,
        }
    }

    /// Creates a new empty map that caches the entry snapshot of the current
    /// version between writes and timeline moves.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrace::prelude::*;
    ///
    /// let mut map = PersistentOrderedMap::with_memoization();
    /// map.put(1, 'x');
    /// assert!(map.is_memoized());
    /// assert_eq!(map.entries().len(), 1);
    /// ```
    #[must_use]
    pub fn with_memoization() -> Self {
        Self {
            timeline: Timeline::new(),
            memo: Some(RefCell::new(None)),
        }
    }

    /// Returns `true` if entry snapshots are memoized.
    #[inline]
    pub const fn is_memoized(&self) -> bool {
        self.memo.is_some()
    }

    /// Returns the number of entries in the current version.
    #[inline]
    pub fn len(&self) -> usize {
        self.timeline.current().length
    }

    /// Returns `true` if the current version holds no entries.
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

    fn invalidate(&self) {
        if let Some(memo) = &self.memo {
            memo.borrow_mut().take();
        }
    }
}

impl<K: Ord + Clone, V: Clone> PersistentOrderedMap<K, V> {
    /// Returns the value for `key` in the current version.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrace::prelude::*;
    ///
    /// let mut map = PersistentOrderedMap::new();
    /// map.put("hello".to_string(), 42);
    ///
    /// // String keys can be looked up by &str
    /// assert_eq!(map.get("hello"), Some(42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_at(key, self.current_version())
    }

    /// Returns the value for `key` as of `version`.
    ///
    /// Versions past [`last_version`](Self::last_version) hold nothing.
    pub fn get_at<Q>(&self, key: &Q, version: Version) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let snapshot = self.timeline.at(version)?;
        Self::search(snapshot.root.clone(), key, version)
            .found
            .map(|node| node.with_value(version, |(_, value)| value.clone()))
    }

    /// Returns `true` if the current version has an entry for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Self::search(self.timeline.current().root.clone(), key, self.current_version())
            .found
            .is_some()
    }

    /// Returns `true` if some entry of the current version holds `value`.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.iter().any(|(_, candidate)| candidate == *value)
    }

    /// Inserts or replaces the value for `key`, creating a new version.
    ///
    /// Returns the value previously stored under `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrace::prelude::*;
    ///
    /// let mut map = PersistentOrderedMap::new();
    /// assert_eq!(map.put(1, "one"), None);
    /// assert_eq!(map.put(1, "ONE"), Some("one"));
    /// assert_eq!(map.current_version(), 2);
    /// ```
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        self.invalidate();
        let base = self.current_version();
        let Search { path, found } = Self::search(self.timeline.current().root.clone(), &key, base);

        self.timeline.write(move |version, snapshot, journal| match found {
            Some(node) => {
                let previous = node.with_value(base, |(_, value)| value.clone());
                let new_root =
                    match VersionedNode::modify(&node, Edit::Value((key, value)), version, journal) {
                        Modified::InPlace => None,
                        Modified::Copied(copy) => propagate(&path, Some(copy), version, journal),
                    };
                let root = new_root.unwrap_or_else(|| snapshot.root.clone());
                (Snapshot::new(root, snapshot.length), Some(previous))
            }
            None => {
                let leaf = ReferenceCounter::new(VersionedNode::leaf((key, value)));
                let root = propagate(&path, Some(leaf), version, journal)
                    .unwrap_or_else(|| snapshot.root.clone());
                (Snapshot::new(root, snapshot.length + 1), None)
            }
        })
    }

    /// Removes the entry for `key`, creating a new version.
    ///
    /// Returns the removed value. An absent key leaves the timeline
    /// untouched and returns `None`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrace::prelude::*;
    ///
    /// let mut map: PersistentOrderedMap<i32, &str> = [(2, "b"), (1, "a"), (3, "c")].into_iter().collect();
    /// assert_eq!(map.remove(&2), Some("b"));
    /// assert_eq!(map.remove(&2), None);
    /// assert_eq!(map.keys().collect::<Vec<_>>(), vec![1, 3]);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let base = self.current_version();
        let Search { path, found } = Self::search(self.timeline.current().root.clone(), key, base);
        let target = found?;
        self.invalidate();

        Some(self.timeline.write(move |version, snapshot, journal| {
            let previous = target.with_value(base, |(_, value)| value.clone());
            let replacement = match (target.left(base), target.right(base)) {
                (None, None) => None,
                (Some(child), None) | (None, Some(child)) => Some(child),
                (Some(left), Some(right)) => Some(Self::replace_with_predecessor(
                    left, right, base, version, journal,
                )),
            };
            let root = propagate(&path, replacement, version, journal)
                .unwrap_or_else(|| snapshot.root.clone());
            (Snapshot::new(root, snapshot.length - 1), previous)
        }))
    }

    /// Builds the node taking the place of a removed node with two children:
    /// it carries the in-order predecessor's entry, the left subtree without
    /// the predecessor, and the untouched right subtree.
    fn replace_with_predecessor(
        left: ReferenceCounter<MapNode<K, V>>,
        right: ReferenceCounter<MapNode<K, V>>,
        base: Version,
        version: Version,
        journal: &mut Journal<MapNode<K, V>>,
    ) -> ReferenceCounter<MapNode<K, V>> {
        let mut path: Path<(K, V)> = SmallVec::new();
        let mut predecessor = left.clone();
        while let Some(next) = predecessor.right(base) {
            path.push((predecessor, Side::Right));
            predecessor = next;
        }

        let entry = predecessor.value(base);
        let remaining_left = if path.is_empty() {
            predecessor.left(base)
        } else {
            propagate(&path, predecessor.left(base), version, journal).unwrap_or(Some(left))
        };
        ReferenceCounter::new(VersionedNode::new(entry, remaining_left, Some(right)))
    }

    /// Removes every entry, creating a new (empty) version.
    pub fn clear(&mut self) {
        self.invalidate();
        self.timeline.write(|_, _, _| (Snapshot::empty(), ()));
    }

    /// Returns all entries of the current version in key order.
    ///
    /// With memoization enabled the snapshot is computed once per version
    /// visit and shared afterwards.
    pub fn entries(&self) -> Rc<[(K, V)]> {
        let Some(memo) = &self.memo else {
            return Self::collect(self.timeline.current(), self.current_version()).into();
        };
        if let Some(entries) = memo.borrow().as_ref() {
            return Rc::clone(entries);
        }
        let entries: Rc<[(K, V)]> =
            Self::collect(self.timeline.current(), self.current_version()).into();
        *memo.borrow_mut() = Some(Rc::clone(&entries));
        entries
    }

    /// Returns all entries as of `version` in key order, or `None` for a
    /// version past [`last_version`](Self::last_version).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrace::prelude::*;
    ///
    /// let mut map = PersistentOrderedMap::new();
    /// map.put(1, 'a');
    /// map.put(1, 'b');
    /// assert_eq!(map.entries_at(0), Some(vec![]));
    /// assert_eq!(map.entries_at(1), Some(vec![(1, 'a')]));
    /// assert_eq!(map.entries_at(2), Some(vec![(1, 'b')]));
    /// assert_eq!(map.entries_at(3), None);
    /// ```
    pub fn entries_at(&self, version: Version) -> Option<Vec<(K, V)>> {
        self.timeline
            .at(version)
            .map(|snapshot| Self::collect(snapshot, version))
    }

    /// Returns an in-order iterator over the entries of the current version.
    pub fn iter(&self) -> PersistentOrderedMapIterator<'_, K, V> {
        PersistentOrderedMapIterator::new(self.timeline.current(), self.current_version())
    }

    /// Returns the keys of the current version in order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Returns the values of the current version in key order.
    pub fn values(&self) -> impl Iterator<Item = V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    fn collect(snapshot: &Snapshot<MapNode<K, V>>, version: Version) -> Vec<(K, V)> {
        let mut entries = Vec::with_capacity(snapshot.length);
        entries.extend(PersistentOrderedMapIterator::new(snapshot, version));
        entries
    }

    fn search<Q>(root: Link<(K, V)>, key: &Q, version: Version) -> Search<K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut path = SmallVec::new();
        let mut cursor = root;
        while let Some(node) = cursor {
            let side = match node.with_value(version, |(candidate, _)| key.cmp(candidate.borrow())) {
                Ordering::Equal => {
                    return Search {
                        path,
                        found: Some(node),
                    };
                }
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
            };
            cursor = node.child(side, version);
            path.push((node, side));
        }
        Search { path, found: None }
    }
}

// =============================================================================
// Iterator
// =============================================================================

/// In-order iterator over one version of a [`PersistentOrderedMap`].
///
/// Entries are cloned out of the nodes.
pub struct PersistentOrderedMapIterator<'a, K, V> {
    stack: Vec<ReferenceCounter<MapNode<K, V>>>,
    version: Version,
    remaining: usize,
    marker: PhantomData<&'a PersistentOrderedMap<K, V>>,
}

impl<K: Clone, V: Clone> PersistentOrderedMapIterator<'_, K, V> {
    fn new(snapshot: &Snapshot<MapNode<K, V>>, version: Version) -> Self {
        let mut iterator = Self {
            stack: Vec::new(),
            version,
            remaining: snapshot.length,
            marker: PhantomData,
        };
        iterator.push_left_spine(snapshot.root.clone());
        iterator
    }

    fn push_left_spine(&mut self, mut cursor: Link<(K, V)>) {
        while let Some(node) = cursor {
            cursor = node.left(self.version);
            self.stack.push(node);
        }
    }
}

impl<K: Clone, V: Clone> Iterator for PersistentOrderedMapIterator<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left_spine(node.right(self.version));
        self.remaining = self.remaining.saturating_sub(1);
        Some(node.value(self.version))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Clone, V: Clone> ExactSizeIterator for PersistentOrderedMapIterator<'_, K, V> {}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<K, V> Persistent for PersistentOrderedMap<K, V> {
    fn undo(&mut self) {
        if self.timeline.undo() {
            self.invalidate();
        }
    }

    fn redo(&mut self) {
        if self.timeline.redo() {
            self.invalidate();
        }
    }
}

impl<K: Ord + Clone, V: Clone> VersionedMap<K, V> for PersistentOrderedMap<K, V> {
    fn put(&mut self, key: K, value: V) -> Result<Option<V>, PersistentError> {
        Ok(Self::put(self, key, value))
    }

    fn get(&self, key: &K) -> Option<V> {
        Self::get(self, key)
    }

    fn remove(&mut self, key: &K) -> Result<Option<V>, PersistentError> {
        Ok(Self::remove(self, key))
    }

    fn len(&self) -> usize {
        Self::len(self)
    }
}

impl<K, V> Default for PersistentOrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V: Clone> FromIterator<(K, V)> for PersistentOrderedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord + Clone, V: Clone> Extend<(K, V)> for PersistentOrderedMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.put(key, value);
        }
    }
}

impl<K: Ord + Clone + fmt::Debug, V: Clone + fmt::Debug> fmt::Debug for PersistentOrderedMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(feature = "serde")]
impl<K, V> serde::Serialize for PersistentOrderedMap<K, V>
where
    K: Ord + Clone + serde::Serialize,
    V: Clone + serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(&key, &value)?;
        }
        map.end()
    }
}
