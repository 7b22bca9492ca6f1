//! Fat-node ordered map, the baseline the primary map is measured against.
//!
//! Each node keeps a full ordered map from version to its state at that
//! version. Reading a field costs a floor lookup, O(log versions), and every
//! write adds one state to each node whose fields change, without any
//! buffering or amortization. Keys never change once a node exists, and
//! nodes are never unlinked: removal is not supported.

use std::borrow::Borrow;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use super::timeline::{Journal, Rewind, Snapshot, Timeline};
use super::{Persistent, ReferenceCounter, Version, VersionedMap};
use crate::error::PersistentError;

type FatLink<K, V> = Option<ReferenceCounter<FatNode<K, V>>>;

/// State of a node from one version on.
struct Slim<K, V> {
    value: V,
    left: FatLink<K, V>,
    right: FatLink<K, V>,
}

impl<K, V: Clone> Clone for Slim<K, V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            left: self.left.clone(),
            right: self.right.clone(),
        }
    }
}

struct FatNode<K, V> {
    key: K,
    states: RefCell<BTreeMap<Version, Slim<K, V>>>,
}

impl<K, V> FatNode<K, V> {
    fn new(key: K, value: V, version: Version) -> Self {
        let state = Slim {
            value,
            left: None,
            right: None,
        };
        Self {
            key,
            states: RefCell::new(BTreeMap::from([(version, state)])),
        }
    }

    /// Runs `function` on the latest state recorded at or before `version`.
    fn with_state<R>(&self, version: Version, function: impl FnOnce(&Slim<K, V>) -> R) -> Option<R> {
        self.states
            .borrow()
            .range(..=version)
            .next_back()
            .map(|(_, state)| function(state))
    }

    fn child(&self, less: bool, version: Version) -> FatLink<K, V> {
        self.with_state(version, |state| {
            if less {
                state.left.clone()
            } else {
                state.right.clone()
            }
        })
        .flatten()
    }
}

impl<K, V: Clone> FatNode<K, V> {
    /// Records a new state at `version`, derived from the state at `base`.
    fn update(
        node: &ReferenceCounter<Self>,
        base: Version,
        version: Version,
        journal: &mut Journal<Self>,
        edit: impl FnOnce(&mut Slim<K, V>),
    ) {
        let Some(mut state) = node.with_state(base, Slim::clone) else {
            return;
        };
        edit(&mut state);
        node.states.borrow_mut().insert(version, state);
        journal.record(version, node);
    }
}

impl<K, V> Rewind for FatNode<K, V> {
    fn discard_from(&self, version: Version) -> bool {
        let discarded = self.states.borrow_mut().split_off(&version);
        !discarded.is_empty()
    }
}

impl<K, V> Drop for FatNode<K, V> {
    fn drop(&mut self) {
        let mut stack: Vec<ReferenceCounter<Self>> = Vec::new();
        release_into(self, &mut stack);
        while let Some(node) = stack.pop() {
            if let Ok(mut node) = ReferenceCounter::try_unwrap(node) {
                release_into(&mut node, &mut stack);
            }
        }
    }
}

fn release_into<K, V>(node: &mut FatNode<K, V>, stack: &mut Vec<ReferenceCounter<FatNode<K, V>>>) {
    for state in node.states.get_mut().values_mut() {
        stack.extend(state.left.take());
        stack.extend(state.right.take());
    }
}

// =============================================================================
// FatNodeMap
// =============================================================================

/// Ordered map storing a version-to-state map in every node.
///
/// Shares the timeline (and its pruning on write-after-undo) with
/// [`PersistentOrderedMap`](super::PersistentOrderedMap) but not its lazy
/// modification slot, which makes it the reference point for benchmarks.
///
/// # Examples
///
/// ```rust
/// use retrace::prelude::*;
///
/// let mut map = FatNodeMap::new();
/// map.put(1, "one");
/// map.put(1, "uno");
/// map.undo();
/// assert_eq!(map.get(&1), Some("one"));
/// assert!(map.remove(&1).is_err());
/// ```
pub struct FatNodeMap<K, V> {
    timeline: Timeline<FatNode<K, V>>,
}

impl<K, V> FatNodeMap<K, V> {
    /// Creates a new empty map at version 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeline: Timeline::new(),
        }
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
}

impl<K: Ord, V: Clone> FatNodeMap<K, V> {
    /// Returns the value for `key` in the current version.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_at(key, self.current_version())
    }

    /// Returns the value for `key` as of `version`.
    pub fn get_at<Q>(&self, key: &Q, version: Version) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let root = self.timeline.at(version)?.root.clone();
        let (_, found) = Self::search(root, key, version);
        found?.with_state(version, |state| state.value.clone())
    }

    /// Returns `true` if the current version has an entry for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Inserts or replaces the value for `key`, creating a new version, and
    /// returns the previous value.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let base = self.current_version();
        let (parent, found) = Self::search(self.timeline.current().root.clone(), &key, base);

        self.timeline.write(move |version, snapshot, journal| {
            if let Some(node) = found {
                let previous = node.with_state(base, |state| state.value.clone());
                FatNode::update(&node, base, version, journal, |state| state.value = value);
                return (snapshot.clone(), previous);
            }

            let Some(parent) = parent else {
                let root = ReferenceCounter::new(FatNode::new(key, value, version));
                return (Snapshot::new(Some(root), snapshot.length + 1), None);
            };
            let less = key < parent.key;
            let leaf = ReferenceCounter::new(FatNode::new(key, value, version));
            FatNode::update(&parent, base, version, journal, |state| {
                if less {
                    state.left = Some(leaf);
                } else {
                    state.right = Some(leaf);
                }
            });
            (Snapshot::new(snapshot.root.clone(), snapshot.length + 1), None)
        })
    }

    /// Always fails: fat nodes are never unlinked.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::Unsupported`].
    pub fn remove<Q>(&mut self, _key: &Q) -> Result<Option<V>, PersistentError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Err(PersistentError::unsupported("remove"))
    }

    /// Removes every entry, creating a new (empty) version.
    pub fn clear(&mut self) {
        self.timeline.write(|_, _, _| (Snapshot::empty(), ()));
    }

    /// Returns all entries of the current version in key order.
    pub fn entries(&self) -> Vec<(K, V)>
    where
        K: Clone,
    {
        self.entries_at(self.current_version()).unwrap_or_default()
    }

    /// Returns all entries as of `version` in key order, or `None` for a
    /// version past [`last_version`](Self::last_version).
    pub fn entries_at(&self, version: Version) -> Option<Vec<(K, V)>>
    where
        K: Clone,
    {
        let snapshot = self.timeline.at(version)?;
        let mut entries = Vec::with_capacity(snapshot.length);
        let mut stack = Vec::new();
        let mut cursor = snapshot.root.clone();
        loop {
            while let Some(node) = cursor {
                cursor = node.child(true, version);
                stack.push(node);
            }
            let Some(node) = stack.pop() else {
                break;
            };
            if let Some(value) = node.with_state(version, |state| state.value.clone()) {
                entries.push((node.key.clone(), value));
            }
            cursor = node.child(false, version);
        }
        Some(entries)
    }

    /// Returns the last node visited and the node holding `key`, if any.
    fn search<Q>(
        root: FatLink<K, V>,
        key: &Q,
        version: Version,
    ) -> (FatLink<K, V>, FatLink<K, V>)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut parent = None;
        let mut cursor = root;
        while let Some(node) = cursor {
            let ordering = key.cmp(node.key.borrow());
            if ordering == Ordering::Equal {
                return (parent, Some(node));
            }
            cursor = node.child(ordering == Ordering::Less, version);
            parent = Some(node);
        }
        (parent, None)
    }
}

impl<K, V> Persistent for FatNodeMap<K, V> {
    fn undo(&mut self) {
        self.timeline.undo();
    }

    fn redo(&mut self) {
        self.timeline.redo();
    }
}

impl<K: Ord, V: Clone> VersionedMap<K, V> for FatNodeMap<K, V> {
    fn put(&mut self, key: K, value: V) -> Result<Option<V>, PersistentError> {
        Ok(Self::put(self, key, value))
    }

    fn get(&self, key: &K) -> Option<V> {
        Self::get(self, key)
    }

    fn remove(&mut self, key: &K) -> Result<Option<V>, PersistentError> {
        Self::remove(self, key)
    }

    fn len(&self) -> usize {
        Self::len(self)
    }
}

impl<K, V> Default for FatNodeMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V: Clone> FromIterator<(K, V)> for FatNodeMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord, V: Clone> Extend<(K, V)> for FatNodeMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.put(key, value);
        }
    }
}

impl<K: Ord + Clone + fmt::Debug, V: Clone + fmt::Debug> fmt::Debug for FatNodeMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.entries()).finish()
    }
}
