//! Linear version timeline shared by the node-based collections.
//!
//! A [`Timeline`] keeps one [`Snapshot`] (root link and length) per version,
//! the version currently being read, and a [`Journal`] of every node slot
//! that was filled in place together with the version of the fill.
//!
//! Versions form a line, never a tree. Undoing moves `current` back without
//! forgetting anything; the next write discards every version after
//! `current`. Discarding is more than truncating the snapshot list: nodes
//! that are still reachable may carry a pending modification made in the
//! abandoned future, which a new write at the same version number would
//! otherwise observe. The journal lists exactly those slots, so pruning costs
//! time proportional to the abandoned writes rather than to the collection.

use std::rc::Weak;

use super::{ReferenceCounter, Version};

// =============================================================================
// Journal
// =============================================================================

/// A node whose version-stamped state can be rolled back.
pub(crate) trait Rewind {
    /// Forgets all state recorded at `version` or later. Returns `true` if
    /// anything was forgotten.
    fn discard_from(&self, version: Version) -> bool;
}

/// Log of in-place node modifications, ordered by version.
pub(crate) struct Journal<N> {
    entries: Vec<(Version, Weak<N>)>,
}

impl<N> Journal<N> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, version: Version, node: &ReferenceCounter<N>) {
        debug_assert!(
            self.entries.last().is_none_or(|(last, _)| *last <= version),
            "journal entries must be recorded in version order"
        );
        self.entries.push((version, ReferenceCounter::downgrade(node)));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<N: Rewind> Journal<N> {
    /// Rolls back every modification made at `version` or later and returns
    /// how many slots were actually cleared.
    pub(crate) fn rewind(&mut self, version: Version) -> usize {
        let mut cleared = 0;
        while let Some((at, node)) = self.entries.pop() {
            if at < version {
                self.entries.push((at, node));
                break;
            }
            if node.upgrade().is_some_and(|node| node.discard_from(version)) {
                cleared += 1;
            }
        }
        cleared
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Root and length of one version.
pub(crate) struct Snapshot<N> {
    pub(crate) root: Option<ReferenceCounter<N>>,
    pub(crate) length: usize,
}

impl<N> Snapshot<N> {
    pub(crate) const fn empty() -> Self {
        Self {
            root: None,
            length: 0,
        }
    }

    pub(crate) const fn new(root: Option<ReferenceCounter<N>>, length: usize) -> Self {
        Self { root, length }
    }
}

impl<N> Clone for Snapshot<N> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            length: self.length,
        }
    }
}

// =============================================================================
// Timeline
// =============================================================================

/// Per-instance version history: `0 <= current <= last`.
pub(crate) struct Timeline<N> {
    snapshots: Vec<Snapshot<N>>,
    current: Version,
    journal: Journal<N>,
}

impl<N> Timeline<N> {
    pub(crate) fn new() -> Self {
        Self {
            snapshots: vec![Snapshot::empty()],
            current: 0,
            journal: Journal::new(),
        }
    }

    pub(crate) const fn current_version(&self) -> Version {
        self.current
    }

    pub(crate) fn last_version(&self) -> Version {
        self.snapshots.len() - 1
    }

    pub(crate) fn current(&self) -> &Snapshot<N> {
        &self.snapshots[self.current]
    }

    pub(crate) fn at(&self, version: Version) -> Option<&Snapshot<N>> {
        self.snapshots.get(version)
    }

    /// Steps one version back. No-op at version 0.
    pub(crate) fn undo(&mut self) -> bool {
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        tracing::trace!(version = self.current, "undo");
        true
    }

    /// Steps one version forward. No-op at the last version.
    pub(crate) fn redo(&mut self) -> bool {
        if self.current >= self.last_version() {
            return false;
        }
        self.current += 1;
        tracing::trace!(version = self.current, "redo");
        true
    }
}

impl<N: Rewind> Timeline<N> {
    /// Runs `operation` as the write creating version `current + 1`.
    ///
    /// The operation receives the new version, the snapshot it is based on
    /// and the journal to record in-place modifications into. It returns the
    /// snapshot of the new version along with the caller's result. Any
    /// abandoned future is pruned before the operation runs.
    pub(crate) fn write<R>(
        &mut self,
        operation: impl FnOnce(Version, &Snapshot<N>, &mut Journal<N>) -> (Snapshot<N>, R),
    ) -> R {
        let version = self.current + 1;
        if version <= self.last_version() {
            self.truncate(version);
        }
        let base = self.snapshots[self.current].clone();
        let (next, result) = operation(version, &base, &mut self.journal);
        self.snapshots.push(next);
        self.current = version;
        result
    }

    fn truncate(&mut self, version: Version) {
        let discarded = self.snapshots.len() - version;
        self.snapshots.truncate(version);
        let cleared_slots = self.journal.rewind(version);
        tracing::debug!(
            from_version = version,
            discarded,
            cleared_slots,
            journal_entries = self.journal.len(),
            "discarding abandoned versions"
        );
    }
}
