//! Binary node with a lazy single-slot modification buffer.
//!
//! A [`VersionedNode`] has immutable `value`, `left` and `right` fields fixed
//! at construction plus at most one pending [`Modification`]. Reading a field
//! as of version `V` yields the pending value when the modification targets
//! that field and was made at a version `<= V`, and the original field
//! otherwise.
//!
//! Writing goes through [`VersionedNode::modify`]:
//!
//! - a node with a free slot absorbs the edit in place and reports
//!   [`Modified::InPlace`], so nothing above it has to change;
//! - a node whose slot is taken is materialized into a fresh node holding its
//!   fields as of the edit version with the edit applied, reported as
//!   [`Modified::Copied`]. The caller must re-link the parent.
//!
//! The fresh node starts with a free slot, so the next edit to it is free
//! again. This gives amortized O(1) extra space per logical write.
//!
//! [`propagate`] walks a recorded root-to-target path backwards, re-linking
//! parents until some ancestor absorbs the edit in place.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::timeline::{Journal, Rewind};
use super::{ReferenceCounter, Version};

/// Optional shared link to a child node.
pub(crate) type Link<T> = Option<ReferenceCounter<VersionedNode<T>>>;

/// A search path: every ancestor of the edited node, root first, with the
/// side that was taken out of it.
pub(crate) type Path<T> = SmallVec<[(ReferenceCounter<VersionedNode<T>>, Side); 32]>;

// =============================================================================
// Modification
// =============================================================================

/// Child side of a binary node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

/// The deferred field override stored in a node's slot.
pub(crate) enum Modification<T> {
    None,
    Left(Link<T>, Version),
    Right(Link<T>, Version),
    Value(T, Version),
}

impl<T> Modification<T> {
    const fn version(&self) -> Option<Version> {
        match self {
            Self::None => None,
            Self::Left(_, version) | Self::Right(_, version) | Self::Value(_, version) => {
                Some(*version)
            }
        }
    }
}

/// A field edit waiting to be applied at some version.
pub(crate) enum Edit<T> {
    Left(Link<T>),
    Right(Link<T>),
    Value(T),
}

impl<T> Edit<T> {
    /// Edit replacing the child on `side`.
    pub(crate) const fn child(side: Side, link: Link<T>) -> Self {
        match side {
            Side::Left => Self::Left(link),
            Side::Right => Self::Right(link),
        }
    }

    fn at(self, version: Version) -> Modification<T> {
        match self {
            Self::Left(link) => Modification::Left(link, version),
            Self::Right(link) => Modification::Right(link, version),
            Self::Value(value) => Modification::Value(value, version),
        }
    }
}

/// Outcome of [`VersionedNode::modify`].
pub(crate) enum Modified<T> {
    /// The edit went into the node's free slot; the node is unchanged for
    /// every earlier version and its parent needs no update.
    InPlace,
    /// A fresh node replaces the modified one from the edit version on.
    Copied(ReferenceCounter<VersionedNode<T>>),
}

// =============================================================================
// VersionedNode
// =============================================================================

/// Partially persistent binary node.
pub(crate) struct VersionedNode<T> {
    value: T,
    left: Link<T>,
    right: Link<T>,
    pending: RefCell<Modification<T>>,
}

impl<T> VersionedNode<T> {
    pub(crate) const fn new(value: T, left: Link<T>, right: Link<T>) -> Self {
        Self {
            value,
            left,
            right,
            pending: RefCell::new(Modification::None),
        }
    }

    pub(crate) const fn leaf(value: T) -> Self {
        Self::new(value, None, None)
    }

    /// Left child as of `version`.
    pub(crate) fn left(&self, version: Version) -> Link<T> {
        match &*self.pending.borrow() {
            Modification::Left(link, at) if *at <= version => link.clone(),
            _ => self.left.clone(),
        }
    }

    /// Right child as of `version`.
    pub(crate) fn right(&self, version: Version) -> Link<T> {
        match &*self.pending.borrow() {
            Modification::Right(link, at) if *at <= version => link.clone(),
            _ => self.right.clone(),
        }
    }

    pub(crate) fn child(&self, side: Side, version: Version) -> Link<T> {
        match side {
            Side::Left => self.left(version),
            Side::Right => self.right(version),
        }
    }

    /// Runs `function` on the value as of `version`.
    pub(crate) fn with_value<R>(&self, version: Version, function: impl FnOnce(&T) -> R) -> R {
        match &*self.pending.borrow() {
            Modification::Value(value, at) if *at <= version => function(value),
            _ => function(&self.value),
        }
    }

    /// Version of the pending modification, if the slot is taken.
    #[cfg(test)]
    pub(crate) fn pending_version(&self) -> Option<Version> {
        self.pending.borrow().version()
    }

    fn release_into(&mut self, stack: &mut Vec<ReferenceCounter<Self>>) {
        stack.extend(self.left.take());
        stack.extend(self.right.take());
        if let Modification::Left(link, _) | Modification::Right(link, _) = self.pending.get_mut() {
            stack.extend(link.take());
        }
    }
}

impl<T: Clone> VersionedNode<T> {
    /// Value as of `version`.
    pub(crate) fn value(&self, version: Version) -> T {
        self.with_value(version, T::clone)
    }

    /// Applies `edit` at `version`, journaling in-place slot fills.
    ///
    /// `version` must be greater than every version already stored in the
    /// slot; the timeline guarantees this by pruning abandoned versions
    /// before a write.
    pub(crate) fn modify(
        node: &ReferenceCounter<Self>,
        edit: Edit<T>,
        version: Version,
        journal: &mut Journal<Self>,
    ) -> Modified<T> {
        {
            let mut pending = node.pending.borrow_mut();
            if matches!(*pending, Modification::None) {
                *pending = edit.at(version);
                journal.record(version, node);
                return Modified::InPlace;
            }
        }

        let copy = match edit {
            Edit::Left(link) => Self::new(node.value(version), link, node.right(version)),
            Edit::Right(link) => Self::new(node.value(version), node.left(version), link),
            Edit::Value(value) => Self::new(value, node.left(version), node.right(version)),
        };
        Modified::Copied(ReferenceCounter::new(copy))
    }
}

impl<T> Rewind for VersionedNode<T> {
    fn discard_from(&self, version: Version) -> bool {
        let mut pending = self.pending.borrow_mut();
        if pending.version().is_some_and(|at| at >= version) {
            *pending = Modification::None;
            true
        } else {
            false
        }
    }
}

// Deep chains (an unbalanced tree or a long list) would overflow the stack
// with the default recursive drop.
impl<T> Drop for VersionedNode<T> {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        self.release_into(&mut stack);
        while let Some(node) = stack.pop() {
            if let Ok(mut node) = ReferenceCounter::try_unwrap(node) {
                node.release_into(&mut stack);
            }
        }
    }
}

// =============================================================================
// Upward Propagation
// =============================================================================

/// Re-links `replacement` into the tree described by `path` at `version`.
///
/// `replacement` is the new link for the child of the last path entry (or
/// for the root when `path` is empty). Returns `None` when some ancestor
/// absorbed the change in place, meaning the root is unchanged, and
/// `Some(new_root)` otherwise.
pub(crate) fn propagate<T: Clone>(
    path: &[(ReferenceCounter<VersionedNode<T>>, Side)],
    replacement: Link<T>,
    version: Version,
    journal: &mut Journal<VersionedNode<T>>,
) -> Option<Link<T>> {
    let mut link = replacement;
    for (ancestor, side) in path.iter().rev() {
        match VersionedNode::modify(ancestor, Edit::child(*side, link), version, journal) {
            Modified::InPlace => return None,
            Modified::Copied(copy) => link = Some(copy),
        }
    }
    Some(link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn node(value: i32) -> ReferenceCounter<VersionedNode<i32>> {
        ReferenceCounter::new(VersionedNode::leaf(value))
    }

    #[rstest]
    fn test_free_slot_absorbs_edit_in_place() {
        let mut journal = Journal::new();
        let target = node(1);
        let outcome = VersionedNode::modify(&target, Edit::Value(2), 5, &mut journal);

        assert!(matches!(outcome, Modified::InPlace));
        assert_eq!(target.value(4), 1);
        assert_eq!(target.value(5), 2);
        assert_eq!(target.value(9), 2);
        assert_eq!(target.pending_version(), Some(5));
        assert_eq!(journal.len(), 1);
    }

    #[rstest]
    fn test_pending_value_does_not_leak_into_other_fields() {
        let mut journal = Journal::new();
        let child = node(7);
        let target = ReferenceCounter::new(VersionedNode::new(1, Some(child), None));
        let _ = VersionedNode::modify(&target, Edit::Value(2), 3, &mut journal);

        assert!(target.left(3).is_some());
        assert!(target.right(3).is_none());
    }

    #[rstest]
    fn test_taken_slot_materializes_copy() {
        let mut journal = Journal::new();
        let target = node(1);
        let _ = VersionedNode::modify(&target, Edit::Value(2), 1, &mut journal);
        let right = node(3);
        let outcome =
            VersionedNode::modify(&target, Edit::Right(Some(right.clone())), 2, &mut journal);

        let Modified::Copied(copy) = outcome else {
            panic!("expected a copy");
        };
        assert_eq!(copy.value(2), 2);
        assert!(ReferenceCounter::ptr_eq(&copy.right(2).unwrap(), &right));
        assert_eq!(copy.pending_version(), None);
        // the original keeps serving older versions
        assert_eq!(target.value(0), 1);
        assert!(target.right(2).is_none());
        assert_eq!(journal.len(), 1);
    }

    #[rstest]
    fn test_discard_from_clears_only_newer_slots() {
        let mut journal = Journal::new();
        let target = node(1);
        let _ = VersionedNode::modify(&target, Edit::Value(2), 4, &mut journal);

        assert!(!target.discard_from(5));
        assert_eq!(target.value(4), 2);
        assert!(target.discard_from(4));
        assert_eq!(target.value(4), 1);
        assert_eq!(target.pending_version(), None);
    }

    #[rstest]
    fn test_propagate_stops_at_first_in_place_ancestor() {
        let mut journal = Journal::new();
        let root = node(10);
        let middle = node(5);
        let _ = VersionedNode::modify(&middle, Edit::Value(6), 1, &mut journal);
        let path: Path<i32> = SmallVec::from_vec(vec![
            (root.clone(), Side::Left),
            (middle.clone(), Side::Left),
        ]);

        let new_root = propagate(&path, Some(node(1)), 2, &mut journal);

        // middle was full and got copied, root absorbed the new link
        assert!(new_root.is_none());
        let left = root.left(2).unwrap();
        assert!(!ReferenceCounter::ptr_eq(&left, &middle));
        assert_eq!(left.value(2), 6);
        assert_eq!(left.left(2).unwrap().value(2), 1);
        assert!(root.left(1).is_none());
    }

    #[rstest]
    fn test_propagate_with_empty_path_replaces_root() {
        let mut journal = Journal::new();
        let replacement = node(4);
        let new_root = propagate(&[], Some(replacement.clone()), 1, &mut journal);

        assert!(ReferenceCounter::ptr_eq(
            &new_root.unwrap().unwrap(),
            &replacement
        ));
    }

    #[rstest]
    fn test_dropping_long_chain_does_not_overflow() {
        let mut head: Link<u32> = None;
        for value in 0..200_000 {
            head = Some(ReferenceCounter::new(VersionedNode::new(value, None, head)));
        }
        drop(head);
    }
}
