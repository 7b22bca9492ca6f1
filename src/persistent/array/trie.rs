//! Bitmapped trie with whole-path copying.
//!
//! An index is sliced into `depth` groups of `bits_per_level` bits, most
//! significant first; each group selects a child on the way down and the last
//! one selects the element inside a leaf. Nodes are shared between heads
//! by reference count and are never mutated once shared: `make_mut` copies
//! exactly the nodes on the written path.

use std::fmt;

use crate::error::PersistentError;
use crate::persistent::ReferenceCounter;

// =============================================================================
// TrieShape
// =============================================================================

/// Fixed geometry of a [`PersistentArray`](super::PersistentArray) trie.
///
/// A shape with depth `D` and `B` bits per level has `2^B` children per node
/// and holds at most `2^(B * D)` elements.
///
/// # Examples
///
/// ```rust
/// use retrace::persistent::TrieShape;
///
/// let shape = TrieShape::default();
/// assert_eq!(shape.depth(), 6);
/// assert_eq!(shape.width(), 32);
/// assert_eq!(shape.capacity(), 1 << 30);
///
/// assert_eq!(TrieShape::for_capacity(33).unwrap().depth(), 2);
/// assert!(TrieShape::new(0, 5).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrieShape {
    depth: usize,
    bits_per_level: usize,
}

impl TrieShape {
    /// Depth of the default shape.
    pub const DEFAULT_DEPTH: usize = 6;

    /// Bits per level of the default shape (32 children per node).
    pub const DEFAULT_BITS_PER_LEVEL: usize = 5;

    /// Creates a shape of `depth` levels with `bits_per_level` index bits each.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::InvalidArgument`] if either parameter is
    /// zero or the capacity does not fit in a `usize`.
    pub fn new(depth: usize, bits_per_level: usize) -> Result<Self, PersistentError> {
        if depth == 0 {
            return Err(PersistentError::invalid_argument("trie depth must be positive"));
        }
        if bits_per_level == 0 {
            return Err(PersistentError::invalid_argument(
                "trie bits per level must be positive",
            ));
        }
        match depth.checked_mul(bits_per_level) {
            Some(total) if total < usize::BITS as usize => Ok(Self {
                depth,
                bits_per_level,
            }),
            _ => Err(PersistentError::invalid_argument(format!(
                "trie of depth {depth} with {bits_per_level} bits per level overflows usize"
            ))),
        }
    }

    /// Creates the shallowest 32-wide shape holding at least `capacity`
    /// elements. The depth is never below one.
    ///
    /// # Errors
    ///
    /// Returns [`PersistentError::InvalidArgument`] if no such shape fits in
    /// a `usize`.
    pub fn for_capacity(capacity: usize) -> Result<Self, PersistentError> {
        let bits_needed = match capacity {
            0 | 1 => 0,
            _ => (usize::BITS - (capacity - 1).leading_zeros()) as usize,
        };
        let depth = bits_needed.div_ceil(Self::DEFAULT_BITS_PER_LEVEL).max(1);
        Self::new(depth, Self::DEFAULT_BITS_PER_LEVEL)
    }

    /// Number of levels, counting the leaf level.
    #[inline]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Index bits consumed per level.
    #[inline]
    pub const fn bits_per_level(&self) -> usize {
        self.bits_per_level
    }

    /// Children per branch, elements per leaf.
    #[inline]
    pub const fn width(&self) -> usize {
        1 << self.bits_per_level
    }

    /// Mask selecting one level's slice of an index.
    #[inline]
    pub const fn mask(&self) -> usize {
        self.width() - 1
    }

    /// Maximum number of elements.
    #[inline]
    pub const fn capacity(&self) -> usize {
        1 << (self.bits_per_level * self.depth)
    }

    /// Shift of the root level.
    const fn top_level(&self) -> usize {
        self.bits_per_level * (self.depth - 1)
    }

    const fn subindex(&self, index: usize, level: usize) -> usize {
        (index >> level) & self.mask()
    }
}

impl Default for TrieShape {
    fn default() -> Self {
        Self {
            depth: Self::DEFAULT_DEPTH,
            bits_per_level: Self::DEFAULT_BITS_PER_LEVEL,
        }
    }
}

impl fmt::Display for TrieShape {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}x{} (capacity {})",
            self.depth,
            self.width(),
            self.capacity()
        )
    }
}

// =============================================================================
// ArrayNode
// =============================================================================

/// Trie node. Branches only ever hold a dense prefix of their slots, so a
/// missing trailing child is an unpopulated subtree.
#[derive(Clone)]
pub(crate) enum ArrayNode<E> {
    Branch(Vec<ReferenceCounter<Self>>),
    Leaf(Vec<E>),
}

impl<E> ArrayNode<E> {
    const fn fresh(level: usize) -> Self {
        if level == 0 {
            Self::Leaf(Vec::new())
        } else {
            Self::Branch(Vec::new())
        }
    }
}

// =============================================================================
// ArrayHead
// =============================================================================

/// Root and size of one array version.
pub(crate) struct ArrayHead<E> {
    root: Option<ReferenceCounter<ArrayNode<E>>>,
    size: usize,
}

impl<E> ArrayHead<E> {
    pub(crate) const fn empty() -> Self {
        Self {
            root: None,
            size: 0,
        }
    }

    pub(crate) const fn size(&self) -> usize {
        self.size
    }

    /// Leaf holding `index`, if that part of the trie is populated.
    fn leaf(&self, shape: TrieShape, index: usize) -> Option<&ReferenceCounter<ArrayNode<E>>> {
        let mut node = self.root.as_ref()?;
        let mut level = shape.top_level();
        while let ArrayNode::Branch(children) = node.as_ref() {
            node = children.get(shape.subindex(index, level))?;
            level = level.checked_sub(shape.bits_per_level())?;
        }
        Some(node)
    }

    pub(crate) fn get(&self, shape: TrieShape, index: usize) -> Option<&E> {
        if index >= self.size {
            return None;
        }
        match self.leaf(shape, index)?.as_ref() {
            ArrayNode::Leaf(elements) => elements.get(index & shape.mask()),
            ArrayNode::Branch(_) => None,
        }
    }
}

impl<E: Clone> ArrayHead<E> {
    /// Appends `element`, copying the path to the new last index.
    ///
    /// The caller checks capacity.
    pub(crate) fn push(&mut self, shape: TrieShape, element: E) {
        let level = shape.top_level();
        let root = self
            .root
            .get_or_insert_with(|| ReferenceCounter::new(ArrayNode::fresh(level)));
        Self::push_into(ReferenceCounter::make_mut(root), shape, level, self.size, element);
        self.size += 1;
    }

    fn push_into(node: &mut ArrayNode<E>, shape: TrieShape, level: usize, index: usize, element: E) {
        match node {
            ArrayNode::Leaf(elements) => elements.push(element),
            ArrayNode::Branch(children) => {
                let subindex = shape.subindex(index, level);
                let child_level = level.saturating_sub(shape.bits_per_level());
                if subindex == children.len() {
                    children.push(ReferenceCounter::new(ArrayNode::fresh(child_level)));
                }
                if let Some(child) = children.get_mut(subindex) {
                    Self::push_into(
                        ReferenceCounter::make_mut(child),
                        shape,
                        child_level,
                        index,
                        element,
                    );
                }
            }
        }
    }

    /// Replaces the element at `index`, copying its path.
    pub(crate) fn update(&mut self, shape: TrieShape, index: usize, element: E) {
        if index >= self.size {
            return;
        }
        if let Some(root) = self.root.as_mut() {
            Self::update_in(
                ReferenceCounter::make_mut(root),
                shape,
                shape.top_level(),
                index,
                element,
            );
        }
    }

    fn update_in(node: &mut ArrayNode<E>, shape: TrieShape, level: usize, index: usize, element: E) {
        match node {
            ArrayNode::Leaf(elements) => {
                if let Some(slot) = elements.get_mut(index & shape.mask()) {
                    *slot = element;
                }
            }
            ArrayNode::Branch(children) => {
                if let Some(child) = children.get_mut(shape.subindex(index, level)) {
                    Self::update_in(
                        ReferenceCounter::make_mut(child),
                        shape,
                        level.saturating_sub(shape.bits_per_level()),
                        index,
                        element,
                    );
                }
            }
        }
    }

    /// Keeps the first `length` elements. Nodes past the new last index are
    /// dropped from the copied path; nodes before it stay shared.
    pub(crate) fn truncate(&mut self, shape: TrieShape, length: usize) {
        if length >= self.size {
            return;
        }
        if length == 0 {
            *self = Self::empty();
            return;
        }
        if let Some(root) = self.root.as_mut() {
            Self::truncate_in(
                ReferenceCounter::make_mut(root),
                shape,
                shape.top_level(),
                length - 1,
            );
        }
        self.size = length;
    }

    fn truncate_in(node: &mut ArrayNode<E>, shape: TrieShape, level: usize, last: usize) {
        match node {
            ArrayNode::Leaf(elements) => elements.truncate((last & shape.mask()) + 1),
            ArrayNode::Branch(children) => {
                let subindex = shape.subindex(last, level);
                children.truncate(subindex + 1);
                if let Some(child) = children.get_mut(subindex) {
                    Self::truncate_in(
                        ReferenceCounter::make_mut(child),
                        shape,
                        level.saturating_sub(shape.bits_per_level()),
                        last,
                    );
                }
            }
        }
    }

    /// Head with `element` inserted before `index`: the prefix is kept and
    /// every element from `index` on is appended again.
    pub(crate) fn inserted(&self, shape: TrieShape, index: usize, element: E) -> Self {
        let mut head = self.clone();
        head.truncate(shape, index);
        head.push(shape, element);
        for moved in Elements::new(self.clone(), shape, index) {
            head.push(shape, moved);
        }
        head
    }

    /// Head without the element at `index`.
    pub(crate) fn removed(&self, shape: TrieShape, index: usize) -> Self {
        let mut head = self.clone();
        head.truncate(shape, index);
        for moved in Elements::new(self.clone(), shape, index + 1) {
            head.push(shape, moved);
        }
        head
    }
}

impl<E> Clone for ArrayHead<E> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            size: self.size,
        }
    }
}

// =============================================================================
// Elements
// =============================================================================

/// Element iterator over one head, stepping leaf by leaf.
pub(crate) struct Elements<E> {
    head: ArrayHead<E>,
    shape: TrieShape,
    position: usize,
    leaf: Option<ReferenceCounter<ArrayNode<E>>>,
}

impl<E> Elements<E> {
    pub(crate) const fn new(head: ArrayHead<E>, shape: TrieShape, start: usize) -> Self {
        Self {
            head,
            shape,
            position: start,
            leaf: None,
        }
    }

    pub(crate) const fn remaining(&self) -> usize {
        self.head.size.saturating_sub(self.position)
    }
}

impl<E: Clone> Iterator for Elements<E> {
    type Item = E;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.head.size {
            return None;
        }
        let offset = self.position & self.shape.mask();
        if offset == 0 || self.leaf.is_none() {
            self.leaf = self.head.leaf(self.shape, self.position).cloned();
        }
        let element = match self.leaf.as_deref()? {
            ArrayNode::Leaf(elements) => elements.get(offset).cloned(),
            ArrayNode::Branch(_) => None,
        };
        self.position += 1;
        element
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn head_of(shape: TrieShape, elements: impl IntoIterator<Item = i32>) -> ArrayHead<i32> {
        let mut head = ArrayHead::empty();
        for element in elements {
            head.push(shape, element);
        }
        head
    }

    fn contents(head: &ArrayHead<i32>, shape: TrieShape) -> Vec<i32> {
        Elements::new(head.clone(), shape, 0).collect()
    }

    #[rstest]
    #[case(1, 1, 2, 2)]
    #[case(3, 1, 2, 8)]
    #[case(6, 5, 32, 1_073_741_824)]
    fn test_shape_geometry(
        #[case] depth: usize,
        #[case] bits: usize,
        #[case] width: usize,
        #[case] capacity: usize,
    ) {
        let shape = TrieShape::new(depth, bits).unwrap();
        assert_eq!(shape.width(), width);
        assert_eq!(shape.mask(), width - 1);
        assert_eq!(shape.capacity(), capacity);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(27, 1)]
    #[case(32, 1)]
    #[case(33, 2)]
    #[case(1024, 2)]
    #[case(1025, 3)]
    fn test_shape_for_capacity(#[case] capacity: usize, #[case] depth: usize) {
        let shape = TrieShape::for_capacity(capacity).unwrap();
        assert_eq!(shape.depth(), depth);
        assert_eq!(shape.width(), 32);
        assert!(shape.capacity() >= capacity);
    }

    #[rstest]
    #[case(0, 5)]
    #[case(3, 0)]
    #[case(13, 5)]
    #[case(usize::MAX, 2)]
    fn test_shape_rejects_invalid_parameters(#[case] depth: usize, #[case] bits: usize) {
        assert!(TrieShape::new(depth, bits).unwrap_err().is_invalid_argument());
    }

    #[rstest]
    fn test_shape_for_huge_capacity_is_rejected() {
        assert!(TrieShape::for_capacity(usize::MAX).is_err());
    }

    #[rstest]
    fn test_push_and_get_across_levels() {
        let shape = TrieShape::new(3, 1).unwrap();
        let head = head_of(shape, 0..8);

        assert_eq!(head.size(), 8);
        for index in 0..8 {
            assert_eq!(head.get(shape, index), Some(&(index as i32)));
        }
        assert_eq!(head.get(shape, 8), None);
    }

    #[rstest]
    fn test_single_level_trie_is_one_leaf() {
        let shape = TrieShape::new(1, 2).unwrap();
        let head = head_of(shape, [7, 8, 9]);
        assert!(matches!(head.root.as_deref(), Some(ArrayNode::Leaf(elements)) if elements.len() == 3));
    }

    #[rstest]
    fn test_update_copies_path_and_keeps_original() {
        let shape = TrieShape::new(2, 2).unwrap();
        let original = head_of(shape, 0..8);
        let mut updated = original.clone();
        updated.update(shape, 5, 50);

        assert_eq!(contents(&original, shape), vec![0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(contents(&updated, shape), vec![0, 1, 2, 3, 4, 50, 6, 7]);

        // the untouched first leaf is shared
        let (Some(ArrayNode::Branch(before)), Some(ArrayNode::Branch(after))) =
            (original.root.as_deref(), updated.root.as_deref())
        else {
            panic!("expected branch roots");
        };
        assert!(ReferenceCounter::ptr_eq(&before[0], &after[0]));
        assert!(!ReferenceCounter::ptr_eq(&before[1], &after[1]));
    }

    #[rstest]
    fn test_truncate_drops_trailing_nodes() {
        let shape = TrieShape::new(2, 1).unwrap();
        let original = head_of(shape, 0..4);
        let mut truncated = original.clone();
        truncated.truncate(shape, 1);

        assert_eq!(contents(&truncated, shape), vec![0]);
        assert!(matches!(truncated.root.as_deref(), Some(ArrayNode::Branch(children)) if children.len() == 1));
        assert_eq!(contents(&original, shape), vec![0, 1, 2, 3]);

        truncated.truncate(shape, 0);
        assert!(truncated.root.is_none());
        assert_eq!(truncated.size(), 0);
    }

    #[rstest]
    fn test_push_after_truncate_reuses_prefix() {
        let shape = TrieShape::new(2, 1).unwrap();
        let mut head = head_of(shape, 0..4);
        head.truncate(shape, 3);
        head.push(shape, 30);
        assert_eq!(contents(&head, shape), vec![0, 1, 2, 30]);
    }

    #[rstest]
    #[case(0, vec![9, 3, 7, 6, 1])]
    #[case(2, vec![3, 7, 9, 6, 1])]
    #[case(3, vec![3, 7, 6, 9, 1])]
    fn test_inserted_shifts_tail(#[case] index: usize, #[case] expected: Vec<i32>) {
        let shape = TrieShape::new(3, 1).unwrap();
        let head = head_of(shape, [3, 7, 6, 1]);
        assert_eq!(contents(&head.inserted(shape, index, 9), shape), expected);
        assert_eq!(contents(&head, shape), vec![3, 7, 6, 1]);
    }

    #[rstest]
    #[case(0, vec![7, 6, 1])]
    #[case(1, vec![3, 6, 1])]
    #[case(3, vec![3, 7, 6])]
    fn test_removed_shifts_tail(#[case] index: usize, #[case] expected: Vec<i32>) {
        let shape = TrieShape::new(2, 1).unwrap();
        let head = head_of(shape, [3, 7, 6, 1]);
        let removed = head.removed(shape, index);
        assert_eq!(removed.size(), 3);
        assert_eq!(contents(&removed, shape), expected);
    }

    #[rstest]
    fn test_elements_from_offset() {
        let shape = TrieShape::new(2, 2).unwrap();
        let head = head_of(shape, 0..10);
        let tail: Vec<i32> = Elements::new(head, shape, 6).collect();
        assert_eq!(tail, vec![6, 7, 8, 9]);
    }
}
