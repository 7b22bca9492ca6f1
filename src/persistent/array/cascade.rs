//! Cascading undo/redo for arrays nested inside arrays.
//!
//! When an array is stored into another array it remembers that array as its
//! parent. From then on every write that stores an element into the child
//! (`set`, `push`, `insert`, and the `assoc`/`conj` branches made from it)
//! is reported to the parent, which logs the writer on its `inserted_undo`
//! stack. Removals are not reported. Undo on the parent first replays that
//! log: the most recently mutated live child is
//! undone and moved to `inserted_redo`. Only once the log is exhausted does
//! the parent step its own heads back. Redo mirrors this.
//!
//! Links in both directions are weak: a parent never keeps a child alive
//! through its log, and a child never keeps its parent alive.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use super::{ArrayCore, PersistentArray};

// =============================================================================
// Cascade
// =============================================================================

/// Type-erased view of an array core, used across nesting levels whose
/// element types differ.
pub(crate) trait Cascade {
    fn undo(&self);

    fn redo(&self);

    /// Logs a mutation of `child`, an array that has this one as parent.
    fn record_mutation(&self, child: Weak<dyn Cascade>);
}

impl<E: ArrayElement> Cascade for RefCell<ArrayCore<E>> {
    fn undo(&self) {
        // the borrow must end before the child runs: it may be this array
        let delegate = self.borrow_mut().undo_step();
        if let Some(child) = delegate {
            tracing::trace!("undo delegated to nested array");
            child.undo();
        }
    }

    fn redo(&self) {
        let delegate = self.borrow_mut().redo_step();
        if let Some(child) = delegate {
            tracing::trace!("redo delegated to nested array");
            child.redo();
        }
    }

    fn record_mutation(&self, child: Weak<dyn Cascade>) {
        let mut core = self.borrow_mut();
        core.inserted_undo.push(child);
        core.inserted_redo.clear();
    }
}

impl<E> ArrayCore<E> {
    /// Pops the next live child to undo, or steps this array's own heads back
    /// when none is left.
    fn undo_step(&mut self) -> Option<Rc<dyn Cascade>> {
        while let Some(entry) = self.inserted_undo.pop() {
            if let Some(child) = entry.upgrade() {
                self.inserted_redo.push(entry);
                return Some(child);
            }
        }
        if let Some(previous) = self.undo.pop() {
            self.redo.push(mem::replace(&mut self.head, previous));
            tracing::trace!(size = self.head.size(), "array undo");
        }
        None
    }

    fn redo_step(&mut self) -> Option<Rc<dyn Cascade>> {
        while let Some(entry) = self.inserted_redo.pop() {
            if let Some(child) = entry.upgrade() {
                self.inserted_undo.push(entry);
                return Some(child);
            }
        }
        if let Some(next) = self.redo.pop() {
            self.undo.push(mem::replace(&mut self.head, next));
            tracing::trace!(size = self.head.size(), "array redo");
        }
        None
    }
}

// =============================================================================
// ParentLink
// =============================================================================

/// Weak handle to the array an element is being stored into.
///
/// Handed to [`ArrayElement::adopt`]; only nested arrays make use of it.
#[derive(Clone)]
pub struct ParentLink(Weak<dyn Cascade>);

impl ParentLink {
    pub(crate) const fn new(parent: Weak<dyn Cascade>) -> Self {
        Self(parent)
    }

    /// Reports a mutation of `child` to the parent, if it is still alive.
    pub(crate) fn notify(&self, child: Weak<dyn Cascade>) {
        if let Some(parent) = self.0.upgrade() {
            parent.record_mutation(child);
        }
    }

    /// Returns `true` while the parent array is alive.
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for ParentLink {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ParentLink")
            .field("alive", &self.is_alive())
            .finish()
    }
}

// =============================================================================
// ArrayElement
// =============================================================================

/// A value that can be stored in a [`PersistentArray`].
///
/// `adopt` runs every time the value is written into an array, with a link
/// to that array. The default does nothing; [`PersistentArray`] itself
/// overrides it to take the array as its parent, which enables cascading
/// undo. Custom element types opt in with an empty impl:
///
/// ```rust
/// use retrace::persistent::{ArrayElement, PersistentArray};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Point(i32, i32);
///
/// impl ArrayElement for Point {}
///
/// let points = PersistentArray::new();
/// points.push(Point(1, 2)).unwrap();
/// assert_eq!(points.get(0), Ok(Point(1, 2)));
/// ```
pub trait ArrayElement: Clone + 'static {
    /// Called with the array this value was just stored into.
    fn adopt(&self, _parent: &ParentLink) {}
}

macro_rules! impl_array_element {
    ($($element:ty),* $(,)?) => {
        $(impl ArrayElement for $element {})*
    };
}

impl_array_element!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    &'static str,
    Box<str>,
    Rc<str>,
);

impl<T: ArrayElement> ArrayElement for Option<T> {}

impl<T: Clone + 'static> ArrayElement for Vec<T> {}

impl<A: ArrayElement, B: ArrayElement> ArrayElement for (A, B) {}

impl<E: ArrayElement> ArrayElement for PersistentArray<E> {
    fn adopt(&self, parent: &ParentLink) {
        self.core.borrow_mut().parent = Some(parent.clone());
    }
}
