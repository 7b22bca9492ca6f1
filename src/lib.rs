//! # retrace
//!
//! Persistent (multi-version) collections with undo and redo.
//!
//! ## Overview
//!
//! Every collection in this crate remembers the versions it has been
//! through. Reads and writes address the current version, and
//! [`Persistent::undo`](persistent::Persistent::undo) and
//! [`Persistent::redo`](persistent::Persistent::redo) move along a linear
//! timeline. Two partial-persistence techniques are provided:
//!
//! - **Lazy modification slots**: [`PersistentOrderedMap`](persistent::PersistentOrderedMap)
//!   and [`PersistentLinkedList`](persistent::PersistentLinkedList) are built
//!   from nodes carrying one deferred field override each, which keeps the
//!   extra space per write amortized O(1)
//! - **Path copying**: [`PersistentArray`](persistent::PersistentArray) is a
//!   bitmapped trie copying the root-to-leaf path of every write, with
//!   explicit branching and cascading undo for nested arrays
//!
//! [`FatNodeMap`](persistent::FatNodeMap) stores a full version map per node
//! and serves as a baseline.
//!
//! ## Feature Flags
//!
//! - `serde`: `Serialize` for the current version of every collection
//!
//! ## Example
//!
//! ```rust
//! use retrace::prelude::*;
//!
//! let mut map = PersistentOrderedMap::new();
//! map.put("a", 1);
//! map.put("b", 2);
//! map.undo();
//! map.put("c", 3);
//! map.redo();
//!
//! assert_eq!(map.get("b"), None);
//! assert_eq!(map.get("c"), Some(3));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports the collections, their traits and the error type.
///
/// # Usage
///
/// ```rust
/// use retrace::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::PersistentError;
    pub use crate::persistent::*;
}

pub mod error;
pub mod persistent;
