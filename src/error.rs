//! Error types for persistent collections.
//!
//! Every fallible operation in this crate returns [`PersistentError`].
//! A failed operation never creates a new version: the timeline of the
//! collection is exactly as it was before the call.
//!
//! # Error Categories
//!
//! - [`PersistentError::IndexOutOfBounds`]: positional access outside the current bounds
//! - [`PersistentError::CapacityExceeded`]: array write when the trie is full
//! - [`PersistentError::EmptyCollection`]: `pop` on an empty array
//! - [`PersistentError::InvalidArgument`]: a violated precondition (for example a bad trie shape)
//! - [`PersistentError::Unsupported`]: an operation the collection intentionally does not provide
//!
//! # Examples
//!
//! ```
//! use retrace::error::PersistentError;
//!
//! let error = PersistentError::index_out_of_bounds(5, 3);
//! assert!(error.is_index_out_of_bounds());
//! assert_eq!(error.to_string(), "index 5 out of bounds for length 3");
//! ```

use thiserror::Error;

// =============================================================================
// PersistentError
// =============================================================================

/// Errors raised by persistent collection operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistentError {
    /// A positional access fell outside `[0, length)`.
    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The length of the collection at the time of the call.
        length: usize,
    },

    /// An array write was attempted while `size == capacity`.
    #[error("capacity of {capacity} elements exceeded")]
    CapacityExceeded {
        /// The maximum number of elements of the array.
        capacity: usize,
    },

    /// The collection holds no element to remove.
    #[error("collection is empty")]
    EmptyCollection,

    /// A required precondition on an argument does not hold.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the violated precondition.
        message: String,
    },

    /// The operation is not provided by this collection.
    #[error("operation `{operation}` is not supported")]
    Unsupported {
        /// Name of the rejected operation.
        operation: &'static str,
    },
}

// =============================================================================
// Factory Methods
// =============================================================================

impl PersistentError {
    /// Creates a new `IndexOutOfBounds` error.
    #[must_use]
    pub const fn index_out_of_bounds(index: usize, length: usize) -> Self {
        Self::IndexOutOfBounds { index, length }
    }

    /// Creates a new `CapacityExceeded` error.
    #[must_use]
    pub const fn capacity_exceeded(capacity: usize) -> Self {
        Self::CapacityExceeded { capacity }
    }

    /// Creates a new `InvalidArgument` error.
    ///
    /// # Examples
    ///
    /// ```
    /// use retrace::error::PersistentError;
    ///
    /// let error = PersistentError::invalid_argument("depth must be positive");
    /// assert!(error.is_invalid_argument());
    /// ```
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a new `Unsupported` error.
    #[must_use]
    pub const fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }
}

// =============================================================================
// Predicates
// =============================================================================

impl PersistentError {
    /// Returns `true` if this is an `IndexOutOfBounds` error.
    #[must_use]
    pub const fn is_index_out_of_bounds(&self) -> bool {
        matches!(self, Self::IndexOutOfBounds { .. })
    }

    /// Returns `true` if this is a `CapacityExceeded` error.
    #[must_use]
    pub const fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }

    /// Returns `true` if this is an `EmptyCollection` error.
    #[must_use]
    pub const fn is_empty_collection(&self) -> bool {
        matches!(self, Self::EmptyCollection)
    }

    /// Returns `true` if this is an `InvalidArgument` error.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Returns `true` if this is an `Unsupported` error.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}
