//! # persimmon
//!
//! Persistent (immutable) ordered collections with structural sharing,
//! plus a thread-safe memoization cell for expensive or one-time
//! computations.
//!
//! ## Overview
//!
//! Every "mutating" operation on the collections in this crate returns a
//! new version and leaves the original untouched. Unchanged subtrees and
//! list suffixes are shared by reference between versions, so building a
//! new version costs O(log n) (map) or O(1) (list cons) rather than a
//! full copy. Because published versions are never mutated, any number of
//! threads may read the same version concurrently with no locking.
//!
//! - [`persistent::PersistentTreeMap`]: immutable ordered map backed by a
//!   weight-balanced binary search tree
//! - [`persistent::PersistentList`]: immutable singly-linked cons list
//! - [`control::MemoCell`]: compute-at-most-once cell with explicit
//!   invalidation
//!
//! ## Feature Flags
//!
//! - `persistent` (default): the collection types
//! - `control` (default): the memoization cell
//! - `arc`: share collection nodes with `Arc` instead of `Rc`
//! - `serde`: `Serialize`/`Deserialize` for the collections
//!
//! ## Example
//!
//! ```rust
//! use persimmon::persistent::PersistentTreeMap;
//!
//! let map = PersistentTreeMap::new()
//!     .insert(2, "two")
//!     .insert(1, "one");
//! let updated = map.insert(1, "ONE");
//!
//! assert_eq!(map.get(&1), Some(&"one"));     // original unchanged
//! assert_eq!(updated.get(&1), Some(&"ONE")); // new version
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types.
///
/// # Usage
///
/// ```rust
/// use persimmon::prelude::*;
/// ```
pub mod prelude {

    #[cfg(feature = "control")]
    pub use crate::control::*;

    #[cfg(feature = "persistent")]
    pub use crate::persistent::*;
}

#[cfg(feature = "control")]
pub mod control;

#[cfg(feature = "persistent")]
pub mod persistent;
