//! Persistent (immutable) ordered map based on a weight-balanced tree.
//!
//! This module provides [`PersistentTreeMap`], an immutable ordered map
//! that uses structural sharing for efficient operations.
//!
//! # Overview
//!
//! `PersistentTreeMap` is backed by a weight-balanced binary search tree.
//! Every node stores the size of its subtree, which gives the map O(1)
//! `len` and O(log N) positional queries in addition to the usual ordered
//! map operations.
//!
//! - O(log N) get
//! - O(log N) insert / remove (plain and old-value-returning variants)
//! - O(log N) min/max and rank queries (`nth`, `index_of`)
//! - O(1) len and `is_empty`
//!
//! All operations return new maps without modifying the original. Only the
//! nodes on the path from the root to the change are reallocated; every
//! other subtree is shared by reference with the previous version.
//!
//! # Examples
//!
//! ```rust
//! use persimmon::persistent::PersistentTreeMap;
//!
//! let map = PersistentTreeMap::new()
//!     .insert(3, "three")
//!     .insert(1, "one")
//!     .insert(2, "two");
//!
//! // Entries are always in sorted order
//! let keys: Vec<&i32> = map.keys().collect();
//! assert_eq!(keys, vec![&1, &2, &3]);
//!
//! // Old versions stay valid
//! let smaller = map.remove(&2);
//! assert_eq!(map.len(), 3);
//! assert_eq!(smaller.len(), 2);
//! ```
//!
//! # Internal Structure
//!
//! The tree maintains the following invariants:
//! 1. In-order traversal yields keys in strictly ascending order
//! 2. `size` of a node equals `1 + size(left) + size(right)`
//! 3. For every node with more than one descendant, neither subtree
//!    holds more than `DELTA` times as many entries as the other
//!
//! Invariant 3 bounds the height at O(log N) after any sequence of
//! inserts, removes, and merges, including fully sorted insertion orders.

use super::ReferenceCounter;
use smallvec::SmallVec;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::{FromIterator, FusedIterator};

// =============================================================================
// Node Definition
// =============================================================================

/// Maximum allowed ratio between sibling subtree sizes.
const DELTA: usize = 3;
/// Decides between a single and a double rotation while rebalancing.
const RATIO: usize = 2;

type Link<K, V> = Option<ReferenceCounter<Node<K, V>>>;

/// Internal node structure for the weight-balanced tree.
#[derive(Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    size: usize,
    left: Link<K, V>,
    right: Link<K, V>,
}

/// Returns the number of entries below a link.
fn link_size<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |node| node.size)
}

impl<K, V> Node<K, V> {
    /// Creates a node with no children.
    const fn leaf(key: K, value: V) -> Self {
        Self {
            key,
            value,
            size: 1,
            left: None,
            right: None,
        }
    }

    /// Creates a node from its parts, recomputing the size.
    fn branch(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Self {
        let size = 1 + link_size(&left) + link_size(&right);
        Self {
            key,
            value,
            size,
            left,
            right,
        }
    }
}

impl<K: Clone + Ord, V: Clone> Node<K, V> {
    /// Rebuilds a node whose subtrees may differ by one insertion or
    /// removal, restoring the weight-balance invariant with at most a
    /// double rotation.
    fn rebalance(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Self {
        let left_size = link_size(&left);
        let right_size = link_size(&right);

        if left_size + right_size > 1 {
            if right_size > DELTA * left_size
                && let Some(right_node) = &right
            {
                return Self::rotate_left(key, value, left, right_node);
            }
            if left_size > DELTA * right_size
                && let Some(left_node) = &left
            {
                return Self::rotate_right(key, value, left_node, right);
            }
        }

        Self::branch(key, value, left, right)
    }

    /// Rotates a right-heavy node to the left.
    ///
    /// A single rotation promotes `right`; when the inner grandchild
    /// outweighs `RATIO` times the outer one, a double rotation promotes
    /// `right.left` instead.
    fn rotate_left(key: K, value: V, left: Link<K, V>, right: &ReferenceCounter<Self>) -> Self {
        if link_size(&right.left) < RATIO * link_size(&right.right) {
            let new_left = Self::branch(key, value, left, right.left.clone());
            Self::branch(
                right.key.clone(),
                right.value.clone(),
                Some(ReferenceCounter::new(new_left)),
                right.right.clone(),
            )
        } else if let Some(inner) = &right.left {
            let new_left = Self::branch(key, value, left, inner.left.clone());
            let new_right = Self::branch(
                right.key.clone(),
                right.value.clone(),
                inner.right.clone(),
                right.right.clone(),
            );
            Self::branch(
                inner.key.clone(),
                inner.value.clone(),
                Some(ReferenceCounter::new(new_left)),
                Some(ReferenceCounter::new(new_right)),
            )
        } else {
            Self::branch(key, value, left, Some(ReferenceCounter::clone(right)))
        }
    }

    /// Rotates a left-heavy node to the right. Mirror of `rotate_left`.
    fn rotate_right(key: K, value: V, left: &ReferenceCounter<Self>, right: Link<K, V>) -> Self {
        if link_size(&left.right) < RATIO * link_size(&left.left) {
            let new_right = Self::branch(key, value, left.right.clone(), right);
            Self::branch(
                left.key.clone(),
                left.value.clone(),
                left.left.clone(),
                Some(ReferenceCounter::new(new_right)),
            )
        } else if let Some(inner) = &left.right {
            let new_right = Self::branch(key, value, inner.right.clone(), right);
            let new_left = Self::branch(
                left.key.clone(),
                left.value.clone(),
                left.left.clone(),
                inner.left.clone(),
            );
            Self::branch(
                inner.key.clone(),
                inner.value.clone(),
                Some(ReferenceCounter::new(new_left)),
                Some(ReferenceCounter::new(new_right)),
            )
        } else {
            Self::branch(key, value, Some(ReferenceCounter::clone(left)), right)
        }
    }

    /// Recursive helper for insert.
    ///
    /// Returns the rebuilt subtree and the value the key displaced, if
    /// any. Only the nodes on the descent path are reallocated.
    fn insert_into(
        node: Option<&ReferenceCounter<Self>>,
        key: K,
        value: V,
    ) -> (ReferenceCounter<Self>, Option<V>) {
        match node {
            None => (ReferenceCounter::new(Self::leaf(key, value)), None),
            Some(node_ref) => match key.cmp(&node_ref.key) {
                Ordering::Less => {
                    let (new_left, displaced) =
                        Self::insert_into(node_ref.left.as_ref(), key, value);
                    let rebuilt = Self::rebalance(
                        node_ref.key.clone(),
                        node_ref.value.clone(),
                        Some(new_left),
                        node_ref.right.clone(),
                    );
                    (ReferenceCounter::new(rebuilt), displaced)
                }
                Ordering::Greater => {
                    let (new_right, displaced) =
                        Self::insert_into(node_ref.right.as_ref(), key, value);
                    let rebuilt = Self::rebalance(
                        node_ref.key.clone(),
                        node_ref.value.clone(),
                        node_ref.left.clone(),
                        Some(new_right),
                    );
                    (ReferenceCounter::new(rebuilt), displaced)
                }
                Ordering::Equal => {
                    // Key exists: replace the value, shape unchanged
                    let displaced = node_ref.value.clone();
                    let rebuilt = Self {
                        key,
                        value,
                        size: node_ref.size,
                        left: node_ref.left.clone(),
                        right: node_ref.right.clone(),
                    };
                    (ReferenceCounter::new(rebuilt), Some(displaced))
                }
            },
        }
    }

    /// Recursive helper for remove.
    ///
    /// Returns the rebuilt subtree and the removed value. When the key is
    /// absent the original nodes are returned untouched, so an absent
    /// removal allocates nothing.
    fn remove_from<Q>(node: Option<&ReferenceCounter<Self>>, key: &Q) -> (Link<K, V>, Option<V>)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some(node_ref) = node else {
            return (None, None);
        };
        match key.cmp(node_ref.key.borrow()) {
            Ordering::Less => {
                let (new_left, removed) = Self::remove_from(node_ref.left.as_ref(), key);
                if removed.is_none() {
                    return (Some(ReferenceCounter::clone(node_ref)), None);
                }
                let rebuilt = Self::rebalance(
                    node_ref.key.clone(),
                    node_ref.value.clone(),
                    new_left,
                    node_ref.right.clone(),
                );
                (Some(ReferenceCounter::new(rebuilt)), removed)
            }
            Ordering::Greater => {
                let (new_right, removed) = Self::remove_from(node_ref.right.as_ref(), key);
                if removed.is_none() {
                    return (Some(ReferenceCounter::clone(node_ref)), None);
                }
                let rebuilt = Self::rebalance(
                    node_ref.key.clone(),
                    node_ref.value.clone(),
                    node_ref.left.clone(),
                    new_right,
                );
                (Some(ReferenceCounter::new(rebuilt)), removed)
            }
            Ordering::Equal => {
                let removed = node_ref.value.clone();
                let merged = match (&node_ref.left, &node_ref.right) {
                    (None, None) => None,
                    (Some(left), None) => Some(ReferenceCounter::clone(left)),
                    (None, Some(right)) => Some(ReferenceCounter::clone(right)),
                    (Some(left), Some(right)) => {
                        // Promote the in-order successor
                        let ((successor_key, successor_value), new_right) = Self::take_min(right);
                        let rebuilt = Self::rebalance(
                            successor_key,
                            successor_value,
                            Some(ReferenceCounter::clone(left)),
                            new_right,
                        );
                        Some(ReferenceCounter::new(rebuilt))
                    }
                };
                (merged, Some(removed))
            }
        }
    }

    /// Removes the minimum entry of a non-empty subtree in a single pass,
    /// rebalancing on the way back up.
    fn take_min(node: &ReferenceCounter<Self>) -> ((K, V), Link<K, V>) {
        match &node.left {
            None => (
                (node.key.clone(), node.value.clone()),
                node.right.clone(),
            ),
            Some(left) => {
                let (entry, new_left) = Self::take_min(left);
                let rebuilt = Self::rebalance(
                    node.key.clone(),
                    node.value.clone(),
                    new_left,
                    node.right.clone(),
                );
                (entry, Some(ReferenceCounter::new(rebuilt)))
            }
        }
    }

    /// Joins two subtrees around a middle entry.
    ///
    /// Unlike `rebalance`, the subtrees may differ in size arbitrarily:
    /// the middle entry is pushed down the spine of the heavier side until
    /// the weight invariant can be restored by ordinary rotations. Every
    /// key in `left` must order below `key`, and every key in `right`
    /// above it.
    fn join(left: Link<K, V>, key: K, value: V, right: Link<K, V>) -> ReferenceCounter<Self> {
        let left_size = link_size(&left);
        let right_size = link_size(&right);

        if left_size > DELTA * right_size
            && let Some(left_node) = &left
        {
            let new_right = Self::join(left_node.right.clone(), key, value, right);
            ReferenceCounter::new(Self::rebalance(
                left_node.key.clone(),
                left_node.value.clone(),
                left_node.left.clone(),
                Some(new_right),
            ))
        } else if right_size > DELTA * left_size
            && let Some(right_node) = &right
        {
            let new_left = Self::join(left, key, value, right_node.left.clone());
            ReferenceCounter::new(Self::rebalance(
                right_node.key.clone(),
                right_node.value.clone(),
                Some(new_left),
                right_node.right.clone(),
            ))
        } else {
            ReferenceCounter::new(Self::branch(key, value, left, right))
        }
    }

    /// Splits a subtree at `key` into entries below, the displaced value
    /// at the key (if present), and entries above.
    fn split(
        node: Option<&ReferenceCounter<Self>>,
        key: &K,
    ) -> (Link<K, V>, Option<V>, Link<K, V>) {
        let Some(node_ref) = node else {
            return (None, None, None);
        };
        match key.cmp(&node_ref.key) {
            Ordering::Less => {
                let (below, displaced, above) = Self::split(node_ref.left.as_ref(), key);
                let joined = Self::join(
                    above,
                    node_ref.key.clone(),
                    node_ref.value.clone(),
                    node_ref.right.clone(),
                );
                (below, displaced, Some(joined))
            }
            Ordering::Greater => {
                let (below, displaced, above) = Self::split(node_ref.right.as_ref(), key);
                let joined = Self::join(
                    node_ref.left.clone(),
                    node_ref.key.clone(),
                    node_ref.value.clone(),
                    below,
                );
                (Some(joined), displaced, above)
            }
            Ordering::Equal => (
                node_ref.left.clone(),
                Some(node_ref.value.clone()),
                node_ref.right.clone(),
            ),
        }
    }

    /// Merges two subtrees; on a key collision the entry from `other`
    /// wins. Shares whole subtrees whenever one side is empty.
    fn union(
        this: Option<&ReferenceCounter<Self>>,
        other: Option<&ReferenceCounter<Self>>,
    ) -> Link<K, V> {
        match (this, other) {
            (None, None) => None,
            (Some(node), None) | (None, Some(node)) => Some(ReferenceCounter::clone(node)),
            (Some(_), Some(other_node)) => {
                let (below, _displaced, above) = Self::split(this, &other_node.key);
                let new_left = Self::union(below.as_ref(), other_node.left.as_ref());
                let new_right = Self::union(above.as_ref(), other_node.right.as_ref());
                Some(Self::join(
                    new_left,
                    other_node.key.clone(),
                    other_node.value.clone(),
                    new_right,
                ))
            }
        }
    }

    /// Structure-preserving value transform: the result mirrors the
    /// source shape node for node, visiting values in ascending key order.
    fn map_node<W, F>(
        node: Option<&ReferenceCounter<Self>>,
        transform: &mut F,
    ) -> Link<K, W>
    where
        W: Clone,
        F: FnMut(&V) -> W,
    {
        node.map(|node_ref| {
            let left = Self::map_node(node_ref.left.as_ref(), transform);
            let value = transform(&node_ref.value);
            let right = Self::map_node(node_ref.right.as_ref(), transform);
            ReferenceCounter::new(Node {
                key: node_ref.key.clone(),
                value,
                size: node_ref.size,
                left,
                right,
            })
        })
    }
}

// =============================================================================
// PersistentTreeMap Definition
// =============================================================================

/// A persistent (immutable) ordered map based on a weight-balanced tree.
///
/// `PersistentTreeMap` is an immutable data structure that uses structural
/// sharing to efficiently support functional programming patterns.
///
/// Keys must implement `Ord`. The map maintains entries in sorted key
/// order, enabling ordered iteration and O(log N) positional queries.
/// Supplying an `Ord` implementation that is not a total order leaves the
/// tree unbalanced and lookups unreliable; it is not detected at runtime.
///
/// # Time Complexity
///
/// | Operation       | Complexity   |
/// |-----------------|--------------|
/// | `new`           | O(1)         |
/// | `get`           | O(log N)     |
/// | `insert`        | O(log N)     |
/// | `remove`        | O(log N)     |
/// | `min`/`max`     | O(log N)     |
/// | `nth`           | O(log N)     |
/// | `index_of`      | O(log N)     |
/// | `merge`         | O(M log(N/M + 1)) |
/// | `len`           | O(1)         |
///
/// # Examples
///
/// ```rust
/// use persimmon::persistent::PersistentTreeMap;
///
/// let map = PersistentTreeMap::singleton(42, "answer");
/// assert_eq!(map.get(&42), Some(&"answer"));
///
/// // Every update returns a new version
/// let map = PersistentTreeMap::new()
///     .insert(3, "three")
///     .insert(1, "one")
///     .insert(2, "two");
///
/// let keys: Vec<&i32> = map.keys().collect();
/// assert_eq!(keys, vec![&1, &2, &3]);
/// ```
#[derive(Clone)]
pub struct PersistentTreeMap<K, V> {
    /// Root node of the tree
    root: Link<K, V>,
}

impl<K, V> PersistentTreeMap<K, V> {
    /// Creates a new empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map: PersistentTreeMap<i32, String> = PersistentTreeMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { root: None }
    }

    /// Returns the number of entries in the map.
    ///
    /// O(1): the count is the stored size of the root node.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// assert_eq!(map.len(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        link_size(&self.root)
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

impl<K: Clone + Ord, V: Clone> PersistentTreeMap<K, V> {
    /// Creates a map containing a single key-value pair.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::singleton(42, "answer");
    /// assert_eq!(map.len(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self {
            root: Some(ReferenceCounter::new(Node::leaf(key, value))),
        }
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but the
    /// ordering on the borrowed form must match the ordering on the key
    /// type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert("hello".to_string(), 42);
    ///
    /// // Can use &str to look up String keys
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            match key.cmp(node.key.borrow()) {
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Greater => current = node.right.as_deref(),
                Ordering::Equal => return Some(&node.value),
            }
        }
        None
    }

    /// Returns `true` if the map contains a value for the specified key.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already contains the key, the value is replaced. Use
    /// [`insert_lookup`](Self::insert_lookup) to also recover the
    /// displaced value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map1 = PersistentTreeMap::new().insert(1, "one");
    /// let map2 = map1.insert(1, "ONE");
    ///
    /// assert_eq!(map1.get(&1), Some(&"one")); // Original unchanged
    /// assert_eq!(map2.get(&1), Some(&"ONE")); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        self.insert_lookup(key, value).0
    }

    /// Inserts a key-value pair, returning the new map together with the
    /// value previously stored at the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new().insert(1, "one");
    ///
    /// let (updated, displaced) = map.insert_lookup(1, "ONE");
    /// assert_eq!(displaced, Some("one"));
    /// assert_eq!(updated.get(&1), Some(&"ONE"));
    ///
    /// let (extended, displaced) = map.insert_lookup(2, "two");
    /// assert_eq!(displaced, None);
    /// assert_eq!(extended.len(), 2);
    /// ```
    #[must_use]
    pub fn insert_lookup(&self, key: K, value: V) -> (Self, Option<V>) {
        let (new_root, displaced) = Node::insert_into(self.root.as_ref(), key, value);
        (
            Self {
                root: Some(new_root),
            },
            displaced,
        )
    }

    /// Removes a key from the map.
    ///
    /// Returns a new map without the key. If the key doesn't exist,
    /// returns a clone of the original map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// let removed = map.remove(&1);
    ///
    /// assert_eq!(map.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1); // New version
    /// assert_eq!(removed.get(&1), None);
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.remove_lookup(key).0
    }

    /// Removes a key, returning the new map together with the value that
    /// was stored at the key.
    ///
    /// Removing an absent key is not an error: the returned map is a
    /// clone of the original and the value is `None`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new().insert(1, "one");
    ///
    /// let (smaller, removed) = map.remove_lookup(&1);
    /// assert_eq!(removed, Some("one"));
    /// assert!(smaller.is_empty());
    ///
    /// let (unchanged, removed) = map.remove_lookup(&9);
    /// assert_eq!(removed, None);
    /// assert_eq!(unchanged, map);
    /// ```
    #[must_use]
    pub fn remove_lookup<Q>(&self, key: &Q) -> (Self, Option<V>)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (new_root, removed) = Node::remove_from(self.root.as_ref(), key);
        if removed.is_none() {
            return (self.clone(), None);
        }
        (Self { root: new_root }, removed)
    }

    /// Returns the entry with the minimum key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(3, "three")
    ///     .insert(1, "one");
    /// assert_eq!(map.min(), Some((&1, &"one")));
    /// ```
    #[must_use]
    pub fn min(&self) -> Option<(&K, &V)> {
        let mut current = self.root.as_deref()?;
        while let Some(left) = current.left.as_deref() {
            current = left;
        }
        Some((&current.key, &current.value))
    }

    /// Returns the entry with the maximum key.
    #[must_use]
    pub fn max(&self) -> Option<(&K, &V)> {
        let mut current = self.root.as_deref()?;
        while let Some(right) = current.right.as_deref() {
            current = right;
        }
        Some((&current.key, &current.value))
    }

    /// Returns the entry at the given position in ascending key order.
    ///
    /// O(log N): the search is steered by the per-node sizes instead of
    /// walking the traversal.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(30, "thirty")
    ///     .insert(10, "ten")
    ///     .insert(20, "twenty");
    ///
    /// assert_eq!(map.nth(0), Some((&10, &"ten")));
    /// assert_eq!(map.nth(2), Some((&30, &"thirty")));
    /// assert_eq!(map.nth(3), None);
    /// ```
    #[must_use]
    pub fn nth(&self, index: usize) -> Option<(&K, &V)> {
        let mut current = self.root.as_deref()?;
        let mut index = index;
        loop {
            let left_size = link_size(&current.left);
            match index.cmp(&left_size) {
                Ordering::Less => current = current.left.as_deref()?,
                Ordering::Equal => return Some((&current.key, &current.value)),
                Ordering::Greater => {
                    index = index - left_size - 1;
                    current = current.right.as_deref()?;
                }
            }
        }
    }

    /// Returns the position of a key in ascending key order, or `None`
    /// if the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(30, ())
    ///     .insert(10, ())
    ///     .insert(20, ());
    ///
    /// assert_eq!(map.index_of(&20), Some(1));
    /// assert_eq!(map.index_of(&40), None);
    /// ```
    #[must_use]
    pub fn index_of<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.root.as_deref();
        let mut offset = 0;
        while let Some(node) = current {
            match key.cmp(node.key.borrow()) {
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Equal => return Some(offset + link_size(&node.left)),
                Ordering::Greater => {
                    offset += link_size(&node.left) + 1;
                    current = node.right.as_deref();
                }
            }
        }
        None
    }

    /// Returns `true` if any key satisfies the predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// assert!(map.exists(|key| *key == 2));
    /// assert!(!map.exists(|key| *key == 4));
    /// ```
    #[must_use]
    pub fn exists<P>(&self, mut predicate: P) -> bool
    where
        P: FnMut(&K) -> bool,
    {
        self.iter().any(|(key, _)| predicate(key))
    }

    /// Returns the value of the first entry, in ascending key order,
    /// whose key satisfies the predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new().insert("Dan".to_string(), 2);
    /// assert_eq!(map.find(|key| key.contains('a')), Some(&2));
    /// assert_eq!(map.find(|key| key.contains('b')), None);
    /// ```
    #[must_use]
    pub fn find<P>(&self, mut predicate: P) -> Option<&V>
    where
        P: FnMut(&K) -> bool,
    {
        self.iter()
            .find(|(key, _)| predicate(key))
            .map(|(_, value)| value)
    }

    /// Keeps only entries whose key satisfies the predicate.
    ///
    /// The result is rebuilt by folding over the in-order traversal, so
    /// its internal shape is independent of the source tree.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new().insert("Dan".to_string(), 2);
    /// assert_eq!(map.filter_keys(|key| key.contains('a')), map);
    /// assert!(map.filter_keys(|key| key.contains('b')).is_empty());
    /// ```
    #[must_use]
    pub fn filter_keys<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&K) -> bool,
    {
        self.iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Keeps only entries whose value satisfies the predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new().insert("Dan".to_string(), 2);
    /// assert_eq!(map.filter_values(|value| *value == 2), map);
    /// assert!(map.filter_values(|value| *value == 3).is_empty());
    /// ```
    #[must_use]
    pub fn filter_values<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&V) -> bool,
    {
        self.iter()
            .filter(|(_, value)| predicate(value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Applies a function to all values, keeping keys unchanged.
    ///
    /// The transform is structure-preserving: the result tree mirrors the
    /// source shape node for node, and values are visited in ascending
    /// key order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, 10)
    ///     .insert(2, 20);
    /// let doubled = map.map_values(|v| v * 2);
    /// assert_eq!(doubled.get(&1), Some(&20));
    /// assert_eq!(doubled.get(&2), Some(&40));
    /// ```
    #[must_use]
    pub fn map_values<W, F>(&self, mut transform: F) -> PersistentTreeMap<K, W>
    where
        W: Clone,
        F: FnMut(&V) -> W,
    {
        PersistentTreeMap {
            root: Node::map_node(self.root.as_ref(), &mut transform),
        }
    }

    /// Merges two maps, with entries from `other` taking precedence on
    /// key collisions.
    ///
    /// The merge is a tree join: it splits and re-joins whole subtrees
    /// rather than inserting entries one at a time, and shares any
    /// subtree that exists on only one side.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map1 = PersistentTreeMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// let map2 = PersistentTreeMap::new()
    ///     .insert(2, "TWO")
    ///     .insert(3, "three");
    /// let merged = map1.merge(&map2);
    /// assert_eq!(merged.get(&1), Some(&"one"));
    /// assert_eq!(merged.get(&2), Some(&"TWO")); // From map2
    /// assert_eq!(merged.get(&3), Some(&"three"));
    /// ```
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            root: Node::union(self.root.as_ref(), other.root.as_ref()),
        }
    }

    /// Folds the entries, in ascending key order, into a
    /// [`PersistentList`](super::PersistentList) of pairs.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(2, "Ray")
    ///     .insert(1, "Dan");
    /// let list = map.to_persistent_list();
    /// assert_eq!(list.head(), Some(&(1, "Dan")));
    /// assert_eq!(list.len(), 2);
    /// ```
    #[must_use]
    pub fn to_persistent_list(&self) -> super::PersistentList<(K, V)> {
        self.iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Returns an iterator over entries in ascending key order.
    ///
    /// The iterator is lazy (it holds an explicit descent stack rather
    /// than a materialized copy) and restartable: calling `iter` again
    /// yields a fresh traversal. Traversals never mutate the tree, so any
    /// number may run concurrently over any versions of the map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(3, "three")
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    ///
    /// let entries: Vec<(&i32, &&str)> = map.iter().collect();
    /// assert_eq!(entries[0], (&1, &"one"));
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentTreeMapIterator<'_, K, V> {
        let mut iterator = PersistentTreeMapIterator {
            stack: SmallVec::new(),
            remaining: self.len(),
        };
        iterator.descend_left(self.root.as_deref());
        iterator
    }

    /// Returns an iterator over keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values in ascending key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over key-value pairs of a [`PersistentTreeMap`] in
/// ascending key order.
pub struct PersistentTreeMapIterator<'a, K, V> {
    /// Nodes whose entry and right subtree are still pending, deepest
    /// (smallest) last. Depth is O(log N), so the stack rarely spills.
    stack: SmallVec<[&'a Node<K, V>; 12]>,
    remaining: usize,
}

impl<'a, K, V> PersistentTreeMapIterator<'a, K, V> {
    fn descend_left(&mut self, mut link: Option<&'a Node<K, V>>) {
        while let Some(node) = link {
            self.stack.push(node);
            link = node.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for PersistentTreeMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.descend_left(node.right.as_deref());
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentTreeMapIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for PersistentTreeMapIterator<'_, K, V> {}

/// An owning iterator over key-value pairs of a [`PersistentTreeMap`].
pub struct PersistentTreeMapIntoIterator<K, V> {
    entries: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for PersistentTreeMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for PersistentTreeMapIntoIterator<K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<K, V> FusedIterator for PersistentTreeMapIntoIterator<K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Default for PersistentTreeMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Ord, V: Clone> FromIterator<(K, V)> for PersistentTreeMap<K, V> {
    /// Builds a map by fold-inserting in iteration order; a later
    /// duplicate key overrides an earlier one.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map = map.insert(key, value);
        }
        map
    }
}

impl<K: Clone + Ord, V: Clone> IntoIterator for PersistentTreeMap<K, V> {
    type Item = (K, V);
    type IntoIter = PersistentTreeMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let entries: Vec<(K, V)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        PersistentTreeMapIntoIterator {
            entries: entries.into_iter(),
        }
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentTreeMap<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentTreeMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Clone + Ord, V: Clone + PartialEq> PartialEq for PersistentTreeMap<K, V> {
    /// Two maps are equal iff their in-order traversals are pairwise
    /// equal. Internal tree shape never participates: two differently
    /// balanced trees with the same content compare equal.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Clone + Ord, V: Clone + Eq> Eq for PersistentTreeMap<K, V> {}

impl<K, V> Hash for PersistentTreeMap<K, V>
where
    K: Clone + Ord + Hash,
    V: Clone + Hash,
{
    /// Hashes the length, then each entry in key order, so equal maps
    /// hash equally regardless of insertion order or internal shape.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for (key, value) in self {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl<K: Clone + Ord + fmt::Debug, V: Clone + fmt::Debug> fmt::Debug for PersistentTreeMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Clone + Ord + fmt::Display, V: Clone + fmt::Display> fmt::Display
    for PersistentTreeMap<K, V>
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for (key, value) in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V> serde::Serialize for PersistentTreeMap<K, V>
where
    K: serde::Serialize + Clone + Ord,
    V: serde::Serialize + Clone,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentTreeMapVisitor<K, V> {
    key_marker: std::marker::PhantomData<K>,
    value_marker: std::marker::PhantomData<V>,
}

#[cfg(feature = "serde")]
impl<K, V> PersistentTreeMapVisitor<K, V> {
    const fn new() -> Self {
        Self {
            key_marker: std::marker::PhantomData,
            value_marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::de::Visitor<'de> for PersistentTreeMapVisitor<K, V>
where
    K: serde::Deserialize<'de> + Clone + Ord,
    V: serde::Deserialize<'de> + Clone,
{
    type Value = PersistentTreeMap<K, V>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut map = PersistentTreeMap::new();
        while let Some((key, value)) = access.next_entry()? {
            map = map.insert(key, value);
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::Deserialize<'de> for PersistentTreeMap<K, V>
where
    K: serde::Deserialize<'de> + Clone + Ord,
    V: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PersistentTreeMapVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================
