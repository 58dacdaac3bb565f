//! Thread-safe memoization with explicit invalidation.
//!
//! This module provides [`MemoCell`], a cell that defers a computation
//! until first use, runs it at most once per generation no matter how
//! many threads race on it, and hands the cached result to every caller
//! thereafter. Unlike a one-shot lazy value, the recipe is retained, so
//! the cell can be told to [`forget`](MemoCell::forget) its value and a
//! later access starts a fresh generation.
//!
//! # State machine
//!
//! ```text
//!            force()                   force() / try_force()
//!   Empty ────────────► Computing ──────────────────────► Computed
//!     ▲                     │ recipe fails                    │
//!     ├─────────────────────┘ (nothing published)             │
//!     └───────────────────────────────────────────────────────┘
//!                            forget()
//! ```
//!
//! `Computing` is the write-lock critical section; callers that lose the
//! race block on the lock and then observe the published value, so the
//! recipe runs exactly once per generation.
//!
//! # Failure policy
//!
//! A failing computation is never cached. An `Err` from the recipe (or a
//! panic inside it) leaves the cell Empty, the failure propagates to the
//! caller that ran the recipe, and the next access simply tries again.
//! Callers waiting on the lock during a failed attempt find the slot
//! still empty and become the next ones to run the recipe.
//!
//! # Examples
//!
//! ```rust
//! use persimmon::control::MemoCell;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::thread;
//!
//! let runs = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&runs);
//! let cell = Arc::new(MemoCell::new(move || {
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     42
//! }));
//!
//! let handles: Vec<_> = (0..8)
//!     .map(|_| {
//!         let cell = Arc::clone(&cell);
//!         thread::spawn(move || cell.force())
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     assert_eq!(handle.join().unwrap(), 42);
//! }
//! // All eight callers shared a single evaluation
//! assert_eq!(runs.load(Ordering::SeqCst), 1);
//! ```

use parking_lot::RwLock;
use std::fmt;

/// A thread-safe memoization cell with explicit invalidation.
///
/// `MemoCell<T, F>` wraps a zero-argument recipe and computes it at most
/// once per generation. The first caller of [`force`](Self::force) runs
/// the recipe; concurrent callers block until the value is published and
/// then observe the same result. [`forget`](Self::forget) discards the
/// cached value (releasing whatever it owns) and returns the cell to the
/// unevaluated state, ready for a new generation.
///
/// `force` hands out clones of the cached value. The intended cargo is
/// cheaply clonable — the persistent collections in this crate, `Arc`ed
/// resources, small copyable values — so a clone costs a reference count
/// bump or a few bytes.
///
/// # Type Parameters
///
/// * `T` - The type of the computed value
/// * `F` - The type of the recipe (defaults to `fn() -> T`)
///
/// # Thread Safety
///
/// The cell is `Sync` when `T: Send + Sync` and `F: Sync`, and the whole
/// check-compute-publish sequence is guarded: the common already-computed
/// path takes only a read lock, the computing path takes the write lock
/// and re-checks the slot before running the recipe, so a caller that
/// raced and lost never recomputes.
///
/// The recipe must not call back into the same cell: a recursive
/// `force`/`forget` from inside the recipe deadlocks on the held write
/// lock.
///
/// # Examples
///
/// ```rust
/// use persimmon::control::MemoCell;
///
/// let cell = MemoCell::new(|| "expensive".to_string());
/// assert!(!cell.is_evaluated());
///
/// let value = cell.force();
/// assert_eq!(value, "expensive");
/// assert!(cell.is_evaluated());
///
/// cell.forget();
/// assert!(!cell.is_evaluated());
/// ```
pub struct MemoCell<T, F = fn() -> T> {
    /// The cached value; `None` is the Empty state.
    slot: RwLock<Option<T>>,
    /// The wrapped computation, retained across generations.
    recipe: F,
}

impl<T, F> MemoCell<T, F> {
    /// Returns `true` if the current generation has been computed.
    ///
    /// This never triggers the computation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::control::MemoCell;
    ///
    /// let cell = MemoCell::new(|| 42);
    /// assert!(!cell.is_evaluated());
    /// cell.force();
    /// assert!(cell.is_evaluated());
    /// ```
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Returns a clone of the cached value without triggering the
    /// computation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::control::MemoCell;
    ///
    /// let cell = MemoCell::new(|| 42);
    /// assert_eq!(cell.peek(), None);
    /// cell.force();
    /// assert_eq!(cell.peek(), Some(42));
    /// ```
    #[must_use]
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.slot.read().clone()
    }

    /// Discards the cached value, returning the cell to the unevaluated
    /// state. The next access runs the recipe again.
    ///
    /// The transition to Empty completes before the displaced value is
    /// dropped: even if releasing the value's resources panics, the cell
    /// is left consistently Empty, never in between. Calling `forget` on
    /// an unevaluated cell is a no-op.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::control::MemoCell;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// static RUNS: AtomicUsize = AtomicUsize::new(0);
    ///
    /// let cell = MemoCell::new(|| RUNS.fetch_add(1, Ordering::SeqCst));
    /// cell.force();
    /// cell.force();
    /// assert_eq!(RUNS.load(Ordering::SeqCst), 1);
    ///
    /// cell.forget();
    /// cell.force();
    /// assert_eq!(RUNS.load(Ordering::SeqCst), 2);
    /// ```
    pub fn forget(&self) {
        let mut slot = self.slot.write();
        let discarded = slot.take();
        drop(slot);
        // The cell is already Empty; dropping the value releases whatever
        // it owns, and a panicking destructor propagates from here.
        drop(discarded);
    }
}

impl<T, F: Fn() -> T> MemoCell<T, F> {
    /// Creates a new cell wrapping an infallible recipe.
    ///
    /// The recipe does not run until [`force`](Self::force) is called.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::control::MemoCell;
    ///
    /// let cell = MemoCell::new(|| {
    ///     println!("computing...");
    ///     42
    /// });
    /// // Nothing printed yet
    /// assert!(!cell.is_evaluated());
    /// ```
    #[inline]
    pub const fn new(recipe: F) -> Self {
        Self {
            slot: RwLock::new(None),
            recipe,
        }
    }

    /// Returns the memoized value, computing it on first use.
    ///
    /// The fast path takes only a read lock and clones the published
    /// value. Otherwise the caller takes the write lock, re-checks the
    /// slot (another caller may have computed it while this one waited),
    /// and only then runs the recipe and publishes the result.
    ///
    /// # Panics
    ///
    /// Propagates a panic from the recipe. Nothing is published in that
    /// case; the cell stays Empty and a later call runs the recipe again.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::control::MemoCell;
    ///
    /// let cell = MemoCell::new(|| 21 * 2);
    /// assert_eq!(cell.force(), 42);
    /// ```
    pub fn force(&self) -> T
    where
        T: Clone,
    {
        {
            let slot = self.slot.read();
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
        }

        let mut slot = self.slot.write();
        if let Some(value) = slot.as_ref() {
            return value.clone();
        }
        let value = (self.recipe)();
        *slot = Some(value.clone());
        value
    }
}

impl<T, E, F: Fn() -> Result<T, E>> MemoCell<T, F> {
    /// Creates a new cell wrapping a fallible recipe.
    ///
    /// Pair with [`try_force`](Self::try_force). Note that
    /// [`MemoCell::new`] with a `Result`-returning closure would cache
    /// the whole `Result`, failures included; `fallible` caches only
    /// successes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::control::MemoCell;
    ///
    /// let cell = MemoCell::fallible(|| "42".parse::<i32>());
    /// assert_eq!(cell.try_force(), Ok(42));
    /// ```
    #[inline]
    pub const fn fallible(recipe: F) -> Self {
        Self {
            slot: RwLock::new(None),
            recipe,
        }
    }

    /// Returns the memoized value, computing it on first use and
    /// propagating the recipe's failure.
    ///
    /// Uses the same double-checked protocol as [`force`](MemoCell::force).
    ///
    /// # Errors
    ///
    /// Returns whatever error the recipe returned. The error is not
    /// cached: the cell stays Empty and the next call runs the recipe
    /// again.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persimmon::control::MemoCell;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// static ATTEMPTS: AtomicUsize = AtomicUsize::new(0);
    ///
    /// let cell = MemoCell::fallible(|| {
    ///     if ATTEMPTS.fetch_add(1, Ordering::SeqCst) == 0 {
    ///         Err("transient outage")
    ///     } else {
    ///         Ok(42)
    ///     }
    /// });
    ///
    /// assert_eq!(cell.try_force(), Err("transient outage"));
    /// assert_eq!(cell.try_force(), Ok(42)); // retried and succeeded
    /// assert_eq!(cell.try_force(), Ok(42)); // cached, no third attempt
    /// assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 2);
    /// ```
    pub fn try_force(&self) -> Result<T, E>
    where
        T: Clone,
    {
        {
            let slot = self.slot.read();
            if let Some(value) = slot.as_ref() {
                return Ok(value.clone());
            }
        }

        let mut slot = self.slot.write();
        if let Some(value) = slot.as_ref() {
            return Ok(value.clone());
        }
        let value = (self.recipe)()?;
        *slot = Some(value.clone());
        Ok(value)
    }
}

impl<T: fmt::Debug, F> fmt::Debug for MemoCell<T, F> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot.read().as_ref() {
            Some(value) => formatter.debug_tuple("MemoCell").field(value).finish(),
            None => formatter.debug_tuple("MemoCell").field(&"<unevaluated>").finish(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[rstest]
    fn test_new_defers_computation() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let cell = MemoCell::new(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!cell.is_evaluated());
        assert_eq!(cell.peek(), None);
    }

    #[rstest]
    fn test_force_computes_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let cell = MemoCell::new(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert_eq!(cell.force(), 42);
        assert_eq!(cell.force(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn test_forget_starts_new_generation() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let cell = MemoCell::new(move || counter_clone.fetch_add(1, Ordering::SeqCst));

        assert_eq!(cell.force(), 0);
        cell.forget();
        assert!(!cell.is_evaluated());
        assert_eq!(cell.force(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[rstest]
    fn test_forget_on_empty_cell_is_noop() {
        let cell = MemoCell::new(|| 42);
        cell.forget();
        assert!(!cell.is_evaluated());
        assert_eq!(cell.force(), 42);
    }

    #[rstest]
    fn test_forget_drops_the_cached_value() {
        struct Guarded(Arc<AtomicUsize>);
        impl Drop for Guarded {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let drops_clone = Arc::clone(&drops);
        let cell = MemoCell::new(move || Arc::new(Guarded(Arc::clone(&drops_clone))));

        let value = cell.force();
        drop(value);
        assert_eq!(drops.load(Ordering::SeqCst), 0); // cell still holds it

        cell.forget();
        assert_eq!(drops.load(Ordering::SeqCst), 1); // released exactly once
    }

    #[rstest]
    fn test_try_force_caches_success() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let cell = MemoCell::fallible(move || -> Result<i32, String> {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        });

        assert_eq!(cell.try_force(), Ok(42));
        assert_eq!(cell.try_force(), Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn test_try_force_error_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = Arc::clone(&attempts);
        let cell = MemoCell::fallible(move || {
            if attempts_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("not yet")
            } else {
                Ok(42)
            }
        });

        assert_eq!(cell.try_force(), Err("not yet"));
        assert!(!cell.is_evaluated());
        assert_eq!(cell.try_force(), Err("not yet"));
        assert_eq!(cell.try_force(), Ok(42));
        assert_eq!(cell.try_force(), Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[rstest]
    fn test_panicking_recipe_leaves_cell_empty() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = Arc::clone(&attempts);
        let cell = MemoCell::new(move || {
            if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first attempt fails");
            }
            42
        });

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cell.force()));
        assert!(outcome.is_err());
        assert!(!cell.is_evaluated());

        assert_eq!(cell.force(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[rstest]
    fn test_debug_does_not_force() {
        let cell = MemoCell::new(|| 42);
        assert_eq!(format!("{cell:?}"), "MemoCell(\"<unevaluated>\")");
        assert!(!cell.is_evaluated());
        cell.force();
        assert_eq!(format!("{cell:?}"), "MemoCell(42)");
    }
}
