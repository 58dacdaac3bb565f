#![cfg(feature = "persistent")]
//! Unit tests for `PersistentList`.

use persimmon::persistent::PersistentList;
use rstest::rstest;

// =============================================================================
// Construction
// =============================================================================

#[rstest]
fn test_new_creates_empty_list() {
    let list: PersistentList<i32> = PersistentList::new();
    assert!(list.is_empty());
    assert_eq!(list.len(), 0);
}

#[rstest]
fn test_singleton() {
    let list = PersistentList::singleton(42);
    assert_eq!(list.len(), 1);
    assert_eq!(list.head(), Some(&42));
}

#[rstest]
fn test_collect_keeps_order() {
    let list: PersistentList<i32> = (1..=5).collect();
    let collected: Vec<&i32> = list.iter().collect();
    assert_eq!(collected, vec![&1, &2, &3, &4, &5]);
}

// =============================================================================
// Cons, Head, Tail
// =============================================================================

#[rstest]
fn test_cons_is_constant_space_prepend() {
    let list = PersistentList::new().cons(3).cons(2).cons(1);
    assert_eq!(list.head(), Some(&1));
    assert_eq!(list.len(), 3);
}

#[rstest]
fn test_derived_lists_share_suffix() {
    let base = PersistentList::new().cons(3).cons(2);
    let extended_one = base.cons(1);
    let extended_zero = base.cons(0);

    // Both derivations see the same suffix, and the base is untouched
    assert_eq!(base.len(), 2);
    assert_eq!(extended_one.tail(), base);
    assert_eq!(extended_zero.tail(), base);
}

#[rstest]
fn test_uncons_decomposes() {
    let list: PersistentList<i32> = (1..=3).collect();
    let (head, tail) = list.uncons().unwrap();
    assert_eq!(*head, 1);
    assert_eq!(tail, (2..=3).collect());

    let empty: PersistentList<i32> = PersistentList::new();
    assert!(empty.uncons().is_none());
}

// =============================================================================
// Queries
// =============================================================================

#[rstest]
fn test_get_by_index() {
    let list: PersistentList<i32> = (10..=12).collect();
    assert_eq!(list.get(0), Some(&10));
    assert_eq!(list.get(2), Some(&12));
    assert_eq!(list.get(3), None);
}

#[rstest]
fn test_contains() {
    let list: PersistentList<&str> = ["Dan", "Ray", "Stu"].into_iter().collect();
    assert!(list.contains(&"Ray"));
    assert!(!list.contains(&"Matt"));
}

#[rstest]
fn test_len_matches_iteration() {
    let list: PersistentList<i32> = (0..17).collect();
    assert_eq!(list.len(), list.iter().count());
    assert_eq!(list.tail().len(), list.tail().iter().count());
}

// =============================================================================
// Reverse and Append
// =============================================================================

#[rstest]
fn test_reverse() {
    let list: PersistentList<i32> = (1..=4).collect();
    let reversed = list.reverse();
    let collected: Vec<&i32> = reversed.iter().collect();
    assert_eq!(collected, vec![&4, &3, &2, &1]);
    // reversing twice round-trips
    assert_eq!(reversed.reverse(), list);
}

#[rstest]
fn test_append() {
    let front: PersistentList<i32> = (1..=2).collect();
    let back: PersistentList<i32> = (3..=4).collect();
    let combined = front.append(&back);

    assert_eq!(combined.len(), 4);
    assert_eq!(combined, (1..=4).collect());
    // operands unchanged
    assert_eq!(front.len(), 2);
    assert_eq!(back.len(), 2);
}

#[rstest]
fn test_append_empty_is_identity() {
    let list: PersistentList<i32> = (1..=3).collect();
    let empty = PersistentList::new();
    assert_eq!(list.append(&empty), list);
    assert_eq!(empty.append(&list), list);
}

// =============================================================================
// Trait Surface
// =============================================================================

#[rstest]
fn test_equality_is_by_content() {
    let built: PersistentList<i32> = (1..=3).collect();
    let consed = PersistentList::new().cons(3).cons(2).cons(1);
    assert_eq!(built, consed);
    assert_ne!(built, built.tail());
}

#[rstest]
fn test_into_iterator_owned() {
    let list: PersistentList<String> =
        ["a".to_string(), "b".to_string()].into_iter().collect();
    let owned: Vec<String> = list.into_iter().collect();
    assert_eq!(owned, vec!["a".to_string(), "b".to_string()]);
}

#[rstest]
fn test_debug_and_display() {
    let list: PersistentList<i32> = (1..=3).collect();
    assert_eq!(format!("{list:?}"), "[1, 2, 3]");
    assert_eq!(format!("{list}"), "[1, 2, 3]");
}
