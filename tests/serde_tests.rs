#![cfg(all(feature = "serde", feature = "persistent"))]
//! Serde round-trip tests for the persistent collections.

use persimmon::persistent::{PersistentList, PersistentTreeMap};
use rstest::rstest;

#[rstest]
fn test_treemap_serializes_in_key_order() {
    let map = PersistentTreeMap::new()
        .insert(3, "three".to_string())
        .insert(1, "one".to_string())
        .insert(2, "two".to_string());

    let json = serde_json::to_string(&map).unwrap();
    assert_eq!(json, r#"{"1":"one","2":"two","3":"three"}"#);
}

#[rstest]
fn test_treemap_round_trip() {
    let map: PersistentTreeMap<i32, String> = (0..20)
        .map(|n| (n, format!("value-{n}")))
        .collect();

    let json = serde_json::to_string(&map).unwrap();
    let decoded: PersistentTreeMap<i32, String> = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, map);
}

#[rstest]
fn test_list_round_trip() {
    let list: PersistentList<i32> = (1..=5).collect();

    let json = serde_json::to_string(&list).unwrap();
    assert_eq!(json, "[1,2,3,4,5]");

    let decoded: PersistentList<i32> = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, list);
}
