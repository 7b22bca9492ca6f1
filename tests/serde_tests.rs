#![cfg(feature = "serde")]

//! Integration tests for serde support in retrace.
//!
//! Every collection serializes the elements of its current version only.

use retrace::prelude::*;
use rstest::rstest;

// =============================================================================
// PersistentOrderedMap
// =============================================================================

#[rstest]
fn test_map_serializes_as_object_in_key_order() {
    let map: PersistentOrderedMap<String, i32> = [("b", 2), ("a", 1)]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
    assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"a":1,"b":2}"#);
}

#[rstest]
fn test_map_serializes_current_version() {
    let mut map = PersistentOrderedMap::new();
    map.put(1, "one");
    map.put(2, "two");
    map.undo();
    assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"1":"one"}"#);
}

#[rstest]
fn test_empty_map() {
    let map: PersistentOrderedMap<String, i32> = PersistentOrderedMap::new();
    assert_eq!(serde_json::to_string(&map).unwrap(), "{}");
}

// =============================================================================
// PersistentLinkedList
// =============================================================================

#[rstest]
fn test_list_serializes_as_sequence() {
    let mut list: PersistentLinkedList<i32> = (1..=4).collect();
    assert_eq!(serde_json::to_string(&list).unwrap(), "[1,2,3,4]");
    list.remove(0).unwrap();
    assert_eq!(serde_json::to_value(&list).unwrap(), serde_json::json!([2, 3, 4]));
}

// =============================================================================
// PersistentArray
// =============================================================================

#[rstest]
fn test_array_serializes_as_sequence() {
    let array = PersistentArray::new();
    array.push("x".to_string()).unwrap();
    array.push("y".to_string()).unwrap();
    assert_eq!(serde_json::to_string(&array).unwrap(), r#"["x","y"]"#);
}

#[rstest]
fn test_nested_arrays_serialize_recursively() {
    let parent = PersistentArray::new();
    for row in [[1, 2], [3, 4]] {
        let child = PersistentArray::new();
        for value in row {
            child.push(value).unwrap();
        }
        parent.push(child).unwrap();
    }
    assert_eq!(serde_json::to_string(&parent).unwrap(), "[[1,2],[3,4]]");
}
