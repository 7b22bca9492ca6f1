//! Property-based tests for PersistentOrderedMap.
//!
//! Random operation sequences, undo and redo included, are replayed against
//! a history of `BTreeMap` snapshots; the persistent map must agree with the
//! model on the current version and on every version still reachable.

use std::collections::BTreeMap;

use proptest::prelude::*;
use retrace::prelude::*;

// =============================================================================
// Model
// =============================================================================

#[derive(Clone, Debug)]
enum Operation {
    Put(u8, i32),
    Remove(u8),
    Clear,
    Undo,
    Redo,
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        6 => (any::<u8>(), any::<i32>()).prop_map(|(key, value)| Operation::Put(key % 32, value)),
        3 => any::<u8>().prop_map(|key| Operation::Remove(key % 32)),
        1 => Just(Operation::Clear),
        3 => Just(Operation::Undo),
        2 => Just(Operation::Redo),
    ]
}

/// Linear history of model states: `history[v]` is the state of version `v`.
struct Model {
    history: Vec<BTreeMap<u8, i32>>,
    current: usize,
}

impl Model {
    fn new() -> Self {
        Self {
            history: vec![BTreeMap::new()],
            current: 0,
        }
    }

    fn state(&self) -> &BTreeMap<u8, i32> {
        &self.history[self.current]
    }

    fn commit(&mut self, next: BTreeMap<u8, i32>) {
        self.history.truncate(self.current + 1);
        self.history.push(next);
        self.current += 1;
    }

    fn apply(&mut self, map: &mut PersistentOrderedMap<u8, i32>, operation: &Operation) {
        match *operation {
            Operation::Put(key, value) => {
                let mut next = self.state().clone();
                let expected = next.insert(key, value);
                assert_eq!(map.put(key, value), expected);
                self.commit(next);
            }
            Operation::Remove(key) => {
                let mut next = self.state().clone();
                let expected = next.remove(&key);
                assert_eq!(map.remove(&key), expected);
                if expected.is_some() {
                    self.commit(next);
                }
            }
            Operation::Clear => {
                map.clear();
                self.commit(BTreeMap::new());
            }
            Operation::Undo => {
                map.undo();
                self.current = self.current.saturating_sub(1);
            }
            Operation::Redo => {
                map.redo();
                self.current = (self.current + 1).min(self.history.len() - 1);
            }
        }
    }
}

fn entries(state: &BTreeMap<u8, i32>) -> Vec<(u8, i32)> {
    state.iter().map(|(key, value)| (*key, *value)).collect()
}

// =============================================================================
// Laws
// =============================================================================

proptest! {
    /// The current version always equals the model state.
    #[test]
    fn prop_current_version_matches_model(operations in prop::collection::vec(operation(), 0..80)) {
        let mut map = PersistentOrderedMap::new();
        let mut model = Model::new();
        for operation in &operations {
            model.apply(&mut map, operation);
            prop_assert_eq!(map.current_version(), model.current);
            prop_assert_eq!(map.len(), model.state().len());
            prop_assert_eq!(map.iter().collect::<Vec<_>>(), entries(model.state()));
        }
    }

    /// Every reachable version still reads as it was written, however many
    /// writes after undo happened since.
    #[test]
    fn prop_every_version_matches_model(operations in prop::collection::vec(operation(), 0..80)) {
        let mut map = PersistentOrderedMap::new();
        let mut model = Model::new();
        for operation in &operations {
            model.apply(&mut map, operation);
        }
        prop_assert_eq!(map.last_version(), model.history.len() - 1);
        for (version, state) in model.history.iter().enumerate() {
            prop_assert_eq!(map.entries_at(version), Some(entries(state)));
            for key in 0..32u8 {
                prop_assert_eq!(map.get_at(&key, version), state.get(&key).copied());
            }
        }
    }

    /// n undos followed by n redos restore the state exactly.
    #[test]
    fn prop_undo_redo_round_trip(
        entries_in in prop::collection::vec((any::<u8>(), any::<i32>()), 1..40),
        steps in 0usize..40,
    ) {
        let mut map: PersistentOrderedMap<u8, i32> = entries_in.into_iter().collect();
        let before: Vec<(u8, i32)> = map.iter().collect();
        let steps = steps.min(map.current_version());
        for _ in 0..steps {
            map.undo();
        }
        for _ in 0..steps {
            map.redo();
        }
        prop_assert_eq!(map.iter().collect::<Vec<_>>(), before);
    }

    /// Memoized and plain maps agree under any operation sequence.
    #[test]
    fn prop_memoization_is_transparent(operations in prop::collection::vec(operation(), 0..60)) {
        let mut plain = PersistentOrderedMap::new();
        let mut memoized = PersistentOrderedMap::with_memoization();
        let mut plain_model = Model::new();
        let mut memoized_model = Model::new();
        for operation in &operations {
            plain_model.apply(&mut plain, operation);
            memoized_model.apply(&mut memoized, operation);
            prop_assert_eq!(plain.entries().to_vec(), memoized.entries().to_vec());
        }
    }
}
