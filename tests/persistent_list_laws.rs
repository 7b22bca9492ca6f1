//! Property-based tests for PersistentLinkedList.
//!
//! Random positional operations, undo and redo included, are replayed
//! against a history of `Vec` snapshots.

use proptest::prelude::*;
use retrace::prelude::*;

#[derive(Clone, Debug)]
enum Operation {
    Push(i16),
    Insert(usize, i16),
    Set(usize, i16),
    Remove(usize),
    Clear,
    Undo,
    Redo,
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        4 => any::<i16>().prop_map(Operation::Push),
        2 => (0usize..12, any::<i16>()).prop_map(|(index, value)| Operation::Insert(index, value)),
        2 => (0usize..12, any::<i16>()).prop_map(|(index, value)| Operation::Set(index, value)),
        2 => (0usize..12).prop_map(Operation::Remove),
        1 => Just(Operation::Clear),
        3 => Just(Operation::Undo),
        2 => Just(Operation::Redo),
    ]
}

struct Model {
    history: Vec<Vec<i16>>,
    current: usize,
}

impl Model {
    fn new() -> Self {
        Self {
            history: vec![Vec::new()],
            current: 0,
        }
    }

    fn state(&self) -> &Vec<i16> {
        &self.history[self.current]
    }

    fn commit(&mut self, next: Vec<i16>) {
        self.history.truncate(self.current + 1);
        self.history.push(next);
        self.current += 1;
    }

    fn apply(&mut self, list: &mut PersistentLinkedList<i16>, operation: &Operation) {
        let length = self.state().len();
        match *operation {
            Operation::Push(value) => {
                list.push_back(value);
                let mut next = self.state().clone();
                next.push(value);
                self.commit(next);
            }
            Operation::Insert(index, value) => {
                let result = list.insert(index, value);
                assert_eq!(result.is_ok(), index < length);
                if index < length {
                    let mut next = self.state().clone();
                    next.insert(index, value);
                    self.commit(next);
                }
            }
            Operation::Set(index, value) => {
                let result = list.set(index, value);
                if index < length {
                    let mut next = self.state().clone();
                    let previous = std::mem::replace(&mut next[index], value);
                    assert_eq!(result, Ok(previous));
                    self.commit(next);
                } else {
                    assert!(result.is_err());
                }
            }
            Operation::Remove(index) => {
                let result = list.remove(index);
                if index < length {
                    let mut next = self.state().clone();
                    let removed = next.remove(index);
                    assert_eq!(result, Ok(removed));
                    self.commit(next);
                } else {
                    assert!(result.is_err());
                }
            }
            Operation::Clear => {
                list.clear();
                self.commit(Vec::new());
            }
            Operation::Undo => {
                list.undo();
                self.current = self.current.saturating_sub(1);
            }
            Operation::Redo => {
                list.redo();
                self.current = (self.current + 1).min(self.history.len() - 1);
            }
        }
    }
}

proptest! {
    #[test]
    fn prop_current_version_matches_model(operations in prop::collection::vec(operation(), 0..80)) {
        let mut list = PersistentLinkedList::new();
        let mut model = Model::new();
        for operation in &operations {
            model.apply(&mut list, operation);
            prop_assert_eq!(list.current_version(), model.current);
            prop_assert_eq!(&list.to_vec(), model.state());
            prop_assert_eq!(list.len(), model.state().len());
        }
    }

    #[test]
    fn prop_every_version_matches_model(operations in prop::collection::vec(operation(), 0..80)) {
        let mut list = PersistentLinkedList::new();
        let mut model = Model::new();
        for operation in &operations {
            model.apply(&mut list, operation);
        }
        prop_assert_eq!(list.last_version(), model.history.len() - 1);
        for (version, state) in model.history.iter().enumerate() {
            prop_assert_eq!(list.to_vec_at(version), Some(state.clone()));
            for (index, value) in state.iter().enumerate() {
                prop_assert_eq!(list.get_at(index, version), Some(*value));
            }
        }
    }

    #[test]
    fn prop_index_of_matches_position(values in prop::collection::vec(0i16..5, 0..20), needle in 0i16..5) {
        let list: PersistentLinkedList<i16> = values.iter().copied().collect();
        prop_assert_eq!(list.index_of(&needle), values.iter().position(|value| *value == needle));
        prop_assert_eq!(list.last_index_of(&needle), values.iter().rposition(|value| *value == needle));
    }
}
