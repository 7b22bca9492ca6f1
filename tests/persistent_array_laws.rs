//! Property-based tests for PersistentArray.
//!
//! Operations run against a narrow trie so that writes cross several levels,
//! and are checked against a stack of `Vec` snapshots.

use proptest::prelude::*;
use retrace::prelude::*;

#[derive(Clone, Debug)]
enum Operation {
    Push(i32),
    Set(usize, i32),
    Insert(usize, i32),
    Remove(usize),
    Pop,
    Clear,
    Undo,
    Redo,
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        5 => any::<i32>().prop_map(Operation::Push),
        2 => (0usize..20, any::<i32>()).prop_map(|(index, value)| Operation::Set(index, value)),
        2 => (0usize..20, any::<i32>()).prop_map(|(index, value)| Operation::Insert(index, value)),
        2 => (0usize..20).prop_map(Operation::Remove),
        1 => Just(Operation::Pop),
        1 => Just(Operation::Clear),
        3 => Just(Operation::Undo),
        2 => Just(Operation::Redo),
    ]
}

/// Undo and redo stacks of snapshots around the current state.
struct Model {
    undo: Vec<Vec<i32>>,
    current: Vec<i32>,
    redo: Vec<Vec<i32>>,
    capacity: usize,
}

impl Model {
    fn new(capacity: usize) -> Self {
        Self {
            undo: Vec::new(),
            current: Vec::new(),
            redo: Vec::new(),
            capacity,
        }
    }

    fn commit(&mut self, next: Vec<i32>) {
        self.undo.push(std::mem::replace(&mut self.current, next));
        self.redo.clear();
    }

    fn apply(&mut self, array: &PersistentArray<i32>, operation: &Operation) {
        let length = self.current.len();
        let full = length >= self.capacity;
        match *operation {
            Operation::Push(value) => {
                let result = array.push(value);
                assert_eq!(result.is_ok(), !full);
                if !full {
                    let mut next = self.current.clone();
                    next.push(value);
                    self.commit(next);
                }
            }
            Operation::Set(index, value) => {
                let result = array.set(index, value);
                if index < length {
                    let mut next = self.current.clone();
                    assert_eq!(result, Ok(std::mem::replace(&mut next[index], value)));
                    self.commit(next);
                } else {
                    assert!(result.is_err());
                }
            }
            Operation::Insert(index, value) => {
                let result = array.insert(index, value);
                let valid = index < length && !full;
                assert_eq!(result.is_ok(), valid);
                if valid {
                    let mut next = self.current.clone();
                    next.insert(index, value);
                    self.commit(next);
                }
            }
            Operation::Remove(index) => {
                let result = array.remove(index);
                if index < length {
                    let mut next = self.current.clone();
                    assert_eq!(result, Ok(next.remove(index)));
                    self.commit(next);
                } else {
                    assert!(result.is_err());
                }
            }
            Operation::Pop => {
                let result = array.pop();
                let mut next = self.current.clone();
                match next.pop() {
                    Some(last) => {
                        assert_eq!(result, Ok(last));
                        self.commit(next);
                    }
                    None => assert_eq!(result, Err(PersistentError::EmptyCollection)),
                }
            }
            Operation::Clear => {
                array.clear();
                self.commit(Vec::new());
            }
            Operation::Undo => {
                array.undo();
                if let Some(previous) = self.undo.pop() {
                    self.redo.push(std::mem::replace(&mut self.current, previous));
                }
            }
            Operation::Redo => {
                array.redo();
                if let Some(next) = self.redo.pop() {
                    self.undo.push(std::mem::replace(&mut self.current, next));
                }
            }
        }
    }
}

fn narrow() -> PersistentArray<i32> {
    PersistentArray::with_shape(TrieShape::new(4, 1).unwrap())
}

proptest! {
    #[test]
    fn prop_current_version_matches_model(operations in prop::collection::vec(operation(), 0..100)) {
        let array = narrow();
        let mut model = Model::new(array.capacity());
        for operation in &operations {
            model.apply(&array, operation);
            prop_assert_eq!(&array.to_vec(), &model.current);
            prop_assert_eq!(array.len(), model.current.len());
            prop_assert_eq!(
                array.version_count(),
                model.undo.len() + 1 + model.redo.len()
            );
        }
    }

    #[test]
    fn prop_branches_do_not_interfere(
        base in prop::collection::vec(any::<i32>(), 1..12),
        value in any::<i32>(),
        index in 0usize..12,
    ) {
        let array = narrow();
        for element in &base {
            array.push(*element).unwrap();
        }
        let index = index % base.len();

        let assoc = array.assoc(index, value).unwrap();
        let conj = array.conj(value).unwrap();
        prop_assert_eq!(&array.to_vec(), &base);

        let mut expected = base.clone();
        expected[index] = value;
        prop_assert_eq!(assoc.to_vec(), expected);

        let mut expected = base.clone();
        expected.push(value);
        prop_assert_eq!(conj.to_vec(), expected);
    }

    #[test]
    fn prop_get_agrees_with_iteration(elements in prop::collection::vec(any::<i32>(), 0..16)) {
        let array = narrow();
        for element in &elements {
            array.push(*element).unwrap();
        }
        for (index, element) in elements.iter().enumerate() {
            prop_assert_eq!(array.get(index), Ok(*element));
        }
        prop_assert!(array.get(elements.len()).is_err());
    }
}
