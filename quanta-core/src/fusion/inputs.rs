//! Positional view of a fusion's source values.

use std::ops::Index;

/// Source values handed to a fusion's compute function, in source order.
///
/// Indexing panics on an empty source. Strategies that can run with empty
/// sources (`any`, `weak`) should use [`Inputs::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct Inputs<T> {
    values: Vec<Option<T>>,
}

impl<T> Inputs<T> {
    pub fn new(values: Vec<Option<T>>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Every slot, empty ones included.
    pub fn iter(&self) -> impl Iterator<Item = Option<&T>> {
        self.values.iter().map(Option::as_ref)
    }

    /// Only the slots that hold a value.
    pub fn present(&self) -> impl Iterator<Item = &T> {
        self.values.iter().flatten()
    }

    pub fn all_present(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }

    pub fn into_vec(self) -> Vec<Option<T>> {
        self.values
    }
}

impl<T> Index<usize> for Inputs<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic!("fusion input {index} has no value"),
        }
    }
}
