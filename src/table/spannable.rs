//! Growable contiguous buffer with slice access for bulk I/O.
//!
//! `SpannableList` grows by ~1.4x per step (`next = cap * 1.4 + 1`).

use crate::error::{Result, TableError};

/// Default initial capacity for tables and buffers.
pub const DEFAULT_CAPACITY: usize = 100;

const GROWTH_FACTOR: f64 = 1.4;

/// Resizable array exposing its live elements as one contiguous slice.
#[derive(Debug, Clone)]
pub struct SpannableList<T> {
    elements: Vec<T>,
}

impl<T: Copy + Default> SpannableList<T> {
    pub fn new() -> Self {
        Self {
            elements: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Create a list with room for `capacity` elements. Zero is rejected.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(TableError::InvalidCapacity(capacity));
        }
        Ok(Self {
            elements: Vec::with_capacity(capacity),
        })
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.elements.capacity()
    }

    /// Grow capacity to at least `capacity`. Never shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        if capacity > self.capacity() {
            self.ensure_capacity(capacity - self.len());
        }
    }

    fn ensure_capacity(&mut self, additional: usize) {
        let needed = self.len() + additional;
        let current = self.capacity();
        if needed <= current {
            return;
        }

        let mut next = current;
        while needed > next {
            next = (next as f64 * GROWTH_FACTOR) as usize + 1;
        }
        tracing::debug!(from = current, to = next, "SpannableList growing");
        self.elements.reserve_exact(next - self.len());
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len() {
            return Err(TableError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<T> {
        self.check_index(index)?;
        Ok(self.elements[index])
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        self.check_index(index)?;
        self.elements[index] = value;
        Ok(())
    }

    pub fn push(&mut self, value: T) {
        self.ensure_capacity(1);
        self.elements.push(value);
    }

    pub fn extend_from_slice(&mut self, values: &[T]) {
        self.ensure_capacity(values.len());
        self.elements.extend_from_slice(values);
    }

    /// Append `count` copies of `value`.
    pub fn fill(&mut self, count: usize, value: T) {
        self.ensure_capacity(count);
        let new_len = self.len() + count;
        self.elements.resize(new_len, value);
    }

    /// Drop all elements, keeping the allocation.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// The live elements.
    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.elements
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }
}

impl<T: Copy + Default> Default for SpannableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default> From<Vec<T>> for SpannableList<T> {
    fn from(elements: Vec<T>) -> Self {
        Self { elements }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        let err = SpannableList::<i32>::with_capacity(0).unwrap_err();
        assert!(matches!(err, TableError::InvalidCapacity(0)));
    }

    #[test]
    fn test_push_and_get() {
        let mut list = SpannableList::with_capacity(1).unwrap();
        list.push(1);
        list.push(2);
        list.push(3);
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(0).unwrap(), 1);
        assert_eq!(list.get(2).unwrap(), 3);
        assert_eq!(list.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn test_out_of_range() {
        let mut list = SpannableList::<u32>::new();
        list.push(5);
        let err = list.get(1).unwrap_err();
        assert!(matches!(err, TableError::IndexOutOfRange { index: 1, len: 1 }));
        assert!(list.set(3, 0).is_err());
    }

    #[test]
    fn test_set() {
        let mut list = SpannableList::<u32>::new();
        list.fill(3, 0);
        list.set(1, 42).unwrap();
        assert_eq!(list.as_slice(), &[0, 42, 0]);
    }

    #[test]
    fn test_fill_grows() {
        let mut list = SpannableList::with_capacity(2).unwrap();
        list.fill(1000, 7u8);
        assert_eq!(list.len(), 1000);
        assert!(list.capacity() >= 1000);
        assert!(list.iter().all(|&b| b == 7));
    }

    #[test]
    fn test_extend_from_slice() {
        let mut list = SpannableList::with_capacity(1).unwrap();
        list.extend_from_slice(&[1u32, 2, 3, 4, 5]);
        list.extend_from_slice(&[]);
        assert_eq!(list.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_capacity_never_shrinks() {
        let mut list = SpannableList::<u64>::with_capacity(10).unwrap();
        list.set_capacity(500);
        let grown = list.capacity();
        assert!(grown >= 500);
        list.set_capacity(5);
        assert_eq!(list.capacity(), grown);
        list.clear();
        assert_eq!(list.len(), 0);
        assert_eq!(list.capacity(), grown);
    }

    #[test]
    fn test_growth_is_not_doubling() {
        let mut list = SpannableList::<u8>::with_capacity(100).unwrap();
        list.fill(101, 0);
        // 100 * 1.4 + 1
        assert!(list.capacity() < 200, "capacity {}", list.capacity());
    }
}
