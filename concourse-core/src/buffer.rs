//! Fixed-Size Circular Buffer for Evidence History
//!
//! ## Overview
//!
//! Calibration keeps the last 100 samples per beacon and drift tracking keeps
//! a rolling day of drift records. Both are sliding windows where recent data
//! matters more than old data, so this buffer overwrites the oldest entry when
//! full instead of rejecting the write.
//!
//! Capacity is a const generic so the storage is inline:
//!
//! ```text
//! CircularBuffer<T, 5> after 7 pushes (a..g):
//! ┌───┬───┬───┬───┬───┐
//! │ f │ g │ c │ d │ e │   physical slots
//! └───┴───┴───┴───┴───┘
//!           ↑
//!           └── write_pos = 2, oldest = c
//! logical view (oldest → newest): c d e f g
//! ```
//!
//! Besides overwrite-on-full, windows also expire by age; [`CircularBuffer::evict_while`]
//! drops entries from the old end while a predicate holds.
//!
//! ## Usage Example
//!
//! ```rust
//! use concourse_core::buffer::CircularBuffer;
//!
//! let mut history: CircularBuffer<u64, 3> = CircularBuffer::new();
//! for t in [100, 200, 300, 400] {
//!     history.push(t);
//! }
//! assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![200, 300, 400]);
//!
//! // Expire everything older than 250
//! history.evict_while(|t| *t < 250);
//! assert_eq!(history.len(), 2);
//! ```

/// Fixed-size circular buffer for time-ordered records
///
/// ## Internal Invariants
///
/// - `write_pos < N` (next write position is always valid)
/// - `len <= N`
/// - Logical index 0 is the oldest record, `len - 1` the newest
///
/// This type is not thread-safe; owners wrap it as needed.
#[derive(Clone, Debug)]
pub struct CircularBuffer<T: Copy, const N: usize> {
    /// Storage array using Option for uninitialized slots
    data: [Option<T>; N],

    /// Index where the next write will occur
    write_pos: usize,

    /// Current number of valid records
    len: usize,
}

impl<T: Copy, const N: usize> CircularBuffer<T, N> {
    /// Creates a new empty circular buffer
    pub const fn new() -> Self {
        Self {
            data: [None; N],
            write_pos: 0,
            len: 0,
        }
    }

    /// Adds a record, overwriting the oldest when full
    pub fn push(&mut self, item: T) {
        if N == 0 {
            return;
        }

        self.data[self.write_pos] = Some(item);
        self.write_pos = (self.write_pos + 1) % N;

        if self.len < N {
            self.len += 1;
        }
    }

    /// Get number of stored records
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Maximum number of records held
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Get the most recent record
    pub fn last(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.get(self.len - 1)
    }

    /// Get the oldest record
    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    /// Removes and returns the oldest record
    pub fn pop_oldest(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let idx = self.oldest_index();
        let item = self.data[idx].take();
        self.len -= 1;
        item
    }

    /// Drops records from the oldest end while `predicate` holds
    ///
    /// Returns the number of records removed. Because records are kept in
    /// insertion order, expiring by age only ever needs to look at the front.
    pub fn evict_while<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut removed = 0;
        while let Some(oldest) = self.first() {
            if !predicate(oldest) {
                break;
            }
            self.pop_oldest();
            removed += 1;
        }
        removed
    }

    /// Iterate over records from oldest to newest
    pub fn iter(&self) -> CircularBufferIter<'_, T, N> {
        CircularBufferIter {
            buffer: self,
            index: 0,
        }
    }

    /// Clear all records
    pub fn clear(&mut self) {
        self.data = [None; N];
        self.write_pos = 0;
        self.len = 0;
    }

    fn oldest_index(&self) -> usize {
        (self.write_pos + N - self.len) % N
    }

    /// Gets a record by logical index (0 = oldest, len-1 = newest)
    fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }

        let actual_index = (self.oldest_index() + index) % N;
        self.data[actual_index].as_ref()
    }
}

/// Iterator over circular buffer contents
pub struct CircularBufferIter<'a, T: Copy, const N: usize> {
    buffer: &'a CircularBuffer<T, N>,
    index: usize,
}

impl<'a, T: Copy, const N: usize> Iterator for CircularBufferIter<'a, T, N> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.buffer.get(self.index)?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.buffer.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<T: Copy, const N: usize> Default for CircularBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn empty_buffer() {
        let buffer: CircularBuffer<u32, 5> = CircularBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert!(buffer.last().is_none());
        assert!(buffer.first().is_none());
    }

    #[test]
    fn circular_overwrite() {
        let mut buffer = CircularBuffer::<u32, 3>::new();

        for i in 0..5 {
            buffer.push(i);
        }

        assert_eq!(buffer.len(), 3);
        assert!(buffer.is_full());

        // Oldest 0, 1 were overwritten
        let values: Vec<u32> = buffer.iter().copied().collect();
        assert_eq!(values, vec![2, 3, 4]);
        assert_eq!(buffer.first(), Some(&2));
        assert_eq!(buffer.last(), Some(&4));
    }

    #[test]
    fn pop_oldest_then_push_keeps_order() {
        let mut buffer = CircularBuffer::<u32, 4>::new();
        for i in 0..6 {
            buffer.push(i);
        }
        assert_eq!(buffer.pop_oldest(), Some(2));
        assert_eq!(buffer.len(), 3);

        buffer.push(6);
        let values: Vec<u32> = buffer.iter().copied().collect();
        assert_eq!(values, vec![3, 4, 5, 6]);
    }

    #[test]
    fn evict_while_expires_from_front() {
        let mut buffer = CircularBuffer::<u64, 8>::new();
        for t in [100, 200, 300, 400, 500] {
            buffer.push(t);
        }

        let removed = buffer.evict_while(|t| *t < 350);
        assert_eq!(removed, 3);

        let values: Vec<u64> = buffer.iter().copied().collect();
        assert_eq!(values, vec![400, 500]);

        // Nothing left to expire
        assert_eq!(buffer.evict_while(|t| *t < 350), 0);
    }

    #[test]
    fn clear_resets() {
        let mut buffer = CircularBuffer::<u8, 2>::new();
        buffer.push(1);
        buffer.push(2);
        buffer.clear();
        assert!(buffer.is_empty());
        buffer.push(9);
        assert_eq!(buffer.last(), Some(&9));
    }
}
