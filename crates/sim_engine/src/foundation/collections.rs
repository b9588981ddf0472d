//! Specialized collection types

/// Fixed-capacity circular buffer with a wrap-around read cursor
///
/// Writes past capacity overwrite the oldest element. The read cursor is
/// independent of writes: [`RingBuffer::next`] yields the element under the
/// cursor and then advances, [`RingBuffer::previous`] steps back first and then
/// yields, so from a fresh buffer `previous()` returns the last element.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: Vec<T>,
    capacity: usize,
    /// Slot the next push overwrites once the buffer is full
    write: usize,
    cursor: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer holding at most `capacity` elements
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            write: 0,
            cursor: 0,
        }
    }

    /// Append an element, overwriting the oldest one when full
    pub fn push(&mut self, item: T) {
        if self.items.len() < self.capacity {
            self.items.push(item);
        } else {
            self.items[self.write] = item;
            self.write = (self.write + 1) % self.capacity;
        }
    }

    /// Element under the read cursor, then advance the cursor
    pub fn next(&mut self) -> Option<&T> {
        if self.items.is_empty() {
            return None;
        }
        let index = self.cursor % self.items.len();
        self.cursor = (index + 1) % self.items.len();
        self.items.get(index)
    }

    /// Step the read cursor back, then return the element under it
    pub fn previous(&mut self) -> Option<&T> {
        if self.items.is_empty() {
            return None;
        }
        let len = self.items.len();
        self.cursor = (self.cursor % len + len - 1) % len;
        self.items.get(self.cursor)
    }

    /// Move the read cursor back to the first slot
    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let (newer, older) = self.items.split_at(self.write.min(self.items.len()));
        older.iter().chain(newer.iter())
    }

    /// Most recently pushed element
    pub fn latest(&self) -> Option<&T> {
        if self.items.len() < self.capacity {
            self.items.last()
        } else {
            let index = (self.write + self.capacity - 1) % self.capacity;
            self.items.get(index)
        }
    }

    /// Number of stored elements
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of elements
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove every element and rewind both cursors
    pub fn clear(&mut self) {
        self.items.clear();
        self.write = 0;
        self.cursor = 0;
    }
}
