use std::collections::VecDeque;

/// Fixed-capacity FIFO retaining the most recent items. Appending beyond
/// capacity evicts the eldest entry. A capacity of zero retains nothing.
pub(crate) struct SlidingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> SlidingBuffer<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub(crate) fn append(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Iterates the retained items in insertion order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retains_in_insertion_order() {
        let mut buffer = SlidingBuffer::new(3);
        buffer.append(1);
        buffer.append(2);
        let items: Vec<i32> = buffer.iter().copied().collect();
        assert_eq!(vec![1, 2], items);
    }

    #[test]
    fn test_evicts_eldest_at_capacity() {
        let mut buffer = SlidingBuffer::new(3);
        for i in 1..=5 {
            buffer.append(i);
        }
        let items: Vec<i32> = buffer.iter().copied().collect();
        assert_eq!(vec![3, 4, 5], items);
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let mut buffer = SlidingBuffer::new(0);
        buffer.append(1);
        assert_eq!(0, buffer.iter().count());
    }
}
