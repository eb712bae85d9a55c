use std::cmp::min;
use std::ops::Index;

use crate::utils::MyHash;

#[derive(Clone)]
struct Entry<T> {
    value: T,
    next: usize,
    occupied: bool,
}

impl<T: Default> Default for Entry<T> {
    fn default() -> Self {
        Self {
            value: T::default(),
            next: 0,
            occupied: false,
        }
    }
}

/// Hash-consing table: every distinct value is stored exactly once.
///
/// Values are chained in buckets selected by [`MyHash`]. Index 0 is a
/// sentinel and never holds a value, so `0` doubles as the "no next" marker.
pub struct Table<T> {
    data: Vec<Entry<T>>,

    buckets: Vec<usize>,
    bitmask: u64,

    /// Index of the first *possibly* free (non-occupied) cell.
    min_free: usize,
    /// Index of the last occupied cell.
    last_index: usize,
    /// Number of occupied cells.
    real_size: usize,
}

impl<T: Default> Table<T> {
    /// Create a new table with initial capacity `2^bits`.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Storage bits should be in the range 0..=31");

        let capacity = 1 << bits;
        let mut data: Vec<Entry<T>> = Vec::with_capacity(capacity);
        data.resize_with(capacity, Entry::default);
        data[0].occupied = true; // sentry

        let buckets_bits = min(bits, 16);
        let buckets_size = 1 << buckets_bits;

        Self {
            data,
            buckets: vec![0; buckets_size],
            bitmask: (buckets_size - 1) as u64,
            min_free: 1,
            last_index: 0,
            real_size: 0,
        }
    }

    /// Allocate a new cell and return its index, growing the storage if needed.
    fn alloc(&mut self) -> usize {
        let index = (self.min_free..=self.last_index)
            .find(|&i| !self.data[i].occupied)
            .unwrap_or_else(|| {
                self.last_index += 1;
                self.last_index
            });

        if index >= self.capacity() {
            let new_capacity = (self.capacity() * 2).max(2);
            log::debug!("Growing table from {} to {} cells", self.capacity(), new_capacity);
            self.data.resize_with(new_capacity, Entry::default);
        }

        self.data[index].occupied = true;
        self.min_free = index + 1;
        self.real_size += 1;

        index
    }

    fn add(&mut self, value: T) -> usize {
        let index = self.alloc();
        self.data[index].value = value;
        self.data[index].next = 0;
        index
    }
}

impl<T> Table<T> {
    /// Get the number of allocated cells.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
    /// Get the number of occupied cells.
    pub fn real_size(&self) -> usize {
        self.real_size
    }

    /// Get the reference to the value at the given index.
    pub fn value(&self, index: usize) -> &T {
        assert_ne!(index, 0, "Index is 0");
        &self.data[index].value
    }

    /// Get the index of the next cell in the same bucket.
    pub fn next(&self, index: usize) -> usize {
        assert_ne!(index, 0, "Index is 0");
        self.data[index].next
    }
}

impl<T> Table<T>
where
    T: MyHash + Eq + Default,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    /// Put a value into the table and return its index.
    ///
    /// If an equal value is already stored, its index is returned instead.
    pub fn put(&mut self, value: T) -> usize {
        let bucket_index = self.bucket_index(&value);
        let mut index = self.buckets[bucket_index];

        if index == 0 {
            let i = self.add(value);
            self.buckets[bucket_index] = i;
            return i;
        }

        loop {
            if &value == self.value(index) {
                return index;
            }

            let next = self.next(index);
            if next == 0 {
                let i = self.add(value);
                self.data[index].next = i;
                return i;
            }
            index = next;
        }
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
    struct Item(i32);

    impl MyHash for Item {
        fn hash(&self) -> u64 {
            self.0.unsigned_abs() as u64
        }
    }

    #[test]
    fn test_put_dedup() {
        let mut table = Table::new(2);
        let i = table.put(Item(7));
        let j = table.put(Item(7));
        assert_eq!(i, j);
        assert_eq!(table.real_size(), 1);
    }

    #[test]
    fn test_put_collision_chain() {
        let mut table = Table::new(2);
        let index1 = table.put(Item(5));
        let index2 = table.put(Item(-5));
        assert_ne!(index1, index2);
        assert_eq!(table[index1], Item(5));
        assert_eq!(table[index2], Item(-5));
        assert_eq!(table.next(index1), index2);
    }

    #[test]
    fn test_grows_when_full() {
        let mut table = Table::new(2);
        for i in 0..10 {
            table.put(Item(i));
        }
        assert_eq!(table.real_size(), 10);
        assert!(table.capacity() >= 11);
        for i in 0..10 {
            let index = table.put(Item(i));
            assert_eq!(table[index], Item(i));
        }
        assert_eq!(table.real_size(), 10);
    }
}
