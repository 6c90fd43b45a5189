// Copyright © 2024 Pathway

use crate::engine::error::Result;
use crate::engine::key::RecordKey;
use crate::engine::record::Record;

/// Bounded pool of records sorted in memory.
///
/// Slots are reused between fills: [`SortBuffer::reset`] only forgets the
/// records, so refilling overwrites existing allocations.
#[derive(Debug)]
pub struct SortBuffer {
    key: RecordKey,
    slots: Vec<Record>,
    len: usize,
    capacity: usize,
    read: usize,
}

impl SortBuffer {
    pub fn new(key: RecordKey, capacity: usize) -> Self {
        Self {
            key,
            slots: Vec::new(),
            len: 0,
            capacity,
            read: 0,
        }
    }

    /// Stores a copy of `record`. Returns `false` when the buffer is full.
    pub fn put(&mut self, record: &Record) -> bool {
        if self.len == self.capacity {
            return false;
        }
        if let Some(slot) = self.slots.get_mut(self.len) {
            slot.copy_from(record);
        } else {
            self.slots.push(record.duplicate());
        }
        self.len += 1;
        true
    }

    pub fn sort(&mut self) {
        let key = &self.key;
        self.slots[..self.len].sort_by(|lhs, rhs| key.compare(lhs, rhs));
        self.read = 0;
    }

    pub fn next_record(&mut self) -> Option<&Record> {
        if self.read < self.len {
            self.read += 1;
            Some(&self.slots[self.read - 1])
        } else {
            None
        }
    }

    /// Serializes the next record into `buffer`; `false` when drained.
    pub fn get(&mut self, buffer: &mut Vec<u8>) -> Result<bool> {
        match self.next_record() {
            Some(record) => {
                buffer.clear();
                record.serialize(buffer)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn rewind(&mut self) {
        self.read = 0;
    }

    pub fn reset(&mut self) {
        self.len = 0;
        self.read = 0;
    }

    pub fn free(&mut self) {
        self.reset();
        self.slots = Vec::new();
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
