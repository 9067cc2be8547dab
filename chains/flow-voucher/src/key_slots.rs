//! Fixed range of account key indices
//!
//! `[start, start + capacity)` is split between a FIFO free-list and an
//! in-use set, both behind one mutex, so the two always partition the range.

use crate::error::{PoolError, PoolResult};
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::ops::Range;

#[derive(Debug)]
struct SlotState {
    free: VecDeque<u32>,
    in_use: BTreeSet<u32>,
}

/// Point-in-time copy of both slot sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    /// Free indices in allocation order
    pub free: Vec<u32>,
    pub in_use: Vec<u32>,
}

impl SlotSnapshot {
    /// True when free and in-use are disjoint and together cover `range`
    /// exactly once.
    pub fn partitions(&self, range: Range<u32>) -> bool {
        let mut all: Vec<u32> = self.free.iter().chain(&self.in_use).copied().collect();
        all.sort_unstable();
        all.into_iter().eq(range)
    }
}

#[derive(Debug)]
pub struct KeySlots {
    start: u32,
    capacity: u32,
    state: Mutex<SlotState>,
}

impl KeySlots {
    /// Slots for `[start, start + capacity)`, all free, in ascending order.
    pub fn new(start: u32, capacity: u32) -> PoolResult<Self> {
        if capacity == 0 || start.checked_add(capacity).is_none() {
            return Err(PoolError::InvalidKeyRange { start, capacity });
        }
        Ok(Self {
            start,
            capacity,
            state: Mutex::new(SlotState {
                free: (start..start + capacity).collect(),
                in_use: BTreeSet::new(),
            }),
        })
    }

    /// Take the oldest free index. Never blocks.
    pub fn allocate(&self) -> Option<u32> {
        let mut state = self.state.lock();
        let key_index = state.free.pop_front()?;
        state.in_use.insert(key_index);
        Some(key_index)
    }

    /// Put an allocated index back at the tail of the free-list.
    pub fn reclaim(&self, key_index: u32) -> PoolResult<()> {
        let mut state = self.state.lock();
        if !state.in_use.remove(&key_index) {
            return Err(PoolError::SlotNotAllocated { key_index });
        }
        state.free.push_back(key_index);
        Ok(())
    }

    pub fn free_count(&self) -> usize {
        self.state.lock().free.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.state.lock().in_use.len()
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        let state = self.state.lock();
        SlotSnapshot {
            free: state.free.iter().copied().collect(),
            in_use: state.in_use.iter().copied().collect(),
        }
    }

    pub fn range(&self) -> Range<u32> {
        self.start..self.start + self.capacity
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}
