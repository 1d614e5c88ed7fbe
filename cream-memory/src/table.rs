// Copyright 2025 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use bytes::Bytes;
use cream_common::strict_assert_eq;

/// A slot of the open-addressing table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Slot {
    /// Never written since construction or the last clear. Terminates a probe.
    #[default]
    Empty,
    /// Holds an entry.
    Occupied {
        /// Entry key.
        key: Bytes,
        /// Entry value.
        value: Bytes,
    },
    /// Left behind by a deletion. Skipped by probes, reusable by insertions.
    Tombstone,
}

impl Slot {
    /// Returns `true` if the slot can take a new entry.
    pub fn is_vacant(&self) -> bool {
        matches!(self, Slot::Empty | Slot::Tombstone)
    }

    /// Returns `true` if the slot holds an entry.
    pub fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied { .. })
    }
}

/// Fixed-length slot array with linear probing.
///
/// `size` counts occupied slots only.
#[derive(Debug)]
pub(crate) struct Table {
    slots: Box<[Slot]>,
    size: usize,
    valid: bool,
}

impl Table {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| Slot::Empty).collect(),
            size: 0,
            valid: true,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn is_full(&self) -> bool {
        self.size == self.capacity()
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.valid
    }

    #[cfg(test)]
    pub(crate) fn slot(&self, index: usize) -> &Slot {
        &self.slots[index]
    }

    pub(crate) fn value(&self, index: usize) -> Option<&[u8]> {
        match &self.slots[index] {
            Slot::Occupied { value, .. } => Some(&value[..]),
            _ => None,
        }
    }

    /// Walk the probe sequence of `key` from `primary` for at most `capacity` steps.
    ///
    /// Tombstones are skipped without looking at them. Only occupied slots are compared, length first, then bytes.
    /// An empty slot ends the walk.
    pub(crate) fn find(&self, primary: usize, key: &[u8]) -> Option<usize> {
        let capacity = self.capacity();
        for step in 0..capacity {
            let index = (primary + step) % capacity;
            match &self.slots[index] {
                Slot::Empty => return None,
                Slot::Tombstone => continue,
                Slot::Occupied { key: k, .. } => {
                    if k.len() == key.len() && k.as_ref() == key {
                        return Some(index);
                    }
                }
            }
        }
        None
    }

    /// First empty or tombstoned slot on the probe sequence from `primary`.
    pub(crate) fn find_vacant(&self, primary: usize) -> Option<usize> {
        let capacity = self.capacity();
        (0..capacity)
            .map(|step| (primary + step) % capacity)
            .find(|&index| self.slots[index].is_vacant())
    }

    /// Put an entry into slot `index` and return what it held before.
    pub(crate) fn replace(&mut self, index: usize, key: Bytes, value: Bytes) -> Slot {
        let old = std::mem::replace(&mut self.slots[index], Slot::Occupied { key, value });
        if !old.is_occupied() {
            self.size += 1;
        }
        old
    }

    /// Tombstone slot `index` and return the entry it held.
    pub(crate) fn remove(&mut self, index: usize) -> Option<(Bytes, Bytes)> {
        match std::mem::replace(&mut self.slots[index], Slot::Tombstone) {
            Slot::Occupied { key, value } => {
                self.size -= 1;
                Some((key, value))
            }
            other => {
                self.slots[index] = other;
                None
            }
        }
    }

    /// Reset every slot to empty and hand out the entries they held.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = (Bytes, Bytes)> + '_ {
        self.size = 0;
        self.slots
            .iter_mut()
            .filter_map(|slot| match std::mem::take(slot) {
                Slot::Occupied { key, value } => Some((key, value)),
                _ => None,
            })
    }

    /// Release the slot storage and mark the table permanently invalid.
    pub(crate) fn invalidate(&mut self) {
        strict_assert_eq!(self.size, 0);
        self.slots = Box::default();
        self.valid = false;
    }
}
