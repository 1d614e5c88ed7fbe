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

use std::{
    hash::{BuildHasher, Hasher},
    sync::Arc,
};

use bytes::Bytes;
use cream_common::{
    event::{Event, EventListener},
    hasher::JenkinsHasher,
    strict_assert,
};

use crate::{
    error::{Error, Result},
    lock::{MappedReadGuard, ReadGuard, ReaderPreferredLock},
    table::{Slot, Table},
};

/// A borrowed value. The read episode it was looked up in stays open until it is dropped.
pub type ValueRef<'a> = MappedReadGuard<'a, [u8]>;

/// An entry removed from the map by [`ConcurrentMap::delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Entry key.
    pub key: Bytes,
    /// Entry value.
    pub value: Bytes,
}

/// Builder for [`ConcurrentMap`].
///
/// Both the hash builder and the event listener must be supplied.
pub struct ConcurrentMapBuilder<S = JenkinsHasher> {
    capacity: u32,
    hash_builder: Option<S>,
    event_listener: Option<Arc<dyn EventListener>>,
}

impl ConcurrentMapBuilder<JenkinsHasher> {
    /// Start building a map with a fixed slot count.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            hash_builder: None,
            event_listener: None,
        }
    }
}

impl<S> ConcurrentMapBuilder<S>
where
    S: BuildHasher + Send + Sync + 'static,
{
    /// Set the hash function used to compute the primary slot of a key.
    ///
    /// Only the low 32 bits of the hash are used.
    pub fn with_hash_builder<OS>(self, hash_builder: OS) -> ConcurrentMapBuilder<OS>
    where
        OS: BuildHasher + Send + Sync + 'static,
    {
        ConcurrentMapBuilder {
            capacity: self.capacity,
            hash_builder: Some(hash_builder),
            event_listener: self.event_listener,
        }
    }

    /// Set the listener called whenever an entry is replaced, evicted, or cleared.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Build the map.
    pub fn build(self) -> Result<ConcurrentMap<S>> {
        if self.capacity == 0 {
            return Err(Error::invalid_argument("capacity must be greater than 0"));
        }
        let hash_builder = self
            .hash_builder
            .ok_or_else(|| Error::invalid_argument("hash builder is required"))?;
        let event_listener = self
            .event_listener
            .ok_or_else(|| Error::invalid_argument("event listener is required"))?;

        tracing::debug!("[map]: create map with capacity {}", self.capacity);

        Ok(ConcurrentMap {
            capacity: self.capacity,
            table: ReaderPreferredLock::new(Table::new(self.capacity as usize)),
            hash_builder,
            event_listener,
        })
    }
}

/// A fixed-capacity open-addressing hash map from byte keys to byte values.
///
/// Collisions are resolved by linear probing with stride 1. Deleted slots become tombstones, which are skipped by
/// lookups and reused by insertions, but never compacted. The table is never resized.
///
/// Lookups run in read episodes of a [`ReaderPreferredLock`]; every mutation holds the lock exclusively for its
/// whole duration.
///
/// When an insertion finds the map full and is forced, the occupant of the new key's primary slot is evicted. This
/// is not an LRU policy: the victim is whatever the hash points at.
pub struct ConcurrentMap<S = JenkinsHasher> {
    capacity: u32,
    table: ReaderPreferredLock<Table>,
    hash_builder: S,
    event_listener: Arc<dyn EventListener>,
}

impl<S> ConcurrentMap<S>
where
    S: BuildHasher + Send + Sync + 'static,
{
    /// Slot count, fixed at construction.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Count of stored entries.
    pub fn len(&self) -> usize {
        self.table.read().size()
    }

    /// Returns `true` if the map holds no entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `false` after [`ConcurrentMap::teardown`].
    pub fn is_valid(&self) -> bool {
        self.table.read().is_valid()
    }

    /// The slot where the probe sequence of `key` starts.
    pub fn primary_index(&self, key: &[u8]) -> usize {
        let mut hasher = self.hash_builder.build_hasher();
        hasher.write(key);
        let hash = hasher.finish() as u32;
        (hash % self.capacity) as usize
    }

    /// Insert or replace an entry.
    ///
    /// If the key exists, its value is replaced in place. Otherwise the entry goes to the first vacant slot of its
    /// probe sequence. If the map is full, the insertion fails with [`Error::CapacityExceeded`] unless `force` is
    /// set, in which case the occupant of the key's primary slot is evicted to make room.
    ///
    /// The map takes ownership of `key` and `value`. Entries that leave are handed to the event listener.
    pub fn put(&self, key: impl Into<Bytes>, value: impl Into<Bytes>, force: bool) -> Result<()> {
        let key = key.into();
        let value = value.into();
        if key.is_empty() {
            return Err(Error::invalid_argument("key must not be empty"));
        }
        if value.is_empty() {
            return Err(Error::invalid_argument("value must not be empty"));
        }

        let primary = self.primary_index(&key);

        let mut table = self.table.write();
        if !table.is_valid() {
            return Err(Error::Invalidated);
        }

        if table.is_full() && !force {
            return Err(Error::CapacityExceeded);
        }

        if let Some(index) = table.find(primary, &key) {
            tracing::trace!("[map]: replace entry at slot {index}");
            if let Slot::Occupied { key, value } = table.replace(index, key, value) {
                self.event_listener.on_leave(Event::Replace, key, value);
            }
            return Ok(());
        }

        if table.is_full() {
            tracing::trace!("[map]: map is full, evict the occupant of primary slot {primary}");
            let old = table.replace(primary, key, value);
            strict_assert!(old.is_occupied());
            if let Slot::Occupied { key, value } = old {
                self.event_listener.on_leave(Event::Evict, key, value);
            }
            return Ok(());
        }

        match table.find_vacant(primary) {
            Some(index) => {
                tracing::trace!("[map]: insert entry at slot {index}, primary slot: {primary}");
                table.replace(index, key, value);
                Ok(())
            }
            None => Err(Error::CapacityExceeded),
        }
    }

    /// Look up the value of `key`.
    ///
    /// The returned [`ValueRef`] borrows the stored bytes without copying and keeps the read episode open, blocking
    /// every writer until it is dropped.
    pub fn get(&self, key: &[u8]) -> Result<ValueRef<'_>> {
        let primary = self.primary_index(key);

        let table = self.table.read();
        if !table.is_valid() {
            return Err(Error::Invalidated);
        }

        let index = table.find(primary, key).ok_or(Error::NotFound)?;
        ReadGuard::try_map(table, |table| table.value(index)).map_err(|_| Error::NotFound)
    }

    /// Remove the entry of `key` and return it. The slot becomes a tombstone.
    ///
    /// The event listener is not called, the removed entry is handed to the caller instead.
    pub fn delete(&self, key: &[u8]) -> Result<Entry> {
        let primary = self.primary_index(key);

        let mut table = self.table.write();
        if !table.is_valid() {
            return Err(Error::Invalidated);
        }

        let index = table.find(primary, key).ok_or(Error::NotFound)?;
        let (key, value) = table.remove(index).ok_or(Error::NotFound)?;
        tracing::trace!("[map]: tombstone slot {index}");
        Ok(Entry { key, value })
    }

    /// Remove every entry, handing each to the event listener exactly once. Tombstones are reset too. The capacity
    /// does not change.
    pub fn clear(&self) -> Result<()> {
        let mut table = self.table.write();
        if !table.is_valid() {
            return Err(Error::Invalidated);
        }
        let cleared = self.sweep(&mut table);
        tracing::debug!("[map]: clear, {cleared} entries released");
        Ok(())
    }

    /// Clear the map, release the slot storage, and permanently invalidate it. Every later operation fails with
    /// [`Error::Invalidated`].
    pub fn teardown(&self) -> Result<()> {
        let mut table = self.table.write();
        if !table.is_valid() {
            return Err(Error::Invalidated);
        }
        let cleared = self.sweep(&mut table);
        table.invalidate();
        tracing::debug!("[map]: teardown, {cleared} entries released");
        Ok(())
    }

    fn sweep(&self, table: &mut Table) -> usize {
        let mut cleared = 0;
        for (key, value) in table.drain() {
            self.event_listener.on_leave(Event::Clear, key, value);
            cleared += 1;
        }
        cleared
    }
}
