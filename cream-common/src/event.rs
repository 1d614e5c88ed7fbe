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

/// The reason an entry leaves the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Forced eviction of the primary slot occupant on insertion into a full map.
    Evict,
    /// Replacement of an entry with the same key on insertion.
    Replace,
    /// Map clear or teardown.
    Clear,
}

/// Receives the key and value of every entry that leaves the map, except for explicit deletions whose entry is
/// handed back to the caller.
///
/// The listener is called synchronously while the map is exclusively locked. It must not call back into the map.
pub trait EventListener: Send + Sync + 'static {
    /// Called when an entry leaves the map with the reason.
    ///
    /// The arguments include the key and value with ownership.
    fn on_leave(&self, reason: Event, key: Bytes, value: Bytes);
}

impl<F> EventListener for F
where
    F: Fn(Event, Bytes, Bytes) + Send + Sync + 'static,
{
    fn on_leave(&self, reason: Event, key: Bytes, value: Bytes) {
        self(reason, key, value)
    }
}

/// An event listener that only releases the bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEventListener;

impl EventListener for DefaultEventListener {
    fn on_leave(&self, reason: Event, key: Bytes, value: Bytes) {
        tracing::trace!(
            ?reason,
            key_len = key.len(),
            value_len = value.len(),
            "[event listener]: release entry"
        );
    }
}
