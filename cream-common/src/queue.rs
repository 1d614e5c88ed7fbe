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

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::{
    error::{Error, Result},
    semaphore::Semaphore,
    strict_assert,
};

#[derive(Debug)]
struct QueueInner<T> {
    items: VecDeque<T>,
    valid: bool,
}

/// An unbounded multi-producer multi-consumer FIFO queue with a blocking consumer side.
///
/// Producers never block beyond brief lock contention. Consumers wait on a counting signal that is posted once per
/// enqueued item, so every item is delivered to exactly one consumer and no wakeup is lost.
#[derive(Debug)]
pub struct BlockingQueue<T> {
    inner: Mutex<QueueInner<T>>,
    items: Semaphore,
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlockingQueue<T> {
    /// Create an empty and valid queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::default(),
                valid: true,
            }),
            items: Semaphore::new(0),
        }
    }

    /// Append `item` at the tail and signal one consumer.
    ///
    /// Returns [`Error::Invalidated`] with the item dropped if the queue has been torn down.
    pub fn enqueue(&self, item: T) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.valid {
            return Err(Error::Invalidated);
        }
        inner.items.push_back(item);
        // Post under the lock so that `teardown` can never observe an item without its permit.
        self.items.release();
        Ok(())
    }

    /// Remove and return the head item, blocking the calling thread until one is available.
    ///
    /// Fails fast with [`Error::Invalidated`] if the queue has already been torn down. A thread that is already
    /// waiting when [`BlockingQueue::teardown`] runs is NOT woken.
    pub fn dequeue(&self) -> Result<T> {
        if !self.inner.lock().valid {
            return Err(Error::Invalidated);
        }

        self.items.acquire();

        let mut inner = self.inner.lock();
        inner.items.pop_front().ok_or(Error::Invalidated)
    }

    /// Drain all remaining items through `destructor` and permanently invalidate the queue.
    pub fn teardown<F>(&self, mut destructor: F) -> Result<()>
    where
        F: FnMut(T),
    {
        let mut inner = self.inner.lock();
        if !inner.valid {
            return Err(Error::Invalidated);
        }
        let remains = inner.items.len();
        // A consumer may hold a permit it has not redeemed yet, never the other way around.
        strict_assert!(self.items.permits() <= remains);
        for item in inner.items.drain(..) {
            destructor(item);
        }
        self.items.reset();
        inner.valid = false;
        tracing::debug!("[queue]: teardown, {remains} pending items destroyed");
        Ok(())
    }

    /// Count of pending items.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Returns `true` if no item is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `false` after [`BlockingQueue::teardown`].
    pub fn is_valid(&self) -> bool {
        self.inner.lock().valid
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    };

    use itertools::Itertools;

    use super::*;

    #[test]
    fn test_basic() {
        let queue = BlockingQueue::new();
        queue.enqueue(1).unwrap();
        assert_eq!(1, queue.dequeue().unwrap());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let queue = BlockingQueue::new();
        for i in 0..16 {
            queue.enqueue(i).unwrap();
        }
        assert_eq!(queue.len(), 16);
        let items = (0..16).map(|_| queue.dequeue().unwrap()).collect_vec();
        assert_eq!(items, (0..16).collect_vec());
    }

    #[test]
    fn test_multiple_reader() {
        let queue = Arc::new(BlockingQueue::new());
        let readers = (0..2)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || queue.dequeue().unwrap())
            })
            .collect_vec();

        thread::sleep(Duration::from_millis(20));
        assert!(readers.iter().all(|reader| !reader.is_finished()));

        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();

        let items = readers
            .into_iter()
            .map(|reader| reader.join().unwrap())
            .sorted()
            .collect_vec();
        assert_eq!(items, vec![1, 2]);
    }

    #[test_log::test]
    fn test_teardown() {
        let queue = BlockingQueue::new();
        for i in 0..5 {
            queue.enqueue(i).unwrap();
        }
        queue.dequeue().unwrap();

        let destroyed = AtomicUsize::new(0);
        queue
            .teardown(|_| {
                destroyed.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        assert_eq!(destroyed.load(Ordering::Relaxed), 4);

        assert!(!queue.is_valid());
        assert_eq!(queue.enqueue(42), Err(Error::Invalidated));
        assert_eq!(queue.dequeue(), Err(Error::Invalidated));
        assert_eq!(queue.teardown(|_| {}), Err(Error::Invalidated));
    }
}
