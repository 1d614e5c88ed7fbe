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

use parking_lot::{Condvar, Mutex};

/// A counting semaphore.
///
/// Permits are persistent: a [`Semaphore::release`] without any waiter is kept and lets the next
/// [`Semaphore::acquire`] return immediately. Each release wakes at most one waiter.
#[derive(Debug, Default)]
pub struct Semaphore {
    permits: Mutex<usize>,
    condvar: Condvar,
}

impl Semaphore {
    /// Create a semaphore with `permits` initial permits.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            condvar: Condvar::new(),
        }
    }

    /// Take one permit, blocking the calling thread until one is available.
    ///
    /// There is no timeout. The wait only ends when another thread calls [`Semaphore::release`].
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        self.condvar.wait_while(&mut permits, |permits| *permits == 0);
        *permits -= 1;
    }

    /// Return one permit and wake one waiter if any.
    pub fn release(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        self.condvar.notify_one();
    }

    /// Drop all available permits. Waiters are not woken.
    pub fn reset(&self) {
        *self.permits.lock() = 0;
    }

    /// Currently available permits.
    pub fn permits(&self) -> usize {
        *self.permits.lock()
    }
}
