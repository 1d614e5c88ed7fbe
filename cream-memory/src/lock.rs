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

//! A reader-preferenced readers/writer lock.
//!
//! The lock is an explicit state object: an exclusive permit plus a reader counter guarded by its own small mutex.
//! The first reader of a read episode takes the permit on behalf of all readers and the last reader to leave gives
//! it back, so the permit may be released by a different thread than the one that acquired it. Writers take the
//! permit directly.
//!
//! As long as read episodes overlap, the permit is never returned and a waiting writer starves.

use std::{
    cell::UnsafeCell,
    fmt::Debug,
    marker::PhantomData,
    ops::{Deref, DerefMut},
};

use cream_common::{semaphore::Semaphore, strict_assert};
use parking_lot::Mutex;

/// The state of a reader-preferenced lock without the protected data.
#[derive(Debug)]
pub struct RawReaderPreferredLock {
    /// Exclusive permit, held either by one writer or by the current read episode.
    permit: Semaphore,
    /// Active readers of the current read episode.
    readers: Mutex<usize>,
}

impl Default for RawReaderPreferredLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RawReaderPreferredLock {
    /// Create an unlocked lock.
    pub fn new() -> Self {
        Self {
            permit: Semaphore::new(1),
            readers: Mutex::new(0),
        }
    }

    /// Enter a read episode.
    ///
    /// The first reader blocks until no writer holds the permit. The reader counter stays locked meanwhile, so
    /// other readers queue up behind it.
    pub fn lock_shared(&self) {
        let mut readers = self.readers.lock();
        *readers += 1;
        if *readers == 1 {
            self.permit.acquire();
        }
    }

    /// Leave a read episode. The last reader returns the permit.
    pub fn unlock_shared(&self) {
        let mut readers = self.readers.lock();
        strict_assert!(*readers > 0);
        *readers -= 1;
        if *readers == 0 {
            self.permit.release();
        }
    }

    /// Take the permit exclusively, blocking until no read episode and no writer holds it.
    pub fn lock_exclusive(&self) {
        self.permit.acquire();
    }

    /// Return the exclusive permit.
    pub fn unlock_exclusive(&self) {
        self.permit.release();
    }

    /// Readers of the current read episode.
    pub fn readers(&self) -> usize {
        *self.readers.lock()
    }
}

/// A readers/writer lock that prefers readers, see the module documentation.
pub struct ReaderPreferredLock<T> {
    raw: RawReaderPreferredLock,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for ReaderPreferredLock<T> {}
unsafe impl<T: Send + Sync> Sync for ReaderPreferredLock<T> {}

impl<T: Debug> Debug for ReaderPreferredLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderPreferredLock")
            .field("readers", &self.raw.readers())
            .finish_non_exhaustive()
    }
}

impl<T> ReaderPreferredLock<T> {
    /// Create an unlocked lock protecting `data`.
    pub fn new(data: T) -> Self {
        Self {
            raw: RawReaderPreferredLock::new(),
            data: UnsafeCell::new(data),
        }
    }

    /// Join or start a read episode.
    pub fn read(&self) -> ReadGuard<'_, T> {
        self.raw.lock_shared();
        ReadGuard {
            raw: &self.raw,
            data: self.data.get(),
            _marker: PhantomData,
        }
    }

    /// Take exclusive access.
    pub fn write(&self) -> WriteGuard<'_, T> {
        self.raw.lock_exclusive();
        WriteGuard { lock: self }
    }

    /// Readers of the current read episode.
    pub fn readers(&self) -> usize {
        self.raw.readers()
    }

    /// Consume the lock and return the protected data.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

/// Keeps the read episode open while alive.
#[must_use = "if unused the read episode is left immediately"]
pub struct ReadGuard<'a, T> {
    raw: &'a RawReaderPreferredLock,
    data: *const T,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> ReadGuard<'a, T> {
    /// Narrow the guard to a part of the protected data, or give it back if `f` returns `None`.
    ///
    /// The read episode stays open until the returned guard is dropped.
    pub fn try_map<U, F>(guard: Self, f: F) -> Result<MappedReadGuard<'a, U>, Self>
    where
        U: ?Sized,
        F: FnOnce(&T) -> Option<&U>,
    {
        let raw = guard.raw;
        match f(unsafe { &*guard.data }) {
            Some(data) => {
                let data = data as *const U;
                std::mem::forget(guard);
                Ok(MappedReadGuard {
                    raw,
                    data,
                    _marker: PhantomData,
                })
            }
            None => Err(guard),
        }
    }
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.data }
    }
}

impl<T: Debug> Debug for ReadGuard<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        (**self).fmt(f)
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.raw.unlock_shared();
    }
}

/// A read guard narrowed to a part of the protected data.
#[must_use = "if unused the read episode is left immediately"]
pub struct MappedReadGuard<'a, U: ?Sized> {
    raw: &'a RawReaderPreferredLock,
    data: *const U,
    _marker: PhantomData<&'a U>,
}

impl<U: ?Sized> Deref for MappedReadGuard<'_, U> {
    type Target = U;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.data }
    }
}

impl<U: ?Sized + Debug> Debug for MappedReadGuard<'_, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        (**self).fmt(f)
    }
}

impl<U: ?Sized> Drop for MappedReadGuard<'_, U> {
    fn drop(&mut self) {
        self.raw.unlock_shared();
    }
}

/// Holds exclusive access while alive.
#[must_use = "if unused the exclusive access is released immediately"]
pub struct WriteGuard<'a, T> {
    lock: &'a ReaderPreferredLock<T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock_exclusive();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    };

    use super::*;

    fn is_locked<T>(lock: &ReaderPreferredLock<T>) -> bool {
        lock.raw.permit.permits() == 0
    }

    #[test]
    fn test_concurrent_readers() {
        let lock = ReaderPreferredLock::new(42);
        let r1 = lock.read();
        let r2 = lock.read();
        assert_eq!(*r1 + *r2, 84);
        assert_eq!(lock.readers(), 2);
        assert!(is_locked(&lock));
        drop(r1);
        assert!(is_locked(&lock));
        drop(r2);
        assert_eq!(lock.readers(), 0);
        assert!(!is_locked(&lock));
    }

    #[test]
    fn test_writer_excludes_readers() {
        let lock = Arc::new(ReaderPreferredLock::new(0u64));
        let mut w = lock.write();

        let reader = {
            let lock = lock.clone();
            thread::spawn(move || {
                let v = *lock.read();
                v
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!reader.is_finished());

        *w = 7;
        drop(w);
        assert_eq!(reader.join().unwrap(), 7);
    }

    #[test]
    fn test_readers_starve_writer() {
        let lock = Arc::new(ReaderPreferredLock::new(0u64));
        let written = Arc::new(AtomicBool::new(false));

        let r1 = lock.read();

        let writer = {
            let lock = lock.clone();
            let written = written.clone();
            thread::spawn(move || {
                *lock.write() += 1;
                written.store(true, Ordering::SeqCst);
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!written.load(Ordering::SeqCst));

        // A new reader joins the running episode even though a writer is waiting.
        let r2 = lock.read();
        drop(r1);
        thread::sleep(Duration::from_millis(50));
        assert!(!written.load(Ordering::SeqCst));
        assert_eq!(*r2, 0);

        drop(r2);
        writer.join().unwrap();
        assert!(written.load(Ordering::SeqCst));
        assert_eq!(*lock.read(), 1);
    }

    #[test]
    fn test_permit_released_by_another_thread() {
        let lock = Arc::new(ReaderPreferredLock::new(()));
        let first = lock.read();

        // The second reader leaves last on another thread and must give the permit back.
        let (tx, rx) = std::sync::mpsc::channel();
        let last = {
            let lock = lock.clone();
            thread::spawn(move || {
                let guard = lock.read();
                rx.recv().unwrap();
                drop(guard);
            })
        };
        while lock.readers() < 2 {
            thread::yield_now();
        }
        drop(first);
        tx.send(()).unwrap();
        last.join().unwrap();

        assert!(!is_locked(&lock));
    }

    #[test]
    fn test_mapped_guard() {
        let lock = ReaderPreferredLock::new(vec![1u8, 2, 3]);
        let guard = ReadGuard::try_map(lock.read(), |v| v.get(1..)).unwrap();
        assert_eq!(&*guard, &[2, 3]);
        assert!(is_locked(&lock));
        drop(guard);

        let guard = ReadGuard::try_map(lock.read(), |v| v.get(10..));
        let guard = guard.unwrap_err();
        assert_eq!(guard.len(), 3);
        drop(guard);
        assert!(!is_locked(&lock));
    }
}
