// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-progress flags for entry points that must not be re-entered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{DrawError, EntryPoint};

/// A flag that is set while its entry point is running.
#[derive(Debug, Clone)]
pub struct EntryLock {
    entry: EntryPoint,
    busy: Arc<AtomicBool>,
}

impl EntryLock {
    pub fn new(entry: EntryPoint) -> Self {
        EntryLock {
            entry,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Marks the entry point as running until the guard is dropped.
    pub fn enter(&self) -> Result<EntryGuard, DrawError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DrawError::Reentrant(self.entry))?;
        Ok(EntryGuard {
            busy: self.busy.clone(),
        })
    }

    pub fn is_held(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases its entry point on every exit path.
#[derive(Debug)]
pub struct EntryGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// One lock per guarded entry point of the engine.
#[derive(Debug, Clone)]
pub struct EntryLocks {
    pub schedule: EntryLock,
    pub fulfillment: EntryLock,
}

impl Default for EntryLocks {
    fn default() -> Self {
        EntryLocks {
            schedule: EntryLock::new(EntryPoint::Schedule),
            fulfillment: EntryLock::new(EntryPoint::Fulfillment),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_rejects_reentry_and_releases() {
        let lock = EntryLock::new(EntryPoint::Fulfillment);
        {
            let _guard = lock.enter().unwrap();
            assert!(lock.is_held());
            assert_eq!(
                lock.enter().map(|_| ()),
                Err(DrawError::Reentrant(EntryPoint::Fulfillment))
            );
        }
        assert!(!lock.is_held());
        assert!(lock.enter().is_ok());
    }

    #[test]
    fn test_guard_released_on_early_return() {
        fn fails(lock: &EntryLock) -> Result<(), DrawError> {
            let _guard = lock.enter()?;
            Err(DrawError::NothingToDo)
        }

        let lock = EntryLock::new(EntryPoint::Schedule);
        assert_eq!(fails(&lock), Err(DrawError::NothingToDo));
        assert!(!lock.is_held());
    }
}
