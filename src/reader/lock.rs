//! Per-reader invalidation lock
//!
//! Each reader guards its cached decode state with one `InvalidationLock`.
//! Reads only ever `try_read` and fall back to silence when the lock is busy.
//! Writers (invalidation, re-creation, destruction) take it exclusively.
//!
//! Sample access toggles arrive as a will/did hook pair around the host's own
//! state change. `begin_bracket` takes the write lock in the first hook and
//! parks the owned guard until `end_bracket`, so no read can observe the
//! in-between state. Writes issued while a bracket is open reuse its guard.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::{ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock, RwLockReadGuard};

use super::ReaderState;

type BracketGuard<T> = ArcRwLockWriteGuard<RawRwLock, T>;

pub struct InvalidationLock<T> {
    inner: Arc<RwLock<T>>,
    // Lock order: bracket, then inner
    bracket: Mutex<Option<BracketGuard<T>>>,
}

impl<T> InvalidationLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
            bracket: Mutex::new(None),
        }
    }

    /// Non-blocking shared access for the read path
    ///
    /// # Returns
    /// `None` while a writer holds (or is waiting for) the lock.
    #[inline]
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        self.inner.try_read()
    }

    /// Run `f` with exclusive access
    ///
    /// Blocks until in-flight reads finish. Inside an open bracket the
    /// parked guard is used instead of locking again.
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut bracket = self.bracket.lock();
        if let Some(guard) = bracket.as_mut() {
            return f(guard);
        }
        let mut guard = self.inner.write();
        f(&mut guard)
    }

    /// Take the write lock and keep it until [`end_bracket`](Self::end_bracket)
    ///
    /// A second `begin_bracket` before the matching end reuses the open one.
    pub fn begin_bracket(&self, f: impl FnOnce(&mut T)) {
        let mut bracket = self.bracket.lock();
        let guard = bracket.get_or_insert_with(|| self.inner.write_arc());
        f(guard);
    }

    /// Run `f` under the bracket's guard, then release the lock
    ///
    /// Without an open bracket `f` runs under a freshly taken write lock.
    pub fn end_bracket(&self, f: impl FnOnce(&mut T)) {
        let mut bracket = self.bracket.lock();
        match bracket.take() {
            Some(mut guard) => f(&mut guard),
            None => {
                let mut guard = self.inner.write();
                f(&mut guard);
            }
        }
    }

    pub fn is_bracket_open(&self) -> bool {
        self.bracket.lock().is_some()
    }
}

impl<T> std::fmt::Debug for InvalidationLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationLock")
            .field("locked", &self.inner.is_locked())
            .field("bracket_open", &self.is_bracket_open())
            .finish()
    }
}

// ============================================================================
// Published state
// ============================================================================

/// Lock-free mirror of a reader's [`ReaderState`]
///
/// Only written while the owning reader's write lock is held; read anywhere.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: ReaderState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn get(&self) -> ReaderState {
        match self.0.load(Ordering::Acquire) {
            0 => ReaderState::Valid,
            1 => ReaderState::AccessDisabled,
            _ => ReaderState::Invalidated,
        }
    }

    /// Publish `state`, refusing to leave `Invalidated`
    ///
    /// # Returns
    /// The previous state.
    pub fn set(&self, state: ReaderState) -> ReaderState {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current == ReaderState::Invalidated as u8 {
                return ReaderState::Invalidated;
            }
            match self
                .0
                .compare_exchange(current, state as u8, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(previous) => {
                    return match previous {
                        0 => ReaderState::Valid,
                        _ => ReaderState::AccessDisabled,
                    }
                }
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_write_is_visible_to_later_reads() {
        let lock = InvalidationLock::new(1_u32);
        lock.write(|value| {
            *value = 2;
        });
        assert_eq!(*lock.try_read().unwrap(), 2);
    }

    #[test]
    fn test_bracket_blocks_readers_until_end() {
        let lock = InvalidationLock::new(0_u32);
        lock.begin_bracket(|value| *value = 1);
        assert!(lock.is_bracket_open());
        assert!(lock.try_read().is_none());

        // Writes inside the bracket reuse the parked guard instead of deadlocking
        lock.write(|value| *value += 1);
        assert!(lock.try_read().is_none());

        lock.end_bracket(|value| *value += 1);
        assert!(!lock.is_bracket_open());
        assert_eq!(*lock.try_read().unwrap(), 3);
    }

    #[test]
    fn test_nested_begin_reuses_bracket() {
        let lock = InvalidationLock::new(0_u32);
        lock.begin_bracket(|value| *value += 1);
        lock.begin_bracket(|value| *value += 1);
        lock.end_bracket(|_| {});
        assert_eq!(*lock.try_read().unwrap(), 2);
    }

    #[test]
    fn test_end_without_begin_still_writes() {
        let lock = InvalidationLock::new(5_u32);
        lock.end_bracket(|value| *value = 7);
        assert_eq!(*lock.try_read().unwrap(), 7);
    }

    #[test]
    fn test_bracket_is_visible_to_other_threads() {
        let lock = Arc::new(InvalidationLock::new(0_u32));
        lock.begin_bracket(|value| *value = 1);

        let try_read = {
            let lock = lock.clone();
            move || lock.try_read().map(|value| *value)
        };
        let blocked = thread::spawn(try_read.clone()).join().unwrap();
        assert_eq!(blocked, None);

        lock.end_bracket(|value| *value = 2);
        let released = thread::spawn(try_read).join().unwrap();
        assert_eq!(released, Some(2));
    }

    #[test]
    fn test_state_cell_invalidated_is_terminal() {
        let cell = StateCell::new(ReaderState::Valid);
        assert_eq!(cell.set(ReaderState::AccessDisabled), ReaderState::Valid);
        assert_eq!(cell.get(), ReaderState::AccessDisabled);
        assert_eq!(cell.set(ReaderState::Invalidated), ReaderState::AccessDisabled);
        assert_eq!(cell.set(ReaderState::Valid), ReaderState::Invalidated);
        assert_eq!(cell.get(), ReaderState::Invalidated);
    }
}
