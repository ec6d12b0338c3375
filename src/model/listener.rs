//! Listener lists for model objects
//!
//! Listeners are held weakly, so a registration never keeps a reader alive.
//! Dispatch iterates over a snapshot and re-checks membership before each
//! call, which lets a listener unregister itself (or others) mid-callback.

use std::sync::Weak;

use parking_lot::Mutex;

/// Identity of a registered listener (the address of the listening object)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

impl ListenerId {
    /// Identity of any object, usable from inside `Drop` where no `Weak` is at hand
    pub fn of<T: ?Sized>(object: &T) -> Self {
        Self(object as *const T as *const () as usize)
    }

    fn of_weak<L: ?Sized>(listener: &Weak<L>) -> Self {
        Self(listener.as_ptr() as *const () as usize)
    }
}

/// A set of weakly held listeners of one interface type
pub struct ListenerList<L: ?Sized> {
    entries: Mutex<Vec<(ListenerId, Weak<L>)>>,
}

impl<L: ?Sized> Default for ListenerList<L> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> std::fmt::Debug for ListenerList<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.entries.lock().len())
            .finish()
    }
}

impl<L: ?Sized> ListenerList<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Registering the same object twice is a no-op.
    pub fn add(&self, listener: Weak<L>) -> ListenerId {
        let id = ListenerId::of_weak(&listener);
        let mut entries = self.entries.lock();
        if !entries.iter().any(|(existing, _)| *existing == id) {
            entries.push((id, listener));
        }
        id
    }

    /// Unregister a listener. Unknown ids are ignored.
    pub fn remove(&self, id: ListenerId) {
        self.entries.lock().retain(|(existing, _)| *existing != id);
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.lock().iter().any(|(existing, _)| *existing == id)
    }

    /// Number of registered listeners that are still alive
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(_, listener)| listener.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke `callback` on every live listener
    ///
    /// The list lock is not held while callbacks run. A listener removed by an
    /// earlier callback in the same dispatch is skipped.
    pub fn call(&self, mut callback: impl FnMut(&L)) {
        let snapshot: Vec<(ListenerId, Weak<L>)> = {
            let mut entries = self.entries.lock();
            entries.retain(|(_, listener)| listener.strong_count() > 0);
            entries.clone()
        };

        for (id, listener) in snapshot {
            if !self.contains(id) {
                continue;
            }
            if let Some(listener) = listener.upgrade() {
                callback(&listener);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    trait Ping: Send + Sync {
        fn ping(&self, list: &ListenerList<dyn Ping>);
    }

    struct Counter {
        hits: AtomicUsize,
        remove_self: bool,
    }

    impl Ping for Counter {
        fn ping(&self, list: &ListenerList<dyn Ping>) {
            self.hits.fetch_add(1, Ordering::SeqCst);
            if self.remove_self {
                list.remove(ListenerId::of(self));
            }
        }
    }

    fn counter(remove_self: bool) -> Arc<Counter> {
        Arc::new(Counter {
            hits: AtomicUsize::new(0),
            remove_self,
        })
    }

    #[test]
    fn test_duplicate_registration_is_ignored() {
        let list: ListenerList<dyn Ping> = ListenerList::new();
        let a = counter(false);
        let weak: Weak<dyn Ping> = Arc::downgrade(&a) as Weak<dyn Ping>;
        list.add(weak.clone());
        list.add(weak);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_self_removal_during_dispatch() {
        let list: ListenerList<dyn Ping> = ListenerList::new();
        let a = counter(true);
        let b = counter(false);
        list.add(Arc::downgrade(&a) as Weak<dyn Ping>);
        list.add(Arc::downgrade(&b) as Weak<dyn Ping>);

        list.call(|l| l.ping(&list));
        assert_eq!(a.hits.load(Ordering::SeqCst), 1);
        assert_eq!(b.hits.load(Ordering::SeqCst), 1);
        assert_eq!(list.len(), 1);

        list.call(|l| l.ping(&list));
        assert_eq!(a.hits.load(Ordering::SeqCst), 1);
        assert_eq!(b.hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_removed_by_earlier_callback_is_skipped() {
        let list: ListenerList<dyn Ping> = ListenerList::new();
        let a = counter(false);
        let b = counter(false);
        list.add(Arc::downgrade(&a) as Weak<dyn Ping>);
        list.add(Arc::downgrade(&b) as Weak<dyn Ping>);
        let b_id = ListenerId::of(&*b);

        let mut calls = 0;
        list.call(|_| {
            calls += 1;
            list.remove(b_id);
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_dropped_listeners_are_pruned() {
        let list: ListenerList<dyn Ping> = ListenerList::new();
        let a = counter(false);
        list.add(Arc::downgrade(&a) as Weak<dyn Ping>);
        drop(a);
        assert!(list.is_empty());

        let mut calls = 0;
        list.call(|_| calls += 1);
        assert_eq!(calls, 0);
    }
}
