use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Callback<T> = dyn Fn(&T, &T) + Send + Sync;

/// Identity of a [`Subscriber`].
///
/// Assigned once at construction; clones of a subscriber share it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber#{}", self.0)
    }
}

/// A callback registered with a store.
///
/// Subscribers are compared by identity, not by behaviour: cloning a
/// subscriber yields the same subscriber, while two subscribers built from
/// identical closures are distinct.
pub struct Subscriber<T> {
    id: SubscriberId,
    callback: Arc<Callback<T>>,
}

impl<T: 'static> Subscriber<T> {
    /// Create a subscriber that receives each new value.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self::with_previous(move |next, _previous| callback(next))
    }

    /// Create a subscriber that receives the new value and the value it replaced.
    ///
    /// At subscribe time, when there is no change yet, both arguments are the
    /// current value.
    pub fn with_previous<F>(callback: F) -> Self
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::next(),
            callback: Arc::new(callback),
        }
    }
}

impl<T> Subscriber<T> {
    /// Get the subscriber's identity.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn notify(&self, next: &T, previous: &T) {
        (self.callback)(next, previous);
    }
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> PartialEq for Subscriber<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Subscriber<T> {}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Subscriber").field(&self.id).finish()
    }
}

/// The set of subscribers attached to one store.
pub(crate) struct Registry<T> {
    subscribers: HashMap<SubscriberId, Subscriber<T>>,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
        }
    }

    /// Returns `false` if the subscriber was already present.
    pub(crate) fn insert(&mut self, subscriber: Subscriber<T>) -> bool {
        match self.subscribers.entry(subscriber.id) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(subscriber);
                true
            }
        }
    }

    /// Returns `false` if the subscriber was not present.
    pub(crate) fn remove(&mut self, id: SubscriberId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Members of the registry at this instant, for one notification pass.
    pub(crate) fn snapshot(&self) -> Vec<Subscriber<T>> {
        self.subscribers.values().cloned().collect()
    }
}

/// Handle returned by `subscribe`; removes the subscriber from its store.
///
/// Unsubscribing is idempotent. Dropping the handle unsubscribes as well, so
/// keep it alive for as long as notifications are wanted, or call
/// [`Subscription::forget`] to leave the subscriber registered for the
/// lifetime of the store.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    remove: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub(crate) fn new<F>(remove: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            remove: Mutex::new(Some(Box::new(remove))),
        }
    }

    /// Stop receiving notifications. Later calls do nothing.
    pub fn unsubscribe(&self) {
        let remove = self.remove.lock().take();
        if let Some(remove) = remove {
            remove();
        }
    }

    /// Whether [`unsubscribe`](Self::unsubscribe) has not run yet.
    pub fn is_active(&self) -> bool {
        self.remove.lock().is_some()
    }

    /// Give up the ability to unsubscribe, keeping the subscriber registered.
    pub fn forget(self) {
        self.remove.lock().take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Shared registry handle used by stores and the unsubscribe closures they hand out.
pub(crate) type SharedRegistry<T> = Arc<Mutex<Registry<T>>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn clones_share_identity() {
        let subscriber = Subscriber::new(|_: &i32| {});
        let clone = subscriber.clone();
        assert_eq!(subscriber, clone);

        let other = Subscriber::new(|_: &i32| {});
        assert_ne!(subscriber, other);
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = Registry::new();
        let subscriber = Subscriber::new(|_: &i32| {});

        assert!(registry.insert(subscriber.clone()));
        assert!(!registry.insert(subscriber.clone()));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(subscriber.id()));
        assert!(!registry.remove(subscriber.id()));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn subscription_runs_removal_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let subscription = Subscription::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(subscription.is_active());
        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(!subscription.is_active());
        drop(subscription);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn forget_skips_removal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let subscription = Subscription::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        subscription.forget();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
