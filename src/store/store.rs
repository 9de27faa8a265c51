use crate::store::global::GlobalStores;
use crate::store::registry::{Registry, SharedRegistry, Subscriber, SubscriberId, Subscription};
use crate::store::update::{Patchable, Update};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use tracing::{debug, trace};

/// Reducer computing the next value from the current one and an action.
pub type Reducer<T, A> = Arc<dyn Fn(&T, A) -> T + Send + Sync>;

/// Opaque identity of a store, unique for the life of the process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(u64);

impl StoreId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store#{}", self.0)
    }
}

/// Read access shared by [`Store`] and [`ReadStore`].
///
/// This is the seam used by projections: anything that can hand out
/// snapshots and accept subscribers can be projected.
pub trait Observable<T>: Send + Sync {
    /// Identity of the underlying store.
    fn id(&self) -> StoreId;

    /// Current value without cloning it.
    fn snapshot(&self) -> Arc<T>;

    /// Register `subscriber` and call it once with the current value.
    fn subscribe(&self, subscriber: &Subscriber<T>) -> Subscription;
}

/// Value, reset target, subscribers and the pass gate.
///
/// Read-only handles share the core but have no way to reach `dispatch`.
struct Core<T> {
    id: StoreId,
    label: Option<String>,
    value: RwLock<Arc<T>>,
    reset_value: RwLock<Arc<T>>,
    registry: SharedRegistry<T>,
    dispatch: Mutex<Dispatch<T>>,
    idle: Condvar,
}

enum Op<T> {
    Compute(Box<dyn FnOnce(&T) -> T + Send>),
    Reset,
}

/// Which thread is running a pass, and the writes it issued meanwhile.
struct Dispatch<T> {
    thread: Option<ThreadId>,
    pending: VecDeque<Op<T>>,
}

enum Entry {
    /// This thread now owns the gate and must drain before releasing it.
    Outer,
    /// This thread already owns the gate further up the stack.
    Nested,
}

/// Clears the dispatch state if a reducer or subscriber panics mid-pass.
struct PassGuard<'a, T> {
    core: &'a Core<T>,
}

impl<T> Drop for PassGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut dispatch = self.core.dispatch.lock();
            dispatch.thread = None;
            dispatch.pending.clear();
            self.core.idle.notify_all();
        }
    }
}

impl<T: Send + Sync + 'static> Core<T> {
    fn new(id: StoreId, label: Option<String>, initial: T) -> Self {
        let initial = Arc::new(initial);
        Self {
            id,
            label,
            value: RwLock::new(Arc::clone(&initial)),
            reset_value: RwLock::new(initial),
            registry: Arc::new(Mutex::new(Registry::new())),
            dispatch: Mutex::new(Dispatch {
                thread: None,
                pending: VecDeque::new(),
            }),
            idle: Condvar::new(),
        }
    }

    fn snapshot(&self) -> Arc<T> {
        Arc::clone(&self.value.read())
    }

    fn subscribe(&self, subscriber: &Subscriber<T>) -> Subscription {
        let added = self.registry.lock().insert(subscriber.clone());
        trace!(store = %self.id, subscriber = %subscriber.id(), added, "subscribe");

        // Deliver the current value now so an update that landed between the
        // caller's initial read and this registration is not lost. Writes the
        // subscriber issues from this call are queued like any other pass.
        let entry = self.enter(None);
        let guard = matches!(entry, Entry::Outer).then(|| PassGuard { core: self });
        let current = self.snapshot();
        subscriber.notify(&current, &current);
        if guard.is_some() {
            self.drain();
        }
        drop(guard);

        let registry = Arc::downgrade(&self.registry);
        let store = self.id;
        let id = subscriber.id();
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                if registry.lock().remove(id) {
                    trace!(store = %store, subscriber = %id, "unsubscribe");
                }
            }
        })
    }

    fn dispatch(&self, op: Op<T>) {
        if let Entry::Nested = self.enter(Some(op)) {
            return;
        }
        let _guard = PassGuard { core: self };
        self.drain();
    }

    /// Take the pass gate for this thread, waiting out passes on other threads.
    ///
    /// A nested entry only queues `op`; an outer entry queues it for `drain`.
    fn enter(&self, op: Option<Op<T>>) -> Entry {
        let current = std::thread::current().id();
        let mut dispatch = self.dispatch.lock();
        loop {
            let running = dispatch.thread;
            match running {
                Some(thread) if thread == current => {
                    if let Some(op) = op {
                        dispatch.pending.push_back(op);
                        trace!(store = %self.id, queued = dispatch.pending.len(), "queued re-entrant update");
                    }
                    return Entry::Nested;
                }
                Some(_) => self.idle.wait(&mut dispatch),
                None => break,
            }
        }

        dispatch.thread = Some(current);
        if let Some(op) = op {
            dispatch.pending.push_back(op);
        }
        Entry::Outer
    }

    /// Apply queued writes in order, then release the gate.
    fn drain(&self) {
        loop {
            let op = {
                let mut dispatch = self.dispatch.lock();
                match dispatch.pending.pop_front() {
                    Some(op) => op,
                    None => {
                        dispatch.thread = None;
                        self.idle.notify_all();
                        break;
                    }
                }
            };
            self.apply(op);
        }
    }

    fn apply(&self, op: Op<T>) {
        let previous = self.snapshot();
        let next = match op {
            Op::Compute(compute) => Arc::new(compute(&previous)),
            Op::Reset => Arc::clone(&self.reset_value.read()),
        };
        *self.value.write() = Arc::clone(&next);
        self.notify(&next, &previous);
    }

    fn notify(&self, next: &T, previous: &T) {
        let pass = self.registry.lock().snapshot();
        trace!(store = %self.id, subscribers = pass.len(), "notification pass");
        for subscriber in pass {
            // Skip anyone removed earlier in this pass.
            if !self.is_subscribed(subscriber.id()) {
                continue;
            }
            subscriber.notify(next, previous);
        }
    }

    fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.registry.lock().contains(id)
    }
}

/// A shared state container with synchronous subscriptions.
///
/// A `Store` is a handle: cloning it is cheap and every clone addresses the
/// same value and subscriber set. Without a reducer the store accepts
/// [`Update`]s (shallow merge or replacement); with a reducer it accepts the
/// reducer's action type `A`.
///
/// # Examples
///
/// ```
/// use partyline::Store;
/// use std::collections::BTreeMap;
/// use std::sync::{Arc, Mutex};
///
/// let store = Store::new(BTreeMap::from([("count".to_string(), 0)]));
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = seen.clone();
/// let _subscription = store.subscribe_fn(move |value| {
///     sink.lock().unwrap().push(value["count"]);
/// });
///
/// store.patch(BTreeMap::from([("count".to_string(), 1)]));
/// assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
/// ```
pub struct Store<T, A = Update<T>> {
    core: Arc<Core<T>>,
    reducer: Reducer<T, A>,
}

impl<T: Patchable + Send + Sync + 'static> Store<T> {
    /// Create a store that shallow-merges updates.
    pub fn new(initial: T) -> Self {
        StoreBuilder::new(initial).build()
    }

    /// Start configuring a merge store.
    pub fn builder(initial: T) -> StoreBuilder<T> {
        StoreBuilder::new(initial)
    }

    /// Shallow-merge `patch` over the current value.
    pub fn patch(&self, patch: T::Patch) {
        self.set(Update::Patch(patch));
    }

    /// Replace the whole value.
    pub fn replace(&self, value: T) {
        self.set(Update::Replace(value));
    }
}

impl<T, A> Store<T, A>
where
    T: Send + Sync + 'static,
    A: Send + 'static,
{
    /// Create a store whose updates are interpreted by `reducer`.
    pub fn with_reducer<F>(initial: T, reducer: F) -> Self
    where
        F: Fn(&T, A) -> T + Send + Sync + 'static,
    {
        StoreBuilder::with_reducer(initial, reducer).build()
    }

    fn from_parts(initial: T, reducer: Reducer<T, A>, label: Option<String>) -> Self {
        let id = StoreId::next();
        debug!(store = %id, label = label.as_deref(), "store created");

        Self {
            core: Arc::new(Core::new(id, label, initial)),
            reducer,
        }
    }

    /// Get the store's identity.
    pub fn id(&self) -> StoreId {
        self.core.id
    }

    /// Label given at construction, if any.
    pub fn label(&self) -> Option<&str> {
        self.core.label.as_deref()
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        T::clone(&self.core.value.read())
    }

    /// Get the current value without cloning it.
    pub fn snapshot(&self) -> Arc<T> {
        self.core.snapshot()
    }

    /// Read the current value with a function.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let value = self.core.snapshot();
        f(&value)
    }

    /// Apply `action` and notify every subscriber before returning.
    ///
    /// Called from inside this store's own reducer or subscribers (including
    /// the call a subscriber receives at subscribe time), the action is
    /// queued and applied once the running notification pass finishes.
    /// Called from another thread while a pass is running, `set` waits for
    /// that pass and its queued writes, then applies `action` itself.
    pub fn set(&self, action: A) {
        let reducer = Arc::clone(&self.reducer);
        self.core
            .dispatch(Op::Compute(Box::new(move |current: &T| reducer(current, action))));
    }

    /// Restore the reset value and notify every subscriber.
    ///
    /// Queued or waited out exactly like [`set`](Self::set).
    pub fn reset(&self) {
        self.core.dispatch(Op::Reset);
    }

    /// Register `subscriber` and call it once with the current value.
    ///
    /// Subscribing the same subscriber twice keeps a single registration.
    pub fn subscribe(&self, subscriber: &Subscriber<T>) -> Subscription {
        self.core.subscribe(subscriber)
    }

    /// Subscribe a fresh [`Subscriber`] built from `callback`.
    pub fn subscribe_fn<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(&Subscriber::new(callback))
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.core.registry.lock().len()
    }

    /// A handle that can read and subscribe but not write.
    pub fn read_only(&self) -> ReadStore<T> {
        ReadStore {
            core: Arc::clone(&self.core),
        }
    }

    /// Whether both handles address the same store.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// Change what [`reset`](Self::reset) restores without touching the live value.
    pub(crate) fn set_reset_value(&self, value: T) {
        *self.core.reset_value.write() = Arc::new(value);
    }

    pub(crate) fn register_global(self) -> Self {
        GlobalStores::global().register(&self);
        self
    }
}

impl<T, A> Clone for Store<T, A> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            reducer: Arc::clone(&self.reducer),
        }
    }
}

impl<T, A> fmt::Debug for Store<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.core.id)
            .field("label", &self.core.label)
            .finish_non_exhaustive()
    }
}

impl<T, A> Observable<T> for Store<T, A>
where
    T: Send + Sync + 'static,
    A: Send + 'static,
{
    fn id(&self) -> StoreId {
        self.core.id
    }

    fn snapshot(&self) -> Arc<T> {
        self.core.snapshot()
    }

    fn subscribe(&self, subscriber: &Subscriber<T>) -> Subscription {
        self.core.subscribe(subscriber)
    }
}

/// Read-only view of a store: `get` and `subscribe`, no writes.
pub struct ReadStore<T> {
    core: Arc<Core<T>>,
}

impl<T: Send + Sync + 'static> ReadStore<T> {
    /// Get the store's identity.
    pub fn id(&self) -> StoreId {
        self.core.id
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        T::clone(&self.core.value.read())
    }

    /// Get the current value without cloning it.
    pub fn snapshot(&self) -> Arc<T> {
        self.core.snapshot()
    }

    /// Register `subscriber` and call it once with the current value.
    pub fn subscribe(&self, subscriber: &Subscriber<T>) -> Subscription {
        self.core.subscribe(subscriber)
    }

    /// Subscribe a fresh [`Subscriber`] built from `callback`.
    pub fn subscribe_fn<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(&Subscriber::new(callback))
    }
}

impl<T> Clone for ReadStore<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> fmt::Debug for ReadStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadStore")
            .field("id", &self.core.id)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Observable<T> for ReadStore<T> {
    fn id(&self) -> StoreId {
        self.core.id
    }

    fn snapshot(&self) -> Arc<T> {
        self.core.snapshot()
    }

    fn subscribe(&self, subscriber: &Subscriber<T>) -> Subscription {
        self.core.subscribe(subscriber)
    }
}

/// Configures a [`Store`] before creating it.
///
/// ```
/// use partyline::StoreBuilder;
///
/// let counter = StoreBuilder::with_reducer(0i64, |count: &i64, delta: i64| count + delta)
///     .label("counter")
///     .build();
///
/// counter.set(5);
/// assert_eq!(counter.get(), 5);
/// assert_eq!(counter.label(), Some("counter"));
/// ```
pub struct StoreBuilder<T, A = Update<T>> {
    initial: T,
    reducer: Reducer<T, A>,
    label: Option<String>,
}

impl<T: Patchable + Send + Sync + 'static> StoreBuilder<T> {
    /// Builder for a store that shallow-merges updates.
    pub fn new(initial: T) -> Self {
        let reducer: Reducer<T, Update<T>> = Arc::new(merge::<T>);
        Self {
            initial,
            reducer,
            label: None,
        }
    }
}

impl<T, A> StoreBuilder<T, A>
where
    T: Send + Sync + 'static,
    A: Send + 'static,
{
    /// Builder for a store whose updates are interpreted by `reducer`.
    pub fn with_reducer<F>(initial: T, reducer: F) -> Self
    where
        F: Fn(&T, A) -> T + Send + Sync + 'static,
    {
        Self {
            initial,
            reducer: Arc::new(reducer),
            label: None,
        }
    }

    /// Swap in a reducer, changing the action type the store accepts.
    pub fn reducer<B, F>(self, reducer: F) -> StoreBuilder<T, B>
    where
        B: Send + 'static,
        F: Fn(&T, B) -> T + Send + Sync + 'static,
    {
        StoreBuilder {
            initial: self.initial,
            reducer: Arc::new(reducer),
            label: self.label,
        }
    }

    /// Name recorded in log events for this store.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Create a store owned by whoever holds its handles.
    pub fn build(self) -> Store<T, A> {
        Store::from_parts(self.initial, self.reducer, self.label)
    }

    /// Create a store registered in the process-wide [`GlobalStores`] registry.
    pub fn build_global(self) -> Store<T, A> {
        self.build().register_global()
    }
}

fn merge<T: Patchable>(current: &T, update: Update<T>) -> T {
    update.apply(current)
}
