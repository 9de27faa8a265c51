use crate::store::{Observable, StoreId, Subscriber, Subscription};
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

type SelectFn<T, S> = dyn Fn(&T, Option<&S>) -> S + Send + Sync;
type Trigger = Arc<dyn Fn() + Send + Sync>;

/// Identity of a [`Selector`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SelectorId(u64);

impl SelectorId {
    const IDENTITY: SelectorId = SelectorId(0);

    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Derives a smaller value from a store's value.
///
/// The function receives the store value and the previously selected value
/// (`None` when seeding). Like subscribers, selectors are compared by
/// identity: a projection only re-subscribes when handed a different
/// selector, so build selectors once and reuse them.
pub struct Selector<T, S> {
    id: SelectorId,
    select: Arc<SelectFn<T, S>>,
}

impl<T: 'static, S: 'static> Selector<T, S> {
    /// Selector that can look at the previously selected value.
    pub fn new<F>(select: F) -> Self
    where
        F: Fn(&T, Option<&S>) -> S + Send + Sync + 'static,
    {
        Self {
            id: SelectorId::next(),
            select: Arc::new(select),
        }
    }

    /// Selector that only looks at the store value.
    pub fn map<F>(select: F) -> Self
    where
        F: Fn(&T) -> S + Send + Sync + 'static,
    {
        Self::new(move |value, _previous| select(value))
    }
}

impl<T, S> Selector<T, S> {
    /// Get the selector's identity.
    pub fn id(&self) -> SelectorId {
        self.id
    }

    /// Run the selector.
    pub fn select(&self, value: &T, previous: Option<&S>) -> S {
        (self.select)(value, previous)
    }
}

impl<T: Clone + 'static> Selector<T, T> {
    /// Selects the whole value.
    ///
    /// Every identity selector shares one identity, so switching between them
    /// never forces a re-subscription.
    pub fn identity() -> Self {
        Self {
            id: SelectorId::IDENTITY,
            select: Arc::new(|value: &T, _previous: Option<&T>| value.clone()),
        }
    }
}

impl<T, S> Clone for Selector<T, S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            select: Arc::clone(&self.select),
        }
    }
}

impl<T, S> fmt::Debug for Selector<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.id).finish()
    }
}

struct Binding {
    store: StoreId,
    selector: SelectorId,
    subscription: Subscription,
}

/// A consumer's local view of a store.
///
/// `attach` seeds a local slot from the store, subscribes, and from then on
/// recomputes the selected value on every notification. The re-render
/// trigger only fires when the selected value actually changes.
///
/// ```
/// use partyline::{Projection, Selector, Store};
/// use serde_json::{json, Value};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let store = Store::new(json!({ "first": "", "last": "" }));
/// let first = Selector::map(|value: &Value| value["first"].clone());
///
/// let renders = Arc::new(AtomicUsize::new(0));
/// let counter = renders.clone();
/// let mut projection = Projection::with_trigger(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// assert_eq!(projection.attach(&store, &first), json!(""));
///
/// store.patch(json!({ "last": "Thompson" }));
/// assert_eq!(renders.load(Ordering::SeqCst), 0);
///
/// store.patch(json!({ "first": "Ken" }));
/// assert_eq!(projection.value(), Some(json!("Ken")));
/// assert_eq!(renders.load(Ordering::SeqCst), 1);
/// ```
pub struct Projection<T, S> {
    slot: Arc<Mutex<Option<S>>>,
    trigger: Option<Trigger>,
    binding: Option<Binding>,
    _source: PhantomData<fn(&T)>,
}

impl<T, S> Projection<T, S>
where
    T: Send + Sync + 'static,
    S: Clone + PartialEq + Send + 'static,
{
    /// A detached projection without a re-render trigger.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            trigger: None,
            binding: None,
            _source: PhantomData,
        }
    }

    /// A detached projection that calls `trigger` whenever its value changes.
    pub fn with_trigger<F>(trigger: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            trigger: Some(Arc::new(trigger)),
            ..Self::new()
        }
    }

    /// Bind to `store` through `selector` and return the current selected value.
    ///
    /// Re-attaching to the same store with the same selector keeps the
    /// existing subscription. Anything else tears the old subscription down,
    /// re-seeds from the store and subscribes again.
    pub fn attach<O>(&mut self, store: &O, selector: &Selector<T, S>) -> S
    where
        O: Observable<T> + ?Sized,
    {
        if let Some(binding) = &self.binding {
            if binding.store == store.id() && binding.selector == selector.id() {
                if let Some(value) = self.slot.lock().clone() {
                    return value;
                }
            }
        }

        self.detach();
        let seeded = selector.select(&store.snapshot(), None);
        *self.slot.lock() = Some(seeded.clone());

        let slot = Arc::clone(&self.slot);
        let select = selector.clone();
        let trigger = self.trigger.clone();
        let subscriber = Subscriber::new(move |value: &T| {
            let changed = {
                let mut current = slot.lock();
                let next = select.select(value, (*current).as_ref());
                if (*current).as_ref() == Some(&next) {
                    false
                } else {
                    *current = Some(next);
                    true
                }
            };
            if changed {
                if let Some(trigger) = &trigger {
                    trigger();
                }
            }
        });

        let subscription = store.subscribe(&subscriber);
        trace!(store = %store.id(), selector = ?selector.id(), "projection attached");
        self.binding = Some(Binding {
            store: store.id(),
            selector: selector.id(),
            subscription,
        });

        self.slot.lock().clone().unwrap_or(seeded)
    }

    /// Unsubscribe and clear the local value. Does nothing when detached.
    pub fn detach(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.subscription.unsubscribe();
            trace!(store = %binding.store, selector = ?binding.selector, "projection detached");
        }
        *self.slot.lock() = None;
    }

    /// Current selected value, `None` while detached.
    pub fn value(&self) -> Option<S> {
        self.slot.lock().clone()
    }

    /// Whether the projection currently holds a subscription.
    pub fn is_attached(&self) -> bool {
        self.binding.is_some()
    }
}

impl<T, S> Default for Projection<T, S>
where
    T: Send + Sync + 'static,
    S: Clone + PartialEq + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> fmt::Debug for Projection<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projection")
            .field("store", &self.binding.as_ref().map(|binding| binding.store))
            .field("selector", &self.binding.as_ref().map(|binding| binding.selector))
            .finish_non_exhaustive()
    }
}
