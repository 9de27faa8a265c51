use crate::error::{Result, StoreError};
use crate::owner::{Context, ContextId};
use crate::projection::{Projection, Selector};
use crate::store::{Observable, Patchable, Store, StoreBuilder};
use parking_lot::{Mutex, RwLock};
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

type Hook = Box<dyn Any + Send>;
type Scheduler = Arc<dyn Fn(OwnerId) + Send + Sync>;

/// Identity of an [`Owner`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// Re-render bookkeeping shared with the projections an owner creates.
struct Invalidation {
    owner: OwnerId,
    dirty: AtomicBool,
    count: AtomicUsize,
    scheduler: RwLock<Option<Scheduler>>,
}

impl Invalidation {
    fn fire(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        self.count.fetch_add(1, Ordering::SeqCst);
        trace!(owner = %self.owner, "invalidated");

        let scheduler = self.scheduler.read().clone();
        if let Some(scheduler) = scheduler {
            scheduler(self.owner);
        }
    }
}

struct OwnerShared {
    id: OwnerId,
    label: Option<String>,
    parent: Option<Arc<OwnerShared>>,
    hooks: Mutex<Vec<Hook>>,
    contexts: RwLock<HashMap<ContextId, Box<dyn Any + Send + Sync>>>,
    invalidation: Arc<Invalidation>,
    renders: AtomicUsize,
}

/// Stand-in for one UI component instance.
///
/// An owner keeps the hook state of its renders: scoped stores, projections
/// and effects live in slots indexed by call order, and are torn down when
/// the owner is dropped. Projections created through the owner mark it dirty
/// when their selected value changes; the view layer re-renders it by
/// calling [`Owner::render`] again.
///
/// Owners form a tree through [`Owner::child`] so that contexts provided by
/// an ancestor reach its descendants.
///
/// # Examples
///
/// ```
/// use partyline::{Owner, Selector, StoreError};
/// use std::collections::BTreeMap;
///
/// let component = Owner::new();
/// let total = Selector::map(|counts: &BTreeMap<String, u32>| counts.values().sum::<u32>());
///
/// let store = component
///     .render(|cx| -> Result<_, StoreError> {
///         let store = cx.use_store(BTreeMap::from([("a".to_string(), 1u32)]))?;
///         assert_eq!(cx.use_projection(&store, &total)?, 1);
///         Ok(store)
///     })
///     .unwrap();
///
/// store.patch(BTreeMap::from([("b".to_string(), 2)]));
/// assert!(component.needs_render());
///
/// component
///     .render(|cx| -> Result<(), StoreError> {
///         let again = cx.use_store(BTreeMap::<String, u32>::new())?;
///         assert!(again.ptr_eq(&store));
///         assert_eq!(cx.use_projection(&again, &total)?, 3);
///         Ok(())
///     })
///     .unwrap();
/// ```
pub struct Owner {
    shared: Arc<OwnerShared>,
}

impl Owner {
    /// Create a root owner.
    pub fn new() -> Self {
        Self::create(None, None)
    }

    /// Create a root owner whose log events and scoped stores carry `label`.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self::create(None, Some(label.into()))
    }

    /// Create an owner nested under this one.
    pub fn child(&self) -> Owner {
        Self::create(Some(Arc::clone(&self.shared)), None)
    }

    fn create(parent: Option<Arc<OwnerShared>>, label: Option<String>) -> Self {
        let id = OwnerId::next();
        trace!(owner = %id, parent = ?parent.as_ref().map(|parent| parent.id), "owner created");

        Self {
            shared: Arc::new(OwnerShared {
                id,
                label,
                parent,
                hooks: Mutex::new(Vec::new()),
                contexts: RwLock::new(HashMap::new()),
                invalidation: Arc::new(Invalidation {
                    owner: id,
                    dirty: AtomicBool::new(true),
                    count: AtomicUsize::new(0),
                    scheduler: RwLock::new(None),
                }),
                renders: AtomicUsize::new(0),
            }),
        }
    }

    /// Get the owner's identity.
    pub fn id(&self) -> OwnerId {
        self.shared.id
    }

    /// Label given at construction, if any.
    pub fn label(&self) -> Option<&str> {
        self.shared.label.as_deref()
    }

    /// Run one render pass.
    ///
    /// Hooks called through the [`RenderContext`] must be called in the same
    /// order on every pass. Rendering clears the dirty flag before `f` runs.
    /// Context values provided by the previous pass are withdrawn; a pass
    /// that still wants them must provide them again.
    /// Renders of one owner must not nest; rendering a child from inside its
    /// parent's render is fine.
    pub fn render<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut RenderContext<'_>) -> R,
    {
        let withdrawn = std::mem::take(&mut *self.shared.contexts.write());
        drop(withdrawn);
        let hooks = std::mem::take(&mut *self.shared.hooks.lock());
        self.shared.invalidation.dirty.store(false, Ordering::SeqCst);
        let pass = self.shared.renders.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(owner = %self.shared.id, pass, "render");

        let mut cx = RenderContext {
            owner: &self.shared,
            hooks,
            cursor: 0,
        };
        f(&mut cx)
    }

    /// Whether the owner has never rendered or a projection changed since the last render.
    pub fn needs_render(&self) -> bool {
        self.shared.invalidation.dirty.load(Ordering::SeqCst)
    }

    /// Number of completed or running render passes.
    pub fn render_count(&self) -> usize {
        self.shared.renders.load(Ordering::SeqCst)
    }

    /// Number of re-render requests raised by this owner's projections.
    pub fn invalidations(&self) -> usize {
        self.shared.invalidation.count.load(Ordering::SeqCst)
    }

    /// Call `scheduler` every time a projection asks for a re-render.
    ///
    /// Replaces any previously installed scheduler.
    pub fn on_invalidate<F>(&self, scheduler: F)
    where
        F: Fn(OwnerId) + Send + Sync + 'static,
    {
        *self.shared.invalidation.scheduler.write() = Some(Arc::new(scheduler));
    }
}

impl Default for Owner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Owner {
    fn drop(&mut self) {
        let hooks = std::mem::take(&mut *self.shared.hooks.lock());
        let count = hooks.len();
        // Dropping hooks runs effect cleanups and unsubscribes projections.
        drop(hooks);

        let contexts = std::mem::take(&mut *self.shared.contexts.write());
        drop(contexts);
        *self.shared.invalidation.scheduler.write() = None;

        debug!(owner = %self.shared.id, label = self.shared.label.as_deref(), hooks = count, "owner disposed");
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("id", &self.shared.id)
            .field("label", &self.shared.label)
            .field("renders", &self.render_count())
            .finish_non_exhaustive()
    }
}

struct EffectHook<D> {
    deps: D,
    cleanup: Option<Box<dyn FnOnce() + Send>>,
}

impl<D> EffectHook<D> {
    fn run_cleanup(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl<D> Drop for EffectHook<D> {
    fn drop(&mut self) {
        self.run_cleanup();
    }
}

/// Hook API available during [`Owner::render`].
pub struct RenderContext<'a> {
    owner: &'a OwnerShared,
    hooks: Vec<Hook>,
    cursor: usize,
}

impl RenderContext<'_> {
    /// Owner being rendered.
    pub fn owner_id(&self) -> OwnerId {
        self.owner.id
    }

    /// Scoped merge store, created on the first render and reused afterwards.
    ///
    /// On later renders `initial` only replaces what `reset` restores; the
    /// live value is untouched.
    pub fn use_store<T>(&mut self, initial: T) -> Result<Store<T>>
    where
        T: Patchable + Send + Sync + 'static,
    {
        self.store_hook(initial, StoreBuilder::new)
    }

    /// Scoped reducer store. The reducer from the first render is kept.
    pub fn use_store_with_reducer<T, A, F>(&mut self, initial: T, reducer: F) -> Result<Store<T, A>>
    where
        T: Send + Sync + 'static,
        A: Send + 'static,
        F: Fn(&T, A) -> T + Send + Sync + 'static,
    {
        self.store_hook(initial, move |initial| StoreBuilder::with_reducer(initial, reducer))
    }

    fn store_hook<T, A, B>(&mut self, initial: T, builder: B) -> Result<Store<T, A>>
    where
        T: Send + Sync + 'static,
        A: Send + 'static,
        B: FnOnce(T) -> StoreBuilder<T, A>,
    {
        let index = self.next_index();
        if let Some(store) = self.existing::<Store<T, A>>(index)? {
            store.set_reset_value(initial);
            return Ok(store.clone());
        }

        let mut builder = builder(initial);
        if let Some(label) = &self.owner.label {
            builder = builder.label(format!("{label}[{index}]"));
        }
        let store = builder.build();
        self.hooks.push(Box::new(store.clone()));
        Ok(store)
    }

    /// Selected slice of `store`, kept current for the life of the owner.
    ///
    /// The projection is seeded on the first render and re-seeded whenever
    /// `store` or `selector` changes identity. Changes to the selected value
    /// mark the owner for re-render.
    pub fn use_projection<T, S, O>(&mut self, store: &O, selector: &Selector<T, S>) -> Result<S>
    where
        O: Observable<T> + ?Sized,
        T: Send + Sync + 'static,
        S: Clone + PartialEq + Send + 'static,
    {
        let index = self.next_index();
        if let Some(projection) = self.existing::<Projection<T, S>>(index)? {
            return Ok(projection.attach(store, selector));
        }

        let invalidation = Arc::clone(&self.owner.invalidation);
        let mut projection = Projection::with_trigger(move || invalidation.fire());
        let value = projection.attach(store, selector);
        self.hooks.push(Box::new(projection));
        Ok(value)
    }

    /// Run `effect` on the first render and again whenever `deps` changes.
    ///
    /// The closure returned by `effect` runs before the next re-run and when
    /// the owner is dropped.
    pub fn use_effect<D, F, C>(&mut self, deps: D, effect: F) -> Result<()>
    where
        D: PartialEq + Send + 'static,
        F: FnOnce() -> C,
        C: FnOnce() + Send + 'static,
    {
        let index = self.next_index();
        if let Some(hook) = self.existing::<EffectHook<D>>(index)? {
            if hook.deps != deps {
                hook.run_cleanup();
                hook.deps = deps;
                hook.cleanup = Some(Box::new(effect()));
            }
            return Ok(());
        }

        let cleanup = effect();
        self.hooks.push(Box::new(EffectHook {
            deps,
            cleanup: Some(Box::new(cleanup) as Box<dyn FnOnce() + Send>),
        }));
        Ok(())
    }

    /// Make `value` available to every descendant of this owner.
    pub fn provide<T>(&mut self, context: &Context<T>, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        trace!(owner = %self.owner.id, context = context.name(), "provide");
        self.owner.contexts.write().insert(context.id(), Box::new(value));
    }

    /// Read the value the nearest ancestor provided for `context`.
    pub fn use_context<T>(&self, context: &Context<T>) -> Result<T>
    where
        T: Clone + 'static,
    {
        let id = context.id();
        let mut ancestor = self.owner.parent.as_deref();
        while let Some(owner) = ancestor {
            if let Some(value) = owner
                .contexts
                .read()
                .get(&id)
                .and_then(|value| value.downcast_ref::<T>())
            {
                return Ok(value.clone());
            }
            ancestor = owner.parent.as_deref();
        }

        Err(StoreError::MissingProvider {
            context: context.name(),
        })
    }

    fn next_index(&mut self) -> usize {
        let index = self.cursor;
        self.cursor += 1;
        index
    }

    fn existing<H: Any>(&mut self, index: usize) -> Result<Option<&mut H>> {
        let owner = self.owner.id;
        match self.hooks.get_mut(index) {
            None => Ok(None),
            Some(hook) => hook
                .downcast_mut::<H>()
                .map(Some)
                .ok_or(StoreError::HookMismatch {
                    owner,
                    index,
                    expected: type_name::<H>(),
                }),
        }
    }
}

impl Drop for RenderContext<'_> {
    fn drop(&mut self) {
        *self.owner.hooks.lock() = std::mem::take(&mut self.hooks);
    }
}
