//! Process-wide stores.
//!
//! A global store is registered in [`GlobalStores`] when it is created and
//! stays registered until the process exits. Callers reach a global store by
//! sharing its handle; the registry keeps it alive but offers no lookup by
//! name and no way to remove an entry.

use crate::store::store::{Store, StoreBuilder, StoreId};
use crate::store::update::{Patchable, Update};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

/// Registry of every global store created in this process.
pub struct GlobalStores {
    entries: RwLock<HashMap<StoreId, Box<dyn Any + Send + Sync>>>,
}

impl GlobalStores {
    /// Get the process-wide registry, creating it on first use.
    pub fn global() -> &'static GlobalStores {
        static REGISTRY: OnceLock<GlobalStores> = OnceLock::new();
        REGISTRY.get_or_init(|| GlobalStores {
            entries: RwLock::new(HashMap::new()),
        })
    }

    pub(crate) fn register<T, A>(&self, store: &Store<T, A>)
    where
        T: Send + Sync + 'static,
        A: Send + 'static,
    {
        let mut entries = self.entries.write();
        entries.insert(store.id(), Box::new(store.clone()));
        debug!(store = %store.id(), label = store.label(), total = entries.len(), "global store registered");
    }

    /// Whether a store with this id was created as a global store.
    pub fn contains(&self, id: StoreId) -> bool {
        self.entries.read().contains_key(&id)
    }

    /// Number of global stores created so far.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no global store has been created yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Create a merge store that lives for the rest of the process.
///
/// Every call mints an independent store, even for equal initial values.
///
/// ```
/// use partyline::{create_global_store, GlobalStores};
/// use serde_json::json;
///
/// let settings = create_global_store(json!({ "theme": "dark" }));
/// settings.patch(json!({ "theme": "light" }));
///
/// assert_eq!(settings.get()["theme"], "light");
/// assert!(GlobalStores::global().contains(settings.id()));
/// ```
pub fn create_global_store<T>(initial: T) -> Store<T, Update<T>>
where
    T: Patchable + Send + Sync + 'static,
{
    StoreBuilder::new(initial).build_global()
}

/// Create a reducer store that lives for the rest of the process.
pub fn create_global_store_with_reducer<T, A, F>(initial: T, reducer: F) -> Store<T, A>
where
    T: Send + Sync + 'static,
    A: Send + 'static,
    F: Fn(&T, A) -> T + Send + Sync + 'static,
{
    StoreBuilder::with_reducer(initial, reducer).build_global()
}
