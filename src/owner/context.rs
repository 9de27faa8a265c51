use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Key for a value handed down from an owner to its descendants.
///
/// Contexts can be declared as `static` items. The value type is part of the
/// key, so a consumer always gets back exactly the type the provider stored.
///
/// ```
/// use partyline::{Context, Owner, Store, StoreError};
/// use std::collections::BTreeMap;
///
/// static COUNTS: Context<Store<BTreeMap<String, i32>>> = Context::new("counts");
///
/// let app = Owner::new();
/// let row = app.child();
///
/// app.render(|cx| -> Result<(), StoreError> {
///     let store = cx.use_store(BTreeMap::new())?;
///     cx.provide(&COUNTS, store);
///     row.render(|cx| -> Result<(), StoreError> {
///         let store = cx.use_context(&COUNTS)?;
///         assert!(store.get().is_empty());
///         Ok(())
///     })
/// })
/// .unwrap();
///
/// // Without an ancestor provider the read fails loudly.
/// let orphan = Owner::new();
/// let err = orphan.render(|cx| cx.use_context(&COUNTS)).unwrap_err();
/// assert_eq!(err, StoreError::MissingProvider { context: "counts" });
/// ```
pub struct Context<T> {
    name: &'static str,
    id: OnceLock<ContextId>,
    _marker: PhantomData<fn() -> T>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ContextId(u64);

impl<T> Context<T> {
    /// Declare a context. `name` appears in error messages.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            id: OnceLock::new(),
            _marker: PhantomData,
        }
    }

    /// Name given at declaration.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn id(&self) -> ContextId {
        *self.id.get_or_init(|| {
            static NEXT: AtomicU64 = AtomicU64::new(1);
            ContextId(NEXT.fetch_add(1, Ordering::Relaxed))
        })
    }
}

impl<T> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_with_same_name_are_distinct() {
        let first: Context<i32> = Context::new("n");
        let second: Context<i32> = Context::new("n");

        assert_ne!(first.id(), second.id());
        assert_eq!(first.id(), first.id());
        assert_eq!(first.name(), "n");
    }
}
