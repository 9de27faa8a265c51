//! # Partyline
//!
//! Shared state stores with synchronous subscriptions, for any view layer.
//!
//! Partyline provides two levels of abstraction for sharing state between
//! parts of an application:
//!
//! ## Stores (Core engine)
//!
//! Plain state containers that know nothing about rendering:
//! - `Store<T, A>` - A value, a reducer and a set of subscribers
//! - `Subscriber<T>` - Identity-compared callbacks, called once on subscribe
//!   and after every write
//! - `Update<T>` / `patchable!` - Shallow-merge updates for the default reducer
//! - `create_global_store` - Stores that live for the whole process
//!
//! ## Owners and projections (View bridge)
//!
//! The glue a view framework needs to consume stores:
//! - `Projection<T, S>` - A consumer's selected slice, re-rendering only on change
//! - `Owner` - A component instance holding scoped stores, projections and effects
//! - `Context<T>` - Hand a store down the owner tree without threading it through
//!
//! Writes are synchronous: when `set` returns, every subscriber has seen the
//! new value. A write issued from inside a subscriber or reducer of the same
//! store is queued and applied once the running notification pass ends.

pub mod error;
pub mod owner;
pub mod projection;
pub mod store;

// Re-export main types for convenience
pub use error::{Result, StoreError};
pub use owner::{Context, Owner, OwnerId, RenderContext};
pub use projection::{Projection, Selector, SelectorId};
pub use store::{
    create_global_store, create_global_store_with_reducer, GlobalStores, Observable, Patchable,
    ReadStore, Reducer, Store, StoreBuilder, StoreId, Subscriber, SubscriberId, Subscription,
    Update,
};

#[doc(hidden)]
pub mod __private {
    pub use paste::paste;
}
