//! The store engine.
//!
//! A [`Store`] owns a value and a set of [`Subscriber`]s. Writes go through a
//! reducer (or the default shallow merge) and every subscriber is notified
//! synchronously before the write returns.

mod global;
mod registry;
mod store;
mod update;

pub use global::{create_global_store, create_global_store_with_reducer, GlobalStores};
pub use registry::{Subscriber, SubscriberId, Subscription};
pub use store::{Observable, ReadStore, Reducer, Store, StoreBuilder, StoreId};
pub use update::{Patchable, Update};
