//! Selector-based derived values.
//!
//! A [`Projection`] is the piece a view layer embeds in each consumer: it
//! keeps a locally selected slice of a store up to date and pokes a
//! re-render trigger only when that slice changes.

mod projection;

pub use projection::{Projection, Selector, SelectorId};
