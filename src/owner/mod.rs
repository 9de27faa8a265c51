//! Component owners and context.
//!
//! An [`Owner`] stands in for one mounted UI component: it holds the hook
//! state that scoped stores and projections need between renders, and the
//! context values it provides to its descendants.

mod context;
mod owner;

pub use context::Context;
pub(crate) use context::ContextId;
pub use owner::{Owner, OwnerId, RenderContext};
