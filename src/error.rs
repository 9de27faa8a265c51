//! Errors reported by owners, hooks and the context bridge.
//!
//! The store engine itself never fails: writes are infallible and
//! re-entrant writes are queued. Only misuse of the owner/context layer
//! surfaces as an error.

use crate::owner::OwnerId;

/// Errors returned by the hook and context APIs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A consumer read a context that no ancestor owner provided.
    #[error("context `{context}` was read outside of a provider")]
    MissingProvider {
        /// Name the context was created with.
        context: &'static str,
    },

    /// A hook slot held a different kind of hook than the one requested.
    ///
    /// Hooks must be called in the same order on every render of an owner.
    #[error("hook #{index} of {owner} is not a `{expected}`; hooks must run in the same order every render")]
    HookMismatch {
        /// Owner whose hook list diverged.
        owner: OwnerId,
        /// Position of the offending hook within the render.
        index: usize,
        /// Type the caller asked for.
        expected: &'static str,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
