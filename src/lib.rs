//! # dirtyscope
//!
//! Dirty-checking state scopes with a digest loop.
//!
//! A [`Scope`] is a property bag with an ordered set of watchers. Scopes
//! form a tree: children either read through to their parent's properties
//! or are isolated, but every scope in a tree shares one root and one set
//! of deferred-work queues.
//!
//! ## Digest
//!
//! [`Scope::digest`] re-evaluates every watcher in the tree, firing
//! listeners for values that changed, and repeats until a full lap sees no
//! change. A graph that keeps changing fails with
//! [`ScopeError::DigestNotConverging`] after ten laps.
//!
//! ## Deferred work
//!
//! - [`Scope::eval_async`]: later in the current digest, or a digest on a
//!   later turn
//! - [`Scope::apply_async`]: coalesced into one apply on a later turn
//! - [`Scope::post_digest`]: once the next digest has converged
//!
//! Later turns come from a [`runtime::Scheduler`]; [`runtime::TurnQueue`] is
//! the single-threaded default.

pub mod config;
pub mod error;
pub mod runtime;
pub mod scope;
pub mod value;

// Re-export main types for convenience
pub use config::DigestConfig;
pub use error::{Result, ScopeError};
pub use scope::{Listener, Phase, ReadFn, Scope, ScopeBuilder, WatchHandle};
pub use value::{equal, Comparison, Value};
