//! Dirty-checked scopes.
//!
//! This module provides the scope tree and the engine that converges it:
//! - `Scope`: property bag, watchers, children
//! - Digest: repeated full-tree laps until no watcher is dirty
//! - Deferred work: `eval_async`, `apply_async` and `post_digest` queues
//!   shared by every scope in a tree

mod digest;
mod guard;
mod queue;
#[allow(clippy::module_inception)]
mod scope;
mod tree;
mod watch;

pub use scope::{Scope, ScopeBuilder};
pub use tree::Phase;
pub use watch::{Listener, ReadFn, WatchHandle};
