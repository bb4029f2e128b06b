//! Runtime support for deferred work.
//!
//! This module provides the deferred-execution primitive scopes use to
//! schedule digests on a later turn, and a single-threaded turn queue that
//! implements it.

mod turns;

pub use turns::{Scheduler, Task, TaskId, TurnQueue};
