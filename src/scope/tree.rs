use super::scope::{Scope, ScopeInner};
use crate::config::DigestConfig;
use crate::error::{Result, ScopeError};
use crate::runtime::{Scheduler, TaskId};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

/// What a tree is busy doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Digest,
    Apply,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Digest => f.write_str("$digest"),
            Phase::Apply => f.write_str("$apply"),
        }
    }
}

pub(crate) type WatchId = u64;

/// An expression queued against the scope that scheduled it.
pub(crate) struct QueuedExpr {
    scope: Scope,
    expr: Box<dyn FnOnce(&Scope)>,
}

impl QueuedExpr {
    pub(crate) fn new(scope: Scope, expr: Box<dyn FnOnce(&Scope)>) -> Self {
        Self { scope, expr }
    }

    pub(crate) fn run(self) {
        self.scope.eval(self.expr)
    }
}

/// State owned by a root and shared by every scope in its tree.
pub(crate) struct TreeState {
    pub(super) config: DigestConfig,
    pub(super) scheduler: Rc<dyn Scheduler>,
    pub(super) root: Weak<ScopeInner>,
    phase: Cell<Option<Phase>>,
    pub(super) last_dirty: Cell<Option<WatchId>>,
    next_watch_id: Cell<WatchId>,
    next_scope_id: Cell<u64>,
    pub(super) async_queue: RefCell<VecDeque<QueuedExpr>>,
    pub(super) apply_async_queue: RefCell<VecDeque<QueuedExpr>>,
    pub(super) apply_async_id: Cell<Option<TaskId>>,
    pub(super) post_digest_queue: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

impl TreeState {
    pub(super) fn new(
        config: DigestConfig,
        scheduler: Rc<dyn Scheduler>,
        root: Weak<ScopeInner>,
    ) -> Self {
        Self {
            config,
            scheduler,
            root,
            phase: Cell::new(None),
            last_dirty: Cell::new(None),
            next_watch_id: Cell::new(0),
            // The root takes id 0.
            next_scope_id: Cell::new(1),
            async_queue: RefCell::new(VecDeque::new()),
            apply_async_queue: RefCell::new(VecDeque::new()),
            apply_async_id: Cell::new(None),
            post_digest_queue: RefCell::new(VecDeque::new()),
        }
    }

    pub(super) fn phase(&self) -> Option<Phase> {
        self.phase.get()
    }

    pub(super) fn begin_phase(&self, requested: Phase) -> Result<()> {
        if let Some(active) = self.phase.get() {
            return Err(ScopeError::PhaseConflict { active, requested });
        }
        self.phase.set(Some(requested));
        Ok(())
    }

    pub(super) fn clear_phase(&self) {
        self.phase.set(None);
    }

    pub(super) fn next_watch_id(&self) -> WatchId {
        let id = self.next_watch_id.get();
        self.next_watch_id.set(id + 1);
        id
    }

    pub(super) fn next_scope_id(&self) -> u64 {
        let id = self.next_scope_id.get();
        self.next_scope_id.set(id + 1);
        id
    }

    /// Forget the short-circuit target so the next lap runs in full.
    pub(super) fn invalidate_last_dirty(&self) {
        self.last_dirty.set(None);
    }

    pub(super) fn has_async_work(&self) -> bool {
        !self.async_queue.borrow().is_empty()
    }

    pub(super) fn root_scope(&self) -> Option<Scope> {
        self.root.upgrade().map(Scope::from_inner)
    }
}
