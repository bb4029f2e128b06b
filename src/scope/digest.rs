use super::guard::isolate;
use super::scope::Scope;
use super::tree::Phase;
use super::watch::Check;
use crate::error::{Result, ScopeError};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use tracing::{debug, warn};

impl Scope {
    /// The phase this scope's tree is in, if any.
    pub fn phase(&self) -> Option<Phase> {
        self.tree().phase()
    }

    /// Run watchers across the whole tree until nothing changes.
    ///
    /// Pending `apply_async` work is flushed first, the `eval_async` queue
    /// is drained before every lap, and `post_digest` callbacks run once
    /// the tree is stable.
    ///
    /// # Errors
    ///
    /// [`ScopeError::PhaseConflict`] if called from inside a digest or
    /// apply on the same tree, [`ScopeError::DigestNotConverging`] if the
    /// tree is still dirty after the configured number of laps.
    pub fn digest(&self) -> Result<()> {
        self.root().run_digest()
    }

    /// Like [`digest`](Scope::digest), but only this scope and its
    /// descendants are re-evaluated.
    pub fn digest_local(&self) -> Result<()> {
        self.run_digest()
    }

    fn run_digest(&self) -> Result<()> {
        let tree = Rc::clone(self.tree());
        tree.begin_phase(Phase::Digest)?;
        tree.invalidate_last_dirty();

        if let Some(id) = tree.apply_async_id.get() {
            tree.scheduler.cancel(id);
            tree.flush_apply_async();
        }

        let limit = tree.config.lap_limit();
        let mut laps = 0;
        loop {
            tree.drain_async_queue();
            let dirty = self.digest_once();
            laps += 1;

            if !dirty && !tree.has_async_work() {
                break;
            }
            if laps >= limit {
                tree.clear_phase();
                warn!(scope = self.id(), ttl = limit, "Digest did not converge");
                return Err(ScopeError::DigestNotConverging { ttl: limit });
            }
        }
        tree.clear_phase();
        debug!(scope = self.id(), laps, "Digest converged");

        tree.drain_post_digest();
        Ok(())
    }

    /// One lap: evaluate every watcher from `self` down, depth first.
    ///
    /// A clean watcher that was the last dirty one ends the lap for the
    /// whole tree, siblings included: nothing has changed since it last
    /// fired. Returns whether any watcher was dirty.
    fn digest_once(&self) -> bool {
        let tree = Rc::clone(self.tree());
        let mut dirty = false;

        self.every_scope(&mut |scope: &Scope| {
            scope.prune_watchers();
            let mut next = 0;
            loop {
                let watcher = match scope.inner().watchers.borrow().get(next) {
                    Some(watcher) => Rc::clone(watcher),
                    None => return true,
                };
                next += 1;
                if watcher.is_removed() {
                    continue;
                }
                match isolate("watch", || watcher.check(scope, &tree)) {
                    Some(Check::Dirty) => dirty = true,
                    Some(Check::Settled) => return false,
                    Some(Check::Clean) | None => {}
                }
            }
        });

        dirty
    }

    /// Evaluate `expr` against this scope. Never digests.
    pub fn eval<R>(&self, expr: impl FnOnce(&Scope) -> R) -> R {
        expr(self)
    }

    /// Evaluate `expr` against this scope with an extra argument.
    pub fn eval_with<A, R>(&self, expr: impl FnOnce(&Scope, A) -> R, arg: A) -> R {
        expr(self, arg)
    }

    /// Evaluate `expr` in the apply phase, then digest from the root.
    ///
    /// The digest runs even if `expr` panics; the panic is resumed once
    /// the tree has been reconciled.
    pub fn apply<R>(&self, expr: impl FnOnce(&Scope) -> R) -> Result<R> {
        self.apply_with(|scope, ()| expr(scope), ())
    }

    /// [`apply`](Scope::apply) with an extra argument for `expr`.
    pub fn apply_with<A, R>(&self, expr: impl FnOnce(&Scope, A) -> R, arg: A) -> Result<R> {
        self.tree().begin_phase(Phase::Apply)?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.eval_with(expr, arg)));
        self.tree().clear_phase();

        let digested = self.root().run_digest();
        match outcome {
            Ok(value) => digested.map(|()| value),
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}
