use super::guard::isolate;
use super::scope::Scope;
use super::tree::{QueuedExpr, TreeState};
use tracing::{error, trace};

impl Scope {
    /// Run `expr` later in the current digest, or in a digest started on
    /// a later turn when none is running.
    ///
    /// The later-turn digest is scheduled only when nothing is in progress
    /// and the queue was empty, and it does nothing if another digest has
    /// drained the queue first.
    pub fn eval_async(&self, expr: impl FnOnce(&Scope) + 'static) {
        let tree = self.tree();
        if tree.phase().is_none() && !tree.has_async_work() {
            let root = tree.root.clone();
            tree.scheduler.defer(Box::new(move || {
                let Some(root) = root.upgrade().map(Scope::from_inner) else {
                    return;
                };
                if !root.tree().has_async_work() {
                    trace!("Async queue already drained");
                    return;
                }
                if let Err(err) = root.digest() {
                    error!(%err, "Deferred digest failed");
                }
            }));
        }
        tree.async_queue
            .borrow_mut()
            .push_back(QueuedExpr::new(self.clone(), Box::new(expr)));
    }

    /// Queue `expr` for one coalesced `apply` on a later turn.
    ///
    /// Any number of calls before that turn share a single deferred apply.
    /// A digest that starts first runs the queued work itself and cancels
    /// the deferred apply.
    pub fn apply_async(&self, expr: impl FnOnce(&Scope) + 'static) {
        let tree = self.tree();
        tree.apply_async_queue
            .borrow_mut()
            .push_back(QueuedExpr::new(self.clone(), Box::new(expr)));

        if tree.apply_async_id.get().is_some() {
            return;
        }
        let root = tree.root.clone();
        let id = tree.scheduler.defer(Box::new(move || {
            let Some(root) = root.upgrade().map(Scope::from_inner) else {
                return;
            };
            let flushed = root.apply(|scope| scope.tree().flush_apply_async());
            if let Err(err) = flushed {
                error!(%err, "Deferred apply failed");
            }
        }));
        tree.apply_async_id.set(Some(id));
    }

    /// Run `callback` once, after the next digest has converged.
    pub fn post_digest(&self, callback: impl FnOnce() + 'static) {
        self.tree()
            .post_digest_queue
            .borrow_mut()
            .push_back(Box::new(callback));
    }
}

impl TreeState {
    pub(super) fn drain_async_queue(&self) {
        loop {
            let next = self.async_queue.borrow_mut().pop_front();
            let Some(task) = next else { break };
            isolate("eval_async", || task.run());
        }
    }

    /// Runs queued `apply_async` work, including work queued by it, then
    /// releases the pending handle.
    pub(super) fn flush_apply_async(&self) {
        loop {
            let next = self.apply_async_queue.borrow_mut().pop_front();
            let Some(task) = next else { break };
            isolate("apply_async", || task.run());
        }
        self.apply_async_id.set(None);
    }

    /// Runs the callbacks queued so far. Callbacks queued while this runs
    /// wait for the next digest.
    pub(super) fn drain_post_digest(&self) {
        let batch = std::mem::take(&mut *self.post_digest_queue.borrow_mut());
        for callback in batch {
            isolate("post_digest", callback);
        }
    }
}
