use super::scope::{Scope, ScopeInner};
use super::tree::{TreeState, WatchId};
use crate::value::{equal, Comparison, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

/// Reads the watched value from a scope.
pub type ReadFn = Box<dyn Fn(&Scope) -> Value>;

/// Reacts to a change: `(new, old, scope)`. On the first call `old` is the
/// new value.
pub type Listener = Box<dyn Fn(&Value, &Value, &Scope)>;

/// Outcome of evaluating one watcher in a lap.
pub(crate) enum Check {
    Dirty,
    Clean,
    /// Clean, and the most recent dirty watcher: the tree is stable.
    Settled,
}

pub(crate) struct Watcher {
    id: WatchId,
    read: ReadFn,
    listener: Option<Listener>,
    comparison: Comparison,
    /// `None` until the first evaluation.
    last: RefCell<Option<Value>>,
    removed: Cell<bool>,
}

impl Watcher {
    pub(crate) fn is_removed(&self) -> bool {
        self.removed.get()
    }

    /// Evaluate against `scope`, firing the listener if the value changed.
    pub(crate) fn check(&self, scope: &Scope, tree: &TreeState) -> Check {
        let value = (self.read)(scope);
        let changed = match &*self.last.borrow() {
            Some(last) => !equal(&value, last, self.comparison),
            None => true,
        };

        if !changed {
            return if tree.last_dirty.get() == Some(self.id) {
                Check::Settled
            } else {
                Check::Clean
            };
        }

        tree.last_dirty.set(Some(self.id));
        let previous = self.last.replace(Some(self.comparison.capture(&value)));
        let old = previous.unwrap_or_else(|| value.clone());
        trace!(watcher = self.id, scope = scope.id(), ?value, "Watcher dirty");
        if let Some(listener) = &self.listener {
            listener(&value, &old, scope);
        }
        Check::Dirty
    }
}

/// Unregisters what a `watch` call registered.
///
/// Removal is explicit: dropping the handle leaves the watcher in place.
/// [`remove`](WatchHandle::remove) is idempotent.
pub struct WatchHandle {
    scope: Weak<ScopeInner>,
    watchers: Vec<Rc<Watcher>>,
    cancelled: Rc<Cell<bool>>,
}

impl WatchHandle {
    fn new(scope: &Scope, watchers: Vec<Rc<Watcher>>, cancelled: Rc<Cell<bool>>) -> Self {
        Self {
            scope: Rc::downgrade(scope.inner()),
            watchers,
            cancelled,
        }
    }

    /// Stop watching. A removed watcher never fires again, even later in
    /// the digest that is running when it is removed.
    pub fn remove(&self) {
        if self.cancelled.replace(true) {
            return;
        }
        for watcher in &self.watchers {
            watcher.removed.set(true);
        }
        if let Some(scope) = self.scope.upgrade().map(Scope::from_inner) {
            scope.tree().invalidate_last_dirty();
            // Mid-digest the lap prunes on its next visit instead.
            if scope.tree().phase().is_none() {
                scope.prune_watchers();
            }
        }
    }

    pub fn is_removed(&self) -> bool {
        self.cancelled.get()
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("watchers", &self.watchers.len())
            .field("removed", &self.cancelled.get())
            .finish()
    }
}

/// Values and bookkeeping shared by the members of one watch group.
struct GroupState {
    new_values: RefCell<Vec<Value>>,
    old_values: RefCell<Vec<Value>>,
    scheduled: Cell<bool>,
    first_run: Cell<bool>,
}

impl GroupState {
    fn fire<F>(&self, listener: &F, scope: &Scope)
    where
        F: Fn(&[Value], &[Value], &Scope),
    {
        self.scheduled.set(false);
        let new_values = self.new_values.borrow().clone();
        if self.first_run.replace(false) {
            listener(new_values.as_slice(), new_values.as_slice(), scope);
        } else {
            let old_values = self.old_values.borrow().clone();
            listener(new_values.as_slice(), old_values.as_slice(), scope);
        }
    }
}

impl Scope {
    /// Watch a value by identity.
    ///
    /// `listener` fires on the first digest and then whenever `read`
    /// returns a value that is not [`same`](Value::same) as the last one.
    pub fn watch<R, L>(&self, read: R, listener: L) -> WatchHandle
    where
        R: Fn(&Scope) -> Value + 'static,
        L: Fn(&Value, &Value, &Scope) + 'static,
    {
        self.watch_with(Box::new(read), Some(Box::new(listener)), Comparison::Reference)
    }

    /// Watch a value structurally: in-place changes to arrays and objects
    /// count as changes.
    pub fn watch_deep<R, L>(&self, read: R, listener: L) -> WatchHandle
    where
        R: Fn(&Scope) -> Value + 'static,
        L: Fn(&Value, &Value, &Scope) + 'static,
    {
        self.watch_with(Box::new(read), Some(Box::new(listener)), Comparison::Deep)
    }

    /// Register a watcher. Without a listener the read still runs on every
    /// lap and still takes part in change detection.
    ///
    /// A watcher registered during a digest is evaluated in that digest.
    pub fn watch_with(
        &self,
        read: ReadFn,
        listener: Option<Listener>,
        comparison: Comparison,
    ) -> WatchHandle {
        let watcher = self.register(read, listener, comparison);
        WatchHandle::new(self, vec![watcher], Rc::new(Cell::new(false)))
    }

    /// Watch several values with one listener.
    ///
    /// The listener runs at most once per digest, from the async queue,
    /// with the current and previous values in `reads` order. On its first
    /// call both slices are the same slice (compare with
    /// [`std::ptr::eq`]). With no reads the listener runs exactly once,
    /// with two distinct empty slices, unless the handle is removed first.
    pub fn watch_group<F>(&self, reads: Vec<ReadFn>, listener: F) -> WatchHandle
    where
        F: Fn(&[Value], &[Value], &Scope) + 'static,
    {
        let listener = Rc::new(listener);
        let cancelled = Rc::new(Cell::new(false));

        if reads.is_empty() {
            let cancelled_flag = Rc::clone(&cancelled);
            self.eval_async(move |scope| {
                if !cancelled_flag.get() {
                    // Separate allocations, so the slices never compare
                    // equal under `ptr::eq` like an initial call does.
                    let new_values: Vec<Value> = Vec::with_capacity(1);
                    let old_values: Vec<Value> = Vec::with_capacity(1);
                    listener(new_values.as_slice(), old_values.as_slice(), scope);
                }
            });
            return WatchHandle::new(self, Vec::new(), cancelled);
        }

        let state = Rc::new(GroupState {
            new_values: RefCell::new(vec![Value::Undefined; reads.len()]),
            old_values: RefCell::new(vec![Value::Undefined; reads.len()]),
            scheduled: Cell::new(false),
            first_run: Cell::new(true),
        });

        let watchers = reads
            .into_iter()
            .enumerate()
            .map(|(i, read)| {
                let state = Rc::clone(&state);
                let listener = Rc::clone(&listener);
                let cancelled = Rc::clone(&cancelled);
                let on_change: Listener = Box::new(move |new: &Value, old: &Value, scope: &Scope| {
                    state.new_values.borrow_mut()[i] = new.clone();
                    state.old_values.borrow_mut()[i] = old.clone();
                    if state.scheduled.replace(true) {
                        return;
                    }
                    let state = Rc::clone(&state);
                    let listener = Rc::clone(&listener);
                    let cancelled = Rc::clone(&cancelled);
                    scope.eval_async(move |scope| {
                        if !cancelled.get() {
                            state.fire(&*listener, scope);
                        }
                    });
                });
                self.register(read, Some(on_change), Comparison::Reference)
            })
            .collect();

        WatchHandle::new(self, watchers, cancelled)
    }

    fn register(
        &self,
        read: ReadFn,
        listener: Option<Listener>,
        comparison: Comparison,
    ) -> Rc<Watcher> {
        let tree = self.tree();
        let watcher = Rc::new(Watcher {
            id: tree.next_watch_id(),
            read,
            listener,
            comparison,
            last: RefCell::new(None),
            removed: Cell::new(false),
        });
        self.inner().watchers.borrow_mut().push(Rc::clone(&watcher));
        tree.invalidate_last_dirty();
        watcher
    }

    /// Drop removed watchers from this scope's list.
    pub(crate) fn prune_watchers(&self) {
        let mut watchers = self.inner().watchers.borrow_mut();
        if watchers.iter().any(|watcher| watcher.is_removed()) {
            watchers.retain(|watcher| !watcher.is_removed());
        }
    }
}
