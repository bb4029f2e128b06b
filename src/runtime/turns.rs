use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Work handed to a [`Scheduler`] to run on a later turn.
pub type Task = Box<dyn FnOnce()>;

/// Handle for cancelling a deferred task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Deferred-execution primitive used by scopes.
///
/// Implementations run each task once, after the current synchronous work
/// has finished. No ordering is promised between independently deferred
/// tasks. A cancelled task must never run.
pub trait Scheduler {
    /// Schedule `task` for a later turn.
    fn defer(&self, task: Task) -> TaskId;

    /// Drop a pending task. Unknown or already-run ids are ignored.
    fn cancel(&self, id: TaskId);
}

struct TurnsInner {
    next_id: Cell<u64>,
    pending: RefCell<VecDeque<(TaskId, Task)>>,
}

/// A single-threaded queue of deferred turns, drained by the caller.
///
/// Every task runs on its own turn, in the order it was deferred. Tasks
/// deferred while a turn is running wait behind the ones already queued.
///
/// # Examples
///
/// ```
/// use dirtyscope::runtime::{Scheduler, TurnQueue};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let turns = TurnQueue::new();
/// let ran = Rc::new(Cell::new(false));
/// let flag = ran.clone();
///
/// turns.defer(Box::new(move || flag.set(true)));
/// assert!(!ran.get());
///
/// turns.run_until_idle();
/// assert!(ran.get());
/// ```
#[derive(Clone)]
pub struct TurnQueue {
    inner: Rc<TurnsInner>,
}

// Thread-local stack for scoped turn queues
thread_local! {
    static TURN_STACK: RefCell<Vec<TurnQueue>> = const { RefCell::new(Vec::new()) };
    static DEFAULT_TURNS: TurnQueue = TurnQueue::new();
}

impl TurnQueue {
    /// Create an independent, empty queue.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TurnsInner {
                next_id: Cell::new(0),
                pending: RefCell::new(VecDeque::new()),
            }),
        }
    }

    /// Get the current queue (scoped or the thread's default).
    ///
    /// Returns the queue from the top of the thread-local stack, or the
    /// thread's default queue if no scoped queue is active.
    pub fn current() -> Self {
        TURN_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .cloned()
                .unwrap_or_else(|| DEFAULT_TURNS.with(TurnQueue::clone))
        })
    }

    /// Run a function with a fresh queue as the current one.
    ///
    /// Scopes built inside `f` with [`Scope::new`](crate::Scope::new) defer
    /// onto this queue.
    ///
    /// ```
    /// use dirtyscope::runtime::TurnQueue;
    /// use dirtyscope::Scope;
    ///
    /// TurnQueue::scope(|turns| {
    ///     let scope = Scope::new();
    ///     scope.eval_async(|scope| scope.set("ran", true));
    ///     assert_eq!(turns.pending(), 1);
    ///
    ///     turns.run_until_idle();
    ///     assert_eq!(scope.get("ran").as_bool(), Some(true));
    /// });
    /// ```
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce(&TurnQueue) -> R,
    {
        let turns = Self::new();
        Self::with_current(turns.clone(), || f(&turns))
    }

    /// Run a function with `turns` pushed as the current queue.
    pub fn with_current<F, R>(turns: TurnQueue, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        TURN_STACK.with(|stack| {
            stack.borrow_mut().push(turns);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        TURN_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Number of tasks waiting for a turn.
    pub fn pending(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Run the oldest pending task. Returns `false` if there was none.
    pub fn run_next(&self) -> bool {
        // Release the borrow before running: tasks may defer more work.
        let next = self.inner.pending.borrow_mut().pop_front();
        match next {
            Some((id, task)) => {
                trace!(?id, "Running deferred turn");
                task();
                true
            }
            None => false,
        }
    }

    /// Run turns until the queue is empty. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl Default for TurnQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TurnQueue {
    fn defer(&self, task: Task) -> TaskId {
        let id = TaskId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner.pending.borrow_mut().push_back((id, task));
        id
    }

    fn cancel(&self, id: TaskId) {
        self.inner.pending.borrow_mut().retain(|(queued, _)| *queued != id);
    }
}

impl fmt::Debug for TurnQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_in_deferral_order() {
        let turns = TurnQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            turns.defer(Box::new(move || log.borrow_mut().push(i)));
        }

        assert_eq!(turns.run_until_idle(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn cancelled_tasks_never_run() {
        let turns = TurnQueue::new();
        let ran = Rc::new(Cell::new(0));

        let first = {
            let ran = ran.clone();
            turns.defer(Box::new(move || ran.set(ran.get() + 1)))
        };
        {
            let ran = ran.clone();
            turns.defer(Box::new(move || ran.set(ran.get() + 10)));
        }
        turns.cancel(first);
        turns.cancel(first);

        turns.run_until_idle();
        assert_eq!(ran.get(), 10);
    }

    #[test]
    fn tasks_deferred_during_a_turn_wait() {
        let turns = TurnQueue::new();
        let inner = turns.clone();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();

        turns.defer(Box::new(move || {
            inner.defer(Box::new(move || flag.set(true)));
        }));

        assert!(turns.run_next());
        assert!(!ran.get());
        assert_eq!(turns.pending(), 1);
        assert!(turns.run_next());
        assert!(ran.get());
        assert!(!turns.run_next());
    }

    #[test]
    fn scoped_queue_is_current_only_inside() {
        let outer = TurnQueue::current();
        TurnQueue::scope(|turns| {
            let current = TurnQueue::current();
            assert!(Rc::ptr_eq(&current.inner, &turns.inner));
            assert!(!Rc::ptr_eq(&current.inner, &outer.inner));
        });
        assert!(Rc::ptr_eq(&TurnQueue::current().inner, &outer.inner));
    }
}
