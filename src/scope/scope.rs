use super::tree::TreeState;
use super::watch::Watcher;
use crate::config::DigestConfig;
use crate::runtime::{Scheduler, TurnQueue};
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// A scope's own properties plus read access to its data parent's.
struct PropertyBag {
    own: RefCell<IndexMap<String, Value>>,
    parent: Option<Rc<PropertyBag>>,
}

impl PropertyBag {
    fn detached() -> Rc<Self> {
        Rc::new(Self {
            own: RefCell::new(IndexMap::new()),
            parent: None,
        })
    }

    fn inheriting(parent: &Rc<PropertyBag>) -> Rc<Self> {
        Rc::new(Self {
            own: RefCell::new(IndexMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.own.borrow().get(key) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(key))
    }
}

pub(crate) struct ScopeInner {
    id: u64,
    bag: Rc<PropertyBag>,
    pub(super) watchers: RefCell<Vec<Rc<Watcher>>>,
    pub(super) children: RefCell<Vec<Scope>>,
    parent: Option<Weak<ScopeInner>>,
    pub(super) tree: Rc<TreeState>,
}

/// A node in a tree of dirty-checked state.
///
/// A scope holds a property bag and an ordered list of watchers. Calling
/// [`digest`](Scope::digest) re-evaluates every watcher in the tree until
/// nothing changes, invoking listeners along the way.
///
/// `Scope` is a cheap handle: clones refer to the same node.
///
/// # Examples
///
/// ```
/// use dirtyscope::{Scope, Value};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let scope = Scope::new();
/// let calls = Rc::new(Cell::new(0));
///
/// scope.set("name", "Jane");
/// scope.watch(|scope| scope.get("name"), {
///     let calls = calls.clone();
///     move |_new: &Value, _old: &Value, _scope: &Scope| calls.set(calls.get() + 1)
/// });
///
/// scope.digest().unwrap();
/// assert_eq!(calls.get(), 1);
///
/// scope.apply(|scope| scope.set("name", "Bob")).unwrap();
/// assert_eq!(calls.get(), 2);
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

/// Builds a root scope.
#[derive(Default)]
pub struct ScopeBuilder {
    config: DigestConfig,
    scheduler: Option<Rc<dyn Scheduler>>,
}

impl ScopeBuilder {
    pub fn config(mut self, config: DigestConfig) -> Self {
        self.config = config;
        self
    }

    /// Shorthand for a config with the given lap limit.
    pub fn ttl(mut self, ttl: usize) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Where the tree defers its later-turn work. Defaults to
    /// [`TurnQueue::current`].
    pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn build(self) -> Scope {
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Rc::new(TurnQueue::current()));
        let config = self.config;
        let inner = Rc::new_cyclic(|root| ScopeInner {
            id: 0,
            bag: PropertyBag::detached(),
            watchers: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            parent: None,
            tree: Rc::new(TreeState::new(config, scheduler, root.clone())),
        });
        Scope { inner }
    }
}

impl Scope {
    /// Create a root scope with default settings, deferring onto the
    /// current [`TurnQueue`].
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ScopeBuilder {
        ScopeBuilder::default()
    }

    pub(crate) fn from_inner(inner: Rc<ScopeInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Rc<ScopeInner> {
        &self.inner
    }

    pub(crate) fn tree(&self) -> &Rc<TreeState> {
        &self.inner.tree
    }

    /// Identifier unique within this scope's tree. The root is `0`.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Read a property, falling back through data parents. Missing keys
    /// read as `Undefined`.
    pub fn get(&self, key: &str) -> Value {
        self.inner.bag.lookup(key).unwrap_or_default()
    }

    /// Write a property on this scope. Data parents are never touched.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .bag
            .own
            .borrow_mut()
            .insert(key.into(), value.into());
    }

    /// Read-modify-write: `f` sees the inherited value, the result is
    /// written on this scope.
    pub fn update<F>(&self, key: &str, f: F)
    where
        F: FnOnce(&Value) -> Value,
    {
        let next = f(&self.get(key));
        self.set(key, next);
    }

    /// Whether the key is visible here, own or inherited.
    pub fn has(&self, key: &str) -> bool {
        self.inner.bag.lookup(key).is_some()
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.inner.bag.own.borrow().contains_key(key)
    }

    /// Remove an own property, uncovering any inherited one.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.bag.own.borrow_mut().shift_remove(key)
    }

    /// Create a scope in this tree.
    ///
    /// A non-isolated scope reads through to this scope's properties. An
    /// isolated one starts with an empty bag. Either way it joins the
    /// children of `parent` (defaulting to `self`) and shares that parent's
    /// root, queues and settings.
    pub fn new_scope(&self, isolated: bool, parent: Option<&Scope>) -> Scope {
        let parent = parent.unwrap_or(self);
        let bag = if isolated {
            PropertyBag::detached()
        } else {
            PropertyBag::inheriting(&self.inner.bag)
        };
        let tree = Rc::clone(&parent.inner.tree);
        let child = Scope {
            inner: Rc::new(ScopeInner {
                id: tree.next_scope_id(),
                bag,
                watchers: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
                parent: Some(Rc::downgrade(&parent.inner)),
                tree,
            }),
        };
        parent.inner.children.borrow_mut().push(child.clone());
        child
    }

    /// Non-isolated child of `self`.
    pub fn new_child(&self) -> Scope {
        self.new_scope(false, None)
    }

    /// Isolated child of `self`.
    pub fn new_isolated_child(&self) -> Scope {
        self.new_scope(true, None)
    }

    /// Detach this scope from its structural parent so later digests no
    /// longer reach it or its descendants. No-op on the root.
    pub fn destroy(&self) {
        if let Some(parent) = self.parent() {
            parent
                .inner
                .children
                .borrow_mut()
                .retain(|child| !Rc::ptr_eq(&child.inner, &self.inner));
        }
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// The structural parent, if this is not a root and the parent is alive.
    pub fn parent(&self) -> Option<Scope> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Scope::from_inner)
    }

    /// The root of this scope's tree. Falls back to `self` once the root
    /// has been dropped.
    pub fn root(&self) -> Scope {
        self.inner
            .tree
            .root_scope()
            .unwrap_or_else(|| self.clone())
    }

    pub fn children(&self) -> Vec<Scope> {
        self.inner.children.borrow().clone()
    }

    /// Number of live watchers registered on this scope.
    pub fn watcher_count(&self) -> usize {
        self.inner
            .watchers
            .borrow()
            .iter()
            .filter(|watcher| !watcher.is_removed())
            .count()
    }

    /// Depth-first pre-order walk. Stops the whole walk as soon as `f`
    /// returns `false`; returns whether it ran to the end.
    ///
    /// Children are captured per node before descending, so a scope
    /// destroyed mid-walk may still be visited by this walk. Uses an
    /// explicit stack, so tree depth is bounded by memory, not call depth.
    pub(crate) fn every_scope<F>(&self, f: &mut F) -> bool
    where
        F: FnMut(&Scope) -> bool,
    {
        let mut pending = vec![self.clone()];
        while let Some(scope) = pending.pop() {
            if !f(&scope) {
                return false;
            }
            pending.extend(scope.children().into_iter().rev());
        }
        true
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Scope {}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("watchers", &self.watcher_count())
            .field("children", &self.inner.children.borrow().len())
            .field("phase", &self.inner.tree.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_be_used_as_a_property_bag() {
        let scope = Scope::new();
        scope.set("aProperty", 1);

        assert_eq!(scope.get("aProperty").as_f64(), Some(1.0));
        assert!(scope.get("missing").is_undefined());
        assert!(scope.is_root());
        assert_eq!(scope.id(), 0);
    }

    #[test]
    fn child_inherits_parent_properties() {
        let parent = Scope::new();
        let child = parent.new_child();
        parent.set("aValue", Value::array([1, 2, 3]));

        assert_eq!(child.get("aValue"), Value::array([1, 2, 3]));
        assert!(child.has("aValue"));
        assert!(!child.has_own("aValue"));
    }

    #[test]
    fn child_writes_shadow_parent() {
        let parent = Scope::new();
        let child = parent.new_child();
        parent.set("name", "Joe");
        child.set("name", "Jill");

        assert_eq!(child.get("name").as_str(), Some("Jill"));
        assert_eq!(parent.get("name").as_str(), Some("Joe"));

        child.remove("name");
        assert_eq!(child.get("name").as_str(), Some("Joe"));
    }

    #[test]
    fn nested_containers_stay_shared() {
        let parent = Scope::new();
        let child = parent.new_child();
        parent.set("user", Value::object([("name", "Joe")]));

        child.get("user").insert("name", "Jill");

        assert_eq!(parent.get("user").key("name").as_str(), Some("Jill"));
    }

    #[test]
    fn siblings_do_not_share_writes() {
        let parent = Scope::new();
        let first = parent.new_child();
        let second = parent.new_child();
        first.set("aValue", "abc");

        assert!(second.get("aValue").is_undefined());
    }

    #[test]
    fn grandchildren_inherit_through_the_chain() {
        let a = Scope::new();
        let b = a.new_child();
        let c = b.new_child();
        a.set("value", 1);

        assert_eq!(c.get("value").as_f64(), Some(1.0));
    }

    #[test]
    fn isolated_child_does_not_inherit() {
        let parent = Scope::new();
        let child = parent.new_isolated_child();
        parent.set("aValue", "abc");

        assert!(child.get("aValue").is_undefined());
        assert_eq!(child.root(), parent);
        assert_eq!(child.parent(), Some(parent));
    }

    #[test]
    fn explicit_parent_decouples_data_from_structure() {
        let prototype_parent = Scope::new();
        let hierarchy_parent = prototype_parent.new_child();
        prototype_parent.set("source", "data");

        let child = prototype_parent.new_scope(false, Some(&hierarchy_parent));

        assert_eq!(child.get("source").as_str(), Some("data"));
        assert_eq!(child.parent(), Some(hierarchy_parent.clone()));
        assert_eq!(hierarchy_parent.children(), vec![child]);
        assert_eq!(prototype_parent.children(), vec![hierarchy_parent]);
    }

    #[test]
    fn destroy_detaches_from_parent() {
        let parent = Scope::new();
        let child = parent.new_child();
        let sibling = parent.new_child();

        child.destroy();
        assert_eq!(parent.children(), vec![sibling]);

        child.destroy();
        parent.destroy();
        assert_eq!(parent.children().len(), 1);
    }

    #[test]
    fn every_scope_stops_tree_wide() {
        let root = Scope::new();
        let first = root.new_child();
        first.new_child();
        root.new_child();

        let mut visited = Vec::new();
        let finished = root.every_scope(&mut |scope: &Scope| {
            visited.push(scope.id());
            scope.id() != first.id()
        });

        assert!(!finished);
        assert_eq!(visited, vec![0, 1]);
    }

    #[test]
    fn every_scope_visits_in_pre_order() {
        let root = Scope::new();
        let a = root.new_child();
        let a1 = a.new_child();
        let a2 = a.new_child();
        let b = root.new_child();
        let b1 = b.new_isolated_child();

        let mut visited = Vec::new();
        assert!(root.every_scope(&mut |scope: &Scope| {
            visited.push(scope.id());
            true
        }));

        assert_eq!(
            visited,
            vec![root.id(), a.id(), a1.id(), a2.id(), b.id(), b1.id()]
        );
    }

    #[test]
    fn every_scope_walks_very_deep_trees() {
        let root = Scope::new();
        let mut chain = vec![root.clone()];
        for _ in 0..50_000 {
            let child = chain[chain.len() - 1].new_child();
            chain.push(child);
        }

        let mut visited = 0;
        assert!(root.every_scope(&mut |_: &Scope| {
            visited += 1;
            true
        }));
        assert_eq!(visited, 50_001);

        // Unlink bottom-up so dropping the chain does not recurse.
        while let Some(scope) = chain.pop() {
            scope.destroy();
        }
    }

    #[test]
    fn ids_are_unique_per_tree() {
        let root = Scope::new();
        let a = root.new_child();
        let b = a.new_isolated_child();

        assert_eq!((root.id(), a.id(), b.id()), (0, 1, 2));
    }
}
