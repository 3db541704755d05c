//! Identity and lifecycle shared by every stored constraint.
//!
//! Generated constraint types embed a [`ConstraintState`] and implement
//! [`Constraint`]. The state carries the age-defining id, the alive/stored
//! flags, and back-pointers into every doubly-linked list the constraint is
//! stored in, so that terminating it unlinks it in O(1) per list.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::ExecutionContext;
use crate::continuation::ContinuationRef;
use crate::error::Result;
use crate::list::NodeId;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Age of a constraint: larger ids are younger.
///
/// Ids come from one process-wide counter and are never reused, so the
/// ordering is total and consistent with creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(u64);

impl ConstraintId {
    /// Allocate the next id.
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw counter value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Storage that can unlink one of its nodes.
pub(crate) trait NodeSlots {
    /// Unlink `node`, returning false if it was no longer linked.
    fn remove_node(&self, node: NodeId) -> bool;
}

/// Back-pointer from a constraint to its node in a doubly-linked list.
#[derive(Clone)]
pub struct NodeHandle {
    slots: Weak<dyn NodeSlots>,
    node: NodeId,
}

impl NodeHandle {
    pub(crate) fn new(slots: Weak<dyn NodeSlots>, node: NodeId) -> Self {
        Self { slots, node }
    }

    /// The node this handle points at.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Unlink the node from its list.
    ///
    /// Returns false if the list is gone or the node was already unlinked.
    pub fn remove(&self) -> bool {
        match self.slots.upgrade() {
            Some(slots) => slots.remove_node(self.node),
            None => false,
        }
    }

    pub(crate) fn list_addr(&self) -> *const () {
        Weak::as_ptr(&self.slots) as *const ()
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("list", &self.list_addr())
            .field("node", &self.node)
            .finish()
    }
}

/// Identity and lifecycle state embedded in every constraint.
#[derive(Debug)]
pub struct ConstraintState {
    id: ConstraintId,
    alive: Cell<bool>,
    stored: Cell<bool>,
    handles: RefCell<Vec<NodeHandle>>,
}

impl Default for ConstraintState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintState {
    /// Create the state of a new, alive, not yet stored constraint.
    pub fn new() -> Self {
        Self {
            id: ConstraintId::next(),
            alive: Cell::new(true),
            stored: Cell::new(false),
            handles: RefCell::new(Vec::new()),
        }
    }

    pub fn id(&self) -> ConstraintId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    pub fn is_terminated(&self) -> bool {
        !self.alive.get()
    }

    pub fn is_stored(&self) -> bool {
        self.stored.get()
    }

    /// Mark the constraint dead and unlink it from every doubly-linked list.
    ///
    /// Returns true only for the call that actually killed it.
    pub fn terminate(&self) -> bool {
        if !self.alive.replace(false) {
            return false;
        }
        self.unstore();
        true
    }

    /// Unlink the constraint from every doubly-linked list, keeping it alive.
    ///
    /// Singly-linked lists drop it lazily once it is terminated.
    pub fn unstore(&self) {
        self.stored.set(false);
        let handles = mem::take(&mut *self.handles.borrow_mut());
        for handle in handles {
            handle.remove();
        }
    }

    /// Snapshot of the current back-pointers.
    pub fn handles(&self) -> Vec<NodeHandle> {
        self.handles.borrow().clone()
    }

    pub(crate) fn mark_stored(&self) {
        self.stored.set(true);
    }

    pub(crate) fn add_handle(&self, handle: NodeHandle) {
        self.stored.set(true);
        self.handles.borrow_mut().push(handle);
    }

    /// Drop the back-pointer to `node` in the list at `list`.
    pub(crate) fn forget_handle(&self, list: *const (), node: NodeId) {
        let mut handles = self.handles.borrow_mut();
        handles.retain(|h| !(h.list_addr() == list && h.node == node));
        if handles.is_empty() {
            self.stored.set(false);
        }
    }

    /// Drop every back-pointer into the list at `list`.
    pub(crate) fn forget_list(&self, list: *const ()) {
        let mut handles = self.handles.borrow_mut();
        handles.retain(|h| h.list_addr() != list);
        if handles.is_empty() {
            self.stored.set(false);
        }
    }

    /// Replace every back-pointer into any of `lists` with `handle`.
    pub(crate) fn retarget(&self, lists: &[*const ()], handle: NodeHandle) {
        let mut handles = self.handles.borrow_mut();
        handles.retain(|h| !lists.contains(&h.list_addr()));
        handles.push(handle);
    }
}

/// Conversion to a trait object, available for sized and unsized constraints.
pub trait AsConstraint {
    fn as_constraint(&self) -> &dyn Constraint;
    fn into_constraint(self: Rc<Self>) -> Rc<dyn Constraint>;
}

impl<T: Constraint + 'static> AsConstraint for T {
    fn as_constraint(&self) -> &dyn Constraint {
        self
    }

    fn into_constraint(self: Rc<Self>) -> Rc<dyn Constraint> {
        self
    }
}

/// A stored occurrence of a user-declared constraint.
///
/// Implemented by generated code. Equality is identity: two constraints are
/// the same iff their ids are equal. `Debug` doubles as the textual form used
/// by tracers.
pub trait Constraint: fmt::Debug + AsConstraint {
    /// The embedded identity and lifecycle state.
    fn state(&self) -> &ConstraintState;

    /// Re-attempt rule matching for this constraint.
    ///
    /// Called when something the constraint was suspended on changed.
    /// Returns the next continuation to run, or `None` to resume whatever is
    /// on the stack.
    fn reactivate(self: Rc<Self>, cx: &mut ExecutionContext) -> Result<Option<ContinuationRef>>;

    fn id(&self) -> ConstraintId {
        self.state().id()
    }

    fn is_alive(&self) -> bool {
        self.state().is_alive()
    }

    fn is_terminated(&self) -> bool {
        self.state().is_terminated()
    }

    fn is_stored(&self) -> bool {
        self.state().is_stored()
    }

    /// Detach from every list and mark not alive.
    ///
    /// Returns true only for the call that actually killed the constraint.
    fn terminate(&self) -> bool {
        self.state().terminate()
    }
}
