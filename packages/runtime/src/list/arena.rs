//! Node storage shared by both list variants.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::constraint::{Constraint, ConstraintId, NodeSlots};

/// Generational index of a list node.
///
/// Slots are reused once no registered iterator can still observe them; the
/// generation makes a stale id miss instead of hitting the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListKind {
    Singly,
    Doubly,
}

/// Outcome of looking up an insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Insertion {
    /// The constraint is already in the list.
    Duplicate,
    /// Link after this node, or at the head.
    After(Option<NodeId>),
}

#[derive(Debug)]
pub(crate) struct Node<C: ?Sized> {
    pub(crate) value: Option<Rc<C>>,
    pub(crate) next: Option<NodeId>,
    /// Maintained only for doubly-linked lists.
    prev: Option<NodeId>,
    pub(crate) linked: bool,
    generation: u32,
}

impl<C: ?Sized + Constraint> Node<C> {
    /// The value, if it is still alive.
    pub(crate) fn live_value(&self) -> Option<Rc<C>> {
        self.value.as_ref().filter(|c| c.is_alive()).cloned()
    }
}

/// Arena of list nodes plus the bookkeeping for deferred reuse.
#[derive(Debug)]
pub(crate) struct Slots<C: ?Sized> {
    kind: ListKind,
    nodes: Vec<Node<C>>,
    free: Vec<u32>,
    /// Unlinked nodes that a registered iterator may still stand on.
    retired: Vec<NodeId>,
    pub(crate) head: Option<NodeId>,
    /// Number of linked nodes.
    linked: usize,
    /// Number of live registered iterators.
    iterators: usize,
}

impl<C: ?Sized> Slots<C> {
    pub(crate) fn new(kind: ListKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            free: Vec::new(),
            retired: Vec::new(),
            head: None,
            linked: 0,
            iterators: 0,
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node<C>> {
        self.nodes
            .get(id.index as usize)
            .filter(|n| n.generation == id.generation)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<C>> {
        self.nodes
            .get_mut(id.index as usize)
            .filter(|n| n.generation == id.generation)
    }

    pub(crate) fn is_linked(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.linked)
    }

    pub(crate) fn linked_count(&self) -> usize {
        self.linked
    }

    pub(crate) fn iterators(&self) -> usize {
        self.iterators
    }

    /// Allocate an unlinked node holding `value`.
    pub(crate) fn alloc(&mut self, value: Rc<C>) -> NodeId {
        if let Some(index) = self.free.pop() {
            let node = &mut self.nodes[index as usize];
            node.value = Some(value);
            return NodeId::new(index, node.generation);
        }
        let index = self.nodes.len() as u32;
        self.nodes.push(Node {
            value: Some(value),
            next: None,
            prev: None,
            linked: false,
            generation: 0,
        });
        NodeId::new(index, 0)
    }

    /// Link an unlinked node after `pred`, or at the head when `pred` is `None`.
    pub(crate) fn link_after(&mut self, pred: Option<NodeId>, id: NodeId) {
        let next = match pred {
            Some(p) => self.node(p).and_then(|n| n.next),
            None => self.head,
        };
        let doubly = self.kind == ListKind::Doubly;
        if let Some(node) = self.node_mut(id) {
            node.next = next;
            node.prev = if doubly { pred } else { None };
            node.linked = true;
        }
        self.set_next(pred, Some(id));
        if doubly {
            if let Some(n) = next.and_then(|n| self.node_mut(n)) {
                n.prev = Some(id);
            }
        }
        self.linked += 1;
    }

    /// Unlink a linked node whose chain predecessor is `pred`.
    ///
    /// The node keeps its `next` pointer so an iterator standing on it can
    /// still move forward.
    pub(crate) fn unlink(&mut self, id: NodeId, pred: Option<NodeId>) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        if !node.linked {
            return;
        }
        node.linked = false;
        let next = node.next;
        self.set_next(pred, next);
        if self.kind == ListKind::Doubly {
            if let Some(n) = next.and_then(|n| self.node_mut(n)) {
                n.prev = pred;
            }
        }
        self.linked -= 1;
    }

    /// Unlink using the stored back link. Doubly-linked lists only.
    pub(crate) fn unlink_doubly(&mut self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if !node.linked {
            return false;
        }
        let pred = node.prev;
        self.unlink(id, pred);
        true
    }

    /// Point `pred` (or the head) at `next`.
    pub(crate) fn set_next(&mut self, pred: Option<NodeId>, next: Option<NodeId>) {
        match pred {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
    }

    /// Clear the value of an unlinked node, returning it.
    pub(crate) fn take_value(&mut self, id: NodeId) -> Option<Rc<C>> {
        self.node_mut(id).and_then(|n| n.value.take())
    }

    /// Hand an unlinked node back to the arena.
    ///
    /// Reuse is deferred while any registered iterator is alive.
    pub(crate) fn retire(&mut self, id: NodeId) -> Vec<Rc<C>> {
        if self.iterators == 0 {
            self.recycle(id).into_iter().collect()
        } else {
            self.retired.push(id);
            Vec::new()
        }
    }

    fn recycle(&mut self, id: NodeId) -> Option<Rc<C>> {
        let node = self.node_mut(id)?;
        let value = node.value.take();
        node.next = None;
        node.prev = None;
        node.linked = false;
        node.generation = node.generation.wrapping_add(1);
        self.free.push(id.index);
        value
    }

    pub(crate) fn begin_iter(&mut self) {
        self.iterators += 1;
    }

    /// Unregister an iterator, collecting retired nodes after the last one.
    pub(crate) fn end_iter(&mut self) -> Vec<Rc<C>> {
        self.iterators = self.iterators.saturating_sub(1);
        if self.iterators > 0 {
            return Vec::new();
        }
        let retired = mem::take(&mut self.retired);
        retired
            .into_iter()
            .filter_map(|id| self.recycle(id))
            .collect()
    }

    /// Replace the linked chain with fresh nodes holding `values`, head first.
    ///
    /// The old nodes keep their values and `next` pointers, so iterators
    /// standing on them finish walking the chain they started on. Returns the
    /// new ids and any values released by immediate reuse.
    pub(crate) fn rebuild(&mut self, values: &[Rc<C>]) -> (Vec<NodeId>, Vec<Rc<C>>) {
        let mut released = Vec::new();
        for id in self.chain() {
            self.unlink(id, None);
            released.extend(self.retire(id));
        }
        let mut ids = Vec::with_capacity(values.len());
        let mut pred = None;
        for value in values {
            let id = self.alloc(value.clone());
            self.link_after(pred, id);
            pred = Some(id);
            ids.push(id);
        }
        (ids, released)
    }

    /// Ids of the linked chain, head first.
    pub(crate) fn chain(&self) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.linked);
        let mut cursor = self.head;
        while let Some(id) = cursor {
            ids.push(id);
            cursor = self.node(id).and_then(|n| n.next);
        }
        ids
    }
}

impl<C: ?Sized + Constraint> Slots<C> {
    /// Live values of the linked chain, head first.
    pub(crate) fn live_values(&self) -> Vec<Rc<C>> {
        self.chain()
            .into_iter()
            .filter_map(|id| self.node(id).and_then(Node::live_value))
            .collect()
    }

    /// First live value of the linked chain.
    pub(crate) fn first_live(&self) -> Option<Rc<C>> {
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let node = self.node(id)?;
            if let Some(value) = node.live_value() {
                return Some(value);
            }
            cursor = node.next;
        }
        None
    }

    /// Find where a constraint with `id` belongs in the id-descending chain.
    pub(crate) fn insertion_point(&self, id: ConstraintId) -> Insertion {
        let mut pred = None;
        let mut cursor = self.head;
        while let Some(node_id) = cursor {
            let Some(node) = self.node(node_id) else {
                break;
            };
            match node.value.as_ref().map(|c| c.id()) {
                Some(existing) if existing == id => return Insertion::Duplicate,
                Some(existing) if existing < id => break,
                _ => {}
            }
            pred = Some(node_id);
            cursor = node.next;
        }
        Insertion::After(pred)
    }
}

impl<C: ?Sized + Constraint + 'static> NodeSlots for RefCell<Slots<C>> {
    fn remove_node(&self, node: NodeId) -> bool {
        let removed = match self.try_borrow_mut() {
            Ok(mut slots) => {
                if slots.unlink_doubly(node) {
                    let value = slots.take_value(node);
                    let collected = slots.retire(node);
                    Some((value, collected))
                } else {
                    None
                }
            }
            Err(_) => None,
        };
        match removed {
            Some((value, collected)) => {
                if let Some(value) = value {
                    value
                        .state()
                        .forget_handle(self as *const Self as *const (), node);
                }
                drop(collected);
                true
            }
            None => false,
        }
    }
}

/// Address identifying a list's node storage.
pub(crate) fn slots_addr<C: ?Sized>(slots: &Rc<RefCell<Slots<C>>>) -> *const () {
    Rc::as_ptr(slots) as *const ()
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}
