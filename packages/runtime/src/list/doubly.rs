use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::arena::{slots_addr, Insertion, ListKind, NodeId, Slots};
use super::{merge_by_age, ConstraintIter, ConstraintList, IterationSafety};
use crate::constraint::{Constraint, NodeHandle, NodeSlots};
use crate::error::StoreError;

/// Constraint list with O(1) removal.
///
/// Every stored constraint holds a [`NodeHandle`] to its node, so
/// terminating it unlinks it right away. A removed node becomes a tombstone:
/// its value is cleared but it keeps its forward link until no iterator can
/// be standing on it. Provides all three iteration guarantees.
///
/// # Example
///
/// ```rust,ignore
/// let mut list = DoublyLinkedConstraintList::new();
/// list.add_first(a.clone());
/// list.add_first(b.clone());
///
/// a.terminate();
/// assert_eq!(list.len(), 1);
/// ```
pub struct DoublyLinkedConstraintList<C: ?Sized + Constraint + 'static> {
    slots: Rc<RefCell<Slots<C>>>,
}

impl<C: ?Sized + Constraint + 'static> Default for DoublyLinkedConstraintList<C> {
    fn default() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots::new(ListKind::Doubly))),
        }
    }
}

impl<C: ?Sized + Constraint + 'static> DoublyLinkedConstraintList<C> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, node: NodeId) -> NodeHandle {
        let slots = Rc::downgrade(&self.slots) as Weak<dyn NodeSlots>;
        NodeHandle::new(slots, node)
    }

    fn link(&self, pred: Option<NodeId>, constraint: Rc<C>) {
        let id = {
            let mut slots = self.slots.borrow_mut();
            let id = slots.alloc(constraint.clone());
            slots.link_after(pred, id);
            id
        };
        constraint.state().add_handle(self.handle(id));
    }

    /// True if `handle` points into this list.
    pub fn owns(&self, handle: &NodeHandle) -> bool {
        handle.list_addr() == slots_addr(&self.slots)
    }

    /// Unlink the node behind `handle`.
    ///
    /// Returns false if the handle belongs to another list or the node was
    /// already removed.
    pub fn remove(&mut self, handle: &NodeHandle) -> bool {
        self.owns(handle) && handle.remove()
    }

    /// Unlink every constraint, returning them youngest first.
    ///
    /// Used to detach an observer list before notifying its members.
    pub fn take_all(&mut self) -> Vec<Rc<C>> {
        let values = self.slots.borrow().live_values();
        let addr = slots_addr(&self.slots);
        let released = {
            let mut slots = self.slots.borrow_mut();
            let (_, released) = slots.rebuild(&[]);
            released
        };
        for value in &values {
            value.state().forget_list(addr);
        }
        drop(released);
        values
    }
}

impl<C: ?Sized + Constraint + 'static> ConstraintList<C> for DoublyLinkedConstraintList<C> {
    fn add_first(&mut self, constraint: Rc<C>) {
        self.link(None, constraint);
    }

    fn insert(&mut self, constraint: Rc<C>) -> bool {
        let point = self.slots.borrow().insertion_point(constraint.id());
        match point {
            Insertion::Duplicate => false,
            Insertion::After(pred) => {
                self.link(pred, constraint);
                true
            }
        }
    }

    fn get_first(&self) -> Result<Rc<C>, StoreError> {
        self.slots.borrow().first_live().ok_or(StoreError::NotFound)
    }

    fn is_empty(&self) -> bool {
        self.slots.borrow().linked_count() == 0
    }

    fn len(&self) -> usize {
        self.slots.borrow().linked_count()
    }

    fn merge_with(&mut self, other: Self) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            self.slots = other.slots;
            return;
        }

        let lists = [slots_addr(&self.slots), slots_addr(&other.slots)];
        let incoming = other.slots.borrow().live_values();
        let (merged, ids, released) = {
            let mut slots = self.slots.borrow_mut();
            let merged = merge_by_age(slots.live_values(), incoming);
            let (ids, released) = slots.rebuild(&merged);
            (merged, ids, released)
        };
        for (constraint, id) in merged.iter().zip(ids) {
            constraint.state().retarget(&lists, self.handle(id));
        }
        drop(released);
    }

    fn universal_iter(&self) -> ConstraintIter<C> {
        ConstraintIter::new(self.slots.clone(), IterationSafety::Universal)
    }

    fn semi_universal_iter(&self) -> ConstraintIter<C> {
        ConstraintIter::new(self.slots.clone(), IterationSafety::SemiUniversal)
    }

    fn existential_iter(&self) -> ConstraintIter<C> {
        ConstraintIter::new(self.slots.clone(), IterationSafety::Existential)
    }
}

impl<C: ?Sized + Constraint + 'static> fmt::Debug for DoublyLinkedConstraintList<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.existential_iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::testing::Stub;
    use crate::ConstraintId;

    fn stubs(n: usize) -> Vec<Rc<Stub>> {
        (0..n).map(|_| Stub::new("p")).collect()
    }

    fn list_of(p: &[Rc<Stub>], picks: &[usize]) -> DoublyLinkedConstraintList<Stub> {
        let mut list = DoublyLinkedConstraintList::new();
        let mut picks = picks.to_vec();
        picks.sort();
        for i in picks {
            list.add_first(p[i].clone());
        }
        list
    }

    fn ids(iter: impl Iterator<Item = Rc<Stub>>) -> Vec<ConstraintId> {
        iter.map(|c| c.id()).collect()
    }

    fn expected(p: &[Rc<Stub>], picks: &[usize]) -> Vec<ConstraintId> {
        let mut picks = picks.to_vec();
        picks.sort();
        picks.iter().rev().map(|&i| p[i].id()).collect()
    }

    #[test]
    fn add_registers_handles() {
        let p = stubs(2);
        let list = list_of(&p, &[0, 1]);
        assert_eq!(list.len(), 2);
        assert!(p[0].is_stored());
        let handles = p[0].state().handles();
        assert_eq!(handles.len(), 1);
        assert!(list.owns(&handles[0]));
    }

    #[test]
    fn terminate_unlinks_immediately() {
        let p = stubs(3);
        let list = list_of(&p, &[0, 1, 2]);
        p[1].terminate();
        assert_eq!(list.len(), 2);
        assert!(!p[1].is_stored());
        assert_eq!(ids(list.existential_iter()), expected(&p, &[0, 2]));
    }

    #[test]
    fn tombstones_are_skipped() {
        let p = stubs(4);
        let list = list_of(&p, &[0, 1, 2, 3]);
        let mut iter = list.universal_iter();
        assert_eq!(iter.next().unwrap().id(), p[3].id());

        // The node under the iterator and its successor become tombstones
        p[3].terminate();
        p[2].terminate();
        assert_eq!(list.len(), 2);
        assert_eq!(ids(iter), expected(&p, &[0, 1]));
    }

    #[test]
    fn semi_universal_survives_insertion() {
        let p = stubs(4);
        let mut list = list_of(&p, &[0, 3]);
        let mut iter = list.semi_universal_iter();
        assert_eq!(iter.safety(), IterationSafety::SemiUniversal);
        assert_eq!(iter.next().unwrap().id(), p[3].id());

        assert!(list.insert(p[2].clone()));
        assert!(list.insert(p[1].clone()));
        assert_eq!(ids(iter), expected(&p, &[0, 1, 2]));
    }

    #[test]
    fn remove_through_handle() {
        let p = stubs(2);
        let mut list = list_of(&p, &[0, 1]);
        let handle = p[0].state().handles()[0].clone();
        assert!(list.remove(&handle));
        assert!(!list.remove(&handle));
        assert_eq!(ids(list.universal_iter()), expected(&p, &[1]));
        assert!(p[0].is_alive());
        assert!(p[0].state().handles().is_empty());
    }

    #[test]
    fn remove_rejects_foreign_handle() {
        let p = stubs(2);
        let first = list_of(&p, &[0]);
        let mut second = list_of(&p, &[1]);
        let handle = p[0].state().handles()[0].clone();
        assert!(!second.remove(&handle));
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn terminate_removes_from_every_list() {
        let p = stubs(1);
        let a = list_of(&p, &[0]);
        let b = list_of(&p, &[0]);
        assert_eq!(p[0].state().handles().len(), 2);
        p[0].terminate();
        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[test]
    fn merge_preserves_order_and_iterators() {
        let p = stubs(5);
        let mut left = list_of(&p, &[0, 2, 4]);
        let right = list_of(&p, &[0, 1, 2, 3, 4]);

        let mut over_left = left.universal_iter();
        let mut over_right = right.universal_iter();
        assert_eq!(over_left.next().unwrap().id(), p[4].id());
        assert_eq!(over_right.next().unwrap().id(), p[4].id());

        left.merge_with(right);
        assert_eq!(ids(left.universal_iter()), expected(&p, &[0, 1, 2, 3, 4]));
        assert_eq!(left.len(), 5);

        // Iterators over both inputs finish their original chains
        assert_eq!(ids(over_left), expected(&p, &[0, 2]));
        assert_eq!(ids(over_right), expected(&p, &[0, 1, 2, 3]));
    }

    #[test]
    fn merge_before_first_step_keeps_old_chain() {
        let p = stubs(5);
        let mut left = list_of(&p, &[0, 2, 4]);
        let iter = left.universal_iter();
        let semi = left.semi_universal_iter();

        left.merge_with(list_of(&p, &[1, 3]));
        assert_eq!(ids(iter), expected(&p, &[0, 2, 4]));
        assert_eq!(ids(semi), expected(&p, &[0, 2, 4]));
        assert_eq!(ids(left.universal_iter()), expected(&p, &[0, 1, 2, 3, 4]));
        assert_eq!(left.len(), 5);
    }

    #[test]
    fn merge_retargets_handles() {
        let p = stubs(3);
        let mut left = list_of(&p, &[0, 2]);
        left.merge_with(list_of(&p, &[1, 2]));
        for c in &p {
            let handles = c.state().handles();
            assert_eq!(handles.len(), 1);
            assert!(left.owns(&handles[0]));
        }
        p[2].terminate();
        assert_eq!(ids(left.universal_iter()), expected(&p, &[0, 1]));
    }

    #[test]
    fn merge_into_empty_adopts_other() {
        let p = stubs(2);
        let mut left = DoublyLinkedConstraintList::new();
        left.merge_with(list_of(&p, &[0, 1]));
        assert_eq!(left.len(), 2);
        p[0].terminate();
        assert_eq!(ids(left.universal_iter()), expected(&p, &[1]));
    }

    #[test]
    fn merge_from_empty_is_noop() {
        let p = stubs(1);
        let mut left = list_of(&p, &[0]);
        left.merge_with(DoublyLinkedConstraintList::new());
        assert_eq!(left.len(), 1);
    }

    #[test]
    fn take_all_detaches() {
        let p = stubs(3);
        let mut list = list_of(&p, &[0, 1, 2]);
        let taken = list.take_all();
        assert_eq!(ids(taken.into_iter()), expected(&p, &[0, 1, 2]));
        assert!(list.is_empty());
        assert!(p[0].state().handles().is_empty());
        assert!(p[0].is_alive());
    }

    #[test]
    fn dyn_constraint_elements() {
        let p = stubs(2);
        let mut list: DoublyLinkedConstraintList<dyn Constraint> =
            DoublyLinkedConstraintList::new();
        list.add_first(p[0].clone());
        list.add_first(p[1].clone());
        assert_eq!(list.get_first().unwrap().id(), p[1].id());
        p[1].terminate();
        assert_eq!(list.get_first().unwrap().id(), p[0].id());
    }
}
