use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::arena::{Insertion, ListKind, NodeId, Slots};
use super::{merge_by_age, ConstraintIter, ConstraintList, IterationSafety};
use crate::constraint::Constraint;
use crate::error::StoreError;

/// Constraint list without back-pointers.
///
/// Terminated constraints stay linked until a universal iterator or a merge
/// walks past them. Provides universal and existential iteration;
/// semi-universal requests get a universal iterator.
///
/// # Example
///
/// ```rust,ignore
/// let mut list = SinglyLinkedConstraintList::new();
/// list.add_first(older);
/// list.add_first(younger);
///
/// let seen: Vec<_> = list.universal_iter().collect();
/// assert_eq!(seen[0].id(), younger.id());
/// ```
pub struct SinglyLinkedConstraintList<C: ?Sized + Constraint> {
    slots: Rc<RefCell<Slots<C>>>,
}

impl<C: ?Sized + Constraint> Default for SinglyLinkedConstraintList<C> {
    fn default() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots::new(ListKind::Singly))),
        }
    }
}

impl<C: ?Sized + Constraint> SinglyLinkedConstraintList<C> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    fn link(&self, pred: Option<NodeId>, constraint: Rc<C>) {
        constraint.state().mark_stored();
        let mut slots = self.slots.borrow_mut();
        let id = slots.alloc(constraint);
        slots.link_after(pred, id);
    }
}

/// Splice `incoming` into the chain, reusing the receiver's nodes.
///
/// Dead nodes met along the way are dropped. Returns values released by
/// recycled nodes.
fn merge_in_place<C: ?Sized + Constraint>(
    slots: &mut Slots<C>,
    incoming: Vec<Rc<C>>,
) -> Vec<Rc<C>> {
    let mut released = Vec::new();
    let mut pred = None;
    let mut cursor = slots.head;
    let mut incoming = incoming.into_iter().peekable();

    while let Some(next_in) = incoming.peek().map(|c| c.id()) {
        let Some(id) = cursor else {
            break;
        };
        let Some((next, value)) = slots.node(id).map(|n| (n.next, n.live_value())) else {
            break;
        };
        match value {
            None => {
                slots.unlink(id, pred);
                released.extend(slots.retire(id));
                cursor = next;
            }
            Some(current) if current.id() >= next_in => {
                if current.id() == next_in {
                    incoming.next();
                }
                pred = Some(id);
                cursor = next;
            }
            Some(_) => {
                if let Some(constraint) = incoming.next() {
                    let fresh = slots.alloc(constraint);
                    slots.link_after(pred, fresh);
                    pred = Some(fresh);
                }
            }
        }
    }

    // The remainder of the other list goes after the receiver's tail.
    for constraint in incoming {
        let fresh = slots.alloc(constraint);
        slots.link_after(pred, fresh);
        pred = Some(fresh);
    }
    released
}

impl<C: ?Sized + Constraint> ConstraintList<C> for SinglyLinkedConstraintList<C> {
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
        self.slots.borrow().first_live().is_none()
    }

    fn len(&self) -> usize {
        self.existential_iter().count()
    }

    fn merge_with(&mut self, other: Self) {
        let incoming = other.slots.borrow().live_values();
        if incoming.is_empty() {
            return;
        }
        let released = {
            let mut slots = self.slots.borrow_mut();
            if slots.iterators() == 0 {
                merge_in_place(&mut slots, incoming)
            } else {
                let merged = merge_by_age(slots.live_values(), incoming);
                let (_, released) = slots.rebuild(&merged);
                released
            }
        };
        drop(released);
    }

    fn universal_iter(&self) -> ConstraintIter<C> {
        ConstraintIter::new(self.slots.clone(), IterationSafety::Universal)
    }

    fn existential_iter(&self) -> ConstraintIter<C> {
        ConstraintIter::new(self.slots.clone(), IterationSafety::Existential)
    }
}

impl<C: ?Sized + Constraint> fmt::Debug for SinglyLinkedConstraintList<C> {
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

    /// List holding `picks` of `p`, youngest first.
    fn list_of(p: &[Rc<Stub>], picks: &[usize]) -> SinglyLinkedConstraintList<Stub> {
        let mut list = SinglyLinkedConstraintList::new();
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
    fn add_first_iterates_youngest_first() {
        let p = stubs(3);
        let list = list_of(&p, &[0, 1, 2]);
        assert_eq!(ids(list.universal_iter()), expected(&p, &[0, 1, 2]));
        assert_eq!(list.len(), 3);
        assert!(!list.is_empty());
        assert!(p[0].is_stored());
    }

    #[test]
    fn get_first_on_empty_is_not_found() {
        let list: SinglyLinkedConstraintList<Stub> = SinglyLinkedConstraintList::new();
        assert!(list.is_empty());
        assert_eq!(list.get_first().unwrap_err(), StoreError::NotFound);
    }

    #[test]
    fn insert_keeps_age_order_and_skips_duplicates() {
        let p = stubs(4);
        let mut list = list_of(&p, &[0, 3]);
        assert!(list.insert(p[2].clone()));
        assert!(list.insert(p[1].clone()));
        assert!(!list.insert(p[2].clone()));
        assert_eq!(ids(list.universal_iter()), expected(&p, &[0, 1, 2, 3]));
    }

    #[test]
    fn terminated_are_skipped_and_compressed() {
        let p = stubs(4);
        let list = list_of(&p, &[0, 1, 2, 3]);
        p[1].terminate();
        p[3].terminate();
        assert_eq!(list.get_first().unwrap().id(), p[2].id());
        assert_eq!(list.slots.borrow().linked_count(), 4);

        assert_eq!(ids(list.universal_iter()), expected(&p, &[0, 2]));
        assert_eq!(list.slots.borrow().linked_count(), 2);
    }

    #[test]
    fn existential_does_not_compress() {
        let p = stubs(3);
        let list = list_of(&p, &[0, 1, 2]);
        p[1].terminate();
        assert_eq!(ids(list.existential_iter()), expected(&p, &[0, 2]));
        assert_eq!(list.slots.borrow().linked_count(), 3);
    }

    #[test]
    fn semi_universal_falls_back_to_universal() {
        let list: SinglyLinkedConstraintList<Stub> = SinglyLinkedConstraintList::new();
        assert_eq!(list.semi_universal_iter().safety(), IterationSafety::Universal);
        assert_eq!(list.existential_iter().safety(), IterationSafety::Existential);
        assert_eq!(
            list.iter_with(IterationSafety::SemiUniversal).safety(),
            IterationSafety::Universal
        );
    }

    #[test]
    fn universal_survives_removal_and_insertion() {
        let p = stubs(5);
        let mut list = list_of(&p, &[0, 1, 2, 3]);
        let mut iter = list.universal_iter();
        assert_eq!(iter.next().unwrap().id(), p[3].id());

        // Kill the element just returned and the one after it
        p[3].terminate();
        p[2].terminate();
        list.add_first(p[4].clone());

        assert_eq!(ids(iter), expected(&p, &[0, 1]));
        assert_eq!(ids(list.universal_iter()), expected(&p, &[0, 1, 4]));
    }

    #[test]
    fn two_iterators_compress_safely() {
        let p = stubs(4);
        let list = list_of(&p, &[0, 1, 2, 3]);
        let mut slow = list.universal_iter();
        assert_eq!(slow.next().unwrap().id(), p[3].id());
        assert_eq!(slow.next().unwrap().id(), p[2].id());

        p[2].terminate();
        p[1].terminate();
        // A second iterator unlinks the node `slow` stands on
        assert_eq!(ids(list.universal_iter()), expected(&p, &[0, 3]));
        assert_eq!(ids(slow), expected(&p, &[0]));
    }

    #[test]
    fn merge_in_place_coalesces() {
        let p = stubs(5);
        let mut left = list_of(&p, &[0, 2, 4]);
        let right = list_of(&p, &[0, 1, 2, 3, 4]);
        left.merge_with(right);
        assert_eq!(ids(left.universal_iter()), expected(&p, &[0, 1, 2, 3, 4]));
        assert_eq!(left.len(), 5);
    }

    #[test]
    fn merge_into_empty_and_from_empty() {
        let p = stubs(2);
        let mut left = SinglyLinkedConstraintList::new();
        left.merge_with(list_of(&p, &[0, 1]));
        assert_eq!(ids(left.universal_iter()), expected(&p, &[0, 1]));

        left.merge_with(SinglyLinkedConstraintList::new());
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn merge_appends_older_remainder() {
        let p = stubs(4);
        let mut left = list_of(&p, &[2, 3]);
        left.merge_with(list_of(&p, &[0, 1]));
        assert_eq!(ids(left.universal_iter()), expected(&p, &[0, 1, 2, 3]));
    }

    #[test]
    fn merge_with_live_iterator_keeps_its_chain() {
        let p = stubs(5);
        let mut left = list_of(&p, &[0, 2, 4]);
        let mut iter = left.universal_iter();
        assert_eq!(iter.next().unwrap().id(), p[4].id());

        left.merge_with(list_of(&p, &[0, 1, 2, 3, 4]));
        assert_eq!(ids(iter), expected(&p, &[0, 2]));
        assert_eq!(ids(left.universal_iter()), expected(&p, &[0, 1, 2, 3, 4]));
    }

    #[test]
    fn merge_before_first_step_keeps_old_chain() {
        let p = stubs(5);
        let mut left = list_of(&p, &[0, 2, 4]);
        let iter = left.universal_iter();

        left.merge_with(list_of(&p, &[1, 3]));
        assert_eq!(ids(iter), expected(&p, &[0, 2, 4]));
        assert_eq!(ids(left.universal_iter()), expected(&p, &[0, 1, 2, 3, 4]));
    }

    #[test]
    fn head_killed_before_first_step_is_compressed() {
        let p = stubs(3);
        let list = list_of(&p, &[0, 1, 2]);
        let iter = list.universal_iter();

        p[2].terminate();
        assert_eq!(ids(iter), expected(&p, &[0, 1]));
        assert_eq!(list.slots.borrow().linked_count(), 2);
    }

    #[test]
    fn add_first_after_creation_is_not_seen() {
        let p = stubs(3);
        let mut list = list_of(&p, &[0, 1]);
        let iter = list.universal_iter();

        list.add_first(p[2].clone());
        assert_eq!(ids(iter), expected(&p, &[0, 1]));
        assert_eq!(ids(list.universal_iter()), expected(&p, &[0, 1, 2]));
    }

    #[test]
    fn debug_lists_live_constraints() {
        let p = stubs(2);
        let list = list_of(&p, &[0, 1]);
        p[0].terminate();
        let text = format!("{:?}", list);
        assert_eq!(text.matches("Stub").count(), 1);
    }
}
