//! Constraint lists with tiered iteration safety.
//!
//! Rule bodies mutate the very lists that matching code is scanning, so each
//! list hands out iterators with one of three guarantees:
//!
//! - **universal**: survives arbitrary insertion and removal; dead nodes are
//!   skipped and compressed out of the chain the first time they are met.
//! - **semi-universal**: survives insertion; removing anything other than the
//!   element just returned is unsupported.
//! - **existential**: no guarantee under modification, but never fails loudly.
//!
//! A list that lacks a weaker kind answers with the strongest kind it has.
//! Lists keep constraints ordered youngest first (descending
//! [`ConstraintId`](crate::ConstraintId)).

mod arena;
mod doubly;
mod singly;

use std::cell::RefCell;
use std::rc::Rc;

pub use arena::NodeId;
use arena::Slots;
pub use doubly::DoublyLinkedConstraintList;
pub use singly::SinglyLinkedConstraintList;

use crate::constraint::Constraint;
use crate::error::StoreError;

/// Guarantee requested from a list iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IterationSafety {
    Universal,
    SemiUniversal,
    Existential,
}

/// Age-ordered collection of stored constraints.
pub trait ConstraintList<C: ?Sized + Constraint> {
    /// Add a constraint at the front.
    ///
    /// The caller guarantees it is younger than every constraint present.
    fn add_first(&mut self, constraint: Rc<C>);

    /// Add a constraint at its age position.
    ///
    /// O(1) when it is the youngest. Returns false if it was already present.
    fn insert(&mut self, constraint: Rc<C>) -> bool;

    /// The youngest live constraint.
    fn get_first(&self) -> Result<Rc<C>, StoreError>;

    /// True if the list holds no live constraint.
    fn is_empty(&self) -> bool;

    /// Number of live constraints.
    fn len(&self) -> usize;

    /// Absorb `other`, keeping age order and dropping duplicates.
    fn merge_with(&mut self, other: Self)
    where
        Self: Sized;

    fn universal_iter(&self) -> ConstraintIter<C>;

    fn semi_universal_iter(&self) -> ConstraintIter<C> {
        self.universal_iter()
    }

    fn existential_iter(&self) -> ConstraintIter<C> {
        self.semi_universal_iter()
    }

    /// Iterator with at least the requested guarantee.
    fn iter_with(&self, safety: IterationSafety) -> ConstraintIter<C> {
        match safety {
            IterationSafety::Universal => self.universal_iter(),
            IterationSafety::SemiUniversal => self.semi_universal_iter(),
            IterationSafety::Existential => self.existential_iter(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Position {
    /// Read the head on the first call.
    Start,
    /// Head captured when the iterator was created.
    First(Option<NodeId>),
    At(NodeId),
    Done,
}

/// Iterator over the live constraints of a list, youngest first.
///
/// Holds its own reference to the list storage, so the list may be mutated
/// freely while it is alive.
pub struct ConstraintIter<C: ?Sized + Constraint> {
    slots: Rc<RefCell<Slots<C>>>,
    position: Position,
    safety: IterationSafety,
    registered: bool,
}

impl<C: ?Sized + Constraint> ConstraintIter<C> {
    pub(crate) fn new(slots: Rc<RefCell<Slots<C>>>, safety: IterationSafety) -> Self {
        let registered = safety != IterationSafety::Existential;
        let position = if registered {
            let mut inner = slots.borrow_mut();
            inner.begin_iter();
            Position::First(inner.head)
        } else {
            Position::Start
        };
        Self {
            slots,
            position,
            safety,
            registered,
        }
    }

    /// The guarantee this iterator actually provides.
    pub fn safety(&self) -> IterationSafety {
        self.safety
    }
}

impl<C: ?Sized + Constraint> Iterator for ConstraintIter<C> {
    type Item = Rc<C>;

    fn next(&mut self) -> Option<Rc<C>> {
        let mut slots = self.slots.borrow_mut();
        let (pred, mut candidate) = match self.position {
            Position::Start => (None, slots.head),
            Position::First(head) => (None, head),
            Position::At(id) => match slots.node(id) {
                Some(node) => (Some(id), node.next),
                None => {
                    // Slot was reused under an unregistered iterator.
                    self.position = Position::Done;
                    return None;
                }
            },
            Position::Done => return None,
        };

        let compress = self.safety == IterationSafety::Universal;
        // Without a predecessor the walk is on the live chain only while it
        // starts from the current head.
        let pred_linked = match pred {
            Some(p) => slots.is_linked(p),
            None => candidate == slots.head,
        };
        let rewire = compress && pred.is_some() && !pred_linked;
        let mut skipped = false;
        let mut dropped = Vec::new();

        while let Some(id) = candidate {
            let Some(node) = slots.node(id) else {
                break;
            };
            let next = node.next;
            let linked = node.linked;
            if let Some(value) = node.live_value() {
                if rewire && skipped {
                    slots.set_next(pred, Some(id));
                }
                self.position = Position::At(id);
                drop(slots);
                drop(dropped);
                return Some(value);
            }
            if compress && linked && pred_linked {
                slots.unlink(id, pred);
                dropped.extend(slots.retire(id));
            }
            skipped = true;
            candidate = next;
        }

        if rewire && skipped {
            slots.set_next(pred, None);
        }
        self.position = Position::Done;
        drop(slots);
        drop(dropped);
        None
    }
}

impl<C: ?Sized + Constraint> Drop for ConstraintIter<C> {
    fn drop(&mut self) {
        if !self.registered {
            return;
        }
        let collected = match self.slots.try_borrow_mut() {
            Ok(mut slots) => slots.end_iter(),
            Err(_) => Vec::new(),
        };
        drop(collected);
    }
}

impl<C: ?Sized + Constraint> std::fmt::Debug for ConstraintIter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintIter")
            .field("position", &self.position)
            .field("safety", &self.safety)
            .finish()
    }
}

/// Merge two youngest-first sequences, keeping the left copy of duplicates.
pub(crate) fn merge_by_age<C: ?Sized + Constraint>(
    left: Vec<Rc<C>>,
    right: Vec<Rc<C>>,
) -> Vec<Rc<C>> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_left = match (left.peek().map(|c| c.id()), right.peek().map(|c| c.id())) {
            (Some(l), Some(r)) => {
                if l == r {
                    right.next();
                }
                l >= r
            }
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::testing::Stub;

    #[test]
    fn merge_by_age_coalesces_ties() {
        let p: Vec<_> = (0..5).map(|_| Stub::new("p")).collect();
        // Youngest first
        let left = vec![p[4].clone(), p[2].clone(), p[0].clone()];
        let right: Vec<_> = p.iter().rev().cloned().collect();
        let merged = merge_by_age(left, right);
        let ids: Vec<_> = merged.iter().map(|c| c.id()).collect();
        let expected: Vec<_> = p.iter().rev().map(|c| c.id()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn merge_by_age_with_empty_side() {
        let a = Stub::new("a");
        let merged = merge_by_age(vec![a.clone()], Vec::new());
        assert_eq!(merged.len(), 1);
        let merged = merge_by_age(Vec::new(), vec![a]);
        assert_eq!(merged.len(), 1);
    }
}
