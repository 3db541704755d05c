//! Hash index of constraints keyed on logical variables.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::mem;
use std::rc::{Rc, Weak};

use chr_runtime::{Constraint, ConstraintIter, ConstraintList, DoublyLinkedConstraintList};
use tracing::debug;

use crate::key::RehashableKey;
use crate::variables::{Logical, VarId, Variables, WeakVariables};

/// Hash key of a logical variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey<T> {
    /// The variable is bound.
    Value(T),
    /// The variable is unbound; keyed by the root of its class.
    Var(VarId),
}

impl<T> IndexKey<T> {
    pub fn is_var(&self) -> bool {
        matches!(self, IndexKey::Var(_))
    }
}

type Buckets<T> = RefCell<HashMap<IndexKey<T>, Rc<IndexEntry<T>>>>;

/// One bucket: the constraints whose indexed variable shares a key.
struct IndexEntry<T> {
    key: RefCell<IndexKey<T>>,
    /// Any variable of the keyed class.
    var: Logical<T>,
    vars: WeakVariables<T>,
    buckets: Weak<Buckets<T>>,
    members: RefCell<DoublyLinkedConstraintList<dyn Constraint>>,
}

impl<T: Hash + Eq + Clone + fmt::Debug + 'static> IndexEntry<T> {
    fn detach(&self, buckets: &Buckets<T>, key: &IndexKey<T>) -> Option<Rc<IndexEntry<T>>> {
        let mut map = buckets.borrow_mut();
        match map.get(key) {
            Some(entry) if std::ptr::eq(Rc::as_ptr(entry), self) => map.remove(key),
            _ => None,
        }
    }
}

impl<T: Hash + Eq + Clone + fmt::Debug + 'static> RehashableKey for IndexEntry<T> {
    fn rehash(&self) -> bool {
        let (Some(vars), Some(buckets)) = (self.vars.upgrade(), self.buckets.upgrade()) else {
            return false;
        };
        let old_key = self.key.borrow().clone();
        if self.members.borrow().is_empty() {
            self.detach(&buckets, &old_key);
            return false;
        }

        let new_key = vars.key_of(self.var);
        if new_key == old_key {
            return new_key.is_var();
        }
        let Some(this) = self.detach(&buckets, &old_key) else {
            return false;
        };
        *self.key.borrow_mut() = new_key.clone();

        let existing = buckets.borrow().get(&new_key).cloned();
        match existing {
            Some(existing) => {
                let absorbed = mem::take(&mut *self.members.borrow_mut());
                existing.members.borrow_mut().merge_with(absorbed);
                debug!(from = ?old_key, to = ?new_key, "index buckets merged");
                false
            }
            None => {
                debug!(from = ?old_key, to = ?new_key, "index bucket moved");
                buckets.borrow_mut().insert(new_key.clone(), this);
                new_key.is_var()
            }
        }
    }
}

/// Hash index of constraints on one argument position.
///
/// Constraints are bucketed by the key of their indexed variable: its value
/// when ground, the root of its class when not. The index registers each
/// unbound bucket as a hash observer, so binding or aliasing a variable moves
/// its bucket, merging it into any bucket already under the new key.
///
/// ```rust
/// use chr_logical::{LogicalIndex, Variables};
/// use chr_runtime::ExecutionContext;
///
/// let mut cx = ExecutionContext::default();
/// let vars: Variables<u32> = Variables::new();
/// let index = LogicalIndex::new(&vars);
///
/// let x = vars.fresh();
/// assert_eq!(index.lookup(x).count(), 0);
///
/// vars.bind_value(&mut cx, x, 3).unwrap();
/// assert_eq!(index.lookup_value(&3).count(), 0);
/// ```
pub struct LogicalIndex<T> {
    vars: Variables<T>,
    buckets: Rc<Buckets<T>>,
}

impl<T: Hash + Eq + Clone + fmt::Debug + 'static> LogicalIndex<T> {
    pub fn new(vars: &Variables<T>) -> Self {
        Self {
            vars: vars.clone(),
            buckets: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Index `constraint` under the current key of `var`.
    ///
    /// Returns false if it was already in that bucket.
    pub fn insert(&self, var: Logical<T>, constraint: Rc<dyn Constraint>) -> bool {
        let key = self.vars.key_of(var);
        let entry = self
            .buckets
            .borrow_mut()
            .entry(key.clone())
            .or_insert_with(|| {
                Rc::new(IndexEntry {
                    key: RefCell::new(key.clone()),
                    var,
                    vars: self.vars.downgrade(),
                    buckets: Rc::downgrade(&self.buckets),
                    members: RefCell::new(DoublyLinkedConstraintList::new()),
                })
            })
            .clone();
        let inserted = entry.members.borrow_mut().insert(constraint);
        if key.is_var() {
            self.vars.add_hash_observer(var, entry);
        }
        inserted
    }

    /// Constraints indexed under the current key of `var`, youngest first.
    pub fn lookup(&self, var: Logical<T>) -> ConstraintIter<dyn Constraint> {
        self.lookup_key(&self.vars.key_of(var))
    }

    /// Constraints whose indexed variable is bound to `value`.
    pub fn lookup_value(&self, value: &T) -> ConstraintIter<dyn Constraint> {
        self.lookup_key(&IndexKey::Value(value.clone()))
    }

    fn lookup_key(&self, key: &IndexKey<T>) -> ConstraintIter<dyn Constraint> {
        let entry = self.buckets.borrow().get(key).cloned();
        match entry {
            Some(entry) => {
                let members = entry.members.borrow();
                members.universal_iter()
            }
            None => DoublyLinkedConstraintList::<dyn Constraint>::new().universal_iter(),
        }
    }

    /// Number of buckets, including ones emptied by removals.
    pub fn bucket_count(&self) -> usize {
        self.buckets.borrow().len()
    }
}

impl<T: fmt::Debug> fmt::Debug for LogicalIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buckets = self.buckets.borrow();
        f.debug_map()
            .entries(
                buckets
                    .iter()
                    .map(|(key, entry)| (key, entry.members.borrow().len())),
            )
            .finish()
    }
}
