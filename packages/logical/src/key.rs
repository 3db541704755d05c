//! External hash-index entries keyed on a variable.

use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// An entry of an external hash table whose key depends on a variable.
///
/// An unbound variable hashes by the identity of its root; a bound one by its
/// value. Both binding and aliasing therefore change the key, and every
/// registered entry is asked to move itself.
pub trait RehashableKey {
    /// Recompute the key and reposition the entry.
    ///
    /// Returns false when the entry no longer depends on the variable and
    /// can be dropped from its observer set.
    fn rehash(&self) -> bool;
}

/// Set element comparing keys by address.
#[derive(Clone)]
pub(crate) struct KeyRef(pub(crate) Rc<dyn RehashableKey>);

impl KeyRef {
    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for KeyRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for KeyRef {}

impl Hash for KeyRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}
