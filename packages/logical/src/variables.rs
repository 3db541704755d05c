//! Union-find arena of logical variables.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::rc::{Rc, Weak};

use chr_runtime::{
    Constraint, ConstraintList, DoublyLinkedConstraintList, ExecutionContext, Result,
    RuntimeError,
};
use tracing::debug;

use crate::index::IndexKey;
use crate::key::{KeyRef, RehashableKey};

/// Index of a variable in its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_G{}", self.0)
    }
}

/// Handle to a logical variable holding values of type `T`.
///
/// Handles are plain indices: copying one does not create a new variable,
/// and equality compares the variables themselves, not their classes. Use
/// [`Variables::same`] to compare classes.
pub struct Logical<T> {
    id: VarId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Logical<T> {
    fn new(id: VarId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> VarId {
        self.id
    }
}

impl<T> Clone for Logical<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Logical<T> {}

impl<T> PartialEq for Logical<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Logical<T> {}

impl<T> Hash for Logical<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Logical<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Logical({})", self.id)
    }
}

/// The value type of [`FreeLogical`]: it has no values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unbindable {}

/// Untyped logical variable. It can be aliased but never bound.
pub type FreeLogical = Logical<Unbindable>;

struct VarSlot<T> {
    /// `None` for a root.
    parent: Option<VarId>,
    rank: u32,
    value: Option<T>,
    observers: DoublyLinkedConstraintList<dyn Constraint>,
    hash_observers: HashSet<KeyRef>,
}

impl<T> VarSlot<T> {
    fn new(value: Option<T>) -> Self {
        Self {
            parent: None,
            rank: 0,
            value,
            observers: DoublyLinkedConstraintList::new(),
            hash_observers: HashSet::new(),
        }
    }
}

struct VarArena<T> {
    slots: Vec<VarSlot<T>>,
}

impl<T> VarArena<T> {
    fn alloc(&mut self, value: Option<T>) -> VarId {
        let id = VarId(self.slots.len() as u32);
        self.slots.push(VarSlot::new(value));
        id
    }

    /// Root lookup with path compression.
    fn find(&mut self, id: VarId) -> VarId {
        let mut root = id;
        while let Some(parent) = self.slots[root.index()].parent {
            root = parent;
        }
        let mut cursor = id;
        while let Some(parent) = self.slots[cursor.index()].parent {
            self.slots[cursor.index()].parent = Some(root);
            cursor = parent;
        }
        root
    }

    fn root(&mut self, id: VarId) -> &mut VarSlot<T> {
        let root = self.find(id);
        &mut self.slots[root.index()]
    }
}

/// Work left over once the arena borrow is released.
struct Wakeups {
    reactivate: Vec<Rc<dyn Constraint>>,
    /// Keys to rehash and then drop.
    dispose: Vec<KeyRef>,
    /// Keys to rehash and keep on `root` if still in use.
    absorb: Vec<KeyRef>,
    root: VarId,
}

impl Wakeups {
    fn none(root: VarId) -> Self {
        Self {
            reactivate: Vec::new(),
            dispose: Vec::new(),
            absorb: Vec::new(),
            root,
        }
    }
}

/// Arena of logical variables sharing one union-find forest.
///
/// `Variables` is a cheap handle; clones refer to the same arena. All
/// operations go through `find`, so only a root's value and observers are
/// ever read.
///
/// # Example
///
/// ```rust
/// use chr_logical::Variables;
/// use chr_runtime::ExecutionContext;
///
/// let mut cx = ExecutionContext::default();
/// let vars: Variables<i64> = Variables::new();
///
/// let x = vars.fresh();
/// let y = vars.fresh();
/// vars.union(&mut cx, x, y).unwrap();
/// vars.bind_value(&mut cx, y, 42).unwrap();
///
/// assert_eq!(vars.value(x).unwrap(), 42);
/// assert!(vars.same(x, y));
/// ```
pub struct Variables<T> {
    arena: Rc<RefCell<VarArena<T>>>,
}

impl<T> Clone for Variables<T> {
    fn clone(&self) -> Self {
        Self {
            arena: self.arena.clone(),
        }
    }
}

/// Non-owning handle held by index entries, which the arena itself owns.
pub(crate) struct WeakVariables<T> {
    arena: Weak<RefCell<VarArena<T>>>,
}

impl<T> WeakVariables<T> {
    pub(crate) fn upgrade(&self) -> Option<Variables<T>> {
        self.arena.upgrade().map(|arena| Variables { arena })
    }
}

impl<T> Default for Variables<T> {
    fn default() -> Self {
        Self {
            arena: Rc::new(RefCell::new(VarArena { slots: Vec::new() })),
        }
    }
}

impl<T> Variables<T> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn downgrade(&self) -> WeakVariables<T> {
        WeakVariables {
            arena: Rc::downgrade(&self.arena),
        }
    }

    /// Number of variables ever created.
    pub fn len(&self) -> usize {
        self.arena.borrow().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create an unbound variable.
    pub fn fresh(&self) -> Logical<T> {
        Logical::new(self.arena.borrow_mut().alloc(None))
    }

    /// Create a variable already bound to `value`.
    pub fn with_value(&self, value: T) -> Logical<T> {
        Logical::new(self.arena.borrow_mut().alloc(Some(value)))
    }

    /// The representative of `x`'s class.
    ///
    /// Compresses the path walked, so `find(find(x)) == find(x)` in one step.
    pub fn find(&self, x: Logical<T>) -> Logical<T> {
        Logical::new(self.arena.borrow_mut().find(x.id))
    }

    /// True if `x` is unbound.
    pub fn is_var(&self, x: Logical<T>) -> bool {
        self.arena.borrow_mut().root(x.id).value.is_none()
    }

    /// True if `x` is bound.
    pub fn is_ground(&self, x: Logical<T>) -> bool {
        !self.is_var(x)
    }

    /// Register `constraint` to be reactivated when `x` is bound or aliased.
    ///
    /// Returns false if it was already registered on `x`'s class.
    pub fn add_variable_observer(&self, x: Logical<T>, constraint: Rc<dyn Constraint>) -> bool {
        self.arena.borrow_mut().root(x.id).observers.insert(constraint)
    }

    /// Register an external index entry keyed on `x`.
    ///
    /// Returns false if it was already registered on `x`'s class.
    pub fn add_hash_observer(&self, x: Logical<T>, key: Rc<dyn RehashableKey>) -> bool {
        self.arena
            .borrow_mut()
            .root(x.id)
            .hash_observers
            .insert(KeyRef(key))
    }

    /// Number of live variable observers on `x`'s class.
    pub fn observer_count(&self, x: Logical<T>) -> usize {
        self.arena.borrow_mut().root(x.id).observers.len()
    }

    /// Number of hash observers on `x`'s class.
    pub fn hash_observer_count(&self, x: Logical<T>) -> usize {
        self.arena.borrow_mut().root(x.id).hash_observers.len()
    }

    fn deliver(&self, cx: &mut ExecutionContext, wakeups: Wakeups) {
        for constraint in wakeups.reactivate {
            cx.reactivate(constraint);
        }
        for key in wakeups.dispose {
            key.0.rehash();
        }
        for key in wakeups.absorb {
            if key.0.rehash() {
                self.arena
                    .borrow_mut()
                    .root(wakeups.root)
                    .hash_observers
                    .insert(key);
            }
        }
    }
}

impl<T: Clone> Variables<T> {
    /// Current value of `x`, if bound.
    pub fn try_value(&self, x: Logical<T>) -> Option<T> {
        self.arena.borrow_mut().root(x.id).value.clone()
    }

    /// Hash key of `x`: its value when bound, its root when not.
    pub fn key_of(&self, x: Logical<T>) -> IndexKey<T> {
        let mut arena = self.arena.borrow_mut();
        let root = arena.find(x.id);
        match &arena.slots[root.index()].value {
            Some(value) => IndexKey::Value(value.clone()),
            None => IndexKey::Var(root),
        }
    }

    /// Current value of `x`.
    ///
    /// Reading an unbound variable is an instantiation error.
    pub fn value(&self, x: Logical<T>) -> Result<T> {
        self.try_value(x).ok_or_else(|| RuntimeError::Instantiation {
            variable: x.id.to_string(),
        })
    }
}

impl<T: Clone + PartialEq + fmt::Debug> Variables<T> {
    /// True if `x` and `y` are aliased, or both bound to equal values.
    pub fn same(&self, x: Logical<T>, y: Logical<T>) -> bool {
        let mut arena = self.arena.borrow_mut();
        let rx = arena.find(x.id);
        let ry = arena.find(y.id);
        if rx == ry {
            return true;
        }
        match (&arena.slots[rx.index()].value, &arena.slots[ry.index()].value) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Bind `x` to `value` right away, regardless of the queuing state.
    ///
    /// Rebinding to an equal value does nothing; to an unequal value is a
    /// binding failure that leaves the current value in place. On success the
    /// class's observers are pushed for reactivation and its hash observers
    /// are rehashed and dropped.
    pub fn bind_now(&self, cx: &mut ExecutionContext, x: Logical<T>, value: T) -> Result<()> {
        let wakeups = {
            let mut arena = self.arena.borrow_mut();
            let root = arena.find(x.id);
            let slot = &mut arena.slots[root.index()];
            match &slot.value {
                Some(current) if *current == value => return Ok(()),
                Some(current) => {
                    debug!(var = %root, ?current, ?value, "binding failed");
                    return Err(RuntimeError::binding_failure(current, &value));
                }
                None => {}
            }
            debug!(var = %root, ?value, "bound");
            slot.value = Some(value);
            Wakeups {
                reactivate: slot.observers.take_all(),
                dispose: slot.hash_observers.drain().collect(),
                absorb: Vec::new(),
                root,
            }
        };
        self.deliver(cx, wakeups);
        Ok(())
    }

    /// Alias `x` and `y` right away, regardless of the queuing state.
    ///
    /// Union by rank; on a tie `x`'s root survives. Unequal values fail
    /// before anything is mutated.
    pub fn union_now(&self, cx: &mut ExecutionContext, x: Logical<T>, y: Logical<T>) -> Result<()> {
        let wakeups = {
            let mut arena = self.arena.borrow_mut();
            let rx = arena.find(x.id);
            let ry = arena.find(y.id);
            if rx == ry {
                return Ok(());
            }
            if let (Some(a), Some(b)) = (
                &arena.slots[rx.index()].value,
                &arena.slots[ry.index()].value,
            ) {
                if a != b {
                    debug!(x = %rx, y = %ry, "union failed");
                    return Err(RuntimeError::binding_failure(a, b));
                }
            }

            let (rank_x, rank_y) = (arena.slots[rx.index()].rank, arena.slots[ry.index()].rank);
            let (root, child) = if rank_x >= rank_y { (rx, ry) } else { (ry, rx) };
            if rank_x == rank_y {
                arena.slots[root.index()].rank += 1;
            }

            let absorbed = &mut arena.slots[child.index()];
            absorbed.parent = Some(root);
            let child_value = absorbed.value.take();
            let child_observers = mem::take(&mut absorbed.observers);
            let child_keys: Vec<KeyRef> = absorbed.hash_observers.drain().collect();
            let newcomers: Vec<Rc<dyn Constraint>> = child_observers.existential_iter().collect();

            let survivor = &mut arena.slots[root.index()];
            let one_sided = survivor.value.is_some() != child_value.is_some();
            if survivor.value.is_none() {
                survivor.value = child_value;
            }
            survivor.observers.merge_with(child_observers);
            debug!(root = %root, absorbed = %child, one_sided, "union");

            if one_sided {
                let mut dispose = child_keys;
                dispose.extend(survivor.hash_observers.drain());
                Wakeups {
                    reactivate: survivor.observers.take_all(),
                    dispose,
                    absorb: Vec::new(),
                    root,
                }
            } else {
                let mut wakeups = Wakeups::none(root);
                wakeups.reactivate = newcomers;
                wakeups.absorb = child_keys;
                wakeups
            }
        };
        self.deliver(cx, wakeups);
        Ok(())
    }
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> Variables<T> {
    /// Tell `x = value`.
    ///
    /// Deferred while the context is queuing; otherwise performed at once,
    /// and when told from host code the propagation it triggers runs to
    /// completion before returning.
    pub fn bind_value(&self, cx: &mut ExecutionContext, x: Logical<T>, value: T) -> Result<()> {
        let vars = self.clone();
        cx.tell(move |cx| vars.bind_now(cx, x, value))
    }

    /// Tell `x = y`, with the same deferral rules as [`Variables::bind_value`].
    pub fn union(&self, cx: &mut ExecutionContext, x: Logical<T>, y: Logical<T>) -> Result<()> {
        let vars = self.clone();
        cx.tell(move |cx| vars.union_now(cx, x, y))
    }
}

impl<T: fmt::Debug> fmt::Debug for Variables<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arena = self.arena.borrow();
        let mut list = f.debug_list();
        for (i, slot) in arena.slots.iter().enumerate() {
            match (&slot.parent, &slot.value) {
                (Some(parent), _) => list.entry(&format_args!("_G{} -> {}", i, parent)),
                (None, Some(value)) => list.entry(&format_args!("_G{} = {:?}", i, value)),
                (None, None) => list.entry(&format_args!("_G{}", i)),
            };
        }
        list.finish()
    }
}
