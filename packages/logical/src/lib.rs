//! # CHR Logical Variables
//!
//! Union-find logical variables for the CHR runtime. A [`Variables`] arena
//! owns a forest of variables; [`Logical`] handles index into it. Each class
//! root carries the class value and two kinds of observers:
//!
//! - **variable observers**: suspended constraints, reactivated through the
//!   execution context when the class is bound or aliased
//! - **hash observers**: external index entries ([`RehashableKey`]) whose key
//!   depends on the variable and must move when it changes
//!
//! Binding and aliasing are tells: while the context is queuing they are
//! deferred, otherwise they run at once.
//!
//! ```rust
//! use chr_logical::{FreeLogical, Variables};
//! use chr_runtime::ExecutionContext;
//!
//! let mut cx = ExecutionContext::default();
//! let vars = Variables::new();
//!
//! let a: FreeLogical = vars.fresh();
//! let b: FreeLogical = vars.fresh();
//! vars.union(&mut cx, a, b).unwrap();
//!
//! assert_eq!(vars.find(a), vars.find(b));
//! ```

pub mod index;
pub mod key;
pub mod variables;

pub use index::{IndexKey, LogicalIndex};
pub use key::RehashableKey;
pub use variables::{FreeLogical, Logical, Unbindable, VarId, Variables};
