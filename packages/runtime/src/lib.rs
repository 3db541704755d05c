//! # CHR Runtime
//!
//! The execution substrate for compiled Constraint Handling Rules programs.
//! A rule compiler generates concrete constraint types and the matching code
//! that scans the constraint store; this crate supplies what that code runs
//! on:
//!
//! - [`ExecutionContext`]: the trampoline loop plus the flags that decide
//!   whether a tell on a built-in constraint runs now or is queued
//! - [`Constraint`] and [`ConstraintState`]: identity, age and lifecycle of
//!   stored constraints
//! - [`SinglyLinkedConstraintList`] and [`DoublyLinkedConstraintList`]:
//!   age-ordered stores whose iterators tolerate the mutations rule bodies
//!   make while matching is in progress
//! - [`Tracer`]: hooks for observing lifecycle events
//!
//! ## Continuations
//!
//! Rule bodies and built-in tells never call each other directly. Each step
//! returns the next [`Continuation`] to run, or `None` to resume whatever is
//! on the stack. This keeps propagation depth off the call stack: waking a
//! thousand suspended constraints pushes a thousand frames, it does not
//! recurse a thousand times.
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use chr_runtime::{continuation, ExecutionContext};
//!
//! let hits = Rc::new(Cell::new(0));
//! let mut cx = ExecutionContext::default();
//!
//! let counter = hits.clone();
//! let tick = continuation::from_fn(move |_| {
//!     counter.set(counter.get() + 1);
//!     Ok(None)
//! });
//!
//! // Schedule three ticks instead of calling them
//! let start = continuation::from_fn(move |cx| {
//!     cx.stack_mut().push_all([tick.clone(), tick.clone(), tick.clone()]);
//!     Ok(None)
//! });
//!
//! cx.run(start).unwrap();
//! assert_eq!(hits.get(), 3);
//! ```
//!
//! ## Deferral
//!
//! While host code runs with queuing requested, tells are appended to the
//! context's queue instead of executing. The queue is drained onto the stack
//! when control returns to the engine, so all deferred work runs in the order
//! it was told.

pub mod config;
pub mod constraint;
pub mod context;
pub mod continuation;
pub mod error;
pub mod list;
pub mod tracer;

pub use config::RuntimeConfig;
pub use constraint::{AsConstraint, Constraint, ConstraintId, ConstraintState, NodeHandle};
pub use context::ExecutionContext;
pub use continuation::{
    Continuation, ContinuationRef, FnContinuation, QueuedBuiltInConstraint,
    QueuedHostLanguageCode, Reactivation,
};
pub use error::{Result, RuntimeError, StoreError};
pub use list::{
    ConstraintIter, ConstraintList, DoublyLinkedConstraintList, IterationSafety, NodeId,
    SinglyLinkedConstraintList,
};
pub use tracer::{NoopTracer, Tracer, TracingTracer};

pub use chr_trampoline::{ContinuationQueue, ContinuationStack, StackError};
