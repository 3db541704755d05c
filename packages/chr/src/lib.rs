//! CHR: runtime support for compiled Constraint Handling Rules programs.
//!
//! Generated code depends on this crate alone. It re-exports the layers:
//!
//! - [`trampoline`]: block-segmented continuation stack and queue
//! - [`runtime`]: execution context, constraint base, constraint lists, tracer
//! - [`logical`]: union-find logical variables and variable-keyed indexes
//!
//! The [`prelude`] gathers what a rule body usually needs.

pub use chr_logical as logical;
pub use chr_runtime as runtime;
pub use chr_trampoline as trampoline;

pub mod prelude {
    pub use chr_logical::{FreeLogical, Logical, LogicalIndex, RehashableKey, Variables};
    pub use chr_runtime::continuation::{self, Continuation, ContinuationRef};
    pub use chr_runtime::{
        Constraint, ConstraintList, ConstraintState, DoublyLinkedConstraintList,
        ExecutionContext, IterationSafety, QueuedHostLanguageCode, Result, RuntimeConfig,
        RuntimeError, SinglyLinkedConstraintList, Tracer,
    };
}
