//! Error types for the trampoline layer.
//!
//! Every error here is a caller contract violation. Correctly generated rule
//! code never triggers them; they exist so that misuse is reported instead of
//! silently corrupting the stack.

use thiserror::Error;

/// Structural misuse of a [`ContinuationStack`](crate::ContinuationStack).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    /// `undo_pop` was called without a directly preceding `pop`.
    ///
    /// This covers calling it twice in a row and calling it after a push.
    #[error("undo_pop without a matching pop")]
    UndoUnavailable,

    /// A stack-relative index does not address a live item.
    #[error("stack index {index} out of bounds for stack of size {size}")]
    IndexOutOfBounds {
        /// Index counted from the top of the stack (0 is the top).
        index: usize,
        /// Number of items on the stack at the time of the call.
        size: usize,
    },
}
