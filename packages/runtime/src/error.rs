//! Error types for the CHR runtime.

use std::fmt::Debug;

use chr_trampoline::StackError;
use thiserror::Error;

/// Errors raised by constraint list operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The list holds no live constraint.
    #[error("constraint list is empty")]
    NotFound,
}

/// Errors that can occur while running rules.
///
/// Binding failures and instantiation errors are ordinary outcomes of a
/// derivation and unwind to whoever started the run. The remaining variants
/// report misuse of the runtime or of its configuration.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A variable was bound or unified inconsistently with its current value.
    #[error("binding failure: cannot unify {expected} with {found}")]
    BindingFailure {
        /// The value already held.
        expected: String,
        /// The value that was told.
        found: String,
    },

    /// The value of an unbound variable was read.
    #[error("instantiation error: {variable} is unbound")]
    Instantiation {
        /// Description of the variable.
        variable: String,
    },

    /// Structural misuse of the continuation stack.
    #[error("stack error: {0}")]
    Stack(#[from] StackError),

    /// Constraint list operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The configured step limit was reached.
    #[error("step limit of {limit} continuations exceeded")]
    StepLimitExceeded {
        /// The configured limit.
        limit: u64,
    },

    /// Host code running inside the engine failed.
    #[error("host code failed: {0}")]
    Host(Box<dyn std::error::Error>),

    /// Reading a configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration document could not be parsed.
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
}

impl RuntimeError {
    /// Build a binding failure from the two conflicting values.
    pub fn binding_failure(expected: &impl Debug, found: &impl Debug) -> Self {
        RuntimeError::BindingFailure {
            expected: format!("{:?}", expected),
            found: format!("{:?}", found),
        }
    }

    /// Wrap an error raised by host code.
    pub fn host(error: impl std::error::Error + 'static) -> Self {
        RuntimeError::Host(Box::new(error))
    }

    /// True for the failures that signal a failed derivation rather than misuse.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RuntimeError::BindingFailure { .. } | RuntimeError::Instantiation { .. }
        )
    }
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
