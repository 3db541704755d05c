//! Units of work driven by the trampoline.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::constraint::Constraint;
use crate::context::ExecutionContext;
use crate::error::Result;

/// Shared handle to a continuation.
pub type ContinuationRef = Rc<dyn Continuation>;

/// One step of rule or built-in execution.
///
/// Calling a continuation returns the next one to run directly, or `None`
/// to resume whatever is on top of the stack.
pub trait Continuation {
    fn call(&self, cx: &mut ExecutionContext) -> Result<Option<ContinuationRef>>;
}

/// Continuation backed by a closure.
pub struct FnContinuation<F> {
    f: F,
}

impl<F> Continuation for FnContinuation<F>
where
    F: Fn(&mut ExecutionContext) -> Result<Option<ContinuationRef>>,
{
    fn call(&self, cx: &mut ExecutionContext) -> Result<Option<ContinuationRef>> {
        (self.f)(cx)
    }
}

impl<F> fmt::Debug for FnContinuation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnContinuation")
    }
}

/// Wrap a closure as a continuation.
///
/// ```rust
/// use chr_runtime::{continuation, ExecutionContext};
///
/// let mut cx = ExecutionContext::default();
/// cx.run(continuation::from_fn(|_| Ok(None))).unwrap();
/// ```
pub fn from_fn<F>(f: F) -> ContinuationRef
where
    F: Fn(&mut ExecutionContext) -> Result<Option<ContinuationRef>> + 'static,
{
    Rc::new(FnContinuation { f })
}

/// Re-attempts rule matching for a suspended constraint.
///
/// Dead constraints are skipped.
#[derive(Debug)]
pub struct Reactivation {
    constraint: Rc<dyn Constraint>,
}

impl Reactivation {
    pub fn new(constraint: Rc<dyn Constraint>) -> Self {
        Self { constraint }
    }

    pub fn constraint(&self) -> &Rc<dyn Constraint> {
        &self.constraint
    }
}

impl Continuation for Reactivation {
    fn call(&self, cx: &mut ExecutionContext) -> Result<Option<ContinuationRef>> {
        if !self.constraint.is_alive() {
            return Ok(None);
        }
        cx.tracer().reactivated(&*self.constraint);
        self.constraint.clone().reactivate(cx)
    }
}

type Deferred = Box<dyn FnOnce(&mut ExecutionContext) -> Result<()>>;

/// A built-in tell that was deferred while the context was queuing.
///
/// Runs at most once; a second call does nothing.
pub struct QueuedBuiltInConstraint {
    tell: Cell<Option<Deferred>>,
}

impl QueuedBuiltInConstraint {
    pub fn new<F>(tell: F) -> Self
    where
        F: FnOnce(&mut ExecutionContext) -> Result<()> + 'static,
    {
        Self {
            tell: Cell::new(Some(Box::new(tell))),
        }
    }
}

impl Continuation for QueuedBuiltInConstraint {
    fn call(&self, cx: &mut ExecutionContext) -> Result<Option<ContinuationRef>> {
        if let Some(tell) = self.tell.take() {
            tell(cx)?;
        }
        Ok(None)
    }
}

impl fmt::Debug for QueuedBuiltInConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueuedBuiltInConstraint")
    }
}

/// Host code embedded in a rule body.
///
/// Runs with host-language mode switched on, so tells it makes are queued if
/// queuing was requested. When it returns, the whole queue is drained onto
/// the stack before the trampoline resumes. That includes work queued before
/// the code ran, which is replayed ahead of the code's own tells.
pub struct QueuedHostLanguageCode {
    code: Cell<Option<Deferred>>,
}

impl QueuedHostLanguageCode {
    pub fn new<F>(code: F) -> Self
    where
        F: FnOnce(&mut ExecutionContext) -> Result<()> + 'static,
    {
        Self {
            code: Cell::new(Some(Box::new(code))),
        }
    }
}

impl Continuation for QueuedHostLanguageCode {
    fn call(&self, cx: &mut ExecutionContext) -> Result<Option<ContinuationRef>> {
        let Some(code) = self.code.take() else {
            return Ok(None);
        };
        let engine_mode = cx.set_host_language_mode(true);
        let result = code(cx);
        cx.set_host_language_mode(engine_mode);
        result?;
        Ok(cx.drain_queue())
    }
}

impl fmt::Debug for QueuedHostLanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueuedHostLanguageCode")
    }
}
