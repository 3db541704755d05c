//! The execution context: trampoline, queue, and mode flags for one run.

use std::fmt;
use std::mem;
use std::rc::Rc;

use chr_trampoline::{ContinuationQueue, ContinuationStack};
use tracing::{debug, trace};

use crate::config::RuntimeConfig;
use crate::constraint::Constraint;
use crate::continuation::{ContinuationRef, QueuedBuiltInConstraint, Reactivation};
use crate::error::{Result, RuntimeError};
use crate::list::ConstraintList;
use crate::tracer::{NoopTracer, Tracer, TracingTracer};

/// State of one logical run of the engine.
///
/// The context owns the continuation stack and queue and decides whether a
/// tell on a built-in constraint executes now or is deferred. It is passed
/// explicitly to every entry point and is never shared between runs.
///
/// Two flags govern deferral:
///
/// - `host_language_mode` is true while ordinary host code is running and
///   false while the trampoline drives rule code.
/// - `queuing_requested` is set by the host around spans that must not
///   trigger propagation.
///
/// Tells are queued only when both are set.
///
/// # Example
///
/// ```rust
/// use chr_runtime::{continuation, ExecutionContext, RuntimeConfig};
///
/// let mut cx = ExecutionContext::new(RuntimeConfig::default());
/// assert!(cx.is_host_language_mode());
///
/// cx.run(continuation::from_fn(|cx| {
///     assert!(!cx.is_host_language_mode());
///     Ok(None)
/// }))
/// .unwrap();
/// assert!(cx.is_host_language_mode());
/// ```
pub struct ExecutionContext {
    stack: ContinuationStack<ContinuationRef>,
    queue: ContinuationQueue<ContinuationRef>,
    host_language_mode: bool,
    queuing_requested: bool,
    tracer: Rc<dyn Tracer>,
    config: RuntimeConfig,
    /// Steps taken by the outermost active run.
    steps: u64,
    /// Nesting depth of active runs.
    runs: usize,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl ExecutionContext {
    /// Create a context from a configuration.
    pub fn new(config: RuntimeConfig) -> Self {
        let tracer: Rc<dyn Tracer> = if config.trace {
            Rc::new(TracingTracer)
        } else {
            Rc::new(NoopTracer)
        };
        Self {
            stack: ContinuationStack::new(),
            queue: ContinuationQueue::new(),
            host_language_mode: true,
            queuing_requested: config.start_queuing,
            tracer,
            config,
            steps: 0,
            runs: 0,
        }
    }

    /// Same as [`ExecutionContext::new`].
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::new(config)
    }

    /// Replace the tracer.
    pub fn with_tracer(mut self, tracer: impl Tracer + 'static) -> Self {
        self.tracer = Rc::new(tracer);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn tracer(&self) -> &dyn Tracer {
        &*self.tracer
    }

    pub fn stack(&self) -> &ContinuationStack<ContinuationRef> {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut ContinuationStack<ContinuationRef> {
        &mut self.stack
    }

    pub fn queue(&self) -> &ContinuationQueue<ContinuationRef> {
        &self.queue
    }

    /// Push a continuation onto the stack.
    pub fn push(&mut self, continuation: ContinuationRef) {
        self.stack.push(continuation);
    }

    /// Append a continuation to the queue.
    pub fn enqueue(&mut self, continuation: ContinuationRef) {
        trace!(queued = self.queue.len() + 1, "enqueue");
        self.queue.enqueue(continuation);
    }

    /// True if tells are currently deferred.
    pub fn is_queuing(&self) -> bool {
        self.queuing_requested && self.host_language_mode
    }

    /// Request or stop deferral of tells, returning the previous request.
    pub fn set_queuing(&mut self, queuing: bool) -> bool {
        mem::replace(&mut self.queuing_requested, queuing)
    }

    pub fn is_host_language_mode(&self) -> bool {
        self.host_language_mode
    }

    /// Switch host-language mode, returning the previous mode.
    pub fn set_host_language_mode(&mut self, host: bool) -> bool {
        mem::replace(&mut self.host_language_mode, host)
    }

    /// Discard the stack and queue and restore the initial flags.
    ///
    /// From inside a run, the host mode and step count belong to the
    /// enclosing runs and are restored by them; each run returns once its
    /// current frame does.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.queue.clear();
        self.queuing_requested = self.config.start_queuing;
        if self.runs == 0 {
            self.host_language_mode = true;
            self.steps = 0;
        }
    }

    /// Run `start` and everything it leads to.
    ///
    /// Frames already on the stack are left for the caller.
    pub fn run(&mut self, start: ContinuationRef) -> Result<()> {
        let floor = self.stack.len();
        self.drive(Some(start), floor)
    }

    /// Drive whatever is on the stack until it is empty.
    pub fn run_pending(&mut self) -> Result<()> {
        self.drive(None, 0)
    }

    /// Drive the stack until it shrinks back to `floor` entries.
    pub fn run_until(&mut self, floor: usize) -> Result<()> {
        self.drive(None, floor)
    }

    /// Drain the queue and run what was in it.
    pub fn run_queued(&mut self) -> Result<()> {
        let floor = self.stack.len();
        match self.queue.poll_and_push(&mut self.stack) {
            Some(first) => self.drive(Some(first), floor),
            None => Ok(()),
        }
    }

    /// Drain the queue onto the stack, followed by `then`.
    ///
    /// Returns the continuation to run next: the first queued one, or `then`
    /// if nothing was queued.
    pub fn flush_queue(&mut self, then: ContinuationRef) -> ContinuationRef {
        self.queue.poll_and_push_then(&mut self.stack, then)
    }

    /// Drain the queue onto the stack, returning the first queued item.
    pub fn drain_queue(&mut self) -> Option<ContinuationRef> {
        if !self.queue.is_empty() {
            trace!(queued = self.queue.len(), "drain queue");
        }
        self.queue.poll_and_push(&mut self.stack)
    }

    /// Tell a built-in constraint.
    ///
    /// Deferred as a [`QueuedBuiltInConstraint`] while queuing; otherwise
    /// executed at once. A tell made from host code also drives the
    /// propagation it caused to completion before returning.
    pub fn tell<F>(&mut self, tell: F) -> Result<()>
    where
        F: FnOnce(&mut ExecutionContext) -> Result<()> + 'static,
    {
        if self.is_queuing() {
            self.enqueue(Rc::new(QueuedBuiltInConstraint::new(tell)));
            return Ok(());
        }
        let floor = self.stack.len();
        tell(self)?;
        if self.host_language_mode {
            self.run_until(floor)
        } else {
            Ok(())
        }
    }

    /// Schedule a reactivation of `constraint`.
    pub fn reactivate(&mut self, constraint: Rc<dyn Constraint>) {
        self.stack.push(Rc::new(Reactivation::new(constraint)));
    }

    /// Add `constraint` to `list` and report it as stored.
    pub fn store<C, L>(&self, list: &mut L, constraint: Rc<C>)
    where
        C: Constraint + ?Sized,
        L: ConstraintList<C>,
    {
        list.add_first(constraint.clone());
        self.tracer.stored(constraint.as_constraint());
    }

    /// Report that `constraint` became active.
    pub fn activate(&self, constraint: &dyn Constraint) {
        self.tracer.activated(constraint);
    }

    /// Terminate `constraint`, reporting its removal.
    ///
    /// Returns false if it was already dead.
    pub fn kill(&self, constraint: &dyn Constraint) -> bool {
        let stored = constraint.is_stored();
        if !constraint.terminate() {
            return false;
        }
        if stored {
            self.tracer.removed(constraint);
        }
        self.tracer.terminated(constraint);
        true
    }

    /// Report that `rule` fired on `heads`.
    pub fn fire(&self, rule: &str, heads: &[&dyn Constraint]) {
        self.tracer.rule_fired(rule, heads);
    }

    fn drive(&mut self, start: Option<ContinuationRef>, floor: usize) -> Result<()> {
        if self.runs == 0 {
            self.steps = 0;
        }
        self.runs += 1;
        let host = self.set_host_language_mode(false);
        debug!(floor, depth = self.runs, "run started");

        let result = self.trampoline(start, floor);

        if let Err(error) = &result {
            debug!(%error, steps = self.steps, "run failed");
            // Frames pushed by the failed run are abandoned.
            while self.stack.len() > floor {
                self.stack.pop();
            }
        } else {
            debug!(steps = self.steps, depth = self.runs, "run finished");
        }
        self.set_host_language_mode(host);
        self.runs -= 1;
        result
    }

    fn trampoline(&mut self, start: Option<ContinuationRef>, floor: usize) -> Result<()> {
        let mut next = start;
        loop {
            let current = match next.take() {
                Some(current) => current,
                None if self.stack.len() > floor => match self.stack.pop() {
                    Some(current) => current,
                    None => return Ok(()),
                },
                None => return Ok(()),
            };
            self.step()?;
            next = current.call(self)?;
        }
    }

    fn step(&mut self) -> Result<()> {
        self.steps += 1;
        trace!(step = self.steps, stacked = self.stack.len(), "step");
        match self.config.step_limit {
            Some(limit) if self.steps > limit => Err(RuntimeError::StepLimitExceeded { limit }),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("stacked", &self.stack.len())
            .field("queued", &self.queue.len())
            .field("host_language_mode", &self.host_language_mode)
            .field("queuing_requested", &self.queuing_requested)
            .field("config", &self.config)
            .finish()
    }
}
