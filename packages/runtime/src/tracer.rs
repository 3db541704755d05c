//! Hooks for observing constraint lifecycle events.

use tracing::{debug, trace};

use crate::constraint::Constraint;

/// Receives lifecycle events from the runtime.
///
/// Every hook defaults to doing nothing, so implementors override only what
/// they care about.
pub trait Tracer {
    fn activated(&self, _constraint: &dyn Constraint) {}

    fn reactivated(&self, _constraint: &dyn Constraint) {}

    fn stored(&self, _constraint: &dyn Constraint) {}

    fn removed(&self, _constraint: &dyn Constraint) {}

    fn terminated(&self, _constraint: &dyn Constraint) {}

    fn rule_fired(&self, _rule: &str, _heads: &[&dyn Constraint]) {}
}

/// Tracer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Tracer that reports events through `tracing`.
///
/// Installing a subscriber is left to the application.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracer;

impl Tracer for TracingTracer {
    fn activated(&self, constraint: &dyn Constraint) {
        trace!(constraint.id = %constraint.id(), ?constraint, "activated");
    }

    fn reactivated(&self, constraint: &dyn Constraint) {
        trace!(constraint.id = %constraint.id(), ?constraint, "reactivated");
    }

    fn stored(&self, constraint: &dyn Constraint) {
        trace!(constraint.id = %constraint.id(), "stored");
    }

    fn removed(&self, constraint: &dyn Constraint) {
        trace!(constraint.id = %constraint.id(), "removed");
    }

    fn terminated(&self, constraint: &dyn Constraint) {
        trace!(constraint.id = %constraint.id(), "terminated");
    }

    fn rule_fired(&self, rule: &str, heads: &[&dyn Constraint]) {
        let ids: Vec<String> = heads.iter().map(|c| c.id().to_string()).collect();
        debug!(rule, heads = %ids.join(", "), "rule fired");
    }
}
