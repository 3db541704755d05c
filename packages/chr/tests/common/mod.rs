use std::cell::Cell;
use std::rc::Rc;

use chr::prelude::*;

/// Constraint that counts its reactivations.
#[derive(Debug)]
pub struct Watcher {
    state: ConstraintState,
    pub wakeups: Cell<usize>,
}

impl Watcher {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            state: ConstraintState::new(),
            wakeups: Cell::new(0),
        })
    }
}

impl Constraint for Watcher {
    fn state(&self) -> &ConstraintState {
        &self.state
    }

    fn reactivate(self: Rc<Self>, _cx: &mut ExecutionContext) -> Result<Option<ContinuationRef>> {
        self.wakeups.set(self.wakeups.get() + 1);
        Ok(None)
    }
}
