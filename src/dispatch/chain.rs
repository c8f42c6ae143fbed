use std::cell::Cell;

use tracing::debug;

/// Outcome of a single [`DispatchChain::advance`] transition.
///
/// The chain performs no effects of its own; the caller maps each step onto
/// the matching action (invoke a before-handler, invoke the route, fire the
/// fallback, or do nothing at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStep {
    /// Invoke the before-handler at this index.
    Before(usize),
    /// The before-list is exhausted; invoke the terminal route.
    Route,
    /// The route already ran and the response is still open; fire the
    /// not-found fallback.
    Fallback,
    /// The response is closed; nothing further may run.
    Halted,
}

/// Per-request dispatch cursor.
///
/// Tracks how far the before-handler list has progressed and whether the
/// terminal route has been handed control. The closed flag is owned by the
/// response handle and passed in on every transition, so a close that
/// happened between two invocations is always observed before any state
/// moves.
///
/// The cursor starts at -1 and only ever moves forward. `route_invoked`
/// transitions false -> true exactly once, and only after the cursor has
/// walked off the end of the before-list.
#[derive(Debug)]
pub struct DispatchChain {
    cursor: Cell<isize>,
    route_invoked: Cell<bool>,
}

impl Default for DispatchChain {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchChain {
    pub fn new() -> Self {
        Self {
            cursor: Cell::new(-1),
            route_invoked: Cell::new(false),
        }
    }

    /// Advance the chain by one step.
    ///
    /// Re-entrant by design: handlers call this again from nested
    /// completions, not just from a loop. A closed response short-circuits
    /// before the cursor moves, so redundant calls after close never
    /// consume chain state.
    pub fn advance(&self, closed: bool, before_len: usize) -> DispatchStep {
        if closed {
            debug!(cursor = self.cursor.get(), "chain halted, response closed");
            return DispatchStep::Halted;
        }
        let cursor = self.cursor.get() + 1;
        self.cursor.set(cursor);
        let idx = cursor as usize;
        if idx < before_len {
            DispatchStep::Before(idx)
        } else if !self.route_invoked.get() {
            // flag flips before control is handed out so a re-entrant
            // advance from inside the route lands in the fallback arm
            self.route_invoked.set(true);
            DispatchStep::Route
        } else {
            DispatchStep::Fallback
        }
    }

    /// Current cursor position (-1 until the first advance).
    pub fn cursor(&self) -> isize {
        self.cursor.get()
    }

    /// Whether the terminal route has been handed control.
    pub fn route_invoked(&self) -> bool {
        self.route_invoked.get()
    }
}
