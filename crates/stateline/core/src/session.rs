//! Session state: the single authoritative working-data value and the
//! monotonic step counter.
//!
//! Everything outside this module sees clones. The funnel and the
//! rollback path replace the value wholesale; nothing mutates it in
//! place.

pub(crate) struct SessionState<S> {
    data: S,
    step: u64,
}

impl<S> SessionState<S> {
    pub(crate) fn new(data: S) -> Self {
        Self { data, step: 0 }
    }

    /// The authoritative value. Callers clone; a live reference never
    /// escapes the crate.
    pub(crate) fn data(&self) -> &S {
        &self.data
    }

    /// Step of the most recent checkpoint; 0 before any.
    pub(crate) fn step(&self) -> u64 {
        self.step
    }

    /// Replace the working data with the return value of a completed
    /// registered function or a restored version.
    pub(crate) fn replace(&mut self, next: S) {
        self.data = next;
    }

    /// Advance the checkpoint counter to `step`. The counter moves by
    /// exactly one, and only after the matching version was appended.
    pub(crate) fn advance_to(&mut self, step: u64) {
        debug_assert_eq!(step, self.step + 1);
        self.step = step;
    }
}
