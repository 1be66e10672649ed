//! The per-traversal conduit values are pushed through.

use crate::errors::{EnumError, Signal, TraversalId};
use crate::lazy::StageState;
use crate::source::Block;
use crate::value::{Value, Values};

/// Forwards values to the block of one traversal.
///
/// A yielder exists for exactly one consumption. Lazy pipelines keep their
/// per-stage memory (counters, flags, seen-sets) in its slots, indexed by
/// stage depth, so nothing leaks between two runs of the same pipeline.
pub struct Yielder<'a> {
    id: TraversalId,
    block: &'a mut Block<'a>,
    slots: Vec<StageState>,
}

impl<'a> Yielder<'a> {
    pub(crate) fn new(block: &'a mut Block<'a>) -> Self {
        Self::with_slots(block, Vec::new())
    }

    pub(crate) fn with_slots(block: &'a mut Block<'a>, slots: Vec<StageState>) -> Self {
        Self {
            id: TraversalId::fresh(),
            block,
            slots,
        }
    }

    /// Identity of the traversal this yielder serves.
    pub fn id(&self) -> TraversalId {
        self.id
    }

    /// Push one item tuple downstream and return what the block returned.
    pub fn yield_values(&mut self, values: Values) -> Result<Value, Signal> {
        (self.block)(values)
    }

    /// Push a single value downstream.
    pub fn yield_value(&mut self, value: impl Into<Value>) -> Result<Value, Signal> {
        self.yield_values(smallvec::smallvec![value.into()])
    }

    /// Stop the current traversal. Propagate the returned signal with `?`.
    pub fn stop(&self) -> Signal {
        Signal::Break(self.id)
    }

    pub(crate) fn slot_mut(&mut self, depth: usize) -> Result<&mut StageState, EnumError> {
        self.slots
            .get_mut(depth)
            .ok_or(EnumError::Internal("stage slot out of range"))
    }
}
