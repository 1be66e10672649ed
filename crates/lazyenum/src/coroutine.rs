//! Coroutine primitive via corosensei.
//!
//! `TraversalCoroutine` runs a push-style traversal on its own stack and
//! suspends once per produced item. Resume input is the value fed back into
//! the traversal, the yield is the item tuple, and the return is the
//! traversal's terminal result.

use corosensei::{Coroutine as RawCoroutine, CoroutineResult, Yielder};

use crate::errors::EnumError;
use crate::value::{Value, Values};

/// The yielder handed to a traversal body running inside a coroutine.
pub type TraversalYielder = Yielder<Option<Value>, Values>;

type RawTraversal = RawCoroutine<Option<Value>, Values, Result<Value, EnumError>>;

/// Outcome of one resume.
#[derive(Debug, PartialEq)]
pub enum Resumed {
    /// The traversal suspended while producing an item.
    Yielded(Values),
    /// The traversal ran to completion (or failed).
    Returned(Result<Value, EnumError>),
}

pub struct TraversalCoroutine {
    inner: RawTraversal,
    finished: bool,
}

impl TraversalCoroutine {
    /// Create a coroutine from a traversal body.
    ///
    /// The body receives the yielder; the first resume input is discarded.
    pub fn new(
        stack_size: Option<usize>,
        body: impl FnOnce(&TraversalYielder) -> Result<Value, EnumError> + 'static,
    ) -> Result<Self, EnumError> {
        let inner = match stack_size {
            Some(size) => {
                let stack = corosensei::stack::DefaultStack::new(size)
                    .map_err(|e| EnumError::StackAllocation(e.to_string()))?;
                RawCoroutine::with_stack(stack, move |yielder, _first| body(yielder))
            }
            None => RawCoroutine::new(move |yielder, _first| body(yielder)),
        };
        Ok(Self {
            inner,
            finished: false,
        })
    }

    /// Resume with `input`.
    ///
    /// Returns `None` once the coroutine has finished; a finished coroutine
    /// is never resumed again.
    pub fn resume(&mut self, input: Option<Value>) -> Option<Resumed> {
        if self.finished {
            return None;
        }
        match self.inner.resume(input) {
            CoroutineResult::Yield(values) => Some(Resumed::Yielded(values)),
            CoroutineResult::Return(result) => {
                self.finished = true;
                Some(Resumed::Returned(result))
            }
        }
    }

    pub fn is_started(&self) -> bool {
        self.inner.started()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Abandon a suspended traversal.
    ///
    /// The coroutine stack is unwound so destructors of the abandoned
    /// traversal run, and the coroutine can no longer be resumed.
    pub fn cancel(&mut self) {
        if self.finished {
            return;
        }
        if self.inner.started() && !self.inner.done() {
            tracing::trace!("force-unwinding suspended traversal");
            self.inner.force_unwind();
        }
        self.finished = true;
    }
}

impl Drop for TraversalCoroutine {
    fn drop(&mut self) {
        self.cancel();
    }
}
