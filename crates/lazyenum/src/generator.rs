//! Pull-based generators behind an enumerator.
//!
//! `CoroutineGenerator` runs any traversal on a coroutine and suspends at each
//! item. Sources that can be walked by index hand out a fast generator
//! instead; both must be observably identical.

use std::rc::Rc;

use smallvec::smallvec;

use crate::coroutine::{Resumed, TraversalCoroutine};
use crate::errors::{EnumError, Signal};
use crate::feed::FeedValue;
use crate::source::Traversal;
use crate::value::{Value, Values};

/// A resumable producer of item tuples.
pub trait ValueGenerator {
    /// `false` once the traversal has finished.
    fn has_next(&self) -> bool;

    /// Produce the next item tuple.
    ///
    /// A value pending in `feed` becomes the block result for the previously
    /// produced item. Fails with `Exhausted` once the traversal is done.
    fn next_values(&mut self, feed: &mut FeedValue) -> Result<Values, EnumError>;

    /// Terminal value of the traversal; `nil` until it is done.
    fn result(&self) -> Value;

    /// Reset to the not-started state.
    fn rewind(&mut self);
}

// =============================================================================
// CoroutineGenerator
// =============================================================================

pub struct CoroutineGenerator {
    traversal: Traversal,
    stack_size: Option<usize>,
    coroutine: Option<TraversalCoroutine>,
    done: bool,
    result: Value,
    /// A failure raised by the traversal; re-raised until rewind.
    failure: Option<EnumError>,
}

impl CoroutineGenerator {
    pub fn new(traversal: Traversal, stack_size: Option<usize>) -> Self {
        Self {
            traversal,
            stack_size,
            coroutine: None,
            done: false,
            result: Value::Nil,
            failure: None,
        }
    }

    fn start(&self) -> Result<TraversalCoroutine, EnumError> {
        let traversal = self.traversal.clone();
        tracing::debug!(traversal = %traversal, "starting generator coroutine");
        TraversalCoroutine::new(self.stack_size, move |yielder| {
            traversal
                .run(&mut |values| Ok(yielder.suspend(values).unwrap_or_default()))
                .map_err(Signal::into_error)
        })
    }

    fn exhausted(&self) -> EnumError {
        self.failure.clone().unwrap_or_else(|| EnumError::Exhausted {
            result: self.result.clone(),
        })
    }
}

impl ValueGenerator for CoroutineGenerator {
    fn has_next(&self) -> bool {
        !self.done
    }

    fn next_values(&mut self, feed: &mut FeedValue) -> Result<Values, EnumError> {
        if self.done {
            return Err(self.exhausted());
        }
        // A value fed before the first item is kept for that item's block.
        let input = match self.coroutine {
            Some(_) => feed.use_value(),
            None => {
                self.coroutine = Some(self.start()?);
                None
            }
        };
        let coroutine = self
            .coroutine
            .as_mut()
            .ok_or(EnumError::Internal("generator coroutine missing"))?;
        match coroutine.resume(input) {
            Some(Resumed::Yielded(values)) => Ok(values),
            Some(Resumed::Returned(Ok(result))) => {
                tracing::debug!(%result, "generator traversal finished");
                self.done = true;
                self.result = result;
                Err(self.exhausted())
            }
            Some(Resumed::Returned(Err(e))) => {
                tracing::debug!(error = %e, "generator traversal failed");
                self.done = true;
                self.failure = Some(e.clone());
                Err(e)
            }
            None => Err(EnumError::Internal("resumed a finished coroutine")),
        }
    }

    fn result(&self) -> Value {
        self.result.clone()
    }

    fn rewind(&mut self) {
        if let Some(mut coroutine) = self.coroutine.take() {
            if !coroutine.is_finished() {
                tracing::debug!(traversal = %self.traversal, "cancelling suspended generator");
            }
            coroutine.cancel();
        }
        self.done = false;
        self.result = Value::Nil;
        self.failure = None;
    }
}

// =============================================================================
// Fast generators
// =============================================================================

/// Mirrors when a coroutine resume would take the fed value.
///
/// The call that starts a traversal passes no input and a finished traversal
/// is never resumed, so neither touches the feed.
#[derive(Clone, Copy, Debug, Default)]
struct Resumes {
    started: bool,
    finished: bool,
}

impl Resumes {
    fn resume(&mut self, feed: &mut FeedValue) {
        if self.started {
            // `each` ignores block results, so the value is taken and dropped.
            feed.use_value();
        }
        self.started = true;
    }
}

/// Index-based generator over a materialized array.
///
/// Its terminal value is the array itself, matching `ArraySource#each`.
pub struct ArrayGenerator {
    items: Rc<[Value]>,
    index: usize,
    resumes: Resumes,
}

impl ArrayGenerator {
    pub fn new(items: Rc<[Value]>) -> Self {
        Self {
            items,
            index: 0,
            resumes: Resumes::default(),
        }
    }
}

impl ValueGenerator for ArrayGenerator {
    fn has_next(&self) -> bool {
        !self.resumes.finished
    }

    fn next_values(&mut self, feed: &mut FeedValue) -> Result<Values, EnumError> {
        if !self.resumes.finished {
            self.resumes.resume(feed);
        }
        match self.items.get(self.index) {
            Some(item) => {
                self.index += 1;
                Ok(smallvec![item.clone()])
            }
            None => {
                self.resumes.finished = true;
                Err(EnumError::Exhausted {
                    result: self.result(),
                })
            }
        }
    }

    fn result(&self) -> Value {
        if self.resumes.finished {
            Value::Array(self.items.to_vec())
        } else {
            Value::Nil
        }
    }

    fn rewind(&mut self) {
        self.index = 0;
        self.resumes = Resumes::default();
    }
}

/// Counting generator over an integer range. Its terminal value is `nil`.
pub struct RangeGenerator {
    start: i64,
    last: Option<i64>,
    next: Option<i64>,
    resumes: Resumes,
}

impl RangeGenerator {
    pub fn new(start: i64, last: Option<i64>) -> Self {
        Self {
            start,
            last,
            next: last.map(|_| start),
            resumes: Resumes::default(),
        }
    }
}

impl ValueGenerator for RangeGenerator {
    fn has_next(&self) -> bool {
        !self.resumes.finished
    }

    fn next_values(&mut self, feed: &mut FeedValue) -> Result<Values, EnumError> {
        if !self.resumes.finished {
            self.resumes.resume(feed);
        }
        let Some(current) = self.next else {
            self.resumes.finished = true;
            return Err(EnumError::Exhausted { result: Value::Nil });
        };
        self.next = match self.last {
            Some(last) if current < last => Some(current + 1),
            _ => None,
        };
        Ok(smallvec![Value::Int(current)])
    }

    fn result(&self) -> Value {
        Value::Nil
    }

    fn rewind(&mut self) {
        self.next = self.last.map(|_| self.start);
        self.resumes = Resumes::default();
    }
}
