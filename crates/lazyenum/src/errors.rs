//! Enumerator errors and the traversal control signal.

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::value::Value;

/// Errors surfaced by enumerators, generators and lazy pipelines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnumError {
    /// No further items. Carries the terminal value the traversal returned.
    #[error("iteration reached an end")]
    Exhausted { result: Value },

    #[error("feed value already set")]
    DuplicateFeed,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("can't modify frozen enumerator")]
    Frozen,

    #[error("undefined traversal '{method}' for {receiver}")]
    UnknownTraversal { method: String, receiver: String },

    #[error("failed to allocate coroutine stack: {0}")]
    StackAllocation(String),

    /// A failure raised by user code (a block, predicate or traversal body).
    #[error("{0}")]
    Block(String),

    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
}

impl EnumError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        EnumError::InvalidArgument(msg.into())
    }

    pub fn block(msg: impl Into<String>) -> Self {
        EnumError::Block(msg.into())
    }

    pub fn unknown_traversal(method: &str, receiver: impl Into<String>) -> Self {
        EnumError::UnknownTraversal {
            method: method.to_string(),
            receiver: receiver.into(),
        }
    }

    /// The terminal value carried by an `Exhausted` error.
    pub fn exhausted_result(&self) -> Option<&Value> {
        match self {
            EnumError::Exhausted { result } => Some(result),
            _ => None,
        }
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, EnumError::Exhausted { .. })
    }
}

/// Identity of one top-level lazy consumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TraversalId(u64);

static NEXT_TRAVERSAL: AtomicU64 = AtomicU64::new(1);

impl TraversalId {
    /// Allocate a process-unique id.
    pub(crate) fn fresh() -> Self {
        Self(NEXT_TRAVERSAL.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// Why a traversal stopped before completing.
///
/// Blocks and traversals return `Result<_, Signal>` and propagate it with `?`.
/// `Break` unwinds to the consumption that owns the id and no further.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Break(TraversalId),
    Error(EnumError),
}

impl Signal {
    /// Collapse a signal at a top-level boundary.
    ///
    /// A `Break` reaching this point was not caught by its own consumption.
    pub fn into_error(self) -> EnumError {
        match self {
            Signal::Error(e) => e,
            Signal::Break(_) => EnumError::Internal("break escaped its traversal"),
        }
    }
}

impl From<EnumError> for Signal {
    fn from(e: EnumError) -> Self {
        Signal::Error(e)
    }
}
