//! Single-slot mailbox for values fed into a suspended traversal.

use crate::errors::EnumError;
use crate::value::Value;

/// Holds at most one value staged by `Enumerator::feed`.
///
/// The generator takes the value when it next resumes the traversal, so the
/// block that produced the previous item returns it instead of `nil`.
#[derive(Debug, Default)]
pub struct FeedValue {
    pending: Option<Value>,
}

impl FeedValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `value`. Fails if a value is already pending.
    pub fn set(&mut self, value: Value) -> Result<(), EnumError> {
        if self.pending.is_some() {
            return Err(EnumError::DuplicateFeed);
        }
        self.pending = Some(value);
        Ok(())
    }

    /// Take the pending value, leaving the slot empty.
    pub fn use_value(&mut self) -> Option<Value> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}
