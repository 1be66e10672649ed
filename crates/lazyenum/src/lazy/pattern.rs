//! Case-equality patterns for `grep` and `grep_v`.

use std::fmt;
use std::ops::RangeInclusive;
use std::rc::Rc;

use regex::Regex;

use crate::errors::EnumError;
use crate::value::{Value, ValueKind};

/// A pattern tested against each packed item.
#[derive(Clone)]
pub enum Pattern {
    /// Structural equality.
    Eq(Value),
    /// Any value of the given kind.
    Kind(ValueKind),
    /// Strings containing a match.
    Regex(Regex),
    /// Integers inside the range.
    IntRange(RangeInclusive<i64>),
    Pred(Rc<dyn Fn(&Value) -> bool>),
}

impl Pattern {
    /// Compile a regex pattern; a malformed expression is an invalid argument.
    pub fn regex(src: &str) -> Result<Self, EnumError> {
        Regex::new(src)
            .map(Pattern::Regex)
            .map_err(|e| EnumError::invalid_argument(format!("malformed grep pattern: {e}")))
    }

    pub fn predicate(f: impl Fn(&Value) -> bool + 'static) -> Self {
        Pattern::Pred(Rc::new(f))
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Pattern::Eq(expected) => expected == value,
            Pattern::Kind(kind) => value.kind() == *kind,
            Pattern::Regex(re) => value.as_str().is_some_and(|s| re.is_match(s)),
            Pattern::IntRange(range) => value.as_int().is_some_and(|i| range.contains(&i)),
            Pattern::Pred(f) => f(value),
        }
    }
}

impl From<Value> for Pattern {
    fn from(value: Value) -> Self {
        Pattern::Eq(value)
    }
}

impl From<ValueKind> for Pattern {
    fn from(kind: ValueKind) -> Self {
        Pattern::Kind(kind)
    }
}

impl From<RangeInclusive<i64>> for Pattern {
    fn from(range: RangeInclusive<i64>) -> Self {
        Pattern::IntRange(range)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Eq(value) => write!(f, "{value}"),
            Pattern::Kind(kind) => write!(f, "{kind:?}"),
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
            Pattern::IntRange(range) => write!(f, "{}..{}", range.start(), range.end()),
            Pattern::Pred(_) => f.write_str("#<Proc>"),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({self})")
    }
}
