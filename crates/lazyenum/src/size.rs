//! Size hints for sources and lazy stages.

use std::fmt;

/// How many items a traversal will produce, as far as it is known up front.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SizeHint {
    Known(usize),
    Unbounded,
    Unknown,
}

impl SizeHint {
    pub fn known(self) -> Option<usize> {
        match self {
            SizeHint::Known(n) => Some(n),
            _ => None,
        }
    }

    /// Size after suppressing the first `n` items.
    pub fn saturating_drop(self, n: usize) -> Self {
        match self {
            SizeHint::Known(k) => SizeHint::Known(k.saturating_sub(n)),
            other => other,
        }
    }

    /// Size after keeping at most `n` items.
    pub fn take(self, n: usize) -> Self {
        match self {
            _ if n == 0 => SizeHint::Known(0),
            SizeHint::Known(k) => SizeHint::Known(k.min(n)),
            SizeHint::Unbounded => SizeHint::Known(n),
            SizeHint::Unknown => SizeHint::Unknown,
        }
    }

    /// Size of a concatenation.
    pub fn chain(self, other: Self) -> Self {
        match (self, other) {
            (SizeHint::Known(a), SizeHint::Known(b)) => a
                .checked_add(b)
                .map_or(SizeHint::Unbounded, SizeHint::Known),
            (SizeHint::Unknown, _) | (_, SizeHint::Unknown) => SizeHint::Unknown,
            _ => SizeHint::Unbounded,
        }
    }

    /// Size of a cartesian product of `hints`.
    ///
    /// Any empty factor makes the product empty. Otherwise an unknown factor
    /// makes it unknown and an unbounded factor makes it unbounded.
    pub fn product(hints: impl IntoIterator<Item = SizeHint>) -> Self {
        let hints: Vec<SizeHint> = hints.into_iter().collect();
        if hints.contains(&SizeHint::Known(0)) {
            return SizeHint::Known(0);
        }
        if hints.contains(&SizeHint::Unknown) {
            return SizeHint::Unknown;
        }
        if hints.contains(&SizeHint::Unbounded) {
            return SizeHint::Unbounded;
        }
        hints
            .iter()
            .filter_map(|h| h.known())
            .try_fold(1usize, |acc, n| acc.checked_mul(n))
            .map_or(SizeHint::Unbounded, SizeHint::Known)
    }
}

impl fmt::Display for SizeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeHint::Known(n) => write!(f, "{n}"),
            SizeHint::Unbounded => f.write_str("Infinity"),
            SizeHint::Unknown => f.write_str("nil"),
        }
    }
}
