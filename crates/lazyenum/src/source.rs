//! Traversal sources.
//!
//! A source is anything that can run a push-style traversal: it calls a
//! block once per item and returns a terminal value. Sources optionally
//! support rewinding and may hand out a fast pull-based generator that
//! stands in for the coroutine fallback.

use std::fmt;
use std::ops::{Range, RangeInclusive};
use std::rc::Rc;

use smallvec::smallvec;

use crate::errors::{EnumError, Signal};
use crate::generator::{ArrayGenerator, RangeGenerator, ValueGenerator};
use crate::size::SizeHint;
use crate::value::{Value, Values};
use crate::yielder::Yielder;

/// The per-item callback of a traversal.
///
/// Its return value is handed back to the traversal (a `map` traversal
/// collects it). Returning `Err` aborts the traversal.
pub type Block<'a> = dyn FnMut(Values) -> Result<Value, Signal> + 'a;

/// A value offering one or more traversal entry points.
pub trait Traversable {
    /// Run the traversal named `method` with `args`, calling `block` per item.
    fn traverse(&self, method: &str, args: &[Value], block: &mut Block<'_>)
    -> Result<Value, Signal>;

    fn size(&self, _method: &str, _args: &[Value]) -> SizeHint {
        SizeHint::Unknown
    }

    fn as_rewindable(&self) -> Option<&dyn Rewindable> {
        None
    }

    /// A pull-based generator equivalent to running `method` in a coroutine.
    fn fast_generator(&self, _method: &str, _args: &[Value]) -> Option<Box<dyn ValueGenerator>> {
        None
    }

    /// Short inspect-like description used in enumerator descriptions.
    fn describe(&self) -> String;
}

/// A source whose position can be reset.
pub trait Rewindable {
    fn rewind(&self) -> Result<(), EnumError>;
}

// =============================================================================
// Traversal - a source bound to an entry point
// =============================================================================

/// A source together with the traversal method and arguments to run.
#[derive(Clone)]
pub struct Traversal {
    source: Rc<dyn Traversable>,
    method: Rc<str>,
    args: Rc<[Value]>,
}

impl Traversal {
    pub fn new(source: Rc<dyn Traversable>, method: &str, args: Vec<Value>) -> Self {
        Self {
            source,
            method: Rc::from(method),
            args: Rc::from(args),
        }
    }

    /// The default `each` traversal of `source`.
    pub fn each(source: Rc<dyn Traversable>) -> Self {
        Self::new(source, "each", Vec::new())
    }

    pub fn source(&self) -> &Rc<dyn Traversable> {
        &self.source
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn run(&self, block: &mut Block<'_>) -> Result<Value, Signal> {
        self.source.traverse(&self.method, &self.args, block)
    }

    pub fn size(&self) -> SizeHint {
        self.source.size(&self.method, &self.args)
    }

    pub fn fast_generator(&self) -> Option<Box<dyn ValueGenerator>> {
        self.source.fast_generator(&self.method, &self.args)
    }

    /// Rewind the source if it supports rewinding.
    pub fn rewind_source(&self) -> Result<bool, EnumError> {
        match self.source.as_rewindable() {
            Some(source) => source.rewind().map(|()| true),
            None => Ok(false),
        }
    }
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source.describe(), self.method)?;
        if !self.args.is_empty() {
            f.write_str("(")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Traversal({self})")
    }
}

/// Reject any entry point other than `each`.
pub(crate) fn expect_each(method: &str, receiver: impl FnOnce() -> String) -> Result<(), Signal> {
    if method == "each" {
        Ok(())
    } else {
        Err(EnumError::unknown_traversal(method, receiver()).into())
    }
}

// =============================================================================
// ArraySource
// =============================================================================

/// A materialized sequence of values.
///
/// Entry points: `each`, `each_with_index`, `reverse_each` and `map`. The
/// first three return the array itself; `map` returns the block results.
#[derive(Clone, Debug)]
pub struct ArraySource {
    items: Rc<[Value]>,
}

impl ArraySource {
    pub fn new(items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    fn as_value(&self) -> Value {
        Value::Array(self.items.to_vec())
    }
}

impl Traversable for ArraySource {
    fn traverse(
        &self,
        method: &str,
        _args: &[Value],
        block: &mut Block<'_>,
    ) -> Result<Value, Signal> {
        match method {
            "each" => {
                for item in self.items.iter() {
                    block(smallvec![item.clone()])?;
                }
                Ok(self.as_value())
            }
            "each_with_index" => {
                for (i, item) in self.items.iter().enumerate() {
                    block(smallvec![item.clone(), Value::Int(i as i64)])?;
                }
                Ok(self.as_value())
            }
            "reverse_each" => {
                for item in self.items.iter().rev() {
                    block(smallvec![item.clone()])?;
                }
                Ok(self.as_value())
            }
            "map" => {
                let mut out = Vec::with_capacity(self.items.len());
                for item in self.items.iter() {
                    out.push(block(smallvec![item.clone()])?);
                }
                Ok(Value::Array(out))
            }
            _ => Err(EnumError::unknown_traversal(method, self.describe()).into()),
        }
    }

    fn size(&self, _method: &str, _args: &[Value]) -> SizeHint {
        SizeHint::Known(self.items.len())
    }

    fn fast_generator(&self, method: &str, args: &[Value]) -> Option<Box<dyn ValueGenerator>> {
        (method == "each" && args.is_empty())
            .then(|| Box::new(ArrayGenerator::new(self.items.clone())) as Box<dyn ValueGenerator>)
    }

    fn describe(&self) -> String {
        self.as_value().to_string()
    }
}

// =============================================================================
// RangeSource
// =============================================================================

/// A bounded integer range.
///
/// Entry points: `each` and `step(n)` with `n > 0`. Both return `nil`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeSource {
    start: i64,
    end: i64,
    exclusive: bool,
}

impl RangeSource {
    pub fn new(start: i64, end: i64, exclusive: bool) -> Self {
        Self {
            start,
            end,
            exclusive,
        }
    }

    /// Last value produced, or `None` for an empty range.
    fn last(&self) -> Option<i64> {
        let last = if self.exclusive {
            self.end.checked_sub(1)?
        } else {
            self.end
        };
        (last >= self.start).then_some(last)
    }

    /// Number of values produced when stepping by `step`, or `None` when it
    /// does not fit in `usize`.
    fn count_by(&self, step: u64) -> Option<usize> {
        let Some(last) = self.last() else {
            return Some(0);
        };
        let span = u128::from(last.abs_diff(self.start)) + 1;
        usize::try_from(span.div_ceil(u128::from(step))).ok()
    }

    /// Number of values produced, saturating at `usize::MAX`.
    pub fn len(&self) -> usize {
        self.count_by(1).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.last().is_none()
    }

    fn step_arg(args: &[Value]) -> Result<u64, EnumError> {
        match args {
            [] => Ok(1),
            [Value::Int(n)] if *n > 0 => Ok(*n as u64),
            [Value::Int(_)] => Err(EnumError::invalid_argument("step can't be negative or zero")),
            _ => Err(EnumError::invalid_argument("step expects one integer")),
        }
    }

    fn walk(&self, step: u64, block: &mut Block<'_>) -> Result<Value, Signal> {
        let Some(last) = self.last() else {
            return Ok(Value::Nil);
        };
        let mut current = self.start;
        loop {
            block(smallvec![Value::Int(current)])?;
            match current.checked_add_unsigned(step) {
                Some(next) if next <= last => current = next,
                _ => return Ok(Value::Nil),
            }
        }
    }
}

impl From<Range<i64>> for RangeSource {
    fn from(range: Range<i64>) -> Self {
        Self::new(range.start, range.end, true)
    }
}

impl From<RangeInclusive<i64>> for RangeSource {
    fn from(range: RangeInclusive<i64>) -> Self {
        Self::new(*range.start(), *range.end(), false)
    }
}

impl Traversable for RangeSource {
    fn traverse(
        &self,
        method: &str,
        args: &[Value],
        block: &mut Block<'_>,
    ) -> Result<Value, Signal> {
        match method {
            "each" => self.walk(1, block),
            "step" => self.walk(Self::step_arg(args)?, block),
            _ => Err(EnumError::unknown_traversal(method, self.describe()).into()),
        }
    }

    fn size(&self, method: &str, args: &[Value]) -> SizeHint {
        match method {
            "each" => self.count_by(1).map_or(SizeHint::Unbounded, SizeHint::Known),
            "step" => match Self::step_arg(args) {
                Ok(step) => self.count_by(step).map_or(SizeHint::Unbounded, SizeHint::Known),
                Err(_) => SizeHint::Unknown,
            },
            _ => SizeHint::Unknown,
        }
    }

    fn fast_generator(&self, method: &str, args: &[Value]) -> Option<Box<dyn ValueGenerator>> {
        (method == "each" && args.is_empty()).then(|| {
            Box::new(RangeGenerator::new(self.start, self.last())) as Box<dyn ValueGenerator>
        })
    }

    fn describe(&self) -> String {
        let dots = if self.exclusive { "..." } else { ".." };
        format!("{}{dots}{}", self.start, self.end)
    }
}

// =============================================================================
// Counter
// =============================================================================

/// An unbounded arithmetic progression, `start, start + step, ...`.
///
/// The traversal only ends when the block stops it (or the next value would
/// overflow `i64`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Counter {
    start: i64,
    step: i64,
}

impl Counter {
    pub fn starting_at(start: i64) -> Self {
        Self { start, step: 1 }
    }

    pub fn with_step(start: i64, step: i64) -> Self {
        Self { start, step }
    }
}

impl Traversable for Counter {
    fn traverse(
        &self,
        method: &str,
        _args: &[Value],
        block: &mut Block<'_>,
    ) -> Result<Value, Signal> {
        expect_each(method, || self.describe())?;
        let mut current = self.start;
        loop {
            block(smallvec![Value::Int(current)])?;
            match current.checked_add(self.step) {
                Some(next) => current = next,
                None => return Ok(Value::Nil),
            }
        }
    }

    fn size(&self, _method: &str, _args: &[Value]) -> SizeHint {
        SizeHint::Unbounded
    }

    fn describe(&self) -> String {
        format!("({}.step({}))", self.start, self.step)
    }
}

// =============================================================================
// FnSource
// =============================================================================

type SourceFn = dyn Fn(&mut Yielder<'_>) -> Result<Value, Signal>;

/// A traversal written as a closure that pushes items through a [`Yielder`].
///
/// ```
/// use lazyenum::{FnSource, Traversable, Value};
///
/// let source = FnSource::new(|y| {
///     y.yield_value(1)?;
///     y.yield_value(2)?;
///     Ok(Value::str("end"))
/// });
/// let mut seen = Vec::new();
/// let result = source
///     .traverse("each", &[], &mut |v| {
///         seen.push(v[0].clone());
///         Ok(Value::Nil)
///     })
///     .unwrap();
/// assert_eq!(seen, vec![Value::Int(1), Value::Int(2)]);
/// assert_eq!(result, Value::str("end"));
/// ```
#[derive(Clone)]
pub struct FnSource {
    body: Rc<SourceFn>,
    size: SizeHint,
}

impl FnSource {
    pub fn new(body: impl Fn(&mut Yielder<'_>) -> Result<Value, Signal> + 'static) -> Self {
        Self {
            body: Rc::new(body),
            size: SizeHint::Unknown,
        }
    }

    pub fn with_size(mut self, size: SizeHint) -> Self {
        self.size = size;
        self
    }
}

impl Traversable for FnSource {
    fn traverse(
        &self,
        method: &str,
        _args: &[Value],
        block: &mut Block<'_>,
    ) -> Result<Value, Signal> {
        expect_each(method, || self.describe())?;
        let mut yielder = Yielder::new(block);
        let id = yielder.id();
        match (self.body)(&mut yielder) {
            Err(Signal::Break(target)) if target == id => Ok(Value::Nil),
            other => other,
        }
    }

    fn size(&self, _method: &str, _args: &[Value]) -> SizeHint {
        self.size
    }

    fn describe(&self) -> String {
        "#<Enumerator::Generator>".to_string()
    }
}

// =============================================================================
// Chain
// =============================================================================

/// Concatenation: runs each part to completion in order.
#[derive(Clone, Debug)]
pub struct Chain {
    parts: Vec<Traversal>,
}

impl Chain {
    pub fn new(parts: impl IntoIterator<Item = Traversal>) -> Self {
        Self {
            parts: parts.into_iter().collect(),
        }
    }
}

impl Traversable for Chain {
    fn traverse(
        &self,
        method: &str,
        _args: &[Value],
        block: &mut Block<'_>,
    ) -> Result<Value, Signal> {
        expect_each(method, || self.describe())?;
        for part in &self.parts {
            part.run(block)?;
        }
        Ok(Value::Nil)
    }

    fn size(&self, _method: &str, _args: &[Value]) -> SizeHint {
        self.parts
            .iter()
            .fold(SizeHint::Known(0), |acc, part| acc.chain(part.size()))
    }

    fn as_rewindable(&self) -> Option<&dyn Rewindable> {
        Some(self)
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.parts.iter().map(|p| format!("#<Enumerator: {p}>")).collect();
        format!("#<Enumerator::Chain: [{}]>", parts.join(", "))
    }
}

impl Rewindable for Chain {
    fn rewind(&self) -> Result<(), EnumError> {
        for part in self.parts.iter().rev() {
            part.rewind_source()?;
        }
        Ok(())
    }
}
