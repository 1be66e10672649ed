//! External iteration over any traversal.
//!
//! An `Enumerator` turns a push-style traversal into a pull-style iterator
//! with one item of lookahead (`peek`), `rewind`, and value feedback (`feed`).

use std::collections::VecDeque;
use std::fmt;
use std::ops::Add;
use std::rc::Rc;

use crate::config::{GeneratorBackend, GeneratorConfig};
use crate::errors::{EnumError, Signal};
use crate::feed::FeedValue;
use crate::generator::{CoroutineGenerator, ValueGenerator};
use crate::lazy::Lazy;
use crate::product::Product;
use crate::size::SizeHint;
use crate::source::{
    ArraySource, Block, Chain, Counter, FnSource, RangeSource, Traversable, Traversal,
    expect_each,
};
use crate::value::{Value, Values};
use crate::yielder::Yielder;

pub struct Enumerator {
    traversal: Traversal,
    config: GeneratorConfig,
    feed: FeedValue,
    generator: Option<Box<dyn ValueGenerator>>,
    /// At most one item fetched ahead by `peek`.
    lookahead: Option<Values>,
    size: Option<SizeHint>,
    frozen: bool,
}

fn build_generator(traversal: &Traversal, config: &GeneratorConfig) -> Box<dyn ValueGenerator> {
    if config.effective_backend() == GeneratorBackend::Auto
        && let Some(generator) = traversal.fast_generator()
    {
        tracing::trace!(traversal = %traversal, "using source fast generator");
        return generator;
    }
    Box::new(CoroutineGenerator::new(traversal.clone(), config.stack_size))
}

impl Enumerator {
    /// Enumerate `source` through its `method` traversal.
    pub fn new(source: Rc<dyn Traversable>, method: &str, args: Vec<Value>) -> Self {
        Self::from_traversal(Traversal::new(source, method, args))
    }

    /// Starts from [`GeneratorConfig::process_default`], so the
    /// `LAZYENUM_*` variables apply unless [`Enumerator::with_config`]
    /// replaces them.
    pub fn from_traversal(traversal: Traversal) -> Self {
        Self {
            traversal,
            config: GeneratorConfig::process_default(),
            feed: FeedValue::new(),
            generator: None,
            lookahead: None,
            size: None,
            frozen: false,
        }
    }

    /// Enumerate a materialized sequence.
    pub fn from_values(items: impl IntoIterator<Item = Value>) -> Self {
        Self::new(Rc::new(ArraySource::new(items)), "each", Vec::new())
    }

    /// Enumerate the values pushed by `body` through its yielder.
    pub fn from_fn(body: impl Fn(&mut Yielder<'_>) -> Result<Value, Signal> + 'static) -> Self {
        Self::new(Rc::new(FnSource::new(body)), "each", Vec::new())
    }

    pub fn range(range: impl Into<RangeSource>) -> Self {
        Self::new(Rc::new(range.into()), "each", Vec::new())
    }

    /// Enumerate `start, start + 1, ...` without end.
    pub fn counter(start: i64) -> Self {
        Self::new(Rc::new(Counter::starting_at(start)), "each", Vec::new())
    }

    /// Cartesian product of the given enumerators' traversals.
    pub fn product(factors: &[&Enumerator]) -> Self {
        let product = Product::new(factors.iter().map(|e| e.traversal.clone()));
        Self::new(Rc::new(product), "each", Vec::new())
    }

    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the size reported by [`Enumerator::size`].
    pub fn with_size(mut self, size: SizeHint) -> Self {
        self.size = Some(size);
        self
    }

    pub fn config(&self) -> GeneratorConfig {
        self.config
    }

    pub fn traversal(&self) -> &Traversal {
        &self.traversal
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn check_frozen(&self) -> Result<(), EnumError> {
        if self.frozen {
            return Err(EnumError::Frozen);
        }
        Ok(())
    }

    // =========================================================================
    // External iteration
    // =========================================================================

    /// Next item tuple, consuming the lookahead first.
    ///
    /// Fails with `Exhausted` carrying the traversal's terminal value once
    /// every item has been produced.
    pub fn next_values(&mut self) -> Result<Values, EnumError> {
        self.check_frozen()?;
        if let Some(values) = self.lookahead.take() {
            return Ok(values);
        }
        if self.generator.is_none() {
            self.generator = Some(build_generator(&self.traversal, &self.config));
        }
        let generator = self
            .generator
            .as_mut()
            .ok_or(EnumError::Internal("enumerator generator missing"))?;
        match generator.next_values(&mut self.feed) {
            Err(EnumError::Exhausted { .. }) => Err(EnumError::Exhausted {
                result: generator.result(),
            }),
            other => other,
        }
    }

    /// Next item, with single-value tuples unwrapped.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Value, EnumError> {
        self.next_values().map(Value::pack)
    }

    /// The item `next_values` would return, without advancing.
    pub fn peek_values(&mut self) -> Result<Values, EnumError> {
        self.check_frozen()?;
        if let Some(values) = &self.lookahead {
            return Ok(values.clone());
        }
        let values = self.next_values()?;
        self.lookahead = Some(values.clone());
        Ok(values)
    }

    pub fn peek(&mut self) -> Result<Value, EnumError> {
        self.peek_values().map(Value::pack)
    }

    /// Reset to the first item.
    ///
    /// Rewinds the source when it supports rewinding, abandons any suspended
    /// traversal, and clears the lookahead and a pending feed value.
    pub fn rewind(&mut self) -> Result<(), EnumError> {
        self.check_frozen()?;
        self.traversal.rewind_source()?;
        if let Some(generator) = self.generator.as_mut() {
            generator.rewind();
        }
        self.lookahead = None;
        self.feed.clear();
        tracing::trace!(traversal = %self.traversal, "enumerator rewound");
        Ok(())
    }

    /// Stage `value` as the block result of the item most recently produced.
    pub fn feed(&mut self, value: Value) -> Result<(), EnumError> {
        self.check_frozen()?;
        self.feed.set(value)?;
        tracing::trace!("feed value staged");
        Ok(())
    }

    // =========================================================================
    // Internal iteration
    // =========================================================================

    pub fn size(&self) -> SizeHint {
        self.size.unwrap_or_else(|| self.traversal.size())
    }

    /// Run the traversal with `block`, independent of the external position.
    pub fn each(&self, block: &mut Block<'_>) -> Result<Value, EnumError> {
        self.traversal.run(block).map_err(Signal::into_error)
    }

    /// Run the traversal, passing each item and its index starting at `offset`.
    ///
    /// The block's result is handed back to the traversal.
    pub fn with_index(
        &self,
        offset: i64,
        mut f: impl FnMut(Value, i64) -> Result<Value, EnumError>,
    ) -> Result<Value, EnumError> {
        let mut index = offset;
        self.each(&mut |values| {
            let out = f(Value::pack(values), index)?;
            index += 1;
            Ok(out)
        })
    }

    pub fn each_with_index(
        &self,
        f: impl FnMut(Value, i64) -> Result<Value, EnumError>,
    ) -> Result<Value, EnumError> {
        self.with_index(0, f)
    }

    /// Run the traversal threading `memo` through every item; returns `memo`.
    pub fn each_with_object(
        &self,
        mut memo: Value,
        mut f: impl FnMut(Value, &mut Value) -> Result<(), EnumError>,
    ) -> Result<Value, EnumError> {
        self.each(&mut |values| {
            f(Value::pack(values), &mut memo)?;
            Ok(Value::Nil)
        })?;
        Ok(memo)
    }

    /// Alias of [`Enumerator::each_with_object`].
    pub fn with_object(
        &self,
        memo: Value,
        f: impl FnMut(Value, &mut Value) -> Result<(), EnumError>,
    ) -> Result<Value, EnumError> {
        self.each_with_object(memo, f)
    }

    /// Pass consecutive groups of `n` items; the last group may be shorter.
    pub fn each_slice(
        &self,
        n: i64,
        mut f: impl FnMut(Vec<Value>) -> Result<(), EnumError>,
    ) -> Result<(), EnumError> {
        let n = positive_width(n, "slice")?;
        let mut slice = Vec::with_capacity(n);
        self.each(&mut |values| {
            slice.push(Value::pack(values));
            if slice.len() == n {
                f(std::mem::replace(&mut slice, Vec::with_capacity(n)))?;
            }
            Ok(Value::Nil)
        })?;
        if !slice.is_empty() {
            f(slice)?;
        }
        Ok(())
    }

    /// Pass every window of `n` consecutive items.
    pub fn each_cons(
        &self,
        n: i64,
        mut f: impl FnMut(Vec<Value>) -> Result<(), EnumError>,
    ) -> Result<(), EnumError> {
        let n = positive_width(n, "cons")?;
        let mut window = VecDeque::with_capacity(n);
        self.each(&mut |values| {
            if window.len() == n {
                window.pop_front();
            }
            window.push_back(Value::pack(values));
            if window.len() == n {
                f(window.iter().cloned().collect())?;
            }
            Ok(Value::Nil)
        })?;
        Ok(())
    }

    /// A lazy pipeline over this enumerator's traversal.
    pub fn lazy(&self) -> Lazy {
        Lazy::new(self.traversal.clone())
    }

    /// Concatenate with `other`: all of `self`, then all of `other`.
    pub fn chain(&self, other: &Enumerator) -> Enumerator {
        let chain = Chain::new([self.traversal.clone(), other.traversal.clone()]);
        Enumerator::new(Rc::new(chain), "each", Vec::new())
    }
}

fn positive_width(n: i64, what: &str) -> Result<usize, EnumError> {
    usize::try_from(n)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| EnumError::invalid_argument(format!("invalid {what} size: {n}")))
}

impl Add for &Enumerator {
    type Output = Enumerator;

    fn add(self, other: &Enumerator) -> Enumerator {
        self.chain(other)
    }
}

impl Add for Enumerator {
    type Output = Enumerator;

    fn add(self, other: Enumerator) -> Enumerator {
        self.chain(&other)
    }
}

impl Traversable for Enumerator {
    fn traverse(
        &self,
        method: &str,
        _args: &[Value],
        block: &mut Block<'_>,
    ) -> Result<Value, Signal> {
        expect_each(method, || self.to_string())?;
        self.traversal.run(block)
    }

    fn size(&self, _method: &str, _args: &[Value]) -> SizeHint {
        Enumerator::size(self)
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Enumerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<Enumerator: {}>", self.traversal)
    }
}

impl fmt::Debug for Enumerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enumerator")
            .field("traversal", &self.traversal)
            .field("lookahead", &self.lookahead)
            .field("frozen", &self.frozen)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;
    use crate::config::with_backend;

    fn ints(items: &[i64]) -> Enumerator {
        Enumerator::from_values(items.iter().copied().map(Value::Int))
    }

    #[test]
    fn next_peek_next_sequence() {
        let mut e = ints(&[10, 20, 30]);
        assert_eq!(e.next(), Ok(Value::Int(10)));
        assert_eq!(e.peek(), Ok(Value::Int(20)));
        assert_eq!(e.peek(), Ok(Value::Int(20)));
        assert_eq!(e.next(), Ok(Value::Int(20)));
        assert_eq!(e.next(), Ok(Value::Int(30)));
        assert_eq!(
            e.next(),
            Err(EnumError::Exhausted {
                result: Value::from(vec![10, 20, 30])
            })
        );
        assert!(e.peek().is_err());
    }

    #[test]
    fn multi_value_tuples_pack_into_arrays() {
        let source = Rc::new(ArraySource::new([Value::str("a"), Value::str("b")]));
        let mut e = Enumerator::new(source, "each_with_index", Vec::new());
        assert_eq!(
            e.next_values(),
            Ok(smallvec![Value::str("a"), Value::Int(0)])
        );
        assert_eq!(e.next(), Ok(Value::from(vec![Value::str("b"), Value::Int(1)])));
    }

    #[test]
    fn rewind_after_exhaustion_restarts() {
        for backend in [GeneratorBackend::Auto, GeneratorBackend::Coroutine] {
            with_backend(backend, || {
                let mut e = ints(&[1, 2]);
                while e.next().is_ok() {}
                e.rewind().expect("rewind should succeed");
                assert_eq!(e.next(), Ok(Value::Int(1)), "backend {}", backend.name());
            });
        }
    }

    #[test]
    fn rewind_clears_lookahead_and_feed() {
        let mut e = ints(&[1, 2, 3]);
        e.next().expect("first");
        e.peek().expect("peek");
        e.feed(Value::Int(7)).expect("feed");
        e.rewind().expect("rewind");
        assert_eq!(e.next(), Ok(Value::Int(1)));
        e.feed(Value::Int(8)).expect("feed after rewind should be accepted");
    }

    #[test]
    fn frozen_enumerator_rejects_mutation() {
        let mut e = ints(&[1]);
        e.freeze();
        assert!(e.is_frozen());
        assert_eq!(e.next(), Err(EnumError::Frozen));
        assert_eq!(e.peek(), Err(EnumError::Frozen));
        assert_eq!(e.rewind(), Err(EnumError::Frozen));
        assert_eq!(e.feed(Value::Nil), Err(EnumError::Frozen));
        // Internal iteration does not touch external state.
        assert_eq!(e.each(&mut |_| Ok(Value::Nil)), Ok(Value::from(vec![1])));
    }

    #[test]
    fn with_index_and_each_with_object() {
        let e = ints(&[5, 6]);
        let mut pairs = Vec::new();
        e.with_index(1, |v, i| {
            pairs.push((v, i));
            Ok(Value::Nil)
        })
        .expect("with_index should succeed");
        assert_eq!(pairs, vec![(Value::Int(5), 1), (Value::Int(6), 2)]);

        let sum = e
            .each_with_object(Value::Int(0), |v, memo| {
                *memo = Value::Int(memo.as_int().unwrap_or(0) + v.as_int().unwrap_or(0));
                Ok(())
            })
            .expect("each_with_object should succeed");
        assert_eq!(sum, Value::Int(11));

        let seen = e
            .with_object(Value::Array(Vec::new()), |v, memo| {
                if let Value::Array(items) = memo {
                    items.push(v);
                }
                Ok(())
            })
            .expect("with_object should succeed");
        assert_eq!(seen, Value::from(vec![5, 6]));
    }

    #[test]
    fn new_enumerators_start_from_the_process_config() {
        assert_eq!(ints(&[1]).config(), GeneratorConfig::process_default());
        let pinned = GeneratorConfig::default().with_backend(GeneratorBackend::Coroutine);
        assert_eq!(ints(&[1]).with_config(pinned).config(), pinned);
    }

    #[test]
    fn map_traversal_collects_with_index_results() {
        let e = Enumerator::new(
            Rc::new(ArraySource::new([Value::str("a"), Value::str("b")])),
            "map",
            Vec::new(),
        );
        let out = e
            .each_with_index(|v, i| Ok(Value::from(vec![v, Value::Int(i)])))
            .expect("map with index should succeed");
        assert_eq!(
            out,
            Value::from(vec![
                Value::from(vec![Value::str("a"), Value::Int(0)]),
                Value::from(vec![Value::str("b"), Value::Int(1)]),
            ])
        );
    }

    #[test]
    fn slices_and_windows() {
        let e = ints(&[1, 2, 3, 4, 5]);
        let mut slices = Vec::new();
        e.each_slice(2, |s| {
            slices.push(s);
            Ok(())
        })
        .expect("each_slice should succeed");
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[2], vec![Value::Int(5)]);

        let mut windows = Vec::new();
        e.each_cons(4, |w| {
            windows.push(w);
            Ok(())
        })
        .expect("each_cons should succeed");
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1][0], Value::Int(2));

        assert!(matches!(
            e.each_slice(0, |_| Ok(())),
            Err(EnumError::InvalidArgument(_))
        ));
        assert!(matches!(
            e.each_cons(-1, |_| Ok(())),
            Err(EnumError::InvalidArgument(_))
        ));
    }

    #[test]
    fn concatenation_consumes_self_then_other() {
        let a = ints(&[1, 2]);
        let b = Enumerator::range(3_i64..=4);
        let mut both = &a + &b;
        assert_eq!(both.size(), SizeHint::Known(4));
        let mut seen = Vec::new();
        while let Ok(v) = both.next() {
            seen.push(v);
        }
        assert_eq!(seen, vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]);
    }

    #[test]
    fn display_names_source_and_method() {
        let e = Enumerator::new(Rc::new(RangeSource::from(1_i64..=3)), "step", vec![Value::Int(2)]);
        assert_eq!(e.to_string(), "#<Enumerator: 1..3:step(2)>");
        assert_eq!(ints(&[1]).to_string(), "#<Enumerator: [1]:each>");
    }

    #[test]
    fn enumerator_is_itself_a_source() {
        let inner = ints(&[1, 2]);
        let mut outer = Enumerator::new(Rc::new(inner), "each", Vec::new());
        assert_eq!(outer.next(), Ok(Value::Int(1)));
        assert_eq!(outer.size(), SizeHint::Known(2));
        let err = Enumerator::new(Rc::new(ints(&[1])), "map", Vec::new())
            .next()
            .expect_err("only each is supported");
        assert!(matches!(err, EnumError::UnknownTraversal { .. }));
    }

    #[test]
    fn size_prefers_explicit_override() {
        assert_eq!(Enumerator::counter(0).size(), SizeHint::Unbounded);
        assert_eq!(
            Enumerator::counter(0).with_size(SizeHint::Known(2)).size(),
            SizeHint::Known(2)
        );
        assert_eq!(Enumerator::from_fn(|_| Ok(Value::Nil)).size(), SizeHint::Unknown);
    }
}
