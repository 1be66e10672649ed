//! Lazy enumerator pipelines.
//!
//! A `Lazy` is an immutable chain of stages over a root traversal. Building a
//! stage never runs anything; consuming the pipeline (`force`, `each`,
//! `first`) runs the root traversal once and streams every item through the
//! stages without intermediate collections.

mod pattern;
mod stage;

use std::fmt;
use std::rc::Rc;

pub use pattern::Pattern;
pub(crate) use stage::StageState;
use stage::{Mapper, Stage, ZipOperand, push};

use crate::enumerator::Enumerator;
use crate::errors::{EnumError, Signal};
use crate::size::SizeHint;
use crate::source::{ArraySource, Block, Traversable, Traversal, expect_each};
use crate::value::{Value, Values};
use crate::yielder::Yielder;

enum Upstream {
    Root(Traversal),
    Stage { parent: Lazy, stage: Stage },
}

struct LazyNode {
    upstream: Upstream,
}

/// A lazy pipeline. Cloning shares the pipeline.
#[derive(Clone)]
pub struct Lazy {
    node: Rc<LazyNode>,
}

impl Lazy {
    /// A pipeline with no stages over `traversal`.
    pub fn new(traversal: Traversal) -> Self {
        Self {
            node: Rc::new(LazyNode {
                upstream: Upstream::Root(traversal),
            }),
        }
    }

    pub fn from_values(items: impl IntoIterator<Item = Value>) -> Self {
        Self::new(Traversal::each(Rc::new(ArraySource::new(items))))
    }

    fn with_stage(&self, stage: Stage) -> Self {
        Self {
            node: Rc::new(LazyNode {
                upstream: Upstream::Stage {
                    parent: self.clone(),
                    stage,
                },
            }),
        }
    }

    pub fn ptr_eq(&self, other: &Lazy) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    /// Address-based identity, stable while the pipeline is alive.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.node) as usize
    }

    /// Root traversal and stages in upstream-to-downstream order.
    fn pipeline(&self) -> (Traversal, Vec<Stage>) {
        let mut stages = Vec::new();
        let mut lazy = self;
        loop {
            match &lazy.node.upstream {
                Upstream::Root(traversal) => {
                    stages.reverse();
                    return (traversal.clone(), stages);
                }
                Upstream::Stage { parent, stage } => {
                    stages.push(stage.clone());
                    lazy = parent;
                }
            }
        }
    }

    /// Run the pipeline once, calling `block` per item leaving the last stage.
    ///
    /// The run owns a fresh yielder; an early exit raised by one of its own
    /// stages ends the run normally, while foreign breaks propagate.
    pub(crate) fn run(&self, block: &mut Block<'_>) -> Result<Value, Signal> {
        let (root, stages) = self.pipeline();
        if stages.iter().any(Stage::is_empty_take) {
            return Ok(Value::Nil);
        }
        let slots = stages.iter().map(Stage::initial_state).collect();
        let mut yielder = Yielder::with_slots(block, slots);
        let id = yielder.id();
        let outcome = root.run(&mut |values| push(&stages, 0, &mut yielder, values));
        match outcome {
            Err(Signal::Break(target)) if target == id => {
                tracing::trace!(traversal = id.as_raw(), "lazy pipeline stopped early");
                Ok(Value::Nil)
            }
            other => other,
        }
    }

    // =========================================================================
    // Stage builders
    // =========================================================================

    /// Forward `f(item)`.
    pub fn map(&self, f: impl Fn(&Value) -> Result<Value, EnumError> + 'static) -> Lazy {
        self.with_stage(Stage::Map(Rc::new(f)))
    }

    pub fn collect(&self, f: impl Fn(&Value) -> Result<Value, EnumError> + 'static) -> Lazy {
        self.map(f)
    }

    /// Forward items the predicate accepts.
    pub fn select(&self, pred: impl Fn(&Value) -> Result<bool, EnumError> + 'static) -> Lazy {
        self.with_stage(Stage::Select(Rc::new(pred)))
    }

    pub fn filter(&self, pred: impl Fn(&Value) -> Result<bool, EnumError> + 'static) -> Lazy {
        self.select(pred)
    }

    pub fn find_all(&self, pred: impl Fn(&Value) -> Result<bool, EnumError> + 'static) -> Lazy {
        self.select(pred)
    }

    pub fn reject(&self, pred: impl Fn(&Value) -> Result<bool, EnumError> + 'static) -> Lazy {
        self.with_stage(Stage::Reject(Rc::new(pred)))
    }

    /// Forward `f(item)` when it is truthy.
    pub fn filter_map(&self, f: impl Fn(&Value) -> Result<Value, EnumError> + 'static) -> Lazy {
        self.with_stage(Stage::FilterMap(Rc::new(f)))
    }

    /// Forward items matching `pattern`.
    pub fn grep(&self, pattern: impl Into<Pattern>) -> Lazy {
        self.grep_stage(pattern.into(), false, None)
    }

    /// Forward `f(item)` for items matching `pattern`.
    pub fn grep_map(
        &self,
        pattern: impl Into<Pattern>,
        f: impl Fn(&Value) -> Result<Value, EnumError> + 'static,
    ) -> Lazy {
        self.grep_stage(pattern.into(), false, Some(Rc::new(f)))
    }

    /// Forward items not matching `pattern`.
    pub fn grep_v(&self, pattern: impl Into<Pattern>) -> Lazy {
        self.grep_stage(pattern.into(), true, None)
    }

    pub fn grep_v_map(
        &self,
        pattern: impl Into<Pattern>,
        f: impl Fn(&Value) -> Result<Value, EnumError> + 'static,
    ) -> Lazy {
        self.grep_stage(pattern.into(), true, Some(Rc::new(f)))
    }

    fn grep_stage(&self, pattern: Pattern, invert: bool, map: Option<Mapper>) -> Lazy {
        self.with_stage(Stage::Grep {
            pattern,
            invert,
            map,
        })
    }

    /// Drop `nil` items.
    pub fn compact(&self) -> Lazy {
        self.with_stage(Stage::Compact)
    }

    /// Suppress the first `n` items.
    pub fn drop(&self, n: i64) -> Result<Lazy, EnumError> {
        let n = non_negative(n, "drop")?;
        Ok(self.with_stage(Stage::Drop(n)))
    }

    /// Suppress items until the predicate first fails.
    pub fn drop_while(&self, pred: impl Fn(&Value) -> Result<bool, EnumError> + 'static) -> Lazy {
        self.with_stage(Stage::DropWhile(Rc::new(pred)))
    }

    /// Keep at most `n` items, stopping the upstream after the `n`th.
    pub fn take(&self, n: i64) -> Result<Lazy, EnumError> {
        let n = non_negative(n, "take")?;
        Ok(self.with_stage(Stage::Take(n)))
    }

    /// Forward items until the predicate first fails, then stop the upstream.
    pub fn take_while(&self, pred: impl Fn(&Value) -> Result<bool, EnumError> + 'static) -> Lazy {
        self.with_stage(Stage::TakeWhile(Rc::new(pred)))
    }

    /// Forward the elements of `f(item)` when it is an array or a lazy
    /// pipeline, else `f(item)` itself.
    pub fn flat_map(&self, f: impl Fn(&Value) -> Result<Value, EnumError> + 'static) -> Lazy {
        self.with_stage(Stage::FlatMap(Rc::new(f)))
    }

    pub fn collect_concat(
        &self,
        f: impl Fn(&Value) -> Result<Value, EnumError> + 'static,
    ) -> Lazy {
        self.flat_map(f)
    }

    /// Pair each item with the element at the same position of every other
    /// sequence, `nil` once a sequence runs out.
    ///
    /// Each of `others` must be an array or a lazy pipeline.
    pub fn zip(&self, others: Vec<Value>) -> Result<Lazy, EnumError> {
        let operands = others
            .into_iter()
            .map(|other| match other {
                Value::Array(items) => Ok(ZipOperand::Array(Rc::from(items))),
                Value::Lazy(lazy) => Ok(ZipOperand::Lazy(lazy)),
                other => Err(EnumError::invalid_argument(format!(
                    "wrong argument type {:?} (must respond to :each)",
                    other.kind()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.with_stage(Stage::Zip(operands)))
    }

    /// Forward only the first occurrence of each item.
    pub fn uniq(&self) -> Lazy {
        self.with_stage(Stage::Uniq(None))
    }

    /// Forward only the first item for each distinct `key(item)`.
    pub fn uniq_by(&self, key: impl Fn(&Value) -> Result<Value, EnumError> + 'static) -> Lazy {
        self.with_stage(Stage::Uniq(Some(Rc::new(key))))
    }

    /// Forward `(item, index)` with indices counting from `offset`.
    pub fn with_index(&self, offset: i64) -> Lazy {
        self.with_stage(Stage::WithIndex(offset))
    }

    pub fn each_with_index(&self) -> Lazy {
        self.with_index(0)
    }

    pub fn lazy(&self) -> Lazy {
        self.clone()
    }

    // =========================================================================
    // Consumers
    // =========================================================================

    /// Run the pipeline, calling `block` per item.
    pub fn each(&self, block: &mut Block<'_>) -> Result<Value, EnumError> {
        self.run(block).map_err(Signal::into_error)
    }

    /// Run the pipeline to completion and collect every item.
    pub fn force(&self) -> Result<Vec<Value>, EnumError> {
        let mut out = Vec::new();
        self.each(&mut |values: Values| {
            out.push(Value::pack(values));
            Ok(Value::Nil)
        })?;
        Ok(out)
    }

    pub fn to_a(&self) -> Result<Vec<Value>, EnumError> {
        self.force()
    }

    /// The first item, or `nil` when the pipeline is empty.
    pub fn first(&self) -> Result<Value, EnumError> {
        Ok(self.first_n(1)?.pop().unwrap_or_default())
    }

    pub fn first_n(&self, n: i64) -> Result<Vec<Value>, EnumError> {
        self.take(n)?.force()
    }

    /// A non-lazy enumerator over the pipeline's output.
    pub fn eager(&self) -> Enumerator {
        Enumerator::new(Rc::new(self.clone()), "each", Vec::new())
    }

    pub fn size(&self) -> SizeHint {
        match &self.node.upstream {
            Upstream::Root(traversal) => traversal.size(),
            Upstream::Stage { parent, stage } => stage.size(parent.size()),
        }
    }
}

fn non_negative(n: i64, what: &str) -> Result<usize, EnumError> {
    usize::try_from(n)
        .map_err(|_| EnumError::invalid_argument(format!("attempt to {what} negative size")))
}

impl Traversable for Lazy {
    fn traverse(
        &self,
        method: &str,
        _args: &[Value],
        block: &mut Block<'_>,
    ) -> Result<Value, Signal> {
        expect_each(method, || self.to_string())?;
        self.run(block)
    }

    fn size(&self, _method: &str, _args: &[Value]) -> SizeHint {
        Lazy::size(self)
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Lazy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node.upstream {
            Upstream::Root(traversal) if traversal.method() == "each" && traversal.args().is_empty() => {
                write!(f, "#<Enumerator::Lazy: {}>", traversal.source().describe())
            }
            Upstream::Root(traversal) => {
                write!(f, "#<Enumerator::Lazy: #<Enumerator: {traversal}>>")
            }
            Upstream::Stage { parent, stage } => {
                write!(f, "#<Enumerator::Lazy: {parent}:{}", stage.name())?;
                let args = stage.describe_args();
                if !args.is_empty() {
                    write!(f, "({})", args.join(", "))?;
                }
                f.write_str(">")
            }
        }
    }
}

impl fmt::Debug for Lazy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lazy({self})")
    }
}
