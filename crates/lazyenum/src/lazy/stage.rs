//! Lazy pipeline stages.
//!
//! Each stage receives one item tuple from upstream and forwards zero or more
//! tuples to the next stage by depth. Per-traversal memory lives in the
//! yielder slot for the stage's depth.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashSet;
use smallvec::smallvec;

use super::Lazy;
use super::pattern::Pattern;
use crate::enumerator::Enumerator;
use crate::errors::{EnumError, Signal};
use crate::size::SizeHint;
use crate::source::Traversal;
use crate::value::{Value, Values};
use crate::yielder::Yielder;

pub(crate) type Mapper = Rc<dyn Fn(&Value) -> Result<Value, EnumError>>;
pub(crate) type Predicate = Rc<dyn Fn(&Value) -> Result<bool, EnumError>>;

/// A sequence zipped against the pipeline.
#[derive(Clone)]
pub(crate) enum ZipOperand {
    Array(Rc<[Value]>),
    Lazy(Lazy),
}

impl ZipOperand {
    fn enumerator(&self) -> Enumerator {
        match self {
            ZipOperand::Array(items) => Enumerator::from_values(items.iter().cloned()),
            ZipOperand::Lazy(lazy) => Enumerator::from_traversal(Traversal::each(Rc::new(lazy.clone()))),
        }
    }
}

impl fmt::Display for ZipOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZipOperand::Array(items) => write!(f, "{}", Value::Array(items.to_vec())),
            ZipOperand::Lazy(lazy) => write!(f, "{lazy}"),
        }
    }
}

#[derive(Clone)]
pub(crate) enum Stage {
    Map(Mapper),
    Select(Predicate),
    Reject(Predicate),
    FilterMap(Mapper),
    Grep {
        pattern: Pattern,
        invert: bool,
        map: Option<Mapper>,
    },
    Compact,
    Drop(usize),
    DropWhile(Predicate),
    Take(usize),
    TakeWhile(Predicate),
    FlatMap(Mapper),
    Zip(Vec<ZipOperand>),
    Uniq(Option<Mapper>),
    WithIndex(i64),
}

/// Memory a stage keeps for the duration of one traversal.
#[derive(Debug, Default)]
pub(crate) enum StageState {
    #[default]
    None,
    Count(usize),
    Flag(bool),
    Seen(FxHashSet<Value>),
    Zip(Vec<Enumerator>),
}

fn slot_mismatch() -> EnumError {
    EnumError::Internal("stage slot holds the wrong state")
}

/// Pack without consuming the tuple.
fn packed(values: &Values) -> Value {
    Value::pack(values.clone())
}

/// Forward `values` into the stage at `depth`, or to the consumer block once
/// every stage has run.
pub(crate) fn push(
    stages: &[Stage],
    depth: usize,
    y: &mut Yielder<'_>,
    values: Values,
) -> Result<Value, Signal> {
    match stages.get(depth) {
        Some(stage) => stage.apply(stages, depth, y, values),
        None => y.yield_values(values),
    }
}

impl Stage {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Stage::Map(_) => "map",
            Stage::Select(_) => "select",
            Stage::Reject(_) => "reject",
            Stage::FilterMap(_) => "filter_map",
            Stage::Grep { invert: false, .. } => "grep",
            Stage::Grep { invert: true, .. } => "grep_v",
            Stage::Compact => "compact",
            Stage::Drop(_) => "drop",
            Stage::DropWhile(_) => "drop_while",
            Stage::Take(_) => "take",
            Stage::TakeWhile(_) => "take_while",
            Stage::FlatMap(_) => "flat_map",
            Stage::Zip(_) => "zip",
            Stage::Uniq(_) => "uniq",
            Stage::WithIndex(_) => "with_index",
        }
    }

    /// Arguments shown in the pipeline description.
    pub(crate) fn describe_args(&self) -> Vec<String> {
        match self {
            Stage::Grep { pattern, .. } => vec![pattern.to_string()],
            Stage::Drop(n) | Stage::Take(n) => vec![n.to_string()],
            Stage::Zip(others) => others.iter().map(ToString::to_string).collect(),
            Stage::WithIndex(offset) => vec![offset.to_string()],
            _ => Vec::new(),
        }
    }

    /// `take(0)` never forwards anything, so the upstream need not run.
    pub(crate) fn is_empty_take(&self) -> bool {
        matches!(self, Stage::Take(0))
    }

    pub(crate) fn size(&self, upstream: SizeHint) -> SizeHint {
        match self {
            Stage::Map(_) | Stage::Zip(_) | Stage::WithIndex(_) => upstream,
            Stage::Drop(n) => upstream.saturating_drop(*n),
            Stage::Take(n) => upstream.take(*n),
            _ => SizeHint::Unknown,
        }
    }

    pub(crate) fn initial_state(&self) -> StageState {
        match self {
            Stage::Drop(_) | Stage::Take(_) | Stage::WithIndex(_) => StageState::Count(0),
            Stage::DropWhile(_) => StageState::Flag(true),
            Stage::Uniq(_) => StageState::Seen(FxHashSet::default()),
            Stage::Zip(others) => {
                if others.iter().all(|o| matches!(o, ZipOperand::Array(_))) {
                    StageState::Count(0)
                } else {
                    StageState::Zip(others.iter().map(ZipOperand::enumerator).collect())
                }
            }
            _ => StageState::None,
        }
    }

    fn apply(
        &self,
        stages: &[Stage],
        depth: usize,
        y: &mut Yielder<'_>,
        values: Values,
    ) -> Result<Value, Signal> {
        let next = depth + 1;
        match self {
            Stage::Map(f) => {
                let out = f(&Value::pack(values))?;
                push(stages, next, y, smallvec![out])
            }
            Stage::Select(pred) => {
                if pred(&packed(&values))? {
                    push(stages, next, y, values)
                } else {
                    Ok(Value::Nil)
                }
            }
            Stage::Reject(pred) => {
                if pred(&packed(&values))? {
                    Ok(Value::Nil)
                } else {
                    push(stages, next, y, values)
                }
            }
            Stage::FilterMap(f) => {
                let out = f(&Value::pack(values))?;
                if out.is_truthy() {
                    push(stages, next, y, smallvec![out])
                } else {
                    Ok(Value::Nil)
                }
            }
            Stage::Grep {
                pattern,
                invert,
                map,
            } => {
                let item = packed(&values);
                if pattern.matches(&item) == *invert {
                    return Ok(Value::Nil);
                }
                match map {
                    Some(f) => {
                        let out = f(&item)?;
                        push(stages, next, y, smallvec![out])
                    }
                    None => push(stages, next, y, values),
                }
            }
            Stage::Compact => {
                let nil = match values.as_slice() {
                    [] => true,
                    [v] => v.is_nil(),
                    _ => false,
                };
                if nil {
                    Ok(Value::Nil)
                } else {
                    push(stages, next, y, values)
                }
            }
            Stage::Drop(n) => {
                match y.slot_mut(depth)? {
                    StageState::Count(dropped) if *dropped < *n => {
                        *dropped += 1;
                        return Ok(Value::Nil);
                    }
                    StageState::Count(_) => {}
                    _ => return Err(slot_mismatch().into()),
                }
                push(stages, next, y, values)
            }
            Stage::DropWhile(pred) => {
                let dropping = match y.slot_mut(depth)? {
                    StageState::Flag(dropping) => *dropping,
                    _ => return Err(slot_mismatch().into()),
                };
                if dropping {
                    if pred(&packed(&values))? {
                        return Ok(Value::Nil);
                    }
                    *y.slot_mut(depth)? = StageState::Flag(false);
                }
                push(stages, next, y, values)
            }
            Stage::Take(n) => {
                let taken = match y.slot_mut(depth)? {
                    StageState::Count(taken) => {
                        *taken += 1;
                        *taken
                    }
                    _ => return Err(slot_mismatch().into()),
                };
                let out = push(stages, next, y, values)?;
                if taken >= *n {
                    return Err(y.stop());
                }
                Ok(out)
            }
            Stage::TakeWhile(pred) => {
                if pred(&packed(&values))? {
                    push(stages, next, y, values)
                } else {
                    Err(y.stop())
                }
            }
            Stage::FlatMap(f) => {
                match f(&Value::pack(values))? {
                    Value::Array(items) => {
                        for item in items {
                            push(stages, next, y, smallvec![item])?;
                        }
                    }
                    // A nested pipeline runs under its own traversal id; a
                    // break from downstream of this stage passes through it.
                    Value::Lazy(inner) => {
                        inner.run(&mut |inner_values| push(stages, next, y, inner_values))?;
                    }
                    scalar => {
                        push(stages, next, y, smallvec![scalar])?;
                    }
                }
                Ok(Value::Nil)
            }
            Stage::Zip(others) => {
                let mut row = Vec::with_capacity(others.len() + 1);
                row.push(Value::pack(values));
                match y.slot_mut(depth)? {
                    StageState::Count(index) => {
                        for other in others {
                            if let ZipOperand::Array(items) = other {
                                row.push(items.get(*index).cloned().unwrap_or_default());
                            }
                        }
                        *index += 1;
                    }
                    StageState::Zip(iters) => {
                        for iter in iters.iter_mut() {
                            match iter.next() {
                                Ok(v) => row.push(v),
                                Err(e) if e.is_exhausted() => row.push(Value::Nil),
                                Err(e) => return Err(e.into()),
                            }
                        }
                    }
                    _ => return Err(slot_mismatch().into()),
                }
                push(stages, next, y, smallvec![Value::Array(row)])
            }
            Stage::Uniq(key) => {
                let item = packed(&values);
                let key = match key {
                    Some(f) => f(&item)?,
                    None => item,
                };
                let fresh = match y.slot_mut(depth)? {
                    StageState::Seen(seen) => seen.insert(key),
                    _ => return Err(slot_mismatch().into()),
                };
                if fresh {
                    push(stages, next, y, values)
                } else {
                    Ok(Value::Nil)
                }
            }
            Stage::WithIndex(offset) => {
                let index = match y.slot_mut(depth)? {
                    StageState::Count(count) => {
                        let index = *count;
                        *count += 1;
                        index
                    }
                    _ => return Err(slot_mismatch().into()),
                };
                let index = offset.saturating_add(index as i64);
                push(stages, next, y, smallvec![Value::pack(values), Value::Int(index)])
            }
        }
    }
}
