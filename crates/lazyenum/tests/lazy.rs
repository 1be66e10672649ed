//! Lazy pipelines: streaming, early exit and stage semantics.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::{counted_naturals, init_tracing, ints};
use lazyenum::{
    EnumError, Enumerator, FnSource, Lazy, Pattern, RangeSource, SizeHint, Traversal, Value,
    ValueKind,
};

fn naturals_from(start: i64, pulls: &Rc<Cell<usize>>) -> Lazy {
    Lazy::new(Traversal::each(Rc::new(counted_naturals(start, pulls.clone()))))
}

fn square(v: &Value) -> Result<Value, EnumError> {
    let i = v.as_int().ok_or_else(|| EnumError::block("not an integer"))?;
    Ok(Value::Int(i * i))
}

#[test]
fn take_pulls_unbounded_upstream_exactly_n_times() {
    init_tracing();
    let pulls = Rc::new(Cell::new(0));
    let out = naturals_from(0, &pulls).take(5).and_then(|l| l.force());
    assert_eq!(out, Ok(ints(&[0, 1, 2, 3, 4])));
    assert_eq!(pulls.get(), 5);
}

#[test]
fn map_take_never_reaches_a_failing_fourth_item() {
    init_tracing();
    let accesses = Rc::new(Cell::new(0));
    let seen = accesses.clone();
    let source = FnSource::new(move |y| {
        for i in 1..=10 {
            seen.set(seen.get() + 1);
            if i == 4 {
                return Err(EnumError::block("fourth access").into());
            }
            y.yield_value(i)?;
        }
        Ok(Value::Nil)
    });
    let out = Lazy::new(Traversal::each(Rc::new(source)))
        .map(square)
        .take(3)
        .and_then(|l| l.force());
    assert_eq!(out, Ok(ints(&[1, 4, 9])));
    assert_eq!(accesses.get(), 3);
}

#[test]
fn drop_and_take_partition_the_source() {
    let items = ints(&[3, 1, 4, 1, 5, 9, 2, 6]);
    let lazy = Lazy::from_values(items.clone());
    for n in 0..=items.len() as i64 {
        let mut head = lazy.take(n).and_then(|l| l.force()).expect("take");
        let tail = lazy.drop(n).and_then(|l| l.force()).expect("drop");
        head.extend(tail);
        assert_eq!(head, items, "split at {n}");
    }
}

#[test]
fn uniq_keeps_first_occurrences_in_order() {
    let out = Lazy::from_values(ints(&[1, 2, 1, 3, 2])).uniq().force();
    assert_eq!(out, Ok(ints(&[1, 2, 3])));
}

#[test]
fn size_hints_follow_drop_and_take() {
    let ten = Enumerator::range(1_i64..=10).lazy();
    assert_eq!(ten.size(), SizeHint::Known(10));
    assert_eq!(ten.drop(3).map(|l| l.size()), Ok(SizeHint::Known(7)));
    assert_eq!(ten.take(3).map(|l| l.size()), Ok(SizeHint::Known(3)));
    assert_eq!(ten.take(0).map(|l| l.size()), Ok(SizeHint::Known(0)));
    assert_eq!(ten.drop(30).map(|l| l.size()), Ok(SizeHint::Known(0)));

    let unbounded = Enumerator::counter(0).lazy();
    assert_eq!(unbounded.size(), SizeHint::Unbounded);
    assert_eq!(unbounded.take(2).map(|l| l.size()), Ok(SizeHint::Known(2)));
}

#[test]
fn select_then_map_over_array() {
    let out = Lazy::from_values(ints(&[1, 2, 3, 4, 5]))
        .select(|v| Ok(v.as_int().is_some_and(|i| i % 2 == 0)))
        .map(|v| Ok(Value::Int(v.as_int().unwrap_or(0) * 10)))
        .force();
    assert_eq!(out, Ok(ints(&[20, 40])));
}

#[test]
fn squares_of_naturals_stop_after_four() {
    init_tracing();
    let pulls = Rc::new(Cell::new(0));
    let out = naturals_from(1, &pulls)
        .map(square)
        .take(4)
        .and_then(|l| l.force());
    assert_eq!(out, Ok(ints(&[1, 4, 9, 16])));
    assert_eq!(pulls.get(), 4);
}

#[test]
fn pipeline_can_be_consumed_repeatedly() {
    let pulls = Rc::new(Cell::new(0));
    let firsts = naturals_from(0, &pulls)
        .drop(2)
        .and_then(|l| l.take(2))
        .expect("pipeline");
    assert_eq!(firsts.force(), Ok(ints(&[2, 3])));
    assert_eq!(firsts.force(), Ok(ints(&[2, 3])));
    assert_eq!(pulls.get(), 8);
}

#[test]
fn nested_take_inside_flat_map_does_not_stop_the_outer_run() {
    init_tracing();
    let out = Lazy::from_values(ints(&[1, 2, 3]))
        .flat_map(|v| {
            let base = v.as_int().unwrap_or(0) * 10;
            let inner = Enumerator::counter(base).lazy().take(2)?;
            Ok(Value::Lazy(inner))
        })
        .force();
    assert_eq!(out, Ok(ints(&[10, 11, 20, 21, 30, 31])));
}

#[test]
fn outer_take_stops_inside_nested_pipeline() {
    let pulls = Rc::new(Cell::new(0));
    let inner_pulls = pulls.clone();
    let out = Lazy::from_values(ints(&[1]))
        .flat_map(move |_| {
            let inner = counted_naturals(0, inner_pulls.clone());
            Ok(Value::Lazy(Lazy::new(Traversal::each(Rc::new(inner)))))
        })
        .take(2)
        .and_then(|l| l.force());
    assert_eq!(out, Ok(ints(&[0, 1])));
    assert_eq!(pulls.get(), 2);
}

#[test]
fn take_while_and_drop_while_bracket_a_run() {
    let lazy = Enumerator::range(1_i64..=9).lazy();
    let out = lazy
        .drop_while(|v| Ok(v.as_int().is_some_and(|i| i < 3)))
        .take_while(|v| Ok(v.as_int().is_some_and(|i| i < 6)))
        .force();
    assert_eq!(out, Ok(ints(&[3, 4, 5])));
}

#[test]
fn grep_with_patterns_and_blocks() {
    let mixed = Lazy::from_values([
        Value::Int(1),
        Value::str("one"),
        Value::Nil,
        Value::Int(7),
        Value::str("seven"),
    ]);
    assert_eq!(mixed.grep(ValueKind::Str).force().map(|v| v.len()), Ok(2));
    assert_eq!(
        mixed.grep_v(ValueKind::Int).compact().force(),
        Ok(vec![Value::str("one"), Value::str("seven")])
    );
    let upper = mixed
        .grep_map(Pattern::regex("^s").expect("regex"), |v| {
            Ok(Value::str(v.as_str().unwrap_or_default().to_uppercase()))
        })
        .force();
    assert_eq!(upper, Ok(vec![Value::str("SEVEN")]));
    let small = mixed
        .grep_v_map(Pattern::from(5_i64..=10), |v| Ok(Value::from(v.is_nil())))
        .force();
    assert_eq!(small.map(|v| v.len()), Ok(4));
    assert!(matches!(Pattern::regex("[z-a]"), Err(EnumError::InvalidArgument(_))));
}

#[test]
fn zip_pulls_from_lazy_operands_and_pads_with_nil() {
    let evens = Enumerator::counter(0)
        .lazy()
        .select(|v| Ok(v.as_int().is_some_and(|i| i % 2 == 0)))
        .take(2)
        .expect("take");
    let out = Lazy::from_values(ints(&[1, 2, 3]))
        .zip(vec![Value::Lazy(evens)])
        .and_then(|l| l.force());
    assert_eq!(
        out,
        Ok(vec![
            Value::from(vec![Value::Int(1), Value::Int(0)]),
            Value::from(vec![Value::Int(2), Value::Int(2)]),
            Value::from(vec![Value::Int(3), Value::Nil]),
        ])
    );
}

#[test]
fn with_index_and_filter_map() {
    let out = Lazy::from_values([Value::str("a"), Value::str("b"), Value::str("c")])
        .each_with_index()
        .filter_map(|pair| {
            let pair = pair.as_array().unwrap_or_default();
            Ok(match pair {
                [item, Value::Int(i)] if i % 2 == 0 => item.clone(),
                _ => Value::Nil,
            })
        })
        .force();
    assert_eq!(out, Ok(vec![Value::str("a"), Value::str("c")]));
}

#[test]
fn eager_wraps_the_pipeline_in_an_enumerator() {
    init_tracing();
    let pulls = Rc::new(Cell::new(0));
    let mut eager = naturals_from(1, &pulls).map(square).eager();
    assert_eq!(eager.next(), Ok(Value::Int(1)));
    assert_eq!(eager.peek(), Ok(Value::Int(4)));
    assert_eq!(eager.next(), Ok(Value::Int(4)));
    assert_eq!(pulls.get(), 2);
    eager.rewind().expect("rewind");
    assert_eq!(eager.next(), Ok(Value::Int(1)));
}

#[test]
fn block_errors_abort_and_propagate_unchanged() {
    let pulls = Rc::new(Cell::new(0));
    let out = naturals_from(0, &pulls)
        .map(|v| match v.as_int() {
            Some(3) => Err(EnumError::block("three is not allowed")),
            _ => Ok(v.clone()),
        })
        .force();
    assert_eq!(out, Err(EnumError::block("three is not allowed")));
    assert_eq!(pulls.get(), 4);
}

#[test]
fn describe_names_every_stage() {
    let lazy = Lazy::new(Traversal::new(
        Rc::new(RangeSource::from(1_i64..=6)),
        "step",
        vec![Value::Int(2)],
    ))
    .drop(1)
    .expect("drop")
    .grep(1_i64..=3);
    assert_eq!(
        lazy.to_string(),
        "#<Enumerator::Lazy: #<Enumerator::Lazy: #<Enumerator::Lazy: #<Enumerator: 1..6:step(2)>>:drop(1)>:grep(1..3)>"
    );
    assert_eq!(lazy.force(), Ok(ints(&[3])));
}
