//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use lazyenum::{FnSource, SizeHint, Value};
use tracing_subscriber::EnvFilter;

/// Install a subscriber when `LAZYENUM_LOG` is set. Safe to call from every test.
pub fn init_tracing() {
    if let Ok(filter) = EnvFilter::try_from_env("LAZYENUM_LOG") {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_test_writer()
            .try_init();
    }
}

pub fn ints(items: &[i64]) -> Vec<Value> {
    items.iter().copied().map(Value::Int).collect()
}

/// Naturals from `start`, counting every item handed downstream in `pulls`.
pub fn counted_naturals(start: i64, pulls: Rc<Cell<usize>>) -> FnSource {
    FnSource::new(move |y| {
        let mut n = start;
        loop {
            pulls.set(pulls.get() + 1);
            y.yield_value(n)?;
            n += 1;
        }
    })
    .with_size(SizeHint::Unbounded)
}
