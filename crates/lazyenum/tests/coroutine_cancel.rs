//! Abandoned traversals are unwound, never leaked or resumed.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::init_tracing;
use lazyenum::{Enumerator, GeneratorBackend, GeneratorConfig, Value};

struct DropFlag(Rc<Cell<usize>>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

fn guarded(drops: &Rc<Cell<usize>>) -> Enumerator {
    let drops = drops.clone();
    Enumerator::from_fn(move |y| {
        let _guard = DropFlag(drops.clone());
        y.yield_value(1)?;
        y.yield_value(2)?;
        y.yield_value(3)?;
        Ok(Value::Nil)
    })
}

#[test]
fn dropping_a_suspended_enumerator_unwinds_its_traversal() {
    init_tracing();
    let drops = Rc::new(Cell::new(0));
    let mut e = guarded(&drops);
    assert_eq!(e.next(), Ok(Value::Int(1)));
    assert_eq!(drops.get(), 0);
    drop(e);
    assert_eq!(drops.get(), 1);
}

#[test]
fn rewind_unwinds_the_abandoned_run() {
    init_tracing();
    let drops = Rc::new(Cell::new(0));
    let mut e = guarded(&drops);
    e.next().expect("first");
    e.next().expect("second");
    e.rewind().expect("rewind");
    assert_eq!(drops.get(), 1);
    assert_eq!(e.next(), Ok(Value::Int(1)));
    assert_eq!(drops.get(), 1);
}

#[test]
fn finished_traversal_cleans_up_normally() {
    let drops = Rc::new(Cell::new(0));
    let mut e = guarded(&drops);
    while e.next().is_ok() {}
    assert_eq!(drops.get(), 1);
    e.rewind().expect("rewind");
    assert_eq!(drops.get(), 1);
}

#[test]
fn never_started_enumerator_drops_cleanly() {
    let drops = Rc::new(Cell::new(0));
    let e = guarded(&drops).with_config(
        GeneratorConfig::default().with_backend(GeneratorBackend::Coroutine),
    );
    drop(e);
    assert_eq!(drops.get(), 0);
}

#[test]
fn many_abandoned_enumerators_do_not_accumulate() {
    let drops = Rc::new(Cell::new(0));
    for _ in 0..200 {
        let mut e = guarded(&drops);
        e.next().expect("first");
    }
    assert_eq!(drops.get(), 200);
}
