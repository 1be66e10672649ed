//! Coroutine-backed external iterators and lazy enumerator pipelines.
//!
//! Any push-style traversal (a [`Traversable`] source run through a named
//! entry point) can be consumed three ways:
//!
//! - internally, by handing it a block ([`Enumerator::each`]);
//! - externally, one item at a time with lookahead, rewind and value
//!   feedback ([`Enumerator::next`], [`Enumerator::peek`], [`Enumerator::feed`]),
//!   backed by a coroutine suspended at each produced item;
//! - lazily, through a chain of streaming stages ([`Lazy`]) that stops an
//!   unbounded upstream as soon as a `take`/`take_while` is satisfied.
//!
//! ```
//! use lazyenum::{Enumerator, Value};
//!
//! let squares = Enumerator::counter(1)
//!     .lazy()
//!     .map(|v| Ok(Value::Int(v.as_int().unwrap_or(0).pow(2))))
//!     .take(4)
//!     .and_then(|lazy| lazy.force())
//!     .unwrap();
//! assert_eq!(squares, vec![Value::Int(1), Value::Int(4), Value::Int(9), Value::Int(16)]);
//! ```

pub mod config;
pub mod coroutine;
pub mod enumerator;
pub mod errors;
pub mod feed;
pub mod generator;
pub mod lazy;
pub mod product;
pub mod size;
pub mod source;
pub mod value;
pub mod yielder;

pub use config::{GeneratorBackend, GeneratorConfig};
pub use coroutine::{Resumed, TraversalCoroutine};
pub use enumerator::Enumerator;
pub use errors::{EnumError, Signal, TraversalId};
pub use feed::FeedValue;
pub use generator::{ArrayGenerator, CoroutineGenerator, RangeGenerator, ValueGenerator};
pub use lazy::{Lazy, Pattern};
pub use product::Product;
pub use size::SizeHint;
pub use source::{
    ArraySource, Block, Chain, Counter, FnSource, RangeSource, Rewindable, Traversable, Traversal,
};
pub use value::{Value, ValueKind, Values};
pub use yielder::Yielder;
