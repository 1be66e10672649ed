//! Cartesian product of several traversals.

use crate::errors::{EnumError, Signal};
use crate::size::SizeHint;
use crate::source::{Block, Rewindable, Traversable, Traversal, expect_each};
use crate::value::Value;

/// Yields one array per combination, varying the rightmost factor fastest.
///
/// Each factor is re-traversed once per combination of the factors to its
/// left, so every factor must be re-runnable.
#[derive(Clone, Debug)]
pub struct Product {
    factors: Vec<Traversal>,
}

impl Product {
    pub fn new(factors: impl IntoIterator<Item = Traversal>) -> Self {
        Self {
            factors: factors.into_iter().collect(),
        }
    }

    fn walk(&self, depth: usize, row: &mut Vec<Value>, block: &mut Block<'_>) -> Result<(), Signal> {
        let Some(factor) = self.factors.get(depth) else {
            block(smallvec::smallvec![Value::Array(row.clone())])?;
            return Ok(());
        };
        factor.run(&mut |values| {
            row.push(Value::pack(values));
            let walked = self.walk(depth + 1, row, block);
            row.pop();
            walked.map(|()| Value::Nil)
        })?;
        Ok(())
    }
}

impl Traversable for Product {
    fn traverse(
        &self,
        method: &str,
        _args: &[Value],
        block: &mut Block<'_>,
    ) -> Result<Value, Signal> {
        expect_each(method, || self.describe())?;
        let mut row = Vec::with_capacity(self.factors.len());
        self.walk(0, &mut row, block)?;
        Ok(Value::Nil)
    }

    fn size(&self, _method: &str, _args: &[Value]) -> SizeHint {
        SizeHint::product(self.factors.iter().map(Traversal::size))
    }

    fn as_rewindable(&self) -> Option<&dyn Rewindable> {
        Some(self)
    }

    fn describe(&self) -> String {
        let factors: Vec<String> = self
            .factors
            .iter()
            .map(|f| format!("#<Enumerator: {f}>"))
            .collect();
        format!("#<Enumerator::Product: [{}]>", factors.join(", "))
    }
}

impl Rewindable for Product {
    fn rewind(&self) -> Result<(), EnumError> {
        for factor in self.factors.iter().rev() {
            factor.rewind_source()?;
        }
        Ok(())
    }
}
