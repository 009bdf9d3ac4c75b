//! Generators: loop variables bound by iterating a source.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::symbol::Symbol;

/// The part a generator plays in its group.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorRole {
    /// Defines the physical loop: iterate the keys of `source`.
    Iterate,
    /// Filters the loop: skip keys that `source` does not contain.
    Guard,
}

/// Binds `symbol` to the keys of `source`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    /// The loop variable.
    pub symbol: Symbol,
    /// Loop variables and accumulators `source` reads.
    #[serde(default)]
    pub deps: BTreeSet<Symbol>,
    pub role: GeneratorRole,
    /// The collection whose keys are iterated (or tested).
    pub source: Expr,
}

/// All generators sharing one symbol: the loop and its guards.
#[derive(Clone, Debug)]
pub struct GeneratorGroup<'a> {
    pub symbol: &'a Symbol,
    pub iterate: &'a Generator,
    pub guards: Vec<&'a Generator>,
}

impl GeneratorGroup<'_> {
    /// Union of the dependencies of every generator in the group.
    pub fn deps(&self) -> BTreeSet<Symbol> {
        std::iter::once(self.iterate)
            .chain(self.guards.iter().copied())
            .flat_map(|g| g.deps.iter().cloned())
            .collect()
    }
}
