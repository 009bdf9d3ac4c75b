//! Rhyme intermediate representation.
//!
//! A flat IR of *assignment statements* writing into named accumulators and
//! *generators* binding loop variables, each annotated with the symbols it
//! depends on. Produced by lowering a query; consumed read-only by the
//! dependency analysis, the loop-fusion scheduler and the backends.

pub mod arena;
mod builder;
mod display;
mod error;
mod expr;
mod generator;
mod stmt;
mod symbol;

pub use arena::{Arena, Handle};
pub use builder::ProgramBuilder;
pub use display::dump_program;
pub use error::IrError;
pub use expr::{BinaryOp, Expr};
pub use generator::{Generator, GeneratorGroup, GeneratorRole};
pub use stmt::{AssignOp, Statement, StmtId};
pub use symbol::Symbol;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A lowered query: the unit of compilation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Assignment statements, in lowering order.
    #[serde(default)]
    pub statements: Arena<Statement>,
    /// Generators, in lowering order.
    #[serde(default)]
    pub generators: Vec<Generator>,
    /// Expression returned after every statement has run.
    pub result: Expr,
}

impl Default for Program {
    fn default() -> Self {
        Self {
            statements: Arena::new(),
            generators: Vec::new(),
            result: Expr::Input,
        }
    }
}

impl Program {
    /// Generators grouped by symbol, in order of first appearance.
    pub fn generators_by_symbol(&self) -> IndexMap<&Symbol, Vec<&Generator>> {
        let mut groups: IndexMap<&Symbol, Vec<&Generator>> = IndexMap::new();
        for g in &self.generators {
            groups.entry(&g.symbol).or_default().push(g);
        }
        groups
    }

    /// The generator group for `symbol`, if it is a loop variable with
    /// exactly one iterate generator.
    pub fn generator_group(&self, symbol: &Symbol) -> Option<GeneratorGroup<'_>> {
        let mut iterate = None;
        let mut guards = Vec::new();
        for g in self.generators.iter().filter(|g| &g.symbol == symbol) {
            match g.role {
                GeneratorRole::Iterate if iterate.is_none() => iterate = Some(g),
                GeneratorRole::Iterate => return None,
                GeneratorRole::Guard => guards.push(g),
            }
        }
        let iterate = iterate?;
        Some(GeneratorGroup {
            symbol: &iterate.symbol,
            iterate,
            guards,
        })
    }

    /// Checks the structural invariants the scheduler relies on.
    ///
    /// - every generator group has exactly one [`GeneratorRole::Iterate`];
    /// - no loop variable is also an accumulator;
    /// - write ranks are strictly increasing per accumulator, in
    ///   statement order.
    pub fn validate(&self) -> Result<(), IrError> {
        let groups = self.generators_by_symbol();
        for (symbol, gens) in &groups {
            let count = gens
                .iter()
                .filter(|g| g.role == GeneratorRole::Iterate)
                .count();
            match count {
                0 => {
                    return Err(IrError::MissingIterate {
                        symbol: (*symbol).clone(),
                    });
                }
                1 => {}
                _ => {
                    return Err(IrError::DuplicateIterate {
                        symbol: (*symbol).clone(),
                        count,
                    });
                }
            }
        }

        let mut last_rank: IndexMap<&Symbol, u32> = IndexMap::new();
        for (_, stmt) in self.statements.iter() {
            if groups.contains_key(&stmt.write) {
                return Err(IrError::SymbolCollision {
                    symbol: stmt.write.clone(),
                });
            }
            if let Some(&previous) = last_rank.get(&stmt.write)
                && stmt.write_rank <= previous
            {
                return Err(IrError::WriteRankOrder {
                    symbol: stmt.write.clone(),
                    previous,
                    rank: stmt.write_rank,
                });
            }
            last_rank.insert(&stmt.write, stmt.write_rank);
        }

        Ok(())
    }
}
