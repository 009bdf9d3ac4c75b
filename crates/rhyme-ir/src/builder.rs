//! Incremental construction of a [`Program`].
//!
//! This is the glue an upstream lowering uses: dependency sets and write
//! ranks are derived here so callers only describe paths and values.

use indexmap::IndexMap;

use crate::Program;
use crate::expr::Expr;
use crate::generator::{Generator, GeneratorRole};
use crate::stmt::{AssignOp, Statement, StmtId};
use crate::symbol::Symbol;

/// Builds a [`Program`] statement by statement.
///
/// Name generation is local to the builder, so independent builders never
/// share counters.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
    next_rank: IndexMap<Symbol, u32>,
    tmp_count: u32,
}

impl ProgramBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh accumulator symbol (`tmp0`, `tmp1`, ...).
    pub fn fresh_tmp(&mut self) -> Symbol {
        let sym = Symbol::new(format!("tmp{}", self.tmp_count));
        self.tmp_count += 1;
        sym
    }

    /// Appends `write[path...] <op> value`.
    ///
    /// The dependency set is every symbol read by `path` and `value`,
    /// excluding `write` itself (self-reads are ordered by rank instead).
    pub fn assign(
        &mut self,
        write: impl Into<Symbol>,
        path: Vec<Expr>,
        op: AssignOp,
        value: Expr,
    ) -> StmtId {
        let write = write.into();
        let mut deps = value.free_symbols();
        for key in &path {
            key.collect_symbols(&mut deps);
        }
        deps.remove(&write);

        let rank = self.next_rank.entry(write.clone()).or_insert(1);
        let write_rank = *rank;
        *rank += 1;

        self.program.statements.append(Statement {
            write,
            deps,
            write_rank,
            path,
            op,
            value,
        })
    }

    /// Binds `symbol` to the keys of `source`.
    ///
    /// The first generator for a symbol iterates; later ones guard. An
    /// identical generator that already exists is not added twice.
    pub fn generator(&mut self, symbol: impl Into<Symbol>, source: Expr) {
        let symbol = symbol.into();
        let existing = self.program.generators.iter().filter(|g| g.symbol == symbol);
        let mut seen = false;
        for g in existing {
            if g.source == source {
                return;
            }
            seen = true;
        }
        let role = if seen {
            GeneratorRole::Guard
        } else {
            GeneratorRole::Iterate
        };
        self.program.generators.push(Generator {
            deps: source.free_symbols(),
            symbol,
            role,
            source,
        });
    }

    /// Finishes the program with the expression it returns.
    pub fn finish(mut self, result: Expr) -> Program {
        self.program.result = result;
        self.program
    }
}
