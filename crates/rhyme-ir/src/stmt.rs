//! Statements: writes into named accumulators.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::arena::Handle;
use crate::expr::Expr;
use crate::symbol::Symbol;

/// Identifier of a statement: its handle in [`Program::statements`](crate::Program).
pub type StmtId = Handle<Statement>;

/// How a statement combines its value with the accumulator slot.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignOp {
    /// Write only if the slot is still undefined (`??=`).
    Init,
    /// Unconditional overwrite (`=`).
    Assign,
    /// Numeric accumulation (`+=`).
    Add,
    /// Keep the larger value.
    Max,
    /// Keep the smaller value.
    Min,
    /// Add one for every defined value.
    Count,
    /// Append to an array slot.
    Push,
}

/// A single write contributing to accumulator `write`.
///
/// `deps` names every loop variable and accumulator the statement reads.
/// A dependency on an accumulator means its *final* value, after all of
/// its writes. Writes to the same accumulator are ordered by `write_rank`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Accumulator written by this statement.
    pub write: Symbol,
    /// Loop variables and accumulators this statement requires.
    #[serde(default)]
    pub deps: BTreeSet<Symbol>,
    /// Position among the writes to `write`; strictly increasing.
    pub write_rank: u32,
    /// Keys selecting the slot inside the accumulator (`tmp0[k1][k2]`).
    #[serde(default)]
    pub path: Vec<Expr>,
    /// Combination operator.
    pub op: AssignOp,
    /// Value combined into the slot.
    pub value: Expr,
}

impl Statement {
    /// Returns `true` if this statement reads `symbol`.
    pub fn depends_on(&self, symbol: &Symbol) -> bool {
        self.deps.contains(symbol)
    }
}
