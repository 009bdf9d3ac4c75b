//! Error types for the Rhyme IR.

use crate::symbol::Symbol;

/// Structural problems detected by [`Program::validate`](crate::Program::validate).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IrError {
    /// A generator group has only guards and no loop to live in.
    #[error("generator group '{symbol}' has no iterate generator")]
    MissingIterate { symbol: Symbol },

    /// A generator group has more than one iterate generator.
    #[error("generator group '{symbol}' has {count} iterate generators (expected 1)")]
    DuplicateIterate { symbol: Symbol, count: usize },

    /// A loop variable is also written as an accumulator.
    #[error("symbol '{symbol}' is both a loop variable and an accumulator")]
    SymbolCollision { symbol: Symbol },

    /// Write ranks for one accumulator are not strictly increasing.
    #[error("write ranks for '{symbol}' are not increasing: rank {rank} follows rank {previous}")]
    WriteRankOrder {
        symbol: Symbol,
        previous: u32,
        rank: u32,
    },
}
