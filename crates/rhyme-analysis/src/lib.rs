//! Dependency analysis for the Rhyme IR.
//!
//! Turns a [`Program`](rhyme_ir::Program) into a [`DependencyGraph`],
//! rejects cyclic programs, and precomputes the relations the loop-fusion
//! scheduler queries.

pub mod deps;
pub mod scc;

pub use deps::{
    AnalysisError, DependencyGraph, LoopId, LoopSet, Node, NodeId, Relations, format_relations,
};
pub use scc::tarjan_scc;
