//! Schedule verification.
//!
//! Re-checks a finished instruction stream against the dependency
//! relations, independently of how it was produced.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use rhyme_analysis::{DependencyGraph, LoopId};
use rhyme_ir::{Program, StmtId, Symbol};

use crate::schedule::{Instruction, Schedule};

/// A broken schedule guarantee.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("statement {stmt} emitted more than once")]
    Duplicate { stmt: StmtId },

    #[error("statement {stmt} is never emitted")]
    Missing { stmt: StmtId },

    #[error("statement {stmt} does not exist")]
    UnknownStatement { stmt: StmtId },

    #[error("loop '{symbol}' is not a generator group")]
    UnknownLoop { symbol: Symbol },

    #[error("statement {stmt} emitted in loops [{}], needs [{}]", join(.open), join(.expected))]
    WrongNesting {
        stmt: StmtId,
        expected: Vec<Symbol>,
        open: Vec<Symbol>,
    },

    #[error("statement {stmt} reads {dep} before it is available")]
    Unavailable { stmt: StmtId, dep: StmtId },

    #[error("statement {stmt} writes '{symbol}' out of rank order")]
    RankOrder { stmt: StmtId, symbol: Symbol },

    #[error("loop '{symbol}' opened while already open")]
    Reopened { symbol: Symbol },

    #[error("close of '{symbol}' does not match the innermost open loop")]
    UnbalancedClose { symbol: Symbol },

    #[error("loop '{symbol}' is never closed")]
    Unclosed { symbol: Symbol },

    #[error("schedule must end with exactly one return")]
    Return,
}

fn join(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .map(Symbol::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Schedule {
    /// Checks the schedule guarantees against the program's relations:
    ///
    /// - every statement is emitted exactly once;
    /// - at each emission the open loops are exactly the statement's loop
    ///   dependencies;
    /// - every statement dependency was emitted, and the loops separating
    ///   it were closed, before it is read;
    /// - writes to one accumulator follow rank order;
    /// - loops are balanced and the stream ends with a single return.
    pub fn verify(&self, program: &Program, graph: &DependencyGraph) -> Result<(), Violation> {
        let rel = graph.relations();
        let n = program.statements.len();
        let mut opened: Vec<LoopId> = Vec::new();
        let mut emitted = vec![false; n];
        let mut closed: Vec<BTreeSet<LoopId>> = vec![BTreeSet::new(); n];
        let mut last_rank: IndexMap<&Symbol, u32> = IndexMap::new();

        let Some((Instruction::Return, body)) = self.instructions.split_last() else {
            return Err(Violation::Return);
        };

        for inst in body {
            match inst {
                Instruction::OpenLoop(symbol) => {
                    let l = graph.loop_id(symbol).ok_or_else(|| Violation::UnknownLoop {
                        symbol: symbol.clone(),
                    })?;
                    if opened.contains(&l) {
                        return Err(Violation::Reopened {
                            symbol: symbol.clone(),
                        });
                    }
                    opened.push(l);
                }
                Instruction::CloseLoop(symbol) => {
                    let l = graph.loop_id(symbol);
                    if l.is_none() || opened.last().copied() != l {
                        return Err(Violation::UnbalancedClose {
                            symbol: symbol.clone(),
                        });
                    }
                    if let Some(l) = opened.pop() {
                        for (i, loops) in rel.loop_deps.iter().enumerate() {
                            if emitted[i] && loops.contains(&l) {
                                closed[i].insert(l);
                            }
                        }
                    }
                }
                Instruction::Statement(stmt) => {
                    let s = *stmt;
                    let Some(statement) = program.statements.try_get(s) else {
                        return Err(Violation::UnknownStatement { stmt: s });
                    };
                    if emitted[s.index()] {
                        return Err(Violation::Duplicate { stmt: s });
                    }

                    let open: BTreeSet<LoopId> = opened.iter().copied().collect();
                    if open != rel.loop_deps[s.index()] {
                        let names = |ls: &BTreeSet<LoopId>| -> Vec<Symbol> {
                            ls.iter().map(|&l| graph.loop_symbol(l).clone()).collect()
                        };
                        return Err(Violation::WrongNesting {
                            stmt: s,
                            expected: names(&rel.loop_deps[s.index()]),
                            open: names(&open),
                        });
                    }

                    for &d in &rel.stmt_deps[s.index()] {
                        let separated = rel.stmt_by_loop[s.index()]
                            .get(&d)
                            .is_none_or(|ls| ls.is_subset(&closed[d.index()]));
                        if !emitted[d.index()] || !separated {
                            return Err(Violation::Unavailable { stmt: s, dep: d });
                        }
                    }

                    if let Some(&prev) = last_rank.get(&statement.write)
                        && statement.write_rank < prev
                    {
                        return Err(Violation::RankOrder {
                            stmt: s,
                            symbol: statement.write.clone(),
                        });
                    }
                    last_rank.insert(&statement.write, statement.write_rank);

                    emitted[s.index()] = true;
                    closed[s.index()].clear();
                }
                Instruction::Return => return Err(Violation::Return),
            }
        }

        if let Some(&l) = opened.last() {
            return Err(Violation::Unclosed {
                symbol: graph.loop_symbol(l).clone(),
            });
        }
        if let Some(i) = emitted.iter().position(|e| !e) {
            return Err(Violation::Missing {
                stmt: StmtId::new(i as u32),
            });
        }

        Ok(())
    }
}
