//! Dependency-driven loop-fusion scheduling.
//!
//! Walks the dependency graph, emitting every statement whose data is
//! available and whose loops are open, and otherwise opening the most
//! useful loop and recursing into it with only the statements that need
//! that loop. Statements sharing a loop variable are therefore fused into
//! one physical loop whenever their dependencies allow.
//!
//! # Algorithm
//!
//! `schedule(pending) -> residual`:
//!
//! 1. Emit emittable statements (in scope, dependencies available) until a
//!    pass emits nothing.
//! 2. Return if nothing is pending.
//! 3. Collect the *waiting* statements: data-ready, blocked only on loop
//!    scope. If there are none, return the pending set to the caller.
//! 4. Pick the next loop (see [`CompilationContext::next_loop`]).
//! 5. Open it, recurse on the pending statements that need it, close it.
//! 6. Re-add whatever the nested scope could not place and go to 1.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use rhyme_analysis::{DependencyGraph, LoopId, NodeId, Relations};
use rhyme_ir::{Program, StmtId};

use crate::ScheduleOptions;
use crate::error::{ScheduleError, StuckStatement};
use crate::schedule::{Instruction, Schedule};

/// Per-compilation scheduler state.
///
/// Created fresh for every call and dropped at the end, so independent
/// compilations never share anything mutable.
pub struct CompilationContext<'a> {
    program: &'a Program,
    graph: &'a DependencyGraph,
    rel: &'a Relations,
    options: &'a ScheduleOptions,
    /// Currently open loops, outermost first.
    opened_loops: Vec<LoopId>,
    emitted: Vec<bool>,
    /// Loops closed since each statement was emitted.
    closed_loop_by_stmt: Vec<BTreeSet<LoopId>>,
    instructions: Vec<Instruction>,
}

impl<'a> CompilationContext<'a> {
    pub fn new(
        program: &'a Program,
        graph: &'a DependencyGraph,
        options: &'a ScheduleOptions,
    ) -> Self {
        let n = program.statements.len();
        Self {
            program,
            graph,
            rel: graph.relations(),
            options,
            opened_loops: Vec::new(),
            emitted: vec![false; n],
            closed_loop_by_stmt: vec![BTreeSet::new(); n],
            instructions: Vec::new(),
        }
    }

    /// Schedules every statement of the program and appends the final
    /// return.
    pub fn run(mut self) -> Result<Schedule, ScheduleError> {
        let all: BTreeSet<StmtId> = self.program.statements.handles().collect();
        let residual = self.schedule(all)?;
        if !residual.is_empty() {
            return Err(self.unschedulable(&residual));
        }
        self.instructions.push(Instruction::Return);

        let schedule = Schedule {
            instructions: self.instructions,
        };
        log::debug!(
            "scheduled {} statements in {} loop openings (max depth {})",
            schedule.statement_count(),
            schedule.loop_count(),
            schedule.max_depth(),
        );
        Ok(schedule)
    }

    fn is_open(&self, l: LoopId) -> bool {
        self.opened_loops.contains(&l)
    }

    /// `d` was emitted and every loop separating it from `s` has closed.
    fn available(&self, d: StmtId, s: StmtId) -> bool {
        self.emitted[d.index()]
            && self.rel.stmt_by_loop[s.index()]
                .get(&d)
                .is_none_or(|loops| loops.is_subset(&self.closed_loop_by_stmt[d.index()]))
    }

    fn deps_available(&self, s: StmtId) -> bool {
        self.rel.stmt_deps[s.index()]
            .iter()
            .all(|&d| self.available(d, s))
    }

    fn in_scope(&self, s: StmtId) -> bool {
        self.rel.loop_deps[s.index()]
            .iter()
            .all(|&l| self.is_open(l))
    }

    fn emittable(&self, s: StmtId) -> bool {
        self.in_scope(s) && self.deps_available(s)
    }

    fn loop_emittable(&self, l: LoopId) -> bool {
        !self.is_open(l)
            && self.rel.group_loop_deps[l.index()]
                .iter()
                .all(|&outer| self.is_open(outer))
    }

    fn emit(&mut self, s: StmtId) {
        log::trace!(
            "emit {s} {} at depth {}",
            self.graph.node_name(self.program, NodeId(s.index() as u32)),
            self.opened_loops.len(),
        );
        self.emitted[s.index()] = true;
        self.closed_loop_by_stmt[s.index()].clear();
        self.instructions.push(Instruction::Statement(s));
    }

    fn open_loop(&mut self, l: LoopId) {
        self.opened_loops.push(l);
        let sym = self.graph.loop_symbol(l).clone();
        self.instructions.push(Instruction::OpenLoop(sym));
    }

    fn close_loop(&mut self, l: LoopId) {
        self.opened_loops.pop();
        let sym = self.graph.loop_symbol(l).clone();
        self.instructions.push(Instruction::CloseLoop(sym));
        for (i, loops) in self.rel.loop_deps.iter().enumerate() {
            if self.emitted[i] && loops.contains(&l) {
                self.closed_loop_by_stmt[i].insert(l);
            }
        }
    }

    /// Places as many of `pending` as possible under the currently open
    /// loops; returns the statements it could not place.
    fn schedule(
        &mut self,
        mut pending: BTreeSet<StmtId>,
    ) -> Result<BTreeSet<StmtId>, ScheduleError> {
        loop {
            let mut progress = true;
            while progress {
                progress = false;
                let ids: Vec<StmtId> = pending.iter().copied().collect();
                for s in ids {
                    if self.emittable(s) {
                        self.emit(s);
                        pending.remove(&s);
                        progress = true;
                    }
                }
            }

            if pending.is_empty() {
                return Ok(pending);
            }

            let waiting: BTreeSet<StmtId> = pending
                .iter()
                .copied()
                .filter(|&s| self.deps_available(s))
                .collect();
            if waiting.is_empty() {
                return Ok(pending);
            }

            let Some(l) = self.next_loop(&pending, &waiting) else {
                return Err(self.unschedulable(&pending));
            };

            let inner: BTreeSet<StmtId> = pending
                .iter()
                .copied()
                .filter(|s| self.rel.loop_deps[s.index()].contains(&l))
                .collect();

            self.open_loop(l);
            let remaining = self.schedule(inner.clone())?;
            self.close_loop(l);

            if remaining.len() == inner.len() {
                return Err(ScheduleError::NoProgress {
                    symbol: self.graph.loop_symbol(l).clone(),
                });
            }
            for s in inner.difference(&remaining) {
                pending.remove(s);
            }
        }
    }

    /// Chooses the next loop to open.
    ///
    /// Candidates are the openable loops that some waiting statement needs.
    /// Each is scored by the number of waiting statements that need it,
    /// then by the number of pending statements that need it. Loops that a
    /// loop-after-loop hint says should wait for a still-unopened loop are
    /// avoided unless every candidate is constrained. Ties go to the first
    /// candidate discovered.
    fn next_loop(&self, pending: &BTreeSet<StmtId>, waiting: &BTreeSet<StmtId>) -> Option<LoopId> {
        let mut scores: IndexMap<LoopId, (usize, usize)> = IndexMap::new();
        for &s in waiting {
            for &l in &self.rel.loop_deps[s.index()] {
                if self.loop_emittable(l) {
                    scores.entry(l).or_default().0 += 1;
                }
            }
        }
        if scores.is_empty() {
            return None;
        }
        for (l, score) in scores.iter_mut() {
            score.1 = pending
                .iter()
                .filter(|s| self.rel.loop_deps[s.index()].contains(l))
                .count();
        }

        let constrained = if self.options.loop_order_hints {
            self.loop_after_loop_constraints(pending)
        } else {
            BTreeSet::new()
        };
        let free: Vec<(LoopId, (usize, usize))> = scores
            .iter()
            .filter(|(l, _)| !constrained.contains(*l))
            .map(|(l, s)| (*l, *s))
            .collect();
        let permitted = if free.is_empty() {
            scores.iter().map(|(l, s)| (*l, *s)).collect()
        } else {
            free
        };

        let mut best: Option<(LoopId, (usize, usize))> = None;
        for (l, score) in permitted {
            if best.is_none_or(|(_, b)| score > b) {
                best = Some((l, score));
            }
        }

        let (l, (primary, secondary)) = best?;
        log::debug!(
            "open loop {} (waiting {primary}, pending {secondary}, {} constrained)",
            self.graph.loop_symbol(l),
            constrained.len(),
        );
        Some(l)
    }

    /// Loops that should not open yet: for a pending pair `(s, d)` with a
    /// hint "open `l1` after `l2`", `l1` is constrained while `l2` has not
    /// been opened.
    fn loop_after_loop_constraints(&self, pending: &BTreeSet<StmtId>) -> BTreeSet<LoopId> {
        let mut constrained = BTreeSet::new();
        for &s in pending {
            for (d, hints) in &self.rel.loop_after_loop[s.index()] {
                if !pending.contains(d) {
                    continue;
                }
                for (&l1, after) in hints {
                    if !self.is_open(l1) && after.iter().any(|&l2| !self.is_open(l2)) {
                        constrained.insert(l1);
                    }
                }
            }
        }
        constrained
    }

    /// Diagnoses every statement in `pending`, not only the waiting ones.
    fn unschedulable(&self, pending: &BTreeSet<StmtId>) -> ScheduleError {
        let stuck = pending.iter().map(|&s| self.diagnose(s)).collect();
        ScheduleError::Unschedulable { stuck }
    }

    fn diagnose(&self, s: StmtId) -> StuckStatement {
        let name = |id: StmtId| self.graph.node_name(self.program, NodeId(id.index() as u32));
        let mut missing = Vec::new();
        let mut unclosed = Vec::new();
        for &d in &self.rel.stmt_deps[s.index()] {
            if !self.emitted[d.index()] {
                missing.push(name(d));
            } else if let Some(loops) = self.rel.stmt_by_loop[s.index()].get(&d) {
                let open: Vec<_> = loops
                    .difference(&self.closed_loop_by_stmt[d.index()])
                    .map(|&l| self.graph.loop_symbol(l).clone())
                    .collect();
                if !open.is_empty() {
                    unclosed.push((name(d), open));
                }
            }
        }
        let out_of_scope = self.rel.loop_deps[s.index()]
            .iter()
            .filter(|&&l| !self.is_open(l))
            .map(|&l| self.graph.loop_symbol(l).clone())
            .collect();
        StuckStatement {
            id: s,
            name: name(s),
            missing,
            unclosed,
            out_of_scope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhyme_ir::{AssignOp, Expr, Handle, ProgramBuilder, Symbol};

    #[test]
    fn unschedulable_lists_blocked_statements_too() {
        let mut b = ProgramBuilder::new();
        b.generator("*A", Expr::Input);
        b.assign("t0", vec![], AssignOp::Add, Expr::Input.get(Expr::var("*A")));
        b.assign("t1", vec![], AssignOp::Assign, Expr::tmp("t0"));
        let p = b.finish(Expr::tmp("t1"));
        let graph = DependencyGraph::build(&p).unwrap();
        let options = ScheduleOptions::default();
        let ctx = CompilationContext::new(&p, &graph, &options);

        let all: BTreeSet<StmtId> = p.statements.handles().collect();
        let ScheduleError::Unschedulable { stuck } = ctx.unschedulable(&all) else {
            panic!("expected Unschedulable");
        };
        assert_eq!(stuck.len(), 2);
        assert_eq!(stuck[0].id, Handle::new(0));
        assert_eq!(stuck[0].out_of_scope, vec![Symbol::new("*A")]);
        assert!(stuck[0].missing.is_empty());
        assert_eq!(stuck[1].id, Handle::new(1));
        assert_eq!(stuck[1].missing.len(), 1);
    }
}
