//! Loop-fusion scheduling for the Rhyme IR.
//!
//! Takes a dependency-annotated [`Program`] and its [`DependencyGraph`] and
//! produces a [`Schedule`]: a properly nested stream of loop openings,
//! statements and loop closings in which
//!
//! - every statement appears exactly once,
//! - each statement sits inside exactly the loops it needs,
//! - aggregates are fully materialized before unrelated consumers read
//!   them, and
//! - statements sharing a loop variable share one physical loop when their
//!   dependencies allow it.
//!
//! Scheduling is deterministic: the same program always yields the same
//! instruction stream.

mod context;
mod error;
mod schedule;
mod verify;

pub use context::CompilationContext;
pub use error::{ScheduleError, StuckStatement};
pub use schedule::{Instruction, Schedule, format_schedule};
pub use verify::Violation;

use rhyme_analysis::DependencyGraph;
use rhyme_ir::Program;

/// Scheduler settings.
#[derive(Clone, Debug)]
pub struct ScheduleOptions {
    /// Use loop-after-loop hints to avoid reopening loops. When disabled,
    /// the next loop is chosen by score alone.
    pub loop_order_hints: bool,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            loop_order_hints: true,
        }
    }
}

/// Schedules `program` using a previously built dependency graph.
pub fn schedule(
    program: &Program,
    graph: &DependencyGraph,
    options: &ScheduleOptions,
) -> Result<Schedule, ScheduleError> {
    CompilationContext::new(program, graph, options).run()
}

/// Convenience function: build the dependency graph and schedule a program.
pub fn compile_schedule(
    program: &Program,
    options: &ScheduleOptions,
) -> Result<(DependencyGraph, Schedule), ScheduleError> {
    let graph = DependencyGraph::build(program)?;
    let schedule = schedule(program, &graph, options)?;
    Ok((graph, schedule))
}
