//! The scheduled instruction stream.

use std::fmt;

use rhyme_ir::{Program, StmtId, Symbol};

/// One step of a scheduled program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Open the loop of a generator group (header plus guards).
    OpenLoop(Symbol),
    /// Emit a statement inside the currently open loops.
    Statement(StmtId),
    /// Close the innermost open loop.
    CloseLoop(Symbol),
    /// Return the program result. Always last.
    Return,
}

/// A complete schedule: a properly nested stream of loops and statements.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schedule {
    pub instructions: Vec<Instruction>,
}

impl Schedule {
    /// Returns the number of emitted statements.
    pub fn statement_count(&self) -> usize {
        self.statements().count()
    }

    /// Returns the number of loop openings (a reopened loop counts twice).
    pub fn loop_count(&self) -> usize {
        self.instructions
            .iter()
            .filter(|i| matches!(i, Instruction::OpenLoop(_)))
            .count()
    }

    /// Returns the deepest loop nesting reached.
    pub fn max_depth(&self) -> usize {
        let mut depth = 0usize;
        let mut max = 0;
        for inst in &self.instructions {
            match inst {
                Instruction::OpenLoop(_) => {
                    depth += 1;
                    max = max.max(depth);
                }
                Instruction::CloseLoop(_) => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        max
    }

    /// Statements in emission order.
    pub fn statements(&self) -> impl Iterator<Item = StmtId> + '_ {
        self.instructions.iter().filter_map(|i| match i {
            Instruction::Statement(s) => Some(*s),
            _ => None,
        })
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0usize;
        for inst in &self.instructions {
            if matches!(inst, Instruction::CloseLoop(_)) {
                depth = depth.saturating_sub(1);
            }
            write!(f, "{:width$}", "", width = depth * 2)?;
            match inst {
                Instruction::OpenLoop(sym) => {
                    writeln!(f, "open {sym}")?;
                    depth += 1;
                }
                Instruction::Statement(s) => writeln!(f, "{s}")?,
                Instruction::CloseLoop(sym) => writeln!(f, "close {sym}")?,
                Instruction::Return => writeln!(f, "return")?,
            }
        }
        Ok(())
    }
}

/// Format a schedule for human-readable output (used by `--emit-schedule`).
pub fn format_schedule(program: &Program, schedule: &Schedule) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== Schedule ({} statements, {} loops, depth {}) ===\n",
        schedule.statement_count(),
        schedule.loop_count(),
        schedule.max_depth(),
    ));

    let mut depth = 0usize;
    for inst in &schedule.instructions {
        if matches!(inst, Instruction::CloseLoop(_)) {
            depth = depth.saturating_sub(1);
        }
        let indent = "  ".repeat(depth);
        match inst {
            Instruction::OpenLoop(sym) => {
                match program.generator_group(sym) {
                    Some(group) => {
                        out.push_str(&format!("{indent}{}\n", group.iterate));
                        for g in &group.guards {
                            out.push_str(&format!("{indent}  {g}\n"));
                        }
                    }
                    None => out.push_str(&format!("{indent}for {sym}\n")),
                }
                depth += 1;
            }
            Instruction::Statement(id) => match program.statements.try_get(*id) {
                Some(stmt) => out.push_str(&format!("{indent}{id}: {stmt}\n")),
                None => out.push_str(&format!("{indent}{id}: <missing>\n")),
            },
            Instruction::CloseLoop(sym) => out.push_str(&format!("{indent}end {sym}\n")),
            Instruction::Return => out.push_str(&format!("{indent}return {}\n", program.result)),
        }
    }

    out
}
