//! Renderer callbacks and the driver that feeds them a schedule.

use rhyme_ir::{Expr, GeneratorGroup, Program, Statement, StmtId, Symbol};
use rhyme_sched::{Instruction, Schedule};

use crate::BackendError;

/// Per-target rendering callbacks.
///
/// The driver calls these in schedule order; what a renderer builds
/// (source text, a closure tree) is up to the implementation.
pub trait Renderer {
    /// Renders one statement inside the currently open loops.
    fn render_statement(&mut self, id: StmtId, stmt: &Statement) -> Result<(), BackendError>;

    /// Renders a loop header plus the group's guards.
    fn render_loop_open(&mut self, group: &GeneratorGroup<'_>) -> Result<(), BackendError>;

    /// Renders the end of the innermost loop.
    fn render_loop_close(&mut self, group: &GeneratorGroup<'_>) -> Result<(), BackendError>;

    /// Renders the final result.
    fn render_final_return(&mut self, result: &Expr) -> Result<(), BackendError>;
}

fn group<'a>(program: &'a Program, symbol: &Symbol) -> Result<GeneratorGroup<'a>, BackendError> {
    program
        .generator_group(symbol)
        .ok_or_else(|| BackendError::Other(format!("no generator group for '{symbol}'")))
}

/// Drives `renderer` over every instruction of `schedule`.
pub fn render(
    program: &Program,
    schedule: &Schedule,
    renderer: &mut dyn Renderer,
) -> Result<(), BackendError> {
    for inst in &schedule.instructions {
        match inst {
            Instruction::OpenLoop(sym) => renderer.render_loop_open(&group(program, sym)?)?,
            Instruction::Statement(id) => {
                let stmt = program
                    .statements
                    .try_get(*id)
                    .ok_or_else(|| BackendError::Other(format!("unknown statement {id}")))?;
                renderer.render_statement(*id, stmt)?;
            }
            Instruction::CloseLoop(sym) => renderer.render_loop_close(&group(program, sym)?)?,
            Instruction::Return => renderer.render_final_return(&program.result)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhyme_ir::{AssignOp, ProgramBuilder};
    use rhyme_sched::{ScheduleOptions, compile_schedule};

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Renderer for Recorder {
        fn render_statement(&mut self, id: StmtId, stmt: &Statement) -> Result<(), BackendError> {
            self.events.push(format!("{id} {stmt}"));
            Ok(())
        }

        fn render_loop_open(&mut self, group: &GeneratorGroup<'_>) -> Result<(), BackendError> {
            self.events
                .push(format!("open {} ({} guards)", group.symbol, group.guards.len()));
            Ok(())
        }

        fn render_loop_close(&mut self, group: &GeneratorGroup<'_>) -> Result<(), BackendError> {
            self.events.push(format!("close {}", group.symbol));
            Ok(())
        }

        fn render_final_return(&mut self, result: &Expr) -> Result<(), BackendError> {
            self.events.push(format!("return {result}"));
            Ok(())
        }
    }

    #[test]
    fn callbacks_follow_schedule() {
        let mut b = ProgramBuilder::new();
        b.generator("*A", Expr::Input.field("a"));
        b.generator("*A", Expr::Input.field("b"));
        b.assign(
            "tmp0",
            vec![],
            AssignOp::Add,
            Expr::Input.field("a").get(Expr::var("*A")),
        );
        let p = b.finish(Expr::tmp("tmp0"));
        let (_, s) = compile_schedule(&p, &ScheduleOptions::default()).unwrap();

        let mut rec = Recorder::default();
        render(&p, &s, &mut rec).unwrap();
        assert_eq!(
            rec.events,
            [
                "open *A (1 guards)",
                "#0 tmp0 += inp.a[*A]",
                "close *A",
                "return tmp0",
            ]
        );
    }

    #[test]
    fn unknown_loop_is_an_error() {
        let p = ProgramBuilder::new().finish(Expr::Input);
        let s = Schedule {
            instructions: vec![Instruction::OpenLoop("*Z".into())],
        };
        let err = render(&p, &s, &mut Recorder::default()).unwrap_err();
        assert_eq!(err.to_string(), "no generator group for '*Z'");
    }
}
