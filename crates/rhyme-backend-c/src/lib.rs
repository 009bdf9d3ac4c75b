//! C backend for Rhyme.
//!
//! Emits a single C function over the external `rhyme.h` runtime, which
//! provides the dynamic value type, hash-map objects and key iteration.
//! Array accumulation and non-numeric constants in value position are not
//! supported by the runtime and are rejected.

use rhyme_backend_core::{
    Backend, BackendError, BackendOptions, BackendOutput, Diagnostic, DiagnosticLevel,
    OutputContent, OutputFile, render,
};
use rhyme_ir::Program;
use rhyme_sched::Schedule;

mod emit;

pub use emit::{CRenderer, expr, statement};

/// C source emitter.
#[derive(Debug)]
pub struct CBackend;

impl Backend for CBackend {
    fn name(&self) -> &str {
        "C"
    }

    fn targets(&self) -> &[&str] {
        &["c"]
    }

    fn compile(
        &self,
        program: &Program,
        schedule: &Schedule,
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        let mut renderer = CRenderer::new("rhyme_query", opts);
        render(program, schedule, &mut renderer)?;

        let mut diagnostics = Vec::new();
        let reopened = schedule.loop_count() - distinct_loops(schedule);
        if reopened > 0 {
            log::info!("{reopened} loop(s) reopened in generated C");
            diagnostics.push(Diagnostic {
                level: DiagnosticLevel::Info,
                message: format!("{reopened} loop(s) are iterated more than once"),
            });
        }

        Ok(BackendOutput {
            files: vec![OutputFile {
                name: "query.c".into(),
                content: OutputContent::Text(renderer.finish()),
            }],
            diagnostics,
        })
    }
}

fn distinct_loops(schedule: &Schedule) -> usize {
    let mut seen = Vec::new();
    for inst in &schedule.instructions {
        if let rhyme_sched::Instruction::OpenLoop(sym) = inst
            && !seen.contains(&sym)
        {
            seen.push(sym);
        }
    }
    seen.len()
}
