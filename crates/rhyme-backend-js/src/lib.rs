//! JavaScript backend for Rhyme.
//!
//! Emits a query as the source of a JavaScript arrow function
//! `inp => { ... }` over plain objects and arrays. Loops iterate keys with
//! `for ... in`; guards skip keys missing from their source.

use rhyme_backend_core::{
    Backend, BackendError, BackendOptions, BackendOutput, OutputContent, OutputFile, render,
};
use rhyme_ir::Program;
use rhyme_sched::Schedule;

mod emit;

pub use emit::{JsRenderer, expr, statement};

/// JavaScript closure emitter.
#[derive(Debug)]
pub struct JsBackend;

impl Backend for JsBackend {
    fn name(&self) -> &str {
        "JavaScript"
    }

    fn targets(&self) -> &[&str] {
        &["js", "javascript"]
    }

    fn compile(
        &self,
        program: &Program,
        schedule: &Schedule,
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        let mut renderer = JsRenderer::new(opts);
        render(program, schedule, &mut renderer)?;
        Ok(BackendOutput {
            files: vec![OutputFile {
                name: "query.js".into(),
                content: OutputContent::Text(renderer.finish()),
            }],
            diagnostics: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhyme_ir::{AssignOp, Expr, ProgramBuilder};
    use rhyme_sched::{ScheduleOptions, compile_schedule};

    fn text(output: &BackendOutput) -> &str {
        match &output.files[0].content {
            OutputContent::Text(t) => t,
            _ => panic!("expected text output"),
        }
    }

    #[test]
    fn backend_metadata() {
        assert_eq!(JsBackend.name(), "JavaScript");
        assert!(JsBackend.targets().contains(&"js"));
    }

    #[test]
    fn compile_nested_sum_per_key() {
        let mut b = ProgramBuilder::new();
        b.generator("*K", Expr::Input.field("data"));
        b.generator("*D", Expr::Input.field("data").get(Expr::var("*K")));
        b.assign(
            "tmp0",
            vec![Expr::var("*K")],
            AssignOp::Init,
            Expr::constant(0),
        );
        b.assign(
            "tmp0",
            vec![Expr::var("*K")],
            AssignOp::Add,
            Expr::Input
                .field("data")
                .get(Expr::var("*K"))
                .get(Expr::var("*D")),
        );
        let p = b.finish(Expr::tmp("tmp0"));
        let (_, s) = compile_schedule(&p, &ScheduleOptions::default()).unwrap();
        let out = JsBackend
            .compile(&p, &s, &BackendOptions::default())
            .unwrap();
        assert_eq!(out.files[0].name, "query.js");
        assert_eq!(
            text(&out),
            "inp => {\n\
             \x20 let tmp = {}\n\
             \x20 for (let x_K in inp.data) {\n\
             \x20   (tmp.tmp0 ??= {})[x_K] ??= 0\n\
             \x20   for (let x_D in inp.data[x_K]) {\n\
             \x20     (tmp.tmp0 ??= {})[x_K] += inp.data[x_K][x_D]\n\
             \x20   }\n\
             \x20 }\n\
             \x20 return tmp.tmp0\n\
             }\n"
        );
    }

    #[test]
    fn guards_and_annotations() {
        let mut b = ProgramBuilder::new();
        b.generator("*A", Expr::Input.field("a"));
        b.generator("*A", Expr::Input.field("b"));
        b.assign(
            "tmp0",
            vec![Expr::var("*A")],
            AssignOp::Assign,
            Expr::Input.field("b").get(Expr::var("*A")),
        );
        let p = b.finish(Expr::tmp("tmp0"));
        let (_, s) = compile_schedule(&p, &ScheduleOptions::default()).unwrap();
        let opts = BackendOptions {
            annotate: true,
            indent_width: 4,
        };
        let out = JsBackend.compile(&p, &s, &opts).unwrap();
        let t = text(&out);
        assert!(t.contains("    for (let x_A in inp.a) {\n"));
        assert!(t.contains("        if (inp.b[x_A] === undefined) continue\n"));
        assert!(t.contains("(tmp.tmp0 ??= {})[x_A] = inp.b[x_A] // tmp0 #1 <- *A\n"));
    }
}
