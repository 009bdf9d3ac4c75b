use rhyme_backend_core::{Backend, BackendOptions, BackendOutput, CompileError, OutputContent};
use rhyme_backend_eval::EvalBackend;
use rhyme_ir::{AssignOp, BinaryOp, Expr, Program, ProgramBuilder};
use rhyme_sched::ScheduleOptions;
use serde_json::{Value, json};

/// Run the whole pipeline with default options.
#[allow(dead_code)]
pub fn try_compile(program: &Program, backend: &dyn Backend) -> Result<BackendOutput, CompileError> {
    rhyme_backend_core::compile(
        program,
        backend,
        &ScheduleOptions::default(),
        &BackendOptions::default(),
    )
}

/// Run the whole pipeline, panicking on failure.
#[allow(dead_code)]
pub fn compile(program: &Program, backend: &dyn Backend) -> BackendOutput {
    try_compile(program, backend).expect("compilation failed")
}

/// Evaluate `program` against `input`.
#[allow(dead_code)]
pub fn eval(program: &Program, input: Value) -> Value {
    let output = compile(program, &EvalBackend::new(input));
    match &output.files[0].content {
        OutputContent::Json(v) => v.clone(),
        other => panic!("expected JSON output, got {other}"),
    }
}

/// Text of the first output file.
#[allow(dead_code)]
pub fn first_text(output: &BackendOutput) -> &str {
    match &output.files[0].content {
        OutputContent::Text(text) => text,
        other => panic!("expected text output, got {other}"),
    }
}

/// A small sales table: `{ data: [{ key, value }, ...] }`.
#[allow(dead_code)]
pub fn sales() -> Value {
    json!({
        "data": [
            { "key": "A", "value": 10 },
            { "key": "B", "value": 30 },
            { "key": "A", "value": 60 },
        ]
    })
}

/// `inp.data[*A]`
#[allow(dead_code)]
pub fn item() -> Expr {
    Expr::Input.field("data").get(Expr::var("*A"))
}

/// `{ data.*A.key: <op>(value) }`, initialized to `init` when given.
#[allow(dead_code)]
pub fn group_by(op: AssignOp, init: Option<i64>, value: Expr) -> Program {
    let mut b = ProgramBuilder::new();
    b.generator("*A", Expr::Input.field("data"));
    let key = item().field("key");
    if let Some(init) = init {
        b.assign("tmp0", vec![key.clone()], AssignOp::Init, Expr::constant(init));
    }
    b.assign("tmp0", vec![key], op, value);
    b.finish(Expr::tmp("tmp0"))
}

/// Each group's share of the grand total, in percent.
///
/// The total runs over its own loop `*B`, and the result iterates the
/// keys of the per-group sums through `*K`.
#[allow(dead_code)]
pub fn percent_by_key() -> Program {
    let mut b = ProgramBuilder::new();
    let sums = b.fresh_tmp();
    let total = b.fresh_tmp();
    let share = b.fresh_tmp();
    b.generator("*A", Expr::Input.field("data"));
    b.generator("*B", Expr::Input.field("data"));
    b.generator("*K", Expr::Tmp(sums.clone()));
    b.assign(
        sums.clone(),
        vec![item().field("key")],
        AssignOp::Add,
        item().field("value"),
    );
    b.assign(
        total.clone(),
        vec![],
        AssignOp::Add,
        Expr::Input.field("data").get(Expr::var("*B")).field("value"),
    );
    b.assign(
        share.clone(),
        vec![Expr::var("*K")],
        AssignOp::Assign,
        Expr::Tmp(sums)
            .get(Expr::var("*K"))
            .binary(BinaryOp::Mul, Expr::constant(100))
            .binary(BinaryOp::Div, Expr::Tmp(total)),
    );
    b.finish(Expr::Tmp(share))
}

/// `{ a.*A: a.*A * 100 / sum(b.*B * sum(a.*A)) }`: the `*A` loop has to
/// run again after the `*B` loop that reads its total.
#[allow(dead_code)]
pub fn share_of_weighted_total() -> Program {
    let mut b = ProgramBuilder::new();
    b.generator("*A", Expr::Input.field("a"));
    b.generator("*B", Expr::Input.field("b"));
    let a = Expr::Input.field("a").get(Expr::var("*A"));
    b.assign("tmp0", vec![], AssignOp::Add, a.clone());
    b.assign(
        "tmp1",
        vec![],
        AssignOp::Add,
        Expr::Input
            .field("b")
            .get(Expr::var("*B"))
            .binary(BinaryOp::Mul, Expr::tmp("tmp0")),
    );
    b.assign(
        "tmp2",
        vec![Expr::var("*A")],
        AssignOp::Assign,
        a.binary(BinaryOp::Mul, Expr::constant(100))
            .binary(BinaryOp::Div, Expr::tmp("tmp1")),
    );
    b.finish(Expr::tmp("tmp2"))
}
