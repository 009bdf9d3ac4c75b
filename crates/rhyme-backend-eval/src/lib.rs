//! Evaluator backend for Rhyme.
//!
//! Instead of emitting source, builds an executable loop tree from the
//! schedule and runs it in process against a JSON input document. Used by
//! the CLI's `--data` mode and by the end-to-end tests as the reference
//! semantics.

use rhyme_backend_core::{
    Backend, BackendError, BackendOptions, BackendOutput, OutputContent, OutputFile, render,
};
use rhyme_ir::{Program, Symbol};
use rhyme_sched::Schedule;
use serde_json::Value;

mod query;
pub mod value;

pub use query::{Query, QueryBuilder};

/// Runtime failure while evaluating a query.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("cannot iterate over {0}")]
    NotIterable(String),

    #[error("invalid key {0}")]
    InvalidKey(String),

    #[error("cannot apply '{op}' to {lhs} and {rhs}")]
    Type {
        op: &'static str,
        lhs: String,
        rhs: String,
    },

    #[error("loop variable '{0}' is not bound")]
    UnboundVariable(Symbol),

    #[error("'{write}' holds {found}, not an object")]
    NotAnObject { write: Symbol, found: String },

    #[error("'{write}' holds {found}, not an array")]
    NotAnArray { write: Symbol, found: String },
}

impl From<EvalError> for BackendError {
    fn from(e: EvalError) -> Self {
        BackendError::Other(format!("evaluation failed: {e}"))
    }
}

/// Builds the executable query for a scheduled program.
pub fn build_query(program: &Program, schedule: &Schedule) -> Result<Query, BackendError> {
    let mut builder = QueryBuilder::new();
    render(program, schedule, &mut builder)?;
    builder.finish()
}

/// Evaluates the query against a fixed input document.
#[derive(Debug, Default)]
pub struct EvalBackend {
    input: Value,
}

impl EvalBackend {
    pub fn new(input: Value) -> Self {
        Self { input }
    }
}

impl Backend for EvalBackend {
    fn name(&self) -> &str {
        "Evaluator"
    }

    fn targets(&self) -> &[&str] {
        &["eval"]
    }

    fn compile(
        &self,
        program: &Program,
        schedule: &Schedule,
        _opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        let result = build_query(program, schedule)?.run(&self.input)?;
        Ok(BackendOutput {
            files: vec![OutputFile {
                name: "result.json".into(),
                content: OutputContent::Json(result),
            }],
            diagnostics: vec![],
        })
    }
}
