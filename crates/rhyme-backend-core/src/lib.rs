#![warn(missing_docs)]
//! Backend trait and plugin architecture for Rhyme.
//!
//! Defines the [`Backend`] trait that all code emitters implement, the
//! [`Renderer`] callbacks they drive over a [`Schedule`], supporting types
//! ([`BackendOptions`], [`BackendOutput`], [`BackendError`]), a
//! [`BackendRegistry`] for CLI dispatch and the all-or-nothing [`compile`]
//! pipeline.

mod render;
mod writer;

pub use render::{Renderer, render};
pub use writer::TextWriter;

use std::fmt::{self, Debug};

use rhyme_analysis::{AnalysisError, DependencyGraph};
use rhyme_ir::Program;
use rhyme_sched::{Schedule, ScheduleError, ScheduleOptions, Violation};

/// A backend that turns a scheduled program into target-specific output.
pub trait Backend: Debug + Send + Sync {
    /// Human-readable name (e.g. "JavaScript").
    fn name(&self) -> &str;

    /// Target identifiers this backend handles (for `--target` dispatch).
    fn targets(&self) -> &[&str];

    /// Compile a scheduled program to backend-specific output.
    fn compile(
        &self,
        program: &Program,
        schedule: &Schedule,
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError>;
}

/// Options passed to a backend during compilation.
#[derive(Clone, Debug)]
pub struct BackendOptions {
    /// Emit a comment with each statement's write symbol, rank and
    /// dependencies.
    pub annotate: bool,
    /// Spaces per nesting level in generated source.
    pub indent_width: usize,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            annotate: false,
            indent_width: 2,
        }
    }
}

impl fmt::Display for BackendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BackendOptions {{ annotate: {}, indent_width: {} }}",
            self.annotate, self.indent_width
        )
    }
}

/// The output produced by a backend.
#[derive(Clone, Debug)]
pub struct BackendOutput {
    /// One or more output files.
    pub files: Vec<OutputFile>,
    /// Non-fatal diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for BackendOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s), {} diagnostic(s)",
            self.files.len(),
            self.diagnostics.len()
        )
    }
}

/// A single output file.
#[derive(Clone, Debug)]
pub struct OutputFile {
    /// Suggested filename (e.g. "query.js", "program.ir").
    pub name: String,
    /// The file content.
    pub content: OutputContent,
}

impl fmt::Display for OutputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Content of an output file.
#[derive(Clone, Debug)]
pub enum OutputContent {
    /// UTF-8 source text.
    Text(String),
    /// A JSON value (query results).
    Json(serde_json::Value),
}

impl OutputContent {
    /// Renders the content as text, pretty-printing JSON.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Json(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
        }
    }
}

impl fmt::Display for OutputContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "Text({} chars)", s.len()),
            Self::Json(v) => write!(f, "Json({})", json_kind(v)),
        }
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// A non-fatal diagnostic message from a backend.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Severity level.
    pub level: DiagnosticLevel,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Severity level for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// A warning that does not prevent compilation.
    Warning,
    /// An informational note.
    Info,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "Warning",
            Self::Info => "Info",
        })
    }
}

/// Errors that can occur during backend compilation.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The program uses a construct this backend cannot render.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// A general backend error.
    #[error("{0}")]
    Other(String),
}

/// Any failure of the [`compile`] pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Invalid IR or a dependency cycle.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    /// The scheduler could not place every statement.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    /// The produced schedule broke one of its guarantees.
    #[error("schedule verification failed: {0}")]
    Verify(#[from] Violation),
    /// The backend could not render the schedule.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Runs the whole pipeline for one program: dependency analysis,
/// scheduling, verification and rendering.
///
/// Compilation is all-or-nothing: the first error aborts it and no partial
/// output is returned.
pub fn compile(
    program: &Program,
    backend: &dyn Backend,
    schedule_opts: &ScheduleOptions,
    opts: &BackendOptions,
) -> Result<BackendOutput, CompileError> {
    let graph = DependencyGraph::build(program)?;
    let schedule = rhyme_sched::schedule(program, &graph, schedule_opts)?;
    schedule.verify(program, &graph)?;
    log::debug!(
        "compiling with backend '{}': {} instructions",
        backend.name(),
        schedule.instructions.len()
    );
    Ok(backend.compile(program, &schedule, opts)?)
}

/// Registry of available backends, used for CLI `--target` dispatch.
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Creates a registry pre-populated with built-in backends.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(Box::new(ScheduleDumpBackend));
        reg
    }

    /// Registers a backend.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.push(backend);
    }

    /// Finds a backend that handles the given target identifier.
    pub fn find(&self, target: &str) -> Option<&dyn Backend> {
        self.backends
            .iter()
            .find(|b| b.targets().contains(&target))
            .map(|b| &**b)
    }

    /// Lists all supported target identifiers.
    pub fn list_targets(&self) -> Vec<&str> {
        self.backends
            .iter()
            .flat_map(|b| b.targets().iter().copied())
            .collect()
    }
}

/// Built-in backend that dumps the IR and its schedule as text.
#[derive(Debug)]
pub struct ScheduleDumpBackend;

impl Backend for ScheduleDumpBackend {
    fn name(&self) -> &str {
        "Schedule Dump"
    }

    fn targets(&self) -> &[&str] {
        &["schedule", "ir"]
    }

    fn compile(
        &self,
        program: &Program,
        schedule: &Schedule,
        _opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        let mut text = rhyme_ir::dump_program(program);
        text.push('\n');
        text.push_str(&rhyme_sched::format_schedule(program, schedule));
        Ok(BackendOutput {
            files: vec![OutputFile {
                name: "program.ir".into(),
                content: OutputContent::Text(text),
            }],
            diagnostics: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhyme_ir::{AssignOp, Expr, ProgramBuilder};

    fn sum_program() -> Program {
        let mut b = ProgramBuilder::new();
        b.generator("*A", Expr::Input);
        b.assign(
            "total",
            vec![],
            AssignOp::Add,
            Expr::Input.get(Expr::var("*A")),
        );
        b.finish(Expr::tmp("total"))
    }

    #[test]
    fn schedule_dump_backend_targets() {
        let backend = ScheduleDumpBackend;
        assert_eq!(backend.name(), "Schedule Dump");
        assert!(backend.targets().contains(&"schedule"));
        assert!(backend.targets().contains(&"ir"));
    }

    #[test]
    fn compile_with_schedule_dump() {
        let output = compile(
            &sum_program(),
            &ScheduleDumpBackend,
            &ScheduleOptions::default(),
            &BackendOptions::default(),
        )
        .unwrap();
        assert_eq!(output.files.len(), 1);
        assert_eq!(output.files[0].name, "program.ir");
        match &output.files[0].content {
            OutputContent::Text(text) => {
                assert!(text.contains("Statements:"));
                assert!(text.contains("=== Schedule (1 statements, 1 loops, depth 1) ==="));
            }
            _ => panic!("expected text output"),
        }
    }

    #[test]
    fn compile_rejects_cycles() {
        let mut b = ProgramBuilder::new();
        b.assign("t0", vec![], AssignOp::Assign, Expr::tmp("t1"));
        b.assign("t1", vec![], AssignOp::Assign, Expr::tmp("t0"));
        let p = b.finish(Expr::tmp("t0"));
        let err = compile(
            &p,
            &ScheduleDumpBackend,
            &ScheduleOptions::default(),
            &BackendOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Analysis(AnalysisError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn backend_errors_propagate_unchanged() {
        #[derive(Debug)]
        struct Refusing;
        impl Backend for Refusing {
            fn name(&self) -> &str {
                "refusing"
            }
            fn targets(&self) -> &[&str] {
                &["refuse"]
            }
            fn compile(
                &self,
                _program: &Program,
                _schedule: &Schedule,
                _opts: &BackendOptions,
            ) -> Result<BackendOutput, BackendError> {
                Err(BackendError::Unsupported("push".into()))
            }
        }

        let err = compile(
            &sum_program(),
            &Refusing,
            &ScheduleOptions::default(),
            &BackendOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "unsupported: push");
    }

    #[test]
    fn registry_find_builtin() {
        let reg = BackendRegistry::with_builtins();
        assert!(reg.find("schedule").is_some());
        assert!(reg.find("ir").is_some());
        assert!(reg.find("nonexistent").is_none());
    }

    #[test]
    fn registry_list_targets() {
        let reg = BackendRegistry::with_builtins();
        assert_eq!(reg.list_targets(), ["schedule", "ir"]);
    }

    #[test]
    fn registry_default_is_empty() {
        let reg = BackendRegistry::default();
        assert!(reg.list_targets().is_empty());
    }

    #[test]
    fn display_backend_options() {
        let opts = BackendOptions {
            annotate: true,
            indent_width: 4,
        };
        assert_eq!(
            format!("{opts}"),
            "BackendOptions { annotate: true, indent_width: 4 }"
        );
    }

    #[test]
    fn display_backend_output() {
        let output = BackendOutput {
            files: vec![
                OutputFile {
                    name: "query.js".into(),
                    content: OutputContent::Text("inp => 1".into()),
                },
                OutputFile {
                    name: "result.json".into(),
                    content: OutputContent::Json(serde_json::json!({ "a": 1 })),
                },
            ],
            diagnostics: vec![Diagnostic {
                level: DiagnosticLevel::Info,
                message: "done".into(),
            }],
        };
        assert_eq!(format!("{output}"), "2 file(s), 1 diagnostic(s)");
        assert_eq!(format!("{}", output.files[0]), "query.js");
        assert_eq!(format!("{}", output.files[1].content), "Json(object)");
        assert_eq!(output.files[1].content.to_text(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn display_diagnostic() {
        let warn = Diagnostic {
            level: DiagnosticLevel::Warning,
            message: "loop reopened".into(),
        };
        assert_eq!(format!("{warn}"), "[Warning] loop reopened");
    }

    #[test]
    fn backend_error_display() {
        let e1 = BackendError::Unsupported("push".into());
        assert_eq!(format!("{e1}"), "unsupported: push");
        let e2 = BackendError::Other("internal failure".into());
        assert_eq!(format!("{e2}"), "internal failure");
    }
}
