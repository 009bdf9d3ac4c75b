use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rhyme_analysis::DependencyGraph;
use rhyme_backend_core::{BackendOptions, BackendRegistry, OutputContent};
use rhyme_ir::Program;
use rhyme_sched::ScheduleOptions;

/// Rhyme: loop-fusing compiler for JSON analytics queries
#[derive(Parser)]
#[command(name = "rhyme", version, about)]
struct Cli {
    /// Input program (JSON IR)
    input: PathBuf,

    /// Target backend (default: js, or eval when --data is given)
    #[arg(short, long)]
    target: Option<String>,

    /// JSON input document for the eval target
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Output path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dump IR to stderr
    #[arg(long)]
    emit_ir: bool,

    /// Dump dependency relations to stderr
    #[arg(long)]
    emit_deps: bool,

    /// Dump the schedule to stderr
    #[arg(long)]
    emit_schedule: bool,

    /// Choose loops by score alone, ignoring loop-after-loop hints
    #[arg(long)]
    no_loop_hints: bool,

    /// Annotate generated code with statement ids
    #[arg(long)]
    annotate: bool,

    /// Indentation width of generated code
    #[arg(long, default_value_t = 2)]
    indent: usize,

    /// Analyze and schedule without producing output
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> miette::Result<T> {
    let text = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text)
        .into_diagnostic()
        .wrap_err_with(|| format!("invalid {what} in {}", path.display()))
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    // 1. Load the program.
    let program: Program = read_json(&cli.input, "program")?;
    if cli.emit_ir {
        eprintln!("{}", rhyme_ir::dump_program(&program));
    }

    // 2. Dependency analysis.
    let graph = DependencyGraph::build(&program)
        .into_diagnostic()
        .wrap_err("dependency analysis failed")?;
    if cli.emit_deps {
        eprintln!("{}", rhyme_analysis::format_relations(&program, &graph));
    }

    // 3. Schedule and check it.
    let schedule_opts = ScheduleOptions {
        loop_order_hints: !cli.no_loop_hints,
    };
    let schedule = rhyme_sched::schedule(&program, &graph, &schedule_opts)
        .into_diagnostic()
        .wrap_err("scheduling failed")?;
    schedule
        .verify(&program, &graph)
        .into_diagnostic()
        .wrap_err("schedule verification failed")?;
    if cli.emit_schedule {
        eprintln!("{}", rhyme_sched::format_schedule(&program, &schedule));
    }

    // 4. Dry-run: stop here.
    if cli.dry_run {
        return Ok(());
    }

    // 5. Backend dispatch.
    let data = match &cli.data {
        Some(path) => Some(read_json::<serde_json::Value>(path, "data")?),
        None => None,
    };
    let target = match (&cli.target, &data) {
        (Some(t), _) => t.as_str(),
        (None, Some(_)) => "eval",
        (None, None) => "js",
    };
    if target == "eval" && data.is_none() {
        return Err(miette::miette!("target 'eval' requires --data"));
    }

    let mut registry = BackendRegistry::with_builtins();
    registry.register(Box::new(rhyme_backend_js::JsBackend));
    registry.register(Box::new(rhyme_backend_c::CBackend));
    registry.register(Box::new(rhyme_backend_eval::EvalBackend::new(
        data.unwrap_or_default(),
    )));
    let backend = registry.find(target).ok_or_else(|| {
        let available = registry.list_targets().join(", ");
        miette::miette!("unknown target '{}' (available: {})", target, available)
    })?;
    log::info!("compiling {} with '{}'", cli.input.display(), backend.name());

    let opts = BackendOptions {
        annotate: cli.annotate,
        indent_width: cli.indent,
    };
    let output = backend
        .compile(&program, &schedule, &opts)
        .into_diagnostic()
        .wrap_err("backend compilation failed")?;

    // 6. Print diagnostics.
    for diag in &output.diagnostics {
        eprintln!("{diag}");
    }

    // 7. Write output.
    for file in &output.files {
        let text = match &file.content {
            OutputContent::Text(text) => text.clone(),
            OutputContent::Json(_) => format!("{}\n", file.content.to_text()),
        };
        match &cli.output {
            Some(path) => std::fs::write(path, text)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to write {}", path.display()))?,
            None => print!("{text}"),
        }
    }

    Ok(())
}
