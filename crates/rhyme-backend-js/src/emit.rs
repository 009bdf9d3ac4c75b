//! JavaScript source emission.

use rhyme_backend_core::{BackendError, BackendOptions, Renderer, TextWriter};
use rhyme_ir::{AssignOp, BinaryOp, Expr, GeneratorGroup, Statement, StmtId, Symbol};

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}

/// Member access `base.name`, or `base["name"]` when `name` is not an
/// identifier.
fn member(base: &str, name: &str) -> String {
    if is_identifier(name) {
        format!("{base}.{name}")
    } else {
        format!("{base}[{}]", js_string(name))
    }
}

fn binary_op(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Eq => "===",
        op => op.symbol(),
    }
}

/// Renders an expression as JavaScript.
pub fn expr(e: &Expr) -> String {
    match e {
        Expr::Input => "inp".into(),
        Expr::Var(s) => s.to_identifier(),
        Expr::Tmp(s) => member("tmp", s.as_str()),
        Expr::Const(v) => v.to_string(),
        Expr::Get(base, key) => match key.as_ref() {
            Expr::Const(serde_json::Value::String(name)) => member(&expr(base), name),
            key => format!("{}[{}]", expr(base), expr(key)),
        },
        Expr::Binary(op, lhs, rhs) => {
            format!("({} {} {})", expr(lhs), binary_op(*op), expr(rhs))
        }
    }
}

/// The storage location a statement writes, creating intermediate
/// objects on the way: `(tmp.t ??= {})[k]`.
fn slot(write: &Symbol, path: &[Expr]) -> String {
    let mut out = member("tmp", write.as_str());
    for key in path {
        out = format!("({out} ??= {{}})[{}]", expr(key));
    }
    out
}

/// Renders a statement as one JavaScript statement.
pub fn statement(stmt: &Statement) -> String {
    let lhs = slot(&stmt.write, &stmt.path);
    let rhs = expr(&stmt.value);
    match stmt.op {
        AssignOp::Init => format!("{lhs} ??= {rhs}"),
        AssignOp::Assign => format!("{lhs} = {rhs}"),
        AssignOp::Add => format!("{lhs} += {rhs}"),
        AssignOp::Max => format!("{lhs} = Math.max({lhs} ?? -Infinity, {rhs})"),
        AssignOp::Min => format!("{lhs} = Math.min({lhs} ?? Infinity, {rhs})"),
        AssignOp::Count => format!("{lhs} = ({lhs} ?? 0) + ({rhs} === undefined ? 0 : 1)"),
        AssignOp::Push => format!("({lhs} ??= []).push({rhs})"),
    }
}

/// Builds the text of an `inp => { ... }` closure.
pub struct JsRenderer {
    out: TextWriter,
    annotate: bool,
}

impl JsRenderer {
    pub fn new(opts: &BackendOptions) -> Self {
        let mut out = TextWriter::new(opts.indent_width);
        out.line("inp => {");
        out.indent();
        out.line("let tmp = {}");
        Self {
            out,
            annotate: opts.annotate,
        }
    }

    /// Closes the function and returns its source.
    pub fn finish(mut self) -> String {
        self.out.dedent();
        self.out.line("}");
        self.out.finish()
    }
}

impl Renderer for JsRenderer {
    fn render_statement(&mut self, _id: StmtId, stmt: &Statement) -> Result<(), BackendError> {
        let mut line = statement(stmt);
        if self.annotate {
            let deps: Vec<&str> = stmt.deps.iter().map(Symbol::as_str).collect();
            line.push_str(&format!(
                " // {} #{} <- {}",
                stmt.write,
                stmt.write_rank,
                deps.join(", ")
            ));
        }
        self.out.line(&line);
        Ok(())
    }

    fn render_loop_open(&mut self, group: &GeneratorGroup<'_>) -> Result<(), BackendError> {
        let var = group.symbol.to_identifier();
        self.out
            .line(&format!("for (let {var} in {}) {{", expr(&group.iterate.source)));
        self.out.indent();
        for guard in &group.guards {
            self.out.line(&format!(
                "if ({}[{var}] === undefined) continue",
                expr(&guard.source)
            ));
        }
        Ok(())
    }

    fn render_loop_close(&mut self, _group: &GeneratorGroup<'_>) -> Result<(), BackendError> {
        self.out.dedent();
        self.out.line("}");
        Ok(())
    }

    fn render_final_return(&mut self, result: &Expr) -> Result<(), BackendError> {
        self.out.line(&format!("return {}", expr(result)));
        Ok(())
    }
}
