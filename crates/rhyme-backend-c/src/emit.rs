//! C source emission against the `rhyme.h` runtime.
//!
//! Runtime API assumed by the generated code:
//!
//! ```c
//! rh_value *rh_object(void);
//! rh_value *rh_num(double);
//! rh_value *rh_get(rh_value *base, rh_value *key);
//! rh_value *rh_get_field(rh_value *base, const char *name);
//! rh_value **rh_field(rh_value *obj, const char *name);   /* creates */
//! rh_value **rh_at(rh_value **slot, rh_value *key);       /* creates */
//! int rh_is_undefined(rh_value *);
//! rh_iter rh_keys(rh_value *); int rh_next(rh_iter *); rh_value *rh_key(rh_iter *);
//! void rh_init(rh_value **, rh_value *);  void rh_assign(rh_value **, rh_value *);
//! void rh_accum_add(rh_value **, rh_value *);
//! void rh_accum_max(rh_value **, rh_value *);
//! void rh_accum_min(rh_value **, rh_value *);
//! void rh_accum_count(rh_value **, rh_value *);   /* +1 unless undefined */
//! rh_value *rh_plus(rh_value *, rh_value *);  /* likewise rh_minus, ... */
//! ```

use rhyme_backend_core::{BackendError, BackendOptions, Renderer, TextWriter};
use rhyme_ir::{AssignOp, BinaryOp, Expr, GeneratorGroup, Statement, StmtId, Symbol};

fn c_string(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}

fn binary_fn(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "rh_plus",
        BinaryOp::Sub => "rh_minus",
        BinaryOp::Mul => "rh_times",
        BinaryOp::Div => "rh_div",
        BinaryOp::Eq => "rh_eq",
        BinaryOp::Lt => "rh_lt",
        BinaryOp::And => "rh_and",
        BinaryOp::Or => "rh_or",
    }
}

/// Renders an expression as a C expression of type `rh_value *`.
pub fn expr(e: &Expr) -> Result<String, BackendError> {
    Ok(match e {
        Expr::Input => "inp".into(),
        Expr::Var(s) => s.to_identifier(),
        Expr::Tmp(s) => format!("rh_get_field(tmp, {})", c_string(s.as_str())),
        Expr::Const(serde_json::Value::Number(n)) => format!("rh_num({n})"),
        Expr::Const(v) => {
            return Err(BackendError::Unsupported(format!(
                "constant {v} in value position"
            )));
        }
        Expr::Get(base, key) => match key.as_ref() {
            Expr::Const(serde_json::Value::String(name)) => {
                format!("rh_get_field({}, {})", expr(base)?, c_string(name))
            }
            key => format!("rh_get({}, {})", expr(base)?, expr(key)?),
        },
        Expr::Binary(op, lhs, rhs) => {
            format!("{}({}, {})", binary_fn(*op), expr(lhs)?, expr(rhs)?)
        }
    })
}

/// The `rh_value **` slot a statement writes.
fn slot(write: &Symbol, path: &[Expr]) -> Result<String, BackendError> {
    let mut out = format!("rh_field(tmp, {})", c_string(write.as_str()));
    for key in path {
        out = format!("rh_at({out}, {})", expr(key)?);
    }
    Ok(out)
}

/// Renders a statement as one C statement.
pub fn statement(stmt: &Statement) -> Result<String, BackendError> {
    let f = match stmt.op {
        AssignOp::Init => "rh_init",
        AssignOp::Assign => "rh_assign",
        AssignOp::Add => "rh_accum_add",
        AssignOp::Max => "rh_accum_max",
        AssignOp::Min => "rh_accum_min",
        AssignOp::Count => "rh_accum_count",
        AssignOp::Push => {
            return Err(BackendError::Unsupported(format!(
                "array accumulation into '{}'",
                stmt.write
            )));
        }
    };
    Ok(format!(
        "{f}({}, {});",
        slot(&stmt.write, &stmt.path)?,
        expr(&stmt.value)?
    ))
}

/// Builds a C function `rh_value *<name>(rh_value *inp)`.
pub struct CRenderer {
    out: TextWriter,
    annotate: bool,
}

impl CRenderer {
    pub fn new(function: &str, opts: &BackendOptions) -> Self {
        let mut out = TextWriter::new(opts.indent_width);
        out.line("#include \"rhyme.h\"");
        out.line("");
        out.line(&format!("rh_value *{function}(rh_value *inp) {{"));
        out.indent();
        out.line("rh_value *tmp = rh_object();");
        Self {
            out,
            annotate: opts.annotate,
        }
    }

    /// Closes the function and returns the translation unit.
    pub fn finish(mut self) -> String {
        self.out.dedent();
        self.out.line("}");
        self.out.finish()
    }
}

impl Renderer for CRenderer {
    fn render_statement(&mut self, id: StmtId, stmt: &Statement) -> Result<(), BackendError> {
        let mut line = statement(stmt)?;
        if self.annotate {
            line.push_str(&format!(" /* {id}: {} #{} */", stmt.write, stmt.write_rank));
        }
        self.out.line(&line);
        Ok(())
    }

    fn render_loop_open(&mut self, group: &GeneratorGroup<'_>) -> Result<(), BackendError> {
        let var = group.symbol.to_identifier();
        self.out.line(&format!(
            "for (rh_iter it_{var} = rh_keys({}); rh_next(&it_{var});) {{",
            expr(&group.iterate.source)?
        ));
        self.out.indent();
        self.out.line(&format!("rh_value *{var} = rh_key(&it_{var});"));
        for guard in &group.guards {
            self.out.line(&format!(
                "if (rh_is_undefined(rh_get({}, {var}))) continue;",
                expr(&guard.source)?
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
        self.out.line(&format!("return {};", expr(result)?));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_access_uses_string_keys() {
        let e = Expr::Input.field("data").get(Expr::var("*A")).field("value");
        assert_eq!(
            expr(&e).unwrap(),
            "rh_get_field(rh_get(rh_get_field(inp, \"data\"), x_A), \"value\")"
        );
    }

    #[test]
    fn arithmetic_calls_runtime() {
        let e = Expr::tmp("t0").binary(BinaryOp::Div, Expr::constant(2));
        assert_eq!(
            expr(&e).unwrap(),
            "rh_div(rh_get_field(tmp, \"t0\"), rh_num(2))"
        );
    }

    #[test]
    fn non_numeric_constants_are_unsupported() {
        let err = expr(&Expr::constant("x")).unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));
    }

    #[test]
    fn count_calls_runtime() {
        let stmt = Statement {
            write: "n".into(),
            deps: Default::default(),
            write_rank: 1,
            path: vec![Expr::var("*K")],
            op: AssignOp::Count,
            value: Expr::Input.get(Expr::var("*K")),
        };
        assert_eq!(
            statement(&stmt).unwrap(),
            "rh_accum_count(rh_at(rh_field(tmp, \"n\"), x_K), rh_get(inp, x_K));"
        );
    }

    #[test]
    fn push_is_unsupported() {
        let stmt = Statement {
            write: "t0".into(),
            deps: Default::default(),
            write_rank: 1,
            path: vec![],
            op: AssignOp::Push,
            value: Expr::constant(1),
        };
        assert_eq!(
            statement(&stmt).unwrap_err().to_string(),
            "unsupported: array accumulation into 't0'"
        );
    }
}
