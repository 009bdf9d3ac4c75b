//! Display implementations and text dump for debugging.

use std::fmt;

use crate::Program;
use crate::expr::Expr;
use crate::generator::{Generator, GeneratorRole};
use crate::stmt::{AssignOp, Statement};

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "inp"),
            Self::Var(s) | Self::Tmp(s) => write!(f, "{s}"),
            Self::Const(v) => write!(f, "{v}"),
            Self::Get(base, key) => match key.as_ref() {
                Self::Const(serde_json::Value::String(name)) if is_identifier(name) => {
                    write!(f, "{base}.{name}")
                }
                key => write!(f, "{base}[{key}]"),
            },
            Self::Binary(op, lhs, rhs) => write!(f, "({lhs} {} {rhs})", op.symbol()),
        }
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "??=",
            Self::Assign => "=",
            Self::Add => "+=",
            Self::Max => "max=",
            Self::Min => "min=",
            Self::Count => "count=",
            Self::Push => "push",
        })
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.write)?;
        for key in &self.path {
            write!(f, "[{key}]")?;
        }
        write!(f, " {} {}", self.op, self.value)
    }
}

impl fmt::Display for GeneratorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Iterate => "iterate",
            Self::Guard => "guard",
        })
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            GeneratorRole::Iterate => write!(f, "for {} <- {}", self.symbol, self.source),
            GeneratorRole::Guard => write!(f, "if {} in {}", self.symbol, self.source),
        }
    }
}

/// Dump a whole program as text.
///
/// Each statement is followed by its write symbol, rank and dependencies:
///
/// ```text
/// tmp0 += inp.data[*A].value  // tmp0 #2 <- *A
/// ```
pub fn dump_program(program: &Program) -> String {
    let mut out = String::new();

    out.push_str("Generators:\n");
    for g in &program.generators {
        out.push_str(&format!("  {g}"));
        if !g.deps.is_empty() {
            out.push_str(&format!("  // <- {}", join(g.deps.iter())));
        }
        out.push('\n');
    }

    out.push_str("Statements:\n");
    for (id, s) in program.statements.iter() {
        out.push_str(&format!(
            "  {id}: {s}  // {} #{} <- {}\n",
            s.write,
            s.write_rank,
            join(s.deps.iter())
        ));
    }

    out.push_str(&format!("Result: {}\n", program.result));
    out
}

fn join<T: fmt::Display>(items: impl Iterator<Item = T>) -> String {
    items.map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}
