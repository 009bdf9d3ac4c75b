//! Expressions: the payload language of statements and generators.
//!
//! The scheduler never looks inside an [`Expr`]; only backends do. The
//! dependency sets stored on statements and generators are derived from
//! [`Expr::free_symbols`] by the [`ProgramBuilder`](crate::ProgramBuilder).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;

/// Binary operators.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    And,
    Or,
}

impl BinaryOp {
    /// Infix spelling shared by the JS and C renderers.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "==",
            Self::Lt => "<",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// A pure expression over the input document, loop variables and
/// accumulators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// The query input document (`inp`).
    Input,
    /// The current key bound by a loop variable.
    Var(Symbol),
    /// The final value of an accumulator.
    Tmp(Symbol),
    /// A JSON constant.
    Const(serde_json::Value),
    /// Field or element selection `base[key]`.
    Get(Box<Expr>, Box<Expr>),
    /// A binary operation.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// `Expr::Var` shorthand.
    pub fn var(name: impl Into<Symbol>) -> Self {
        Self::Var(name.into())
    }

    /// `Expr::Tmp` shorthand.
    pub fn tmp(name: impl Into<Symbol>) -> Self {
        Self::Tmp(name.into())
    }

    /// A constant from anything convertible to JSON.
    pub fn constant(value: impl Into<serde_json::Value>) -> Self {
        Self::Const(value.into())
    }

    /// `self[key]`.
    pub fn get(self, key: Expr) -> Self {
        Self::Get(Box::new(self), Box::new(key))
    }

    /// `self.field` for a constant field name.
    pub fn field(self, name: &str) -> Self {
        self.get(Self::constant(name))
    }

    /// `self <op> rhs`.
    pub fn binary(self, op: BinaryOp, rhs: Expr) -> Self {
        Self::Binary(op, Box::new(self), Box::new(rhs))
    }

    /// Collects every loop variable and accumulator this expression reads.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    pub(crate) fn collect_symbols(&self, out: &mut BTreeSet<Symbol>) {
        match self {
            Self::Input | Self::Const(_) => {}
            Self::Var(s) | Self::Tmp(s) => {
                out.insert(s.clone());
            }
            Self::Get(base, key) => {
                base.collect_symbols(out);
                key.collect_symbols(out);
            }
            Self::Binary(_, lhs, rhs) => {
                lhs.collect_symbols(out);
                rhs.collect_symbols(out);
            }
        }
    }
}
