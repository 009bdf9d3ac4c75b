//! Symbols naming loop variables and accumulators.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A symbol: a loop variable (`*A`), an accumulator (`tmp0`), or a free
/// input name.
///
/// The compiler never interprets the spelling of a symbol; what a symbol
/// refers to is decided by looking it up in a [`Program`](crate::Program).
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a symbol from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the symbol's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name with characters that are not valid in C or JS
    /// identifiers replaced, e.g. `*A` becomes `x_A`.
    pub fn to_identifier(&self) -> String {
        let mut out = String::with_capacity(self.0.len() + 2);
        for (i, c) in self.0.chars().enumerate() {
            match c {
                '*' if i == 0 => out.push_str("x_"),
                c if c.is_ascii_alphanumeric() || c == '_' => out.push(c),
                _ => out.push('_'),
            }
        }
        if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
            out.insert(0, '_');
        }
        out
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_mangling() {
        assert_eq!(Symbol::from("*A").to_identifier(), "x_A");
        assert_eq!(Symbol::from("*").to_identifier(), "x_");
        assert_eq!(Symbol::from("tmp0").to_identifier(), "tmp0");
        assert_eq!(Symbol::from("a-b").to_identifier(), "a_b");
        assert_eq!(Symbol::from("0x").to_identifier(), "_0x");
    }

    #[test]
    fn symbols_order_by_name() {
        let mut syms = vec![Symbol::from("tmp1"), Symbol::from("*B"), Symbol::from("*A")];
        syms.sort();
        let names: Vec<_> = syms.iter().map(Symbol::as_str).collect();
        assert_eq!(names, ["*A", "*B", "tmp1"]);
    }
}
