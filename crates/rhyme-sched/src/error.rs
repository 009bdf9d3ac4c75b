//! Error types for scheduling.

use std::fmt;

use rhyme_analysis::AnalysisError;
use rhyme_ir::{StmtId, Symbol};

/// A statement left pending when scheduling reached a fixpoint, with the
/// reasons it could not be placed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StuckStatement {
    pub id: StmtId,
    /// `write#rank` of the statement.
    pub name: String,
    /// Statements it reads that were never emitted.
    pub missing: Vec<String>,
    /// Emitted statements whose separating loops were not closed yet,
    /// as `(statement, loops)`.
    pub unclosed: Vec<(String, Vec<Symbol>)>,
    /// Loops it must be nested in that are not open.
    pub out_of_scope: Vec<Symbol>,
}

impl fmt::Display for StuckStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.name)?;
        let mut reasons = Vec::new();
        if !self.missing.is_empty() {
            reasons.push(format!("waits for {}", self.missing.join(", ")));
        }
        for (dep, loops) in &self.unclosed {
            let loops: Vec<&str> = loops.iter().map(Symbol::as_str).collect();
            reasons.push(format!("needs {} closed after {dep}", loops.join(", ")));
        }
        if !self.out_of_scope.is_empty() {
            let loops: Vec<&str> = self.out_of_scope.iter().map(Symbol::as_str).collect();
            reasons.push(format!("needs loops {}", loops.join(", ")));
        }
        if !reasons.is_empty() {
            write!(f, " ({})", reasons.join("; "))?;
        }
        Ok(())
    }
}

/// Errors during scheduling.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// Dependency analysis failed before scheduling started.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Statements that no sequence of loop openings can place.
    #[error("{} statement(s) could not be scheduled: {}", .stuck.len(), format_stuck(.stuck))]
    Unschedulable { stuck: Vec<StuckStatement> },

    /// A nested scope placed nothing after its loop was opened.
    #[error("internal error: opening loop '{symbol}' placed no statement")]
    NoProgress { symbol: Symbol },
}

fn format_stuck(stuck: &[StuckStatement]) -> String {
    stuck
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhyme_ir::Handle;

    #[test]
    fn stuck_statement_lists_every_reason() {
        let stuck = StuckStatement {
            id: Handle::new(2),
            name: "tmp1#1".into(),
            missing: vec!["tmp0#2".into()],
            unclosed: vec![("tmp2#1".into(), vec!["*A".into()])],
            out_of_scope: vec!["*B".into()],
        };
        assert_eq!(
            stuck.to_string(),
            "#2 tmp1#1 (waits for tmp0#2; needs *A closed after tmp2#1; needs loops *B)"
        );
        let err = ScheduleError::Unschedulable { stuck: vec![stuck] };
        assert!(err.to_string().starts_with("1 statement(s) could not be scheduled: #2"));
    }
}
