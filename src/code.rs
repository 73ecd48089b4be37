//! Compiled representation of a vore program.

use std::path::PathBuf;

use crate::error::VoreError;
use crate::expr::Expr;
use crate::pattern::{Amount, MatchResult, NodeId, PatternArena};

/// A compiled program: statements in source order plus the arena holding
/// every pattern they refer to.
#[derive(Debug)]
pub struct Program {
    pub statements: Vec<Statement>,
    pub arena: PatternArena,
}

/// A single compiled statement.
#[derive(Debug)]
pub enum Statement {
    /// `find <amount> <pattern>`
    Find { amount: Amount, pattern: NodeId },
    /// `replace <amount> <pattern> with <expr>...`
    Replace {
        amount: Amount,
        pattern: NodeId,
        replacement: Vec<Expr>,
    },
    /// `use 'path', ...`
    Use(Vec<PathBuf>),
    /// `repeat N <statement>`
    Repeat { times: u64, body: Box<Statement> },
    /// `set @name to <expr>`
    SetVariable { name: String, value: Expr },
    /// `set $name to pattern <pattern>`
    SetSubroutine { name: String, pattern: NodeId },
}

impl Statement {
    /// Statements that run once per active input (as opposed to once per
    /// program run).
    pub fn is_multi_input(&self) -> bool {
        match self {
            Statement::Find { .. } | Statement::Replace { .. } => true,
            Statement::Repeat { body, .. } => body.is_multi_input(),
            _ => false,
        }
    }

    /// Short name used in log messages.
    pub fn name(&self) -> &'static str {
        match self {
            Statement::Find { .. } => "find",
            Statement::Replace { .. } => "replace",
            Statement::Use(_) => "use",
            Statement::Repeat { .. } => "repeat",
            Statement::SetVariable { .. } => "set variable",
            Statement::SetSubroutine { .. } => "set subroutine",
        }
    }
}

impl Program {
    /// Run the program over one piece of text and return every match it
    /// reports, in statement order.
    pub fn run_str(&self, text: &str) -> Result<Vec<MatchResult>, VoreError> {
        let mut session = crate::Session::new(Default::default());
        session.add_text("text", text);
        let reports = session.execute(self)?;
        Ok(reports.into_iter().flat_map(|report| report.matches).collect())
    }
}
