//! Error types surfaced by compilation and execution.
//!
//! Match failure is not an error: the matcher reports it as `None` and the
//! caller backtracks. Only problems the user has to act on end up here.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A location in vore source text. Both fields are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: usize,
    pub column: usize,
}

impl SourcePos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A malformed vore program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Syntax error at {pos}: {message}")]
pub struct ParseError {
    pub message: String,
    pub pos: SourcePos,
}

impl ParseError {
    pub fn new(message: impl Into<String>, pos: SourcePos) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

/// Errors raised while running a compiled program.
#[derive(Debug, Error)]
pub enum VoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("could not open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The matcher gave up after too many steps. Raised instead of silently
    /// reporting "no match" so that results are never quietly truncated.
    #[error("step budget of {budget} exhausted while matching at offset {offset}")]
    StepBudgetExceeded { budget: u64, offset: u64 },
    /// The matcher nested deeper than its limit. Like the step budget, this
    /// aborts the scan rather than accepting a shorter match.
    #[error("nesting depth limit of {limit} reached while matching at offset {offset}")]
    DepthLimitExceeded { limit: usize, offset: u64 },
}
