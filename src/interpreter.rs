//! Statement execution engine for compiled vore programs.
//!
//! This module runs the statements of a [`Program`] in order against an
//! [`ExecutionContext`]. Global variables and subroutines defined by one
//! statement are visible to every later one.

use std::fmt;

use log::{debug, warn};

use crate::code::*;
use crate::error::VoreError;
use crate::exec_context::ExecutionContext;
use crate::pattern::MatchResult;

/// The matches one `find` or `replace` statement produced for one input.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub input: String,
    /// 1-based index of the top-level statement.
    pub statement: usize,
    pub matches: Vec<MatchResult>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.matches.len();
        write!(
            f,
            "{}: statement {}: {} match{}",
            self.input,
            self.statement,
            count,
            if count == 1 { "" } else { "es" }
        )?;
        for m in &self.matches {
            write!(f, "\n  {}", m.to_string().replace('\n', "\n  "))?;
        }
        Ok(())
    }
}

/// Execute a program against an execution context. Top-level entry point.
///
/// Stops at the first statement that fails. Changed file inputs are written
/// out once every statement has run.
pub(crate) fn execute(
    ctx: &mut ExecutionContext,
    program: &Program,
) -> Result<Vec<Report>, VoreError> {
    for (idx, statement) in program.statements.iter().enumerate() {
        execute_statement(ctx, idx + 1, statement)?;
    }
    ctx.session.flush()?;
    Ok(std::mem::take(&mut ctx.reports))
}

/// Execute a single statement.
fn execute_statement(
    ctx: &mut ExecutionContext,
    idx: usize,
    statement: &Statement,
) -> Result<(), VoreError> {
    debug!("statement {idx}: {}", statement.name());
    if statement.is_multi_input() && ctx.session.inputs.is_empty() {
        warn!("statement {idx} ({}) has no inputs to run on", statement.name());
    }
    match statement {
        Statement::Find { amount, pattern } => ctx.cmd_find(idx, *amount, *pattern),
        Statement::Replace {
            amount,
            pattern,
            replacement,
        } => ctx.cmd_replace(idx, *amount, *pattern, replacement),
        Statement::Use(paths) => ctx.cmd_use(paths),
        Statement::Repeat { times, body } => {
            for _ in 0..*times {
                execute_statement(ctx, idx, body)?;
            }
            Ok(())
        }
        Statement::SetVariable { name, value } => {
            ctx.cmd_set_variable(name, value);
            Ok(())
        }
        Statement::SetSubroutine { name, pattern } => {
            ctx.cmd_set_subroutine(name, *pattern);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::eval::Value;
    use crate::pattern::MatchConfig;
    use crate::session::Session;
    use std::fs;

    fn run(src: &str, text: &str) -> (Session, Vec<Report>) {
        let program = compile(src).unwrap();
        let mut session = Session::default();
        session.add_text("input", text);
        let reports = session.execute(&program).unwrap();
        (session, reports)
    }

    fn values(report: &Report) -> Vec<&str> {
        report.matches.iter().map(|m| m.value.as_str()).collect()
    }

    // --- find / replace ---

    #[test]
    fn test_find_reports_per_statement() {
        let (_, reports) = run("find all digit find top 1 letter", "a1b2");
        assert_eq!(reports.len(), 2);
        assert_eq!(values(&reports[0]), vec!["1", "2"]);
        assert_eq!(reports[0].statement, 1);
        assert_eq!(values(&reports[1]), vec!["a"]);
        assert_eq!(reports[1].statement, 2);
    }

    #[test]
    fn test_replace_changes_input() {
        let (session, reports) = run("replace all digit with '#'", "a1b22");
        assert_eq!(session.text("input").as_deref(), Some("a#b##"));
        assert_eq!(
            reports[0].matches[0].replacement.as_deref(),
            Some("#")
        );
    }

    #[test]
    fn test_later_statements_see_replacements() {
        let (_, reports) = run("replace all 'cat' with 'dog' find all 'dog'", "cat cat");
        assert_eq!(reports[1].matches.len(), 2);
    }

    #[test]
    fn test_replace_with_expression() {
        let (session, _) = run(
            "replace all (at least 1 digit) = @n with @n * 2 ' (#' @matchNumber ')'",
            "3 and 10",
        );
        assert_eq!(
            session.text("input").as_deref(),
            Some("6 (#1) and 20 (#2)")
        );
    }

    #[test]
    fn test_replace_skip_take() {
        let (session, _) = run("replace skip 1 take 1 letter with upper(@match)", "abc");
        assert_eq!(session.text("input").as_deref(), Some("aBc"));
    }

    #[test]
    fn test_repeat() {
        let (session, reports) = run("repeat 3 replace all 'a' with 'aa'", "a");
        assert_eq!(session.text("input").as_deref(), Some("aaaaaaaa"));
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.statement == 1));
    }

    // --- set ---

    #[test]
    fn test_set_variable_used_in_replacement_and_pattern() {
        let (session, reports) = run(
            "set @word to 'b' + 'c' find all @word replace all @word with upper(@word)",
            "abcbc",
        );
        assert_eq!(reports[0].matches.len(), 2);
        assert_eq!(session.text("input").as_deref(), Some("aBCBC"));
        assert_eq!(session.global("word"), Some(&Value::from("bc")));
    }

    #[test]
    fn test_set_subroutine() {
        let (_, reports) = run(
            "set $num to pattern at least 1 digit find all $num '.' $num",
            "v1.20 and 3.4",
        );
        assert_eq!(values(&reports[0]), vec!["1.20", "3.4"]);
    }

    #[test]
    fn test_subroutine_defined_later_is_unknown_earlier() {
        let (_, reports) = run("find all $d set $d to pattern digit find all $d", "1");
        assert!(reports[0].matches.is_empty());
        assert_eq!(reports[1].matches.len(), 1);
    }

    // --- use and files ---

    #[test]
    fn test_use_replaces_inputs_and_writes_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "x1").unwrap();
        fs::write(&b, "y2").unwrap();

        let src = format!(
            "use '{}', '{}' replace all digit with '#' find all '#'",
            a.display(),
            b.display()
        );
        let program = compile(&src).unwrap();
        let mut session = Session::default();
        let reports = session.execute(&program).unwrap();

        assert_eq!(reports.len(), 4);
        assert_eq!(fs::read(dir.path().join("a.vore.txt")).unwrap(), b"x#");
        assert_eq!(fs::read(dir.path().join("b.vore.txt")).unwrap(), b"y#");
        assert_eq!(fs::read(&a).unwrap(), b"x1");
        assert_eq!(session.written().len(), 2);
    }

    #[test]
    fn test_use_missing_file_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let src = format!("use '{}' find all 'x'", missing.display());
        let program = compile(&src).unwrap();
        let mut session = Session::default();
        session.add_text("kept", "x");
        let err = session.execute(&program).unwrap_err();
        assert!(matches!(err, VoreError::Open { .. }));
        assert_eq!(session.inputs().len(), 1);
    }

    #[test]
    fn test_step_budget_aborts_execution() {
        let program = compile("find all at least 0 (letter or digit) 'z'").unwrap();
        let mut session = Session::new(MatchConfig {
            step_budget: 30,
            ..MatchConfig::default()
        });
        session.add_text("long", &"a".repeat(100));
        let err = session.execute(&program).unwrap_err();
        assert!(matches!(err, VoreError::StepBudgetExceeded { .. }));
    }

    #[test]
    fn test_report_display() {
        let (_, reports) = run("find all 'b'", "ab");
        assert_eq!(
            reports[0].to_string(),
            "input: statement 1: 1 match\n  #1 offset 1 line 1 length 1: \"b\""
        );
    }
}
