//! `ExecutionContext`: wraps a [`Session`] with the state of one program run.
//!
//! This is the environment passed through the interpreter. Each `cmd_*`
//! method carries out one kind of statement against every active input.

use std::collections::HashMap;
use std::path::PathBuf;

use log::{debug, trace};

use crate::error::VoreError;
use crate::eval::{Scope, evaluate, evaluate_replacement};
use crate::expr::Expr;
use crate::interpreter::Report;
use crate::output::splice;
use crate::pattern::{Amount, MatchEnv, Matcher, NodeId, PatternArena, scan};
use crate::session::{Input, Session};

pub(crate) struct ExecutionContext<'a> {
    pub(crate) session: &'a mut Session,
    arena: &'a PatternArena,
    /// Subroutines defined so far with `set $name to pattern`.
    subroutines: HashMap<String, NodeId>,
    pub(crate) reports: Vec<Report>,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(session: &'a mut Session, arena: &'a PatternArena) -> Self {
        Self {
            session,
            arena,
            subroutines: HashMap::new(),
            reports: Vec::new(),
        }
    }

    /// Globals (as strings) and program subroutines, as patterns see them.
    fn match_env(&self) -> MatchEnv {
        MatchEnv {
            variables: self
                .session
                .globals
                .iter()
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect(),
            subroutines: self.subroutines.clone(),
        }
    }

    /// `find <amount> <pattern>`
    pub(crate) fn cmd_find(
        &mut self,
        statement: usize,
        amount: Amount,
        pattern: NodeId,
    ) -> Result<(), VoreError> {
        let env = self.match_env();
        let matcher = Matcher::new(self.arena, &env, self.session.config);
        for input in &self.session.inputs {
            let matches = scan(&matcher, pattern, input.buffer(), amount)?;
            debug!("find: {} matches in {}", matches.len(), input.name());
            self.reports.push(Report {
                input: input.name().to_string(),
                statement,
                matches,
            });
        }
        Ok(())
    }

    /// `replace <amount> <pattern> with <replacement>`
    ///
    /// Each kept match is replaced by the evaluated replacement; the input's
    /// contents change before the next statement runs.
    pub(crate) fn cmd_replace(
        &mut self,
        statement: usize,
        amount: Amount,
        pattern: NodeId,
        replacement: &[Expr],
    ) -> Result<(), VoreError> {
        let env = self.match_env();
        let matcher = Matcher::new(self.arena, &env, self.session.config);
        let globals = &self.session.globals;
        for input in self.session.inputs.iter_mut() {
            let mut matches = scan(&matcher, pattern, input.buffer(), amount)?;
            for m in matches.iter_mut() {
                let text = evaluate_replacement(replacement, &mut Scope::for_match(globals, m));
                trace!("replace #{} {:?} -> {:?}", m.match_number, m.value, text);
                m.replacement = Some(text);
            }
            if !matches.is_empty() {
                input.replace_contents(splice(&input.contents(), &matches));
            }
            debug!("replace: {} matches in {}", matches.len(), input.name());
            self.reports.push(Report {
                input: input.name().to_string(),
                statement,
                matches,
            });
        }
        Ok(())
    }

    /// `use 'path', ...`
    ///
    /// Pending replacements are written out first. Every listed file must
    /// open; otherwise the current inputs are kept and the error returned.
    pub(crate) fn cmd_use(&mut self, paths: &[PathBuf]) -> Result<(), VoreError> {
        self.session.flush()?;
        let inputs = paths
            .iter()
            .map(Input::open)
            .collect::<Result<Vec<_>, _>>()?;
        debug!("use: {} inputs", inputs.len());
        self.session.inputs = inputs;
        Ok(())
    }

    /// `set @name to <expr>`
    pub(crate) fn cmd_set_variable(&mut self, name: &str, value: &Expr) {
        let value = evaluate(value, &mut Scope::new(&self.session.globals));
        debug!("set @{name} to {value}");
        self.session.globals.insert(name.to_string(), value);
    }

    /// `set $name to pattern <pattern>`
    pub(crate) fn cmd_set_subroutine(&mut self, name: &str, pattern: NodeId) {
        debug!("set ${name}");
        self.subroutines.insert(name.to_string(), pattern);
    }
}
