//! Scanner loop: run a pattern at every start position of an input.

use std::collections::BTreeMap;
use std::fmt;
use std::{panic, thread};

use log::{debug, trace, warn};

use crate::buffer::InputBuffer;
use crate::error::VoreError;

use super::ast::NodeId;
use super::matcher::Matcher;

/// Which of the matches found by a scan are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Amount {
    /// Number of leading matches to drop.
    pub skip: u64,
    /// Maximum number of matches to keep; `None` keeps the rest.
    pub take: Option<u64>,
}

impl Amount {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn top(n: u64) -> Self {
        Self {
            skip: 0,
            take: Some(n),
        }
    }

    /// Is the match with 1-based number `number` kept?
    pub fn retains(&self, number: u64) -> bool {
        number > self.skip && self.take.is_none_or(|take| number - self.skip <= take)
    }

    fn is_full(&self, retained: usize) -> bool {
        self.take.is_some_and(|take| retained as u64 >= take)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.skip, self.take) {
            (0, None) => write!(f, "all"),
            (0, Some(take)) => write!(f, "top {take}"),
            (skip, None) => write!(f, "skip {skip}"),
            (skip, Some(take)) => write!(f, "skip {skip} take {take}"),
        }
    }
}

/// One successful match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub file_offset: u64,
    pub length: u64,
    /// The matched bytes, decoded lossily for display.
    pub value: String,
    pub captures: BTreeMap<String, String>,
    /// 1-based line of the first matched byte.
    pub line_number: u64,
    /// 1-based position among all matches found, including skipped ones.
    pub match_number: u64,
    /// Text substituted for this match by a `replace` statement.
    pub replacement: Option<String>,
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} offset {} line {} length {}: {:?}",
            self.match_number, self.file_offset, self.line_number, self.length, self.value
        )?;
        for (name, value) in &self.captures {
            write!(f, "\n    @{name} = {value:?}")?;
        }
        if let Some(replacement) = &self.replacement {
            write!(f, "\n    replaced with {replacement:?}")?;
        }
        Ok(())
    }
}

/// Stack for the thread a scan runs on. Matching recurses once per nested
/// pattern frame, so this has to cover `MatchConfig::max_depth` frames.
const MATCHER_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Scan `input` from its first byte, keeping the matches `amount` selects.
///
/// A match resumes the scan at its end (or one byte later if it was empty),
/// so kept matches never overlap and come out in offset order.
///
/// The scan runs on its own thread with a large stack, falling back to the
/// calling thread if that thread cannot be started.
pub fn scan(
    matcher: &Matcher<'_>,
    head: NodeId,
    input: &InputBuffer,
    amount: Amount,
) -> Result<Vec<MatchResult>, VoreError> {
    let run = move || scan_here(matcher, head, input, amount);
    thread::scope(|scope| {
        let spawned = thread::Builder::new()
            .name("vore-matcher".into())
            .stack_size(MATCHER_STACK_SIZE)
            .spawn_scoped(scope, run);
        match spawned {
            Ok(handle) => handle
                .join()
                .unwrap_or_else(|payload| panic::resume_unwind(payload)),
            Err(err) => {
                warn!("could not start matcher thread ({err}), matching on this thread");
                run()
            }
        }
    })
}

fn scan_here(
    matcher: &Matcher<'_>,
    head: NodeId,
    input: &InputBuffer,
    amount: Amount,
) -> Result<Vec<MatchResult>, VoreError> {
    let mut input = input.rewound();
    let mut results = Vec::new();
    let mut line_number = 1u64;
    let mut found = 0u64;

    while !amount.is_full(results.len()) {
        let start = input.position();
        match matcher.try_match(head, &mut input) {
            Some(builder) => {
                found += 1;
                let end = input.position();
                trace!("match #{found} at {start}..{end}");
                if amount.retains(found) {
                    results.push(MatchResult {
                        file_offset: start,
                        length: end - start,
                        value: String::from_utf8_lossy(&input.slice(start, end)).into_owned(),
                        captures: builder.captures,
                        line_number,
                        match_number: found,
                        replacement: None,
                    });
                }
                if end == start && input.read_byte().is_none() {
                    break;
                }
            }
            None => {
                if matcher.budget_exhausted() {
                    return Err(VoreError::StepBudgetExceeded {
                        budget: matcher.config().step_budget,
                        offset: start,
                    });
                }
                if matcher.depth_exceeded() {
                    return Err(VoreError::DepthLimitExceeded {
                        limit: matcher.config().max_depth,
                        offset: start,
                    });
                }
                if input.read_byte().is_none() {
                    break;
                }
            }
        }
        line_number += newlines_between(&input, start, input.position());
    }

    debug!("scan found {found} matches, kept {}", results.len());
    Ok(results)
}

fn newlines_between(input: &InputBuffer, start: u64, end: u64) -> u64 {
    (start..end)
        .filter(|&pos| input.byte_at(pos) == Some(b'\n'))
        .count() as u64
}
