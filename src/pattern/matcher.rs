//! Backtracking matcher: try a pattern chain at the input's current position.
//!
//! Matching is written in continuation-passing style. Every node is matched
//! together with "what comes after it" (a [`Cont`] frame living on the Rust
//! stack), so a quantifier or alternation can retry its own alternatives when
//! anything later in the pattern fails. Repetition counts live in those
//! frames, not in the pattern, so recursive subroutine calls never share
//! iteration state.
//!
//! Invariant: whenever a matching function returns `None`, the input cursor
//! is exactly where it was when the function was called.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::trace;

use crate::buffer::InputBuffer;

use super::ast::*;
use super::char_class::{class_matches, outside_literal, range_contains};

/// Limits applied to every match attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchConfig {
    /// Maximum matcher steps per start position before the scan is aborted.
    pub step_budget: u64,
    /// Maximum nesting of matcher frames before the scan is aborted.
    pub max_depth: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            step_budget: 5_000_000,
            max_depth: 50_000,
        }
    }
}

/// Bindings visible to a pattern from outside the match attempt: global
/// variables (as strings) and program-level subroutines.
#[derive(Debug, Clone, Default)]
pub struct MatchEnv {
    pub variables: HashMap<String, String>,
    pub subroutines: HashMap<String, NodeId>,
}

/// State accumulated along one path through the pattern.
///
/// Builders are never mutated in place once handed to another node: adding a
/// capture or subroutine clones the builder, so a branch that is later
/// abandoned cannot leak bindings into the accepted result.
#[derive(Debug, Clone, Default)]
pub struct MatchBuilder {
    /// Offset where this attempt started.
    pub start: u64,
    pub captures: BTreeMap<String, String>,
    subroutines: HashMap<String, NodeId>,
}

/// What to do once the current node has matched.
enum Cont<'k> {
    /// The whole pattern matched.
    Done,
    /// Match `node` (and its own continuation) next.
    Next { node: NodeId, then: &'k Cont<'k> },
    /// One more iteration of the `Repeat` node `node` has finished.
    Repeat {
        node: NodeId,
        count: u64,
        iter_start: u64,
        then: &'k Cont<'k>,
    },
    /// The body of the `Capture` node `node` has finished.
    Capture {
        node: NodeId,
        start: u64,
        then: &'k Cont<'k>,
    },
    /// Record where one iteration of a repeat body can end, then backtrack
    /// into the body for the next candidate.
    Collect(&'k RefCell<Vec<u64>>),
}

/// One level of [`Matcher::repeat_plain`]'s explicit backtracking stack.
struct Iteration {
    count: u64,
    pos: u64,
    /// Remaining end positions of the next iteration, computed on first use.
    ends: Option<std::vec::IntoIter<u64>>,
    tail_tried: bool,
}

impl Iteration {
    fn new(count: u64, pos: u64) -> Self {
        Self {
            count,
            pos,
            ends: None,
            tail_tried: false,
        }
    }
}

pub struct Matcher<'p> {
    arena: &'p PatternArena,
    env: &'p MatchEnv,
    config: MatchConfig,
    steps: AtomicU64,
    out_of_steps: AtomicBool,
    too_deep: AtomicBool,
}

// ─── Public API ─────────────────────────────────────────────────────────────

impl<'p> Matcher<'p> {
    pub fn new(arena: &'p PatternArena, env: &'p MatchEnv, config: MatchConfig) -> Self {
        Self {
            arena,
            env,
            config,
            steps: AtomicU64::new(0),
            out_of_steps: AtomicBool::new(false),
            too_deep: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Try to match the chain starting at `head` at the input's position.
    ///
    /// On success the cursor is left at the end of the match. On failure it is
    /// unchanged; check [`Matcher::budget_exhausted`] and
    /// [`Matcher::depth_exceeded`] to tell a real "no match" from a cut-off.
    /// A cut-off attempt never returns a match, not even a shorter one.
    pub fn try_match(&self, head: NodeId, input: &mut InputBuffer) -> Option<MatchBuilder> {
        self.steps.store(0, Ordering::Relaxed);
        self.out_of_steps.store(false, Ordering::Relaxed);
        self.too_deep.store(false, Ordering::Relaxed);
        let start = input.position();
        let builder = MatchBuilder {
            start,
            ..MatchBuilder::default()
        };
        let result = self.match_node(head, &builder, input, &Cont::Done, 0);
        if self.aborted() {
            input.seek(start);
            return None;
        }
        result
    }

    /// True if the last attempt was abandoned because it ran out of steps.
    pub fn budget_exhausted(&self) -> bool {
        self.out_of_steps.load(Ordering::Relaxed)
    }

    /// True if the last attempt was abandoned because it nested too deeply.
    pub fn depth_exceeded(&self) -> bool {
        self.too_deep.load(Ordering::Relaxed)
    }
}

// ─── Core matching functions ─────────────────────────────────────────────────

impl Matcher<'_> {
    fn aborted(&self) -> bool {
        self.budget_exhausted() || self.depth_exceeded()
    }

    /// Count one step; false means the whole attempt must give up.
    fn tick(&self, depth: usize) -> bool {
        if self.aborted() {
            return false;
        }
        let steps = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        if steps > self.config.step_budget {
            self.out_of_steps.store(true, Ordering::Relaxed);
            return false;
        }
        if depth > self.config.max_depth {
            trace!("depth limit {} reached, abandoning attempt", self.config.max_depth);
            self.too_deep.store(true, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Match node `id` and then continue with `k`.
    fn match_node(
        &self,
        id: NodeId,
        b: &MatchBuilder,
        input: &mut InputBuffer,
        k: &Cont<'_>,
        depth: usize,
    ) -> Option<MatchBuilder> {
        if !self.tick(depth) {
            return None;
        }
        let node = self.arena.get(id);
        let next = node.next.map(|node| Cont::Next { node, then: k });
        let k = next.as_ref().unwrap_or(k);
        let entry = input.position();

        let result = match &node.kind {
            kind @ (NodeKind::Literal { .. }
            | NodeKind::Class { .. }
            | NodeKind::In { negated: true, .. }
            | NodeKind::VarRef(_)) => {
                let consumed = self.step(kind, b, input)?;
                let done = self.resume(b, input, k, depth);
                if done.is_none() {
                    input.unread(consumed);
                }
                done
            }
            NodeKind::Anchor(anchor) => {
                if self.anchor_holds(*anchor, input) {
                    self.resume(b, input, k, depth)
                } else {
                    None
                }
            }
            NodeKind::Range { lo, hi, negated } => {
                self.match_range(lo, hi, *negated, b, input, k, depth)
            }
            NodeKind::In { items, .. } => items
                .iter()
                .find_map(|&item| self.match_node(item, b, input, k, depth + 1)),
            NodeKind::SubCall(name) => {
                let body = b
                    .subroutines
                    .get(name)
                    .or_else(|| self.env.subroutines.get(name))
                    .copied();
                match body {
                    Some(body) => self.match_node(body, b, input, k, depth + 1),
                    None => {
                        trace!("unknown subroutine ${name}");
                        None
                    }
                }
            }
            NodeKind::Group(head) => self.match_node(*head, b, input, k, depth + 1),
            NodeKind::Repeat {
                quantifier,
                fewest,
                body,
            } => {
                if self.is_step(*body) {
                    self.repeat_steps(*quantifier, *fewest, *body, b, input, k, depth)
                } else if self.binds_nothing(*body) {
                    self.repeat_plain(*quantifier, *fewest, *body, b, input, k, depth)
                } else {
                    self.repeat(id, 0, b, input, k, depth)
                }
            }
            NodeKind::Alternation { lhs, rhs } => self
                .match_node(*lhs, b, input, k, depth + 1)
                .or_else(|| self.match_node(*rhs, b, input, k, depth + 1)),
            NodeKind::Capture { body, .. } => {
                let cont = Cont::Capture {
                    node: id,
                    start: entry,
                    then: k,
                };
                self.match_node(*body, b, input, &cont, depth + 1)
            }
            NodeKind::SubDef { name, body } => {
                let mut scoped = b.clone();
                scoped.subroutines.insert(name.clone(), *body);
                self.match_node(*body, &scoped, input, k, depth + 1)
            }
        };

        debug_assert!(
            result.is_some() || input.position() == entry,
            "failed match moved the cursor"
        );
        result
    }

    /// Run continuation `k` from the current position.
    fn resume(
        &self,
        b: &MatchBuilder,
        input: &mut InputBuffer,
        k: &Cont<'_>,
        depth: usize,
    ) -> Option<MatchBuilder> {
        match *k {
            Cont::Done => Some(b.clone()),
            Cont::Collect(ends) => {
                let pos = input.position();
                let mut ends = ends.borrow_mut();
                if !ends.contains(&pos) {
                    ends.push(pos);
                }
                None
            }
            Cont::Next { node, then } => self.match_node(node, b, input, then, depth + 1),
            Cont::Capture { node, start, then } => {
                let NodeKind::Capture { name, .. } = &self.arena.get(node).kind else {
                    return None;
                };
                let bytes = input.slice(start, input.position());
                let mut bound = b.clone();
                bound
                    .captures
                    .insert(name.clone(), String::from_utf8_lossy(&bytes).into_owned());
                self.resume(&bound, input, then, depth + 1)
            }
            Cont::Repeat {
                node,
                count,
                iter_start,
                then,
            } => {
                let NodeKind::Repeat { quantifier, .. } = &self.arena.get(node).kind else {
                    return None;
                };
                let (min, _) = quantifier.bounds();
                // An empty iteration can never make progress: stop repeating.
                if input.position() == iter_start && count >= min {
                    return self.resume(b, input, then, depth + 1);
                }
                self.repeat(node, count, b, input, then, depth + 1)
            }
        }
    }

    /// General repetition: `count` iterations of the `Repeat` node `node` have
    /// matched so far. Greedy tries one more iteration before the tail; lazy
    /// tries the tail first.
    fn repeat(
        &self,
        node: NodeId,
        count: u64,
        b: &MatchBuilder,
        input: &mut InputBuffer,
        k: &Cont<'_>,
        depth: usize,
    ) -> Option<MatchBuilder> {
        let NodeKind::Repeat {
            quantifier,
            fewest,
            body,
        } = &self.arena.get(node).kind
        else {
            return None;
        };
        let (min, max) = quantifier.bounds();
        let can_grow = max.is_none_or(|max| count < max);
        let again = Cont::Repeat {
            node,
            count: count + 1,
            iter_start: input.position(),
            then: k,
        };

        if *fewest {
            if count >= min
                && let Some(done) = self.resume(b, input, k, depth)
            {
                return Some(done);
            }
            if can_grow {
                return self.match_node(*body, b, input, &again, depth + 1);
            }
            None
        } else {
            if can_grow
                && let Some(done) = self.match_node(*body, b, input, &again, depth + 1)
            {
                return Some(done);
            }
            if count >= min {
                return self.resume(b, input, k, depth);
            }
            None
        }
    }

    /// Repetition of a body that has exactly one way to match at any position.
    ///
    /// The end position of every iteration is collected up front, then the
    /// tail is tried at each candidate count (largest first when greedy,
    /// smallest first when lazy). No recursion per iteration.
    #[allow(clippy::too_many_arguments)]
    fn repeat_steps(
        &self,
        quantifier: Quantifier,
        fewest: bool,
        body: NodeId,
        b: &MatchBuilder,
        input: &mut InputBuffer,
        k: &Cont<'_>,
        depth: usize,
    ) -> Option<MatchBuilder> {
        let (min, max) = quantifier.bounds();
        let entry = input.position();

        if fewest {
            let mut count = 0u64;
            loop {
                if count >= min
                    && let Some(done) = self.resume(b, input, k, depth)
                {
                    return Some(done);
                }
                if max.is_some_and(|max| count >= max) || !self.tick(depth) {
                    break;
                }
                if self.step_node(body, b, input).is_none() {
                    break;
                }
                count += 1;
            }
        } else {
            // ends[c] is the position after c iterations.
            let mut ends = vec![entry];
            while max.is_none_or(|max| (ends.len() as u64) <= max) && self.tick(depth) {
                if self.step_node(body, b, input).is_none() {
                    break;
                }
                ends.push(input.position());
            }
            for count in (min..ends.len() as u64).rev() {
                input.rewind_to(ends[count as usize]);
                if let Some(done) = self.resume(b, input, k, depth) {
                    return Some(done);
                }
            }
        }

        input.rewind_to(entry);
        None
    }

    /// Repetition of a body that binds no captures or subroutines.
    ///
    /// Such a body leaves the builder untouched, so an iteration is fully
    /// described by where it ends. Those ends are collected per iteration and
    /// explored with an explicit stack, in the same order [`Matcher::repeat`]
    /// would try them, without nesting a call per iteration.
    #[allow(clippy::too_many_arguments)]
    fn repeat_plain(
        &self,
        quantifier: Quantifier,
        fewest: bool,
        body: NodeId,
        b: &MatchBuilder,
        input: &mut InputBuffer,
        k: &Cont<'_>,
        depth: usize,
    ) -> Option<MatchBuilder> {
        let (min, max) = quantifier.bounds();
        let entry = input.position();
        let mut stack = vec![Iteration::new(0, entry)];

        while let Some(top) = stack.last_mut() {
            if self.aborted() {
                break;
            }
            let (count, pos) = (top.count, top.pos);

            if fewest && !top.tail_tried {
                top.tail_tried = true;
                if count >= min
                    && let Some(done) = self.tail_at(pos, b, input, k, depth)
                {
                    return Some(done);
                }
                continue;
            }

            if top.ends.is_none() {
                let ends = if max.is_none_or(|max| count < max) {
                    input.seek(pos);
                    self.body_ends(body, b, input, depth)
                } else {
                    Vec::new()
                };
                top.ends = Some(ends.into_iter());
            }

            match top.ends.as_mut().and_then(|ends| ends.next()) {
                // An empty iteration can never make progress: stop repeating.
                Some(end) if end == pos && count + 1 >= min => {
                    if let Some(done) = self.tail_at(pos, b, input, k, depth) {
                        return Some(done);
                    }
                }
                Some(end) => stack.push(Iteration::new(count + 1, end)),
                None => {
                    stack.pop();
                    if !fewest
                        && count >= min
                        && let Some(done) = self.tail_at(pos, b, input, k, depth)
                    {
                        return Some(done);
                    }
                }
            }
        }

        input.seek(entry);
        None
    }

    fn tail_at(
        &self,
        pos: u64,
        b: &MatchBuilder,
        input: &mut InputBuffer,
        k: &Cont<'_>,
        depth: usize,
    ) -> Option<MatchBuilder> {
        input.seek(pos);
        self.resume(b, input, k, depth)
    }

    /// Every position one match of `body` can end at, in the order the
    /// alternatives inside it would be tried.
    fn body_ends(
        &self,
        body: NodeId,
        b: &MatchBuilder,
        input: &mut InputBuffer,
        depth: usize,
    ) -> Vec<u64> {
        let ends = RefCell::new(Vec::new());
        let collect = Cont::Collect(&ends);
        let _ = self.match_node(body, b, input, &collect, depth + 1);
        ends.into_inner()
    }

    /// True if nothing in the chain starting at `id` adds a capture or a
    /// subroutine to the builder.
    fn binds_nothing(&self, id: NodeId) -> bool {
        let node = self.arena.get(id);
        let inner = match &node.kind {
            NodeKind::Capture { .. } | NodeKind::SubDef { .. } | NodeKind::SubCall(_) => false,
            NodeKind::Group(head) => self.binds_nothing(*head),
            NodeKind::Repeat { body, .. } => self.binds_nothing(*body),
            NodeKind::Alternation { lhs, rhs } => {
                self.binds_nothing(*lhs) && self.binds_nothing(*rhs)
            }
            _ => true,
        };
        inner && node.next.is_none_or(|next| self.binds_nothing(next))
    }

    /// Try every candidate width of a range, longest first.
    #[allow(clippy::too_many_arguments)]
    fn match_range(
        &self,
        lo: &[u8],
        hi: &[u8],
        negated: bool,
        b: &MatchBuilder,
        input: &mut InputBuffer,
        k: &Cont<'_>,
        depth: usize,
    ) -> Option<MatchBuilder> {
        let shortest = lo.len().min(hi.len()).max(1);
        let longest = lo.len().max(hi.len());
        for width in (shortest..=longest).rev() {
            let got = input.read(width as u64);
            if got.len() == width
                && range_contains(&got, lo, hi) != negated
                && let Some(done) = self.resume(b, input, k, depth)
            {
                return Some(done);
            }
            input.unread(got.len() as u64);
        }
        None
    }

    fn anchor_holds(&self, anchor: Anchor, input: &InputBuffer) -> bool {
        let pos = input.position();
        match anchor {
            Anchor::LineStart => pos == 0 || input.byte_at(pos - 1) == Some(b'\n'),
            Anchor::LineEnd => input.at_end() || input.byte_at(pos) == Some(b'\n'),
            Anchor::FileStart => pos == 0,
            Anchor::FileEnd => input.at_end(),
        }
    }
}

// ─── Deterministic steps ─────────────────────────────────────────────────────

impl Matcher<'_> {
    /// True if node `id` consumes at least one byte and can match in at most
    /// one way: a non-empty literal, a class, a `not in` list, or a group made
    /// only of such nodes.
    fn is_step(&self, id: NodeId) -> bool {
        match &self.arena.get(id).kind {
            NodeKind::Group(head) => self.arena.chain(*head).all(|n| self.is_step(n)),
            kind => kind.is_deterministic_step(),
        }
    }

    /// Match a step node (see [`Matcher::is_step`]) with no continuation.
    fn step_node(&self, id: NodeId, b: &MatchBuilder, input: &mut InputBuffer) -> Option<u64> {
        match &self.arena.get(id).kind {
            NodeKind::Group(head) => {
                let entry = input.position();
                for n in self.arena.chain(*head) {
                    if self.step_node(n, b, input).is_none() {
                        input.rewind_to(entry);
                        return None;
                    }
                }
                Some(input.position() - entry)
            }
            kind => self.step(kind, b, input),
        }
    }

    /// Consume the single way `kind` can match here, returning the number of
    /// bytes read. Leaves the cursor untouched on failure.
    fn step(&self, kind: &NodeKind, b: &MatchBuilder, input: &mut InputBuffer) -> Option<u64> {
        match kind {
            NodeKind::Literal {
                bytes,
                negated: false,
            } => self.step_exact(bytes, input),
            NodeKind::Literal {
                bytes,
                negated: true,
            } => {
                let mut consumed = 0u64;
                while consumed < bytes.len() as u64 {
                    match input.read_byte() {
                        Some(byte) if outside_literal(bytes, byte) => consumed += 1,
                        Some(_) => {
                            input.unread(1);
                            break;
                        }
                        None => break,
                    }
                }
                (consumed > 0).then_some(consumed)
            }
            NodeKind::Class { class, negated } => {
                let byte = input.read_byte()?;
                if class_matches(*class, *negated, byte) {
                    Some(1)
                } else {
                    input.unread(1);
                    None
                }
            }
            NodeKind::In { items, .. } => {
                let byte = input.read_byte()?;
                if items.iter().any(|&item| self.may_start_with(item, byte)) {
                    input.unread(1);
                    None
                } else {
                    Some(1)
                }
            }
            NodeKind::VarRef(name) => {
                let value = b
                    .captures
                    .get(name)
                    .or_else(|| self.env.variables.get(name));
                match value {
                    Some(value) => self.step_exact(value.as_bytes(), input),
                    None => {
                        trace!("unknown variable @{name}");
                        None
                    }
                }
            }
            _ => None,
        }
    }

    fn step_exact(&self, expected: &[u8], input: &mut InputBuffer) -> Option<u64> {
        let got = input.read(expected.len() as u64);
        if got == expected {
            Some(got.len() as u64)
        } else {
            input.unread(got.len() as u64);
            None
        }
    }

    /// Could `in`-list item `item` match text beginning with `byte`?
    fn may_start_with(&self, item: NodeId, byte: u8) -> bool {
        match &self.arena.get(item).kind {
            NodeKind::Literal { bytes, .. } => bytes.first() == Some(&byte),
            NodeKind::Range { lo, hi, .. } => range_contains(&[byte], lo, hi),
            NodeKind::Class { class, negated } => class_matches(*class, *negated, byte),
            _ => false,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
