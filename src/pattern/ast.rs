//! AST types for vore patterns.
//!
//! Pattern nodes live in a [`PatternArena`] and refer to each other by
//! [`NodeId`]. A pattern is a chain: each node optionally names the node that
//! follows it. Nodes are immutable once parsed; all match-time state lives in
//! the matcher.

use std::fmt;

/// Index of a node in a [`PatternArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// Owns every pattern node of a program.
#[derive(Debug, Default)]
pub struct PatternArena {
    nodes: Vec<Node>,
}

impl PatternArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unlinked node.
    pub fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, next: None });
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    /// Link `ids` into a chain and return its head.
    pub fn link(&mut self, ids: &[NodeId]) -> Option<NodeId> {
        for pair in ids.windows(2) {
            self.nodes[pair[0].0 as usize].next = Some(pair[1]);
        }
        ids.first().copied()
    }

    /// Iterate a chain from `head` following `next` links.
    pub fn chain(&self, head: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(head), move |id| self.get(*id).next)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub next: Option<NodeId>,
}

#[derive(Debug)]
pub enum NodeKind {
    /// `'text'`, or `not 'text'` when `negated`.
    Literal { bytes: Vec<u8>, negated: bool },
    /// One byte from a named class.
    Class { class: ByteClass, negated: bool },
    /// Zero-width position test.
    Anchor(Anchor),
    /// `'lo' to 'hi'`
    Range {
        lo: Vec<u8>,
        hi: Vec<u8>,
        negated: bool,
    },
    /// `in a, b, c`; items are unlinked literal, range or class nodes.
    In { items: Vec<NodeId>, negated: bool },
    /// `@name` back-reference.
    VarRef(String),
    /// `$name` subroutine call.
    SubCall(String),
    /// Parenthesised sub-pattern; holds the head of the inner chain.
    Group(NodeId),
    Repeat {
        quantifier: Quantifier,
        fewest: bool,
        body: NodeId,
    },
    /// `lhs or rhs`; both sides are single unlinked nodes.
    Alternation { lhs: NodeId, rhs: NodeId },
    /// `body = @name`
    Capture { name: String, body: NodeId },
    /// `body = $name`
    SubDef { name: String, body: NodeId },
}

impl NodeKind {
    /// True for nodes that consume at least one byte and have exactly one way
    /// to match at a given position. Repetitions of these can be expanded
    /// iteratively instead of recursively.
    pub fn is_deterministic_step(&self) -> bool {
        match self {
            NodeKind::Literal { bytes, .. } => !bytes.is_empty(),
            NodeKind::Class { .. } => true,
            NodeKind::In { negated, .. } => *negated,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Exactly(u64),
    AtLeast(u64),
    AtMost(u64),
    Between(u64, u64),
}

impl Quantifier {
    /// Repetition bounds as `(min, max)`; `None` means unbounded.
    pub fn bounds(&self) -> (u64, Option<u64>) {
        match *self {
            Quantifier::Exactly(n) => (n, Some(n)),
            Quantifier::AtLeast(n) => (n, None),
            Quantifier::AtMost(n) => (0, Some(n)),
            Quantifier::Between(lo, hi) => (lo, Some(hi)),
        }
    }
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::Exactly(n) => write!(f, "exactly {n}"),
            Quantifier::AtLeast(n) => write!(f, "at least {n}"),
            Quantifier::AtMost(n) => write!(f, "at most {n}"),
            Quantifier::Between(lo, hi) => write!(f, "between {lo} and {hi}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteClass {
    Digit,
    Letter,
    Upper,
    Lower,
    Whitespace,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `sol` / `line start`
    LineStart,
    /// `eol` / `line end`
    LineEnd,
    /// `sof` / `file start`
    FileStart,
    /// `eof` / `file end`
    FileEnd,
}
