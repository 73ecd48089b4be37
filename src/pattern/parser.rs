//! Recursive descent parser for vore patterns.
//!
//! Precedence, loosest first:
//!
//! | Form                | Meaning                                  |
//! |---------------------|------------------------------------------|
//! | `A B C`             | Sequence (a chain of elements)            |
//! | `A or B`            | Alternation between neighbouring elements |
//! | `A = @x`, `A = $s`  | Capture / subroutine definition           |
//! | `at least 2 A`      | Quantifier prefix, optional `fewest`      |
//! | `'lit'`, `digit`... | Primaries                                 |

use crate::error::ParseError;
use crate::lexer::{Keyword, TokenKind, Tokens};

use super::ast::*;

/// Parse one pattern chain from `tokens`, adding its nodes to `arena`.
///
/// Stops before the first token that cannot start an element (a statement
/// keyword, `with`, `)` or end of input). An empty pattern is an error.
pub fn parse_pattern(tokens: &mut Tokens, arena: &mut PatternArena) -> Result<NodeId, ParseError> {
    PatternParser { tokens, arena }.parse_chain()
}

struct PatternParser<'a> {
    tokens: &'a mut Tokens,
    arena: &'a mut PatternArena,
}

impl PatternParser<'_> {
    fn parse_chain(&mut self) -> Result<NodeId, ParseError> {
        let mut elements = Vec::new();
        while !self.at_chain_end() {
            elements.push(self.parse_element()?);
        }
        self.arena
            .link(&elements)
            .ok_or_else(|| self.tokens.unexpected("a pattern"))
    }

    fn at_chain_end(&self) -> bool {
        matches!(
            self.tokens.peek_kind(),
            TokenKind::Eof
                | TokenKind::RParen
                | TokenKind::Keyword(
                    Keyword::Find
                        | Keyword::Replace
                        | Keyword::Use
                        | Keyword::Repeat
                        | Keyword::Set
                        | Keyword::With
                )
        )
    }

    /// `unary ('or' element)?`, right associative.
    fn parse_element(&mut self) -> Result<NodeId, ParseError> {
        let lhs = self.parse_unary()?;
        if self.tokens.eat_keyword(Keyword::Or) {
            let rhs = self.parse_element()?;
            return Ok(self.arena.push(NodeKind::Alternation { lhs, rhs }));
        }
        Ok(lhs)
    }

    /// A quantified primary followed by any number of `= @name` / `= $name`.
    fn parse_unary(&mut self) -> Result<NodeId, ParseError> {
        let mut node = self.parse_quantified()?;
        while self.tokens.eat(&TokenKind::Assign) {
            let kind = match self.tokens.peek_kind().clone() {
                TokenKind::Variable(name) => NodeKind::Capture { name, body: node },
                TokenKind::Subroutine(name) => NodeKind::SubDef { name, body: node },
                _ => {
                    return Err(self
                        .tokens
                        .unexpected("a variable or subroutine name after '='"));
                }
            };
            self.tokens.next();
            node = self.arena.push(kind);
        }
        Ok(node)
    }

    fn parse_quantified(&mut self) -> Result<NodeId, ParseError> {
        let Some(quantifier) = self.parse_quantifier()? else {
            return self.parse_primary();
        };
        let body = self.parse_primary()?;
        let fewest = self.tokens.eat_keyword(Keyword::Fewest);
        Ok(self.arena.push(NodeKind::Repeat {
            quantifier,
            fewest,
            body,
        }))
    }

    /// Try to parse a quantifier prefix. Returns `None` if the next token does
    /// not start one.
    fn parse_quantifier(&mut self) -> Result<Option<Quantifier>, ParseError> {
        let quantifier = match self.tokens.peek_kind() {
            TokenKind::Keyword(Keyword::At) => {
                self.tokens.next();
                if self.tokens.eat_keyword(Keyword::Least) {
                    Quantifier::AtLeast(self.tokens.expect_count()?)
                } else if self.tokens.eat_keyword(Keyword::Most) {
                    Quantifier::AtMost(self.tokens.expect_count()?)
                } else {
                    return Err(self.tokens.unexpected("'least' or 'most'"));
                }
            }
            TokenKind::Keyword(Keyword::Between) => {
                self.tokens.next();
                let pos = self.tokens.peek().pos;
                let lo = self.tokens.expect_count()?;
                self.tokens.expect_keyword(Keyword::And)?;
                let hi = self.tokens.expect_count()?;
                if lo > hi {
                    return Err(ParseError::new(
                        format!("invalid range: between {lo} and {hi}"),
                        pos,
                    ));
                }
                Quantifier::Between(lo, hi)
            }
            TokenKind::Keyword(Keyword::Exactly) => {
                self.tokens.next();
                Quantifier::Exactly(self.tokens.expect_count()?)
            }
            TokenKind::Keyword(Keyword::Maybe) => {
                self.tokens.next();
                Quantifier::Between(0, 1)
            }
            TokenKind::Number(_) => Quantifier::Exactly(self.tokens.expect_count()?),
            _ => return Ok(None),
        };
        Ok(Some(quantifier))
    }

    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        if let Some(class) = self.eat_class() {
            return Ok(self.arena.push(NodeKind::Class {
                class,
                negated: false,
            }));
        }
        let token = self.tokens.peek().clone();
        let kind = match token.kind {
            TokenKind::Str(_) => self.parse_string_primary(false)?,
            TokenKind::Keyword(Keyword::Not) => {
                self.tokens.next();
                self.parse_negated()?
            }
            TokenKind::Keyword(Keyword::In) => {
                self.tokens.next();
                self.parse_in_list(false)?
            }
            TokenKind::Keyword(Keyword::Sol) => self.anchor(Anchor::LineStart),
            TokenKind::Keyword(Keyword::Eol) => self.anchor(Anchor::LineEnd),
            TokenKind::Keyword(Keyword::Sof) => self.anchor(Anchor::FileStart),
            TokenKind::Keyword(Keyword::Eof) => self.anchor(Anchor::FileEnd),
            TokenKind::Keyword(Keyword::Line) => {
                self.tokens.next();
                NodeKind::Anchor(self.parse_anchor_side(Anchor::LineStart, Anchor::LineEnd)?)
            }
            TokenKind::Keyword(Keyword::File) => {
                self.tokens.next();
                NodeKind::Anchor(self.parse_anchor_side(Anchor::FileStart, Anchor::FileEnd)?)
            }
            TokenKind::Variable(name) => {
                self.tokens.next();
                NodeKind::VarRef(name)
            }
            TokenKind::Subroutine(name) => {
                self.tokens.next();
                NodeKind::SubCall(name)
            }
            TokenKind::LParen => {
                self.tokens.next();
                let head = self.parse_chain()?;
                self.tokens.expect(&TokenKind::RParen)?;
                NodeKind::Group(head)
            }
            _ => return Err(self.tokens.unexpected("a pattern element")),
        };
        Ok(self.arena.push(kind))
    }

    fn anchor(&mut self, anchor: Anchor) -> NodeKind {
        self.tokens.next();
        NodeKind::Anchor(anchor)
    }

    fn parse_anchor_side(&mut self, start: Anchor, end: Anchor) -> Result<Anchor, ParseError> {
        if self.tokens.eat_keyword(Keyword::Start) {
            Ok(start)
        } else if self.tokens.eat_keyword(Keyword::End) {
            Ok(end)
        } else {
            Err(self.tokens.unexpected("'start' or 'end'"))
        }
    }

    /// Whatever follows `not`: a string, range, class or `in` list.
    fn parse_negated(&mut self) -> Result<NodeKind, ParseError> {
        if let Some(class) = self.eat_class() {
            return Ok(NodeKind::Class {
                class,
                negated: true,
            });
        }
        match self.tokens.peek_kind() {
            TokenKind::Str(_) => self.parse_string_primary(true),
            TokenKind::Keyword(Keyword::In) => {
                self.tokens.next();
                self.parse_in_list(true)
            }
            _ => Err(self
                .tokens
                .unexpected("a string, range, character class or 'in' after 'not'")),
        }
    }

    /// `'lit'` or `'lo' to 'hi'`.
    fn parse_string_primary(&mut self, negated: bool) -> Result<NodeKind, ParseError> {
        let lo = self.tokens.expect_string()?;
        if self.tokens.eat_keyword(Keyword::To) {
            let hi = self.tokens.expect_string()?;
            return Ok(NodeKind::Range { lo, hi, negated });
        }
        Ok(NodeKind::Literal { bytes: lo, negated })
    }

    /// `in item (',' item)*` where each item is a string, range or class.
    fn parse_in_list(&mut self, negated: bool) -> Result<NodeKind, ParseError> {
        let mut items = Vec::new();
        loop {
            let kind = match self.eat_class() {
                Some(class) => NodeKind::Class {
                    class,
                    negated: false,
                },
                None if matches!(self.tokens.peek_kind(), TokenKind::Str(_)) => {
                    self.parse_string_primary(false)?
                }
                None => return Err(self.tokens.unexpected("a string, range or class in 'in' list")),
            };
            items.push(self.arena.push(kind));
            if !self.tokens.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(NodeKind::In { items, negated })
    }
}

impl PatternParser<'_> {
    /// Consume a character class keyword if one is next.
    fn eat_class(&mut self) -> Option<ByteClass> {
        let &TokenKind::Keyword(kw) = self.tokens.peek_kind() else {
            return None;
        };
        let class = class_for(kw)?;
        self.tokens.next();
        Some(class)
    }
}

fn class_for(kw: Keyword) -> Option<ByteClass> {
    match kw {
        Keyword::Digit => Some(ByteClass::Digit),
        Keyword::Letter => Some(ByteClass::Letter),
        Keyword::Upper => Some(ByteClass::Upper),
        Keyword::Lower => Some(ByteClass::Lower),
        Keyword::Whitespace => Some(ByteClass::Whitespace),
        Keyword::Any => Some(ByteClass::Any),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_ok(s: &str) -> (PatternArena, NodeId) {
        let mut tokens = Tokens::new(tokenize(s).unwrap());
        let mut arena = PatternArena::new();
        let head = parse_pattern(&mut tokens, &mut arena).expect("parse should succeed");
        (arena, head)
    }

    fn parse_err(s: &str) -> ParseError {
        let mut tokens = Tokens::new(tokenize(s).unwrap());
        let mut arena = PatternArena::new();
        parse_pattern(&mut tokens, &mut arena).expect_err("parse should fail")
    }

    fn chain_kinds(arena: &PatternArena, head: NodeId) -> Vec<&NodeKind> {
        arena.chain(head).map(|id| &arena.get(id).kind).collect()
    }

    // --- Primaries ---

    #[test]
    fn test_literal() {
        let (arena, head) = parse_ok("'yay'");
        match chain_kinds(&arena, head)[..] {
            [NodeKind::Literal { bytes, negated }] => {
                assert_eq!(bytes, b"yay");
                assert!(!negated);
            }
            _ => panic!("expected Literal"),
        }
    }

    #[test]
    fn test_negated_literal() {
        let (arena, head) = parse_ok("not 'yay'");
        assert!(matches!(
            chain_kinds(&arena, head)[..],
            [NodeKind::Literal { negated: true, .. }]
        ));
    }

    #[test]
    fn test_range() {
        let (arena, head) = parse_ok("'a' to 'z'");
        match chain_kinds(&arena, head)[..] {
            [NodeKind::Range { lo, hi, negated }] => {
                assert_eq!(lo, b"a");
                assert_eq!(hi, b"z");
                assert!(!negated);
            }
            _ => panic!("expected Range"),
        }
    }

    #[test]
    fn test_classes_and_anchors() {
        let (arena, head) = parse_ok("sol digit not letter line end file start");
        let kinds = chain_kinds(&arena, head);
        assert_eq!(kinds.len(), 5);
        assert!(matches!(kinds[0], NodeKind::Anchor(Anchor::LineStart)));
        assert!(matches!(
            kinds[1],
            NodeKind::Class {
                class: ByteClass::Digit,
                negated: false
            }
        ));
        assert!(matches!(
            kinds[2],
            NodeKind::Class {
                class: ByteClass::Letter,
                negated: true
            }
        ));
        assert!(matches!(kinds[3], NodeKind::Anchor(Anchor::LineEnd)));
        assert!(matches!(kinds[4], NodeKind::Anchor(Anchor::FileStart)));
    }

    #[test]
    fn test_in_list() {
        let (arena, head) = parse_ok("not in 'a' to 'f', '_', digit");
        match chain_kinds(&arena, head)[..] {
            [NodeKind::In { items, negated }] => {
                assert!(*negated);
                assert_eq!(items.len(), 3);
                assert!(matches!(arena.get(items[0]).kind, NodeKind::Range { .. }));
                assert!(matches!(arena.get(items[2]).kind, NodeKind::Class { .. }));
            }
            _ => panic!("expected In"),
        }
    }

    // --- Quantifiers ---

    #[test]
    fn test_between_fewest() {
        let (arena, head) = parse_ok("between 2 and 4 'wow' fewest");
        match chain_kinds(&arena, head)[..] {
            [NodeKind::Repeat {
                quantifier, fewest, ..
            }] => {
                assert_eq!(*quantifier, Quantifier::Between(2, 4));
                assert!(*fewest);
            }
            _ => panic!("expected Repeat"),
        }
    }

    #[test]
    fn test_quantifier_forms() {
        let (arena, head) = parse_ok("at least 1 digit at most 3 letter exactly 2 'x' 4 'y' maybe 'z'");
        let quantifiers: Vec<Quantifier> = chain_kinds(&arena, head)
            .into_iter()
            .map(|k| match k {
                NodeKind::Repeat { quantifier, .. } => *quantifier,
                _ => panic!("expected Repeat"),
            })
            .collect();
        assert_eq!(
            quantifiers,
            vec![
                Quantifier::AtLeast(1),
                Quantifier::AtMost(3),
                Quantifier::Exactly(2),
                Quantifier::Exactly(4),
                Quantifier::Between(0, 1),
            ]
        );
    }

    // --- Alternation, capture, subroutines ---

    #[test]
    fn test_capture_of_group_alternation() {
        let (arena, head) = parse_ok("('error' or 'success') = @word");
        match chain_kinds(&arena, head)[..] {
            [NodeKind::Capture { name, body }] => {
                assert_eq!(name, "word");
                let NodeKind::Group(inner) = arena.get(*body).kind else {
                    panic!("expected Group");
                };
                assert!(matches!(
                    arena.get(inner).kind,
                    NodeKind::Alternation { .. }
                ));
            }
            _ => panic!("expected Capture"),
        }
    }

    #[test]
    fn test_alternation_binds_neighbours() {
        let (arena, head) = parse_ok("'a' 'b' or 'c' 'd'");
        let kinds = chain_kinds(&arena, head);
        assert_eq!(kinds.len(), 3);
        assert!(matches!(kinds[1], NodeKind::Alternation { .. }));
    }

    #[test]
    fn test_recursive_subroutine_definition() {
        let (arena, head) = parse_ok("('a' at least 0 $sub 'b') = $sub");
        match chain_kinds(&arena, head)[..] {
            [NodeKind::SubDef { name, body }] => {
                assert_eq!(name, "sub");
                let NodeKind::Group(inner) = arena.get(*body).kind else {
                    panic!("expected Group");
                };
                assert_eq!(arena.chain(inner).count(), 3);
            }
            _ => panic!("expected SubDef"),
        }
    }

    #[test]
    fn test_stops_at_statement_keyword() {
        let mut tokens = Tokens::new(tokenize("'a' find all 'b'").unwrap());
        let mut arena = PatternArena::new();
        let head = parse_pattern(&mut tokens, &mut arena).unwrap();
        assert_eq!(arena.chain(head).count(), 1);
        assert!(tokens.at_keyword(Keyword::Find));
    }

    // --- Errors ---

    #[test]
    fn test_empty_pattern() {
        assert!(parse_err("").message.contains("expected a pattern"));
    }

    #[test]
    fn test_unclosed_group() {
        assert!(parse_err("('a'").message.contains("')'"));
    }

    #[test]
    fn test_invalid_between() {
        assert!(parse_err("between 5 and 2 'a'").message.contains("invalid range"));
    }

    #[test]
    fn test_bad_capture_target() {
        assert!(parse_err("'a' = 'b'").message.contains("after '='"));
    }

    #[test]
    fn test_not_before_anchor() {
        assert!(parse_err("not sol").message.contains("after 'not'"));
    }
}
