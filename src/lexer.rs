//! Tokeniser for vore source text.
//!
//! Keywords are looked up in a static `phf` table; everything that is not a
//! keyword and starts with a letter is an identifier. `--` starts a comment
//! that runs to the end of the line.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use itertools::Itertools;
use phf::{Map, phf_map};

use crate::error::{ParseError, SourcePos};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    // Statements
    Find,
    Replace,
    With,
    Use,
    Repeat,
    Set,
    To,
    Pattern,

    // Amounts
    All,
    Skip,
    Take,
    Top,

    // Quantifiers
    At,
    Least,
    Most,
    Between,
    And,
    Exactly,
    Maybe,
    Fewest,

    // Pattern operators
    Or,
    Not,
    In,

    // Anchors
    Sol,
    Eol,
    Sof,
    Eof,
    Line,
    File,
    Start,
    End,

    // Character classes
    Digit,
    Letter,
    Upper,
    Lower,
    Whitespace,
    Any,

    // Expressions
    Case,
    When,
    Then,
    Otherwise,
    True,
    False,
    Func,
}

static KEYWORDS: Map<&'static str, Keyword> = phf_map! {
    "find" => Keyword::Find,
    "replace" => Keyword::Replace,
    "with" => Keyword::With,
    "use" => Keyword::Use,
    "repeat" => Keyword::Repeat,
    "set" => Keyword::Set,
    "to" => Keyword::To,
    "pattern" => Keyword::Pattern,
    "all" => Keyword::All,
    "skip" => Keyword::Skip,
    "take" => Keyword::Take,
    "top" => Keyword::Top,
    "at" => Keyword::At,
    "least" => Keyword::Least,
    "most" => Keyword::Most,
    "between" => Keyword::Between,
    "and" => Keyword::And,
    "exactly" => Keyword::Exactly,
    "maybe" => Keyword::Maybe,
    "fewest" => Keyword::Fewest,
    "or" => Keyword::Or,
    "not" => Keyword::Not,
    "in" => Keyword::In,
    "sol" => Keyword::Sol,
    "eol" => Keyword::Eol,
    "sof" => Keyword::Sof,
    "eof" => Keyword::Eof,
    "line" => Keyword::Line,
    "file" => Keyword::File,
    "start" => Keyword::Start,
    "end" => Keyword::End,
    "digit" => Keyword::Digit,
    "letter" => Keyword::Letter,
    "upper" => Keyword::Upper,
    "lower" => Keyword::Lower,
    "whitespace" => Keyword::Whitespace,
    "any" => Keyword::Any,
    "case" => Keyword::Case,
    "when" => Keyword::When,
    "then" => Keyword::Then,
    "otherwise" => Keyword::Otherwise,
    "true" => Keyword::True,
    "false" => Keyword::False,
    "func" => Keyword::Func,
};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Ident(String),
    /// `@name`
    Variable(String),
    /// `$name`
    Subroutine(String),
    /// A quoted string, escapes already decoded.
    Str(Vec<u8>),
    /// Digits as written, optionally with one `.` (expressions only).
    Number(String),
    LParen,
    RParen,
    Comma,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword(kw) => {
                let name = KEYWORDS
                    .entries()
                    .find(|(_, k)| *k == kw)
                    .map(|(name, _)| *name)
                    .unwrap_or("keyword");
                write!(f, "'{name}'")
            }
            TokenKind::Ident(name) => write!(f, "'{name}'"),
            TokenKind::Variable(name) => write!(f, "'@{name}'"),
            TokenKind::Subroutine(name) => write!(f, "'${name}'"),
            TokenKind::Str(bytes) => write!(f, "string {:?}", String::from_utf8_lossy(bytes)),
            TokenKind::Number(n) => write!(f, "number {n}"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Assign => write!(f, "'='"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::Percent => write!(f, "'%'"),
            TokenKind::EqEq => write!(f, "'=='"),
            TokenKind::NotEq => write!(f, "'!='"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::LtEq => write!(f, "'<='"),
            TokenKind::GtEq => write!(f, "'>='"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: SourcePos,
}

/// Split `source` into tokens. The result always ends with [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer {
        chars: source.chars().peekable(),
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl Lexer<'_> {
    fn pos(&self) -> SourcePos {
        SourcePos::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace_and_comments();
        let pos = self.pos();
        let Some(&ch) = self.chars.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos,
            });
        };

        let kind = match ch {
            '\'' | '"' => TokenKind::Str(self.lex_string(pos)?),
            '@' | '$' => {
                self.bump();
                let name = self.take_word();
                if name.is_empty() {
                    return Err(ParseError::new(
                        format!("expected a name after '{ch}'"),
                        pos,
                    ));
                }
                if ch == '@' {
                    TokenKind::Variable(name)
                } else {
                    TokenKind::Subroutine(name)
                }
            }
            c if c.is_ascii_digit() => TokenKind::Number(self.lex_number()),
            c if c.is_alphabetic() || c == '_' => {
                let word = self.take_word();
                match KEYWORDS.get(word.as_str()) {
                    Some(kw) => TokenKind::Keyword(*kw),
                    None => TokenKind::Ident(word),
                }
            }
            _ => {
                self.bump();
                match ch {
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    ',' => TokenKind::Comma,
                    '+' => TokenKind::Plus,
                    '-' => TokenKind::Minus,
                    '*' => TokenKind::Star,
                    '/' => TokenKind::Slash,
                    '%' => TokenKind::Percent,
                    '=' if self.eat('=') => TokenKind::EqEq,
                    '=' => TokenKind::Assign,
                    '!' if self.eat('=') => TokenKind::NotEq,
                    '<' if self.eat('=') => TokenKind::LtEq,
                    '<' => TokenKind::Lt,
                    '>' if self.eat('=') => TokenKind::GtEq,
                    '>' => TokenKind::Gt,
                    other => {
                        return Err(ParseError::new(
                            format!("unexpected character {other:?}"),
                            pos,
                        ));
                    }
                }
            }
        };
        Ok(Token { kind, pos })
    }

    fn take_word(&mut self) -> String {
        let word: String = self
            .chars
            .peeking_take_while(|&c| c.is_alphanumeric() || c == '_')
            .collect();
        self.column += word.chars().count();
        word
    }

    fn lex_number(&mut self) -> String {
        let mut text: String = self
            .chars
            .peeking_take_while(|c| c.is_ascii_digit())
            .collect();
        self.column += text.len();
        // A fraction only counts if a digit follows the dot.
        let mut ahead = self.chars.clone();
        if ahead.next() == Some('.') && ahead.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            text.push('.');
            let frac: String = self
                .chars
                .peeking_take_while(|c| c.is_ascii_digit())
                .collect();
            self.column += frac.len();
            text.push_str(&frac);
        }
        text
    }

    /// Lex a quoted string, decoding `\n`, `\t`, `\r`, `\0`, `\\`, quotes and
    /// `\xHH` escapes into raw bytes.
    fn lex_string(&mut self, start: SourcePos) -> Result<Vec<u8>, ParseError> {
        let Some(delim) = self.bump() else {
            return Err(ParseError::new("unterminated string", start));
        };
        let mut bytes = Vec::new();
        loop {
            let ch = match self.bump() {
                Some(c) if c == delim => return Ok(bytes),
                Some(c) => c,
                None => return Err(ParseError::new("unterminated string", start)),
            };
            if ch != '\\' {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                continue;
            }
            let escape_pos = self.pos();
            match self.bump() {
                Some('n') => bytes.push(b'\n'),
                Some('t') => bytes.push(b'\t'),
                Some('r') => bytes.push(b'\r'),
                Some('0') => bytes.push(0),
                Some('\\') => bytes.push(b'\\'),
                Some('\'') => bytes.push(b'\''),
                Some('"') => bytes.push(b'"'),
                Some('x') => {
                    let hex: String = (0..2).filter_map(|_| self.bump()).collect();
                    let byte = u8::from_str_radix(&hex, 16).map_err(|_| {
                        ParseError::new(format!("invalid hex escape '\\x{hex}'"), escape_pos)
                    })?;
                    bytes.push(byte);
                }
                Some(other) => {
                    return Err(ParseError::new(
                        format!("unknown escape '\\{other}'"),
                        escape_pos,
                    ));
                }
                None => return Err(ParseError::new("unterminated string", start)),
            }
        }
    }

    /// Skip whitespace and `--` comments.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.chars.peek() {
                Some(&ch) if ch.is_whitespace() => {
                    self.bump();
                }
                Some(&'-') => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    if ahead.peek() != Some(&'-') {
                        break;
                    }
                    while let Some(ch) = self.bump() {
                        if ch == '\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }
}

/// A cursor over a token list, shared by the statement, pattern and
/// expression parsers.
pub struct Tokens {
    tokens: Vec<Token>,
    idx: usize,
}

impl Tokens {
    pub fn new(tokens: Vec<Token>) -> Self {
        debug_assert!(matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof));
        Self { tokens, idx: 0 }
    }

    pub fn peek(&self) -> &Token {
        &self.tokens[self.idx.min(self.tokens.len() - 1)]
    }

    pub fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.idx += 1;
        }
        token
    }

    pub fn at_keyword(&self, kw: Keyword) -> bool {
        *self.peek_kind() == TokenKind::Keyword(kw)
    }

    pub fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.at_keyword(kw) {
            self.next();
            true
        } else {
            false
        }
    }

    pub fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.next();
            true
        } else {
            false
        }
    }

    pub fn expect_keyword(&mut self, kw: Keyword) -> Result<(), ParseError> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{}", TokenKind::Keyword(kw))))
        }
    }

    pub fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    /// Consume a whole, non-negative number.
    pub fn expect_count(&mut self) -> Result<u64, ParseError> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Number(text) => {
                let n = text.parse::<u64>().map_err(|_| {
                    ParseError::new(format!("expected a whole number, found {text}"), token.pos)
                })?;
                self.next();
                Ok(n)
            }
            _ => Err(self.unexpected("a number")),
        }
    }

    pub fn expect_string(&mut self) -> Result<Vec<u8>, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Str(bytes) => {
                self.next();
                Ok(bytes)
            }
            _ => Err(self.unexpected("a string")),
        }
    }

    /// Build an "expected X, found Y" error at the current token.
    pub fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::new(format!("expected {expected}, found {}", token.kind), token.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_strings() {
        assert_eq!(
            kinds("find all 'yay'"),
            vec![
                TokenKind::Keyword(Keyword::Find),
                TokenKind::Keyword(Keyword::All),
                TokenKind::Str(b"yay".to_vec()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_variables_and_subroutines() {
        assert_eq!(
            kinds("= @word $sub"),
            vec![
                TokenKind::Assign,
                TokenKind::Variable("word".into()),
                TokenKind::Subroutine("sub".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            kinds(r#""a\n\x41\"""#),
            vec![TokenKind::Str(b"a\nA\"".to_vec()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("12 3.5"),
            vec![
                TokenKind::Number("12".into()),
                TokenKind::Number("3.5".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("== != <= >= < > + - * / %"),
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("find -- ignore me\nall"),
            vec![
                TokenKind::Keyword(Keyword::Find),
                TokenKind::Keyword(Keyword::All),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("find\n  all").unwrap();
        assert_eq!(tokens[0].pos, SourcePos::new(1, 1));
        assert_eq!(tokens[1].pos, SourcePos::new(2, 3));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("find all 'oops").unwrap_err();
        assert_eq!(err.pos, SourcePos::new(1, 10));
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_unknown_character() {
        assert!(tokenize("find all #").is_err());
    }
}
