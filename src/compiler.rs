//! Recursive descent compiler for vore programs.
//!
//! Transforms source text into a [`Program`]: a list of statements plus the
//! pattern arena they share. Pattern and expression syntax are handled by
//! [`crate::pattern::parser`] and [`crate::expr`]; this module parses the
//! statement layer around them.

use std::path::PathBuf;

use crate::code::*;
use crate::error::ParseError;
use crate::expr::{parse_expr, parse_replacement};
use crate::lexer::{Keyword, TokenKind, Tokens, tokenize};
use crate::pattern::{Amount, PatternArena, parse_pattern};

/// Compile vore source text into a [`Program`].
pub fn compile(source: &str) -> Result<Program, ParseError> {
    let mut compiler = Compiler {
        tokens: Tokens::new(tokenize(source)?),
        arena: PatternArena::new(),
    };
    let mut statements = Vec::new();
    while *compiler.tokens.peek_kind() != TokenKind::Eof {
        statements.push(compiler.compile_statement()?);
    }
    Ok(Program {
        statements,
        arena: compiler.arena,
    })
}

struct Compiler {
    tokens: Tokens,
    arena: PatternArena,
}

impl Compiler {
    /// Parse one statement, dispatching on its leading keyword.
    fn compile_statement(&mut self) -> Result<Statement, ParseError> {
        let TokenKind::Keyword(kw) = *self.tokens.peek_kind() else {
            return Err(self.tokens.unexpected("a statement"));
        };
        match kw {
            Keyword::Find => {
                self.tokens.next();
                let amount = self.parse_amount()?;
                let pattern = parse_pattern(&mut self.tokens, &mut self.arena)?;
                Ok(Statement::Find { amount, pattern })
            }
            Keyword::Replace => {
                self.tokens.next();
                let amount = self.parse_amount()?;
                let pattern = parse_pattern(&mut self.tokens, &mut self.arena)?;
                self.tokens.expect_keyword(Keyword::With)?;
                let replacement = parse_replacement(&mut self.tokens)?;
                Ok(Statement::Replace {
                    amount,
                    pattern,
                    replacement,
                })
            }
            Keyword::Use => {
                self.tokens.next();
                let mut paths = vec![self.parse_path()?];
                while self.tokens.eat(&TokenKind::Comma) {
                    paths.push(self.parse_path()?);
                }
                Ok(Statement::Use(paths))
            }
            Keyword::Repeat => {
                self.tokens.next();
                let times = self.tokens.expect_count()?;
                let body = self.compile_statement()?;
                Ok(Statement::Repeat {
                    times,
                    body: Box::new(body),
                })
            }
            Keyword::Set => {
                self.tokens.next();
                self.compile_set()
            }
            _ => Err(self.tokens.unexpected("a statement")),
        }
    }

    /// `set @name to expr` or `set $name to pattern ...`, after `set`.
    fn compile_set(&mut self) -> Result<Statement, ParseError> {
        match self.tokens.peek_kind().clone() {
            TokenKind::Variable(name) => {
                self.tokens.next();
                self.tokens.expect_keyword(Keyword::To)?;
                let value = parse_expr(&mut self.tokens)?;
                Ok(Statement::SetVariable { name, value })
            }
            TokenKind::Subroutine(name) => {
                self.tokens.next();
                self.tokens.expect_keyword(Keyword::To)?;
                self.tokens.expect_keyword(Keyword::Pattern)?;
                let pattern = parse_pattern(&mut self.tokens, &mut self.arena)?;
                Ok(Statement::SetSubroutine { name, pattern })
            }
            _ => Err(self.tokens.unexpected("@variable or $subroutine")),
        }
    }

    /// `all`, `top N`, `take N`, `skip N` or `skip N take M`.
    fn parse_amount(&mut self) -> Result<Amount, ParseError> {
        if self.tokens.eat_keyword(Keyword::All) {
            return Ok(Amount::all());
        }
        if self.tokens.eat_keyword(Keyword::Top) || self.tokens.eat_keyword(Keyword::Take) {
            return Ok(Amount::top(self.tokens.expect_count()?));
        }
        if self.tokens.eat_keyword(Keyword::Skip) {
            let skip = self.tokens.expect_count()?;
            let take = if self.tokens.eat_keyword(Keyword::Take) {
                Some(self.tokens.expect_count()?)
            } else {
                None
            };
            return Ok(Amount { skip, take });
        }
        Err(self.tokens.unexpected("an amount ('all', 'top N', 'skip N')"))
    }

    fn parse_path(&mut self) -> Result<PathBuf, ParseError> {
        let bytes = self.tokens.expect_string()?;
        Ok(PathBuf::from(String::from_utf8_lossy(&bytes).into_owned()))
    }
}
