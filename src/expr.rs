//! Replacement expressions: AST and parser.
//!
//! Precedence, loosest first:
//!
//! | Level          | Operators                          |
//! |----------------|------------------------------------|
//! | or             | `or`                               |
//! | and            | `and`                              |
//! | comparison     | `==` `!=` `<` `>` `<=` `>=`        |
//! | additive       | `+` `-`                            |
//! | multiplicative | `*` `/` `%`                        |
//! | unary          | `not` `-`                          |
//! | call           | `f(x, y)`                          |
//!
//! Atoms are strings, numbers, `true`/`false`, `@variables`, builtin function
//! names, `( expr )`, `case when ... then ... otherwise ... end` and
//! `func(@a, @b) body`.

use std::fmt;
use std::rc::Rc;

use crate::error::ParseError;
use crate::lexer::{Keyword, TokenKind, Tokens};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Number(f64),
    Bool(bool),
    Var(String),
    Builtin(Builtin),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `case when c1 then e1 ... otherwise d end`
    Case {
        arms: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
    Lambda(Rc<Lambda>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
}

/// `func(@a, @b) body`
#[derive(Debug, PartialEq)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Functions available to every program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Upper,
    Lower,
    Length,
    Trim,
    Number,
    String,
}

impl Builtin {
    fn from_ident(name: &str) -> Option<Self> {
        match name {
            "length" => Some(Builtin::Length),
            "trim" => Some(Builtin::Trim),
            "number" => Some(Builtin::Number),
            "string" => Some(Builtin::String),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Upper => "upper",
            Builtin::Lower => "lower",
            Builtin::Length => "length",
            Builtin::Trim => "trim",
            Builtin::Number => "number",
            Builtin::String => "string",
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse one expression.
pub fn parse_expr(tokens: &mut Tokens) -> Result<Expr, ParseError> {
    ExprParser { tokens }.parse_or()
}

/// Parse the juxtaposed expressions after `with`; at least one is required.
pub fn parse_replacement(tokens: &mut Tokens) -> Result<Vec<Expr>, ParseError> {
    let mut parts = vec![parse_expr(tokens)?];
    while starts_expr(tokens.peek_kind()) {
        parts.push(parse_expr(tokens)?);
    }
    Ok(parts)
}

/// Can `kind` begin an expression?
fn starts_expr(kind: &TokenKind) -> bool {
    match kind {
        TokenKind::Str(_)
        | TokenKind::Number(_)
        | TokenKind::Variable(_)
        | TokenKind::Ident(_)
        | TokenKind::LParen
        | TokenKind::Minus => true,
        TokenKind::Keyword(kw) => matches!(
            kw,
            Keyword::True
                | Keyword::False
                | Keyword::Upper
                | Keyword::Lower
                | Keyword::Case
                | Keyword::Func
                | Keyword::Not
        ),
        _ => false,
    }
}

struct ExprParser<'t> {
    tokens: &'t mut Tokens,
}

impl ExprParser<'_> {
    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.tokens.eat_keyword(Keyword::Or) {
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_comparison()?;
        while self.tokens.eat_keyword(Keyword::And) {
            let rhs = self.parse_comparison()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_additive()?;
        let op = match self.tokens.peek_kind() {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::GtEq => BinaryOp::GtEq,
            _ => return Ok(lhs),
        };
        self.tokens.next();
        let rhs = self.parse_additive()?;
        Ok(binary(op, lhs, rhs))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.tokens.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.tokens.next();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.tokens.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.tokens.next();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = if self.tokens.eat_keyword(Keyword::Not) {
            UnaryOp::Not
        } else if self.tokens.eat(&TokenKind::Minus) {
            UnaryOp::Neg
        } else {
            return self.parse_call();
        };
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_call(&mut self) -> Result<Expr, ParseError> {
        let mut callee = self.parse_atom()?;
        while self.tokens.eat(&TokenKind::LParen) {
            let mut args = Vec::new();
            if !self.tokens.eat(&TokenKind::RParen) {
                loop {
                    args.push(self.parse_or()?);
                    if self.tokens.eat(&TokenKind::RParen) {
                        break;
                    }
                    self.tokens.expect(&TokenKind::Comma)?;
                }
            }
            callee = Expr::Call {
                callee: Box::new(callee),
                args,
            };
        }
        Ok(callee)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let token = self.tokens.peek().clone();
        let expr = match token.kind {
            TokenKind::Str(bytes) => Expr::Str(String::from_utf8_lossy(&bytes).into_owned()),
            TokenKind::Number(text) => {
                let n = text.parse::<f64>().map_err(|_| {
                    ParseError::new(format!("invalid number {text}"), token.pos)
                })?;
                Expr::Number(n)
            }
            TokenKind::Variable(name) => Expr::Var(name),
            TokenKind::Keyword(Keyword::True) => Expr::Bool(true),
            TokenKind::Keyword(Keyword::False) => Expr::Bool(false),
            TokenKind::Keyword(Keyword::Upper) => Expr::Builtin(Builtin::Upper),
            TokenKind::Keyword(Keyword::Lower) => Expr::Builtin(Builtin::Lower),
            TokenKind::Ident(name) => match Builtin::from_ident(&name) {
                Some(builtin) => Expr::Builtin(builtin),
                None => {
                    return Err(ParseError::new(
                        format!("unknown function '{name}'"),
                        token.pos,
                    ));
                }
            },
            TokenKind::LParen => {
                self.tokens.next();
                let inner = self.parse_or()?;
                self.tokens.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::Keyword(Keyword::Case) => {
                self.tokens.next();
                return self.parse_case();
            }
            TokenKind::Keyword(Keyword::Func) => {
                self.tokens.next();
                return self.parse_lambda();
            }
            _ => return Err(self.tokens.unexpected("an expression")),
        };
        self.tokens.next();
        Ok(expr)
    }

    /// After `case`.
    fn parse_case(&mut self) -> Result<Expr, ParseError> {
        let mut arms = Vec::new();
        while self.tokens.eat_keyword(Keyword::When) {
            let guard = self.parse_or()?;
            self.tokens.expect_keyword(Keyword::Then)?;
            let value = self.parse_or()?;
            arms.push((guard, value));
        }
        if arms.is_empty() {
            return Err(self.tokens.unexpected("'when'"));
        }
        let otherwise = if self.tokens.eat_keyword(Keyword::Otherwise) {
            Some(Box::new(self.parse_or()?))
        } else {
            None
        };
        self.tokens.expect_keyword(Keyword::End)?;
        Ok(Expr::Case { arms, otherwise })
    }

    /// After `func`.
    fn parse_lambda(&mut self) -> Result<Expr, ParseError> {
        self.tokens.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.tokens.eat(&TokenKind::RParen) {
            loop {
                match self.tokens.peek_kind().clone() {
                    TokenKind::Variable(name) => {
                        self.tokens.next();
                        params.push(name);
                    }
                    _ => return Err(self.tokens.unexpected("a parameter like @name")),
                }
                if self.tokens.eat(&TokenKind::RParen) {
                    break;
                }
                self.tokens.expect(&TokenKind::Comma)?;
            }
        }
        let body = self.parse_or()?;
        Ok(Expr::Lambda(Rc::new(Lambda { params, body })))
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
