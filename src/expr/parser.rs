// src/expr/parser.rs

//! Recursive-descent parser.
//!
//! Precedence, lowest to highest:
//!
//! ```text
//! or         := and ( "||" and )*
//! and        := not ( "&&" not )*
//! not        := "!" not | comparison
//! comparison := primary ( ("==" | "!=" | "<" | "<=" | ">" | ">=") primary )*
//! primary    := NUMBER | STRING | "true" | "false"
//!             | IDENT "(" [ or ( "," or )* ] ")"
//!             | IDENT
//!             | "(" or ")"
//! ```

use super::ast::{CompareOp, Expr};
use super::error::EvalError;
use super::lexer::{Token, TokenKind, tokenize};
use super::value::Value;

/// Limit on tree depth: parentheses, `!`, and every link of an operator chain
/// count towards it, so evaluating or dropping the tree stays within the stack.
const MAX_DEPTH: usize = 128;

/// Parse expression text into an [`Expr`].
pub fn parse(src: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };

    if parser.peek() == &TokenKind::Eof {
        return Err(EvalError::syntax(0, "empty expression"));
    }

    let expr = parser.parse_or()?;
    match parser.peek() {
        TokenKind::Eof => Ok(expr),
        TokenKind::RParen => Err(EvalError::syntax(
            parser.position(),
            "unmatched closing parenthesis",
        )),
        other => Err(EvalError::syntax(
            parser.position(),
            format!("unexpected {}", describe(other)),
        )),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        // The token list always ends with Eof and we never advance past it.
        &self.tokens[self.pos].kind
    }

    fn position(&self) -> usize {
        self.tokens[self.pos].position
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if kind != TokenKind::Eof {
            self.pos += 1;
        }
        kind
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::syntax(self.position(), "expression nested too deeply"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Each operator in a left-associative chain nests the tree one level.
    fn leave_chain(&mut self, links: usize) {
        self.depth -= links;
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        self.enter()?;
        let mut left = self.parse_and()?;
        let mut links = 0;
        while self.peek() == &TokenKind::Or {
            self.advance();
            self.enter()?;
            links += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.leave_chain(links);
        self.leave();
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_not()?;
        let mut links = 0;
        while self.peek() == &TokenKind::And {
            self.advance();
            self.enter()?;
            links += 1;
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.leave_chain(links);
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, EvalError> {
        if self.peek() == &TokenKind::Not {
            self.advance();
            self.enter()?;
            let inner = self.parse_not()?;
            self.leave();
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_primary()?;
        let mut links = 0;
        while let Some(op) = compare_op(self.peek()) {
            self.advance();
            self.enter()?;
            links += 1;
            let right = self.parse_primary()?;
            left = Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.leave_chain(links);
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        let position = self.position();
        match self.advance() {
            TokenKind::Num(n) => Ok(Expr::Literal(Value::Num(n))),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::Ident(name) => {
                if self.peek() == &TokenKind::LParen {
                    self.advance();
                    let args = self.parse_args(position)?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                match self.advance() {
                    TokenKind::RParen => Ok(inner),
                    _ => Err(EvalError::syntax(position, "unmatched opening parenthesis")),
                }
            }
            TokenKind::Eof => Err(EvalError::syntax(position, "unexpected end of expression")),
            other => Err(EvalError::syntax(
                position,
                format!("expected a value, found {}", describe(&other)),
            )),
        }
    }

    /// Arguments after the opening parenthesis of a call.
    fn parse_args(&mut self, call_position: usize) -> Result<Vec<Expr>, EvalError> {
        let mut args = Vec::new();
        if self.peek() == &TokenKind::RParen {
            self.advance();
            return Ok(args);
        }

        loop {
            args.push(self.parse_or()?);
            match self.advance() {
                TokenKind::Comma => continue,
                TokenKind::RParen => return Ok(args),
                _ => {
                    return Err(EvalError::syntax(
                        call_position,
                        "unmatched opening parenthesis in function call",
                    ));
                }
            }
        }
    }
}

fn compare_op(kind: &TokenKind) -> Option<CompareOp> {
    match kind {
        TokenKind::Eq => Some(CompareOp::Eq),
        TokenKind::Ne => Some(CompareOp::Ne),
        TokenKind::Lt => Some(CompareOp::Lt),
        TokenKind::Le => Some(CompareOp::Le),
        TokenKind::Gt => Some(CompareOp::Gt),
        TokenKind::Ge => Some(CompareOp::Ge),
        _ => None,
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(name) => format!("identifier '{name}'"),
        TokenKind::Str(s) => format!("string '{s}'"),
        TokenKind::Num(n) => format!("number {}", Value::Num(*n)),
        TokenKind::True => "'true'".to_string(),
        TokenKind::False => "'false'".to_string(),
        TokenKind::And => "'&&'".to_string(),
        TokenKind::Or => "'||'".to_string(),
        TokenKind::Not => "'!'".to_string(),
        TokenKind::Eq => "'=='".to_string(),
        TokenKind::Ne => "'!='".to_string(),
        TokenKind::Lt => "'<'".to_string(),
        TokenKind::Le => "'<='".to_string(),
        TokenKind::Gt => "'>'".to_string(),
        TokenKind::Ge => "'>='".to_string(),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Eof => "end of expression".to_string(),
    }
}
