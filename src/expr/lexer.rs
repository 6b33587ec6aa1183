// src/expr/lexer.rs

//! Tokenizer for guard / condition expressions.

use super::error::EvalError;
use super::value::parse_number;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Num(f64),
    True,
    False,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    Comma,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token in the source text.
    pub position: usize,
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, EvalError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let (kind, len) = match c {
            b'(' => (TokenKind::LParen, 1),
            b')' => (TokenKind::RParen, 1),
            b',' => (TokenKind::Comma, 1),
            b'&' if peek(bytes, pos + 1) == Some(b'&') => (TokenKind::And, 2),
            b'|' if peek(bytes, pos + 1) == Some(b'|') => (TokenKind::Or, 2),
            b'=' if peek(bytes, pos + 1) == Some(b'=') => (TokenKind::Eq, 2),
            b'!' if peek(bytes, pos + 1) == Some(b'=') => (TokenKind::Ne, 2),
            b'!' => (TokenKind::Not, 1),
            b'<' if peek(bytes, pos + 1) == Some(b'=') => (TokenKind::Le, 2),
            b'<' => (TokenKind::Lt, 1),
            b'>' if peek(bytes, pos + 1) == Some(b'=') => (TokenKind::Ge, 2),
            b'>' => (TokenKind::Gt, 1),
            b'\'' | b'"' => {
                let (text, consumed) = lex_string(src, pos)?;
                (TokenKind::Str(text), consumed)
            }
            b'0'..=b'9' => lex_number(src, pos)?,
            b'-' if peek(bytes, pos + 1).is_some_and(|b| b.is_ascii_digit()) => {
                lex_number(src, pos)?
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let len = bytes[pos..]
                    .iter()
                    .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
                    .count();
                let word = &src[pos..pos + len];
                let kind = match word {
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    _ => TokenKind::Ident(word.to_string()),
                };
                (kind, len)
            }
            b'&' | b'|' | b'=' => {
                return Err(EvalError::syntax(
                    start,
                    format!("unexpected '{}', did you mean '{0}{0}'?", c as char),
                ));
            }
            _ => {
                let ch = src[pos..].chars().next().unwrap_or('?');
                return Err(EvalError::syntax(start, format!("unexpected character '{ch}'")));
            }
        };

        tokens.push(Token {
            kind,
            position: start,
        });
        pos += len;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: src.len(),
    });
    Ok(tokens)
}

fn peek(bytes: &[u8], pos: usize) -> Option<u8> {
    bytes.get(pos).copied()
}

/// Lex a quoted string starting at `start`. Returns the unescaped text and
/// the number of bytes consumed (quotes included).
fn lex_string(src: &str, start: usize) -> Result<(String, usize), EvalError> {
    let mut chars = src[start..].char_indices();
    let (_, quote) = chars.next().unwrap_or((0, '"'));
    let mut out = String::new();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
            }
            c if c == quote => return Ok((out, offset + c.len_utf8())),
            c => out.push(c),
        }
    }

    Err(EvalError::syntax(start, "unterminated string literal"))
}

fn lex_number(src: &str, start: usize) -> Result<(TokenKind, usize), EvalError> {
    let bytes = src.as_bytes();
    let mut len = if bytes[start] == b'-' { 1 } else { 0 };
    len += bytes[start + len..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .count();

    let text = &src[start..start + len];
    match parse_number(text) {
        Some(n) => Ok((TokenKind::Num(n), len)),
        None => Err(EvalError::syntax(start, format!("invalid number '{text}'"))),
    }
}
