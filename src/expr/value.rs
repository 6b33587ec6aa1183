// src/expr/value.rs

use std::cmp::Ordering;
use std::fmt;

/// Scalar value produced by expressions and stored in an
/// [`ExpressionContext`](super::ExpressionContext).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Value {
    /// Empty string, `"false"`, `false` and zero are falsy; everything else is
    /// truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Str(s) => !(s.is_empty() || s == "false"),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Str(s) => parse_number(s),
            Value::Bool(_) => None,
        }
    }

    /// Compare two values.
    ///
    /// Two strings always compare byte-wise, even if both look numeric. When
    /// at least one side is a number and the other side has a numeric view,
    /// the comparison is numeric. Everything else falls back to comparing the
    /// string forms.
    pub fn compare(&self, other: &Value) -> Ordering {
        let numeric = match (self, other) {
            (Value::Str(_), Value::Str(_)) => None,
            (Value::Num(_), _) | (_, Value::Num(_)) => self.as_number().zip(other.as_number()),
            _ => None,
        };

        match numeric {
            Some((a, b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            None => self.to_string().as_bytes().cmp(other.to_string().as_bytes()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Num(n) => f.write_str(&format_number(*n)),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Num(n as f64)
    }
}

/// Parse a plain decimal number (`42`, `-1`, `3.5`). Rejects things like
/// `inf`, `NaN` or `1e5` that `f64::from_str` would otherwise accept.
pub(crate) fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    if digits.is_empty()
        || digits.starts_with('.')
        || digits.ends_with('.')
        || !digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        || digits.matches('.').count() > 1
    {
        return None;
    }
    s.parse::<f64>().ok()
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
