//! Attribute filter language for the built-in drivers.
//!
//! A filter is a single comparison `field OP literal`, with operators
//! `=`, `!=`, `<>`, `<`, `<=`, `>`, `>=`, string literals in single
//! quotes (`''` escapes a quote) and bare numeric literals. Field names
//! are matched case-insensitively against the layer schema.

use crate::source::memory::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
}

/// A parsed filter predicate.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub field: String,
    pub op: Op,
    pub literal: Literal,
}

impl Predicate {
    /// Evaluate against one field value. NULL values never match.
    pub fn matches(&self, value: &Value) -> bool {
        match (&self.literal, value) {
            (Literal::String(lit), Value::String(v)) => compare(self.op, v.as_str().cmp(lit)),
            (Literal::Number(lit), Value::Integer(v)) => numeric(self.op, *v as f64, *lit),
            (Literal::Number(lit), Value::Real(v)) => numeric(self.op, *v, *lit),
            (_, Value::Null) => false,
            // type mismatch between literal and value
            _ => self.op == Op::Ne,
        }
    }
}

fn compare(op: Op, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        Op::Eq => ordering == Equal,
        Op::Ne => ordering != Equal,
        Op::Lt => ordering == Less,
        Op::Le => ordering != Greater,
        Op::Gt => ordering == Greater,
        Op::Ge => ordering != Less,
    }
}

fn numeric(op: Op, left: f64, right: f64) -> bool {
    match op {
        Op::Eq => left == right,
        Op::Ne => left != right,
        Op::Lt => left < right,
        Op::Le => left <= right,
        Op::Gt => left > right,
        Op::Ge => left >= right,
    }
}

/// Parse a filter expression.
pub fn parse(input: &str) -> Result<Predicate, String> {
    let mut rest = input.trim_start();

    let field_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if field_len == 0 {
        return Err("expected a field name".to_string());
    }
    let field = rest[..field_len].to_lowercase();
    rest = rest[field_len..].trim_start();

    let op = if let Some(r) = rest.strip_prefix(">=") {
        rest = r;
        Op::Ge
    } else if let Some(r) = rest.strip_prefix("<=") {
        rest = r;
        Op::Le
    } else if let Some(r) = rest.strip_prefix("<>") {
        rest = r;
        Op::Ne
    } else if let Some(r) = rest.strip_prefix("!=") {
        rest = r;
        Op::Ne
    } else if let Some(r) = rest.strip_prefix('=') {
        rest = r;
        Op::Eq
    } else if let Some(r) = rest.strip_prefix('<') {
        rest = r;
        Op::Lt
    } else if let Some(r) = rest.strip_prefix('>') {
        rest = r;
        Op::Gt
    } else {
        return Err("expected a comparison operator".to_string());
    };
    rest = rest.trim_start();

    let (literal, rest) = parse_literal(rest)?;
    if !rest.trim().is_empty() {
        return Err(format!("unexpected trailing input: {}", rest.trim()));
    }

    Ok(Predicate { field, op, literal })
}

fn parse_literal(input: &str) -> Result<(Literal, &str), String> {
    if input.is_empty() {
        return Err("expected a literal after the operator".to_string());
    }
    if let Some(rest) = input.strip_prefix('\'') {
        let mut value = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    value.push('\'');
                    chars.next();
                } else {
                    return Ok((Literal::String(value), &rest[i + 1..]));
                }
            } else {
                value.push(c);
            }
        }
        return Err("unterminated string literal".to_string());
    }

    let num_len = input
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')))
        .unwrap_or(input.len());
    let num_str = &input[..num_len];
    let number: f64 = num_str
        .parse()
        .map_err(|_| format!("invalid numeric literal: {input}"))?;
    Ok((Literal::Number(number), &input[num_len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_equality() {
        let p = parse("NAME = 'main street'").unwrap();
        assert_eq!(p.field, "name");
        assert_eq!(p.op, Op::Eq);
        assert_eq!(p.literal, Literal::String("main street".into()));
    }

    #[test]
    fn parses_escaped_quote() {
        let p = parse("name = 'o''brien'").unwrap();
        assert_eq!(p.literal, Literal::String("o'brien".into()));
    }

    #[test]
    fn parses_numeric_comparison() {
        let p = parse("lanes >= 2").unwrap();
        assert_eq!(p.op, Op::Ge);
        assert_eq!(p.literal, Literal::Number(2.0));
    }

    #[test]
    fn rejects_missing_literal() {
        let err = parse("nope =").unwrap_err();
        assert!(err.contains("literal"));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("a = 1 extra").is_err());
    }

    #[test]
    fn matches_integer_against_number_literal() {
        let p = parse("lanes > 2").unwrap();
        assert!(p.matches(&Value::Integer(3)));
        assert!(!p.matches(&Value::Integer(2)));
    }

    #[test]
    fn null_never_matches() {
        let p = parse("name != 'x'").unwrap();
        assert!(!p.matches(&Value::Null));
    }
}
