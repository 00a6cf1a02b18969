//! # Constant Expressions
//!
//! Evaluates the value text of `@member` (enum) and `@flag` units. The
//! grammar is a small subset of C integer constant expressions: literals,
//! parentheses, unary `- + ~ !`, binary `* / % + - << >> & ^ |`, and names
//! of members declared earlier in the same block. Arithmetic is checked.

use crate::ffi::error::{AnnotateError, AnnotateResult};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(i128),
    Name(String),
    Op(&'static str),
    Open,
    Close,
}

const OPERATORS: &[&str] = &["<<", ">>", "+", "-", "*", "/", "%", "&", "|", "^", "~", "!"];

struct Evaluator<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    position: usize,
    scope: &'a [(String, i128)],
}

fn invalid(expression: &str, reason: impl Into<String>) -> AnnotateError {
    AnnotateError::InvalidExpression {
        expression: expression.to_string(),
        reason: reason.into(),
    }
}

fn parse_number(expression: &str, literal: &str) -> AnnotateResult<i128> {
    let digits = literal.trim_end_matches(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'));
    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(hex) = lower.strip_prefix("0x") {
        (16, hex)
    } else if let Some(binary) = lower.strip_prefix("0b") {
        (2, binary)
    } else if let Some(octal) = lower.strip_prefix("0o") {
        (8, octal)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };
    i128::from_str_radix(body, radix)
        .map_err(|_| invalid(expression, format!("bad integer literal `{}`", literal)))
}

fn parse_char(expression: &str, chars: &[char], start: usize) -> AnnotateResult<(i128, usize)> {
    let malformed = || invalid(expression, "bad character literal");
    let (value, next) = match chars.get(start + 1) {
        Some('\\') => {
            let escaped = match chars.get(start + 2).ok_or_else(malformed)? {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                '\\' => '\\',
                '\'' => '\'',
                _ => return Err(malformed()),
            };
            (escaped, start + 3)
        }
        Some(c) if *c != '\'' => (*c, start + 2),
        _ => return Err(malformed()),
    };
    if chars.get(next) != Some(&'\'') {
        return Err(malformed());
    }
    Ok((value as i128, next + 1))
}

fn lex(expression: &str) -> AnnotateResult<Vec<Token>> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '(' {
            tokens.push(Token::Open);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::Close);
            i += 1;
        } else if c == '\'' {
            let (value, next) = parse_char(expression, &chars, i)?;
            tokens.push(Token::Number(value));
            i = next;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                i += 1;
            }
            let literal: String = chars[start..i].iter().collect();
            tokens.push(Token::Number(parse_number(expression, &literal)?));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Name(chars[start..i].iter().collect()));
        } else {
            let rest: String = chars[i..].iter().take(2).collect();
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .copied()
                .ok_or_else(|| invalid(expression, format!("unexpected character `{}`", c)))?;
            tokens.push(Token::Op(op));
            i += op.len();
        }
    }
    Ok(tokens)
}

fn precedence(op: &str) -> Option<u8> {
    match op {
        "*" | "/" | "%" => Some(10),
        "+" | "-" => Some(9),
        "<<" | ">>" => Some(8),
        "&" => Some(5),
        "^" => Some(4),
        "|" => Some(3),
        _ => None,
    }
}

impl Evaluator<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn binary(&mut self, min_precedence: u8) -> AnnotateResult<i128> {
        let mut left = self.unary()?;
        while let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            let Some(level) = precedence(op).filter(|level| *level >= min_precedence) else {
                break;
            };
            self.position += 1;
            let right = self.binary(level + 1)?;
            left = self.apply(op, left, right)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> AnnotateResult<i128> {
        match self.advance() {
            Some(Token::Op("-")) => {
                let operand = self.unary()?;
                operand
                    .checked_neg()
                    .ok_or_else(|| invalid(self.expression, "overflow"))
            }
            Some(Token::Op("+")) => self.unary(),
            Some(Token::Op("~")) => Ok(!self.unary()?),
            Some(Token::Op("!")) => Ok((self.unary()? == 0) as i128),
            Some(Token::Open) => {
                let value = self.binary(0)?;
                match self.advance() {
                    Some(Token::Close) => Ok(value),
                    _ => Err(invalid(self.expression, "missing `)`")),
                }
            }
            Some(Token::Number(value)) => Ok(value),
            Some(Token::Name(name)) => self
                .scope
                .iter()
                .rev()
                .find(|(member, _)| *member == name)
                .map(|(_, value)| *value)
                .ok_or_else(|| invalid(self.expression, format!("unknown name `{}`", name))),
            Some(token) => Err(invalid(self.expression, format!("unexpected {:?}", token))),
            None => Err(invalid(self.expression, "unexpected end of expression")),
        }
    }

    fn apply(&self, op: &str, left: i128, right: i128) -> AnnotateResult<i128> {
        let shift = |amount: i128| {
            u32::try_from(amount)
                .ok()
                .filter(|amount| *amount < 127)
                .ok_or_else(|| invalid(self.expression, "shift amount out of range"))
        };
        let result = match op {
            "*" => left.checked_mul(right),
            "/" if right == 0 => return Err(invalid(self.expression, "division by zero")),
            "/" => left.checked_div(right),
            "%" if right == 0 => return Err(invalid(self.expression, "division by zero")),
            "%" => left.checked_rem(right),
            "+" => left.checked_add(right),
            "-" => left.checked_sub(right),
            "<<" => left.checked_shl(shift(right)?),
            ">>" => left.checked_shr(shift(right)?),
            "&" => Some(left & right),
            "^" => Some(left ^ right),
            "|" => Some(left | right),
            _ => None,
        };
        result.ok_or_else(|| invalid(self.expression, "overflow"))
    }
}

/// Evaluate `expression`, resolving names against earlier members.
pub fn evaluate(expression: &str, scope: &[(String, i128)]) -> AnnotateResult<i128> {
    let tokens = lex(expression)?;
    if tokens.is_empty() {
        return Err(invalid(expression, "empty expression"));
    }
    let mut evaluator = Evaluator {
        expression,
        tokens,
        position: 0,
        scope,
    };
    let value = evaluator.binary(0)?;
    if evaluator.position != evaluator.tokens.len() {
        return Err(invalid(expression, "trailing tokens"));
    }
    Ok(value)
}
