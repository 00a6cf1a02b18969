//! # Annotation Line Tokenizer
//!
//! Splits one annotation line such as `@member (unsigned int) flags` into a
//! [`Unit`]: the tag after `@` and the ordered values that follow it.
//! Values are separated by whitespace, except that a parenthesized run is
//! kept whole even when it contains spaces.

use std::iter;

use crate::ffi::error::{AnnotateError, AnnotateResult};

/// One `(tag, values)` pair produced from a single line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Unit {
    /// Tag name without the leading `@`; empty when the line has no tag
    pub tag: String,
    pub values: Vec<String>,
}

impl Unit {
    pub fn new(tag: &str, values: &[&str]) -> Self {
        Self {
            tag: tag.to_string(),
            values: values.iter().map(|value| value.to_string()).collect(),
        }
    }
}

/// Result of scanning a line, with its parenthesis balance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scanned {
    pub unit: Unit,
    /// Depth never went negative and returned to zero at the end
    pub balanced: bool,
}

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

/// Scan a line; an implicit trailing newline flushes the last token.
pub fn scan(line: &str) -> Scanned {
    let mut tag = String::new();
    let mut values = Vec::new();
    let mut buffer = String::new();

    let mut in_tag = false;
    let mut depth: i64 = 0;
    let mut previous_depth: i64 = 0;
    let mut balanced = true;

    let flush = |buffer: &mut String, values: &mut Vec<String>| {
        if !buffer.is_empty() {
            values.push(std::mem::take(buffer));
        }
    };

    for c in line.chars().chain(iter::once('\n')) {
        if c == '@' {
            in_tag = true;
        }

        if is_separator(c) {
            if in_tag {
                in_tag = false;
                tag = buffer.trim_start_matches('@').to_string();
                buffer.clear();
                continue;
            } else if depth == 0 && previous_depth != 0 {
                // a parenthesized run just closed
                flush(&mut buffer, &mut values);
                previous_depth = depth;
                continue;
            } else if depth == 0 && previous_depth == 0 {
                flush(&mut buffer, &mut values);
                continue;
            }
        }

        if c == '(' {
            previous_depth = depth;
            depth += 1;
        }
        if c == ')' {
            previous_depth = depth;
            depth -= 1;
            if depth < 0 {
                balanced = false;
            }
        }

        buffer.push(c);
    }

    // a trailing separator inside an open run ends up in the buffer
    let leftover = buffer.trim_end_matches(is_separator);
    if !leftover.is_empty() {
        values.push(leftover.to_string());
    }

    Scanned {
        unit: Unit { tag, values },
        balanced: balanced && depth == 0,
    }
}

/// Tokenize a line, tolerating unbalanced parentheses
pub fn tokenize(line: &str) -> Unit {
    scan(line).unit
}

/// Tokenize a line, rejecting unbalanced parentheses
pub fn tokenize_strict(line: &str) -> AnnotateResult<Unit> {
    let scanned = scan(line);
    if !scanned.balanced {
        return Err(AnnotateError::UnbalancedParentheses {
            line: line.to_string(),
        });
    }
    Ok(scanned.unit)
}
