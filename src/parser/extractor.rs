//! # Comment Block Extractor
//!
//! Finds `/* ... */` regions in raw header text and yields the lines of
//! each one, in source order. Everything outside comment blocks is ignored.

use std::iter::Enumerate;
use std::str::Lines;

use crate::ffi::error::{AnnotateError, AnnotateResult};

/// The lines of one comment block, closing marker removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentBlock {
    /// 1-based line number of the opening `/*`
    pub start_line: usize,
    pub lines: Vec<String>,
}

/// Streaming extractor over the lines of a source text
#[derive(Debug)]
pub struct BlockExtractor<'a> {
    lines: Enumerate<Lines<'a>>,
    strict: bool,
    finished: bool,
}

fn opens_block(line: &str) -> bool {
    line.trim_start().starts_with("/*")
}

fn closes_block(line: &str) -> bool {
    line.trim_end().ends_with("*/")
}

fn strip_closing(line: &str) -> String {
    let trimmed = line.trim_end();
    trimmed
        .strip_suffix("*/")
        .unwrap_or(trimmed)
        .trim_end()
        .to_string()
}

impl<'a> BlockExtractor<'a> {
    /// A block still open at end of input is an error when `strict` is set,
    /// and silently dropped otherwise.
    pub fn new(text: &'a str, strict: bool) -> Self {
        Self {
            lines: text.lines().enumerate(),
            strict,
            finished: false,
        }
    }
}

impl Iterator for BlockExtractor<'_> {
    type Item = AnnotateResult<CommentBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut block: Option<CommentBlock> = None;

        for (index, line) in self.lines.by_ref() {
            if block.is_none() && opens_block(line) {
                block = Some(CommentBlock {
                    start_line: index + 1,
                    lines: Vec::new(),
                });
            }

            if let Some(open) = block.as_mut() {
                open.lines.push(line.to_string());
                if closes_block(line) {
                    if let Some(last) = open.lines.last_mut() {
                        *last = strip_closing(last);
                    }
                    return block.map(Ok);
                }
            }
        }

        self.finished = true;
        match block {
            Some(open) if self.strict => Some(Err(AnnotateError::UnterminatedBlock {
                line: open.start_line,
            })),
            _ => None,
        }
    }
}

/// Collect every block of `text`
pub fn extract_blocks(text: &str, strict: bool) -> AnnotateResult<Vec<CommentBlock>> {
    BlockExtractor::new(text, strict).collect()
}
