//! # Declaration Builder
//!
//! Classifies a comment block by its first declaration tag and groups the
//! tokenized units that follow into the fields of that kind.

use tracing::trace;

use crate::declarations::{Declaration, DeclarationKind, FieldUnits};
use crate::ffi::error::{AnnotateError, AnnotateResult};
use crate::parser::extractor::CommentBlock;
use crate::parser::tokenizer::{tokenize, tokenize_strict, Unit};

/// Remove the comment leader (`/*`, `*`, indentation) from a block line
fn strip_leader(line: &str) -> &str {
    line.trim_start_matches(|c: char| matches!(c, '/' | '*' | ' ' | '\t'))
}

/// Build the declaration described by `block`, if it describes one.
///
/// Lines before the first declaration tag are ignored. Blocks without a
/// declaration tag yield `Ok(None)`. In strict mode parentheses must balance
/// on every line from the tag onward.
pub fn build_declaration(block: &CommentBlock, strict: bool) -> AnnotateResult<Option<Declaration>> {
    let mut kind = None;
    let mut units = Vec::new();

    for line in &block.lines {
        let stripped = strip_leader(line);
        if stripped.trim().is_empty() {
            continue;
        }
        if kind.is_none() {
            // Prose before the tag is never checked for balance
            let unit = tokenize(stripped);
            kind = DeclarationKind::from_tag(&unit.tag);
            if kind.is_none() {
                continue;
            }
        }
        let unit = if strict {
            tokenize_strict(stripped)?
        } else {
            tokenize(stripped)
        };
        units.push(unit);
    }

    match kind {
        Some(kind) => group_units(kind, units).map(Some),
        None => Ok(None),
    }
}

/// Sort units into the name, singular fields and plural fields of `kind`
pub fn group_units(kind: DeclarationKind, units: Vec<Unit>) -> AnnotateResult<Declaration> {
    let spec = kind.spec();
    let mut name = None;
    let mut fields = FieldUnits::default();

    for Unit { tag, values } in units {
        trace!("@{} unit @{} {:?}", kind, tag, values);
        if tag == spec.tag {
            let first = values.into_iter().next().ok_or_else(|| AnnotateError::MissingName {
                kind: kind.tag().to_string(),
            })?;
            name = Some(first);
        } else if spec.singular.contains(&tag.as_str()) {
            fields.singular.insert(tag, values);
        } else if spec.plural.contains(&tag.as_str()) {
            fields.plural.entry(tag).or_default().push(values);
        } else {
            return Err(AnnotateError::UnknownField {
                tag,
                kind: kind.tag().to_string(),
            });
        }
    }

    let name = name.ok_or_else(|| AnnotateError::MissingName {
        kind: kind.tag().to_string(),
    })?;
    Declaration::from_units(kind, &name, &fields)
}
