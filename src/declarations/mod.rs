//! # Declarations
//!
//! A [`Declaration`] is one named entry parsed from an annotation block:
//! a function, struct, enum, flags set, variable or typedef. Declarations
//! only hold names and type-name text; turning them into native types and
//! bound symbols is the job of the [`Namespace`].

pub mod compiled;
pub mod expr;
pub mod namespace;

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ffi::error::{AnnotateError, AnnotateResult};

pub use compiled::{Attr, Compiled, Member, MemberTable, MembersWrapper};
pub use namespace::{Namespace, SharedNamespace};

/// Storage type of enums and flags without a `@type` field
pub const DEFAULT_INTEGER_TYPE: &str = "int";

/// The closed set of declaration kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Function,
    Struct,
    Enum,
    Flags,
    Variable,
    Typedef,
}

/// Tag and field vocabulary of one declaration kind
#[derive(Debug)]
pub struct KindSpec {
    pub kind: DeclarationKind,
    pub tag: &'static str,
    /// Fields kept once; the last occurrence wins
    pub singular: &'static [&'static str],
    /// Fields collected in declared order
    pub plural: &'static [&'static str],
}

/// Indexed by `DeclarationKind as usize`
pub static KINDS: [KindSpec; 6] = [
    KindSpec {
        kind: DeclarationKind::Function,
        tag: "function",
        singular: &["return"],
        plural: &["argument"],
    },
    KindSpec {
        kind: DeclarationKind::Struct,
        tag: "struct",
        singular: &[],
        plural: &["member"],
    },
    KindSpec {
        kind: DeclarationKind::Enum,
        tag: "enum",
        singular: &["type"],
        plural: &["member"],
    },
    KindSpec {
        kind: DeclarationKind::Flags,
        tag: "flags",
        singular: &["type"],
        plural: &["flag"],
    },
    KindSpec {
        kind: DeclarationKind::Variable,
        tag: "variable",
        singular: &["type"],
        plural: &[],
    },
    KindSpec {
        kind: DeclarationKind::Typedef,
        tag: "typedef",
        singular: &["from_type"],
        plural: &[],
    },
];

impl DeclarationKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        KINDS.iter().find(|spec| spec.tag == tag).map(|spec| spec.kind)
    }

    pub fn spec(self) -> &'static KindSpec {
        &KINDS[self as usize]
    }

    pub fn tag(self) -> &'static str {
        self.spec().tag
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Compile-once cache of a declaration
///
/// `Uncompiled → Compiled` happens on first resolution; `reset` is the only
/// way back.
#[derive(Debug, Clone)]
pub enum CompileState<T> {
    Uncompiled,
    Compiled(T),
}

impl<T> Default for CompileState<T> {
    fn default() -> Self {
        CompileState::Uncompiled
    }
}

impl<T: Clone> CompileState<T> {
    pub fn cached(&self) -> Option<&T> {
        match self {
            CompileState::Compiled(value) => Some(value),
            CompileState::Uncompiled => None,
        }
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self, CompileState::Compiled(_))
    }

    pub(crate) fn store(&mut self, value: T) -> T {
        *self = CompileState::Compiled(value.clone());
        value
    }

    pub(crate) fn reset(&mut self) {
        *self = CompileState::Uncompiled;
    }
}

/// Grouped units of one annotation block, keyed by field name
#[derive(Debug, Default, Clone)]
pub struct FieldUnits {
    pub singular: HashMap<String, Vec<String>>,
    pub plural: HashMap<String, Vec<Vec<String>>>,
}

impl FieldUnits {
    fn single(&self, field: &str) -> Option<&Vec<String>> {
        self.singular.get(field)
    }

    fn many(&self, field: &str) -> &[Vec<String>] {
        self.plural.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionDecl {
    pub return_type: String,
    pub argument_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructDecl {
    pub members: Arc<MemberTable>,
}

/// Body shared by enums and flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstantsDecl {
    pub underlying_type: String,
    pub members: Arc<MemberTable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableDecl {
    pub variable_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypedefDecl {
    pub from_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeclarationBody {
    Function(FunctionDecl),
    Struct(StructDecl),
    Enum(ConstantsDecl),
    Flags(ConstantsDecl),
    Variable(VariableDecl),
    Typedef(TypedefDecl),
}

impl DeclarationBody {
    pub fn kind(&self) -> DeclarationKind {
        match self {
            DeclarationBody::Function(_) => DeclarationKind::Function,
            DeclarationBody::Struct(_) => DeclarationKind::Struct,
            DeclarationBody::Enum(_) => DeclarationKind::Enum,
            DeclarationBody::Flags(_) => DeclarationKind::Flags,
            DeclarationBody::Variable(_) => DeclarationKind::Variable,
            DeclarationBody::Typedef(_) => DeclarationKind::Typedef,
        }
    }
}

/// A named declaration and its compile state
#[derive(Debug, Clone, Serialize)]
pub struct Declaration {
    name: String,
    #[serde(flatten)]
    body: DeclarationBody,
    #[serde(skip)]
    state: CompileState<Compiled>,
}

fn arity(kind: DeclarationKind, field: &str, expected: usize, got: usize) -> AnnotateError {
    AnnotateError::Arity {
        kind: kind.tag().to_string(),
        field: field.to_string(),
        expected,
        got,
    }
}

/// Exactly one value for a required singular field
fn one_value(kind: DeclarationKind, field: &str, values: Option<&Vec<String>>) -> AnnotateResult<String> {
    match values.map(Vec::as_slice) {
        Some([value]) => Ok(value.clone()),
        Some(values) => Err(arity(kind, field, 1, values.len())),
        None => Err(arity(kind, field, 1, 0)),
    }
}

/// Plural units that must carry exactly two values each
fn pairs<'a>(
    kind: DeclarationKind,
    field: &str,
    units: &'a [Vec<String>],
) -> AnnotateResult<Vec<(&'a str, &'a str)>> {
    units
        .iter()
        .map(|values| match values.as_slice() {
            [first, second] => Ok((first.as_str(), second.as_str())),
            other => Err(arity(kind, field, 2, other.len())),
        })
        .collect()
}

fn upsert<V>(entries: &mut Vec<(String, V)>, name: &str, value: V) {
    match entries.iter_mut().find(|(existing, _)| existing == name) {
        Some(entry) => entry.1 = value,
        None => entries.push((name.to_string(), value)),
    }
}

impl Declaration {
    pub fn new(name: &str, body: DeclarationBody) -> Self {
        Self {
            name: name.to_string(),
            body,
            state: CompileState::Uncompiled,
        }
    }

    /// Build a declaration of `kind` from grouped field units, validating arity
    pub fn from_units(kind: DeclarationKind, name: &str, units: &FieldUnits) -> AnnotateResult<Self> {
        let body = match kind {
            DeclarationKind::Function => {
                let return_type = one_value(kind, "return", units.single("return"))?;
                let argument_types = units
                    .many("argument")
                    .iter()
                    .map(|values| match values.as_slice() {
                        [value] => Ok(value.clone()),
                        other => Err(arity(kind, "argument", 1, other.len())),
                    })
                    .collect::<AnnotateResult<Vec<_>>>()?;
                DeclarationBody::Function(FunctionDecl {
                    return_type,
                    argument_types,
                })
            }
            DeclarationKind::Struct => {
                let mut fields = Vec::new();
                for (type_name, member) in pairs(kind, "member", units.many("member"))? {
                    upsert(&mut fields, member, type_name.to_string());
                }
                DeclarationBody::Struct(StructDecl {
                    members: Arc::new(MemberTable::Fields(fields)),
                })
            }
            DeclarationKind::Enum | DeclarationKind::Flags => {
                let underlying_type = match units.single("type") {
                    Some(values) => one_value(kind, "type", Some(values))?,
                    None => DEFAULT_INTEGER_TYPE.to_string(),
                };
                let field = if kind == DeclarationKind::Enum { "member" } else { "flag" };
                let mut constants: Vec<(String, i128)> = Vec::new();
                for (member, expression) in pairs(kind, field, units.many(field))? {
                    let value = expr::evaluate(expression, &constants)?;
                    upsert(&mut constants, member, value);
                }
                let body = ConstantsDecl {
                    underlying_type,
                    members: Arc::new(MemberTable::Constants(constants)),
                };
                if kind == DeclarationKind::Enum {
                    DeclarationBody::Enum(body)
                } else {
                    DeclarationBody::Flags(body)
                }
            }
            DeclarationKind::Variable => DeclarationBody::Variable(VariableDecl {
                variable_type: one_value(kind, "type", units.single("type"))?,
            }),
            DeclarationKind::Typedef => DeclarationBody::Typedef(TypedefDecl {
                from_type: one_value(kind, "from_type", units.single("from_type"))?,
            }),
        };
        Ok(Self::new(name, body))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DeclarationKind {
        self.body.kind()
    }

    pub fn body(&self) -> &DeclarationBody {
        &self.body
    }

    pub fn state(&self) -> &CompileState<Compiled> {
        &self.state
    }

    pub fn is_compiled(&self) -> bool {
        self.state.is_compiled()
    }

    pub fn is_variable(&self) -> bool {
        self.kind() == DeclarationKind::Variable
    }

    /// Symbolic members of struct, enum and flags declarations
    pub fn members(&self) -> Option<&MemberTable> {
        match &self.body {
            DeclarationBody::Struct(decl) => Some(&decl.members),
            DeclarationBody::Enum(decl) | DeclarationBody::Flags(decl) => Some(&decl.members),
            _ => None,
        }
    }

    pub(crate) fn state_mut(&mut self) -> &mut CompileState<Compiled> {
        &mut self.state
    }
}
