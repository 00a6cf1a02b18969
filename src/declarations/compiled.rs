//! # Compiled Results
//!
//! What [`Namespace::compile`](crate::declarations::Namespace::compile)
//! hands back. Structs, enums and flags come wrapped together with their
//! symbolic members so that `Point.x` or `Color.RED` stay answerable after
//! compilation: a lookup checks the declared members first and falls back
//! to attributes of the bare native type.

use serde::Serialize;
use std::ops::Mul;
use std::sync::Arc;

use crate::ffi::call::ForeignFunction;
use crate::ffi::error::{AnnotateError, AnnotateResult};
use crate::types::buffers::Instance;
use crate::types::native::{NativeAttr, NativeType};

/// Symbolic members of a struct, enum or flags declaration, in declared order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MemberTable {
    /// Struct member name → type name
    Fields(Vec<(String, String)>),
    /// Enum member or flag name → integer value
    Constants(Vec<(String, i128)>),
}

/// One symbolic member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Member<'a> {
    TypeName(&'a str),
    Constant(i128),
}

impl MemberTable {
    pub fn get(&self, name: &str) -> Option<Member<'_>> {
        match self {
            MemberTable::Fields(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, type_name)| Member::TypeName(type_name)),
            MemberTable::Constants(constants) => constants
                .iter()
                .find(|(constant, _)| constant == name)
                .map(|(_, value)| Member::Constant(*value)),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            MemberTable::Fields(fields) => fields.iter().map(|(name, _)| name.as_str()).collect(),
            MemberTable::Constants(constants) => {
                constants.iter().map(|(name, _)| name.as_str()).collect()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MemberTable::Fields(fields) => fields.len(),
            MemberTable::Constants(constants) => constants.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a two-level attribute lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Attr<'a> {
    Member(Member<'a>),
    Native(NativeAttr<'a>),
}

/// A compiled native type kept together with its declaration's members
#[derive(Debug, Clone)]
pub struct MembersWrapper {
    name: String,
    subject: NativeType,
    members: Arc<MemberTable>,
}

impl MembersWrapper {
    pub fn new(name: &str, subject: NativeType, members: Arc<MemberTable>) -> Self {
        Self {
            name: name.to_string(),
            subject,
            members,
        }
    }

    /// Name of the declaration the members come from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bare native type
    pub fn subject(&self) -> &NativeType {
        &self.subject
    }

    pub fn members(&self) -> &MemberTable {
        &self.members
    }

    /// Declared members first, then attributes of the native type
    pub fn attr(&self, name: &str) -> Option<Attr<'_>> {
        self.members
            .get(name)
            .map(Attr::Member)
            .or_else(|| self.subject.attr(name).map(Attr::Native))
    }

    /// Type name of a struct member
    pub fn member_type(&self, name: &str) -> Option<&str> {
        match self.members.get(name)? {
            Member::TypeName(type_name) => Some(type_name),
            Member::Constant(_) => None,
        }
    }

    /// Value of an enum member or flag
    pub fn constant(&self, name: &str) -> Option<i128> {
        match self.members.get(name)? {
            Member::Constant(value) => Some(value),
            Member::TypeName(_) => None,
        }
    }

    /// Build a zeroed instance of the native type
    pub fn instantiate(&self) -> AnnotateResult<Instance> {
        Instance::new(self.subject.clone())
    }

    /// Fixed-size array of the native type, keeping member lookups.
    /// `None` when the array would not fit in memory.
    pub fn array(&self, len: usize) -> Option<MembersWrapper> {
        Some(MembersWrapper {
            name: self.name.clone(),
            subject: self.subject.clone().checked_array_of(len)?,
            members: Arc::clone(&self.members),
        })
    }
}

impl Mul<usize> for &MembersWrapper {
    type Output = Option<MembersWrapper>;

    fn mul(self, len: usize) -> Option<MembersWrapper> {
        self.array(len)
    }
}

/// A compiled declaration or type-name expression
#[derive(Debug, Clone)]
pub enum Compiled {
    Native(NativeType),
    Wrapped(Arc<MembersWrapper>),
    Function(Arc<ForeignFunction>),
}

impl Compiled {
    /// The native type, looking through member wrappers
    pub fn native_type(&self) -> Option<&NativeType> {
        match self {
            Compiled::Native(ty) => Some(ty),
            Compiled::Wrapped(wrapper) => Some(wrapper.subject()),
            Compiled::Function(_) => None,
        }
    }

    /// Drop the member wrapper, keeping the bare native type
    pub fn unwrapped(self) -> Compiled {
        match self {
            Compiled::Wrapped(wrapper) => Compiled::Native(wrapper.subject().clone()),
            other => other,
        }
    }

    pub fn as_wrapper(&self) -> Option<&MembersWrapper> {
        match self {
            Compiled::Wrapped(wrapper) => Some(wrapper),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<ForeignFunction>> {
        match self {
            Compiled::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Two-level attribute lookup; bare native types only have native attributes
    pub fn attr(&self, name: &str) -> Option<Attr<'_>> {
        match self {
            Compiled::Wrapped(wrapper) => wrapper.attr(name),
            Compiled::Native(ty) => ty.attr(name).map(Attr::Native),
            Compiled::Function(_) => None,
        }
    }

    pub fn instantiate(&self) -> AnnotateResult<Instance> {
        match self.native_type() {
            Some(ty) => Instance::new(ty.clone()),
            None => Err(AnnotateError::usage(
                self.to_string(),
                "functions cannot be instantiated",
            )),
        }
    }

    /// Identity of the cached object, not structural equality
    pub fn ptr_eq(&self, other: &Compiled) -> bool {
        match (self, other) {
            (Compiled::Native(a), Compiled::Native(b)) => a.ptr_eq(b),
            (Compiled::Wrapped(a), Compiled::Wrapped(b)) => Arc::ptr_eq(a, b),
            (Compiled::Function(a), Compiled::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Display for Compiled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compiled::Native(ty) => write!(f, "{}", ty),
            Compiled::Wrapped(wrapper) => write!(f, "{}", wrapper.subject()),
            Compiled::Function(function) => write!(f, "{}()", function.name()),
        }
    }
}
