//! # Native Type Descriptors
//!
//! A [`NativeType`] is what a type-name expression compiles to: a primitive,
//! a pointer, a fixed array, a struct layout, or `void`. Layouts follow the
//! C rules of natural alignment with tail padding.

use libffi::middle::Type;
use std::fmt;
use std::mem::{align_of, size_of};
use std::sync::Arc;

use crate::ffi::error::{AnnotateError, AnnotateResult};
use crate::types::primitive::Primitive;

/// Compiled native type
#[derive(Debug, Clone, PartialEq)]
pub enum NativeType {
    Void,
    Primitive(Primitive),
    Pointer(Arc<NativeType>),
    Array(Arc<NativeType>, usize),
    Struct(Arc<StructLayout>),
    /// A struct referenced while its own layout is still being compiled.
    /// Only ever appears behind a pointer. Layouts that capture an outer
    /// declaration this way are not cached by the namespace.
    Opaque(String),
}

/// One member of a struct layout
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    pub name: String,
    pub ty: NativeType,
    pub offset: usize,
}

/// Fixed layout of an aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct StructLayout {
    pub name: String,
    pub fields: Vec<FieldLayout>,
    pub size: usize,
    pub align: usize,
}

/// An attribute of a native type reachable by name
#[derive(Debug, Clone, PartialEq)]
pub enum NativeAttr<'a> {
    Field(&'a FieldLayout),
    Size(usize),
    Align(usize),
    Len(usize),
}

/// Largest object size an allocation can hold
pub const MAX_SIZE: usize = isize::MAX as usize;

fn align_up(offset: usize, align: usize) -> Option<usize> {
    offset
        .checked_add(align - 1)
        .map(|padded| padded / align * align)
        .filter(|aligned| *aligned <= MAX_SIZE)
}

fn too_large(name: &str, field_name: &str) -> AnnotateError {
    AnnotateError::usage(
        format!("{}.{}", name, field_name),
        "struct size overflows the address space",
    )
}

impl StructLayout {
    /// Lay out members in declaration order
    pub fn new(name: &str, members: Vec<(String, NativeType)>) -> AnnotateResult<Self> {
        let mut fields = Vec::with_capacity(members.len());
        let mut offset = 0;
        let mut align = 1;

        for (field_name, ty) in members {
            if !ty.is_sized() {
                return Err(AnnotateError::usage(
                    format!("{}.{}", name, field_name),
                    format!("member type `{}` has no size", ty),
                ));
            }
            let field_align = ty.align();
            let field_size = ty.size();
            let start = align_up(offset, field_align)
                .ok_or_else(|| too_large(name, &field_name))?;
            offset = start
                .checked_add(field_size)
                .filter(|end| *end <= MAX_SIZE)
                .ok_or_else(|| too_large(name, &field_name))?;
            align = align.max(field_align);
            fields.push(FieldLayout {
                name: field_name,
                ty,
                offset: start,
            });
        }

        let size = align_up(offset, align).ok_or_else(|| {
            AnnotateError::usage(name.to_string(), "struct size overflows the address space")
        })?;
        Ok(Self {
            name: name.to_string(),
            fields,
            size,
            align,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|field| field.name == name)
    }
}

impl NativeType {
    pub fn pointer_to(self) -> Self {
        NativeType::Pointer(Arc::new(self))
    }

    pub fn array_of(self, len: usize) -> Self {
        NativeType::Array(Arc::new(self), len)
    }

    /// `len` elements of this type, or `None` when the total size does not
    /// fit in an allocation
    pub fn checked_array_of(self, len: usize) -> Option<Self> {
        self.size()
            .checked_mul(len)
            .filter(|size| *size <= MAX_SIZE)
            .map(|_| self.array_of(len))
    }

    pub fn size(&self) -> usize {
        match self {
            NativeType::Void | NativeType::Opaque(_) => 0,
            NativeType::Primitive(primitive) => primitive.size(),
            NativeType::Pointer(_) => size_of::<usize>(),
            NativeType::Array(element, len) => element.size().saturating_mul(*len),
            NativeType::Struct(layout) => layout.size,
        }
    }

    pub fn align(&self) -> usize {
        match self {
            NativeType::Void | NativeType::Opaque(_) => 1,
            NativeType::Primitive(primitive) => primitive.align(),
            NativeType::Pointer(_) => align_of::<usize>(),
            NativeType::Array(element, _) => element.align(),
            NativeType::Struct(layout) => layout.align,
        }
    }

    /// Whether values of this type can be stored
    pub fn is_sized(&self) -> bool {
        match self {
            NativeType::Void | NativeType::Opaque(_) => false,
            NativeType::Array(element, _) => element.is_sized(),
            _ => true,
        }
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self {
            NativeType::Primitive(primitive) => Some(*primitive),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructLayout> {
        match self {
            NativeType::Struct(layout) => Some(layout),
            _ => None,
        }
    }

    /// Type reached by one pointer dereference or array index
    pub fn element(&self) -> Option<&NativeType> {
        match self {
            NativeType::Pointer(element) | NativeType::Array(element, _) => Some(element),
            _ => None,
        }
    }

    /// Named attributes of the bare native type
    pub fn attr(&self, name: &str) -> Option<NativeAttr<'_>> {
        match (self, name) {
            (NativeType::Struct(layout), _) if layout.field(name).is_some() => {
                layout.field(name).map(NativeAttr::Field)
            }
            (NativeType::Array(_, len), "len") => Some(NativeAttr::Len(*len)),
            (_, "size") => Some(NativeAttr::Size(self.size())),
            (_, "align") => Some(NativeAttr::Align(self.align())),
            _ => None,
        }
    }

    /// Identity comparison: shared layouts must be the very same allocation
    pub fn ptr_eq(&self, other: &NativeType) -> bool {
        match (self, other) {
            (NativeType::Struct(a), NativeType::Struct(b)) => Arc::ptr_eq(a, b),
            (NativeType::Pointer(a), NativeType::Pointer(b)) => a.ptr_eq(b),
            (NativeType::Array(a, n), NativeType::Array(b, m)) => n == m && a.ptr_eq(b),
            _ => self == other,
        }
    }

    /// The libffi descriptor for passing or returning this type by value
    pub fn ffi_type(&self) -> AnnotateResult<Type> {
        if matches!(self, NativeType::Array(..) | NativeType::Struct(_)) && self.size() == 0 {
            return Err(AnnotateError::usage(
                self.to_string(),
                "zero-sized aggregate cannot be passed by value",
            ));
        }
        match self {
            NativeType::Void => Ok(Type::void()),
            NativeType::Primitive(primitive) => Ok(primitive.ffi_type()),
            NativeType::Pointer(_) => Ok(Type::pointer()),
            NativeType::Array(element, len) => {
                let element = element.ffi_type()?;
                Ok(Type::structure(vec![element; *len]))
            }
            NativeType::Struct(layout) => {
                let fields = layout
                    .fields
                    .iter()
                    .map(|field| field.ty.ffi_type())
                    .collect::<AnnotateResult<Vec<_>>>()?;
                Ok(Type::structure(fields))
            }
            NativeType::Opaque(name) => Err(AnnotateError::usage(
                name.clone(),
                "incomplete struct cannot be passed by value",
            )),
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Void => f.write_str("void"),
            NativeType::Primitive(primitive) => write!(f, "{}", primitive),
            NativeType::Pointer(element) => write!(f, "{}*", element),
            NativeType::Array(element, len) => write!(f, "{}[{}]", element, len),
            NativeType::Struct(layout) => f.write_str(&layout.name),
            NativeType::Opaque(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int32() -> NativeType {
        NativeType::Primitive(Primitive::Int32)
    }

    #[test]
    fn test_struct_layout_padding() {
        let layout = StructLayout::new(
            "Mixed",
            vec![
                ("tag".to_string(), NativeType::Primitive(Primitive::UInt8)),
                ("value".to_string(), NativeType::Primitive(Primitive::Int64)),
                ("flag".to_string(), NativeType::Primitive(Primitive::Bool)),
            ],
        )
        .unwrap();

        assert_eq!(layout.field("tag").unwrap().offset, 0);
        assert_eq!(layout.field("value").unwrap().offset, 8);
        assert_eq!(layout.field("flag").unwrap().offset, 16);
        assert_eq!(layout.size, 24);
        assert_eq!(layout.align, 8);
    }

    #[test]
    fn test_suffix_shapes_display() {
        let pointer_to_array = int32().array_of(4).pointer_to();
        let array_of_pointers = int32().pointer_to().array_of(4);

        assert_eq!(pointer_to_array.to_string(), "int32[4]*");
        assert_eq!(array_of_pointers.to_string(), "int32*[4]");
        assert_ne!(pointer_to_array, array_of_pointers);
        assert_eq!(array_of_pointers.size(), 4 * size_of::<usize>());
    }

    #[test]
    fn test_void_member_rejected() {
        let err = StructLayout::new("Bad", vec![("nothing".to_string(), NativeType::Void)]);
        assert!(matches!(err, Err(AnnotateError::Usage { .. })));
    }

    #[test]
    fn test_native_attributes() {
        let array = int32().array_of(3);
        assert_eq!(array.attr("len"), Some(NativeAttr::Len(3)));
        assert_eq!(array.attr("size"), Some(NativeAttr::Size(12)));
        assert_eq!(int32().attr("len"), None);
    }

    #[test]
    fn test_oversized_array_rejected() {
        let int64 = NativeType::Primitive(Primitive::Int64);
        assert!(int64.clone().checked_array_of(3_000_000_000_000_000_000).is_none());
        assert!(int64.clone().checked_array_of(MAX_SIZE / 8 + 1).is_none());
        assert_eq!(int64.checked_array_of(4).map(|ty| ty.size()), Some(32));

        let huge = NativeType::Primitive(Primitive::Int64).array_of(usize::MAX / 4);
        assert_eq!(huge.size(), usize::MAX);
        let layout = StructLayout::new(
            "Huge",
            vec![("tag".to_string(), int32()), ("payload".to_string(), huge)],
        );
        assert!(matches!(layout, Err(AnnotateError::Usage { .. })));
    }

    #[test]
    fn test_zero_sized_aggregate_has_no_ffi_type() {
        let empty = NativeType::Struct(Arc::new(StructLayout::new("Empty", Vec::new()).unwrap()));
        assert_eq!(empty.size(), 0);
        assert!(matches!(empty.ffi_type(), Err(AnnotateError::Usage { .. })));
        assert!(matches!(int32().array_of(0).ffi_type(), Err(AnnotateError::Usage { .. })));
        assert!(int32().array_of(2).ffi_type().is_ok());
    }
}
