//! # Primitive Vocabulary
//!
//! The closed table of base type names an annotation may use, and the
//! native representation each one stands for on the current platform.

use libffi::middle::Type;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::mem::{align_of, size_of};
use std::os::raw::{c_char, c_int, c_long, c_longlong, c_short};

/// A base type from the fixed vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Bool,
    Char,
    WChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    /// NUL-terminated byte string (`char *`)
    String,
    Size,
    SSize,
    Float,
    Double,
    LongDouble,
}

/// How a primitive is stored in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Signed(usize),
    Unsigned(usize),
    Float(usize),
    Bool,
    CString,
    Extended,
}

const VOCABULARY: &[(&str, Primitive)] = &[
    ("uint8", Primitive::UInt8),
    ("uint16", Primitive::UInt16),
    ("uint32", Primitive::UInt32),
    ("uint64", Primitive::UInt64),
    ("int8", Primitive::Int8),
    ("int16", Primitive::Int16),
    ("int32", Primitive::Int32),
    ("int64", Primitive::Int64),
    ("bool", Primitive::Bool),
    ("char", Primitive::Char),
    ("wchar", Primitive::WChar),
    ("uchar", Primitive::UChar),
    ("short", Primitive::Short),
    ("ushort", Primitive::UShort),
    ("int", Primitive::Int),
    ("uint", Primitive::UInt),
    ("long", Primitive::Long),
    ("ulong", Primitive::ULong),
    ("longlong", Primitive::LongLong),
    ("ulonglong", Primitive::ULongLong),
    ("string", Primitive::String),
    ("size", Primitive::Size),
    ("ssize", Primitive::SSize),
    ("float", Primitive::Float),
    ("double", Primitive::Double),
    ("long_double", Primitive::LongDouble),
];

#[cfg(any(
    all(target_arch = "x86_64", not(target_os = "windows")),
    all(
        target_arch = "aarch64",
        not(any(target_os = "windows", target_os = "macos", target_os = "ios"))
    )
))]
const LONG_DOUBLE_LAYOUT: (usize, usize) = (16, 16);

#[cfg(not(any(
    all(target_arch = "x86_64", not(target_os = "windows")),
    all(
        target_arch = "aarch64",
        not(any(target_os = "windows", target_os = "macos", target_os = "ios"))
    )
)))]
const LONG_DOUBLE_LAYOUT: (usize, usize) = (8, 8);

impl Primitive {
    /// Look up a vocabulary name
    pub fn from_name(name: &str) -> Option<Self> {
        VOCABULARY
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, primitive)| *primitive)
    }

    /// The vocabulary name of this primitive
    pub fn name(self) -> &'static str {
        VOCABULARY
            .iter()
            .find(|(_, primitive)| *primitive == self)
            .map(|(name, _)| *name)
            .unwrap_or("?")
    }

    /// Every vocabulary name, in table order
    pub fn names() -> impl Iterator<Item = &'static str> {
        VOCABULARY.iter().map(|(name, _)| *name)
    }

    pub fn scalar(self) -> Scalar {
        let char_signed = (c_char::MIN as i32) < 0;
        match self {
            Primitive::UInt8 | Primitive::UChar => Scalar::Unsigned(1),
            Primitive::UInt16 => Scalar::Unsigned(2),
            Primitive::UInt32 => Scalar::Unsigned(4),
            Primitive::UInt64 => Scalar::Unsigned(8),
            Primitive::Int8 => Scalar::Signed(1),
            Primitive::Int16 => Scalar::Signed(2),
            Primitive::Int32 => Scalar::Signed(4),
            Primitive::Int64 => Scalar::Signed(8),
            Primitive::Bool => Scalar::Bool,
            Primitive::Char if char_signed => Scalar::Signed(1),
            Primitive::Char => Scalar::Unsigned(1),
            Primitive::WChar if cfg!(windows) => Scalar::Unsigned(2),
            Primitive::WChar => Scalar::Signed(4),
            Primitive::Short => Scalar::Signed(size_of::<c_short>()),
            Primitive::UShort => Scalar::Unsigned(size_of::<c_short>()),
            Primitive::Int => Scalar::Signed(size_of::<c_int>()),
            Primitive::UInt => Scalar::Unsigned(size_of::<c_int>()),
            Primitive::Long => Scalar::Signed(size_of::<c_long>()),
            Primitive::ULong => Scalar::Unsigned(size_of::<c_long>()),
            Primitive::LongLong => Scalar::Signed(size_of::<c_longlong>()),
            Primitive::ULongLong => Scalar::Unsigned(size_of::<c_longlong>()),
            Primitive::String => Scalar::CString,
            Primitive::Size => Scalar::Unsigned(size_of::<usize>()),
            Primitive::SSize => Scalar::Signed(size_of::<isize>()),
            Primitive::Float => Scalar::Float(4),
            Primitive::Double => Scalar::Float(8),
            Primitive::LongDouble => Scalar::Extended,
        }
    }

    pub fn size(self) -> usize {
        match self.scalar() {
            Scalar::Signed(size) | Scalar::Unsigned(size) | Scalar::Float(size) => size,
            Scalar::Bool => 1,
            Scalar::CString => size_of::<*const c_char>(),
            Scalar::Extended => LONG_DOUBLE_LAYOUT.0,
        }
    }

    pub fn align(self) -> usize {
        match self.scalar() {
            Scalar::Signed(8) | Scalar::Unsigned(8) => align_of::<u64>(),
            Scalar::Float(8) => align_of::<f64>(),
            Scalar::Signed(size) | Scalar::Unsigned(size) | Scalar::Float(size) => size,
            Scalar::Bool => 1,
            Scalar::CString => align_of::<*const c_char>(),
            Scalar::Extended => LONG_DOUBLE_LAYOUT.1,
        }
    }

    /// Whether enum and flags declarations may use this as their storage
    pub fn is_integral(self) -> bool {
        matches!(
            self.scalar(),
            Scalar::Signed(_) | Scalar::Unsigned(_) | Scalar::Bool
        )
    }

    /// Inclusive range of an integral primitive
    pub fn integer_range(self) -> Option<(i128, i128)> {
        match self.scalar() {
            Scalar::Signed(size) => {
                let bits = size as u32 * 8;
                Some((-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1))
            }
            Scalar::Unsigned(size) => Some((0, (1i128 << (size as u32 * 8)) - 1)),
            Scalar::Bool => Some((0, 1)),
            _ => None,
        }
    }

    /// The libffi descriptor used when this primitive crosses a call boundary
    pub fn ffi_type(self) -> Type {
        match self.scalar() {
            Scalar::Signed(1) => Type::i8(),
            Scalar::Signed(2) => Type::i16(),
            Scalar::Signed(4) => Type::i32(),
            Scalar::Signed(_) => Type::i64(),
            Scalar::Unsigned(1) | Scalar::Bool => Type::u8(),
            Scalar::Unsigned(2) => Type::u16(),
            Scalar::Unsigned(4) => Type::u32(),
            Scalar::Unsigned(_) => Type::u64(),
            Scalar::Float(4) => Type::f32(),
            Scalar::Float(_) => Type::f64(),
            Scalar::CString => Type::pointer(),
            Scalar::Extended => Type::longdouble(),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_names_round_trip() {
        for name in Primitive::names() {
            let primitive = Primitive::from_name(name).unwrap();
            assert_eq!(primitive.name(), name);
        }
        assert_eq!(Primitive::from_name("Point"), None);
        assert_eq!(Primitive::from_name("void"), None);
    }

    #[test]
    fn test_fixed_width_sizes() {
        assert_eq!(Primitive::UInt8.size(), 1);
        assert_eq!(Primitive::Int16.size(), 2);
        assert_eq!(Primitive::Int32.size(), 4);
        assert_eq!(Primitive::UInt64.size(), 8);
        assert_eq!(Primitive::Double.size(), 8);
        assert_eq!(Primitive::Size.size(), size_of::<usize>());
        assert_eq!(Primitive::String.size(), size_of::<usize>());
        assert_eq!(Primitive::Int.size(), size_of::<c_int>());
    }

    #[test]
    fn test_integer_ranges() {
        assert_eq!(Primitive::Int8.integer_range(), Some((-128, 127)));
        assert_eq!(Primitive::UInt16.integer_range(), Some((0, 65535)));
        assert_eq!(Primitive::Double.integer_range(), None);
        assert!(Primitive::UInt32.is_integral());
        assert!(!Primitive::String.is_integral());
    }
}
