//! # Runtime Values
//!
//! [`Value`] is the dynamic representation of data crossing the native
//! boundary, and [`View`] is a typed read/write window over native memory.

use std::ffi::CStr;
use std::marker::PhantomData;
use std::os::raw::c_char;
use std::ptr;

use crate::ffi::error::{AnnotateError, AnnotateResult};
use crate::types::native::NativeType;
use crate::types::primitive::Scalar;

/// A value read from or written to native memory
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Raw address
    Pointer(usize),
    /// `string` primitive; `None` is the null pointer
    Str(Option<String>),
    /// Memory image of an aggregate or extended float
    Bytes(Vec<u8>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Bool(_) => "bool",
            Value::Int(_) => "signed integer",
            Value::UInt(_) => "unsigned integer",
            Value::Float(_) => "float",
            Value::Pointer(_) => "pointer",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(value) => Some(value),
            Value::UInt(value) => i64::try_from(value).ok(),
            Value::Bool(value) => Some(value as i64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::UInt(value) => Some(value),
            Value::Int(value) => u64::try_from(value).ok(),
            Value::Bool(value) => Some(value as u64),
            Value::Pointer(value) => Some(value as u64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(value) => Some(value),
            Value::Int(value) => Some(value as f64),
            Value::UInt(value) => Some(value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(Some(text)) => Some(text),
            _ => None,
        }
    }

    fn as_integer(&self) -> Option<i128> {
        match *self {
            Value::Int(value) => Some(value as i128),
            Value::UInt(value) => Some(value as i128),
            Value::Bool(value) => Some(value as i128),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($variant:ident, $target:ty, $($source:ty),*) => {
        $(impl From<$source> for Value {
            fn from(value: $source) -> Self {
                Value::$variant(value as $target)
            }
        })*
    };
}

value_from!(Int, i64, i8, i16, i32, i64, isize);
value_from!(UInt, u64, u8, u16, u32, u64);
value_from!(Float, f64, f32, f64);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Some(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Some(value))
    }
}

impl<T> From<*mut T> for Value {
    fn from(value: *mut T) -> Self {
        Value::Pointer(value as usize)
    }
}

impl<T> From<*const T> for Value {
    fn from(value: *const T) -> Self {
        Value::Pointer(value as usize)
    }
}

fn mismatch(ty: &NativeType, value: &Value) -> AnnotateError {
    AnnotateError::ValueMismatch {
        expected: ty.to_string(),
        got: value.kind_name().to_string(),
    }
}

/// Decode the value of type `ty` stored at `src`.
///
/// # Safety
/// `src` must point to at least `ty.size()` readable bytes.
pub(crate) unsafe fn read_value(src: *const u8, ty: &NativeType) -> AnnotateResult<Value> {
    let value = match ty {
        NativeType::Primitive(primitive) => match primitive.scalar() {
            Scalar::Signed(1) => Value::Int(ptr::read_unaligned(src as *const i8) as i64),
            Scalar::Signed(2) => Value::Int(ptr::read_unaligned(src as *const i16) as i64),
            Scalar::Signed(4) => Value::Int(ptr::read_unaligned(src as *const i32) as i64),
            Scalar::Signed(_) => Value::Int(ptr::read_unaligned(src as *const i64)),
            Scalar::Unsigned(1) => Value::UInt(ptr::read_unaligned(src) as u64),
            Scalar::Unsigned(2) => Value::UInt(ptr::read_unaligned(src as *const u16) as u64),
            Scalar::Unsigned(4) => Value::UInt(ptr::read_unaligned(src as *const u32) as u64),
            Scalar::Unsigned(_) => Value::UInt(ptr::read_unaligned(src as *const u64)),
            Scalar::Float(4) => Value::Float(ptr::read_unaligned(src as *const f32) as f64),
            Scalar::Float(_) => Value::Float(ptr::read_unaligned(src as *const f64)),
            Scalar::Bool => Value::Bool(ptr::read_unaligned(src) != 0),
            Scalar::CString => {
                let text = ptr::read_unaligned(src as *const *const c_char);
                if text.is_null() {
                    Value::Str(None)
                } else {
                    Value::Str(Some(CStr::from_ptr(text).to_string_lossy().into_owned()))
                }
            }
            Scalar::Extended => Value::Bytes(std::slice::from_raw_parts(src, ty.size()).to_vec()),
        },
        NativeType::Pointer(_) => Value::Pointer(ptr::read_unaligned(src as *const usize)),
        NativeType::Array(..) | NativeType::Struct(_) => {
            Value::Bytes(std::slice::from_raw_parts(src, ty.size()).to_vec())
        }
        NativeType::Void => Value::Void,
        NativeType::Opaque(name) => {
            return Err(AnnotateError::usage(name.clone(), "incomplete type cannot be read"))
        }
    };
    Ok(value)
}

/// Encode `value` as type `ty` into `dst`.
///
/// Strings are rejected here: their storage has to outlive the write, which
/// only the call layer can guarantee.
///
/// # Safety
/// `dst` must point to at least `ty.size()` writable bytes.
pub(crate) unsafe fn write_value(dst: *mut u8, ty: &NativeType, value: &Value) -> AnnotateResult<()> {
    match ty {
        NativeType::Primitive(primitive) => match primitive.scalar() {
            Scalar::Signed(size) | Scalar::Unsigned(size) => {
                let integer = value.as_integer().ok_or_else(|| mismatch(ty, value))?;
                match size {
                    1 => ptr::write_unaligned(dst, integer as u8),
                    2 => ptr::write_unaligned(dst as *mut u16, integer as u16),
                    4 => ptr::write_unaligned(dst as *mut u32, integer as u32),
                    _ => ptr::write_unaligned(dst as *mut u64, integer as u64),
                }
            }
            Scalar::Float(size) => {
                let float = value.as_f64().ok_or_else(|| mismatch(ty, value))?;
                if size == 4 {
                    ptr::write_unaligned(dst as *mut f32, float as f32);
                } else {
                    ptr::write_unaligned(dst as *mut f64, float);
                }
            }
            Scalar::Bool => {
                let integer = value.as_integer().ok_or_else(|| mismatch(ty, value))?;
                ptr::write_unaligned(dst, (integer != 0) as u8);
            }
            Scalar::CString => match value {
                Value::Str(None) => ptr::write_unaligned(dst as *mut usize, 0),
                Value::Pointer(address) => ptr::write_unaligned(dst as *mut usize, *address),
                _ => return Err(mismatch(ty, value)),
            },
            Scalar::Extended => write_bytes(dst, ty, value)?,
        },
        NativeType::Pointer(_) => match value {
            Value::Pointer(address) => ptr::write_unaligned(dst as *mut usize, *address),
            Value::Str(None) => ptr::write_unaligned(dst as *mut usize, 0),
            _ => return Err(mismatch(ty, value)),
        },
        NativeType::Array(..) | NativeType::Struct(_) => write_bytes(dst, ty, value)?,
        NativeType::Void | NativeType::Opaque(_) => return Err(mismatch(ty, value)),
    }
    Ok(())
}

unsafe fn write_bytes(dst: *mut u8, ty: &NativeType, value: &Value) -> AnnotateResult<()> {
    match value {
        Value::Bytes(bytes) if bytes.len() == ty.size() => {
            ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
            Ok(())
        }
        _ => Err(mismatch(ty, value)),
    }
}

/// Typed read/write window over native memory
#[derive(Debug)]
pub struct View<'a> {
    ptr: *mut u8,
    ty: NativeType,
    _marker: PhantomData<&'a mut [u8]>,
}

impl<'a> View<'a> {
    /// # Safety
    /// `ptr` must address `ty.size()` bytes valid for reads and writes for `'a`.
    pub(crate) unsafe fn new(ptr: *mut u8, ty: NativeType) -> Self {
        Self {
            ptr,
            ty,
            _marker: PhantomData,
        }
    }

    pub fn ty(&self) -> &NativeType {
        &self.ty
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    pub fn get(&self) -> AnnotateResult<Value> {
        unsafe { read_value(self.ptr, &self.ty) }
    }

    pub fn set(&mut self, value: impl Into<Value>) -> AnnotateResult<()> {
        unsafe { write_value(self.ptr, &self.ty, &value.into()) }
    }

    /// Narrow the view to one struct member
    pub fn field(&mut self, name: &str) -> AnnotateResult<View<'_>> {
        let layout = self.ty.as_struct().ok_or_else(|| {
            AnnotateError::usage(name, format!("`{}` has no members", self.ty))
        })?;
        let field = layout.field(name).ok_or_else(|| {
            AnnotateError::usage(name, format!("`{}` has no member with this name", layout.name))
        })?;
        Ok(unsafe { View::new(self.ptr.add(field.offset), field.ty.clone()) })
    }

    /// Narrow the view to one array element
    pub fn index(&mut self, index: usize) -> AnnotateResult<View<'_>> {
        match &self.ty {
            NativeType::Array(element, len) if index < *len => {
                let element = NativeType::clone(element);
                let offset = index * element.size();
                Ok(unsafe { View::new(self.ptr.add(offset), element) })
            }
            NativeType::Array(_, len) => Err(AnnotateError::usage(
                self.ty.to_string(),
                format!("index {} out of bounds for length {}", index, len),
            )),
            other => Err(AnnotateError::usage(other.to_string(), "not an array")),
        }
    }
}
