//! # Native Storage
//!
//! Owned, suitably aligned storage for instances of compiled types, and
//! live views over storage exported by a loaded library.

use std::fmt;
use std::sync::Arc;

use crate::ffi::error::{AnnotateError, AnnotateResult};
use crate::ffi::symbols::SymbolResolver;
use crate::types::native::{NativeType, MAX_SIZE};
use crate::types::value::{read_value, write_value, Value, View};

const WORD: usize = std::mem::size_of::<u128>();

/// Zero-initialised byte buffer aligned for any primitive
#[derive(Clone)]
pub struct AlignedBuffer {
    words: Vec<u128>,
    len: usize,
}

impl AlignedBuffer {
    pub fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD).max(1)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.words.as_ptr() as *const u8
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr() as *mut u8
    }

    pub fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }
}

impl fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuffer").field("len", &self.len).finish()
    }
}

/// An owned, zeroed value of a compiled type
#[derive(Debug, Clone)]
pub struct Instance {
    buffer: AlignedBuffer,
    ty: NativeType,
}

impl Instance {
    pub fn new(ty: NativeType) -> AnnotateResult<Self> {
        if !ty.is_sized() {
            return Err(AnnotateError::usage(ty.to_string(), "type has no size"));
        }
        if ty.size() > MAX_SIZE {
            return Err(AnnotateError::usage(ty.to_string(), "type is too large to allocate"));
        }
        Ok(Self {
            buffer: AlignedBuffer::zeroed(ty.size()),
            ty,
        })
    }

    /// Rebuild an instance from a memory image such as a by-value return
    pub fn from_value(ty: NativeType, value: &Value) -> AnnotateResult<Self> {
        let mut instance = Self::new(ty)?;
        instance.set(value.clone())?;
        Ok(instance)
    }

    pub fn ty(&self) -> &NativeType {
        &self.ty
    }

    pub fn bytes(&self) -> &[u8] {
        self.buffer.bytes()
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.buffer.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.buffer.as_mut_ptr()
    }

    /// Address of the storage, for passing by reference
    pub fn address(&mut self) -> Value {
        Value::Pointer(self.as_mut_ptr() as usize)
    }

    pub fn view(&mut self) -> View<'_> {
        let ty = self.ty.clone();
        unsafe { View::new(self.buffer.as_mut_ptr(), ty) }
    }

    pub fn get(&self) -> AnnotateResult<Value> {
        unsafe { read_value(self.buffer.as_ptr(), &self.ty) }
    }

    pub fn set(&mut self, value: impl Into<Value>) -> AnnotateResult<()> {
        let value = value.into();
        unsafe { write_value(self.buffer.as_mut_ptr(), &self.ty, &value) }
    }

    pub fn field(&mut self, name: &str) -> AnnotateResult<Value> {
        self.view().field(name)?.get()
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) -> AnnotateResult<()> {
        self.view().field(name)?.set(value)
    }

    pub fn to_value(&self) -> Value {
        Value::Bytes(self.bytes().to_vec())
    }
}

/// Live read/write access to a data symbol of a loaded library
#[derive(Debug, Clone)]
pub struct LiveVariable {
    name: String,
    address: usize,
    ty: NativeType,
    _library: Arc<dyn SymbolResolver>,
}

impl LiveVariable {
    pub(crate) fn new(
        name: &str,
        address: *mut u8,
        ty: NativeType,
        library: Arc<dyn SymbolResolver>,
    ) -> AnnotateResult<Self> {
        if !ty.is_sized() {
            return Err(AnnotateError::usage(name, format!("variable type `{}` has no size", ty)));
        }
        Ok(Self {
            name: name.to_string(),
            address: address as usize,
            ty,
            _library: library,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &NativeType {
        &self.ty
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn view(&mut self) -> View<'_> {
        let ty = self.ty.clone();
        unsafe { View::new(self.address as *mut u8, ty) }
    }

    pub fn get(&self) -> AnnotateResult<Value> {
        unsafe { read_value(self.address as *const u8, &self.ty) }
    }

    pub fn set(&mut self, value: impl Into<Value>) -> AnnotateResult<()> {
        let value = value.into();
        unsafe { write_value(self.address as *mut u8, &self.ty, &value) }
    }
}
