//! # Foreign Calls
//!
//! A [`ForeignFunction`] is a call signature compiled from a `@function`
//! declaration and bound to the same-named exported symbol. Arguments and
//! results travel as [`Value`]s and are marshalled through libffi.

use libffi::middle::{Cif, CodePtr};
use std::ffi::{c_void, CString};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::ffi::error::{AnnotateError, AnnotateResult};
use crate::ffi::symbols::SymbolResolver;
use crate::types::buffers::AlignedBuffer;
use crate::types::native::NativeType;
use crate::types::primitive::Scalar;
use crate::types::value::{read_value, write_value, Value};

/// libffi widens small integral results to a full register
const RETURN_SLOT: usize = std::mem::size_of::<u64>();

/// A directly invocable handle to an exported function
pub struct ForeignFunction {
    name: String,
    return_type: NativeType,
    argument_types: Vec<NativeType>,
    cif: Cif,
    code: CodePtr,
    _library: Arc<dyn SymbolResolver>,
}

// The call interface is immutable once prepared and ffi_call only reads it.
unsafe impl Send for ForeignFunction {}
unsafe impl Sync for ForeignFunction {}

impl ForeignFunction {
    /// Prepare the call interface and resolve the symbol
    pub fn bind(
        name: &str,
        return_type: NativeType,
        argument_types: Vec<NativeType>,
        library: Arc<dyn SymbolResolver>,
    ) -> AnnotateResult<Self> {
        let mut ffi_arguments = Vec::with_capacity(argument_types.len());
        for argument in &argument_types {
            if !argument.is_sized() {
                return Err(AnnotateError::usage(
                    name,
                    format!("argument type `{}` cannot be passed by value", argument),
                ));
            }
            ffi_arguments.push(argument.ffi_type()?);
        }
        let cif = Cif::new(ffi_arguments, return_type.ffi_type()?);

        let address = library.function_address(name)?;
        if address.is_null() {
            return Err(AnnotateError::SymbolNotFound {
                symbol: name.to_string(),
            });
        }
        debug!("Bound function {} at {:p}", name, address);

        Ok(Self {
            name: name.to_string(),
            return_type,
            argument_types,
            cif,
            code: CodePtr::from_ptr(address),
            _library: library,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> &NativeType {
        &self.return_type
    }

    pub fn argument_types(&self) -> &[NativeType] {
        &self.argument_types
    }

    /// Call the function.
    ///
    /// Strings passed for `string` arguments live until the call returns.
    /// Struct and array arguments are passed as [`Value::Bytes`] images.
    pub fn call(&self, arguments: &[Value]) -> AnnotateResult<Value> {
        if arguments.len() != self.argument_types.len() {
            return Err(AnnotateError::ArgumentMismatch {
                function: self.name.clone(),
                expected: self.argument_types.len(),
                got: arguments.len(),
            });
        }

        let mut strings = Vec::new();
        let mut slots = Vec::with_capacity(arguments.len());
        for (ty, value) in self.argument_types.iter().zip(arguments) {
            let mut slot = AlignedBuffer::zeroed(ty.size());
            let value = match value {
                Value::Str(Some(text)) => {
                    let text = CString::new(text.as_str()).map_err(|_| {
                        AnnotateError::ValueMismatch {
                            expected: ty.to_string(),
                            got: "string with interior NUL".to_string(),
                        }
                    })?;
                    let pointer = Value::Pointer(text.as_ptr() as usize);
                    strings.push(text);
                    pointer
                }
                other => other.clone(),
            };
            unsafe { write_value(slot.as_mut_ptr(), ty, &value)? };
            slots.push(slot);
        }

        let mut argument_pointers: Vec<*mut c_void> = slots
            .iter_mut()
            .map(|slot| slot.as_mut_ptr() as *mut c_void)
            .collect();
        let mut result = AlignedBuffer::zeroed(self.return_type.size().max(RETURN_SLOT));

        debug!("Calling {} with {} argument(s)", self.name, arguments.len());
        unsafe {
            libffi::raw::ffi_call(
                self.cif.as_raw_ptr(),
                Some(*self.code.as_fun()),
                result.as_mut_ptr() as *mut c_void,
                argument_pointers.as_mut_ptr(),
            );
        }
        drop(strings);

        let offset = self.return_offset();
        unsafe { read_value(result.as_ptr().add(offset), &self.return_type) }
    }

    fn return_offset(&self) -> usize {
        let widened = match &self.return_type {
            NativeType::Primitive(primitive) => matches!(
                primitive.scalar(),
                Scalar::Signed(_) | Scalar::Unsigned(_) | Scalar::Bool
            ),
            _ => false,
        };
        if cfg!(target_endian = "big") && widened {
            RETURN_SLOT - self.return_type.size()
        } else {
            0
        }
    }
}

impl fmt::Debug for ForeignFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignFunction")
            .field("name", &self.name)
            .field("return_type", &self.return_type.to_string())
            .field(
                "argument_types",
                &self
                    .argument_types
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
