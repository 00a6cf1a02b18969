//! # Type Definitions
//!
//! Native type descriptors, runtime values and storage used by compiled
//! declarations.

pub mod buffers;
pub mod native;
pub mod primitive;
pub mod value;

// Re-export main types
pub use buffers::{AlignedBuffer, Instance, LiveVariable};
pub use native::{FieldLayout, NativeAttr, NativeType, StructLayout};
pub use primitive::{Primitive, Scalar};
pub use value::{Value, View};
