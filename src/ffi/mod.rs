//! # FFI Module
//!
//! Library loading, symbol resolution and foreign calls. The declaration
//! namespace only sees a library through [`SymbolResolver`].

pub mod call;
pub mod error;
pub mod library_loader;
pub mod symbols;

// Re-export main types
pub use call::ForeignFunction;
pub use error::*;
pub use library_loader::{LibraryConfig, LibraryLoader};
pub use symbols::{SymbolResolver, SymbolTable};
