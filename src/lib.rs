//! # annotatec
//!
//! Live FFI bindings from annotated comment blocks in C headers.
//!
//! Declarations are written inside ordinary `/* ... */` comments next to
//! the C code they describe:
//!
//! ```c
//! /* @struct Point
//!  * @member int32 x
//!  * @member int32 y
//!  */
//!
//! /* @function point_norm
//!  * @return double
//!  * @argument Point*
//!  */
//! ```
//!
//! The parser registers each block in a [`Namespace`]. Names compile lazily
//! into native type descriptors, bound foreign functions or live views of
//! exported variables, and each result is cached until it is reset.
//!
//! ## Features
//!
//! - **Small grammar**: functions, structs, enums, flags, variables, typedefs
//! - **Type expressions**: `Point*`, `int32[4]`, `uint8*[2]` over a fixed primitive vocabulary
//! - **Lazy compilation**: forward references, memoization and explicit reset
//! - **Dynamic calls**: signatures known only at run time go through libffi
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use annotatec::{LibraryConfig, Loader, LoaderConfig, Value};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     annotatec::init()?;
//!
//!     let config = LoaderConfig::new(LibraryConfig::for_library("geometry"))
//!         .with_source("include/geometry.h");
//!     let mut loader = Loader::new(config)?;
//!
//!     let mut point = loader.get("Point")?.instantiate()?;
//!     point.set_field("x", 3)?;
//!     point.set_field("y", 4)?;
//!
//!     let norm = loader.call("point_norm", &[point.address()])?;
//!     println!("norm = {:?}", norm);
//!     Ok(())
//! }
//! ```

// Core modules
pub mod declarations;
pub mod ffi;
pub mod loader;
pub mod parser;
pub mod types;

// Test modules (only included in test configuration)
#[cfg(test)]
pub mod __tests__;

// Re-export main types for convenience
pub use declarations::{
    Attr, Compiled, Declaration, DeclarationBody, DeclarationKind, Member, MemberTable,
    MembersWrapper, Namespace, SharedNamespace,
};

pub use loader::{Loader, LoaderConfig};

pub use parser::{AnnotationParser, ParserConfig, Source};

pub use types::{Instance, LiveVariable, NativeType, Primitive, StructLayout, Value, View};

// Re-export error types
pub use crate::ffi::error::{AnnotateError, AnnotateResult};

// Re-export FFI types for advanced usage
pub use ffi::{
    call::ForeignFunction,
    library_loader::{LibraryConfig, LibraryLoader, LIBRARY_PATH_ENV},
    symbols::{SymbolResolver, SymbolTable},
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging with the filter from `RUST_LOG`
///
/// Call once at the start of the application. A second call fails because a
/// global subscriber is already installed.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()?;

    tracing::info!("{} v{} initialized", NAME, VERSION);
    Ok(())
}

/// Initialize logging with an explicit filter
pub fn init_with_config(config: InitConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_filter)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .try_init()?;

    tracing::info!("{} v{} initialized with filter `{}`", NAME, VERSION, config.log_filter);
    Ok(())
}

/// Logging initialization configuration
#[derive(Debug, Clone)]
pub struct InitConfig {
    /// Filter directives, e.g. `annotatec=debug`
    pub log_filter: String,
    /// Show the module path of each event
    pub with_target: bool,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            log_filter: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            with_target: true,
        }
    }
}
