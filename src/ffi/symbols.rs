//! # Symbol Resolution
//!
//! The namespace never loads libraries itself. It only asks a
//! [`SymbolResolver`] for the address of an exported function or data
//! symbol when a `@function` or `@variable` declaration is bound.

use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use tracing::debug;

use crate::ffi::error::{AnnotateError, AnnotateResult};

/// Lookup of exported symbols in a loaded library
pub trait SymbolResolver: Send + Sync + fmt::Debug {
    /// Address of an exported function
    fn function_address(&self, name: &str) -> AnnotateResult<*const c_void>;

    /// Address of an exported data symbol's storage
    fn data_address(&self, name: &str) -> AnnotateResult<*mut c_void>;
}

/// In-memory symbol table for host-registered functions and data
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    functions: HashMap<String, usize>,
    data: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under an exported name
    pub fn insert_function(&mut self, name: &str, address: *const c_void) -> &mut Self {
        self.functions.insert(name.to_string(), address as usize);
        self
    }

    /// Register data storage under an exported name
    ///
    /// The storage must stay valid for as long as the table is in use.
    pub fn insert_data(&mut self, name: &str, address: *mut c_void) -> &mut Self {
        self.data.insert(name.to_string(), address as usize);
        self
    }

    pub fn len(&self) -> usize {
        self.functions.len() + self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.data.is_empty()
    }
}

impl SymbolResolver for SymbolTable {
    fn function_address(&self, name: &str) -> AnnotateResult<*const c_void> {
        debug!("Resolving function symbol: {}", name);
        self.functions
            .get(name)
            .map(|&address| address as *const c_void)
            .ok_or_else(|| AnnotateError::SymbolNotFound {
                symbol: name.to_string(),
            })
    }

    fn data_address(&self, name: &str) -> AnnotateResult<*mut c_void> {
        debug!("Resolving data symbol: {}", name);
        self.data
            .get(name)
            .map(|&address| address as *mut c_void)
            .ok_or_else(|| AnnotateError::SymbolNotFound {
                symbol: name.to_string(),
            })
    }
}
