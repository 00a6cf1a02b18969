//! # Dynamic Library Loader
//!
//! This module opens the shared library that annotated headers describe,
//! with platform-specific path resolution, and resolves exported symbols
//! for the declaration namespace.

use libloading::Library;
use serde::{Deserialize, Serialize};
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::ffi::error::{AnnotateError, AnnotateResult};
use crate::ffi::symbols::SymbolResolver;

/// Environment variable that overrides every configured search path
pub const LIBRARY_PATH_ENV: &str = "ANNOTATEC_LIBRARY_PATH";

/// Platform-specific library configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    pub name: String,
    pub search_paths: Vec<PathBuf>,
}

impl LibraryConfig {
    /// Configuration for a library base name (`foo` for `libfoo.so`),
    /// searched in the working directory and the usual system locations
    pub fn for_library(base_name: &str) -> Self {
        let file_name = Self::platform_file_name(base_name);
        let search_paths = Self::platform_directories()
            .into_iter()
            .map(|dir| dir.join(&file_name))
            .collect();
        Self {
            name: file_name,
            search_paths,
        }
    }

    /// Configuration with a single explicit path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            search_paths: vec![path],
        }
    }

    fn platform_file_name(base_name: &str) -> String {
        #[cfg(target_os = "macos")]
        {
            format!("lib{}.dylib", base_name)
        }

        #[cfg(target_os = "windows")]
        {
            format!("{}.dll", base_name)
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            format!("lib{}.so", base_name)
        }
    }

    fn platform_directories() -> Vec<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            vec![
                PathBuf::from("."),
                PathBuf::from("/usr/local/lib"),
                PathBuf::from("/opt/homebrew/lib"),
                PathBuf::from("/usr/lib"),
            ]
        }

        #[cfg(target_os = "windows")]
        {
            vec![PathBuf::from(".")]
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            vec![
                PathBuf::from("."),
                PathBuf::from("/usr/local/lib"),
                PathBuf::from("/usr/lib"),
                PathBuf::from("/lib"),
            ]
        }
    }
}

/// A loaded shared library
#[derive(Debug)]
pub struct LibraryLoader {
    library: Library,
    config: LibraryConfig,
}

impl LibraryLoader {
    /// Open the library described by `config`
    pub fn with_config(config: LibraryConfig) -> AnnotateResult<Self> {
        let library = Self::load_library(&config)?;
        Ok(Self { library, config })
    }

    /// Open the library at an exact path
    pub fn open(path: impl AsRef<Path>) -> AnnotateResult<Self> {
        let path = path.as_ref();
        info!("Loading library from: {}", path.display());
        let library = unsafe { Library::new(path)? };
        Ok(Self {
            library,
            config: LibraryConfig::with_path(path),
        })
    }

    /// Symbols of the running process, including everything it links against
    #[cfg(unix)]
    pub fn this_process() -> Self {
        let library: Library = libloading::os::unix::Library::this().into();
        Self {
            library,
            config: LibraryConfig {
                name: "<process>".to_string(),
                search_paths: Vec::new(),
            },
        }
    }

    fn load_library(config: &LibraryConfig) -> AnnotateResult<Library> {
        if let Ok(env_path) = std::env::var(LIBRARY_PATH_ENV) {
            let env_path = PathBuf::from(env_path);
            if env_path.exists() {
                info!("Loading library from environment: {}", env_path.display());
                return Ok(unsafe { Library::new(&env_path)? });
            }
        }

        for path in &config.search_paths {
            if path.exists() {
                info!("Loading library from: {}", path.display());
                return Ok(unsafe { Library::new(path)? });
            } else {
                debug!("Library not found at: {}", path.display());
            }
        }

        error!("Failed to find library '{}' in any search path", config.name);
        Err(AnnotateError::LibraryNotFound {
            library: config.name.clone(),
        })
    }

    /// Get the library configuration
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Check if a symbol is exported by the library
    pub fn has_symbol(&self, name: &str) -> bool {
        self.address(name).is_ok()
    }

    /// Wrap the loader for sharing with a namespace
    pub fn into_shared(self) -> Arc<dyn SymbolResolver> {
        Arc::new(self)
    }

    fn address(&self, name: &str) -> AnnotateResult<*mut c_void> {
        debug!("Resolving symbol: {}", name);
        let symbol = unsafe {
            self.library
                .get::<*mut c_void>(name.as_bytes())
                .map_err(|_| AnnotateError::SymbolNotFound {
                    symbol: name.to_string(),
                })?
        };
        let address = *symbol;
        if address.is_null() {
            return Err(AnnotateError::SymbolNotFound {
                symbol: name.to_string(),
            });
        }
        Ok(address)
    }
}

impl SymbolResolver for LibraryLoader {
    fn function_address(&self, name: &str) -> AnnotateResult<*const c_void> {
        self.address(name).map(|address| address as *const c_void)
    }

    fn data_address(&self, name: &str) -> AnnotateResult<*mut c_void> {
        self.address(name)
    }
}

impl Drop for LibraryLoader {
    fn drop(&mut self) {
        debug!("Dropping library loader for {}", self.config.name);
    }
}
