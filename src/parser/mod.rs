//! # Annotation Parser
//!
//! Collects annotation blocks from header text, files and directories and
//! registers the declarations they describe in a [`Namespace`].
//!
//! ```rust,no_run
//! use annotatec::{AnnotationParser, LibraryLoader};
//!
//! # fn main() -> annotatec::AnnotateResult<()> {
//! let library = LibraryLoader::open("./libgeometry.so")?.into_shared();
//! let mut parser = AnnotationParser::new(library);
//! parser.parse_directory("include/")?;
//! parser.initialize_objects()?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod extractor;
pub mod tokenizer;

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::declarations::Namespace;
use crate::ffi::error::AnnotateResult;
use crate::ffi::symbols::SymbolResolver;

pub use builder::build_declaration;
pub use extractor::{extract_blocks, BlockExtractor, CommentBlock};
pub use tokenizer::{tokenize, tokenize_strict, Unit};

/// Parser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Report unterminated blocks and unbalanced parentheses
    pub strict: bool,
    /// Include `*.c` files when parsing a directory
    pub c_extensions: bool,
    /// Include `*.h` files when parsing a directory
    pub h_extensions: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            strict: true,
            c_extensions: false,
            h_extensions: true,
        }
    }
}

impl ParserConfig {
    /// The tolerant mode: broken blocks are skipped silently
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }

    fn extensions(&self) -> Vec<&'static str> {
        let mut extensions = Vec::new();
        if self.c_extensions {
            extensions.push("c");
        }
        if self.h_extensions {
            extensions.push("h");
        }
        extensions
    }
}

/// One input of [`AnnotationParser::parse_sources`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A file, or a directory filtered by extension
    Path(PathBuf),
    /// Header text held in memory
    Text(String),
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

/// Parses annotated sources into a namespace
#[derive(Debug)]
pub struct AnnotationParser {
    config: ParserConfig,
    namespace: Namespace,
}

impl AnnotationParser {
    pub fn new(library: Arc<dyn SymbolResolver>) -> Self {
        Self::with_config(library, ParserConfig::default())
    }

    pub fn with_config(library: Arc<dyn SymbolResolver>, config: ParserConfig) -> Self {
        Self {
            config,
            namespace: Namespace::new(library),
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn namespace_mut(&mut self) -> &mut Namespace {
        &mut self.namespace
    }

    pub fn into_namespace(self) -> Namespace {
        self.namespace
    }

    /// Register every declaration in `text`; returns how many were found.
    ///
    /// The first malformed block aborts the source. Declarations from
    /// earlier blocks stay registered.
    pub fn parse_str(&mut self, text: &str) -> AnnotateResult<usize> {
        let mut registered = 0;
        for block in BlockExtractor::new(text, self.config.strict) {
            let block = block?;
            if let Some(declaration) = build_declaration(&block, self.config.strict)? {
                self.namespace.register(declaration);
                registered += 1;
            }
        }
        Ok(registered)
    }

    pub fn parse_reader<R: Read>(&mut self, mut reader: R) -> AnnotateResult<usize> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        self.parse_str(&text)
    }

    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> AnnotateResult<usize> {
        let path = path.as_ref();
        debug!("Parsing {}", path.display());
        let text = fs::read_to_string(path)?;
        self.parse_str(&text)
    }

    /// Parse the files directly inside `directory` whose extension is enabled
    pub fn parse_directory(&mut self, directory: impl AsRef<Path>) -> AnnotateResult<usize> {
        let directory = directory.as_ref();
        let extensions = self.config.extensions();

        let mut files = Vec::new();
        for entry in fs::read_dir(directory)? {
            let path = entry?.path();
            let enabled = path
                .extension()
                .and_then(|extension| extension.to_str())
                .is_some_and(|extension| extensions.iter().any(|enabled| *enabled == extension));
            if enabled && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut registered = 0;
        for file in &files {
            registered += self.parse_file(file)?;
        }
        info!(
            "Parsed {} file(s) in {}: {} declaration(s)",
            files.len(),
            directory.display(),
            registered
        );
        Ok(registered)
    }

    pub fn parse_sources(&mut self, sources: &[Source]) -> AnnotateResult<usize> {
        let mut registered = 0;
        for source in sources {
            registered += match source {
                Source::Path(path) if path.is_dir() => self.parse_directory(path)?,
                Source::Path(path) => self.parse_file(path)?,
                Source::Text(text) => self.parse_str(text)?,
            };
        }
        Ok(registered)
    }

    /// Compile everything parsed so far
    pub fn initialize_objects(&mut self) -> AnnotateResult<()> {
        self.namespace.compile_all()
    }
}
