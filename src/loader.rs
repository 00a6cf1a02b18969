//! # Loader
//!
//! One-stop entry point: open a library, parse its annotated headers and
//! optionally compile everything up front. Names are then looked up
//! through [`Loader::get`], which compiles lazily when precompilation is off.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::declarations::{Compiled, Namespace};
use crate::ffi::call::ForeignFunction;
use crate::ffi::error::AnnotateResult;
use crate::ffi::library_loader::{LibraryConfig, LibraryLoader};
use crate::ffi::symbols::SymbolResolver;
use crate::parser::{AnnotationParser, ParserConfig, Source};
use crate::types::buffers::LiveVariable;
use crate::types::value::Value;

fn default_precompile() -> bool {
    true
}

/// Everything needed to build a [`Loader`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub library: LibraryConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    /// Header files or directories
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    /// Compile every declaration right after parsing
    #[serde(default = "default_precompile")]
    pub precompile: bool,
}

impl LoaderConfig {
    pub fn new(library: LibraryConfig) -> Self {
        Self {
            library,
            parser: ParserConfig::default(),
            sources: Vec::new(),
            precompile: true,
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn from_json_str(json: &str) -> AnnotateResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> AnnotateResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// A parsed library with lazy access to its declarations
#[derive(Debug)]
pub struct Loader {
    parser: AnnotationParser,
}

impl Loader {
    /// Open the configured library and parse the configured sources
    pub fn new(config: LoaderConfig) -> AnnotateResult<Self> {
        let library = LibraryLoader::with_config(config.library)?.into_shared();
        let sources: Vec<Source> = config.sources.into_iter().map(Source::from).collect();
        Self::build(library, config.parser, &sources, config.precompile)
    }

    /// Parse `sources` against an already available resolver
    pub fn with_resolver(
        resolver: Arc<dyn SymbolResolver>,
        sources: &[Source],
        precompile: bool,
    ) -> AnnotateResult<Self> {
        Self::build(resolver, ParserConfig::default(), sources, precompile)
    }

    fn build(
        resolver: Arc<dyn SymbolResolver>,
        parser_config: ParserConfig,
        sources: &[Source],
        precompile: bool,
    ) -> AnnotateResult<Self> {
        let mut parser = AnnotationParser::with_config(resolver, parser_config);
        let registered = parser.parse_sources(sources)?;
        if precompile {
            parser.initialize_objects()?;
        }
        info!(
            "Loader ready: {} declaration(s), precompiled: {}",
            registered, precompile
        );
        Ok(Self { parser })
    }

    pub fn parser(&self) -> &AnnotationParser {
        &self.parser
    }

    pub fn namespace(&mut self) -> &mut Namespace {
        self.parser.namespace_mut()
    }

    /// Compile a name or type-name expression
    pub fn get(&mut self, name: &str) -> AnnotateResult<Compiled> {
        self.namespace().compile(name)
    }

    /// `name` behind `depth` levels of pointers
    pub fn reference(&mut self, name: &str, depth: usize) -> AnnotateResult<Compiled> {
        let name = format!("{}{}", name, "*".repeat(depth));
        self.namespace().compile(&name)
    }

    pub fn function(&mut self, name: &str) -> AnnotateResult<Arc<ForeignFunction>> {
        self.namespace().function(name)
    }

    pub fn call(&mut self, name: &str, arguments: &[Value]) -> AnnotateResult<Value> {
        self.function(name)?.call(arguments)
    }

    pub fn value(&mut self, name: &str) -> AnnotateResult<LiveVariable> {
        self.namespace().value(name)
    }
}
