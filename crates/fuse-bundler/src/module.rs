//! Source modules and their lifecycle.
//!
//! A [`SourceModule`] owns one file: its raw text, tree, generated output,
//! dependency list and cache facts. The lifecycle is driven step by step:
//!
//! ```text
//! init -> read -> parse -> transform -> generate
//!      \-> from_cache (restored output, no tree)
//! ```
//!
//! Parse failures do not abort the build: the module is marked errored and
//! continues with an empty program. Read failures abort the module.

use bitflags::bitflags;
use fuse_ast::{Node, ParseError, ParseOptions, Parser, builders};
use fuse_common::diagnostics::codes;
use fuse_common::{BuildConfig, Diagnostic, ParserKind, SourceMapPolicy};
use fuse_emitter::{CodeGenerator, GenerateError, GenerateOptions};
use fuse_transforms::{Transform, TransformContext, VisitSummary, transform_module_with};
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, error, trace, warn};

use crate::cache::CacheRecord;

pub const MISSING_INSTALL_HINT: &str = "Did you forget to run 'npm install'?";

// =============================================================================
// Classification
// =============================================================================

bitflags! {
    /// What a file is, derived from its extension.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SourceKind: u8 {
        const SCRIPT = 1 << 0;
        const TYPE_ANNOTATED = 1 << 1;
        const STYLESHEET = 1 << 2;
        const BINARY = 1 << 3;
        /// Modules that end up in the script registry.
        const EXECUTABLE = Self::SCRIPT.bits() | Self::TYPE_ANNOTATED.bits();
    }
}

impl SourceKind {
    /// Classify a lowercase extension including the dot.
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            ".js" | ".jsx" | ".mjs" | ".cjs" => SourceKind::SCRIPT,
            ".ts" | ".tsx" => SourceKind::TYPE_ANNOTATED,
            ".css" | ".scss" | ".sass" | ".less" | ".styl" => SourceKind::STYLESHEET,
            _ => SourceKind::BINARY,
        }
    }

    pub fn is_executable(self) -> bool {
        self.intersects(SourceKind::EXECUTABLE)
    }

    pub fn is_stylesheet(self) -> bool {
        self.contains(SourceKind::STYLESHEET)
    }
}

/// Where a module comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ModuleOrigin {
    /// Part of the project being built.
    #[default]
    User,
    /// Inside an installed package.
    Package { name: String },
}

impl ModuleOrigin {
    pub fn package(name: impl Into<String>) -> Self {
        ModuleOrigin::Package { name: name.into() }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, ModuleOrigin::Package { .. })
    }

    pub fn package_id(&self) -> Option<&str> {
        match self {
            ModuleOrigin::User => None,
            ModuleOrigin::Package { name } => Some(name),
        }
    }
}

/// Whether a module of `kind` from `origin` gets a source map under `policy`.
pub fn source_map_required(kind: SourceKind, origin: &ModuleOrigin, policy: &SourceMapPolicy) -> bool {
    let by_origin = if origin.is_external() {
        policy.vendor
    } else {
        policy.project
    };
    if kind.is_stylesheet() {
        return by_origin && policy.css;
    }
    by_origin
}

/// Lowercase extension of `path` including the dot, or empty.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Project-relative path with `/` separators.
pub fn public_path_for(root: &Path, abs_path: &Path) -> String {
    let relative = abs_path.strip_prefix(root).unwrap_or(abs_path);
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

/// Modification signature of a file: milliseconds since the Unix epoch.
pub fn modification_signature(path: &Path) -> io::Result<u64> {
    let modified = std::fs::metadata(path)?.modified()?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|err| io::Error::other(err.to_string()))?;
    Ok(since_epoch.as_millis() as u64)
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ModuleError {
    /// The file could not be read.
    NotFound {
        public_path: String,
        source: io::Error,
    },
    /// Parse failure under `strictParse`.
    Parse {
        public_path: String,
        source: ParseError,
    },
    /// A step that needs a tree ran before `parse`.
    MissingTree { public_path: String },
    Generate {
        public_path: String,
        source: GenerateError,
    },
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleError::NotFound {
                public_path,
                source,
            } => write!(f, "Module not found at {public_path}: {source}"),
            ModuleError::Parse {
                public_path,
                source,
            } => write!(f, "Error while parsing module {public_path}: {source}"),
            ModuleError::MissingTree { public_path } => {
                write!(f, "Cannot generate code without a tree: {public_path}")
            }
            ModuleError::Generate {
                public_path,
                source,
            } => write!(f, "Failed to generate {public_path}: {source}"),
        }
    }
}

impl std::error::Error for ModuleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModuleError::NotFound { source, .. } => Some(source),
            ModuleError::Parse { source, .. } => Some(source),
            ModuleError::Generate { source, .. } => Some(source),
            ModuleError::MissingTree { .. } => None,
        }
    }
}

// =============================================================================
// Parsers
// =============================================================================

/// The two parser families a build chooses between.
#[derive(Clone)]
pub struct Parsers {
    typescript: Arc<dyn Parser>,
    javascript: Arc<dyn Parser>,
}

impl Parsers {
    pub fn new(typescript: impl Parser + 'static, javascript: impl Parser + 'static) -> Self {
        Parsers {
            typescript: Arc::new(typescript),
            javascript: Arc::new(javascript),
        }
    }

    /// Use one parser for every file.
    pub fn single(parser: impl Parser + 'static) -> Self {
        let parser: Arc<dyn Parser> = Arc::new(parser);
        Parsers {
            typescript: Arc::clone(&parser),
            javascript: parser,
        }
    }

    pub fn get(&self, kind: ParserKind) -> &dyn Parser {
        match kind {
            ParserKind::Ts => self.typescript.as_ref(),
            ParserKind::Meriyah => self.javascript.as_ref(),
        }
    }
}

/// Builds an additional transform for one module. Registered on a build
/// session and run after the default set, in the same traversal.
pub type TransformFactory = Arc<dyn Fn(&TransformContext) -> Box<dyn Transform> + Send + Sync>;

impl fmt::Debug for Parsers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parsers").finish_non_exhaustive()
    }
}

// =============================================================================
// Source module
// =============================================================================

/// Stylesheet text produced by a stylesheet collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CssOutput {
    pub css: String,
    /// Source map as JSON text.
    pub map: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SourceModule {
    /// Unique and immutable within a generation.
    pub id: u32,
    pub abs_path: PathBuf,
    /// Project-relative path used in output and maps.
    pub public_path: String,
    pub extension: String,
    pub kind: SourceKind,
    pub origin: ModuleOrigin,
    pub source_map_required: bool,
    /// Raw text, loaded by [`SourceModule::read`].
    pub contents: Option<String>,
    pub tree: Option<Node>,
    /// Generated text.
    pub output: Option<String>,
    /// Source map of `output` as JSON text.
    pub source_map: Option<String>,
    pub css: Option<CssOutput>,
    /// Dependency ids in discovery order.
    pub dependencies: Vec<u32>,
    /// Modification signature recorded when the file was read.
    pub mtime: Option<u64>,
    /// Output restored from the cache instead of generated.
    pub cached: bool,
    pub break_dependants_cache: bool,
    pub errored: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl SourceModule {
    pub fn new(id: u32, abs_path: impl Into<PathBuf>, public_path: impl Into<String>) -> Self {
        let abs_path = abs_path.into();
        let extension = extension_of(&abs_path);
        SourceModule {
            id,
            kind: SourceKind::from_extension(&extension),
            extension,
            abs_path,
            public_path: public_path.into(),
            origin: ModuleOrigin::User,
            source_map_required: false,
            contents: None,
            tree: None,
            output: None,
            source_map: None,
            css: None,
            dependencies: Vec::new(),
            mtime: None,
            cached: false,
            break_dependants_cache: false,
            errored: false,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin: ModuleOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Supply raw text without touching the filesystem.
    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = Some(contents.into());
        self
    }

    /// Classify the file and derive its source-map requirement.
    pub fn init(&mut self, config: &BuildConfig) {
        self.extension = extension_of(&self.abs_path);
        self.kind = SourceKind::from_extension(&self.extension);
        self.source_map_required = source_map_required(self.kind, &self.origin, &config.source_map);
        trace!(
            module = %self.public_path,
            kind = ?self.kind,
            source_map = self.source_map_required,
            "module initialized"
        );
    }

    /// Rehydrate a module from a cache record, skipping parse, transform and
    /// generate. The caller checks the record's signature first.
    pub fn from_cache(record: &CacheRecord, config: &BuildConfig) -> Self {
        let origin = match &record.package_id {
            Some(name) => ModuleOrigin::package(name.clone()),
            None => ModuleOrigin::User,
        };
        let mut module = SourceModule::new(record.id, &record.abs_path, record.public_path.clone())
            .with_origin(origin);
        module.init(config);
        module.dependencies = record.dependencies.clone();
        module.mtime = Some(record.mtime);
        module.output = Some(record.contents.clone());
        module.source_map = record.source_map.clone();
        module.break_dependants_cache = record.break_dependants_cache;
        module.cached = true;
        if module.source_map.is_some() {
            module.source_map_required = true;
        }
        module
    }

    /// Cache record for this module's current output.
    pub fn meta(&self) -> CacheRecord {
        CacheRecord {
            id: self.id,
            abs_path: self.abs_path.clone(),
            dependencies: self.dependencies.clone(),
            mtime: self.mtime.unwrap_or_default(),
            package_id: self.origin.package_id().map(str::to_string),
            public_path: self.public_path.clone(),
            break_dependants_cache: self.break_dependants_cache,
            contents: self.output.clone().unwrap_or_default(),
            source_map: self.source_map.clone(),
        }
    }

    /// Record a dependency. Self-references and duplicates are ignored.
    pub fn add_dependency(&mut self, id: u32) -> bool {
        if id == self.id || self.dependencies.contains(&id) {
            return false;
        }
        self.dependencies.push(id);
        true
    }

    pub fn has_errors(&self) -> bool {
        self.errored || self.diagnostics.iter().any(Diagnostic::is_error)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Load the raw text once.
    pub fn read(&mut self) -> Result<&str, ModuleError> {
        if self.contents.is_none() {
            match std::fs::read_to_string(&self.abs_path) {
                Ok(text) => {
                    self.mtime = modification_signature(&self.abs_path).ok();
                    self.contents = Some(text);
                }
                Err(err) => {
                    if self.abs_path.components().any(|c| c.as_os_str() == "node_modules") {
                        warn!(module = %self.public_path, "{MISSING_INSTALL_HINT}");
                        self.diagnostics.push(Diagnostic::warning(
                            self.public_path.clone(),
                            codes::MISSING_INSTALL,
                            MISSING_INSTALL_HINT,
                        ));
                    }
                    error!(module = %self.public_path, error = %err, "module not found");
                    self.diagnostics.push(Diagnostic::error(
                        self.public_path.clone(),
                        codes::MODULE_NOT_FOUND,
                        format!("Module not found at {}", self.public_path),
                    ));
                    return Err(ModuleError::NotFound {
                        public_path: self.public_path.clone(),
                        source: err,
                    });
                }
            }
        }
        Ok(self.contents.as_deref().unwrap_or_default())
    }

    /// Parse the raw text into a tree.
    pub fn parse(&mut self, parsers: &Parsers, config: &BuildConfig) -> Result<&Node, ModuleError> {
        self.read()?;
        let source = self.contents.as_deref().unwrap_or_default();

        if source.is_empty() {
            warn!(module = %self.public_path, "empty module");
            self.diagnostics.push(Diagnostic::warning(
                self.public_path.clone(),
                codes::EMPTY_MODULE,
                format!(
                    "One of your dependencies contains an empty module: {}",
                    self.public_path
                ),
            ));
            self.errored = false;
            return Ok(&*self.tree.insert(builders::empty_module()));
        }

        let parser_kind = self.parser_kind(config);
        let options = ParseOptions {
            file_name: self.public_path.clone(),
            jsx: self.extension != ".ts",
            locations: self.source_map_required,
        };
        debug!(module = %self.public_path, parser = ?parser_kind, jsx = options.jsx, "parsing");
        match parsers.get(parser_kind).parse(source, &options) {
            Ok(tree) => {
                self.errored = false;
                Ok(&*self.tree.insert(tree))
            }
            Err(err) => {
                self.errored = true;
                error!(module = %self.abs_path.display(), error = %err, "parse failed");
                self.diagnostics.push(Diagnostic::error(
                    self.public_path.clone(),
                    codes::PARSE_FAILED,
                    format!("Error while parsing module {}: {err}", self.abs_path.display()),
                ));
                if config.strict_parse {
                    return Err(ModuleError::Parse {
                        public_path: self.public_path.clone(),
                        source: err,
                    });
                }
                Ok(&*self.tree.insert(builders::program(Vec::new(), "module")))
            }
        }
    }

    /// Type-annotated files always use the TypeScript parser; scripts follow
    /// the per-origin configuration.
    fn parser_kind(&self, config: &BuildConfig) -> ParserKind {
        if self.kind.contains(SourceKind::TYPE_ANNOTATED) {
            return ParserKind::Ts;
        }
        let js_parser = &config.compiler_options.js_parser;
        if self.origin.is_external() {
            js_parser.node_modules
        } else {
            js_parser.project
        }
    }

    /// Run the desugaring passes over the tree.
    pub fn transform(&mut self, config: &BuildConfig) -> Result<VisitSummary, ModuleError> {
        self.transform_with(config, &[])
    }

    /// Run the desugaring passes plus one transform per factory. A transform
    /// may flag the module to invalidate its dependants.
    pub fn transform_with(
        &mut self,
        config: &BuildConfig,
        extra: &[TransformFactory],
    ) -> Result<VisitSummary, ModuleError> {
        let Some(tree) = self.tree.as_mut() else {
            return Err(ModuleError::MissingTree {
                public_path: self.public_path.clone(),
            });
        };
        let mut ctx = TransformContext::from_config(&self.public_path, &self.extension, config)
            .with_source_map(self.source_map_required)
            .with_source(self.contents.as_deref().unwrap_or_default());
        let extra = extra.iter().map(|factory| (**factory)(&ctx)).collect();
        let summary = transform_module_with(tree, &mut ctx, extra);
        self.break_dependants_cache = ctx.break_dependants_cache;
        Ok(summary)
    }

    /// Generate text, and a map when required.
    pub fn generate(
        &mut self,
        generator: &dyn CodeGenerator,
        config: &BuildConfig,
    ) -> Result<&str, ModuleError> {
        let Some(tree) = self.tree.as_ref() else {
            return Err(ModuleError::MissingTree {
                public_path: self.public_path.clone(),
            });
        };
        let options = GenerateOptions {
            compact: config.is_production(),
            source_map: self.source_map_required,
            file: Some(self.public_path.clone()),
            source_name: Some(self.public_path.clone()),
        };
        let generated = match generator.generate(tree, &options) {
            Ok(generated) => generated,
            Err(err) => {
                error!(module = %self.public_path, error = %err, "code generation failed");
                self.diagnostics.push(Diagnostic::error(
                    self.public_path.clone(),
                    codes::GENERATE_FAILED,
                    err.to_string(),
                ));
                return Err(ModuleError::Generate {
                    public_path: self.public_path.clone(),
                    source: err,
                });
            }
        };

        self.source_map = match generated.map {
            Some(mut map) if self.source_map_required => {
                if !map.has_sources_content() {
                    map.file = None;
                    map.sources = vec![self.public_path.clone()];
                    map.sources_content = Some(vec![self.contents.clone()]);
                }
                Some(map.to_json())
            }
            _ => None,
        };
        Ok(self.output.insert(generated.code).as_str())
    }

    /// Read, parse, transform and generate in one call. Cached modules keep
    /// their restored output; stylesheets pass their text through.
    pub fn process(
        &mut self,
        parsers: &Parsers,
        generator: &dyn CodeGenerator,
        config: &BuildConfig,
    ) -> Result<(), ModuleError> {
        self.process_with(parsers, generator, config, &[])
    }

    /// [`SourceModule::process`] with additional transforms.
    pub fn process_with(
        &mut self,
        parsers: &Parsers,
        generator: &dyn CodeGenerator,
        config: &BuildConfig,
        extra: &[TransformFactory],
    ) -> Result<(), ModuleError> {
        if self.cached {
            return Ok(());
        }
        self.diagnostics.clear();
        if self.kind.is_stylesheet() {
            let css = self.read()?.to_string();
            if self.css.is_none() {
                self.css = Some(CssOutput { css, map: None });
            }
            return Ok(());
        }
        if !self.kind.is_executable() {
            return Ok(());
        }
        self.parse(parsers, config)?;
        let summary = self.transform_with(config, extra)?;
        self.generate(generator, config)?;
        debug!(
            module = %self.public_path,
            replaced = summary.replaced,
            hoisted = summary.hoisted,
            "module processed"
        );
        Ok(())
    }
}
