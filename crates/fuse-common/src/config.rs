//! Build configuration.
//!
//! Configuration is discovered and merged by an outer collaborator; this
//! module only describes the resolved shape the core consumes and applies the
//! bundler defaults when fields are missing. Values are not validated beyond
//! what deserialization enforces.
//!
//! ```json
//! {
//!   "target": "browser",
//!   "environment": "production",
//!   "sourceMap": { "project": true, "vendor": false, "css": true },
//!   "compilerOptions": {
//!     "jsxFactory": "h",
//!     "jsParser": { "project": "ts", "nodeModules": "meriyah" }
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default JSX factory when neither configuration nor a pragma names one.
pub const DEFAULT_JSX_FACTORY: &str = "React.createElement";

// =============================================================================
// Deployment target / environment
// =============================================================================

/// Deployment target of the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    #[default]
    Browser,
    Server,
    Electron,
    WebWorker,
}

impl Target {
    /// Object that entry exports are copied onto when exporting to a global.
    ///
    /// Web workers have no such object, so export-to-global is unsupported there.
    pub fn global_context(self) -> Option<&'static str> {
        match self {
            Target::Browser | Target::Electron => Some("window"),
            Target::Server => Some("exports"),
            Target::WebWorker => None,
        }
    }
}

/// Environment the build runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentType {
    #[default]
    Development,
    Production,
    Test,
}

// =============================================================================
// Source map policy
// =============================================================================

/// Which modules get source maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceMapPolicy {
    /// Maps for user-authored modules.
    pub project: bool,
    /// Maps for modules from external packages.
    pub vendor: bool,
    /// Maps for stylesheets.
    pub css: bool,
}

impl Default for SourceMapPolicy {
    fn default() -> Self {
        SourceMapPolicy {
            project: true,
            vendor: false,
            css: true,
        }
    }
}

// =============================================================================
// Compiler options
// =============================================================================

/// Parser family selected for plain script files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// Plain JavaScript parser.
    Meriyah,
    /// Type-annotation aware parser.
    Ts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsParserOptions {
    /// Parser for user-authored `.js` files.
    pub project: ParserKind,
    /// Parser for `.js` files inside external packages.
    pub node_modules: ParserKind,
}

impl Default for JsParserOptions {
    fn default() -> Self {
        JsParserOptions {
            project: ParserKind::Ts,
            node_modules: ParserKind::Meriyah,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    /// Element constructor, e.g. `React.createElement` or `h`.
    pub jsx_factory: String,
    /// Fragment marker. Defaults to `<first factory segment>.Fragment`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsx_fragment_factory: Option<String>,
    pub js_parser: JsParserOptions,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            jsx_factory: DEFAULT_JSX_FACTORY.to_string(),
            jsx_fragment_factory: None,
            js_parser: JsParserOptions::default(),
        }
    }
}

// =============================================================================
// Build configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfig {
    pub target: Target,
    pub environment: EnvironmentType,
    /// Size-optimized output. Also implied by the production environment.
    pub production: bool,
    pub source_map: SourceMapPolicy,
    pub compiler_options: CompilerOptions,
    /// Fail a module on parse errors instead of substituting an empty tree.
    pub strict_parse: bool,
}

impl BuildConfig {
    /// Parse a resolved configuration document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to parse build configuration")
    }

    /// Read and parse a resolved configuration document from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read build configuration {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("invalid build configuration {}", path.display()))
    }

    pub fn is_production(&self) -> bool {
        self.production || self.environment == EnvironmentType::Production
    }
}
