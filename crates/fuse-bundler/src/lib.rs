//! Module lifecycle, caching and bundle assembly.
//!
//! - [`module`]: one source file from raw text to generated output
//! - [`cache`]: persisted module records and restoration
//! - [`concat`]: newline-joined parts with a combined source map
//! - [`bundle`]: the registry-shaped script bundle and the stylesheet bundle
//! - [`generation`]: rebuild generations with compare-and-discard commit
//! - [`session`]: incremental builds over a resolved dependency graph

pub mod bundle;
pub mod cache;
pub mod concat;
pub mod generation;
pub mod module;
pub mod session;

pub use bundle::{Bundle, BundleKind, BundleOptions, BundleOutput, strip_source_mapping_comments};
pub use cache::{CacheRecord, ModuleCache};
pub use concat::{ConcatBuffer, ConcatOutput};
pub use generation::{BuildGeneration, GenerationToken};
pub use module::{
    CssOutput, ModuleError, ModuleOrigin, Parsers, SourceKind, SourceModule, TransformFactory,
    source_map_required,
};
pub use session::{BuildOptions, BuildOutcome, BuildOutput, BuildSession, ModuleSpec};
