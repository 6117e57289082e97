//! fuse: the module transform-and-assemble core of the fuse bundler.
//!
//! The work is split across the workspace crates; this crate re-exports them
//! and adds process-level setup:
//!
//! - [`common`]: configuration, diagnostics, source maps, limits
//! - [`ast`]: the ESTree-shaped tree and the `Parser` seam
//! - [`transforms`]: the visitor engine, optional chaining and JSX lowering
//! - [`emitter`]: the `CodeGenerator` seam and the reference printer
//! - [`bundler`]: module lifecycle, cache, bundle assembly, build sessions

pub use fuse_ast as ast;
pub use fuse_bundler as bundler;
pub use fuse_common as common;
pub use fuse_emitter as emitter;
pub use fuse_transforms as transforms;

pub use fuse_bundler::{
    BuildOptions, BuildOutcome, BuildOutput, BuildSession, ModuleCache, ModuleSpec, Parsers,
};
pub use fuse_common::{BuildConfig, Diagnostic};

// Tracing subscriber setup (FUSE_LOG / FUSE_LOG_FORMAT)
pub mod tracing_config;

// Session setup from files on disk
pub mod workspace;
pub use workspace::open_session;
