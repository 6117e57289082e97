//! Common types and utilities for the fuse bundler core.
//!
//! This crate provides foundational types used across all fuse crates:
//! - Build configuration (`BuildConfig`, `Target`, `SourceMapPolicy`)
//! - Diagnostics collected per module (`Diagnostic`, `DiagnosticSeverity`)
//! - Source map documents, VLQ encoding and a mapping builder
//! - Traversal limits

// Build configuration consumed by the transform and assembly stages
pub mod config;
pub use config::{
    BuildConfig, CompilerOptions, EnvironmentType, JsParserOptions, ParserKind, SourceMapPolicy,
    Target,
};

// Diagnostics surfaced to the logging collaborator
pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticSeverity};

// Centralized limits and thresholds
pub mod limits;

// Source Map documents and generation
pub mod source_map;
pub use source_map::{Mapping, OriginalPosition, SourceMap, SourceMapBuilder, SourceMapError};
