//! Build sessions opened from files on disk.

use anyhow::{Context, Result};
use fuse_bundler::{BuildSession, ModuleCache, Parsers};
use fuse_common::BuildConfig;
use fuse_emitter::CodeGenerator;
use std::path::Path;
use tracing::{debug, warn};

/// Open a session with the configuration at `config_path`, seeded from the
/// module cache at `cache_path` when one is given and present.
///
/// A missing cache starts cold. An unreadable cache is discarded with a
/// warning, since every record is rebuilt from source anyway.
pub fn open_session(
    config_path: &Path,
    cache_path: Option<&Path>,
    parsers: Parsers,
    generator: impl CodeGenerator + 'static,
) -> Result<BuildSession> {
    let config = BuildConfig::from_path(config_path)
        .with_context(|| format!("failed to open build session for {}", config_path.display()))?;
    debug!(
        build_target = ?config.target,
        production = config.is_production(),
        "build configuration loaded"
    );

    let session = BuildSession::new(config, parsers, generator);
    let Some(cache_path) = cache_path else {
        return Ok(session);
    };
    if !cache_path.exists() {
        debug!(path = %cache_path.display(), "no module cache yet");
        return Ok(session);
    }
    match ModuleCache::load(cache_path) {
        Ok(cache) => Ok(session.with_cache(cache)),
        Err(err) => {
            warn!(path = %cache_path.display(), error = %format!("{err:#}"), "discarding module cache");
            Ok(session)
        }
    }
}
