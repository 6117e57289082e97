//! Module cache records and restoration.
//!
//! A [`CacheRecord`] is what a finished module persists: identity, graph
//! facts, the modification signature seen when it was read, and its
//! generated output. Restoration trusts a matching signature; configuration
//! changes that leave file content untouched are not detected.

use anyhow::{Context, Result};
use dashmap::DashMap;
use fuse_common::BuildConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::module::{SourceModule, modification_signature};

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub id: u32,
    pub abs_path: PathBuf,
    pub dependencies: Vec<u32>,
    /// Modification signature recorded when the module was read.
    pub mtime: u64,
    /// Absent for modules outside installed packages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
    pub public_path: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub break_dependants_cache: bool,
    /// Generated text.
    #[serde(default)]
    pub contents: String,
    /// Source map JSON text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_map: Option<String>,
}

impl CacheRecord {
    /// Whether the file on disk still carries the recorded signature.
    pub fn is_fresh(&self) -> bool {
        match modification_signature(&self.abs_path) {
            Ok(mtime) => mtime == self.mtime,
            Err(_) => false,
        }
    }
}

/// Cache records keyed by absolute path.
#[derive(Debug, Default)]
pub struct ModuleCache {
    records: DashMap<PathBuf, CacheRecord>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn insert(&self, record: CacheRecord) {
        self.records.insert(record.abs_path.clone(), record);
    }

    /// Store the record of a finished module. Errored modules are not cached.
    pub fn store(&self, module: &SourceModule) -> bool {
        if module.errored || module.output.is_none() || module.mtime.is_none() {
            return false;
        }
        self.insert(module.meta());
        true
    }

    pub fn get(&self, abs_path: &Path) -> Option<CacheRecord> {
        self.records.get(abs_path).map(|record| record.clone())
    }

    pub fn invalidate(&self, abs_path: &Path) -> Option<CacheRecord> {
        self.records.remove(abs_path).map(|(_, record)| record)
    }

    /// Rehydrate the module at `abs_path` when its signature still matches.
    /// Stale records are dropped.
    pub fn restore(&self, abs_path: &Path, config: &BuildConfig) -> Option<SourceModule> {
        let record = self.get(abs_path)?;
        if !record.is_fresh() {
            debug!(module = %record.public_path, "cache record is stale");
            self.invalidate(abs_path);
            return None;
        }
        trace!(module = %record.public_path, "restored from cache");
        Some(SourceModule::from_cache(&record, config))
    }

    /// Records sorted by id.
    pub fn records(&self) -> Vec<CacheRecord> {
        let mut records: Vec<CacheRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(|record| record.id);
        records
    }

    /// Load records persisted by [`ModuleCache::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read module cache {}", path.display()))?;
        let records: Vec<CacheRecord> = serde_json::from_str(&text)
            .with_context(|| format!("invalid module cache {}", path.display()))?;
        let cache = ModuleCache::new();
        for record in records {
            cache.insert(record);
        }
        debug!(records = cache.len(), path = %path.display(), "module cache loaded");
        Ok(cache)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let json = serde_json::to_string(&self.records())
            .context("failed to serialize module cache")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write module cache {}", path.display()))?;
        Ok(())
    }
}
