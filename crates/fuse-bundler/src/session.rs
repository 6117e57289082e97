//! Build sessions.
//!
//! A [`BuildSession`] keeps module state between rebuilds, keyed by absolute
//! path. Each build:
//!
//! 1. assigns ids (stable for the lifetime of the session),
//! 2. runs module lifecycles in parallel, reusing a retained module when its
//!    modification signature is unchanged, else restoring from the cache,
//!    else processing from scratch,
//!    then rebuilds every reused module depending on a rebuilt module that
//!    flagged its dependants,
//! 3. assembles the script and stylesheet bundles in id order,
//! 4. commits the new module state only if no newer generation has begun.

use anyhow::{Context, Result};
use dashmap::DashMap;
use fuse_common::{BuildConfig, Diagnostic};
use fuse_emitter::CodeGenerator;
use fuse_transforms::{Transform, TransformContext};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info, trace};

use crate::bundle::{Bundle, BundleKind, BundleOptions, BundleOutput};
use crate::cache::ModuleCache;
use crate::generation::{BuildGeneration, GenerationToken};
use crate::module::{
    ModuleOrigin, Parsers, SourceModule, TransformFactory, modification_signature,
};

/// One node of the resolved dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    pub abs_path: PathBuf,
    pub public_path: String,
    pub origin: ModuleOrigin,
    /// Absolute paths of resolved dependencies, in discovery order.
    pub dependencies: Vec<PathBuf>,
    pub entry: bool,
}

impl ModuleSpec {
    pub fn new(abs_path: impl Into<PathBuf>, public_path: impl Into<String>) -> Self {
        ModuleSpec {
            abs_path: abs_path.into(),
            public_path: public_path.into(),
            origin: ModuleOrigin::User,
            dependencies: Vec::new(),
            entry: false,
        }
    }

    pub fn with_origin(mut self, origin: ModuleOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_dependency(mut self, abs_path: impl Into<PathBuf>) -> Self {
        self.dependencies.push(abs_path.into());
        self
    }

    pub fn as_entry(mut self) -> Self {
        self.entry = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub bundle: BundleOptions,
    /// Export entry modules onto the target's global object; a non-empty
    /// name nests them under that property.
    pub export_global: Option<String>,
    /// Raw lines appended to the ready function.
    pub injection: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub generation: GenerationToken,
    pub script: BundleOutput,
    /// Present when the graph contains stylesheets.
    pub stylesheet: Option<BundleOutput>,
    /// Digest of the script modules' modification signatures.
    pub hash: String,
    pub diagnostics: Vec<Diagnostic>,
    /// Modules parsed, transformed and generated in this build.
    pub processed: usize,
    /// Modules kept from the previous build or restored from the cache.
    pub reused: usize,
}

impl BuildOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

#[derive(Debug)]
pub enum BuildOutcome {
    Committed(Box<BuildOutput>),
    /// A newer generation began while this one was running.
    Superseded {
        generation: GenerationToken,
        current: GenerationToken,
    },
}

impl BuildOutcome {
    pub fn committed(self) -> Option<BuildOutput> {
        match self {
            BuildOutcome::Committed(output) => Some(*output),
            BuildOutcome::Superseded { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provenance {
    Processed,
    Retained,
    Restored,
}

pub struct BuildSession {
    config: BuildConfig,
    parsers: Parsers,
    generator: Box<dyn CodeGenerator>,
    transforms: Vec<TransformFactory>,
    modules: DashMap<PathBuf, SourceModule>,
    ids: DashMap<PathBuf, u32>,
    next_id: AtomicU32,
    cache: ModuleCache,
    generation: BuildGeneration,
}

impl BuildSession {
    pub fn new(
        config: BuildConfig,
        parsers: Parsers,
        generator: impl CodeGenerator + 'static,
    ) -> Self {
        BuildSession {
            config,
            parsers,
            generator: Box::new(generator),
            transforms: Vec::new(),
            modules: DashMap::new(),
            ids: DashMap::new(),
            next_id: AtomicU32::new(1),
            cache: ModuleCache::new(),
            generation: BuildGeneration::new(),
        }
    }

    /// Seed the session with persisted cache records.
    pub fn with_cache(mut self, cache: ModuleCache) -> Self {
        self.cache = cache;
        self
    }

    /// Run an additional transform over every processed module.
    pub fn with_transform(
        mut self,
        factory: impl Fn(&TransformContext) -> Box<dyn Transform> + Send + Sync + 'static,
    ) -> Self {
        self.transforms.push(Arc::new(factory));
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Snapshot of a retained module.
    pub fn module(&self, abs_path: &Path) -> Option<SourceModule> {
        self.modules.get(abs_path).map(|module| module.clone())
    }

    pub fn save_cache(&self, path: &Path) -> Result<()> {
        self.cache.save(path)
    }

    /// Id of `abs_path`, minted on first sight.
    pub fn id_for(&self, abs_path: &Path) -> u32 {
        if let Some(id) = self.ids.get(abs_path) {
            return *id;
        }
        *self
            .ids
            .entry(abs_path.to_path_buf())
            .or_insert_with(|| self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn begin_generation(&self) -> GenerationToken {
        self.generation.begin()
    }

    pub fn is_current(&self, token: GenerationToken) -> bool {
        self.generation.is_current(token)
    }

    /// Begin a generation and build it.
    pub fn build(&self, graph: &[ModuleSpec], options: &BuildOptions) -> Result<BuildOutcome> {
        let token = self.begin_generation();
        self.build_generation(token, graph, options)
    }

    /// Build `graph` under `token`. The result is only committed, and the
    /// retained module state only replaced, if `token` is still current.
    pub fn build_generation(
        &self,
        token: GenerationToken,
        graph: &[ModuleSpec],
        options: &BuildOptions,
    ) -> Result<BuildOutcome> {
        let ids: Vec<u32> = graph.iter().map(|spec| self.id_for(&spec.abs_path)).collect();
        debug!(generation = token.value(), modules = graph.len(), "build started");

        let mut built: Vec<(SourceModule, Provenance)> = graph
            .par_iter()
            .zip(ids.par_iter())
            .map(|(spec, &id)| -> Result<(SourceModule, Provenance)> {
                let (mut module, provenance) = self.prepare(spec, id)?;
                module.dependencies.clear();
                for dependency in &spec.dependencies {
                    match self.ids.get(dependency) {
                        Some(dependency_id) => {
                            module.add_dependency(*dependency_id);
                        }
                        None => trace!(
                            module = %module.public_path,
                            dependency = %dependency.display(),
                            "dependency outside the graph"
                        ),
                    }
                }
                Ok((module, provenance))
            })
            .collect::<Result<_>>()?;
        self.invalidate_dependants(graph, &mut built)?;
        built.sort_by_key(|(module, _)| module.id);

        if !self.generation.is_current(token) {
            return Ok(self.superseded(token));
        }

        let processed = built
            .iter()
            .filter(|(_, provenance)| *provenance == Provenance::Processed)
            .count();
        let reused = built.len() - processed;
        let modules: Vec<SourceModule> = built.into_iter().map(|(module, _)| module).collect();
        let entries: Vec<u32> = graph
            .iter()
            .zip(&ids)
            .filter(|(spec, _)| spec.entry)
            .map(|(_, &id)| id)
            .collect();

        let (script, stylesheet, hash) = self.assemble(&modules, &entries, options);
        let diagnostics: Vec<Diagnostic> = modules
            .iter()
            .flat_map(|module| module.diagnostics.iter().cloned())
            .collect();

        let in_graph: FxHashSet<PathBuf> = graph.iter().map(|spec| spec.abs_path.clone()).collect();
        let committed = self.generation.commit(token, || {
            self.modules.retain(|path, _| in_graph.contains(path));
            for module in modules {
                self.cache.store(&module);
                self.modules.insert(module.abs_path.clone(), module);
            }
        });
        if !committed {
            return Ok(self.superseded(token));
        }

        info!(
            generation = token.value(),
            processed,
            reused,
            diagnostics = diagnostics.len(),
            "build committed"
        );
        Ok(BuildOutcome::Committed(Box::new(BuildOutput {
            generation: token,
            script,
            stylesheet,
            hash,
            diagnostics,
            processed,
            reused,
        })))
    }

    /// Reprocess reused modules that depend on a module rebuilt in this
    /// generation with `break_dependants_cache` set. `built` is in graph
    /// order.
    fn invalidate_dependants(
        &self,
        graph: &[ModuleSpec],
        built: &mut [(SourceModule, Provenance)],
    ) -> Result<()> {
        let flagged: FxHashSet<u32> = built
            .iter()
            .filter(|(module, provenance)| {
                *provenance == Provenance::Processed && module.break_dependants_cache
            })
            .map(|(module, _)| module.id)
            .collect();
        if flagged.is_empty() {
            return Ok(());
        }

        built
            .par_iter_mut()
            .zip(graph.par_iter())
            .try_for_each(|((module, provenance), spec)| -> Result<()> {
                if *provenance == Provenance::Processed
                    || !module.dependencies.iter().any(|id| flagged.contains(id))
                {
                    return Ok(());
                }
                debug!(module = %spec.public_path, "dependency invalidated its dependants");
                self.cache.invalidate(&spec.abs_path);
                let dependencies = std::mem::take(&mut module.dependencies);
                *module = self.process_fresh(spec, module.id)?;
                module.dependencies = dependencies;
                *provenance = Provenance::Processed;
                Ok(())
            })
    }

    fn superseded(&self, token: GenerationToken) -> BuildOutcome {
        BuildOutcome::Superseded {
            generation: token,
            current: self.generation.current(),
        }
    }

    /// Retained module, cache restoration, or a fresh lifecycle run.
    fn prepare(&self, spec: &ModuleSpec, id: u32) -> Result<(SourceModule, Provenance)> {
        let signature = modification_signature(&spec.abs_path).ok();

        if let Some(retained) = self.modules.get(&spec.abs_path)
            && !retained.errored
            && retained.mtime.is_some()
            && retained.mtime == signature
        {
            trace!(module = %spec.public_path, "module unchanged");
            return Ok((retained.clone(), Provenance::Retained));
        }

        if let Some(mut restored) = self.cache.restore(&spec.abs_path, &self.config) {
            restored.id = id;
            restored.public_path = spec.public_path.clone();
            return Ok((restored, Provenance::Restored));
        }

        Ok((self.process_fresh(spec, id)?, Provenance::Processed))
    }

    fn process_fresh(&self, spec: &ModuleSpec, id: u32) -> Result<SourceModule> {
        let mut module = SourceModule::new(id, &spec.abs_path, spec.public_path.clone())
            .with_origin(spec.origin.clone());
        module.init(&self.config);
        module
            .process_with(
                &self.parsers,
                self.generator.as_ref(),
                &self.config,
                &self.transforms,
            )
            .with_context(|| format!("failed to build module {}", spec.public_path))?;
        Ok(module)
    }

    fn assemble(
        &self,
        modules: &[SourceModule],
        entries: &[u32],
        options: &BuildOptions,
    ) -> (BundleOutput, Option<BundleOutput>, String) {
        let mut script = Bundle::new(BundleKind::Script, &self.config);
        let mut stylesheet = Bundle::new(BundleKind::Stylesheet, &self.config);
        for module in modules {
            if module.kind.is_executable() {
                script.add_module(module);
            } else if module.kind.is_stylesheet() {
                stylesheet.add_module(module);
            }
        }
        for &id in entries {
            script.add_entry(id);
        }
        if let Some(name) = &options.export_global {
            script.export_to_global(name.clone());
        }
        for line in &options.injection {
            script.inject(line.clone());
        }

        let hash = script.hash();
        let script_output = script.generate(&options.bundle);
        let stylesheet_output =
            (!stylesheet.modules().is_empty()).then(|| stylesheet.generate(&options.bundle));
        (script_output, stylesheet_output, hash)
    }
}
