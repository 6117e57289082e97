//! Bundle assembly.
//!
//! A script bundle is a registry call built from the modules in the order
//! they were added:
//!
//! ```javascript
//! __fuse.bundle({
//! // src/index.js @1
//! 1: function(__fusereq, exports, module){
//! <generated text>
//! },
//! ...
//! }, function(){
//! __fuse.r(1)
//! })
//! ```
//!
//! A stylesheet bundle concatenates each module's stylesheet text instead.
//! Both go through [`ConcatBuffer`], so module maps are shifted by the lines
//! before them.

use fuse_ast::builders::is_identifier_name;
use fuse_common::{BuildConfig, SourceMap, Target};
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::concat::ConcatBuffer;
use crate::module::SourceModule;

/// Names the runtime core defines.
pub mod runtime {
    pub const GLOBAL_OBJECT: &str = "__fuse";
    pub const BUNDLE_FUNCTION: &str = "bundle";
    pub const REQUIRE_FUNCTION: &str = "r";
    /// First parameter of every registry factory.
    pub const REQUIRE_ARGUMENT: &str = "__fusereq";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BundleKind {
    #[default]
    Script,
    Stylesheet,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleOptions {
    /// Wrap the whole bundle in `(function(){ ... })()`.
    pub isolated: bool,
    /// Runtime core text placed before the registry.
    pub runtime_core: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleOutput {
    pub content: String,
    pub source_map: Option<SourceMap>,
    /// Whether any module contributed a map.
    pub contains_maps: bool,
}

#[derive(Debug, Clone)]
pub struct Bundle<'m> {
    pub kind: BundleKind,
    pub target: Target,
    pub production: bool,
    modules: Vec<&'m SourceModule>,
    entries: Vec<u32>,
    injection: Vec<String>,
    exported_global: Option<String>,
}

impl<'m> Bundle<'m> {
    pub fn new(kind: BundleKind, config: &BuildConfig) -> Self {
        Bundle {
            kind,
            target: config.target,
            production: config.is_production(),
            modules: Vec::new(),
            entries: Vec::new(),
            injection: Vec::new(),
            exported_global: None,
        }
    }

    pub fn add_module(&mut self, module: &'m SourceModule) {
        self.modules.push(module);
    }

    pub fn modules(&self) -> &[&'m SourceModule] {
        &self.modules
    }

    /// Require the module with `id` once the registry is loaded.
    pub fn add_entry(&mut self, id: u32) {
        if !self.entries.contains(&id) {
            self.entries.push(id);
        }
    }

    /// A raw line run after the entries.
    pub fn inject(&mut self, line: impl Into<String>) {
        self.injection.push(line.into());
    }

    /// Copy entry exports onto the target's global object, or onto
    /// `<global>.<name>` when `name` is non-empty.
    pub fn export_to_global(&mut self, name: impl Into<String>) {
        self.exported_global = Some(name.into());
    }

    pub fn generate(&self, options: &BundleOptions) -> BundleOutput {
        match self.kind {
            BundleKind::Script => self.generate_script(options),
            BundleKind::Stylesheet => self.generate_stylesheet(),
        }
    }

    fn generate_script(&self, options: &BundleOptions) -> BundleOutput {
        use runtime::{BUNDLE_FUNCTION, GLOBAL_OBJECT, REQUIRE_ARGUMENT};

        let mut concat = ConcatBuffer::new();
        let mut contains_maps = false;
        if options.isolated {
            concat.add(None, "(function(){", None);
        }
        if let Some(core) = &options.runtime_core {
            concat.add(None, core.as_str(), None);
        }
        concat.add(None, format!("{GLOBAL_OBJECT}.{BUNDLE_FUNCTION}({{"), None);

        let count = self.modules.len();
        for (index, module) in self.modules.iter().enumerate() {
            if !self.production {
                concat.add(None, format!("\n// {} @{}", module.public_path, module.id), None);
            }
            concat.add(
                None,
                format!("{}: function({REQUIRE_ARGUMENT}, exports, module){{", module.id),
                None,
            );
            let map = module
                .source_map
                .as_deref()
                .filter(|_| module.source_map_required);
            if map.is_some() {
                contains_maps = true;
            }
            if let Some(output) = module.output.as_deref().filter(|output| !output.is_empty()) {
                concat.add_with_json_map(None, output, map);
            }
            let separator = if index + 1 == count { "" } else { "," };
            concat.add(None, format!("}}{separator}"), None);
        }

        let ready = self.ready_function();
        concat.add(None, format!("}}{ready})"), None);
        if options.isolated {
            concat.add(None, "})()", None);
        }

        let output = concat.finish();
        debug!(
            modules = count,
            entries = self.entries.len(),
            bytes = output.content.len(),
            "script bundle generated"
        );
        BundleOutput {
            content: output.content,
            source_map: output.source_map.filter(|_| contains_maps),
            contains_maps,
        }
    }

    /// `, function(){ ... }` with entry requires, global exports and
    /// injection lines, or empty when there is nothing to run.
    fn ready_function(&self) -> String {
        use runtime::{GLOBAL_OBJECT, REQUIRE_FUNCTION};

        let require = |id: u32| format!("{GLOBAL_OBJECT}.{REQUIRE_FUNCTION}({id})");
        let mut lines: Vec<String> = self.entries.iter().map(|&id| require(id)).collect();

        if let Some(name) = &self.exported_global {
            // Web workers have no global to export onto
            if let Some(context) = self.target.global_context() {
                let mut expose = Vec::new();
                let target = if name.is_empty() {
                    context.to_string()
                } else {
                    let target = if is_identifier_name(name) {
                        format!("{context}.{name}")
                    } else {
                        format!("{context}[{name:?}]")
                    };
                    expose.push(format!("{target} = {target} || {{}};"));
                    target
                };
                for &id in &self.entries {
                    expose.push(format!("var obj = {};", require(id)));
                    expose.push(format!(
                        "for(var key in obj) {{ if (obj.hasOwnProperty(key) ) {{{target}[key] = obj[key]}} }}"
                    ));
                }
                lines.push(expose.join("\n"));
            }
        }

        lines.extend(self.injection.iter().cloned());
        if lines.is_empty() {
            String::new()
        } else {
            format!(", function(){{\n{}\n}}", lines.join("\n"))
        }
    }

    fn generate_stylesheet(&self) -> BundleOutput {
        let mut concat = ConcatBuffer::new();
        let mut contains_maps = false;
        for module in &self.modules {
            let Some(css) = &module.css else {
                continue;
            };
            let map = css.map.as_deref().filter(|_| module.source_map_required);
            if map.is_some() {
                contains_maps = true;
            }
            let text = strip_source_mapping_comments(&css.css);
            concat.add_with_json_map(Some(module.public_path.as_str()), text, map);
        }
        let output = concat.finish();
        BundleOutput {
            content: output.content,
            source_map: output.source_map.filter(|_| contains_maps),
            contains_maps,
        }
    }

    /// Digest of every module's modification signature. Touching any module
    /// changes it, even when its text does not change.
    pub fn hash(&self) -> String {
        let signatures: String = self
            .modules
            .iter()
            .map(|module| module.mtime.unwrap_or_default().to_string())
            .collect();
        let mut hasher = FxHasher::default();
        signatures.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

/// Remove inline `/*# sourceMappingURL=... */` comments.
pub fn strip_source_mapping_comments(css: &str) -> String {
    const OPEN: &str = "/*#";
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        let body = after
            .strip_prefix(|c: char| c.is_whitespace())
            .unwrap_or(after);
        let end = after.find("*/");
        match end {
            Some(end)
                if body.starts_with("sourceMappingURL") && !after[..end].contains('\n') =>
            {
                out.push_str(&rest[..start]);
                rest = &after[end + 2..];
            }
            _ => {
                out.push_str(&rest[..start + OPEN.len()]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
