use fuse_bundler::{Bundle, BundleKind, BundleOptions, CssOutput, SourceModule};
use fuse_common::{
    BuildConfig, EnvironmentType, Mapping, OriginalPosition, SourceMapBuilder, Target,
};

fn script(id: u32, public_path: &str, output: &str) -> SourceModule {
    let mut module = SourceModule::new(id, format!("/project/{public_path}"), public_path);
    module.output = Some(output.to_string());
    module
}

fn stylesheet(id: u32, public_path: &str, css: &str) -> SourceModule {
    let mut module = SourceModule::new(id, format!("/project/{public_path}"), public_path);
    module.css = Some(CssOutput {
        css: css.to_string(),
        map: None,
    });
    module
}

fn line_map(source: &str, lines: u32) -> String {
    let mut builder = SourceMapBuilder::new();
    let index = builder.add_source(source, Some("original"));
    for line in 0..lines {
        builder.add_mapping(Mapping {
            generated_line: line,
            generated_column: 0,
            original: Some(OriginalPosition {
                source: index,
                line,
                column: 0,
                name: None,
            }),
        });
    }
    builder.build(None).to_json()
}

fn production() -> BuildConfig {
    BuildConfig {
        environment: EnvironmentType::Production,
        ..BuildConfig::default()
    }
}

fn with_target(target: Target) -> BuildConfig {
    BuildConfig {
        target,
        production: true,
        ..BuildConfig::default()
    }
}

const FACTORY: &str = "function(__fusereq, exports, module){";

// =============================================================================
// Script bundles
// =============================================================================

#[test]
fn test_script_bundle_layout() {
    let a = script(1, "src/a.js", "a;");
    let b = script(2, "src/b.js", "b;");
    let mut bundle = Bundle::new(BundleKind::Script, &BuildConfig::default());
    bundle.add_module(&a);
    bundle.add_module(&b);
    bundle.add_entry(1);

    let output = bundle.generate(&BundleOptions::default());
    let expected = format!(
        "__fuse.bundle({{\n\n// src/a.js @1\n1: {FACTORY}\na;\n}},\n\n// src/b.js @2\n2: {FACTORY}\nb;\n}}\n}}, function(){{\n__fuse.r(1)\n}})"
    );
    assert_eq!(output.content, expected);
    assert!(!output.contains_maps);
    assert_eq!(output.source_map, None);
}

#[test]
fn test_production_omits_path_comments() {
    let a = script(1, "src/a.js", "a;");
    let mut bundle = Bundle::new(BundleKind::Script, &production());
    bundle.add_module(&a);

    let output = bundle.generate(&BundleOptions::default());
    assert_eq!(output.content, format!("__fuse.bundle({{\n1: {FACTORY}\na;\n}}\n}})"));
}

#[test]
fn test_empty_bundle() {
    let bundle = Bundle::new(BundleKind::Script, &production());
    assert_eq!(bundle.generate(&BundleOptions::default()).content, "__fuse.bundle({\n})");
}

#[test]
fn test_isolated_bundle_with_runtime_core() {
    let a = script(1, "src/a.js", "a;");
    let mut bundle = Bundle::new(BundleKind::Script, &production());
    bundle.add_module(&a);
    bundle.add_entry(1);

    let options = BundleOptions {
        isolated: true,
        runtime_core: Some("var __fuse = {};".to_string()),
    };
    let output = bundle.generate(&options);
    assert_eq!(
        output.content,
        format!(
            "(function(){{\nvar __fuse = {{}};\n__fuse.bundle({{\n1: {FACTORY}\na;\n}}\n}}, function(){{\n__fuse.r(1)\n}})\n}})()"
        )
    );
}

#[test]
fn test_ready_function_order_entries_exports_injections() {
    let a = script(1, "src/a.js", "a;");
    let b = script(2, "src/b.js", "b;");
    let mut bundle = Bundle::new(BundleKind::Script, &with_target(Target::Browser));
    bundle.add_module(&a);
    bundle.add_module(&b);
    bundle.add_entry(2);
    bundle.add_entry(1);
    bundle.add_entry(2);
    bundle.inject("console.log(\"ready\");");
    bundle.export_to_global("");

    let output = bundle.generate(&BundleOptions::default());
    let ready = "}, function(){\n\
__fuse.r(2)\n\
__fuse.r(1)\n\
var obj = __fuse.r(2);\n\
for(var key in obj) { if (obj.hasOwnProperty(key) ) {window[key] = obj[key]} }\n\
var obj = __fuse.r(1);\n\
for(var key in obj) { if (obj.hasOwnProperty(key) ) {window[key] = obj[key]} }\n\
console.log(\"ready\");\n\
})";
    assert!(
        output.content.ends_with(ready),
        "unexpected ready function in:\n{}",
        output.content
    );
}

#[test]
fn test_export_context_follows_target() {
    let a = script(1, "src/a.js", "a;");
    let exported = |target: Target| {
        let mut bundle = Bundle::new(BundleKind::Script, &with_target(target));
        bundle.add_module(&a);
        bundle.add_entry(1);
        bundle.export_to_global("");
        bundle.generate(&BundleOptions::default()).content
    };

    assert!(exported(Target::Browser).contains("{window[key] = obj[key]}"));
    assert!(exported(Target::Electron).contains("{window[key] = obj[key]}"));
    assert!(exported(Target::Server).contains("{exports[key] = obj[key]}"));

    let worker = exported(Target::WebWorker);
    assert!(!worker.contains("var obj"), "web workers export nothing:\n{worker}");
    assert!(worker.ends_with("}, function(){\n__fuse.r(1)\n})"));
}

#[test]
fn test_named_global_is_created_on_demand() {
    let a = script(1, "src/a.js", "a;");
    let mut bundle = Bundle::new(BundleKind::Script, &with_target(Target::Browser));
    bundle.add_module(&a);
    bundle.add_entry(1);
    bundle.export_to_global("MyLib");

    let output = bundle.generate(&BundleOptions::default());
    assert!(output.content.ends_with(
        "__fuse.r(1)\n\
window.MyLib = window.MyLib || {};\n\
var obj = __fuse.r(1);\n\
for(var key in obj) { if (obj.hasOwnProperty(key) ) {window.MyLib[key] = obj[key]} }\n\
})"
    ));

    let mut dashed = Bundle::new(BundleKind::Script, &with_target(Target::Server));
    dashed.add_module(&a);
    dashed.add_entry(1);
    dashed.export_to_global("my-lib");
    let output = dashed.generate(&BundleOptions::default());
    assert!(output.content.contains("exports[\"my-lib\"] = exports[\"my-lib\"] || {};"));
}

#[test]
fn test_required_module_maps_are_merged_and_shifted() {
    let mut a = script(1, "src/a.js", "a;\nb;");
    a.source_map_required = true;
    a.source_map = Some(line_map("src/a.js", 2));
    let mut b = script(2, "src/b.js", "c;");
    // Present but not required: left out
    b.source_map = Some(line_map("src/b.js", 1));

    let mut bundle = Bundle::new(BundleKind::Script, &production());
    bundle.add_module(&a);
    bundle.add_module(&b);
    let output = bundle.generate(&BundleOptions::default());
    assert!(output.contains_maps);

    let map = output.source_map.expect("combined map");
    assert_eq!(map.sources, vec!["src/a.js".to_string()]);
    let lines: Vec<(u32, u32)> = map
        .decoded_mappings()
        .unwrap()
        .iter()
        .map(|m| (m.generated_line, m.original.map(|o| o.line).unwrap_or(u32::MAX)))
        .collect();
    // Line 0 is the registry opener, line 1 the factory header
    assert_eq!(lines, vec![(2, 0), (3, 1)]);
}

#[test]
fn test_unrequired_maps_do_not_mark_the_bundle() {
    let mut a = script(1, "src/a.js", "a;");
    a.source_map = Some(line_map("src/a.js", 1));
    let mut bundle = Bundle::new(BundleKind::Script, &production());
    bundle.add_module(&a);
    let output = bundle.generate(&BundleOptions::default());
    assert!(!output.contains_maps);
    assert_eq!(output.source_map, None);
}

#[test]
fn test_script_bundle_is_deterministic() {
    let a = script(1, "src/a.js", "a;");
    let b = script(2, "src/b.js", "b;");
    let build = |modules: &[&SourceModule]| {
        let mut bundle = Bundle::new(BundleKind::Script, &BuildConfig::default());
        for module in modules {
            bundle.add_module(module);
        }
        bundle.add_entry(1);
        bundle.generate(&BundleOptions::default()).content
    };

    assert_eq!(build(&[&a, &b]), build(&[&a, &b]));

    let forward = build(&[&a, &b]);
    let reversed = build(&[&b, &a]);
    assert_ne!(forward, reversed);
    let sorted_lines = |text: &str| {
        let mut lines: Vec<String> = text
            .lines()
            .map(|line| line.trim_end_matches(',').to_string())
            .collect();
        lines.sort();
        lines
    };
    assert_eq!(sorted_lines(&forward), sorted_lines(&reversed));
}

// =============================================================================
// Stylesheet bundles
// =============================================================================

#[test]
fn test_stylesheet_bundle_strips_mapping_comments() {
    let a = stylesheet(1, "src/a.css", "a{color:red}\n/*# sourceMappingURL=a.css.map */");
    let b = stylesheet(2, "src/b.css", "b{}");
    let script_only = script(3, "src/c.js", "c;");
    let mut bundle = Bundle::new(BundleKind::Stylesheet, &BuildConfig::default());
    bundle.add_module(&a);
    bundle.add_module(&script_only);
    bundle.add_module(&b);

    let output = bundle.generate(&BundleOptions::default());
    assert_eq!(output.content, "a{color:red}\n\nb{}");
    assert!(!output.contains_maps);
    assert_eq!(output.source_map, None);
}

#[test]
fn test_stylesheet_maps_require_policy() {
    let mut a = stylesheet(1, "src/a.css", "a{}");
    a.source_map_required = true;
    if let Some(css) = a.css.as_mut() {
        css.map = Some(line_map("src/a.scss", 1));
    }
    let mut b = stylesheet(2, "src/b.css", "b{}");
    if let Some(css) = b.css.as_mut() {
        css.map = Some(line_map("src/b.scss", 1));
    }

    let mut bundle = Bundle::new(BundleKind::Stylesheet, &BuildConfig::default());
    bundle.add_module(&a);
    bundle.add_module(&b);
    let output = bundle.generate(&BundleOptions::default());
    assert!(output.contains_maps);

    let map = output.source_map.unwrap();
    assert!(map.sources.contains(&"src/a.scss".to_string()));
    assert!(!map.sources.contains(&"src/b.scss".to_string()));
}

// =============================================================================
// Cache key
// =============================================================================

#[test]
fn test_hash_tracks_modification_signatures() {
    let mut a = script(1, "src/a.js", "a;");
    let mut b = script(2, "src/b.js", "b;");
    a.mtime = Some(1_000);
    b.mtime = Some(2_000);

    let hash = |a: &SourceModule, b: &SourceModule| {
        let mut bundle = Bundle::new(BundleKind::Script, &BuildConfig::default());
        bundle.add_module(a);
        bundle.add_module(b);
        bundle.hash()
    };

    let first = hash(&a, &b);
    assert_eq!(first.len(), 16);
    assert_eq!(first, hash(&a, &b));

    b.output = Some("changed;".to_string());
    assert_eq!(first, hash(&a, &b), "text changes alone keep the key");

    b.mtime = Some(2_001);
    assert_ne!(first, hash(&a, &b));
}
