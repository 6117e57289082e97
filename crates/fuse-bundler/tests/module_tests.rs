use fuse_ast::{Node, NodeKind, ParseOptions};
use fuse_bundler::{
    CacheRecord, ModuleError, ModuleOrigin, Parsers, SourceKind, SourceModule, TransformFactory,
    source_map_required,
};
use fuse_common::diagnostics::codes;
use fuse_common::{BuildConfig, ParserKind, SourceMap, SourceMapPolicy};
use fuse_emitter::Printer;
use fuse_test_support::parse_module;
use fuse_transforms::{Rewrite, Transform, TransformContext, VisitScope};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

fn parsers() -> Parsers {
    Parsers::single(parse_module)
}

fn module(public_path: &str, contents: &str) -> SourceModule {
    let mut module =
        SourceModule::new(1, PathBuf::from("/project").join(public_path), public_path)
            .with_contents(contents);
    module.init(&BuildConfig::default());
    module
}

fn processed(public_path: &str, contents: &str, config: &BuildConfig) -> SourceModule {
    let mut module =
        SourceModule::new(1, PathBuf::from("/project").join(public_path), public_path)
            .with_contents(contents);
    module.init(config);
    module.process(&parsers(), &Printer, config).unwrap();
    module
}

/// Parser calls recorded as (parser name, file name, jsx, locations).
type CallLog = Arc<Mutex<Vec<(&'static str, String, bool, bool)>>>;

fn recording_parsers(log: &CallLog) -> Parsers {
    let record = |name: &'static str| {
        let log = Arc::clone(log);
        move |source: &str, options: &ParseOptions| {
            log.lock().unwrap().push((
                name,
                options.file_name.clone(),
                options.jsx,
                options.locations,
            ));
            parse_module(source, options)
        }
    };
    Parsers::new(record("ts"), record("meriyah"))
}

// =============================================================================
// Classification
// =============================================================================

#[test]
fn test_classification_by_extension() {
    let cases = [
        ("src/a.js", SourceKind::SCRIPT),
        ("src/a.mjs", SourceKind::SCRIPT),
        ("src/a.jsx", SourceKind::SCRIPT),
        ("src/a.ts", SourceKind::TYPE_ANNOTATED),
        ("src/a.TSX", SourceKind::TYPE_ANNOTATED),
        ("src/a.scss", SourceKind::STYLESHEET),
        ("src/a.CSS", SourceKind::STYLESHEET),
        ("src/logo.png", SourceKind::BINARY),
        ("LICENSE", SourceKind::BINARY),
    ];
    for (path, expected) in cases {
        let module = module(path, "");
        assert_eq!(module.kind, expected, "classification of {path}");
    }
    assert!(module("a.ts", "").kind.is_executable());
    assert!(!module("a.css", "").kind.is_executable());
    assert!(!module("a.png", "").kind.is_executable());
}

#[test]
fn test_source_map_requirement_follows_policy() {
    let user = ModuleOrigin::User;
    let vendor = ModuleOrigin::package("react");
    let defaults = SourceMapPolicy::default();

    assert!(source_map_required(SourceKind::SCRIPT, &user, &defaults));
    assert!(!source_map_required(SourceKind::SCRIPT, &vendor, &defaults));
    assert!(source_map_required(SourceKind::STYLESHEET, &user, &defaults));
    assert!(!source_map_required(SourceKind::STYLESHEET, &vendor, &defaults));

    let no_css = SourceMapPolicy {
        css: false,
        ..defaults
    };
    assert!(!source_map_required(SourceKind::STYLESHEET, &user, &no_css));
    assert!(source_map_required(SourceKind::SCRIPT, &user, &no_css));

    let vendor_maps = SourceMapPolicy {
        project: false,
        vendor: true,
        css: true,
    };
    assert!(source_map_required(SourceKind::STYLESHEET, &vendor, &vendor_maps));
    assert!(source_map_required(SourceKind::TYPE_ANNOTATED, &vendor, &vendor_maps));
    assert!(!source_map_required(SourceKind::SCRIPT, &user, &vendor_maps));
}

// =============================================================================
// Read
// =============================================================================

#[test]
fn test_missing_file_under_node_modules_adds_install_hint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("node_modules/left-pad/index.js");
    let mut module = SourceModule::new(3, &path, "node_modules/left-pad/index.js")
        .with_origin(ModuleOrigin::package("left-pad"));

    let err = module.read().unwrap_err();
    assert!(matches!(err, ModuleError::NotFound { .. }), "got {err:?}");
    assert!(err.to_string().starts_with("Module not found at node_modules/left-pad/index.js"));

    let found: Vec<u32> = module.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(found, vec![codes::MISSING_INSTALL, codes::MODULE_NOT_FOUND]);
    assert_eq!(
        module.diagnostics[0].message,
        "Did you forget to run 'npm install'?"
    );
    assert!(module.has_errors());
}

#[test]
fn test_missing_project_file_has_no_install_hint() {
    let dir = tempfile::tempdir().unwrap();
    let mut module = SourceModule::new(1, dir.path().join("src/gone.js"), "src/gone.js");
    assert!(module.read().is_err());
    assert_eq!(module.diagnostics.len(), 1);
    assert_eq!(module.diagnostics[0].code, codes::MODULE_NOT_FOUND);
}

#[test]
fn test_read_records_modification_signature() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.js");
    std::fs::write(&path, "a;").unwrap();
    let mut module = SourceModule::new(1, &path, "a.js");
    assert_eq!(module.read().unwrap(), "a;");
    assert!(module.mtime.is_some());
}

// =============================================================================
// Parse
// =============================================================================

#[test]
fn test_empty_module_exports_empty_string() {
    let mut module = module("src/empty.js", "");
    let tree = module.parse(&parsers(), &BuildConfig::default()).unwrap();
    assert_eq!(
        Printer::print_to_string(tree).unwrap(),
        "export default \"\";"
    );
    assert!(!module.errored);
    assert_eq!(module.diagnostics.len(), 1);
    assert_eq!(module.diagnostics[0].code, codes::EMPTY_MODULE);
    assert!(!module.has_errors());
}

#[test]
fn test_parse_failure_continues_with_empty_program() {
    let mut module = module("src/broken.js", "var = ;");
    let tree = module.parse(&parsers(), &BuildConfig::default()).unwrap();
    assert!(tree.is(&NodeKind::Program));
    assert_eq!(tree.nodes("body").count(), 0);
    assert!(module.errored);
    assert_eq!(module.diagnostics[0].code, codes::PARSE_FAILED);
}

#[test]
fn test_strict_parse_returns_the_error() {
    let config = BuildConfig {
        strict_parse: true,
        ..BuildConfig::default()
    };
    let mut module = module("src/broken.js", "var = ;");
    let err = module.parse(&parsers(), &config).unwrap_err();
    assert!(matches!(err, ModuleError::Parse { .. }), "got {err:?}");
    assert!(module.errored);
}

#[test]
fn test_parser_selection_by_kind_and_origin() {
    let log: CallLog = Arc::default();
    let parsers = recording_parsers(&log);
    let config = BuildConfig::default();

    let mut user_js = module("src/a.js", "a;");
    user_js.parse(&parsers, &config).unwrap();

    let mut vendor_js = SourceModule::new(2, "/project/node_modules/x/index.js", "node_modules/x/index.js")
        .with_origin(ModuleOrigin::package("x"))
        .with_contents("a;");
    vendor_js.init(&config);
    vendor_js.parse(&parsers, &config).unwrap();

    let mut plain_ts = module("src/b.ts", "a;");
    plain_ts.parse(&parsers, &config).unwrap();

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![
            ("ts", "src/a.js".to_string(), true, true),
            ("meriyah", "node_modules/x/index.js".to_string(), true, false),
            ("ts", "src/b.ts".to_string(), false, true),
        ]
    );
}

#[test]
fn test_type_annotated_files_ignore_script_parser_setting() {
    let log: CallLog = Arc::default();
    let parsers = recording_parsers(&log);
    let mut config = BuildConfig::default();
    config.compiler_options.js_parser.project = ParserKind::Meriyah;

    let mut script = module("src/a.jsx", "a;");
    script.parse(&parsers, &config).unwrap();
    let mut typed = module("src/b.tsx", "a;");
    typed.parse(&parsers, &config).unwrap();

    let names: Vec<&str> = log.lock().unwrap().iter().map(|call| call.0).collect();
    assert_eq!(names, vec!["meriyah", "ts"]);
}

// =============================================================================
// Transform / generate
// =============================================================================

#[test]
fn test_transform_requires_a_tree() {
    let mut module = module("src/a.js", "a;");
    let err = module.transform(&BuildConfig::default()).unwrap_err();
    assert!(matches!(err, ModuleError::MissingTree { .. }));
    assert!(module.generate(&Printer, &BuildConfig::default()).is_err());
}

#[test]
fn test_process_lowers_optional_chains() {
    let module = processed("src/a.js", "a?.b;", &BuildConfig::default());
    assert_eq!(
        module.output.as_deref(),
        Some("var _1_1;\n(_1_1 = a) == null ? void 0 : _1_1.b;")
    );
}

#[test]
fn test_process_lowers_jsx_with_configured_factory() {
    let mut config = BuildConfig::default();
    config.compiler_options.jsx_factory = "h".to_string();
    let module = processed("src/view.jsx", "<div id=\"x\" />;", &config);
    assert_eq!(module.output.as_deref(), Some("h(\"div\", { id: \"x\" });"));

    let default = processed("src/view.jsx", "<br />;", &BuildConfig::default());
    assert_eq!(
        default.output.as_deref(),
        Some("React.createElement(\"br\", null);")
    );
}

#[test]
fn test_generated_map_is_backfilled_with_source_content() {
    let source = "var a = 1;\na;";
    let module = processed("src/a.js", source, &BuildConfig::default());
    assert_eq!(module.output.as_deref(), Some(source));

    let json = module.source_map.as_deref().expect("map required by default policy");
    let map = SourceMap::from_json(json).unwrap();
    assert_eq!(map.file, None);
    assert_eq!(map.sources, vec!["src/a.js".to_string()]);
    assert_eq!(map.sources_content, Some(vec![Some(source.to_string())]));
    assert!(!map.mappings.is_empty());
}

#[test]
fn test_no_map_when_not_required() {
    let mut config = BuildConfig::default();
    config.source_map.project = false;
    let module = processed("src/a.js", "a;", &config);
    assert!(!module.source_map_required);
    assert_eq!(module.source_map, None);
}

#[test]
fn test_production_output_is_compact() {
    let config = BuildConfig {
        production: true,
        ..BuildConfig::default()
    };
    let module = processed("src/a.js", "var a = 1;\nif (a) {\n    a;\n}", &config);
    assert_eq!(module.output.as_deref(), Some("var a=1;if(a){a;}"));
}

#[test]
fn test_lifecycle_is_idempotent() {
    let config = BuildConfig::default();
    let mut module = module("src/a.jsx", "x?.y(<A {...p} />);");
    module.process(&parsers(), &Printer, &config).unwrap();
    let first = (module.output.clone(), module.source_map.clone());
    module.process(&parsers(), &Printer, &config).unwrap();
    assert_eq!((module.output.clone(), module.source_map.clone()), first);
}

#[test]
fn test_stylesheets_pass_text_through() {
    let module = processed("src/site.css", "body{margin:0}", &BuildConfig::default());
    assert_eq!(module.output, None);
    assert_eq!(module.css.map(|css| css.css), Some("body{margin:0}".to_string()));
}

#[test]
fn test_binary_modules_are_skipped() {
    let module = processed("src/logo.png", "\u{89}PNG", &BuildConfig::default());
    assert_eq!(module.output, None);
    assert!(module.tree.is_none());
}

// =============================================================================
// Graph facts and cache records
// =============================================================================

#[test]
fn test_add_dependency_rejects_self_and_duplicates() {
    let mut module = SourceModule::new(4, "/p/a.js", "a.js");
    assert!(module.add_dependency(7));
    assert!(module.add_dependency(2));
    assert!(!module.add_dependency(7));
    assert!(!module.add_dependency(4));
    assert_eq!(module.dependencies, vec![7, 2]);
}

#[test]
fn test_meta_serializes_camel_case_and_omits_defaults() {
    let mut vendor = SourceModule::new(5, "/p/node_modules/x/i.js", "node_modules/x/i.js")
        .with_origin(ModuleOrigin::package("x"));
    vendor.mtime = Some(42);
    vendor.add_dependency(6);
    let json = serde_json::to_value(vendor.meta()).unwrap();
    assert_eq!(json["id"], 5);
    assert_eq!(json["absPath"], "/p/node_modules/x/i.js");
    assert_eq!(json["publicPath"], "node_modules/x/i.js");
    assert_eq!(json["packageId"], "x");
    assert_eq!(json["dependencies"], serde_json::json!([6]));
    assert_eq!(json["mtime"], 42);
    assert!(json.get("breakDependantsCache").is_none());

    let mut user = SourceModule::new(1, "/p/a.js", "a.js");
    user.break_dependants_cache = true;
    let json = serde_json::to_value(user.meta()).unwrap();
    assert!(json.get("packageId").is_none());
    assert_eq!(json["breakDependantsCache"], true);
}

struct MarkDependants;

impl Transform for MarkDependants {
    fn name(&self) -> &'static str {
        "mark-dependants"
    }

    fn visit(&mut self, _node: &mut Node, scope: &mut VisitScope<'_>) -> Rewrite {
        scope.context_mut().invalidate_dependants();
        Rewrite::Keep
    }
}

#[test]
fn test_extra_transform_flags_dependants() {
    let config = BuildConfig::default();
    let factory: TransformFactory = Arc::new(|_: &TransformContext| -> Box<dyn Transform> {
        Box::new(MarkDependants)
    });

    let mut flagged = module("src/a.js", "var a = 1;");
    flagged
        .process_with(&parsers(), &Printer, &config, &[factory])
        .unwrap();
    assert!(flagged.break_dependants_cache);
    assert_eq!(
        serde_json::to_value(flagged.meta()).unwrap()["breakDependantsCache"],
        true
    );

    let plain = processed("src/a.js", "var a = 1;", &config);
    assert!(!plain.break_dependants_cache);
}

#[test]
fn test_from_cache_skips_the_lifecycle() {
    let record = CacheRecord {
        id: 9,
        abs_path: PathBuf::from("/p/node_modules/x/i.js"),
        dependencies: vec![2, 3],
        mtime: 100,
        package_id: Some("x".to_string()),
        public_path: "node_modules/x/i.js".to_string(),
        break_dependants_cache: true,
        contents: "module.exports = 1;".to_string(),
        source_map: None,
    };
    let config = BuildConfig::default();
    let mut module = SourceModule::from_cache(&record, &config);
    assert!(module.cached);
    assert_eq!(module.id, 9);
    assert_eq!(module.origin, ModuleOrigin::package("x"));
    assert_eq!(module.dependencies, vec![2, 3]);
    assert!(module.break_dependants_cache);

    // Would fail to read if the lifecycle ran
    module.process(&parsers(), &Printer, &config).unwrap();
    assert_eq!(module.output.as_deref(), Some("module.exports = 1;"));
    assert_eq!(module.meta(), record);
}
