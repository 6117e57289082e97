//! Tests for build configuration loading and defaults.

use fuse_common::config::DEFAULT_JSX_FACTORY;
use fuse_common::{BuildConfig, EnvironmentType, ParserKind, Target};
use std::io::Write;

#[test]
fn test_empty_document_applies_defaults() {
    let config = BuildConfig::from_json_str("{}").unwrap();
    assert_eq!(config.target, Target::Browser);
    assert_eq!(config.environment, EnvironmentType::Development);
    assert!(!config.is_production());
    assert!(config.source_map.project);
    assert!(!config.source_map.vendor);
    assert!(config.source_map.css);
    assert_eq!(config.compiler_options.jsx_factory, DEFAULT_JSX_FACTORY);
    assert_eq!(config.compiler_options.jsx_fragment_factory, None);
    assert_eq!(config.compiler_options.js_parser.project, ParserKind::Ts);
    assert_eq!(
        config.compiler_options.js_parser.node_modules,
        ParserKind::Meriyah
    );
    assert!(!config.strict_parse);
}

#[test]
fn test_camel_case_fields_and_partial_objects() {
    let config = BuildConfig::from_json_str(
        r#"{
            "target": "web-worker",
            "sourceMap": { "vendor": true },
            "compilerOptions": {
                "jsxFactory": "h",
                "jsxFragmentFactory": "Frag",
                "jsParser": { "nodeModules": "ts" }
            },
            "strictParse": true
        }"#,
    )
    .unwrap();
    assert_eq!(config.target, Target::WebWorker);
    assert!(config.source_map.vendor);
    // Fields missing from a partial object keep their defaults
    assert!(config.source_map.project);
    assert!(config.source_map.css);
    assert_eq!(config.compiler_options.jsx_factory, "h");
    assert_eq!(
        config.compiler_options.jsx_fragment_factory.as_deref(),
        Some("Frag")
    );
    assert_eq!(config.compiler_options.js_parser.project, ParserKind::Ts);
    assert_eq!(config.compiler_options.js_parser.node_modules, ParserKind::Ts);
    assert!(config.strict_parse);
}

#[test]
fn test_production_environment_implies_production() {
    let config = BuildConfig::from_json_str(r#"{ "environment": "production" }"#).unwrap();
    assert!(!config.production);
    assert!(config.is_production());

    let flagged = BuildConfig::from_json_str(r#"{ "production": true }"#).unwrap();
    assert_eq!(flagged.environment, EnvironmentType::Development);
    assert!(flagged.is_production());
}

#[test]
fn test_global_context_per_target() {
    assert_eq!(Target::Browser.global_context(), Some("window"));
    assert_eq!(Target::Electron.global_context(), Some("window"));
    assert_eq!(Target::Server.global_context(), Some("exports"));
    assert_eq!(Target::WebWorker.global_context(), None);
}

#[test]
fn test_invalid_target_is_rejected() {
    let err = BuildConfig::from_json_str(r#"{ "target": "mainframe" }"#).unwrap_err();
    assert!(
        format!("{err:#}").contains("failed to parse build configuration"),
        "unexpected error: {err:#}"
    );
}

#[test]
fn test_from_path_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "target": "server", "environment": "test" }}"#).unwrap();
    let config = BuildConfig::from_path(file.path()).unwrap();
    assert_eq!(config.target, Target::Server);
    assert_eq!(config.environment, EnvironmentType::Test);
}

#[test]
fn test_from_path_missing_file_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("fuse.json");
    let err = BuildConfig::from_path(&missing).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("fuse.json"), "path missing from: {message}");
}
