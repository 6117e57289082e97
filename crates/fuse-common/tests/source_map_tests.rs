//! Tests for VLQ encoding, mapping codecs and the source map builder.

use fuse_common::source_map::{decode_mappings, encode_mappings, vlq};
use fuse_common::{Mapping, OriginalPosition, SourceMap, SourceMapBuilder};

fn mapped(line: u32, column: u32, source: u32, orig_line: u32, orig_column: u32) -> Mapping {
    Mapping {
        generated_line: line,
        generated_column: column,
        original: Some(OriginalPosition {
            source,
            line: orig_line,
            column: orig_column,
            name: None,
        }),
    }
}

#[test]
fn test_vlq_encode_small_values() {
    assert_eq!(vlq::encode(0), "A");
    assert_eq!(vlq::encode(1), "C");
    assert_eq!(vlq::encode(-1), "D");
    assert_eq!(vlq::encode(15), "e");
    assert_eq!(vlq::encode(-15), "f");
}

#[test]
fn test_vlq_encode_continuation() {
    assert_eq!(vlq::encode(16), "gB");
    assert_eq!(vlq::encode(-16), "hB");
    assert_eq!(vlq::encode(1000), "w+B");
}

#[test]
fn test_vlq_decode_reports_consumed_bytes() {
    assert_eq!(vlq::decode("gBAAA"), Some((16, 2)));
    assert_eq!(vlq::decode("D"), Some((-1, 1)));
    assert_eq!(vlq::decode("w+B"), Some((1000, 3)));
}

#[test]
fn test_vlq_decode_rejects_truncated_and_invalid_input() {
    assert_eq!(vlq::decode(""), None);
    assert_eq!(vlq::decode("g"), None, "continuation bit without a next digit");
    assert_eq!(vlq::decode("!"), None);
}

#[test]
fn test_decode_mappings_accumulates_deltas() {
    // Line 0: col 0 -> src 0 (0,0); col 4 -> src 0 (0,4)
    // Line 1: (empty)
    // Line 2: col 2 -> src 0 (1,0)
    let decoded = decode_mappings("AAAA,IAAI;;EACJ").unwrap();
    assert_eq!(
        decoded,
        vec![mapped(0, 0, 0, 0, 0), mapped(0, 4, 0, 0, 4), mapped(2, 2, 0, 1, 0)]
    );
}

#[test]
fn test_decode_mappings_single_field_segment_has_no_origin() {
    let decoded = decode_mappings("AAAA,E").unwrap();
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[1].generated_column, 2);
    assert_eq!(decoded[1].original, None);
}

#[test]
fn test_decode_mappings_rejects_bad_segments() {
    assert!(decode_mappings("AA").is_err(), "two fields are invalid");
    assert!(decode_mappings("AAAAAA").is_err(), "six fields are invalid");
    let err = decode_mappings("A*AA").unwrap_err();
    assert!(err.to_string().contains("malformed VLQ"), "{err}");
}

#[test]
fn test_encode_mappings_emits_line_separators() {
    let mappings = vec![
        mapped(0, 0, 0, 0, 0),
        mapped(0, 4, 0, 0, 4),
        mapped(2, 2, 0, 1, 0),
    ];
    assert_eq!(encode_mappings(&mappings), "AAAA,IAAI;;EACJ");
}

#[test]
fn test_encode_mappings_with_names_and_sources() {
    let mappings = vec![
        Mapping {
            generated_line: 0,
            generated_column: 0,
            original: Some(OriginalPosition {
                source: 1,
                line: 3,
                column: 2,
                name: Some(0),
            }),
        },
        mapped(1, 0, 0, 0, 0),
    ];
    let encoded = encode_mappings(&mappings);
    assert_eq!(decode_mappings(&encoded).unwrap(), mappings);
}

#[test]
fn test_source_map_json_is_camel_case() {
    let mut map = SourceMap::new(Some("out.js".to_string()));
    map.sources.push("src/a.js".to_string());
    map.sources_content = Some(vec![Some("let a;".to_string())]);
    let json = map.to_json();
    assert!(json.contains("\"sourcesContent\""), "{json}");
    assert!(json.contains("\"version\":3"), "{json}");

    let parsed = SourceMap::from_json(&json).unwrap();
    assert_eq!(parsed, map);
    assert!(parsed.has_sources_content());
}

#[test]
fn test_source_map_without_content_or_file() {
    let map = SourceMap::from_json(r#"{"version":3,"sources":["a.js"],"mappings":"AAAA"}"#)
        .unwrap();
    assert_eq!(map.file, None);
    assert!(!map.has_sources_content());
    assert!(!map.to_json().contains("file"));
}

#[test]
fn test_builder_deduplicates_sources_and_names() {
    let mut builder = SourceMapBuilder::new();
    let a = builder.add_source("a.js", None);
    let b = builder.add_source("b.js", Some("b"));
    assert_eq!(builder.add_source("a.js", Some("a")), a);
    assert_eq!(builder.add_name("foo"), 0);
    assert_eq!(builder.add_name("bar"), 1);
    assert_eq!(builder.add_name("foo"), 0);

    builder.add_mapping(mapped(0, 0, a, 0, 0));
    builder.add_mapping(mapped(0, 0, b, 9, 9));
    builder.add_mapping(mapped(1, 0, b, 0, 0));
    let map = builder.build(Some("bundle.js".to_string()));

    assert_eq!(map.sources, vec!["a.js", "b.js"]);
    assert_eq!(
        map.sources_content,
        Some(vec![Some("a".to_string()), Some("b".to_string())])
    );
    assert_eq!(map.names, vec!["foo", "bar"]);
    let decoded = map.decoded_mappings().unwrap();
    assert_eq!(decoded.len(), 2, "duplicate position should collapse");
    assert_eq!(decoded[0], mapped(0, 0, a, 0, 0));
}

#[test]
fn test_builder_sorts_out_of_order_mappings() {
    let mut builder = SourceMapBuilder::new();
    let src = builder.add_source("a.js", None);
    builder.add_mapping(mapped(2, 0, src, 2, 0));
    builder.add_mapping(mapped(0, 5, src, 0, 5));
    let map = builder.build(None);
    assert_eq!(map.sources_content, None);
    let decoded = map.decoded_mappings().unwrap();
    assert_eq!(decoded[0].generated_line, 0);
    assert_eq!(decoded[1].generated_line, 2);
}
