//! End-to-end comparison behavior.

use std::collections::BTreeSet;
use std::io::Write;

use libvmf::{
    compare, compare_streaming, generate_report, parse_str, Comparison, DiffError, Document,
    ParserConfig, SyntaxKind, Value,
};

const NONE: &[&str] = &[];

fn doc(text: &str) -> Document {
    parse_str(text, &ParserConfig::default()).unwrap()
}

fn paths<T>(items: &[T], path: impl Fn(&T) -> &str) -> BTreeSet<String> {
    items.iter().map(|i| path(i).to_string()).collect()
}

const BASE: &str = r#"versioninfo
{
	"mapversion" "4"
}
world
{
	"id" "1"
	"classname" "worldspawn"
	"skyname" "sky_day01_01"
	solid
	{
		"id" "2"
		side
		{
			"id" "1"
			"material" "BRICK/BRICKWALL001A"
			"lightmapscale" "16"
			vertices_plus
			{
				"v" "0 0 0"
				"v" "64 0 0"
			}
		}
	}
}
entity
{
	"id" "5"
	"classname" "light"
	"origin" "0 0 128"
	"_light" "255 255 255 200"
}
entity
{
	"classname" "info_target"
	"targetname" "spot"
}
"#;

const EDITED: &str = r#"versioninfo
{
	"mapversion" "5"
}
world
{
	"id" "1"
	"classname" "worldspawn"
	"skyname" "sky_day01_01"
	solid
	{
		"id" "2"
		side
		{
			"id" "1"
			"material" "CONCRETE/CONCRETEFLOOR001A"
			"lightmapscale" "32"
			vertices_plus
			{
				"v" "0 0 0"
				"v" "64 0 2"
			}
		}
	}
}
entity
{
	"id" "5"
	"classname" "light"
	"origin" "0 0 256"
	"_light" "255 255 255 200"
	"style" "1"
}
entity
{
	"classname" "prop_static"
	"model" "models/props/crate.mdl"
	"origin" "32 32 0"
}
"#;

#[test]
fn test_self_compare_is_empty() {
    let d = doc(BASE);
    let c = compare(&d, &d, NONE).unwrap();
    assert!(c.differences.is_empty());
    assert_eq!(c.stats.total_differences, 0);
    assert_eq!(c.stats.vertex_changes, 0);
    assert_eq!(c.stats.average_vertex_deviation, None);
}

#[test]
fn test_compare_is_symmetric() {
    let a = doc(BASE);
    let b = doc(EDITED);
    let ab = compare(&a, &b, NONE).unwrap();
    let ba = compare(&b, &a, NONE).unwrap();

    assert_eq!(
        paths(&ab.differences.added, |e| e.path.as_str()),
        paths(&ba.differences.removed, |e| e.path.as_str())
    );
    assert_eq!(
        paths(&ab.differences.removed, |e| e.path.as_str()),
        paths(&ba.differences.added, |e| e.path.as_str())
    );
    assert_eq!(ab.differences.changed.len(), ba.differences.changed.len());
    for change in &ab.differences.changed {
        let mirror = ba
            .differences
            .changed
            .iter()
            .find(|c| c.path == change.path)
            .unwrap();
        assert_eq!(mirror.old_value, change.new_value);
        assert_eq!(mirror.new_value, change.old_value);
    }
    assert_eq!(ab.stats.total_differences, ba.stats.total_differences);
    assert_eq!(ab.stats.max_vertex_deviation, ba.stats.max_vertex_deviation);
}

#[test]
fn test_expected_differences() {
    let c = compare(&doc(BASE), &doc(EDITED), NONE).unwrap();
    let changed = paths(&c.differences.changed, |c| c.path.as_str());
    assert!(changed.contains("versioninfo.mapversion"));
    assert!(changed.contains("world.solid.0.side.0.material"));
    assert!(changed.contains("world.solid.0.side.0.lightmapscale"));
    assert!(changed.contains("entities.id:5.origin"));

    let added = paths(&c.differences.added, |e| e.path.as_str());
    assert!(added.contains("entities.id:5.style"));
    assert!(added.contains("entities.anon:prop_static@32 32 0"));
    let removed = paths(&c.differences.removed, |e| e.path.as_str());
    assert_eq!(removed, ["entities.targetname:spot".to_string()].into_iter().collect());

    assert_eq!(c.differences.vertex_changed.len(), 1);
    assert_eq!(
        c.differences.vertex_changed[0].path,
        "world.solid.0.side.0.vertices_plus"
    );
    assert_eq!(c.stats.total_differences, c.differences.total());
}

#[test]
fn test_entity_matched_by_id_reports_fields_only() {
    let c = compare(&doc(BASE), &doc(EDITED), NONE).unwrap();
    let whole = |entries: &[libvmf::Entry]| {
        entries
            .iter()
            .any(|e| e.path == "entities.id:5")
    };
    assert!(!whole(&c.differences.added));
    assert!(!whole(&c.differences.removed));
    assert!(c
        .differences
        .changed
        .iter()
        .any(|ch| ch.path == "entities.id:5.origin"));
}

const LAMP_A: &str = "entity\n{\n\"id\" \"5\"\n\"classname\" \"light\"\n\"targetname\" \"lamp_a\"\n}\n";
const LAMP_B: &str = "entity\n{\n\"id\" \"5\"\n\"classname\" \"light\"\n\"targetname\" \"lamp_b\"\n}\n";

#[test]
fn test_renamed_entity_with_same_id_is_unchanged() {
    let c = compare(&doc(LAMP_A), &doc(LAMP_B), NONE).unwrap();
    assert!(c.differences.is_empty());
    assert_eq!(c.stats.total_differences, 0);

    let a = write_temp(LAMP_A);
    let b = write_temp(LAMP_B);
    let streamed = compare_streaming(a.path(), b.path(), NONE, &ParserConfig::default()).unwrap();
    assert!(streamed.differences.is_empty());
}

#[test]
fn test_targetname_matched_entity_still_reports_other_fields() {
    let a = doc("entity\n{\n\"classname\" \"light\"\n\"targetname\" \"lamp\"\n\"_light\" \"255 255 255 200\"\n}\n");
    let b = doc("entity\n{\n\"classname\" \"light\"\n\"targetname\" \"lamp\"\n\"_light\" \"255 0 0 200\"\n}\n");
    let c = compare(&a, &b, NONE).unwrap();
    assert_eq!(
        paths(&c.differences.changed, |ch| ch.path.as_str()),
        BTreeSet::from(["entities.targetname:lamp._light".to_string()])
    );
}

#[test]
fn test_entity_order_does_not_matter() {
    let a = doc("entity\n{\n\"id\" \"1\"\n\"classname\" \"a\"\n}\nentity\n{\n\"id\" \"2\"\n\"classname\" \"b\"\n}\n");
    let b = doc("entity\n{\n\"id\" \"2\"\n\"classname\" \"b\"\n}\nentity\n{\n\"id\" \"1\"\n\"classname\" \"a\"\n}\n");
    assert!(compare(&a, &b, NONE).unwrap().differences.is_empty());
}

#[test]
fn test_ignore_texture_edits() {
    let a = doc(BASE);
    let mut text = BASE.replace("BRICK/BRICKWALL001A", "CONCRETE/CONCRETEFLOOR001A");
    let only_texture = doc(&text);
    let c = compare(&a, &only_texture, &["world.solid.*.side.*.material"]).unwrap();
    assert!(c.differences.is_empty());

    text = text.replace("\"lightmapscale\" \"16\"", "\"lightmapscale\" \"32\"");
    let c = compare(&a, &doc(&text), &["world.solid.*.side.*.material"]).unwrap();
    assert_eq!(
        paths(&c.differences.changed, |c| c.path.as_str()),
        ["world.solid.0.side.0.lightmapscale".to_string()]
            .into_iter()
            .collect()
    );
}

#[test]
fn test_ignored_vertices_do_not_count() {
    let c = compare(&doc(BASE), &doc(EDITED), &["*.vertices_plus"]).unwrap();
    assert!(c.differences.vertex_changed.is_empty());
    assert_eq!(c.stats.vertex_changes, 0);
    assert_eq!(c.stats.total_vertex_deviation, 0.0);
}

#[test]
fn test_invalid_ignore_pattern() {
    let err = compare(&doc(BASE), &doc(BASE), &["world.[oops"]).unwrap_err();
    assert!(matches!(err, DiffError::InvalidPattern { .. }));
}

#[test]
fn test_single_vertex_deviation() {
    let side = |z: &str| {
        format!(
            "world\n{{\nsolid\n{{\nside\n{{\nvertices_plus\n{{\n\"v\" \"0 0 {}\"\n}}\n}}\n}}\n}}\n",
            z
        )
    };
    let c = compare(&doc(&side("0")), &doc(&side("1")), NONE).unwrap();
    assert_eq!(c.differences.vertex_changed.len(), 1);
    let d = &c.differences.vertex_changed[0].deviation;
    assert_eq!(d.changed_count, 1);
    assert_eq!(d.max_deviation, 1.0);
    assert_eq!(d.total_deviation, 1.0);
    assert!((d.avg_deviation - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(c.stats.average_vertex_deviation, Some(1.0));
}

#[test]
fn test_invalid_input_is_rejected() {
    let mut bad = doc(BASE);
    bad.world.insert("solid", Value::String("oops".into()));
    let err = compare(&bad, &doc(BASE), NONE).unwrap_err();
    match err {
        DiffError::InvalidInput { side, reason } => {
            assert_eq!(side, "first");
            assert!(reason.contains("world.solid"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

fn nested(depth: usize) -> String {
    let mut text = String::new();
    for _ in 0..depth {
        text.push_str("a\n{\n");
    }
    for _ in 0..depth {
        text.push_str("}\n");
    }
    text
}

#[test]
fn test_depth_limit() {
    // Dropping deep documents in a debug build needs more than the default test stack.
    std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let config = ParserConfig::default().with_max_nesting_depth(10_000);

            let err = parse_str(&nested(10_001), &config).unwrap_err();
            assert_eq!(err.syntax_kind(), Some(&SyntaxKind::DepthExceeded(10_000)));
            assert!(err.to_string().starts_with("Maximum nesting depth of 10000 exceeded"));

            assert!(parse_str(&nested(9_999), &config).is_ok());
            assert!(parse_str(&nested(10_000), &config).is_ok());
        })
        .unwrap()
        .join()
        .unwrap();
}

#[test]
fn test_json_shape() {
    let c = compare(&doc(BASE), &doc(EDITED), NONE).unwrap();
    let json = serde_json::to_value(&c).unwrap();
    assert!(json["differences"]["removed"].is_array());
    assert!(json["differences"]["vertex_changed"][0]["max_deviation"].is_number());
    assert_eq!(json["stats"]["brush_counts"]["doc1"], 1);
    assert!(json["stats"]["average_vertex_deviation"].is_number());
}

fn write_temp(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_streaming_matches_whole_document_compare() {
    let a = write_temp(BASE);
    let b = write_temp(EDITED);
    let config = ParserConfig::default();
    let streamed = compare_streaming(a.path(), b.path(), NONE, &config).unwrap();
    let whole = compare(&doc(BASE), &doc(EDITED), NONE).unwrap();

    let summary = |c: &Comparison| {
        (
            paths(&c.differences.added, |e| e.path.as_str()),
            paths(&c.differences.removed, |e| e.path.as_str()),
            paths(&c.differences.changed, |e| e.path.as_str()),
        )
    };
    assert_eq!(summary(&streamed), summary(&whole));
    assert_eq!(streamed.stats, whole.stats);
    assert_eq!(generate_report(&streamed), generate_report(&whole));
}

#[test]
fn test_streaming_reordered_sections_degrade() {
    let a = write_temp("versioninfo\n{\n\"mapversion\" \"1\"\n}\nworld\n{\n\"id\" \"1\"\n}\n");
    let b = write_temp("world\n{\n\"id\" \"1\"\n}\nversioninfo\n{\n\"mapversion\" \"1\"\n}\n");
    let config = ParserConfig::default();

    let whole = compare(
        &libvmf::parse(a.path(), &config).unwrap(),
        &libvmf::parse(b.path(), &config).unwrap(),
        NONE,
    )
    .unwrap();
    assert!(whole.differences.is_empty());

    let streamed = compare_streaming(a.path(), b.path(), NONE, &config).unwrap();
    assert_eq!(
        paths(&streamed.differences.removed, |e| e.path.as_str()),
        ["versioninfo".to_string()].into_iter().collect()
    );
    assert_eq!(
        paths(&streamed.differences.added, |e| e.path.as_str()),
        ["versioninfo".to_string()].into_iter().collect()
    );
    assert!(streamed.differences.changed.is_empty());
}

#[test]
fn test_streaming_unknown_sections_share_paths() {
    let a = "custom_block\n{\n\"size\" \"1\"\n}\n";
    let b = "custom_block\n{\n\"size\" \"2\"\n}\n";
    let whole = compare(&doc(a), &doc(b), NONE).unwrap();
    let (fa, fb) = (write_temp(a), write_temp(b));
    let config = ParserConfig::default();
    let streamed = compare_streaming(fa.path(), fb.path(), NONE, &config).unwrap();
    assert_eq!(
        paths(&streamed.differences.changed, |ch| ch.path.as_str()),
        BTreeSet::from(["unknown_sections.custom_block.size".to_string()])
    );
    assert_eq!(whole.differences.changed, streamed.differences.changed);

    let ignore = ["unknown_sections.custom_block"];
    assert!(compare_streaming(fa.path(), fb.path(), &ignore, &config)
        .unwrap()
        .differences
        .is_empty());
    assert!(compare(&doc(a), &doc(b), &ignore).unwrap().differences.is_empty());
}

#[test]
fn test_streaming_missing_file() {
    let a = write_temp(BASE);
    let missing = a.path().with_extension("absent.vmf");
    let err = compare_streaming(a.path(), &missing, NONE, &ParserConfig::default()).unwrap_err();
    assert!(matches!(err, DiffError::Parse(libvmf::ParseError::Io { .. })));
}
