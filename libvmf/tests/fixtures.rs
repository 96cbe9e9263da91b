//! Test harness for the VMF parser against fixture files.
//!
//! This test harness reads all .vmf files from the test/vmf/ directory,
//! parses them, writes them back out, and checks the reparsed document is
//! unchanged. It also reads .vmf files from test/bad/ (expected to fail)
//! and verifies they produce the expected error messages from the
//! corresponding .error files.

use std::fs;
use std::path::{Path, PathBuf};

use libvmf::{
    compare, compare_streaming, parse, parse_reader, serialize, Document, MapStats, ParserConfig,
};

/// Root test directory.
fn test_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("test")
}

/// Get all .vmf files from a subdirectory of test/.
fn get_vmf_files(subdir: &str) -> Vec<PathBuf> {
    let dir = test_root().join(subdir);
    let mut files: Vec<PathBuf> = Vec::new();
    if let Ok(entries) = fs::read_dir(&dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "vmf").unwrap_or(false) {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

/// Read the expected error message for a bad fixture.
fn read_expected_error(path: &Path) -> Option<String> {
    fs::read_to_string(path.with_extension("error")).ok()
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

fn parse_named(path: &Path, config: &ParserConfig) -> libvmf::Result<Document> {
    let file = fs::File::open(path).unwrap();
    parse_reader(file, Some(&file_name(path)), config)
}

/// Parse, write, reparse, and compare a fixture that should load.
fn run_vmf_test(path: &Path) -> Result<(), String> {
    let filename = file_name(path);
    let config = ParserConfig::default();
    let doc = parse_named(path, &config)
        .map_err(|e| format!("{}: Unexpected parse error: {}", filename, e))?;

    let written = serialize(&doc);
    let reparsed = libvmf::parse_str(&written, &config)
        .map_err(|e| format!("{}: Written output does not parse: {}", filename, e))?;
    if reparsed != doc {
        return Err(format!(
            "{}: Roundtrip mismatch\n--- written ---\n{}",
            filename, written
        ));
    }

    let self_diff = compare(&doc, &doc, &[] as &[&str])
        .map_err(|e| format!("{}: Compare failed: {}", filename, e))?;
    if !self_diff.differences.is_empty() {
        return Err(format!(
            "{}: Self-comparison found {} differences",
            filename,
            self_diff.differences.total()
        ));
    }

    let streamed = compare_streaming(path, path, &[] as &[&str], &config)
        .map_err(|e| format!("{}: Streaming compare failed: {}", filename, e))?;
    if !streamed.differences.is_empty() {
        return Err(format!(
            "{}: Streaming self-comparison found {} differences",
            filename,
            streamed.differences.total()
        ));
    }

    println!(
        "  {} => {} entities, {} brushes, {} ids",
        filename,
        doc.entities.len(),
        MapStats::of(&doc).brushes,
        doc.id_map.len()
    );
    Ok(())
}

/// Run a single bad fixture (expected to fail with a specific error).
fn run_bad_test(path: &Path) -> Result<(), String> {
    let filename = file_name(path);
    match parse_named(path, &ParserConfig::default()) {
        Ok(doc) => Err(format!(
            "{}: Expected parse error, but got success: {:?}",
            filename, doc
        )),
        Err(e) => {
            let actual_error = e.to_string();
            match read_expected_error(path) {
                Some(expected) if expected.trim() == actual_error => {
                    println!("  {} => error (as expected)", filename);
                    Ok(())
                }
                Some(expected) => Err(format!(
                    "{}: Error mismatch\n    expected: {}\n    actual:   {}",
                    filename,
                    expected.trim(),
                    actual_error
                )),
                None => {
                    println!(
                        "  {} => error: {} (no .error file to compare)",
                        filename, actual_error
                    );
                    Ok(())
                }
            }
        }
    }
}

fn run_all(subdir: &str, run: fn(&Path) -> Result<(), String>) {
    let files = get_vmf_files(subdir);
    assert!(!files.is_empty(), "No fixtures found in test/{}", subdir);

    println!("\nRunning {} test/{} files:", files.len(), subdir);

    let mut errors: Vec<String> = Vec::new();
    for file in &files {
        if let Err(e) = run(file) {
            errors.push(e);
        }
    }

    println!(
        "\nResults: {} passed, {} failed",
        files.len() - errors.len(),
        errors.len()
    );
    if !errors.is_empty() {
        println!("\nErrors:");
        for error in &errors {
            println!("  - {}", error);
        }
    }

    assert!(errors.is_empty(), "{} test/{} fixtures failed", errors.len(), subdir);
}

#[test]
fn test_all_vmf_fixtures() {
    run_all("vmf", run_vmf_test);
}

#[test]
fn test_all_bad_fixtures() {
    run_all("bad", run_bad_test);
}

#[test]
fn test_errors_carry_source_context() {
    let path = test_root().join("bad").join("unmatched_brace.vmf");
    let err = parse_named(&path, &ParserConfig::default()).unwrap_err();
    assert_eq!(err.line(), Some(5));
    let context = err.context();
    assert!(!context.is_empty());
    assert!(context.last().unwrap().ends_with("| }"));
}

#[test]
fn test_box_room_contents() {
    let doc = parse(test_root().join("vmf").join("box_room.vmf"), &ParserConfig::default()).unwrap();
    assert_eq!(doc.entities.len(), 3);
    assert_eq!(doc.world.get("solid").and_then(|v| v.as_list()).map(|l| l.len()), Some(2));
    assert_eq!(doc.id_map.get("10").map(String::as_str), Some("entities.0"));
    assert_eq!(doc.id_map.get("3").map(String::as_str), Some("world.solid.1"));
    assert_eq!(doc.skybox_info.skyname.as_deref(), Some("sky_day01_01"));

    let relay = &doc.entities[2];
    let outputs = relay
        .get("connections")
        .and_then(|c| c.as_block())
        .and_then(|c| c.get("OnTrigger"))
        .and_then(|v| v.as_list())
        .unwrap();
    assert_eq!(outputs.len(), 2);

    let stats = MapStats::of(&doc);
    assert_eq!(stats.brushes, 2);
    assert_eq!(stats.sides, 3);
    assert_eq!(stats.connections, 2);
    assert_eq!(stats.special.spawn_points, 1);
    assert_eq!(stats.special.lights, 1);
}

#[test]
fn test_hammer_plus_contents() {
    let doc = parse(
        test_root().join("vmf").join("hammer_plus.vmf"),
        &ParserConfig::default(),
    )
    .unwrap();
    assert!(doc.skybox_info.sky_camera.is_some());
    assert!(!doc.map_bounds.is_empty());
    assert_eq!(doc.map_bounds.max.z, 64.0);
    let stats = MapStats::of(&doc);
    assert_eq!(stats.vertices, 8);
    assert_eq!(stats.hammer_plus.palette_colors, 3);
}

#[test]
fn test_comments_survive_roundtrip_when_kept() {
    let config = ParserConfig::default().with_preserve_comments(true);
    let doc = parse(test_root().join("vmf").join("odds_and_ends.vmf"), &config).unwrap();
    assert_eq!(doc.comments.len(), 2);
    assert_eq!(doc.comments[0].text.trim(), "hand-edited map");
    assert!(serialize(&doc).starts_with("// hand-edited map\n"));
}
