//! Plain-text comparison report.

use crate::diff::Comparison;
use crate::document::MapBounds;
use crate::stats::Pair;
use crate::value::{format_float, Block, Value, Vec3};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// Render a human-readable summary of a comparison.
pub fn generate_report(comparison: &Comparison) -> String {
    let diff = &comparison.differences;
    let stats = &comparison.stats;
    let mut out = String::from("VMF Comparison Report\n\n");

    out.push_str("Differences:\n");
    let _ = writeln!(out, "  Removed: {}", diff.removed.len());
    let _ = writeln!(out, "  Added: {}", diff.added.len());
    let _ = writeln!(out, "  Changed: {}", diff.changed.len());
    let _ = writeln!(out, "  Vertex changes: {}", diff.vertex_changed.len());
    let _ = writeln!(out, "  Total: {}", stats.total_differences);

    out.push_str("\nStatistics:\n");
    count_line(&mut out, "Brushes", &stats.brush_counts);
    count_line(&mut out, "Sides", &stats.side_counts);
    count_line(&mut out, "Displacements", &stats.displacement_counts);
    count_line(&mut out, "Vertices", &stats.vertex_counts);

    out.push_str("\nEntity Counts:\n");
    map_lines(&mut out, &stats.entity_counts);

    out.push_str("\nTexture Counts:\n");
    map_lines(&mut out, &stats.texture_counts);

    out.push_str("\nSkybox Info:\n");
    skybox_lines(&mut out, comparison);

    out.push_str("\nMap Bounds:\n");
    let bounds = &stats.map_bounds;
    let _ = writeln!(
        out,
        "  Min: ({}) vs ({})",
        corner(&bounds.doc1, |b| b.min),
        corner(&bounds.doc2, |b| b.min)
    );
    let _ = writeln!(
        out,
        "  Max: ({}) vs ({})",
        corner(&bounds.doc1, |b| b.max),
        corner(&bounds.doc2, |b| b.max)
    );

    out.push_str("\nVertex Deviation:\n");
    let _ = writeln!(out, "  Changed vertices: {}", stats.vertex_changes);
    let _ = writeln!(out, "  Total: {}", format_float(stats.total_vertex_deviation));
    let _ = writeln!(out, "  Max: {}", format_float(stats.max_vertex_deviation));
    let _ = writeln!(
        out,
        "  Average: {}",
        stats
            .average_vertex_deviation
            .map(format_float)
            .unwrap_or_else(|| "N/A".to_string())
    );
    out
}

fn count_line(out: &mut String, label: &str, counts: &Pair<usize>) {
    let _ = writeln!(out, "  {}: {} vs {}", label, counts.doc1, counts.doc2);
}

/// Only names whose counts differ, sorted.
fn map_lines(out: &mut String, counts: &Pair<BTreeMap<String, usize>>) {
    let names: BTreeSet<&String> = counts.doc1.keys().chain(counts.doc2.keys()).collect();
    for name in names {
        let a = counts.doc1.get(name).copied().unwrap_or(0);
        let b = counts.doc2.get(name).copied().unwrap_or(0);
        if a != b {
            let _ = writeln!(out, "  {}: {} vs {}", name, a, b);
        }
    }
}

fn skybox_lines(out: &mut String, comparison: &Comparison) {
    let sky = &comparison.stats.skybox_info;
    let _ = writeln!(
        out,
        "  Skyname: {} vs {}",
        sky.doc1.skyname.as_deref().unwrap_or("N/A"),
        sky.doc2.skyname.as_deref().unwrap_or("N/A")
    );
    if sky.doc1.sky_camera.is_none() && sky.doc2.sky_camera.is_none() {
        return;
    }
    out.push_str("  Sky Camera:\n");
    let empty = Block::new();
    let cam1 = sky.doc1.sky_camera.as_ref().unwrap_or(&empty);
    let cam2 = sky.doc2.sky_camera.as_ref().unwrap_or(&empty);
    let mut keys: Vec<&str> = cam1.keys().collect();
    keys.extend(cam2.keys().filter(|k| !cam1.contains_key(k)));
    for key in keys {
        let a = cam1.get(key);
        let b = cam2.get(key);
        if a != b {
            let render = |v: Option<&Value>| v.map_or_else(|| "N/A".to_string(), |v| v.to_string());
            let _ = writeln!(out, "    {}: {} vs {}", key, render(a), render(b));
        }
    }
}

fn corner(bounds: &MapBounds, pick: impl Fn(&MapBounds) -> Vec3) -> String {
    if bounds.is_empty() {
        return "N/A, N/A, N/A".to_string();
    }
    let v = pick(bounds);
    format!("{}, {}, {}", format_float(v.x), format_float(v.y), format_float(v.z))
}
