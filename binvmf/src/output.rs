//! Rendering results as JSON, YAML, or text, and writing them out.

use clap::ValueEnum;
use libvmf::MapStats;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml,
    /// Canonical VMF, for `parse` only.
    Vmf,
}

/// Serialize `value` as pretty JSON or YAML.
pub fn structured<T: Serialize>(value: &T, format: Format) -> Result<String, String> {
    match format {
        Format::Json => serde_json::to_string_pretty(value)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| format!("JSON encode error: {}", e)),
        Format::Yaml => serde_yaml::to_string(value).map_err(|e| format!("YAML encode error: {}", e)),
        other => Err(format!("{:?} output is not available here", other)),
    }
}

/// Write `text` to `path`, or to stdout when there is none.
pub fn emit(text: &str, path: Option<&Path>) -> Result<(), String> {
    match path {
        Some(path) => fs::write(path, text)
            .map_err(|e| format!("Error writing {}: {}", path.display(), e)),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|_| stdout.flush())
                .map_err(|e| format!("Error writing stdout: {}", e))
        }
    }
}

/// One map's statistics as aligned `name: value` lines.
pub fn stats_text(stats: &MapStats) -> String {
    let mut out = String::new();
    let mut line = |label: &str, value: &dyn std::fmt::Display| {
        let _ = writeln!(out, "{:<18} {}", format!("{}:", label), value);
    };
    line("Brushes", &stats.brushes);
    line("Sides", &stats.sides);
    line("Vertices", &stats.vertices);
    line("Displacements", &stats.displacements);
    line("Entities", &stats.entities.values().sum::<usize>());
    line("Textures", &stats.textures.len());
    line("Connections", &stats.connections);
    line("Visgroups", &stats.visgroups);
    line("Cameras", &stats.cameras);
    line("Cordons", &stats.cordons);
    line("Groups", &stats.groups);
    line("Instances", &stats.instances);
    line(
        "Skyname",
        &stats.skybox.skyname.as_deref().unwrap_or("N/A"),
    );
    match stats.map_bounds.size() {
        Some(size) => line("Map size", &size),
        None => line("Map size", &"N/A"),
    }

    out.push_str("\nEntity Counts:\n");
    for (classname, count) in &stats.entities {
        let _ = writeln!(out, "  {}: {}", classname, count);
    }
    out.push_str("\nTexture Counts:\n");
    for (material, count) in &stats.textures {
        let _ = writeln!(out, "  {}: {}", material, count);
    }
    out
}
