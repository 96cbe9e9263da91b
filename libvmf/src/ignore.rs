//! Ignore patterns for the differ.
//!
//! Patterns are shell-style globs matched against the full dotted path of a
//! node, e.g. `world.solid.*.side.*.material`.

use crate::error::{DiffError, DiffResult};
use glob::Pattern;

/// Compiled ignore patterns for one comparison.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    /// Compile `patterns`. Blank entries are dropped.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> DiffResult<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for raw in patterns {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            let pattern = Pattern::new(raw).map_err(|e| DiffError::InvalidPattern {
                pattern: raw.to_string(),
                message: e.msg.to_string(),
            })?;
            compiled.push(pattern);
        }
        Ok(Self { patterns: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}

/// Split a comma-separated ignore list, trimming each entry.
pub fn parse_ignore_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
