//! Parser settings: a TOML file, then command-line overrides.
//!
//! Every key is optional:
//!
//! ```toml
//! max_nesting_depth = 50000
//! chunk_size = 8192
//! max_lines = 1000000
//! multiple_values_behavior = "array"   # or "last", "first"
//! preserve_comments = false
//! streaming = false
//! ```

use clap::{Args, ValueEnum};
use libvmf::{MergePolicy, ParserConfig};
use std::fs;
use std::path::{Path, PathBuf};

/// How repeated keys are folded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Merge {
    Array,
    Last,
    First,
}

impl From<Merge> for MergePolicy {
    fn from(merge: Merge) -> Self {
        match merge {
            Merge::Array => MergePolicy::Array,
            Merge::Last => MergePolicy::Last,
            Merge::First => MergePolicy::First,
        }
    }
}

/// Options shared by every subcommand that parses maps.
#[derive(Debug, Clone, Default, Args)]
pub struct ParserArgs {
    /// TOML file with parser settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Maximum block nesting depth
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    /// Maximum number of input lines
    #[arg(long, global = true)]
    pub max_lines: Option<usize>,

    /// How repeated keys are folded
    #[arg(long, global = true, value_enum)]
    pub merge: Option<Merge>,

    /// Keep `//` comments in parsed documents
    #[arg(long, global = true)]
    pub preserve_comments: bool,
}

impl ParserArgs {
    /// The file settings, or defaults, with flags applied on top.
    pub fn resolve(&self) -> Result<ParserConfig, String> {
        let mut config = match &self.config {
            Some(path) => load(path)?,
            None => ParserConfig::default(),
        };
        if let Some(depth) = self.max_depth {
            config = config.with_max_nesting_depth(depth);
        }
        if let Some(lines) = self.max_lines {
            config = config.with_max_lines(lines);
        }
        if let Some(merge) = self.merge {
            config = config.with_merge_policy(merge.into());
        }
        if self.preserve_comments {
            config = config.with_preserve_comments(true);
        }
        log::debug!("Parser settings: {:?}", config);
        Ok(config)
    }
}

/// Read a `ParserConfig` from a TOML file.
pub fn load(path: &Path) -> Result<ParserConfig, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    toml_edit::de::from_str(&text).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}
