//! Parser configuration.

use serde::Deserialize;

/// How a key that repeats inside one block is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Fold every occurrence into a `List`.
    #[default]
    Array,
    /// Keep only the last occurrence.
    Last,
    /// Keep only the first occurrence.
    First,
}

/// Options recognized by [`crate::parse`] and friends.
///
/// Every field is optional when deserialized; missing fields take the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Deepest block nesting accepted before failing.
    pub max_nesting_depth: usize,
    /// Bytes read from the source per refill.
    pub chunk_size: usize,
    /// Hard ceiling on input lines.
    pub max_lines: usize,
    /// Folding rule for repeated keys.
    pub multiple_values_behavior: MergePolicy,
    /// Collect `//` comments into [`crate::Document::comments`].
    pub preserve_comments: bool,
    /// Compare section by section instead of loading whole documents.
    pub streaming: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 50_000,
            chunk_size: 8192,
            max_lines: 1_000_000,
            multiple_values_behavior: MergePolicy::Array,
            preserve_comments: false,
            streaming: false,
        }
    }
}

impl ParserConfig {
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn with_max_lines(mut self, lines: usize) -> Self {
        self.max_lines = lines;
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.multiple_values_behavior = policy;
        self
    }

    pub fn with_preserve_comments(mut self, preserve: bool) -> Self {
        self.preserve_comments = preserve;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}
