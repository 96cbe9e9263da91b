//! Error types for VMF parsing and comparison.

use std::io;
use thiserror::Error;

/// Result type for VMF parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Result type for comparison operations.
pub type DiffResult<T> = std::result::Result<T, DiffError>;

/// Parse context carrying filename for error reporting.
#[derive(Clone, Debug, Default)]
pub struct ParseContext {
    pub filename: Option<String>,
}

impl ParseContext {
    /// Create a new parse context.
    pub fn new(filename: Option<&str>) -> Self {
        Self {
            filename: filename.map(String::from),
        }
    }

    /// Format a location suffix for error messages.
    pub fn loc_suffix(&self, line: usize) -> String {
        match &self.filename {
            Some(name) => format!(" at line {} of <{}>", line, name),
            None => format!(" at line {}", line),
        }
    }
}

/// Structural problems that stop a parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxKind {
    /// A `}` with no open block.
    #[error("Unmatched closing brace")]
    UnmatchedBrace,

    /// Input ended while a block or section was still open.
    #[error("Unexpected end of input inside \"{0}\"")]
    UnexpectedEnd(String),

    /// Block nesting went past `max_nesting_depth`.
    #[error("Maximum nesting depth of {0} exceeded")]
    DepthExceeded(usize),

    /// A sub-grammar keyword was not followed by its block.
    #[error("Expected block after \"{0}\"")]
    ExpectedBlock(String),
}

/// Error type for VMF parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The file is missing or could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Malformed structure. Carries the line and a few surrounding source lines.
    #[error("{kind}{location}")]
    Syntax {
        kind: SyntaxKind,
        line: usize,
        location: String,
        context: Vec<String>,
    },

    /// The input has more lines than `max_lines` allows.
    #[error("Line limit of {limit} exceeded{location}")]
    Limit {
        limit: usize,
        line: usize,
        location: String,
    },
}

impl ParseError {
    /// Build a syntax error located at `line`.
    pub fn syntax(kind: SyntaxKind, ctx: &ParseContext, line: usize, context: Vec<String>) -> Self {
        ParseError::Syntax {
            kind,
            line,
            location: ctx.loc_suffix(line),
            context,
        }
    }

    /// Build a line-limit error located at `line`.
    pub fn limit(limit: usize, ctx: &ParseContext, line: usize) -> Self {
        ParseError::Limit {
            limit,
            line,
            location: ctx.loc_suffix(line),
        }
    }

    /// Wrap an I/O failure for `path`.
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        ParseError::Io {
            path: path.into(),
            source,
        }
    }

    /// Line number the error points at, if it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Io { .. } => None,
            ParseError::Syntax { line, .. } | ParseError::Limit { line, .. } => Some(*line),
        }
    }

    /// Source lines captured around a syntax error.
    pub fn context(&self) -> &[String] {
        match self {
            ParseError::Syntax { context, .. } => context,
            _ => &[],
        }
    }

    /// The structural problem, for syntax errors.
    pub fn syntax_kind(&self) -> Option<&SyntaxKind> {
        match self {
            ParseError::Syntax { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, ParseError::Syntax { .. })
    }

    pub fn is_limit(&self) -> bool {
        matches!(self, ParseError::Limit { .. })
    }
}

/// Error type for document comparison.
#[derive(Error, Debug)]
pub enum DiffError {
    /// A document handed to the differ breaks a shape invariant.
    #[error("Invalid {side} document: {reason}")]
    InvalidInput { side: &'static str, reason: String },

    /// An ignore pattern is not a valid glob.
    #[error("Invalid ignore pattern \"{pattern}\": {message}")]
    InvalidPattern { pattern: String, message: String },

    /// One of the inputs failed to parse (streaming comparisons).
    #[error(transparent)]
    Parse(#[from] ParseError),
}
