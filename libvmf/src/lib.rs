//! VMF (Valve Map Format) parser, writer, and structural differ.
//!
//! VMF is the plain-text source format of Hammer maps: nested named blocks
//! of quoted key/value pairs. This crate reads it into a typed
//! [`Document`], writes it back out, and compares two maps.
//!
//! # Parsing Pipeline
//!
//! The parser operates in four phases:
//!
//! 1. **Scanner**: Reads the source in fixed-size chunks, tracking line
//!    numbers and enforcing the line limit.
//!
//! 2. **Tokenizer**: Turns bytes into strings, numbers, identifiers, braces,
//!    and trivia.
//!
//! 3. **Parser**: Builds one top-level section at a time with an explicit
//!    block stack, typing each value by the block it sits in.
//!
//! 4. **Document**: Folds sections into named slots and derives skybox
//!    info, map bounds, and the id index.
//!
//! Sections can also be pulled one at a time with [`SectionStream`], which
//! is what [`compare_streaming`] does.

mod config;
mod diff;
mod document;
mod encode;
mod error;
mod ignore;
mod lexer;
mod literal;
mod parser;
mod report;
mod scanner;
mod stats;
mod value;
mod vertex;

pub use config::{MergePolicy, ParserConfig};
pub use diff::{compare, compare_streaming, Change, Comparison, Differences, Entry, VertexChange};
pub use document::{normalize_section, Document, MapBounds, SkyboxInfo, BLOCK_SECTIONS};
pub use encode::serialize;
pub use error::{DiffError, DiffResult, ParseError, Result, SyntaxKind};
pub use ignore::{parse_ignore_list, IgnoreSet};
pub use lexer::{Token, TokenKind, Tokenizer};
pub use literal::classify_literal;
pub use parser::{Comment, Section, SectionStream};
pub use report::generate_report;
pub use stats::{DiffTotals, HammerPlusCounts, MapStats, Pair, SpecialEntities, Stats};
pub use value::{AxisSpec, Block, Rgb, Value, Vec3};
pub use vertex::{compare_vertex_sets, VertexDeviation};

use document::DocumentBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Parse a VMF file.
///
/// # Example
///
/// ```no_run
/// use libvmf::{parse, ParserConfig};
///
/// let doc = parse("maps/test.vmf", &ParserConfig::default()).unwrap();
/// println!("{} entities", doc.entities.len());
/// ```
pub fn parse(path: impl AsRef<Path>, config: &ParserConfig) -> Result<Document> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let file = File::open(path).map_err(|e| ParseError::io(name.clone(), e))?;
    parse_reader(file, Some(&name), config)
}

/// Parse VMF text held in memory.
///
/// ```
/// use libvmf::{parse_str, ParserConfig, Value};
///
/// let doc = parse_str("world\n{\n\"id\" \"1\"\n}\n", &ParserConfig::default()).unwrap();
/// assert_eq!(doc.world.get("id"), Some(&Value::Integer(1)));
/// ```
pub fn parse_str(input: &str, config: &ParserConfig) -> Result<Document> {
    parse_reader(input.as_bytes(), None, config)
}

/// Parse VMF from any reader, naming it `filename` in error messages.
pub fn parse_reader<R: Read>(
    reader: R,
    filename: Option<&str>,
    config: &ParserConfig,
) -> Result<Document> {
    let mut stream = SectionStream::with_filename(reader, config, filename);
    let mut builder = DocumentBuilder::new(config.multiple_values_behavior);
    while let Some(section) = stream.next_section()? {
        builder.add_section(section);
    }
    let doc = builder.finish(stream.take_comments());
    log::debug!(
        "Parsed {} lines: {} entities, {} ids",
        stream.line(),
        doc.entities.len(),
        doc.id_map.len()
    );
    Ok(doc)
}
