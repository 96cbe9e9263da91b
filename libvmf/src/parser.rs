//! Phase 3: Parser
//!
//! The parser pulls tokens and builds top-level [`Section`]s. Block descent
//! keeps its own frame stack instead of recursing, so nesting is bounded only
//! by `max_nesting_depth`. Inside a block, keys are dispatched by the block's
//! mode:
//! - `vertices_plus` and `editor` switch to dedicated sub-grammars
//! - `dispinfo` rows become lists of numbers
//! - Hammer++ sections keep their raw or numeric values
//!
//! Repeated keys fold according to the configured [`MergePolicy`].

use crate::config::{MergePolicy, ParserConfig};
use crate::document;
use crate::error::{ParseError, Result, SyntaxKind};
use crate::lexer::{Token, TokenKind, Tokenizer};
use crate::literal::{self, classify_literal};
use crate::value::{Block, Rgb, Value};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// A `//` comment kept when `preserve_comments` is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub line: usize,
    pub text: String,
}

/// One top-level `name { ... }` or `name value` unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    pub value: Value,
    /// Line of the section name.
    pub line: usize,
}

/// How values inside a block are typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockMode {
    Generic,
    Dispinfo,
    DispRows,
    Cameras,
    Palette,
    /// Strings only.
    Raw,
    /// Numbers or strings.
    Numeric,
}

impl BlockMode {
    pub(crate) fn for_section(name: &str) -> Self {
        match name {
            "cameras" => BlockMode::Cameras,
            "palette_plus" => BlockMode::Palette,
            "colorcorrection_plus" | "bgimages_plus" => BlockMode::Raw,
            "light_plus" => BlockMode::Numeric,
            _ => BlockMode::Generic,
        }
    }

    pub(crate) fn child(self, key: &str) -> Self {
        match self {
            BlockMode::Generic if key == "dispinfo" => BlockMode::Dispinfo,
            BlockMode::Dispinfo | BlockMode::DispRows => BlockMode::DispRows,
            other => other,
        }
    }

    pub(crate) fn allows_sub_grammars(self) -> bool {
        self == BlockMode::Generic
    }

    pub(crate) fn classify(self, key: &str, text: &str) -> Value {
        match self {
            BlockMode::Raw => Value::String(text.to_string()),
            BlockMode::Numeric => literal::classify_numeric(text),
            BlockMode::Cameras if key == "position" || key == "look" => {
                bracketed_or_literal(text)
            }
            BlockMode::Dispinfo if key == "startposition" => bracketed_or_literal(text),
            BlockMode::DispRows => match literal::parse_number_row(text) {
                Some(row) => Value::List(row),
                None => classify_literal(text),
            },
            BlockMode::Palette if is_palette_color(key) => coerce_color(classify_literal(text)),
            _ => classify_literal(text),
        }
    }
}

fn bracketed_or_literal(text: &str) -> Value {
    match literal::parse_bracket_vector(text) {
        Some(v) => Value::Vector3(v),
        None => classify_literal(text),
    }
}

pub(crate) fn is_palette_color(key: &str) -> bool {
    key.strip_prefix("color")
        .map_or(false, |n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Integral vectors in byte range read as colors.
pub(crate) fn coerce_color(value: Value) -> Value {
    match value {
        Value::Vector3(v) => {
            let byte = |f: f64| {
                if f.fract() == 0.0 && (0.0..=255.0).contains(&f) {
                    Some(f as u8)
                } else {
                    None
                }
            };
            match (byte(v.x), byte(v.y), byte(v.z)) {
                (Some(r), Some(g), Some(b)) => Value::Color(Rgb::new(r, g, b)),
                _ => Value::Vector3(v),
            }
        }
        Value::List(items) => Value::List(items.into_iter().map(coerce_color).collect()),
        other => other,
    }
}

/// Accumulates a block's entries, folding repeated keys.
pub(crate) struct BlockBuilder {
    block: Block,
    folded: HashSet<String>,
    policy: MergePolicy,
}

impl BlockBuilder {
    pub(crate) fn new(policy: MergePolicy) -> Self {
        Self {
            block: Block::new(),
            folded: HashSet::new(),
            policy,
        }
    }

    /// Continue building on an existing block. Its list values count as folded.
    pub(crate) fn from_block(block: Block, policy: MergePolicy) -> Self {
        let folded = block
            .iter()
            .filter(|(_, v)| matches!(v, Value::List(_)))
            .map(|(k, _)| k.to_string())
            .collect();
        Self {
            block,
            folded,
            policy,
        }
    }

    pub(crate) fn add(&mut self, key: String, value: Value) {
        let existing = match self.block.get_mut(&key) {
            Some(existing) => existing,
            None => {
                self.block.insert(key, value);
                return;
            }
        };
        match self.policy {
            MergePolicy::Last => *existing = value,
            MergePolicy::First => {}
            MergePolicy::Array => {
                if self.folded.contains(&key) {
                    if let Value::List(items) = existing {
                        items.push(value);
                        return;
                    }
                }
                let first = std::mem::replace(existing, Value::List(Vec::new()));
                *existing = Value::List(vec![first, value]);
                self.folded.insert(key);
            }
        }
    }

    /// Vertex sets always accumulate, whatever the policy.
    fn add_vertex_set(&mut self, set: Vec<Value>) {
        match self.block.get_mut("vertices_plus") {
            Some(Value::List(sets)) => sets.push(Value::List(set)),
            Some(other) => *other = Value::List(vec![Value::List(set)]),
            None => {
                self.block
                    .insert("vertices_plus", Value::List(vec![Value::List(set)]));
            }
        }
    }

    pub(crate) fn finish(self) -> Block {
        self.block
    }
}

struct Frame {
    key: String,
    mode: BlockMode,
    builder: BlockBuilder,
}

impl Frame {
    fn new(key: String, mode: BlockMode, policy: MergePolicy) -> Self {
        Self {
            key,
            mode,
            builder: BlockBuilder::new(policy),
        }
    }
}

/// Section-level VMF parser over a token stream.
pub struct Parser<R: Read> {
    tokens: Tokenizer<R>,
    peeked: Option<Token>,
    max_depth: usize,
    policy: MergePolicy,
    comments: Vec<Comment>,
}

impl<R: Read> Parser<R> {
    pub fn new(reader: R, config: &ParserConfig, filename: Option<&str>) -> Self {
        Self {
            tokens: Tokenizer::new(reader, config, filename),
            peeked: None,
            max_depth: config.max_nesting_depth,
            policy: config.multiple_values_behavior,
            comments: Vec::new(),
        }
    }

    /// Current source line.
    pub fn line(&self) -> usize {
        self.tokens.line()
    }

    /// Comments collected so far.
    pub fn take_comments(&mut self) -> Vec<Comment> {
        std::mem::take(&mut self.comments)
    }

    /// Parse the next top-level section, or `None` at end of input.
    pub fn next_section(&mut self) -> Result<Option<Section>> {
        loop {
            let tok = match self.next_significant()? {
                Some(tok) => tok,
                None => return Ok(None),
            };
            match tok.kind {
                TokenKind::String | TokenKind::Number | TokenKind::Identifier => {
                    return self.parse_section(tok).map(Some);
                }
                TokenKind::BraceClose => {
                    return Err(self.syntax_error(SyntaxKind::UnmatchedBrace, tok.line));
                }
                TokenKind::BraceOpen => {
                    log::warn!("Anonymous top-level block{}", self.loc(tok.line));
                    let block = self.parse_block("", BlockMode::Generic, tok.line)?;
                    return Ok(Some(Section {
                        name: String::new(),
                        value: Value::Block(block),
                        line: tok.line,
                    }));
                }
                _ => log::warn!("Skipping unexpected {:?}{}", tok.text, self.loc(tok.line)),
            }
        }
    }

    fn parse_section(&mut self, name_tok: Token) -> Result<Section> {
        let Token { text: name, line, .. } = name_tok;
        if let Some(value) = self.value_on_line()? {
            return Ok(Section {
                value: classify_literal(&value.text),
                name,
                line,
            });
        }
        self.skip_trivia(true)?;
        match self.peek_kind()? {
            Some(TokenKind::BraceOpen) => {
                self.advance()?;
                let block = self.parse_block(&name, BlockMode::for_section(&name), line)?;
                Ok(Section {
                    name,
                    value: Value::Block(block),
                    line,
                })
            }
            None => Err(self.syntax_error(SyntaxKind::UnexpectedEnd(name), line)),
            Some(_) => {
                log::warn!("Section \"{}\" has no value{}", name, self.loc(line));
                Ok(Section {
                    name,
                    value: Value::String(String::new()),
                    line,
                })
            }
        }
    }

    /// Parse a block body whose `{` has been consumed. Depth 1 is a
    /// top-level block.
    fn parse_block(&mut self, key: &str, mode: BlockMode, line: usize) -> Result<Block> {
        self.check_depth(1, line)?;
        let mut current = Frame::new(key.to_string(), mode, self.policy);
        let mut parents: Vec<Frame> = Vec::new();
        loop {
            let tok = match self.next_significant()? {
                Some(tok) => tok,
                None => {
                    let line = self.line();
                    return Err(self.syntax_error(SyntaxKind::UnexpectedEnd(current.key), line));
                }
            };
            match tok.kind {
                TokenKind::BraceClose => match parents.pop() {
                    None => return Ok(current.builder.finish()),
                    Some(parent) => {
                        let child = std::mem::replace(&mut current, parent);
                        current
                            .builder
                            .add(child.key, Value::Block(child.builder.finish()));
                    }
                },
                TokenKind::BraceOpen => {
                    log::warn!(
                        "Anonymous block inside \"{}\"{}",
                        current.key,
                        self.loc(tok.line)
                    );
                    self.check_depth(parents.len() + 2, tok.line)?;
                    let child = Frame::new(String::new(), current.mode, self.policy);
                    parents.push(std::mem::replace(&mut current, child));
                }
                TokenKind::String | TokenKind::Number | TokenKind::Identifier => {
                    let depth = parents.len() + 1;
                    if let Some(child) = self.parse_entry(&mut current, tok, depth)? {
                        parents.push(std::mem::replace(&mut current, child));
                    }
                }
                _ => log::warn!(
                    "Skipping unexpected {:?} inside \"{}\"{}",
                    tok.text,
                    current.key,
                    self.loc(tok.line)
                ),
            }
        }
    }

    /// Handle one key inside `frame`. Returns the child frame when the key
    /// opens a nested block.
    fn parse_entry(&mut self, frame: &mut Frame, key_tok: Token, depth: usize) -> Result<Option<Frame>> {
        let Token { text: key, line, .. } = key_tok;
        if frame.mode.allows_sub_grammars() {
            if key == "vertices_plus" {
                let set = self.parse_vertices_plus(depth + 1, line)?;
                frame.builder.add_vertex_set(set);
                return Ok(None);
            }
            if key == "editor" {
                let block = self.parse_editor(depth + 1, line)?;
                frame.builder.add(key, Value::Block(block));
                return Ok(None);
            }
        }
        if let Some(value) = self.value_on_line()? {
            let value = frame.mode.classify(&key, &value.text);
            frame.builder.add(key, value);
            return Ok(None);
        }
        self.skip_trivia(true)?;
        if self.peek_kind()? == Some(TokenKind::BraceOpen) {
            self.advance()?;
            self.check_depth(depth + 1, line)?;
            let mode = frame.mode.child(&key);
            return Ok(Some(Frame::new(key, mode, self.policy)));
        }
        log::warn!("Key \"{}\" has no value{}", key, self.loc(line));
        Ok(None)
    }

    /// `vertices_plus { "v" "x y z" ... }`, one vertex set.
    fn parse_vertices_plus(&mut self, depth: usize, line: usize) -> Result<Vec<Value>> {
        self.open_sub_block("vertices_plus", depth, line)?;
        let mut set = Vec::new();
        loop {
            let tok = match self.next_significant()? {
                Some(tok) => tok,
                None => return Err(self.unexpected_end("vertices_plus")),
            };
            match tok.kind {
                TokenKind::BraceClose => return Ok(set),
                TokenKind::BraceOpen => {
                    log::warn!("Skipping nested block in vertices_plus{}", self.loc(tok.line));
                    self.skip_nested("vertices_plus", depth + 1, tok.line)?;
                }
                TokenKind::String | TokenKind::Number | TokenKind::Identifier => {
                    let value = self.value_on_line()?;
                    match (tok.text.as_str(), value) {
                        ("v", Some(value)) => match literal::parse_vertex(&value.text) {
                            Some(v) => set.push(Value::Vector3(v)),
                            None => log::warn!(
                                "Malformed vertex {:?}{}",
                                value.text,
                                self.loc(tok.line)
                            ),
                        },
                        (other, _) => log::warn!(
                            "Skipping \"{}\" in vertices_plus{}",
                            other,
                            self.loc(tok.line)
                        ),
                    }
                }
                _ => log::warn!(
                    "Skipping unexpected {:?} in vertices_plus{}",
                    tok.text,
                    self.loc(tok.line)
                ),
            }
        }
    }

    /// `editor { ... }`, flat key/value pairs only.
    fn parse_editor(&mut self, depth: usize, line: usize) -> Result<Block> {
        self.open_sub_block("editor", depth, line)?;
        let mut builder = BlockBuilder::new(self.policy);
        loop {
            let tok = match self.next_significant()? {
                Some(tok) => tok,
                None => return Err(self.unexpected_end("editor")),
            };
            match tok.kind {
                TokenKind::BraceClose => return Ok(builder.finish()),
                TokenKind::BraceOpen => {
                    log::warn!("Skipping nested block in editor{}", self.loc(tok.line));
                    self.skip_nested("editor", depth + 1, tok.line)?;
                }
                TokenKind::String | TokenKind::Number | TokenKind::Identifier => {
                    if let Some(value) = self.value_on_line()? {
                        builder.add(tok.text, classify_literal(&value.text));
                        continue;
                    }
                    self.skip_trivia(true)?;
                    if self.peek_kind()? == Some(TokenKind::BraceOpen) {
                        self.advance()?;
                        log::warn!(
                            "Skipping nested block \"{}\" in editor{}",
                            tok.text,
                            self.loc(tok.line)
                        );
                        self.skip_nested("editor", depth + 1, tok.line)?;
                    } else {
                        log::warn!("Key \"{}\" has no value{}", tok.text, self.loc(tok.line));
                    }
                }
                _ => log::warn!(
                    "Skipping unexpected {:?} in editor{}",
                    tok.text,
                    self.loc(tok.line)
                ),
            }
        }
    }

    fn open_sub_block(&mut self, keyword: &str, depth: usize, line: usize) -> Result<()> {
        self.skip_trivia(true)?;
        match self.peek_kind()? {
            Some(TokenKind::BraceOpen) => {
                self.advance()?;
                self.check_depth(depth, line)
            }
            None => Err(self.unexpected_end(keyword)),
            Some(_) => Err(self.syntax_error(SyntaxKind::ExpectedBlock(keyword.to_string()), line)),
        }
    }

    /// Discard a block whose `{` has been consumed.
    fn skip_nested(&mut self, within: &str, depth: usize, line: usize) -> Result<()> {
        self.check_depth(depth, line)?;
        let mut open = 1usize;
        while open > 0 {
            let tok = match self.next_significant()? {
                Some(tok) => tok,
                None => return Err(self.unexpected_end(within)),
            };
            match tok.kind {
                TokenKind::BraceOpen => {
                    open += 1;
                    self.check_depth(depth + open - 1, tok.line)?;
                }
                TokenKind::BraceClose => open -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    fn check_depth(&self, depth: usize, line: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(self.syntax_error(SyntaxKind::DepthExceeded(self.max_depth), line));
        }
        Ok(())
    }

    fn syntax_error(&self, kind: SyntaxKind, line: usize) -> ParseError {
        ParseError::syntax(kind, self.tokens.context(), line, self.tokens.recent_lines())
    }

    fn unexpected_end(&self, within: &str) -> ParseError {
        self.syntax_error(SyntaxKind::UnexpectedEnd(within.to_string()), self.line())
    }

    fn loc(&self, line: usize) -> String {
        self.tokens.context().loc_suffix(line)
    }

    fn advance(&mut self) -> Result<Option<Token>> {
        match self.peeked.take() {
            Some(tok) => Ok(Some(tok)),
            None => self.tokens.next_token(),
        }
    }

    fn peek_kind(&mut self) -> Result<Option<TokenKind>> {
        if self.peeked.is_none() {
            self.peeked = self.tokens.next_token()?;
        }
        Ok(self.peeked.as_ref().map(|t| t.kind))
    }

    /// Skip whitespace and comments, and newlines too when asked.
    fn skip_trivia(&mut self, newlines: bool) -> Result<()> {
        loop {
            match self.peek_kind()? {
                Some(TokenKind::Whitespace) => {
                    self.advance()?;
                }
                Some(TokenKind::Newline) if newlines => {
                    self.advance()?;
                }
                Some(TokenKind::Comment) => {
                    if let Some(tok) = self.advance()? {
                        self.comments.push(Comment {
                            line: tok.line,
                            text: tok.text,
                        });
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_significant(&mut self) -> Result<Option<Token>> {
        self.skip_trivia(true)?;
        self.advance()
    }

    /// A value token on the current line, if there is one.
    fn value_on_line(&mut self) -> Result<Option<Token>> {
        self.skip_trivia(false)?;
        self.peek_kind()?;
        if self.peeked.as_ref().map_or(false, Token::is_word) {
            return self.advance();
        }
        Ok(None)
    }

    fn reader_mut(&mut self) -> &mut R {
        self.tokens.reader_mut()
    }

    fn reset(&mut self) {
        self.tokens.reset();
        self.peeked = None;
        self.comments.clear();
    }
}

/// Lazy, forward-only sequence of normalized top-level sections.
pub struct SectionStream<R: Read> {
    parser: Parser<R>,
    finished: bool,
    filename: Option<String>,
}

impl<R: Read> SectionStream<R> {
    pub fn new(reader: R, config: &ParserConfig) -> Self {
        Self::with_filename(reader, config, None)
    }

    /// Like [`SectionStream::new`], naming the source in error messages.
    pub fn with_filename(reader: R, config: &ParserConfig, filename: Option<&str>) -> Self {
        Self {
            parser: Parser::new(reader, config, filename),
            finished: false,
            filename: filename.map(String::from),
        }
    }

    /// The next section, normalized the same way a full parse would.
    pub fn next_section(&mut self) -> Result<Option<Section>> {
        if self.finished {
            return Ok(None);
        }
        match self.parser.next_section() {
            Ok(Some(mut section)) => {
                document::normalize_section(&section.name, &mut section.value);
                Ok(Some(section))
            }
            Ok(None) => {
                self.finished = true;
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }

    pub fn line(&self) -> usize {
        self.parser.line()
    }

    pub fn take_comments(&mut self) -> Vec<Comment> {
        self.parser.take_comments()
    }
}

impl SectionStream<File> {
    /// Open `path` for section-by-section reading.
    pub fn open(path: impl AsRef<Path>, config: &ParserConfig) -> Result<Self> {
        let name = path.as_ref().display().to_string();
        let file = File::open(path.as_ref()).map_err(|e| ParseError::io(name.clone(), e))?;
        Ok(Self::with_filename(file, config, Some(&name)))
    }
}

impl<R: Read + Seek> SectionStream<R> {
    /// Start over from the first section.
    pub fn rewind(&mut self) -> Result<()> {
        let name = self
            .filename
            .clone()
            .unwrap_or_else(|| "<input>".to_string());
        self.parser
            .reader_mut()
            .seek(SeekFrom::Start(0))
            .map_err(|e| ParseError::io(name, e))?;
        self.parser.reset();
        self.finished = false;
        Ok(())
    }
}

impl<R: Read> Iterator for SectionStream<R> {
    type Item = Result<Section>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_section().transpose()
    }
}
