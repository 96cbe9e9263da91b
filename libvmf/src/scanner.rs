//! Phase 1: Scanner
//!
//! The scanner pulls raw bytes from the source in fixed-size chunks and hands
//! them to the lexer one at a time. It performs:
//! - Chunked reads with re-buffering, so a token may straddle a chunk boundary
//! - Line counting and the `max_lines` ceiling
//! - A short memory of recent lines for syntax error context

use crate::error::{ParseContext, ParseError, Result};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

/// Number of completed lines kept for error context.
const CONTEXT_LINES: usize = 3;

/// Longest prefix of a line kept for error context.
const CONTEXT_WIDTH: usize = 160;

/// Byte-level reader over a chunked source.
pub struct Scanner<R: Read> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
    chunk_size: usize,
    eof: bool,
    /// One-based line of the next unread byte.
    line: usize,
    max_lines: usize,
    current: Vec<u8>,
    recent: VecDeque<(usize, String)>,
    ctx: ParseContext,
}

impl<R: Read> Scanner<R> {
    /// Create a scanner reading `chunk_size` bytes per refill.
    pub fn new(reader: R, chunk_size: usize, max_lines: usize, ctx: ParseContext) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            reader,
            buf: Vec::with_capacity(chunk_size),
            pos: 0,
            chunk_size,
            eof: false,
            line: 1,
            max_lines,
            current: Vec::new(),
            recent: VecDeque::with_capacity(CONTEXT_LINES),
            ctx,
        }
    }

    /// One-based line number of the next unread byte.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn context(&self) -> &ParseContext {
        &self.ctx
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Drop buffered bytes and restart line counting.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.pos = 0;
        self.eof = false;
        self.line = 1;
        self.current.clear();
        self.recent.clear();
    }

    /// Look at the byte `ahead` positions past the cursor without consuming.
    pub fn peek_at(&mut self, ahead: usize) -> Result<Option<u8>> {
        while self.pos + ahead >= self.buf.len() {
            if self.eof {
                return Ok(None);
            }
            self.fill()?;
        }
        Ok(Some(self.buf[self.pos + ahead]))
    }

    /// Look at the next byte without consuming.
    pub fn peek(&mut self) -> Result<Option<u8>> {
        self.peek_at(0)
    }

    /// Consume and return the next byte.
    pub fn bump(&mut self) -> Result<Option<u8>> {
        let b = match self.peek()? {
            Some(b) => b,
            None => return Ok(None),
        };
        if self.line > self.max_lines {
            return Err(ParseError::limit(self.max_lines, &self.ctx, self.line));
        }
        self.pos += 1;
        if b == b'\n' {
            self.finish_line();
            self.line += 1;
        } else if self.current.len() < CONTEXT_WIDTH {
            self.current.push(b);
        }
        Ok(Some(b))
    }

    /// Consume bytes while `pred` holds, appending them to `out`.
    pub fn bump_while(&mut self, out: &mut Vec<u8>, pred: impl Fn(u8) -> bool) -> Result<()> {
        while let Some(b) = self.peek()? {
            if !pred(b) {
                break;
            }
            self.bump()?;
            out.push(b);
        }
        Ok(())
    }

    /// Recent source lines, oldest first, including the line in progress.
    pub fn recent_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .recent
            .iter()
            .map(|(n, text)| format!("{:>6} | {}", n, text))
            .collect();
        if !self.current.is_empty() {
            lines.push(format!(
                "{:>6} | {}",
                self.line,
                String::from_utf8_lossy(&self.current).trim_end()
            ));
        }
        lines
    }

    fn finish_line(&mut self) {
        if self.recent.len() == CONTEXT_LINES {
            self.recent.pop_front();
        }
        let text = String::from_utf8_lossy(&self.current).trim_end().to_string();
        self.recent.push_back((self.line, text));
        self.current.clear();
    }

    /// Read one more chunk, compacting already-consumed bytes first.
    fn fill(&mut self) -> Result<()> {
        if self.pos >= self.chunk_size {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        let start = self.buf.len();
        self.buf.resize(start + self.chunk_size, 0);
        loop {
            match self.reader.read(&mut self.buf[start..]) {
                Ok(0) => {
                    self.eof = true;
                    self.buf.truncate(start);
                    return Ok(());
                }
                Ok(n) => {
                    self.buf.truncate(start + n);
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(start);
                    let name = self
                        .ctx
                        .filename
                        .clone()
                        .unwrap_or_else(|| "<input>".to_string());
                    return Err(ParseError::io(name, e));
                }
            }
        }
    }
}
