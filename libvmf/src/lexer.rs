//! Phase 2: Tokenizer
//!
//! The tokenizer turns the scanner's byte stream into VMF tokens, one per
//! call. Patterns are tried in priority order:
//! - `"..."` quoted strings (with `\"`, `\\`, `\n`, `\t` unescaped)
//! - numeric literals
//! - identifiers
//! - `{` and `}`
//! - `//` line comments (only emitted when comments are preserved)
//! - newlines and whitespace runs
//!
//! Any other character becomes a single `Unknown` token. Nothing here is
//! fatal except I/O failure and the line limit.

use crate::config::ParserConfig;
use crate::error::{ParseContext, Result};
use crate::scanner::Scanner;
use std::io::Read;

/// Token kind in the tokenizer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Quoted string, unescaped, without the quotes.
    String,
    /// Bare numeric literal.
    Number,
    /// Bare word.
    Identifier,
    BraceOpen,
    BraceClose,
    /// `//` comment; text excludes the slashes.
    Comment,
    Newline,
    Whitespace,
    /// A single character no other pattern accepts.
    Unknown,
}

/// A single token in the token stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }

    /// Whether this token can stand as a key or a value.
    pub fn is_word(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::String | TokenKind::Number | TokenKind::Identifier
        )
    }
}

/// Pull-based tokenizer over any reader.
pub struct Tokenizer<R: Read> {
    scanner: Scanner<R>,
    emit_comments: bool,
}

impl<'a> Tokenizer<&'a [u8]> {
    /// Tokenize an in-memory string with default settings.
    pub fn from_text(text: &'a str) -> Self {
        Self::new(text.as_bytes(), &ParserConfig::default(), None)
    }
}

impl<R: Read> Tokenizer<R> {
    pub fn new(reader: R, config: &ParserConfig, filename: Option<&str>) -> Self {
        Self {
            scanner: Scanner::new(
                reader,
                config.chunk_size,
                config.max_lines,
                ParseContext::new(filename),
            ),
            emit_comments: config.preserve_comments,
        }
    }

    /// Current line, for diagnostics.
    pub fn line(&self) -> usize {
        self.scanner.line()
    }

    pub fn context(&self) -> &ParseContext {
        self.scanner.context()
    }

    /// Recently scanned source lines, for error context.
    pub fn recent_lines(&self) -> Vec<String> {
        self.scanner.recent_lines()
    }

    pub(crate) fn reader_mut(&mut self) -> &mut R {
        self.scanner.get_mut()
    }

    /// Forget buffered input after the reader has been repositioned.
    pub(crate) fn reset(&mut self) {
        self.scanner.reset();
    }

    /// Produce the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            let line = self.scanner.line();
            let b = match self.scanner.peek()? {
                Some(b) => b,
                None => return Ok(None),
            };
            let token = match b {
                b'"' => self.lex_string(line)?,
                b'0'..=b'9' | b'-' | b'.' if self.starts_number()? => self.lex_number(line)?,
                b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                    let mut bytes = Vec::new();
                    self.scanner
                        .bump_while(&mut bytes, |c| c.is_ascii_alphanumeric() || c == b'_')?;
                    Token::new(TokenKind::Identifier, lossy(bytes), line)
                }
                b'{' => {
                    self.scanner.bump()?;
                    Token::new(TokenKind::BraceOpen, "{", line)
                }
                b'}' => {
                    self.scanner.bump()?;
                    Token::new(TokenKind::BraceClose, "}", line)
                }
                b'/' if self.scanner.peek_at(1)? == Some(b'/') => {
                    let comment = self.lex_comment(line)?;
                    if !self.emit_comments {
                        continue;
                    }
                    comment
                }
                b'\n' => {
                    self.scanner.bump()?;
                    Token::new(TokenKind::Newline, "\n", line)
                }
                b'\r' if self.scanner.peek_at(1)? == Some(b'\n') => {
                    self.scanner.bump()?;
                    self.scanner.bump()?;
                    Token::new(TokenKind::Newline, "\n", line)
                }
                b' ' | b'\t' | b'\r' => {
                    let mut bytes = Vec::new();
                    self.scanner.bump_while(&mut bytes, |c| {
                        c == b' ' || c == b'\t' || c == b'\r'
                    })?;
                    // A trailing \r belongs to the next \r\n newline.
                    if bytes.last() == Some(&b'\r') && self.scanner.peek()? == Some(b'\n') {
                        bytes.pop();
                    }
                    Token::new(TokenKind::Whitespace, lossy(bytes), line)
                }
                _ => self.lex_unknown(line)?,
            };
            return Ok(Some(token));
        }
    }

    fn starts_number(&mut self) -> Result<bool> {
        let is_digit = |b: Option<u8>| b.map_or(false, |c| c.is_ascii_digit());
        Ok(match self.scanner.peek()? {
            Some(b'-') => match self.scanner.peek_at(1)? {
                Some(b'.') => is_digit(self.scanner.peek_at(2)?),
                next => is_digit(next),
            },
            Some(b'.') => is_digit(self.scanner.peek_at(1)?),
            next => is_digit(next),
        })
    }

    fn lex_number(&mut self, line: usize) -> Result<Token> {
        let mut bytes = Vec::new();
        if self.scanner.peek()? == Some(b'-') {
            self.scanner.bump()?;
            bytes.push(b'-');
        }
        self.scanner.bump_while(&mut bytes, |c| c.is_ascii_digit())?;
        if self.scanner.peek()? == Some(b'.') {
            self.scanner.bump()?;
            bytes.push(b'.');
            self.scanner.bump_while(&mut bytes, |c| c.is_ascii_digit())?;
        }
        if matches!(self.scanner.peek()?, Some(b'e') | Some(b'E')) {
            let sign = matches!(self.scanner.peek_at(1)?, Some(b'+') | Some(b'-'));
            let digit_at = if sign { 2 } else { 1 };
            if self
                .scanner
                .peek_at(digit_at)?
                .map_or(false, |c| c.is_ascii_digit())
            {
                for _ in 0..digit_at {
                    if let Some(c) = self.scanner.bump()? {
                        bytes.push(c);
                    }
                }
                self.scanner.bump_while(&mut bytes, |c| c.is_ascii_digit())?;
            }
        }
        Ok(Token::new(TokenKind::Number, lossy(bytes), line))
    }

    fn lex_string(&mut self, line: usize) -> Result<Token> {
        self.scanner.bump()?;
        let mut bytes = Vec::new();
        loop {
            match self.scanner.peek()? {
                None | Some(b'\n') => {
                    log::warn!(
                        "Unterminated string{}",
                        self.scanner.context().loc_suffix(line)
                    );
                    break;
                }
                Some(b'"') => {
                    self.scanner.bump()?;
                    break;
                }
                Some(b'\\') => {
                    self.scanner.bump()?;
                    match self.scanner.peek()? {
                        Some(b'"') => bytes.push(b'"'),
                        Some(b'\\') => bytes.push(b'\\'),
                        Some(b'n') => bytes.push(b'\n'),
                        Some(b't') => bytes.push(b'\t'),
                        Some(b'\n') | None => {
                            bytes.push(b'\\');
                            continue;
                        }
                        Some(other) => {
                            bytes.push(b'\\');
                            bytes.push(other);
                        }
                    }
                    self.scanner.bump()?;
                }
                Some(c) => {
                    self.scanner.bump()?;
                    bytes.push(c);
                }
            }
        }
        Ok(Token::new(TokenKind::String, lossy(bytes), line))
    }

    fn lex_comment(&mut self, line: usize) -> Result<Token> {
        self.scanner.bump()?;
        self.scanner.bump()?;
        let mut bytes = Vec::new();
        self.scanner.bump_while(&mut bytes, |c| c != b'\n')?;
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        Ok(Token::new(TokenKind::Comment, lossy(bytes), line))
    }

    /// One character, which may be a multi-byte UTF-8 sequence.
    fn lex_unknown(&mut self, line: usize) -> Result<Token> {
        let mut bytes = Vec::new();
        if let Some(lead) = self.scanner.bump()? {
            bytes.push(lead);
            let width = match lead {
                0xC0..=0xDF => 2,
                0xE0..=0xEF => 3,
                0xF0..=0xF7 => 4,
                _ => 1,
            };
            for _ in 1..width {
                match self.scanner.peek()? {
                    Some(c) if c & 0xC0 == 0x80 => {
                        self.scanner.bump()?;
                        bytes.push(c);
                    }
                    _ => break,
                }
            }
        }
        Ok(Token::new(TokenKind::Unknown, lossy(bytes), line))
    }
}

impl<R: Read> Iterator for Tokenizer<R> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

fn lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<(TokenKind, String)> {
        Tokenizer::from_text(input)
            .map(|t| t.unwrap())
            .filter(|t| t.kind != TokenKind::Whitespace)
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_key_value_line() {
        assert_eq!(
            kinds("\"classname\" \"worldspawn\"\n"),
            vec![
                (TokenKind::String, "classname".to_string()),
                (TokenKind::String, "worldspawn".to_string()),
                (TokenKind::Newline, "\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_block_tokens() {
        let toks = kinds("world\n{\n}\n");
        assert_eq!(toks[0], (TokenKind::Identifier, "world".to_string()));
        assert_eq!(toks[2].0, TokenKind::BraceOpen);
        assert_eq!(toks[4].0, TokenKind::BraceClose);
    }

    #[test]
    fn test_words() {
        let words: Vec<bool> = Tokenizer::from_text("\"a\" 1 b { - }")
            .map(|t| t.unwrap())
            .filter(|t| t.kind != TokenKind::Whitespace)
            .map(|t| t.is_word())
            .collect();
        assert_eq!(words, vec![true, true, true, false, false, false]);
    }

    #[test]
    fn test_string_escapes() {
        let toks = kinds(r#""a\"b\\c\nd\te\q""#);
        assert_eq!(toks[0].1, "a\"b\\c\nd\te\\q");
    }

    #[test]
    fn test_numbers() {
        let toks = kinds("12 -3.5 .25 1e10 -2.5E-3 7.");
        let texts: Vec<_> = toks.iter().map(|t| t.1.as_str()).collect();
        assert_eq!(texts, vec!["12", "-3.5", ".25", "1e10", "-2.5E-3", "7."]);
        assert!(toks.iter().all(|t| t.0 == TokenKind::Number));
    }

    #[test]
    fn test_lone_minus_is_unknown() {
        let toks = kinds("- x");
        assert_eq!(toks[0], (TokenKind::Unknown, "-".to_string()));
        assert_eq!(toks[1].0, TokenKind::Identifier);
    }

    #[test]
    fn test_comments_dropped_by_default() {
        let toks = kinds("// hello\nworld");
        assert_eq!(toks[0].0, TokenKind::Newline);
        assert_eq!(toks[1].1, "world");
    }

    #[test]
    fn test_comments_preserved() {
        let config = ParserConfig::default().with_preserve_comments(true);
        let mut t = Tokenizer::new(&b"// hello\n"[..], &config, None);
        let tok = t.next_token().unwrap().unwrap();
        assert_eq!(tok.kind, TokenKind::Comment);
        assert_eq!(tok.text, " hello");
    }

    #[test]
    fn test_crlf_newlines() {
        let toks = kinds("a\r\nb \r\n");
        assert_eq!(toks[1].0, TokenKind::Newline);
        assert_eq!(toks[3].0, TokenKind::Newline);
        assert_eq!(toks.len(), 4);
    }

    #[test]
    fn test_unknown_multibyte_char() {
        let toks = kinds("é");
        assert_eq!(toks, vec![(TokenKind::Unknown, "é".to_string())]);
    }

    #[test]
    fn test_line_numbers() {
        let toks: Vec<Token> = Tokenizer::from_text("a\nb\n\nc").map(|t| t.unwrap()).collect();
        let c = toks.iter().find(|t| t.text == "c").unwrap();
        assert_eq!(c.line, 4);
    }

    #[test]
    fn test_token_spans_chunk_boundary() {
        let config = ParserConfig::default().with_chunk_size(3);
        let toks: Vec<Token> = Tokenizer::new(&b"\"longer string\" 12345"[..], &config, None)
            .map(|t| t.unwrap())
            .collect();
        assert_eq!(toks[0].text, "longer string");
        assert_eq!(toks[2].text, "12345");
    }

    #[test]
    fn test_unterminated_string_stops_at_newline() {
        let toks = kinds("\"abc\n}");
        assert_eq!(toks[0], (TokenKind::String, "abc".to_string()));
        assert_eq!(toks[1].0, TokenKind::Newline);
        assert_eq!(toks[2].0, TokenKind::BraceClose);
    }
}
