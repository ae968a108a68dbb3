//! Hand-written lexer for one input line.
//!
//! Lexical rules:
//! - Input is 8-bit ASCII; the only whitespace is the space byte `0x20`.
//! - Identifiers are `[A-Za-z][A-Za-z0-9_]*`, at most 255 bytes; reserved
//!   keywords never lex as identifiers.
//! - String literals are double-quoted with no escapes; the body is
//!   printable ASCII except `"`, at most 65,535 bytes.
//! - `->` is a single token; a bare `-` is an error.
//! - `***` is the program terminator.
//! - `//` starts a comment that runs to end of line. A comment is valid
//!   only at the very start of the line or after at least one non-space
//!   byte; a comment preceded by nothing but spaces is an error.
//!
//! On any error the rest of the line is consumed, so a line produces at
//! most one error.

use warden_core::limits::{MAX_IDENTIFIER_BYTES, MAX_STRING_BYTES};

use crate::parser::ParseError;
use crate::token::{keyword, Token};

pub(crate) struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(line: &'a str) -> Self {
        Lexer {
            input: line.as_bytes(),
            pos: 0,
        }
    }

    /// Produce the next token. After [`Token::End`] every further call
    /// returns `End` again.
    pub(crate) fn next(&mut self) -> Result<Token, ParseError> {
        loop {
            let Some(c) = self.bump() else {
                return Ok(Token::End);
            };
            match c {
                b' ' => continue,
                b'"' => return self.string(),
                b'[' => return Ok(Token::LBracket),
                b']' => return Ok(Token::RBracket),
                b'{' => return Ok(Token::LBrace),
                b'}' => return Ok(Token::RBrace),
                b'(' => return Ok(Token::LParen),
                b')' => return Ok(Token::RParen),
                b'=' => return Ok(Token::Equals),
                b'.' => return Ok(Token::Dot),
                b',' => return Ok(Token::Comma),
                b'-' => {
                    return if self.bump() == Some(b'>') {
                        Ok(Token::Arrow)
                    } else {
                        Err(self.fail("'-' is not a token; expected '->'"))
                    };
                }
                b'/' => {
                    if self.bump() != Some(b'/') {
                        return Err(self.fail("'/' is not a token; expected '//'"));
                    }
                    return self.comment();
                }
                b'*' => {
                    return if self.accept(b"**") {
                        Ok(Token::Terminate)
                    } else {
                        Err(self.fail("unexpected byte '*'"))
                    };
                }
                c if c.is_ascii_alphabetic() => {
                    self.pos -= 1;
                    return self.identifier();
                }
                c => {
                    let msg = if (0x21..=0x7e).contains(&c) {
                        format!("unexpected byte '{}'", c as char)
                    } else {
                        format!("unexpected byte 0x{c:02x}")
                    };
                    return Err(self.fail(msg));
                }
            }
        }
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.input.get(self.pos).copied()?;
        self.pos += 1;
        Some(c)
    }

    fn accept(&mut self, expected: &[u8]) -> bool {
        if self.input[self.pos..].starts_with(expected) {
            self.pos += expected.len();
            true
        } else {
            false
        }
    }

    /// Consume the rest of the line and build an error. One error per line.
    fn fail(&mut self, message: impl Into<String>) -> ParseError {
        self.pos = self.input.len();
        ParseError::Lex {
            message: message.into(),
        }
    }

    /// Read a string literal body; the opening quote is already consumed.
    fn string(&mut self) -> Result<Token, ParseError> {
        let input = self.input;
        let start = self.pos;
        let rest = &input[start..];
        let Some(len) = rest.iter().position(|&b| b == b'"') else {
            return Err(self.fail("unterminated string"));
        };
        let body = &rest[..len];
        if body.len() > MAX_STRING_BYTES {
            return Err(self.fail("string exceeds length limit"));
        }
        if !body.iter().all(|&b| (0x20..=0x7e).contains(&b)) {
            return Err(self.fail("string contains a non-printable byte"));
        }
        self.pos = start + len + 1;
        // body is printable ASCII, checked above
        let s = std::str::from_utf8(body).expect("ascii").to_string();
        Ok(Token::Str(s))
    }

    fn identifier(&mut self) -> Result<Token, ParseError> {
        let input = self.input;
        let start = self.pos;
        while input
            .get(self.pos)
            .is_some_and(|&b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }
        let word = &input[start..self.pos];
        if word.len() > MAX_IDENTIFIER_BYTES {
            return Err(self.fail("identifier exceeds length limit"));
        }
        let word = std::str::from_utf8(word).expect("ascii");
        Ok(keyword(word).unwrap_or_else(|| Token::Ident(word.to_string())))
    }

    /// Validate and consume a comment; both slashes are already consumed.
    ///
    /// The slashes start at `self.pos - 2`. The comment is valid at the very
    /// start of the line, or when at least one non-space byte precedes it.
    fn comment(&mut self) -> Result<Token, ParseError> {
        let slashes = self.pos - 2;
        let valid = slashes == 0 || self.input[..slashes].iter().any(|&b| b != b' ');
        if !valid {
            return Err(self.fail("comment preceded only by whitespace"));
        }
        self.pos = self.input.len();
        Ok(Token::Comment)
    }
}
