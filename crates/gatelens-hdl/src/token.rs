//! A cursor over pre-lexed tokens.
//!
//! Parsers lex a file into [`Token`]s themselves and then walk them with a
//! [`TokenStream`]. The stream knows which tokens open and close a nesting
//! level (brackets, `begin`/`end`, ...) so that scans can skip over nested
//! groups. All state is the cursor position, which can be saved with
//! [`position`](TokenStream::position) and restored with
//! [`set_position`](TokenStream::set_position) to backtrack.

use std::fmt;

use crate::error::HdlError;

/// One lexeme and the source line it started on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub line: u32,
    pub string: String,
}

impl Token {
    pub fn new(line: u32, string: impl Into<String>) -> Self {
        Self {
            line,
            string: string.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.string
    }
}

impl PartialEq<str> for Token {
    fn eq(&self, other: &str) -> bool {
        self.string == other
    }
}

impl PartialEq<&str> for Token {
    fn eq(&self, other: &&str) -> bool {
        self.string == *other
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string)
    }
}

/// Token sequence with a read cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStream {
    tokens: Vec<Token>,
    increase_level: Vec<String>,
    decrease_level: Vec<String>,
    pos: usize,
}

impl TokenStream {
    /// Create a stream. Tokens in `increase_level` open a nesting level and
    /// tokens in `decrease_level` close one.
    pub fn new<I, D>(tokens: Vec<Token>, increase_level: I, decrease_level: D) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            tokens,
            increase_level: increase_level.into_iter().map(Into::into).collect(),
            decrease_level: decrease_level.into_iter().map(Into::into).collect(),
            pos: 0,
        }
    }

    /// A stream nesting on `(`, `[` and `{`.
    pub fn with_brackets(tokens: Vec<Token>) -> Self {
        Self::new(tokens, ["(", "[", "{"], [")", "]", "}"])
    }

    /// Token `offset` places after the cursor.
    pub fn peek(&self, offset: usize) -> Result<&Token, HdlError> {
        let index = self.pos.saturating_add(offset);
        self.tokens
            .get(index)
            .ok_or_else(|| self.syntax_error("unexpected end of input"))
    }

    /// Token at an absolute index.
    pub fn at(&self, index: usize) -> Result<&Token, HdlError> {
        self.tokens
            .get(index)
            .ok_or_else(|| self.syntax_error(format!("no token at index {index}")))
    }

    /// Take the next token.
    pub fn consume(&mut self) -> Result<Token, HdlError> {
        let token = self.peek(0)?.clone();
        self.pos += 1;
        Ok(token)
    }

    /// Take the next `n` tokens. Nothing is consumed if fewer remain.
    pub fn consume_n(&mut self, n: usize) -> Result<Vec<Token>, HdlError> {
        if n > self.remaining() {
            return Err(self.syntax_error(format!(
                "expected {n} more tokens, only {} left",
                self.remaining()
            )));
        }
        let taken = self.tokens[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Ok(taken)
    }

    /// Take the next token, which must equal `expected`.
    pub fn consume_expected(&mut self, expected: &str) -> Result<Token, HdlError> {
        let next = self.peek(0).map_err(|_| {
            self.syntax_error(format!("expected '{expected}', reached end of input"))
        })?;
        if next != expected {
            return Err(self.syntax_error(format!("expected '{expected}', got '{next}'")));
        }
        self.consume()
    }

    /// Take the next token if it equals `expected`.
    pub fn consume_if(&mut self, expected: &str) -> bool {
        match self.tokens.get(self.pos) {
            Some(t) if t == expected => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    /// Advance to the next `end` token without consuming it, or to the end
    /// of the stream if there is none. Returns the number of tokens skipped.
    pub fn consume_until(&mut self, end: &str, level_aware: bool) -> usize {
        let target = self.find_next(end, level_aware).unwrap_or(self.tokens.len());
        let skipped = target - self.pos;
        self.pos = target;
        skipped
    }

    /// Split off the tokens before the next `end` as their own stream.
    ///
    /// The cursor stops on `end`. The sub-stream shares this stream's nesting
    /// tokens.
    pub fn extract_until(&mut self, end: &str, level_aware: bool) -> TokenStream {
        let start = self.pos;
        self.consume_until(end, level_aware);
        TokenStream {
            tokens: self.tokens[start..self.pos].to_vec(),
            increase_level: self.increase_level.clone(),
            decrease_level: self.decrease_level.clone(),
            pos: 0,
        }
    }

    /// Join the tokens before the next `end` into one token.
    ///
    /// The result carries the line of the first joined token. The cursor
    /// stops on `end`.
    pub fn join_until(&mut self, end: &str, joiner: &str) -> Result<Token, HdlError> {
        let line = self.peek(0)?.line;
        let start = self.pos;
        self.consume_until(end, false);
        Ok(Token::new(line, self.join_range(start, self.pos, joiner)))
    }

    /// Join all remaining tokens into one token.
    pub fn join_all(&mut self, joiner: &str) -> Result<Token, HdlError> {
        let line = self.peek(0)?.line;
        let start = self.pos;
        self.pos = self.tokens.len();
        Ok(Token::new(line, self.join_range(start, self.pos, joiner)))
    }

    /// Absolute index of the next `expected` at or after the cursor.
    ///
    /// With `level_aware`, only tokens at the cursor's nesting level match.
    pub fn find_next(&self, expected: &str, level_aware: bool) -> Option<usize> {
        let mut level: isize = 0;
        for (index, token) in self.tokens.iter().enumerate().skip(self.pos) {
            if (!level_aware || level == 0) && token == expected {
                return Some(index);
            }
            if level_aware {
                if self.increase_level.iter().any(|t| token == t.as_str()) {
                    level += 1;
                } else if self.decrease_level.iter().any(|t| token == t.as_str()) {
                    level -= 1;
                }
            }
        }
        None
    }

    /// Tokens left after the cursor.
    pub fn remaining(&self) -> usize {
        self.tokens.len().saturating_sub(self.pos)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor, typically back to a saved [`position`](Self::position).
    pub fn set_position(&mut self, position: usize) -> Result<(), HdlError> {
        if position > self.tokens.len() {
            return Err(self.syntax_error(format!(
                "position {position} is beyond the {} available tokens",
                self.tokens.len()
            )));
        }
        self.pos = position;
        Ok(())
    }

    /// Total number of tokens.
    pub fn size(&self) -> usize {
        self.tokens.len()
    }

    /// A syntax error located at the cursor.
    pub fn syntax_error(&self, message: impl Into<String>) -> HdlError {
        let line = self
            .tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |t| t.line);
        HdlError::syntax(line, self.pos, message)
    }

    fn join_range(&self, start: usize, end: usize, joiner: &str) -> String {
        self.tokens[start..end]
            .iter()
            .map(Token::as_str)
            .collect::<Vec<_>>()
            .join(joiner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(src: &str) -> TokenStream {
        let tokens = src
            .lines()
            .enumerate()
            .flat_map(|(i, line)| {
                line.split_whitespace()
                    .map(move |w| Token::new(i as u32 + 1, w))
            })
            .collect();
        TokenStream::with_brackets(tokens)
    }

    #[test]
    fn peek_and_consume() {
        let mut ts = stream("module top ;");
        assert_eq!(ts.peek(1).unwrap(), &"top");
        assert_eq!(ts.consume().unwrap(), "module");
        assert_eq!(ts.remaining(), 2);
        assert!(ts.consume_if("top"));
        assert!(!ts.consume_if("top"));
        ts.consume_expected(";").unwrap();
        assert!(ts.is_exhausted());
        assert!(ts.consume().is_err());
    }

    #[test]
    fn expected_mismatch_reports_location() {
        let mut ts = stream("module top\n( a ) ;");
        ts.consume_n(2).unwrap();
        match ts.consume_expected(";").unwrap_err() {
            HdlError::Syntax { line, position, message } => {
                assert_eq!(line, 2);
                assert_eq!(position, 2);
                assert!(message.contains("'('"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(ts.position(), 2);
    }

    #[test]
    fn consume_n_is_all_or_nothing() {
        let mut ts = stream("a b");
        assert!(ts.consume_n(3).is_err());
        assert_eq!(ts.position(), 0);
        assert_eq!(ts.consume_n(2).unwrap().len(), 2);
    }

    #[test]
    fn level_aware_scanning() {
        let ts = stream("f ( a , ( b , c ) ) , d");
        assert_eq!(ts.find_next(",", false), Some(3));
        assert_eq!(ts.find_next(",", true), Some(10));
    }

    #[test]
    fn extract_until_builds_sub_stream() {
        let mut ts = stream("( a , b ) ; rest");
        ts.consume_expected("(").unwrap();
        let mut inner = ts.extract_until(")", true);
        assert_eq!(inner.size(), 3);
        assert_eq!(ts.consume().unwrap(), ")");
        assert_eq!(inner.join_all("").unwrap().string, "a,b");
    }

    #[test]
    fn join_until_keeps_first_line() {
        let mut ts = stream("4'b\n1010 ;");
        let joined = ts.join_until(";", "").unwrap();
        assert_eq!(joined, Token::new(1, "4'b1010"));
        assert_eq!(ts.peek(0).unwrap(), &";");
    }

    #[test]
    fn consume_until_missing_end_goes_to_end() {
        let mut ts = stream("a b c");
        assert_eq!(ts.consume_until("x", true), 3);
        assert!(ts.is_exhausted());
    }

    #[test]
    fn backtracking() {
        let mut ts = stream("a b c");
        let saved = ts.position();
        ts.consume_n(2).unwrap();
        ts.set_position(saved).unwrap();
        assert_eq!(ts.consume().unwrap(), "a");
        assert!(ts.set_position(4).is_err());
    }
}
