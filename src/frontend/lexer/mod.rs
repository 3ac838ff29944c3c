//! Lexer module
//!
//! `#` starts a comment that runs to the end of the line. A `\` directly
//! before a newline (or at the very end of the text) joins the two lines, so
//! continuation markers kept by the input assembler read as whitespace.

pub mod tokens;

pub use tokens::{Token, TokenKind};
pub use tokenizer::tokenize;

use crate::util::diagnostic::LogEntry;
use crate::util::span::Span;

/// Lexer error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("unexpected character '{ch}'")]
    UnexpectedChar { ch: char, span: Span },
    #[error("unterminated string")]
    UnterminatedString { span: Span },
    #[error("invalid escape sequence '\\{sequence}'")]
    InvalidEscape { sequence: char, span: Span },
    #[error("integer literal '{text}' out of range")]
    InvalidNumber { text: String, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::InvalidEscape { span, .. }
            | LexError::InvalidNumber { span, .. } => *span,
        }
    }
}

impl From<LexError> for LogEntry {
    fn from(err: LexError) -> Self {
        LogEntry::error(err.to_string(), Some(err.span()))
    }
}

/// Tokenize source code
mod tokenizer {
    use super::*;
    use crate::util::span::Position;
    use std::iter::Peekable;
    use std::str::Chars;

    /// Scan the whole text, collecting every error instead of stopping at
    /// the first one.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();

        while let Some(token) = lexer.next_token() {
            tokens.push(token);
        }

        if lexer.errors.is_empty() {
            Ok(tokens)
        } else {
            Err(lexer.errors)
        }
    }

    struct Lexer<'a> {
        chars: Peekable<Chars<'a>>,
        offset: usize,
        line: usize,
        column: usize,
        start: Position,
        errors: Vec<LexError>,
    }

    impl<'a> Lexer<'a> {
        fn new(source: &'a str) -> Self {
            Self {
                chars: source.chars().peekable(),
                offset: 0,
                line: 1,
                column: 1,
                start: Position::with_offset(1, 1, 0),
                errors: Vec::new(),
            }
        }

        fn position(&self) -> Position {
            Position::with_offset(self.line, self.column, self.offset)
        }

        /// Span from the token start to the last consumed character
        fn span(&self) -> Span {
            let end = Position::with_offset(
                self.line,
                self.column.saturating_sub(1).max(1),
                self.offset,
            );
            if end.line == self.start.line && end.column <= self.start.column {
                Span::point(self.start)
            } else {
                Span::new(self.start, end)
            }
        }

        fn advance(&mut self) -> Option<char> {
            let c = self.chars.next()?;
            self.offset += c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            Some(c)
        }

        fn peek(&mut self) -> Option<char> {
            self.chars.peek().copied()
        }

        fn peek_next(&self) -> Option<char> {
            self.chars.clone().nth(1)
        }

        fn make_token(
            &self,
            kind: TokenKind,
        ) -> Token {
            Token::new(kind, self.span())
        }

        /// Skip blanks, comments and line joins. Newlines are tokens.
        fn skip_trivia(&mut self) {
            while let Some(c) = self.peek() {
                match c {
                    ' ' | '\t' | '\r' => {
                        self.advance();
                    }
                    '#' => {
                        while let Some(c) = self.peek() {
                            if c == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    }
                    '\\' if self.is_line_join() => {
                        self.advance();
                        if self.peek() == Some('\r') {
                            self.advance();
                        }
                        if self.peek() == Some('\n') {
                            self.advance();
                        }
                    }
                    _ => break,
                }
            }
        }

        /// `\` followed by a newline, `\r\n`, or the end of input
        fn is_line_join(&self) -> bool {
            let mut rest = self.chars.clone();
            rest.next();
            match rest.next() {
                None | Some('\n') => true,
                Some('\r') => matches!(rest.next(), None | Some('\n')),
                Some(_) => false,
            }
        }

        fn next_token(&mut self) -> Option<Token> {
            self.skip_trivia();
            self.start = self.position();

            let c = self.advance()?;
            let token = match c {
                '\n' | ';' => Token::new(TokenKind::Newline, Span::point(self.start)),
                '(' => self.make_token(TokenKind::LParen),
                ')' => self.make_token(TokenKind::RParen),
                '"' => match self.scan_string() {
                    Some(token) => token,
                    None => return self.next_token(),
                },
                '-' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.scan_number(c),
                c if c.is_ascii_digit() => self.scan_number(c),
                c if is_identifier_start(c) => self.scan_word(c),
                c => {
                    self.errors.push(LexError::UnexpectedChar {
                        ch: c,
                        span: self.span(),
                    });
                    return self.next_token();
                }
            };
            Some(token)
        }

        fn scan_word(
            &mut self,
            first: char,
        ) -> Token {
            let mut value = String::new();
            value.push(first);
            while let Some(c) = self.peek() {
                if !is_identifier_char(c) {
                    break;
                }
                value.push(c);
                self.advance();
            }
            self.make_token(TokenKind::Word(value))
        }

        fn scan_number(
            &mut self,
            first: char,
        ) -> Token {
            let mut value = String::new();
            value.push(first);
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    value.push(c);
                    self.advance();
                } else if c == '_' && self.peek_next().is_some_and(|n| n.is_ascii_digit()) {
                    self.advance();
                } else {
                    break;
                }
            }

            match value.parse::<i64>() {
                Ok(n) => self.make_token(TokenKind::Int(n)),
                Err(_) => {
                    self.errors.push(LexError::InvalidNumber {
                        text: value,
                        span: self.span(),
                    });
                    self.make_token(TokenKind::Int(0))
                }
            }
        }

        fn scan_string(&mut self) -> Option<Token> {
            let mut value = String::new();

            while let Some(c) = self.peek() {
                match c {
                    '"' => {
                        self.advance();
                        return Some(self.make_token(TokenKind::Str(value)));
                    }
                    '\\' => {
                        self.advance();
                        let escape_start = self.position();
                        match self.advance() {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some('r') => value.push('\r'),
                            Some('\\') => value.push('\\'),
                            Some('"') => value.push('"'),
                            Some('0') => value.push('\0'),
                            // Escaped line break joins the lines
                            Some('\n') => {}
                            Some(other) => self.errors.push(LexError::InvalidEscape {
                                sequence: other,
                                span: Span::point(escape_start),
                            }),
                            None => break,
                        }
                    }
                    '\n' => break,
                    c => {
                        value.push(c);
                        self.advance();
                    }
                }
            }

            self.errors.push(LexError::UnterminatedString {
                span: Span::point(self.start),
            });
            None
        }
    }

    fn is_identifier_start(c: char) -> bool {
        c == '_' || unicode_ident::is_xid_start(c)
    }

    fn is_identifier_char(c: char) -> bool {
        c == '-' || c == '?' || c == '!' || unicode_ident::is_xid_continue(c)
    }
}
