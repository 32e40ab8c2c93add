//! Lexer for QGraphic source text.
//!
//! Turns a UTF-8 source string into a flat token stream terminated by a
//! single [`TokenKind::Eof`] token. Comments are `% ... %` blocks (not
//! nested) and whitespace is insignificant everywhere, including between
//! call arguments and tuple components.

use std::{fmt, path::Path, rc::Rc};

use crate::exception::Exception;

/// Reserved words. Everything else matching `[A-Za-z_][A-Za-z0-9_]*` is an
/// identifier.
pub const KEYWORDS: &[&str] = &[
    "Frame", "int", "color", "pixel", "bool", "string", "list", "None", "true", "false", "none", "Do", "Publish",
    "Send", "return", "While", "For", "in", "if", "and", "or", "xor", "not",
];

/// Two-character symbols, matched before the single-character set.
const MULTI_CHAR: &[&str] = &["!?", "==", "<=", ">=", "->", "=>"];

/// Single-character symbols.
const SINGLE_CHAR: &str = "(){}[]<>:.,?!=+-*|&~";

/// Classification of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Integer literal; the value is [`TokenValue::Int`].
    Int,
    /// String literal (escapes already resolved).
    Str,
    /// Identifier.
    Ident,
    /// Reserved keyword from [`KEYWORDS`].
    Kw,
    /// Operator or punctuation symbol.
    Sym,
    /// End-of-input marker, emitted exactly once.
    Eof,
}

/// Payload of a token: an integer for `Int` tokens, text for all others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValue {
    Int(i64),
    Text(Rc<str>),
}

/// One lexed token with its 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    pub line: u32,
    pub column: u32,
}

impl Token {
    /// The textual payload, or `""` for integer tokens.
    #[must_use]
    pub fn text(&self) -> &str {
        match &self.value {
            TokenValue::Text(text) => text,
            TokenValue::Int(_) => "",
        }
    }

    /// True when this token's symbolic text is `text`.
    ///
    /// String literals never match: a string token whose *content* happens
    /// to be `"}"` must not be confused with the closing-brace symbol.
    #[must_use]
    pub fn is(&self, text: &str) -> bool {
        self.kind != TokenKind::Str && self.kind != TokenKind::Int && self.text() == text
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            TokenValue::Int(value) => write!(f, "{value}"),
            TokenValue::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Lexes a `.qgk` file.
pub fn lex_file(path: &Path) -> Result<Vec<Token>, Exception> {
    let source = std::fs::read_to_string(path)
        .map_err(|err| Exception::runtime(format!("failed to read {}: {err}", path.display())))?;
    lex_source(&source)
}

/// Lexes QGraphic source text into tokens.
///
/// # Errors
/// Returns a `LexError` exception carrying the line and column of the first
/// unexpected character.
pub fn lex_source(source: &str) -> Result<Vec<Token>, Exception> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn push(&mut self, kind: TokenKind, value: TokenValue, line: u32, column: u32) {
        self.tokens.push(Token { kind, value, line, column });
    }

    fn run(mut self) -> Result<Vec<Token>, Exception> {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
                continue;
            }
            if ch == '%' {
                self.skip_comment();
                continue;
            }

            let (line, column) = (self.line, self.column);

            if ch == '"' || ch == '\'' {
                let text = self.lex_string(ch);
                self.push(TokenKind::Str, TokenValue::Text(text), line, column);
                continue;
            }
            if ch.is_ascii_digit() {
                let value = self.lex_int(line, column)?;
                self.push(TokenKind::Int, TokenValue::Int(value), line, column);
                continue;
            }
            if ch.is_ascii_alphabetic() || ch == '_' {
                let text = self.lex_word();
                let kind = if KEYWORDS.contains(&&*text) { TokenKind::Kw } else { TokenKind::Ident };
                self.push(kind, TokenValue::Text(Rc::from(text)), line, column);
                continue;
            }
            if let Some(sym) = self.match_multi_char() {
                self.push(TokenKind::Sym, TokenValue::Text(Rc::from(sym)), line, column);
                continue;
            }
            if SINGLE_CHAR.contains(ch) {
                self.bump();
                let mut sym = String::with_capacity(1);
                sym.push(ch);
                self.push(TokenKind::Sym, TokenValue::Text(Rc::from(sym)), line, column);
                continue;
            }

            return Err(Exception::lex(format!("unexpected character {ch:?}"), line, column));
        }

        let (line, column) = (self.line, self.column);
        self.push(TokenKind::Eof, TokenValue::Text(Rc::from("EOF")), line, column);
        Ok(self.tokens)
    }

    /// Skips a `% ... %` comment block. An unterminated comment silently
    /// runs to the end of input.
    fn skip_comment(&mut self) {
        self.bump();
        while let Some(ch) = self.peek() {
            self.bump();
            if ch == '%' {
                return;
            }
        }
    }

    /// Lexes a quoted string after seeing the opening quote.
    ///
    /// Recognised escapes are `\n \t \r \\ \" \'`; an unknown escape keeps
    /// the following character verbatim. An unterminated string ends at the
    /// end of input without error.
    fn lex_string(&mut self, quote: char) -> Rc<str> {
        self.bump();
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch == '\\' {
                self.bump();
                if let Some(escaped) = self.peek() {
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                    self.bump();
                }
                continue;
            }
            self.bump();
            if ch == quote {
                break;
            }
            text.push(ch);
        }
        Rc::from(text)
    }

    fn lex_int(&mut self, line: u32, column: u32) -> Result<i64, Exception> {
        let mut digits = String::new();
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            digits.push(ch);
            self.bump();
        }
        digits
            .parse()
            .map_err(|_| Exception::lex(format!("integer literal {digits} is too large"), line, column))
    }

    fn lex_word(&mut self) -> String {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_alphanumeric() && ch != '_' {
                break;
            }
            text.push(ch);
            self.bump();
        }
        text
    }

    fn match_multi_char(&mut self) -> Option<&'static str> {
        let first = self.peek()?;
        let second = self.peek_at(1);
        for sym in MULTI_CHAR {
            let mut chars = sym.chars();
            if chars.next() == Some(first) && chars.next() == second {
                self.bump();
                self.bump();
                return Some(sym);
            }
        }
        None
    }
}
