//! Tokenizer for assertion bodies.
//!
//! Newlines inside brackets are insignificant, so a logical line ends only at
//! a newline (or `;`) at bracket depth zero.

use num_bigint::BigInt;

use crate::parser::ParseError;

/// Token payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Int(BigInt),
    Float(f64),
    Str(String),
    Punct(&'static str),
    Newline,
    Eof,
}

/// A token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based line.
    pub line: usize,
    /// 0-based column.
    pub column: usize,
    /// First token of a physical line outside any bracket.
    pub line_start: bool,
}

const PUNCT_3: &[&str] = &["**=", "//=", ">>=", "<<=", "..."];
const PUNCT_2: &[&str] = &[
    "**", "//", "==", "!=", "<=", ">=", "<<", ">>", "->", ":=", "+=", "-=", "*=", "/=", "%=",
    "&=", "|=", "^=", "@=",
];
const PUNCT_1: &[&str] = &[
    "+", "-", "*", "/", "%", "<", ">", "=", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";",
    "~", "&", "|", "^", "@",
];

/// Tokenize a whole source text.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    depth: usize,
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 0,
            depth: 0,
            at_line_start: true,
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
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, line: usize, column: usize) {
        let line_start = self.at_line_start && self.depth == 0;
        self.at_line_start = false;
        self.tokens.push(Token {
            kind,
            line,
            column,
            line_start,
        });
    }

    fn push_newline(&mut self) {
        let needs = matches!(self.tokens.last(), Some(t) if t.kind != TokenKind::Newline);
        if needs {
            self.tokens.push(Token {
                kind: TokenKind::Newline,
                line: self.line,
                column: self.column,
                line_start: false,
            });
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        while let Some(c) = self.peek() {
            match c {
                '\n' => {
                    self.bump();
                    if self.depth == 0 {
                        self.push_newline();
                    }
                    self.at_line_start = true;
                }
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.bump();
                }
                '#' => {
                    while matches!(self.peek(), Some(ch) if ch != '\n') {
                        self.bump();
                    }
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                '"' | '\'' => self.string(false)?,
                c if c.is_ascii_digit() => self.number()?,
                '.' if matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()) => self.number()?,
                c if c.is_alphabetic() || c == '_' => self.name()?,
                _ => self.punct()?,
            }
        }
        if self.depth > 0 {
            return Err(ParseError::UnbalancedBracket { line: self.line });
        }
        self.push_newline();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            line: self.line,
            column: self.column,
            line_start: false,
        });
        Ok(self.tokens)
    }

    fn name(&mut self) -> Result<(), ParseError> {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_alphanumeric() || ch == '_') {
            self.bump();
        }
        let text: String = self.chars[start..self.pos].iter().collect();

        // String prefixes.
        if matches!(self.peek(), Some('"') | Some('\'')) && text.len() <= 2 {
            let lower = text.to_ascii_lowercase();
            match lower.as_str() {
                "r" => return self.string_at(true, line, column),
                "u" => return self.string_at(false, line, column),
                "b" | "f" | "rb" | "br" | "fr" | "rf" => {
                    return Err(ParseError::Unsupported {
                        construct: format!("{}-prefixed string literal", text),
                        line,
                    });
                }
                _ => {}
            }
        }

        self.push(TokenKind::Name(text), line, column);
        Ok(())
    }

    fn number(&mut self) -> Result<(), ParseError> {
        let (line, column) = (self.line, self.column);
        let start = self.pos;

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B')) {
            self.bump();
            let radix = match self.bump() {
                Some('x' | 'X') => 16,
                Some('o' | 'O') => 8,
                _ => 2,
            };
            let digits_start = self.pos;
            while matches!(self.peek(), Some(ch) if ch.is_ascii_alphanumeric() || ch == '_') {
                self.bump();
            }
            let digits: String = self.chars[digits_start..self.pos]
                .iter()
                .filter(|c| **c != '_')
                .collect();
            let text: String = self.chars[start..self.pos].iter().collect();
            let value = BigInt::parse_bytes(digits.as_bytes(), radix)
                .ok_or(ParseError::InvalidNumber { text, line })?;
            self.push(TokenKind::Int(value), line, column);
            return Ok(());
        }

        let mut is_float = false;
        self.digits();
        if self.peek() == Some('.') && self.peek_at(1) != Some('.') {
            is_float = true;
            self.bump();
            self.digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if matches!(self.peek_at(digit_at), Some(d) if d.is_ascii_digit()) {
                is_float = true;
                self.bump();
                if sign {
                    self.bump();
                }
                self.digits();
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if matches!(self.peek(), Some('j' | 'J')) {
            return Err(ParseError::Unsupported {
                construct: "complex literal".to_string(),
                line,
            });
        }

        let cleaned: String = text.chars().filter(|c| *c != '_').collect();
        let kind = if is_float {
            TokenKind::Float(
                cleaned
                    .parse()
                    .map_err(|_| ParseError::InvalidNumber { text: text.clone(), line })?,
            )
        } else {
            TokenKind::Int(
                cleaned
                    .parse::<BigInt>()
                    .map_err(|_| ParseError::InvalidNumber { text: text.clone(), line })?,
            )
        };
        self.push(kind, line, column);
        Ok(())
    }

    fn digits(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit() || ch == '_') {
            self.bump();
        }
    }

    fn string(&mut self, raw: bool) -> Result<(), ParseError> {
        let (line, column) = (self.line, self.column);
        self.string_at(raw, line, column)
    }

    fn string_at(&mut self, raw: bool, line: usize, column: usize) -> Result<(), ParseError> {
        let quote = self.bump().ok_or(ParseError::UnterminatedString { line })?;
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut text = String::new();
        loop {
            let c = self.bump().ok_or(ParseError::UnterminatedString { line })?;
            if c == quote {
                if !triple {
                    break;
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.bump();
                    self.bump();
                    break;
                }
                text.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(ParseError::UnterminatedString { line });
            }
            if c == '\\' && !raw {
                let escaped = self.bump().ok_or(ParseError::UnterminatedString { line })?;
                match escaped {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    'r' => text.push('\r'),
                    '0' => text.push('\0'),
                    '\\' => text.push('\\'),
                    '\'' => text.push('\''),
                    '"' => text.push('"'),
                    '\n' => {}
                    'x' => text.push(self.hex_escape(2, line)?),
                    'u' => text.push(self.hex_escape(4, line)?),
                    other => {
                        text.push('\\');
                        text.push(other);
                    }
                }
                continue;
            }
            text.push(c);
        }

        self.push(TokenKind::Str(text), line, column);
        Ok(())
    }

    fn hex_escape(&mut self, width: usize, line: usize) -> Result<char, ParseError> {
        let mut digits = String::new();
        for _ in 0..width {
            match self.bump() {
                Some(d) if d.is_ascii_hexdigit() => digits.push(d),
                _ => return Err(ParseError::InvalidEscape { line }),
            }
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or(ParseError::InvalidEscape { line })
    }

    fn punct(&mut self) -> Result<(), ParseError> {
        let (line, column) = (self.line, self.column);
        let rest: String = self.chars[self.pos..self.chars.len().min(self.pos + 3)]
            .iter()
            .collect();

        let matched = PUNCT_3
            .iter()
            .chain(PUNCT_2.iter())
            .chain(PUNCT_1.iter())
            .find(|p| rest.starts_with(**p))
            .copied();

        let Some(punct) = matched else {
            let ch = self.peek().unwrap_or('\0');
            return Err(ParseError::UnexpectedChar { ch, line, column });
        };

        for _ in 0..punct.chars().count() {
            self.bump();
        }

        match punct {
            "(" | "[" | "{" => {
                self.push(TokenKind::Punct(punct), line, column);
                self.depth += 1;
            }
            ")" | "]" | "}" => {
                if self.depth == 0 {
                    return Err(ParseError::UnbalancedBracket { line });
                }
                self.depth -= 1;
                self.push(TokenKind::Punct(punct), line, column);
            }
            ";" if self.depth == 0 => self.push_newline(),
            _ => self.push(TokenKind::Punct(punct), line, column),
        }
        Ok(())
    }
}
