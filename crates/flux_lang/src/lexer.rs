//! Lexer/Tokenizer for Flux
//!
//! Converts source text into a flat stream of tokens. Every token keeps its
//! 1-based line/column and the exact source lexeme so parse errors can point
//! at what the author wrote.

use crate::diagnostic::{LexError, Span};

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Inf,

    // Identifiers (keywords are contextual and resolved by the parser)
    Ident(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    EqEq,
    EqEqEq,
    BangEq,
    BangEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Bang,
    At,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,

    // Special
    Eof,
}

/// A token with position information
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
        }
    }

    /// Identifier text, if this is an identifier
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.ident() == Some(name)
    }

    pub fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }
}

/// Lexer for Flux
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire source
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Get the next token
    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments()?;

        let (line, column) = (self.line, self.column);

        let Some((start, c)) = self.advance() else {
            return Ok(Token::new(TokenKind::Eof, "<eof>", line, column));
        };

        let kind = match c {
            // Single-character tokens
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '@' => TokenKind::At,

            // Multi-character operators
            '=' => {
                if self.match_char('=') {
                    if self.match_char('=') {
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if self.match_char('=') {
                    if self.match_char('=') {
                        TokenKind::BangEqEq
                    } else {
                        TokenKind::BangEq
                    }
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.match_char('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.match_char('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.match_char('&') {
                    TokenKind::And
                } else {
                    return Err(LexError::new(line, column, "Unexpected character '&'"));
                }
            }
            '|' => {
                if self.match_char('|') {
                    TokenKind::Or
                } else {
                    return Err(LexError::new(line, column, "Unexpected character '|'"));
                }
            }

            // String literals
            '"' | '\'' => self.string(c, line, column)?,

            // Numbers
            c if c.is_ascii_digit() => self.number(start, line, column)?,

            // Identifiers and literal keywords
            c if c.is_alphabetic() || c == '_' => self.identifier(start),

            _ => {
                return Err(LexError::new(line, column, format!("Unexpected character '{}'", c)));
            }
        };

        let end = self.offset();
        Ok(Token::new(kind, &self.source[start..end], line, column))
    }

    /// Byte offset of the next unread character
    fn offset(&mut self) -> usize {
        self.chars.peek()
            .map(|(pos, _)| *pos)
            .unwrap_or(self.source.len())
    }

    /// Advance to the next character
    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((_, c)) = result {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        result
    }

    /// Peek at the next character
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    /// Peek one character past the next one
    fn peek_second(&self) -> Option<char> {
        let mut chars_clone = self.chars.clone();
        chars_clone.next();
        chars_clone.peek().map(|(_, c)| *c)
    }

    /// Match and consume a specific character
    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skip whitespace, `//` line comments and `/* */` block comments
    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') => match self.peek_second() {
                    Some('/') => {
                        while let Some(c) = self.peek() {
                            if c == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        let (line, column) = (self.line, self.column);
                        self.advance();
                        self.advance();
                        loop {
                            match self.advance() {
                                Some((_, '*')) if self.peek() == Some('/') => {
                                    self.advance();
                                    break;
                                }
                                Some(_) => {}
                                None => {
                                    return Err(LexError::new(line, column, "Unterminated block comment"));
                                }
                            }
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }
        Ok(())
    }

    /// Parse a string literal; only `\\` and quote escapes are recognised
    fn string(&mut self, quote: char, line: usize, column: usize) -> Result<TokenKind, LexError> {
        let mut value = String::new();

        loop {
            match self.advance() {
                Some((_, c)) if c == quote => break,
                Some((_, '\\')) => match self.advance() {
                    Some((_, c)) if c == '\\' || c == '"' || c == '\'' => value.push(c),
                    Some((_, c)) => {
                        value.push('\\');
                        value.push(c);
                    }
                    None => {
                        return Err(LexError::new(line, column, "Unterminated string"));
                    }
                },
                Some((_, c)) => value.push(c),
                None => {
                    return Err(LexError::new(line, column, "Unterminated string"));
                }
            }
        }

        Ok(TokenKind::String(value))
    }

    /// Parse a number; a dot only makes a float when a digit follows it
    fn number(&mut self, start: usize, line: usize, column: usize) -> Result<TokenKind, LexError> {
        self.digits();

        if self.peek() == Some('.') && self.peek_second().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.advance();
            self.digits();

            let end = self.offset();
            let num_str = &self.source[start..end];
            let value: f64 = num_str.parse()
                .map_err(|_| LexError::new(line, column, format!("Invalid numeric literal '{}'", num_str)))?;
            return Ok(TokenKind::Float(value));
        }

        let end = self.offset();
        let num_str = &self.source[start..end];
        let value: i64 = num_str.parse()
            .map_err(|_| LexError::new(line, column, format!("Invalid numeric literal '{}'", num_str)))?;

        Ok(TokenKind::Int(value))
    }

    fn digits(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Parse an identifier or literal keyword
    fn identifier(&mut self, start: usize) -> TokenKind {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let end = self.offset();
        match &self.source[start..end] {
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            "inf" => TokenKind::Inf,
            ident => TokenKind::Ident(ident.to_string()),
        }
    }
}

/// Tokenize a source string
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}
