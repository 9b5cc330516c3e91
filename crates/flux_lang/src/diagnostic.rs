//! Diagnostics and front-end errors
//!
//! Lexer and parser failures abort parsing; validator findings are collected
//! as [`Diagnostic`]s. Both print in the same `file:line:col: category: msg`
//! shape so tooling can treat them uniformly.

use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// 1-based source position; `0:0` means "no position known"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Diagnostic category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    ParseError,
    LexerError,
    CheckError,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::LexerError => "Lexer error",
            Self::CheckError => "Check error",
        }
    }
}

/// A located, human-readable finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub span: Span,
    pub category: Category,
    pub message: String,
}

impl Diagnostic {
    pub fn new(file: impl Into<String>, span: Span, category: Category, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            span,
            category,
            message: message.into(),
        }
    }

    pub fn check(file: &str, span: Span, message: impl Into<String>) -> Self {
        Self::new(file, span, Category::CheckError, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}: {}", self.file, self.span, self.category.label(), self.message)
    }
}

/// Newline-delimited diagnostics output
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lexer failure
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {line}:{column}")]
pub struct LexError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl LexError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self { line, column, message: message.into() }
    }
}

/// Parser failure, pointing at the offending lexeme
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {line}:{column} near '{lexeme}'")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub lexeme: String,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, lexeme: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            lexeme: lexeme.into(),
            message: message.into(),
        }
    }
}

/// Anything that stops a document from parsing
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    #[error("Lexer error: {0}")]
    Lex(#[from] LexError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl SyntaxError {
    pub fn span(&self) -> Span {
        match self {
            Self::Lex(e) => Span::new(e.line, e.column),
            Self::Parse(e) => Span::new(e.line, e.column),
        }
    }

    /// Convert into the shared diagnostics format
    pub fn to_diagnostic(&self, file: &str) -> Diagnostic {
        match self {
            Self::Lex(e) => Diagnostic::new(file, self.span(), Category::LexerError, e.message.clone()),
            Self::Parse(e) => Diagnostic::new(
                file,
                self.span(),
                Category::ParseError,
                format!("{} (found '{}')", e.message, e.lexeme),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_format() {
        let d = Diagnostic::check("doc.flux", Span::new(3, 7), "Unknown grid 'g'");
        assert_eq!(d.to_string(), "doc.flux:3:7: Check error: Unknown grid 'g'");
    }

    #[test]
    fn test_syntax_error_to_diagnostic() {
        let err = SyntaxError::from(ParseError::new(2, 5, "}", "Expected ';'"));
        assert_eq!(
            err.to_diagnostic("a.flux").to_string(),
            "a.flux:2:5: Parse error: Expected ';' (found '}')"
        );
        let err = SyntaxError::from(LexError::new(1, 1, "Unexpected character '#'"));
        assert_eq!(
            err.to_diagnostic("a.flux").to_string(),
            "a.flux:1:1: Lexer error: Unexpected character '#'"
        );
    }
}
