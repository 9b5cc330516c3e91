//! # Flux language
//!
//! Front end for Flux documents:
//! - Lexer and recursive-descent parser producing a [`FluxDocument`]
//! - Static checks collected as [`Diagnostic`]s
//! - The dynamic [`Value`] type shared by the kernel and the renderer
//! - Stable hashing and the seeded PRNG behind every reproducible choice
//!
//! ## Syntax Overview
//!
//! ```text
//! document {
//!   meta { title = "Demo"; version = "0.2.0"; }
//!   state { param tempo: float [40, 200] @ 120; }
//!   grid field { size { rows = 1; cols = 3; } cell a { dynamic = 0.6; } }
//!   rule grow(mode = docstep, grid = field) {
//!     when cell.content == "" and neighbors.all().dynamic > 0.5
//!     then { cell.content = "noise"; }
//!   }
//!   body {
//!     page p1 {
//!       slot s1 { refresh = every("5s"); content = @choose(["a", "b"]); }
//!     }
//!   }
//! }
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use flux_lang::{parse_document, check_document};
//!
//! let doc = parse_document(source)?;
//! for diagnostic in check_document("demo.flux", &doc) {
//!     eprintln!("{}", diagnostic);
//! }
//! ```

pub mod value;
pub mod hash;
pub mod diagnostic;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod check;
pub mod ops;

pub use value::Value;
pub use hash::{stable_hash, stable_hash_hex, Mulberry32};
pub use diagnostic::{Category, Diagnostic, LexError, ParseError, Span, SyntaxError, format_diagnostics};
pub use lexer::{Lexer, Token, TokenKind, tokenize};
pub use ast::*;
pub use parser::{Parser, parse_document, parse_expression, parse_duration_str};
pub use check::{check_document, check_document_strings};
pub use ops::{eval_binary, eval_unary, OpError};

/// Serialise a parsed document to its JSON form
pub fn to_json(doc: &FluxDocument) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(doc)
}

/// Rebuild a document from its JSON form
pub fn from_json(json: &str) -> Result<FluxDocument, serde_json::Error> {
    serde_json::from_str(json)
}

/// Parse a file's contents, converting a failure into a diagnostic
pub fn parse_with_diagnostics(file: &str, source: &str) -> Result<FluxDocument, Diagnostic> {
    parse_document(source).map_err(|e| e.to_diagnostic(file))
}
