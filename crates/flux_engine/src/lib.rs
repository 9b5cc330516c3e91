//! # Flux engine
//!
//! Entry points for tools built on Flux documents:
//! - [`parse_document`] / [`load_document`] turn source into a [`FluxDocument`]
//! - [`check_document`] collects non-fatal [`Diagnostic`]s
//! - [`init_runtime_state`] / [`run_docstep_once`] / [`create_runtime`] drive the grid kernel
//! - [`render_document_ir`] / [`create_document_runtime_ir`] resolve the content tree
//!
//! ## Example
//!
//! ```ignore
//! use flux_engine::prelude::*;
//!
//! let doc = load_document(Path::new("demo.flux"))?;
//! for diagnostic in check_document("demo.flux", &doc) {
//!     eprintln!("{}", diagnostic);
//! }
//! let options = RenderConfig::load().into_options();
//! let mut runtime = create_document_runtime_ir(doc, options)?;
//! println!("{}", runtime.render()?.to_json()?);
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;

// Re-export crates
pub use flux_lang;
pub use flux_kernel;
pub use flux_assets;
pub use flux_render;

pub use flux_lang::{
    check_document, check_document_strings, format_diagnostics, Diagnostic, FluxDocument, SyntaxError, Value,
};
pub use flux_kernel::{
    compute_grid_layout, create_runtime, handle_event, init_runtime_state, run_docstep_once, KernelError, Runtime,
    RuntimeEvent, RuntimeState,
};
pub use flux_assets::{AssetCatalog, AssetError, AssetResolver, ResolvedAsset};
pub use flux_render::{
    create_document_runtime, create_document_runtime_ir, render_document, render_document_ir, ConfigError,
    DocumentRuntime, DocumentRuntimeIR, RenderConfig, RenderDocument, RenderDocumentIR, RenderError,
    RenderOptions,
};

/// Any failure surfaced by the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// Syntax error located in a named file
    #[error("{0}")]
    Diagnostic(Diagnostic),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse Flux source into a document
pub fn parse_document(source: &str) -> Result<FluxDocument, EngineError> {
    Ok(flux_lang::parse_document(source)?)
}

/// Read and parse a `.flux` file; syntax errors come back as a located diagnostic
pub fn load_document(path: &Path) -> Result<FluxDocument, EngineError> {
    let source = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file = path.display().to_string();
    let doc = flux_lang::parse_with_diagnostics(&file, &source).map_err(EngineError::Diagnostic)?;
    log::debug!("Loaded {} ({} grid(s), {} rule(s))", file, doc.grids.len(), doc.rules.len());
    Ok(doc)
}

/// Every diagnostic for `source`: the syntax error if parsing fails, else all check findings
pub fn diagnose(file: &str, source: &str) -> Vec<Diagnostic> {
    match flux_lang::parse_with_diagnostics(file, source) {
        Ok(doc) => check_document(file, &doc),
        Err(diagnostic) => vec![diagnostic],
    }
}

/// Pretty-printed AST JSON for `doc`
pub fn document_to_json(doc: &FluxDocument) -> Result<String, EngineError> {
    Ok(flux_lang::to_json(doc)?)
}

/// Rebuild a document from [`document_to_json`] output
pub fn document_from_json(json: &str) -> Result<FluxDocument, EngineError> {
    Ok(flux_lang::from_json(json)?)
}

pub mod prelude {
    pub use crate::{
        check_document, compute_grid_layout, create_document_runtime, create_document_runtime_ir, create_runtime,
        diagnose, handle_event, init_runtime_state, load_document, parse_document, render_document,
        render_document_ir, run_docstep_once, EngineError,
    };

    pub use flux_lang::{Diagnostic, FluxDocument, Value};
    pub use flux_kernel::{Runtime, RuntimeEvent, RuntimeState};
    pub use flux_render::{DocumentRuntime, DocumentRuntimeIR, RenderConfig, RenderDocument, RenderDocumentIR, RenderOptions};
    pub use std::path::Path;
}
