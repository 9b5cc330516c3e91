//! # Flux render
//!
//! Turns a document's content tree into a resolved, presentation independent
//! tree for a given `(seed, time, docstep)`.
//!
//! ## Refresh model
//!
//! Each node evaluates its dynamic properties against a *window* chosen by
//! its effective [`RefreshPolicy`](flux_lang::RefreshPolicy):
//!
//! | policy          | evaluated at                      | refresh key      |
//! |-----------------|-----------------------------------|------------------|
//! | `onLoad`/`never`| `time = 0`, `docstep = 0`         | `0`              |
//! | `docstep`       | current time and docstep          | docstep          |
//! | `every(d)`      | start of the current `d` bucket   | bucket index     |
//!
//! Results are cached per node path and only recomputed when the refresh key
//! changes, so repeated renders inside one window return identical values.
//!
//! ## Usage
//!
//! ```ignore
//! use flux_render::{create_document_runtime_ir, RenderOptions};
//!
//! let mut runtime = create_document_runtime_ir(doc, RenderOptions::default().with_seed(7))?;
//! let first = runtime.render()?;
//! let later = runtime.tick(5.0)?;
//! ```

pub mod config;
pub mod refresh;
pub mod eval;
pub mod builtins;
pub mod cache;
pub mod ir;
pub mod runtime;

pub use config::{ConfigError, RenderConfig, RenderOptions};
pub use refresh::{effective_policy, interval_seconds, refresh_window, RefreshWindow};
pub use eval::{EvalContext, Evaluator};
pub use cache::{node_path, CacheEntry, NodeCache};
pub use ir::{RenderDocument, RenderDocumentIR, RenderNode, RenderNodeIR, SlotMeta};
pub use runtime::{
    create_document_runtime, create_document_runtime_ir, render_document, render_document_ir,
    DocumentRuntime, DocumentRuntimeIR,
};

use thiserror::Error;

use flux_assets::AssetError;
use flux_kernel::KernelError;
use flux_lang::OpError;

/// Failure while evaluating one dynamic expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("Cannot read property '{0}' of null")]
    NullMember(String),

    #[error("Unsupported call '{0}'")]
    UnsupportedCall(String),

    #[error("neighbors.{0}() is only available inside grid-scoped rules")]
    NeighborsOutsideRule(String),

    #[error("{name}() expects {expected} argument(s), got {found}")]
    Arity { name: String, expected: &'static str, found: usize },

    #[error("{0}")]
    Type(String),

    #[error(transparent)]
    Operator(#[from] OpError),

    #[error("ref('{0}') does not match any label")]
    UnknownLabel(String),

    #[error("Unknown grid '{0}'")]
    UnknownGrid(String),

    #[error("Unsupported refresh unit '{0}': only ms, s, m and h can be bucketed")]
    UnsupportedRefreshUnit(String),

    #[error("Refresh interval must be positive, got {0}s")]
    InvalidRefreshInterval(f64),
}

/// Render failure; evaluation errors name the node and property they came from
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{source} (in {kind} '{node_id}', property '{property}')")]
    Property {
        node_id: String,
        kind: String,
        property: String,
        source: EvalError,
    },

    #[error("Grid kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),
}

impl RenderError {
    pub fn property(node: &flux_lang::DocumentNode, property: &str, source: EvalError) -> Self {
        Self::Property {
            node_id: node.id.clone(),
            kind: node.kind.clone(),
            property: property.to_string(),
            source,
        }
    }
}
