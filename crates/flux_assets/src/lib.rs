//! # Flux assets
//!
//! Resolves the `assets { ... }` and `materials { ... }` sections of a
//! document into one [`AssetCatalog`]:
//! - inline `asset` declarations are taken as written
//! - `bank` declarations are expanded through an [`AssetResolver`]
//!   (by default [`FsResolver`], a recursive walk filtered by a [`Glob`])
//! - `material` declarations become assets of kind `material`
//!
//! [`pick`] implements the `uniform` and `weighted` strategies behind the
//! render builtin `assets.pick`.

pub mod glob;
pub mod resolver;
pub mod catalog;
pub mod pick;

pub use glob::{glob_to_regex_source, Glob};
pub use resolver::{AssetResolver, FixedResolver, FsResolver, ResolveContext};
pub use catalog::{AssetCatalog, AssetSource, ResolvedAsset};
pub use pick::{pick, PickStrategy};

use std::path::PathBuf;
use thiserror::Error;

/// Asset resolution errors
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid glob '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("Unknown pick strategy '{0}' (expected 'uniform' or 'weighted')")]
    UnknownStrategy(String),

    #[error("Resolver error: {0}")]
    Resolver(String),
}
