//! Bank resolution: turning `bank { root; include; }` into concrete files

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use flux_lang::BankDecl;

use crate::glob::Glob;
use crate::AssetError;

/// Context for resolving banks
#[derive(Debug, Clone)]
pub struct ResolveContext {
    /// Directory bank roots are relative to
    pub cwd: PathBuf,
}

impl ResolveContext {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    /// Context rooted at the process working directory
    pub fn current_dir() -> Result<Self, AssetError> {
        let cwd = std::env::current_dir().map_err(|source| AssetError::Io {
            path: PathBuf::from("."),
            source,
        })?;
        Ok(Self { cwd })
    }
}

/// Pluggable bank resolver.
///
/// Returns paths relative to the bank root, `/`-separated, in a stable order.
pub trait AssetResolver {
    fn resolve(&self, bank: &BankDecl, ctx: &ResolveContext) -> Result<Vec<String>, AssetError>;
}

impl<F> AssetResolver for F
where
    F: Fn(&BankDecl, &ResolveContext) -> Result<Vec<String>, AssetError>,
{
    fn resolve(&self, bank: &BankDecl, ctx: &ResolveContext) -> Result<Vec<String>, AssetError> {
        self(bank, ctx)
    }
}

/// Default resolver: recursive walk of `cwd/bank.root`, filtered by `bank.include`
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResolver;

impl AssetResolver for FsResolver {
    fn resolve(&self, bank: &BankDecl, ctx: &ResolveContext) -> Result<Vec<String>, AssetError> {
        let root = ctx.cwd.join(&bank.root);
        if !root.is_dir() {
            log::warn!("Bank '{}': root {} is not a directory", bank.name, root.display());
            return Ok(Vec::new());
        }

        let glob = Glob::new(&bank.include)?;
        let mut files = Vec::new();
        walk(&root, &root, &mut files)?;

        let mut matched: Vec<String> = files.into_iter().filter(|path| glob.is_match(path)).collect();
        matched.sort();

        log::debug!("Bank '{}': {} file(s) match '{}'", bank.name, matched.len(), glob.pattern());
        Ok(matched)
    }
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), AssetError> {
    let io_error = |source: std::io::Error| AssetError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let path = entry.path();
        // Symlinked directories are not followed, so link cycles cannot recurse
        let file_type = entry.file_type().map_err(io_error)?;
        if file_type.is_dir() {
            walk(root, &path, out)?;
        } else if file_type.is_symlink() && !path.is_file() {
            log::debug!("Skipping symlink {}", path.display());
        } else if let Ok(relative) = path.strip_prefix(root) {
            let parts: Vec<String> = relative.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(parts.join("/"));
        }
    }
    Ok(())
}

/// Resolver backed by a fixed bank-name to paths table
#[derive(Debug, Clone, Default)]
pub struct FixedResolver {
    banks: BTreeMap<String, Vec<String>>,
}

impl FixedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bank(mut self, name: impl Into<String>, paths: &[&str]) -> Self {
        self.banks.insert(name.into(), paths.iter().map(|p| p.to_string()).collect());
        self
    }
}

impl AssetResolver for FixedResolver {
    fn resolve(&self, bank: &BankDecl, _ctx: &ResolveContext) -> Result<Vec<String>, AssetError> {
        let glob = Glob::new(&bank.include)?;
        Ok(self.banks.get(&bank.name)
            .map(|paths| paths.iter().filter(|p| glob.is_match(p)).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_lang::Span;

    fn bank(root: &str, include: &str) -> BankDecl {
        BankDecl {
            name: "photos".to_string(),
            kind: "image".to_string(),
            root: root.to_string(),
            include: include.to_string(),
            tags: vec![],
            weight: 1.0,
            span: Span::default(),
        }
    }

    #[test]
    fn test_fs_resolver_walks_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        fs::create_dir_all(media.join("trip/day1")).unwrap();
        fs::write(media.join("b.jpg"), b"").unwrap();
        fs::write(media.join("notes.txt"), b"").unwrap();
        fs::write(media.join("trip/a.jpg"), b"").unwrap();
        fs::write(media.join("trip/day1/c.jpg"), b"").unwrap();

        let ctx = ResolveContext::new(dir.path());
        let paths = FsResolver.resolve(&bank("media", "**/*.jpg"), &ctx).unwrap();
        assert_eq!(paths, vec!["b.jpg", "trip/a.jpg", "trip/day1/c.jpg"]);

        let top_only = FsResolver.resolve(&bank("media", "*.jpg"), &ctx).unwrap();
        assert_eq!(top_only, vec!["b.jpg"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_fs_resolver_does_not_follow_directory_links() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        fs::create_dir_all(media.join("trip")).unwrap();
        fs::write(media.join("trip/a.jpg"), b"").unwrap();
        symlink(&media, media.join("trip/loop")).unwrap();
        symlink(media.join("trip/a.jpg"), media.join("alias.jpg")).unwrap();

        let ctx = ResolveContext::new(dir.path());
        let paths = FsResolver.resolve(&bank("media", "**/*.jpg"), &ctx).unwrap();
        assert_eq!(paths, vec!["alias.jpg", "trip/a.jpg"]);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ResolveContext::new(dir.path());
        assert!(FsResolver.resolve(&bank("nope", "**/*"), &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |bank: &BankDecl, _: &ResolveContext| -> Result<Vec<String>, AssetError> {
            Ok(vec![format!("{}.png", bank.name)])
        };
        let paths = resolver.resolve(&bank("x", "**/*"), &ResolveContext::new(".")).unwrap();
        assert_eq!(paths, vec!["photos.png"]);
    }

    #[test]
    fn test_fixed_resolver_applies_include() {
        let resolver = FixedResolver::new().with_bank("photos", &["a.jpg", "b.png"]);
        let paths = resolver.resolve(&bank("ignored", "*.png"), &ResolveContext::new(".")).unwrap();
        assert_eq!(paths, vec!["b.png"]);
    }
}
