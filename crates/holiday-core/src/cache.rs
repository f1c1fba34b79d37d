//! Presentation-cache invalidation port.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CacheError;

/// Placeholder kept so an emptied cache directory stays under version control.
const KEEP_FILE: &str = ".gitkeep";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    /// Compiled page templates only.
    Templates,
    /// Everything under the cache root.
    All,
}

pub trait CacheInvalidator {
    fn invalidate(&self, scope: CacheScope) -> Result<(), CacheError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl CacheInvalidator for NoopCache {
    fn invalidate(&self, _scope: CacheScope) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Clears a host cache directory. Templates live under `<root>/twig`.
#[derive(Debug, Clone)]
pub struct DirCacheInvalidator {
    root: PathBuf,
}

impl DirCacheInvalidator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scope_dir(&self, scope: CacheScope) -> PathBuf {
        match scope {
            CacheScope::Templates => self.root.join("twig"),
            CacheScope::All => self.root.clone(),
        }
    }
}

impl CacheInvalidator for DirCacheInvalidator {
    fn invalidate(&self, scope: CacheScope) -> Result<(), CacheError> {
        let dir = self.scope_dir(scope);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(CacheError { path: dir, source }),
        };

        let mut removed = 0usize;
        for entry in entries {
            let entry = entry.map_err(|source| CacheError {
                path: dir.clone(),
                source,
            })?;
            if entry.file_name() == KEEP_FILE {
                continue;
            }
            let path = entry.path();
            let result = match entry.file_type() {
                Ok(kind) if kind.is_dir() => fs::remove_dir_all(&path),
                Ok(_) => fs::remove_file(&path),
                Err(err) => Err(err),
            };
            match result {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(CacheError { path, source }),
            }
        }
        debug!(dir = %dir.display(), removed, "cache cleared");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn templates_scope_clears_twig_dir_only() {
        let tmp = tempfile::tempdir().unwrap();
        let twig = tmp.path().join("twig");
        fs::create_dir_all(twig.join("ab")).unwrap();
        fs::write(twig.join("ab/compiled.php"), "x").unwrap();
        fs::write(twig.join(KEEP_FILE), "").unwrap();
        fs::create_dir_all(tmp.path().join("doctrine")).unwrap();

        DirCacheInvalidator::new(tmp.path())
            .invalidate(CacheScope::Templates)
            .unwrap();

        assert!(!twig.join("ab").exists());
        assert!(twig.join(KEEP_FILE).exists());
        assert!(tmp.path().join("doctrine").exists());
    }

    #[test]
    fn all_scope_clears_root() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("twig")).unwrap();
        fs::write(tmp.path().join("routes.php"), "x").unwrap();

        DirCacheInvalidator::new(tmp.path())
            .invalidate(CacheScope::All)
            .unwrap();

        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_cache_dir_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        DirCacheInvalidator::new(tmp.path().join("absent"))
            .invalidate(CacheScope::All)
            .unwrap();
    }
}
