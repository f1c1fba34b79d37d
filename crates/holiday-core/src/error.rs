//! Error taxonomy for registrar operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A failed filesystem step, with the operation and path that failed.
#[derive(Debug, Error)]
#[error("{op} {}: {source}", .path.display())]
pub struct FsError {
    pub op: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FsError {
    pub fn new(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.source.kind() == io::ErrorKind::NotFound
    }
}

/// Errors reported by a persisted-state store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    /// Another writer holds the lock or claimed the same unique slot.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store backend: {0}")]
    Backend(String),
}

impl StoreError {
    /// Conflicts can succeed when the caller retries the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Errors surfaced by the registrar and the plugin lifecycle.
#[derive(Debug, Error)]
pub enum RegistrarError {
    #[error("io: {0}")]
    Io(#[from] FsError),
    /// The store transaction was rolled back before this was returned.
    #[error("registration failed: {0}")]
    Registration(#[from] StoreError),
    #[error("migration failed: {0}")]
    Migration(String),
}

/// Cache invalidation failure. Logged by the registrar, never returned.
#[derive(Debug, Error)]
#[error("clear cache {}: {source}", .path.display())]
pub struct CacheError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_error_display_names_op_and_path() {
        let err = FsError::new(
            "copy",
            "/tmp/missing.twig",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(err.to_string(), "copy /tmp/missing.twig: no such file");
        assert!(err.is_not_found());
    }

    #[test]
    fn registrar_error_wraps_store_error() {
        let err: RegistrarError = StoreError::Conflict("slot taken".into()).into();
        assert_eq!(err.to_string(), "registration failed: conflict: slot taken");
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(StoreError::Conflict("busy".into()).is_retryable());
        assert!(!StoreError::Constraint("fk".into()).is_retryable());
        assert!(!StoreError::NotFound("page 1".into()).is_retryable());
        assert!(!StoreError::Backend("disk".into()).is_retryable());
    }
}
