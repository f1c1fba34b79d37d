//! Filesystem port: recursive mirror, single-file copy, recursive delete.

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::error::FsError;

pub trait AssetFs {
    /// Copies every file under `source` into `target`, creating directories
    /// as needed and overwriting files that already exist. Symbolic links
    /// are recreated as links, not followed.
    fn mirror(&self, source: &Path, target: &Path) -> Result<(), FsError>;

    /// Copies one file, creating the target's parent directory.
    fn copy_file(&self, source: &Path, target: &Path) -> Result<(), FsError>;

    /// Deletes a file or a directory tree. A missing path is not an error.
    fn remove(&self, path: &Path) -> Result<(), FsError>;
}

/// [`AssetFs`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl AssetFs for LocalFs {
    fn mirror(&self, source: &Path, target: &Path) -> Result<(), FsError> {
        if !source.is_dir() {
            return Err(FsError::new(
                "mirror",
                source,
                io::Error::new(io::ErrorKind::NotFound, "source directory does not exist"),
            ));
        }
        fs::create_dir_all(target).map_err(|err| FsError::new("create", target, err))?;

        let mut copied = 0usize;
        for entry in walkdir::WalkDir::new(source).follow_links(false) {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(source).to_path_buf();
                FsError::new("walk", path, io::Error::from(err))
            })?;
            let path = entry.path();
            let rel = match path.strip_prefix(source) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel,
                _ => continue,
            };
            let dest = target.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest).map_err(|err| FsError::new("create", &dest, err))?;
                continue;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|err| FsError::new("create", parent, err))?;
            }
            let file_type = entry.file_type();
            if file_type.is_symlink() {
                let link = fs::read_link(path).map_err(|err| FsError::new("readlink", path, err))?;
                self.remove(&dest)?;
                make_symlink(&link, &dest)?;
            } else if file_type.is_file() {
                fs::copy(path, &dest).map_err(|err| FsError::new("copy", path, err))?;
            } else {
                return Err(FsError::new(
                    "copy",
                    path,
                    io::Error::new(io::ErrorKind::InvalidInput, "not a regular file, directory or link"),
                ));
            }
            copied += 1;
        }
        debug!(source = %source.display(), target = %target.display(), files = copied, "mirrored assets");
        Ok(())
    }

    fn copy_file(&self, source: &Path, target: &Path) -> Result<(), FsError> {
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| FsError::new("create", parent, err))?;
            }
        }
        fs::copy(source, target).map_err(|err| FsError::new("copy", source, err))?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<(), FsError> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(FsError::new("stat", path, err)),
        };
        let result = if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(FsError::new("remove", path, err)),
        }
    }
}

#[cfg(unix)]
fn make_symlink(link: &Path, dest: &Path) -> Result<(), FsError> {
    std::os::unix::fs::symlink(link, dest).map_err(|err| FsError::new("link", dest, err))
}

#[cfg(not(unix))]
fn make_symlink(_link: &Path, dest: &Path) -> Result<(), FsError> {
    Err(FsError::new(
        "link",
        dest,
        io::Error::new(io::ErrorKind::Unsupported, "symbolic links are not supported here"),
    ))
}
