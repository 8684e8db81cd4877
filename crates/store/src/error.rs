// crates/store/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading knowledge from disk. A failing file is
/// reported and skipped; the rest of the directory still loads.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("knowledge file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("permission denied reading file: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no categories found in {path}")]
    NoCategories { path: PathBuf },

    #[error("knowledge directory not found: {path}")]
    DirNotFound { path: PathBuf },
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}
