//! Error taxonomy shared by every module.

use std::path::PathBuf;

use crate::channel::WindowId;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("invalid window configuration: {0}")]
    InvalidConfig(String),
    #[error("window construction failed: {0}")]
    WindowConstruction(String),
    #[error("no window with id {0}")]
    UnknownWindow(WindowId),
    #[error("daemon error: {0}")]
    Daemon(#[from] std::io::Error),
}

pub type Result<T, E = ViewerError> = std::result::Result<T, E>;
