use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("corpus not found: {}", .0.display())]
    CorpusNotFound(PathBuf),

    #[error("index not ready: missing descriptor {}", .0.display())]
    IndexNotReady(PathBuf),

    #[error("unsupported index format: {0:?}")]
    UnsupportedFormat(String),

    #[error("unsupported language: {0:?}")]
    UnsupportedLanguage(String),

    #[error("malformed corpus record at byte {offset}: {source}")]
    MalformedRecord {
        offset: u64,
        source: serde_json::Error,
    },

    #[error("indexing worker pool shut down unexpectedly")]
    WorkerPoolClosed,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] sled::Error),
}
