pub mod codec;
pub mod config;
pub mod file_store;
pub mod post;
pub mod render;
pub mod storage;
pub mod upload;

pub use config::*;
pub use file_store::*;
pub use post::*;
pub use storage::*;

use std::path::{Path, PathBuf};

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

// Errors returned by a Storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No post with slug {0:?}")]
    NotFound(String),

    // The payload claims to be a post but cannot be parsed.
    #[error("Corrupt post: {0}")]
    CorruptPayload(String),

    // The payload is readable but is not a post.
    #[error("Not a post: {0}")]
    NotARecord(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    // Wrap an io::Error with the path it happened on, for use with map_err.
    pub(crate) fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.as_ref().to_path_buf();
        move |source| Error::Io { path, source }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
