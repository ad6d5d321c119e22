//! The error taxonomy of the engine.
//!
//! Every public operation returns one of the tags below. The shell derives
//! its user-facing messages from the `Display` impl; nothing here formats
//! for end users beyond a single line.

use arkfs_api::error::ApiError;
use thiserror::Error;

/// Errors surfaced by every engine operation.
///
/// `Io` wraps the whole controller layer (host filesystem failures and codec
/// failures); the remaining variants are namespace conditions the caller can
/// act on.
#[derive(Error, Debug)]
pub enum FsError {
    /// Host filesystem or codec failure in the controller layer
    #[error("error in the controller layer")]
    Io(#[from] ApiError),
    /// The host file is not a container image
    #[error("not a container image (bad magic)")]
    BadMagic,
    /// The named path is not in the namespace
    #[error("no such entry: {0}")]
    NotFound(String),
    /// The mutation would create a duplicate path
    #[error("'{0}' already exists")]
    Exists(String),
    /// The parent directory of a new path does not exist
    #[error("parent directory '{0}' does not exist")]
    NoParent(String),
    /// A file-only operation was asked of a directory
    #[error("'{0}' is a directory")]
    IsDir(String),
    /// Non-recursive delete of a non-empty directory
    #[error("directory '{0}' is not empty")]
    NotEmpty(String),
    /// No free inode slot, or the path index is saturated
    #[error("no free inode slot")]
    Full,
}

// Host-file errors raised directly in the engine (opening a source file for
// import, creating an extraction target) funnel through the controller tag.
impl From<std::io::Error> for FsError {
    fn from(e: std::io::Error) -> FsError {
        FsError::Io(ApiError::Io(e))
    }
}

/// Shorthand for results produced by the engine.
pub type Result<T> = std::result::Result<T, FsError>;
