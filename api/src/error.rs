//! Errors of the controller layer.
//!
//! Everything the [`Container`](../controller/struct.Container.html) and the
//! codecs in [`types`](../types/index.html) can fail with ends up here. The
//! engine wraps this type in its own, richer error enum; callers of the
//! engine never have to name `ApiError` directly.

use std::io;
use thiserror::Error;

/// Error type of the controller layer and the on-disk codecs.
///
/// The `#[from]` annotations give us `From` impls so `?` converts
/// `io::Error` and `bincode::Error` on the way out.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Host filesystem I/O failed (open, seek, read, write, flush)
    #[error("i/o error in the controller layer")]
    Io(#[from] io::Error),
    /// Superblock (de)serialization failed
    #[error("serialization error in the controller layer")]
    Serialize(#[from] bincode::Error),
    /// Invalid input to the controller
    #[error("invalid controller input: {0}")]
    ControllerInput(&'static str),
    /// Out-of-range access on a byte buffer
    #[error("invalid buffer access: {0}")]
    BufferInput(&'static str),

    /// Catch-all for errors that do not fit the variants above.
    /// Kept for interoperability; the shipped code never constructs it.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Shorthand for results produced by the controller layer.
pub type Result<T> = std::result::Result<T, ApiError>;
