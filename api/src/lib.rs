//! Interface crate of the arkfs container filesystem.
//!
//! This crate defines everything external collaborators (the shell, the
//! tree/find/stat presenters) are allowed to see: the on-disk types and
//! their codecs, the host-file controller, the trait surface the engine
//! implements, and the controller-level error type.
//!
//! The storage engine itself lives in the `arkfs_engine` crate.

#![deny(missing_docs)]

//Host-file device and streaming I/O
pub mod controller;
pub mod error;

//On-disk types, codecs and constants
pub mod types;

//Traits the engine implements
pub mod fs;
