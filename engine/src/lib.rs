//! Storage engine of the arkfs container filesystem.
//!
//! One host file holds the whole image: a superblock, a fixed table of
//! [`MAX_FILES`](../arkfs_api/types/constant.MAX_FILES.html) inode records,
//! and an append-only data region with the file payloads. The engine keeps
//! two in-memory structures coherent with the table across every mutation:
//! an LRU cache of inode records with write-back on eviction, and an
//! open-addressed hash table mapping absolute paths to slot indices.
//!
//! The public surface is the trait set of
//! [`arkfs_api::fs`](../arkfs_api/fs/index.html), implemented by
//! [`ContainerFs`](image/struct.ContainerFs.html). The engine is synchronous
//! and single-owner: one handle per container, no reentrancy, durability
//! after a clean close.

#![deny(missing_docs)]

pub mod cache;
pub mod error;
pub mod image;
pub mod index;
pub mod path;

// Trait implementations on ContainerFs, split the way the operations group
mod enumerate;
mod mutate;

pub use error::{FsError, Result};
pub use image::ContainerFs;
