//! The trait surface of the container filesystem engine.
//!
//! External collaborators (the shell, the tree/find/stat presenters, the
//! completion machinery) program against these traits and the types in
//! [`types`](../types/index.html); they never touch the inode table, the
//! cache or the hash index directly.
//!
//! All paths crossing this boundary are absolute container paths (`/docs`,
//! `/docs/note.txt`). Resolution of relative input against a working
//! directory happens on the caller's side, before the engine is involved.

use super::controller::FileReader;
use super::types::{Inode, SuperBlock};
use std::{error, path::Path};

/// Lifecycle of a container image: creation, mounting, durability.
pub trait ImageSupport: Sized {
    /// The error type of the implementation.
    type Error: error::Error;

    /// Write a fresh, empty image to `path`: a superblock with zero live
    /// entries followed by a zeroed inode table. No data region bytes are
    /// allocated. Does not return a handle; pair with `open_image`.
    fn create_image<P: AsRef<Path>>(path: P) -> Result<(), Self::Error>;

    /// Open the image at `path`: validate the magic, rebuild the in-memory
    /// indexes from the inode table, start with a cold inode cache.
    fn open_image<P: AsRef<Path>>(path: P) -> Result<Self, Self::Error>;

    /// Like `open_image`, with an explicit inode cache capacity. The plain
    /// variant uses the engine's default.
    fn open_image_with<P: AsRef<Path>>(path: P, cache_slots: usize)
        -> Result<Self, Self::Error>;

    /// Write back every dirty cached inode and the superblock, then release
    /// the handle. Durability is only guaranteed after this returns `Ok`.
    fn close_image(self) -> Result<(), Self::Error>;

    /// Write back dirty state like `close_image` but keep the handle usable.
    fn flush_image(&mut self) -> Result<(), Self::Error>;

    /// The current in-memory superblock.
    fn superblock(&self) -> &SuperBlock;
}

/// Slot-level access to inode records.
pub trait InodeSupport: ImageSupport {
    /// Snapshot the record in `slot` by value: the cached copy when
    /// resident, the on-disk record otherwise. Never populates the cache;
    /// enumeration must not evict the mutation working set.
    fn inode_get(&mut self, slot: u32) -> Result<Inode, Self::Error>;

    /// Whether `slot` currently sits in the inode cache.
    fn is_cached(&self, slot: u32) -> bool;
}

/// The mutation operations of the namespace.
///
/// Every operation normalizes its paths, validates its preconditions,
/// performs exactly one logical state change, and keeps the inode table,
/// the path index and the superblock counter coherent.
pub trait TreeSupport: InodeSupport {
    /// Create a directory. The parent must exist; the path must not.
    fn mkdir(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Import the host file at `host_path` as `fs_path`, appending its
    /// payload to the data region.
    fn add_file<P: AsRef<Path>>(&mut self, fs_path: &str, host_path: P)
        -> Result<(), Self::Error>;

    /// Stream the payload of `fs_path` into a host file at `host_path`,
    /// creating or truncating it.
    fn extract_file<P: AsRef<Path>>(
        &mut self,
        fs_path: &str,
        host_path: P,
    ) -> Result<(), Self::Error>;

    /// Duplicate a file's payload and metadata under a new path. Files only.
    fn copy_file(&mut self, src: &str, dest: &str) -> Result<(), Self::Error>;

    /// Rename or move an entry, file or directory. Moving a non-empty
    /// directory rewrites the parent path of its whole subtree; the slot
    /// index of every involved inode is unchanged.
    fn move_file(&mut self, src: &str, dest: &str) -> Result<(), Self::Error>;

    /// Remove an entry. A non-empty directory needs `recursive`. With
    /// `force`, missing targets and non-empty-without-recursive are treated
    /// as success; I/O errors still propagate.
    fn delete(&mut self, path: &str, recursive: bool, force: bool) -> Result<(), Self::Error>;
}

/// Read-only views over the namespace.
pub trait LookupSupport: InodeSupport {
    /// Slot holding `path`, if the path is live. O(1) through the path index.
    fn lookup_path(&self, path: &str) -> Option<u32>;

    /// Slots of the direct children of `dir_path`, in slot order. A missing
    /// or non-directory path simply has no children.
    fn children_of(&mut self, dir_path: &str) -> Result<Vec<u32>, Self::Error>;

    /// Slots of the whole subtree under `dir_path`, depth-first.
    fn descendants_of(&mut self, dir_path: &str) -> Result<Vec<u32>, Self::Error>;

    /// Every live slot, in slot order.
    fn live_slots(&self) -> Vec<u32>;

    /// A finite byte stream over the payload of the file in `slot`.
    fn read_file(&mut self, slot: u32) -> Result<FileReader<'_>, Self::Error>;
}
