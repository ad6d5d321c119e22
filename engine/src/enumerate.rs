//! Read-only views over the namespace: path lookup, child and subtree
//! listings, payload streams. These are the calls the shell's `ls`, `tree`,
//! `find` and `cat` equivalents sit on.
//!
//! Listings walk the liveness bitmap and snapshot each record, preferring
//! the cached copy, so a rename that has not been written back yet is still
//! observed. Enumeration never populates the cache.

use crate::error::{FsError, Result};
use crate::image::ContainerFs;
use crate::path;
use arkfs_api::controller::FileReader;
use arkfs_api::fs::LookupSupport;

impl LookupSupport for ContainerFs {
    fn lookup_path(&self, path_str: &str) -> Option<u32> {
        self.index.lookup(&path::normalize(path_str))
    }

    fn children_of(&mut self, dir_path: &str) -> Result<Vec<u32>> {
        let norm = path::normalize(dir_path);
        let mut out = Vec::new();
        for slot in self.live.live_slots() {
            if self.snapshot(slot)?.parent == norm {
                out.push(slot);
            }
        }
        Ok(out)
    }

    fn descendants_of(&mut self, dir_path: &str) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        let mut pending = vec![path::normalize(dir_path)];
        while let Some(dir) = pending.pop() {
            for slot in self.live.live_slots() {
                let ino = self.snapshot(slot)?;
                if ino.parent == dir {
                    out.push(slot);
                    if ino.is_dir() {
                        pending.push(ino.full_path());
                    }
                }
            }
        }
        Ok(out)
    }

    fn live_slots(&self) -> Vec<u32> {
        self.live.live_slots()
    }

    fn read_file(&mut self, slot: u32) -> Result<FileReader<'_>> {
        let ino = self.snapshot(slot)?;
        if ino.is_free() {
            return Err(FsError::NotFound(format!("inode slot {}", slot)));
        }
        if ino.is_dir() {
            return Err(FsError::IsDir(ino.full_path()));
        }
        Ok(self.dev.reader(ino.offset, ino.size))
    }
}

#[cfg(test)]
#[path = "../../api/fs-tests/enumerate_test.rs"]
mod tests;
