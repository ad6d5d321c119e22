//! The mutation operations of the namespace.
//!
//! Every operation here follows the same shape: normalize the paths,
//! validate the preconditions through the index, perform one logical state
//! change, and update in order the cached record, the path index, the
//! liveness bitmap and the superblock counter. Payload bytes go to the data
//! region before any metadata references them; a write that dies halfway
//! leaves junk that nothing points at and that the next append overwrites.

use crate::error::{FsError, Result};
use crate::image::{unix_now, ContainerFs};
use crate::path;
use arkfs_api::fs::TreeSupport;
use arkfs_api::types::Inode;
use std::fs::File;
use std::path::Path;

impl ContainerFs {
    /// Parent precondition shared by every entry-creating operation: the
    /// parent is the root, or an existing directory. An existing file is as
    /// unusable as a missing path.
    fn require_dir(&mut self, parent: &str) -> Result<()> {
        if parent == "/" {
            return Ok(());
        }
        match self.index.lookup(parent) {
            Some(slot) => {
                if self.snapshot(slot)?.is_dir() {
                    Ok(())
                } else {
                    Err(FsError::NoParent(parent.to_string()))
                }
            }
            None => Err(FsError::NoParent(parent.to_string())),
        }
    }

    /// Claim `slot` for `ino` under the path `full`: cache the record dirty,
    /// index the path, count the entry.
    fn install(&mut self, slot: u32, ino: Inode, full: &str) -> Result<()> {
        {
            let node = self.cache.get(&mut self.dev, slot)?;
            *node = ino;
        }
        self.cache.mark_dirty(slot);
        if !self.index.insert(full, slot) {
            // no cell left for the path; back the record out again
            if let Some(node) = self.cache.peek_mut(slot) {
                *node = Inode::default();
            }
            return Err(FsError::Full);
        }
        self.live.set(slot);
        self.sb.num_files += 1;
        Ok(())
    }

    /// Free `slot` and drop the path `full` from the index and the counter.
    /// The data-region bytes of a file stay where they are, unreferenced.
    fn release(&mut self, slot: u32, full: &str) -> Result<()> {
        {
            let node = self.cache.get(&mut self.dev, slot)?;
            *node = Inode::default();
        }
        self.cache.mark_dirty(slot);
        self.index.remove(full);
        self.live.clear(slot);
        self.sb.num_files -= 1;
        Ok(())
    }

    /// Full paths of the direct children of `dir`
    fn child_paths(&mut self, dir: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for slot in self.live.live_slots() {
            let ino = self.snapshot(slot)?;
            if ino.parent == dir {
                out.push(ino.full_path());
            }
        }
        Ok(out)
    }

    /// Rewrite the parent path of every descendant of a renamed directory,
    /// keeping the index in step entry by entry.
    fn cascade_rename(&mut self, skip: u32, old_full: &str, new_full: &str) -> Result<()> {
        let old_prefix = format!("{}/", old_full);
        for slot in self.live.live_slots() {
            if slot == skip {
                continue;
            }
            let (old_child, new_child);
            {
                let node = self.cache.get(&mut self.dev, slot)?;
                // "/foo" must not capture "/foobar": the match has to end at
                // the directory itself or at a separator
                if node.parent != old_full && !node.parent.starts_with(&old_prefix) {
                    continue;
                }
                old_child = node.full_path();
                node.parent = format!("{}{}", new_full, &node.parent[old_full.len()..]);
                new_child = node.full_path();
            }
            self.cache.mark_dirty(slot);
            self.index.remove(&old_child);
            if !self.index.insert(&new_child, slot) {
                return Err(FsError::Full);
            }
        }
        Ok(())
    }
}

impl TreeSupport for ContainerFs {
    fn mkdir(&mut self, path_str: &str) -> Result<()> {
        let norm = path::normalize(path_str);
        if norm == "/" || self.index.lookup(&norm).is_some() {
            return Err(FsError::Exists(norm));
        }
        let (parent, base) = path::split(&norm);
        self.require_dir(parent)?;
        let slot = self.live.first_free().ok_or(FsError::Full)?;
        let ino = Inode::new_dir(base, parent, unix_now());
        self.install(slot, ino, &norm)
    }

    fn add_file<P: AsRef<Path>>(&mut self, fs_path: &str, host_path: P) -> Result<()> {
        if self.sb.num_files >= self.sb.max_files {
            return Err(FsError::Full);
        }
        let norm = path::normalize(fs_path);
        if norm == "/" || self.index.lookup(&norm).is_some() {
            return Err(FsError::Exists(norm));
        }
        let (parent, base) = path::split(&norm);
        self.require_dir(parent)?;
        let mut src = File::open(host_path.as_ref())?;
        let slot = self.live.first_free().ok_or(FsError::Full)?;
        let offset = self.find_data_end()?;
        // payload first: if this write dies, nothing references the bytes
        let size = self.dev.copy_in(offset, &mut src)?;
        let ino = Inode::new_file(base, parent, size, offset, unix_now());
        self.install(slot, ino, &norm)
    }

    fn extract_file<P: AsRef<Path>>(&mut self, fs_path: &str, host_path: P) -> Result<()> {
        let norm = path::normalize(fs_path);
        let slot = self
            .index
            .lookup(&norm)
            .ok_or_else(|| FsError::NotFound(norm.clone()))?;
        let ino = self.snapshot(slot)?;
        if ino.is_dir() {
            return Err(FsError::IsDir(norm));
        }
        let mut dst = File::create(host_path.as_ref())?;
        self.dev.copy_out(ino.offset, ino.size, &mut dst)?;
        Ok(())
    }

    fn copy_file(&mut self, src: &str, dest: &str) -> Result<()> {
        if self.sb.num_files >= self.sb.max_files {
            return Err(FsError::Full);
        }
        let nsrc = path::normalize(src);
        let ndest = path::normalize(dest);
        let src_slot = self
            .index
            .lookup(&nsrc)
            .ok_or_else(|| FsError::NotFound(nsrc.clone()))?;
        // snapshot by value: acquiring the destination record below may
        // evict the source from the cache
        let src_ino = self.snapshot(src_slot)?;
        if src_ino.is_dir() {
            return Err(FsError::IsDir(nsrc));
        }
        if ndest == "/" || self.index.lookup(&ndest).is_some() {
            return Err(FsError::Exists(ndest));
        }
        let (parent, base) = path::split(&ndest);
        self.require_dir(parent)?;
        let dest_slot = self.live.first_free().ok_or(FsError::Full)?;
        let dest_offset = self.find_data_end()?;
        self.dev
            .copy_within(src_ino.offset, src_ino.size, dest_offset)?;
        let ino = Inode::new_file(base, parent, src_ino.size, dest_offset, unix_now());
        self.install(dest_slot, ino, &ndest)
    }

    fn move_file(&mut self, src: &str, dest: &str) -> Result<()> {
        let nsrc = path::normalize(src);
        let ndest = path::normalize(dest);
        let src_slot = self
            .index
            .lookup(&nsrc)
            .ok_or_else(|| FsError::NotFound(nsrc.clone()))?;
        if ndest == "/" || self.index.lookup(&ndest).is_some() {
            return Err(FsError::Exists(ndest));
        }
        let (parent, base) = path::split(&ndest);
        let is_dir = self.snapshot(src_slot)?.is_dir();
        // a directory cannot move below itself: its departure would
        // dissolve the destination's parent chain
        if is_dir && ndest.starts_with(&format!("{}/", nsrc)) {
            return Err(FsError::NoParent(parent.to_string()));
        }
        self.require_dir(parent)?;

        self.index.remove(&nsrc);
        {
            let node = self.cache.get(&mut self.dev, src_slot)?;
            node.name = base.to_string();
            node.parent = parent.to_string();
            node.modified = unix_now();
        }
        self.cache.mark_dirty(src_slot);
        if !self.index.insert(&ndest, src_slot) {
            return Err(FsError::Full);
        }
        if is_dir {
            self.cascade_rename(src_slot, &nsrc, &ndest)?;
        }
        Ok(())
    }

    fn delete(&mut self, path_str: &str, recursive: bool, force: bool) -> Result<()> {
        let norm = path::normalize(path_str);
        if norm == "/" {
            return Err(FsError::IsDir(norm));
        }
        let slot = match self.index.lookup(&norm) {
            Some(slot) => slot,
            None if force => return Ok(()),
            None => return Err(FsError::NotFound(norm)),
        };
        if self.snapshot(slot)?.is_dir() {
            let children = self.child_paths(&norm)?;
            if !children.is_empty() && !recursive {
                return if force { Ok(()) } else { Err(FsError::NotEmpty(norm)) };
            }
            for child in children {
                self.delete(&child, recursive, force)?;
            }
        }
        self.release(slot, &norm)
    }
}

#[cfg(test)]
#[path = "../../api/fs-tests/mutate_test.rs"]
mod tests;
