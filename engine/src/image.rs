//! The container filesystem core: image lifecycle and slot bookkeeping.
//!
//! [`ContainerFs`](struct.ContainerFs.html) owns the four pieces every
//! operation touches: the host-file device, the in-memory superblock, the
//! path index, and the inode cache, plus a liveness bitmap over the slot
//! table so allocation never scans the disk. Opening an image rebuilds the
//! index and the bitmap from a single pass over the inode table; the cache
//! starts cold and fills on demand.

use crate::cache::{InodeCache, LRU_CACHE_SIZE};
use crate::error::{FsError, Result};
use crate::index::PathIndex;
use arkfs_api::controller::Container;
use arkfs_api::fs::{ImageSupport, InodeSupport};
use arkfs_api::types::{Inode, SuperBlock, MAX_FILES, SUPERBLOCK_SIZE};
use bit_field::BitArray;
use log::{debug, warn};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// The filesystem type of this crate, under the name the shared tests use.
pub type FSName = ContainerFs;

/// Liveness bitmap over the inode table: one bit per slot.
/// Rebuilt on open; consulted for allocation and for every whole-table walk.
#[derive(Debug)]
pub(crate) struct SlotMap {
    words: [u64; MAX_FILES / 64],
}

impl SlotMap {
    fn new() -> SlotMap {
        SlotMap {
            words: [0; MAX_FILES / 64],
        }
    }

    pub(crate) fn set(&mut self, slot: u32) {
        self.words.set_bit(slot as usize, true);
    }

    pub(crate) fn clear(&mut self, slot: u32) {
        self.words.set_bit(slot as usize, false);
    }

    pub(crate) fn contains(&self, slot: u32) -> bool {
        self.words.get_bit(slot as usize)
    }

    /// Lowest slot whose bit is clear
    pub(crate) fn first_free(&self) -> Option<u32> {
        for (w, word) in self.words.iter().enumerate() {
            if *word != u64::MAX {
                return Some(w as u32 * 64 + (!word).trailing_zeros());
            }
        }
        None
    }

    /// All live slots in ascending order
    pub(crate) fn live_slots(&self) -> Vec<u32> {
        (0..MAX_FILES as u32).filter(|&s| self.contains(s)).collect()
    }

    pub(crate) fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }
}

/// A mounted container image.
///
/// One value of this type is the single owner of the underlying host file;
/// all mutation and enumeration goes through it. Dropping it without
/// [`close_image`](../../arkfs_api/fs/trait.ImageSupport.html#tymethod.close_image)
/// abandons unwritten cache state, which is exactly the durability contract:
/// nothing is promised before a clean close.
#[derive(Debug)]
pub struct ContainerFs {
    pub(crate) dev: Container,
    pub(crate) sb: SuperBlock,
    pub(crate) index: PathIndex,
    pub(crate) cache: InodeCache,
    pub(crate) live: SlotMap,
}

/// Seconds since the unix epoch, negative before it
pub(crate) fn unix_now() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

impl ContainerFs {
    /// Snapshot the record in `slot` by value: resident copy first, disk
    /// otherwise. Never changes cache residency.
    pub(crate) fn snapshot(&mut self, slot: u32) -> Result<Inode> {
        if let Some(ino) = self.cache.peek(slot) {
            return Ok(ino.clone());
        }
        Ok(self.dev.read_slot(slot)?)
    }

    /// First byte past the last live payload; the append position for the
    /// next file. Walks the live file slots, preferring cached records, so
    /// a not-yet-written-back file still claims its extent.
    pub(crate) fn find_data_end(&mut self) -> Result<u64> {
        let mut end = self.sb.data_offset;
        for slot in self.live.live_slots() {
            let ino = self.snapshot(slot)?;
            if !ino.is_free() && !ino.is_dir() {
                end = end.max(ino.offset + ino.size);
            }
        }
        Ok(end)
    }

    fn mount(mut dev: Container, cache_slots: usize) -> Result<ContainerFs> {
        if dev.len()? < *SUPERBLOCK_SIZE {
            return Err(FsError::BadMagic);
        }
        let mut sb = dev.read_superblock()?;
        if !sb.valid() {
            return Err(FsError::BadMagic);
        }

        let mut index = PathIndex::new();
        let mut live = SlotMap::new();
        for slot in 0..MAX_FILES as u32 {
            let ino = dev.read_slot(slot)?;
            if ino.is_free() {
                continue;
            }
            index.insert(&ino.full_path(), slot);
            live.set(slot);
        }

        let counted = live.count();
        if counted != sb.num_files {
            warn!(
                "superblock counts {} entries but the table holds {}; trusting the table",
                sb.num_files, counted
            );
            sb.num_files = counted;
        }
        debug!(
            "mounted container {} with {} live entries",
            dev.host_path().display(),
            counted
        );

        Ok(ContainerFs {
            dev,
            sb,
            index,
            cache: InodeCache::new(cache_slots),
            live,
        })
    }
}

impl ImageSupport for ContainerFs {
    type Error = FsError;

    fn create_image<P: AsRef<Path>>(path: P) -> Result<()> {
        let mut dev = Container::create(path)?;
        dev.write_superblock(&SuperBlock::new_empty())?;
        let free = Inode::default();
        for slot in 0..MAX_FILES as u32 {
            dev.write_slot(slot, &free)?;
        }
        dev.flush()?;
        debug!("created empty container {}", dev.host_path().display());
        Ok(())
    }

    fn open_image<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_image_with(path, LRU_CACHE_SIZE)
    }

    fn open_image_with<P: AsRef<Path>>(path: P, cache_slots: usize) -> Result<Self> {
        let dev = Container::open_rw(path)?;
        Self::mount(dev, cache_slots)
    }

    fn close_image(mut self) -> Result<()> {
        self.flush_image()
    }

    fn flush_image(&mut self) -> Result<()> {
        self.cache.flush(&mut self.dev)?;
        self.dev.write_superblock(&self.sb)?;
        self.dev.flush()?;
        Ok(())
    }

    fn superblock(&self) -> &SuperBlock {
        &self.sb
    }
}

impl InodeSupport for ContainerFs {
    fn inode_get(&mut self, slot: u32) -> Result<Inode> {
        self.snapshot(slot)
    }

    fn is_cached(&self, slot: u32) -> bool {
        self.cache.is_cached(slot)
    }
}

#[cfg(test)]
mod slotmap_tests {
    use super::*;

    #[test]
    fn allocation_order_and_reuse() {
        let mut map = SlotMap::new();
        assert_eq!(map.first_free(), Some(0));
        map.set(0);
        map.set(1);
        assert_eq!(map.first_free(), Some(2));
        map.clear(0);
        // freed slots are reused lowest-first
        assert_eq!(map.first_free(), Some(0));
        assert_eq!(map.count(), 1);
        assert_eq!(map.live_slots(), vec![1]);
    }

    #[test]
    fn fills_completely() {
        let mut map = SlotMap::new();
        for slot in 0..MAX_FILES as u32 {
            assert_eq!(map.first_free(), Some(slot));
            map.set(slot);
        }
        assert_eq!(map.first_free(), None);
        assert_eq!(map.count(), MAX_FILES as u32);
    }
}

#[cfg(test)]
#[path = "../../api/fs-tests/image_test.rs"]
mod tests;
