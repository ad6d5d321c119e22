//! The host-file device backing a container image.
//!
//! A [`Container`](struct.Container.html) owns the open host file and offers
//! offset-addressed reads and writes on it, streaming copies in `BLOCK_SIZE`
//! chunks, and record-level I/O on the superblock and the inode table. The
//! metadata region is fixed-size, but the data region grows on every append,
//! so the device works on a plain `File` with explicit seeks rather than a
//! fixed-length mapping.
//!
//! Nothing here interprets paths or maintains namespace invariants; that is
//! the engine's job. The controller's contract is purely positional: byte
//! ranges and slot indices.

use super::error;
use super::error::ApiError;
use super::types::{Buffer, Inode, SuperBlock, INODE_DISK_SIZE, MAX_FILES, SUPERBLOCK_SIZE};
use log::debug;
use std::{
    fs::{File, OpenOptions},
    io::prelude::*,
    io::SeekFrom,
    path::{Path, PathBuf},
};

/// Chunk size for streaming copies, re-exported next to the helpers using it.
pub use super::types::BLOCK_SIZE;

/// Byte position of inode slot `k` in the container.
pub fn slot_offset(slot: u32) -> u64 {
    *SUPERBLOCK_SIZE + u64::from(slot) * INODE_DISK_SIZE
}

/// An open container image on the host filesystem.
///
/// One `Container` is owned by exactly one filesystem handle; reads and
/// writes are sequential over the single file descriptor.
#[derive(Debug)]
pub struct Container {
    path: PathBuf,
    file: File,
}

impl Container {
    /// Create (or truncate) the host file at `path` and open it read/write
    pub fn create<P: AsRef<Path>>(path: P) -> error::Result<Container> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        debug!("created container file {}", path.as_ref().display());
        Ok(Container {
            path: path.as_ref().to_path_buf(),
            file,
        })
    }

    /// Open an existing host file at `path` read/write
    pub fn open_rw<P: AsRef<Path>>(path: P) -> error::Result<Container> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        Ok(Container {
            path: path.as_ref().to_path_buf(),
            file,
        })
    }

    /// Path of the host file backing this container
    pub fn host_path(&self) -> &Path {
        &self.path
    }

    /// Current length of the host file in bytes
    pub fn len(&self) -> error::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Whether the host file is empty
    pub fn is_empty(&self) -> error::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read exactly `buf.len()` bytes at `offset`
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> error::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Write all of `buf` at `offset`, extending the file if needed
    pub fn write_at(&mut self, offset: u64, buf: &[u8]) -> error::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    /// Push all outstanding writes to the host filesystem
    pub fn flush(&mut self) -> error::Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Read the superblock at offset 0.
    /// A file shorter than the superblock surfaces as an I/O error here;
    /// the engine decides how to classify it.
    pub fn read_superblock(&mut self) -> error::Result<SuperBlock> {
        let mut raw = vec![0u8; *SUPERBLOCK_SIZE as usize];
        self.read_at(0, &mut raw)?;
        Buffer::new(raw.into_boxed_slice()).deserialize_from::<SuperBlock>(0)
    }

    /// Write the superblock at offset 0
    pub fn write_superblock(&mut self, sb: &SuperBlock) -> error::Result<()> {
        let mut buf = Buffer::new_zero(*SUPERBLOCK_SIZE);
        buf.serialize_into(sb, 0)?;
        self.write_at(0, buf.contents_as_ref())
    }

    /// Read the inode record in slot `slot`
    pub fn read_slot(&mut self, slot: u32) -> error::Result<Inode> {
        if slot as usize >= MAX_FILES {
            return Err(ApiError::ControllerInput("inode slot out of range"));
        }
        let mut raw = vec![0u8; INODE_DISK_SIZE as usize];
        self.read_at(slot_offset(slot), &mut raw)?;
        Inode::decode_from(&Buffer::new(raw.into_boxed_slice()))
    }

    /// Write the inode record `ino` into slot `slot`
    pub fn write_slot(&mut self, slot: u32, ino: &Inode) -> error::Result<()> {
        if slot as usize >= MAX_FILES {
            return Err(ApiError::ControllerInput("inode slot out of range"));
        }
        let mut buf = Buffer::new_zero(INODE_DISK_SIZE);
        ino.encode_into(&mut buf)?;
        self.write_at(slot_offset(slot), buf.contents_as_ref())
    }

    /// Stream `src` into the container starting at `offset`, in `BLOCK_SIZE`
    /// chunks, until `src` is exhausted. Returns the number of bytes written.
    pub fn copy_in<R: Read>(&mut self, offset: u64, src: &mut R) -> error::Result<u64> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut chunk = vec![0u8; BLOCK_SIZE];
        let mut total = 0u64;
        loop {
            let n = src.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            self.file.write_all(&chunk[..n])?;
            total += n as u64;
        }
        Ok(total)
    }

    /// Stream `len` container bytes starting at `offset` into `dst`, in
    /// `BLOCK_SIZE` chunks
    pub fn copy_out<W: Write>(&mut self, offset: u64, len: u64, dst: &mut W) -> error::Result<()> {
        let mut chunk = vec![0u8; BLOCK_SIZE];
        let mut pos = offset;
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(BLOCK_SIZE as u64) as usize;
            self.read_at(pos, &mut chunk[..n])?;
            dst.write_all(&chunk[..n])?;
            pos += n as u64;
            remaining -= n as u64;
        }
        Ok(())
    }

    /// Copy `len` bytes from `src_offset` to `dst_offset` inside the
    /// container, alternating chunked reads and writes. The ranges are
    /// expected not to overlap; the data region is append-only so the
    /// destination always lies past the source.
    pub fn copy_within(
        &mut self,
        src_offset: u64,
        len: u64,
        dst_offset: u64,
    ) -> error::Result<()> {
        let mut chunk = vec![0u8; BLOCK_SIZE];
        let mut done = 0u64;
        while done < len {
            let n = (len - done).min(BLOCK_SIZE as u64) as usize;
            self.read_at(src_offset + done, &mut chunk[..n])?;
            self.write_at(dst_offset + done, &chunk[..n])?;
            done += n as u64;
        }
        Ok(())
    }

    /// Open a bounded reader over `len` bytes starting at `offset`
    pub fn reader(&mut self, offset: u64, len: u64) -> FileReader<'_> {
        FileReader {
            container: self,
            pos: offset,
            remaining: len,
        }
    }
}

/// A finite, non-restartable byte stream over one file's payload.
///
/// Yields the payload through `std::io::Read`; each `read` call returns at
/// most one `BLOCK_SIZE` chunk. Once exhausted it stays exhausted; re-reading
/// a file means asking the engine for a fresh reader.
#[derive(Debug)]
pub struct FileReader<'a> {
    container: &'a mut Container,
    pos: u64,
    remaining: u64,
}

impl<'a> FileReader<'a> {
    /// Bytes left in the stream
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<'a> Read for FileReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = (buf.len() as u64)
            .min(self.remaining)
            .min(BLOCK_SIZE as u64) as usize;
        if n == 0 {
            return Ok(0);
        }
        self.container.file.seek(SeekFrom::Start(self.pos))?;
        self.container.file.read_exact(&mut buf[..n])?;
        self.pos += n as u64;
        self.remaining -= n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileKind;
    use std::fs::{create_dir_all, remove_dir, remove_file};
    use std::io::Cursor;
    use std::path::PathBuf;

    //Each test gets its own directory so the suite can run in parallel
    fn prep_path(name: &str) -> PathBuf {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("container-images-".to_string() + name);
        path.push("img");
        if path.exists() {
            remove_file(&path).unwrap();
        }
        create_dir_all(path.parent().unwrap()).unwrap();
        path
    }

    fn unprep_path(path: &PathBuf) {
        remove_file(path).unwrap();
        remove_dir(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn raw_roundtrip() {
        let path = prep_path("raw");
        let mut c = Container::create(&path).unwrap();

        c.write_at(10, &[1, 2, 3, 4, 5]).unwrap();
        let mut out = [0u8; 5];
        c.read_at(10, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5]);
        // the gap before offset 10 reads back as zeroes
        let mut gap = [9u8; 10];
        c.read_at(0, &mut gap).unwrap();
        assert_eq!(gap, [0u8; 10]);
        // reading past the end is an error
        assert!(c.read_at(100, &mut out).is_err());

        drop(c);
        unprep_path(&path);
    }

    #[test]
    fn superblock_and_slots() {
        let path = prep_path("slots");
        let mut c = Container::create(&path).unwrap();

        let sb = SuperBlock::new_empty();
        c.write_superblock(&sb).unwrap();
        assert_eq!(c.read_superblock().unwrap(), sb);

        let ino = Inode::new_dir("docs", "/", 42);
        c.write_slot(3, &ino).unwrap();
        let back = c.read_slot(3).unwrap();
        assert_eq!(back, ino);
        assert_eq!(back.kind, FileKind::Directory);
        assert!(c.read_slot(MAX_FILES as u32).is_err());

        drop(c);
        unprep_path(&path);
    }

    #[test]
    fn streaming_copies() {
        let path = prep_path("stream");
        let mut c = Container::create(&path).unwrap();

        // payload larger than one chunk to exercise the loop
        let payload: Vec<u8> = (0..BLOCK_SIZE + 100).map(|i| (i % 251) as u8).collect();
        let written = c.copy_in(0, &mut Cursor::new(&payload)).unwrap();
        assert_eq!(written, payload.len() as u64);

        let mut out = Vec::new();
        c.copy_out(0, written, &mut out).unwrap();
        assert_eq!(out, payload);

        c.copy_within(0, written, written).unwrap();
        let mut dup = Vec::new();
        c.copy_out(written, written, &mut dup).unwrap();
        assert_eq!(dup, payload);

        let mut r = c.reader(0, 10);
        let mut first = [0u8; 4];
        r.read_exact(&mut first).unwrap();
        assert_eq!(&first, &payload[..4]);
        assert_eq!(r.remaining(), 6);

        drop(c);
        unprep_path(&path);
    }
}
