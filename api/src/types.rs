//! On-disk types of the container image, their codecs, and the layout
//! constants shared by every layer.
//!
//! A container is a single host file laid out as
//! `[SuperBlock | inode table | data region]`. The superblock and the inode
//! table live at fixed offsets; the data region is append-only and holds raw
//! file payloads. All integers are little-endian on disk.

use super::error;
use super::error::ApiError;
use lazy_static::lazy_static;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::prelude::*;
use std::io::{Cursor, SeekFrom};

/// Magic number identifying a container image ("GMSF" read little-endian).
pub const FS_MAGIC: u32 = 0x4653_4D47;
/// On-disk format version written by `create`.
pub const FS_VERSION: u32 = 1;
/// Number of slots in the inode table.
pub const MAX_FILES: usize = 1024;
/// Size of the `filename` field of an inode record, NUL terminator included.
pub const MAX_FILENAME: usize = 256;
/// Size of the `parent_path` field of an inode record, NUL terminator
/// included. Also the upper bound on any absolute path in the namespace.
pub const MAX_PATH: usize = 2048;
/// Chunk size used for all streaming I/O. This is purely an I/O granularity;
/// the data region is byte-addressed, not a block device.
pub const BLOCK_SIZE: usize = 4096;

const OFF_NAME: u64 = 0;
const OFF_PARENT: u64 = MAX_FILENAME as u64;
const OFF_KIND: u64 = OFF_PARENT + MAX_PATH as u64;
// u32 kind plus 4 bytes of padding keep the u64 fields naturally aligned
const OFF_SIZE: u64 = OFF_KIND + 8;
const OFF_OFFSET: u64 = OFF_SIZE + 8;
const OFF_CREATED: u64 = OFF_OFFSET + 8;
const OFF_MODIFIED: u64 = OFF_CREATED + 8;

/// Size of one inode record on disk. Slot `k` lives at
/// `SUPERBLOCK_SIZE + k * INODE_DISK_SIZE`.
pub const INODE_DISK_SIZE: u64 = OFF_MODIFIED + 8;

lazy_static! {
    /// Size of the serialized superblock in bytes.
    /// Computed at runtime from the bincode encoding of the default value,
    /// so the constant can never drift from the codec.
    pub static ref SUPERBLOCK_SIZE: u64 =
        bincode::serialize(&SuperBlock::default()).unwrap().len() as u64;

    /// First byte of the data region: everything before it is metadata.
    pub static ref DATA_OFFSET: u64 =
        *SUPERBLOCK_SIZE + MAX_FILES as u64 * INODE_DISK_SIZE;
}

/// Buffer abstraction, representing a byte range read from or destined for
/// the container. Supports bounds-checked raw access, plus (de)serialization
/// of structures implementing the serde traits.
#[derive(Debug, PartialEq, Eq)]
pub struct Buffer {
    contents: Box<[u8]>,
}

impl Buffer {
    /// Create a new buffer owning the given `data`
    pub fn new(data: Box<[u8]>) -> Buffer {
        Buffer { contents: data }
    }

    /// Create an all-zero buffer of length `len`
    pub fn new_zero(len: u64) -> Buffer {
        Buffer {
            contents: vec![0; len as usize].into_boxed_slice(),
        }
    }

    /// Length of the buffer in bytes
    pub fn len(&self) -> u64 {
        self.contents.len() as u64
    }

    /// Whether the buffer has length zero
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Borrow the raw contents
    pub fn contents_as_ref(&self) -> &[u8] {
        &self.contents
    }

    /// Read `data.len()` bytes starting at `offset` into `data`.
    /// Errors without reading anything if the range falls outside the buffer.
    pub fn read_data(&self, data: &mut [u8], offset: u64) -> error::Result<()> {
        if offset + data.len() as u64 > self.len() {
            return Err(ApiError::BufferInput(
                "read beyond the bounds of the buffer",
            ));
        }
        let mut c = Cursor::new(&self.contents);
        c.seek(SeekFrom::Start(offset))?;
        c.read_exact(data).map_err(|e| e.into())
    }

    /// Write all of `data` into the buffer starting at `offset`.
    /// Errors without writing anything if the range falls outside the buffer.
    pub fn write_data(&mut self, data: &[u8], offset: u64) -> error::Result<()> {
        if offset + data.len() as u64 > self.len() {
            return Err(ApiError::BufferInput(
                "write beyond the bounds of the buffer",
            ));
        }
        let mut c = Cursor::new(&mut self.contents[..]);
        c.seek(SeekFrom::Start(offset))?;
        c.write_all(data).map_err(|e| e.into())
    }

    /// Deserialize a value of type `S` from the buffer, starting at `offset`
    pub fn deserialize_from<S>(&self, offset: u64) -> error::Result<S>
    where
        S: DeserializeOwned,
    {
        let mut c = Cursor::new(&self.contents);
        c.seek(SeekFrom::Start(offset))?;
        Ok(bincode::deserialize_from(c)?)
    }

    /// Serialize `stru` into the buffer at `offset`.
    /// Goes through `write_data` so out-of-bounds writes are rejected instead
    /// of growing the buffer.
    pub fn serialize_into<S>(&mut self, stru: &S, offset: u64) -> error::Result<()>
    where
        S: Serialize,
    {
        let stru_bin = bincode::serialize(stru)?;
        self.write_data(&stru_bin, offset)
    }
}

/// Filesystem metadata stored in the first bytes of the container.
///
/// Serialized with bincode's legacy configuration (fixed-width little-endian
/// integers, fields in declaration order), which matches the wire format
/// byte for byte: `magic | version | num_files | max_files | data_offset`.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    /// Must equal [`FS_MAGIC`](constant.FS_MAGIC.html); anything else is not
    /// a container image
    pub magic: u32,
    /// On-disk format version
    pub version: u32,
    /// Number of live (non-free) slots in the inode table
    pub num_files: u32,
    /// Capacity of the inode table; always [`MAX_FILES`](constant.MAX_FILES.html)
    pub max_files: u32,
    /// First byte of the data region
    pub data_offset: u64,
}

impl SuperBlock {
    /// The superblock of a freshly created, empty container
    pub fn new_empty() -> SuperBlock {
        SuperBlock {
            magic: FS_MAGIC,
            version: FS_VERSION,
            num_files: 0,
            max_files: MAX_FILES as u32,
            data_offset: *DATA_OFFSET,
        }
    }

    /// Whether this superblock identifies a container image
    pub fn valid(&self) -> bool {
        self.magic == FS_MAGIC
    }
}

/// Kind of entry an inode record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file: `size` payload bytes at `offset` in the data region
    File,
    /// Directory: pure namespace node, `size` and `offset` are zero
    Directory,
}

impl Default for FileKind {
    fn default() -> FileKind {
        FileKind::File
    }
}

impl FileKind {
    fn to_u32(self) -> u32 {
        match self {
            FileKind::File => 0,
            FileKind::Directory => 1,
        }
    }

    fn from_u32(v: u32) -> FileKind {
        if v == 0 {
            FileKind::File
        } else {
            FileKind::Directory
        }
    }
}

/// One entry of the inode table, in memory.
///
/// A slot is *free* iff `name` is empty; the zeroed record a fresh container
/// stores in every slot decodes to exactly that. For live entries `parent`
/// is the absolute path of the containing directory (`/` for top-level
/// entries) and `name` the final path component.
///
/// On disk the record occupies [`INODE_DISK_SIZE`](constant.INODE_DISK_SIZE.html)
/// bytes: two NUL-terminated fixed buffers for `name` and `parent`, then the
/// scalars, padded so the 64-bit fields stay naturally aligned.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Inode {
    /// Final path component; empty marks the slot free
    pub name: String,
    /// Absolute path of the parent directory
    pub parent: String,
    /// File or directory
    pub kind: FileKind,
    /// Payload length in bytes; zero for directories
    pub size: u64,
    /// Payload position in the container; zero for directories
    pub offset: u64,
    /// Creation time, unix seconds
    pub created: i64,
    /// Last modification time, unix seconds
    pub modified: i64,
}

impl Inode {
    /// A fresh directory entry
    pub fn new_dir(name: &str, parent: &str, now: i64) -> Inode {
        Inode {
            name: name.to_string(),
            parent: parent.to_string(),
            kind: FileKind::Directory,
            size: 0,
            offset: 0,
            created: now,
            modified: now,
        }
    }

    /// A fresh file entry with `size` payload bytes at `offset`
    pub fn new_file(name: &str, parent: &str, size: u64, offset: u64, now: i64) -> Inode {
        Inode {
            name: name.to_string(),
            parent: parent.to_string(),
            kind: FileKind::File,
            size,
            offset,
            created: now,
            modified: now,
        }
    }

    /// Whether this record marks a free slot
    pub fn is_free(&self) -> bool {
        self.name.is_empty()
    }

    /// Whether this record describes a directory
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Absolute path of this entry: `parent` joined with `name`, with the
    /// separator merged when the parent is the root
    pub fn full_path(&self) -> String {
        if self.parent == "/" {
            format!("/{}", self.name)
        } else {
            format!("{}/{}", self.parent, self.name)
        }
    }

    /// Encode this record into `buf`, which must hold at least
    /// `INODE_DISK_SIZE` bytes. Overlong names and parent paths are truncated
    /// to leave room for the NUL terminator.
    pub fn encode_into(&self, buf: &mut Buffer) -> error::Result<()> {
        let mut name_bytes = [0u8; MAX_FILENAME];
        let n = self.name.as_bytes().len().min(MAX_FILENAME - 1);
        name_bytes[..n].copy_from_slice(&self.name.as_bytes()[..n]);
        buf.write_data(&name_bytes, OFF_NAME)?;

        let mut parent_bytes = [0u8; MAX_PATH];
        let n = self.parent.as_bytes().len().min(MAX_PATH - 1);
        parent_bytes[..n].copy_from_slice(&self.parent.as_bytes()[..n]);
        buf.write_data(&parent_bytes, OFF_PARENT)?;

        buf.write_data(&self.kind.to_u32().to_le_bytes(), OFF_KIND)?;
        buf.write_data(&[0u8; 4], OFF_KIND + 4)?;
        buf.write_data(&self.size.to_le_bytes(), OFF_SIZE)?;
        buf.write_data(&self.offset.to_le_bytes(), OFF_OFFSET)?;
        buf.write_data(&self.created.to_le_bytes(), OFF_CREATED)?;
        buf.write_data(&self.modified.to_le_bytes(), OFF_MODIFIED)?;
        Ok(())
    }

    /// Decode a record from the first `INODE_DISK_SIZE` bytes of `buf`
    pub fn decode_from(buf: &Buffer) -> error::Result<Inode> {
        let mut name_bytes = [0u8; MAX_FILENAME];
        buf.read_data(&mut name_bytes, OFF_NAME)?;
        let mut parent_bytes = [0u8; MAX_PATH];
        buf.read_data(&mut parent_bytes, OFF_PARENT)?;

        let mut u32_bytes = [0u8; 4];
        buf.read_data(&mut u32_bytes, OFF_KIND)?;
        let kind = FileKind::from_u32(u32::from_le_bytes(u32_bytes));

        let mut u64_bytes = [0u8; 8];
        buf.read_data(&mut u64_bytes, OFF_SIZE)?;
        let size = u64::from_le_bytes(u64_bytes);
        buf.read_data(&mut u64_bytes, OFF_OFFSET)?;
        let offset = u64::from_le_bytes(u64_bytes);
        buf.read_data(&mut u64_bytes, OFF_CREATED)?;
        let created = i64::from_le_bytes(u64_bytes);
        buf.read_data(&mut u64_bytes, OFF_MODIFIED)?;
        let modified = i64::from_le_bytes(u64_bytes);

        Ok(Inode {
            name: nul_terminated(&name_bytes),
            parent: nul_terminated(&parent_bytes),
            kind,
            size,
            offset,
            created,
            modified,
        })
    }
}

/// Decode a NUL-terminated byte buffer into an owned string, lossily
fn nul_terminated(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod codec_tests {
    use super::*;

    #[test]
    fn superblock_wire_size() {
        // magic, version, num_files, max_files as u32 plus data_offset as u64
        assert_eq!(*SUPERBLOCK_SIZE, 24);
        assert_eq!(*DATA_OFFSET, 24 + 1024 * INODE_DISK_SIZE);

        let sb = SuperBlock::new_empty();
        let bin = bincode::serialize(&sb).unwrap();
        // little-endian magic in the first four bytes
        assert_eq!(bin[0..4], [0x47u8, 0x4D, 0x53, 0x46]);
        assert!(sb.valid());
        assert!(!SuperBlock::default().valid());
    }

    #[test]
    fn inode_roundtrip() {
        let ino = Inode::new_file("note.txt", "/docs", 6, 2_400_280, 1_700_000_000);
        let mut buf = Buffer::new_zero(INODE_DISK_SIZE);
        ino.encode_into(&mut buf).unwrap();
        let back = Inode::decode_from(&buf).unwrap();
        assert_eq!(back, ino);
        assert_eq!(back.full_path(), "/docs/note.txt");
        assert!(!back.is_free());
        assert!(!back.is_dir());
    }

    #[test]
    fn zeroed_record_is_free() {
        let buf = Buffer::new_zero(INODE_DISK_SIZE);
        let ino = Inode::decode_from(&buf).unwrap();
        assert!(ino.is_free());
        assert_eq!(ino, Inode::default());
    }

    #[test]
    fn root_parent_merges_separator() {
        let dir = Inode::new_dir("docs", "/", 0);
        assert_eq!(dir.full_path(), "/docs");
        assert!(dir.is_dir());
        let nested = Inode::new_dir("img", "/docs", 0);
        assert_eq!(nested.full_path(), "/docs/img");
    }

    #[test]
    fn overlong_name_truncates_with_terminator() {
        let long = "x".repeat(MAX_FILENAME + 10);
        let ino = Inode::new_file(&long, "/", 0, 0, 0);
        let mut buf = Buffer::new_zero(INODE_DISK_SIZE);
        ino.encode_into(&mut buf).unwrap();
        let back = Inode::decode_from(&buf).unwrap();
        assert_eq!(back.name.len(), MAX_FILENAME - 1);
    }

    #[test]
    fn buffer_rejects_out_of_bounds() {
        let mut buf = Buffer::new_zero(8);
        assert!(buf.write_data(&[1, 2, 3], 6).is_err());
        let mut out = [0u8; 3];
        assert!(buf.read_data(&mut out, 7).is_err());
        assert!(buf.write_data(&[1, 2], 6).is_ok());
    }
}
