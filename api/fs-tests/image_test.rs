use super::FSName;
use crate::error::FsError;
use arkfs_api::controller::Container;
use arkfs_api::fs::{ImageSupport, LookupSupport, TreeSupport};
use arkfs_api::types::{SuperBlock, DATA_OFFSET, MAX_FILES};
use std::path::PathBuf;

#[path = "utils.rs"]
mod utils;

fn disk_prep_path(name: &str) -> PathBuf {
    utils::disk_prep_path(&("fs-images-image-".to_string() + name), "img")
}

#[test]
fn create_then_open_empty() {
    let path = disk_prep_path("create");
    FSName::create_image(&path).unwrap();

    // metadata only: superblock plus a zeroed table, no data region bytes
    assert_eq!(std::fs::metadata(&path).unwrap().len(), *DATA_OFFSET);

    let fs = FSName::open_image(&path).unwrap();
    let sb = fs.superblock();
    assert!(sb.valid());
    assert_eq!(sb.num_files, 0);
    assert_eq!(sb.max_files, MAX_FILES as u32);
    assert_eq!(sb.data_offset, *DATA_OFFSET);
    assert!(fs.live_slots().is_empty());
    fs.close_image().unwrap();

    // closing and reopening an untouched image stays empty
    let fs = FSName::open_image(&path).unwrap();
    assert_eq!(fs.superblock().num_files, 0);
    fs.close_image().unwrap();

    utils::disk_unprep_path(&path);
}

#[test]
fn bad_magic_is_rejected() {
    // a one-byte file cannot even hold the magic
    let path = disk_prep_path("badmagic-short");
    std::fs::write(&path, [0x42u8]).unwrap();
    assert!(matches!(FSName::open_image(&path), Err(FsError::BadMagic)));
    utils::disk_unprep_path(&path);

    // a large enough file with the wrong magic is just as foreign
    let path = disk_prep_path("badmagic-wrong");
    std::fs::write(&path, vec![0u8; 4096]).unwrap();
    assert!(matches!(FSName::open_image(&path), Err(FsError::BadMagic)));
    utils::disk_unprep_path(&path);
}

#[test]
fn open_missing_file_is_io() {
    let path = disk_prep_path("missing");
    let missing = path.parent().unwrap().join("never-created");
    assert!(matches!(FSName::open_image(&missing), Err(FsError::Io(_))));
    std::fs::write(&path, b"x").unwrap();
    utils::disk_unprep_path(&path);
}

#[test]
fn close_persists_namespace() {
    let path = disk_prep_path("persist");
    FSName::create_image(&path).unwrap();

    let mut fs = FSName::open_image(&path).unwrap();
    fs.mkdir("/docs").unwrap();
    fs.close_image().unwrap();

    let fs = FSName::open_image(&path).unwrap();
    assert_eq!(fs.superblock().num_files, 1);
    assert!(fs.lookup_path("/docs").is_some());
    fs.close_image().unwrap();
    utils::disk_unprep_path(&path);
}

#[test]
fn flush_makes_state_visible_without_close() {
    let path = disk_prep_path("flush");
    FSName::create_image(&path).unwrap();

    let mut fs = FSName::open_image(&path).unwrap();
    fs.mkdir("/kept").unwrap();
    fs.flush_image().unwrap();
    // dropped without close: everything after the flush is abandoned,
    // everything before it must survive
    fs.mkdir("/lost-unless-closed").unwrap();
    drop(fs);

    let fs = FSName::open_image(&path).unwrap();
    assert!(fs.lookup_path("/kept").is_some());
    assert_eq!(fs.lookup_path("/lost-unless-closed"), None);
    assert_eq!(fs.superblock().num_files, 1);
    fs.close_image().unwrap();
    utils::disk_unprep_path(&path);
}

#[test]
fn table_scan_overrules_stored_counter() {
    let path = disk_prep_path("counter");
    FSName::create_image(&path).unwrap();
    let mut fs = FSName::open_image(&path).unwrap();
    fs.mkdir("/a").unwrap();
    fs.close_image().unwrap();

    // tamper with the counter, leaving the table alone
    let mut dev = Container::open_rw(&path).unwrap();
    let mut sb = dev.read_superblock().unwrap();
    sb.num_files = 5;
    dev.write_superblock(&sb).unwrap();
    drop(dev);

    let fs = FSName::open_image(&path).unwrap();
    assert_eq!(fs.superblock().num_files, 1);
    fs.close_image().unwrap();
    utils::disk_unprep_path(&path);
}

#[test]
fn tampered_magic_after_close() {
    let path = disk_prep_path("retamper");
    FSName::create_image(&path).unwrap();

    let mut dev = Container::open_rw(&path).unwrap();
    dev.write_superblock(&SuperBlock {
        magic: 0xDEAD_BEEF,
        ..SuperBlock::new_empty()
    })
    .unwrap();
    drop(dev);

    assert!(matches!(FSName::open_image(&path), Err(FsError::BadMagic)));
    utils::disk_unprep_path(&path);
}
