#![allow(dead_code)]

//Shared helpers for the engine's integration tests
use std::fs::{create_dir_all, remove_dir_all, remove_file, write};
use std::path::{Path, PathBuf};

//Create the folder 'name' under the crate root and return the path of an
//image file 'img_name' inside it; a stale image from an earlier failed run
//is removed first.
//*WARNING* tests run in parallel, every test must pass its own unique 'name'
pub fn disk_prep_path(name: &str, img_name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push(name);
    path.push(img_name);

    if path.exists() {
        remove_file(&path).unwrap();
    }
    create_dir_all(path.parent().unwrap()).unwrap();

    path
}

//Remove the image and its folder, host-side fixtures included
pub fn disk_unprep_path(path: &Path) {
    remove_dir_all(path.parent().unwrap()).unwrap();
}

//Drop a host-side fixture file next to the image, returning its path
pub fn host_file(img_path: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let p = img_path.parent().unwrap().join(name);
    write(&p, contents).unwrap();
    p
}

//Contents of a host-side file
pub fn host_contents(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}
