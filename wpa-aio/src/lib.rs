// wpa-aio/src/lib.rs
//! Local IO for wpa: archive extraction, content fingerprints, tree walking.

pub mod checksum;
pub mod extract;
pub mod fs;
pub mod tree;

pub use checksum::sha256_file;
pub use extract::{extract_zip, ZipExtractor};
pub use tree::{relative_key, DirectoryTree, TreeEntry};
