// wpa-core/src/compare/mod.rs
pub mod tree;
pub mod uploads;

pub use tree::TreeComparator;
pub use uploads::UploadScanner;
