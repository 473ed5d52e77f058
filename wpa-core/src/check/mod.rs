// wpa-core/src/check/mod.rs
pub mod detect;
pub mod installed;

pub use detect::{ensure_wordpress, is_wordpress};
pub use installed::VersionResolver;
