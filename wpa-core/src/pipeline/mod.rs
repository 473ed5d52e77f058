// wpa-core/src/pipeline/mod.rs
pub mod reference;
pub mod scratch;

pub use reference::{ReferenceBuild, ReferenceBuilder};
pub use scratch::{teardown_scratch, ScratchLock};
