//! Dataset loading, image preprocessing and batch collation.

mod collate;
mod dataset;
mod loader;
mod record;
mod transform;
mod voc;

pub use collate::*;
pub use dataset::*;
pub use loader::*;
pub use record::*;
pub use transform::*;
pub use voc::*;
