//! Class vocabulary, raw object annotations and the label/box normalizer.

mod common;

pub mod annotation;
pub use annotation::*;

pub mod error;
pub use error::*;

pub mod normalize;
pub use normalize::*;

pub mod vocabulary;
pub use vocabulary::*;
