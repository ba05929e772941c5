//! Artifacts written into the output tree.

pub mod manifest;
pub mod writer;

pub use manifest::Manifest;
pub use writer::{Publisher, validate_output_path};
