//! PDF assembly of scanned sheets.

pub mod assembler;
pub mod page_image;

pub use assembler::DocumentAssembler;
