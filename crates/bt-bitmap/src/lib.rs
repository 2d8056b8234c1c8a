//! Compressed bitmap container and ordered key→bitmap index (spec §4.1–4.2).

mod container;

pub mod bitmap;
pub mod index;

pub use bitmap::Bitmap;
pub use index::{OrderedIndex, RangeEnd};
