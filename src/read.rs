//! Reader-based compression/decompression streams.
//!
//! Each type wraps an underlying [`Read`](std::io::Read) of one format (raw
//! deflate, zlib or gzip) and itself implements `Read`, yielding the other
//! side of the transform as bytes are pulled through it.

pub use crate::deflate::read::{DeflateDecoder, DeflateEncoder};
pub use crate::gz::read::{GzDecoder, GzEncoder, MultiGzDecoder};
pub use crate::zlib::read::{ZlibDecoder, ZlibEncoder};
