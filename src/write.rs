//! Writer-based compression/decompression streams.
//!
//! Each type wraps an underlying [`Write`](std::io::Write) and itself
//! implements `Write`, transforming bytes as they're written through it and
//! emitting the result (compressed or decompressed, per type) to the
//! wrapped writer.

pub use crate::deflate::write::{DeflateDecoder, DeflateEncoder};
pub use crate::gz::write::{GzDecoder, GzEncoder};
pub use crate::zlib::write::{ZlibDecoder, ZlibEncoder};
