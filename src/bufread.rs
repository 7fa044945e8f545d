//! `BufRead`-based compression/decompression streams.
//!
//! These are the same streams as in [`read`](crate::read), but built
//! directly atop a [`BufRead`](std::io::BufRead) rather than wrapping one
//! themselves — useful when the caller already has a buffered reader and
//! doesn't want a second buffering layer.

pub use crate::deflate::bufread::{DeflateDecoder, DeflateEncoder};
pub use crate::gz::bufread::{GzDecoder, GzEncoder, MultiGzDecoder};
pub use crate::zlib::bufread::{ZlibDecoder, ZlibEncoder};
