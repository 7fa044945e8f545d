//! Raw DEFLATE (RFC 1951) stream adaptors: no zlib or gzip wrapper bytes,
//! just the bit-exact compressed block stream the [`crate::mem::Compress`]/
//! [`crate::mem::Decompress`] facade (and beneath it, the switching shim)
//! produces for `window_bits` in `-15..=-8`.

pub mod bufread;
pub mod read;
pub mod write;
