//! Thin re-export of the standard library's buffered reader.
//!
//! The `deflate`/`zlib`/`gz` read-side adaptors are generic over any
//! `BufRead`, and layer a `BufReader` around a plain `Read` to get one. The
//! standard type already does everything needed here (short reads surface
//! as-is, including `WouldBlock` from a non-blocking inner reader), so there
//! is nothing accelerator-specific to add in this module.

pub use std::io::BufReader;
