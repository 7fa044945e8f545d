//! A hardware-accelerated DEFLATE codec exposed as `Read`/`BufRead`/`Write`
//! streams, byte-for-byte compatible with RFC 1950 (zlib), RFC 1951 (raw
//! DEFLATE) and RFC 1952 (gzip).
//!
//! # Organization
//!
//! This crate consists mainly of three format modules, [`deflate`], [`zlib`]
//! and [`gz`], each exposing `read`, `write` and `bufread` submodules for the
//! corresponding stream direction. The [`read`], [`write`] and [`bufread`]
//! modules at the crate root re-export all three formats' types for callers
//! who'd rather import by stream direction than by format.
//!
//! Underneath the streams, [`Compress`] and [`Decompress`] are the
//! lower-level in-memory primitives everything else is built on. Each one
//! fronts a [`shim::DeflateShim`]/[`shim::InflateShim`] that picks, once per
//! stream, between driving a real accelerator through a [`dispatcher::Dispatcher`]
//! of Device Driver Control Blocks and falling back to a pure-Rust software
//! path — see the `shim`, `dispatcher` and `transport` modules for the
//! machinery underneath that choice.
//!
//! Set the `ZEDC_FORCE_SW=1` environment variable to force the software path
//! unconditionally; see [`config::Environment`] for the full set of knobs.

#![deny(missing_debug_implementations)]
#![allow(trivial_numeric_casts)]

pub use gz::GzBuilder;
pub use gz::GzHeader;
pub use mem::{Compress, Compression, DataError, Decompress, Flush, Status};

mod bufreader;
mod checksum;
mod codec_state;
pub mod config;
mod ddcb;
mod deflate_engine;
mod dispatcher;
mod error;
mod inflate_engine;
mod mem;
mod shim;
mod software;
mod transport;
mod workspace;
mod wrapper;
mod zio;

pub mod deflate;
pub mod gz;
pub mod zlib;

pub mod read;
pub mod write;
pub mod bufread;

pub use error::{HardwareFault, ZedcError};
pub use shim::Implementation;

fn _assert_send_sync() {
    fn _assert_send_sync<T: Send + Sync>() {}

    _assert_send_sync::<read::DeflateEncoder<&[u8]>>();
    _assert_send_sync::<read::DeflateDecoder<&[u8]>>();
    _assert_send_sync::<read::ZlibEncoder<&[u8]>>();
    _assert_send_sync::<read::ZlibDecoder<&[u8]>>();
    _assert_send_sync::<read::GzEncoder<&[u8]>>();
    _assert_send_sync::<read::GzDecoder<&[u8]>>();
    _assert_send_sync::<read::MultiGzDecoder<&[u8]>>();
    _assert_send_sync::<write::DeflateEncoder<Vec<u8>>>();
    _assert_send_sync::<write::DeflateDecoder<Vec<u8>>>();
    _assert_send_sync::<write::ZlibEncoder<Vec<u8>>>();
    _assert_send_sync::<write::ZlibDecoder<Vec<u8>>>();
    _assert_send_sync::<write::GzEncoder<Vec<u8>>>();
}

/// An infinite iterator of random bytes, used by the roundtrip/quickcheck
/// test suites scattered across the format modules.
#[cfg(test)]
pub fn random_bytes() -> impl Iterator<Item = u8> {
    use rand::Rng;
    std::iter::repeat_with(|| rand::rng().random())
}
