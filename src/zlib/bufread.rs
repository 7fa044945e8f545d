use std::io;
use std::io::prelude::*;
use std::mem;

use crate::bufreader::BufReader;
use crate::mem::{Compress, Compression, Decompress};
use crate::zio;

/// A ZLIB encoder, or compressor, that reads uncompressed data from a
/// [`BufRead`] and produces the compressed data as a [`Read`] stream, per
/// RFC 1950's two-byte CMF/FLG wrapper (spec §4.4 header emission).
#[derive(Debug)]
pub struct ZlibEncoder<R> {
    obj: R,
    data: Compress,
}

impl<R: BufRead> ZlibEncoder<R> {
    /// Creates a new encoder which will read uncompressed data from the
    /// given stream and emit the compressed stream.
    pub fn new(r: R, level: Compression) -> ZlibEncoder<R> {
        ZlibEncoder {
            obj: r,
            data: Compress::new(level, true),
        }
    }
}

impl<R> ZlibEncoder<R> {
    /// Acquires a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.obj
    }

    /// Acquires a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.obj
    }

    /// Returns the number of bytes that have been read into this compressor.
    pub fn total_in(&self) -> u64 {
        self.data.total_in()
    }

    /// Returns the number of bytes that the compressor has produced.
    pub fn total_out(&self) -> u64 {
        self.data.total_out()
    }

    /// Consumes this encoder, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.obj
    }
}

impl<R: BufRead> Read for ZlibEncoder<R> {
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        zio::read(&mut self.obj, &mut self.data, into)
    }
}

/// A ZLIB decoder, or decompressor, that reads compressed data from a
/// [`BufRead`] and produces uncompressed data as a [`Read`] stream.
#[derive(Debug)]
pub struct ZlibDecoder<R> {
    obj: R,
    data: Decompress,
}

impl<R: BufRead> ZlibDecoder<R> {
    /// Creates a new decoder which reads its input from the given reader.
    pub fn new(r: R) -> ZlibDecoder<R> {
        ZlibDecoder {
            obj: r,
            data: Decompress::new(true),
        }
    }
}

impl<R> ZlibDecoder<R> {
    /// Acquires a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.obj
    }

    /// Acquires a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.obj
    }

    /// Returns the number of bytes that the decompressor has consumed.
    pub fn total_in(&self) -> u64 {
        self.data.total_in()
    }

    /// Returns the number of bytes that the decompressor has produced.
    pub fn total_out(&self) -> u64 {
        self.data.total_out()
    }

    /// Consumes this decoder, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.obj
    }
}

impl<R: BufRead> Read for ZlibDecoder<R> {
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        zio::read(&mut self.obj, &mut self.data, into)
    }
}

impl<'a> ZlibDecoder<BufReader<&'a [u8]>> {
    /// Replaces the input stream with `data`, resetting decompression state
    /// as if this decoder had just been constructed, and returns the
    /// previous input.
    pub fn reset(&mut self, data: &'a [u8]) -> &'a [u8] {
        let prev = mem::replace(&mut self.obj, BufReader::new(data));
        self.data.reset();
        prev.into_inner()
    }
}
