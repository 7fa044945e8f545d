use std::io;
use std::io::prelude::*;

use crate::mem::{Compress, Compression, Decompress};
use crate::zio;

/// A DEFLATE encoder, or compressor, that writes compressed data to the
/// wrapped writer `W`.
///
/// When this encoder is dropped the final pieces of data are flushed; use
/// [`finish`](DeflateEncoder::finish) to check for I/O errors on that last
/// flush instead of relying on the `Drop` impl, which discards them.
#[derive(Debug)]
pub struct DeflateEncoder<W: Write> {
    inner: zio::Writer<W, Compress>,
}

impl<W: Write> DeflateEncoder<W> {
    /// Creates a new encoder which will write compressed data to the given
    /// stream.
    pub fn new(w: W, level: Compression) -> DeflateEncoder<W> {
        DeflateEncoder {
            inner: zio::Writer::new(w, Compress::new(level, false)),
        }
    }
}

impl<W: Write> DeflateEncoder<W> {
    /// Acquires a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.inner.get_ref().unwrap()
    }

    /// Acquires a mutable reference to the underlying writer.
    ///
    /// Note that mutation of the writer may result in surprising results if
    /// this encoder is continued to be used.
    pub fn get_mut(&mut self) -> &mut W {
        self.inner.get_mut().unwrap()
    }

    /// Returns the number of bytes that have been written into this
    /// compressor.
    pub fn total_in(&self) -> u64 {
        self.inner.data.total_in()
    }

    /// Returns the number of bytes that the compressor has produced.
    pub fn total_out(&self) -> u64 {
        self.inner.data.total_out()
    }

    /// Attempts to finish this output stream, writing out the final chunk
    /// of data.
    pub fn try_finish(&mut self) -> io::Result<()> {
        self.inner.finish()
    }

    /// Consumes this encoder, flushing the output stream and returning the
    /// underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.finish()?;
        Ok(self.inner.take_inner().unwrap())
    }

    /// Consumes this encoder, returning the underlying writer without
    /// flushing pending compressed output, which is likely corrupt.
    pub fn into_inner(mut self) -> W {
        self.inner.take_inner().unwrap()
    }
}

impl<W: Write> Write for DeflateEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// A DEFLATE decoder, or decompressor, that writes uncompressed data to the
/// wrapped writer `W`.
#[derive(Debug)]
pub struct DeflateDecoder<W: Write> {
    inner: zio::Writer<W, Decompress>,
}

impl<W: Write> DeflateDecoder<W> {
    /// Creates a new decoder which will write uncompressed data to the
    /// given stream.
    pub fn new(w: W) -> DeflateDecoder<W> {
        DeflateDecoder {
            inner: zio::Writer::new(w, Decompress::new(false)),
        }
    }
}

impl<W: Write> DeflateDecoder<W> {
    /// Acquires a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.inner.get_ref().unwrap()
    }

    /// Acquires a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        self.inner.get_mut().unwrap()
    }

    /// Returns the number of bytes that the decompressor has consumed.
    pub fn total_in(&self) -> u64 {
        self.inner.data.total_in()
    }

    /// Returns the number of bytes that the decompressor has produced.
    pub fn total_out(&self) -> u64 {
        self.inner.data.total_out()
    }

    /// Attempts to finish this output stream, writing out the final chunk
    /// of data.
    pub fn try_finish(&mut self) -> io::Result<()> {
        self.inner.finish()
    }

    /// Consumes this decoder, flushing the output stream and returning the
    /// underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.finish()?;
        Ok(self.inner.take_inner().unwrap())
    }

    /// Consumes this decoder, returning the underlying writer.
    pub fn into_inner(mut self) -> W {
        self.inner.take_inner().unwrap()
    }
}

impl<W: Write> Write for DeflateDecoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
