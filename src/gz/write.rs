use std::io;
use std::io::prelude::*;
use std::mem;

use super::bufread::{corrupt, read_gz_header};
use super::{GzBuilder, GzHeader};
use crate::checksum::Checksums;
use crate::mem::{Compress, Compression, Decompress, Flush, Status};
use crate::zio;

/// A gzip streaming encoder
///
/// This structure exposes a [`Write`] interface that will write uncompressed
/// data to the underlying writer in gzip format.
#[derive(Debug)]
pub struct GzEncoder<W: Write> {
    inner: zio::Writer<W, Compress>,
    crc: Checksums,
    header: Vec<u8>,
    crc_bytes_written: usize,
}

pub(crate) fn gz_encoder<W: Write>(header: Vec<u8>, w: W, lvl: Compression) -> GzEncoder<W> {
    GzEncoder {
        inner: zio::Writer::new(w, Compress::new(lvl, false)),
        crc: Checksums::new(),
        header,
        crc_bytes_written: 0,
    }
}

impl<W: Write> GzEncoder<W> {
    /// Creates a new encoder which will use the given compression level.
    ///
    /// The encoder is not configured specially for the emitted header. For
    /// header configuration, see the `GzBuilder` type.
    pub fn new(w: W, level: Compression) -> GzEncoder<W> {
        GzBuilder::new().write(w, level)
    }

    fn write_header(&mut self) -> io::Result<()> {
        while !self.header.is_empty() {
            let n = self.inner.get_mut().unwrap().write(&self.header)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write gzip header",
                ));
            }
            self.header.drain(..n);
        }
        Ok(())
    }

    fn write_trailer(&mut self) -> io::Result<()> {
        let trailer = [
            self.crc.crc32() as u8,
            (self.crc.crc32() >> 8) as u8,
            (self.crc.crc32() >> 16) as u8,
            (self.crc.crc32() >> 24) as u8,
            self.crc.isize32() as u8,
            (self.crc.isize32() >> 8) as u8,
            (self.crc.isize32() >> 16) as u8,
            (self.crc.isize32() >> 24) as u8,
        ];
        while self.crc_bytes_written < trailer.len() {
            let n = self
                .inner
                .get_mut()
                .unwrap()
                .write(&trailer[self.crc_bytes_written..])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write gzip trailer",
                ));
            }
            self.crc_bytes_written += n;
        }
        Ok(())
    }
}

impl<W: Write> GzEncoder<W> {
    /// Acquires a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.inner.get_ref().unwrap()
    }

    /// Acquires a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        self.inner.get_mut().unwrap()
    }

    /// Returns the number of bytes that have been written to this compressor.
    pub fn total_in(&self) -> u64 {
        self.inner.data.total_in()
    }

    /// Returns the number of bytes that the compressor has produced.
    pub fn total_out(&self) -> u64 {
        self.inner.data.total_out()
    }

    /// Attempts to finish this output stream, writing out the header (if not
    /// yet written), the final compressed block and the gzip trailer.
    pub fn try_finish(&mut self) -> io::Result<()> {
        self.write_header()?;
        self.inner.finish()?;
        self.write_trailer()
    }

    /// Consumes this encoder, flushing the output stream and returning the
    /// underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.try_finish()?;
        Ok(self.inner.take_inner().unwrap())
    }

    /// Consumes this encoder, returning the underlying writer without
    /// flushing pending compressed output or writing the trailer, which are
    /// likely corrupt without them.
    pub fn into_inner(mut self) -> W {
        self.inner.take_inner().unwrap()
    }
}

impl<W: Write> Write for GzEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_header()?;
        let n = self.inner.write(buf)?;
        self.crc.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.write_header()?;
        self.inner.flush()
    }
}

/// A small counting wrapper used to find out how many bytes of a scratch
/// buffer `read_gz_header` actually consumed while probing for a complete
/// header.
struct Counter<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Read for Counter<'a> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = (&self.buf[self.pos..]).read(out)?;
        self.pos += n;
        Ok(n)
    }
}

/// Tracks the CRC-32/ISIZE of whatever plaintext passes through it on its
/// way to the wrapped writer.
#[derive(Debug)]
struct CrcWriter<W> {
    writer: W,
    crc: Checksums,
}

impl<W: Write> Write for CrcWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.crc.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[derive(Debug)]
enum GzState {
    Header(Vec<u8>),
    Body,
    Finished(usize, [u8; 8]),
    End,
}

/// A gzip streaming decoder
///
/// This structure exposes a [`Write`] interface. Bytes written to it are
/// interpreted as a gzip stream; the decompressed data is written to the
/// wrapped writer as it becomes available.
#[derive(Debug)]
pub struct GzDecoder<W: Write> {
    state: GzState,
    header: Option<GzHeader>,
    data: Decompress,
    writer: CrcWriter<W>,
}

impl<W: Write> GzDecoder<W> {
    /// Creates a new decoder which will write uncompressed data to the
    /// given writer.
    pub fn new(w: W) -> GzDecoder<W> {
        GzDecoder {
            state: GzState::Header(Vec::with_capacity(10)),
            header: None,
            data: Decompress::new(false),
            writer: CrcWriter {
                writer: w,
                crc: Checksums::new(),
            },
        }
    }

    /// Returns the header associated with this stream, if it has been fully
    /// parsed yet.
    pub fn header(&self) -> Option<&GzHeader> {
        self.header.as_ref()
    }

    /// Acquires a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer.writer
    }

    /// Acquires a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer.writer
    }

    /// Consumes this decoder, returning the underlying writer.
    ///
    /// Note that this may discard unwritten data still buffered internally
    /// if the gzip trailer has not yet been reached.
    pub fn into_inner(self) -> W {
        self.writer.writer
    }
}

impl<W: Write> Write for GzDecoder<W> {
    fn write(&mut self, mut buf: &[u8]) -> io::Result<usize> {
        let total = buf.len();

        while !buf.is_empty() {
            match mem::replace(&mut self.state, GzState::End) {
                GzState::Header(mut partial) => {
                    let prior = partial.len();
                    partial.extend_from_slice(buf);

                    let mut counter = Counter {
                        buf: &partial,
                        pos: 0,
                    };
                    match read_gz_header(&mut counter) {
                        Ok(header) => {
                            let consumed_from_buf = counter.pos.saturating_sub(prior);
                            self.header = Some(header);
                            self.state = GzState::Body;
                            buf = &buf[consumed_from_buf..];
                        }
                        Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                            self.state = GzState::Header(partial);
                            return Ok(total);
                        }
                        Err(e) => return Err(e),
                    }
                }
                GzState::Body => {
                    let before_in = self.data.total_in();
                    let mut out = Vec::new();
                    let status = self
                        .data
                        .decompress_vec(buf, &mut out, Flush::None)
                        .map_err(|_| corrupt())?;
                    self.writer.write_all(&out)?;
                    let consumed = (self.data.total_in() - before_in) as usize;
                    buf = &buf[consumed..];

                    self.state = match status {
                        Status::StreamEnd => GzState::Finished(0, [0; 8]),
                        _ => GzState::Body,
                    };
                }
                GzState::Finished(pos, mut trailer) => {
                    let n = std::cmp::min(8 - pos, buf.len());
                    trailer[pos..pos + n].copy_from_slice(&buf[..n]);
                    buf = &buf[n..];

                    if pos + n == 8 {
                        let crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
                        let amt = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
                        if crc != self.writer.crc.crc32() || amt != self.writer.crc.isize32() {
                            return Err(corrupt());
                        }
                        self.state = GzState::End;
                    } else {
                        self.state = GzState::Finished(pos + n, trailer);
                    }
                }
                GzState::End => {
                    // Trailing bytes past the trailer are ignored, matching
                    // the read-side decoder's "keep reading after end"
                    // tolerance for a clean EOF.
                    self.state = GzState::End;
                    buf = &buf[buf.len()..];
                }
            }
        }

        Ok(total)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
