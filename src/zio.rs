//! Generic `Read`/`Write` plumbing shared by the `deflate`, `zlib`, and `gz`
//! adaptors: wires a [`crate::mem::Compress`]/[`crate::mem::Decompress`]
//! object up to an underlying reader or writer.

use std::io;
use std::io::prelude::*;
use std::mem;

use crate::mem::{Compress, Decompress, DataError, Flush, Status};

/// Abstracts over `Compress`/`Decompress` so [`Writer`] and [`read`] can be
/// generic over either direction.
pub trait Ops {
    fn total_in(&self) -> u64;
    fn total_out(&self) -> u64;
    fn run(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<Status, DataError>;
    fn run_vec(
        &mut self,
        input: &[u8],
        output: &mut Vec<u8>,
        flush: Flush,
    ) -> Result<Status, DataError>;
}

impl Ops for Compress {
    fn total_in(&self) -> u64 {
        Compress::total_in(self)
    }
    fn total_out(&self) -> u64 {
        Compress::total_out(self)
    }
    fn run(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<Status, DataError> {
        self.compress(input, output, flush)
    }
    fn run_vec(
        &mut self,
        input: &[u8],
        output: &mut Vec<u8>,
        flush: Flush,
    ) -> Result<Status, DataError> {
        self.compress_vec(input, output, flush)
    }
}

impl Ops for Decompress {
    fn total_in(&self) -> u64 {
        Decompress::total_in(self)
    }
    fn total_out(&self) -> u64 {
        Decompress::total_out(self)
    }
    fn run(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<Status, DataError> {
        self.decompress(input, output, flush)
    }
    fn run_vec(
        &mut self,
        input: &[u8],
        output: &mut Vec<u8>,
        flush: Flush,
    ) -> Result<Status, DataError> {
        self.decompress_vec(input, output, flush)
    }
}

fn corrupt() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, "corrupt deflate stream")
}

/// Drives `data` against a `BufRead`'s buffer, filling `dst`, the way a
/// `read::*Decoder`/`read::*Encoder`'s `Read` impl does.
pub fn read<R, D>(obj: &mut R, data: &mut D, dst: &mut [u8]) -> io::Result<usize>
where
    R: BufRead,
    D: Ops,
{
    loop {
        let input = obj.fill_buf()?;
        let eof = input.is_empty();
        let before_out = data.total_out();
        let before_in = data.total_in();
        let flush = if eof { Flush::Finish } else { Flush::None };
        let ret = data.run(input, dst, flush);
        let read = (data.total_out() - before_out) as usize;
        let consumed = (data.total_in() - before_in) as usize;
        obj.consume(consumed);

        match ret {
            Ok(Status::Ok) | Ok(Status::BufError) if read == 0 && !eof && !dst.is_empty() => {
                continue;
            }
            Ok(Status::Ok) | Ok(Status::BufError) | Ok(Status::StreamEnd) => return Ok(read),
            Err(_) => return Err(corrupt()),
        }
    }
}

/// A `Write` adaptor that runs everything written to it through `data`
/// before forwarding the result to the wrapped writer `W`.
#[derive(Debug)]
pub struct Writer<W: Write, D: Ops> {
    obj: Option<W>,
    pub data: D,
    buf: Vec<u8>,
}

impl<W: Write, D: Ops> Writer<W, D> {
    pub fn new(w: W, d: D) -> Writer<W, D> {
        Writer {
            obj: Some(w),
            data: d,
            buf: Vec::with_capacity(32 * 1024),
        }
    }

    pub fn finish(&mut self) -> io::Result<()> {
        loop {
            self.dump()?;

            let before = self.data.total_out();
            self.data
                .run_vec(&[], &mut self.buf, Flush::Finish)
                .map_err(|_| corrupt())?;
            if before == self.data.total_out() {
                self.dump()?;
                return Ok(());
            }
        }
    }

    pub fn replace(&mut self, w: W) -> W {
        self.buf.truncate(0);
        mem::replace(&mut self.obj, Some(w)).expect("writer already finished")
    }

    pub fn get_ref(&self) -> Option<&W> {
        self.obj.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut W> {
        self.obj.as_mut()
    }

    pub fn take_inner(&mut self) -> Option<W> {
        self.obj.take()
    }

    pub fn into_inner(mut self) -> W {
        self.take_inner().expect("writer already finished")
    }

    fn dump(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.obj.as_mut().expect("writer already finished").write_all(&self.buf)?;
            self.buf.truncate(0);
        }
        Ok(())
    }
}

impl<W: Write, D: Ops> Write for Writer<W, D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // The engine isn't guaranteed to consume any of the buffer it's
        // given, particularly while it's still draining previously
        // buffered output. Loop rather than spuriously return `Ok(0)`,
        // which would make `write_all` fail.
        loop {
            self.dump()?;

            let before_in = self.data.total_in();
            let ret = self.data.run_vec(buf, &mut self.buf, Flush::None);
            let written = (self.data.total_in() - before_in) as usize;

            if !buf.is_empty() && written == 0 && ret.is_ok() {
                continue;
            }
            return match ret {
                Ok(Status::Ok) | Ok(Status::BufError) | Ok(Status::StreamEnd) => Ok(written),
                Err(_) => Err(corrupt()),
            };
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        // There's no explicit "drained everything" signal, so keep asking
        // until a `Flush::Sync` call stops producing fresh output.
        loop {
            self.dump()?;

            let before = self.data.total_out();
            self.data
                .run_vec(&[], &mut self.buf, Flush::Sync)
                .map_err(|_| corrupt())?;
            if before == self.data.total_out() {
                break;
            }
        }

        self.obj.as_mut().expect("writer already finished").flush()
    }
}

impl<W: Write, D: Ops> Drop for Writer<W, D> {
    fn drop(&mut self) {
        if self.obj.is_some() {
            let _ = self.finish();
        }
    }
}
