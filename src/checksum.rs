//! Rolling checksum plumbing: CRC-32 (gzip) and Adler-32 (zlib).
//!
//! Tracks both checksums the wrapper formats need in one struct, backed by
//! `crc32fast` instead of calling into a C library.

use std::io::{self, Read};

const ADLER_MOD: u32 = 65521;

/// Running Adler-32, computed per RFC 1950.
#[derive(Debug, Clone, Copy)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Default for Adler32 {
    fn default() -> Adler32 {
        Adler32 { a: 1, b: 0 }
    }
}

impl Adler32 {
    pub fn new() -> Adler32 {
        Adler32::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        // NMAX ensures no intermediate overflow of u32 accumulation before
        // the next reduction mod 65521; 5552 is the standard zlib constant.
        const NMAX: usize = 5552;
        let mut a = self.a;
        let mut b = self.b;
        for chunk in data.chunks(NMAX) {
            for &byte in chunk {
                a += byte as u32;
                b += a;
            }
            a %= ADLER_MOD;
            b %= ADLER_MOD;
        }
        self.a = a;
        self.b = b;
    }

    pub fn sum(&self) -> u32 {
        (self.b << 16) | self.a
    }

    pub fn reset(&mut self) {
        *self = Adler32::default();
    }
}

/// CRC-32 + Adler-32 tracked together, plus the byte count both the gzip
/// ISIZE trailer and the dictionary-accounting logic need.
#[derive(Debug, Clone)]
pub struct Checksums {
    crc: crc32fast::Hasher,
    adler: Adler32,
    amt: u64,
}

impl Default for Checksums {
    fn default() -> Checksums {
        Checksums {
            crc: crc32fast::Hasher::new(),
            adler: Adler32::new(),
            amt: 0,
        }
    }
}

impl Checksums {
    pub fn new() -> Checksums {
        Checksums::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.crc.update(data);
        self.adler.update(data);
        self.amt = self.amt.wrapping_add(data.len() as u64);
    }

    pub fn crc32(&self) -> u32 {
        self.crc.clone().finalize()
    }

    pub fn adler32(&self) -> u32 {
        self.adler.sum()
    }

    /// Truncated-to-32-bit total byte count, the gzip ISIZE field.
    pub fn isize32(&self) -> u32 {
        (self.amt & 0xffff_ffff) as u32
    }

    pub fn amount(&self) -> u64 {
        self.amt
    }

    pub fn reset(&mut self) {
        *self = Checksums::default();
    }
}

/// Reader adaptor that accumulates [`Checksums`] over everything read
/// through it.
pub struct ChecksumReader<R> {
    inner: R,
    sums: Checksums,
}

impl<R: Read> ChecksumReader<R> {
    pub fn new(r: R) -> ChecksumReader<R> {
        ChecksumReader {
            inner: r,
            sums: Checksums::new(),
        }
    }

    pub fn checksums(&self) -> &Checksums {
        &self.sums
    }

    pub fn reset(&mut self) {
        self.sums.reset();
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

impl<R: Read> Read for ChecksumReader<R> {
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        let amt = self.inner.read(into)?;
        self.sums.update(&into[..amt]);
        Ok(amt)
    }
}
