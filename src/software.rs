//! The pure-Rust software DEFLATE/INFLATE engine, backed by `miniz_oxide`.
//!
//! Wraps `miniz_oxide::deflate`/`miniz_oxide::inflate` directly, filling two
//! roles: the switching shim's software path, and the engine
//! [`crate::transport::sim::SimTransport`] drives internally to execute a
//! DDCB without real silicon.

use miniz_oxide::deflate::core::{
    compress as mz_compress, create_comp_flags_from_zip_params, CompressorOxide, TDEFLFlush,
    TDEFLStatus,
};
use miniz_oxide::inflate::core::{
    decompress as mz_decompress, inflate_flags, DecompressorOxide,
};
use miniz_oxide::inflate::TINFLStatus;
use miniz_oxide::MZFlush;

use crate::error::{Result, ZedcError};

/// A software compressor, reused across calls like the hardware dictionary
/// carries state across DDCBs.
pub struct SoftwareCompress {
    state: CompressorOxide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftwareFlush {
    None,
    Sync,
    Finish,
}

impl SoftwareFlush {
    fn to_tdefl(self) -> TDEFLFlush {
        match self {
            SoftwareFlush::None => TDEFLFlush::None,
            SoftwareFlush::Sync => TDEFLFlush::Sync,
            SoftwareFlush::Finish => TDEFLFlush::Finish,
        }
    }

    fn to_mz(self) -> MZFlush {
        match self {
            SoftwareFlush::None => MZFlush::None,
            SoftwareFlush::Sync => MZFlush::Sync,
            SoftwareFlush::Finish => MZFlush::Finish,
        }
    }
}

pub struct SoftwareResult {
    pub consumed_in: usize,
    pub produced_out: usize,
    pub done: bool,
}

impl SoftwareCompress {
    pub fn new(level: i32) -> SoftwareCompress {
        let flags = create_comp_flags_from_zip_params(level, 0, 0);
        let mut state = CompressorOxide::default();
        state.set_format_and_level(flags as u8, level);
        SoftwareCompress { state }
    }

    /// Warms the compressor's sliding window with `dict` without emitting
    /// any of it to the caller: `dict` is run through the compressor with a
    /// sync flush and the resulting bytes are discarded, leaving the LZ77
    /// match finder able to reference back into `dict` for the real input
    /// that follows. Must be called before the first real [`Self::compress`]
    /// call on this instance.
    pub fn prime_dictionary(&mut self, dict: &[u8]) -> Result<()> {
        if dict.is_empty() {
            return Ok(());
        }
        let mut scratch = vec![0u8; dict.len() + 512];
        let mut remaining = dict;
        while !remaining.is_empty() {
            let r = self.compress(remaining, &mut scratch, SoftwareFlush::Sync)?;
            if r.consumed_in == 0 {
                return Err(ZedcError::stream_error(
                    "software compressor made no progress priming the preset dictionary",
                ));
            }
            remaining = &remaining[r.consumed_in..];
        }
        Ok(())
    }

    pub fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: SoftwareFlush,
    ) -> Result<SoftwareResult> {
        let (status, consumed, produced) =
            mz_compress(&mut self.state, input, output, flush.to_tdefl());
        match status {
            TDEFLStatus::Okay => Ok(SoftwareResult {
                consumed_in: consumed,
                produced_out: produced,
                done: false,
            }),
            TDEFLStatus::Done => Ok(SoftwareResult {
                consumed_in: consumed,
                produced_out: produced,
                done: true,
            }),
            TDEFLStatus::BadParam | TDEFLStatus::PutBufFailed => {
                Err(ZedcError::stream_error("software compressor rejected parameters"))
            }
        }
    }
}

/// `miniz_oxide`'s raw `decompress` needs the *entire* decompressed history
/// available in `output` so back-references can reach arbitrarily far into
/// it, unlike the compressor (which keeps its own sliding dictionary
/// internally). This wrapper keeps that full history in `history`, growing
/// it across calls, and copies each call's newly produced bytes out to the
/// caller's slice — the same pattern `miniz_oxide::inflate::decompress_to_vec`
/// uses internally.
pub struct SoftwareDecompress {
    state: DecompressorOxide,
    history: Vec<u8>,
}

pub struct SoftwareDecompressResult {
    pub consumed_in: usize,
    pub produced_out: usize,
    pub done: bool,
}

impl SoftwareDecompress {
    pub fn new() -> SoftwareDecompress {
        SoftwareDecompress {
            state: DecompressorOxide::new(),
            history: Vec::new(),
        }
    }

    /// Seeds `history` with `dict`'s literal bytes so that back-references
    /// in the real compressed input that follows can resolve into it.
    /// `tinfl` only ever reads history by byte value, so it does not matter
    /// that these bytes were placed directly rather than decoded; only the
    /// byte values and their position relative to the real output matter.
    /// Must be called before the first real [`Self::decompress`] call.
    pub fn prime_dictionary(&mut self, dict: &[u8]) {
        self.history.extend_from_slice(dict);
    }

    pub fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: SoftwareFlush,
    ) -> Result<SoftwareDecompressResult> {
        let mut flags: u32 = inflate_flags::TINFL_FLAG_USING_NON_WRAPPING_OUTPUT_BUF;
        if flush.to_mz() != MZFlush::Finish {
            flags |= inflate_flags::TINFL_FLAG_HAS_MORE_INPUT;
        }

        let out_pos = self.history.len();
        self.history.resize(out_pos + output.len(), 0);

        let (status, consumed, produced) =
            mz_decompress(&mut self.state, input, &mut self.history, out_pos, flags);
        self.history.truncate(out_pos + produced);

        let copy_len = produced.min(output.len());
        output[..copy_len].copy_from_slice(&self.history[out_pos..out_pos + copy_len]);

        match status {
            TINFLStatus::Done => Ok(SoftwareDecompressResult {
                consumed_in: consumed,
                produced_out: copy_len,
                done: true,
            }),
            TINFLStatus::NeedsMoreInput | TINFLStatus::HasMoreOutput => {
                Ok(SoftwareDecompressResult {
                    consumed_in: consumed,
                    produced_out: copy_len,
                    done: false,
                })
            }
            TINFLStatus::Failed
            | TINFLStatus::FailedCannotMakeProgress
            | TINFLStatus::BadParam
            | TINFLStatus::Adler32Mismatch => {
                Err(ZedcError::data_error("software decompressor rejected input"))
            }
        }
    }
}

impl Default for SoftwareDecompress {
    fn default() -> SoftwareDecompress {
        SoftwareDecompress::new()
    }
}
