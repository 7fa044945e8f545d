//! The streaming save/restore state carried between DDCB submissions.
//!
//! Every field here is named and typed explicitly rather than folded into
//! an opaque byte blob, because both sides of the DDCB contract (the
//! engines in `deflate_engine`/`inflate_engine` and the simulated
//! transport) need to reason about them directly.

use std::collections::VecDeque;

use crate::checksum::Checksums;

pub const FIFO_CAPACITY: usize = 256;
pub const DICT_PAGE_SIZE: usize = 32 * 1024;
pub const TREE_SCRATCH_SIZE: usize = 64 * 1024;

/// Wrapper format tag, derived from the caller-supplied `window_bits`.
///
/// `-15..=-8` => raw, `8..=15` => zlib, `16..=31` => gzip. The sign/offset
/// convention is zlib's own and is preserved bit-exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperFormat {
    Raw,
    Zlib,
    Gzip,
}

impl WrapperFormat {
    /// Decode `window_bits` into a format tag plus the effective window
    /// size in bits (always `8..=15`), per spec §3.
    pub fn from_window_bits(window_bits: i32) -> Result<(WrapperFormat, u8), crate::error::ZedcError> {
        match window_bits {
            -15..=-8 => Ok((WrapperFormat::Raw, (-window_bits) as u8)),
            8..=15 => Ok((WrapperFormat::Zlib, window_bits as u8)),
            16..=31 => Ok((WrapperFormat::Gzip, (window_bits - 16) as u8)),
            _ => Err(crate::error::ZedcError::stream_error(format!(
                "invalid window_bits {}",
                window_bits
            ))),
        }
    }
}

/// A fixed-capacity byte FIFO, up to [`FIFO_CAPACITY`] bytes, used for
/// wrapper header bytes ahead of the compressed payload and trailer/sync
/// bytes after it.
#[derive(Debug, Clone, Default)]
pub struct ByteFifo {
    bytes: VecDeque<u8>,
}

impl ByteFifo {
    pub fn new() -> ByteFifo {
        ByteFifo::default()
    }

    pub fn push_slice(&mut self, data: &[u8]) -> Result<(), crate::error::ZedcError> {
        if self.bytes.len() + data.len() > FIFO_CAPACITY {
            return Err(crate::error::ZedcError::stream_error(
                "wrapper FIFO overflow: optional header exceeds 240 bytes",
            ));
        }
        self.bytes.extend(data.iter().copied());
        Ok(())
    }

    pub fn push_byte(&mut self, b: u8) -> Result<(), crate::error::ZedcError> {
        self.push_slice(&[b])
    }

    /// Drain as many bytes as fit into `out`, returning the number written.
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.bytes.len());
        for slot in out.iter_mut().take(n) {
            *slot = self.bytes.pop_front().unwrap();
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// `<8` residual output bits carried across deflate calls (`obyte`,
/// `onumbits`). Inflate's symmetrical counterpart is `proc_bits`, tracked
/// directly on [`CodecState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialByte {
    pub byte: u8,
    pub num_bits: u8,
}

/// Sub-states of the inflate wrapper parser (spec §3 / §4.5 "Wrapper
/// strip"). Encoded as a tagged sum type per the "tagged variants" design
/// note rather than an integer state counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrapperParseState {
    HeaderStart,
    GzipFextraLen,
    GzipFextra { remaining: u16 },
    GzipFname,
    GzipFcomment,
    GzipFhcrc { remaining: u8 },
    ZlibAdler,
    HeaderDone,
}

impl Default for WrapperParseState {
    fn default() -> WrapperParseState {
        WrapperParseState::HeaderStart
    }
}

/// Which of the two dictionary pages currently plays the role of
/// "input" vs. "output" for the next hardware call; the roles swap after
/// every call (spec §3 "Dictionary double-buffer").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictToggle {
    AInput,
    BInput,
}

impl DictToggle {
    pub fn flip(self) -> DictToggle {
        match self {
            DictToggle::AInput => DictToggle::BInput,
            DictToggle::BInput => DictToggle::AInput,
        }
    }
}

/// The tree/scratch bit accounting fields named in spec §3. Their sum is
/// always a multiple of 8 (the invariant checked by
/// [`CodecState::check_bit_invariant`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct ScratchAccounting {
    /// Bits of header material (e.g. a synthesized stored-block header)
    /// placed ahead of the tree bits.
    pub hdr_ib: u32,
    /// Bits occupied by the most recently identified Huffman tree.
    pub tree_bits: u32,
    /// Padding bits inserted to keep the region byte- or word-aligned.
    pub pad_bits: u32,
    /// Bits of unconsumed input carried over, sitting after the tree.
    pub scratch_bits: u32,
    /// Bits of input consumed by the accelerator but not yet accounted for
    /// in `scratch_bits` (used transiently during result parsing).
    pub scratch_ib: u32,
    /// Bits of scratch consumed by the previous call before this one ran,
    /// subtracted when computing newly-consumed input bytes.
    pub pre_scratch_bits: u32,
}

impl ScratchAccounting {
    pub fn total_bits(&self) -> u32 {
        self.hdr_ib + self.tree_bits + self.pad_bits + self.scratch_bits + self.scratch_ib
    }

    pub fn check_multiple_of_8(&self) -> Result<(), crate::error::ZedcError> {
        if self.total_bits() % 8 != 0 {
            Err(crate::error::ZedcError::stream_error(format!(
                "scratch bit accounting {} is not a multiple of 8",
                self.total_bits()
            )))
        } else {
            Ok(())
        }
    }
}

/// Flags carried across calls (spec §3 "Flags").
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecFlags {
    pub header_added: bool,
    pub eob_added: bool,
    pub trailer_added: bool,
    pub havedict: bool,
    pub eob_seen: bool,
    /// `INFL_STAT_FINAL_EOB` — the final block's EOB has been observed.
    pub final_block_seen: bool,
}

/// Everything that must survive between `deflate`/`inflate` calls.
///
/// This is the Rust shape of spec §3's "Codec state" bullet list: every
/// named field is present, not folded into a byte blob, because the
/// engines and the simulated transport both need to read and update it
/// directly across calls.
#[derive(Debug, Clone)]
pub struct CodecState {
    pub format: WrapperFormat,
    pub window_bits: u8,

    pub pre_output_fifo: ByteFifo,
    pub post_output_fifo: ByteFifo,

    /// Deflate's residual output bits (`obyte`/`onumbits`).
    pub partial_byte: PartialByte,
    /// Inflate's symmetrical residual input bits.
    pub proc_bits: u32,

    pub wrapper_parse: WrapperParseState,
    pub gzip_flags: u8,
    pub gzip_extra_remaining: u16,
    /// Wrapper-header bytes accepted from the caller but not yet enough to
    /// complete the current `wrapper_parse` substate; carried across
    /// `inflate` calls so a one-byte-at-a-time feed still assembles the
    /// header (spec §4.5 "Wrapper strip").
    pub header_carry: Vec<u8>,

    pub dict_toggle: DictToggle,
    /// Per-call byte offset (0..15) for misalignment between calls.
    pub dict_offset: u8,
    /// Used length of the current dictionary page (0..=32 KiB).
    pub dict_len: u32,

    pub scratch: ScratchAccounting,

    pub flags: CodecFlags,

    pub inp_processed: u64,
    pub outp_returned: u64,
    /// Bytes held back in the dictionary page because the output buffer
    /// filled before they could be delivered (inflate's deferred output).
    pub obytes_in_dict: u32,

    pub checksums: Checksums,

    /// Total input/output bytes across the stream's lifetime, used for the
    /// gzip ISIZE trailer and `total_in`/`total_out` accessors.
    pub total_in: u64,
    pub total_out: u64,

    /// Expected dictionary Adler-32 read from a zlib FDICT header, compared
    /// against a caller-supplied dictionary in `inflate_set_dictionary`.
    pub expected_dict_adler: Option<u32>,
}

impl CodecState {
    pub fn new(window_bits: i32) -> Result<CodecState, crate::error::ZedcError> {
        let (format, bits) = WrapperFormat::from_window_bits(window_bits)?;
        Ok(CodecState {
            format,
            window_bits: bits,
            pre_output_fifo: ByteFifo::new(),
            post_output_fifo: ByteFifo::new(),
            partial_byte: PartialByte::default(),
            proc_bits: 0,
            wrapper_parse: WrapperParseState::default(),
            gzip_flags: 0,
            gzip_extra_remaining: 0,
            header_carry: Vec::new(),
            dict_toggle: DictToggle::AInput,
            dict_offset: 0,
            dict_len: 0,
            scratch: ScratchAccounting::default(),
            flags: CodecFlags::default(),
            inp_processed: 0,
            outp_returned: 0,
            obytes_in_dict: 0,
            checksums: Checksums::new(),
            total_in: 0,
            total_out: 0,
            expected_dict_adler: None,
        })
    }

    /// Reset to the post-init state, preserving the wrapper format/window
    /// size (mirrors `deflate_reset`/`inflate_reset`: workspace allocation
    /// is untouched by this, only the logical state resets).
    pub fn reset(&mut self) {
        let format = self.format;
        let window_bits = self.window_bits;
        let expected_dict_adler = None;
        *self = CodecState {
            format,
            window_bits,
            pre_output_fifo: ByteFifo::new(),
            post_output_fifo: ByteFifo::new(),
            partial_byte: PartialByte::default(),
            proc_bits: 0,
            wrapper_parse: WrapperParseState::default(),
            gzip_flags: 0,
            gzip_extra_remaining: 0,
            header_carry: Vec::new(),
            dict_toggle: DictToggle::AInput,
            dict_offset: 0,
            dict_len: 0,
            scratch: ScratchAccounting::default(),
            flags: CodecFlags::default(),
            inp_processed: 0,
            outp_returned: 0,
            obytes_in_dict: 0,
            checksums: Checksums::new(),
            total_in: 0,
            total_out: 0,
            expected_dict_adler,
        };
    }

    pub fn check_invariants(&self) -> Result<(), crate::error::ZedcError> {
        self.scratch.check_multiple_of_8()?;
        if self.obytes_in_dict as usize > self.dict_len as usize
            || self.dict_len as usize > DICT_PAGE_SIZE
        {
            return Err(crate::error::ZedcError::stream_error(
                "obytes_in_dict <= dict_len <= 32768 violated",
            ));
        }
        Ok(())
    }

    pub fn is_stream_end_ready(&self) -> bool {
        self.flags.eob_added
            && self.flags.trailer_added
            && self.pre_output_fifo.is_empty()
            && self.post_output_fifo.is_empty()
    }
}
