//! Wrapper framing: zlib/gzip header and trailer byte sequences, and the
//! gzip/zlib header metadata builder (spec §4.4 "Header emission", §4.5
//! "Wrapper strip").
//!
//! The exact byte sequences here are normative (spec §6 "Wire formats") and
//! are exercised directly by the fixed-vector tests in §8.

use crate::codec_state::{CodecState, WrapperFormat, WrapperParseState};
use crate::error::{Result, ZedcError};

pub const GZIP_FHCRC: u8 = 1 << 1;
pub const GZIP_FEXTRA: u8 = 1 << 2;
pub const GZIP_FNAME: u8 = 1 << 3;
pub const GZIP_FCOMMENT: u8 = 1 << 4;

/// Caller-supplied gzip header metadata: the optional FEXTRA/FNAME/
/// FCOMMENT/FHCRC fields, split between read-only metadata here and a
/// write-side builder (`GzBuilder`) in `crate::gz`.
#[derive(Debug, Clone, Default)]
pub struct GzHeaderMeta {
    pub extra: Option<Vec<u8>>,
    pub filename: Option<Vec<u8>>,
    pub comment: Option<Vec<u8>>,
    pub operating_system: u8,
    pub mtime: u32,
    pub emit_crc: bool,
}

/// The maximum number of optional header bytes the pre-output FIFO can
/// absorb (spec §4.4: "Total optional-header bytes must not exceed 240").
pub const MAX_OPTIONAL_HEADER_BYTES: usize = 240;

/// Build the wrapper header bytes for a fresh deflate stream.
///
/// `havedict` plus `dict_adler` select the zlib FDICT variant (`0x78,
/// 0xbb` + 4-byte big-endian dictionary Adler-32) over the plain `0x78,
/// 0x9c` pair.
pub fn build_deflate_header(
    state: &CodecState,
    gz_header: Option<&GzHeaderMeta>,
    dict_adler: Option<u32>,
) -> Result<Vec<u8>> {
    match state.format {
        WrapperFormat::Raw => Ok(Vec::new()),
        WrapperFormat::Zlib => {
            let mut out = Vec::with_capacity(6);
            if let Some(adler) = dict_adler {
                out.extend_from_slice(&[0x78, 0xbb]);
                out.extend_from_slice(&adler.to_be_bytes());
            } else {
                out.extend_from_slice(&[0x78, 0x9c]);
            }
            Ok(out)
        }
        WrapperFormat::Gzip => build_gzip_header(gz_header),
    }
}

fn build_gzip_header(meta: Option<&GzHeaderMeta>) -> Result<Vec<u8>> {
    let meta = meta.cloned().unwrap_or_default();
    let mut flg = 0u8;
    if meta.extra.is_some() {
        flg |= GZIP_FEXTRA;
    }
    if meta.filename.is_some() {
        flg |= GZIP_FNAME;
    }
    if meta.comment.is_some() {
        flg |= GZIP_FCOMMENT;
    }
    if meta.emit_crc {
        flg |= GZIP_FHCRC;
    }

    let mut out = Vec::with_capacity(10);
    out.push(0x1f);
    out.push(0x8b);
    out.push(8); // CM = deflate
    out.push(flg);
    out.extend_from_slice(&meta.mtime.to_le_bytes());
    out.push(0); // XFL
    out.push(meta.operating_system);

    if let Some(extra) = &meta.extra {
        if extra.len() > u16::MAX as usize {
            return Err(ZedcError::stream_error("gzip FEXTRA field too large"));
        }
        out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        out.extend_from_slice(extra);
    }
    if let Some(name) = &meta.filename {
        out.extend_from_slice(name);
        out.push(0);
    }
    if let Some(comment) = &meta.comment {
        out.extend_from_slice(comment);
        out.push(0);
    }
    if meta.emit_crc {
        let crc = crc32fast::hash(&out) & 0xffff;
        out.extend_from_slice(&(crc as u16).to_le_bytes());
    }

    if out.len() - 10 > MAX_OPTIONAL_HEADER_BYTES {
        return Err(ZedcError::stream_error(
            "gzip optional header exceeds 240-byte FIFO budget",
        ));
    }
    Ok(out)
}

/// The wrapper trailer emitted after EOB (spec §4.4 "EOB / flush / trailer
/// emission"): gzip's little-endian CRC-32+ISIZE pair, or zlib's
/// big-endian Adler-32. Raw emits nothing.
pub fn build_trailer(state: &CodecState) -> Vec<u8> {
    match state.format {
        WrapperFormat::Raw => Vec::new(),
        WrapperFormat::Zlib => state.checksums.adler32().to_be_bytes().to_vec(),
        WrapperFormat::Gzip => {
            let mut out = Vec::with_capacity(8);
            out.extend_from_slice(&state.checksums.crc32().to_le_bytes());
            out.extend_from_slice(&state.checksums.isize32().to_le_bytes());
            out
        }
    }
}

/// End-of-block sync sequence (spec §4.4): the exact bit pattern depends on
/// whether a partial output byte is pending. A real accelerator's ASV
/// reports the leftover output bits directly; the simulated transport has
/// no such field and instead lets the software engine self-terminate the
/// open block on `Finish` (see [`crate::deflate_engine`]), so this helper
/// is kept for a `capi`-backed ASV that does carry partial-byte state.
pub fn build_eob_sequence(partial_byte_bits: u8, partial_byte: u8) -> Vec<u8> {
    if partial_byte_bits == 0 {
        vec![0x80, 0x01, 0x00]
    } else {
        let low_bits_mask = (1u16 << partial_byte_bits) - 1;
        let kept = partial_byte & (low_bits_mask as u8);
        vec![kept, 0x03 << (partial_byte_bits - 1), 0x00]
    }
}

/// Result of driving the inflate wrapper parser one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperStripOutcome {
    /// More wrapper bytes are needed; no accelerator call should be made
    /// yet.
    NeedMoreInput,
    /// The wrapper header is fully parsed; accelerator calls may begin.
    Done,
    /// A zlib FDICT header was seen: the caller must supply a dictionary
    /// before decoding can continue.
    NeedDict,
}

/// Drive the inflate wrapper-parser state machine forward by consuming as
/// many bytes from `input` as the current substate needs (spec §4.5
/// "Wrapper strip"). Returns the number of bytes consumed from `input` and
/// the resulting outcome.
///
/// A conforming `inflate` accepts header bytes one at a time: any bytes
/// `input` supplies that aren't enough to complete the current substate are
/// moved into `state.header_carry` rather than handed back to the caller,
/// so a one-byte-at-a-time feed still assembles the header across calls.
/// `consumed` is therefore always `input.len()` while more header bytes are
/// needed; once the header completes, whatever of `input` wasn't needed for
/// it is reported back as unconsumed so the caller can hand it to the
/// accelerator step as compressed-data bytes.
pub fn strip_wrapper(
    state: &mut CodecState,
    input: &[u8],
    header_meta: &mut GzHeaderMeta,
    extra_max: usize,
    name_max: usize,
    comment_max: usize,
) -> Result<(usize, WrapperStripOutcome)> {
    if state.format == WrapperFormat::Raw {
        return Ok((0, WrapperStripOutcome::Done));
    }

    let carry_len = state.header_carry.len();
    let mut buf = std::mem::take(&mut state.header_carry);
    buf.extend_from_slice(input);

    let (consumed, outcome) = parse_wrapper_buffer(state, &buf, header_meta, extra_max, name_max, comment_max)?;

    match outcome {
        WrapperStripOutcome::NeedMoreInput => {
            state.header_carry = buf[consumed..].to_vec();
            Ok((input.len(), WrapperStripOutcome::NeedMoreInput))
        }
        other => Ok((consumed - carry_len, other)),
    }
}

/// The actual wrapper-parser state machine, run against the combined
/// carry-plus-new-input buffer `buf` built by [`strip_wrapper`].
fn parse_wrapper_buffer(
    state: &mut CodecState,
    buf: &[u8],
    header_meta: &mut GzHeaderMeta,
    extra_max: usize,
    name_max: usize,
    comment_max: usize,
) -> Result<(usize, WrapperStripOutcome)> {
    let mut consumed = 0usize;
    loop {
        match &mut state.wrapper_parse {
            WrapperParseState::HeaderStart => match state.format {
                WrapperFormat::Gzip => {
                    if buf.len() - consumed < 10 {
                        return Ok((consumed, WrapperStripOutcome::NeedMoreInput));
                    }
                    let h = &buf[consumed..consumed + 10];
                    if h[0] != 0x1f || h[1] != 0x8b {
                        return Err(ZedcError::data_error("bad gzip magic bytes"));
                    }
                    if h[2] != 8 {
                        return Err(ZedcError::data_error("unsupported gzip compression method"));
                    }
                    let flg = h[3];
                    header_meta.mtime = u32::from_le_bytes([h[4], h[5], h[6], h[7]]);
                    header_meta.operating_system = h[9];
                    state.gzip_flags = flg;
                    consumed += 10;
                    state.wrapper_parse = WrapperParseState::GzipFextraLen;
                }
                WrapperFormat::Zlib => {
                    if buf.len() - consumed < 2 {
                        return Ok((consumed, WrapperStripOutcome::NeedMoreInput));
                    }
                    let cmf = buf[consumed];
                    let flg = buf[consumed + 1];
                    if (u16::from(cmf) << 8 | u16::from(flg)) % 31 != 0 {
                        return Err(ZedcError::data_error("zlib header checksum mismatch"));
                    }
                    if cmf & 0x0f != 8 {
                        return Err(ZedcError::data_error("unsupported zlib compression method"));
                    }
                    if (cmf >> 4) > 7 {
                        return Err(ZedcError::data_error("zlib window size bits too large"));
                    }
                    consumed += 2;
                    let fdict = flg & 0x20 != 0;
                    state.wrapper_parse = if fdict {
                        WrapperParseState::ZlibAdler
                    } else {
                        WrapperParseState::HeaderDone
                    };
                }
                WrapperFormat::Raw => unreachable!(),
            },
            WrapperParseState::GzipFextraLen => {
                if state.gzip_flags & GZIP_FEXTRA == 0 {
                    state.wrapper_parse = WrapperParseState::GzipFname;
                    continue;
                }
                if buf.len() - consumed < 2 {
                    return Ok((consumed, WrapperStripOutcome::NeedMoreInput));
                }
                let xlen = u16::from_le_bytes([buf[consumed], buf[consumed + 1]]);
                consumed += 2;
                state.wrapper_parse = WrapperParseState::GzipFextra { remaining: xlen };
            }
            WrapperParseState::GzipFextra { remaining } => {
                let want = *remaining as usize;
                if buf.len() - consumed < want {
                    return Ok((consumed, WrapperStripOutcome::NeedMoreInput));
                }
                let bytes = &buf[consumed..consumed + want];
                let keep = bytes.len().min(extra_max);
                let extra = header_meta.extra.get_or_insert_with(Vec::new);
                extra.extend_from_slice(&bytes[..keep]);
                consumed += want;
                state.wrapper_parse = WrapperParseState::GzipFname;
            }
            WrapperParseState::GzipFname => {
                if state.gzip_flags & GZIP_FNAME == 0 {
                    state.wrapper_parse = WrapperParseState::GzipFcomment;
                    continue;
                }
                match find_nul(&buf[consumed..]) {
                    None => return Ok((consumed, WrapperStripOutcome::NeedMoreInput)),
                    Some(nul_at) => {
                        let bytes = &buf[consumed..consumed + nul_at];
                        let keep = bytes.len().min(name_max);
                        let name = header_meta.filename.get_or_insert_with(Vec::new);
                        name.extend_from_slice(&bytes[..keep]);
                        consumed += nul_at + 1;
                        state.wrapper_parse = WrapperParseState::GzipFcomment;
                    }
                }
            }
            WrapperParseState::GzipFcomment => {
                if state.gzip_flags & GZIP_FCOMMENT == 0 {
                    state.wrapper_parse = WrapperParseState::GzipFhcrc { remaining: 2 };
                    continue;
                }
                match find_nul(&buf[consumed..]) {
                    None => return Ok((consumed, WrapperStripOutcome::NeedMoreInput)),
                    Some(nul_at) => {
                        let bytes = &buf[consumed..consumed + nul_at];
                        let keep = bytes.len().min(comment_max);
                        let comment = header_meta.comment.get_or_insert_with(Vec::new);
                        comment.extend_from_slice(&bytes[..keep]);
                        consumed += nul_at + 1;
                        state.wrapper_parse = WrapperParseState::GzipFhcrc { remaining: 2 };
                    }
                }
            }
            WrapperParseState::GzipFhcrc { .. } => {
                if state.gzip_flags & GZIP_FHCRC == 0 {
                    state.wrapper_parse = WrapperParseState::HeaderDone;
                    continue;
                }
                if buf.len() - consumed < 2 {
                    return Ok((consumed, WrapperStripOutcome::NeedMoreInput));
                }
                consumed += 2;
                state.wrapper_parse = WrapperParseState::HeaderDone;
            }
            WrapperParseState::ZlibAdler => {
                if buf.len() - consumed < 4 {
                    return Ok((consumed, WrapperStripOutcome::NeedMoreInput));
                }
                let adler = u32::from_be_bytes([
                    buf[consumed],
                    buf[consumed + 1],
                    buf[consumed + 2],
                    buf[consumed + 3],
                ]);
                consumed += 4;
                state.expected_dict_adler = Some(adler);
                state.wrapper_parse = WrapperParseState::HeaderDone;
                return Ok((consumed, WrapperStripOutcome::NeedDict));
            }
            WrapperParseState::HeaderDone => {
                return Ok((consumed, WrapperStripOutcome::Done));
            }
        }
    }
}

/// Verify the wrapper trailer against accumulated checksums, spec §4.5
/// step 6. Returns the number of trailer bytes consumed.
pub fn verify_trailer(state: &CodecState, trailer: &[u8]) -> Result<usize> {
    match state.format {
        WrapperFormat::Raw => Ok(0),
        WrapperFormat::Zlib => {
            if trailer.len() < 4 {
                return Err(ZedcError::data_error("truncated zlib trailer"));
            }
            let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
            if expected != state.checksums.adler32() {
                return Err(ZedcError::data_error("adler-32 mismatch"));
            }
            Ok(4)
        }
        WrapperFormat::Gzip => {
            if trailer.len() < 8 {
                return Err(ZedcError::data_error("truncated gzip trailer"));
            }
            let crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
            let isize_ = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
            if crc != state.checksums.crc32() {
                return Err(ZedcError::data_error("crc-32 mismatch"));
            }
            if isize_ != state.checksums.isize32() {
                return Err(ZedcError::data_error("isize mismatch"));
            }
            Ok(8)
        }
    }
}

fn find_nul(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == 0)
}
