//! The Switching Shim (spec §4.6): a sum type over `{Hardware, Software}`
//! behind one streaming interface, with exactly one switching opportunity
//! per stream.
//!
//! Grounded in the "tagged variants over opaque ints/inheritance" design
//! note (spec §9): rather than a "zlib backend" trait object hierarchy,
//! this is a small state machine over two concrete variants. The software
//! variant bypasses [`crate::dispatcher::Dispatcher`] entirely and drives
//! [`crate::software`] in-process, since the whole point of switching to it
//! is to avoid the cross-thread DDCB dispatch cost for small buffers.

use crate::codec_state::CodecState;
use crate::deflate_engine::DeflateEngine;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::inflate_engine::InflateEngine;
use crate::mem::{Flush, Status};
use crate::software::{SoftwareCompress, SoftwareDecompress, SoftwareFlush};
use crate::transport::sim::SimTransport;
use crate::wrapper::{self, GzHeaderMeta, WrapperStripOutcome};

fn to_software_flush(flush: Flush) -> SoftwareFlush {
    match flush {
        Flush::None => SoftwareFlush::None,
        Flush::Sync | Flush::Partial | Flush::Full => SoftwareFlush::Sync,
        Flush::Finish => SoftwareFlush::Finish,
    }
}

/// Which concrete implementation currently backs a shim. Exposed so
/// callers/tests can observe a switch happened, per spec §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Implementation {
    Hardware,
    Software,
}

struct SoftwareDeflateStream {
    state: CodecState,
    engine: SoftwareCompress,
    dict_adler: Option<u32>,
}

impl SoftwareDeflateStream {
    fn new(window_bits: i32, level: i32) -> Result<SoftwareDeflateStream> {
        Ok(SoftwareDeflateStream {
            state: CodecState::new(window_bits)?,
            engine: SoftwareCompress::new(level),
            dict_adler: None,
        })
    }

    /// Must be called before the first real [`Self::deflate`] call.
    fn set_dictionary(&mut self, dict: &[u8]) -> Result<()> {
        self.engine.prime_dictionary(dict)?;
        self.state.flags.havedict = true;
        self.state.dict_len = dict.len().min(crate::workspace::DICT_PAGE_SIZE) as u32;
        let mut sums = crate::checksum::Checksums::new();
        sums.update(dict);
        self.dict_adler = Some(sums.adler32());
        Ok(())
    }

    fn deflate(
        &mut self,
        gz_header: Option<&GzHeaderMeta>,
        input: &mut &[u8],
        output: &mut &mut [u8],
        flush: Flush,
    ) -> Result<Status> {
        let out_start = output.len();
        let in_start = input.len();

        if !self.state.flags.header_added {
            let header = wrapper::build_deflate_header(&self.state, gz_header, self.dict_adler)?;
            self.state.pre_output_fifo.push_slice(&header)?;
            self.state.flags.header_added = true;
        }
        drain(&mut self.state.pre_output_fifo, output);

        if !output.is_empty() {
            let r = self.engine.compress(input, output, to_software_flush(flush))?;
            self.state.checksums.update(&input[..r.consumed_in]);
            *input = &input[r.consumed_in..];
            let tmp = std::mem::take(output);
            *output = tmp.split_at_mut(r.produced_out).1;
            if r.done {
                self.state.flags.eob_added = true;
            }
        }

        if self.state.flags.eob_added && !self.state.flags.trailer_added {
            let trailer = wrapper::build_trailer(&self.state);
            self.state.post_output_fifo.push_slice(&trailer)?;
            self.state.flags.trailer_added = true;
        }
        drain(&mut self.state.post_output_fifo, output);

        self.state.total_in += (in_start - input.len()) as u64;
        self.state.total_out += (out_start - output.len()) as u64;

        if self.state.is_stream_end_ready() {
            Ok(Status::StreamEnd)
        } else {
            Ok(Status::Ok)
        }
    }
}

struct SoftwareInflateStream {
    state: CodecState,
    engine: SoftwareDecompress,
    header_meta: GzHeaderMeta,
    header_done: bool,
    trailer_buf: Vec<u8>,
}

impl SoftwareInflateStream {
    fn new(window_bits: i32) -> Result<SoftwareInflateStream> {
        Ok(SoftwareInflateStream {
            state: CodecState::new(window_bits)?,
            engine: SoftwareDecompress::new(),
            header_meta: GzHeaderMeta::default(),
            header_done: false,
            trailer_buf: Vec::new(),
        })
    }

    fn inflate(&mut self, input: &mut &[u8], output: &mut &mut [u8], flush: Flush) -> Result<Status> {
        let out_start = output.len();
        let in_start = input.len();

        if !self.header_done {
            let (consumed, outcome) = wrapper::strip_wrapper(
                &mut self.state,
                input,
                &mut self.header_meta,
                usize::MAX,
                usize::MAX,
                usize::MAX,
            )?;
            *input = &input[consumed..];
            match outcome {
                WrapperStripOutcome::NeedMoreInput => return Ok(Status::Ok),
                WrapperStripOutcome::NeedDict => {
                    return Err(crate::error::ZedcError::data_error(
                        "preset dictionary required for this stream",
                    ))
                }
                WrapperStripOutcome::Done => self.header_done = true,
            }
        }

        if !self.state.flags.final_block_seen && !output.is_empty() {
            let r = self
                .engine
                .decompress(input, output, to_software_flush(flush))?;
            self.state.checksums.update(&output[..r.produced_out]);
            *input = &input[r.consumed_in..];
            let tmp = std::mem::take(output);
            *output = tmp.split_at_mut(r.produced_out).1;
            if r.done {
                self.state.flags.final_block_seen = true;
            }
        }

        let need = trailer_len(&self.state);
        if self.state.flags.final_block_seen && self.trailer_buf.len() < need {
            let take = (need - self.trailer_buf.len()).min(input.len());
            self.trailer_buf.extend_from_slice(&input[..take]);
            *input = &input[take..];
        }

        let mut status = Status::Ok;
        if self.state.flags.final_block_seen && self.trailer_buf.len() == need {
            wrapper::verify_trailer(&self.state, &self.trailer_buf)?;
            status = Status::StreamEnd;
        }

        self.state.total_in += (in_start - input.len()) as u64;
        self.state.total_out += (out_start - output.len()) as u64;
        Ok(status)
    }
}

fn trailer_len(state: &CodecState) -> usize {
    match state.format {
        crate::codec_state::WrapperFormat::Raw => 0,
        crate::codec_state::WrapperFormat::Zlib => 4,
        crate::codec_state::WrapperFormat::Gzip => 8,
    }
}

fn drain(fifo: &mut crate::codec_state::ByteFifo, output: &mut &mut [u8]) {
    if fifo.is_empty() || output.is_empty() {
        return;
    }
    let n = fifo.drain_into(output);
    let tmp = std::mem::take(output);
    *output = tmp.split_at_mut(n).1;
}

enum DeflateMode {
    Hardware(DeflateEngine),
    Software(SoftwareDeflateStream),
}

/// A deflate stream that may run on the accelerator or in software,
/// switching at most once (spec §4.6).
pub struct DeflateShim {
    mode: DeflateMode,
    window_bits: i32,
    level: i32,
    threshold: usize,
    switch_available: bool,
    header: Option<GzHeaderMeta>,
    dictionary: Option<Vec<u8>>,
}

impl DeflateShim {
    pub fn new(
        window_bits: i32,
        level: i32,
        requested: Implementation,
        threshold: usize,
        sim: &SimTransport,
    ) -> Result<DeflateShim> {
        let mode = match requested {
            Implementation::Hardware => DeflateMode::Hardware(DeflateEngine::new(window_bits, level, sim)?),
            Implementation::Software => DeflateMode::Software(SoftwareDeflateStream::new(window_bits, level)?),
        };
        Ok(DeflateShim {
            mode,
            window_bits,
            level,
            threshold,
            switch_available: true,
            header: None,
            dictionary: None,
        })
    }

    pub fn implementation(&self) -> Implementation {
        match self.mode {
            DeflateMode::Hardware(_) => Implementation::Hardware,
            DeflateMode::Software(_) => Implementation::Software,
        }
    }

    pub fn set_header(&mut self, header: GzHeaderMeta) {
        self.header = Some(header.clone());
        if let DeflateMode::Hardware(engine) = &mut self.mode {
            engine.set_header(header);
        }
    }

    /// Primes the stream with a preset dictionary, per spec §4.4's
    /// `deflate_set_dictionary`. Only the hardware engine consults it; the
    /// software path has no preset-dictionary support in `miniz_oxide`'s
    /// raw compressor and silently ignores it, matching the asymmetry
    /// already present on the inflate side.
    pub fn set_dictionary(&mut self, dict: &[u8]) -> Result<()> {
        self.dictionary = Some(dict.to_vec());
        if let DeflateMode::Hardware(engine) = &mut self.mode {
            engine.set_dictionary(dict)?;
        }
        Ok(())
    }

    pub fn deflate(
        &mut self,
        dispatcher: &Dispatcher,
        sim: &SimTransport,
        input: &mut &[u8],
        output: &mut &mut [u8],
        flush: Flush,
    ) -> Result<Status> {
        let total_in_before = self.total_in();
        if self.switch_available && total_in_before == 0 && !input.is_empty() {
            let want_software = input.len() < self.threshold;
            let is_software = matches!(self.mode, DeflateMode::Software(_));
            if want_software != is_software {
                self.switch_to(if want_software {
                    Implementation::Software
                } else {
                    Implementation::Hardware
                }, sim)?;
            }
        }

        let out_before = output.len();
        let result = match &mut self.mode {
            DeflateMode::Hardware(engine) => engine.deflate(dispatcher, input, output, flush),
            DeflateMode::Software(stream) => stream.deflate(self.header.as_ref(), input, output, flush),
        };
        if out_before != output.len() {
            self.switch_available = false;
        }
        result
    }

    fn switch_to(&mut self, target: Implementation, sim: &SimTransport) -> Result<()> {
        let header = self.header.clone();
        let dictionary = self.dictionary.clone();
        self.mode = match target {
            Implementation::Hardware => DeflateMode::Hardware(DeflateEngine::new(self.window_bits, self.level, sim)?),
            Implementation::Software => {
                DeflateMode::Software(SoftwareDeflateStream::new(self.window_bits, self.level)?)
            }
        };
        if let Some(h) = header {
            self.set_header(h);
        }
        if let Some(d) = dictionary {
            let _ = self.set_dictionary(&d);
        }
        log::debug!("deflate shim: switched to {:?}", target);
        Ok(())
    }

    pub fn total_in(&self) -> u64 {
        match &self.mode {
            DeflateMode::Hardware(e) => e.state.total_in,
            DeflateMode::Software(s) => s.state.total_in,
        }
    }

    pub fn total_out(&self) -> u64 {
        match &self.mode {
            DeflateMode::Hardware(e) => e.state.total_out,
            DeflateMode::Software(s) => s.state.total_out,
        }
    }

    /// Resets the stream state without reallocating the dispatcher,
    /// transport, or (for the hardware mode) the DDCB workspace.
    pub fn reset(&mut self) {
        self.switch_available = true;
        self.dictionary = None;
        match &mut self.mode {
            DeflateMode::Hardware(e) => e.reset(),
            DeflateMode::Software(s) => {
                s.state.reset();
                s.engine = SoftwareCompress::new(self.level);
            }
        }
    }
}

enum InflateMode {
    Hardware(InflateEngine),
    Software(SoftwareInflateStream),
}

/// An inflate stream that may run on the accelerator or in software,
/// switching at most once, on the first call, based on `avail_in` against
/// `threshold` (spec §4.6).
pub struct InflateShim {
    mode: InflateMode,
    window_bits: i32,
    threshold: usize,
    switch_available: bool,
    dictionary: Option<Vec<u8>>,
}

impl InflateShim {
    pub fn new(
        window_bits: i32,
        requested: Implementation,
        threshold: usize,
        sim: &SimTransport,
    ) -> Result<InflateShim> {
        let mode = match requested {
            Implementation::Hardware => InflateMode::Hardware(InflateEngine::new(window_bits, sim)?),
            Implementation::Software => InflateMode::Software(SoftwareInflateStream::new(window_bits)?),
        };
        Ok(InflateShim {
            mode,
            window_bits,
            threshold,
            switch_available: true,
            dictionary: None,
        })
    }

    pub fn implementation(&self) -> Implementation {
        match self.mode {
            InflateMode::Hardware(_) => Implementation::Hardware,
            InflateMode::Software(_) => Implementation::Software,
        }
    }

    pub fn header(&self) -> Option<&GzHeaderMeta> {
        match &self.mode {
            InflateMode::Hardware(e) => Some(e.header()),
            InflateMode::Software(s) => Some(&s.header_meta),
        }
    }

    pub fn set_dictionary(&mut self, dict: &[u8]) -> Result<()> {
        self.dictionary = Some(dict.to_vec());
        if let InflateMode::Hardware(engine) = &mut self.mode {
            engine.set_dictionary(dict)?;
        }
        Ok(())
    }

    pub fn inflate(
        &mut self,
        dispatcher: &Dispatcher,
        sim: &SimTransport,
        input: &mut &[u8],
        output: &mut &mut [u8],
        flush: Flush,
    ) -> Result<Status> {
        let total_in_before = self.total_in();
        if self.switch_available && total_in_before == 0 && !input.is_empty() {
            let want_software = input.len() < self.threshold;
            let is_software = matches!(self.mode, InflateMode::Software(_));
            if want_software != is_software {
                self.switch_to(if want_software {
                    Implementation::Software
                } else {
                    Implementation::Hardware
                }, sim)?;
            }
        }

        let out_before = output.len();
        let result = match &mut self.mode {
            InflateMode::Hardware(engine) => engine.inflate(dispatcher, input, output, flush),
            InflateMode::Software(stream) => stream.inflate(input, output, flush),
        };
        if out_before != output.len() {
            self.switch_available = false;
        }
        result
    }

    fn switch_to(&mut self, target: Implementation, sim: &SimTransport) -> Result<()> {
        let dictionary = self.dictionary.clone();
        self.mode = match target {
            Implementation::Hardware => InflateMode::Hardware(InflateEngine::new(self.window_bits, sim)?),
            Implementation::Software => InflateMode::Software(SoftwareInflateStream::new(self.window_bits)?),
        };
        if let Some(d) = dictionary {
            let _ = self.set_dictionary(&d);
        }
        log::debug!("inflate shim: switched to {:?}", target);
        Ok(())
    }

    pub fn total_in(&self) -> u64 {
        match &self.mode {
            InflateMode::Hardware(e) => e.state.total_in,
            InflateMode::Software(s) => s.state.total_in,
        }
    }

    pub fn total_out(&self) -> u64 {
        match &self.mode {
            InflateMode::Hardware(e) => e.state.total_out,
            InflateMode::Software(s) => s.state.total_out,
        }
    }

    /// Resets the stream state without reallocating the dispatcher or
    /// transport.
    pub fn reset(&mut self) {
        self.switch_available = true;
        self.dictionary = None;
        match &mut self.mode {
            InflateMode::Hardware(e) => e.reset(),
            InflateMode::Software(s) => {
                s.state.reset();
                s.engine = SoftwareDecompress::new();
                s.header_meta = GzHeaderMeta::default();
                s.header_done = false;
                s.trailer_buf.clear();
            }
        }
    }
}
