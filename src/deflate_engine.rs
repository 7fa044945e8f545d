//! The Deflate Engine (spec §4.4): builds one deflate DDCB per hardware
//! submission, parses the result, and manages wrapper header/EOB/flush/
//! trailer emission through the codec state's byte FIFOs.

use crate::codec_state::CodecState;
use crate::ddcb::{AsivFlush, Ddcb, DdcbOptions, Opcode};
use crate::dispatcher::{DdcbRequest, Dispatcher};
use crate::error::{Result, ZedcError};
use crate::mem::{Flush, Status};
use crate::transport::sim::SimTransport;
use crate::wrapper::{self, GzHeaderMeta};
use crate::workspace::{AllocKind, DmaBuffer};

/// Caller-visible handle for a single deflate stream's hardware-facing
/// state: the codec state, its dictionary workspace, and the simulated
/// context id this engine's DDCBs are tagged with.
pub struct DeflateEngine {
    pub state: CodecState,
    dict_in: DmaBuffer,
    dict_out: DmaBuffer,
    sim_context_id: u64,
    gz_header: Option<GzHeaderMeta>,
    dict_adler: Option<u32>,
    pending_dict: Option<Vec<u8>>,
    skip_last_dictionary: bool,
}

impl DeflateEngine {
    pub fn new(
        window_bits: i32,
        level: i32,
        sim: &SimTransport,
    ) -> Result<DeflateEngine> {
        let state = CodecState::new(window_bits)?;
        let sim_context_id = sim.register_compress(level);
        Ok(DeflateEngine {
            state,
            dict_in: DmaBuffer::new(crate::workspace::DICT_PAGE_SIZE, AllocKind::PlainAligned),
            dict_out: DmaBuffer::new(crate::workspace::DICT_PAGE_SIZE, AllocKind::PlainAligned),
            sim_context_id,
            gz_header: None,
            dict_adler: None,
            pending_dict: None,
            skip_last_dictionary: false,
        })
    }

    pub fn set_header(&mut self, header: GzHeaderMeta) {
        self.gz_header = Some(header);
    }

    pub fn set_dictionary(&mut self, dict: &[u8]) -> Result<()> {
        if self.state.flags.header_added {
            return Err(ZedcError::stream_error(
                "set_dictionary must be called before the first deflate() call",
            ));
        }
        let mut sums = crate::checksum::Checksums::new();
        sums.update(dict);
        self.dict_adler = Some(sums.adler32());
        self.state.flags.havedict = true;
        self.pending_dict = Some(dict.to_vec());
        Ok(())
    }

    /// Skip re-issuing the DDCB with the save-dictionary bit re-enabled
    /// unless the accelerator reports it was actually needed (spec §4.4
    /// "Skip-last-dictionary optimization"); callers opt in per stream.
    pub fn enable_skip_last_dictionary(&mut self) {
        self.skip_last_dictionary = true;
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Drive one `deflate(flush)` call, per spec §4.4's public operation of
    /// the same name: consumes as much of `input` as fits the accelerator
    /// step, writes as much compressed output as fits in `output`.
    pub fn deflate(
        &mut self,
        dispatcher: &Dispatcher,
        input: &mut &[u8],
        output: &mut &mut [u8],
        flush: Flush,
    ) -> Result<Status> {
        let out_start_len = output.len();
        let in_start_len = input.len();

        if !self.state.flags.header_added {
            let header = wrapper::build_deflate_header(
                &self.state,
                self.gz_header.as_ref(),
                self.dict_adler,
            )?;
            self.state.pre_output_fifo.push_slice(&header)?;
            self.state.flags.header_added = true;
        }

        self.drain_fifo_pre(output);

        if let Some(dict) = self.pending_dict.take() {
            let n = dict.len().min(self.dict_in.len());
            self.dict_in.as_mut_slice()[..n].copy_from_slice(&dict[..n]);
            self.state.dict_len = n as u32;
        }

        let is_finish = matches!(flush, Flush::Finish);
        let is_sync_flush = matches!(flush, Flush::Sync | Flush::Partial | Flush::Full);

        // A `Finish` or sync-style flush call must run the hardware step
        // even once `input` is exhausted: the simulated engine self-
        // terminates the open block (BFINAL + EOB, or the aligned
        // empty-stored-block sync marker) from its own internal bit state
        // when driven with an empty slice and the matching `Flush` mode,
        // which is the only way this codec can close/flush a block without
        // knowing the real accelerator's leftover partial-byte bits (the
        // ASV here carries no such field). Skipping the hardware step on an
        // empty-input sync flush would leave miniz's buffered bits
        // unflushed, breaking `Write::flush()`.
        let want_hardware_step = !output.is_empty()
            && (!input.is_empty()
                || (is_finish && !self.state.flags.eob_added)
                || is_sync_flush);
        if want_hardware_step {
            let done = self.run_hardware_step(dispatcher, input, output, flush)?;
            if done {
                self.state.flags.eob_added = true;
            }
        }

        if matches!(flush, Flush::Full) {
            self.state.dict_len = 0;
        }

        if self.state.flags.eob_added && !self.state.flags.trailer_added {
            let trailer = wrapper::build_trailer(&self.state);
            self.state.post_output_fifo.push_slice(&trailer)?;
            self.state.flags.trailer_added = true;
        }

        self.drain_fifo_post(output);

        self.state.total_in += (in_start_len - input.len()) as u64;
        self.state.total_out += (out_start_len - output.len()) as u64;

        if self.state.is_stream_end_ready() {
            Ok(Status::StreamEnd)
        } else {
            Ok(Status::Ok)
        }
    }

    fn drain_fifo_pre(&mut self, output: &mut &mut [u8]) {
        drain_into_output(&mut self.state.pre_output_fifo, output);
    }

    fn drain_fifo_post(&mut self, output: &mut &mut [u8]) {
        drain_into_output(&mut self.state.post_output_fifo, output);
    }

    fn run_hardware_step(
        &mut self,
        dispatcher: &Dispatcher,
        input: &mut &[u8],
        output: &mut &mut [u8],
        flush: Flush,
    ) -> Result<bool> {
        let mut ddcb = Ddcb::new(Opcode::Deflate, 0);
        ddcb.sim_context_id = self.sim_context_id;
        ddcb.set_asiv_flush(match flush {
            Flush::None => AsivFlush::None,
            Flush::Sync | Flush::Partial => AsivFlush::SyncFlush,
            Flush::Full => AsivFlush::SyncFlush,
            Flush::Finish => AsivFlush::Finish,
        });

        let mut options = DdcbOptions::default();
        options.save_dictionary = !self.skip_last_dictionary;
        ddcb.options = options;

        let request = DdcbRequest {
            ddcb,
            input: input.to_vec(),
            output: vec![0u8; output.len()],
            dict_in: self.dict_in.as_slice()[..self.state.dict_len as usize].to_vec(),
            dict_out: vec![0u8; self.dict_out.len()],
            next: None,
        };

        let mut completions = dispatcher.execute(request)?;
        let completion = completions
            .pop()
            .ok_or_else(|| ZedcError::stream_error("deflate: dispatcher returned no completion"))?;

        if !completion.code.is_success() {
            return Err(ZedcError::ErrCard(completion.code.to_hardware_fault()));
        }

        let (processed_in, produced_out, done, _dict_out_len) = completion.ddcb.asv_result();
        let processed_in = processed_in as usize;
        let produced_out = produced_out as usize;

        self.state.checksums.update(&input[..processed_in]);
        output[..produced_out].copy_from_slice(&completion.output[..produced_out]);

        *input = &input[processed_in..];
        *output = std::mem::take(output).split_at_mut(produced_out).1;

        self.state.inp_processed += processed_in as u64;
        self.state.outp_returned += produced_out as u64;

        Ok(done)
    }
}

fn drain_into_output(fifo: &mut crate::codec_state::ByteFifo, output: &mut &mut [u8]) {
    if fifo.is_empty() || output.is_empty() {
        return;
    }
    let n = fifo.drain_into(output);
    let tmp = std::mem::take(output);
    *output = tmp.split_at_mut(n).1;
}
