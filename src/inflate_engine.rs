//! The Inflate Engine (spec §4.5): strips the wrapper header from input,
//! drives the accelerator (or simulated) decompression step, and verifies
//! the trailer once the final block is seen.

use crate::checksum::Checksums;
use crate::codec_state::CodecState;
use crate::ddcb::{AsivFlush, Ddcb, DdcbOptions, Opcode};
use crate::dispatcher::{DdcbRequest, Dispatcher};
use crate::error::{Result, ZedcError};
use crate::mem::{Flush, Status};
use crate::transport::sim::SimTransport;
use crate::wrapper::{self, GzHeaderMeta, WrapperStripOutcome};
use crate::workspace::{AllocKind, DmaBuffer};

/// Caller-visible handle for a single inflate stream.
pub struct InflateEngine {
    pub state: CodecState,
    dict_in: DmaBuffer,
    dict_out: DmaBuffer,
    sim_context_id: u64,
    header_meta: GzHeaderMeta,
    header_done: bool,
    trailer_buf: Vec<u8>,
    pending_dict: Option<Vec<u8>>,
}

impl InflateEngine {
    pub fn new(window_bits: i32, sim: &SimTransport) -> Result<InflateEngine> {
        let state = CodecState::new(window_bits)?;
        let sim_context_id = sim.register_decompress();
        Ok(InflateEngine {
            state,
            dict_in: DmaBuffer::new(crate::workspace::DICT_PAGE_SIZE, AllocKind::PlainAligned),
            dict_out: DmaBuffer::new(crate::workspace::DICT_PAGE_SIZE, AllocKind::PlainAligned),
            sim_context_id,
            header_meta: GzHeaderMeta::default(),
            header_done: false,
            trailer_buf: Vec::new(),
            pending_dict: None,
        })
    }

    pub fn header(&self) -> &GzHeaderMeta {
        &self.header_meta
    }

    pub fn reset(&mut self) {
        self.state.reset();
        self.header_meta = GzHeaderMeta::default();
        self.header_done = false;
        self.trailer_buf.clear();
        self.pending_dict = None;
    }

    /// Supply a preset dictionary, per spec §4.4's `deflate_set_dictionary`/
    /// §8 scenario 5. Raw DEFLATE has no wrapper to carry a dictionary id,
    /// so the caller may supply one unilaterally at any point before the
    /// hardware step that needs it; zlib-wrapped streams must instead wait
    /// for a `NeedDict` status and the Adler-32 of `dict` must match the one
    /// carried in the zlib FDICT header.
    pub fn set_dictionary(&mut self, dict: &[u8]) -> Result<()> {
        if self.state.format == crate::codec_state::WrapperFormat::Raw {
            self.pending_dict = Some(dict.to_vec());
            return Ok(());
        }
        let mut sums = Checksums::new();
        sums.update(dict);
        match self.state.expected_dict_adler {
            Some(expected) if expected == sums.adler32() => {
                self.pending_dict = Some(dict.to_vec());
                Ok(())
            }
            Some(_) => Err(ZedcError::data_error("preset dictionary adler-32 mismatch")),
            None => Err(ZedcError::stream_error(
                "set_dictionary called without a pending NeedDict",
            )),
        }
    }

    /// Drive one `inflate(flush)` call.
    pub fn inflate(
        &mut self,
        dispatcher: &Dispatcher,
        input: &mut &[u8],
        output: &mut &mut [u8],
        flush: Flush,
    ) -> Result<Status> {
        let out_start_len = output.len();
        let in_start_len = input.len();

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
                WrapperStripOutcome::NeedMoreInput => {
                    self.state.total_in += (in_start_len - input.len()) as u64;
                    return Ok(Status::Ok);
                }
                WrapperStripOutcome::NeedDict => {
                    self.state.total_in += (in_start_len - input.len()) as u64;
                    return Ok(Status::NeedDict);
                }
                WrapperStripOutcome::Done => {
                    self.header_done = true;
                }
            }
        }

        if let Some(dict) = self.pending_dict.take() {
            let n = dict.len().min(self.dict_in.len());
            self.dict_in.as_mut_slice()[..n].copy_from_slice(&dict[..n]);
            self.state.dict_len = n as u32;
        }

        if !self.state.flags.final_block_seen && !input.is_empty() && !output.is_empty() {
            self.run_hardware_step(dispatcher, input, output, flush)?;
        }

        if self.state.flags.final_block_seen && self.trailer_buf.len() < trailer_len(&self.state) {
            let need = trailer_len(&self.state) - self.trailer_buf.len();
            let take = need.min(input.len());
            self.trailer_buf.extend_from_slice(&input[..take]);
            *input = &input[take..];
        }

        let mut status = Status::Ok;
        if self.state.flags.final_block_seen && self.trailer_buf.len() == trailer_len(&self.state) {
            wrapper::verify_trailer(&self.state, &self.trailer_buf)?;
            status = Status::StreamEnd;
        }

        self.state.total_in += (in_start_len - input.len()) as u64;
        self.state.total_out += (out_start_len - output.len()) as u64;

        Ok(status)
    }

    fn run_hardware_step(
        &mut self,
        dispatcher: &Dispatcher,
        input: &mut &[u8],
        output: &mut &mut [u8],
        flush: Flush,
    ) -> Result<()> {
        let mut ddcb = Ddcb::new(Opcode::Inflate, 0);
        ddcb.sim_context_id = self.sim_context_id;
        ddcb.set_asiv_flush(match flush {
            Flush::None => AsivFlush::None,
            Flush::Sync | Flush::Partial | Flush::Full => AsivFlush::SyncFlush,
            Flush::Finish => AsivFlush::Finish,
        });
        ddcb.options = DdcbOptions::default();

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
            .ok_or_else(|| ZedcError::stream_error("inflate: dispatcher returned no completion"))?;

        if completion.code == crate::ddcb::CompletionCode::NEED_DICT {
            let (processed_in, _produced_out, _done, _) = completion.ddcb.asv_result();
            *input = &input[processed_in as usize..];
            return Err(ZedcError::data_error(
                "accelerator reported need-dict for raw-deflate preset dictionary",
            ));
        }
        if !completion.code.is_success() {
            return Err(ZedcError::ErrCard(completion.code.to_hardware_fault()));
        }

        let (processed_in, produced_out, done, _dict_out_len) = completion.ddcb.asv_result();
        let processed_in = processed_in as usize;
        let produced_out = produced_out as usize;

        output[..produced_out].copy_from_slice(&completion.output[..produced_out]);
        self.state.checksums.update(&output[..produced_out]);

        *input = &input[processed_in..];
        *output = std::mem::take(output).split_at_mut(produced_out).1;

        self.state.inp_processed += processed_in as u64;
        self.state.outp_returned += produced_out as u64;

        if done {
            self.state.flags.final_block_seen = true;
        }

        Ok(())
    }
}

fn trailer_len(state: &CodecState) -> usize {
    match state.format {
        crate::codec_state::WrapperFormat::Raw => 0,
        crate::codec_state::WrapperFormat::Zlib => 4,
        crate::codec_state::WrapperFormat::Gzip => 8,
    }
}
