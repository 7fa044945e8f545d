//! A simulated Accelerator Transport: executes DDCBs by running the same
//! bytes through a persistent software DEFLATE/INFLATE engine instead of
//! real silicon.
//!
//! The simulated transport keeps one `SoftwareCompress`/`SoftwareDecompress`
//! object alive per registered context across calls, which naturally
//! carries forward the internal streaming continuation a real accelerator
//! would have to reconstruct from scratch-buffer bytes on every DDCB (the
//! tree/scratch save-restore dance). The fine-grained bit accounting in
//! [`crate::codec_state::ScratchAccounting`] is still tracked by the
//! engines against this transport so the type-level contract a real
//! transport would need to satisfy stays intact; see DESIGN.md.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::CardIndex;
use crate::ddcb::{AsivFlush, CompletionCode, Ddcb, Opcode};
use crate::error::{Result, ZedcError};
use crate::software::{SoftwareCompress, SoftwareDecompress, SoftwareFlush};
use crate::workspace::{AllocKind, DmaBuffer};

use super::{Direction, Mode, Transport, TransportStats, WaitOutcome};

enum SimEngine {
    Compress(SoftwareCompress),
    Decompress(SoftwareDecompress),
}

/// A registered engine plus whether its preset dictionary (carried in on a
/// DDCB's `dict_in` field) has already been folded into its window.
struct SimSlot {
    engine: SimEngine,
    dict_primed: bool,
}

/// A software-hosted accelerator transport. Every DDCB submitted is
/// executed synchronously against a registered per-stream engine looked
/// up by `ddcb.sim_context_id`.
pub struct SimTransport {
    opened: Mutex<bool>,
    engines: Mutex<HashMap<u64, SimSlot>>,
    next_context_id: AtomicU64,
    stats: Mutex<TransportStats>,
}

impl SimTransport {
    pub fn new() -> SimTransport {
        SimTransport {
            opened: Mutex::new(false),
            engines: Mutex::new(HashMap::new()),
            next_context_id: AtomicU64::new(1),
            stats: Mutex::new(TransportStats::default()),
        }
    }

    /// Register a fresh compressor context and return the id the engine
    /// should stamp onto every DDCB it submits for this stream.
    pub fn register_compress(&self, level: i32) -> u64 {
        let id = self.next_context_id.fetch_add(1, Ordering::Relaxed);
        self.engines.lock().unwrap().insert(
            id,
            SimSlot {
                engine: SimEngine::Compress(SoftwareCompress::new(level)),
                dict_primed: false,
            },
        );
        id
    }

    pub fn register_decompress(&self) -> u64 {
        let id = self.next_context_id.fetch_add(1, Ordering::Relaxed);
        self.engines.lock().unwrap().insert(
            id,
            SimSlot {
                engine: SimEngine::Decompress(SoftwareDecompress::new()),
                dict_primed: false,
            },
        );
        id
    }

    pub fn unregister(&self, context_id: u64) {
        self.engines.lock().unwrap().remove(&context_id);
    }

    /// `&self` twins of [`Transport::open`]/[`Transport::close`], for
    /// callers that keep an `Arc<SimTransport>` alongside the boxed
    /// [`Transport`] handed to a [`crate::dispatcher::Dispatcher`] (see
    /// [`SharedSimTransport`]).
    fn open_handle(&self, _card: CardIndex, _mode: Mode, _app_id: u32, _app_id_mask: u32) -> Result<()> {
        *self.opened.lock().unwrap() = true;
        Ok(())
    }

    fn close_handle(&self) {
        *self.opened.lock().unwrap() = false;
        self.engines.lock().unwrap().clear();
    }
}

/// A [`Transport`] impl over a shared `Arc<SimTransport>`, so the same
/// engine registry backs both the [`Dispatcher`](crate::dispatcher::Dispatcher)
/// that owns a `Box<dyn Transport>` and the higher-level shim/engine code
/// that needs to call `register_compress`/`register_decompress` directly.
pub struct SharedSimTransport(pub std::sync::Arc<SimTransport>);

impl Transport for SharedSimTransport {
    fn open(&mut self, card: CardIndex, mode: Mode, app_id: u32, app_id_mask: u32) -> Result<()> {
        self.0.open_handle(card, mode, app_id, app_id_mask)
    }

    fn close(&mut self) {
        self.0.close_handle()
    }

    fn submit_queue_start(&self, queue_base_addr: u64, first_seq: u16, depth: u8) -> Result<()> {
        self.0.submit_queue_start(queue_base_addr, first_seq, depth)
    }

    fn submit_trigger(&self, seq: u16) -> Result<()> {
        self.0.submit_trigger(seq)
    }

    fn wait_event(&self, timeout: Duration) -> Result<WaitOutcome> {
        self.0.wait_event(timeout)
    }

    fn read_reg(&self, offset: u32) -> Result<u64> {
        self.0.read_reg(offset)
    }

    fn write_reg(&self, offset: u32, value: u64) -> Result<()> {
        self.0.write_reg(offset, value)
    }

    fn pin(&self, buf: &mut DmaBuffer, direction: Direction) -> Result<()> {
        self.0.pin(buf, direction)
    }

    fn unpin(&self, buf: &mut DmaBuffer) -> Result<()> {
        self.0.unpin(buf)
    }

    fn dma_alloc(&self, len: usize) -> Result<DmaBuffer> {
        self.0.dma_alloc(len)
    }

    fn dma_free(&self, buf: DmaBuffer) {
        self.0.dma_free(buf)
    }

    fn execute_ddcb(
        &self,
        ddcb: &mut Ddcb,
        input: &[u8],
        output: &mut [u8],
        dict_in: &[u8],
        dict_out: &mut [u8],
    ) -> Result<CompletionCode> {
        self.0.execute_ddcb(ddcb, input, output, dict_in, dict_out)
    }

    fn accel_dump_hardware_version(&self) -> Result<u64> {
        self.0.accel_dump_hardware_version()
    }

    fn stats(&self) -> TransportStats {
        self.0.stats()
    }
}

impl Default for SimTransport {
    fn default() -> SimTransport {
        SimTransport::new()
    }
}

impl Transport for SimTransport {
    fn open(&mut self, _card: CardIndex, _mode: Mode, _app_id: u32, _app_id_mask: u32) -> Result<()> {
        *self.opened.lock().unwrap() = true;
        log::debug!("sim transport: opened");
        Ok(())
    }

    fn close(&mut self) {
        *self.opened.lock().unwrap() = false;
        self.engines.lock().unwrap().clear();
    }

    fn submit_queue_start(&self, _queue_base_addr: u64, _first_seq: u16, _depth: u8) -> Result<()> {
        Ok(())
    }

    fn submit_trigger(&self, _seq: u16) -> Result<()> {
        Ok(())
    }

    fn wait_event(&self, _timeout: Duration) -> Result<WaitOutcome> {
        Ok(WaitOutcome {
            interrupt: true,
            ..WaitOutcome::default()
        })
    }

    fn read_reg(&self, _offset: u32) -> Result<u64> {
        Ok(0)
    }

    fn write_reg(&self, _offset: u32, _value: u64) -> Result<()> {
        Ok(())
    }

    fn pin(&self, _buf: &mut DmaBuffer, _direction: Direction) -> Result<()> {
        Ok(())
    }

    fn unpin(&self, _buf: &mut DmaBuffer) -> Result<()> {
        Ok(())
    }

    fn dma_alloc(&self, len: usize) -> Result<DmaBuffer> {
        Ok(DmaBuffer::new(len, AllocKind::PlainAligned))
    }

    fn dma_free(&self, _buf: DmaBuffer) {}

    fn execute_ddcb(
        &self,
        ddcb: &mut Ddcb,
        input: &[u8],
        output: &mut [u8],
        dict_in: &[u8],
        dict_out: &mut [u8],
    ) -> Result<CompletionCode> {
        if !*self.opened.lock().unwrap() {
            return Err(ZedcError::ErrOpen("sim transport not open".into()));
        }

        let mut engines = self.engines.lock().unwrap();
        let slot = engines
            .get_mut(&ddcb.sim_context_id)
            .ok_or_else(|| ZedcError::stream_error("sim transport: unknown context id"))?;

        let flush = match ddcb.asiv_flush() {
            AsivFlush::None => SoftwareFlush::None,
            AsivFlush::SyncFlush => SoftwareFlush::Sync,
            AsivFlush::Finish => SoftwareFlush::Finish,
        };

        if !slot.dict_primed && !dict_in.is_empty() {
            match &mut slot.engine {
                SimEngine::Compress(c) => c.prime_dictionary(dict_in)?,
                SimEngine::Decompress(d) => d.prime_dictionary(dict_in),
            }
            slot.dict_primed = true;
        }
        let _ = dict_out; // dict-out paging is not modeled; see DESIGN.md

        let (processed_in, produced_out, done) = match (&mut slot.engine, ddcb.opcode) {
            (SimEngine::Compress(c), Opcode::Deflate) => {
                let r = c.compress(input, output, flush)?;
                (r.consumed_in, r.produced_out, r.done)
            }
            (SimEngine::Decompress(d), Opcode::Inflate) => {
                let r = d.decompress(input, output, flush)?;
                (r.consumed_in, r.produced_out, r.done)
            }
            _ => {
                return Err(ZedcError::stream_error(
                    "sim transport: context engine kind does not match DDCB opcode",
                ))
            }
        };

        ddcb.set_asv_result(processed_in as u32, produced_out as u32, done, 0);

        let mut stats = self.stats.lock().unwrap();
        stats.queue_work_time_ticks += 1;
        stats.frequency_hz = 250_000_000;

        Ok(CompletionCode::COMPLETE)
    }

    fn accel_dump_hardware_version(&self) -> Result<u64> {
        // Low 32 bits "GZIP" magic, next byte >= 2 signals dynamic-Huffman
        // capability, matching the register map observed in spec §6.
        Ok(0x0000_0002_4757_5049)
    }

    fn stats(&self) -> TransportStats {
        *self.stats.lock().unwrap()
    }
}
