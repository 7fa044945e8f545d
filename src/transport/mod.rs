//! Accelerator Transport (§4.1): owns the per-context accelerator handle,
//! memory-mapped register window, interrupt/event channel, and the lifetime
//! of pinned DMA regions.
//!
//! Two implementations sit behind the [`Transport`] trait: [`capi::CapiTransport`],
//! shaped exactly like the real ioctl/mmap contract a `/dev/genwqe*` or CAPI
//! AFU driver would need to satisfy (and which therefore fails to open on a
//! machine with no such device), and [`sim::SimTransport`], which executes
//! DDCBs by running the same bytes through a persistent software
//! DEFLATE/INFLATE engine, so the crate is fully testable with no hardware
//! present and no real device node to open.

pub mod capi;
pub mod sim;

use std::time::Duration;

use crate::config::CardIndex;
use crate::ddcb::{CompletionCode, Ddcb};
use crate::error::{Result, ZedcError};
use crate::workspace::DmaBuffer;

/// Advisory flags controlling later behavior, fixed at open time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mode {
    pub read_only: bool,
    pub write_only: bool,
    pub read_write: bool,
    pub async_notification: bool,
    pub non_blocking: bool,
    pub polling_completion: bool,
    pub master: bool,
}

/// Result of `wait_event`: which of the four observable conditions fired.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitOutcome {
    pub interrupt: bool,
    pub fault: bool,
    pub afu_error: bool,
    pub timeout: bool,
}

/// DMA transfer direction, used by `pin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToDevice,
    FromDevice,
    Bidirectional,
}

/// Coarse hardware statistics a transport accumulates, surfaced read-only
/// as raw counters with no derived rates or aggregation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportStats {
    pub queue_work_time_ticks: u64,
    pub frequency_hz: u64,
}

/// The accelerator transport contract. Every method here corresponds
/// directly to an operation named in §4.1.
pub trait Transport: Send + Sync {
    fn open(&mut self, card: CardIndex, mode: Mode, app_id: u32, app_id_mask: u32) -> Result<()>;
    fn close(&mut self);

    fn submit_queue_start(&self, queue_base_addr: u64, first_seq: u16, depth: u8) -> Result<()>;
    fn submit_trigger(&self, seq: u16) -> Result<()>;
    fn wait_event(&self, timeout: Duration) -> Result<WaitOutcome>;

    fn read_reg(&self, offset: u32) -> Result<u64>;
    fn write_reg(&self, offset: u32, value: u64) -> Result<()>;

    fn pin(&self, buf: &mut DmaBuffer, direction: Direction) -> Result<()>;
    fn unpin(&self, buf: &mut DmaBuffer) -> Result<()>;
    fn dma_alloc(&self, len: usize) -> Result<DmaBuffer>;
    fn dma_free(&self, buf: DmaBuffer);

    /// Execute one DDCB to completion: the dispatcher's view of "submit,
    /// trigger, wait, and have the result area populated in place". Real
    /// hardware does this asynchronously across the granular register
    /// operations above, locating `input`/`output` through addresses
    /// encoded in the DDCB's ASIV region; this method is the boundary the
    /// dispatcher's completion-thread loop actually calls per in-flight
    /// slot, with the buffers passed explicitly rather than recovered from
    /// raw addresses since both ends live in the same process here.
    ///
    /// `dict_in`/`dict_out` stand in for the two 32 KiB dictionary-page
    /// addresses the real ASIV/ASV regions would carry: this crate passes
    /// them as explicit buffers for the same reason `input`/`output` are.
    fn execute_ddcb(
        &self,
        ddcb: &mut Ddcb,
        input: &[u8],
        output: &mut [u8],
        dict_in: &[u8],
        dict_out: &mut [u8],
    ) -> Result<CompletionCode>;

    /// 64-bit app-id register: low 32 bits "GZIP" magic, next 8 bits the
    /// dynamic-Huffman-capable variant.
    fn accel_dump_hardware_version(&self) -> Result<u64>;

    fn stats(&self) -> TransportStats;
}

pub(crate) fn app_id_matches(app_id: u32, mask: u32, observed: u32) -> bool {
    (observed & mask) == (app_id & mask)
}

pub(crate) fn err_card_mismatch() -> ZedcError {
    ZedcError::ErrCard(crate::error::HardwareFault::Unknown(0, 0))
}
