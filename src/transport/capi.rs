//! CAPI/genwqe transport: the shape the real ioctl and mmap contract would
//! need, with every body a stub. There is no way to exercise a real
//! accelerator from this crate's test environment, so every entry point
//! that would need `/dev/genwqe*` or a CAPI AFU node returns
//! [`ZedcError::ErrOpen`] rather than pretending to succeed.
//!
//! Kept as a real (if inert) implementation rather than deleted so that the
//! trait boundary documents the actual register contract: a production
//! build of this crate would replace these bodies with the ioctl/mmap calls
//! and nothing else in the crate would need to change.

use std::time::Duration;

use crate::config::CardIndex;
use crate::ddcb::{CompletionCode, Ddcb};
use crate::error::{Result, ZedcError};
use crate::workspace::{AllocKind, DmaBuffer};

use super::{Direction, Mode, Transport, TransportStats, WaitOutcome};

#[derive(Debug, Default)]
pub struct CapiTransport {
    opened: bool,
    stats: TransportStats,
}

impl CapiTransport {
    pub fn new() -> CapiTransport {
        CapiTransport::default()
    }

    fn require_open(&self) -> Result<()> {
        if self.opened {
            Ok(())
        } else {
            Err(ZedcError::ErrOpen("capi transport not open".into()))
        }
    }
}

impl Transport for CapiTransport {
    fn open(&mut self, _card: CardIndex, _mode: Mode, _app_id: u32, _app_id_mask: u32) -> Result<()> {
        // A real implementation resolves `/dev/cxl/afu*.0m` (or the genwqe
        // equivalent), opens it, mmaps the MMIO window, and verifies the
        // app-id register before returning. None of that exists here.
        Err(ZedcError::ErrOpen(
            "no CAPI/genwqe accelerator device present in this environment".into(),
        ))
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn submit_queue_start(&self, _queue_base_addr: u64, _first_seq: u16, _depth: u8) -> Result<()> {
        self.require_open()
    }

    fn submit_trigger(&self, _seq: u16) -> Result<()> {
        self.require_open()
    }

    fn wait_event(&self, _timeout: Duration) -> Result<WaitOutcome> {
        self.require_open()?;
        Err(ZedcError::IrqTimeout)
    }

    fn read_reg(&self, _offset: u32) -> Result<u64> {
        self.require_open()?;
        Ok(0)
    }

    fn write_reg(&self, _offset: u32, _value: u64) -> Result<()> {
        self.require_open()
    }

    fn pin(&self, _buf: &mut DmaBuffer, _direction: Direction) -> Result<()> {
        self.require_open()
    }

    fn unpin(&self, _buf: &mut DmaBuffer) -> Result<()> {
        self.require_open()
    }

    fn dma_alloc(&self, len: usize) -> Result<DmaBuffer> {
        self.require_open()?;
        Ok(DmaBuffer::new(len, AllocKind::DmaContiguous))
    }

    fn dma_free(&self, _buf: DmaBuffer) {}

    fn execute_ddcb(
        &self,
        _ddcb: &mut Ddcb,
        _input: &[u8],
        _output: &mut [u8],
        _dict_in: &[u8],
        _dict_out: &mut [u8],
    ) -> Result<CompletionCode> {
        self.require_open()?;
        Err(ZedcError::IrqTimeout)
    }

    fn accel_dump_hardware_version(&self) -> Result<u64> {
        self.require_open()?;
        Ok(0)
    }

    fn stats(&self) -> TransportStats {
        self.stats
    }
}
