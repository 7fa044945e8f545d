//! Error taxonomy for the codec core.
//!
//! `Ok`/`StreamEnd`/`NeedDict` are not part of [`ZedcError`] — they are
//! non-error outcomes and live on [`crate::mem::Status`] instead, keeping
//! the in-progress `Status` enum separate from the single `DataError`
//! struct surfaced by the public `Compress`/`Decompress` API.

use std::fmt;

use thiserror::Error;

/// Accelerator hardware fault classification, reported by a DDCB completion.
///
/// These mirror the `DDCB_RETC_*` constants of the accelerator's register
/// contract: a closed set decoded once at the dispatcher boundary rather than
/// threaded through as raw integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareFault {
    /// `DDCB_RETC_UNUSED` — slot was never submitted.
    Unused,
    /// `DDCB_RETC_IDLE` — completed with no error.
    Idle,
    /// `DDCB_RETC_PENDING` — still in flight.
    Pending,
    /// `DDCB_RETC_COMPLETE` — completed successfully.
    Complete,
    /// `DDCB_RETC_FAULT` — accelerator reported a general fault.
    Fault,
    /// `DDCB_RETC_ERROR` — accelerator reported a command error.
    Error,
    /// A specific (RETC=0x104, ATTN=0x801A) pair, reclassified by the inflate
    /// engine to [`crate::mem::Status`]'s `NeedDict`-equivalent rather than
    /// surfaced here.
    NeedDictPair,
    /// Any other RETC/ATTN combination the dispatcher did not special-case.
    Unknown(u16, u16),
}

impl fmt::Display for HardwareFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareFault::Unused => write!(f, "ddcb slot unused"),
            HardwareFault::Idle => write!(f, "ddcb idle"),
            HardwareFault::Pending => write!(f, "ddcb pending"),
            HardwareFault::Complete => write!(f, "ddcb complete"),
            HardwareFault::Fault => write!(f, "ddcb fault"),
            HardwareFault::Error => write!(f, "ddcb error"),
            HardwareFault::NeedDictPair => write!(f, "ddcb reported need-dict"),
            HardwareFault::Unknown(retc, attn) => {
                write!(f, "ddcb unknown retc=0x{:04x} attn=0x{:04x}", retc, attn)
            }
        }
    }
}

/// The propagated error categories of the codec core.
///
/// Deliberately excludes `Ok`, `StreamEnd`, and `NeedDict`: those are
/// non-error outcomes carried by `Status`.
#[derive(Debug, Error)]
pub enum ZedcError {
    /// Invariant violation, invalid parameter, oversized residual bits, or
    /// unknown header type.
    #[error("stream error: {0}")]
    StreamError(String),

    /// Wrapper header invalid, checksum mismatch, or dictionary overrun.
    #[error("data error: {0}")]
    DataError(String),

    /// Workspace or DMA allocation failure.
    #[error("memory allocation error: {0}")]
    MemError(String),

    /// Neither input nor output progress is possible; not the zero-input
    /// zero-output start condition (which resolves to `Status::Ok`, see
    /// the Design Notes open question).
    #[error("buffer error: no forward progress possible")]
    BufError,

    /// The app-id register did not match the required mask, or the
    /// accelerator otherwise reported a fault not reclassified as
    /// `NeedDict`.
    #[error("accelerator card error: {0}")]
    ErrCard(HardwareFault),

    /// The device node could not be opened.
    #[error("accelerator open error: {0}")]
    ErrOpen(String),

    /// The completion thread's configured per-DDCB timeout expired.
    #[error("irq timeout waiting for ddcb completion")]
    IrqTimeout,

    /// A hardware fatal event (storage fault, AFU error) was observed.
    #[error("accelerator event failure")]
    EventFail,

    /// The completion thread's event-channel select/poll call failed.
    #[error("select/poll on event channel failed: {0}")]
    SelectFail(String),
}

impl ZedcError {
    pub fn stream_error(msg: impl Into<String>) -> ZedcError {
        ZedcError::StreamError(msg.into())
    }

    pub fn data_error(msg: impl Into<String>) -> ZedcError {
        ZedcError::DataError(msg.into())
    }

    pub fn mem_error(msg: impl Into<String>) -> ZedcError {
        ZedcError::MemError(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ZedcError>;
