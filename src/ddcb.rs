//! The 256-byte Device Driver Control Block: the fixed-layout command
//! record submitted to the accelerator (§6 "DDCB layout").
//!
//! Grounded in `original_source/include/libddcb.h`'s `ddcb_cmd_t` layout and
//! in `ethindp-kernel`'s NVMe `SubmissionQueueEntry`/`CompletionQueueEntry`
//! pattern: a `repr(C)` fixed-size record, its size pinned with
//! `static_assertions::assert_eq_size!`, with `bit_field::BitField` used for
//! the sub-byte fields of the preamble rather than hand-rolled shifts.

use bit_field::BitField;
use static_assertions::assert_eq_size;

pub const DDCB_SIZE: usize = 256;
pub const PREAMBLE_SIZE: usize = 32;
pub const ASIV_SIZE: usize = 104;
pub const ATS_SIZE: usize = 8;
pub const ASV_SIZE: usize = 64;
pub const RESERVED_SIZE: usize = DDCB_SIZE - PREAMBLE_SIZE - ASIV_SIZE - ATS_SIZE - ASV_SIZE;

/// Command opcode carried in the DDCB preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Deflate,
    Inflate,
}

impl Opcode {
    fn as_u8(self) -> u8 {
        match self {
            Opcode::Deflate => 0x00,
            Opcode::Inflate => 0x01,
        }
    }
}

/// Command-level option bits (preamble `options` field).
#[derive(Debug, Clone, Copy, Default)]
pub struct DdcbOptions {
    pub save_dictionary: bool,
    pub cross_check: bool,
    pub dynamic_huffman: bool,
    pub interrupt_enable: bool,
}

impl DdcbOptions {
    fn pack(self) -> u16 {
        let mut bits: u16 = 0;
        bits.set_bit(0, self.save_dictionary);
        bits.set_bit(1, self.cross_check);
        bits.set_bit(2, self.dynamic_huffman);
        bits.set_bit(3, self.interrupt_enable);
        bits
    }
}

/// Address-translation-specification flags: one 4-bit nibble per DDCB
/// address field, identifying whether it names contiguous DMA memory or a
/// scatter-gather list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Direct = 0x0,
    ScatterGather = 0x1,
}

/// A DDCB's 256 bytes, laid out exactly as the accelerator register
/// contract specifies: 32-byte preamble, 104-byte ASIV, 8-byte ATS, 64-byte
/// ASV, remainder reserved. Multi-byte fields are big-endian on the wire;
/// this struct holds already-decoded values and serializes/deserializes
/// through [`Ddcb::to_bytes`]/[`Ddcb::from_bytes`].
#[derive(Debug, Clone)]
#[repr(C)]
pub struct Ddcb {
    pub opcode: Opcode,
    pub function_id: u8,
    pub options: DdcbOptions,
    /// Input/output payload lengths, in 8-byte words (the `psp` encoding).
    pub psp_in_words: u8,
    pub psp_out_words: u8,
    pub sequence_number: u16,
    pub asiv: [u8; ASIV_SIZE],
    pub ats: [u8; ATS_SIZE],
    pub asv: [u8; ASV_SIZE],
    /// Simulator-private bookkeeping stashed in the wire-reserved tail.
    /// Not part of the real accelerator contract; see DESIGN.md.
    pub sim_context_id: u64,
}

assert_eq_size!(
    [u8; DDCB_SIZE],
    [u8; PREAMBLE_SIZE + ASIV_SIZE + ATS_SIZE + ASV_SIZE + RESERVED_SIZE]
);

impl Ddcb {
    pub fn new(opcode: Opcode, sequence_number: u16) -> Ddcb {
        Ddcb {
            opcode,
            function_id: 0,
            options: DdcbOptions::default(),
            psp_in_words: 0,
            psp_out_words: 0,
            sequence_number,
            asiv: [0; ASIV_SIZE],
            ats: [0; ATS_SIZE],
            asv: [0; ASV_SIZE],
            sim_context_id: 0,
        }
    }

    /// Serialize to the 256-byte wire representation. `reserved` bytes
    /// (beyond the simulator's private tag) are zeroed.
    pub fn to_bytes(&self) -> [u8; DDCB_SIZE] {
        let mut out = [0u8; DDCB_SIZE];
        out[0] = 0xaa; // preset-preamble byte
        out[1] = self.opcode.as_u8();
        out[2] = self.function_id;
        let opts = self.options.pack();
        out[3..5].copy_from_slice(&opts.to_be_bytes());
        out[5] = self.psp_in_words;
        out[6] = self.psp_out_words;
        out[8..10].copy_from_slice(&self.sequence_number.to_be_bytes());

        let asiv_start = PREAMBLE_SIZE;
        out[asiv_start..asiv_start + ASIV_SIZE].copy_from_slice(&self.asiv);

        let ats_start = asiv_start + ASIV_SIZE;
        out[ats_start..ats_start + ATS_SIZE].copy_from_slice(&self.ats);

        let asv_start = ats_start + ATS_SIZE;
        out[asv_start..asv_start + ASV_SIZE].copy_from_slice(&self.asv);

        let reserved_start = asv_start + ASV_SIZE;
        out[reserved_start..reserved_start + 8].copy_from_slice(&self.sim_context_id.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; DDCB_SIZE]) -> Ddcb {
        let opcode = if bytes[1] == Opcode::Inflate.as_u8() {
            Opcode::Inflate
        } else {
            Opcode::Deflate
        };
        let opt_bits = u16::from_be_bytes([bytes[3], bytes[4]]);
        let options = DdcbOptions {
            save_dictionary: opt_bits.get_bit(0),
            cross_check: opt_bits.get_bit(1),
            dynamic_huffman: opt_bits.get_bit(2),
            interrupt_enable: opt_bits.get_bit(3),
        };
        let sequence_number = u16::from_be_bytes([bytes[8], bytes[9]]);

        let asiv_start = PREAMBLE_SIZE;
        let mut asiv = [0u8; ASIV_SIZE];
        asiv.copy_from_slice(&bytes[asiv_start..asiv_start + ASIV_SIZE]);

        let ats_start = asiv_start + ASIV_SIZE;
        let mut ats = [0u8; ATS_SIZE];
        ats.copy_from_slice(&bytes[ats_start..ats_start + ATS_SIZE]);

        let asv_start = ats_start + ATS_SIZE;
        let mut asv = [0u8; ASV_SIZE];
        asv.copy_from_slice(&bytes[asv_start..asv_start + ASV_SIZE]);

        let reserved_start = asv_start + ASV_SIZE;
        let sim_context_id =
            u64::from_be_bytes(bytes[reserved_start..reserved_start + 8].try_into().unwrap());

        Ddcb {
            opcode,
            function_id: bytes[2],
            options,
            psp_in_words: bytes[5],
            psp_out_words: bytes[6],
            sequence_number,
            asiv,
            ats,
            asv,
            sim_context_id,
        }
    }
}

/// RETC/ATTN-style completion code, decoded once at the dispatcher
/// boundary per the "tagged variants over opaque ints" design note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionCode {
    pub retc: u16,
    pub attn: u16,
}

impl CompletionCode {
    pub const IDLE: CompletionCode = CompletionCode { retc: 0x00, attn: 0x00 };
    pub const COMPLETE: CompletionCode = CompletionCode { retc: 0x102, attn: 0x00 };
    pub const FAULT: CompletionCode = CompletionCode { retc: 0x101, attn: 0x00 };
    pub const NEED_DICT: CompletionCode = CompletionCode { retc: 0x104, attn: 0x801A };

    pub fn is_success(&self) -> bool {
        *self == CompletionCode::COMPLETE
    }

    pub fn to_hardware_fault(&self) -> crate::error::HardwareFault {
        use crate::error::HardwareFault;
        match *self {
            CompletionCode::IDLE => HardwareFault::Idle,
            CompletionCode::COMPLETE => HardwareFault::Complete,
            CompletionCode::FAULT => HardwareFault::Fault,
            CompletionCode::NEED_DICT => HardwareFault::NeedDictPair,
            CompletionCode { retc, attn } => HardwareFault::Unknown(retc, attn),
        }
    }
}

/// The subset of ASIV/ASV fields the Deflate/Inflate engines and the
/// simulated transport agree on: flush mode going in, processed/produced
/// counts and a completion flag coming out. A real accelerator firmware
/// would define many more fine-grained fields here (dictionary offsets,
/// scratch bit counts); this crate's engines track those directly on
/// [`crate::codec_state::CodecState`] instead (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsivFlush {
    None,
    SyncFlush,
    Finish,
}

impl Ddcb {
    pub fn set_asiv_flush(&mut self, flush: AsivFlush) {
        self.asiv[0] = match flush {
            AsivFlush::None => 0,
            AsivFlush::SyncFlush => 1,
            AsivFlush::Finish => 2,
        };
    }

    pub fn asiv_flush(&self) -> AsivFlush {
        match self.asiv[0] {
            1 => AsivFlush::SyncFlush,
            2 => AsivFlush::Finish,
            _ => AsivFlush::None,
        }
    }

    pub fn set_asv_result(&mut self, processed_in: u32, produced_out: u32, done: bool, dict_out_len: u32) {
        self.asv[0..4].copy_from_slice(&processed_in.to_be_bytes());
        self.asv[4..8].copy_from_slice(&produced_out.to_be_bytes());
        self.asv[8] = done as u8;
        self.asv[9..13].copy_from_slice(&dict_out_len.to_be_bytes());
    }

    pub fn asv_result(&self) -> (u32, u32, bool, u32) {
        let processed_in = u32::from_be_bytes(self.asv[0..4].try_into().unwrap());
        let produced_out = u32::from_be_bytes(self.asv[4..8].try_into().unwrap());
        let done = self.asv[8] != 0;
        let dict_out_len = u32::from_be_bytes(self.asv[9..13].try_into().unwrap());
        (processed_in, produced_out, done, dict_out_len)
    }
}
