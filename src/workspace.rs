//! Per-stream workspace allocator (§4.3).
//!
//! Page-aligned dictionary pages, tree/scratch buffer and I/O staging
//! buffers. Three allocation "type" variants are interchangeable at the
//! caller level, exactly as specified; the choice is a performance hint
//! recorded on [`AllocKind`] rather than a different type.

pub const PAGE_SIZE: usize = 4096;
pub const DICT_PAGE_SIZE: usize = 32 * 1024;
pub const TREE_SCRATCH_SIZE: usize = 64 * 1024;
pub const DEFAULT_INPUT_STAGING: usize = 128 * 1024;
pub const DEFAULT_OUTPUT_STAGING: usize = 256 * 1024;

/// How a given buffer was obtained. All three are interchangeable at the
/// caller level; in this software-hosted crate they differ only in the log
/// message emitted at allocation time, standing in for what would otherwise
/// select a driver ioctl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocKind {
    /// Physically contiguous DMA memory obtained from the device driver.
    DmaContiguous,
    /// Ordinary process memory registered with the driver as a
    /// scatter-gather list, optionally pinned.
    ScatterGather { pinned: bool },
    /// Plain page-aligned process memory, unregistered.
    PlainAligned,
}

fn round_up_to_page(len: usize) -> usize {
    (len + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// A page-aligned buffer, conceptually owned exclusively by whichever DDCB
/// currently references it; enforced at the type level by taking it as a
/// mutable borrow into the submission call and returning it with the result
/// (the "ownership of DMA buffers" design note).
#[derive(Debug, Clone)]
pub struct DmaBuffer {
    data: Vec<u8>,
    kind: AllocKind,
}

// SAFETY: a `DmaBuffer` owns a heap allocation exclusively, so it is safe
// to transfer between threads.
unsafe impl Send for DmaBuffer {}

impl DmaBuffer {
    pub fn new(len: usize, kind: AllocKind) -> DmaBuffer {
        let aligned = round_up_to_page(len);
        log::debug!("workspace: allocating {} bytes ({:?})", aligned, kind);
        DmaBuffer {
            data: vec![0u8; aligned],
            kind,
        }
    }

    pub fn kind(&self) -> AllocKind {
        self.kind
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The two 32 KiB dictionary pages plus the tree/scratch buffer and I/O
/// staging areas a single stream needs for its entire lifetime. Allocated
/// once at `init` and reused across calls, per the "workspace is not
/// reallocated per-call" performance goal implicit in §4.3.
#[derive(Debug)]
pub struct Workspace {
    pub dict_a: DmaBuffer,
    pub dict_b: DmaBuffer,
    pub tree_scratch: DmaBuffer,
    pub input_staging: DmaBuffer,
    pub output_staging: DmaBuffer,
}

impl Workspace {
    pub fn new(kind: AllocKind) -> Workspace {
        Workspace {
            dict_a: DmaBuffer::new(DICT_PAGE_SIZE, kind),
            dict_b: DmaBuffer::new(DICT_PAGE_SIZE, kind),
            tree_scratch: DmaBuffer::new(TREE_SCRATCH_SIZE, kind),
            input_staging: DmaBuffer::new(DEFAULT_INPUT_STAGING, kind),
            output_staging: DmaBuffer::new(DEFAULT_OUTPUT_STAGING, kind),
        }
    }

    /// Size the output staging buffer for worst-case deflate expansion:
    /// `input * 15/8 + one_page`, as specified.
    pub fn size_output_staging_for_deflate(&mut self, input_len: usize, kind: AllocKind) {
        let worst_case = input_len.saturating_mul(15) / 8 + PAGE_SIZE;
        if self.output_staging.len() < worst_case {
            self.output_staging = DmaBuffer::new(worst_case, kind);
        }
    }
}
