//! The DDCB Dispatcher (spec §4.2): a per-context single-writer/multi-reader
//! queue of capacity 4, a completion thread that demultiplexes results back
//! to blocked callers, and sequence numbering.
//!
//! Grounded in the "arenas and indices over back-pointers" design note
//! (spec §9): slots and requests live in a fixed-size slab owned by the
//! context, addressed by index rather than raw references, which is how
//! `ethindp-kernel`'s NVMe submission-queue code avoids lifetime tangles
//! around its completion demultiplexing.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::ddcb::{CompletionCode, Ddcb};
use crate::error::{Result, ZedcError};
use crate::transport::Transport;

pub const QUEUE_DEPTH: usize = 4;

/// A hand-rolled counting semaphore, matching spec §4.2's "free-slot
/// semaphore" / "caller's own semaphore" vocabulary exactly, built from
/// `std::sync::{Mutex, Condvar}` per spec §5.
pub struct Semaphore {
    count: Mutex<isize>,
    cv: Condvar,
}

impl Semaphore {
    pub fn new(initial: isize) -> Semaphore {
        Semaphore {
            count: Mutex::new(initial),
            cv: Condvar::new(),
        }
    }

    pub fn acquire(&self) {
        let mut count = self.count.lock().unwrap();
        while *count <= 0 {
            count = self.cv.wait(count).unwrap();
        }
        *count -= 1;
    }

    pub fn release(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.cv.notify_one();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Free,
    In,
    Out,
    Error,
}

/// One submission record: the DDCB itself plus the payload buffers it
/// references and the back-pointer (by index, not reference) to the
/// originating caller's completion semaphore.
struct Slot {
    status: SlotStatus,
    ddcb: Option<Ddcb>,
    input: Vec<u8>,
    output: Vec<u8>,
    dict_in: Vec<u8>,
    dict_out: Vec<u8>,
    result_code: Option<CompletionCode>,
    thread_wait: bool,
    caller_sem: Arc<Semaphore>,
}

impl Slot {
    fn empty() -> Slot {
        Slot {
            status: SlotStatus::Free,
            ddcb: None,
            input: Vec::new(),
            output: Vec::new(),
            dict_in: Vec::new(),
            dict_out: Vec::new(),
            result_code: None,
            thread_wait: false,
            caller_sem: Arc::new(Semaphore::new(0)),
        }
    }
}

struct Ring {
    slots: Vec<Slot>,
    head: usize,
    tail: usize,
}

/// A request to execute one DDCB: the dispatcher installs each in its own
/// slot, chaining via `next` per spec §4.2 "Chaining".
pub struct DdcbRequest {
    pub ddcb: Ddcb,
    pub input: Vec<u8>,
    pub output: Vec<u8>,
    pub dict_in: Vec<u8>,
    pub dict_out: Vec<u8>,
    pub next: Option<Box<DdcbRequest>>,
}

/// The result of an executed DDCB, handed back to the caller.
pub struct DdcbCompletion {
    pub code: CompletionCode,
    pub output: Vec<u8>,
    pub dict_out: Vec<u8>,
    pub ddcb: Ddcb,
}

/// Plain counters read under the dispatcher lock: ambient observability,
/// not a full statistics/CLI surface.
#[derive(Debug, Default)]
pub struct Stats {
    pub submitted: AtomicU32,
    pub completed: AtomicU32,
    pub errors: AtomicU32,
    pub high_water_mark: AtomicU32,
}

impl Stats {
    pub fn snapshot(&self) -> (u32, u32, u32, u32) {
        (
            self.submitted.load(Ordering::Relaxed),
            self.completed.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
            self.high_water_mark.load(Ordering::Relaxed),
        )
    }
}

struct Inner {
    ring: Mutex<Ring>,
    free_slots: Semaphore,
    next_seq: Mutex<u16>,
    transport: Box<dyn Transport>,
    cancelled: AtomicBool,
    stats: Stats,
    poll_timeout: Duration,
}

/// The per-context dispatcher. Owns the slab, the free-slot semaphore, and
/// spawns the single completion thread described in spec §5.
pub struct Dispatcher {
    inner: Arc<Inner>,
    completion_thread: Option<std::thread::JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(transport: Box<dyn Transport>, poll_timeout: Duration) -> Dispatcher {
        let ring = Ring {
            slots: (0..QUEUE_DEPTH).map(|_| Slot::empty()).collect(),
            head: 0,
            tail: 0,
        };
        let inner = Arc::new(Inner {
            ring: Mutex::new(ring),
            free_slots: Semaphore::new(QUEUE_DEPTH as isize),
            next_seq: Mutex::new(0),
            transport,
            cancelled: AtomicBool::new(false),
            stats: Stats::default(),
            poll_timeout,
        });

        let completion_inner = Arc::clone(&inner);
        let completion_thread = std::thread::spawn(move || completion_loop(completion_inner));

        Dispatcher {
            inner,
            completion_thread: Some(completion_thread),
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.inner.stats
    }

    /// Execute one DDCB (or a chain of them) to completion, blocking the
    /// caller exactly once on the last request's semaphore, per spec §4.2
    /// "Submission protocol" and "Chaining".
    pub fn execute(&self, mut request: DdcbRequest) -> Result<Vec<DdcbCompletion>> {
        let caller_sem = Arc::new(Semaphore::new(0));
        let mut installed_slots = Vec::new();

        // Flatten the chain so each link gets its own slot before the
        // caller blocks exactly once on the last one, per spec.
        let mut chain = Vec::new();
        loop {
            let next = request.next.take();
            chain.push((
                request.ddcb,
                request.input,
                request.output,
                request.dict_in,
                request.dict_out,
            ));
            match next {
                Some(boxed) => request = *boxed,
                None => break,
            }
        }
        let last_index = chain.len() - 1;

        for (i, (ddcb, input, output, dict_in, dict_out)) in chain.into_iter().enumerate() {
            self.inner.free_slots.acquire();
            let mut ring = self.inner.ring.lock().unwrap();

            let mut seq_guard = self.inner.next_seq.lock().unwrap();
            let seq = *seq_guard;
            *seq_guard = seq_guard.wrapping_add(1);
            drop(seq_guard);

            let mut ddcb = ddcb;
            ddcb.sequence_number = seq;

            let idx = ring.head;
            ring.head = (ring.head + 1) % QUEUE_DEPTH;
            let thread_wait = i == last_index;
            ring.slots[idx] = Slot {
                status: SlotStatus::In,
                ddcb: Some(ddcb),
                input,
                output,
                dict_in,
                dict_out,
                result_code: None,
                thread_wait,
                caller_sem: Arc::clone(&caller_sem),
            };
            drop(ring);

            self.inner
                .stats
                .submitted
                .fetch_add(1, Ordering::Relaxed);
            installed_slots.push(idx);

            log::debug!("dispatcher: submitted seq={} slot={}", seq, idx);
        }

        caller_sem.acquire();

        if self.inner.cancelled.load(Ordering::Acquire) {
            return Err(ZedcError::IrqTimeout);
        }

        let mut ring = self.inner.ring.lock().unwrap();
        let mut completions = Vec::with_capacity(installed_slots.len());
        for idx in installed_slots {
            let slot = &mut ring.slots[idx];
            let code = slot
                .result_code
                .ok_or_else(|| ZedcError::stream_error("dispatcher: slot completed without a result code"))?;
            completions.push(DdcbCompletion {
                code,
                output: std::mem::take(&mut slot.output),
                dict_out: std::mem::take(&mut slot.dict_out),
                ddcb: slot.ddcb.take().ok_or_else(|| {
                    ZedcError::stream_error("dispatcher: slot missing its DDCB at completion")
                })?,
            });
            *slot = Slot::empty();
            self.inner.free_slots.release();
        }
        Ok(completions)
    }

    pub fn shutdown(&mut self) {
        self.inner.cancelled.store(true, Ordering::Release);
        // Release every blocked caller and let the completion thread notice
        // `cancelled` on its next wakeup.
        let ring = self.inner.ring.lock().unwrap();
        for slot in ring.slots.iter() {
            if slot.status == SlotStatus::In {
                slot.caller_sem.release();
            }
        }
        drop(ring);
        if let Some(handle) = self.completion_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if self.completion_thread.is_some() {
            self.shutdown();
        }
    }
}

/// The completion thread body: drains completions by walking the output
/// index forward while the head slot has a result, per spec §4.2
/// "Completion protocol". In this software-hosted crate, `execute_ddcb` on
/// the transport is synchronous, so this loop just calls it directly for
/// each in-flight slot rather than polling a real event fd — the dispatcher
/// protocol (slot states, sequence ordering, semaphore handoff) is
/// unchanged either way.
fn completion_loop(inner: Arc<Inner>) {
    loop {
        if inner.cancelled.load(Ordering::Acquire) {
            return;
        }
        std::thread::sleep(inner.poll_timeout.min(Duration::from_millis(5)));

        let mut ring = inner.ring.lock().unwrap();
        loop {
            let idx = ring.tail;
            let should_process = matches!(ring.slots[idx].status, SlotStatus::In);
            if !should_process {
                break;
            }
            let ddcb = ring.slots[idx].ddcb.clone();
            let input = ring.slots[idx].input.clone();
            let dict_in = ring.slots[idx].dict_in.clone();
            let mut output = std::mem::take(&mut ring.slots[idx].output);
            let mut dict_out = std::mem::take(&mut ring.slots[idx].dict_out);
            drop(ring);

            let mut ddcb = match ddcb {
                Some(d) => d,
                None => return,
            };
            let result = inner
                .transport
                .execute_ddcb(&mut ddcb, &input, &mut output, &dict_in, &mut dict_out);

            ring = inner.ring.lock().unwrap();
            let slot = &mut ring.slots[idx];
            slot.output = output;
            slot.dict_out = dict_out;
            slot.ddcb = Some(ddcb);
            match result {
                Ok(code) => {
                    slot.result_code = Some(code);
                    slot.status = if code.is_success() {
                        inner.stats.completed.fetch_add(1, Ordering::Relaxed);
                        SlotStatus::Out
                    } else {
                        inner.stats.errors.fetch_add(1, Ordering::Relaxed);
                        SlotStatus::Error
                    };
                }
                Err(_) => {
                    slot.result_code = Some(CompletionCode {
                        retc: 0x1ff,
                        attn: 0,
                    });
                    slot.status = SlotStatus::Error;
                    inner.stats.errors.fetch_add(1, Ordering::Relaxed);
                }
            }
            let thread_wait = slot.thread_wait;
            let sem = Arc::clone(&slot.caller_sem);
            ring.tail = (ring.tail + 1) % QUEUE_DEPTH;
            if thread_wait {
                drop(ring);
                sem.release();
                ring = inner.ring.lock().unwrap();
            }
        }
        drop(ring);
    }
}
