//! Raw in-memory compression/decompression streams: the building blocks the
//! `deflate`/`zlib`/`gz` I/O adaptors are built on top of, fronting the
//! [`crate::shim::DeflateShim`]/[`crate::shim::InflateShim`] switching
//! machinery with a `Compress`/`Decompress` API.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Environment;
use crate::dispatcher::Dispatcher;
use crate::error::ZedcError;
use crate::shim::{DeflateShim, Implementation, InflateShim};
use crate::transport::sim::{SharedSimTransport, SimTransport};
use crate::transport::Mode;
use crate::wrapper::GzHeaderMeta;

/// Compression level: a `Compression(u32)` newtype over zlib's `0..=9`
/// scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compression(u32);

impl Compression {
    pub fn new(level: u32) -> Compression {
        Compression(level.min(9))
    }

    pub fn none() -> Compression {
        Compression(0)
    }

    pub fn fast() -> Compression {
        Compression(1)
    }

    pub fn best() -> Compression {
        Compression(9)
    }

    pub fn level(&self) -> u32 {
        self.0
    }
}

impl Default for Compression {
    fn default() -> Compression {
        Compression(6)
    }
}

/// Values which indicate the form of flushing to use when compressing or
/// decompressing in-memory data (spec §2 GLOSSARY "flush modes").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// Accumulate as much input as helps compression before producing
    /// output.
    None,
    /// Flush pending output to a byte boundary without ending the block of
    /// input already seen; the decompressor can access all data up to this
    /// point.
    Sync,
    /// Like `Sync`, but does not force a new deflate block to start.
    Partial,
    /// Like `Sync`, and additionally resets the compression dictionary.
    Full,
    /// All input has been provided and the output buffer is sized for the
    /// whole remaining stream.
    Finish,
}

/// Possible status results of compressing some data or decompressing a
/// block of data (spec §2 GLOSSARY "zlib-shaped status").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// More input may be needed and/or more output space is needed; call
    /// again.
    Ok,
    /// Forward progress isn't possible without more input or output space.
    BufError,
    /// All input has been consumed and all output produced; the wrapper
    /// trailer (if any) has been verified.
    StreamEnd,
    /// A zlib FDICT header was seen: call `set_dictionary` with the
    /// matching preset dictionary before decoding can continue (spec
    /// §4.5/§7). Never returned by `Compress`.
    NeedDict,
}

/// Error returned when a decompression object finds the input stream of
/// bytes is not valid, or an accelerator fault propagates up from the
/// dispatcher.
#[derive(Debug)]
pub struct DataError(String);

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for DataError {}

impl From<ZedcError> for DataError {
    fn from(e: ZedcError) -> DataError {
        DataError(e.to_string())
    }
}

fn new_dispatcher_and_sim(env: &Environment) -> (Dispatcher, Arc<SimTransport>) {
    let sim = Arc::new(SimTransport::new());

    #[cfg(feature = "capi")]
    {
        if env.accelerator_kind == crate::config::AcceleratorKind::Capi {
            let mut capi = crate::transport::capi::CapiTransport::new();
            match crate::transport::Transport::open(&mut capi, env.card, Mode::default(), 0, 0) {
                Ok(()) => {
                    let dispatcher = Dispatcher::new(Box::new(capi), Duration::from_millis(1));
                    return (dispatcher, sim);
                }
                Err(err) => {
                    log::warn!(
                        "capi transport unavailable ({}), falling back to the software-hosted simulation",
                        err
                    );
                }
            }
        }
    }

    let mut transport = SharedSimTransport(Arc::clone(&sim));
    // A software-hosted transport never fails to open; a real `CapiTransport`
    // would surface `ErrOpen` here instead of unwrapping.
    crate::transport::Transport::open(&mut transport, env.card, Mode::default(), 0, 0)
        .expect("sim transport open is infallible");
    let dispatcher = Dispatcher::new(Box::new(transport), Duration::from_millis(1));
    (dispatcher, sim)
}

fn implementation_for(env: &Environment) -> Implementation {
    if env.force_software {
        Implementation::Software
    } else {
        Implementation::Hardware
    }
}

/// Raw in-memory compression stream for blocks of data.
///
/// This type is the building block for the I/O streams in the rest of this
/// crate. It requires more management than the `Read`/`Write` API but is
/// maximally flexible in terms of accepting input from any source and being
/// able to produce output to any memory location.
pub struct Compress {
    shim: DeflateShim,
    sim: Arc<SimTransport>,
    dispatcher: Dispatcher,
}

impl fmt::Debug for Compress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compress")
            .field("total_in", &self.total_in())
            .field("total_out", &self.total_out())
            .finish()
    }
}

impl Compress {
    /// `window_bits` follows spec §3's convention: `-15..=-8` raw,
    /// `8..=15` zlib, `16..=31` gzip.
    pub fn new_with_window_bits(level: Compression, window_bits: i32) -> Compress {
        let env = Environment::from_env();
        let (dispatcher, sim) = new_dispatcher_and_sim(&env);
        let shim = DeflateShim::new(
            window_bits,
            level.level() as i32,
            implementation_for(&env),
            env.inflate_threshold,
            &sim,
        )
        .expect("invalid window_bits");
        Compress { shim, sim, dispatcher }
    }

    /// Creates a new object ready for compressing data that it's given.
    ///
    /// `zlib_header` selects the zlib wrapper (`true`) over raw deflate
    /// (`false`); use [`GzEncoder`](crate::gz::write::GzEncoder) for gzip.
    pub fn new(level: Compression, zlib_header: bool) -> Compress {
        Compress::new_with_window_bits(level, if zlib_header { 15 } else { -15 })
    }

    pub fn implementation(&self) -> Implementation {
        self.shim.implementation()
    }

    pub fn set_header(&mut self, header: GzHeaderMeta) {
        self.shim.set_header(header);
    }

    /// Primes this compressor with a preset dictionary, per spec §4.4's
    /// `deflate_set_dictionary`. Must be called before the first call to
    /// [`Compress::compress`]/[`Compress::compress_vec`].
    pub fn set_dictionary(&mut self, dictionary: &[u8]) -> Result<(), DataError> {
        self.shim.set_dictionary(dictionary).map_err(DataError::from)
    }

    pub fn total_in(&self) -> u64 {
        self.shim.total_in()
    }

    pub fn total_out(&self) -> u64 {
        self.shim.total_out()
    }

    /// Quickly resets this compressor without reallocating the dispatcher
    /// or transport, equivalent to dropping and recreating it.
    pub fn reset(&mut self) {
        self.shim.reset();
    }

    pub fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: Flush,
    ) -> Result<Status, DataError> {
        let mut inp = input;
        let mut out = output;
        self.shim
            .deflate(&self.dispatcher, &self.sim, &mut inp, &mut out, flush)
            .map_err(DataError::from)
    }

    /// Compresses into the spare capacity of `output`, growing `output`'s
    /// length (not capacity) by however many bytes were produced.
    pub fn compress_vec(
        &mut self,
        input: &[u8],
        output: &mut Vec<u8>,
        flush: Flush,
    ) -> Result<Status, DataError> {
        let cap = output.capacity();
        let len = output.len();
        output.resize(cap, 0);
        let (head, spare) = output.split_at_mut(len);
        let before = spare.len();
        let mut inp = input;
        let mut out = spare;
        let status = self
            .shim
            .deflate(&self.dispatcher, &self.sim, &mut inp, &mut out, flush)
            .map_err(DataError::from);
        let produced = before - out.len();
        let _ = head;
        output.truncate(len + produced);
        status
    }
}

/// Raw in-memory decompression stream for blocks of data.
pub struct Decompress {
    shim: InflateShim,
    sim: Arc<SimTransport>,
    dispatcher: Dispatcher,
}

impl fmt::Debug for Decompress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decompress")
            .field("total_in", &self.total_in())
            .field("total_out", &self.total_out())
            .finish()
    }
}

impl Decompress {
    pub fn new_with_window_bits(window_bits: i32) -> Decompress {
        let env = Environment::from_env();
        let (dispatcher, sim) = new_dispatcher_and_sim(&env);
        let shim = InflateShim::new(
            window_bits,
            implementation_for(&env),
            env.inflate_threshold,
            &sim,
        )
        .expect("invalid window_bits");
        Decompress { shim, sim, dispatcher }
    }

    /// Creates a new object ready for decompressing data.
    ///
    /// `zlib_header` indicates whether the input is expected to carry a
    /// zlib wrapper (`true`) or be raw deflate (`false`).
    pub fn new(zlib_header: bool) -> Decompress {
        Decompress::new_with_window_bits(if zlib_header { 15 } else { -15 })
    }

    pub fn implementation(&self) -> Implementation {
        self.shim.implementation()
    }

    pub fn header(&self) -> Option<&GzHeaderMeta> {
        self.shim.header()
    }

    /// Equivalent to `inflateReset`: resets the stream state but keeps the
    /// wrapper format and dispatcher/transport alive.
    pub fn reset(&mut self) {
        self.shim.reset();
    }

    pub fn set_dictionary(&mut self, dictionary: &[u8]) -> Result<(), DataError> {
        self.shim.set_dictionary(dictionary).map_err(DataError::from)
    }

    pub fn total_in(&self) -> u64 {
        self.shim.total_in()
    }

    pub fn total_out(&self) -> u64 {
        self.shim.total_out()
    }

    pub fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: Flush,
    ) -> Result<Status, DataError> {
        let mut inp = input;
        let mut out = output;
        self.shim
            .inflate(&self.dispatcher, &self.sim, &mut inp, &mut out, flush)
            .map_err(DataError::from)
    }

    pub fn decompress_vec(
        &mut self,
        input: &[u8],
        output: &mut Vec<u8>,
        flush: Flush,
    ) -> Result<Status, DataError> {
        let cap = output.capacity();
        let len = output.len();
        output.resize(cap, 0);
        let (head, spare) = output.split_at_mut(len);
        let before = spare.len();
        let mut inp = input;
        let mut out = spare;
        let status = self
            .shim
            .inflate(&self.dispatcher, &self.sim, &mut inp, &mut out, flush)
            .map_err(DataError::from);
        let produced = before - out.len();
        let _ = head;
        output.truncate(len + produced);
        status
    }
}
