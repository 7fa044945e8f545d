//! Environment-derived configuration.
//!
//! A handful of environment variables read once into a typed struct; no
//! config-parsing crate is pulled in since there's nothing here beyond
//! `std::env::var` calls, just collected in one place.

use std::env;
use std::str::FromStr;

/// Which accelerator kind the transport should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceleratorKind {
    Generic,
    Capi,
}

/// Card index selection; a distinguished `Redundant` value asks the
/// transport to round-robin across every open handle on retryable errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardIndex {
    Index(u32),
    Redundant,
}

/// Process-wide knobs read from the environment at registry construction
/// time, named to parallel the real project's `ZLIB_ACCELERATOR`/
/// `ZLIB_CARD`/`ZLIB_TRACE` variables, renamed into this crate's namespace.
#[derive(Debug, Clone)]
pub struct Environment {
    /// `ZEDC_FORCE_SW` — force the software path regardless of input size.
    pub force_software: bool,
    /// `ZEDC_ACCELERATOR` — `generic` or `capi`.
    pub accelerator_kind: AcceleratorKind,
    /// `ZEDC_CARD` — card index, or the literal `redundant`.
    pub card: CardIndex,
    /// `ZEDC_VERBOSE` — verbosity level, translated to `log::LevelFilter`.
    pub verbose: log::LevelFilter,
    /// `ZEDC_DEBUG_DATA` — collect extra debug data around DDCB submission.
    pub debug_data: bool,
    /// `ZEDC_INFLATE_THRESHOLD` — bytes below which inflate prefers
    /// software; default 16 KiB (`CONFIG_INFLATE_THRESHOLD` upstream).
    pub inflate_threshold: usize,
}

const DEFAULT_INFLATE_THRESHOLD: usize = 16 * 1024;

impl Default for Environment {
    fn default() -> Environment {
        Environment {
            force_software: false,
            accelerator_kind: AcceleratorKind::Generic,
            card: CardIndex::Index(0),
            verbose: log::LevelFilter::Warn,
            debug_data: false,
            inflate_threshold: DEFAULT_INFLATE_THRESHOLD,
        }
    }
}

impl Environment {
    /// Build an `Environment` from the process's environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Environment {
        let mut env = Environment::default();

        if let Some(v) = read_bool("ZEDC_FORCE_SW") {
            env.force_software = v;
        }
        if let Ok(v) = env::var("ZEDC_ACCELERATOR") {
            env.accelerator_kind = match v.as_str() {
                "capi" => AcceleratorKind::Capi,
                _ => AcceleratorKind::Generic,
            };
        }
        if let Ok(v) = env::var("ZEDC_CARD") {
            env.card = if v.eq_ignore_ascii_case("redundant") {
                CardIndex::Redundant
            } else {
                v.parse().map(CardIndex::Index).unwrap_or(env.card)
            };
        }
        if let Some(v) = read_parsed::<usize>("ZEDC_VERBOSE") {
            env.verbose = verbosity_to_level(v);
        }
        if let Some(v) = read_bool("ZEDC_DEBUG_DATA") {
            env.debug_data = v;
        }
        if let Some(v) = read_parsed::<usize>("ZEDC_INFLATE_THRESHOLD") {
            env.inflate_threshold = v;
        }

        log::set_max_level(env.verbose);
        env
    }
}

fn verbosity_to_level(v: usize) -> log::LevelFilter {
    match v {
        0 => log::LevelFilter::Off,
        1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn read_bool(key: &str) -> Option<bool> {
    env::var(key).ok().map(|v| !(v == "0" || v.eq_ignore_ascii_case("false")))
}

fn read_parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
