use std::fmt;

use crate::entry::Key;
use crate::keyed_cache::CacheVariant;
use crate::report::ReaderExit;

/// Lifecycle of a single stress run.
///
/// `Populating -> Running -> Draining -> Stopped`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HarnessPhase {
    /// Keys are being inserted by the harness thread alone.
    Populating,
    /// Readers and the mutator are live.
    Running,
    /// The shutdown signal is set; tasks are being joined.
    Draining,
    Stopped,
}

impl fmt::Display for HarnessPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HarnessPhase::Populating => "populating",
            HarnessPhase::Running => "running",
            HarnessPhase::Draining => "draining",
            HarnessPhase::Stopped => "stopped",
        })
    }
}

/// Receives progress from a stress run.
///
/// This is where a presentation layer plugs in. Callbacks arrive on the
/// thread that produced them (`on_removed` on the mutator, `on_reader_exit`
/// on each reader), so implementations must be cheap and thread-safe. Every
/// method defaults to doing nothing.
pub trait RunObserver: Send + Sync {
    fn on_phase(&self, _variant: CacheVariant, _phase: HarnessPhase) {}

    /// Called after each removal with the published `count()`.
    fn on_removed(&self, _key: Key, _remaining: usize) {}

    fn on_reader_exit(&self, _reader: usize, _exit: &ReaderExit) {}
}

/// Observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

impl<O: RunObserver + ?Sized> RunObserver for &O {
    fn on_phase(&self, variant: CacheVariant, phase: HarnessPhase) {
        (**self).on_phase(variant, phase)
    }

    fn on_removed(&self, key: Key, remaining: usize) {
        (**self).on_removed(key, remaining)
    }

    fn on_reader_exit(&self, reader: usize, exit: &ReaderExit) {
        (**self).on_reader_exit(reader, exit)
    }
}

/// Observer that narrates a run through `tracing`.
///
/// Phase changes and reader exits are logged at `info`. The remaining count
/// is logged every `progress_every` removals, and always when it reaches
/// zero.
#[derive(Clone, Copy, Debug)]
pub struct TracingObserver {
    progress_every: usize,
}

impl TracingObserver {
    pub fn new(progress_every: usize) -> Self {
        Self {
            progress_every: progress_every.max(1),
        }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl RunObserver for TracingObserver {
    fn on_phase(&self, variant: CacheVariant, phase: HarnessPhase) {
        tracing::info!(%variant, %phase, "phase");
    }

    fn on_removed(&self, key: Key, remaining: usize) {
        if remaining == 0 || (key as usize + 1) % self.progress_every == 0 {
            tracing::info!(removed = key, remaining, "mutator progress");
        }
    }

    fn on_reader_exit(&self, reader: usize, exit: &ReaderExit) {
        tracing::info!(reader, %exit, "reader exited");
    }
}
