//! Command line surface of the `lockrace` binary.

use clap::{Parser, ValueEnum};
use lockrace_core::config::{DEFAULT_POPULATION, DEFAULT_READERS, DEFAULT_TARGET_KEY};
use lockrace_core::{CacheVariant, Key, StressConfig};
use tracing_subscriber::EnvFilter;

/// Which cache variants to stress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum VariantArg {
    Naive,
    Reentrant,
    Both,
}

impl VariantArg {
    pub fn variants(&self) -> &'static [CacheVariant] {
        match self {
            VariantArg::Naive => &[CacheVariant::Naive],
            VariantArg::Reentrant => &[CacheVariant::Reentrant],
            VariantArg::Both => &CacheVariant::ALL,
        }
    }
}

/// Stress a keyed cache with many readers and one mutator, and report
/// whether the check-then-act race in its `get` shows up.
#[derive(Debug, Parser)]
#[command(name = "lockrace", version, about)]
pub struct Cli {
    /// Keys inserted before the stress phase.
    #[arg(long, env = "LOCKRACE_POPULATION", default_value_t = DEFAULT_POPULATION)]
    pub population: u32,

    /// Reader threads polling the target key.
    #[arg(long, env = "LOCKRACE_READERS", default_value_t = DEFAULT_READERS)]
    pub readers: usize,

    /// Key every reader polls.
    #[arg(long, env = "LOCKRACE_TARGET_KEY", default_value_t = DEFAULT_TARGET_KEY)]
    pub target_key: Key,

    /// Runs per variant.
    #[arg(long, env = "LOCKRACE_TRIALS", default_value_t = 1)]
    pub trials: usize,

    #[arg(long, value_enum, env = "LOCKRACE_VARIANT", default_value_t = VariantArg::Both)]
    pub variant: VariantArg,

    /// Stop the whole run as soon as a reader sees the target key gone.
    #[arg(long, env = "LOCKRACE_STOP_ON_ABSENCE")]
    pub stop_on_absence: bool,

    /// Log every N removals of the mutator.
    #[arg(long, default_value_t = 1_000)]
    pub progress_every: usize,
}

impl Cli {
    pub fn stress_config(&self) -> StressConfig {
        StressConfig::default()
            .with_population(self.population)
            .with_readers(self.readers)
            .with_target_key(self.target_key)
            .with_stop_on_absence(self.stop_on_absence)
    }
}

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
