//! # lockrace - check-then-act race demonstration
//!
//! Runs the stress harness against the naive and the reentrant cache and
//! prints what each run ended with.
//!
//! ```bash
//! cargo run --release -- --trials 5
//! RUST_LOG=lockrace_core=debug cargo run -- --variant naive
//! ```

use anyhow::Context;
use clap::Parser;
use lockrace::cli::{init_tracing, Cli};
use lockrace::{Driver, TracingObserver};

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let driver = Driver::with_observer(
        cli.stress_config(),
        TracingObserver::new(cli.progress_every),
    );

    for &variant in cli.variant.variants() {
        let summary = driver
            .trials(variant, cli.trials)
            .with_context(|| format!("stress run against the {variant} cache failed"))?;

        println!("=== {variant} cache ===");
        for run in &summary.runs {
            println!("  {}", run.summary());
        }
        println!("  {summary}");
        if summary.faulted() > summary.reproduced() {
            tracing::warn!(%variant, "runs ended with faults other than the missing-key fault");
        }
    }

    Ok(())
}
