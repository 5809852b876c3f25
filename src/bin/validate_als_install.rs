// SPDX-License-Identifier: AGPL-3.0-or-later
//! Post-install smoke test for the compiled ALS extension.
//!
//! Confirms, in order, that the native extension exists on disk, loads
//! without ABI conflicts, and trains + recommends on a synthetic 10×10
//! interaction matrix. Exit code 0 = library usable, 1 = broken at any
//! stage. Progress and verdict go to stdout; `tracing` diagnostics go
//! to stderr.
//!
//! # Acceptance criteria
//!
//! 1. At least one compiled artifact under `<root>/als/cpu`
//! 2. Extension loads, exports the full C ABI, reports CSR ABI v1
//! 3. Construct (factors 8, iterations 3, GPU off) → fit → recommend(user 0)
//! 4. Recommendation list is non-empty
//!
//! Run: `cargo run --bin validate_als_install -- --root /path/to/install`

#![deny(clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;

use clap::Parser;

use als_verify::config::{HarnessConfig, NATIVE_THREADS};
use als_verify::env;
use als_verify::harness;
use als_verify::native::NativeLoader;
use als_verify::validation::Validator;

#[derive(Parser)]
#[command(name = "validate_als_install")]
#[command(about = "Smoke-test the installed ALS native extension")]
#[command(version)]
struct Cli {
    /// Install root containing `als/cpu/`
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Seed for the synthetic matrix (default: fresh entropy each run)
    #[arg(long)]
    seed: Option<u64>,

    /// Load without first checking that compiled artifacts exist
    #[arg(long)]
    skip_artifact_check: bool,
}

fn main() {
    env::pin_native_threads();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    tracing::info!(
        vars = ?env::THREAD_VARS,
        threads = NATIVE_THREADS,
        "native thread pools pinned"
    );

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(i32::from(e.use_stderr()));
        }
    };

    let config = HarnessConfig {
        root: cli.root,
        artifact_check: !cli.skip_artifact_check,
        seed: cli.seed,
        ..HarnessConfig::default()
    };
    tracing::debug!(?config, "harness configuration");

    let mut v = Validator::new("ALS Native Extension Functional Verification");
    let verdict = harness::run(&config, &NativeLoader, &mut v);
    v.finish(&verdict);
}
