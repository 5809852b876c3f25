// SPDX-License-Identifier: AGPL-3.0-or-later
//! Human-readable progress and verdict output.
//!
//! Standard output is the only reporting channel the harness promises:
//! a fixed sequence of stage lines followed by one pass/fail banner.
//! Structured diagnostics go to `tracing` (stderr) and never mix in here.
//!
//! # Contract
//!
//! - `-->` lines announce a stage before it runs
//! - `[OK]` / `[FAIL]` lines report what the stage observed
//! - The closing banner contains `SMOKE TEST PASSED` or `SMOKE TEST FAILED`
//! - Exit code 0 = passed, 1 = failed at any stage

use crate::harness::Verdict;

const RULE: &str = "═══════════════════════════════════════════════════════════";

/// Report a count that must be non-zero.
///
/// Prints a formatted `[OK]` or `[FAIL]` line and returns whether the
/// check passed.
///
/// ```
/// use als_verify::validation::check_nonempty;
///
/// assert!(check_nonempty("recommendations", 10));
/// assert!(!check_nonempty("recommendations", 0));
/// ```
#[must_use]
pub fn check_nonempty(label: &str, len: usize) -> bool {
    let pass = len > 0;
    let tag = if pass { "OK" } else { "FAIL" };
    println!("    [{tag}]  {label}: {len} (expected > 0)");
    pass
}

/// Print the verdict diagnostics and closing banner. Returns whether the
/// run passed.
///
/// Separates output from exit behavior for testability.
#[must_use]
pub fn print_verdict(name: &str, stages_passed: u32, verdict: &Verdict) -> bool {
    for line in verdict.diagnostics() {
        println!("{line}");
    }
    println!("\n{RULE}");
    println!("  {name}: {stages_passed} stage(s) passed");
    if verdict.is_pass() {
        println!("  --- SMOKE TEST PASSED ---");
        println!("  RESULT: PASS");
    } else {
        println!("  --- SMOKE TEST FAILED ---");
        println!("  RESULT: FAIL ({})", verdict.label());
    }
    println!("{RULE}");
    verdict.is_pass()
}

/// Stage-by-stage progress printer for one harness run.
///
/// # Examples
///
/// ```
/// use als_verify::validation::Validator;
///
/// let mut v = Validator::new("doc-test");
/// v.stage("Loading extension...");
/// v.ok("loaded");
/// assert_eq!(v.stages_passed(), 1);
/// ```
pub struct Validator {
    name: String,
    stages_passed: u32,
}

impl Validator {
    /// Create a validator and print its opening banner.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        println!("{RULE}");
        println!("  {name}");
        println!("{RULE}\n");
        Self {
            name,
            stages_passed: 0,
        }
    }

    /// Announce a stage.
    pub fn stage(&self, label: &str) {
        println!("--> {label}");
    }

    /// Record a completed stage.
    pub fn ok(&mut self, detail: &str) {
        println!("    [OK]  {detail}");
        self.stages_passed += 1;
    }

    /// Stages completed so far.
    #[must_use]
    pub const fn stages_passed(&self) -> u32 {
        self.stages_passed
    }

    /// Print the verdict and banner; returns whether the run passed.
    #[must_use]
    pub fn report(&self, verdict: &Verdict) -> bool {
        print_verdict(&self.name, self.stages_passed, verdict)
    }

    /// Print the verdict and exit with its code (0 pass, 1 fail).
    pub fn finish(self, verdict: &Verdict) -> ! {
        let _ = self.report(verdict);
        std::process::exit(verdict.exit_code())
    }
}
