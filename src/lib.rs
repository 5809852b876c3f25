// SPDX-License-Identifier: AGPL-3.0-or-later

#![deny(clippy::expect_used, clippy::unwrap_used)]

//! ALS install verification — post-build smoke test for the compiled
//! alternating-least-squares extension.
//!
//! The harness does not reimplement the recommender. It confirms that the
//! native extension was produced by the build, that it loads without ABI
//! conflicts, and that a fit → recommend round on synthetic data yields a
//! non-empty answer. CI reads the exit code: 0 = usable, 1 = broken.
//!
//! # Stages
//!
//! ```text
//!    ┌──────────────────────────────┐
//!    │  env       pin thread pools  │  OPENBLAS/MKL = 1
//!    └──────────┬───────────────────┘
//!    ┌──────────▼───────────────────┐
//!    │  artifact  files on disk?    │  *.so / *.dylib / *.dll
//!    └──────────┬───────────────────┘
//!    ┌──────────▼───────────────────┐
//!    │  native    dlopen + symbols  │  version, ABI version
//!    └──────────┬───────────────────┘
//!    ┌──────────▼───────────────────┐
//!    │  workload  10×10 CSR counts  │
//!    └──────────┬───────────────────┘
//!    ┌──────────▼───────────────────┐
//!    │  harness   fit → recommend   │  → Verdict → exit code
//!    └──────────────────────────────┘
//! ```
//!
//! Every stage gates the next. The first failure decides the verdict.

pub mod artifact;
pub mod collaborator;
pub mod config;
pub mod env;
pub mod error;
pub mod harness;
pub mod native;
pub mod validation;
pub mod workload;
