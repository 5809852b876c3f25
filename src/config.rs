// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fixed harness constants.
//!
//! Every number the smoke test depends on lives here. The values are
//! deliberately small: the run must finish in well under a second on a
//! single-threaded CI runner.

use std::path::{Path, PathBuf};

/// Extension directory, relative to the install root.
pub const EXTENSION_DIR: &str = "als/cpu";

/// Thread-pool size requested from the native numerical backends.
pub const NATIVE_THREADS: u32 = 1;

/// Synthetic matrix shape (users × items).
pub const MATRIX_ROWS: usize = 10;
/// Synthetic matrix shape (users × items).
pub const MATRIX_COLS: usize = 10;

/// Exclusive upper bound of synthetic interaction counts, `[0, 5)`.
pub const MAX_COUNT: u32 = 5;

/// Model hyperparameters passed to `als_model_new`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParams {
    /// Latent factor count.
    pub factors: u32,
    /// ALS sweeps.
    pub iterations: u32,
    /// L2 regularization strength.
    pub regularization: f32,
    /// Accelerator path. Off: the CPU kernels are what is under test.
    pub use_gpu: bool,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            factors: 8,
            iterations: 3,
            regularization: 0.01,
            use_gpu: false,
        }
    }
}

/// Recommendation query issued after fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryParams {
    /// User row to query; its own row is passed as context.
    pub user: usize,
    /// Number of items requested.
    pub n: u32,
    /// Drop items the user already interacted with.
    pub filter_liked: bool,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            user: 0,
            n: 10,
            filter_liked: true,
        }
    }
}

/// Complete configuration for one harness run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Install root; the extension is looked up under `root/als/cpu`.
    pub root: PathBuf,
    /// Run the on-disk artifact check before loading.
    pub artifact_check: bool,
    /// Fixed seed for the synthetic matrix. `None` = thread-local entropy.
    pub seed: Option<u64>,
    /// Model hyperparameters.
    pub model: ModelParams,
    /// Recommendation query.
    pub query: QueryParams,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            artifact_check: true,
            seed: None,
            model: ModelParams::default(),
            query: QueryParams::default(),
        }
    }
}

impl HarnessConfig {
    /// Configuration rooted at `root`, all other values default.
    #[must_use]
    pub fn rooted(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Directory holding the compiled extension.
    #[must_use]
    pub fn extension_dir(&self) -> PathBuf {
        self.root.join(EXTENSION_DIR)
    }
}
