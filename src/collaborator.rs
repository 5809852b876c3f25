// SPDX-License-Identifier: AGPL-3.0-or-later
//! Contract the harness needs from the library under test.
//!
//! The harness speaks only these traits. [`crate::native`] implements them
//! over the extension's C ABI; tests implement them in-process to drive
//! each failure category without a real shared object.

use std::path::Path;

use crate::config::{ModelParams, QueryParams};
use crate::error::{CollaboratorError, LoadError};
use crate::workload::{CsrMatrix, CsrRow};

/// Ranked recommendation output: parallel id / score sequences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recommendations {
    /// Item ids, best first.
    pub ids: Vec<u32>,
    /// Score of each id.
    pub scores: Vec<f32>,
}

impl Recommendations {
    /// Number of recommended items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing was recommended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Best-ranked item, if any.
    #[must_use]
    pub fn top(&self) -> Option<u32> {
        self.ids.first().copied()
    }
}

/// Brings the compiled extension into the process.
pub trait Loader {
    /// Loaded library handle.
    type Library: AlsLibrary;

    /// Load the artifact at `path`, resolve its entry points and check its
    /// ABI version.
    ///
    /// # Errors
    ///
    /// Any [`LoadError`] classifies as a binary/ABI failure.
    fn load(&self, path: &Path) -> Result<Self::Library, LoadError>;
}

/// A loaded extension.
pub trait AlsLibrary {
    /// Model type created by this library.
    type Model<'lib>: AlsModel
    where
        Self: 'lib;

    /// Version string the extension reports.
    fn version(&self) -> &str;

    /// Ask the library to size its own thread pool. Returns `false` if the
    /// library offers no such entry point.
    fn set_num_threads(&self, threads: u32) -> bool;

    /// Construct an unfitted model.
    ///
    /// # Errors
    ///
    /// Returns the library's error if it rejects the parameters.
    fn new_model(&self, params: &ModelParams) -> Result<Self::Model<'_>, CollaboratorError>;
}

/// A trainable ALS model.
pub trait AlsModel {
    /// Fit latent factors on the full interaction matrix.
    ///
    /// # Errors
    ///
    /// Returns the library's error on rejected input or solver failure.
    fn fit(&mut self, interactions: &CsrMatrix) -> Result<(), CollaboratorError>;

    /// Recommend items for `query.user`, given that user's own row.
    ///
    /// # Errors
    ///
    /// Returns the library's error if the query fails.
    fn recommend(
        &self,
        query: &QueryParams,
        user_row: CsrRow<'_>,
    ) -> Result<Recommendations, CollaboratorError>;
}
