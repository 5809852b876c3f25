// SPDX-License-Identifier: AGPL-3.0-or-later
//! The verification protocol: ordered stages, first failure wins.
//!
//! | Stage | Failure category |
//! |-------|------------------|
//! | artifact check | [`FailureCategory::BuildIncomplete`] |
//! | load + ABI check | [`FailureCategory::BinaryAbi`] |
//! | construct / fit / recommend | [`Verdict::Unknown`] |
//! | result validation | [`FailureCategory::EmptyResult`] |
//!
//! Nothing is retried and nothing propagates: every error becomes a
//! [`Verdict`], and the verdict alone decides the exit code.

use std::fmt;
use std::path::PathBuf;

use crate::artifact;
use crate::collaborator::{AlsLibrary, AlsModel, Loader, Recommendations};
use crate::config::{HarnessConfig, NATIVE_THREADS};
use crate::error::{CollaboratorError, ErrorKind};
use crate::validation::{self, Validator};
use crate::workload::{self, CsrMatrix};

/// Lowercased markers that suggest CSR layout / ABI skew in a message
/// that carries no structured kind.
pub const ARRAY_SKEW_MARKERS: [&str; 3] = ["abi", "layout", "csr"];

/// Failures the protocol recognizes by stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCategory {
    /// No compiled extension under the expected directory.
    BuildIncomplete {
        /// Directory that was searched.
        dir: PathBuf,
    },
    /// The extension or a dependency failed to load, or its ABI differs.
    BinaryAbi {
        /// Loader message, verbatim.
        message: String,
    },
    /// Recommend returned without error but with no items.
    EmptyResult,
}

/// Stage in which an unexpected error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Listing the extension directory.
    Artifacts,
    /// Constructing the model.
    Construct,
    /// Fitting the model.
    Fit,
    /// Querying the model.
    Recommend,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Artifacts => write!(f, "artifact scan"),
            Self::Construct => write!(f, "model construction"),
            Self::Fit => write!(f, "training"),
            Self::Recommend => write!(f, "recommendation"),
        }
    }
}

/// An error outside the known categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnexpectedFailure {
    /// Where it happened.
    pub stage: Stage,
    /// Raw message.
    pub message: String,
    /// Best-effort hint that CSR layout / ABI skew is the cause.
    pub probable_array_skew: bool,
}

/// Outcome of one harness run. Exactly one per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every stage passed.
    Pass {
        /// Extension version that was exercised.
        version: String,
        /// Top recommended item id.
        top: u32,
        /// Number of items recommended.
        count: usize,
    },
    /// Failure in a recognized category.
    Known(FailureCategory),
    /// Any other failure.
    Unknown(UnexpectedFailure),
}

impl Verdict {
    /// Whether the library is usable.
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass { .. })
    }

    /// Process exit code: 0 for pass, 1 for every failure.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.is_pass() { 0 } else { 1 }
    }

    /// Short category label for the closing banner.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pass { .. } => "passed",
            Self::Known(FailureCategory::BuildIncomplete { .. }) => "build incomplete",
            Self::Known(FailureCategory::BinaryAbi { .. }) => "binary/ABI",
            Self::Known(FailureCategory::EmptyResult) => "empty result",
            Self::Unknown(_) => "unexpected failure",
        }
    }

    /// Diagnostic lines: the observed condition first, then guidance.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            Self::Pass { top, .. } => {
                vec![format!("    [OK]  Model trained. Top recommendation ID: {top}")]
            }
            Self::Known(FailureCategory::BuildIncomplete { dir }) => vec![
                format!(
                    "CRITICAL: compiled ALS extension not found under {}",
                    dir.display()
                ),
                String::from(
                    "The build step likely did not compile native code \
                     (expected *.so, *.dylib or *.dll).",
                ),
            ],
            Self::Known(FailureCategory::BinaryAbi { message }) => vec![
                format!("CRITICAL BINARY ERROR: {message}"),
                String::from(
                    "Likely caused by an ABI mismatch between the compiled extension \
                     and its runtime dependencies.",
                ),
            ],
            Self::Known(FailureCategory::EmptyResult) => {
                vec![String::from("CRITICAL: No recommendations generated.")]
            }
            Self::Unknown(failure) => {
                let mut lines = vec![
                    format!("UNEXPECTED FAILURE: {}", failure.message),
                    format!("Failed during {}.", failure.stage),
                ];
                if failure.probable_array_skew {
                    lines.push(String::from("Detected potential CSR/ABI version skew."));
                }
                lines
            }
        }
    }
}

/// Whether an error probably stems from CSR layout / ABI skew.
///
/// A structured kind from the library is trusted when present. Otherwise
/// the message is searched for [`ARRAY_SKEW_MARKERS`]; that fallback is
/// best-effort only.
#[must_use]
pub fn probable_array_skew(err: &CollaboratorError) -> bool {
    match err.kind {
        ErrorKind::ArrayLayout => true,
        ErrorKind::Unknown => {
            let msg = err.message.to_lowercase();
            ARRAY_SKEW_MARKERS.iter().any(|m| msg.contains(m))
        }
        ErrorKind::InvalidParameter | ErrorKind::Numerical | ErrorKind::OutOfMemory => false,
    }
}

fn unexpected(stage: Stage, err: &CollaboratorError) -> Verdict {
    tracing::error!(%stage, kind = ?err.kind, message = %err.message, "collaborator call failed");
    Verdict::Unknown(UnexpectedFailure {
        stage,
        message: err.message.clone(),
        probable_array_skew: probable_array_skew(err),
    })
}

fn binary_abi(err: &impl fmt::Display) -> Verdict {
    tracing::error!(error = %err, "extension failed to load");
    Verdict::Known(FailureCategory::BinaryAbi {
        message: err.to_string(),
    })
}

/// Locate the artifact to load, or the verdict that ends the run.
fn locate(config: &HarnessConfig, v: &mut Validator) -> Result<PathBuf, Verdict> {
    let dir = config.extension_dir();
    if !config.artifact_check {
        return Ok(dir.join(artifact::default_file_name()));
    }

    v.stage("Checking for compiled extension artifacts...");
    let artifacts = artifact::find_extensions(&dir).map_err(|e| {
        tracing::error!(error = %e, "artifact scan failed");
        Verdict::Unknown(UnexpectedFailure {
            stage: Stage::Artifacts,
            message: e.to_string(),
            probable_array_skew: false,
        })
    })?;
    if artifacts.is_empty() {
        tracing::error!(dir = %dir.display(), "no compiled extension artifacts");
        return Err(Verdict::Known(FailureCategory::BuildIncomplete { dir }));
    }
    let chosen = artifact::select_for_platform(&artifacts).map_err(|e| binary_abi(&e))?;
    v.ok(&format!(
        "Found {} compiled artifact(s); using {}",
        artifacts.len(),
        chosen.display()
    ));
    Ok(chosen.to_path_buf())
}

/// Construct → fit → recommend, strictly in that order.
fn exercise<Lib: AlsLibrary>(
    library: &Lib,
    config: &HarnessConfig,
    interactions: &CsrMatrix,
    v: &mut Validator,
) -> Result<Recommendations, Verdict> {
    v.stage("Initializing ALS model (CPU kernels, GPU disabled)...");
    let mut model = library
        .new_model(&config.model)
        .map_err(|e| unexpected(Stage::Construct, &e))?;
    v.ok(&format!(
        "factors={} iterations={} regularization={}",
        config.model.factors, config.model.iterations, config.model.regularization
    ));

    v.stage("Training model...");
    model
        .fit(interactions)
        .map_err(|e| unexpected(Stage::Fit, &e))?;
    v.ok("fit completed");

    v.stage("Testing recommendation generation...");
    let user = config.query.user;
    let row = interactions.row(user).ok_or_else(|| {
        unexpected(
            Stage::Recommend,
            &CollaboratorError::unknown(format!(
                "user {user} outside {}x{} matrix",
                interactions.shape().0,
                interactions.shape().1
            )),
        )
    })?;
    model
        .recommend(&config.query, row)
        .map_err(|e| unexpected(Stage::Recommend, &e))
}

/// Run every stage after environment preparation and return the verdict.
///
/// [`crate::env::pin_native_threads`] is the caller's job: it has to
/// happen before any thread exists, which only `main` can guarantee.
pub fn run<L: Loader>(config: &HarnessConfig, loader: &L, v: &mut Validator) -> Verdict {
    let path = match locate(config, v) {
        Ok(path) => path,
        Err(verdict) => return verdict,
    };

    v.stage("Loading ALS extension...");
    let library = match loader.load(&path) {
        Ok(library) => library,
        Err(e) => return binary_abi(&e),
    };
    tracing::info!(version = library.version(), path = %path.display(), "ALS extension loaded");
    v.ok(&format!(
        "Extension loaded successfully. ALS version: {}",
        library.version()
    ));
    if library.set_num_threads(NATIVE_THREADS) {
        tracing::debug!(threads = NATIVE_THREADS, "thread count passed to extension");
    }

    v.stage("Generating synthetic sparse matrix...");
    let interactions = workload::synthetic_interactions(config.seed, config.query.user);
    let (rows, cols) = interactions.shape();
    v.ok(&format!(
        "{rows}x{cols} CSR, {} stored interactions",
        interactions.nnz()
    ));

    let recs = match exercise(&library, config, &interactions, v) {
        Ok(recs) => recs,
        Err(verdict) => return verdict,
    };

    let label = format!("recommendations for user {}", config.query.user);
    let nonempty = validation::check_nonempty(&label, recs.len());
    let Some(top) = recs.top().filter(|_| nonempty) else {
        tracing::error!(user = config.query.user, "recommend returned no items");
        return Verdict::Known(FailureCategory::EmptyResult);
    };
    Verdict::Pass {
        version: library.version().to_string(),
        top,
        count: recs.len(),
    }
}
