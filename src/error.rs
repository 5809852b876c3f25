// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the install harness.
//!
//! Load-time failures ([`LoadError`]) and call-time failures
//! ([`CollaboratorError`]) are kept apart because they map to different
//! verdict categories. Nothing here escapes `main`: the harness converts
//! every error into a [`Verdict`](crate::harness::Verdict).

use std::path::PathBuf;

/// Errors produced while inspecting the install tree.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Directory listing failed for a reason other than absence.
    #[error("{}: {source}", .path.display())]
    Io {
        /// Path that caused the error.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for install-tree operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The extension (or one of its dependencies) could not be brought into
/// the process. All variants classify as a binary/ABI failure.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// `dlopen` / `LoadLibrary` refused the file: missing dependent
    /// shared object, wrong architecture, corrupt image.
    #[error("failed to open {}: {message}", .path.display())]
    Open {
        /// Artifact that was opened.
        path: PathBuf,
        /// Loader message, verbatim.
        message: String,
    },
    /// A required entry point is not exported.
    #[error("missing symbol `{symbol}`: {message}")]
    MissingSymbol {
        /// Symbol name.
        symbol: &'static str,
        /// Loader message, verbatim.
        message: String,
    },
    /// The extension was compiled against a different CSR interchange layout.
    #[error("extension built against CSR ABI v{found}, harness provides v{expected}")]
    AbiVersion {
        /// Layout version the harness passes across the boundary.
        expected: u32,
        /// Layout version the extension reports.
        found: u32,
    },
    /// Artifacts exist, but none for this platform.
    #[error("no `{suffix}` artifact among {found} compiled file(s)")]
    WrongPlatform {
        /// Platform shared-library suffix that was looked for.
        suffix: &'static str,
        /// How many foreign artifacts were present.
        found: usize,
    },
}

/// Category reported by the extension itself through `als_last_error_kind`.
///
/// Libraries that do not export the symbol always report [`Unknown`](Self::Unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No structured category available.
    Unknown,
    /// Input arrays were rejected (shape, dtype, layout).
    ArrayLayout,
    /// Hyperparameters were rejected.
    InvalidParameter,
    /// Solver failed numerically.
    Numerical,
    /// Allocation failure inside the extension.
    OutOfMemory,
}

impl ErrorKind {
    /// Decode the integer convention of `als_last_error_kind`.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            1 => Self::ArrayLayout,
            2 => Self::InvalidParameter,
            3 => Self::Numerical,
            4 => Self::OutOfMemory,
            _ => Self::Unknown,
        }
    }
}

/// A call into the loaded extension failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CollaboratorError {
    /// Structured category, when the library reports one.
    pub kind: ErrorKind,
    /// Message as reported by the library, verbatim.
    pub message: String,
}

impl CollaboratorError {
    /// Error with no structured category.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            message: message.into(),
        }
    }
}
