// SPDX-License-Identifier: AGPL-3.0-or-later
//! Static artifact check — is the compiled extension on disk at all?
//!
//! Runs before any load attempt. A build that skipped native compilation
//! leaves the extension directory empty (or missing), and loading would
//! only report a generic "not found" that hides the real cause.
//!
//! Recognized compiled-extension names:
//!
//! | Pattern | Platform |
//! |---------|----------|
//! | `*.so`, `*.so.*` | Linux / BSD |
//! | `*.dylib` | macOS |
//! | `*.dll` | Windows |

use std::path::{Path, PathBuf};

use crate::error::{Error, LoadError, Result};

/// Suffixes of platform shared libraries.
pub const EXTENSION_SUFFIXES: [&str; 3] = [".so", ".dylib", ".dll"];

/// File name the build produces on this platform, e.g. `libals_cpu.so`.
///
/// Used as the load target when the artifact check is skipped.
#[must_use]
pub fn default_file_name() -> String {
    format!(
        "{}als_cpu{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    )
}

/// Whether a file name looks like a compiled native extension.
///
/// ```
/// use als_verify::artifact::is_extension_name;
///
/// assert!(is_extension_name("libals_cpu.so"));
/// assert!(is_extension_name("libals_cpu.so.1.2"));
/// assert!(is_extension_name("als_cpu.dll"));
/// assert!(!is_extension_name("als_cpu.rs"));
/// assert!(!is_extension_name(".so"));
/// ```
#[must_use]
pub fn is_extension_name(name: &str) -> bool {
    EXTENSION_SUFFIXES.iter().any(|suffix| {
        name.match_indices(suffix).any(|(at, _)| {
            let rest = &name[at + suffix.len()..];
            at > 0 && (rest.is_empty() || (*suffix == ".so" && rest.starts_with('.')))
        })
    })
}

/// List compiled extension files directly under `dir`, sorted.
///
/// A missing directory yields an empty list: absence is the condition
/// being tested, not an I/O error.
///
/// # Errors
///
/// Returns [`Error::Io`] if `dir` exists but cannot be read.
pub fn find_extensions(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(Error::Io {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut found: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_extension_name)
        })
        .collect();
    found.sort();
    Ok(found)
}

/// Pick the artifact built for the running platform.
///
/// # Errors
///
/// Returns [`LoadError::WrongPlatform`] when every artifact carries a
/// foreign suffix (e.g. only `.dll` files on Linux).
pub fn select_for_platform(artifacts: &[PathBuf]) -> std::result::Result<&Path, LoadError> {
    select_with_suffix(artifacts, std::env::consts::DLL_SUFFIX)
}

fn select_with_suffix<'a>(
    artifacts: &'a [PathBuf],
    suffix: &'static str,
) -> std::result::Result<&'a Path, LoadError> {
    artifacts
        .iter()
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(suffix) || n.contains(&format!("{suffix}.")))
        })
        .map(PathBuf::as_path)
        .ok_or(LoadError::WrongPlatform {
            suffix,
            found: artifacts.len(),
        })
}
