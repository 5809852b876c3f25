// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared integration-test helpers: build the fixture extension and lay
//! it out as an installed tree.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, OnceLock, PoisonError};

use als_verify::artifact;
use als_verify::config::EXTENSION_DIR;
use tempfile::TempDir;

static BUILT: OnceLock<Mutex<HashMap<&'static str, PathBuf>>> = OnceLock::new();

/// Build `tests/fixtures/als-fixture` with `feature` (or none) and return
/// the path of the shared library. Each variant is built once per test
/// binary into its own target directory.
pub fn fixture_library(feature: Option<&'static str>) -> PathBuf {
    let key = feature.unwrap_or("healthy");
    let mut built = BUILT
        .get_or_init(Mutex::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(path) = built.get(key) {
        return path.clone();
    }

    let manifest =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/als-fixture/Cargo.toml");
    let target = Path::new(env!("CARGO_TARGET_TMPDIR"))
        .join("als-fixture")
        .join(key);
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["build", "--quiet", "--manifest-path"])
        .arg(&manifest)
        .arg("--target-dir")
        .arg(&target);
    if let Some(feature) = feature {
        cmd.args(["--features", feature]);
    }
    let status = cmd.status().expect("spawn cargo for the fixture extension");
    assert!(status.success(), "fixture extension ({key}) failed to build");

    let library = target
        .join("debug")
        .join(format!("{DLL_PREFIX}als_fixture{DLL_SUFFIX}"));
    assert!(library.is_file(), "missing {}", library.display());
    built.insert(key, library.clone());
    library
}

/// Copy `library` into a fresh install root as `als/cpu/<platform name>`.
///
/// Every call yields a distinct path, so every load gets its own copy of
/// the fixture's global state.
pub fn install(library: &Path) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join(EXTENSION_DIR);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::copy(library, dir.join(artifact::default_file_name())).unwrap();
    tmp
}

/// Installed copy of the fixture built with `feature`, and its path.
pub fn installed_fixture(feature: Option<&'static str>) -> (TempDir, PathBuf) {
    let tmp = install(&fixture_library(feature));
    let path = tmp
        .path()
        .join(EXTENSION_DIR)
        .join(artifact::default_file_name());
    (tmp, path)
}
