// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process environment for the native numerical backends.
//!
//! Multi-threaded BLAS kernels hang or thrash when many CI jobs share a
//! runner. The harness pins both common backends to one thread before the
//! extension is loaded. Where the extension exports `als_set_num_threads`,
//! [`crate::native`] also passes the count explicitly; the variables set
//! here are the fallback and stay in force for the process lifetime.

use crate::config::NATIVE_THREADS;

/// Thread-count variables read by OpenBLAS and MKL at initialization.
pub const THREAD_VARS: [&str; 2] = ["OPENBLAS_NUM_THREADS", "MKL_NUM_THREADS"];

/// Pin the native backend thread pools to [`NATIVE_THREADS`].
///
/// Must run at the top of `main`, before any thread is spawned and before
/// the extension (and the BLAS it links) is loaded, which is also before
/// any subscriber exists, so the caller logs the result. Setting the
/// variables again is harmless.
pub fn pin_native_threads() {
    let value = NATIVE_THREADS.to_string();
    for var in THREAD_VARS {
        // SAFETY: called once from `main` while the process is still
        // single-threaded; nothing reads the environment concurrently.
        unsafe { std::env::set_var(var, &value) };
    }
}
