// SPDX-License-Identifier: AGPL-3.0-or-later
//! Toy ALS extension exporting the C ABI the harness loads.
//!
//! "Training" sums each column of the interaction matrix; recommend ranks
//! items by that sum. Enough to check that arrays cross the boundary
//! intact and that every error path reaches the caller. Cargo features
//! select the broken variants.
//!
//! `als_fixture_live_models` and `als_fixture_threads` are test hooks and
//! not part of the extension ABI.

use std::cell::RefCell;
use std::ffi::{CStr, CString, c_char, c_void};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

const VERSION: &CStr = c"0.7.2-fixture";

const CSR_ABI_VERSION: u32 = if cfg!(feature = "abi-v2") { 2 } else { 1 };

const KIND_ARRAY_LAYOUT: i32 = 1;
const KIND_INVALID_PARAMETER: i32 = 2;
const KIND_NUMERICAL: i32 = 3;

static LIVE_MODELS: AtomicU64 = AtomicU64::new(0);
static THREADS: AtomicU32 = AtomicU32::new(0);

thread_local! {
    static LAST_ERROR: RefCell<(i32, CString)> = RefCell::new((0, CString::default()));
}

fn set_error(kind: i32, message: &str) {
    let message = CString::new(message).unwrap_or_default();
    LAST_ERROR.with(|e| *e.borrow_mut() = (kind, message));
}

struct Model {
    rows: usize,
    scores: Vec<f32>,
    fitted: bool,
}

#[unsafe(no_mangle)]
pub extern "C" fn als_version() -> *const c_char {
    VERSION.as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn als_abi_version() -> u32 {
    CSR_ABI_VERSION
}

#[unsafe(no_mangle)]
pub extern "C" fn als_set_num_threads(threads: u32) {
    THREADS.store(threads, Ordering::SeqCst);
}

#[unsafe(no_mangle)]
pub extern "C" fn als_fixture_threads() -> u32 {
    THREADS.load(Ordering::SeqCst)
}

#[unsafe(no_mangle)]
pub extern "C" fn als_fixture_live_models() -> u64 {
    LIVE_MODELS.load(Ordering::SeqCst)
}

/// Message of the last failure on this thread. Valid until the next
/// failing call on the same thread.
#[unsafe(no_mangle)]
pub extern "C" fn als_last_error() -> *const c_char {
    LAST_ERROR.with(|e| e.borrow().1.as_ptr())
}

#[unsafe(no_mangle)]
pub extern "C" fn als_last_error_kind() -> i32 {
    LAST_ERROR.with(|e| e.borrow().0)
}

#[unsafe(no_mangle)]
pub extern "C" fn als_model_new(
    factors: u32,
    _iterations: u32,
    regularization: f32,
    use_gpu: u8,
) -> *mut c_void {
    if use_gpu != 0 {
        set_error(KIND_INVALID_PARAMETER, "GPU backend not available in this build");
        return std::ptr::null_mut();
    }
    if factors == 0 || regularization.is_nan() || regularization < 0.0 {
        set_error(
            KIND_INVALID_PARAMETER,
            "factors must be positive and regularization non-negative",
        );
        return std::ptr::null_mut();
    }
    LIVE_MODELS.fetch_add(1, Ordering::SeqCst);
    Box::into_raw(Box::new(Model {
        rows: 0,
        scores: Vec::new(),
        fitted: false,
    }))
    .cast()
}

/// # Safety
///
/// `model` comes from `als_model_new`. `indptr` holds `rows + 1` values;
/// `indices` and `data` hold `nnz` values each.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn als_model_fit(
    model: *mut c_void,
    rows: u64,
    cols: u64,
    indptr: *const u64,
    indices: *const u32,
    data: *const f32,
    nnz: u64,
) -> i32 {
    // SAFETY: caller contract.
    let Some(model) = (unsafe { model.cast::<Model>().as_mut() }) else {
        set_error(KIND_INVALID_PARAMETER, "null model handle");
        return -1;
    };
    if cfg!(feature = "fit-error") {
        set_error(KIND_NUMERICAL, "cholesky failed: matrix not positive definite");
        return -1;
    }
    let (Ok(rows), Ok(cols), Ok(nnz)) = (
        usize::try_from(rows),
        usize::try_from(cols),
        usize::try_from(nnz),
    ) else {
        set_error(KIND_ARRAY_LAYOUT, "csr shape exceeds address space");
        return -1;
    };
    if indptr.is_null() || (nnz > 0 && (indices.is_null() || data.is_null())) {
        set_error(KIND_ARRAY_LAYOUT, "csr array pointer is null");
        return -1;
    }
    // SAFETY: caller contract; null pointers were rejected above.
    let indptr = unsafe { std::slice::from_raw_parts(indptr, rows + 1) };
    let (indices, data): (&[u32], &[f32]) = if nnz == 0 {
        (&[], &[])
    } else {
        // SAFETY: as above.
        unsafe {
            (
                std::slice::from_raw_parts(indices, nnz),
                std::slice::from_raw_parts(data, nnz),
            )
        }
    };
    if indptr.first() != Some(&0)
        || indptr.last() != Some(&(nnz as u64))
        || indptr.windows(2).any(|w| w[0] > w[1])
    {
        set_error(KIND_ARRAY_LAYOUT, "csr indptr inconsistent with nnz");
        return -1;
    }

    let mut scores = vec![0.0_f32; cols];
    for (&col, &value) in indices.iter().zip(data) {
        let Some(score) = scores.get_mut(col as usize) else {
            set_error(KIND_ARRAY_LAYOUT, "csr column index out of range");
            return -1;
        };
        *score += value;
    }
    model.rows = rows;
    model.scores = scores;
    model.fitted = true;
    0
}

/// # Safety
///
/// `model` comes from `als_model_new`. `row_indices` holds `row_nnz`
/// values; `out_ids` and `out_scores` hold `n` values each.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn als_model_recommend(
    model: *mut c_void,
    user: u32,
    row_indices: *const u32,
    _row_data: *const f32,
    row_nnz: u64,
    n: u32,
    filter_liked: u8,
    out_ids: *mut u32,
    out_scores: *mut f32,
) -> i64 {
    // SAFETY: caller contract.
    let Some(model) = (unsafe { model.cast::<Model>().as_ref() }) else {
        set_error(KIND_INVALID_PARAMETER, "null model handle");
        return -1;
    };
    if !model.fitted {
        set_error(KIND_INVALID_PARAMETER, "model is not fitted");
        return -1;
    }
    if user as usize >= model.rows {
        set_error(KIND_INVALID_PARAMETER, "user index out of range");
        return -1;
    }
    if cfg!(feature = "recommend-error") {
        set_error(KIND_ARRAY_LAYOUT, "csr row stride mismatch");
        return -1;
    }
    if cfg!(feature = "empty") || n == 0 {
        return 0;
    }
    if out_ids.is_null() || out_scores.is_null() {
        set_error(KIND_INVALID_PARAMETER, "output buffer is null");
        return -1;
    }

    let liked: &[u32] = match usize::try_from(row_nnz) {
        Ok(len) if len > 0 && !row_indices.is_null() => {
            // SAFETY: caller contract.
            unsafe { std::slice::from_raw_parts(row_indices, len) }
        }
        _ => &[],
    };
    let mut ranked: Vec<(u32, f32)> = (0_u32..)
        .zip(model.scores.iter().copied())
        .filter(|(id, _)| filter_liked == 0 || !liked.contains(id))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(n as usize);

    // SAFETY: caller contract; both buffers hold `n >= ranked.len()` values.
    let (ids, scores) = unsafe {
        (
            std::slice::from_raw_parts_mut(out_ids, n as usize),
            std::slice::from_raw_parts_mut(out_scores, n as usize),
        )
    };
    for (i, (id, score)) in ranked.iter().enumerate() {
        ids[i] = *id;
        scores[i] = *score;
    }

    let written = ranked.len() as i64;
    if cfg!(feature = "overcount") { written + 5 } else { written }
}

/// # Safety
///
/// `model` comes from `als_model_new` and is not used afterwards.
#[cfg(not(feature = "missing-free"))]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn als_model_free(model: *mut c_void) {
    if model.is_null() {
        return;
    }
    // SAFETY: caller contract; the box was leaked in `als_model_new`.
    drop(unsafe { Box::from_raw(model.cast::<Model>()) });
    LIVE_MODELS.fetch_sub(1, Ordering::SeqCst);
}
