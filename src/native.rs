// SPDX-License-Identifier: AGPL-3.0-or-later
//! Native backend — the compiled extension through its C ABI.
//!
//! Loading resolves every required entry point up front, so a stale or
//! partially built library fails in the load stage rather than halfway
//! through training. Optional entry points (`als_last_error_kind`,
//! `als_set_num_threads`) are used when present.

use std::ffi::{CStr, c_char, c_void};
use std::path::Path;
use std::ptr::NonNull;

use libloading::Library;

use crate::collaborator::{AlsLibrary, AlsModel, Loader, Recommendations};
use crate::config::{ModelParams, QueryParams};
use crate::error::{CollaboratorError, ErrorKind, LoadError};
use crate::workload::{CSR_ABI_VERSION, CsrMatrix, CsrRow};

type VersionFn = unsafe extern "C" fn() -> *const c_char;
type AbiVersionFn = unsafe extern "C" fn() -> u32;
type ModelNewFn = unsafe extern "C" fn(u32, u32, f32, u8) -> *mut c_void;
type ModelFitFn = unsafe extern "C" fn(
    *mut c_void,
    u64,
    u64,
    *const u64,
    *const u32,
    *const f32,
    u64,
) -> i32;
type ModelRecommendFn = unsafe extern "C" fn(
    *mut c_void,
    u32,
    *const u32,
    *const f32,
    u64,
    u32,
    u8,
    *mut u32,
    *mut f32,
) -> i64;
type ModelFreeFn = unsafe extern "C" fn(*mut c_void);
type LastErrorFn = unsafe extern "C" fn() -> *const c_char;
type LastErrorKindFn = unsafe extern "C" fn() -> i32;
type SetNumThreadsFn = unsafe extern "C" fn(u32);

/// Loads the extension with `dlopen` / `LoadLibrary`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLoader;

/// Resolved entry points of a loaded extension.
struct Api {
    model_new: ModelNewFn,
    model_fit: ModelFitFn,
    model_recommend: ModelRecommendFn,
    model_free: ModelFreeFn,
    last_error: LastErrorFn,
    last_error_kind: Option<LastErrorKindFn>,
    set_num_threads: Option<SetNumThreadsFn>,
}

/// A loaded extension. The function pointers in `api` stay valid for as
/// long as `_library` is alive; fields drop in declaration order.
pub struct NativeLibrary {
    api: Api,
    version: String,
    _library: Library,
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

fn required<T: Copy>(library: &Library, symbol: &'static str) -> Result<T, LoadError> {
    // SAFETY: `T` is the documented C signature of `symbol`; the pointer
    // is only used while `library` is kept alive by `NativeLibrary`.
    unsafe { library.get::<T>(symbol.as_bytes()) }
        .map(|s| *s)
        .map_err(|e| LoadError::MissingSymbol {
            symbol,
            message: e.to_string(),
        })
}

fn optional<T: Copy>(library: &Library, symbol: &'static str) -> Option<T> {
    // SAFETY: as in `required`.
    unsafe { library.get::<T>(symbol.as_bytes()) }
        .ok()
        .map(|s| *s)
}

fn owned_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null pointers returned by the extension point to a
    // NUL-terminated string it owns for at least the duration of this call.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

impl Loader for NativeLoader {
    type Library = NativeLibrary;

    fn load(&self, path: &Path) -> Result<NativeLibrary, LoadError> {
        // SAFETY: loading runs the extension's initializers; that is the
        // behavior under test and there is no way to check it beforehand.
        let library = unsafe { Library::new(path) }.map_err(|e| LoadError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let version_fn: VersionFn = required(&library, "als_version")?;
        let abi_fn: AbiVersionFn = required(&library, "als_abi_version")?;
        let api = Api {
            model_new: required(&library, "als_model_new")?,
            model_fit: required(&library, "als_model_fit")?,
            model_recommend: required(&library, "als_model_recommend")?,
            model_free: required(&library, "als_model_free")?,
            last_error: required(&library, "als_last_error")?,
            last_error_kind: optional(&library, "als_last_error_kind"),
            set_num_threads: optional(&library, "als_set_num_threads"),
        };

        // SAFETY: both take no arguments and only return static data.
        let found = unsafe { abi_fn() };
        if found != CSR_ABI_VERSION {
            return Err(LoadError::AbiVersion {
                expected: CSR_ABI_VERSION,
                found,
            });
        }
        let version =
            owned_c_str(unsafe { version_fn() }).unwrap_or_else(|| String::from("unknown"));

        tracing::debug!(path = %path.display(), %version, abi = found, "extension loaded");
        Ok(NativeLibrary {
            api,
            version,
            _library: library,
        })
    }
}

impl NativeLibrary {
    fn last_error(&self) -> CollaboratorError {
        // SAFETY: no arguments; returns thread-local state of the extension.
        let kind = self
            .api
            .last_error_kind
            .map_or(ErrorKind::Unknown, |f| ErrorKind::from_code(unsafe { f() }));
        let message = owned_c_str(unsafe { (self.api.last_error)() })
            .unwrap_or_else(|| String::from("extension reported failure without a message"));
        CollaboratorError { kind, message }
    }
}

impl AlsLibrary for NativeLibrary {
    type Model<'lib>
        = NativeModel<'lib>
    where
        Self: 'lib;

    fn version(&self) -> &str {
        &self.version
    }

    fn set_num_threads(&self, threads: u32) -> bool {
        self.api.set_num_threads.is_some_and(|f| {
            // SAFETY: plain value argument.
            unsafe { f(threads) };
            true
        })
    }

    fn new_model(&self, params: &ModelParams) -> Result<NativeModel<'_>, CollaboratorError> {
        // SAFETY: plain value arguments; ownership of the returned handle
        // passes to `NativeModel`, which frees it exactly once.
        let raw = unsafe {
            (self.api.model_new)(
                params.factors,
                params.iterations,
                params.regularization,
                u8::from(params.use_gpu),
            )
        };
        NonNull::new(raw)
            .map(|handle| NativeModel {
                library: self,
                handle,
            })
            .ok_or_else(|| self.last_error())
    }
}

/// Model handle owned by the extension.
pub struct NativeModel<'lib> {
    library: &'lib NativeLibrary,
    handle: NonNull<c_void>,
}

impl AlsModel for NativeModel<'_> {
    fn fit(&mut self, interactions: &CsrMatrix) -> Result<(), CollaboratorError> {
        let (rows, cols) = interactions.shape();
        // SAFETY: the slices outlive the call and their lengths match the
        // CSR_ABI_VERSION layout the extension was checked against.
        let status = unsafe {
            (self.library.api.model_fit)(
                self.handle.as_ptr(),
                rows as u64,
                cols as u64,
                interactions.indptr().as_ptr(),
                interactions.indices().as_ptr(),
                interactions.data().as_ptr(),
                interactions.nnz() as u64,
            )
        };
        if status == 0 {
            Ok(())
        } else {
            Err(self.library.last_error())
        }
    }

    fn recommend(
        &self,
        query: &QueryParams,
        user_row: CsrRow<'_>,
    ) -> Result<Recommendations, CollaboratorError> {
        let user = u32::try_from(query.user).map_err(|_| {
            CollaboratorError::unknown(format!("user index {} exceeds u32", query.user))
        })?;
        let n = query.n as usize;
        let mut ids = vec![0_u32; n];
        let mut scores = vec![0.0_f32; n];
        // SAFETY: output buffers hold `n` elements; the extension writes at
        // most `n` and returns how many it wrote.
        let written = unsafe {
            (self.library.api.model_recommend)(
                self.handle.as_ptr(),
                user,
                user_row.indices.as_ptr(),
                user_row.data.as_ptr(),
                user_row.indices.len() as u64,
                query.n,
                u8::from(query.filter_liked),
                ids.as_mut_ptr(),
                scores.as_mut_ptr(),
            )
        };
        let count = usize::try_from(written).map_err(|_| self.library.last_error())?;
        ids.truncate(count.min(n));
        scores.truncate(count.min(n));
        Ok(Recommendations { ids, scores })
    }
}

impl Drop for NativeModel<'_> {
    fn drop(&mut self) {
        // SAFETY: handle came from `als_model_new` and is freed only here.
        unsafe { (self.library.api.model_free)(self.handle.as_ptr()) };
    }
}
