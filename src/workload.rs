// SPDX-License-Identifier: AGPL-3.0-or-later
//! Synthetic interaction matrix in the CSR interchange layout.
//!
//! The matrix is a stand-in for real user × item data. Shape and value
//! range never change between runs; the values do, unless a seed is given.
//! This is a liveness check, so "some valid input" is all that is needed.
//!
//! # Layout
//!
//! Compressed sparse rows, single precision, zeros not stored:
//!
//! ```text
//! indptr  : u64 × (rows + 1)   row i spans indptr[i]..indptr[i+1]
//! indices : u32 × nnz          column of each stored value
//! data    : f32 × nnz          interaction count
//! ```
//!
//! The extension must be compiled against the same layout version,
//! [`CSR_ABI_VERSION`], or the load stage rejects it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{MATRIX_COLS, MATRIX_ROWS, MAX_COUNT};

/// Version of the CSR layout passed across the FFI boundary.
pub const CSR_ABI_VERSION: u32 = 1;

/// Sparse matrix in compressed-sparse-row form.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    indptr: Vec<u64>,
    indices: Vec<u32>,
    data: Vec<f32>,
}

/// Borrowed view of one CSR row.
#[derive(Debug, Clone, Copy)]
pub struct CsrRow<'a> {
    /// Columns with a stored value.
    pub indices: &'a [u32],
    /// Stored values, parallel to `indices`.
    pub data: &'a [f32],
}

impl CsrMatrix {
    /// Compress a row-major dense matrix, dropping zeros.
    ///
    /// Returns `None` if `dense.len() != rows * cols` or `cols` does not
    /// fit the `u32` column index.
    #[must_use]
    pub fn from_dense(rows: usize, cols: usize, dense: &[f32]) -> Option<Self> {
        if rows.checked_mul(cols)? != dense.len() || u32::try_from(cols).is_err() {
            return None;
        }
        let mut indptr = Vec::with_capacity(rows + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for row in dense.chunks_exact(cols.max(1)).take(rows) {
            for (col, &value) in row.iter().enumerate() {
                if value != 0.0 {
                    indices.push(u32::try_from(col).ok()?);
                    data.push(value);
                }
            }
            indptr.push(data.len() as u64);
        }
        while indptr.len() < rows + 1 {
            indptr.push(data.len() as u64);
        }
        Some(Self {
            rows,
            cols,
            indptr,
            indices,
            data,
        })
    }

    /// (rows, cols).
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Stored (non-zero) entry count.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Row offsets, `rows + 1` entries.
    #[must_use]
    pub fn indptr(&self) -> &[u64] {
        &self.indptr
    }

    /// Column index of each stored value.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Stored values.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// View of row `i`, or `None` if out of range.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<CsrRow<'_>> {
        let start = usize::try_from(*self.indptr.get(i)?).ok()?;
        let end = usize::try_from(*self.indptr.get(i + 1)?).ok()?;
        Some(CsrRow {
            indices: self.indices.get(start..end)?,
            data: self.data.get(start..end)?,
        })
    }
}

/// Build the fixed-shape synthetic matrix: integer counts in
/// `[0, MAX_COUNT)` cast to `f32`.
///
/// Row `open_row` always keeps at least one zero, so a query for that
/// user that filters already-seen items still has a candidate left.
///
/// `seed = None` draws from thread-local entropy; `Some(s)` makes the
/// matrix reproducible.
#[must_use]
pub fn synthetic_interactions(seed: Option<u64>, open_row: usize) -> CsrMatrix {
    match seed {
        Some(s) => fill(&mut StdRng::seed_from_u64(s), open_row),
        None => fill(&mut rand::thread_rng(), open_row),
    }
}

fn fill<R: Rng>(rng: &mut R, open_row: usize) -> CsrMatrix {
    #[allow(clippy::cast_precision_loss)] // counts < 5
    let mut dense: Vec<f32> = (0..MATRIX_ROWS * MATRIX_COLS)
        .map(|_| rng.gen_range(0..MAX_COUNT) as f32)
        .collect();
    if open_row < MATRIX_ROWS {
        let col = rng.gen_range(0..MATRIX_COLS);
        dense[open_row * MATRIX_COLS + col] = 0.0;
    }
    CsrMatrix::from_dense(MATRIX_ROWS, MATRIX_COLS, &dense).unwrap_or_else(|| CsrMatrix {
        rows: MATRIX_ROWS,
        cols: MATRIX_COLS,
        indptr: vec![0; MATRIX_ROWS + 1],
        indices: Vec::new(),
        data: Vec::new(),
    })
}
