//! Dense linear algebra for small regression designs.
//!
//! Designs here have at most a handful of columns, so plain Gaussian
//! elimination with partial pivoting is accurate enough and avoids a LAPACK
//! dependency.

use crate::error::{ModelError, Result};
use ndarray::{Array2, Axis};

/// Numerical column rank of `matrix`.
///
/// Each column is scaled to unit max-norm first, so the rank does not depend on
/// the units of the regressors. A pivot counts when its magnitude exceeds
/// `tolerance * max(rows, cols)`.
pub fn column_rank(matrix: &Array2<f64>, tolerance: f64) -> usize {
    let (rows, cols) = matrix.dim();
    let mut a = matrix.clone();

    for mut column in a.axis_iter_mut(Axis(1)) {
        let scale = column.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if scale > 0.0 {
            column.mapv_inplace(|v| v / scale);
        }
    }

    let threshold = tolerance * rows.max(cols) as f64;
    let mut rank = 0;

    for col in 0..cols {
        if rank == rows {
            break;
        }

        // Find pivot among rows not yet used
        let mut pivot_row = rank;
        let mut pivot_val = a[[rank, col]].abs();
        for row in (rank + 1)..rows {
            if a[[row, col]].abs() > pivot_val {
                pivot_val = a[[row, col]].abs();
                pivot_row = row;
            }
        }

        if pivot_val <= threshold {
            continue;
        }

        if pivot_row != rank {
            for j in 0..cols {
                a.swap([rank, j], [pivot_row, j]);
            }
        }

        for row in (rank + 1)..rows {
            let factor = a[[row, col]] / a[[rank, col]];
            if factor != 0.0 {
                for j in col..cols {
                    a[[row, j]] -= factor * a[[rank, j]];
                }
            }
        }

        rank += 1;
    }

    rank
}

/// Inverse of a square matrix by Gauss-Jordan elimination with partial pivoting.
///
/// # Errors
/// - [`ModelError::DimensionMismatch`] for a non-square input
/// - [`ModelError::SingularDesign`] when a pivot vanishes
pub fn invert(matrix: &Array2<f64>) -> Result<Array2<f64>> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return Err(ModelError::DimensionMismatch {
            expected: n,
            actual: matrix.ncols(),
        });
    }

    let mut a = matrix.clone();
    let mut inv = Array2::<f64>::eye(n);

    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_val = a[[col, col]].abs();
        for row in (col + 1)..n {
            if a[[row, col]].abs() > pivot_val {
                pivot_val = a[[row, col]].abs();
                pivot_row = row;
            }
        }

        if pivot_val < 1e-300 {
            return Err(ModelError::SingularDesign {
                rank: col,
                columns: n,
            });
        }

        if pivot_row != col {
            for j in 0..n {
                a.swap([col, j], [pivot_row, j]);
                inv.swap([col, j], [pivot_row, j]);
            }
        }

        let pivot = a[[col, col]];
        for j in 0..n {
            a[[col, j]] /= pivot;
            inv[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                a[[row, j]] -= factor * a[[col, j]];
                inv[[row, j]] -= factor * inv[[col, j]];
            }
        }
    }

    Ok(inv)
}
