use crate::error::{RankError, Result};
use ndarray::{Array2, ArrayView2};

/// Builds a dense matrix from row-major input, rejecting empty, ragged and
/// non-finite data.
pub fn check_rows(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    if rows.is_empty() {
        return Err(RankError::Validation("input has no rows".to_string()));
    }

    let width = rows[0].len();
    if width == 0 {
        return Err(RankError::Validation("input has no columns".to_string()));
    }

    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(RankError::Validation(format!(
                "row {} has {} columns, expected {}",
                i,
                row.len(),
                width
            )));
        }
    }

    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    let array = Array2::from_shape_vec((rows.len(), width), flat)
        .map_err(|e| RankError::Validation(e.to_string()))?;

    check_array(array.view())?;
    Ok(array)
}

/// Checks a matrix is non-empty and finite.
pub fn check_array(x: ArrayView2<f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(RankError::Validation(format!(
            "expected a non-empty matrix, got shape {:?}",
            x.dim()
        )));
    }

    if let Some(((row, col), value)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(RankError::Validation(format!(
            "non-finite value {} at ({}, {})",
            value, row, col
        )));
    }

    Ok(())
}

pub fn check_rows_eq(context: &'static str, x: ArrayView2<f64>, expected: usize) -> Result<()> {
    if x.nrows() != expected {
        return Err(RankError::shape(
            context,
            format!("{} rows", expected),
            format!("{} rows", x.nrows()),
        ));
    }
    Ok(())
}

pub fn check_cols_eq(context: &'static str, x: ArrayView2<f64>, expected: usize) -> Result<()> {
    if x.ncols() != expected {
        return Err(RankError::shape(
            context,
            format!("{} columns", expected),
            format!("{} columns", x.ncols()),
        ));
    }
    Ok(())
}

pub fn check_index(kind: &'static str, index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(RankError::IndexOutOfRange { kind, index, len });
    }
    Ok(())
}
