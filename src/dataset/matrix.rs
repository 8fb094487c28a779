//! Dense row-major matrices.

use crate::error::{GroundTruthError, Result};

/// A rectangular row-major array.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Copy> Matrix<T> {
    /// Wrap a flat buffer. Fails if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(GroundTruthError::shape_mismatch(format!(
                "buffer of {} elements cannot form a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Matrix { rows, cols, data })
    }

    /// A matrix with every cell set to `value`. Fails if the buffer size overflows.
    pub fn filled(rows: usize, cols: usize, value: T) -> Result<Self> {
        let len = rows
            .checked_mul(cols)
            .filter(|len| {
                len.checked_mul(size_of::<T>())
                    .is_some_and(|bytes| bytes <= isize::MAX as usize)
            })
            .ok_or_else(|| {
                GroundTruthError::shape_mismatch(format!(
                    "a {rows}x{cols} matrix does not fit in memory"
                ))
            })?;
        Ok(Matrix {
            rows,
            cols,
            data: vec![value; len],
        })
    }

    /// Build from nested rows. All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(GroundTruthError::shape_mismatch(format!(
                    "row {i} has {} columns, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Matrix {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Row `i`. Panics if out of bounds, like slice indexing.
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> impl ExactSizeIterator<Item = &[T]> + '_ {
        (0..self.rows).map(move |i| self.row(i))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T: Copy> Matrix<T> {
    /// A single-column matrix from a sequence of scalars.
    pub fn column(values: Vec<T>) -> Self {
        Matrix {
            rows: values.len(),
            cols: 1,
            data: values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_length() {
        assert!(Matrix::new(2, 3, vec![0f32; 6]).is_ok());
        assert!(matches!(
            Matrix::new(2, 3, vec![0f32; 5]),
            Err(GroundTruthError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_from_rows_and_access() {
        let m = Matrix::from_rows(vec![vec![1i64, 2], vec![3, 4], vec![5, 6]]).unwrap();
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m.row(1), &[3, 4]);
        assert_eq!(m.row(2), &[5, 6]);
        assert_eq!(m.iter_rows().len(), 3);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let ragged = Matrix::from_rows(vec![vec![1.0f32, 2.0], vec![3.0]]);
        assert!(matches!(ragged, Err(GroundTruthError::ShapeMismatch(_))));
    }

    #[test]
    fn test_row_mut_and_column() {
        let mut m = Matrix::filled(2, 3, -1i64).unwrap();
        m.row_mut(0)[..2].copy_from_slice(&[7, 8]);
        assert_eq!(m.as_slice(), &[7, 8, -1, -1, -1, -1]);

        let c = Matrix::column(vec![0.5f32, 1.5]);
        assert_eq!(c.shape(), (2, 1));
    }

    #[test]
    fn test_filled_rejects_overflowing_shape() {
        let huge = Matrix::filled(3, usize::MAX / 2, 0i64);
        assert!(matches!(huge, Err(GroundTruthError::ShapeMismatch(_))));
        let too_many_bytes = Matrix::filled(1, usize::MAX / 4, 0i64);
        assert!(matches!(too_many_bytes, Err(GroundTruthError::ShapeMismatch(_))));
    }
}
