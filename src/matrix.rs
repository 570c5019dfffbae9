//! Dense integer matrices with checked arithmetic.
//!
//! Every conversion matrix in the engine is integral, so entries are `i64`
//! and every addition and multiplication is checked. Exact inversion lives in
//! [`crate::inverse`].

use crate::error::EngineError;
use crate::fingerprint::{write_dense, Canonical};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Row-major dense matrix of `i64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<i64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = 1;
        }
        m
    }

    /// Builds a matrix from equal-length rows.
    pub fn from_rows(rows: Vec<Vec<i64>>) -> Result<Self, EngineError> {
        let cols = rows.first().map_or(0, Vec::len);
        let n_rows = rows.len();
        let mut data = Vec::with_capacity(n_rows * cols);
        for row in rows {
            if row.len() != cols {
                return Err(EngineError::shape("Matrix::from_rows", (n_rows, cols), (n_rows, row.len())));
            }
            data.extend(row);
        }
        Ok(Self {
            rows: n_rows,
            cols,
            data,
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Entry at `(i, j)`. Panics when out of bounds, like slice indexing.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> i64 {
        assert!(i < self.rows && j < self.cols, "matrix index out of bounds");
        self.data[i * self.cols + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: i64) {
        assert!(i < self.rows && j < self.cols, "matrix index out of bounds");
        self.data[i * self.cols + j] = value;
    }

    /// Adds `delta` to entry `(i, j)`.
    pub fn add_at(&mut self, i: usize, j: usize, delta: i64) -> Result<(), EngineError> {
        assert!(i < self.rows && j < self.cols, "matrix index out of bounds");
        let slot = &mut self.data[i * self.cols + j];
        *slot = slot
            .checked_add(delta)
            .ok_or_else(|| EngineError::overflow(format!("accumulating entry ({}, {})", i, j)))?;
        Ok(())
    }

    pub fn row(&self, i: usize) -> &[i64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Entries in row-major order.
    pub fn entries(&self) -> &[i64] {
        &self.data
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&v| v == 0)
    }

    pub fn is_identity(&self) -> bool {
        self.is_square()
            && (0..self.rows).all(|i| (0..self.cols).all(|j| self.get(i, j) == i64::from(i == j)))
    }

    pub fn transpose(&self) -> Self {
        let mut t = Self::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                t.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        t
    }

    /// Matrix product `self · rhs` with checked arithmetic.
    pub fn mul(&self, rhs: &Matrix) -> Result<Matrix, EngineError> {
        if self.cols != rhs.rows {
            return Err(EngineError::shape(
                "matrix product",
                (self.cols, rhs.cols),
                rhs.shape(),
            ));
        }
        let mut out = Matrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                if a == 0 {
                    continue;
                }
                for j in 0..rhs.cols {
                    let b = rhs.data[k * rhs.cols + j];
                    if b == 0 {
                        continue;
                    }
                    let slot = &mut out.data[i * rhs.cols + j];
                    *slot = a
                        .checked_mul(b)
                        .and_then(|p| slot.checked_add(p))
                        .ok_or_else(|| EngineError::overflow("matrix product"))?;
                }
            }
        }
        Ok(out)
    }

    /// Sorted `(value, count)` pairs over all entries.
    pub fn histogram(&self) -> Vec<(i64, usize)> {
        histogram(&self.data)
    }
}

/// Sorted `(value, count)` pairs of a slice of integers.
pub fn histogram(values: &[i64]) -> Vec<(i64, usize)> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for &v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

impl Canonical for Matrix {
    const DOMAIN: &'static [u8] = b"MATRIX";

    fn write_canonical(&self, out: &mut Vec<u8>) {
        write_dense(out, &[self.rows, self.cols], &self.data);
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .data
            .iter()
            .map(|v| v.to_string().len())
            .max()
            .unwrap_or(1);
        for i in 0..self.rows {
            write!(f, "[")?;
            for (j, v) in self.row(i).iter().enumerate() {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{:>width$}", v, width = width)?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn m(rows: Vec<Vec<i64>>) -> Matrix {
        Matrix::from_rows(rows).unwrap()
    }

    #[test]
    fn product_is_not_commutative() {
        let a = m(vec![vec![1, 1], vec![0, 1]]);
        let b = m(vec![vec![1, 0], vec![1, 1]]);
        assert_eq!(a.mul(&b).unwrap(), m(vec![vec![2, 1], vec![1, 1]]));
        assert_eq!(b.mul(&a).unwrap(), m(vec![vec![1, 1], vec![1, 2]]));
    }

    #[test]
    fn rectangular_product_shape() {
        let a = Matrix::zeros(3, 2);
        let b = Matrix::zeros(2, 5);
        assert_eq!(a.mul(&b).unwrap().shape(), (3, 5));
        let err = b.mul(&a).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
    }

    #[test]
    fn overflow_is_reported() {
        let a = m(vec![vec![i64::MAX, i64::MAX]]);
        let b = m(vec![vec![1], vec![1]]);
        assert_eq!(a.mul(&b).unwrap_err().kind(), ErrorKind::Arithmetic);
    }

    #[test]
    fn ragged_rows_rejected() {
        assert!(Matrix::from_rows(vec![vec![1, 2], vec![3]]).is_err());
    }

    #[test]
    fn histogram_counts_values() {
        let a = m(vec![vec![1, 0, -1], vec![0, 0, 1]]);
        assert_eq!(a.histogram(), vec![(-1, 1), (0, 3), (1, 2)]);
    }

    #[test]
    fn identity_and_transpose() {
        assert!(Matrix::identity(4).is_identity());
        let a = m(vec![vec![1, 2, 3]]);
        assert_eq!(a.transpose(), m(vec![vec![1], vec![2], vec![3]]));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = Matrix::identity(3);
        let mut b = Matrix::identity(3);
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.set(0, 1, 5);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
