//! Exact matrix inversion.
//!
//! Inversion runs Gauss–Jordan elimination over `BigRational` on `[M | I]`,
//! so no rounding ever happens. Conversion matrices between integral bases
//! must have integral inverses; a fractional entry is reported as a
//! [`EngineError::Precision`] failure rather than rounded away.

use crate::error::EngineError;
use crate::graded::Graded;
use crate::matrix::Matrix;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive, Zero};
use std::rc::Rc;
use tracing::debug;

/// Why a single matrix could not be inverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InversionFailure {
    NotSquare { rows: usize, cols: usize },
    Singular { rank: usize, dim: usize },
    NonIntegral { row: usize, col: usize, value: String },
    Overflow { row: usize, col: usize },
}

impl InversionFailure {
    /// Attaches the sequence name and grading the matrix came from.
    pub fn at(self, sequence: &str, grading: usize) -> EngineError {
        match self {
            InversionFailure::NotSquare { rows, cols } => EngineError::DimensionMismatch {
                context: format!("inverting {}[{}]", sequence, grading),
                expected: (rows, rows),
                actual: (rows, cols),
            },
            InversionFailure::Singular { rank, dim } => EngineError::SingularMatrix {
                sequence: sequence.to_string(),
                grading,
                rank,
                dim,
            },
            InversionFailure::NonIntegral { row, col, value } => EngineError::Precision {
                sequence: sequence.to_string(),
                grading,
                row,
                col,
                value,
            },
            InversionFailure::Overflow { row, col } => EngineError::Overflow {
                context: format!("{}[{}] entry ({}, {})", sequence, grading, row, col),
            },
        }
    }
}

/// Inverts `m` exactly, requiring an integral inverse.
pub fn invert_exact(m: &Matrix) -> Result<Matrix, InversionFailure> {
    let (rows, cols) = m.shape();
    if rows != cols {
        return Err(InversionFailure::NotSquare { rows, cols });
    }
    let n = rows;
    let width = 2 * n;

    // Augmented [M | I], one Vec per row so pivoting is a swap.
    let mut aug: Vec<Vec<BigRational>> = (0..n)
        .map(|i| {
            let mut row = Vec::with_capacity(width);
            row.extend(m.row(i).iter().map(|&v| BigRational::from_integer(BigInt::from(v))));
            row.extend((0..n).map(|j| {
                if i == j {
                    BigRational::one()
                } else {
                    BigRational::zero()
                }
            }));
            row
        })
        .collect();

    let mut rank = 0;
    for col in 0..n {
        let Some(pivot) = (rank..n).find(|&r| !aug[r][col].is_zero()) else {
            continue;
        };
        aug.swap(rank, pivot);

        let inv = aug[rank][col].recip();
        for v in aug[rank].iter_mut() {
            if !v.is_zero() {
                *v = &*v * &inv;
            }
        }

        let pivot_row = aug[rank].clone();
        for (r, row) in aug.iter_mut().enumerate() {
            if r == rank || row[col].is_zero() {
                continue;
            }
            let factor = row[col].clone();
            for (v, p) in row.iter_mut().zip(&pivot_row) {
                if !p.is_zero() {
                    *v -= &factor * p;
                }
            }
        }
        rank += 1;
    }
    if rank < n {
        return Err(InversionFailure::Singular { rank, dim: n });
    }

    let mut out = Matrix::zeros(n, n);
    for (i, row) in aug.iter().enumerate() {
        for (j, v) in row[n..].iter().enumerate() {
            if !v.is_integer() {
                return Err(InversionFailure::NonIntegral {
                    row: i,
                    col: j,
                    value: v.to_string(),
                });
            }
            let value = v
                .to_integer()
                .to_i64()
                .ok_or(InversionFailure::Overflow { row: i, col: j })?;
            out.set(i, j, value);
        }
    }
    Ok(out)
}

/// The sequence `Inv[n] = inverse(source[n])`, computed one grading at a time.
pub fn inverse_of(name: impl Into<String>, source: Rc<Graded<Matrix>>) -> Graded<Matrix> {
    let name = name.into();
    let label = name.clone();
    Graded::new(name, move |_, n| {
        let m = source.get(n)?;
        let inverse = invert_exact(&m).map_err(|failure| failure.at(&label, n))?;
        debug!(sequence = %label, grading = n, dim = m.rows(), "inverted");
        Ok(inverse)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn m(rows: Vec<Vec<i64>>) -> Matrix {
        Matrix::from_rows(rows).unwrap()
    }

    #[test]
    fn unimodular_inverse() {
        let a = m(vec![vec![1, 1, 0], vec![0, 1, 1], vec![0, 0, 1]]);
        let inv = invert_exact(&a).unwrap();
        assert_eq!(inv, m(vec![vec![1, -1, 1], vec![0, 1, -1], vec![0, 0, 1]]));
        assert!(inv.mul(&a).unwrap().is_identity());
        assert!(a.mul(&inv).unwrap().is_identity());
    }

    #[test]
    fn needs_pivoting() {
        let a = m(vec![vec![0, 1], vec![1, 0]]);
        assert_eq!(invert_exact(&a).unwrap(), a);
    }

    #[test]
    fn empty_matrix_inverts() {
        assert_eq!(invert_exact(&Matrix::zeros(0, 0)).unwrap(), Matrix::zeros(0, 0));
    }

    #[test]
    fn singular_reports_rank() {
        let a = m(vec![vec![1, 2], vec![2, 4]]);
        assert_eq!(
            invert_exact(&a),
            Err(InversionFailure::Singular { rank: 1, dim: 2 })
        );
    }

    #[test]
    fn fractional_inverse_is_a_precision_error() {
        let a = m(vec![vec![2, 0], vec![0, 1]]);
        let failure = invert_exact(&a).unwrap_err();
        assert_eq!(
            failure,
            InversionFailure::NonIntegral {
                row: 0,
                col: 0,
                value: "1/2".to_string()
            }
        );
        assert_eq!(failure.at("X", 3).kind(), ErrorKind::Precision);
    }

    #[test]
    fn inverse_entry_beyond_i64() {
        // Unitriangular with inverse entry (0, 2) = a·b = 2^64.
        let a = 1i64 << 32;
        let m = m(vec![vec![1, a, 0], vec![0, 1, a], vec![0, 0, 1]]);
        let failure = invert_exact(&m).unwrap_err();
        assert_eq!(failure, InversionFailure::Overflow { row: 0, col: 2 });
        assert_eq!(failure.at("X", 4).kind(), ErrorKind::Arithmetic);
    }

    #[test]
    fn not_square() {
        let err = invert_exact(&Matrix::zeros(2, 3)).unwrap_err().at("X", 1);
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
    }

    #[test]
    fn inverse_sequence_tracks_source() {
        let source = Rc::new(Graded::new("M", |_, n| {
            let mut a = Matrix::identity(n + 1);
            if n > 0 {
                a.set(0, n, 1);
            }
            Ok(a)
        }));
        let inv = inverse_of("Inv", Rc::clone(&source));
        for n in 0..5 {
            let product = inv.get(n).unwrap().mul(&source.get(n).unwrap()).unwrap();
            assert!(product.is_identity());
        }
        assert_eq!(source.materialized(), 5);
    }

    #[test]
    fn singular_grading_is_named() {
        let source = Rc::new(Graded::new("M", |_, n| {
            Ok(if n == 2 { Matrix::zeros(2, 2) } else { Matrix::identity(1) })
        }));
        let inv = inverse_of("Inv", source);
        assert_eq!(
            inv.get(2).unwrap_err(),
            EngineError::SingularMatrix {
                sequence: "Inv".to_string(),
                grading: 2,
                rank: 0,
                dim: 2
            }
        );
    }
}
