//! Product structure constants and their change of basis.
//!
//! A [`ProductTensor`] `P` of shape `(A, B, F)` expands the product of input
//! element `a` (grading n) and `b` (grading m) as `Σ_f P[a][b][f] · e_f` at
//! grading n+m. Re-expressing it in other bases contracts each leg with a
//! conversion matrix; see [`change_product_basis`].

use crate::error::EngineError;
use crate::fingerprint::{write_dense, Canonical};
use crate::matrix::{histogram, Matrix};
use serde::{Deserialize, Serialize};

/// Dense `i64` tensor of shape `(left, right, out)`, indexed `[i][j][k]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTensor {
    shape: (usize, usize, usize),
    data: Vec<i64>,
}

impl ProductTensor {
    pub fn zeros(left: usize, right: usize, out: usize) -> Self {
        Self {
            shape: (left, right, out),
            data: vec![0; left * right * out],
        }
    }

    /// Builds a tensor from nested `[i][j][k]` vectors of uniform shape.
    pub fn from_nested(nested: Vec<Vec<Vec<i64>>>) -> Result<Self, EngineError> {
        let left = nested.len();
        let right = nested.first().map_or(0, Vec::len);
        let out = nested
            .first()
            .and_then(|plane| plane.first())
            .map_or(0, Vec::len);
        let mut data = Vec::with_capacity(left * right * out);
        for plane in nested {
            if plane.len() != right {
                return Err(EngineError::shape("ProductTensor::from_nested", (left, right), (left, plane.len())));
            }
            for fiber in plane {
                if fiber.len() != out {
                    return Err(EngineError::shape("ProductTensor::from_nested", (right, out), (right, fiber.len())));
                }
                data.extend(fiber);
            }
        }
        Ok(Self {
            shape: (left, right, out),
            data,
        })
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    #[inline]
    fn offset(&self, i: usize, j: usize) -> usize {
        let (left, right, out) = self.shape;
        assert!(i < left && j < right, "tensor index out of bounds");
        (i * right + j) * out
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> i64 {
        assert!(k < self.shape.2, "tensor index out of bounds");
        self.data[self.offset(i, j) + k]
    }

    pub fn set(&mut self, i: usize, j: usize, k: usize, value: i64) {
        assert!(k < self.shape.2, "tensor index out of bounds");
        let at = self.offset(i, j) + k;
        self.data[at] = value;
    }

    /// Expansion of the product of `i` and `j` over the output basis.
    pub fn fiber(&self, i: usize, j: usize) -> &[i64] {
        let start = self.offset(i, j);
        &self.data[start..start + self.shape.2]
    }

    /// Entries in `[i][j][k]` order.
    pub fn entries(&self) -> &[i64] {
        &self.data
    }

    /// Sorted `(value, count)` pairs over all entries.
    pub fn histogram(&self) -> Vec<(i64, usize)> {
        histogram(&self.data)
    }
}

impl Canonical for ProductTensor {
    const DOMAIN: &'static [u8] = b"PRODUCT_TENSOR";

    fn write_canonical(&self, out: &mut Vec<u8>) {
        let (left, right, o) = self.shape;
        write_dense(out, &[left, right, o], &self.data);
    }
}

/// Supplier of canonical product structure constants.
pub trait ProductFormula {
    /// Structure constants for combining gradings `n` and `m`: shape
    /// `(dim_IC(n), dim_IC(m), dim_FLAG(n+m))`.
    fn product_formula(&self, n: usize, m: usize) -> Result<ProductTensor, EngineError>;
}

fn mac(acc: i64, a: i64, b: i64) -> Result<i64, EngineError> {
    a.checked_mul(b)
        .and_then(|p| acc.checked_add(p))
        .ok_or_else(|| EngineError::overflow("product change of basis"))
}

/// Re-expresses `product` through three conversion matrices.
///
/// With `product` of shape `(A, B, F)`, `left: A x I`, `right: B x J` and
/// `out: K x F`, returns the `(I, J, K)` tensor
/// `R[i][j][k] = Σ_{a,b,f} left[a,i] · right[b,j] · product[a][b][f] · out[k,f]`.
pub fn change_product_basis(
    product: &ProductTensor,
    left: &Matrix,
    right: &Matrix,
    out: &Matrix,
) -> Result<ProductTensor, EngineError> {
    let (a_dim, b_dim, f_dim) = product.shape();
    if left.rows() != a_dim {
        return Err(EngineError::shape("left leg of product", (a_dim, left.cols()), left.shape()));
    }
    if right.rows() != b_dim {
        return Err(EngineError::shape("right leg of product", (b_dim, right.cols()), right.shape()));
    }
    if out.cols() != f_dim {
        return Err(EngineError::shape("output leg of product", (out.rows(), f_dim), out.shape()));
    }
    let (i_dim, j_dim, k_dim) = (left.cols(), right.cols(), out.rows());

    // Output leg: Q[a][b][k] = Σ_f P[a][b][f] · out[k,f].
    let mut q = ProductTensor::zeros(a_dim, b_dim, k_dim);
    for a in 0..a_dim {
        for b in 0..b_dim {
            let fiber = product.fiber(a, b);
            if fiber.iter().all(|&v| v == 0) {
                continue;
            }
            for k in 0..k_dim {
                let mut acc = 0i64;
                for (&p, &o) in fiber.iter().zip(out.row(k)) {
                    if p != 0 && o != 0 {
                        acc = mac(acc, p, o)?;
                    }
                }
                q.set(a, b, k, acc);
            }
        }
    }

    // Left leg: T[i][b][k] = Σ_a left[a,i] · Q[a][b][k].
    let mut t = ProductTensor::zeros(i_dim, b_dim, k_dim);
    for a in 0..a_dim {
        for i in 0..i_dim {
            let l = left.get(a, i);
            if l == 0 {
                continue;
            }
            for b in 0..b_dim {
                for k in 0..k_dim {
                    let v = q.get(a, b, k);
                    if v != 0 {
                        let acc = mac(t.get(i, b, k), l, v)?;
                        t.set(i, b, k, acc);
                    }
                }
            }
        }
    }

    // Right leg: R[i][j][k] = Σ_b right[b,j] · T[i][b][k].
    let mut r = ProductTensor::zeros(i_dim, j_dim, k_dim);
    for b in 0..b_dim {
        for j in 0..j_dim {
            let rv = right.get(b, j);
            if rv == 0 {
                continue;
            }
            for i in 0..i_dim {
                for k in 0..k_dim {
                    let v = t.get(i, b, k);
                    if v != 0 {
                        let acc = mac(r.get(i, j, k), rv, v)?;
                        r.set(i, j, k, acc);
                    }
                }
            }
        }
    }
    Ok(r)
}
