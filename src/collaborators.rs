//! The fixed inputs a registry composes with.
//!
//! [`Collaborators`] bundles the basis supplier, the five fixed per-grading
//! matrices and the product formula. Any source works as long as it can be
//! phrased as a [`Graded<Matrix>`]: precomputed tables
//! ([`crate::tables::FixedTables`]) or generated structure such as
//! [`Collaborators::concatenation`].

use crate::error::EngineError;
use crate::graded::Graded;
use crate::matrix::Matrix;
use crate::product::{ProductFormula, ProductTensor};
use crate::word::{FibonacciWords, GradedBasis, Letter};
use std::fmt;
use std::rc::Rc;

/// Fixed canonical-basis data consumed by [`crate::registry::RankMatrices`].
#[derive(Clone)]
pub struct Collaborators {
    pub basis: Rc<dyn GradedBasis>,
    pub cdr_from_cd: Rc<Graded<Matrix>>,
    pub cdr_from_flag: Rc<Graded<Matrix>>,
    pub ic_from_cdr: Rc<Graded<Matrix>>,
    /// Insert C: grading n → n+1.
    pub c_in_cd: Rc<Graded<Matrix>>,
    /// Insert D: grading n → n+2.
    pub d_in_cd: Rc<Graded<Matrix>>,
    pub product: Rc<dyn ProductFormula>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("cdr_from_cd", &self.cdr_from_cd)
            .field("cdr_from_flag", &self.cdr_from_flag)
            .field("ic_from_cdr", &self.ic_from_cdr)
            .field("c_in_cd", &self.c_in_cd)
            .field("d_in_cd", &self.d_in_cd)
            .finish_non_exhaustive()
    }
}

impl Collaborators {
    /// Self-contained structure on [`FibonacciWords`]: every fixed conversion
    /// is the identity, letter insertion prepends the letter, and the product
    /// of two words is their concatenation.
    pub fn concatenation() -> Self {
        let basis: Rc<dyn GradedBasis> = Rc::new(FibonacciWords::new());
        let identity = |name: &str, basis: &Rc<dyn GradedBasis>| {
            let basis = Rc::clone(basis);
            Rc::new(Graded::new(name, move |_, n| Ok(Matrix::identity(basis.dim(n)?))))
        };
        Self {
            cdr_from_cd: identity("CDR_from_CD", &basis),
            cdr_from_flag: identity("CDR_from_FLAG", &basis),
            ic_from_cdr: identity("IC_from_CDR", &basis),
            c_in_cd: Rc::new(prefix_insertion("C_in_CD", Letter::C, Rc::clone(&basis))),
            d_in_cd: Rc::new(prefix_insertion("D_in_CD", Letter::D, Rc::clone(&basis))),
            product: Rc::new(Concatenation {
                basis: Rc::clone(&basis),
            }),
            basis,
        }
    }
}

/// `|B(n+k)| x |B(n)|` matrices sending word `w` to `letter·w`.
pub fn prefix_insertion(name: &str, letter: Letter, basis: Rc<dyn GradedBasis>) -> Graded<Matrix> {
    Graded::new(name, move |_, n| {
        let source = basis.layer(n)?;
        let target = basis.layer(n + letter.degree())?;
        let mut matrix = Matrix::zeros(target.len(), source.len());
        for (j, word) in source.words().iter().enumerate() {
            let image = word.prefixed(letter);
            let i = target.index_of(&image).ok_or_else(|| EngineError::ForeignWord {
                grading: target.grading(),
                input: word.clone(),
                output: image.clone(),
            })?;
            matrix.set(i, j, 1);
        }
        Ok(matrix)
    })
}

/// Word concatenation as a product formula.
pub struct Concatenation {
    basis: Rc<dyn GradedBasis>,
}

impl Concatenation {
    pub fn new(basis: Rc<dyn GradedBasis>) -> Self {
        Self { basis }
    }
}

impl ProductFormula for Concatenation {
    fn product_formula(&self, n: usize, m: usize) -> Result<ProductTensor, EngineError> {
        let left = self.basis.layer(n)?;
        let right = self.basis.layer(m)?;
        let out = self.basis.layer(n + m)?;
        let mut tensor = ProductTensor::zeros(left.len(), right.len(), out.len());
        for (i, u) in left.words().iter().enumerate() {
            for (j, v) in right.words().iter().enumerate() {
                let uv = u.concat(v);
                let k = out.index_of(&uv).ok_or_else(|| EngineError::ForeignWord {
                    grading: n + m,
                    input: u.clone(),
                    output: uv.clone(),
                })?;
                tensor.set(i, j, k, 1);
            }
        }
        Ok(tensor)
    }
}
