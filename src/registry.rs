//! The rank-matrix registry of one candidate rule.
//!
//! A [`RankMatrices`] derives, from one rule and a set of [`Collaborators`],
//! the closed family of conversion matrices between the rule basis (AAA), the
//! canonical basis (CD), the reference basis (CDR) and the product bases (IC
//! and FLAG):
//!
//! ```text
//! AAA_from_CDR[n]  = rule incidence matrix over B(n)
//! CDR_from_AAA[n]  = AAA_from_CDR[n]⁻¹
//! AAA_from_CD[n]   = AAA_from_CDR[n] · CDR_from_CD[n]
//! CD_from_AAA[n]   = AAA_from_CD[n]⁻¹
//! IC_from_AAA[n]   = IC_from_CDR[n] · CDR_from_AAA[n]
//! AAA_from_FLAG[n] = AAA_from_CDR[n] · CDR_from_FLAG[n]
//! C_rule[n]        = AAA_from_CD[n+1] · C_in_CD[n] · CD_from_AAA[n]
//! D_rule[n]        = AAA_from_CD[n+2] · D_in_CD[n] · CD_from_AAA[n]
//! ```
//!
//! Every member is a [`Graded<Matrix>`] that grows on demand. A rule is
//! consistent with the conjectured structure when `C_rule`, `D_rule` and
//! [`RankMatrices::doit`] contain only small nonnegative integers.
//!
//! # Example
//!
//! ```
//! use rankmat::prelude::*;
//!
//! let matrices = RankMatrices::new(IdentityRule, Collaborators::concatenation());
//! assert!(matrices.aaa_from_cdr().get(4).unwrap().is_identity());
//! assert_eq!(matrices.c_stats(0).unwrap(), vec![(1, 1)]);
//! assert_eq!(matrices.product_stats(1, 1).unwrap(), vec![(0, 1), (1, 1)]);
//! ```

use crate::collaborators::Collaborators;
use crate::config::ExplorationConfig;
use crate::error::EngineError;
use crate::graded::Graded;
use crate::inverse::inverse_of;
use crate::matrix::Matrix;
use crate::product::{change_product_basis, ProductTensor};
use crate::rule::{rule_matrix, Rule};
use crate::word::{GradedBasis, Letter};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// `left[n] · right[n]`.
fn product_of(
    name: &str,
    left: &Rc<Graded<Matrix>>,
    right: &Rc<Graded<Matrix>>,
    limit: usize,
) -> Rc<Graded<Matrix>> {
    let (left, right) = (Rc::clone(left), Rc::clone(right));
    Rc::new(Graded::new(name, move |_, n| left.get(n)?.mul(&*right.get(n)?)).with_limit(limit))
}

/// Conjugates a canonical letter-insertion operator into the rule basis.
fn lift(
    name: &'static str,
    letter: Letter,
    insertion: &Rc<Graded<Matrix>>,
    aaa_from_cd: &Rc<Graded<Matrix>>,
    cd_from_aaa: &Rc<Graded<Matrix>>,
    basis: &Rc<dyn GradedBasis>,
    limit: usize,
) -> Rc<Graded<Matrix>> {
    let insertion = Rc::clone(insertion);
    let aaa_from_cd = Rc::clone(aaa_from_cd);
    let cd_from_aaa = Rc::clone(cd_from_aaa);
    let basis = Rc::clone(basis);
    let shift = letter.degree();
    Rc::new(
        Graded::new(name, move |_, n| {
            let tmp = insertion.get(n)?.mul(&*cd_from_aaa.get(n)?)?;
            let value = aaa_from_cd.get(n + shift)?.mul(&tmp)?;
            let expected = (basis.dim(n + shift)?, basis.dim(n)?);
            if value.shape() != expected {
                return Err(EngineError::shape(format!("{}[{}]", name, n), expected, value.shape()));
            }
            Ok(value)
        })
        .with_limit(limit),
    )
}

/// Histogram of one product pair, as tabulated by [`RankMatrices::product_stats_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStats {
    /// Combined grading `n + m`.
    pub total: usize,
    /// Grading of the right factor; the left factor has `total - m`.
    pub m: usize,
    pub stats: Vec<(i64, usize)>,
}

/// An entry that is negative or larger than the configured bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// Entry `(row, col)` of `C_rule[degree]` or `D_rule[degree]`.
    Insertion {
        letter: Letter,
        degree: usize,
        row: usize,
        col: usize,
        value: i64,
    },
    /// Entry `[i][j][k]` of `doit(n, m)`.
    Product {
        n: usize,
        m: usize,
        i: usize,
        j: usize,
        k: usize,
        value: i64,
    },
}

impl Anomaly {
    pub fn value(&self) -> i64 {
        match self {
            Anomaly::Insertion { value, .. } | Anomaly::Product { value, .. } => *value,
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::Insertion {
                letter,
                degree,
                row,
                col,
                value,
            } => write!(f, "{:?}_rule[{}][{}, {}] = {}", letter, degree, row, col, value),
            Anomaly::Product {
                n,
                m,
                i,
                j,
                k,
                value,
            } => write!(f, "doit({}, {})[{}, {}, {}] = {}", n, m, i, j, k, value),
        }
    }
}

/// Conversion matrices, lifted operators and product constants of one rule.
pub struct RankMatrices {
    config: ExplorationConfig,
    collab: Collaborators,
    aaa_from_cdr: Rc<Graded<Matrix>>,
    cdr_from_aaa: Rc<Graded<Matrix>>,
    aaa_from_cd: Rc<Graded<Matrix>>,
    cd_from_aaa: Rc<Graded<Matrix>>,
    ic_from_aaa: Rc<Graded<Matrix>>,
    aaa_from_flag: Rc<Graded<Matrix>>,
    c_rule: Rc<Graded<Matrix>>,
    d_rule: Rc<Graded<Matrix>>,
}

impl RankMatrices {
    /// Registry of `rule` with the default configuration.
    pub fn new<R: Rule + 'static>(rule: R, collab: Collaborators) -> Self {
        Self::with_config(rule, collab, ExplorationConfig::default())
    }

    pub fn with_config<R: Rule + 'static>(
        rule: R,
        collab: Collaborators,
        config: ExplorationConfig,
    ) -> Self {
        let rule: Rc<dyn Rule> = Rc::new(rule);
        let basis = Rc::clone(&collab.basis);
        let aaa_from_cdr = Graded::new("AAA_from_CDR", move |_, n| {
            let layer = basis.layer(n)?;
            rule_matrix(&*rule, &layer)
        });
        Self::assemble(aaa_from_cdr, collab, config)
    }

    /// Registry over precomputed rule matrices instead of a rule.
    ///
    /// Each `rule_matrices[n]` must be square of size `|B(n)|`.
    pub fn from_rule_matrices(
        rule_matrices: Rc<Graded<Matrix>>,
        collab: Collaborators,
        config: ExplorationConfig,
    ) -> Self {
        let basis = Rc::clone(&collab.basis);
        let aaa_from_cdr = Graded::new("AAA_from_CDR", move |_, n| {
            let value = rule_matrices.get(n)?;
            let dim = basis.dim(n)?;
            let expected = (dim, dim);
            if value.shape() != expected {
                return Err(EngineError::shape(format!("AAA_from_CDR[{}]", n), expected, value.shape()));
            }
            Ok((*value).clone())
        });
        Self::assemble(aaa_from_cdr, collab, config)
    }

    fn assemble(
        aaa_from_cdr: Graded<Matrix>,
        collab: Collaborators,
        config: ExplorationConfig,
    ) -> Self {
        let limit = config.max_grading;
        let aaa_from_cdr = Rc::new(aaa_from_cdr.with_limit(limit));
        let cdr_from_aaa = Rc::new(inverse_of("CDR_from_AAA", Rc::clone(&aaa_from_cdr)).with_limit(limit));
        let aaa_from_cd = product_of("AAA_from_CD", &aaa_from_cdr, &collab.cdr_from_cd, limit);
        let cd_from_aaa = Rc::new(inverse_of("CD_from_AAA", Rc::clone(&aaa_from_cd)).with_limit(limit));
        let ic_from_aaa = product_of("IC_from_AAA", &collab.ic_from_cdr, &cdr_from_aaa, limit);
        let aaa_from_flag = product_of("AAA_from_FLAG", &aaa_from_cdr, &collab.cdr_from_flag, limit);
        let c_rule = lift(
            "C_rule",
            Letter::C,
            &collab.c_in_cd,
            &aaa_from_cd,
            &cd_from_aaa,
            &collab.basis,
            limit,
        );
        let d_rule = lift(
            "D_rule",
            Letter::D,
            &collab.d_in_cd,
            &aaa_from_cd,
            &cd_from_aaa,
            &collab.basis,
            limit,
        );
        debug!(max_grading = limit, anomaly_bound = config.anomaly_bound, "rank matrices assembled");
        Self {
            config,
            collab,
            aaa_from_cdr,
            cdr_from_aaa,
            aaa_from_cd,
            cd_from_aaa,
            ic_from_aaa,
            aaa_from_flag,
            c_rule,
            d_rule,
        }
    }

    pub fn config(&self) -> &ExplorationConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collab
    }

    pub fn basis(&self) -> &dyn GradedBasis {
        &*self.collab.basis
    }

    pub fn aaa_from_cdr(&self) -> &Graded<Matrix> {
        &self.aaa_from_cdr
    }

    pub fn cdr_from_aaa(&self) -> &Graded<Matrix> {
        &self.cdr_from_aaa
    }

    pub fn aaa_from_cd(&self) -> &Graded<Matrix> {
        &self.aaa_from_cd
    }

    pub fn cd_from_aaa(&self) -> &Graded<Matrix> {
        &self.cd_from_aaa
    }

    pub fn ic_from_aaa(&self) -> &Graded<Matrix> {
        &self.ic_from_aaa
    }

    pub fn aaa_from_flag(&self) -> &Graded<Matrix> {
        &self.aaa_from_flag
    }

    /// Insert-C operator in the rule basis, grading n → n+1.
    pub fn c_rule(&self) -> &Graded<Matrix> {
        &self.c_rule
    }

    /// Insert-D operator in the rule basis, grading n → n+2.
    pub fn d_rule(&self) -> &Graded<Matrix> {
        &self.d_rule
    }

    /// Product structure constants in the rule basis, shape
    /// `(|B(n)|, |B(m)|, |B(n+m)|)`.
    pub fn doit(&self, n: usize, m: usize) -> Result<ProductTensor, EngineError> {
        let product = self.collab.product.product_formula(n, m)?;
        let left = self.ic_from_aaa.get(n)?;
        let right = self.ic_from_aaa.get(m)?;
        let out = self.aaa_from_flag.get(n + m)?;
        change_product_basis(&product, &left, &right, &out)
    }

    /// Sorted `(value, count)` histogram of `doit(n, m)`.
    pub fn product_stats(&self, n: usize, m: usize) -> Result<Vec<(i64, usize)>, EngineError> {
        Ok(self.doit(n, m)?.histogram())
    }

    /// Histogram of `C_rule[degree]`.
    pub fn c_stats(&self, degree: usize) -> Result<Vec<(i64, usize)>, EngineError> {
        Ok(self.c_rule.get(degree)?.histogram())
    }

    /// Histogram of `D_rule[degree]`.
    pub fn d_stats(&self, degree: usize) -> Result<Vec<(i64, usize)>, EngineError> {
        Ok(self.d_rule.get(degree)?.histogram())
    }

    /// `product_stats(total - m, m)` for every `total` in `2..=max_total` and
    /// `m` in `1..total` with `2m <= total`.
    pub fn product_stats_table(&self, max_total: usize) -> Result<Vec<ProductStats>, EngineError> {
        let mut rows = Vec::new();
        for total in 2..=max_total {
            for m in (1..total).take_while(|m| 2 * m <= total) {
                rows.push(ProductStats {
                    total,
                    m,
                    stats: self.product_stats(total - m, m)?,
                });
            }
        }
        Ok(rows)
    }

    /// Entries of `C_rule[d]`, `D_rule[d]` (`d <= max_degree`) and of the
    /// products tabulated by `product_stats_table(max_degree)` that are
    /// negative or exceed `config.anomaly_bound`.
    pub fn anomalies(&self, max_degree: usize) -> Result<Vec<Anomaly>, EngineError> {
        let bound = self.config.anomaly_bound;
        let suspicious = |v: i64| v < 0 || v > bound;
        let mut found = Vec::new();

        for degree in 0..=max_degree {
            for (letter, seq) in [(Letter::C, &self.c_rule), (Letter::D, &self.d_rule)] {
                let matrix = seq.get(degree)?;
                for row in 0..matrix.rows() {
                    for (col, &value) in matrix.row(row).iter().enumerate() {
                        if suspicious(value) {
                            found.push(Anomaly::Insertion {
                                letter,
                                degree,
                                row,
                                col,
                                value,
                            });
                        }
                    }
                }
            }
        }

        for total in 2..=max_degree {
            for m in (1..total).take_while(|m| 2 * m <= total) {
                let n = total - m;
                let tensor = self.doit(n, m)?;
                let (left, right, _) = tensor.shape();
                for i in 0..left {
                    for j in 0..right {
                        for (k, &value) in tensor.fiber(i, j).iter().enumerate() {
                            if suspicious(value) {
                                found.push(Anomaly::Product {
                                    n,
                                    m,
                                    i,
                                    j,
                                    k,
                                    value,
                                });
                            }
                        }
                    }
                }
            }
        }

        if !found.is_empty() {
            warn!(count = found.len(), max_degree, "rule produced anomalous entries");
        }
        Ok(found)
    }
}

impl fmt::Debug for RankMatrices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RankMatrices")
            .field("config", &self.config)
            .field("aaa_from_cdr", &self.aaa_from_cdr)
            .field("cdr_from_aaa", &self.cdr_from_aaa)
            .field("aaa_from_cd", &self.aaa_from_cd)
            .field("cd_from_aaa", &self.cd_from_aaa)
            .field("ic_from_aaa", &self.ic_from_aaa)
            .field("aaa_from_flag", &self.aaa_from_flag)
            .field("c_rule", &self.c_rule)
            .field("d_rule", &self.d_rule)
            .finish()
    }
}
