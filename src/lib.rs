//! Rankmat: exact rank-matrix exploration for graded candidate bases.
//!
//! A candidate rule assigns to every Fibonacci word of grading n an integer
//! combination of words of the same grading. This crate derives, lazily and
//! exactly, everything needed to judge such a rule:
//! - the rule's conversion matrices to and from the fixed reference bases,
//! - the letter-insertion operators `C_rule` and `D_rule` expressed in the
//!   rule basis,
//! - the product structure constants in the rule basis, and
//! - histograms and anomaly reports over all of the above.
//!
//! # Words and gradings
//!
//! Words are finite strings over `{C, D}` with `deg C = 1` and `deg D = 2`.
//! The basis `B(n)` holds the words of degree n, listed `C·B(n-1)` then
//! `D·B(n-2)`, so `|B(n)|` is the Fibonacci number `F(n+1)`.
//!
//! # Laziness
//!
//! Each derived family is a [`Graded`] sequence that materializes gradings on
//! first request, in ascending order, and caches them. Requests that would
//! recurse into a slot still being computed fail with [`EngineError::Cycle`].
//!
//! # Example
//!
//! ```
//! use rankmat::prelude::*;
//!
//! let matrices = RankMatrices::new(IdentityRule, Collaborators::concatenation());
//! for row in matrices.product_stats_table(4).unwrap() {
//!     let entries: usize = row.stats.iter().map(|(_, count)| count).sum();
//!     assert!(entries > 0);
//! }
//! assert!(matrices.anomalies(4).unwrap().is_empty());
//! ```

pub mod collaborators;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod graded;
pub mod inverse;
pub mod matrix;
pub mod product;
pub mod registry;
pub mod rule;
pub mod tables;
pub mod word;

pub use collaborators::Collaborators;
pub use config::ExplorationConfig;
pub use error::{EngineError, ErrorKind};
pub use graded::Graded;
pub use matrix::Matrix;
pub use product::ProductTensor;
pub use registry::RankMatrices;
pub use word::{FibonacciWords, Letter, Word};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::collaborators::{prefix_insertion, Collaborators, Concatenation};
    pub use crate::config::ExplorationConfig;
    pub use crate::error::{EngineError, ErrorKind};
    pub use crate::fingerprint::{Canonical, HashValue};
    pub use crate::graded::{Graded, SequenceMetrics};
    pub use crate::inverse::{inverse_of, invert_exact, InversionFailure};
    pub use crate::matrix::Matrix;
    pub use crate::product::{change_product_basis, ProductFormula, ProductTensor};
    pub use crate::registry::{Anomaly, ProductStats, RankMatrices};
    pub use crate::rule::{rule_matrix, IdentityRule, Rule, TableRule, WordCounts};
    pub use crate::tables::{FixedTables, ProductEntry};
    pub use crate::word::{BasisLayer, FibonacciWords, GradedBasis, Letter, Word};
}
