//! Precomputed collaborator tables and their CBOR persistence.
//!
//! Reference conversion matrices and product tensors are usually produced by a
//! separate computation. [`FixedTables`] stores them per grading, validates the
//! format on load, and turns them into [`Collaborators`] for a registry.

use crate::collaborators::Collaborators;
use crate::error::EngineError;
use crate::fingerprint::{Canonical, HashValue};
use crate::graded::Graded;
use crate::matrix::Matrix;
use crate::product::{ProductFormula, ProductTensor};
use crate::word::GradedBasis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

/// Table file format version (incremented on breaking changes).
const TABLES_FORMAT_VERSION: u32 = 1;

/// Schema descriptor of the serialized layout.
///
///!audit Must change whenever a serialized field of `FixedTables`,
///!audit `ProductEntry`, `Matrix` or `ProductTensor` changes.
const SCHEMA_DESCRIPTOR: &str = "\
    FixedTables:struct(format_version:u32,schema_hash:HashValue,cdr_from_cd:Vec<Matrix>,cdr_from_flag:Vec<Matrix>,ic_from_cdr:Vec<Matrix>,c_in_cd:Vec<Matrix>,d_in_cd:Vec<Matrix>,products:Vec<ProductEntry>)\
    ProductEntry:struct(n:usize,m:usize,tensor:ProductTensor)\
    Matrix:struct(rows:usize,cols:usize,data:Vec<i64>)\
    ProductTensor:struct(shape:(usize,usize,usize),data:Vec<i64>)\
    HashValue:struct(0:[u8;32])";

fn schema_hash() -> HashValue {
    HashValue::hash_with_domain(b"TABLES_SCHEMA", SCHEMA_DESCRIPTOR.as_bytes())
}

/// Product structure constants for one pair of gradings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEntry {
    pub n: usize,
    pub m: usize,
    pub tensor: ProductTensor,
}

/// Fixed matrices indexed by grading (position = grading) and product tensors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedTables {
    format_version: u32,
    schema_hash: HashValue,
    pub cdr_from_cd: Vec<Matrix>,
    pub cdr_from_flag: Vec<Matrix>,
    pub ic_from_cdr: Vec<Matrix>,
    pub c_in_cd: Vec<Matrix>,
    pub d_in_cd: Vec<Matrix>,
    pub products: Vec<ProductEntry>,
}

impl Default for FixedTables {
    fn default() -> Self {
        Self {
            format_version: TABLES_FORMAT_VERSION,
            schema_hash: schema_hash(),
            cdr_from_cd: Vec::new(),
            cdr_from_flag: Vec::new(),
            ic_from_cdr: Vec::new(),
            c_in_cd: Vec::new(),
            d_in_cd: Vec::new(),
            products: Vec::new(),
        }
    }
}

impl FixedTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materializes gradings `0..=max_grading` of every fixed sequence in
    /// `collab`, and the products of all pairs with `n + m <= max_grading`.
    pub fn capture(collab: &Collaborators, max_grading: usize) -> Result<Self, EngineError> {
        fn take(seq: &Graded<Matrix>, top: usize) -> Result<Vec<Matrix>, EngineError> {
            (0..=top).map(|n| seq.get(n).map(|m| (*m).clone())).collect()
        }
        let mut tables = Self::new();
        tables.cdr_from_cd = take(&collab.cdr_from_cd, max_grading)?;
        tables.cdr_from_flag = take(&collab.cdr_from_flag, max_grading)?;
        tables.ic_from_cdr = take(&collab.ic_from_cdr, max_grading)?;
        tables.c_in_cd = take(&collab.c_in_cd, max_grading.saturating_sub(1))?;
        tables.d_in_cd = take(&collab.d_in_cd, max_grading.saturating_sub(2))?;
        for total in 0..=max_grading {
            for n in 0..=total {
                let m = total - n;
                tables.products.push(ProductEntry {
                    n,
                    m,
                    tensor: collab.product.product_formula(n, m)?,
                });
            }
        }
        Ok(tables)
    }

    /// Looks up the product tensor for `(n, m)`.
    pub fn product(&self, n: usize, m: usize) -> Option<&ProductTensor> {
        self.products
            .iter()
            .find(|entry| entry.n == n && entry.m == m)
            .map(|entry| &entry.tensor)
    }

    /// Fingerprint over every matrix and tensor, for comparing table files.
    pub fn fingerprint(&self) -> HashValue {
        let mut out = Vec::new();
        for seq in [
            &self.cdr_from_cd,
            &self.cdr_from_flag,
            &self.ic_from_cdr,
            &self.c_in_cd,
            &self.d_in_cd,
        ] {
            out.extend_from_slice(&(seq.len() as u64).to_le_bytes());
            for m in seq {
                m.write_canonical(&mut out);
            }
        }
        let products: BTreeMap<(usize, usize), &ProductTensor> = self
            .products
            .iter()
            .map(|entry| ((entry.n, entry.m), &entry.tensor))
            .collect();
        for ((n, m), tensor) in products {
            out.extend_from_slice(&(n as u64).to_le_bytes());
            out.extend_from_slice(&(m as u64).to_le_bytes());
            tensor.write_canonical(&mut out);
        }
        HashValue::hash_with_domain(b"FIXED_TABLES", &out)
    }

    /// Wraps the tables as collaborators over `basis`.
    pub fn into_collaborators(self, basis: Rc<dyn GradedBasis>) -> Collaborators {
        let FixedTables {
            cdr_from_cd,
            cdr_from_flag,
            ic_from_cdr,
            c_in_cd,
            d_in_cd,
            products,
            ..
        } = self;
        Collaborators {
            basis,
            cdr_from_cd: Rc::new(Graded::from_values("CDR_from_CD", cdr_from_cd)),
            cdr_from_flag: Rc::new(Graded::from_values("CDR_from_FLAG", cdr_from_flag)),
            ic_from_cdr: Rc::new(Graded::from_values("IC_from_CDR", ic_from_cdr)),
            c_in_cd: Rc::new(Graded::from_values("C_in_CD", c_in_cd)),
            d_in_cd: Rc::new(Graded::from_values("D_in_CD", d_in_cd)),
            product: Rc::new(TabulatedProduct {
                entries: products
                    .into_iter()
                    .map(|entry| ((entry.n, entry.m), entry.tensor))
                    .collect(),
            }),
        }
    }

    /// Serializes the tables to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let bytes = serde_cbor::to_vec(self)?;
        Ok(bytes)
    }

    /// Deserializes tables from CBOR bytes, rejecting other format versions
    /// and schemas.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        let tables: Self = serde_cbor::from_slice(bytes)?;

        if tables.format_version != TABLES_FORMAT_VERSION {
            return Err(format!(
                "Table format version mismatch: loaded {}, current {}. \
                 Regenerate the table file.",
                tables.format_version, TABLES_FORMAT_VERSION
            )
            .into());
        }

        if tables.schema_hash != schema_hash() {
            return Err(format!(
                "Schema hash mismatch: table file is incompatible with this build. \
                 (loaded {}, expected {})",
                tables.schema_hash,
                schema_hash()
            )
            .into());
        }

        Ok(tables)
    }

    /// Saves the tables to a file.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
        let bytes = self.to_cbor()?;
        std::fs::write(path, &bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "saved fixed tables");
        Ok(())
    }

    /// Loads tables from a file.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let bytes = std::fs::read(path)?;
        let tables = Self::from_cbor(&bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "loaded fixed tables");
        Ok(tables)
    }
}

/// Product formula served from a finite table.
struct TabulatedProduct {
    entries: BTreeMap<(usize, usize), ProductTensor>,
}

impl ProductFormula for TabulatedProduct {
    fn product_formula(&self, n: usize, m: usize) -> Result<ProductTensor, EngineError> {
        self.entries
            .get(&(n, m))
            .cloned()
            .ok_or_else(|| EngineError::Unavailable {
                sequence: format!("product_formula(_, {})", m),
                grading: n,
                available: self
                    .entries
                    .keys()
                    .filter(|(_, mm)| *mm == m)
                    .map(|(nn, _)| nn + 1)
                    .max()
                    .unwrap_or(0),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::word::FibonacciWords;

    #[test]
    fn capture_then_reload_from_disk() {
        let collab = Collaborators::concatenation();
        let tables = FixedTables::capture(&collab, 5).unwrap();
        assert_eq!(tables.cdr_from_cd.len(), 6);
        assert_eq!(tables.c_in_cd.len(), 5);
        assert_eq!(tables.d_in_cd.len(), 4);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.cbor");
        tables.save_to_file(&path).unwrap();
        let loaded = FixedTables::load_from_file(&path).unwrap();
        assert_eq!(loaded, tables);
        assert_eq!(loaded.fingerprint(), tables.fingerprint());
    }

    #[test]
    fn rejects_other_format_version() {
        let mut tables = FixedTables::new();
        tables.format_version = TABLES_FORMAT_VERSION + 1;
        let bytes = tables.to_cbor().unwrap();
        let err = FixedTables::from_cbor(&bytes).unwrap_err();
        assert!(err.to_string().contains("format version mismatch"));
    }

    #[test]
    fn rejects_other_schema() {
        let mut tables = FixedTables::new();
        tables.schema_hash = HashValue::zero();
        let bytes = tables.to_cbor().unwrap();
        assert!(FixedTables::from_cbor(&bytes).is_err());
    }

    #[test]
    fn tabulated_collaborators_run_out() {
        let tables = FixedTables::capture(&Collaborators::concatenation(), 3).unwrap();
        let reference = tables.product(1, 2).cloned().unwrap();
        let collab = tables.into_collaborators(Rc::new(FibonacciWords::new()));
        assert_eq!(collab.product.product_formula(1, 2).unwrap(), reference);
        assert_eq!(collab.cdr_from_cd.get(4).unwrap_err().kind(), ErrorKind::Unavailable);
        assert_eq!(
            collab.product.product_formula(3, 1).unwrap_err().kind(),
            ErrorKind::Unavailable
        );
    }

    #[test]
    fn missing_product_reports_left_grading_bound() {
        // Captured up to total 3: with m = 1 the left grading covers 0..=2.
        let tables = FixedTables::capture(&Collaborators::concatenation(), 3).unwrap();
        let collab = tables.into_collaborators(Rc::new(FibonacciWords::new()));
        let err = collab.product.product_formula(3, 1).unwrap_err();
        assert_eq!(
            err,
            EngineError::Unavailable {
                sequence: "product_formula(_, 1)".to_string(),
                grading: 3,
                available: 3,
            }
        );
        assert!(err.to_string().contains("0..3"));

        let err = collab.product.product_formula(0, 7).unwrap_err();
        assert!(matches!(err, EngineError::Unavailable { available: 0, .. }));
    }
}
