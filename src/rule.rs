//! Candidate rules and the incidence matrices they define.
//!
//! A rule maps each basis word of grading `n` to a multiset of basis words of
//! the same grading. Column `j` of the rule matrix is the image of word `j`:
//! entry `(i, j)` counts how often word `i` occurs in it.

use crate::error::EngineError;
use crate::matrix::Matrix;
use crate::word::{BasisLayer, Word};
use std::collections::{BTreeMap, HashMap};

/// Multiset of words: word → multiplicity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordCounts(BTreeMap<Word, u64>);

impl WordCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// The multiset `{word}`.
    pub fn single(word: Word) -> Self {
        let mut counts = Self::new();
        counts.push(word);
        counts
    }

    /// Adds one occurrence of `word`.
    pub fn push(&mut self, word: Word) {
        self.add(word, 1);
    }

    pub fn add(&mut self, word: Word, count: u64) {
        if count > 0 {
            *self.0.entry(word).or_insert(0) += count;
        }
    }

    pub fn count(&self, word: &Word) -> u64 {
        self.0.get(word).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Word, u64)> {
        self.0.iter().map(|(w, &c)| (w, c))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Word> for WordCounts {
    fn from_iter<I: IntoIterator<Item = Word>>(iter: I) -> Self {
        let mut counts = Self::new();
        for word in iter {
            counts.push(word);
        }
        counts
    }
}

/// A candidate insertion rule.
///
/// Must be pure: the same word always yields the same multiset, and only
/// words of the input's grading.
pub trait Rule {
    fn apply(&self, word: &Word) -> WordCounts;
}

impl<F> Rule for F
where
    F: Fn(&Word) -> WordCounts,
{
    fn apply(&self, word: &Word) -> WordCounts {
        self(word)
    }
}

/// Maps every word to itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityRule;

impl Rule for IdentityRule {
    fn apply(&self, word: &Word) -> WordCounts {
        WordCounts::single(word.clone())
    }
}

/// A rule given by an explicit table; unlisted words map to themselves.
#[derive(Debug, Clone, Default)]
pub struct TableRule {
    images: HashMap<Word, WordCounts>,
}

impl TableRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the image of `word`, replacing any earlier entry.
    pub fn with(mut self, word: Word, image: WordCounts) -> Self {
        self.images.insert(word, image);
        self
    }
}

impl Rule for TableRule {
    fn apply(&self, word: &Word) -> WordCounts {
        self.images
            .get(word)
            .cloned()
            .unwrap_or_else(|| WordCounts::single(word.clone()))
    }
}

/// Builds the `|B(n)| x |B(n)|` incidence matrix of `rule` over `layer`.
pub fn rule_matrix<R: Rule + ?Sized>(rule: &R, layer: &BasisLayer) -> Result<Matrix, EngineError> {
    let dim = layer.len();
    let mut matrix = Matrix::zeros(dim, dim);
    for (j, input) in layer.words().iter().enumerate() {
        for (output, count) in rule.apply(input).iter() {
            let i = layer.index_of(output).ok_or_else(|| EngineError::ForeignWord {
                grading: layer.grading(),
                input: input.clone(),
                output: output.clone(),
            })?;
            let count = i64::try_from(count)
                .map_err(|_| EngineError::overflow(format!("multiplicity of '{}'", output)))?;
            matrix.add_at(i, j, count)?;
        }
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::word::{FibonacciWords, GradedBasis};

    fn w(s: &str) -> Word {
        s.parse().unwrap()
    }

    #[test]
    fn identity_rule_gives_identity() {
        let basis = FibonacciWords::new();
        for n in 0..8 {
            let layer = basis.layer(n).unwrap();
            assert!(rule_matrix(&IdentityRule, &layer).unwrap().is_identity());
        }
    }

    #[test]
    fn columns_are_images() {
        let basis = FibonacciWords::new();
        let layer = basis.layer(3).unwrap(); // CCC, CD, DC
        let rule = TableRule::new().with(w("CD"), [w("CD"), w("DC")].into_iter().collect());
        let matrix = rule_matrix(&rule, &layer).unwrap();
        let expected = Matrix::from_rows(vec![vec![1, 0, 0], vec![0, 1, 0], vec![0, 1, 1]]).unwrap();
        assert_eq!(matrix, expected);
    }

    #[test]
    fn repeated_output_counts_twice() {
        let basis = FibonacciWords::new();
        let layer = basis.layer(2).unwrap(); // CC, D
        let doubled = |word: &Word| -> WordCounts {
            if word.to_string() == "D" {
                [w("CC"), w("CC"), w("D")].into_iter().collect()
            } else {
                WordCounts::single(word.clone())
            }
        };
        let matrix = rule_matrix(&doubled, &layer).unwrap();
        assert_eq!(matrix.get(0, 1), 2);
        assert_eq!(matrix.get(1, 1), 1);
    }

    #[test]
    fn foreign_word_is_rejected() {
        let basis = FibonacciWords::new();
        let layer = basis.layer(2).unwrap();
        let escaping = |word: &Word| WordCounts::single(word.prefixed(crate::word::Letter::C));
        let err = rule_matrix(&escaping, &layer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
        assert_eq!(
            err,
            EngineError::ForeignWord {
                grading: 2,
                input: w("CC"),
                output: w("CCC")
            }
        );
    }

    #[test]
    fn word_counts_accumulate() {
        let mut counts = WordCounts::new();
        counts.push(w("CD"));
        counts.add(w("CD"), 2);
        counts.add(w("DC"), 0);
        assert_eq!(counts.count(&w("CD")), 3);
        assert_eq!(counts.len(), 1);
    }
}
