//! Words over {C, D} and the graded bases they label.
//!
//! `C` has degree 1 and `D` has degree 2, so the words of degree `n` number
//! `F(n+1)` (Fibonacci). A [`BasisLayer`] is one grading's ordered word list
//! together with a hash index; [`FibonacciWords`] enumerates all layers lazily.

use crate::error::EngineError;
use crate::graded::Graded;
use crate::matrix::Matrix;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// A letter of the alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Letter {
    C,
    D,
}

impl Letter {
    /// Degree contributed by this letter.
    #[inline]
    pub const fn degree(self) -> usize {
        match self {
            Letter::C => 1,
            Letter::D => 2,
        }
    }

    fn as_char(self) -> char {
        match self {
            Letter::C => 'C',
            Letter::D => 'D',
        }
    }
}

/// A word over {C, D}. Ordering is lexicographic with `C < D`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Word(Vec<Letter>);

impl Word {
    /// The empty word, the single basis word of grading 0.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn from_letters(letters: Vec<Letter>) -> Self {
        Self(letters)
    }

    pub fn letters(&self) -> &[Letter] {
        &self.0
    }

    /// Sum of letter degrees.
    pub fn degree(&self) -> usize {
        self.0.iter().map(|l| l.degree()).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `letter` followed by this word.
    pub fn prefixed(&self, letter: Letter) -> Self {
        let mut letters = Vec::with_capacity(self.0.len() + 1);
        letters.push(letter);
        letters.extend_from_slice(&self.0);
        Self(letters)
    }

    /// Returns this word followed by `other`.
    pub fn concat(&self, other: &Word) -> Self {
        let mut letters = self.0.clone();
        letters.extend_from_slice(&other.0);
        Self(letters)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for letter in &self.0 {
            write!(f, "{}", letter.as_char())?;
        }
        Ok(())
    }
}

/// Error returned when parsing a word containing a letter other than C or D.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWordError {
    pub position: usize,
    pub found: char,
}

impl fmt::Display for ParseWordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unexpected letter '{}' at position {} (expected C or D)",
            self.found, self.position
        )
    }
}

impl std::error::Error for ParseWordError {}

impl FromStr for Word {
    type Err = ParseWordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .enumerate()
            .map(|(position, c)| match c {
                'C' => Ok(Letter::C),
                'D' => Ok(Letter::D),
                found => Err(ParseWordError { position, found }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Word)
    }
}

/// The ordered basis words of one grading with an O(1) word → position index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasisLayer {
    grading: usize,
    words: Vec<Word>,
    index: HashMap<Word, usize>,
}

impl BasisLayer {
    /// Builds a layer, rejecting duplicate words.
    pub fn new(grading: usize, words: Vec<Word>) -> Result<Self, EngineError> {
        let mut index = HashMap::with_capacity(words.len());
        for (i, word) in words.iter().enumerate() {
            if index.insert(word.clone(), i).is_some() {
                return Err(EngineError::DuplicateWord {
                    grading,
                    word: word.clone(),
                });
            }
        }
        Ok(Self {
            grading,
            words,
            index,
        })
    }

    pub fn grading(&self) -> usize {
        self.grading
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn word(&self, i: usize) -> Option<&Word> {
        self.words.get(i)
    }

    /// Position of `word` in this layer, if it belongs to it.
    pub fn index_of(&self, word: &Word) -> Option<usize> {
        self.index.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Supplier of the basis word set `B(n)` for every grading.
///
/// Layers must be stable across calls: the same grading always yields the
/// same words in the same order.
pub trait GradedBasis {
    fn layer(&self, n: usize) -> Result<Rc<BasisLayer>, EngineError>;

    /// `|B(n)|`.
    fn dim(&self, n: usize) -> Result<usize, EngineError> {
        Ok(self.layer(n)?.len())
    }

    /// All-zero matrix of shape `|B(n)| x |B(m)|`.
    fn zeros(&self, n: usize, m: usize) -> Result<Matrix, EngineError> {
        Ok(Matrix::zeros(self.dim(n)?, self.dim(m)?))
    }
}

/// Every {C, D} word of degree `n`, ordered as `C·B(n-1)` then `D·B(n-2)`.
pub struct FibonacciWords {
    layers: Graded<BasisLayer>,
}

impl FibonacciWords {
    pub fn new() -> Self {
        let layers = Graded::new("FIB_WORDS", |layers: &Graded<BasisLayer>, n| {
            let words = match n {
                0 => vec![Word::empty()],
                1 => vec![Word::from_letters(vec![Letter::C])],
                _ => {
                    let after_c = layers.get(n - 1)?;
                    let after_d = layers.get(n - 2)?;
                    after_c
                        .words()
                        .iter()
                        .map(|w| w.prefixed(Letter::C))
                        .chain(after_d.words().iter().map(|w| w.prefixed(Letter::D)))
                        .collect()
                }
            };
            BasisLayer::new(n, words)
        });
        Self { layers }
    }
}

impl Default for FibonacciWords {
    fn default() -> Self {
        Self::new()
    }
}

impl GradedBasis for FibonacciWords {
    fn layer(&self, n: usize) -> Result<Rc<BasisLayer>, EngineError> {
        self.layers.get(n)
    }
}
