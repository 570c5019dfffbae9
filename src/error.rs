//! Error types for the graded basis-algebra engine.
//!
//! Every failure is a mathematical inconsistency the exploration is meant to
//! surface, so errors carry enough context (sequence name, grading, position)
//! to locate the offending rule or table without re-running anything.

use crate::word::Word;

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// A sequence generator transitively required its own slot.
    Cycle,
    /// Inversion of a rank-deficient matrix.
    SingularMatrix,
    /// A value that must be an exact integer is not.
    Precision,
    /// Shapes or basis membership do not line up.
    DimensionMismatch,
    /// Integer arithmetic left the `i64` range.
    Arithmetic,
    /// The requested grading cannot be produced.
    Unavailable,
}

/// Error returned by every fallible engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Materializing `sequence[grading]` required `sequence[grading]` again.
    Cycle {
        /// Name of the sequence whose slot is already in progress.
        sequence: String,
        /// Grading of that slot.
        grading: usize,
        /// In-flight materializations, outermost first.
        path: Vec<(String, usize)>,
    },
    /// The matrix at `grading` has rank `rank < dim`.
    SingularMatrix {
        sequence: String,
        grading: usize,
        rank: usize,
        dim: usize,
    },
    /// An inverse entry is a proper fraction.
    Precision {
        sequence: String,
        grading: usize,
        row: usize,
        col: usize,
        /// The offending exact value, e.g. `"1/2"`.
        value: String,
    },
    /// Two operands (or an operand and the basis) have incompatible shapes.
    DimensionMismatch {
        context: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// A rule produced a word that is not in the basis of its grading.
    ForeignWord {
        grading: usize,
        input: Word,
        output: Word,
    },
    /// A basis layer lists the same word twice.
    DuplicateWord { grading: usize, word: Word },
    /// Checked integer arithmetic overflowed.
    Overflow { context: String },
    /// The grading is above the configured limit of the sequence.
    GradingLimit {
        sequence: String,
        grading: usize,
        limit: usize,
    },
    /// A finite table has no entry at this grading.
    Unavailable {
        sequence: String,
        grading: usize,
        available: usize,
    },
}

impl EngineError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Cycle { .. } => ErrorKind::Cycle,
            EngineError::SingularMatrix { .. } => ErrorKind::SingularMatrix,
            EngineError::Precision { .. } => ErrorKind::Precision,
            EngineError::DimensionMismatch { .. }
            | EngineError::ForeignWord { .. }
            | EngineError::DuplicateWord { .. } => ErrorKind::DimensionMismatch,
            EngineError::Overflow { .. } => ErrorKind::Arithmetic,
            EngineError::GradingLimit { .. } | EngineError::Unavailable { .. } => {
                ErrorKind::Unavailable
            }
        }
    }

    /// Builds a `DimensionMismatch` for a binary operation.
    pub(crate) fn shape(
        context: impl Into<String>,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        EngineError::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    pub(crate) fn overflow(context: impl Into<String>) -> Self {
        EngineError::Overflow {
            context: context.into(),
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Cycle {
                sequence,
                grading,
                path,
            } => {
                write!(f, "cycle detected at {}[{}]", sequence, grading)?;
                if !path.is_empty() {
                    write!(f, " via ")?;
                    for (i, (name, n)) in path.iter().enumerate() {
                        if i > 0 {
                            write!(f, " -> ")?;
                        }
                        write!(f, "{}[{}]", name, n)?;
                    }
                }
                Ok(())
            }
            EngineError::SingularMatrix {
                sequence,
                grading,
                rank,
                dim,
            } => write!(
                f,
                "{}[{}] is singular (rank {} of {})",
                sequence, grading, rank, dim
            ),
            EngineError::Precision {
                sequence,
                grading,
                row,
                col,
                value,
            } => write!(
                f,
                "{}[{}] entry ({}, {}) is {}, expected an integer",
                sequence, grading, row, col, value
            ),
            EngineError::DimensionMismatch {
                context,
                expected,
                actual,
            } => write!(
                f,
                "dimension mismatch in {}: expected {}x{}, found {}x{}",
                context, expected.0, expected.1, actual.0, actual.1
            ),
            EngineError::ForeignWord {
                grading,
                input,
                output,
            } => write!(
                f,
                "rule maps '{}' to '{}', which is not a basis word of grading {}",
                input, output, grading
            ),
            EngineError::DuplicateWord { grading, word } => {
                write!(f, "basis of grading {} lists '{}' twice", grading, word)
            }
            EngineError::Overflow { context } => {
                write!(f, "integer overflow in {}", context)
            }
            EngineError::GradingLimit {
                sequence,
                grading,
                limit,
            } => write!(
                f,
                "{}[{}] is above the grading limit {}",
                sequence, grading, limit
            ),
            EngineError::Unavailable {
                sequence,
                grading,
                available,
            } => write!(
                f,
                "{}[{}] is not available (table holds gradings 0..{})",
                sequence, grading, available
            ),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_word_is_a_dimension_mismatch() {
        let err = EngineError::ForeignWord {
            grading: 2,
            input: "CC".parse().unwrap(),
            output: "CCC".parse().unwrap(),
        };
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
        assert_eq!(
            err.to_string(),
            "rule maps 'CC' to 'CCC', which is not a basis word of grading 2"
        );
    }

    #[test]
    fn cycle_message_lists_path() {
        let err = EngineError::Cycle {
            sequence: "S".to_string(),
            grading: 3,
            path: vec![("S".to_string(), 3), ("T".to_string(), 4)],
        };
        assert_eq!(err.to_string(), "cycle detected at S[3] via S[3] -> T[4]");
        assert_eq!(err.kind(), ErrorKind::Cycle);
    }
}
