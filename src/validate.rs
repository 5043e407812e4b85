//! Well-formedness of a sequence.
//!
//! Incomplete sequences are an ordinary editing state, so the result is a
//! report rather than an error.

use std::fmt;

use crate::types::Sequence;

/// Why a sequence is not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Issue {
    Empty,
    /// Alternation holds but there are fewer than three tokens.
    TooShort { len: usize },
    /// A non-value token sits at an even index.
    ExpectedValue { index: usize },
    /// A non-operator token sits at an odd index.
    ExpectedOperator { index: usize },
    /// The last token is an operator.
    DanglingOperator { index: usize },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::Empty => f.write_str("expression is empty"),
            Issue::TooShort { len } => {
                write!(f, "expression needs at least 3 elements, has {len}")
            }
            Issue::ExpectedValue { index } => write!(f, "expected a value at position {index}"),
            Issue::ExpectedOperator { index } => {
                write!(f, "expected an operator at position {index}")
            }
            Issue::DanglingOperator { index } => {
                write!(f, "expression ends on an operator at position {index}")
            }
        }
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validation {
    pub complete: bool,
    pub issue: Option<Issue>,
}

impl Validation {
    const COMPLETE: Validation = Validation {
        complete: true,
        issue: None,
    };

    fn incomplete(issue: Issue) -> Self {
        Self {
            complete: false,
            issue: Some(issue),
        }
    }
}

/// Check value/operator alternation.
///
/// A sequence starting with a function token is complete regardless of what
/// follows. Otherwise even positions must be value-like, odd positions
/// operators, the last token value-like, and the length at least 3.
#[must_use]
pub fn validate(sequence: &Sequence) -> Validation {
    let Some(first) = sequence.first() else {
        return Validation::incomplete(Issue::Empty);
    };
    if first.is_function() {
        return Validation::COMPLETE;
    }

    for (index, token) in sequence.iter().enumerate() {
        if index % 2 == 0 {
            if !token.is_value_like() {
                return Validation::incomplete(Issue::ExpectedValue { index });
            }
        } else if !token.is_operator() {
            return Validation::incomplete(Issue::ExpectedOperator { index });
        }
    }

    let len = sequence.len();
    if len % 2 == 0 {
        return Validation::incomplete(Issue::DanglingOperator { index: len - 1 });
    }
    if len < 3 {
        return Validation::incomplete(Issue::TooShort { len });
    }
    Validation::COMPLETE
}

/// Shorthand for `validate(sequence).complete`.
#[must_use]
pub fn is_complete(sequence: &Sequence) -> bool {
    validate(sequence).complete
}
