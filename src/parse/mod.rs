//! Text notation for sequences.
//!
//! ```text
//! {price} * 1.21
//! [{qty} > 10 ? @{bulk_price} : {unit_price}] * {qty}
//! {roof}.extra + 2
//! ```
//!
//! `{id}` is a field, `{id}.selection|extra|nodeId` an advanced-select
//! accessor, `@{id}` a formula reference and a bare identifier a function.
//! Within braces a backslash escapes `}` or another backslash.
//! `[expr ? then : else]` is a condition; a trailing `!ignore` selects
//! [`FalsePolicy::Ignore`](crate::FalsePolicy::Ignore). Switch nodes have no
//! textual form. Labels of parsed tokens default to their ids.

mod error;
mod grammar;

pub use error::ParseError;

use crate::types::Sequence;

/// Parse notation into a [`Sequence`] of fresh tokens.
///
/// # Errors
///
/// Returns [`ParseError`] with the offset where the input stops being valid
/// notation.
pub fn parse(input: &str) -> Result<Sequence, ParseError> {
    use winnow::Parser;
    grammar::parse_sequence
        .parse(input)
        .map_err(|e| ParseError::at(e.offset(), e.inner().to_string()))
}
