use super::ids::{FieldId, FormulaId};
use super::sequence::Sequence;

/// A named expression owned by one form field.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub id: FormulaId,
    pub owner_field_id: FieldId,
    pub name: String,
    pub sequence: Sequence,
}

impl Formula {
    /// A new, empty formula with a fresh id.
    #[must_use]
    pub fn new(owner_field_id: impl Into<FieldId>, name: impl Into<String>) -> Self {
        Self::with_id(FormulaId::generate(), owner_field_id, name)
    }

    #[must_use]
    pub fn with_id(
        id: impl Into<FormulaId>,
        owner_field_id: impl Into<FieldId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_field_id: owner_field_id.into(),
            name: name.into(),
            sequence: Sequence::new(),
        }
    }

    /// Builder-style sequence replacement, for loading and fixtures.
    #[must_use]
    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = sequence;
        self
    }
}
