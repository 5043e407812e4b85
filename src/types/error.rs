use thiserror::Error;

use super::ids::{FieldId, FormulaId, TokenId};

/// A pick could not be turned into a token. Nothing is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error("{kind} pick is missing its {field}")]
    MissingPayload {
        kind: &'static str,
        field: &'static str,
    },

    #[error("unknown operator '{symbol}'")]
    UnknownOperator { symbol: String },

    #[error("field '{field_id}' is not an advanced-select field")]
    NotAdvancedSelect { field_id: FieldId },

    #[error("invalid literal '{literal}': numbers must be finite")]
    InvalidLiteral { literal: String },
}

/// A mutation was rejected. The tree it was applied to is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("cannot bind switch to '{field_id}': not an advanced-select field")]
    InvalidBinding { field_id: FieldId },

    #[error("switch has no bound field")]
    SwitchUnbound,

    #[error("duplicate case value '{value}'")]
    DuplicateCase { value: String },

    #[error("no case with value '{value}'")]
    UnknownCase { value: String },

    #[error("cyclic formula reference: {}", join_ids(path))]
    CyclicReference { path: Vec<FormulaId> },

    #[error("unknown formula '{id}'")]
    UnknownFormula { id: FormulaId },

    #[error("invalid path: no nested sequence at index {index} (depth {depth})")]
    InvalidPath { depth: usize, index: usize },

    #[error("no token with id '{id}'")]
    UnknownToken { id: TokenId },

    #[error("token at index {index} is not a {expected} node")]
    WrongNodeKind { index: usize, expected: &'static str },

    #[error("token at index {index} is not a formula reference")]
    NotAFormulaRef { index: usize },
}

/// A set of formulas could not be loaded into a field scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("formula '{formula_id}' belongs to field '{owner}', not '{expected}'")]
    ForeignOwner {
        formula_id: FormulaId,
        owner: FieldId,
        expected: FieldId,
    },

    #[error("duplicate formula id '{id}'")]
    DuplicateFormula { id: FormulaId },

    #[error("stored formulas reference each other cyclically: {}", join_ids(path))]
    CyclicReferences { path: Vec<FormulaId> },
}

fn join_ids(path: &[FormulaId]) -> String {
    path.iter()
        .map(FormulaId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
