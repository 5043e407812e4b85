//! Turning a palette or explorer pick into a token.

use tracing::debug;

use crate::types::{
    ConditionNode, ConstructionError, FieldCatalog, FieldId, FormulaId, Operator, Part,
    SwitchNode, Token, TokenKind, Value,
};

/// What the user picked, with whatever payload the source supplied.
///
/// Payloads are optional because picks come from loosely shaped UI events;
/// [`build_token`] decides what is required. Empty strings count as missing.
#[derive(Debug, Clone, PartialEq)]
pub enum Pick {
    Field {
        field_id: Option<FieldId>,
    },
    Value {
        value: Option<Value>,
        label: Option<String>,
    },
    Operator {
        symbol: Option<String>,
    },
    /// `name` may be a palette signature such as `IF(condition, then, else)`.
    Function {
        name: Option<String>,
    },
    FormulaRef {
        formula_id: Option<FormulaId>,
        label: Option<String>,
    },
    AdvPart {
        field_id: Option<FieldId>,
        part: Option<Part>,
    },
    Cond,
    Switch,
}

impl Pick {
    #[must_use]
    pub fn field(id: impl Into<FieldId>) -> Self {
        Pick::Field {
            field_id: Some(id.into()),
        }
    }

    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Pick::Value {
            value: Some(value.into()),
            label: None,
        }
    }

    #[must_use]
    pub fn operator(symbol: impl Into<String>) -> Self {
        Pick::Operator {
            symbol: Some(symbol.into()),
        }
    }

    #[must_use]
    pub fn function(name: impl Into<String>) -> Self {
        Pick::Function {
            name: Some(name.into()),
        }
    }

    #[must_use]
    pub fn formula_ref(id: impl Into<FormulaId>, label: impl Into<String>) -> Self {
        Pick::FormulaRef {
            formula_id: Some(id.into()),
            label: Some(label.into()),
        }
    }

    #[must_use]
    pub fn adv_part(field_id: impl Into<FieldId>, part: Part) -> Self {
        Pick::AdvPart {
            field_id: Some(field_id.into()),
            part: Some(part),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Pick::Field { .. } => "field",
            Pick::Value { .. } => "value",
            Pick::Operator { .. } => "operator",
            Pick::Function { .. } => "function",
            Pick::FormulaRef { .. } => "formula_ref",
            Pick::AdvPart { .. } => "adv_part",
            Pick::Cond => "cond",
            Pick::Switch => "switch",
        }
    }
}

/// Build exactly one token with a fresh id from `pick`.
///
/// Labels come from the catalog where there is one, otherwise from the id.
pub fn build_token(pick: &Pick, catalog: &impl FieldCatalog) -> Result<Token, ConstructionError> {
    let kind = pick.kind();
    let missing = |field: &'static str| ConstructionError::MissingPayload { kind, field };

    let token = match pick {
        Pick::Field { field_id } => {
            let field_id = present_id(field_id.as_ref()).ok_or_else(|| missing("field id"))?;
            Token::field(field_id.clone(), catalog.label_of(field_id))
        }
        Pick::Value { value, label } => {
            let value = value.clone().ok_or_else(|| missing("value"))?.checked()?;
            match non_empty(label.as_deref()) {
                Some(label) => Token::new(TokenKind::Value {
                    value,
                    label: label.to_owned(),
                }),
                None => Token::value(value),
            }
        }
        Pick::Operator { symbol } => {
            let symbol = non_empty(symbol.as_deref()).ok_or_else(|| missing("symbol"))?;
            let op = Operator::from_symbol(symbol.trim()).ok_or_else(|| {
                ConstructionError::UnknownOperator {
                    symbol: symbol.to_owned(),
                }
            })?;
            Token::operator(op)
        }
        Pick::Function { name } => {
            let name = non_empty(name.as_deref())
                .map(function_name)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| missing("name"))?;
            Token::function(name)
        }
        Pick::FormulaRef { formula_id, label } => {
            let formula_id = formula_id
                .as_ref()
                .filter(|id| !id.as_str().is_empty())
                .ok_or_else(|| missing("formula id"))?;
            let label = non_empty(label.as_deref()).unwrap_or(formula_id.as_str());
            Token::formula_ref(formula_id.clone(), label)
        }
        Pick::AdvPart { field_id, part } => {
            let field_id = present_id(field_id.as_ref()).ok_or_else(|| missing("field id"))?;
            let part = part.ok_or_else(|| missing("part"))?;
            if !catalog.is_advanced_select(field_id) {
                return Err(ConstructionError::NotAdvancedSelect {
                    field_id: field_id.clone(),
                });
            }
            let label = format!("{} ({part})", catalog.label_of(field_id));
            Token::adv_part(field_id.clone(), part, label)
        }
        Pick::Cond => Token::cond(ConditionNode::new()),
        Pick::Switch => Token::switch(SwitchNode::new()),
    };

    debug!(kind, token_id = %token.id(), "built token from pick");
    Ok(token)
}

fn present_id(id: Option<&FieldId>) -> Option<&FieldId> {
    id.filter(|id| !id.as_str().is_empty())
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// `IF(condition, then, else)` -> `IF`.
fn function_name(signature: &str) -> String {
    let name = signature.split('(').next().unwrap_or(signature);
    name.trim().to_owned()
}
