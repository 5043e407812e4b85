//! JSON storage format.
//!
//! Tokens are stored as loosely shaped objects with a `type` discriminant and
//! optional payload fields. That shape lives only here: decoding checks every
//! payload against its kind and produces strict [`Token`]s.

use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::warn;

use crate::types::{
    ConditionNode, FalsePolicy, Formula, FormulaId, Operator, Part, Sequence, SwitchBinding,
    SwitchCase, SwitchNode, Token, TokenId, TokenKind, Value,
};

/// Stored data could not be turned into a formula tree.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid formula JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} token is missing its {field}")]
    MissingPayload {
        kind: &'static str,
        field: &'static str,
    },

    #[error("unknown operator '{symbol}'")]
    UnknownOperator { symbol: String },

    #[error("unsupported literal {found} in value token")]
    InvalidLiteral { found: String },

    #[error("switch has part '{part}' but no field")]
    PartialBinding { part: Part },
}

// -- Wire shapes --------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireKind {
    Field,
    Operator,
    Value,
    Function,
    FormulaRef,
    AdvPart,
    Cond,
    Switch,
}

impl WireKind {
    fn name(self) -> &'static str {
        match self {
            WireKind::Field => "field",
            WireKind::Operator => "operator",
            WireKind::Value => "value",
            WireKind::Function => "function",
            WireKind::FormulaRef => "formula_ref",
            WireKind::AdvPart => "adv_part",
            WireKind::Cond => "cond",
            WireKind::Switch => "switch",
        }
    }
}

/// One stored token. Which optional fields matter depends on `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireToken {
    #[serde(rename = "type")]
    pub kind: WireKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_formula_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cond_expr: Option<Vec<WireToken>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then: Option<Vec<WireToken>>,
    #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<Vec<WireToken>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub else_behavior: Option<FalsePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_field_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_part: Option<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cases: Option<Vec<WireCase>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_seq: Option<Vec<WireToken>>,
}

impl WireToken {
    fn empty(kind: WireKind, id: &TokenId) -> Self {
        Self {
            kind,
            id: Some(id.to_string()),
            label: None,
            value: None,
            ref_formula_id: None,
            field_id: None,
            part: None,
            cond_expr: None,
            then: None,
            otherwise: None,
            else_behavior: None,
            switch_field_id: None,
            switch_part: None,
            cases: None,
            default_seq: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireCase {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub seq: Vec<WireToken>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFormula {
    pub id: String,
    pub field_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sequence: Vec<WireToken>,
}

// -- Encoding -----------------------------------------------------------------

#[must_use]
pub fn encode_token(token: &Token) -> WireToken {
    match token.kind() {
        TokenKind::Field { field_id, label } => WireToken {
            field_id: Some(field_id.to_string()),
            label: Some(label.clone()),
            ..WireToken::empty(WireKind::Field, token.id())
        },
        TokenKind::Value { value, label } => WireToken {
            value: Some(literal_to_json(value)),
            label: Some(label.clone()),
            ..WireToken::empty(WireKind::Value, token.id())
        },
        TokenKind::Operator(op) => WireToken {
            value: Some(serde_json::Value::from(op.symbol())),
            label: Some(op.symbol().to_owned()),
            ..WireToken::empty(WireKind::Operator, token.id())
        },
        TokenKind::Function { name, label } => WireToken {
            value: Some(serde_json::Value::from(name.as_str())),
            label: Some(label.clone()),
            ..WireToken::empty(WireKind::Function, token.id())
        },
        TokenKind::FormulaRef { formula_id, label } => WireToken {
            ref_formula_id: Some(formula_id.to_string()),
            label: Some(label.clone()),
            ..WireToken::empty(WireKind::FormulaRef, token.id())
        },
        TokenKind::AdvPart {
            field_id,
            part,
            label,
        } => WireToken {
            field_id: Some(field_id.to_string()),
            part: Some(*part),
            label: Some(label.clone()),
            ..WireToken::empty(WireKind::AdvPart, token.id())
        },
        TokenKind::Cond(node) => WireToken {
            cond_expr: Some(encode_sequence(node.expr())),
            then: Some(encode_sequence(node.then_branch())),
            otherwise: Some(encode_sequence(node.else_branch())),
            else_behavior: Some(node.false_policy()),
            ..WireToken::empty(WireKind::Cond, token.id())
        },
        TokenKind::Switch(node) => WireToken {
            switch_field_id: node.binding().map(|b| b.field_id.to_string()),
            switch_part: node.binding().map(|b| b.part),
            cases: Some(
                node.cases()
                    .iter()
                    .map(|c| WireCase {
                        value: c.match_value().to_owned(),
                        label: c.label().map(str::to_owned),
                        seq: encode_sequence(c.sequence()),
                    })
                    .collect(),
            ),
            default_seq: Some(encode_sequence(node.default_sequence())),
            ..WireToken::empty(WireKind::Switch, token.id())
        },
    }
}

#[must_use]
pub fn encode_sequence(sequence: &Sequence) -> Vec<WireToken> {
    sequence.iter().map(encode_token).collect()
}

#[must_use]
pub fn encode_formula(formula: &Formula) -> WireFormula {
    WireFormula {
        id: formula.id.to_string(),
        field_id: formula.owner_field_id.to_string(),
        name: formula.name.clone(),
        sequence: encode_sequence(&formula.sequence),
    }
}

fn literal_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Value::from(*f),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::String(s) => serde_json::Value::String(s.clone()),
    }
}

// -- Decoding -----------------------------------------------------------------

pub fn decode_token(wire: WireToken) -> Result<Token, DecodeError> {
    let kind_name = wire.kind.name();
    let missing = |field: &'static str| DecodeError::MissingPayload {
        kind: kind_name,
        field,
    };

    let id = match wire.id.filter(|id| !id.is_empty()) {
        Some(id) => TokenId::new(id),
        None => {
            let id = TokenId::generate();
            warn!(kind = kind_name, token_id = %id, "stored token had no id; generated one");
            id
        }
    };

    let kind = match wire.kind {
        WireKind::Field => {
            let field_id = wire
                .field_id
                .or_else(|| string_value(wire.value.as_ref()))
                .filter(|s| !s.is_empty())
                .ok_or_else(|| missing("fieldId"))?;
            TokenKind::Field {
                label: wire.label.unwrap_or_else(|| field_id.clone()),
                field_id: field_id.into(),
            }
        }
        WireKind::Value => {
            let value = literal_from_json(wire.value.ok_or_else(|| missing("value"))?)?;
            TokenKind::Value {
                label: wire.label.unwrap_or_else(|| value.display_label()),
                value,
            }
        }
        WireKind::Operator => {
            let symbol = string_value(wire.value.as_ref()).ok_or_else(|| missing("value"))?;
            let op = Operator::from_symbol(symbol.trim())
                .ok_or(DecodeError::UnknownOperator { symbol })?;
            TokenKind::Operator(op)
        }
        WireKind::Function => {
            let name = string_value(wire.value.as_ref())
                .or_else(|| wire.label.clone())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| missing("value"))?;
            TokenKind::Function {
                label: wire.label.unwrap_or_else(|| name.clone()),
                name,
            }
        }
        WireKind::FormulaRef => {
            let formula_id = wire
                .ref_formula_id
                .or_else(|| string_value(wire.value.as_ref()))
                .filter(|s| !s.is_empty())
                .ok_or_else(|| missing("refFormulaId"))?;
            TokenKind::FormulaRef {
                label: wire.label.unwrap_or_else(|| formula_id.clone()),
                formula_id: FormulaId::new(formula_id),
            }
        }
        WireKind::AdvPart => {
            let field_id = wire
                .field_id
                .filter(|s| !s.is_empty())
                .ok_or_else(|| missing("fieldId"))?;
            let part = wire.part.ok_or_else(|| missing("part"))?;
            TokenKind::AdvPart {
                label: wire
                    .label
                    .unwrap_or_else(|| format!("{field_id} ({part})")),
                field_id: field_id.into(),
                part,
            }
        }
        WireKind::Cond => TokenKind::Cond(Arc::new(ConditionNode::from_parts(
            decode_optional(wire.cond_expr)?,
            decode_optional(wire.then)?,
            decode_optional(wire.otherwise)?,
            wire.else_behavior.unwrap_or_default(),
        ))),
        WireKind::Switch => {
            let binding = match (wire.switch_field_id.filter(|s| !s.is_empty()), wire.switch_part) {
                (Some(field_id), part) => Some(SwitchBinding {
                    field_id: field_id.into(),
                    part: part.unwrap_or(Part::Selection),
                }),
                (None, Some(part)) => return Err(DecodeError::PartialBinding { part }),
                (None, None) => None,
            };
            let cases = wire
                .cases
                .unwrap_or_default()
                .into_iter()
                .map(|c| Ok(SwitchCase::new(c.value, c.label, decode_sequence(c.seq)?)))
                .collect::<Result<Vec<_>, DecodeError>>()?;
            let (node, dropped) =
                SwitchNode::from_parts(binding, cases, decode_optional(wire.default_seq)?);
            if !dropped.is_empty() {
                warn!(token_id = %id, ?dropped, "dropped duplicate switch cases, kept first");
            }
            TokenKind::Switch(Arc::new(node))
        }
    };

    Ok(Token::with_id(id, kind))
}

pub fn decode_sequence(wire: Vec<WireToken>) -> Result<Sequence, DecodeError> {
    wire.into_iter().map(decode_token).collect()
}

pub fn decode_formula(wire: WireFormula) -> Result<Formula, DecodeError> {
    Ok(Formula::with_id(wire.id, wire.field_id, wire.name).with_sequence(decode_sequence(wire.sequence)?))
}

fn decode_optional(wire: Option<Vec<WireToken>>) -> Result<Sequence, DecodeError> {
    decode_sequence(wire.unwrap_or_default())
}

fn string_value(value: Option<&serde_json::Value>) -> Option<String> {
    value.and_then(serde_json::Value::as_str).map(str::to_owned)
}

fn literal_from_json(value: serde_json::Value) -> Result<Value, DecodeError> {
    match value {
        serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_json::Value::String(s) => Ok(Value::String(s)),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Value::Int(i)),
            (None, Some(f)) => Ok(Value::Float(f)),
            (None, None) => Err(DecodeError::InvalidLiteral {
                found: n.to_string(),
            }),
        },
        other => Err(DecodeError::InvalidLiteral {
            found: other.to_string(),
        }),
    }
}

// -- JSON entry points --------------------------------------------------------

/// Serialize a formula to its JSON storage form.
pub fn to_json(formula: &Formula) -> Result<String, DecodeError> {
    Ok(serde_json::to_string(&encode_formula(formula))?)
}

/// Parse and validate a stored formula.
pub fn from_json(json: &str) -> Result<Formula, DecodeError> {
    let wire: WireFormula = serde_json::from_str(json)?;
    decode_formula(wire)
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_token(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        decode_token(WireToken::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

impl Serialize for Sequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_sequence(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Sequence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        decode_sequence(Vec::<WireToken>::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

impl Serialize for Formula {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_formula(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Formula {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        decode_formula(WireFormula::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn decode(value: serde_json::Value) -> Result<Token, DecodeError> {
        decode_token(serde_json::from_value(value)?)
    }

    #[test]
    fn encodes_original_field_names() {
        let token = Token::adv_part("roof", Part::NodeId, "Roof (nodeId)");
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["type"], "adv_part");
        assert_eq!(json["fieldId"], "roof");
        assert_eq!(json["part"], "nodeId");
        assert_eq!(json["id"], token.id().as_str());
    }

    #[test]
    fn cond_uses_else_keys() {
        let node = ConditionNode::new().with_false_policy(FalsePolicy::Ignore);
        let json = serde_json::to_value(Token::cond(node)).unwrap();
        assert_eq!(json["elseBehavior"], "ignore");
        assert!(json["condExpr"].as_array().is_some_and(Vec::is_empty));
        assert!(json["else"].is_array());
    }

    #[test]
    fn missing_id_is_generated() {
        let token = decode(json!({"type": "operator", "value": "+"})).unwrap();
        assert_eq!(token.id().as_str().len(), 26);
        assert_eq!(token.kind(), &TokenKind::Operator(Operator::Add));
    }

    #[test]
    fn legacy_value_fallbacks() {
        let token = decode(json!({"type": "field", "id": "t1", "value": "surface"})).unwrap();
        assert!(matches!(token.kind(), TokenKind::Field { field_id, .. } if field_id.as_str() == "surface"));
        let token = decode(json!({"type": "formula_ref", "id": "t2", "value": "f9"})).unwrap();
        assert!(matches!(token.kind(), TokenKind::FormulaRef { formula_id, .. } if formula_id.as_str() == "f9"));
    }

    #[test]
    fn payload_must_match_kind() {
        assert!(matches!(
            decode(json!({"type": "adv_part", "id": "t", "fieldId": "roof"})),
            Err(DecodeError::MissingPayload { kind: "adv_part", field: "part" })
        ));
        assert!(matches!(
            decode(json!({"type": "operator", "id": "t", "value": "^"})),
            Err(DecodeError::UnknownOperator { .. })
        ));
        assert!(matches!(
            decode(json!({"type": "value", "id": "t", "value": [1, 2]})),
            Err(DecodeError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            decode(json!({"type": "mystery", "id": "t"})),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn literals() {
        let int = decode(json!({"type": "value", "id": "a", "value": 3})).unwrap();
        let float = decode(json!({"type": "value", "id": "b", "value": 0.5})).unwrap();
        let text = decode(json!({"type": "value", "id": "c", "value": "north"})).unwrap();
        assert!(matches!(int.kind(), TokenKind::Value { value: Value::Int(3), .. }));
        assert!(matches!(float.kind(), TokenKind::Value { value: Value::Float(_), .. }));
        assert_eq!(text.label(), "north");
    }

    #[test]
    fn switch_binding_rules() {
        let token = decode(json!({"type": "switch", "id": "s", "switchFieldId": "zone"})).unwrap();
        let binding = token.as_switch().and_then(SwitchNode::binding).cloned();
        assert_eq!(binding.map(|b| b.part), Some(Part::Selection));

        assert!(matches!(
            decode(json!({"type": "switch", "id": "s", "switchPart": "extra"})),
            Err(DecodeError::PartialBinding { part: Part::Extra })
        ));
    }

    #[test]
    fn duplicate_cases_keep_first() {
        let token = decode(json!({
            "type": "switch",
            "id": "s",
            "switchFieldId": "zone",
            "switchPart": "selection",
            "cases": [
                {"value": "north", "label": "first", "seq": [{"type": "value", "id": "v", "value": 1}]},
                {"value": "north", "label": "second"}
            ],
            "defaultSeq": []
        }))
        .unwrap();
        let node = token.as_switch().unwrap();
        assert_eq!(node.cases().len(), 1);
        assert_eq!(node.cases()[0].label(), Some("first"));
        assert_eq!(node.cases()[0].sequence().len(), 1);
    }

    #[test]
    fn formula_json_round_trip() {
        let formula = Formula::with_id("f1", "price", "Net").with_sequence(Sequence::from(vec![
            Token::field("qty", "Qty"),
            Token::operator(Operator::Mul),
            Token::value(2.5),
        ]));
        let json = to_json(&formula).unwrap();
        assert!(json.contains("\"fieldId\":\"price\""));
        assert_eq!(from_json(&json).unwrap(), formula);
    }

    #[test]
    fn decode_error_messages() {
        let err = DecodeError::MissingPayload {
            kind: "field",
            field: "fieldId",
        };
        assert_eq!(err.to_string(), "field token is missing its fieldId");
        let err = DecodeError::PartialBinding { part: Part::Extra };
        assert_eq!(err.to_string(), "switch has part 'extra' but no field");
    }
}
