use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::condition::ConditionNode;
use super::ids::{FieldId, FormulaId, TokenId};
use super::path::Branch;
use super::sequence::Sequence;
use super::switch::SwitchNode;
use super::value::Value;

/// Operators that may appear in a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Not,
}

impl Operator {
    pub const ALL: [Operator; 14] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Rem,
        Operator::And,
        Operator::Or,
        Operator::Not,
    ];

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Neq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Rem => "%",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Not => "!",
        }
    }

    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Operator> {
        Operator::ALL.into_iter().find(|op| op.symbol() == symbol)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Facet extracted from a resolved advanced-select node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Selection,
    Extra,
    NodeId,
}

impl Part {
    pub const ALL: [Part; 3] = [Part::Selection, Part::Extra, Part::NodeId];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Part::Selection => "selection",
            Part::Extra => "extra",
            Part::NodeId => "nodeId",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Part> {
        Part::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a [`Token`], discriminated by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Field {
        field_id: FieldId,
        label: String,
    },
    Value {
        value: Value,
        label: String,
    },
    Operator(Operator),
    Function {
        name: String,
        label: String,
    },
    FormulaRef {
        formula_id: FormulaId,
        label: String,
    },
    AdvPart {
        field_id: FieldId,
        part: Part,
        label: String,
    },
    Cond(Arc<ConditionNode>),
    Switch(Arc<SwitchNode>),
}

impl TokenKind {
    /// Wire name of this kind (`field`, `formula_ref`, ...).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Field { .. } => "field",
            TokenKind::Value { .. } => "value",
            TokenKind::Operator(_) => "operator",
            TokenKind::Function { .. } => "function",
            TokenKind::FormulaRef { .. } => "formula_ref",
            TokenKind::AdvPart { .. } => "adv_part",
            TokenKind::Cond(_) => "cond",
            TokenKind::Switch(_) => "switch",
        }
    }
}

/// One element of a formula sequence: an identity plus a typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    id: TokenId,
    kind: TokenKind,
}

impl Token {
    /// Create a token with a fresh id.
    #[must_use]
    pub fn new(kind: TokenKind) -> Self {
        Self {
            id: TokenId::generate(),
            kind,
        }
    }

    #[must_use]
    pub fn with_id(id: TokenId, kind: TokenKind) -> Self {
        Self { id, kind }
    }

    #[must_use]
    pub fn id(&self) -> &TokenId {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    /// Same identity, new payload.
    #[must_use]
    pub fn with_kind(&self, kind: TokenKind) -> Token {
        Token {
            id: self.id.clone(),
            kind,
        }
    }

    /// Text shown in the editor for this token.
    #[must_use]
    pub fn label(&self) -> Cow<'_, str> {
        match &self.kind {
            TokenKind::Field { label, .. }
            | TokenKind::Value { label, .. }
            | TokenKind::Function { label, .. }
            | TokenKind::FormulaRef { label, .. }
            | TokenKind::AdvPart { label, .. } => Cow::Borrowed(label),
            TokenKind::Operator(op) => Cow::Borrowed(op.symbol()),
            TokenKind::Cond(_) => Cow::Borrowed("Condition"),
            TokenKind::Switch(node) => match node.binding() {
                Some(binding) => Cow::Owned(format!("Switch {}.{}", binding.field_id, binding.part)),
                None => Cow::Borrowed("Switch"),
            },
        }
    }

    /// Tokens allowed at even positions of an alternating sequence.
    #[must_use]
    pub fn is_value_like(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Field { .. }
                | TokenKind::Value { .. }
                | TokenKind::FormulaRef { .. }
                | TokenKind::AdvPart { .. }
                | TokenKind::Cond(_)
        )
    }

    #[must_use]
    pub fn is_operator(&self) -> bool {
        matches!(self.kind, TokenKind::Operator(_))
    }

    #[must_use]
    pub fn is_function(&self) -> bool {
        matches!(self.kind, TokenKind::Function { .. })
    }

    #[must_use]
    pub fn as_cond(&self) -> Option<&ConditionNode> {
        match &self.kind {
            TokenKind::Cond(node) => Some(node),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_switch(&self) -> Option<&SwitchNode> {
        match &self.kind {
            TokenKind::Switch(node) => Some(node),
            _ => None,
        }
    }

    /// The nested sequence reached through `branch`, if this token owns one.
    #[must_use]
    pub fn branch(&self, branch: &Branch) -> Option<&Sequence> {
        match (&self.kind, branch) {
            (TokenKind::Cond(node), Branch::Expr) => Some(node.expr()),
            (TokenKind::Cond(node), Branch::Then) => Some(node.then_branch()),
            (TokenKind::Cond(node), Branch::Else) => Some(node.else_branch()),
            (TokenKind::Switch(node), Branch::Case(value)) => node.case(value).map(|c| c.sequence()),
            (TokenKind::Switch(node), Branch::Default) => Some(node.default_sequence()),
            _ => None,
        }
    }

    /// Copy of this token with the sequence at `branch` replaced.
    #[must_use]
    pub fn with_branch(&self, branch: &Branch, sequence: Sequence) -> Option<Token> {
        let kind = match (&self.kind, branch) {
            (TokenKind::Cond(node), Branch::Expr) => TokenKind::Cond(Arc::new(node.with_expr(sequence))),
            (TokenKind::Cond(node), Branch::Then) => {
                TokenKind::Cond(Arc::new(node.with_then(sequence)))
            }
            (TokenKind::Cond(node), Branch::Else) => {
                TokenKind::Cond(Arc::new(node.with_else(sequence)))
            }
            (TokenKind::Switch(node), Branch::Case(value)) => {
                TokenKind::Switch(Arc::new(node.with_case_sequence(value, sequence).ok()?))
            }
            (TokenKind::Switch(node), Branch::Default) => {
                TokenKind::Switch(Arc::new(node.with_default(sequence)))
            }
            _ => return None,
        };
        Some(self.with_kind(kind))
    }

    /// Every nested sequence owned directly by this token, with the branch that reaches it.
    #[must_use]
    pub fn children(&self) -> Vec<(Branch, &Sequence)> {
        match &self.kind {
            TokenKind::Cond(node) => vec![
                (Branch::Expr, node.expr()),
                (Branch::Then, node.then_branch()),
                (Branch::Else, node.else_branch()),
            ],
            TokenKind::Switch(node) => {
                let mut out: Vec<(Branch, &Sequence)> = node
                    .cases()
                    .iter()
                    .map(|c| (Branch::Case(c.match_value().to_owned()), c.sequence()))
                    .collect();
                out.push((Branch::Default, node.default_sequence()));
                out
            }
            _ => Vec::new(),
        }
    }

    // -- Constructors ---------------------------------------------------------

    #[must_use]
    pub fn field(field_id: impl Into<FieldId>, label: impl Into<String>) -> Token {
        Token::new(TokenKind::Field {
            field_id: field_id.into(),
            label: label.into(),
        })
    }

    #[must_use]
    pub fn value(value: impl Into<Value>) -> Token {
        let value = value.into();
        let label = value.display_label();
        Token::new(TokenKind::Value { value, label })
    }

    #[must_use]
    pub fn operator(op: Operator) -> Token {
        Token::new(TokenKind::Operator(op))
    }

    #[must_use]
    pub fn function(name: impl Into<String>) -> Token {
        let name = name.into();
        Token::new(TokenKind::Function {
            label: name.clone(),
            name,
        })
    }

    #[must_use]
    pub fn formula_ref(formula_id: impl Into<FormulaId>, label: impl Into<String>) -> Token {
        Token::new(TokenKind::FormulaRef {
            formula_id: formula_id.into(),
            label: label.into(),
        })
    }

    #[must_use]
    pub fn adv_part(field_id: impl Into<FieldId>, part: Part, label: impl Into<String>) -> Token {
        Token::new(TokenKind::AdvPart {
            field_id: field_id.into(),
            part,
            label: label.into(),
        })
    }

    #[must_use]
    pub fn cond(node: ConditionNode) -> Token {
        Token::new(TokenKind::Cond(Arc::new(node)))
    }

    #[must_use]
    pub fn switch(node: SwitchNode) -> Token {
        Token::new(TokenKind::Switch(Arc::new(node)))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Field { field_id, .. } => write!(f, "{}", Braced(field_id.as_str())),
            TokenKind::Value { value, .. } => write!(f, "{value}"),
            TokenKind::Operator(op) => write!(f, "{op}"),
            TokenKind::Function { name, .. } => f.write_str(name),
            TokenKind::FormulaRef { formula_id, .. } => write!(f, "@{}", Braced(formula_id.as_str())),
            TokenKind::AdvPart { field_id, part, .. } => {
                write!(f, "{}.{part}", Braced(field_id.as_str()))
            }
            TokenKind::Cond(node) => write!(f, "{node}"),
            TokenKind::Switch(_) => f.write_str("<switch>"),
        }
    }
}

/// An id in braces. `}` and backslash are escaped with a backslash.
struct Braced<'a>(&'a str);

impl fmt::Display for Braced<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for c in self.0.chars() {
            if matches!(c, '}' | '\\') {
                f.write_str("\\")?;
            }
            write!(f, "{c}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_symbols_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(Operator::from_symbol("**"), None);
    }

    #[test]
    fn part_names() {
        assert_eq!(Part::NodeId.as_str(), "nodeId");
        assert_eq!(Part::parse("extra"), Some(Part::Extra));
        assert_eq!(Part::parse("node_id"), None);
    }

    #[test]
    fn value_like_kinds() {
        assert!(Token::field("a", "A").is_value_like());
        assert!(Token::value(10_i64).is_value_like());
        assert!(Token::formula_ref("f", "F").is_value_like());
        assert!(Token::adv_part("adv", Part::Selection, "Adv").is_value_like());
        assert!(Token::cond(ConditionNode::new()).is_value_like());
        assert!(!Token::operator(Operator::Add).is_value_like());
        assert!(!Token::function("SUM").is_value_like());
        assert!(!Token::switch(SwitchNode::new()).is_value_like());
    }

    #[test]
    fn with_kind_keeps_identity() {
        let token = Token::field("a", "A");
        let changed = token.with_kind(TokenKind::Operator(Operator::Gt));
        assert_eq!(token.id(), changed.id());
        assert!(changed.is_operator());
    }

    #[test]
    fn labels() {
        assert_eq!(Token::operator(Operator::Gte).label(), ">=");
        assert_eq!(Token::value("north").label(), "north");
        assert_eq!(Token::cond(ConditionNode::new()).label(), "Condition");
    }

    #[test]
    fn branch_access_on_cond() {
        let node = ConditionNode::new().with_then(Sequence::from(vec![Token::value(1_i64)]));
        let token = Token::cond(node);
        assert_eq!(token.branch(&Branch::Then).map(Sequence::len), Some(1));
        assert!(token.branch(&Branch::Default).is_none());
        assert!(Token::value(1_i64).branch(&Branch::Then).is_none());
    }

    #[test]
    fn display_notation() {
        assert_eq!(Token::field("price", "Price").to_string(), "{price}");
        assert_eq!(Token::formula_ref("f1", "F1").to_string(), "@{f1}");
        assert_eq!(
            Token::adv_part("roof", Part::Extra, "Roof").to_string(),
            "{roof}.extra"
        );
        assert_eq!(Token::value("x").to_string(), "\"x\"");
    }
}
