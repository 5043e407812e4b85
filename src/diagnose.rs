//! Advisory report over a whole formula tree.

use std::fmt;

use crate::scope::FormulaScope;
use crate::types::{FieldCatalog, FieldId, Formula, FormulaId, SeqPath, TokenId, TokenKind};
use crate::validate::{Issue, validate};

/// Something worth showing the user about a formula. Never blocks saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The root sequence is non-empty but not well-formed.
    IncompleteSequence { issue: Issue },
    /// A condition's predicate is not well-formed.
    IncompleteCondition {
        path: SeqPath,
        index: usize,
        token_id: TokenId,
        issue: Issue,
    },
    UnboundSwitch {
        path: SeqPath,
        index: usize,
        token_id: TokenId,
    },
    /// An accessor or switch names a field that is gone or no longer advanced-select.
    StaleAdvancedSelect { token_id: TokenId, field_id: FieldId },
    /// A reference to a formula that is not in the scope.
    DanglingFormulaRef { token_id: TokenId, target: FormulaId },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::IncompleteSequence { issue } => write!(f, "incomplete formula: {issue}"),
            Diagnostic::IncompleteCondition {
                path, index, issue, ..
            } => write!(f, "incomplete condition at {path}[{index}]: {issue}"),
            Diagnostic::UnboundSwitch { path, index, .. } => {
                write!(f, "switch at {path}[{index}] has no field")
            }
            Diagnostic::StaleAdvancedSelect { field_id, .. } => {
                write!(f, "field '{field_id}' is no longer an advanced-select field")
            }
            Diagnostic::DanglingFormulaRef { target, .. } => {
                write!(f, "reference to missing formula '{target}'")
            }
        }
    }
}

/// Walk every token of `formula` and collect diagnostics, root issue first.
#[must_use]
pub fn diagnose(formula: &Formula, catalog: &impl FieldCatalog, scope: &FormulaScope) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    if !formula.sequence.is_empty()
        && let Some(issue) = validate(&formula.sequence).issue
    {
        out.push(Diagnostic::IncompleteSequence { issue });
    }

    formula.sequence.walk(|path, index, token| match token.kind() {
        TokenKind::Cond(node) => {
            if let Some(issue) = validate(node.expr()).issue {
                out.push(Diagnostic::IncompleteCondition {
                    path: path.clone(),
                    index,
                    token_id: token.id().clone(),
                    issue,
                });
            }
        }
        TokenKind::Switch(node) => match node.binding() {
            None => out.push(Diagnostic::UnboundSwitch {
                path: path.clone(),
                index,
                token_id: token.id().clone(),
            }),
            Some(binding) if !catalog.is_advanced_select(&binding.field_id) => {
                out.push(Diagnostic::StaleAdvancedSelect {
                    token_id: token.id().clone(),
                    field_id: binding.field_id.clone(),
                });
            }
            Some(_) => {}
        },
        TokenKind::AdvPart { field_id, .. } if !catalog.is_advanced_select(field_id) => {
            out.push(Diagnostic::StaleAdvancedSelect {
                token_id: token.id().clone(),
                field_id: field_id.clone(),
            });
        }
        TokenKind::FormulaRef { formula_id, .. } if scope.get(formula_id).is_none() => {
            out.push(Diagnostic::DanglingFormulaRef {
                token_id: token.id().clone(),
                target: formula_id.clone(),
            });
        }
        _ => {}
    });

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Branch, ConditionNode, FieldInfo, FieldKind, FieldRegistry, Operator, Part, Sequence,
        SwitchNode, Token,
    };

    fn catalog() -> FieldRegistry {
        FieldRegistry::new()
            .with(FieldInfo::new("roof", FieldKind::AdvancedSelect, "Roof"))
            .with(FieldInfo::new("qty", FieldKind::Number, "Qty"))
    }

    #[test]
    fn clean_formula_has_no_diagnostics() {
        let scope = FormulaScope::new("price");
        let formula = Formula::with_id("f", "price", "F").with_sequence(Sequence::from(vec![
            Token::field("qty", "Qty"),
            Token::operator(Operator::Mul),
            Token::adv_part("roof", Part::Extra, "Roof (extra)"),
        ]));
        assert!(diagnose(&formula, &catalog(), &scope).is_empty());
    }

    #[test]
    fn empty_formula_is_not_reported() {
        let scope = FormulaScope::new("price");
        let formula = Formula::with_id("f", "price", "F");
        assert!(diagnose(&formula, &catalog(), &scope).is_empty());
    }

    #[test]
    fn reports_nested_problems() {
        let scope = FormulaScope::new("price");
        let mut reg = catalog();
        let switch = SwitchNode::new()
            .bind_source(&reg, "roof", Part::Selection)
            .unwrap();
        // The field changes type after the switch was bound.
        reg.register(FieldInfo::new("roof", FieldKind::Text, "Roof"));

        let cond = ConditionNode::new()
            .with_expr(Sequence::from(vec![Token::field("qty", "Qty"), Token::operator(Operator::Gt)]))
            .with_then(Sequence::from(vec![Token::switch(switch), Token::switch(SwitchNode::new())]));
        let formula = Formula::with_id("f", "price", "F").with_sequence(Sequence::from(vec![
            Token::cond(cond),
            Token::operator(Operator::Add),
            Token::formula_ref("ghost", "Ghost"),
        ]));

        let diags = diagnose(&formula, &reg, &scope);
        assert_eq!(diags.len(), 4);
        assert!(matches!(
            &diags[0],
            Diagnostic::IncompleteCondition { issue: Issue::DanglingOperator { index: 1 }, .. }
        ));
        assert!(matches!(&diags[1], Diagnostic::StaleAdvancedSelect { field_id, .. } if field_id.as_str() == "roof"));
        match &diags[2] {
            Diagnostic::UnboundSwitch { path, index, .. } => {
                assert_eq!(path, &SeqPath::root().then(0, Branch::Then));
                assert_eq!(*index, 1);
            }
            other => panic!("unexpected diagnostic: {other}"),
        }
        assert!(matches!(&diags[3], Diagnostic::DanglingFormulaRef { target, .. } if target.as_str() == "ghost"));
    }

    #[test]
    fn root_issue_comes_first() {
        let scope = FormulaScope::new("price");
        let formula = Formula::with_id("f", "price", "F")
            .with_sequence(Sequence::from(vec![Token::field("qty", "Qty")]));
        let diags = diagnose(&formula, &catalog(), &scope);
        assert_eq!(
            diags,
            vec![Diagnostic::IncompleteSequence {
                issue: Issue::TooShort { len: 1 }
            }]
        );
        assert_eq!(
            diags[0].to_string(),
            "incomplete formula: expression needs at least 3 elements, has 1"
        );
    }
}
