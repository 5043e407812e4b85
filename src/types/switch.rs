use super::error::EditError;
use super::field_registry::{FieldCatalog, FieldOption};
use super::ids::FieldId;
use super::sequence::Sequence;
use super::token::Part;

/// The advanced-select field and facet a switch dispatches on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SwitchBinding {
    pub field_id: FieldId,
    pub part: Part,
}

/// One arm of a switch.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    match_value: String,
    label: Option<String>,
    seq: Sequence,
}

impl SwitchCase {
    #[must_use]
    pub fn new(match_value: impl Into<String>, label: Option<String>, seq: Sequence) -> Self {
        Self {
            match_value: match_value.into(),
            label,
            seq,
        }
    }

    #[must_use]
    pub fn match_value(&self) -> &str {
        &self.match_value
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[must_use]
    pub fn sequence(&self) -> &Sequence {
        &self.seq
    }
}

/// Multi-way dispatch on an advanced-select field.
///
/// Field and part are set together or not at all, and case match values are
/// unique. Both hold by construction: every method that could break them
/// returns an [`EditError`] instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwitchNode {
    binding: Option<SwitchBinding>,
    cases: Vec<SwitchCase>,
    default: Sequence,
}

impl SwitchNode {
    /// An unbound switch with no cases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a node from stored parts. Later duplicates of a match value
    /// are dropped and returned separately.
    pub(crate) fn from_parts(
        binding: Option<SwitchBinding>,
        cases: Vec<SwitchCase>,
        default: Sequence,
    ) -> (Self, Vec<String>) {
        let mut kept: Vec<SwitchCase> = Vec::with_capacity(cases.len());
        let mut dropped = Vec::new();
        for case in cases {
            if kept.iter().any(|c| c.match_value == case.match_value) {
                dropped.push(case.match_value);
            } else {
                kept.push(case);
            }
        }
        let node = Self {
            binding,
            cases: kept,
            default,
        };
        (node, dropped)
    }

    #[must_use]
    pub fn binding(&self) -> Option<&SwitchBinding> {
        self.binding.as_ref()
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    #[must_use]
    pub fn cases(&self) -> &[SwitchCase] {
        &self.cases
    }

    #[must_use]
    pub fn case(&self, match_value: &str) -> Option<&SwitchCase> {
        self.cases.iter().find(|c| c.match_value == match_value)
    }

    #[must_use]
    pub fn default_sequence(&self) -> &Sequence {
        &self.default
    }

    /// Bind to an advanced-select field. Always discards existing cases and
    /// the default body, even when rebinding to the same field.
    pub fn bind_source(
        &self,
        catalog: &impl FieldCatalog,
        field_id: impl Into<FieldId>,
        part: Part,
    ) -> Result<SwitchNode, EditError> {
        let field_id = field_id.into();
        if !catalog.is_advanced_select(&field_id) {
            return Err(EditError::InvalidBinding { field_id });
        }
        Ok(SwitchNode {
            binding: Some(SwitchBinding { field_id, part }),
            cases: Vec::new(),
            default: Sequence::new(),
        })
    }

    /// Clear binding, cases and default body.
    #[must_use]
    pub fn unbind(&self) -> SwitchNode {
        SwitchNode::new()
    }

    /// Change the facet of a bound switch, keeping its cases.
    pub fn with_part(&self, part: Part) -> Result<SwitchNode, EditError> {
        let binding = self.binding.as_ref().ok_or(EditError::SwitchUnbound)?;
        Ok(SwitchNode {
            binding: Some(SwitchBinding {
                field_id: binding.field_id.clone(),
                part,
            }),
            ..self.clone()
        })
    }

    /// Append a case with an empty body.
    pub fn add_case(
        &self,
        match_value: impl Into<String>,
        label: Option<String>,
    ) -> Result<SwitchNode, EditError> {
        if !self.is_bound() {
            return Err(EditError::SwitchUnbound);
        }
        let match_value = match_value.into();
        if self.case(&match_value).is_some() {
            return Err(EditError::DuplicateCase { value: match_value });
        }
        let mut cases = self.cases.clone();
        cases.push(SwitchCase::new(match_value, label, Sequence::new()));
        Ok(SwitchNode {
            cases,
            ..self.clone()
        })
    }

    /// Drop the case with this value. Absent values are a no-op.
    #[must_use]
    pub fn remove_case(&self, match_value: &str) -> SwitchNode {
        let cases = self
            .cases
            .iter()
            .filter(|c| c.match_value != match_value)
            .cloned()
            .collect();
        SwitchNode {
            cases,
            ..self.clone()
        }
    }

    /// Change a case's match value in place, keeping its body and position.
    pub fn rename_case(&self, old: &str, new: impl Into<String>) -> Result<SwitchNode, EditError> {
        let new = new.into();
        let index = self.case_index(old)?;
        if new != old && self.case(&new).is_some() {
            return Err(EditError::DuplicateCase { value: new });
        }
        let mut cases = self.cases.clone();
        cases[index].match_value = new;
        Ok(SwitchNode {
            cases,
            ..self.clone()
        })
    }

    /// Replace the body of an existing case.
    pub fn with_case_sequence(&self, match_value: &str, seq: Sequence) -> Result<SwitchNode, EditError> {
        let index = self.case_index(match_value)?;
        let mut cases = self.cases.clone();
        cases[index].seq = seq;
        Ok(SwitchNode {
            cases,
            ..self.clone()
        })
    }

    #[must_use]
    pub fn with_default(&self, default: Sequence) -> SwitchNode {
        SwitchNode {
            default,
            ..self.clone()
        }
    }

    /// Add one case per option whose value is not already present. Existing
    /// cases are never touched, and duplicate option values count once.
    pub fn bulk_add_cases(&self, options: &[FieldOption]) -> Result<SwitchNode, EditError> {
        if !self.is_bound() {
            return Err(EditError::SwitchUnbound);
        }
        let mut cases = self.cases.clone();
        for option in options {
            if cases.iter().any(|c| c.match_value == option.value) {
                continue;
            }
            cases.push(SwitchCase::new(
                option.value.clone(),
                Some(option.label.clone()),
                Sequence::new(),
            ));
        }
        if cases.len() == self.cases.len() {
            return Ok(self.clone());
        }
        Ok(SwitchNode {
            cases,
            ..self.clone()
        })
    }

    /// [`bulk_add_cases`](Self::bulk_add_cases) with the bound field's options
    /// from the catalog.
    pub fn bulk_add_cases_from_catalog(
        &self,
        catalog: &impl FieldCatalog,
    ) -> Result<SwitchNode, EditError> {
        let binding = self.binding.as_ref().ok_or(EditError::SwitchUnbound)?;
        let options = catalog
            .field(&binding.field_id)
            .map(|f| f.options.as_slice())
            .unwrap_or_default();
        self.bulk_add_cases(options)
    }

    fn case_index(&self, match_value: &str) -> Result<usize, EditError> {
        self.cases
            .iter()
            .position(|c| c.match_value == match_value)
            .ok_or_else(|| EditError::UnknownCase {
                value: match_value.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::field_registry::{FieldInfo, FieldKind, FieldRegistry};
    use crate::types::token::Token;

    fn catalog() -> FieldRegistry {
        FieldRegistry::new()
            .with(
                FieldInfo::new("zone", FieldKind::AdvancedSelect, "Zone").with_options(vec![
                    FieldOption::new("north", "North"),
                    FieldOption::new("south", "South"),
                ]),
            )
            .with(FieldInfo::new("qty", FieldKind::Number, "Quantity"))
    }

    fn bound() -> SwitchNode {
        SwitchNode::new()
            .bind_source(&catalog(), "zone", Part::Selection)
            .unwrap()
    }

    #[test]
    fn bind_rejects_plain_fields() {
        let err = SwitchNode::new()
            .bind_source(&catalog(), "qty", Part::Selection)
            .unwrap_err();
        assert_eq!(
            err,
            EditError::InvalidBinding {
                field_id: "qty".into()
            }
        );
        let err = SwitchNode::new()
            .bind_source(&catalog(), "ghost", Part::Extra)
            .unwrap_err();
        assert!(matches!(err, EditError::InvalidBinding { .. }));
    }

    #[test]
    fn add_case_rejects_duplicates() {
        let node = bound().add_case("north", None).unwrap();
        let err = node.add_case("north", Some("Again".into())).unwrap_err();
        assert_eq!(
            err,
            EditError::DuplicateCase {
                value: "north".into()
            }
        );
        assert_eq!(node.cases().len(), 1);
    }

    #[test]
    fn add_case_requires_binding() {
        assert_eq!(
            SwitchNode::new().add_case("north", None).unwrap_err(),
            EditError::SwitchUnbound
        );
    }

    #[test]
    fn rebind_clears_cases_and_default() {
        let node = bound()
            .add_case("a", None)
            .and_then(|n| n.add_case("b", None))
            .and_then(|n| n.add_case("c", None))
            .unwrap()
            .with_default(Sequence::from(vec![Token::value(0_i64)]));
        let rebound = node.bind_source(&catalog(), "zone", Part::Extra).unwrap();
        assert!(rebound.cases().is_empty());
        assert!(rebound.default_sequence().is_empty());
        assert_eq!(node.cases().len(), 3);
    }

    #[test]
    fn with_part_keeps_cases() {
        let node = bound().add_case("north", None).unwrap();
        let changed = node.with_part(Part::NodeId).unwrap();
        assert_eq!(changed.cases().len(), 1);
        assert_eq!(changed.binding().map(|b| b.part), Some(Part::NodeId));
        assert_eq!(SwitchNode::new().with_part(Part::Extra).unwrap_err(), EditError::SwitchUnbound);
    }

    #[test]
    fn remove_case_absent_is_noop() {
        let node = bound().add_case("north", None).unwrap();
        assert_eq!(node.remove_case("south"), node);
        assert!(node.remove_case("north").cases().is_empty());
    }

    #[test]
    fn rename_case() {
        let node = bound()
            .add_case("north", None)
            .and_then(|n| n.add_case("south", None))
            .unwrap();
        let renamed = node.rename_case("north", "east").unwrap();
        assert_eq!(renamed.cases()[0].match_value(), "east");
        assert!(matches!(
            node.rename_case("north", "south"),
            Err(EditError::DuplicateCase { .. })
        ));
        assert!(matches!(
            node.rename_case("west", "x"),
            Err(EditError::UnknownCase { .. })
        ));
    }

    #[test]
    fn bulk_add_never_overwrites() {
        let body = Sequence::from(vec![Token::value(3_i64)]);
        let node = bound()
            .add_case("north", Some("Mine".into()))
            .and_then(|n| n.with_case_sequence("north", body.clone()))
            .unwrap();
        let bulk = node.bulk_add_cases_from_catalog(&catalog()).unwrap();
        assert_eq!(bulk.cases().len(), 2);
        assert_eq!(bulk.cases()[0].label(), Some("Mine"));
        assert!(bulk.cases()[0].sequence().ptr_eq(&body));
        assert_eq!(bulk.cases()[1].label(), Some("South"));
    }

    #[test]
    fn bulk_add_deduplicates_options() {
        let options = vec![FieldOption::new("x", "X"), FieldOption::new("x", "X again")];
        let node = bound().bulk_add_cases(&options).unwrap();
        assert_eq!(node.cases().len(), 1);
    }

    #[test]
    fn from_parts_keeps_first_duplicate() {
        let (node, dropped) = SwitchNode::from_parts(
            None,
            vec![
                SwitchCase::new("a", Some("first".into()), Sequence::new()),
                SwitchCase::new("a", Some("second".into()), Sequence::new()),
            ],
            Sequence::new(),
        );
        assert_eq!(node.cases().len(), 1);
        assert_eq!(node.cases()[0].label(), Some("first"));
        assert_eq!(dropped, vec!["a".to_owned()]);
    }
}
