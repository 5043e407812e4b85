use std::collections::BTreeMap;

use tracing::debug;

use crate::scope::{FormulaDirectory, FormulaScope, FormulaSummary};
use crate::types::{FieldId, Formula, FormulaId};

/// Every field's formula scope, keyed by owning field.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    scopes: BTreeMap<FieldId, FormulaScope>,
}

impl Workspace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a loaded scope, replacing any previous scope for that field.
    pub fn insert_scope(&mut self, scope: FormulaScope) -> Option<FormulaScope> {
        self.scopes.insert(scope.field_id().clone(), scope)
    }

    #[must_use]
    pub fn scope(&self, field_id: &FieldId) -> Option<&FormulaScope> {
        self.scopes.get(field_id)
    }

    /// The scope of `field_id`, created empty on first use.
    pub fn scope_mut(&mut self, field_id: &FieldId) -> &mut FormulaScope {
        self.scopes
            .entry(field_id.clone())
            .or_insert_with(|| FormulaScope::new(field_id.clone()))
    }

    /// Drop a field together with every formula it owns.
    pub fn remove_field(&mut self, field_id: &FieldId) -> Option<FormulaScope> {
        let removed = self.scopes.remove(field_id);
        if let Some(scope) = &removed {
            debug!(field_id = %field_id, formulas = scope.len(), "removed field and its formulas");
        }
        removed
    }

    #[must_use]
    pub fn find_formula(&self, id: &FormulaId) -> Option<&Formula> {
        self.scopes.values().find_map(|scope| scope.get(id))
    }

    pub fn scopes(&self) -> impl Iterator<Item = &FormulaScope> {
        self.scopes.values()
    }

    #[must_use]
    pub fn formula_count(&self) -> usize {
        self.scopes.values().map(FormulaScope::len).sum()
    }
}

impl FormulaDirectory for Workspace {
    fn sibling_formulas(&self, field_id: &FieldId) -> Vec<FormulaSummary> {
        self.scope(field_id)
            .map(FormulaScope::summaries)
            .unwrap_or_default()
    }
}
