//! Formulas owned by one form field, and the mutation entry points that keep
//! their reference graph acyclic.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::graph::{ReferenceGraph, collect_formula_refs};
use crate::types::{
    ConditionNode, EditError, FieldId, Formula, FormulaId, LoadError, SeqPath, Sequence,
    SwitchNode, Token, TokenId, TokenKind,
};

/// `{id, name}` of a formula, as listed to formula-reference pickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaSummary {
    pub id: FormulaId,
    pub name: String,
}

/// Enumerates the formulas owned by a field.
pub trait FormulaDirectory {
    fn sibling_formulas(&self, field_id: &FieldId) -> Vec<FormulaSummary>;
}

/// The formulas owned by one field. Formula order is creation (or load) order.
#[derive(Debug, Clone)]
pub struct FormulaScope {
    field_id: FieldId,
    formulas: Vec<Formula>,
}

impl FormulaScope {
    #[must_use]
    pub fn new(field_id: impl Into<FieldId>) -> Self {
        Self {
            field_id: field_id.into(),
            formulas: Vec::new(),
        }
    }

    /// Build a scope from stored formulas. They must all belong to
    /// `field_id`, have distinct ids and reference each other acyclically.
    pub fn load(field_id: impl Into<FieldId>, formulas: Vec<Formula>) -> Result<Self, LoadError> {
        let field_id = field_id.into();
        let mut seen: HashSet<&FormulaId> = HashSet::new();
        for formula in &formulas {
            if formula.owner_field_id != field_id {
                return Err(LoadError::ForeignOwner {
                    formula_id: formula.id.clone(),
                    owner: formula.owner_field_id.clone(),
                    expected: field_id,
                });
            }
            if !seen.insert(&formula.id) {
                return Err(LoadError::DuplicateFormula {
                    id: formula.id.clone(),
                });
            }
        }
        if let Some(path) = ReferenceGraph::build(&formulas).find_cycle() {
            return Err(LoadError::CyclicReferences { path });
        }
        debug!(field_id = %field_id, count = formulas.len(), "loaded formula scope");
        Ok(Self { field_id, formulas })
    }

    #[must_use]
    pub fn field_id(&self) -> &FieldId {
        &self.field_id
    }

    #[must_use]
    pub fn formulas(&self) -> &[Formula] {
        &self.formulas
    }

    #[must_use]
    pub fn get(&self, id: &FormulaId) -> Option<&Formula> {
        self.formulas.iter().find(|f| &f.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    #[must_use]
    pub fn summaries(&self) -> Vec<FormulaSummary> {
        self.formulas
            .iter()
            .map(|f| FormulaSummary {
                id: f.id.clone(),
                name: f.name.clone(),
            })
            .collect()
    }

    #[must_use]
    pub fn reference_graph(&self) -> ReferenceGraph {
        ReferenceGraph::build(&self.formulas)
    }

    /// Formulas ordered so that every formula comes after those it references.
    pub fn evaluation_order(&self) -> Result<Vec<FormulaId>, LoadError> {
        self.reference_graph().topological_order()
    }

    // -- Lifecycle ------------------------------------------------------------

    /// Create an empty formula and return its id.
    pub fn create(&mut self, name: impl Into<String>) -> FormulaId {
        let formula = Formula::new(self.field_id.clone(), name);
        let id = formula.id.clone();
        debug!(field_id = %self.field_id, formula_id = %id, "created formula");
        self.formulas.push(formula);
        id
    }

    pub fn rename(&mut self, id: &FormulaId, name: impl Into<String>) -> Result<(), EditError> {
        let index = self.index_of(id)?;
        self.formulas[index].name = name.into();
        Ok(())
    }

    /// Remove a formula. References to it from siblings are left in place and
    /// show up as dangling in diagnostics.
    pub fn delete(&mut self, id: &FormulaId) -> Result<Formula, EditError> {
        let index = self.index_of(id)?;
        let removed = self.formulas.remove(index);
        let referrers = self.reference_graph().referrers(id);
        debug!(
            formula_id = %id,
            dangling_referrers = referrers.len(),
            "deleted formula"
        );
        Ok(removed)
    }

    // -- Sequence edits -------------------------------------------------------

    /// Apply `f` to the sequence at `path` of formula `id` and commit the
    /// result, unless it adds a reference that closes a cycle. A rejected
    /// edit leaves the formula untouched.
    pub fn edit<F>(&mut self, id: &FormulaId, path: &SeqPath, f: F) -> Result<&Formula, EditError>
    where
        F: FnOnce(&Sequence) -> Result<Sequence, EditError>,
    {
        let index = self.index_of(id)?;
        let current = &self.formulas[index].sequence;
        let updated = current.update_at(path, f)?;
        if updated.ptr_eq(current) {
            return Ok(&self.formulas[index]);
        }
        self.check_new_refs(id, current, &updated)?;
        self.formulas[index].sequence = updated;
        debug!(formula_id = %id, path = %path, "applied edit");
        Ok(&self.formulas[index])
    }

    pub fn append(&mut self, id: &FormulaId, path: &SeqPath, token: Token) -> Result<&Formula, EditError> {
        self.edit(id, path, |s| Ok(s.append(token)))
    }

    pub fn insert_at(
        &mut self,
        id: &FormulaId,
        path: &SeqPath,
        index: usize,
        token: Token,
    ) -> Result<&Formula, EditError> {
        self.edit(id, path, |s| Ok(s.insert_at(index, token)))
    }

    pub fn insert_many(
        &mut self,
        id: &FormulaId,
        path: &SeqPath,
        index: usize,
        tokens: Vec<Token>,
    ) -> Result<&Formula, EditError> {
        self.edit(id, path, |s| Ok(s.insert_many(index, tokens)))
    }

    pub fn remove_at(&mut self, id: &FormulaId, path: &SeqPath, index: usize) -> Result<&Formula, EditError> {
        self.edit(id, path, |s| Ok(s.remove_at(index)))
    }

    pub fn move_within(
        &mut self,
        id: &FormulaId,
        path: &SeqPath,
        from: usize,
        to: usize,
    ) -> Result<&Formula, EditError> {
        self.edit(id, path, |s| Ok(s.move_within(from, to)))
    }

    /// Remove a token wherever it sits in the formula, with everything nested under it.
    pub fn remove_token(&mut self, id: &FormulaId, token_id: &TokenId) -> Result<&Formula, EditError> {
        let (path, index) = self.locate(id, token_id)?;
        self.remove_at(id, &path, index)
    }

    pub fn update_cond<F>(
        &mut self,
        id: &FormulaId,
        path: &SeqPath,
        index: usize,
        f: F,
    ) -> Result<&Formula, EditError>
    where
        F: FnOnce(&ConditionNode) -> Result<ConditionNode, EditError>,
    {
        self.edit(id, &SeqPath::root(), |root| root.update_cond(path, index, f))
    }

    pub fn update_switch<F>(
        &mut self,
        id: &FormulaId,
        path: &SeqPath,
        index: usize,
        f: F,
    ) -> Result<&Formula, EditError>
    where
        F: FnOnce(&SwitchNode) -> Result<SwitchNode, EditError>,
    {
        self.edit(id, &SeqPath::root(), |root| root.update_switch(path, index, f))
    }

    /// Point the token at `index` of the sequence at `path` to `target`.
    ///
    /// An existing `formula_ref` at `index` is retargeted in place (keeping
    /// its token id); otherwise a new token is inserted there. Returns the id
    /// of the reference token.
    pub fn set_formula_ref(
        &mut self,
        source: &FormulaId,
        path: &SeqPath,
        index: usize,
        target: &FormulaId,
        label: Option<&str>,
    ) -> Result<TokenId, EditError> {
        let target_formula = self.get(target).ok_or_else(|| EditError::UnknownFormula {
            id: target.clone(),
        })?;
        let label = label.map_or_else(|| target_formula.name.clone(), str::to_owned);
        let kind = TokenKind::FormulaRef {
            formula_id: target.clone(),
            label,
        };

        let source_index = self.index_of(source)?;
        if let Some(cycle) = self.reference_graph().would_close_cycle(source, target) {
            warn!(
                source = %source,
                target = %target,
                "rejected formula reference that closes a cycle"
            );
            return Err(EditError::CyclicReference { path: cycle });
        }

        let mut token_id = None;
        let current = &self.formulas[source_index].sequence;
        let updated = current.update_at(path, |seq| {
            let token = match seq.get(index) {
                Some(existing) if matches!(existing.kind(), TokenKind::FormulaRef { .. }) => {
                    let token = existing.with_kind(kind);
                    token_id = Some(token.id().clone());
                    return Ok(seq.replace_at(index, token));
                }
                _ => Token::new(kind),
            };
            token_id = Some(token.id().clone());
            Ok(seq.insert_at(index, token))
        })?;
        let token_id = token_id.ok_or(EditError::InvalidPath {
            depth: path.depth(),
            index,
        })?;
        self.formulas[source_index].sequence = updated;
        debug!(source = %source, target = %target, token_id = %token_id, "set formula reference");
        Ok(token_id)
    }

    /// Change the display label of the `formula_ref` at `index` of the
    /// sequence at `path`, keeping its target and token id.
    pub fn relabel_formula_ref(
        &mut self,
        source: &FormulaId,
        path: &SeqPath,
        index: usize,
        label: impl Into<String>,
    ) -> Result<&Formula, EditError> {
        let label = label.into();
        let source_index = self.index_of(source)?;
        let updated = self.formulas[source_index]
            .sequence
            .update_token(path, index, |token| match token.kind() {
                TokenKind::FormulaRef { formula_id, .. } => Ok(token.with_kind(TokenKind::FormulaRef {
                    formula_id: formula_id.clone(),
                    label,
                })),
                _ => Err(EditError::NotAFormulaRef { index }),
            })?;
        self.formulas[source_index].sequence = updated;
        Ok(&self.formulas[source_index])
    }

    /// Path and index of a token inside formula `id`.
    pub fn locate(&self, id: &FormulaId, token_id: &TokenId) -> Result<(SeqPath, usize), EditError> {
        let formula = self.get(id).ok_or_else(|| EditError::UnknownFormula { id: id.clone() })?;
        formula
            .sequence
            .locate(token_id)
            .ok_or_else(|| EditError::UnknownToken {
                id: token_id.clone(),
            })
    }

    fn index_of(&self, id: &FormulaId) -> Result<usize, EditError> {
        self.formulas
            .iter()
            .position(|f| &f.id == id)
            .ok_or_else(|| EditError::UnknownFormula { id: id.clone() })
    }

    fn check_new_refs(
        &self,
        source: &FormulaId,
        before: &Sequence,
        after: &Sequence,
    ) -> Result<(), EditError> {
        let existing: HashSet<FormulaId> = collect_formula_refs(before).into_iter().collect();
        let added: Vec<FormulaId> = collect_formula_refs(after)
            .into_iter()
            .filter(|r| !existing.contains(r))
            .collect();
        if added.is_empty() {
            return Ok(());
        }
        let graph = self.reference_graph();
        for target in &added {
            if let Some(path) = graph.would_close_cycle(source, target) {
                warn!(
                    source = %source,
                    target = %target,
                    "rejected edit that closes a formula reference cycle"
                );
                return Err(EditError::CyclicReference { path });
            }
        }
        Ok(())
    }
}

impl FormulaDirectory for FormulaScope {
    fn sibling_formulas(&self, field_id: &FieldId) -> Vec<FormulaSummary> {
        if field_id == &self.field_id {
            self.summaries()
        } else {
            Vec::new()
        }
    }
}
