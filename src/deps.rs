//! Which fields a formula reads, and in which part of the expression.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::scope::FormulaScope;
use crate::types::{FieldId, Formula, FormulaId, Sequence, TokenKind};

/// Where in the expression a field is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyContext {
    Main,
    Condition,
    Then,
    Else,
}

/// Field ids read by a formula, grouped by context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDependencies {
    pub all: BTreeSet<FieldId>,
    pub main: BTreeSet<FieldId>,
    pub condition: BTreeSet<FieldId>,
    pub then: BTreeSet<FieldId>,
    pub otherwise: BTreeSet<FieldId>,
    /// Label of each field as it appears on the first token naming it.
    pub labels: BTreeMap<FieldId, String>,
}

impl FieldDependencies {
    #[must_use]
    pub fn context(&self, context: DependencyContext) -> &BTreeSet<FieldId> {
        match context {
            DependencyContext::Main => &self.main,
            DependencyContext::Condition => &self.condition,
            DependencyContext::Then => &self.then,
            DependencyContext::Else => &self.otherwise,
        }
    }

    fn add(&mut self, context: DependencyContext, field_id: &FieldId, label: Option<&str>) {
        self.all.insert(field_id.clone());
        let set = match context {
            DependencyContext::Main => &mut self.main,
            DependencyContext::Condition => &mut self.condition,
            DependencyContext::Then => &mut self.then,
            DependencyContext::Else => &mut self.otherwise,
        };
        set.insert(field_id.clone());
        if let Some(label) = label {
            self.labels
                .entry(field_id.clone())
                .or_insert_with(|| label.to_owned());
        }
    }
}

/// Collect the fields `formula` reads.
///
/// Condition predicates and switch fields count as `condition`; `then` and
/// `else` bodies as their branch; switch case bodies keep the enclosing
/// context. Formula references are followed through `scope` in the context
/// they appear in, each formula at most once.
#[must_use]
pub fn field_dependencies(formula: &Formula, scope: &FormulaScope) -> FieldDependencies {
    let mut deps = FieldDependencies::default();
    let mut visited: HashSet<FormulaId> = HashSet::from([formula.id.clone()]);
    collect(
        &formula.sequence,
        DependencyContext::Main,
        scope,
        &mut visited,
        &mut deps,
    );
    deps
}

fn collect(
    sequence: &Sequence,
    context: DependencyContext,
    scope: &FormulaScope,
    visited: &mut HashSet<FormulaId>,
    deps: &mut FieldDependencies,
) {
    for token in sequence {
        match token.kind() {
            TokenKind::Field { field_id, label } | TokenKind::AdvPart { field_id, label, .. } => {
                deps.add(context, field_id, Some(label));
            }
            TokenKind::Cond(node) => {
                collect(node.expr(), DependencyContext::Condition, scope, visited, deps);
                collect(node.then_branch(), DependencyContext::Then, scope, visited, deps);
                collect(node.else_branch(), DependencyContext::Else, scope, visited, deps);
            }
            TokenKind::Switch(node) => {
                if let Some(binding) = node.binding() {
                    deps.add(DependencyContext::Condition, &binding.field_id, None);
                }
                for case in node.cases() {
                    collect(case.sequence(), context, scope, visited, deps);
                }
                collect(node.default_sequence(), context, scope, visited, deps);
            }
            TokenKind::FormulaRef { formula_id, .. } => {
                if visited.insert(formula_id.clone())
                    && let Some(target) = scope.get(formula_id)
                {
                    collect(&target.sequence, context, scope, visited, deps);
                }
            }
            TokenKind::Value { .. } | TokenKind::Operator(_) | TokenKind::Function { .. } => {}
        }
    }
}
