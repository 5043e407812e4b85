//! The reference graph of a field scope: one node per formula, one edge per
//! distinct `formula_ref` target.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::{Formula, FormulaId, LoadError, Sequence, TokenKind};

/// Directed graph induced by `formula_ref` tokens. Edge lists keep the order
/// in which references first appear in a formula.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    nodes: Vec<FormulaId>,
    edges: HashMap<FormulaId, Vec<FormulaId>>,
}

impl ReferenceGraph {
    pub fn build<'a>(formulas: impl IntoIterator<Item = &'a Formula>) -> Self {
        let mut graph = Self::default();
        for formula in formulas {
            graph.nodes.push(formula.id.clone());
            graph
                .edges
                .insert(formula.id.clone(), collect_formula_refs(&formula.sequence));
        }
        graph
    }

    #[must_use]
    pub fn nodes(&self) -> &[FormulaId] {
        &self.nodes
    }

    /// Formulas referenced directly by `id`.
    #[must_use]
    pub fn references(&self, id: &FormulaId) -> &[FormulaId] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Formulas that reference `id` directly.
    #[must_use]
    pub fn referrers(&self, id: &FormulaId) -> Vec<FormulaId> {
        self.nodes
            .iter()
            .filter(|n| self.references(n).contains(id))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Would adding `source -> target` close a cycle?
    ///
    /// Searches from `target` for `source` with a visited set, so the cost is
    /// linear in formulas plus edges. On a hit, returns the cycle as
    /// `[source, target, ..., source]`.
    #[must_use]
    pub fn would_close_cycle(&self, source: &FormulaId, target: &FormulaId) -> Option<Vec<FormulaId>> {
        if source == target {
            return Some(vec![source.clone(), source.clone()]);
        }

        let mut parent: HashMap<&FormulaId, &FormulaId> = HashMap::new();
        let mut visited: HashSet<&FormulaId> = HashSet::from([target]);
        let mut stack = vec![target];

        while let Some(node) = stack.pop() {
            for next in self.references(node) {
                if !visited.insert(next) {
                    continue;
                }
                parent.insert(next, node);
                if next == source {
                    // Walk parents back to the target, then flip to target-first.
                    let mut chain = vec![source.clone()];
                    let mut cursor = next;
                    while let Some(&prev) = parent.get(cursor) {
                        chain.push(prev.clone());
                        cursor = prev;
                    }
                    chain.reverse();
                    let mut path = Vec::with_capacity(chain.len() + 1);
                    path.push(source.clone());
                    path.extend(chain);
                    return Some(path);
                }
                stack.push(next);
            }
        }
        None
    }

    /// Any existing cycle, as `[a, b, ..., a]`.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<FormulaId>> {
        let mut state: HashMap<&FormulaId, DfsState> = self
            .nodes
            .iter()
            .map(|n| (n, DfsState::Unvisited))
            .collect();
        let mut stack: Vec<&FormulaId> = Vec::new();

        for node in &self.nodes {
            if state.get(node) == Some(&DfsState::Unvisited)
                && let Some(cycle) = self.dfs(node, &mut state, &mut stack)
            {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs<'a>(
        &'a self,
        node: &'a FormulaId,
        state: &mut HashMap<&'a FormulaId, DfsState>,
        stack: &mut Vec<&'a FormulaId>,
    ) -> Option<Vec<FormulaId>> {
        state.insert(node, DfsState::InStack);
        stack.push(node);

        for neighbor in self.references(node) {
            match state.get(neighbor) {
                Some(DfsState::InStack) => {
                    let pos = stack.iter().position(|&n| n == neighbor)?;
                    let mut cycle: Vec<FormulaId> =
                        stack[pos..].iter().map(|&n| n.clone()).collect();
                    cycle.push(neighbor.clone());
                    return Some(cycle);
                }
                Some(DfsState::Unvisited) => {
                    if let Some(cycle) = self.dfs(neighbor, state, stack) {
                        return Some(cycle);
                    }
                }
                // Targets outside the scope have no outgoing edges.
                Some(DfsState::Done) | None => {}
            }
        }

        stack.pop();
        state.insert(node, DfsState::Done);
        None
    }

    /// Kahn's algorithm: every formula after the formulas it references.
    /// Ties keep scope order. Fails with the offending cycle.
    pub fn topological_order(&self) -> Result<Vec<FormulaId>, LoadError> {
        let known: HashSet<&FormulaId> = self.nodes.iter().collect();

        // dependents[X] = formulas referencing X (X must come before them)
        let mut dependents: HashMap<&FormulaId, Vec<&FormulaId>> = HashMap::new();
        let mut in_degree: HashMap<&FormulaId, usize> =
            self.nodes.iter().map(|n| (n, 0)).collect();

        for node in &self.nodes {
            for dep in self.references(node) {
                if known.contains(dep) {
                    dependents.entry(dep).or_default().push(node);
                    *in_degree.entry(node).or_insert(0) += 1;
                }
            }
        }

        let mut queue: VecDeque<&FormulaId> = self
            .nodes
            .iter()
            .filter(|n| in_degree.get(n) == Some(&0))
            .collect();
        let mut sorted = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            for &dependent in dependents.get(node).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
            sorted.push(node.clone());
        }

        if sorted.len() != self.nodes.len() {
            let path = self.find_cycle().unwrap_or_default();
            return Err(LoadError::CyclicReferences { path });
        }
        Ok(sorted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DfsState {
    Unvisited,
    InStack,
    Done,
}

/// Distinct `formula_ref` targets anywhere in `sequence`, in order of first
/// appearance, nested branches included.
#[must_use]
pub fn collect_formula_refs(sequence: &Sequence) -> Vec<FormulaId> {
    let mut refs: Vec<FormulaId> = Vec::new();
    sequence.walk(|_, _, token| {
        if let TokenKind::FormulaRef { formula_id, .. } = token.kind()
            && !refs.contains(formula_id)
        {
            refs.push(formula_id.clone());
        }
    });
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConditionNode, Operator, Token};

    fn formula(id: &str, refs: &[&str]) -> Formula {
        let mut tokens = Vec::new();
        for (i, r) in refs.iter().enumerate() {
            if i > 0 {
                tokens.push(Token::operator(Operator::Add));
            }
            tokens.push(Token::formula_ref(*r, *r));
        }
        Formula::with_id(id, "owner", id).with_sequence(Sequence::from(tokens))
    }

    fn ids(path: &[FormulaId]) -> Vec<&str> {
        path.iter().map(FormulaId::as_str).collect()
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let graph = ReferenceGraph::build(&[formula("x", &[])]);
        let path = graph.would_close_cycle(&"x".into(), &"x".into()).unwrap();
        assert_eq!(ids(&path), ["x", "x"]);
    }

    #[test]
    fn back_edge_reports_path() {
        let formulas = [formula("x", &["y"]), formula("y", &["z"]), formula("z", &[])];
        let graph = ReferenceGraph::build(&formulas);
        let path = graph.would_close_cycle(&"z".into(), &"x".into()).unwrap();
        assert_eq!(ids(&path), ["z", "x", "y", "z"]);
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let formulas = [
            formula("a", &["b", "c"]),
            formula("b", &["d"]),
            formula("c", &["d"]),
            formula("d", &[]),
        ];
        let graph = ReferenceGraph::build(&formulas);
        assert!(graph.would_close_cycle(&"a".into(), &"d".into()).is_none());
        assert!(graph.find_cycle().is_none());
    }

    #[test]
    fn topological_order_puts_dependencies_first() {
        let formulas = [formula("top", &["mid"]), formula("mid", &["leaf"]), formula("leaf", &[])];
        let order = ReferenceGraph::build(&formulas).topological_order().unwrap();
        assert_eq!(ids(&order), ["leaf", "mid", "top"]);
    }

    #[test]
    fn topological_order_reports_cycle() {
        let formulas = [formula("a", &["b"]), formula("b", &["c"]), formula("c", &["a"])];
        let err = ReferenceGraph::build(&formulas).topological_order().unwrap_err();
        match err {
            LoadError::CyclicReferences { path } => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn dangling_targets_are_ignored() {
        let graph = ReferenceGraph::build(&[formula("a", &["ghost"])]);
        assert!(graph.find_cycle().is_none());
        assert_eq!(graph.topological_order().unwrap().len(), 1);
    }

    #[test]
    fn refs_inside_conditions_count() {
        let cond = ConditionNode::new().with_then(Sequence::from(vec![Token::formula_ref("b", "B")]));
        let seq = Sequence::from(vec![Token::cond(cond), Token::operator(Operator::Add), Token::formula_ref("b", "B")]);
        let refs = collect_formula_refs(&seq);
        assert_eq!(ids(&refs), ["b"]);
    }

    #[test]
    fn referrers() {
        let formulas = [formula("a", &["c"]), formula("b", &["c"]), formula("c", &[])];
        let graph = ReferenceGraph::build(&formulas);
        assert_eq!(ids(&graph.referrers(&"c".into())), ["a", "b"]);
        assert_eq!(graph.edge_count(), 2);
    }
}
