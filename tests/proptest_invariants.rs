
use formulary::{
    EditError, FieldInfo, FieldKind, FieldOption, FieldRegistry, FormulaId, FormulaScope, Part,
    SeqPath, Sequence, SwitchNode, Token, is_complete, validate,
};
use proptest::prelude::*;
use strategies::{
    CaseOp, arb_any_token, arb_case_ops, arb_flat_sequence, arb_nested_sequence, arb_ref_attempts,
    arb_token_soup,
};

/// Reference rule for well-formedness, written independently of the validator.
fn oracle_complete(seq: &Sequence) -> bool {
    let tokens = seq.as_slice();
    match tokens.first() {
        None => false,
        Some(first) if first.is_function() => true,
        Some(_) => {
            tokens.len() >= 3
                && tokens.len() % 2 == 1
                && tokens.iter().enumerate().all(|(i, t)| {
                    if i % 2 == 0 {
                        t.is_value_like()
                    } else {
                        t.is_operator()
                    }
                })
        }
    }
}

fn ids(seq: &Sequence) -> Vec<String> {
    seq.iter().map(|t| t.id().to_string()).collect()
}

// ---------------------------------------------------------------------------
// Invariant 1: Alternation
//
// A sequence is complete exactly when it starts with a function, or has at
// least three tokens alternating value-like / operator and ends on a value.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn validator_matches_oracle(seq in arb_token_soup()) {
        let validation = validate(&seq);
        prop_assert_eq!(validation.complete, oracle_complete(&seq), "sequence: {}", seq);
        prop_assert_eq!(validation.complete, validation.issue.is_none());
    }

    #[test]
    fn generated_alternation_is_complete_from_three_tokens(seq in arb_flat_sequence()) {
        prop_assert_eq!(is_complete(&seq), seq.len() >= 3);
    }

    #[test]
    fn trailing_operator_is_incomplete(seq in arb_flat_sequence(), op in strategies::arb_operator()) {
        let dangling = seq.append(Token::operator(op));
        prop_assert!(!is_complete(&dangling));
    }
}

// ---------------------------------------------------------------------------
// Invariant 2: Append / remove
//
// Removing the token just appended restores the original sequence, and the
// input of every edit is left untouched.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn remove_after_append_restores(seq in arb_token_soup(), token in arb_any_token()) {
        let before = ids(&seq);
        let appended = seq.append(token);
        prop_assert_eq!(appended.len(), seq.len() + 1);
        prop_assert_eq!(appended.remove_at(seq.len()), seq.clone());
        prop_assert_eq!(ids(&seq), before);
    }

    #[test]
    fn insert_then_remove_restores(seq in arb_token_soup(), token in arb_any_token(), index in 0usize..12) {
        let inserted = seq.insert_at(index, token);
        let at = index.min(seq.len());
        prop_assert_eq!(inserted.remove_at(at), seq);
    }

    #[test]
    fn move_keeps_tokens(seq in arb_token_soup(), from in 0usize..10, to in 0usize..10) {
        let moved = seq.move_within(from, to);
        let mut a = ids(&seq);
        let mut b = ids(&moved);
        a.sort();
        b.sort();
        prop_assert_eq!(a, b);
        if from >= seq.len() {
            prop_assert!(moved.ptr_eq(&seq));
        }
    }

    #[test]
    fn out_of_range_remove_is_noop(seq in arb_token_soup()) {
        prop_assert_eq!(seq.remove_at(seq.len()), seq);
    }
}

// ---------------------------------------------------------------------------
// Invariant 3: Case uniqueness
//
// No sequence of case edits can produce two cases with the same value.
// ---------------------------------------------------------------------------

fn bound_switch() -> SwitchNode {
    let registry = FieldRegistry::new().with(FieldInfo::new(
        "roof",
        FieldKind::AdvancedSelect,
        "Roof",
    ));
    SwitchNode::new()
        .bind_source(&registry, "roof", Part::Selection)
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn case_values_stay_unique(ops in arb_case_ops()) {
        let mut node = bound_switch();
        for op in ops {
            let next = match &op {
                CaseOp::Add(v) => node.add_case(v.clone(), None),
                CaseOp::Remove(v) => Ok(node.remove_case(v)),
                CaseOp::Rename(a, b) => node.rename_case(a, b.clone()),
                CaseOp::Bulk(values) => {
                    let options: Vec<FieldOption> =
                        values.iter().map(|v| FieldOption::new(v.clone(), v.to_uppercase())).collect();
                    node.bulk_add_cases(&options)
                }
            };
            match next {
                Ok(updated) => node = updated,
                Err(EditError::DuplicateCase { value }) => {
                    prop_assert!(node.case(&value).is_some());
                }
                Err(EditError::UnknownCase { value }) => {
                    prop_assert!(node.case(&value).is_none());
                }
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }

            let mut values: Vec<&str> = node.cases().iter().map(|c| c.match_value()).collect();
            let total = values.len();
            values.sort_unstable();
            values.dedup();
            prop_assert_eq!(values.len(), total, "duplicate case after {:?}", op);
        }
    }
}

// ---------------------------------------------------------------------------
// Invariant 4: Acyclicity
//
// Whatever references are attempted, the scope's reference graph stays
// acyclic, and a rejected attempt changes nothing.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn references_never_form_a_cycle(attempts in arb_ref_attempts(4)) {
        let mut scope = FormulaScope::new("total");
        let ids: Vec<FormulaId> = (0..4).map(|i| scope.create(format!("F{i}"))).collect();

        for (s, t) in attempts {
            let (source, target) = (&ids[s], &ids[t]);
            let before = scope.get(source).unwrap().sequence.clone();
            let end = before.len();
            match scope.set_formula_ref(source, &SeqPath::root(), end, target, None) {
                Ok(_) => {
                    prop_assert_ne!(s, t);
                    prop_assert_eq!(scope.get(source).unwrap().sequence.len(), end + 1);
                }
                Err(EditError::CyclicReference { path }) => {
                    prop_assert_eq!(path.first(), Some(source));
                    prop_assert_eq!(path.last(), Some(source));
                    prop_assert!(scope.get(source).unwrap().sequence.ptr_eq(&before));
                }
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
            prop_assert!(scope.reference_graph().find_cycle().is_none());
        }
        prop_assert!(scope.evaluation_order().is_ok());
    }
}

// ---------------------------------------------------------------------------
// Invariant 5: Structural sharing
//
// Editing one nested node rebuilds only the path to it; siblings stay
// pointer-identical.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn nested_edit_shares_siblings(
        a in arb_flat_sequence(),
        b in arb_flat_sequence(),
        extra in arb_any_token(),
    ) {
        use formulary::{Branch, ConditionNode, FalsePolicy, Operator};

        let left = Token::cond(ConditionNode::from_parts(a.clone(), b.clone(), Sequence::new(), FalsePolicy::Zero));
        let right = Token::cond(ConditionNode::from_parts(b, a.clone(), Sequence::new(), FalsePolicy::Zero));
        let root = Sequence::from(vec![left, Token::operator(Operator::Add), right]);

        let path = SeqPath::root().then(0, Branch::Then);
        let edited = root.update_at(&path, |s| Ok(s.append(extra))).unwrap();

        let old_right = root.get(2).unwrap().as_cond().unwrap();
        let new_right = edited.get(2).unwrap().as_cond().unwrap();
        prop_assert!(std::ptr::eq(old_right, new_right));

        let new_left = edited.get(0).unwrap().as_cond().unwrap();
        prop_assert!(new_left.expr().ptr_eq(&a));
        prop_assert_eq!(new_left.then_branch().len(), root.get(0).unwrap().as_cond().unwrap().then_branch().len() + 1);
        prop_assert_eq!(edited.get(0).unwrap().id(), root.get(0).unwrap().id());
    }

    #[test]
    fn noop_edit_returns_same_tree(seq in arb_nested_sequence(3)) {
        let same = seq.update_at(&SeqPath::root(), |s| Ok(s.clone())).unwrap();
        prop_assert!(same.ptr_eq(&seq));
    }
}
