use criterion::{black_box, criterion_group, criterion_main, Criterion};
use formulary::{
    Branch, ConditionNode, FalsePolicy, Formula, FormulaId, Operator, ReferenceGraph, SeqPath,
    Sequence, Token,
};

/// `n` formulas where `f{i}` references `f{i+1}`.
fn build_chain(n: usize) -> (Vec<Formula>, Vec<FormulaId>) {
    let ids: Vec<FormulaId> = (0..n).map(|i| FormulaId::from(format!("f{i}"))).collect();
    let formulas = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let formula = Formula::with_id(id.clone(), "total", format!("F{i}"));
            match ids.get(i + 1) {
                Some(next) => formula.with_sequence(Sequence::from(vec![
                    Token::formula_ref(next.clone(), format!("F{}", i + 1)),
                    Token::operator(Operator::Add),
                    Token::value(1_i64),
                ])),
                None => formula.with_sequence(Sequence::from(vec![Token::value(1_i64)])),
            }
        })
        .collect();
    (formulas, ids)
}

/// A condition nested `depth` levels deep through its then-branch, with a
/// sibling operand at every level.
fn build_nested(depth: usize) -> (Sequence, SeqPath) {
    let mut seq = Sequence::from(vec![Token::value(0_i64)]);
    let mut path = SeqPath::root();
    for _ in 0..depth {
        let node = ConditionNode::from_parts(
            Sequence::from(vec![
                Token::field("area", "Area"),
                Token::operator(Operator::Gt),
                Token::value(10_i64),
            ]),
            seq,
            Sequence::from(vec![Token::value(1_i64)]),
            FalsePolicy::Zero,
        );
        seq = Sequence::from(vec![
            Token::cond(node),
            Token::operator(Operator::Add),
            Token::field("qty", "Quantity"),
        ]);
        path = path.then(0, Branch::Then);
    }
    (seq, path)
}

fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("reference_graph");

    for &n in &[10, 100, 500] {
        let (formulas, ids) = build_chain(n);
        let graph = ReferenceGraph::build(&formulas);
        let (first, last) = (&ids[0], &ids[n - 1]);

        group.bench_function(&format!("{n}_build"), |b| {
            b.iter(|| ReferenceGraph::build(black_box(&formulas)));
        });
        group.bench_function(&format!("{n}_would_close_cycle"), |b| {
            b.iter(|| graph.would_close_cycle(black_box(last), black_box(first)));
        });
        group.bench_function(&format!("{n}_topological_order"), |b| {
            b.iter(|| graph.topological_order());
        });
    }

    group.finish();
}

fn bench_nested_edit(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_edit");

    for &depth in &[4, 16, 64] {
        let (seq, path) = build_nested(depth);
        group.bench_function(&format!("depth_{depth}_append"), |b| {
            b.iter(|| {
                seq.update_at(black_box(&path), |s| Ok(s.append(Token::value(2_i64))))
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_graph, bench_nested_edit);
criterion_main!(benches);
