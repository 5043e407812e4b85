use formulary::{
    Branch, FieldInfo, FieldKind, FieldOption, FieldRegistry, Operator, Part, Pick, SeqPath,
    Sequence, SwitchNode, Token, Workspace, build_token, diagnose, field_dependencies, parse,
};

fn main() {
    let catalog = FieldRegistry::new()
        .with(FieldInfo::new("area", FieldKind::Number, "Roof area"))
        .with(
            FieldInfo::new("roof", FieldKind::AdvancedSelect, "Roof material").with_options(vec![
                FieldOption::new("clay", "Clay tiles"),
                FieldOption::new("metal", "Metal sheet"),
            ]),
        );

    let mut workspace = Workspace::new();
    let scope = workspace.scope_mut(&"total".into());
    let base = scope.create("Base price");
    let total = scope.create("Total");

    // Base price = area * 42
    for pick in [Pick::field("area"), Pick::operator("*"), Pick::value(42_i64)] {
        let token = build_token(&pick, &catalog).expect("failed to build token");
        scope
            .append(&base, &SeqPath::root(), token)
            .expect("failed to append token");
    }

    // Total = switch on roof material + @Base price
    let switch = SwitchNode::new()
        .bind_source(&catalog, "roof", Part::Selection)
        .and_then(|s| s.bulk_add_cases_from_catalog(&catalog))
        .expect("failed to bind switch");
    scope
        .edit(&total, &SeqPath::root(), |_| {
            Ok(Sequence::from(vec![Token::switch(switch), Token::operator(Operator::Add)]))
        })
        .expect("failed to seed formula");
    scope
        .set_formula_ref(&total, &SeqPath::root(), 2, &base, None)
        .expect("failed to reference base");

    let clay = SeqPath::root().then(0, Branch::Case("clay".into()));
    scope
        .edit(&total, &clay, |_| Ok(parse("{area} * 1.5").expect("valid notation")))
        .expect("failed to fill clay case");

    let formula = scope.get(&total).expect("formula exists");
    println!("{}: {}", formula.name, formula.sequence);

    let deps = field_dependencies(formula, scope);
    println!("reads: {:?}", deps.all);
    println!("order: {:?}", scope.evaluation_order().expect("acyclic"));

    for diagnostic in diagnose(formula, &catalog, scope) {
        println!("note: {diagnostic}");
    }

    match scope.set_formula_ref(&base, &SeqPath::root(), 0, &total, None) {
        Ok(_) => println!("unexpected: cycle accepted"),
        Err(err) => println!("rejected: {err}"),
    }
}
