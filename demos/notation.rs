use formulary::wire::{from_json, to_json};
use formulary::{Formula, parse, validate};

fn main() {
    let inputs = [
        "{price} * {qty}",
        "{price} *",
        "[{qty} > 10 ? {price} * 0.9 : {price}]!ignore",
        "ROUND {price}",
        "{region}.extra + @{f_base}",
        "[{qty} > ",
    ];

    for input in inputs {
        match parse(input) {
            Ok(seq) => {
                let validation = validate(&seq);
                match validation.issue {
                    None => println!("{input:<48} ok       {seq}"),
                    Some(issue) => println!("{input:<48} partial  {issue}"),
                }
            }
            Err(err) => println!("{input:<48} error    {err}"),
        }
    }

    let seq = parse("[{qty} > 10 ? {price} * 0.9 : {price}]").expect("valid notation");
    let formula = Formula::with_id("f_discounted", "price", "Discounted").with_sequence(seq);
    let json = to_json(&formula).expect("failed to encode");
    println!("\n{json}");

    let decoded = from_json(&json).expect("failed to decode");
    assert_eq!(decoded, formula);
}
