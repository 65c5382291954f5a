use modelcore_parse::parse;

#[test]
fn parses_a_realistic_debt_schedule_formula() {
    let e = parse("R80 + R81 - R82").unwrap();
    assert_eq!(e.to_string(), "((R80 + R81) - R82)");
}

#[test]
fn parses_nested_array_and_scalar_builtins() {
    let e = parse("IF(R1>0, MIN(SHIFT(R2,1), R3), 0)").unwrap();
    assert_eq!(e.to_string(), "IF((R1 > 0),MIN(SHIFT(R2,1),R3),0)");
}

#[test]
fn parses_time_constant_refs() {
    let e = parse("R1 / T.MiY").unwrap();
    assert_eq!(e.to_string(), "(R1 / T.MiY)");
}

#[test]
fn parses_indexation_formula() {
    let e = parse("(1+2.5/100)^4").unwrap();
    assert_eq!(e.to_string(), "((1 + (2.5 / 100)) ^ 4)");
}
