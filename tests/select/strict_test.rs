use sqm::domain::fixtures::{shop_model, strict_shop_model};
use sqm::interpret::{interpret, InterpretError, InterpretOptions};
use sqm::semantic::SemanticError;

fn strict_violation(source: &str) -> String {
    match interpret(source, &strict_shop_model(), InterpretOptions::default()) {
        Err(InterpretError::Semantic(SemanticError::StrictJpaViolation(what))) => what,
        other => panic!("Expected strict violation for '{}', got {:?}", source, other),
    }
}

fn accepted_when_relaxed(source: &str) {
    if let Err(e) = interpret(source, &shop_model(), InterpretOptions::default()) {
        panic!("'{}' should interpret without strict compliance: {}", source, e);
    }
}

#[test]
fn test_strict_rejects_non_standard_constructs() {
    let cases = [
        ("from Order o", "select clause"),
        ("select name from Customer c", "unqualified"),
        ("select c from Customer c join Product p on p.name = c.name", "entity join"),
        ("select o from Order o limit 5", "limit"),
        ("select o from Order o offset 5", "offset"),
        ("select c.orders.number from Customer c", "plural"),
        ("delete Customer c where c.name = :n", "from"),
    ];
    for (source, fragment) in cases {
        let what = strict_violation(source);
        assert!(
            what.contains(fragment),
            "violation for '{}' should mention '{}', got '{}'",
            source,
            fragment,
            what
        );
        accepted_when_relaxed(source);
    }
}

#[test]
fn test_strict_accepts_standard_queries() {
    let model = strict_shop_model();
    for source in [
        "select o from Order o where o.customer.name = :name",
        "select c from Customer c join c.orders o where o.total > 100 order by c.name",
        "select count(o) from Order o group by o.status having count(o) > 1",
        "delete from Customer c where c.name = :n",
        "update Customer c set c.name = :n where c.id = :id",
        "select c from Customer c where c.orders is empty",
    ] {
        if let Err(e) = interpret(source, &model, InterpretOptions::default()) {
            panic!("'{}' should be accepted in strict mode: {}", source, e);
        }
    }
}

#[test]
fn test_option_overrides_model_setting() {
    let strict = InterpretOptions::default().with_strict_jpa_compliance(true);
    let err = interpret("from Order o", &shop_model(), strict).unwrap_err();
    assert!(matches!(
        err,
        InterpretError::Semantic(SemanticError::StrictJpaViolation(_))
    ));

    let relaxed = InterpretOptions::default().with_strict_jpa_compliance(false);
    assert!(interpret("from Order o", &strict_shop_model(), relaxed).is_ok());
}
