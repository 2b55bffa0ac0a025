use sqm::domain::fixtures::{shop_model, strict_shop_model};
use sqm::interpret::{interpret, InterpretError, InterpretOptions};
use sqm::semantic::SemanticError;
use sqm::sqm::{Expr, ParameterKey, Predicate, SqmStatement, StatementKind};

fn delete(source: &str) -> SqmStatement {
    interpret(source, &shop_model(), InterpretOptions::default())
        .unwrap_or_else(|e| panic!("'{}' should interpret: {}", source, e))
}

#[test]
fn test_delete_spellings_build_same_shape() {
    for source in [
        "delete Customer where name = :n",
        "delete from Customer where name = :n",
        "delete Customer c where c.name = :n",
        "delete from Customer as c where c.name = :n",
    ] {
        let statement = delete(source);
        let StatementKind::Delete {
            target,
            where_clause,
        } = &statement.kind
        else {
            panic!("Expected delete for '{}', got {}", source, statement.kind_name());
        };
        assert_eq!(statement.element(*target).entity.name, "Customer");

        match where_clause {
            Some(Predicate::Comparison { left, right, .. }) => {
                let binding = left.binding().expect("left side is a path");
                assert_eq!(binding.root_element(), *target, "in '{}'", source);
                assert_eq!(binding.attribute().map(|a| a.name.as_str()), Some("name"));
                assert!(matches!(
                    right,
                    Expr::Parameter { key: ParameterKey::Named(name), .. } if name == "n"
                ));
            }
            other => panic!("Expected comparison for '{}', got {:?}", source, other),
        }
    }
}

#[test]
fn test_delete_without_where() {
    let statement = delete("delete from Order");
    assert!(statement.where_clause().is_none());
    assert_eq!(statement.from_elements.elements().len(), 1);
}

#[test]
fn test_delete_parameter_type_anticipated_from_target_attribute() {
    let statement = delete("delete from Order o where o.total > :min");
    assert_eq!(statement.parameters.len(), 1);
    assert_eq!(statement.parameters[0].anticipated_type.to_string(), "decimal");
}

#[test]
fn test_delete_rejects_association_navigation() {
    let err = interpret(
        "delete from Order o where o.customer.name = :n",
        &shop_model(),
        InterpretOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        InterpretError::Semantic(SemanticError::JoinInDmlStatement { .. })
    ));
}

#[test]
fn test_delete_with_subquery_may_join_inside_it() {
    let statement = delete(
        "delete from Customer c where exists (select o from Order o where o.customer = c and o.payment.amount > 100)",
    );
    let target = statement.target().expect("delete target");
    let space = statement.element(target).space;
    assert!(statement.from_elements.space(space).joins.is_empty());
    assert_eq!(statement.from_elements.implicit_join_count(), 2);
}

#[test]
fn test_delete_unknown_entity() {
    let err = interpret("delete from Invoice", &shop_model(), InterpretOptions::default()).unwrap_err();
    assert_eq!(
        err,
        InterpretError::Semantic(SemanticError::UnknownEntity("Invoice".into()))
    );
}

#[test]
fn test_delete_without_from_rejected_when_strict() {
    let err = interpret(
        "delete Customer c where c.name = :n",
        &strict_shop_model(),
        InterpretOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        InterpretError::Semantic(SemanticError::StrictJpaViolation(_))
    ));
    assert!(interpret(
        "delete from Customer c where c.name = :n",
        &strict_shop_model(),
        InterpretOptions::default(),
    )
    .is_ok());
}
