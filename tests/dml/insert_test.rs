use sqm::domain::fixtures::shop_model;
use sqm::interpret::{interpret, InterpretError, InterpretOptions};
use sqm::semantic::SemanticError;
use sqm::sqm::{ExpressionType, StatementKind};

fn interpret_err(source: &str) -> InterpretError {
    interpret(source, &shop_model(), InterpretOptions::default())
        .expect_err("query should be rejected")
}

#[test]
fn test_insert_select_state_fields_belong_to_target() {
    let statement = interpret(
        "insert into Customer (name, email) select p.name, p.sku from Product p where p.active = true",
        &shop_model(),
        InterpretOptions::default(),
    )
    .expect("insert interprets");

    let StatementKind::InsertSelect {
        target,
        state_fields,
        source,
    } = &statement.kind
    else {
        panic!("Expected insert-select, got {}", statement.kind_name());
    };
    assert_eq!(statement.element(*target).entity.name, "Customer");
    assert_eq!(state_fields.len(), source.select.selections.len());
    for field in state_fields {
        assert_eq!(field.source_element(), *target);
        assert!(field.join().is_none());
    }
    let names: Vec<_> = state_fields
        .iter()
        .filter_map(|f| f.attribute().map(|a| a.name.clone()))
        .collect();
    assert_eq!(names, vec!["name", "email"]);
}

#[test]
fn test_insert_source_is_its_own_query() {
    let statement = interpret(
        "insert into Customer (name) select p.name from Product p",
        &shop_model(),
        InterpretOptions::default(),
    )
    .expect("insert interprets");
    let target = statement.target().expect("insert target");
    let source = statement.query_spec().expect("source query");
    let source_root = statement.from_elements.space(source.from.spaces[0]).root;
    assert_ne!(source_root, target);
    assert_ne!(source.id, statement.element(target).spec);
    assert_eq!(
        source.select.selections[0].expr.expression_type(),
        ExpressionType::Basic(sqm::domain::BasicType::String)
    );
}

#[test]
fn test_insert_arity_mismatch() {
    let err = interpret_err("insert into Customer (name) select p.name, p.sku from Product p");
    assert_eq!(
        err,
        InterpretError::Semantic(SemanticError::InsertArityMismatch {
            fields: 1,
            selections: 2,
        })
    );
}

#[test]
fn test_insert_into_association_rejected() {
    let err = interpret_err("insert into Order (customer) select c from Customer c");
    assert!(matches!(
        err,
        InterpretError::Semantic(SemanticError::InvalidInsertTarget { .. })
    ));
}

#[test]
fn test_insert_field_must_be_direct_attribute() {
    let err = interpret_err("insert into Customer (address.city) select p.name from Product p");
    assert!(matches!(
        err,
        InterpretError::Semantic(SemanticError::InvalidInsertTarget { .. })
    ));
}

#[test]
fn test_insert_unknown_field() {
    let err = interpret_err("insert into Customer (nickname) select p.name from Product p");
    assert_eq!(
        err,
        InterpretError::Semantic(SemanticError::UnknownAttribute {
            owner: "Customer".into(),
            attribute: "nickname".into(),
        })
    );
}

#[test]
fn test_insert_values_not_yet_implemented() {
    let err = interpret_err("insert into Customer (name) values ('a'), ('b')");
    assert!(matches!(err, InterpretError::NotYetImplemented(_)));
}
