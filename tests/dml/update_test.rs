use sqm::domain::fixtures::shop_model;
use sqm::interpret::{interpret, InterpretError, InterpretOptions};
use sqm::semantic::SemanticError;
use sqm::sqm::{Expr, ExpressionType, SqmStatement, StatementKind};

fn update(source: &str) -> SqmStatement {
    interpret(source, &shop_model(), InterpretOptions::default())
        .unwrap_or_else(|e| panic!("'{}' should interpret: {}", source, e))
}

fn update_err(source: &str) -> InterpretError {
    interpret(source, &shop_model(), InterpretOptions::default())
        .expect_err("update should be rejected")
}

#[test]
fn test_single_assignment_targets_update_entity() {
    for source in [
        "update Customer c set c.name = 'x' where c.id = :id",
        "update Customer set name = 'x' where id = :id",
    ] {
        let statement = update(source);
        let StatementKind::Update {
            target,
            assignments,
            where_clause,
        } = &statement.kind
        else {
            panic!("Expected update, got {}", statement.kind_name());
        };
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].target.owning_element(), *target);
        assert_eq!(
            assignments[0].target.attribute().map(|a| a.name.as_str()),
            Some("name")
        );
        assert!(where_clause.is_some());
        assert_eq!(statement.parameters.len(), 1);
        assert_eq!(statement.parameters[0].anticipated_type.to_string(), "long");
    }
}

#[test]
fn test_assignment_through_embedded_attribute() {
    let statement = update("update Customer c set c.address.city = :city");
    let StatementKind::Update {
        target,
        assignments,
        ..
    } = &statement.kind
    else {
        panic!("Expected update");
    };
    let binding = &assignments[0].target;
    assert_eq!(binding.owning_element(), *target);
    assert_eq!(binding.describe(&statement.from_elements), "c.address.city");
    assert!(matches!(
        &assignments[0].value,
        Expr::Parameter { ty: ExpressionType::Basic(_), .. }
    ));
    assert!(statement.from_elements.space(statement.element(*target).space).joins.is_empty());
}

#[test]
fn test_assignment_value_may_use_target_attributes() {
    let statement = update("update Order o set o.total = o.total * 2, o.status = 'REPRICED'");
    let StatementKind::Update { assignments, .. } = &statement.kind else {
        panic!("Expected update");
    };
    assert_eq!(assignments.len(), 2);
    assert_eq!(assignments[0].value.expression_type().to_string(), "decimal");
}

#[test]
fn test_assignment_type_mismatch() {
    let err = update_err("update Customer c set c.name = 5");
    assert_eq!(
        err,
        InterpretError::Semantic(SemanticError::ComparisonTypeMismatch {
            left: "string".into(),
            right: "integer".into(),
        })
    );
}

#[test]
fn test_embedded_target_rejects_basic_value() {
    let err = update_err("update Customer c set c.address = 'x'");
    assert_eq!(
        err,
        InterpretError::Semantic(SemanticError::ComparisonTypeMismatch {
            left: "Address".into(),
            right: "string".into(),
        })
    );

    let statement = update("update Customer c set c.address = :address");
    assert_eq!(statement.parameters[0].anticipated_type.to_string(), "Address");
    update("update Customer c set c.address = null");
}

#[test]
fn test_assigning_association_rejected() {
    let err = update_err("update Order o set o.customer = null");
    assert!(matches!(
        err,
        InterpretError::Semantic(SemanticError::InvalidAssignmentTarget { .. })
    ));
}

#[test]
fn test_assigning_collection_rejected() {
    let err = update_err("update Customer c set c.orders = null");
    assert!(matches!(
        err,
        InterpretError::Semantic(SemanticError::InvalidAssignmentTarget { .. })
    ));
}

#[test]
fn test_assigning_through_association_rejected() {
    let err = update_err("update Order o set o.customer.name = 'x'");
    assert!(matches!(
        err,
        InterpretError::Semantic(SemanticError::InvalidAssignmentTarget { .. })
    ));
}

#[test]
fn test_update_where_cannot_join() {
    let err = update_err("update Order o set o.status = 'X' where o.customer.name = :n");
    assert!(matches!(
        err,
        InterpretError::Semantic(SemanticError::JoinInDmlStatement { .. })
    ));
}

#[test]
fn test_versioned_update_not_yet_implemented() {
    let err = update_err("update versioned Customer c set c.name = 'x'");
    assert!(matches!(err, InterpretError::NotYetImplemented(_)));
}
