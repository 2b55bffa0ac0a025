use std::sync::Arc;

use sqm::domain::fixtures::shop_model;
use sqm::interpret::{interpret, InterpretError, InterpretOptions};
use sqm::semantic::SemanticError;
use sqm::sqm::{Expr, ExpressionType, Predicate, SqmQuerySpec, SqmStatement};

fn select(source: &str) -> SqmStatement {
    interpret(source, &shop_model(), InterpretOptions::default())
        .unwrap_or_else(|e| panic!("'{}' should interpret: {}", source, e))
}

fn exists_subquery(spec: &SqmQuerySpec) -> &SqmQuerySpec {
    match &spec.where_clause {
        Some(Predicate::Exists { subquery, .. }) => subquery,
        other => panic!("Expected exists, got {:?}", other),
    }
}

#[test]
fn test_inner_alias_shadows_outer() {
    let statement = select(
        "select o from Order o where exists (select o from OrderLine o where o.quantity > 1)",
    );
    let outer = statement.query_spec().expect("select");
    let inner = exists_subquery(outer);

    assert_eq!(
        outer.select.selections[0].expr.expression_type(),
        ExpressionType::Entity("Order".into())
    );
    assert_eq!(
        inner.select.selections[0].expr.expression_type(),
        ExpressionType::Entity("OrderLine".into())
    );

    let outer_root = statement.from_elements.space(outer.from.spaces[0]).root;
    let inner_root = statement.from_elements.space(inner.from.spaces[0]).root;
    let selected = inner.select.selections[0].expr.binding().expect("path");
    assert_eq!(selected.root_element(), inner_root);
    assert_ne!(selected.root_element(), outer_root);
}

#[test]
fn test_outer_alias_unchanged_after_shadowing_subquery() {
    let statement = select(
        "select o from Order o where o.total > 1 and exists (select o from OrderLine o where o.quantity > 1) and o.total < 5",
    );
    let outer = statement.query_spec().expect("select");
    let outer_root = statement.from_elements.space(outer.from.spaces[0]).root;

    let Some(Predicate::Junction { predicates, .. }) = &outer.where_clause else {
        panic!("Expected conjunction");
    };
    assert_eq!(predicates.len(), 3);
    let left_binding = |predicate: &Predicate| match predicate {
        Predicate::Comparison { left, .. } => Arc::clone(left.binding().expect("path")),
        other => panic!("Expected comparison, got {:?}", other),
    };
    let before = left_binding(&predicates[0]);
    let after = left_binding(&predicates[2]);

    let Predicate::Exists { subquery, .. } = &predicates[1] else {
        panic!("Expected exists, got {:?}", predicates[1]);
    };
    let inner_root = statement.from_elements.space(subquery.from.spaces[0]).root;
    let inner = match &subquery.where_clause {
        Some(Predicate::Comparison { left, .. }) => left.binding().expect("path").root_element(),
        other => panic!("Expected comparison, got {:?}", other),
    };

    assert_eq!(before.root_element(), outer_root);
    assert_eq!(inner, inner_root);
    assert_ne!(inner, outer_root);
    assert_eq!(after.root_element(), outer_root);
    assert!(Arc::ptr_eq(&before, &after));
}

#[test]
fn test_outer_alias_visible_in_subquery() {
    let statement = select(
        "select o from Order o where exists (select l from OrderLine l where l.order = o and l.price > o.total)",
    );
    let outer = statement.query_spec().expect("select");
    let inner = exists_subquery(outer);
    let outer_root = statement.from_elements.space(outer.from.spaces[0]).root;

    let Some(Predicate::Junction { predicates, .. }) = &inner.where_clause else {
        panic!("Expected conjunction in subquery");
    };
    match &predicates[0] {
        Predicate::Comparison { right, .. } => {
            let binding = right.binding().expect("correlated alias");
            assert!(binding.is_from_element());
            assert_eq!(binding.root_element(), outer_root);
        }
        other => panic!("Expected comparison, got {:?}", other),
    }
}

#[test]
fn test_subquery_ids_are_distinct() {
    let source = "select o from Order o where o.total > (select avg(x.total) from Order x)";
    let statement = select(source);
    let outer = statement.query_spec().expect("select");
    let Some(Predicate::Comparison {
        right: Expr::Subquery(inner),
        ..
    }) = &outer.where_clause
    else {
        panic!("Expected scalar subquery");
    };
    assert_eq!(inner.id.0, source.rfind("select").expect("inner select"));
    assert_ne!(inner.id, outer.id);
    assert_eq!(
        statement.element(statement.from_elements.space(inner.from.spaces[0]).root).spec,
        inner.id
    );
}

#[test]
fn test_inner_alias_not_visible_outside() {
    let err = interpret(
        "select l from Order o where exists (select l from OrderLine l)",
        &shop_model(),
        InterpretOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        InterpretError::Semantic(SemanticError::UnresolvableIdentifier(_))
    ));
}

#[test]
fn test_sibling_subqueries_do_not_see_each_other() {
    let err = interpret(
        "select o from Order o where exists (select l from OrderLine l) and exists (select p from Product p where p = l.product)",
        &shop_model(),
        InterpretOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        InterpretError::Semantic(SemanticError::UnresolvableIdentifier(_))
    ));
}

#[test]
fn test_unqualified_attribute_only_searches_current_scope() {
    let statement = select(
        "select o from Order o where exists (select l from OrderLine l where quantity > 1)",
    );
    let outer = statement.query_spec().expect("select");
    let inner = exists_subquery(outer);
    let inner_root = statement.from_elements.space(inner.from.spaces[0]).root;
    match &inner.where_clause {
        Some(Predicate::Comparison { left, .. }) => {
            assert_eq!(left.binding().expect("path").root_element(), inner_root);
        }
        other => panic!("Expected comparison, got {:?}", other),
    }
}

#[test]
fn test_same_alias_in_sibling_scopes() {
    let statement = select(
        "select o from Order o where exists (select x from OrderLine x) and exists (select x from Product x)",
    );
    let outer = statement.query_spec().expect("select");
    let Some(Predicate::Junction { predicates, .. }) = &outer.where_clause else {
        panic!("Expected conjunction");
    };
    let types: Vec<_> = predicates
        .iter()
        .filter_map(|p| match p {
            Predicate::Exists { subquery, .. } => Some(subquery.select.selections[0].expr.expression_type()),
            _ => None,
        })
        .collect();
    assert_eq!(
        types,
        vec![
            ExpressionType::Entity("OrderLine".into()),
            ExpressionType::Entity("Product".into())
        ]
    );
}
