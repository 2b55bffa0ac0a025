use std::sync::Arc;

use sqm::domain::fixtures::shop_model;
use sqm::interpret::{interpret, InterpretError, InterpretOptions};
use sqm::parser::JoinType;
use sqm::semantic::SemanticError;
use sqm::sqm::{Binding, FromElementKind, Predicate, SqmQuerySpec, SqmStatement};

fn select(source: &str) -> SqmStatement {
    interpret(source, &shop_model(), InterpretOptions::default())
        .unwrap_or_else(|e| panic!("'{}' should interpret: {}", source, e))
}

fn select_err(source: &str) -> SemanticError {
    match interpret(source, &shop_model(), InterpretOptions::default()) {
        Err(InterpretError::Semantic(err)) => err,
        other => panic!("Expected semantic error for '{}', got {:?}", source, other),
    }
}

fn spec(statement: &SqmStatement) -> &SqmQuerySpec {
    statement.query_spec().expect("select statement")
}

fn comparison_lefts(predicate: &Predicate) -> Vec<Arc<Binding>> {
    match predicate {
        Predicate::Junction { predicates, .. } => predicates.iter().flat_map(comparison_lefts).collect(),
        Predicate::Comparison { left, .. } => left.binding().cloned().into_iter().collect(),
        _ => Vec::new(),
    }
}

#[test]
fn test_repeated_navigation_reuses_implicit_join() {
    let statement = select("select o from Order o where o.customer.name = :a or o.customer.name = :b");
    assert_eq!(statement.from_elements.implicit_join_count(), 1);

    let lefts = comparison_lefts(spec(&statement).where_clause.as_ref().expect("where"));
    assert_eq!(lefts.len(), 2);
    assert!(Arc::ptr_eq(&lefts[0], &lefts[1]));

    let join = lefts[0].source_element();
    let element = statement.element(join);
    assert_eq!(element.entity.name, "Customer");
    match &element.kind {
        FromElementKind::AttributeJoin {
            join_type,
            fetch,
            implicit,
            attribute_path,
            ..
        } => {
            assert_eq!(*join_type, JoinType::Inner);
            assert!(!fetch);
            assert!(implicit);
            assert_eq!(attribute_path, &vec!["customer".to_string()]);
        }
        other => panic!("Expected attribute join, got {:?}", other),
    }
    assert_eq!(element.label(), format!("Customer#{}", join));
}

#[test]
fn test_reuse_spans_where_and_order_by() {
    let statement = select("select o from Order o where o.customer.name = :n order by o.customer.email");
    assert_eq!(statement.from_elements.implicit_join_count(), 1);
}

#[test]
fn test_select_clause_does_not_reuse_filter_joins() {
    let statement = select("select o.customer.name from Order o where o.customer.name = :n");
    assert_eq!(statement.from_elements.implicit_join_count(), 2);

    let query = spec(&statement);
    let selected = query.select.selections[0].expr.binding().expect("path");
    let filtered = &comparison_lefts(query.where_clause.as_ref().expect("where"))[0];
    assert!(!Arc::ptr_eq(selected, filtered));
    assert_ne!(selected.source_element(), filtered.source_element());
}

#[test]
fn test_explicit_join_alias_is_not_reused_by_navigation() {
    let statement = select("select c.name from Order o join o.customer c where o.customer.name = :n");
    let elements = statement.from_elements.elements();
    assert_eq!(elements.len(), 3);
    assert_eq!(statement.from_elements.implicit_join_count(), 1);
}

#[test]
fn test_chained_navigation_joins_each_association() {
    let statement = select("select l from OrderLine l where l.order.customer.name = :n");
    assert_eq!(statement.from_elements.implicit_join_count(), 2);
    let lefts = comparison_lefts(spec(&statement).where_clause.as_ref().expect("where"));
    assert_eq!(lefts[0].describe(&statement.from_elements), "l.order.customer.name");
}

#[test]
fn test_embedded_association_joins_from_owning_element() {
    let statement = select("select c from Customer c where c.address.country.code = 'NZ'");
    let join = statement
        .from_elements
        .elements()
        .iter()
        .find(|e| e.is_implicit_join())
        .expect("implicit join");
    match &join.kind {
        FromElementKind::AttributeJoin {
            lhs, attribute_path, ..
        } => {
            assert_eq!(*lhs, statement.primary_root().expect("root"));
            assert_eq!(attribute_path, &vec!["address".to_string(), "country".to_string()]);
        }
        other => panic!("Expected attribute join, got {:?}", other),
    }
}

#[test]
fn test_explicit_join_kinds() {
    let statement = select(
        "select c from Customer c left outer join fetch c.orders o inner join o.lines l with l.quantity > 1",
    );
    let space = statement.from_elements.space(spec(&statement).from.spaces[0]);
    assert_eq!(space.joins.len(), 2);

    let orders = statement.element(space.joins[0]);
    assert!(matches!(
        orders.kind,
        FromElementKind::AttributeJoin { join_type: JoinType::Left, fetch: true, implicit: false, .. }
    ));
    assert_eq!(orders.entity.name, "Order");
    assert!(orders.on.is_none());

    let lines = statement.element(space.joins[1]);
    assert!(matches!(
        lines.kind,
        FromElementKind::AttributeJoin { join_type: JoinType::Inner, fetch: false, .. }
    ));
    assert!(matches!(lines.on, Some(Predicate::Comparison { .. })));
}

#[test]
fn test_treat_join_narrows_element() {
    let statement = select("select d.breed from Customer c join treat(c.pets as Dog) d");
    let space = statement.from_elements.space(spec(&statement).from.spaces[0]);
    let dog = statement.element(space.joins[0]);
    assert_eq!(dog.entity.name, "Animal");
    assert_eq!(dog.treated_as.as_ref().map(|t| t.name.as_str()), Some("Dog"));
    assert_eq!(
        spec(&statement).select.selections[0].expr.expression_type().to_string(),
        "string"
    );
}

#[test]
fn test_entity_join() {
    let statement = select("select c, p from Customer c left join Product p on p.name = c.name");
    let space = statement.from_elements.space(spec(&statement).from.spaces[0]);
    let joined = statement.element(space.joins[0]);
    assert!(matches!(
        joined.kind,
        FromElementKind::EntityJoin { join_type: JoinType::Left }
    ));
    assert_eq!(joined.entity.name, "Product");
    assert!(joined.on.is_some());
}

#[test]
fn test_on_clause_rejects_association_navigation() {
    assert!(matches!(
        select_err("select o from Order o join o.customer c on c.address.country.code = 'NZ'"),
        SemanticError::NavigationInOnClause { .. }
    ));
}

#[test]
fn test_on_clause_allows_embedded_and_basic_attributes() {
    let statement = select("select o from Order o join o.customer c on c.address.city = o.shippingAddress.city");
    assert_eq!(statement.from_elements.implicit_join_count(), 0);
}

#[test]
fn test_on_clause_rejects_other_space() {
    match select_err("select o from Customer x, Order o join o.customer c on c.name = x.name") {
        SemanticError::CrossSpaceOnClauseReference { path, alias } => {
            assert_eq!(path, "x.name");
            assert_eq!(alias, "x");
        }
        other => panic!("Expected cross-space error, got {:?}", other),
    }
}

#[test]
fn test_explicit_join_rooted_in_other_space() {
    assert!(matches!(
        select_err("select o from Order o, Customer x join o.customer c"),
        SemanticError::CrossSpaceExplicitJoin { .. }
    ));
}

#[test]
fn test_join_on_basic_attribute() {
    assert_eq!(
        select_err("select o from Order o join o.number n"),
        SemanticError::InvalidJoinTarget {
            path: "o.number".into()
        }
    );
}

#[test]
fn test_duplicate_alias() {
    assert_eq!(
        select_err("select o from Order o join o.customer O"),
        SemanticError::DuplicateAlias { alias: "O".into() }
    );
}
