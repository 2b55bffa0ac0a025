use std::sync::Arc;

use sqm::criteria::{CriteriaExpr, CriteriaPredicate, CriteriaQuery};
use sqm::domain::fixtures::{shop_model, strict_shop_model};
use sqm::interpret::{interpret, interpret_criteria, split, InterpretError, InterpretOptions};
use sqm::parser::{ComparisonOp, JoinType, Literal, SortOrder};
use sqm::semantic::SemanticError;
use sqm::sqm::{render, AggregateFunction, ExpressionType, FromElementKind, Predicate};

fn order_by_customer_name() -> CriteriaQuery {
    let mut query = CriteriaQuery::new();
    let o = query.from_as("Order", "o");
    let c = query.join(o, "customer", JoinType::Inner);
    query.alias(c, "c");
    query
        .select(CriteriaExpr::path(c, ["name"]))
        .restrict(CriteriaPredicate::eq(
            CriteriaExpr::path(o, ["number"]),
            CriteriaExpr::parameter("n"),
        ));
    query
}

#[test]
fn test_criteria_matches_equivalent_text_query() {
    let model = shop_model();
    let from_criteria = interpret_criteria(&order_by_customer_name(), &model, InterpretOptions::default())
        .expect("criteria normalizes");
    let from_text = interpret(
        "select c.name from Order o join o.customer c where o.number = :n",
        &model,
        InterpretOptions::default(),
    )
    .expect("text interprets");
    assert_eq!(render(&from_criteria), render(&from_text));
    assert_eq!(from_criteria.parameters, from_text.parameters);
}

#[test]
fn test_criteria_navigation_materializes_implicit_joins() {
    let mut query = CriteriaQuery::new();
    let o = query.from("Order");
    query
        .select(CriteriaExpr::source(o))
        .restrict(CriteriaPredicate::eq(
            CriteriaExpr::path(o, ["customer", "address", "city"]),
            CriteriaExpr::literal(Literal::String("Wellington".into())),
        ))
        .restrict(CriteriaPredicate::is_null(CriteriaExpr::path(o, ["customer", "email"])));

    let statement = interpret_criteria(&query, &shop_model(), InterpretOptions::default())
        .expect("criteria normalizes");
    assert_eq!(statement.from_elements.implicit_join_count(), 1);
    let join = statement
        .from_elements
        .elements()
        .iter()
        .find(|e| e.is_implicit_join())
        .expect("implicit join");
    assert!(matches!(
        join.kind,
        FromElementKind::AttributeJoin { join_type: JoinType::Inner, implicit: true, .. }
    ));
    assert!(matches!(
        statement.where_clause(),
        Some(Predicate::Junction { predicates, .. }) if predicates.len() == 2
    ));
}

#[test]
fn test_criteria_aggregates_grouping_and_ordering() {
    let mut query = CriteriaQuery::new();
    let o = query.from("Order");
    query
        .select(CriteriaExpr::path(o, ["status"]))
        .select_as(CriteriaExpr::aggregate(AggregateFunction::Sum, CriteriaExpr::path(o, ["total"])), "revenue")
        .select(CriteriaExpr::count_star())
        .group_by(CriteriaExpr::path(o, ["status"]))
        .having(CriteriaPredicate::compare(
            CriteriaExpr::count_star(),
            ComparisonOp::Gt,
            CriteriaExpr::literal(Literal::Integer(1)),
        ))
        .order_by(CriteriaExpr::path(o, ["status"]), SortOrder::Desc);

    let statement = interpret_criteria(&query, &shop_model(), InterpretOptions::default())
        .expect("criteria normalizes");
    let spec = statement.query_spec().expect("select");
    let types: Vec<_> = spec
        .select
        .selections
        .iter()
        .map(|s| s.expr.expression_type().to_string())
        .collect();
    assert_eq!(types, vec!["string", "decimal", "long"]);
    assert_eq!(spec.select.selections[1].alias.as_deref(), Some("revenue"));
    assert_eq!(spec.group_by.len(), 1);
    assert!(spec.having.is_some());
    assert_eq!(spec.order_by[0].order, SortOrder::Desc);
}

#[test]
fn test_criteria_parameter_types_anticipated() {
    let mut query = CriteriaQuery::new();
    let l = query.from("OrderLine");
    query.select(CriteriaExpr::source(l)).restrict(CriteriaPredicate::Between {
        expr: CriteriaExpr::path(l, ["quantity"]),
        low: CriteriaExpr::parameter("low"),
        high: CriteriaExpr::parameter("high"),
    });
    let statement = interpret_criteria(&query, &shop_model(), InterpretOptions::default())
        .expect("criteria normalizes");
    let types: Vec<_> = statement
        .parameters
        .iter()
        .map(|p| p.anticipated_type.clone())
        .collect();
    assert_eq!(
        types,
        vec![
            ExpressionType::Basic(sqm::domain::BasicType::Integer),
            ExpressionType::Basic(sqm::domain::BasicType::Integer)
        ]
    );
}

#[test]
fn test_criteria_join_of_collection_then_navigation() {
    let mut query = CriteriaQuery::new();
    let c = query.from("Customer");
    let o = query.join(c, "orders", JoinType::Left);
    let l = query.fetch(o, "lines", JoinType::Left);
    query.select(CriteriaExpr::source(c)).restrict(CriteriaPredicate::eq(
        CriteriaExpr::path(l, ["product", "sku"]),
        CriteriaExpr::parameter("sku"),
    ));
    let statement = interpret_criteria(&query, &shop_model(), InterpretOptions::default())
        .expect("criteria normalizes");

    let spec = statement.query_spec().expect("select");
    let space = statement.from_elements.space(spec.from.spaces[0]);
    assert_eq!(space.joins.len(), 3);
    assert!(matches!(
        statement.element(space.joins[1]).kind,
        FromElementKind::AttributeJoin { fetch: true, join_type: JoinType::Left, .. }
    ));
    assert!(statement.element(space.joins[2]).is_implicit_join());
}

#[test]
fn test_criteria_strict_requires_selection() {
    let mut query = CriteriaQuery::new();
    query.from("Order");
    let err = interpret_criteria(&query, &strict_shop_model(), InterpretOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        InterpretError::Semantic(SemanticError::StrictJpaViolation(_))
    ));
    assert!(interpret_criteria(&query, &shop_model(), InterpretOptions::default()).is_ok());
}

#[test]
fn test_criteria_duplicate_alias() {
    let mut query = CriteriaQuery::new();
    query.from_as("Order", "x");
    query.from_as("Customer", "X");
    let err = interpret_criteria(&query, &shop_model(), InterpretOptions::default()).unwrap_err();
    assert_eq!(
        err,
        InterpretError::Semantic(SemanticError::DuplicateAlias { alias: "X".into() })
    );
}

#[test]
fn test_criteria_unknown_attribute() {
    let mut query = CriteriaQuery::new();
    let o = query.from("Order");
    query.select(CriteriaExpr::path(o, ["nickname"]));
    let err = interpret_criteria(&query, &shop_model(), InterpretOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        InterpretError::Semantic(SemanticError::UnknownAttribute { .. })
    ));
}

#[test]
fn test_criteria_result_can_be_split() {
    let mut query = CriteriaQuery::new();
    let p = query.from("Payment");
    query.select(CriteriaExpr::path(p, ["amount"]));
    let statement = Arc::new(
        interpret_criteria(&query, &shop_model(), InterpretOptions::default()).expect("criteria normalizes"),
    );
    let result = split(&statement, &shop_model()).expect("split");
    assert_eq!(result.len(), 2);
}
