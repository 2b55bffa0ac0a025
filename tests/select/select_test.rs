use std::sync::Arc;

use sqm::domain::fixtures::shop_model;
use sqm::domain::BasicType;
use sqm::interpret::{interpret, InterpretError, InterpretOptions};
use sqm::semantic::SemanticError;
use sqm::sqm::{
    AggregateFunction, Binding, Expr, ExpressionType, ParameterKey, Predicate, SqmQuerySpec,
    SqmStatement,
};

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

fn basic(ty: BasicType) -> ExpressionType {
    ExpressionType::Basic(ty)
}

#[test]
fn test_identification_variable_selects_from_element() {
    let statement = select("select o from Order o");
    let query = spec(&statement);
    let binding = query.select.selections[0].expr.binding().expect("path");
    let root = statement.primary_root().expect("root");
    assert!(matches!(
        binding.as_ref(),
        Binding::FromElement { element, treated_as: None } if *element == root
    ));
    assert_eq!(
        query.select.selections[0].expr.expression_type(),
        ExpressionType::Entity("Order".into())
    );
}

#[test]
fn test_from_without_select_selects_roots() {
    let statement = select("from Order o, Customer c");
    let query = spec(&statement);
    assert_eq!(query.from.spaces.len(), 2);
    let types: Vec<_> = query
        .select
        .selections
        .iter()
        .map(|s| s.expr.expression_type())
        .collect();
    assert_eq!(
        types,
        vec![
            ExpressionType::Entity("Order".into()),
            ExpressionType::Entity("Customer".into())
        ]
    );
}

#[test]
fn test_attribute_and_embedded_types() {
    let statement = select("select o.number, o.total, o.shippingAddress, o.shippingAddress.city from Order o");
    let types: Vec<_> = spec(&statement)
        .select
        .selections
        .iter()
        .map(|s| s.expr.expression_type())
        .collect();
    assert_eq!(
        types,
        vec![
            basic(BasicType::String),
            basic(BasicType::Decimal),
            ExpressionType::Embeddable("Address".into()),
            basic(BasicType::String),
        ]
    );
    assert_eq!(statement.from_elements.implicit_join_count(), 0);
}

#[test]
fn test_aggregates_and_group_by() {
    let statement = select(
        "select o.status, count(*), sum(o.total), avg(l.quantity), max(o.placed) \
         from Order o join o.lines l group by o.status having count(*) > 1",
    );
    let query = spec(&statement);
    let selections = &query.select.selections;
    assert!(matches!(
        &selections[1].expr,
        Expr::Aggregate { function: AggregateFunction::Count, arg: None, .. }
    ));
    assert_eq!(selections[1].expr.expression_type(), basic(BasicType::Long));
    assert_eq!(selections[2].expr.expression_type(), basic(BasicType::Decimal));
    assert_eq!(selections[3].expr.expression_type(), basic(BasicType::Double));
    assert_eq!(selections[4].expr.expression_type(), basic(BasicType::Timestamp));
    assert_eq!(query.group_by.len(), 1);
    assert!(matches!(query.having, Some(Predicate::Comparison { .. })));
}

#[test]
fn test_function_types() {
    let statement = select("select upper(c.name), length(c.email), coalesce(c.name, 'n/a') from Customer c");
    let types: Vec<_> = spec(&statement)
        .select
        .selections
        .iter()
        .map(|s| s.expr.expression_type())
        .collect();
    assert_eq!(
        types,
        vec![
            basic(BasicType::String),
            basic(BasicType::Integer),
            basic(BasicType::String)
        ]
    );
}

#[test]
fn test_order_by_result_alias() {
    let statement = select("select o.total as amount from Order o order by amount desc");
    let query = spec(&statement);
    assert!(matches!(
        &query.order_by[0].expr,
        Expr::SelectionRef { index: 0, alias, .. } if alias == "amount"
    ));
    assert_eq!(query.order_by[0].expr.expression_type(), basic(BasicType::Decimal));
}

#[test]
fn test_order_by_identification_variable_wins_over_result_alias() {
    let statement = select("select o.number as o from Order o order by o");
    let query = spec(&statement);
    assert!(matches!(&query.order_by[0].expr, Expr::Path { .. }));
}

#[test]
fn test_limit_and_offset() {
    let statement = select("select o from Order o limit 10 offset :start");
    let query = spec(&statement);
    assert!(matches!(query.limit, Some(Expr::Literal { .. })));
    assert_eq!(
        query.offset.as_ref().map(Expr::expression_type),
        Some(basic(BasicType::Integer))
    );
}

#[test]
fn test_limit_must_be_integer() {
    assert_eq!(
        select_err("select o from Order o limit 'ten'"),
        SemanticError::InvalidLimitOffset { clause: "limit" }
    );
}

#[test]
fn test_parameters_in_order_of_first_occurrence() {
    let statement = select(
        "select o from Order o where o.number = :number or o.total > :min or o.number like :number",
    );
    let keys: Vec<_> = statement.parameters.iter().map(|p| p.key.clone()).collect();
    assert_eq!(
        keys,
        vec![
            ParameterKey::Named("number".into()),
            ParameterKey::Named("min".into())
        ]
    );
    assert_eq!(statement.parameters[0].anticipated_type, basic(BasicType::String));
    assert_eq!(statement.parameters[1].anticipated_type, basic(BasicType::Decimal));
}

#[test]
fn test_in_parameter_allows_multi_valued_binding() {
    let statement = select("select o from Order o where o.status in :statuses");
    let parameter = &statement.parameters[0];
    assert!(parameter.allows_multi_valued_binding);
    assert_eq!(parameter.anticipated_type, basic(BasicType::String));
}

#[test]
fn test_in_values_infers_parameter_types() {
    let statement = select("select o from Order o where o.status in ('NEW', :other)");
    assert_eq!(statement.parameters[0].anticipated_type, basic(BasicType::String));
    assert!(!statement.parameters[0].allows_multi_valued_binding);
}

#[test]
fn test_mixed_parameter_styles_rejected() {
    assert_eq!(
        select_err("select o from Order o where o.number = :n and o.total > ?1"),
        SemanticError::MixedParameterStyles
    );
}

#[test]
fn test_legacy_positional_parameter_rejected() {
    assert_eq!(
        select_err("select o from Order o where o.number = ?"),
        SemanticError::LegacyPositionalParameter
    );
}

#[test]
fn test_scalar_subquery_must_select_one_item() {
    assert_eq!(
        select_err("select o from Order o where o.total > (select p.price, p.sku from Product p)"),
        SemanticError::SubqueryArity { found: 2 }
    );
    let statement = select("select o from Order o where o.total > (select max(p.price) from Product p)");
    assert!(matches!(
        spec(&statement).where_clause,
        Some(Predicate::Comparison { right: Expr::Subquery(_), .. })
    ));
}

#[test]
fn test_collection_predicates() {
    let statement = select("select c from Customer c where c.orders is not empty and :o member of c.orders");
    match &spec(&statement).where_clause {
        Some(Predicate::Junction { predicates, .. }) => {
            assert!(matches!(predicates[0], Predicate::Empty { negated: true, .. }));
            assert!(matches!(predicates[1], Predicate::MemberOf { negated: false, .. }));
        }
        other => panic!("Expected conjunction, got {:?}", other),
    }
    assert_eq!(
        statement.parameters[0].anticipated_type,
        ExpressionType::Entity("Order".into())
    );
}

#[test]
fn test_collection_predicates_require_collection() {
    assert!(matches!(
        select_err("select o from Order o where o.customer is empty"),
        SemanticError::NotACollection { .. }
    ));
    assert!(matches!(
        select_err("select o from Order o where :c member of o.customer"),
        SemanticError::NotACollection { .. }
    ));
}

#[test]
fn test_unqualified_attribute_resolves_to_single_candidate() {
    let statement = select("select number from Order o where total > 10");
    let binding = spec(&statement).select.selections[0].expr.binding().expect("path");
    assert_eq!(binding.root_element(), statement.primary_root().expect("root"));
}

#[test]
fn test_unqualified_attribute_ambiguous() {
    match select_err("select name from Customer c, Product p") {
        SemanticError::AmbiguousAttribute { attribute, candidates } => {
            assert_eq!(attribute, "name");
            assert_eq!(candidates, vec!["c", "p"]);
        }
        other => panic!("Expected ambiguity, got {:?}", other),
    }
}

#[test]
fn test_unresolvable_identifier() {
    assert_eq!(
        select_err("select x.name from Customer c"),
        SemanticError::UnresolvableIdentifier("x.name".into())
    );
}

#[test]
fn test_unknown_attribute() {
    assert_eq!(
        select_err("select o.nickname from Order o"),
        SemanticError::UnknownAttribute {
            owner: "Order".into(),
            attribute: "nickname".into()
        }
    );
}

#[test]
fn test_basic_attribute_dereference() {
    assert!(matches!(
        select_err("select o.number.length from Order o"),
        SemanticError::BasicAttributeDereference { .. }
    ));
}

#[test]
fn test_duplicate_result_alias() {
    assert_eq!(
        select_err("select o.number as x, o.total as X from Order o"),
        SemanticError::DuplicateResultAlias("X".into())
    );
}

#[test]
fn test_comparison_type_mismatch() {
    assert!(matches!(
        select_err("select o from Order o where o.number = 5"),
        SemanticError::ComparisonTypeMismatch { .. }
    ));
}

#[test]
fn test_treat_path_narrows_type() {
    let statement = select("select treat(p as CardPayment).cardNumber from Payment p");
    let selection = &spec(&statement).select.selections[0].expr;
    assert_eq!(selection.expression_type(), basic(BasicType::String));
    assert_eq!(
        selection.binding().map(|b| b.describe(&statement.from_elements)),
        Some("treat(p as CardPayment).cardNumber".to_string())
    );
}

#[test]
fn test_treat_to_unrelated_type_rejected() {
    assert!(matches!(
        select_err("select treat(p as Dog).breed from Payment p"),
        SemanticError::InvalidTreatTarget { .. }
    ));
}

#[test]
fn test_bindings_shared_within_clause() {
    let statement = select("select o from Order o where o.number = :a or o.number = :b");
    let Some(Predicate::Junction { predicates, .. }) = &spec(&statement).where_clause else {
        panic!("Expected disjunction");
    };
    let bindings: Vec<&Arc<Binding>> = predicates
        .iter()
        .filter_map(|p| match p {
            Predicate::Comparison { left, .. } => left.binding(),
            _ => None,
        })
        .collect();
    assert_eq!(bindings.len(), 2);
    assert!(Arc::ptr_eq(bindings[0], bindings[1]));
}
