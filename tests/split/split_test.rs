use std::collections::HashSet;
use std::sync::Arc;

use sqm::domain::fixtures::shop_model;
use sqm::interpret::{interpret, split, InterpretError, InterpretOptions};
use sqm::sqm::{Binding, Expr, ExpressionType, Predicate, SqmStatement};

fn interpret_shared(source: &str) -> Arc<SqmStatement> {
    let statement = interpret(source, &shop_model(), InterpretOptions::default())
        .unwrap_or_else(|e| panic!("'{}' should interpret: {}", source, e));
    Arc::new(statement)
}

fn root_entity(statement: &SqmStatement) -> String {
    let root = statement.primary_root().expect("primary root");
    statement.element(root).entity.name.clone()
}

fn collect_bindings(predicate: &Predicate, out: &mut Vec<Arc<Binding>>) {
    match predicate {
        Predicate::Junction { predicates, .. } => {
            for p in predicates {
                collect_bindings(p, out);
            }
        }
        Predicate::Comparison { left, right, .. } => {
            out.extend(left.binding().cloned());
            out.extend(right.binding().cloned());
        }
        _ => {}
    }
}

#[test]
fn test_non_polymorphic_root_is_returned_unchanged() {
    let statement = interpret_shared("select o from Order o where o.total > 10");
    let result = split(&statement, &shop_model()).expect("split");
    assert_eq!(result.len(), 1);
    assert!(Arc::ptr_eq(&result[0], &statement));
}

#[test]
fn test_subtype_without_own_subtypes_is_not_split() {
    let statement = interpret_shared("select c from CardPayment c");
    let result = split(&statement, &shop_model()).expect("split");
    assert_eq!(result.len(), 1);
    assert!(Arc::ptr_eq(&result[0], &statement));
}

#[test]
fn test_polymorphic_root_yields_one_query_per_implementor() {
    let statement = interpret_shared("select p from Payment p where p.amount > :min order by p.amount");
    let result = split(&statement, &shop_model()).expect("split");

    let roots: Vec<_> = result.iter().map(|s| root_entity(s.as_ref())).collect();
    assert_eq!(roots, vec!["CardPayment", "WireTransfer"]);
    assert_eq!(root_entity(&statement), "Payment");

    for (copy, implementor) in result.iter().zip(["CardPayment", "WireTransfer"]) {
        assert!(!Arc::ptr_eq(copy, &statement));
        let query = copy.query_spec().expect("select");
        assert_eq!(
            query.select.selections[0].expr.expression_type(),
            ExpressionType::Entity(implementor.into())
        );
        assert_eq!(query.order_by.len(), 1);
        assert_eq!(copy.parameters, statement.parameters);
    }
}

#[test]
fn test_copies_share_no_bindings_with_input_or_each_other() {
    let statement = interpret_shared(
        "select p.amount from Payment p where p.amount > 10 or p.amount < 1",
    );
    let result = split(&statement, &shop_model()).expect("split");
    assert_eq!(result.len(), 2);

    let addresses = |s: &SqmStatement| -> HashSet<usize> {
        let query = s.query_spec().expect("select");
        let mut bindings = Vec::new();
        collect_bindings(query.where_clause.as_ref().expect("where"), &mut bindings);
        bindings.extend(query.select.selections.iter().filter_map(|sel| sel.expr.binding().cloned()));
        bindings.iter().map(|b| Arc::as_ptr(b) as usize).collect()
    };

    let original = addresses(statement.as_ref());
    let first = addresses(result[0].as_ref());
    let second = addresses(result[1].as_ref());
    assert!(original.is_disjoint(&first));
    assert!(original.is_disjoint(&second));
    assert!(first.is_disjoint(&second));
}

#[test]
fn test_shared_bindings_stay_shared_within_copy() {
    let statement = interpret_shared("select p from Payment p where p.amount > 10 or p.amount < 1");
    let result = split(&statement, &shop_model()).expect("split");
    for copy in &result {
        let mut bindings = Vec::new();
        collect_bindings(
            copy.query_spec().and_then(|q| q.where_clause.as_ref()).expect("where"),
            &mut bindings,
        );
        assert_eq!(bindings.len(), 2);
        assert!(Arc::ptr_eq(&bindings[0], &bindings[1]));
    }
}

#[test]
fn test_split_keeps_from_element_ids() {
    let statement = interpret_shared("select p, c from Payment p, Customer c where p.amount > 10");
    let result = split(&statement, &shop_model()).expect("split");
    for copy in &result {
        assert_eq!(
            copy.from_elements.elements().len(),
            statement.from_elements.elements().len()
        );
        let selected = &copy.query_spec().expect("select").select.selections;
        assert!(matches!(&selected[1].expr, Expr::Path { ty: ExpressionType::Entity(name), .. } if name == "Customer"));
    }
}

#[test]
fn test_polymorphic_dml_not_yet_implemented() {
    let statement = interpret_shared("update Payment p set p.amount = 0");
    let err = split(&statement, &shop_model()).unwrap_err();
    assert!(matches!(err, InterpretError::NotYetImplemented(_)));
}
