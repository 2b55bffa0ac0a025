//! Visitor over the SQM tree.
//!
//! Every node kind routes to its own `visit_*` method. Default bodies walk
//! the children, so an implementation overrides only the nodes it cares
//! about. The `walk_*` functions match exhaustively: adding a node kind is a
//! compile error here rather than a silently skipped node downstream.

use std::sync::Arc;

use crate::parser::ast::{BinaryOp, ComparisonOp, Literal, UnaryOp};

use super::expr::{AggregateFunction, Binding, Expr, ExpressionType, Junction, ParameterKey, Predicate};
use super::from::{FromElement, FromElementArena, FromElementId, FromElementKind, FromElementSpace};
use super::statement::{
    Selection, SortSpecification, SqmAssignment, SqmFromClause, SqmQuerySpec, SqmSelectClause,
    SqmStatement, StatementKind,
};

pub trait SqmVisitor {
    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn visit_statement(&mut self, statement: &SqmStatement) {
        walk_statement(self, statement);
    }

    fn visit_select_statement(&mut self, arena: &FromElementArena, query: &SqmQuerySpec) {
        self.visit_query_spec(arena, query);
    }

    fn visit_insert_select(
        &mut self,
        arena: &FromElementArena,
        target: FromElementId,
        state_fields: &[Arc<Binding>],
        source: &SqmQuerySpec,
    ) {
        self.visit_root(arena, arena.element(target));
        for field in state_fields {
            self.visit_path(arena, field, &field.expression_type(arena));
        }
        self.visit_query_spec(arena, source);
    }

    fn visit_update(
        &mut self,
        arena: &FromElementArena,
        target: FromElementId,
        assignments: &[SqmAssignment],
        where_clause: Option<&Predicate>,
    ) {
        self.visit_root(arena, arena.element(target));
        for assignment in assignments {
            self.visit_assignment(arena, assignment);
        }
        if let Some(predicate) = where_clause {
            self.visit_predicate(arena, predicate);
        }
    }

    fn visit_delete(
        &mut self,
        arena: &FromElementArena,
        target: FromElementId,
        where_clause: Option<&Predicate>,
    ) {
        self.visit_root(arena, arena.element(target));
        if let Some(predicate) = where_clause {
            self.visit_predicate(arena, predicate);
        }
    }

    fn visit_assignment(&mut self, arena: &FromElementArena, assignment: &SqmAssignment) {
        self.visit_path(
            arena,
            &assignment.target,
            &assignment.target.expression_type(arena),
        );
        self.visit_expr(arena, &assignment.value);
    }

    // ------------------------------------------------------------------
    // Query specification
    // ------------------------------------------------------------------

    fn visit_query_spec(&mut self, arena: &FromElementArena, spec: &SqmQuerySpec) {
        walk_query_spec(self, arena, spec);
    }

    fn visit_from_clause(&mut self, arena: &FromElementArena, from: &SqmFromClause) {
        for space in &from.spaces {
            self.visit_space(arena, arena.space(*space));
        }
    }

    fn visit_space(&mut self, arena: &FromElementArena, space: &FromElementSpace) {
        walk_space(self, arena, space);
    }

    fn visit_root(&mut self, _arena: &FromElementArena, _element: &FromElement) {}

    fn visit_entity_join(&mut self, arena: &FromElementArena, element: &FromElement) {
        walk_join(self, arena, element);
    }

    fn visit_attribute_join(&mut self, arena: &FromElementArena, element: &FromElement) {
        walk_join(self, arena, element);
    }

    fn visit_select_clause(&mut self, arena: &FromElementArena, select: &SqmSelectClause) {
        for selection in &select.selections {
            self.visit_selection(arena, selection);
        }
    }

    fn visit_selection(&mut self, arena: &FromElementArena, selection: &Selection) {
        self.visit_expr(arena, &selection.expr);
    }

    fn visit_sort_specification(&mut self, arena: &FromElementArena, sort: &SortSpecification) {
        self.visit_expr(arena, &sort.expr);
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn visit_expr(&mut self, arena: &FromElementArena, expr: &Expr) {
        walk_expr(self, arena, expr);
    }

    fn visit_path(&mut self, _arena: &FromElementArena, _binding: &Arc<Binding>, _ty: &ExpressionType) {}

    fn visit_literal(&mut self, _value: &Literal, _ty: &ExpressionType) {}

    fn visit_parameter(&mut self, _key: &ParameterKey, _ty: &ExpressionType) {}

    fn visit_unary(&mut self, arena: &FromElementArena, _op: UnaryOp, operand: &Expr) {
        self.visit_expr(arena, operand);
    }

    fn visit_binary(
        &mut self,
        arena: &FromElementArena,
        _op: BinaryOp,
        left: &Expr,
        right: &Expr,
        _ty: &ExpressionType,
    ) {
        self.visit_expr(arena, left);
        self.visit_expr(arena, right);
    }

    fn visit_function(
        &mut self,
        arena: &FromElementArena,
        _name: &str,
        args: &[Expr],
        _ty: &ExpressionType,
    ) {
        for arg in args {
            self.visit_expr(arena, arg);
        }
    }

    fn visit_aggregate(
        &mut self,
        arena: &FromElementArena,
        _function: AggregateFunction,
        _distinct: bool,
        arg: Option<&Expr>,
        _ty: &ExpressionType,
    ) {
        if let Some(arg) = arg {
            self.visit_expr(arena, arg);
        }
    }

    fn visit_subquery(&mut self, arena: &FromElementArena, spec: &SqmQuerySpec) {
        self.visit_query_spec(arena, spec);
    }

    fn visit_selection_ref(&mut self, _index: usize, _alias: &str, _ty: &ExpressionType) {}

    // ------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------

    fn visit_predicate(&mut self, arena: &FromElementArena, predicate: &Predicate) {
        walk_predicate(self, arena, predicate);
    }

    fn visit_junction(&mut self, arena: &FromElementArena, _kind: Junction, predicates: &[Predicate]) {
        for predicate in predicates {
            self.visit_predicate(arena, predicate);
        }
    }

    fn visit_negated(&mut self, arena: &FromElementArena, predicate: &Predicate) {
        self.visit_predicate(arena, predicate);
    }

    fn visit_comparison(&mut self, arena: &FromElementArena, left: &Expr, _op: ComparisonOp, right: &Expr) {
        self.visit_expr(arena, left);
        self.visit_expr(arena, right);
    }

    fn visit_null_check(&mut self, arena: &FromElementArena, expr: &Expr, _negated: bool) {
        self.visit_expr(arena, expr);
    }

    fn visit_empty_check(&mut self, arena: &FromElementArena, expr: &Expr, _negated: bool) {
        self.visit_expr(arena, expr);
    }

    fn visit_between(
        &mut self,
        arena: &FromElementArena,
        expr: &Expr,
        low: &Expr,
        high: &Expr,
        _negated: bool,
    ) {
        self.visit_expr(arena, expr);
        self.visit_expr(arena, low);
        self.visit_expr(arena, high);
    }

    fn visit_like(
        &mut self,
        arena: &FromElementArena,
        expr: &Expr,
        pattern: &Expr,
        escape: Option<&Expr>,
        _negated: bool,
    ) {
        self.visit_expr(arena, expr);
        self.visit_expr(arena, pattern);
        if let Some(escape) = escape {
            self.visit_expr(arena, escape);
        }
    }

    fn visit_in_list(&mut self, arena: &FromElementArena, expr: &Expr, list: &[Expr], _negated: bool) {
        self.visit_expr(arena, expr);
        for item in list {
            self.visit_expr(arena, item);
        }
    }

    fn visit_in_subquery(
        &mut self,
        arena: &FromElementArena,
        expr: &Expr,
        subquery: &SqmQuerySpec,
        _negated: bool,
    ) {
        self.visit_expr(arena, expr);
        self.visit_subquery(arena, subquery);
    }

    fn visit_member_of(
        &mut self,
        arena: &FromElementArena,
        expr: &Expr,
        collection: &Arc<Binding>,
        _negated: bool,
    ) {
        self.visit_expr(arena, expr);
        self.visit_path(arena, collection, &collection.expression_type(arena));
    }

    fn visit_exists(&mut self, arena: &FromElementArena, subquery: &SqmQuerySpec, _negated: bool) {
        self.visit_subquery(arena, subquery);
    }
}

/// Dispatch a statement to its kind-specific visit method.
pub fn walk_statement<V: SqmVisitor + ?Sized>(visitor: &mut V, statement: &SqmStatement) {
    let arena = &statement.from_elements;
    match &statement.kind {
        StatementKind::Select { query } => visitor.visit_select_statement(arena, query),
        StatementKind::InsertSelect {
            target,
            state_fields,
            source,
        } => visitor.visit_insert_select(arena, *target, state_fields, source),
        StatementKind::Update {
            target,
            assignments,
            where_clause,
        } => visitor.visit_update(arena, *target, assignments, where_clause.as_ref()),
        StatementKind::Delete {
            target,
            where_clause,
        } => visitor.visit_delete(arena, *target, where_clause.as_ref()),
    }
}

/// Visit the clauses of a query specification in evaluation-independent order:
/// from, select, where, group by, having, order by, limit, offset.
pub fn walk_query_spec<V: SqmVisitor + ?Sized>(
    visitor: &mut V,
    arena: &FromElementArena,
    spec: &SqmQuerySpec,
) {
    visitor.visit_from_clause(arena, &spec.from);
    visitor.visit_select_clause(arena, &spec.select);
    if let Some(predicate) = &spec.where_clause {
        visitor.visit_predicate(arena, predicate);
    }
    for expr in &spec.group_by {
        visitor.visit_expr(arena, expr);
    }
    if let Some(predicate) = &spec.having {
        visitor.visit_predicate(arena, predicate);
    }
    for sort in &spec.order_by {
        visitor.visit_sort_specification(arena, sort);
    }
    if let Some(limit) = &spec.limit {
        visitor.visit_expr(arena, limit);
    }
    if let Some(offset) = &spec.offset {
        visitor.visit_expr(arena, offset);
    }
}

pub fn walk_space<V: SqmVisitor + ?Sized>(
    visitor: &mut V,
    arena: &FromElementArena,
    space: &FromElementSpace,
) {
    visitor.visit_root(arena, arena.element(space.root));
    for join in &space.joins {
        let element = arena.element(*join);
        match element.kind {
            FromElementKind::EntityJoin { .. } => visitor.visit_entity_join(arena, element),
            FromElementKind::AttributeJoin { .. } => visitor.visit_attribute_join(arena, element),
            // A finished statement has no unresolved joins
            FromElementKind::Root | FromElementKind::Pending => {}
        }
    }
}

pub fn walk_join<V: SqmVisitor + ?Sized>(
    visitor: &mut V,
    arena: &FromElementArena,
    element: &FromElement,
) {
    if let Some(on) = &element.on {
        visitor.visit_predicate(arena, on);
    }
}

pub fn walk_expr<V: SqmVisitor + ?Sized>(visitor: &mut V, arena: &FromElementArena, expr: &Expr) {
    match expr {
        Expr::Path { binding, ty } => visitor.visit_path(arena, binding, ty),
        Expr::Literal { value, ty } => visitor.visit_literal(value, ty),
        Expr::Parameter { key, ty } => visitor.visit_parameter(key, ty),
        Expr::Unary { op, operand } => visitor.visit_unary(arena, *op, operand),
        Expr::Binary {
            op,
            left,
            right,
            ty,
        } => visitor.visit_binary(arena, *op, left, right, ty),
        Expr::Function { name, args, ty } => visitor.visit_function(arena, name, args, ty),
        Expr::Aggregate {
            function,
            distinct,
            arg,
            ty,
        } => visitor.visit_aggregate(arena, *function, *distinct, arg.as_deref(), ty),
        Expr::Subquery(spec) => visitor.visit_subquery(arena, spec),
        Expr::SelectionRef { index, alias, ty } => visitor.visit_selection_ref(*index, alias, ty),
    }
}

pub fn walk_predicate<V: SqmVisitor + ?Sized>(
    visitor: &mut V,
    arena: &FromElementArena,
    predicate: &Predicate,
) {
    match predicate {
        Predicate::Junction { kind, predicates } => visitor.visit_junction(arena, *kind, predicates),
        Predicate::Negated { predicate } => visitor.visit_negated(arena, predicate),
        Predicate::Comparison { left, op, right } => visitor.visit_comparison(arena, left, *op, right),
        Predicate::Null { expr, negated } => visitor.visit_null_check(arena, expr, *negated),
        Predicate::Empty { expr, negated } => visitor.visit_empty_check(arena, expr, *negated),
        Predicate::Between {
            expr,
            low,
            high,
            negated,
        } => visitor.visit_between(arena, expr, low, high, *negated),
        Predicate::Like {
            expr,
            pattern,
            escape,
            negated,
        } => visitor.visit_like(arena, expr, pattern, escape.as_ref(), *negated),
        Predicate::InList {
            expr,
            list,
            negated,
        } => visitor.visit_in_list(arena, expr, list, *negated),
        Predicate::InSubquery {
            expr,
            subquery,
            negated,
        } => visitor.visit_in_subquery(arena, expr, subquery, *negated),
        Predicate::MemberOf {
            expr,
            collection,
            negated,
        } => visitor.visit_member_of(arena, expr, collection, *negated),
        Predicate::Exists { subquery, negated } => visitor.visit_exists(arena, subquery, *negated),
    }
}
