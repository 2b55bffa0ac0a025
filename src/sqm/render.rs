//! Indented text rendering of an SQM tree.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::parser::ast::{BinaryOp, ComparisonOp, Literal, NullPrecedence, SortOrder, UnaryOp};

use super::expr::{AggregateFunction, Binding, Expr, ExpressionType, Junction, ParameterKey, Predicate};
use super::from::{FromElement, FromElementArena, FromElementId, FromElementKind, FromElementSpace};
use super::statement::{
    Selection, SortSpecification, SqmAssignment, SqmFromClause, SqmQuerySpec, SqmSelectClause,
    SqmStatement,
};
use super::visitor::{walk_join, walk_space, SqmVisitor};

/// Render a statement as an indented tree.
pub fn render(statement: &SqmStatement) -> String {
    let mut printer = TreePrinter::new();
    printer.visit_statement(statement);
    printer.finish()
}

/// A visitor that prints one line per node, two spaces per nesting level.
#[derive(Debug, Default)]
pub struct TreePrinter {
    out: String,
    depth: usize,
}

impl TreePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn nested(&mut self, header: impl AsRef<str>, body: impl FnOnce(&mut Self)) {
        self.line(header);
        self.depth += 1;
        body(self);
        self.depth -= 1;
    }
}

fn negation(negated: bool) -> &'static str {
    if negated {
        "not "
    } else {
        ""
    }
}

fn element_header(arena: &FromElementArena, element: &FromElement) -> String {
    let mut header = String::new();
    let entity = match &element.treated_as {
        Some(sub) => format!("treat({} as {})", element.entity.name, sub.name),
        None => element.entity.name.clone(),
    };
    match &element.kind {
        FromElementKind::Root => {
            let _ = write!(header, "root {}", entity);
        }
        FromElementKind::EntityJoin { join_type } => {
            let _ = write!(header, "{} join {}", join_type, entity);
        }
        FromElementKind::AttributeJoin {
            lhs,
            attribute_path,
            join_type,
            fetch,
            implicit,
            ..
        } => {
            let _ = write!(
                header,
                "{}{} join {}.{} -> {}",
                if *implicit { "implicit " } else { "" },
                join_type,
                arena.element(*lhs).label(),
                attribute_path.join("."),
                entity
            );
            if *fetch {
                header.push_str(" fetch");
            }
        }
        FromElementKind::Pending => {
            let _ = write!(header, "pending join {}", entity);
        }
    }
    let _ = write!(header, " as {}", element.label());
    header
}

impl SqmVisitor for TreePrinter {
    fn visit_select_statement(&mut self, arena: &FromElementArena, query: &SqmQuerySpec) {
        self.nested("select statement", |p| p.visit_query_spec(arena, query));
    }

    fn visit_insert_select(
        &mut self,
        arena: &FromElementArena,
        target: FromElementId,
        state_fields: &[Arc<Binding>],
        source: &SqmQuerySpec,
    ) {
        self.nested("insert statement", |p| {
            p.visit_root(arena, arena.element(target));
            p.nested("state fields", |p| {
                for field in state_fields {
                    p.visit_path(arena, field, &field.expression_type(arena));
                }
            });
            p.visit_query_spec(arena, source);
        });
    }

    fn visit_update(
        &mut self,
        arena: &FromElementArena,
        target: FromElementId,
        assignments: &[SqmAssignment],
        where_clause: Option<&Predicate>,
    ) {
        self.nested("update statement", |p| {
            p.visit_root(arena, arena.element(target));
            p.nested("set", |p| {
                for assignment in assignments {
                    p.visit_assignment(arena, assignment);
                }
            });
            if let Some(predicate) = where_clause {
                p.nested("where", |p| p.visit_predicate(arena, predicate));
            }
        });
    }

    fn visit_delete(
        &mut self,
        arena: &FromElementArena,
        target: FromElementId,
        where_clause: Option<&Predicate>,
    ) {
        self.nested("delete statement", |p| {
            p.visit_root(arena, arena.element(target));
            if let Some(predicate) = where_clause {
                p.nested("where", |p| p.visit_predicate(arena, predicate));
            }
        });
    }

    fn visit_assignment(&mut self, arena: &FromElementArena, assignment: &SqmAssignment) {
        self.nested("=", |p| {
            p.visit_path(
                arena,
                &assignment.target,
                &assignment.target.expression_type(arena),
            );
            p.visit_expr(arena, &assignment.value);
        });
    }

    fn visit_query_spec(&mut self, arena: &FromElementArena, spec: &SqmQuerySpec) {
        self.nested(format!("query {}", spec.id), |p| {
            p.visit_from_clause(arena, &spec.from);
            p.visit_select_clause(arena, &spec.select);
            if let Some(predicate) = &spec.where_clause {
                p.nested("where", |p| p.visit_predicate(arena, predicate));
            }
            if !spec.group_by.is_empty() {
                p.nested("group by", |p| {
                    for expr in &spec.group_by {
                        p.visit_expr(arena, expr);
                    }
                });
            }
            if let Some(predicate) = &spec.having {
                p.nested("having", |p| p.visit_predicate(arena, predicate));
            }
            for sort in &spec.order_by {
                p.visit_sort_specification(arena, sort);
            }
            if let Some(limit) = &spec.limit {
                p.nested("limit", |p| p.visit_expr(arena, limit));
            }
            if let Some(offset) = &spec.offset {
                p.nested("offset", |p| p.visit_expr(arena, offset));
            }
        });
    }

    fn visit_from_clause(&mut self, arena: &FromElementArena, from: &SqmFromClause) {
        self.nested("from", |p| {
            for space in &from.spaces {
                p.visit_space(arena, arena.space(*space));
            }
        });
    }

    fn visit_space(&mut self, arena: &FromElementArena, space: &FromElementSpace) {
        walk_space(self, arena, space);
    }

    fn visit_root(&mut self, arena: &FromElementArena, element: &FromElement) {
        self.line(element_header(arena, element));
    }

    fn visit_entity_join(&mut self, arena: &FromElementArena, element: &FromElement) {
        self.nested(element_header(arena, element), |p| walk_join(p, arena, element));
    }

    fn visit_attribute_join(&mut self, arena: &FromElementArena, element: &FromElement) {
        self.nested(element_header(arena, element), |p| walk_join(p, arena, element));
    }

    fn visit_select_clause(&mut self, arena: &FromElementArena, select: &SqmSelectClause) {
        let header = if select.distinct { "select distinct" } else { "select" };
        self.nested(header, |p| {
            for selection in &select.selections {
                p.visit_selection(arena, selection);
            }
        });
    }

    fn visit_selection(&mut self, arena: &FromElementArena, selection: &Selection) {
        match &selection.alias {
            Some(alias) => self.nested(format!("as {}", alias), |p| p.visit_expr(arena, &selection.expr)),
            None => self.visit_expr(arena, &selection.expr),
        }
    }

    fn visit_sort_specification(&mut self, arena: &FromElementArena, sort: &SortSpecification) {
        let mut header = match sort.order {
            SortOrder::Asc => "order asc".to_string(),
            SortOrder::Desc => "order desc".to_string(),
        };
        match sort.nulls {
            Some(NullPrecedence::First) => header.push_str(" nulls first"),
            Some(NullPrecedence::Last) => header.push_str(" nulls last"),
            None => {}
        }
        self.nested(header, |p| p.visit_expr(arena, &sort.expr));
    }

    fn visit_path(&mut self, arena: &FromElementArena, binding: &Arc<Binding>, ty: &ExpressionType) {
        let kind = if binding.is_from_element() { "element" } else { "path" };
        self.line(format!("{} {} : {}", kind, binding.describe(arena), ty));
    }

    fn visit_literal(&mut self, value: &Literal, ty: &ExpressionType) {
        self.line(format!("literal {} : {}", value, ty));
    }

    fn visit_parameter(&mut self, key: &ParameterKey, ty: &ExpressionType) {
        self.line(format!("parameter {} : {}", key, ty));
    }

    fn visit_unary(&mut self, arena: &FromElementArena, op: UnaryOp, operand: &Expr) {
        let symbol = match op {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
        };
        self.nested(format!("unary {}", symbol), |p| p.visit_expr(arena, operand));
    }

    fn visit_binary(
        &mut self,
        arena: &FromElementArena,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        ty: &ExpressionType,
    ) {
        self.nested(format!("{} : {}", op.symbol(), ty), |p| {
            p.visit_expr(arena, left);
            p.visit_expr(arena, right);
        });
    }

    fn visit_function(&mut self, arena: &FromElementArena, name: &str, args: &[Expr], ty: &ExpressionType) {
        self.nested(format!("function {} : {}", name, ty), |p| {
            for arg in args {
                p.visit_expr(arena, arg);
            }
        });
    }

    fn visit_aggregate(
        &mut self,
        arena: &FromElementArena,
        function: AggregateFunction,
        distinct: bool,
        arg: Option<&Expr>,
        ty: &ExpressionType,
    ) {
        let header = match (arg, distinct) {
            (None, _) => format!("{}(*) : {}", function.as_str(), ty),
            (Some(_), true) => format!("{}(distinct) : {}", function.as_str(), ty),
            (Some(_), false) => format!("{} : {}", function.as_str(), ty),
        };
        self.nested(header, |p| {
            if let Some(arg) = arg {
                p.visit_expr(arena, arg);
            }
        });
    }

    fn visit_subquery(&mut self, arena: &FromElementArena, spec: &SqmQuerySpec) {
        self.nested("subquery", |p| p.visit_query_spec(arena, spec));
    }

    fn visit_selection_ref(&mut self, index: usize, alias: &str, ty: &ExpressionType) {
        self.line(format!("selection {} ({}) : {}", index, alias, ty));
    }

    fn visit_junction(&mut self, arena: &FromElementArena, kind: Junction, predicates: &[Predicate]) {
        let header = match kind {
            Junction::And => "and",
            Junction::Or => "or",
        };
        self.nested(header, |p| {
            for predicate in predicates {
                p.visit_predicate(arena, predicate);
            }
        });
    }

    fn visit_negated(&mut self, arena: &FromElementArena, predicate: &Predicate) {
        self.nested("not", |p| p.visit_predicate(arena, predicate));
    }

    fn visit_comparison(&mut self, arena: &FromElementArena, left: &Expr, op: ComparisonOp, right: &Expr) {
        self.nested(op.symbol(), |p| {
            p.visit_expr(arena, left);
            p.visit_expr(arena, right);
        });
    }

    fn visit_null_check(&mut self, arena: &FromElementArena, expr: &Expr, negated: bool) {
        self.nested(format!("is {}null", negation(negated)), |p| p.visit_expr(arena, expr));
    }

    fn visit_empty_check(&mut self, arena: &FromElementArena, expr: &Expr, negated: bool) {
        self.nested(format!("is {}empty", negation(negated)), |p| p.visit_expr(arena, expr));
    }

    fn visit_between(&mut self, arena: &FromElementArena, expr: &Expr, low: &Expr, high: &Expr, negated: bool) {
        self.nested(format!("{}between", negation(negated)), |p| {
            p.visit_expr(arena, expr);
            p.visit_expr(arena, low);
            p.visit_expr(arena, high);
        });
    }

    fn visit_like(
        &mut self,
        arena: &FromElementArena,
        expr: &Expr,
        pattern: &Expr,
        escape: Option<&Expr>,
        negated: bool,
    ) {
        self.nested(format!("{}like", negation(negated)), |p| {
            p.visit_expr(arena, expr);
            p.visit_expr(arena, pattern);
            if let Some(escape) = escape {
                p.nested("escape", |p| p.visit_expr(arena, escape));
            }
        });
    }

    fn visit_in_list(&mut self, arena: &FromElementArena, expr: &Expr, list: &[Expr], negated: bool) {
        self.nested(format!("{}in", negation(negated)), |p| {
            p.visit_expr(arena, expr);
            for item in list {
                p.visit_expr(arena, item);
            }
        });
    }

    fn visit_in_subquery(&mut self, arena: &FromElementArena, expr: &Expr, subquery: &SqmQuerySpec, negated: bool) {
        self.nested(format!("{}in", negation(negated)), |p| {
            p.visit_expr(arena, expr);
            p.visit_subquery(arena, subquery);
        });
    }

    fn visit_member_of(&mut self, arena: &FromElementArena, expr: &Expr, collection: &Arc<Binding>, negated: bool) {
        self.nested(format!("{}member of", negation(negated)), |p| {
            p.visit_expr(arena, expr);
            p.visit_path(arena, collection, &collection.expression_type(arena));
        });
    }

    fn visit_exists(&mut self, arena: &FromElementArena, subquery: &SqmQuerySpec, negated: bool) {
        self.nested(format!("{}exists", negation(negated)), |p| p.visit_subquery(arena, subquery));
    }
}
