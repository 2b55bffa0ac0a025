//! Query splitting for polymorphic roots.
//!
//! A polymorphic entity has no storage of its own, so a query rooted at it
//! is rewritten into one query per concrete implementor. Each copy owns a
//! fresh binding graph; bindings that were shared in the input stay shared
//! within each copy.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{DomainMetamodel, EntityType};
use crate::semantic::{BuildError, BuildResult};
use crate::sqm::{
    Binding, Expr, ExpressionType, FromElementArena, FromElementId, Predicate, SqmQuerySpec,
    SqmStatement, StatementKind,
};

/// Split a statement rooted at a polymorphic entity.
///
/// A statement whose primary root has at most one implementor is returned
/// as-is (the same `Arc`). Otherwise the result holds one statement per
/// implementor, in implementor registration order.
pub fn split(
    statement: &Arc<SqmStatement>,
    model: &dyn DomainMetamodel,
) -> BuildResult<Vec<Arc<SqmStatement>>> {
    let Some(root) = statement.primary_root() else {
        return Ok(vec![Arc::clone(statement)]);
    };
    let entity = &statement.element(root).entity;
    let implementors = model.implementors(entity);
    if implementors.len() <= 1 {
        return Ok(vec![Arc::clone(statement)]);
    }
    if !statement.is_select() {
        return Err(BuildError::NotYetImplemented(format!(
            "splitting a {} statement with polymorphic target {}",
            statement.kind_name(),
            entity.name
        )));
    }

    tracing::debug!(
        entity = %entity.name,
        implementors = implementors.len(),
        "splitting polymorphic query"
    );

    Ok(implementors
        .into_iter()
        .map(|implementor| Arc::new(QuerySplitter::new(statement, root, implementor).finish()))
        .collect())
}

/// Produces one copy of a statement with its root retargeted.
struct QuerySplitter<'s> {
    source: &'s SqmStatement,
    arena: FromElementArena,
    /// Original binding address -> its copy.
    copies: HashMap<usize, Arc<Binding>>,
}

impl<'s> QuerySplitter<'s> {
    fn new(source: &'s SqmStatement, root: FromElementId, implementor: Arc<EntityType>) -> Self {
        let mut arena = source.from_elements.clone();
        arena.element_mut(root).entity = implementor;
        Self {
            source,
            arena,
            copies: HashMap::new(),
        }
    }

    fn finish(mut self) -> SqmStatement {
        let mut kind = self.source.kind.clone();
        match &mut kind {
            StatementKind::Select { query } => self.query_spec(query),
            StatementKind::InsertSelect {
                state_fields,
                source,
                ..
            } => {
                for field in state_fields.iter_mut() {
                    *field = self.binding(field);
                }
                self.query_spec(source);
            }
            StatementKind::Update {
                assignments,
                where_clause,
                ..
            } => {
                for assignment in assignments.iter_mut() {
                    assignment.target = self.binding(&assignment.target);
                    self.expr(&mut assignment.value);
                }
                if let Some(predicate) = where_clause {
                    self.predicate(predicate);
                }
            }
            StatementKind::Delete { where_clause, .. } => {
                if let Some(predicate) = where_clause {
                    self.predicate(predicate);
                }
            }
        }

        // join restrictions live on the elements themselves
        let joins: Vec<FromElementId> = self
            .arena
            .elements()
            .iter()
            .filter(|e| e.on.is_some())
            .map(|e| e.id)
            .collect();
        for id in joins {
            if let Some(mut on) = self.arena.element_mut(id).on.take() {
                self.predicate(&mut on);
                self.arena.element_mut(id).on = Some(on);
            }
        }

        SqmStatement {
            kind,
            from_elements: self.arena,
            parameters: self.source.parameters.clone(),
        }
    }

    fn binding(&mut self, binding: &Arc<Binding>) -> Arc<Binding> {
        let key = Arc::as_ptr(binding) as usize;
        if let Some(copy) = self.copies.get(&key) {
            return Arc::clone(copy);
        }
        let copy = Arc::new(match binding.as_ref() {
            Binding::FromElement {
                element,
                treated_as,
            } => Binding::FromElement {
                element: *element,
                treated_as: treated_as.clone(),
            },
            Binding::Attribute {
                lhs,
                attribute,
                join,
            } => Binding::Attribute {
                lhs: self.binding(lhs),
                attribute: attribute.clone(),
                join: *join,
            },
        });
        self.copies.insert(key, Arc::clone(&copy));
        copy
    }

    fn query_spec(&mut self, spec: &mut SqmQuerySpec) {
        for selection in &mut spec.select.selections {
            self.expr(&mut selection.expr);
        }
        if let Some(predicate) = &mut spec.where_clause {
            self.predicate(predicate);
        }
        for expr in &mut spec.group_by {
            self.expr(expr);
        }
        if let Some(predicate) = &mut spec.having {
            self.predicate(predicate);
        }
        for sort in &mut spec.order_by {
            self.expr(&mut sort.expr);
        }
        for expr in spec.limit.iter_mut().chain(spec.offset.iter_mut()) {
            self.expr(expr);
        }
        // result-alias references copy the selection type
        for sort in &mut spec.order_by {
            if let Expr::SelectionRef { index, ty, .. } = &mut sort.expr {
                if let Some(selection) = spec.select.selections.get(*index) {
                    *ty = selection.expr.expression_type();
                }
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Path { binding, ty } => {
                *binding = self.binding(binding);
                *ty = binding.expression_type(&self.arena);
            }
            Expr::Literal { .. } | Expr::Parameter { .. } | Expr::SelectionRef { .. } => {}
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    self.expr(arg);
                }
            }
            Expr::Aggregate { arg, ty, .. } => {
                if let Some(arg) = arg {
                    self.expr(arg);
                    // min/max over an entity follow their argument
                    if matches!(ty, ExpressionType::Entity(_)) {
                        *ty = arg.expression_type();
                    }
                }
            }
            Expr::Subquery(spec) => self.query_spec(spec),
        }
    }

    fn predicate(&mut self, predicate: &mut Predicate) {
        match predicate {
            Predicate::Junction { predicates, .. } => {
                for p in predicates {
                    self.predicate(p);
                }
            }
            Predicate::Negated { predicate } => self.predicate(predicate),
            Predicate::Comparison { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Predicate::Null { expr, .. } | Predicate::Empty { expr, .. } => self.expr(expr),
            Predicate::Between {
                expr, low, high, ..
            } => {
                self.expr(expr);
                self.expr(low);
                self.expr(high);
            }
            Predicate::Like {
                expr,
                pattern,
                escape,
                ..
            } => {
                self.expr(expr);
                self.expr(pattern);
                if let Some(escape) = escape {
                    self.expr(escape);
                }
            }
            Predicate::InList { expr, list, .. } => {
                self.expr(expr);
                for item in list {
                    self.expr(item);
                }
            }
            Predicate::InSubquery { expr, subquery, .. } => {
                self.expr(expr);
                self.query_spec(subquery);
            }
            Predicate::MemberOf {
                expr, collection, ..
            } => {
                self.expr(expr);
                *collection = self.binding(collection);
            }
            Predicate::Exists { subquery, .. } => self.query_spec(subquery),
        }
    }
}
