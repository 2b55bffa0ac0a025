//! Phase 2: SQM construction.
//!
//! Walks the parse tree with the [`FromClauseIndex`] from phase 1 and builds
//! the [`SqmStatement`]. Each query specification is built in its own
//! [`Scope`]; the from clause is completed first (explicit joins, then their
//! `on` restrictions) so every alias is usable by the clauses that follow.

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::{AttributeClassification, BasicType, DomainMetamodel};
use crate::parser::ast::{
    DeleteStatement, Expr as AstExpr, InsertSource, InsertStatement, Literal, Path, QuerySpec,
    QuerySpecId, SelectClause, Statement, UpdateStatement,
};
use crate::sqm::expr::{Binding, Expr, ExpressionType};
use crate::sqm::from::FromElementId;
use crate::sqm::statement::{
    Selection, SortSpecification, SqmAssignment, SqmFromClause, SqmQuerySpec, SqmSelectClause,
    SqmStatement, StatementKind,
};

use super::error::{BuildError, BuildResult, SemanticError, SemanticResult};
use super::from_clause::{FromClauseIndex, RegisteredSpace};
use super::parameters::ParameterCollector;
use super::path::{PathContext, PathResolver};
use super::scope::Scope;

/// Reject statement shapes that parse but are not supported yet.
pub fn ensure_supported(statement: &Statement) -> BuildResult<()> {
    match statement {
        Statement::Insert(InsertStatement {
            source: InsertSource::Values(_),
            ..
        }) => Err(BuildError::NotYetImplemented(
            "insert with a values clause".to_string(),
        )),
        Statement::Update(UpdateStatement { versioned: true, .. }) => Err(
            BuildError::NotYetImplemented("versioned update".to_string()),
        ),
        _ => Ok(()),
    }
}

/// Builds one SQM statement from a parse tree and its registered from clauses.
pub struct SemanticQueryBuilder<'m> {
    pub(super) resolver: PathResolver<'m>,
    pub(super) parameters: ParameterCollector,
}

impl<'m> SemanticQueryBuilder<'m> {
    pub fn new(model: &'m dyn DomainMetamodel, strict: bool, index: FromClauseIndex) -> Self {
        let (arena, clauses) = index.into_parts();
        Self {
            resolver: PathResolver::new(model, strict, arena, clauses),
            parameters: ParameterCollector::new(),
        }
    }

    pub(super) fn strict(&self) -> bool {
        self.resolver.strict()
    }

    /// Build the statement, consuming the builder.
    pub fn build(mut self, statement: &Statement) -> BuildResult<SqmStatement> {
        ensure_supported(statement)?;

        let kind = match statement {
            Statement::Select(spec) => {
                let scope = Scope::root(spec.id);
                StatementKind::Select {
                    query: self.build_query_spec(spec, &scope)?,
                }
            }
            Statement::Insert(insert) => self.build_insert(insert)?,
            Statement::Update(update) => self.build_update(update)?,
            Statement::Delete(delete) => self.build_delete(delete)?,
        };

        tracing::debug!(
            statement = statement.kind(),
            from_elements = self.resolver.arena().elements().len(),
            implicit_joins = self.resolver.implicit_join_count(),
            parameters = self.parameters.len(),
            "built semantic query"
        );

        Ok(SqmStatement {
            kind,
            from_elements: self.resolver.into_arena(),
            parameters: self.parameters.into_parameters(),
        })
    }

    fn registered_spaces(&self, spec: QuerySpecId) -> BuildResult<Vec<RegisteredSpace>> {
        self.resolver
            .clause(spec)
            .map(|clause| clause.spaces.clone())
            .ok_or_else(|| BuildError::internal(format!("no from clause registered for query {}", spec)))
    }

    /// The target element of a DML statement.
    fn dml_target(&self, id: QuerySpecId) -> BuildResult<FromElementId> {
        let spaces = self.registered_spaces(id)?;
        match spaces.as_slice() {
            [space] if space.joins.is_empty() => Ok(space.root),
            _ => Err(BuildError::internal(format!(
                "DML statement {} must have exactly one join-free target",
                id
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Query specifications
    // ------------------------------------------------------------------

    pub(super) fn build_query_spec(&mut self, spec: &QuerySpec, scope: &Scope<'_>) -> BuildResult<SqmQuerySpec> {
        let spaces = self.registered_spaces(spec.id)?;
        if spaces.len() != spec.from.spaces.len() {
            return Err(BuildError::internal(format!(
                "query {} registered {} spaces but declares {}",
                spec.id,
                spaces.len(),
                spec.from.spaces.len()
            )));
        }
        tracing::trace!(spec = %spec.id, depth = scope.depth(), "building query specification");

        for (declared, registered) in spec.from.spaces.iter().zip(&spaces) {
            for (join, element) in declared.joins.iter().zip(&registered.joins) {
                if self.resolver.arena().is_pending(*element) {
                    self.resolver.resolve_explicit_join(join, *element, scope)?;
                }
                if let Some(condition) = &join.condition {
                    let context = PathContext::JoinPredicate { space: registered.id };
                    let predicate = self.build_predicate(condition, context, scope)?;
                    self.resolver.arena_mut().element_mut(*element).on = Some(predicate);
                }
            }
        }

        let select = match &spec.select {
            Some(clause) => self.build_select_clause(clause, scope)?,
            None => self.implicit_select(&spaces, scope)?,
        };

        let where_clause = spec
            .where_clause
            .as_ref()
            .map(|p| self.build_predicate(p, PathContext::Standard, scope))
            .transpose()?;

        let group_by = spec
            .group_by
            .iter()
            .map(|e| self.build_expr(e, PathContext::Standard, scope))
            .collect::<BuildResult<Vec<_>>>()?;

        let having = spec
            .having
            .as_ref()
            .map(|p| self.build_predicate(p, PathContext::Standard, scope))
            .transpose()?;

        let mut order_by = Vec::with_capacity(spec.order_by.len());
        for sort in &spec.order_by {
            order_by.push(SortSpecification {
                expr: self.build_sort_expr(&sort.expr, &select, scope)?,
                order: sort.order,
                nulls: sort.nulls,
            });
        }

        let limit = spec
            .limit
            .as_ref()
            .map(|e| self.build_limit_offset(e, "limit"))
            .transpose()?;
        let offset = spec
            .offset
            .as_ref()
            .map(|e| self.build_limit_offset(e, "offset"))
            .transpose()?;

        Ok(SqmQuerySpec {
            id: spec.id,
            from: SqmFromClause {
                spaces: spaces.iter().map(|s| s.id).collect(),
            },
            select,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    fn build_select_clause(&mut self, clause: &SelectClause, scope: &Scope<'_>) -> BuildResult<SqmSelectClause> {
        let mut seen = HashSet::new();
        let mut selections = Vec::with_capacity(clause.items.len());
        for item in &clause.items {
            let alias = item.alias.as_ref().map(|a| a.value.clone());
            if let Some(alias) = &alias {
                if !seen.insert(alias.to_lowercase()) {
                    return Err(SemanticError::DuplicateResultAlias(alias.clone()).into());
                }
            }
            let expr = self.build_expr(&item.expr, PathContext::SelectClause, scope)?;
            selections.push(Selection { expr, alias });
        }
        Ok(SqmSelectClause {
            distinct: clause.distinct,
            selections,
        })
    }

    /// `from Order o` without a select clause selects every root.
    fn implicit_select(&mut self, spaces: &[RegisteredSpace], scope: &Scope<'_>) -> BuildResult<SqmSelectClause> {
        if self.strict() {
            return Err(SemanticError::StrictJpaViolation("query without a select clause".to_string()).into());
        }
        let mut selections = Vec::with_capacity(spaces.len());
        for space in spaces {
            let binding = self
                .resolver
                .element_binding(space.root, PathContext::SelectClause, scope)?;
            selections.push(Selection {
                expr: Expr::path(binding, self.resolver.arena()),
                alias: None,
            });
        }
        Ok(SqmSelectClause {
            distinct: false,
            selections,
        })
    }

    /// Order-by items: identification variables first, then result aliases.
    fn build_sort_expr(&mut self, expr: &AstExpr, select: &SqmSelectClause, scope: &Scope<'_>) -> BuildResult<Expr> {
        let context = PathContext::OrderBy;
        if let AstExpr::Path(path) = expr {
            if context.allows_result_alias() && path.is_single_segment() {
                let name = &path.segments[0].value;
                if self.resolver.lookup_alias(name, scope).is_none() {
                    let found = select.selections.iter().enumerate().find(|(_, s)| {
                        s.alias
                            .as_deref()
                            .is_some_and(|alias| alias.eq_ignore_ascii_case(name))
                    });
                    if let Some((index, selection)) = found {
                        return Ok(Expr::SelectionRef {
                            index,
                            alias: selection.alias.clone().unwrap_or_default(),
                            ty: selection.expr.expression_type(),
                        });
                    }
                }
            }
        }
        self.build_expr(expr, context, scope)
    }

    fn build_limit_offset(&mut self, expr: &AstExpr, clause: &'static str) -> BuildResult<Expr> {
        if self.strict() {
            return Err(SemanticError::StrictJpaViolation(format!("{} clause", clause)).into());
        }
        match expr {
            AstExpr::Literal(literal) if matches!(literal.value, Literal::Integer(_)) => {
                Ok(Expr::literal(literal.value.clone()))
            }
            AstExpr::Parameter(reference) => {
                let key = self.parameters.register(&reference.value, false)?;
                let ty = ExpressionType::Basic(BasicType::Integer);
                self.parameters.anticipate(&key, &ty);
                Ok(Expr::Parameter {
                    key: key.clone(),
                    ty: self.parameters.anticipated_type(&key),
                })
            }
            _ => Err(SemanticError::InvalidLimitOffset { clause }.into()),
        }
    }

    // ------------------------------------------------------------------
    // DML
    // ------------------------------------------------------------------

    fn build_insert(&mut self, insert: &InsertStatement) -> BuildResult<StatementKind> {
        let InsertSource::Query(source) = &insert.source else {
            return Err(BuildError::NotYetImplemented("insert with a values clause".to_string()));
        };
        let target = self.dml_target(insert.id)?;
        let target_scope = Scope::root(insert.id);

        let mut state_fields = Vec::with_capacity(insert.fields.len());
        for field in &insert.fields {
            state_fields.push(self.insert_field(field, target, &target_scope)?);
        }

        let source_scope = Scope::root(source.id);
        let source = self.build_query_spec(source, &source_scope)?;
        let selections = source.select.selections.len();
        if state_fields.len() != selections {
            return Err(SemanticError::InsertArityMismatch {
                fields: state_fields.len(),
                selections,
            }
            .into());
        }

        Ok(StatementKind::InsertSelect {
            target,
            state_fields,
            source,
        })
    }

    fn insert_field(&mut self, path: &Path, target: FromElementId, scope: &Scope<'_>) -> BuildResult<Arc<Binding>> {
        let text = path.text();
        let invalid = |reason: &str| SemanticError::InvalidInsertTarget {
            path: text.clone(),
            reason: reason.to_string(),
        };
        let names = self.target_relative_names(path, target, scope).ok_or_else(|| invalid("treat is not allowed"))?;
        let [name] = names.as_slice() else {
            return Err(invalid("must be a direct attribute of the insert target").into());
        };

        let root = self.resolver.element_binding(target, PathContext::Standard, scope)?;
        let attribute = self.resolver.find_attribute(&root, name, &text)?;
        if attribute.classification.is_association() {
            return Err(invalid("associations cannot be inserted into").into());
        }
        Ok(self
            .resolver
            .navigate_names(root, &names, PathContext::Standard, scope)?)
    }

    fn build_update(&mut self, update: &UpdateStatement) -> BuildResult<StatementKind> {
        let target = self.dml_target(update.id)?;
        let scope = Scope::root(update.id);

        let mut assignments = Vec::with_capacity(update.assignments.len());
        for assignment in &update.assignments {
            let binding = self.assignment_target(&assignment.path, target, &scope)?;
            let ty = binding.expression_type(self.resolver.arena());
            let mut value = self.build_expr(&assignment.value, PathContext::Standard, &scope)?;
            self.infer(&mut value, &ty);
            check_comparable(&ty, &value.expression_type())?;
            assignments.push(SqmAssignment {
                target: binding,
                value,
            });
        }

        let where_clause = update
            .where_clause
            .as_ref()
            .map(|p| self.build_predicate(p, PathContext::Standard, &scope))
            .transpose()?;

        Ok(StatementKind::Update {
            target,
            assignments,
            where_clause,
        })
    }

    /// A `set` target: embedded attributes may be walked, the last segment must be
    /// basic or embedded.
    fn assignment_target(&mut self, path: &Path, target: FromElementId, scope: &Scope<'_>) -> BuildResult<Arc<Binding>> {
        let text = path.text();
        let invalid = |reason: &str| SemanticError::InvalidAssignmentTarget {
            path: text.clone(),
            reason: reason.to_string(),
        };
        let names = self
            .target_relative_names(path, target, scope)
            .ok_or_else(|| invalid("treat is not allowed"))?;
        if names.is_empty() {
            return Err(invalid("the target entity itself cannot be assigned").into());
        }

        let root = self.resolver.element_binding(target, PathContext::Standard, scope)?;
        let mut current = Arc::clone(&root);
        for (index, name) in names.iter().enumerate() {
            let attribute = self.resolver.find_attribute(&current, name, &text)?;
            let terminal = index + 1 == names.len();
            match attribute.classification {
                AttributeClassification::Basic(_) => {
                    if !terminal {
                        return Err(SemanticError::BasicAttributeDereference {
                            path: text.clone(),
                            attribute: attribute.name,
                        }
                        .into());
                    }
                }
                AttributeClassification::Embedded => {}
                c if c.is_plural() => return Err(invalid("collections cannot be assigned").into()),
                _ => return Err(invalid("associations cannot be assigned").into()),
            }
            current = Arc::new(Binding::Attribute {
                lhs: current,
                attribute,
                join: None,
            });
        }

        Ok(self
            .resolver
            .navigate_names(root, &names, PathContext::Standard, scope)?)
    }

    /// Attribute names of a DML path relative to the target, dropping a leading
    /// target alias. `None` for `treat` paths.
    fn target_relative_names(&self, path: &Path, target: FromElementId, scope: &Scope<'_>) -> Option<Vec<String>> {
        if path.treat.is_some() {
            return None;
        }
        let mut names: Vec<String> = path.segments.iter().map(|s| s.value.clone()).collect();
        if let Some(first) = names.first() {
            if self.resolver.lookup_alias(first, scope) == Some(target) {
                names.remove(0);
            }
        }
        Some(names)
    }

    fn build_delete(&mut self, delete: &DeleteStatement) -> BuildResult<StatementKind> {
        if self.strict() && !delete.from_keyword {
            return Err(SemanticError::StrictJpaViolation("delete without 'from'".to_string()).into());
        }
        let target = self.dml_target(delete.id)?;
        let scope = Scope::root(delete.id);
        let where_clause = delete
            .where_clause
            .as_ref()
            .map(|p| self.build_predicate(p, PathContext::Standard, &scope))
            .transpose()?;
        Ok(StatementKind::Delete {
            target,
            where_clause,
        })
    }
}

/// Known basic types on both sides must belong to the same family, and an
/// embeddable never matches a basic value.
pub(crate) fn check_comparable(left: &ExpressionType, right: &ExpressionType) -> SemanticResult<()> {
    let mismatch = match (left, right) {
        (ExpressionType::Basic(l), ExpressionType::Basic(r)) => l.family() != r.family(),
        (ExpressionType::Embeddable(_), ExpressionType::Basic(_))
        | (ExpressionType::Basic(_), ExpressionType::Embeddable(_)) => true,
        _ => false,
    };
    if mismatch {
        return Err(SemanticError::ComparisonTypeMismatch {
            left: left.to_string(),
            right: right.to_string(),
        });
    }
    Ok(())
}
