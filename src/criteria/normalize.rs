//! Criteria tree to SQM.
//!
//! Sources are registered directly as from-elements (there is no text to run
//! the from-clause pass over); every expression then goes through the same
//! [`PathResolver`] the text front end uses, so joins, bindings and types come
//! out identical.

use std::collections::HashSet;

use crate::domain::{BasicType, DomainMetamodel};
use crate::parser::ast::{BinaryOp, ParameterRef, QuerySpecId};
use crate::semantic::{
    aggregate_type, arithmetic_type, check_comparable, function_type, BuildError, BuildResult,
    ParameterCollector, PathContext, PathResolver, RegisteredFromClause, RegisteredSpace, Scope,
    SemanticError,
};
use crate::sqm::{
    Expr, ExpressionType, FromElementId, FromElementKind, Junction, Predicate, Selection,
    SortSpecification, SqmFromClause, SqmQuerySpec, SqmSelectClause, SqmStatement, StatementKind,
};

use super::{CriteriaExpr, CriteriaPredicate, CriteriaQuery, CriteriaSource, SourceRef};

/// Criteria queries have a single query specification.
const CRITERIA_SPEC: QuerySpecId = QuerySpecId(0);

/// Normalize a criteria query into an SQM select statement.
pub fn normalize(
    query: &CriteriaQuery,
    model: &dyn DomainMetamodel,
    strict: bool,
) -> BuildResult<SqmStatement> {
    CriteriaNormalizer::new(model, strict).normalize(query)
}

pub struct CriteriaNormalizer<'m> {
    resolver: PathResolver<'m>,
    parameters: ParameterCollector,
    /// Element created for each criteria source, by `SourceRef` index.
    elements: Vec<FromElementId>,
}

impl<'m> CriteriaNormalizer<'m> {
    pub fn new(model: &'m dyn DomainMetamodel, strict: bool) -> Self {
        Self {
            resolver: PathResolver::new(model, strict, Default::default(), Default::default()),
            parameters: ParameterCollector::new(),
            elements: Vec::new(),
        }
    }

    pub fn normalize(mut self, query: &CriteriaQuery) -> BuildResult<SqmStatement> {
        let scope = Scope::root(CRITERIA_SPEC);
        let spaces = self.register_sources(query, &scope)?;

        let mut seen = HashSet::new();
        let mut selections = Vec::with_capacity(query.selections.len());
        for selection in &query.selections {
            if let Some(alias) = &selection.alias {
                if !seen.insert(alias.to_lowercase()) {
                    return Err(SemanticError::DuplicateResultAlias(alias.clone()).into());
                }
            }
            selections.push(Selection {
                expr: self.expr(&selection.expr, PathContext::SelectClause, &scope)?,
                alias: selection.alias.clone(),
            });
        }
        if selections.is_empty() {
            if self.resolver.strict() {
                return Err(SemanticError::StrictJpaViolation(
                    "criteria query without selections".to_string(),
                )
                .into());
            }
            for space in &spaces {
                let binding = self
                    .resolver
                    .element_binding(space.root, PathContext::SelectClause, &scope)?;
                selections.push(Selection {
                    expr: Expr::path(binding, self.resolver.arena()),
                    alias: None,
                });
            }
        }

        let where_clause = query
            .restriction
            .as_ref()
            .map(|p| self.predicate(p, PathContext::Standard, &scope))
            .transpose()?;
        let group_by = query
            .group_by
            .iter()
            .map(|e| self.expr(e, PathContext::Standard, &scope))
            .collect::<BuildResult<Vec<_>>>()?;
        let having = query
            .having
            .as_ref()
            .map(|p| self.predicate(p, PathContext::Standard, &scope))
            .transpose()?;
        let order_by = query
            .order_by
            .iter()
            .map(|sort| {
                Ok(SortSpecification {
                    expr: self.expr(&sort.expr, PathContext::OrderBy, &scope)?,
                    order: sort.order,
                    nulls: sort.nulls,
                })
            })
            .collect::<BuildResult<Vec<_>>>()?;

        tracing::debug!(
            sources = query.sources.len(),
            implicit_joins = self.resolver.implicit_join_count(),
            "normalized criteria query"
        );

        Ok(SqmStatement {
            kind: StatementKind::Select {
                query: SqmQuerySpec {
                    id: CRITERIA_SPEC,
                    from: SqmFromClause {
                        spaces: spaces.iter().map(|s| s.id).collect(),
                    },
                    select: SqmSelectClause {
                        distinct: query.distinct,
                        selections,
                    },
                    where_clause,
                    group_by,
                    having,
                    order_by,
                    limit: None,
                    offset: None,
                },
            },
            parameters: self.parameters.into_parameters(),
            from_elements: self.resolver.into_arena(),
        })
    }

    // ------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------

    fn register_sources(&mut self, query: &CriteriaQuery, scope: &Scope<'_>) -> BuildResult<Vec<RegisteredSpace>> {
        let mut clause = RegisteredFromClause::new(CRITERIA_SPEC, None, false);

        for source in &query.sources {
            let element = match source {
                CriteriaSource::Root { entity, alias } => {
                    let resolved = self
                        .resolver
                        .model()
                        .resolve_entity(entity)
                        .ok_or_else(|| SemanticError::UnknownEntity(entity.clone()))?;
                    let (space, root) = self
                        .resolver
                        .arena_mut()
                        .add_root(CRITERIA_SPEC, resolved, alias.clone(), false);
                    clause.spaces.push(RegisteredSpace {
                        id: space,
                        root,
                        joins: Vec::new(),
                    });
                    root
                }
                CriteriaSource::Join {
                    parent,
                    attribute,
                    join_type,
                    fetch,
                    alias,
                } => {
                    let parent = self.element(*parent)?;
                    let space = self.resolver.arena().element(parent).space;
                    let lhs = self
                        .resolver
                        .element_binding(parent, PathContext::Standard, scope)?;
                    let text = format!("{}.{}", lhs.describe(self.resolver.arena()), attribute);
                    let found = self.resolver.find_attribute(&lhs, attribute, &text)?;
                    if !found.classification.is_association() {
                        return Err(SemanticError::InvalidJoinTarget { path: text }.into());
                    }
                    let target = self.resolver.join_target(&lhs, found, &text)?;
                    let join = self.resolver.arena_mut().add_join(
                        space,
                        alias.clone(),
                        target.entity,
                        FromElementKind::AttributeJoin {
                            lhs: target.lhs,
                            attribute_path: target.attribute_path,
                            attribute: target.attribute,
                            join_type: *join_type,
                            fetch: *fetch,
                            implicit: false,
                        },
                    )?;
                    if let Some(registered) = clause.spaces.iter_mut().find(|s| s.id == space) {
                        registered.joins.push(join);
                    }
                    join
                }
            };
            let alias = match source {
                CriteriaSource::Root { alias, .. } | CriteriaSource::Join { alias, .. } => alias.as_deref(),
            };
            clause.declare(alias, element)?;
            self.elements.push(element);
        }

        let spaces = clause.spaces.clone();
        self.resolver.register_clause(clause);
        Ok(spaces)
    }

    fn element(&self, source: SourceRef) -> BuildResult<FromElementId> {
        self.elements.get(source.0).copied().ok_or_else(|| {
            BuildError::internal(format!(
                "criteria source {} used before it was registered",
                source.0
            ))
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr(&mut self, expr: &CriteriaExpr, context: PathContext, scope: &Scope<'_>) -> BuildResult<Expr> {
        match expr {
            CriteriaExpr::Path { source, attributes } => {
                let element = self.element(*source)?;
                let mut binding = self.resolver.element_binding(element, context, scope)?;
                if !attributes.is_empty() {
                    binding = self
                        .resolver
                        .navigate_names(binding, attributes, context, scope)?;
                }
                Ok(Expr::path(binding, self.resolver.arena()))
            }
            CriteriaExpr::Literal(value) => Ok(Expr::literal(value.clone())),
            CriteriaExpr::Parameter(name) => {
                let key = self
                    .parameters
                    .register(&ParameterRef::Named(name.clone()), false)?;
                let ty = self.parameters.anticipated_type(&key);
                Ok(Expr::Parameter { key, ty })
            }
            CriteriaExpr::Binary { op, left, right } => {
                let mut left = self.expr(left, context, scope)?;
                let mut right = self.expr(right, context, scope)?;
                let ty = if *op == BinaryOp::Concat {
                    ExpressionType::Basic(BasicType::String)
                } else {
                    self.infer(&mut left, &right.expression_type());
                    self.infer(&mut right, &left.expression_type());
                    arithmetic_type(&left.expression_type(), &right.expression_type())
                };
                Ok(Expr::Binary {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                    ty,
                })
            }
            CriteriaExpr::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|a| self.expr(a, context, scope))
                    .collect::<BuildResult<Vec<_>>>()?;
                let name = name.to_ascii_lowercase();
                let ty = function_type(&name, &args);
                Ok(Expr::Function { name, args, ty })
            }
            CriteriaExpr::Aggregate {
                function,
                distinct,
                arg,
            } => {
                let arg = arg
                    .as_ref()
                    .map(|a| self.expr(a, context, scope).map(Box::new))
                    .transpose()?;
                let ty = match &arg {
                    Some(arg) => aggregate_type(*function, &arg.expression_type()),
                    None => aggregate_type(*function, &ExpressionType::Unknown),
                };
                Ok(Expr::Aggregate {
                    function: *function,
                    distinct: *distinct,
                    arg,
                    ty,
                })
            }
        }
    }

    fn predicate(
        &mut self,
        predicate: &CriteriaPredicate,
        context: PathContext,
        scope: &Scope<'_>,
    ) -> BuildResult<Predicate> {
        match predicate {
            CriteriaPredicate::And(all) | CriteriaPredicate::Or(all) => {
                let kind = match predicate {
                    CriteriaPredicate::And(_) => Junction::And,
                    _ => Junction::Or,
                };
                let mut built = all
                    .iter()
                    .map(|p| self.predicate(p, context, scope))
                    .collect::<BuildResult<Vec<_>>>()?;
                if built.len() == 1 {
                    return Ok(built.remove(0));
                }
                Ok(Predicate::Junction {
                    kind,
                    predicates: built,
                })
            }
            CriteriaPredicate::Not(inner) => Ok(Predicate::Negated {
                predicate: Box::new(self.predicate(inner, context, scope)?),
            }),
            CriteriaPredicate::Comparison { left, op, right } => {
                let mut left = self.expr(left, context, scope)?;
                let mut right = self.expr(right, context, scope)?;
                self.infer(&mut left, &right.expression_type());
                self.infer(&mut right, &left.expression_type());
                check_comparable(&left.expression_type(), &right.expression_type())?;
                Ok(Predicate::Comparison {
                    left,
                    op: *op,
                    right,
                })
            }
            CriteriaPredicate::IsNull { expr, negated } => Ok(Predicate::Null {
                expr: self.expr(expr, context, scope)?,
                negated: *negated,
            }),
            CriteriaPredicate::Like {
                expr,
                pattern,
                negated,
            } => {
                let text = ExpressionType::Basic(BasicType::String);
                let mut expr = self.expr(expr, context, scope)?;
                let mut pattern = self.expr(pattern, context, scope)?;
                self.infer(&mut expr, &text);
                self.infer(&mut pattern, &text);
                check_comparable(&expr.expression_type(), &pattern.expression_type())?;
                Ok(Predicate::Like {
                    expr,
                    pattern,
                    escape: None,
                    negated: *negated,
                })
            }
            CriteriaPredicate::Between { expr, low, high } => {
                let expr = self.expr(expr, context, scope)?;
                let mut low = self.expr(low, context, scope)?;
                let mut high = self.expr(high, context, scope)?;
                let ty = expr.expression_type();
                self.infer(&mut low, &ty);
                self.infer(&mut high, &ty);
                check_comparable(&ty, &low.expression_type())?;
                check_comparable(&ty, &high.expression_type())?;
                Ok(Predicate::Between {
                    expr,
                    low,
                    high,
                    negated: false,
                })
            }
            CriteriaPredicate::In {
                expr,
                values,
                negated,
            } => {
                let expr = self.expr(expr, context, scope)?;
                let ty = expr.expression_type();
                let mut list = Vec::with_capacity(values.len());
                for value in values {
                    let mut item = self.expr(value, context, scope)?;
                    self.infer(&mut item, &ty);
                    check_comparable(&ty, &item.expression_type())?;
                    list.push(item);
                }
                Ok(Predicate::InList {
                    expr,
                    list,
                    negated: *negated,
                })
            }
        }
    }

    fn infer(&mut self, expr: &mut Expr, ty: &ExpressionType) {
        if let Expr::Parameter { key, ty: current } = expr {
            if !current.is_known() && ty.is_known() {
                self.parameters.anticipate(key, ty);
                *current = ty.clone();
            }
        }
    }
}
