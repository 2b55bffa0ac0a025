//! Phase 1: from-clause registration.
//!
//! Walks the parse tree before any expression is resolved and registers, for
//! every query specification (outer before inner, siblings left to right), its
//! roots and explicit joins. Entity joins are resolved immediately; attribute
//! joins get a reserved slot that phase 2 fills once the path they navigate
//! can be resolved.
//!
//! The result is a [`FromClauseIndex`] keyed by [`QuerySpecId`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::domain::{DomainMetamodel, EntityType};
use crate::parser::ast::{
    EntityRef, Expr, FunctionArgs, InList, InsertSource, Join, Predicate, QuerySpec, QuerySpecId,
    Statement,
};
use crate::sqm::from::{FromElementArena, FromElementId, FromElementKind, SpaceId};

use super::error::{SemanticError, SemanticResult};

/// One registered from-element space.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredSpace {
    pub id: SpaceId,
    pub root: FromElementId,
    /// Explicit joins in declaration order (entity joins and reserved attribute joins).
    pub joins: Vec<FromElementId>,
}

/// The from clause of one query specification or DML statement.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredFromClause {
    pub spec: QuerySpecId,
    pub parent: Option<QuerySpecId>,
    pub dml: bool,
    pub spaces: Vec<RegisteredSpace>,
    /// Lower-cased identification variable -> element.
    aliases: HashMap<String, FromElementId>,
}

impl RegisteredFromClause {
    pub(crate) fn new(spec: QuerySpecId, parent: Option<QuerySpecId>, dml: bool) -> Self {
        Self {
            spec,
            parent,
            dml,
            spaces: Vec::new(),
            aliases: HashMap::new(),
        }
    }

    /// Look up an identification variable declared in this clause (case-insensitive).
    pub fn alias(&self, name: &str) -> Option<FromElementId> {
        self.aliases.get(&name.to_lowercase()).copied()
    }

    pub fn roots(&self) -> impl Iterator<Item = FromElementId> + '_ {
        self.spaces.iter().map(|space| space.root)
    }

    /// Every declared element: each space's root followed by its explicit joins.
    pub fn declared_elements(&self) -> impl Iterator<Item = FromElementId> + '_ {
        self.spaces
            .iter()
            .flat_map(|space| std::iter::once(space.root).chain(space.joins.iter().copied()))
    }

    pub(crate) fn declare(&mut self, alias: Option<&str>, element: FromElementId) -> SemanticResult<()> {
        let Some(alias) = alias else {
            return Ok(());
        };
        let key = alias.to_lowercase();
        if self.aliases.contains_key(&key) {
            return Err(SemanticError::DuplicateAlias {
                alias: alias.to_string(),
            });
        }
        self.aliases.insert(key, element);
        Ok(())
    }
}

/// Registry of every from clause of one statement, plus the arena owning
/// their elements.
#[derive(Debug, Clone, Default)]
pub struct FromClauseIndex {
    arena: FromElementArena,
    clauses: BTreeMap<QuerySpecId, RegisteredFromClause>,
    order: Vec<QuerySpecId>,
}

impl FromClauseIndex {
    /// Run phase 1 over a parsed statement.
    pub fn process(
        statement: &Statement,
        model: &dyn DomainMetamodel,
        strict: bool,
    ) -> SemanticResult<Self> {
        let mut processor = FromClauseProcessor {
            model,
            strict,
            index: FromClauseIndex::default(),
        };
        processor.visit_statement(statement)?;
        let index = processor.index;
        tracing::debug!(
            statement = statement.kind(),
            from_clauses = index.clauses.len(),
            from_elements = index.arena.elements().len(),
            "registered from clauses"
        );
        Ok(index)
    }

    pub fn clause(&self, spec: QuerySpecId) -> Option<&RegisteredFromClause> {
        self.clauses.get(&spec)
    }

    pub fn arena(&self) -> &FromElementArena {
        &self.arena
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Query specifications in the order they were registered.
    pub fn registration_order(&self) -> &[QuerySpecId] {
        &self.order
    }

    pub fn into_parts(self) -> (FromElementArena, BTreeMap<QuerySpecId, RegisteredFromClause>) {
        (self.arena, self.clauses)
    }

    /// Resolve an alias by walking from `spec` outwards through its enclosing clauses.
    pub fn lookup(&self, spec: QuerySpecId, alias: &str) -> Option<FromElementId> {
        let mut current = Some(spec);
        while let Some(id) = current {
            let clause = self.clauses.get(&id)?;
            if let Some(element) = clause.alias(alias) {
                return Some(element);
            }
            current = clause.parent;
        }
        None
    }
}

struct FromClauseProcessor<'m> {
    model: &'m dyn DomainMetamodel,
    strict: bool,
    index: FromClauseIndex,
}

impl FromClauseProcessor<'_> {
    fn visit_statement(&mut self, statement: &Statement) -> SemanticResult<()> {
        match statement {
            Statement::Select(spec) => self.visit_query_spec(spec, None),
            Statement::Insert(insert) => {
                self.register_dml_target(insert.id, &insert.target)?;
                match &insert.source {
                    // The source query does not see the insert target.
                    InsertSource::Query(spec) => self.visit_query_spec(spec, None),
                    InsertSource::Values(_) => Ok(()),
                }
            }
            Statement::Update(update) => {
                self.register_dml_target(update.id, &update.target)?;
                for assignment in &update.assignments {
                    self.visit_expr(&assignment.value, update.id)?;
                }
                if let Some(predicate) = &update.where_clause {
                    self.visit_predicate(predicate, update.id)?;
                }
                Ok(())
            }
            Statement::Delete(delete) => {
                self.register_dml_target(delete.id, &delete.target)?;
                if let Some(predicate) = &delete.where_clause {
                    self.visit_predicate(predicate, delete.id)?;
                }
                Ok(())
            }
        }
    }

    fn resolve_entity(&self, name: &str) -> SemanticResult<Arc<EntityType>> {
        self.model
            .resolve_entity(name)
            .ok_or_else(|| SemanticError::UnknownEntity(name.to_string()))
    }

    fn register_dml_target(&mut self, id: QuerySpecId, target: &EntityRef) -> SemanticResult<()> {
        let entity = self.resolve_entity(&target.name.value)?;
        let alias = target.alias.as_ref().map(|a| a.value.clone());
        let mut clause = RegisteredFromClause::new(id, None, true);
        let (space, root) = self.index.arena.add_root(id, entity, alias.clone(), true);
        clause.declare(alias.as_deref(), root)?;
        clause.spaces.push(RegisteredSpace {
            id: space,
            root,
            joins: Vec::new(),
        });
        self.insert_clause(clause);
        Ok(())
    }

    fn insert_clause(&mut self, clause: RegisteredFromClause) {
        self.index.order.push(clause.spec);
        self.index.clauses.insert(clause.spec, clause);
    }

    fn visit_query_spec(&mut self, spec: &QuerySpec, parent: Option<QuerySpecId>) -> SemanticResult<()> {
        let mut clause = RegisteredFromClause::new(spec.id, parent, false);

        for from_space in &spec.from.spaces {
            let entity = self.resolve_entity(&from_space.root.name.value)?;
            let alias = from_space.root.alias.as_ref().map(|a| a.value.clone());
            let (space, root) = self.index.arena.add_root(spec.id, Arc::clone(&entity), alias.clone(), false);
            clause.declare(alias.as_deref(), root)?;

            let mut joins = Vec::with_capacity(from_space.joins.len());
            for join in &from_space.joins {
                let id = self.register_join(&clause, parent, space, &entity, join)?;
                clause.declare(join.alias.as_ref().map(|a| a.value.as_str()), id)?;
                joins.push(id);
            }
            clause.spaces.push(RegisteredSpace { id: space, root, joins });
        }

        self.insert_clause(clause);

        // Nested query specifications, in source order
        for from_space in &spec.from.spaces {
            for join in &from_space.joins {
                if let Some(condition) = &join.condition {
                    self.visit_predicate(condition, spec.id)?;
                }
            }
        }
        if let Some(select) = &spec.select {
            for item in &select.items {
                self.visit_expr(&item.expr, spec.id)?;
            }
        }
        if let Some(predicate) = &spec.where_clause {
            self.visit_predicate(predicate, spec.id)?;
        }
        for expr in &spec.group_by {
            self.visit_expr(expr, spec.id)?;
        }
        if let Some(predicate) = &spec.having {
            self.visit_predicate(predicate, spec.id)?;
        }
        for sort in &spec.order_by {
            self.visit_expr(&sort.expr, spec.id)?;
        }
        Ok(())
    }

    fn register_join(
        &mut self,
        clause: &RegisteredFromClause,
        parent: Option<QuerySpecId>,
        space: SpaceId,
        root_entity: &Arc<EntityType>,
        join: &Join,
    ) -> SemanticResult<FromElementId> {
        let alias = join.alias.as_ref().map(|a| a.value.clone());

        if let Some(entity) = self.entity_join_target(clause, parent, join) {
            if self.strict {
                return Err(SemanticError::StrictJpaViolation(format!(
                    "entity join to '{}'",
                    entity.name
                )));
            }
            tracing::trace!(entity = %entity.name, "registered entity join");
            return self.index.arena.add_join(
                space,
                alias,
                entity,
                FromElementKind::EntityJoin {
                    join_type: join.join_type,
                },
            );
        }

        self.index.arena.reserve_join(space, alias, Arc::clone(root_entity))
    }

    /// An un-treated join target whose first segment is not a visible alias
    /// and whose text names an entity.
    fn entity_join_target(
        &self,
        clause: &RegisteredFromClause,
        parent: Option<QuerySpecId>,
        join: &Join,
    ) -> Option<Arc<EntityType>> {
        if join.target.treat.is_some() {
            return None;
        }
        let first = &join.target.segments.first()?.value;
        let visible = clause.alias(first).is_some()
            || parent.is_some_and(|p| self.index.lookup(p, first).is_some());
        if visible {
            return None;
        }
        self.model.resolve_entity(&join.target.text())
    }

    fn visit_predicate(&mut self, predicate: &Predicate, parent: QuerySpecId) -> SemanticResult<()> {
        match predicate {
            Predicate::And(left, right) | Predicate::Or(left, right) => {
                self.visit_predicate(left, parent)?;
                self.visit_predicate(right, parent)
            }
            Predicate::Not(inner) => self.visit_predicate(inner, parent),
            Predicate::Comparison { left, right, .. } => {
                self.visit_expr(left, parent)?;
                self.visit_expr(right, parent)
            }
            Predicate::IsNull { expr, .. }
            | Predicate::IsEmpty { expr, .. }
            | Predicate::MemberOf { expr, .. } => self.visit_expr(expr, parent),
            Predicate::Between { expr, low, high, .. } => {
                self.visit_expr(expr, parent)?;
                self.visit_expr(low, parent)?;
                self.visit_expr(high, parent)
            }
            Predicate::Like {
                expr,
                pattern,
                escape,
                ..
            } => {
                self.visit_expr(expr, parent)?;
                self.visit_expr(pattern, parent)?;
                if let Some(escape) = escape {
                    self.visit_expr(escape, parent)?;
                }
                Ok(())
            }
            Predicate::In { expr, list, .. } => {
                self.visit_expr(expr, parent)?;
                match list {
                    InList::Values(values) => {
                        for value in values {
                            self.visit_expr(value, parent)?;
                        }
                        Ok(())
                    }
                    InList::Subquery(spec) => self.visit_query_spec(spec, Some(parent)),
                    InList::Parameter(_) => Ok(()),
                }
            }
            Predicate::Exists { subquery, .. } => self.visit_query_spec(subquery, Some(parent)),
        }
    }

    fn visit_expr(&mut self, expr: &Expr, parent: QuerySpecId) -> SemanticResult<()> {
        match expr {
            Expr::Path(_) | Expr::Literal(_) | Expr::Parameter(_) => Ok(()),
            Expr::Unary { operand, .. } => self.visit_expr(operand, parent),
            Expr::Binary { left, right, .. } => {
                self.visit_expr(left, parent)?;
                self.visit_expr(right, parent)
            }
            Expr::Function { args, .. } => match args {
                FunctionArgs::Star => Ok(()),
                FunctionArgs::List { args, .. } => {
                    for arg in args {
                        self.visit_expr(arg, parent)?;
                    }
                    Ok(())
                }
            },
            Expr::Subquery(spec) => self.visit_query_spec(spec, Some(parent)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::{shop_model, strict_shop_model};
    use crate::parser;

    fn process(source: &str) -> SemanticResult<FromClauseIndex> {
        let statement = parser::parse(source)
            .into_result()
            .expect("test query should parse");
        let model = shop_model();
        FromClauseIndex::process(&statement, &model, false)
    }

    #[test]
    fn test_registers_roots_and_joins() {
        let index = process("select o from Order o join o.customer c, Product p").unwrap();
        assert_eq!(index.len(), 1);
        let clause = index.clause(QuerySpecId(0)).unwrap();
        assert_eq!(clause.spaces.len(), 2);
        assert_eq!(clause.spaces[0].joins.len(), 1);
        let c = clause.alias("C").expect("aliases are case-insensitive");
        assert!(index.arena().is_pending(c));
        assert_eq!(index.arena().element(clause.alias("p").unwrap()).entity.name, "Product");
    }

    #[test]
    fn test_nested_specs_registered_outer_first() {
        let source = "select o from Order o where exists (select l from OrderLine l where l.order = o) \
                      and o.total > (select avg(x.total) from Order x)";
        let index = process(source).unwrap();
        let order = index.registration_order();
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], QuerySpecId(0));
        assert!(order[1] < order[2]);
        let inner = index.clause(order[1]).unwrap();
        assert_eq!(inner.parent, Some(QuerySpecId(0)));
        assert_eq!(index.lookup(order[1], "o"), index.clause(QuerySpecId(0)).unwrap().alias("o"));
        assert_eq!(index.lookup(order[2], "l"), None);
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let err = process("select o from Order o, Customer o").unwrap_err();
        assert_eq!(err, SemanticError::DuplicateAlias { alias: "o".into() });
    }

    #[test]
    fn test_unknown_entity_rejected() {
        let err = process("select x from Invoice x").unwrap_err();
        assert_eq!(err, SemanticError::UnknownEntity("Invoice".into()));
    }

    #[test]
    fn test_entity_join_resolved_in_phase_one() {
        let index = process("select o from Order o join Customer c on c.email = o.status").unwrap();
        let clause = index.clause(QuerySpecId(0)).unwrap();
        let c = clause.alias("c").unwrap();
        let element = index.arena().element(c);
        assert_eq!(element.entity.name, "Customer");
        assert!(matches!(element.kind, FromElementKind::EntityJoin { .. }));
    }

    #[test]
    fn test_entity_join_rejected_when_strict() {
        let statement = parser::parse("select o from Order o join Customer c on c.id = o.id")
            .into_result()
            .unwrap();
        let err = FromClauseIndex::process(&statement, &strict_shop_model(), true).unwrap_err();
        assert!(matches!(err, SemanticError::StrictJpaViolation(_)));
    }

    #[test]
    fn test_dml_target_registered_as_dml_clause() {
        let index = process("delete from Order o where o.number = :n").unwrap();
        let clause = index.clause(QuerySpecId(0)).unwrap();
        assert!(clause.dml);
        assert_eq!(clause.spaces.len(), 1);
        assert!(index.arena().space(clause.spaces[0].id).dml);
    }
}
