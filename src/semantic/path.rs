//! Path resolution.
//!
//! Turns a dotted path (`o.customer.address.city`) into a [`Binding`]:
//!
//! 1. The first segment is matched against the identification variables of
//!    the current scope and then each enclosing scope (innermost wins). If
//!    none matches, it is an unqualified attribute of exactly one from-element
//!    of the current scope.
//! 2. Each further segment is an attribute of the previous binding's type
//!    (or of its `treat` subtype). Basic attributes end the path; embedded
//!    attributes are walked into without a join; associations materialize a
//!    join, reused per `(source element, attribute path)` where the context
//!    allows it.
//!
//! The syntactic position of the path selects a [`PathContext`], which
//! decides join reuse, the join kind of intermediate joins and which roots
//! and navigations are legal.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::domain::{Attribute, AttributeClassification, DomainMetamodel, EntityType, ManagedType};
use crate::parser::ast::{Join, JoinType, Path, QuerySpecId, TreatBase};
use crate::parser::Spanned;
use crate::sqm::expr::Binding;
use crate::sqm::from::{FromElementArena, FromElementId, FromElementKind, SpaceId};

use super::error::{SemanticError, SemanticResult};
use super::from_clause::RegisteredFromClause;
use super::scope::Scope;

// ============================================================================
// Contexts
// ============================================================================

/// Where a path occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathContext {
    /// Where, having, group by, assignment values, select-clause subexpressions.
    Standard,
    /// A select item.
    SelectClause,
    /// An order-by item.
    OrderBy,
    /// The target of `join x.y as z`.
    ExplicitJoin {
        join_type: JoinType,
        fetch: bool,
        space: SpaceId,
    },
    /// The `on`/`with` restriction of a join in `space`.
    JoinPredicate { space: SpaceId },
}

/// Partition of the implicit-join cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum JoinBucket {
    Standard,
    Select,
}

impl PathContext {
    /// Cache partition for implicit joins and bindings; `None` never reuses.
    fn bucket(&self) -> Option<JoinBucket> {
        if self.forces_terminal_join() {
            Some(JoinBucket::Select)
        } else if self.reuses_joins() {
            Some(JoinBucket::Standard)
        } else {
            None
        }
    }

    /// Join kind and fetch flag for joins materialized along the path.
    pub fn intermediate_join(&self) -> (JoinType, bool) {
        match self {
            PathContext::ExplicitJoin {
                join_type, fetch, ..
            } => (*join_type, *fetch),
            _ => (JoinType::Inner, false),
        }
    }

    /// A selected path must address a row source rather than reuse a filter join.
    pub fn forces_terminal_join(&self) -> bool {
        matches!(self, PathContext::SelectClause)
    }

    /// Filter positions share implicit joins with each other.
    pub fn reuses_joins(&self) -> bool {
        matches!(
            self,
            PathContext::Standard | PathContext::OrderBy | PathContext::JoinPredicate { .. }
        )
    }

    /// The only from-element space roots may come from.
    pub fn restricted_space(&self) -> Option<SpaceId> {
        match self {
            PathContext::ExplicitJoin { space, .. } | PathContext::JoinPredicate { space } => {
                Some(*space)
            }
            _ => None,
        }
    }

    /// Whether entity or collection navigation may materialize joins.
    pub fn allows_navigation(&self) -> bool {
        !matches!(self, PathContext::JoinPredicate { .. })
    }

    /// Order-by items may name a select item by its result alias.
    pub fn allows_result_alias(&self) -> bool {
        matches!(self, PathContext::OrderBy)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PathContext::Standard => "standard",
            PathContext::SelectClause => "select",
            PathContext::OrderBy => "order by",
            PathContext::ExplicitJoin { .. } => "explicit join",
            PathContext::JoinPredicate { .. } => "join predicate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BindingKey {
    spec: QuerySpecId,
    bucket: JoinBucket,
    path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct JoinKey {
    lhs: FromElementId,
    attribute_path: Vec<String>,
    bucket: JoinBucket,
}

/// What the next segment is looked up on.
struct Cursor {
    managed: ManagedType,
    element: FromElementId,
    /// Embedded attribute names walked since `element`.
    embedded: Vec<String>,
}

/// A resolved association step, not yet attached to any element.
#[derive(Debug, Clone)]
pub struct JoinTarget {
    pub lhs: FromElementId,
    pub attribute_path: Vec<String>,
    pub attribute: Attribute,
    pub entity: Arc<EntityType>,
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves paths against the registered from clauses of one statement.
///
/// Owns the from-element arena while the statement is being built; implicit
/// joins are appended to it as paths navigate associations.
pub struct PathResolver<'m> {
    model: &'m dyn DomainMetamodel,
    strict: bool,
    arena: FromElementArena,
    clauses: BTreeMap<QuerySpecId, RegisteredFromClause>,
    bindings: HashMap<BindingKey, Arc<Binding>>,
    joins: HashMap<JoinKey, FromElementId>,
}

impl<'m> PathResolver<'m> {
    pub fn new(
        model: &'m dyn DomainMetamodel,
        strict: bool,
        arena: FromElementArena,
        clauses: BTreeMap<QuerySpecId, RegisteredFromClause>,
    ) -> Self {
        Self {
            model,
            strict,
            arena,
            clauses,
            bindings: HashMap::new(),
            joins: HashMap::new(),
        }
    }

    pub fn model(&self) -> &'m dyn DomainMetamodel {
        self.model
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn arena(&self) -> &FromElementArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut FromElementArena {
        &mut self.arena
    }

    pub fn into_arena(self) -> FromElementArena {
        self.arena
    }

    pub fn clause(&self, spec: QuerySpecId) -> Option<&RegisteredFromClause> {
        self.clauses.get(&spec)
    }

    /// Register a from clause built outside phase 1.
    pub fn register_clause(&mut self, clause: RegisteredFromClause) {
        self.clauses.insert(clause.spec, clause);
    }

    /// The element an identification variable denotes, innermost scope first.
    pub fn lookup_alias(&self, name: &str, scope: &Scope<'_>) -> Option<FromElementId> {
        scope
            .chain()
            .filter_map(|spec| self.clauses.get(&spec))
            .find_map(|clause| clause.alias(name))
    }

    // ------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------

    /// Resolve a path in the given context and scope.
    pub fn resolve(
        &mut self,
        path: &Path,
        context: PathContext,
        scope: &Scope<'_>,
    ) -> SemanticResult<Arc<Binding>> {
        let text = path.text();
        tracing::trace!(path = %text, context = context.name(), spec = %scope.spec, "resolving path");

        let (root, rest) = match &path.treat {
            Some(treat) => (self.resolve_treat(treat, context, scope)?, &path.segments[..]),
            None => {
                let Some(first) = path.segments.first() else {
                    return Err(SemanticError::UnresolvableIdentifier(text));
                };
                match self.lookup_alias(&first.value, scope) {
                    Some(element) => (
                        self.root_binding(element, &text, context, scope)?,
                        &path.segments[1..],
                    ),
                    None => {
                        let element = self.unqualified_root(&first.value, &text, scope)?;
                        (
                            self.root_binding(element, &text, context, scope)?,
                            &path.segments[..],
                        )
                    }
                }
            }
        };

        self.navigate(root, rest, &text, context, scope)
    }

    /// Resolve the target of an explicit join and fill its reserved element.
    pub fn resolve_explicit_join(
        &mut self,
        join: &Join,
        element: FromElementId,
        scope: &Scope<'_>,
    ) -> SemanticResult<()> {
        let space = self.arena.element(element).space;
        let context = PathContext::ExplicitJoin {
            join_type: join.join_type,
            fetch: join.fetch,
            space,
        };
        let text = join.target.text();

        // `join treat(c.pets as Dog) d` joins `c.pets` narrowed to `Dog`
        let (target_path, subtype) = match &join.target.treat {
            Some(treat) if join.target.segments.is_empty() => (&treat.path, Some(&treat.subtype)),
            _ => (&join.target, None),
        };

        let Some((last, prefix)) = target_path.segments.split_last() else {
            return Err(SemanticError::InvalidJoinTarget { path: text });
        };
        let lhs = if prefix.is_empty() && target_path.treat.is_none() {
            let root = self.unqualified_root(&last.value, &text, scope)?;
            self.root_binding(root, &text, context, scope)?
        } else {
            let lhs_path = Path {
                treat: target_path.treat.clone(),
                segments: prefix.to_vec(),
                span: target_path.span.clone(),
            };
            self.resolve(&lhs_path, context, scope)?
        };

        let attribute = self.find_attribute(&lhs, &last.value, &text)?;
        if !attribute.classification.is_association() {
            return Err(SemanticError::InvalidJoinTarget { path: text });
        }
        let target = self.join_target(&lhs, attribute, &text)?;
        let treated_as = match subtype {
            Some(subtype) => Some(self.narrow(&target.entity, subtype, &text)?),
            None => None,
        };

        tracing::trace!(path = %text, element = %element, "resolved explicit join");
        self.arena.complete_join(
            element,
            target.entity,
            treated_as,
            FromElementKind::AttributeJoin {
                lhs: target.lhs,
                attribute_path: target.attribute_path,
                attribute: target.attribute,
                join_type: join.join_type,
                fetch: join.fetch,
                implicit: false,
            },
        );
        Ok(())
    }

    /// Binding for a from-element used on its own.
    pub fn element_binding(
        &mut self,
        element: FromElementId,
        context: PathContext,
        scope: &Scope<'_>,
    ) -> SemanticResult<Arc<Binding>> {
        let label = self.arena.element(element).label();
        self.cached(scope.spec, context, &label, |_| {
            Ok(Arc::new(Binding::FromElement {
                element,
                treated_as: None,
            }))
        })
    }

    /// Continue resolution from `lhs` through attribute names.
    pub fn navigate_names(
        &mut self,
        lhs: Arc<Binding>,
        names: &[String],
        context: PathContext,
        scope: &Scope<'_>,
    ) -> SemanticResult<Arc<Binding>> {
        let segments: Vec<Spanned<String>> = names
            .iter()
            .map(|name| Spanned::new(name.clone(), 0..0))
            .collect();
        let text = std::iter::once(lhs.describe(&self.arena))
            .chain(names.iter().cloned())
            .collect::<Vec<_>>()
            .join(".");
        self.navigate(lhs, &segments, &text, context, scope)
    }

    /// Look up an association on `lhs` and describe the join it needs.
    pub fn join_target(
        &self,
        lhs: &Binding,
        attribute: Attribute,
        path: &str,
    ) -> SemanticResult<JoinTarget> {
        let cursor = self.cursor(lhs, path)?;
        let entity = match self.model.attribute_target(&attribute) {
            Some(ManagedType::Entity(entity)) => entity,
            _ => {
                return Err(SemanticError::UnknownEntity(
                    attribute.target.clone().unwrap_or_else(|| attribute.name.clone()),
                ))
            }
        };
        let mut attribute_path = cursor.embedded;
        attribute_path.push(attribute.name.clone());
        Ok(JoinTarget {
            lhs: cursor.element,
            attribute_path,
            attribute,
            entity,
        })
    }

    /// Find an attribute on the type `lhs` denotes.
    pub fn find_attribute(&self, lhs: &Binding, name: &str, path: &str) -> SemanticResult<Attribute> {
        let cursor = self.cursor(lhs, path)?;
        self.model
            .find_attribute(&cursor.managed, name)
            .ok_or_else(|| SemanticError::UnknownAttribute {
                owner: cursor.managed.name().to_string(),
                attribute: name.to_string(),
            })
    }

    pub fn implicit_join_count(&self) -> usize {
        self.arena.implicit_join_count()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn cached(
        &mut self,
        spec: QuerySpecId,
        context: PathContext,
        key: &str,
        build: impl FnOnce(&mut Self) -> SemanticResult<Arc<Binding>>,
    ) -> SemanticResult<Arc<Binding>> {
        let Some(bucket) = context.bucket() else {
            return build(self);
        };
        let key = BindingKey {
            spec,
            bucket,
            path: key.to_string(),
        };
        if let Some(binding) = self.bindings.get(&key) {
            return Ok(Arc::clone(binding));
        }
        let binding = build(self)?;
        self.bindings.insert(key, Arc::clone(&binding));
        Ok(binding)
    }

    fn root_binding(
        &mut self,
        element: FromElementId,
        path: &str,
        context: PathContext,
        scope: &Scope<'_>,
    ) -> SemanticResult<Arc<Binding>> {
        let from = self.arena.element(element);
        if self.arena.is_pending(element) {
            return Err(SemanticError::JoinNotYetResolved { alias: from.label() });
        }
        if let Some(space) = context.restricted_space() {
            if from.space != space {
                return Err(match context {
                    PathContext::JoinPredicate { .. } => SemanticError::CrossSpaceOnClauseReference {
                        path: path.to_string(),
                        alias: from.label(),
                    },
                    _ => SemanticError::CrossSpaceExplicitJoin {
                        path: path.to_string(),
                        alias: from.label(),
                    },
                });
            }
        }
        self.element_binding(element, context, scope)
    }

    /// The single declared element of the current scope that has `attribute`.
    fn unqualified_root(
        &self,
        attribute: &str,
        path: &str,
        scope: &Scope<'_>,
    ) -> SemanticResult<FromElementId> {
        let Some(clause) = self.clauses.get(&scope.spec) else {
            return Err(SemanticError::UnresolvableIdentifier(path.to_string()));
        };
        let candidates: Vec<FromElementId> = clause
            .declared_elements()
            .filter(|id| !self.arena.is_pending(*id))
            .filter(|id| {
                let owner = ManagedType::Entity(Arc::clone(self.arena.element(*id).effective_entity()));
                self.model.find_attribute(&owner, attribute).is_some()
            })
            .collect();

        match candidates.as_slice() {
            [] => Err(SemanticError::UnresolvableIdentifier(path.to_string())),
            [single] => {
                if self.strict {
                    return Err(SemanticError::StrictJpaViolation(format!(
                        "unqualified attribute reference '{}'",
                        path
                    )));
                }
                Ok(*single)
            }
            many => Err(SemanticError::AmbiguousAttribute {
                attribute: attribute.to_string(),
                candidates: many.iter().map(|id| self.arena.element(*id).label()).collect(),
            }),
        }
    }

    fn resolve_treat(
        &mut self,
        treat: &TreatBase,
        context: PathContext,
        scope: &Scope<'_>,
    ) -> SemanticResult<Arc<Binding>> {
        let base = self.resolve(&treat.path, context, scope)?;
        let base_text = treat.path.text();
        let element = match base.as_ref() {
            Binding::FromElement { element, .. } => *element,
            Binding::Attribute {
                join: Some(join), ..
            } => *join,
            Binding::Attribute { .. } => {
                return Err(SemanticError::InvalidTreatTarget {
                    path: base_text,
                    subtype: treat.subtype.value.clone(),
                })
            }
        };
        let entity = Arc::clone(&self.arena.element(element).entity);
        let subtype = self.narrow(&entity, &treat.subtype, &base_text)?;
        let key = format!("treat({} as {})", base.describe(&self.arena), subtype.name);
        self.cached(scope.spec, context, &key, |_| {
            Ok(Arc::new(Binding::FromElement {
                element,
                treated_as: Some(subtype),
            }))
        })
    }

    fn narrow(
        &self,
        entity: &EntityType,
        subtype: &Spanned<String>,
        path: &str,
    ) -> SemanticResult<Arc<EntityType>> {
        let resolved = self
            .model
            .resolve_entity(&subtype.value)
            .ok_or_else(|| SemanticError::UnknownEntity(subtype.value.clone()))?;
        if !self.model.is_subtype(&resolved, entity) {
            return Err(SemanticError::InvalidTreatTarget {
                path: path.to_string(),
                subtype: subtype.value.clone(),
            });
        }
        Ok(resolved)
    }

    fn navigate(
        &mut self,
        mut current: Arc<Binding>,
        segments: &[Spanned<String>],
        path: &str,
        context: PathContext,
        scope: &Scope<'_>,
    ) -> SemanticResult<Arc<Binding>> {
        for (index, segment) in segments.iter().enumerate() {
            let terminal = index + 1 == segments.len();
            let lhs = Arc::clone(&current);
            let key = format!("{}.{}", lhs.describe(&self.arena), segment.value);
            current = self.cached(scope.spec, context, &key, |resolver| {
                resolver.step(lhs, &segment.value, terminal, path, context)
            })?;
        }
        Ok(current)
    }

    fn step(
        &mut self,
        lhs: Arc<Binding>,
        name: &str,
        terminal: bool,
        path: &str,
        context: PathContext,
    ) -> SemanticResult<Arc<Binding>> {
        let attribute = self.find_attribute(&lhs, name, path)?;
        let classification = attribute.classification;

        if !classification.is_association() {
            return Ok(Arc::new(Binding::Attribute {
                lhs,
                attribute,
                join: None,
            }));
        }

        if !context.allows_navigation() {
            return Err(SemanticError::NavigationInOnClause {
                path: path.to_string(),
            });
        }
        if self.strict && classification.is_plural() && !terminal {
            return Err(SemanticError::StrictJpaViolation(format!(
                "dereferencing plural attribute '{}' in '{}'",
                attribute.name, path
            )));
        }

        let target = self.join_target(&lhs, attribute, path)?;
        let join = self.materialize_join(target.clone(), context)?;
        Ok(Arc::new(Binding::Attribute {
            lhs,
            attribute: target.attribute,
            join: Some(join),
        }))
    }

    fn materialize_join(&mut self, target: JoinTarget, context: PathContext) -> SemanticResult<FromElementId> {
        let key = context.bucket().map(|bucket| JoinKey {
            lhs: target.lhs,
            attribute_path: target.attribute_path.clone(),
            bucket,
        });
        if let Some(existing) = key.as_ref().and_then(|key| self.joins.get(key)) {
            return Ok(*existing);
        }

        let space = self.arena.element(target.lhs).space;
        let (join_type, fetch) = context.intermediate_join();
        let id = self.arena.add_join(
            space,
            None,
            Arc::clone(&target.entity),
            FromElementKind::AttributeJoin {
                lhs: target.lhs,
                attribute_path: target.attribute_path.clone(),
                attribute: target.attribute,
                join_type,
                fetch,
                implicit: true,
            },
        )?;
        tracing::trace!(
            lhs = %target.lhs,
            attribute = %target.attribute_path.join("."),
            entity = %target.entity.name,
            join = %id,
            "materialized implicit join"
        );
        if let Some(key) = key {
            self.joins.insert(key, id);
        }
        Ok(id)
    }

    fn cursor(&self, binding: &Binding, path: &str) -> SemanticResult<Cursor> {
        match binding {
            Binding::FromElement {
                element,
                treated_as,
            } => {
                let entity = treated_as
                    .as_ref()
                    .unwrap_or_else(|| self.arena.element(*element).effective_entity());
                Ok(Cursor {
                    managed: ManagedType::Entity(Arc::clone(entity)),
                    element: *element,
                    embedded: Vec::new(),
                })
            }
            Binding::Attribute {
                join: Some(join), ..
            } => Ok(Cursor {
                managed: ManagedType::Entity(Arc::clone(self.arena.element(*join).effective_entity())),
                element: *join,
                embedded: Vec::new(),
            }),
            Binding::Attribute { lhs, attribute, .. } => match attribute.classification {
                AttributeClassification::Embedded => {
                    let managed = self.model.attribute_target(attribute).ok_or_else(|| {
                        SemanticError::UnknownEntity(
                            attribute.target.clone().unwrap_or_else(|| attribute.name.clone()),
                        )
                    })?;
                    let mut cursor = self.cursor(lhs, path)?;
                    cursor.embedded.push(attribute.name.clone());
                    cursor.managed = managed;
                    Ok(cursor)
                }
                _ => Err(SemanticError::BasicAttributeDereference {
                    path: path.to_string(),
                    attribute: attribute.name.clone(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::shop_model;
    use crate::domain::DomainModel;
    use crate::parser;
    use crate::semantic::from_clause::FromClauseIndex;

    fn resolver<'m>(model: &'m DomainModel, source: &str) -> PathResolver<'m> {
        let statement = parser::parse(source).into_result().expect("test query should parse");
        let index = FromClauseIndex::process(&statement, model, false).expect("phase 1");
        let (arena, clauses) = index.into_parts();
        PathResolver::new(model, false, arena, clauses)
    }

    fn path(text: &str) -> Path {
        let segments: Vec<&str> = text.split('.').collect();
        Path::simple(&segments, 0..text.len())
    }

    #[test]
    fn test_bare_alias_is_element_binding() {
        let model = shop_model();
        let mut r = resolver(&model, "select o from Order o");
        let scope = Scope::root(QuerySpecId(0));
        let binding = r.resolve(&path("o"), PathContext::SelectClause, &scope).unwrap();
        assert!(binding.is_from_element());
    }

    #[test]
    fn test_basic_terminal_has_no_join() {
        let model = shop_model();
        let mut r = resolver(&model, "select o from Order o");
        let scope = Scope::root(QuerySpecId(0));
        let binding = r.resolve(&path("o.number"), PathContext::Standard, &scope).unwrap();
        assert_eq!(binding.join(), None);
        assert_eq!(r.implicit_join_count(), 0);
    }

    #[test]
    fn test_association_materializes_reused_join() {
        let model = shop_model();
        let mut r = resolver(&model, "select o from Order o");
        let scope = Scope::root(QuerySpecId(0));
        let first = r.resolve(&path("o.customer.name"), PathContext::Standard, &scope).unwrap();
        let second = r.resolve(&path("o.customer.name"), PathContext::Standard, &scope).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let email = r.resolve(&path("o.customer.email"), PathContext::Standard, &scope).unwrap();
        assert_eq!(email.owning_element(), first.owning_element());
        assert_eq!(r.implicit_join_count(), 1);
    }

    #[test]
    fn test_context_join_policies() {
        let explicit = PathContext::ExplicitJoin {
            join_type: JoinType::Left,
            fetch: true,
            space: SpaceId(0),
        };
        let on = PathContext::JoinPredicate { space: SpaceId(0) };

        assert!(PathContext::SelectClause.forces_terminal_join());
        assert!(!PathContext::SelectClause.reuses_joins());
        for context in [PathContext::Standard, PathContext::OrderBy, on] {
            assert!(context.reuses_joins());
            assert!(!context.forces_terminal_join());
            assert_eq!(context.bucket(), Some(JoinBucket::Standard));
        }
        assert!(!explicit.reuses_joins());
        assert!(!explicit.forces_terminal_join());
        assert_eq!(explicit.bucket(), None);
        assert_eq!(explicit.intermediate_join(), (JoinType::Left, true));
        assert_eq!(PathContext::SelectClause.bucket(), Some(JoinBucket::Select));
    }

    #[test]
    fn test_explicit_join_context_never_reuses_implicit_joins() {
        let model = shop_model();
        let mut r = resolver(&model, "select o from Order o");
        let scope = Scope::root(QuerySpecId(0));
        let implicit = r.resolve(&path("o.customer"), PathContext::Standard, &scope).unwrap();
        let explicit = PathContext::ExplicitJoin {
            join_type: JoinType::Inner,
            fetch: false,
            space: SpaceId(0),
        };
        let first = r.resolve(&path("o.customer"), explicit, &scope).unwrap();
        let second = r.resolve(&path("o.customer"), explicit, &scope).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_ne!(first.join(), implicit.join());
        assert_ne!(first.join(), second.join());
    }

    #[test]
    fn test_select_context_does_not_reuse_standard_joins() {
        let model = shop_model();
        let mut r = resolver(&model, "select o from Order o");
        let scope = Scope::root(QuerySpecId(0));
        let filter = r.resolve(&path("o.customer"), PathContext::Standard, &scope).unwrap();
        let selected = r.resolve(&path("o.customer"), PathContext::SelectClause, &scope).unwrap();
        assert_ne!(filter.join(), selected.join());
        assert_eq!(r.implicit_join_count(), 2);
    }

    #[test]
    fn test_embedded_path_joins_from_owning_element() {
        let model = shop_model();
        let mut r = resolver(&model, "select o from Order o");
        let scope = Scope::root(QuerySpecId(0));
        let binding = r
            .resolve(&path("o.shippingAddress.country.name"), PathContext::Standard, &scope)
            .unwrap();
        let country = binding.owning_element();
        match &r.arena().element(country).kind {
            FromElementKind::AttributeJoin { attribute_path, .. } => {
                assert_eq!(attribute_path, &vec!["shippingAddress".to_string(), "country".to_string()]);
            }
            other => panic!("Expected attribute join, got {:?}", other),
        }
    }

    #[test]
    fn test_unqualified_attribute() {
        let model = shop_model();
        let mut r = resolver(&model, "select o from Order o");
        let scope = Scope::root(QuerySpecId(0));
        let binding = r.resolve(&path("number"), PathContext::Standard, &scope).unwrap();
        let qualified = r.resolve(&path("o.number"), PathContext::Standard, &scope).unwrap();
        assert!(Arc::ptr_eq(&binding, &qualified));
    }

    #[test]
    fn test_unqualified_attribute_ambiguous() {
        let model = shop_model();
        let mut r = resolver(&model, "select o from Order o, Customer c");
        let scope = Scope::root(QuerySpecId(0));
        let err = r.resolve(&path("id"), PathContext::Standard, &scope).unwrap_err();
        assert!(matches!(err, SemanticError::AmbiguousAttribute { .. }));
        let err = r.resolve(&path("nope"), PathContext::Standard, &scope).unwrap_err();
        assert_eq!(err, SemanticError::UnresolvableIdentifier("nope".into()));
    }

    #[test]
    fn test_basic_dereference_rejected() {
        let model = shop_model();
        let mut r = resolver(&model, "select o from Order o");
        let scope = Scope::root(QuerySpecId(0));
        let err = r.resolve(&path("o.number.length"), PathContext::Standard, &scope).unwrap_err();
        assert!(matches!(err, SemanticError::BasicAttributeDereference { .. }));
    }

    #[test]
    fn test_join_predicate_rejects_navigation_but_not_embedded() {
        let model = shop_model();
        let mut r = resolver(&model, "select o from Order o");
        let scope = Scope::root(QuerySpecId(0));
        let space = r.arena().element(FromElementId(0)).space;
        let context = PathContext::JoinPredicate { space };
        assert!(r.resolve(&path("o.shippingAddress.city"), context, &scope).is_ok());
        let err = r.resolve(&path("o.customer.name"), context, &scope).unwrap_err();
        assert!(matches!(err, SemanticError::NavigationInOnClause { .. }));
    }

    #[test]
    fn test_dml_space_rejects_implicit_join() {
        let model = shop_model();
        let mut r = resolver(&model, "delete from Order o");
        let scope = Scope::root(QuerySpecId(0));
        let err = r.resolve(&path("o.customer.name"), PathContext::Standard, &scope).unwrap_err();
        assert!(matches!(err, SemanticError::JoinInDmlStatement { .. }));
    }
}
