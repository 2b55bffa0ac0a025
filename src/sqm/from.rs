//! From-elements, from-element spaces and the arena that owns them.
//!
//! Every from-element of a statement (roots, explicit joins, implicit joins,
//! across all nested query specifications) lives in one [`FromElementArena`]
//! and is addressed by a [`FromElementId`]. Expressions refer to elements by
//! id, never by ownership.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::domain::{Attribute, EntityType};
use crate::parser::ast::{JoinType, QuerySpecId};
use crate::semantic::error::{SemanticError, SemanticResult};

use super::expr::Predicate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FromElementId(pub usize);

impl fmt::Display for FromElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SpaceId(pub usize);

pub(crate) fn serialize_entity<S: Serializer>(
    entity: &Arc<EntityType>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&entity.name)
}

pub(crate) fn serialize_optional_entity<S: Serializer>(
    entity: &Option<Arc<EntityType>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match entity {
        Some(entity) => serializer.serialize_some(&entity.name),
        None => serializer.serialize_none(),
    }
}

/// How a from-element entered its space.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FromElementKind {
    /// First element of a space: `from Order o`.
    Root,
    /// Ad hoc join to an unrelated entity: `join Customer c on ...`.
    EntityJoin { join_type: JoinType },
    /// Join through an attribute of another element.
    AttributeJoin {
        lhs: FromElementId,
        /// Attribute path from `lhs`, including embedded segments (`address.country`).
        attribute_path: Vec<String>,
        attribute: Attribute,
        join_type: JoinType,
        fetch: bool,
        /// Materialized by path navigation rather than written in the from clause.
        implicit: bool,
    },
    /// Explicit join registered by the from-clause pass, not yet resolved.
    Pending,
}

/// A single occurrence of an entity in one query scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FromElement {
    pub id: FromElementId,
    pub space: SpaceId,
    pub spec: QuerySpecId,
    /// Identification variable as written.
    pub alias: Option<String>,
    #[serde(serialize_with = "serialize_entity")]
    pub entity: Arc<EntityType>,
    /// Subclass indicator set by `treat`.
    #[serde(serialize_with = "serialize_optional_entity")]
    pub treated_as: Option<Arc<EntityType>>,
    pub kind: FromElementKind,
    /// `on`/`with` restriction of an explicit join.
    pub on: Option<Predicate>,
}

impl FromElement {
    /// The type used for attribute lookup: the treated subtype if any.
    pub fn effective_entity(&self) -> &Arc<EntityType> {
        self.treated_as.as_ref().unwrap_or(&self.entity)
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, FromElementKind::Root)
    }

    pub fn is_implicit_join(&self) -> bool {
        matches!(
            self.kind,
            FromElementKind::AttributeJoin { implicit: true, .. }
        )
    }

    /// Alias as written, or a generated `entity#id` label.
    pub fn label(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => format!("{}#{}", self.entity.name, self.id),
        }
    }
}

/// One root plus the joins hanging off it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FromElementSpace {
    pub id: SpaceId,
    pub spec: QuerySpecId,
    /// DML target spaces hold exactly one element and no joins.
    pub dml: bool,
    pub root: FromElementId,
    pub joins: Vec<FromElementId>,
}

/// Owner of every from-element and space of one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FromElementArena {
    elements: Vec<FromElement>,
    spaces: Vec<FromElementSpace>,
}

impl FromElementArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self, id: FromElementId) -> &FromElement {
        &self.elements[id.0]
    }

    pub fn element_mut(&mut self, id: FromElementId) -> &mut FromElement {
        &mut self.elements[id.0]
    }

    pub fn space(&self, id: SpaceId) -> &FromElementSpace {
        &self.spaces[id.0]
    }

    pub fn elements(&self) -> &[FromElement] {
        &self.elements
    }

    pub fn spaces(&self) -> &[FromElementSpace] {
        &self.spaces
    }

    /// Open a new space rooted at `entity`.
    pub fn add_root(
        &mut self,
        spec: QuerySpecId,
        entity: Arc<EntityType>,
        alias: Option<String>,
        dml: bool,
    ) -> (SpaceId, FromElementId) {
        let space = SpaceId(self.spaces.len());
        let root = FromElementId(self.elements.len());
        self.elements.push(FromElement {
            id: root,
            space,
            spec,
            alias,
            entity,
            treated_as: None,
            kind: FromElementKind::Root,
            on: None,
        });
        self.spaces.push(FromElementSpace {
            id: space,
            spec,
            dml,
            root,
            joins: Vec::new(),
        });
        (space, root)
    }

    /// Append a join to a space.
    ///
    /// Fails for DML spaces, which must stay a single join-free element.
    pub fn add_join(
        &mut self,
        space: SpaceId,
        alias: Option<String>,
        entity: Arc<EntityType>,
        kind: FromElementKind,
    ) -> SemanticResult<FromElementId> {
        let target = &self.spaces[space.0];
        if target.dml {
            let root = &self.elements[target.root.0];
            return Err(SemanticError::JoinInDmlStatement {
                entity: root.entity.name.clone(),
                path: describe_join(&kind, alias.as_deref()),
            });
        }
        let spec = target.spec;
        let id = FromElementId(self.elements.len());
        self.elements.push(FromElement {
            id,
            space,
            spec,
            alias,
            entity,
            treated_as: None,
            kind,
            on: None,
        });
        self.spaces[space.0].joins.push(id);
        Ok(id)
    }

    /// Reserve a slot for an explicit join resolved later.
    pub fn reserve_join(
        &mut self,
        space: SpaceId,
        alias: Option<String>,
        placeholder: Arc<EntityType>,
    ) -> SemanticResult<FromElementId> {
        self.add_join(space, alias, placeholder, FromElementKind::Pending)
    }

    /// Fill a reserved slot.
    pub fn complete_join(
        &mut self,
        id: FromElementId,
        entity: Arc<EntityType>,
        treated_as: Option<Arc<EntityType>>,
        kind: FromElementKind,
    ) {
        let element = &mut self.elements[id.0];
        element.entity = entity;
        element.treated_as = treated_as;
        element.kind = kind;
    }

    pub fn is_pending(&self, id: FromElementId) -> bool {
        matches!(self.elements[id.0].kind, FromElementKind::Pending)
    }

    /// Number of implicit joins materialized so far.
    pub fn implicit_join_count(&self) -> usize {
        self.elements.iter().filter(|e| e.is_implicit_join()).count()
    }
}

fn describe_join(kind: &FromElementKind, alias: Option<&str>) -> String {
    match kind {
        FromElementKind::AttributeJoin { attribute_path, .. } => attribute_path.join("."),
        _ => alias.unwrap_or("<join>").to_string(),
    }
}
