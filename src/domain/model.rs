//! In-crate domain model: entity and embeddable types with a petgraph type hierarchy.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::DomainMetamodel;

// ============================================================================
// Attribute classification
// ============================================================================

/// Scalar type of a basic attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasicType {
    String,
    Integer,
    Long,
    Decimal,
    Double,
    Boolean,
    Date,
    Timestamp,
}

/// Comparable family of a basic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    Text,
    Numeric,
    Boolean,
    Temporal,
}

impl BasicType {
    pub fn family(self) -> TypeFamily {
        match self {
            BasicType::String => TypeFamily::Text,
            BasicType::Integer | BasicType::Long | BasicType::Decimal | BasicType::Double => {
                TypeFamily::Numeric
            }
            BasicType::Boolean => TypeFamily::Boolean,
            BasicType::Date | BasicType::Timestamp => TypeFamily::Temporal,
        }
    }

    pub fn is_numeric(self) -> bool {
        self.family() == TypeFamily::Numeric
    }

    pub fn is_integral(self) -> bool {
        matches!(self, BasicType::Integer | BasicType::Long)
    }

    /// Result type of arithmetic between two numeric types.
    pub fn promote(self, other: BasicType) -> BasicType {
        fn rank(t: BasicType) -> u8 {
            match t {
                BasicType::Integer => 0,
                BasicType::Long => 1,
                BasicType::Decimal => 2,
                BasicType::Double => 3,
                _ => 0,
            }
        }
        if rank(self) >= rank(other) {
            self
        } else {
            other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BasicType::String => "string",
            BasicType::Integer => "integer",
            BasicType::Long => "long",
            BasicType::Decimal => "decimal",
            BasicType::Double => "double",
            BasicType::Boolean => "boolean",
            BasicType::Date => "date",
            BasicType::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an attribute is mapped. Drives path-resolution policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeClassification {
    Basic(BasicType),
    Embedded,
    ManyToOne,
    OneToOne,
    Any,
    OneToMany,
    ManyToMany,
    ManyToAny,
}

impl AttributeClassification {
    /// Navigating this attribute requires a join.
    pub fn is_association(self) -> bool {
        !matches!(
            self,
            AttributeClassification::Basic(_) | AttributeClassification::Embedded
        )
    }

    pub fn is_plural(self) -> bool {
        matches!(
            self,
            AttributeClassification::OneToMany
                | AttributeClassification::ManyToMany
                | AttributeClassification::ManyToAny
        )
    }

    pub fn is_singular_association(self) -> bool {
        matches!(
            self,
            AttributeClassification::ManyToOne
                | AttributeClassification::OneToOne
                | AttributeClassification::Any
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttributeClassification::Basic(_) => "basic",
            AttributeClassification::Embedded => "embedded",
            AttributeClassification::ManyToOne => "many-to-one",
            AttributeClassification::OneToOne => "one-to-one",
            AttributeClassification::Any => "any",
            AttributeClassification::OneToMany => "one-to-many",
            AttributeClassification::ManyToMany => "many-to-many",
            AttributeClassification::ManyToAny => "many-to-any",
        }
    }
}

impl fmt::Display for AttributeClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persistent attribute of an entity or embeddable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub classification: AttributeClassification,
    /// Target entity or embeddable name; `None` for basic attributes.
    pub target: Option<String>,
}

impl Attribute {
    pub fn basic(name: impl Into<String>, basic_type: BasicType) -> Self {
        Self {
            name: name.into(),
            classification: AttributeClassification::Basic(basic_type),
            target: None,
        }
    }

    pub fn embedded(name: impl Into<String>, embeddable: impl Into<String>) -> Self {
        Self::targeted(name, AttributeClassification::Embedded, embeddable)
    }

    pub fn many_to_one(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::targeted(name, AttributeClassification::ManyToOne, entity)
    }

    pub fn one_to_one(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::targeted(name, AttributeClassification::OneToOne, entity)
    }

    pub fn any(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::targeted(name, AttributeClassification::Any, entity)
    }

    pub fn one_to_many(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::targeted(name, AttributeClassification::OneToMany, entity)
    }

    pub fn many_to_many(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::targeted(name, AttributeClassification::ManyToMany, entity)
    }

    pub fn many_to_any(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::targeted(name, AttributeClassification::ManyToAny, entity)
    }

    pub fn targeted(
        name: impl Into<String>,
        classification: AttributeClassification,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            classification,
            target: Some(target.into()),
        }
    }

    pub fn basic_type(&self) -> Option<BasicType> {
        match self.classification {
            AttributeClassification::Basic(t) => Some(t),
            _ => None,
        }
    }
}

// ============================================================================
// Managed types
// ============================================================================

/// An entity type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityType {
    pub name: String,
    /// Fully-qualified type name, also accepted by entity resolution.
    pub type_name: Option<String>,
    pub supertype: Option<String>,
    /// Mapped without its own storage; queries against it are split per implementor.
    pub polymorphic: bool,
    pub attributes: Vec<Attribute>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            supertype: None,
            polymorphic: false,
            attributes: Vec::new(),
        }
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.supertype = Some(supertype.into());
        self
    }

    pub fn polymorphic(mut self) -> Self {
        self.polymorphic = true;
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Attribute declared directly on this type (not inherited).
    pub fn declared_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// An embeddable (value) type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddableType {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl EmbeddableType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// A type that declares attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedType {
    Entity(Arc<EntityType>),
    Embeddable(Arc<EmbeddableType>),
}

impl ManagedType {
    pub fn name(&self) -> &str {
        match self {
            ManagedType::Entity(entity) => &entity.name,
            ManagedType::Embeddable(embeddable) => &embeddable.name,
        }
    }

    pub fn as_entity(&self) -> Option<&Arc<EntityType>> {
        match self {
            ManagedType::Entity(entity) => Some(entity),
            ManagedType::Embeddable(_) => None,
        }
    }
}

impl fmt::Display for ManagedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Model
// ============================================================================

/// Errors raised while assembling a domain model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Duplicate type name: {0}")]
    DuplicateType(String),

    #[error("Entity '{entity}' extends unknown entity '{supertype}'")]
    UnknownSupertype { entity: String, supertype: String },

    #[error("Attribute '{owner}.{attribute}' targets unknown type '{target}'")]
    UnknownTarget {
        owner: String,
        attribute: String,
        target: String,
    },

    #[error("Attribute '{owner}.{attribute}' is missing its target type")]
    MissingTarget { owner: String, attribute: String },

    #[error("Inheritance cycle involving entity '{0}'")]
    InheritanceCycle(String),
}

/// Builder for a [`DomainModel`].
#[derive(Debug, Default)]
pub struct DomainModelBuilder {
    entities: Vec<EntityType>,
    embeddables: Vec<EmbeddableType>,
    strict_jpa_compliance: bool,
}

impl DomainModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity: EntityType) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn embeddable(mut self, embeddable: EmbeddableType) -> Self {
        self.embeddables.push(embeddable);
        self
    }

    pub fn strict_jpa_compliance(mut self, strict: bool) -> Self {
        self.strict_jpa_compliance = strict;
        self
    }

    /// Validate references and build the hierarchy graph.
    pub fn build(self) -> Result<DomainModel, ModelError> {
        let mut entity_index = HashMap::new();
        let mut entities = Vec::with_capacity(self.entities.len());
        let mut hierarchy = DiGraph::new();
        let mut nodes = Vec::with_capacity(self.entities.len());

        for entity in self.entities {
            if entity_index.contains_key(&entity.name) {
                return Err(ModelError::DuplicateType(entity.name));
            }
            let position = entities.len();
            entity_index.insert(entity.name.clone(), position);
            if let Some(type_name) = &entity.type_name {
                entity_index.entry(type_name.clone()).or_insert(position);
            }
            nodes.push(hierarchy.add_node(position));
            entities.push(Arc::new(entity));
        }

        let mut embeddables = HashMap::new();
        for embeddable in self.embeddables {
            if entity_index.contains_key(&embeddable.name)
                || embeddables.contains_key(&embeddable.name)
            {
                return Err(ModelError::DuplicateType(embeddable.name));
            }
            embeddables.insert(embeddable.name.clone(), Arc::new(embeddable));
        }

        // Edges run supertype -> subtype
        for (position, entity) in entities.iter().enumerate() {
            if let Some(supertype) = &entity.supertype {
                let parent = entity_index.get(supertype).copied().ok_or_else(|| {
                    ModelError::UnknownSupertype {
                        entity: entity.name.clone(),
                        supertype: supertype.clone(),
                    }
                })?;
                if parent == position || has_path_connecting(&hierarchy, nodes[position], nodes[parent], None) {
                    return Err(ModelError::InheritanceCycle(entity.name.clone()));
                }
                hierarchy.add_edge(nodes[parent], nodes[position], ());
            }
        }

        let owners = entities
            .iter()
            .map(|e| (e.name.as_str(), &e.attributes))
            .chain(embeddables.values().map(|e| (e.name.as_str(), &e.attributes)));
        for (owner, attributes) in owners {
            for attribute in attributes.iter() {
                check_target(owner, attribute, &entity_index, &embeddables)?;
            }
        }

        Ok(DomainModel {
            entities,
            entity_index,
            embeddables,
            hierarchy,
            nodes,
            strict_jpa_compliance: self.strict_jpa_compliance,
        })
    }
}

fn check_target(
    owner: &str,
    attribute: &Attribute,
    entity_index: &HashMap<String, usize>,
    embeddables: &HashMap<String, Arc<EmbeddableType>>,
) -> Result<(), ModelError> {
    if attribute.basic_type().is_some() {
        return Ok(());
    }
    let target = attribute
        .target
        .as_deref()
        .ok_or_else(|| ModelError::MissingTarget {
            owner: owner.to_string(),
            attribute: attribute.name.clone(),
        })?;
    let known = match attribute.classification {
        AttributeClassification::Embedded => embeddables.contains_key(target),
        _ => entity_index.contains_key(target),
    };
    if known {
        Ok(())
    } else {
        Err(ModelError::UnknownTarget {
            owner: owner.to_string(),
            attribute: attribute.name.clone(),
            target: target.to_string(),
        })
    }
}

/// A read-only domain model.
///
/// Entities are kept in registration order; the type hierarchy is a
/// `DiGraph` whose nodes carry the entity's position and whose edges run
/// from a supertype to each direct subtype.
#[derive(Debug, Clone)]
pub struct DomainModel {
    entities: Vec<Arc<EntityType>>,
    /// Entity name and fully-qualified type name to position.
    entity_index: HashMap<String, usize>,
    embeddables: HashMap<String, Arc<EmbeddableType>>,
    hierarchy: DiGraph<usize, ()>,
    nodes: Vec<NodeIndex>,
    strict_jpa_compliance: bool,
}

impl DomainModel {
    pub fn builder() -> DomainModelBuilder {
        DomainModelBuilder::new()
    }

    /// All entities in registration order.
    pub fn entities(&self) -> &[Arc<EntityType>] {
        &self.entities
    }

    /// Copy of this model with a different strict-compliance switch.
    pub fn with_strict_jpa_compliance(mut self, strict: bool) -> Self {
        self.strict_jpa_compliance = strict;
        self
    }

    fn position(&self, entity: &EntityType) -> Option<usize> {
        self.entity_index.get(&entity.name).copied()
    }
}

impl DomainMetamodel for DomainModel {
    fn resolve_entity(&self, name: &str) -> Option<Arc<EntityType>> {
        self.entity_index
            .get(name)
            .map(|&position| Arc::clone(&self.entities[position]))
    }

    fn resolve_embeddable(&self, name: &str) -> Option<Arc<EmbeddableType>> {
        self.embeddables.get(name).cloned()
    }

    fn find_attribute(&self, owner: &ManagedType, name: &str) -> Option<Attribute> {
        match owner {
            ManagedType::Embeddable(embeddable) => embeddable
                .attributes
                .iter()
                .find(|a| a.name == name)
                .cloned(),
            ManagedType::Entity(entity) => {
                let mut current = Some(Arc::clone(entity));
                while let Some(entity) = current {
                    if let Some(attribute) = entity.declared_attribute(name) {
                        return Some(attribute.clone());
                    }
                    current = entity
                        .supertype
                        .as_deref()
                        .and_then(|s| self.resolve_entity(s));
                }
                None
            }
        }
    }

    fn implementors(&self, entity: &EntityType) -> Vec<Arc<EntityType>> {
        let Some(position) = self.position(entity) else {
            return Vec::new();
        };
        if !entity.polymorphic {
            return vec![Arc::clone(&self.entities[position])];
        }
        let mut concrete: Vec<usize> = Vec::new();
        let mut bfs = Bfs::new(&self.hierarchy, self.nodes[position]);
        while let Some(node) = bfs.next(&self.hierarchy) {
            let descendant = self.hierarchy[node];
            if descendant != position && !self.entities[descendant].polymorphic {
                concrete.push(descendant);
            }
        }
        concrete.sort_unstable();
        concrete
            .into_iter()
            .map(|p| Arc::clone(&self.entities[p]))
            .collect()
    }

    fn is_subtype(&self, subtype: &EntityType, supertype: &EntityType) -> bool {
        match (self.position(subtype), self.position(supertype)) {
            (Some(sub), Some(sup)) => {
                has_path_connecting(&self.hierarchy, self.nodes[sup], self.nodes[sub], None)
            }
            _ => false,
        }
    }

    fn strict_jpa_compliance(&self) -> bool {
        self.strict_jpa_compliance
    }
}
