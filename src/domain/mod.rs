//! Domain model adapter.
//!
//! The interpreter never owns the application's entity model; it consults it
//! through [`DomainMetamodel`]. [`DomainModel`] is the in-crate implementation
//! used by the CLI and the tests, built programmatically with
//! [`DomainModelBuilder`] or loaded from a TOML definition by [`loader`].

pub mod fixtures;
pub mod loader;
pub mod model;

use std::sync::Arc;

pub use model::{
    Attribute, AttributeClassification, BasicType, DomainModel, DomainModelBuilder,
    EmbeddableType, EntityType, ManagedType, ModelError, TypeFamily,
};

/// Read-only view of an entity model.
///
/// Implementations must be shareable across threads: independent
/// interpretations may consult the same model concurrently.
pub trait DomainMetamodel: Send + Sync {
    /// Resolve an entity by name or fully-qualified type name.
    fn resolve_entity(&self, name: &str) -> Option<Arc<EntityType>>;

    fn resolve_embeddable(&self, name: &str) -> Option<Arc<EmbeddableType>>;

    /// Find an attribute on a managed type, including inherited attributes.
    fn find_attribute(&self, owner: &ManagedType, name: &str) -> Option<Attribute>;

    /// Concrete implementors of an entity, in registration order.
    ///
    /// A non-polymorphic entity is its own single implementor.
    fn implementors(&self, entity: &EntityType) -> Vec<Arc<EntityType>>;

    /// Whether `subtype` is `supertype` or one of its descendants.
    fn is_subtype(&self, subtype: &EntityType, supertype: &EntityType) -> bool;

    /// Reject query-language extensions that are not part of JPQL.
    fn strict_jpa_compliance(&self) -> bool;

    /// The managed type reached by navigating an attribute, if any.
    fn attribute_target(&self, attribute: &Attribute) -> Option<ManagedType> {
        let target = attribute.target.as_deref()?;
        match attribute.classification {
            AttributeClassification::Basic(_) => None,
            AttributeClassification::Embedded => {
                self.resolve_embeddable(target).map(ManagedType::Embeddable)
            }
            _ => self.resolve_entity(target).map(ManagedType::Entity),
        }
    }
}

impl<T: DomainMetamodel + ?Sized> DomainMetamodel for Arc<T> {
    fn resolve_entity(&self, name: &str) -> Option<Arc<EntityType>> {
        (**self).resolve_entity(name)
    }

    fn resolve_embeddable(&self, name: &str) -> Option<Arc<EmbeddableType>> {
        (**self).resolve_embeddable(name)
    }

    fn find_attribute(&self, owner: &ManagedType, name: &str) -> Option<Attribute> {
        (**self).find_attribute(owner, name)
    }

    fn implementors(&self, entity: &EntityType) -> Vec<Arc<EntityType>> {
        (**self).implementors(entity)
    }

    fn is_subtype(&self, subtype: &EntityType, supertype: &EntityType) -> bool {
        (**self).is_subtype(subtype, supertype)
    }

    fn strict_jpa_compliance(&self) -> bool {
        (**self).strict_jpa_compliance()
    }
}
