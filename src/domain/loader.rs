//! TOML model definitions.
//!
//! ```toml
//! strict_jpa_compliance = false
//!
//! [[embeddable]]
//! name = "Address"
//! attributes = [
//!     { name = "city", kind = "basic", type = "string" },
//! ]
//!
//! [[entity]]
//! name = "Customer"
//! type_name = "shop.Customer"
//! attributes = [
//!     { name = "id", kind = "basic", type = "long" },
//!     { name = "address", kind = "embedded", target = "Address" },
//!     { name = "orders", kind = "one_to_many", target = "Order" },
//! ]
//! ```

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use super::model::{
    Attribute, AttributeClassification, BasicType, DomainModel, DomainModelBuilder,
    EmbeddableType, EntityType, ModelError,
};

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("name pattern is valid"));

static TYPE_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*$")
        .expect("type name pattern is valid")
});

/// Errors that can occur when loading a model definition.
#[derive(Debug, Error)]
pub enum LoadError {
    /// IO error reading file
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or shape error
    #[error("Invalid model definition: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid identifier
    #[error("Invalid {kind} name '{name}'")]
    InvalidName { kind: &'static str, name: String },

    /// Missing required field
    #[error("Missing required field '{field}' on attribute '{owner}.{attribute}'")]
    MissingField {
        field: &'static str,
        owner: String,
        attribute: String,
    },

    /// Model validation failed
    #[error("Model validation failed: {0}")]
    Validation(#[from] ModelError),
}

/// Result type for model loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelFile {
    #[serde(default)]
    strict_jpa_compliance: bool,
    #[serde(default, rename = "entity")]
    entities: Vec<EntityDef>,
    #[serde(default, rename = "embeddable")]
    embeddables: Vec<EmbeddableDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntityDef {
    name: String,
    type_name: Option<String>,
    extends: Option<String>,
    #[serde(default)]
    polymorphic: bool,
    #[serde(default)]
    attributes: Vec<AttributeDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmbeddableDef {
    name: String,
    #[serde(default)]
    attributes: Vec<AttributeDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AttributeDef {
    name: String,
    kind: AttributeKind,
    #[serde(rename = "type")]
    basic_type: Option<BasicType>,
    target: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum AttributeKind {
    Basic,
    Embedded,
    ManyToOne,
    OneToOne,
    Any,
    OneToMany,
    ManyToMany,
    ManyToAny,
}

/// Load a model definition from a file.
pub fn load_model(path: &Path) -> LoadResult<DomainModel> {
    let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let model = parse_model(&source)?;
    tracing::debug!(
        path = %path.display(),
        entities = model.entities().len(),
        "loaded domain model"
    );
    Ok(model)
}

/// Parse a model definition from TOML text.
pub fn parse_model(source: &str) -> LoadResult<DomainModel> {
    let file: ModelFile = toml::from_str(source)?;
    let mut builder = DomainModelBuilder::new().strict_jpa_compliance(file.strict_jpa_compliance);

    for def in file.embeddables {
        check_name("embeddable", &def.name)?;
        let mut embeddable = EmbeddableType::new(&def.name);
        for attribute in def.attributes {
            embeddable = embeddable.attribute(convert_attribute(&def.name, attribute)?);
        }
        builder = builder.embeddable(embeddable);
    }

    for def in file.entities {
        check_name("entity", &def.name)?;
        let mut entity = EntityType::new(&def.name);
        if let Some(type_name) = def.type_name {
            if !TYPE_NAME_PATTERN.is_match(&type_name) {
                return Err(LoadError::InvalidName {
                    kind: "type",
                    name: type_name,
                });
            }
            entity = entity.with_type_name(type_name);
        }
        if let Some(supertype) = def.extends {
            entity = entity.extends(supertype);
        }
        if def.polymorphic {
            entity = entity.polymorphic();
        }
        for attribute in def.attributes {
            entity = entity.attribute(convert_attribute(&def.name, attribute)?);
        }
        builder = builder.entity(entity);
    }

    Ok(builder.build()?)
}

fn check_name(kind: &'static str, name: &str) -> LoadResult<()> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(LoadError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

fn convert_attribute(owner: &str, def: AttributeDef) -> LoadResult<Attribute> {
    check_name("attribute", &def.name)?;
    let missing = |field: &'static str| LoadError::MissingField {
        field,
        owner: owner.to_string(),
        attribute: def.name.clone(),
    };

    let classification = match def.kind {
        AttributeKind::Basic => {
            let basic_type = def.basic_type.ok_or_else(|| missing("type"))?;
            return Ok(Attribute::basic(def.name.clone(), basic_type));
        }
        AttributeKind::Embedded => AttributeClassification::Embedded,
        AttributeKind::ManyToOne => AttributeClassification::ManyToOne,
        AttributeKind::OneToOne => AttributeClassification::OneToOne,
        AttributeKind::Any => AttributeClassification::Any,
        AttributeKind::OneToMany => AttributeClassification::OneToMany,
        AttributeKind::ManyToMany => AttributeClassification::ManyToMany,
        AttributeKind::ManyToAny => AttributeClassification::ManyToAny,
    };
    let target = def.target.clone().ok_or_else(|| missing("target"))?;
    Ok(Attribute::targeted(def.name, classification, target))
}
