//! End-to-end interpretation of query text into the semantic query model.
//!
//! ```text
//! Query Text → Parse → Parse Tree → Phase 1 (from clauses) → Phase 2 (SQM) → [Split]
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sqm::domain::fixtures::shop_model;
//! use sqm::interpret::{interpret, InterpretOptions};
//!
//! let model = shop_model();
//! let statement = interpret(
//!     "select o.number from Order o where o.customer.name = :name",
//!     &model,
//!     InterpretOptions::default(),
//! )?;
//! println!("{}", sqm::sqm::render(&statement));
//! ```

use std::sync::Arc;

use crate::criteria::{self, CriteriaQuery};
use crate::domain::DomainMetamodel;
use crate::parser::{self, Diagnostic};
use crate::semantic::{self, BuildError, SemanticError};
use crate::sqm::SqmStatement;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during interpretation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterpretError {
    #[error("Syntax error: {}", format_diagnostics(.0))]
    Syntax(Vec<Diagnostic>),

    #[error("Semantic error: {0}")]
    Semantic(#[from] SemanticError),

    #[error("Not yet implemented: {0}")]
    NotYetImplemented(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<BuildError> for InterpretError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Semantic(err) => InterpretError::Semantic(err),
            BuildError::NotYetImplemented(what) => InterpretError::NotYetImplemented(what),
            BuildError::Internal(msg) => InterpretError::Internal(msg),
        }
    }
}

impl InterpretError {
    pub fn is_syntax(&self) -> bool {
        matches!(self, InterpretError::Syntax(_))
    }

    pub fn is_semantic(&self) -> bool {
        matches!(self, InterpretError::Semantic(_))
    }
}

pub type InterpretResult<T> = Result<T, InterpretError>;

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Options
// ============================================================================

/// Options for interpretation.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpretOptions {
    /// Override the model's strict JPQL compliance switch.
    pub strict_jpa_compliance: Option<bool>,
}

impl InterpretOptions {
    pub fn with_strict_jpa_compliance(mut self, strict: bool) -> Self {
        self.strict_jpa_compliance = Some(strict);
        self
    }

    fn strict(&self, model: &dyn DomainMetamodel) -> bool {
        self.strict_jpa_compliance
            .unwrap_or_else(|| model.strict_jpa_compliance())
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Interpret query text against a domain model.
pub fn interpret(
    source: &str,
    model: &dyn DomainMetamodel,
    options: InterpretOptions,
) -> InterpretResult<SqmStatement> {
    let statement = parser::parse(source)
        .into_result()
        .map_err(InterpretError::Syntax)?;
    let strict = options.strict(model);

    tracing::debug!(kind = statement.kind(), strict, "interpreting statement");
    Ok(semantic::analyze(&statement, model, strict)?)
}

/// Normalize a programmatic criteria query against a domain model.
pub fn interpret_criteria(
    query: &CriteriaQuery,
    model: &dyn DomainMetamodel,
    options: InterpretOptions,
) -> InterpretResult<SqmStatement> {
    let strict = options.strict(model);
    Ok(criteria::normalize(query, model, strict)?)
}

/// Split a statement rooted at a polymorphic entity, one per implementor.
pub fn split(
    statement: &Arc<SqmStatement>,
    model: &dyn DomainMetamodel,
) -> InterpretResult<Vec<Arc<SqmStatement>>> {
    Ok(crate::split::split(statement, model)?)
}
