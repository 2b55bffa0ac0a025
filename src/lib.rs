//! # sqm
//!
//! A semantic query interpreter for an object query language.
//!
//! ## Architecture
//!
//! Query text over an entity model is turned into a validated, typed
//! semantic query model (SQM):
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     Query Text                           │
//! │   select o from Order o where o.customer.name = :name    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [parser]
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Parse Tree                            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [semantic: phase 1, from clauses]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 From-Clause Index                        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [semantic: phase 2, path resolution]
//! ┌─────────────────────────────────────────────────────────┐
//! │               SqmStatement (typed tree)                  │◀── [criteria]
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [split]
//! ┌─────────────────────────────────────────────────────────┐
//! │          One statement per concrete implementor          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The entity model is consulted through the [`domain::DomainMetamodel`] trait.

pub mod config;
pub mod criteria;
pub mod domain;
pub mod interpret;
pub mod parser;
pub mod semantic;
pub mod split;
pub mod sqm;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::criteria::{CriteriaExpr, CriteriaPredicate, CriteriaQuery};
    pub use crate::domain::{DomainMetamodel, DomainModel};
    pub use crate::interpret::{interpret, interpret_criteria, split, InterpretError, InterpretOptions};
    pub use crate::sqm::{Binding, Expr, Predicate, SqmStatement, StatementKind};
}

pub use interpret::{interpret, interpret_criteria, InterpretError, InterpretOptions};
pub use sqm::SqmStatement;
