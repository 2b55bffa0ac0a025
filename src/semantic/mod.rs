//! Semantic analysis: parse tree to SQM.
//!
//! Interpretation runs in two phases over the same parse tree:
//!
//! 1. **From-clause processing** ([`FromClauseIndex::process`]) registers every
//!    root, explicit join and alias of every query specification, keyed by
//!    [`QuerySpecId`](crate::parser::QuerySpecId).
//! 2. **SQM construction** ([`SemanticQueryBuilder::build`]) resolves every path
//!    with the [`PathResolver`] and builds the typed statement tree.
//!
//! Both phases fail fast on the first [`SemanticError`].

mod builder;
pub mod error;
mod expressions;
pub mod from_clause;
mod parameters;
pub mod path;
pub mod scope;

pub use builder::{ensure_supported, SemanticQueryBuilder};
pub(crate) use builder::check_comparable;
pub(crate) use expressions::{aggregate_type, arithmetic_type, function_type};
pub use error::{BuildError, BuildResult, SemanticError, SemanticResult};
pub use from_clause::{FromClauseIndex, RegisteredFromClause, RegisteredSpace};
pub use parameters::ParameterCollector;
pub use path::{JoinTarget, PathContext, PathResolver};
pub use scope::Scope;

use crate::domain::DomainMetamodel;
use crate::parser::Statement;
use crate::sqm::SqmStatement;

/// Run both phases over a parsed statement.
pub fn analyze(
    statement: &Statement,
    model: &dyn DomainMetamodel,
    strict: bool,
) -> BuildResult<SqmStatement> {
    ensure_supported(statement)?;
    let index = FromClauseIndex::process(statement, model, strict)?;
    SemanticQueryBuilder::new(model, strict, index).build(statement)
}
