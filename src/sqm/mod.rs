//! The Semantic Query Model.
//!
//! The resolved, typed tree produced by the interpreter:
//!
//! ```text
//! SqmStatement
//!   ├── StatementKind (select / insert-select / update / delete)
//!   │     └── SqmQuerySpec (from, select, where, group by, having, order by, limit, offset)
//!   │           └── Expr / Predicate ── Arc<Binding> ──▶ FromElementId
//!   └── FromElementArena (every root and join of every scope)
//! ```

pub mod expr;
pub mod from;
pub mod render;
pub mod statement;
pub mod visitor;

pub use expr::{
    AggregateFunction, Binding, Expr, ExpressionType, Junction, ParameterKey, Predicate,
    SqmParameter,
};
pub use from::{FromElement, FromElementArena, FromElementId, FromElementKind, FromElementSpace, SpaceId};
pub use render::{render, TreePrinter};
pub use statement::{
    Selection, SortSpecification, SqmAssignment, SqmFromClause, SqmQuerySpec, SqmSelectClause,
    SqmStatement, StatementKind,
};
pub use visitor::SqmVisitor;
