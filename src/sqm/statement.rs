//! SQM statements and query specifications.

use std::sync::Arc;

use serde::Serialize;

use crate::parser::ast::{NullPrecedence, QuerySpecId, SortOrder};

use super::expr::{Binding, Expr, Predicate, SqmParameter};
use super::from::{FromElement, FromElementArena, FromElementId, SpaceId};

/// The spaces declared by one query specification, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SqmFromClause {
    pub spaces: Vec<SpaceId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SqmSelectClause {
    pub distinct: bool,
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortSpecification {
    pub expr: Expr,
    pub order: SortOrder,
    pub nulls: Option<NullPrecedence>,
}

/// A resolved query specification (top-level select or subquery).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqmQuerySpec {
    pub id: QuerySpecId,
    pub from: SqmFromClause,
    pub select: SqmSelectClause,
    pub where_clause: Option<Predicate>,
    pub group_by: Vec<Expr>,
    pub having: Option<Predicate>,
    pub order_by: Vec<SortSpecification>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

/// `set <target> = <value>`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqmAssignment {
    pub target: Arc<Binding>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "statement", rename_all = "snake_case")]
pub enum StatementKind {
    Select {
        query: SqmQuerySpec,
    },
    InsertSelect {
        target: FromElementId,
        state_fields: Vec<Arc<Binding>>,
        source: SqmQuerySpec,
    },
    Update {
        target: FromElementId,
        assignments: Vec<SqmAssignment>,
        where_clause: Option<Predicate>,
    },
    Delete {
        target: FromElementId,
        where_clause: Option<Predicate>,
    },
}

/// Root of the semantic query model.
///
/// The statement owns every from-element it references and the parameters
/// collected while building it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqmStatement {
    pub kind: StatementKind,
    pub from_elements: FromElementArena,
    pub parameters: Vec<SqmParameter>,
}

impl SqmStatement {
    pub fn element(&self, id: FromElementId) -> &FromElement {
        self.from_elements.element(id)
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            StatementKind::Select { .. } => "select",
            StatementKind::InsertSelect { .. } => "insert",
            StatementKind::Update { .. } => "update",
            StatementKind::Delete { .. } => "delete",
        }
    }

    pub fn is_select(&self) -> bool {
        matches!(self.kind, StatementKind::Select { .. })
    }

    pub fn query_spec(&self) -> Option<&SqmQuerySpec> {
        match &self.kind {
            StatementKind::Select { query } => Some(query),
            StatementKind::InsertSelect { source, .. } => Some(source),
            _ => None,
        }
    }

    /// DML target element, if this is an insert, update or delete.
    pub fn target(&self) -> Option<FromElementId> {
        match &self.kind {
            StatementKind::Select { .. } => None,
            StatementKind::InsertSelect { target, .. }
            | StatementKind::Update { target, .. }
            | StatementKind::Delete { target, .. } => Some(*target),
        }
    }

    /// Root element of the first space of the top-level query or the DML target.
    pub fn primary_root(&self) -> Option<FromElementId> {
        match &self.kind {
            StatementKind::Select { query } => query
                .from
                .spaces
                .first()
                .map(|space| self.from_elements.space(*space).root),
            _ => self.target(),
        }
    }

    pub fn where_clause(&self) -> Option<&Predicate> {
        match &self.kind {
            StatementKind::Select { query } => query.where_clause.as_ref(),
            StatementKind::InsertSelect { .. } => None,
            StatementKind::Update { where_clause, .. }
            | StatementKind::Delete { where_clause, .. } => where_clause.as_ref(),
        }
    }
}
