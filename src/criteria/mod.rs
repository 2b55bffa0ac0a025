//! Programmatic criteria queries.
//!
//! A [`CriteriaQuery`] is built in code rather than parsed from text:
//!
//! ```text
//! let mut query = CriteriaQuery::new();
//! let o = query.from("Order");
//! let c = query.join(o, "customer", JoinType::Inner);
//! query.select(CriteriaExpr::path(c, ["name"]));
//! query.restrict(CriteriaPredicate::eq(
//!     CriteriaExpr::path(o, ["number"]),
//!     CriteriaExpr::parameter("n"),
//! ));
//! ```
//!
//! [`normalize`] converts it into the same [`SqmStatement`](crate::sqm::SqmStatement)
//! shape the text front end produces.

mod normalize;

pub use normalize::{normalize, CriteriaNormalizer};

use crate::parser::ast::{BinaryOp, ComparisonOp, JoinType, Literal, NullPrecedence, SortOrder};
use crate::sqm::AggregateFunction;

/// Handle to a root or join of a [`CriteriaQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceRef(pub(crate) usize);

#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaSource {
    Root {
        entity: String,
        alias: Option<String>,
    },
    Join {
        parent: SourceRef,
        attribute: String,
        join_type: JoinType,
        fetch: bool,
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaExpr {
    /// An attribute path from a source; no attributes means the source itself.
    Path {
        source: SourceRef,
        attributes: Vec<String>,
    },
    Literal(Literal),
    Parameter(String),
    Binary {
        op: BinaryOp,
        left: Box<CriteriaExpr>,
        right: Box<CriteriaExpr>,
    },
    Function {
        name: String,
        args: Vec<CriteriaExpr>,
    },
    Aggregate {
        function: AggregateFunction,
        distinct: bool,
        /// `None` for `count(*)`.
        arg: Option<Box<CriteriaExpr>>,
    },
}

impl CriteriaExpr {
    pub fn source(source: SourceRef) -> Self {
        CriteriaExpr::Path {
            source,
            attributes: Vec::new(),
        }
    }

    pub fn path<I, S>(source: SourceRef, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CriteriaExpr::Path {
            source,
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn literal(value: Literal) -> Self {
        CriteriaExpr::Literal(value)
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        CriteriaExpr::Parameter(name.into())
    }

    pub fn count_star() -> Self {
        CriteriaExpr::Aggregate {
            function: AggregateFunction::Count,
            distinct: false,
            arg: None,
        }
    }

    pub fn aggregate(function: AggregateFunction, arg: CriteriaExpr) -> Self {
        CriteriaExpr::Aggregate {
            function,
            distinct: false,
            arg: Some(Box::new(arg)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaPredicate {
    And(Vec<CriteriaPredicate>),
    Or(Vec<CriteriaPredicate>),
    Not(Box<CriteriaPredicate>),
    Comparison {
        left: CriteriaExpr,
        op: ComparisonOp,
        right: CriteriaExpr,
    },
    IsNull {
        expr: CriteriaExpr,
        negated: bool,
    },
    Like {
        expr: CriteriaExpr,
        pattern: CriteriaExpr,
        negated: bool,
    },
    Between {
        expr: CriteriaExpr,
        low: CriteriaExpr,
        high: CriteriaExpr,
    },
    In {
        expr: CriteriaExpr,
        values: Vec<CriteriaExpr>,
        negated: bool,
    },
}

impl CriteriaPredicate {
    pub fn eq(left: CriteriaExpr, right: CriteriaExpr) -> Self {
        CriteriaPredicate::Comparison {
            left,
            op: ComparisonOp::Eq,
            right,
        }
    }

    pub fn compare(left: CriteriaExpr, op: ComparisonOp, right: CriteriaExpr) -> Self {
        CriteriaPredicate::Comparison { left, op, right }
    }

    pub fn is_null(expr: CriteriaExpr) -> Self {
        CriteriaPredicate::IsNull {
            expr,
            negated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaSelection {
    pub expr: CriteriaExpr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaOrder {
    pub expr: CriteriaExpr,
    pub order: SortOrder,
    pub nulls: Option<NullPrecedence>,
}

/// A select query assembled in code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CriteriaQuery {
    pub distinct: bool,
    /// Roots and joins in creation order; a join always follows its parent.
    pub sources: Vec<CriteriaSource>,
    pub selections: Vec<CriteriaSelection>,
    pub restriction: Option<CriteriaPredicate>,
    pub group_by: Vec<CriteriaExpr>,
    pub having: Option<CriteriaPredicate>,
    pub order_by: Vec<CriteriaOrder>,
}

impl CriteriaQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root.
    pub fn from(&mut self, entity: impl Into<String>) -> SourceRef {
        self.push(CriteriaSource::Root {
            entity: entity.into(),
            alias: None,
        })
    }

    pub fn from_as(&mut self, entity: impl Into<String>, alias: impl Into<String>) -> SourceRef {
        self.push(CriteriaSource::Root {
            entity: entity.into(),
            alias: Some(alias.into()),
        })
    }

    /// Join an association of `parent`.
    pub fn join(&mut self, parent: SourceRef, attribute: impl Into<String>, join_type: JoinType) -> SourceRef {
        self.push(CriteriaSource::Join {
            parent,
            attribute: attribute.into(),
            join_type,
            fetch: false,
            alias: None,
        })
    }

    pub fn fetch(&mut self, parent: SourceRef, attribute: impl Into<String>, join_type: JoinType) -> SourceRef {
        self.push(CriteriaSource::Join {
            parent,
            attribute: attribute.into(),
            join_type,
            fetch: true,
            alias: None,
        })
    }

    /// Set the identification variable of a root or join.
    pub fn alias(&mut self, source: SourceRef, name: impl Into<String>) {
        if let Some(CriteriaSource::Root { alias, .. } | CriteriaSource::Join { alias, .. }) =
            self.sources.get_mut(source.0)
        {
            *alias = Some(name.into());
        }
    }

    pub fn select(&mut self, expr: CriteriaExpr) -> &mut Self {
        self.selections.push(CriteriaSelection { expr, alias: None });
        self
    }

    pub fn select_as(&mut self, expr: CriteriaExpr, alias: impl Into<String>) -> &mut Self {
        self.selections.push(CriteriaSelection {
            expr,
            alias: Some(alias.into()),
        });
        self
    }

    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    /// Add a restriction, and-ed with any existing one.
    pub fn restrict(&mut self, predicate: CriteriaPredicate) -> &mut Self {
        self.restriction = Some(match self.restriction.take() {
            Some(CriteriaPredicate::And(mut all)) => {
                all.push(predicate);
                CriteriaPredicate::And(all)
            }
            Some(existing) => CriteriaPredicate::And(vec![existing, predicate]),
            None => predicate,
        });
        self
    }

    pub fn group_by(&mut self, expr: CriteriaExpr) -> &mut Self {
        self.group_by.push(expr);
        self
    }

    pub fn having(&mut self, predicate: CriteriaPredicate) -> &mut Self {
        self.having = Some(predicate);
        self
    }

    pub fn order_by(&mut self, expr: CriteriaExpr, order: SortOrder) -> &mut Self {
        self.order_by.push(CriteriaOrder {
            expr,
            order,
            nulls: None,
        });
        self
    }

    fn push(&mut self, source: CriteriaSource) -> SourceRef {
        self.sources.push(source);
        SourceRef(self.sources.len() - 1)
    }
}
