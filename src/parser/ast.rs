//! Parse tree for the object query language.
//!
//! The parse tree is produced once by [`super::parse`] and is consumed
//! read-only by both semantic phases. Every query specification and every
//! DML statement carries a [`QuerySpecId`] that the from-clause index uses as
//! its key.

use std::fmt;

use serde::Serialize;

use super::span::{Span, Spanned};

/// Stable identifier of a query-spec (or DML statement) node.
///
/// The id is the byte offset of the node's first token, which is unique
/// because no two query specifications can start at the same token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QuerySpecId(pub usize);

impl fmt::Display for QuerySpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(QuerySpec),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

impl Statement {
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "select",
            Statement::Insert(_) => "insert",
            Statement::Update(_) => "update",
            Statement::Delete(_) => "delete",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Statement::Select(spec) => spec.span.clone(),
            Statement::Insert(stmt) => stmt.span.clone(),
            Statement::Update(stmt) => stmt.span.clone(),
            Statement::Delete(stmt) => stmt.span.clone(),
        }
    }
}

/// `insert into Entity (a, b) select ...` or `insert into Entity (a, b) values (...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub id: QuerySpecId,
    pub target: EntityRef,
    pub fields: Vec<Path>,
    pub source: InsertSource,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Query(Box<QuerySpec>),
    Values(Vec<Vec<Expr>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub id: QuerySpecId,
    pub versioned: bool,
    pub target: EntityRef,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Predicate>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub path: Path,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub id: QuerySpecId,
    /// Whether the `from` keyword was written (`delete from Entity`).
    pub from_keyword: bool,
    pub target: EntityRef,
    pub where_clause: Option<Predicate>,
    pub span: Span,
}

// ============================================================================
// Query specification
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub id: QuerySpecId,
    pub select: Option<SelectClause>,
    pub from: FromClause,
    pub where_clause: Option<Predicate>,
    pub group_by: Vec<Expr>,
    pub having: Option<Predicate>,
    pub order_by: Vec<SortSpec>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<Spanned<String>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub spaces: Vec<FromSpace>,
    pub span: Span,
}

/// One comma-separated entry of a from clause: a root plus its joins.
#[derive(Debug, Clone, PartialEq)]
pub struct FromSpace {
    pub root: EntityRef,
    pub joins: Vec<Join>,
    pub span: Span,
}

/// An entity name with an optional identification variable.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRef {
    pub name: Spanned<String>,
    pub alias: Option<Spanned<String>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub fetch: bool,
    pub target: Path,
    pub alias: Option<Spanned<String>>,
    pub condition: Option<Predicate>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Right => "right",
            JoinType::Full => "full",
            JoinType::Cross => "cross",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub expr: Expr,
    pub order: SortOrder,
    pub nulls: Option<NullPrecedence>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NullPrecedence {
    First,
    Last,
}

// ============================================================================
// Paths
// ============================================================================

/// A dotted path expression, optionally starting from a `treat(... as Sub)` base.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub treat: Option<Box<TreatBase>>,
    pub segments: Vec<Spanned<String>>,
    pub span: Span,
}

/// `treat(path as Subtype)`
#[derive(Debug, Clone, PartialEq)]
pub struct TreatBase {
    pub path: Path,
    pub subtype: Spanned<String>,
}

impl Path {
    pub fn simple(segments: &[&str], span: Span) -> Self {
        Self {
            treat: None,
            segments: segments
                .iter()
                .map(|s| Spanned::new(s.to_string(), span.clone()))
                .collect(),
            span,
        }
    }

    /// The path as written, normalized to single dots and no whitespace.
    pub fn text(&self) -> String {
        self.to_string()
    }

    pub fn is_single_segment(&self) -> bool {
        self.treat.is_none() && self.segments.len() == 1
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if let Some(treat) = &self.treat {
            write!(f, "treat({} as {})", treat.path, treat.subtype.value)?;
            first = false;
        }
        for segment in &self.segments {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", segment.value)?;
            first = false;
        }
        Ok(())
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path(Path),
    Literal(Spanned<Literal>),
    Parameter(Spanned<ParameterRef>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Function {
        name: Spanned<String>,
        args: FunctionArgs,
        span: Span,
    },
    Subquery(Box<QuerySpec>),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Path(path) => path.span.clone(),
            Expr::Literal(lit) => lit.span.clone(),
            Expr::Parameter(param) => param.span.clone(),
            Expr::Unary { span, .. } | Expr::Binary { span, .. } | Expr::Function { span, .. } => {
                span.clone()
            }
            Expr::Subquery(spec) => spec.span.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Literal {
    String(String),
    Integer(i64),
    /// Decimal literal, kept as written.
    Decimal(String),
    Boolean(bool),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Decimal(d) => write!(f, "{}", d),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
        }
    }
}

/// A parameter reference as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParameterRef {
    /// `:name`
    Named(String),
    /// `?1`
    Positional(u32),
    /// `?` without an ordinal
    Anonymous,
}

impl fmt::Display for ParameterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterRef::Named(name) => write!(f, ":{}", name),
            ParameterRef::Positional(pos) => write!(f, "?{}", pos),
            ParameterRef::Anonymous => write!(f, "?"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnaryOp {
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Concat => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionArgs {
    /// `count(*)`
    Star,
    List { distinct: bool, args: Vec<Expr> },
}

// ============================================================================
// Predicates
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    Comparison {
        left: Expr,
        op: ComparisonOp,
        right: Expr,
        span: Span,
    },
    IsNull {
        expr: Expr,
        negated: bool,
        span: Span,
    },
    IsEmpty {
        expr: Expr,
        negated: bool,
        span: Span,
    },
    Between {
        expr: Expr,
        low: Expr,
        high: Expr,
        negated: bool,
        span: Span,
    },
    Like {
        expr: Expr,
        pattern: Expr,
        escape: Option<Expr>,
        negated: bool,
        span: Span,
    },
    In {
        expr: Expr,
        list: InList,
        negated: bool,
        span: Span,
    },
    MemberOf {
        expr: Expr,
        collection: Path,
        negated: bool,
        span: Span,
    },
    Exists {
        subquery: Box<QuerySpec>,
        negated: bool,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum InList {
    Values(Vec<Expr>),
    Subquery(Box<QuerySpec>),
    Parameter(Spanned<ParameterRef>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComparisonOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::LtEq => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::GtEq => ">=",
        }
    }
}
