//! SQM expressions, predicates and path bindings.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::{Attribute, AttributeClassification, BasicType, EntityType};
use crate::parser::ast::{BinaryOp, ComparisonOp, Literal, UnaryOp};

use super::from::{serialize_optional_entity, FromElementArena, FromElementId};
use super::statement::SqmQuerySpec;

// ============================================================================
// Types
// ============================================================================

/// Static type of an SQM expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ExpressionType {
    Basic(BasicType),
    Entity(String),
    Embeddable(String),
    /// Not known from the expression alone (`null`, an untyped parameter).
    Unknown,
}

impl ExpressionType {
    pub fn basic(&self) -> Option<BasicType> {
        match self {
            ExpressionType::Basic(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ExpressionType::Unknown)
    }

    pub fn of_literal(literal: &Literal) -> Self {
        match literal {
            Literal::String(_) => ExpressionType::Basic(BasicType::String),
            Literal::Integer(i) if i32::try_from(*i).is_ok() => {
                ExpressionType::Basic(BasicType::Integer)
            }
            Literal::Integer(_) => ExpressionType::Basic(BasicType::Long),
            Literal::Decimal(_) => ExpressionType::Basic(BasicType::Decimal),
            Literal::Boolean(_) => ExpressionType::Basic(BasicType::Boolean),
            Literal::Null => ExpressionType::Unknown,
        }
    }

    pub fn of_attribute(attribute: &Attribute) -> Self {
        match (attribute.classification, &attribute.target) {
            (AttributeClassification::Basic(t), _) => ExpressionType::Basic(t),
            (AttributeClassification::Embedded, Some(target)) => {
                ExpressionType::Embeddable(target.clone())
            }
            (_, Some(target)) => ExpressionType::Entity(target.clone()),
            (_, None) => ExpressionType::Unknown,
        }
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionType::Basic(t) => write!(f, "{}", t),
            ExpressionType::Entity(name) | ExpressionType::Embeddable(name) => {
                write!(f, "{}", name)
            }
            ExpressionType::Unknown => write!(f, "?"),
        }
    }
}

// ============================================================================
// Bindings
// ============================================================================

/// Resolved result of a path expression.
///
/// Bindings are shared: resolving the same path twice in one scope yields
/// the same `Arc<Binding>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Binding {
    /// An identification variable used on its own: `select o from Order o`.
    FromElement {
        element: FromElementId,
        #[serde(serialize_with = "serialize_optional_entity")]
        treated_as: Option<Arc<EntityType>>,
    },
    /// An attribute reached from another binding.
    Attribute {
        lhs: Arc<Binding>,
        attribute: Attribute,
        /// Join materialized for association navigation.
        join: Option<FromElementId>,
    },
}

impl Binding {
    /// The from-element this binding is ultimately rooted at.
    pub fn root_element(&self) -> FromElementId {
        match self {
            Binding::FromElement { element, .. } => *element,
            Binding::Attribute { lhs, .. } => lhs.root_element(),
        }
    }

    /// The from-element the bound value lives in: the materialized join,
    /// or the element owning the attribute.
    pub fn owning_element(&self) -> FromElementId {
        match self {
            Binding::FromElement { element, .. } => *element,
            Binding::Attribute { join: Some(join), .. } => *join,
            Binding::Attribute { lhs, .. } => lhs.owning_element(),
        }
    }

    /// The from-element holding this attribute's column (ignores its own join).
    pub fn source_element(&self) -> FromElementId {
        match self {
            Binding::FromElement { element, .. } => *element,
            Binding::Attribute { lhs, .. } => lhs.owning_element(),
        }
    }

    pub fn attribute(&self) -> Option<&Attribute> {
        match self {
            Binding::Attribute { attribute, .. } => Some(attribute),
            Binding::FromElement { .. } => None,
        }
    }

    pub fn join(&self) -> Option<FromElementId> {
        match self {
            Binding::Attribute { join, .. } => *join,
            Binding::FromElement { .. } => None,
        }
    }

    pub fn is_from_element(&self) -> bool {
        matches!(self, Binding::FromElement { .. })
    }

    pub fn expression_type(&self, arena: &FromElementArena) -> ExpressionType {
        match self {
            Binding::FromElement { element, treated_as } => {
                let entity = treated_as
                    .as_ref()
                    .unwrap_or_else(|| arena.element(*element).effective_entity());
                ExpressionType::Entity(entity.name.clone())
            }
            Binding::Attribute {
                join: Some(join), ..
            } => ExpressionType::Entity(arena.element(*join).effective_entity().name.clone()),
            Binding::Attribute { attribute, .. } => ExpressionType::of_attribute(attribute),
        }
    }

    /// Path text, using element aliases or generated labels.
    pub fn describe(&self, arena: &FromElementArena) -> String {
        match self {
            Binding::FromElement {
                element,
                treated_as: Some(sub),
            } => format!("treat({} as {})", arena.element(*element).label(), sub.name),
            Binding::FromElement { element, .. } => arena.element(*element).label(),
            Binding::Attribute { lhs, attribute, .. } => {
                format!("{}.{}", lhs.describe(arena), attribute.name)
            }
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// A parameter's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParameterKey {
    Named(String),
    Positional(u32),
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKey::Named(name) => write!(f, ":{}", name),
            ParameterKey::Positional(position) => write!(f, "?{}", position),
        }
    }
}

/// A statement-level parameter with the type anticipated from its usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqmParameter {
    pub key: ParameterKey,
    pub anticipated_type: ExpressionType,
    /// Used as a multi-valued `in :list` argument.
    pub allows_multi_valued_binding: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Some(AggregateFunction::Count),
            "sum" => Some(AggregateFunction::Sum),
            "avg" => Some(AggregateFunction::Avg),
            "min" => Some(AggregateFunction::Min),
            "max" => Some(AggregateFunction::Max),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Expr {
    Path {
        binding: Arc<Binding>,
        #[serde(rename = "type")]
        ty: ExpressionType,
    },
    Literal {
        value: Literal,
        #[serde(rename = "type")]
        ty: ExpressionType,
    },
    Parameter {
        key: ParameterKey,
        #[serde(rename = "type")]
        ty: ExpressionType,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        #[serde(rename = "type")]
        ty: ExpressionType,
    },
    Function {
        name: String,
        args: Vec<Expr>,
        #[serde(rename = "type")]
        ty: ExpressionType,
    },
    Aggregate {
        function: AggregateFunction,
        distinct: bool,
        /// `None` for `count(*)`.
        arg: Option<Box<Expr>>,
        #[serde(rename = "type")]
        ty: ExpressionType,
    },
    Subquery(Box<SqmQuerySpec>),
    /// Order-by reference to a select item by its result alias.
    SelectionRef {
        index: usize,
        alias: String,
        #[serde(rename = "type")]
        ty: ExpressionType,
    },
}

impl Expr {
    pub fn path(binding: Arc<Binding>, arena: &FromElementArena) -> Self {
        let ty = binding.expression_type(arena);
        Expr::Path { binding, ty }
    }

    pub fn literal(value: Literal) -> Self {
        let ty = ExpressionType::of_literal(&value);
        Expr::Literal { value, ty }
    }

    pub fn expression_type(&self) -> ExpressionType {
        match self {
            Expr::Path { ty, .. }
            | Expr::Literal { ty, .. }
            | Expr::Parameter { ty, .. }
            | Expr::Binary { ty, .. }
            | Expr::Function { ty, .. }
            | Expr::Aggregate { ty, .. }
            | Expr::SelectionRef { ty, .. } => ty.clone(),
            Expr::Unary { operand, .. } => operand.expression_type(),
            Expr::Subquery(spec) => spec
                .select
                .selections
                .first()
                .map(|s| s.expr.expression_type())
                .unwrap_or(ExpressionType::Unknown),
        }
    }

    pub fn binding(&self) -> Option<&Arc<Binding>> {
        match self {
            Expr::Path { binding, .. } => Some(binding),
            _ => None,
        }
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self, Expr::Parameter { .. })
    }
}

// ============================================================================
// Predicates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Junction {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Predicate {
    /// Flattened `and`/`or` chain.
    Junction {
        kind: Junction,
        predicates: Vec<Predicate>,
    },
    Negated {
        predicate: Box<Predicate>,
    },
    Comparison {
        left: Expr,
        op: ComparisonOp,
        right: Expr,
    },
    Null {
        expr: Expr,
        negated: bool,
    },
    Empty {
        expr: Expr,
        negated: bool,
    },
    Between {
        expr: Expr,
        low: Expr,
        high: Expr,
        negated: bool,
    },
    Like {
        expr: Expr,
        pattern: Expr,
        escape: Option<Expr>,
        negated: bool,
    },
    InList {
        expr: Expr,
        list: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Expr,
        subquery: Box<SqmQuerySpec>,
        negated: bool,
    },
    MemberOf {
        expr: Expr,
        collection: Arc<Binding>,
        negated: bool,
    },
    Exists {
        subquery: Box<SqmQuerySpec>,
        negated: bool,
    },
}

impl Predicate {
    /// Combine two predicates, flattening nested junctions of the same kind.
    pub fn combine(kind: Junction, left: Predicate, right: Predicate) -> Predicate {
        let mut predicates = Vec::new();
        for side in [left, right] {
            match side {
                Predicate::Junction {
                    kind: inner,
                    predicates: nested,
                } if inner == kind => predicates.extend(nested),
                other => predicates.push(other),
            }
        }
        Predicate::Junction { kind, predicates }
    }
}
