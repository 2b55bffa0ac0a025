//! Expression and predicate construction for phase 2.

use crate::domain::BasicType;
use crate::parser::ast::{self, BinaryOp, FunctionArgs, InList, QuerySpec};
use crate::sqm::expr::{AggregateFunction, Expr, ExpressionType, Junction, Predicate};
use crate::sqm::statement::SqmQuerySpec;

use super::builder::{check_comparable, SemanticQueryBuilder};
use super::error::{BuildResult, SemanticError};
use super::path::PathContext;
use super::scope::Scope;

impl SemanticQueryBuilder<'_> {
    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub(super) fn build_expr(
        &mut self,
        expr: &ast::Expr,
        context: PathContext,
        scope: &Scope<'_>,
    ) -> BuildResult<Expr> {
        match expr {
            ast::Expr::Path(path) => {
                let binding = self.resolver.resolve(path, context, scope)?;
                Ok(Expr::path(binding, self.resolver.arena()))
            }
            ast::Expr::Literal(literal) => Ok(Expr::literal(literal.value.clone())),
            ast::Expr::Parameter(reference) => {
                let key = self.parameters.register(&reference.value, false)?;
                let ty = self.parameters.anticipated_type(&key);
                Ok(Expr::Parameter { key, ty })
            }
            ast::Expr::Unary { op, operand, .. } => {
                let operand = self.build_expr(operand, context, scope)?;
                Ok(Expr::Unary {
                    op: *op,
                    operand: Box::new(operand),
                })
            }
            ast::Expr::Binary {
                op, left, right, ..
            } => {
                let mut left = self.build_expr(left, context, scope)?;
                let mut right = self.build_expr(right, context, scope)?;
                let ty = if *op == BinaryOp::Concat {
                    let text = ExpressionType::Basic(BasicType::String);
                    self.infer(&mut left, &text);
                    self.infer(&mut right, &text);
                    text
                } else {
                    self.infer(&mut left, &right.expression_type());
                    self.infer(&mut right, &left.expression_type());
                    arithmetic_type(&left.expression_type(), &right.expression_type())
                };
                Ok(Expr::Binary {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                    ty,
                })
            }
            ast::Expr::Function { name, args, .. } => {
                self.build_function(&name.value, args, context, scope)
            }
            ast::Expr::Subquery(spec) => {
                let query = self.build_scalar_subquery(spec, scope)?;
                Ok(Expr::Subquery(Box::new(query)))
            }
        }
    }

    fn build_function(
        &mut self,
        name: &str,
        args: &FunctionArgs,
        context: PathContext,
        scope: &Scope<'_>,
    ) -> BuildResult<Expr> {
        let lowered = name.to_ascii_lowercase();
        let aggregate = AggregateFunction::from_name(&lowered);

        let (distinct, args) = match args {
            FunctionArgs::Star => {
                return Ok(match aggregate {
                    Some(AggregateFunction::Count) => Expr::Aggregate {
                        function: AggregateFunction::Count,
                        distinct: false,
                        arg: None,
                        ty: ExpressionType::Basic(BasicType::Long),
                    },
                    _ => Expr::Function {
                        name: lowered,
                        args: Vec::new(),
                        ty: ExpressionType::Unknown,
                    },
                })
            }
            FunctionArgs::List { distinct, args } => (*distinct, args),
        };

        let built = args
            .iter()
            .map(|arg| self.build_expr(arg, context, scope))
            .collect::<BuildResult<Vec<_>>>()?;

        match aggregate {
            Some(function) if built.len() == 1 => {
                let arg = built.into_iter().next().map(Box::new);
                let ty = arg
                    .as_ref()
                    .map(|a| aggregate_type(function, &a.expression_type()))
                    .unwrap_or(ExpressionType::Unknown);
                Ok(Expr::Aggregate {
                    function,
                    distinct,
                    arg,
                    ty,
                })
            }
            _ => {
                let ty = function_type(&lowered, &built);
                Ok(Expr::Function {
                    name: lowered,
                    args: built,
                    ty,
                })
            }
        }
    }

    fn build_subquery(&mut self, spec: &QuerySpec, scope: &Scope<'_>) -> BuildResult<SqmQuerySpec> {
        let inner = scope.nested(spec.id);
        self.build_query_spec(spec, &inner)
    }

    /// A subquery used as a value must select exactly one item.
    fn build_scalar_subquery(&mut self, spec: &QuerySpec, scope: &Scope<'_>) -> BuildResult<SqmQuerySpec> {
        let query = self.build_subquery(spec, scope)?;
        let found = query.select.selections.len();
        if found != 1 {
            return Err(SemanticError::SubqueryArity { found }.into());
        }
        Ok(query)
    }

    /// Give an untyped parameter the type of the operand it is compared with.
    pub(super) fn infer(&mut self, expr: &mut Expr, ty: &ExpressionType) {
        match expr {
            Expr::Parameter { key, ty: current } if !current.is_known() && ty.is_known() => {
                self.parameters.anticipate(key, ty);
                *current = ty.clone();
            }
            Expr::Unary { operand, .. } => self.infer(operand, ty),
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------

    pub(super) fn build_predicate(
        &mut self,
        predicate: &ast::Predicate,
        context: PathContext,
        scope: &Scope<'_>,
    ) -> BuildResult<Predicate> {
        match predicate {
            ast::Predicate::And(left, right) => {
                let left = self.build_predicate(left, context, scope)?;
                let right = self.build_predicate(right, context, scope)?;
                Ok(Predicate::combine(Junction::And, left, right))
            }
            ast::Predicate::Or(left, right) => {
                let left = self.build_predicate(left, context, scope)?;
                let right = self.build_predicate(right, context, scope)?;
                Ok(Predicate::combine(Junction::Or, left, right))
            }
            ast::Predicate::Not(inner) => Ok(Predicate::Negated {
                predicate: Box::new(self.build_predicate(inner, context, scope)?),
            }),
            ast::Predicate::Comparison {
                left, op, right, ..
            } => {
                let mut left = self.build_expr(left, context, scope)?;
                let mut right = self.build_expr(right, context, scope)?;
                self.infer(&mut left, &right.expression_type());
                self.infer(&mut right, &left.expression_type());
                check_comparable(&left.expression_type(), &right.expression_type())?;
                Ok(Predicate::Comparison {
                    left,
                    op: *op,
                    right,
                })
            }
            ast::Predicate::IsNull { expr, negated, .. } => Ok(Predicate::Null {
                expr: self.build_expr(expr, context, scope)?,
                negated: *negated,
            }),
            ast::Predicate::IsEmpty { expr, negated, .. } => {
                let expr = self.build_expr(expr, context, scope)?;
                self.require_collection(&expr)?;
                Ok(Predicate::Empty {
                    expr,
                    negated: *negated,
                })
            }
            ast::Predicate::Between {
                expr,
                low,
                high,
                negated,
                ..
            } => {
                let mut expr = self.build_expr(expr, context, scope)?;
                let mut low = self.build_expr(low, context, scope)?;
                let mut high = self.build_expr(high, context, scope)?;
                let ty = [&expr, &low, &high]
                    .iter()
                    .map(|e| e.expression_type())
                    .find(ExpressionType::is_known)
                    .unwrap_or(ExpressionType::Unknown);
                self.infer(&mut expr, &ty);
                self.infer(&mut low, &ty);
                self.infer(&mut high, &ty);
                check_comparable(&expr.expression_type(), &low.expression_type())?;
                check_comparable(&expr.expression_type(), &high.expression_type())?;
                Ok(Predicate::Between {
                    expr,
                    low,
                    high,
                    negated: *negated,
                })
            }
            ast::Predicate::Like {
                expr,
                pattern,
                escape,
                negated,
                ..
            } => {
                let text = ExpressionType::Basic(BasicType::String);
                let mut expr = self.build_expr(expr, context, scope)?;
                let mut pattern = self.build_expr(pattern, context, scope)?;
                let mut escape = escape
                    .as_ref()
                    .map(|e| self.build_expr(e, context, scope))
                    .transpose()?;
                self.infer(&mut expr, &text);
                self.infer(&mut pattern, &text);
                if let Some(escape) = escape.as_mut() {
                    self.infer(escape, &text);
                }
                check_comparable(&expr.expression_type(), &pattern.expression_type())?;
                Ok(Predicate::Like {
                    expr,
                    pattern,
                    escape,
                    negated: *negated,
                })
            }
            ast::Predicate::In {
                expr, list, negated, ..
            } => {
                let mut expr = self.build_expr(expr, context, scope)?;
                match list {
                    InList::Values(values) => {
                        let mut list = values
                            .iter()
                            .map(|v| self.build_expr(v, context, scope))
                            .collect::<BuildResult<Vec<_>>>()?;
                        if let Some(known) = list.iter().map(Expr::expression_type).find(ExpressionType::is_known) {
                            self.infer(&mut expr, &known);
                        }
                        let ty = expr.expression_type();
                        for item in &mut list {
                            self.infer(item, &ty);
                            check_comparable(&ty, &item.expression_type())?;
                        }
                        Ok(Predicate::InList {
                            expr,
                            list,
                            negated: *negated,
                        })
                    }
                    InList::Subquery(spec) => {
                        let subquery = self.build_scalar_subquery(spec, scope)?;
                        let ty = subquery.select.selections[0].expr.expression_type();
                        self.infer(&mut expr, &ty);
                        check_comparable(&expr.expression_type(), &ty)?;
                        Ok(Predicate::InSubquery {
                            expr,
                            subquery: Box::new(subquery),
                            negated: *negated,
                        })
                    }
                    InList::Parameter(reference) => {
                        let key = self.parameters.register(&reference.value, true)?;
                        let ty = expr.expression_type();
                        self.parameters.anticipate(&key, &ty);
                        let parameter = Expr::Parameter {
                            ty: self.parameters.anticipated_type(&key),
                            key,
                        };
                        Ok(Predicate::InList {
                            expr,
                            list: vec![parameter],
                            negated: *negated,
                        })
                    }
                }
            }
            ast::Predicate::MemberOf {
                expr,
                collection,
                negated,
                ..
            } => {
                let mut expr = self.build_expr(expr, context, scope)?;
                let collection = self.resolver.resolve(collection, context, scope)?;
                let path = collection.describe(self.resolver.arena());
                let element_type = match collection.attribute() {
                    Some(attribute) if attribute.classification.is_plural() => {
                        collection.expression_type(self.resolver.arena())
                    }
                    _ => return Err(SemanticError::NotACollection { path }.into()),
                };
                self.infer(&mut expr, &element_type);
                Ok(Predicate::MemberOf {
                    expr,
                    collection,
                    negated: *negated,
                })
            }
            ast::Predicate::Exists {
                subquery, negated, ..
            } => {
                let subquery = self.build_subquery(subquery, scope)?;
                Ok(Predicate::Exists {
                    subquery: Box::new(subquery),
                    negated: *negated,
                })
            }
        }
    }

    fn require_collection(&self, expr: &Expr) -> BuildResult<()> {
        match expr.binding() {
            Some(binding) if binding.attribute().is_some_and(|a| a.classification.is_plural()) => Ok(()),
            Some(binding) => Err(SemanticError::NotACollection {
                path: binding.describe(self.resolver.arena()),
            }
            .into()),
            None => Err(SemanticError::NotACollection {
                path: "<expression>".to_string(),
            }
            .into()),
        }
    }
}

// ============================================================================
// Typing
// ============================================================================

pub(crate) fn arithmetic_type(left: &ExpressionType, right: &ExpressionType) -> ExpressionType {
    match (left.basic(), right.basic()) {
        (Some(l), Some(r)) if l.is_numeric() && r.is_numeric() => ExpressionType::Basic(l.promote(r)),
        (Some(l), None) if l.is_numeric() => left.clone(),
        (None, Some(r)) if r.is_numeric() => right.clone(),
        _ => ExpressionType::Unknown,
    }
}

pub(crate) fn aggregate_type(function: AggregateFunction, arg: &ExpressionType) -> ExpressionType {
    match function {
        AggregateFunction::Count => ExpressionType::Basic(BasicType::Long),
        AggregateFunction::Avg => ExpressionType::Basic(BasicType::Double),
        AggregateFunction::Sum => match arg.basic() {
            Some(t) if t.is_integral() => ExpressionType::Basic(BasicType::Long),
            Some(BasicType::Decimal) => ExpressionType::Basic(BasicType::Decimal),
            Some(_) => ExpressionType::Basic(BasicType::Double),
            None => ExpressionType::Unknown,
        },
        AggregateFunction::Min | AggregateFunction::Max => arg.clone(),
    }
}

/// Result type of the common query-language functions.
pub(crate) fn function_type(name: &str, args: &[Expr]) -> ExpressionType {
    let basic = ExpressionType::Basic;
    match name {
        "upper" | "lower" | "trim" | "concat" | "substring" | "str" => basic(BasicType::String),
        "length" | "locate" | "size" | "index" | "mod" => basic(BasicType::Integer),
        "sqrt" => basic(BasicType::Double),
        "current_date" => basic(BasicType::Date),
        "current_time" | "current_timestamp" => basic(BasicType::Timestamp),
        "abs" | "coalesce" | "nullif" => args
            .iter()
            .map(Expr::expression_type)
            .find(ExpressionType::is_known)
            .unwrap_or(ExpressionType::Unknown),
        _ => ExpressionType::Unknown,
    }
}
