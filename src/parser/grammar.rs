//! Grammar for the object query language using chumsky.
//!
//! This module provides a parser that transforms a token stream from the
//! lexer into the parse tree defined in [`super::ast`].

use chumsky::input::ValueInput;
use chumsky::prelude::*;
use chumsky::recursive::Indirect;

use super::ast::*;
use super::lexer::{Keyword, Token};
use super::span::Spanned;

type Extra<'tokens, 'src> = extra::Err<Rich<'tokens, Token<'src>, SimpleSpan>>;

/// Convert a SimpleSpan to our Span type (Range<usize>)
fn to_span(span: SimpleSpan) -> std::ops::Range<usize> {
    span.start..span.end
}

/// Match a single keyword, whatever its spelling.
fn kw<'tokens, 'src: 'tokens, I>(
    keyword: Keyword,
) -> impl Parser<'tokens, I, (), Extra<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
{
    any()
        .filter(move |token: &Token<'src>| token.is_keyword(keyword))
        .ignored()
        .labelled(keyword.as_str())
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let span = left.span().start..right.span().end;
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span,
    }
}

/// What follows the left operand of a simple predicate.
enum PredicateTail {
    Compare(ComparisonOp, Expr),
    IsNull(bool),
    IsEmpty(bool),
    Negatable(bool, NegatableTail),
}

/// Predicate tails that accept a `not` before their keyword.
enum NegatableTail {
    Between(Expr, Expr),
    Like(Expr, Option<Expr>),
    In(InList),
    MemberOf(Path),
}

impl PredicateTail {
    fn into_predicate(self, expr: Expr, span: std::ops::Range<usize>) -> Predicate {
        match self {
            PredicateTail::Compare(op, right) => Predicate::Comparison {
                left: expr,
                op,
                right,
                span,
            },
            PredicateTail::IsNull(negated) => Predicate::IsNull {
                expr,
                negated,
                span,
            },
            PredicateTail::IsEmpty(negated) => Predicate::IsEmpty {
                expr,
                negated,
                span,
            },
            PredicateTail::Negatable(negated, NegatableTail::Between(low, high)) => {
                Predicate::Between {
                    expr,
                    low,
                    high,
                    negated,
                    span,
                }
            }
            PredicateTail::Negatable(negated, NegatableTail::Like(pattern, escape)) => {
                Predicate::Like {
                    expr,
                    pattern,
                    escape,
                    negated,
                    span,
                }
            }
            PredicateTail::Negatable(negated, NegatableTail::In(list)) => Predicate::In {
                expr,
                list,
                negated,
                span,
            },
            PredicateTail::Negatable(negated, NegatableTail::MemberOf(collection)) => {
                Predicate::MemberOf {
                    expr,
                    collection,
                    negated,
                    span,
                }
            }
        }
    }
}

/// Create the statement parser.
///
/// The parser is generic over the input type, accepting any `ValueInput`
/// that produces `Token` values with `SimpleSpan` spans.
pub fn parser<'tokens, 'src: 'tokens, I>() -> impl Parser<'tokens, I, Statement, Extra<'tokens, 'src>>
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
{
    // ==========================================================================
    // Basic token parsers
    // ==========================================================================

    // Identification variables and path roots: never a keyword
    let ident = select! {
        Token::Ident(s) => s.to_string(),
    }
    .labelled("identifier");

    // Entity names and path segments after a dot: keywords allowed
    let name = select! {
        Token::Ident(s) => s.to_string(),
        Token::Keyword(_, s) => s.to_string(),
    }
    .labelled("name");

    let spanned_ident = ident.map_with(|s, e| Spanned::new(s, to_span(e.span())));
    let spanned_name = name.map_with(|s, e| Spanned::new(s, to_span(e.span())));

    let entity_name = name
        .separated_by(just(Token::Dot))
        .at_least(1)
        .collect::<Vec<_>>()
        .map_with(|parts, e| Spanned::new(parts.join("."), to_span(e.span())))
        .labelled("entity name")
        .boxed();

    let alias = kw(Keyword::As)
        .or_not()
        .ignore_then(spanned_ident.clone())
        .labelled("alias")
        .boxed();

    let entity_ref = entity_name
        .clone()
        .then(alias.clone().or_not())
        .map_with(|(name, alias), e| EntityRef {
            name,
            alias,
            span: to_span(e.span()),
        })
        .boxed();

    // ==========================================================================
    // Paths
    // ==========================================================================

    let path_tail = just(Token::Dot)
        .ignore_then(spanned_name.clone())
        .repeated()
        .collect::<Vec<_>>()
        .boxed();

    let plain_path = spanned_ident
        .clone()
        .then(path_tail.clone())
        .map_with(|(first, rest), e| {
            let mut segments = vec![first];
            segments.extend(rest);
            Path {
                treat: None,
                segments,
                span: to_span(e.span()),
            }
        })
        .boxed();

    let treated_path = kw(Keyword::Treat)
        .ignore_then(
            plain_path
                .clone()
                .then_ignore(kw(Keyword::As))
                .then(entity_name.clone())
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then(path_tail.clone())
        .map_with(|((path, subtype), segments), e| Path {
            treat: Some(Box::new(TreatBase { path, subtype })),
            segments,
            span: to_span(e.span()),
        })
        .boxed();

    let path = treated_path
        .clone()
        .or(plain_path)
        .labelled("path")
        .boxed();

    // A join target may start with a keyword-named entity (`join Order o2 on ...`)
    let join_target = treated_path
        .or(spanned_name
            .then(path_tail)
            .map_with(|(first, rest), e| {
                let mut segments = vec![first];
                segments.extend(rest);
                Path {
                    treat: None,
                    segments,
                    span: to_span(e.span()),
                }
            }))
        .labelled("join target")
        .boxed();

    // ==========================================================================
    // Literals and parameters
    // ==========================================================================

    let number = select! {
        Token::Number(s) => s,
    }
    .try_map(|s, span| {
        if s.contains('.') {
            Ok(Literal::Decimal(s.to_string()))
        } else {
            s.parse::<i64>()
                .map(Literal::Integer)
                .map_err(|_| Rich::custom(span, format!("integer literal '{}' out of range", s)))
        }
    });

    let literal = choice((
        select! {
            Token::StringLit(s) => Literal::String(s.replace("''", "'")),
        },
        number,
        kw(Keyword::True).to(Literal::Boolean(true)),
        kw(Keyword::False).to(Literal::Boolean(false)),
        kw(Keyword::Null).to(Literal::Null),
    ))
    .map_with(|lit, e| Spanned::new(lit, to_span(e.span())))
    .labelled("literal")
    .boxed();

    let ordinal = select! {
        Token::Number(s) => s,
    }
    .try_map(|s, span| {
        s.parse::<u32>()
            .map_err(|_| Rich::custom(span, format!("invalid parameter ordinal '{}'", s)))
    });

    let parameter = choice((
        just(Token::Colon)
            .ignore_then(name)
            .map(ParameterRef::Named),
        just(Token::Question)
            .ignore_then(ordinal.or_not())
            .map(|ordinal| ordinal.map_or(ParameterRef::Anonymous, ParameterRef::Positional)),
    ))
    .map_with(|param, e| Spanned::new(param, to_span(e.span())))
    .labelled("parameter")
    .boxed();

    // ==========================================================================
    // Expressions (mutually recursive with query specifications)
    // ==========================================================================

    let mut query_spec =
        Recursive::<Indirect<'tokens, 'tokens, I, QuerySpec, Extra<'tokens, 'src>>>::declare();
    let mut predicate =
        Recursive::<Indirect<'tokens, 'tokens, I, Predicate, Extra<'tokens, 'src>>>::declare();

    let expr = recursive(|expr| {
        let subquery = query_spec
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map(|spec| Expr::Subquery(Box::new(spec)));

        let function_args = choice((
            just(Token::Star).to(FunctionArgs::Star),
            kw(Keyword::Distinct)
                .or_not()
                .then(
                    expr.clone()
                        .separated_by(just(Token::Comma))
                        .collect::<Vec<_>>(),
                )
                .map(|(distinct, args)| FunctionArgs::List {
                    distinct: distinct.is_some(),
                    args,
                }),
        ))
        .delimited_by(just(Token::LParen), just(Token::RParen));

        let function = spanned_ident
            .clone()
            .then(function_args)
            .map_with(|(name, args), e| Expr::Function {
                name,
                args,
                span: to_span(e.span()),
            });

        let atom = choice((
            literal.clone().map(Expr::Literal),
            parameter.clone().map(Expr::Parameter),
            function,
            path.clone().map(Expr::Path),
            subquery,
            expr.clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        ))
        .boxed();

        let unary = choice((
            just(Token::Minus).to(UnaryOp::Neg),
            just(Token::Plus).to(UnaryOp::Plus),
        ))
        .then(atom.clone())
        .map_with(|(op, operand), e| Expr::Unary {
            op,
            operand: Box::new(operand),
            span: to_span(e.span()),
        })
        .or(atom)
        .boxed();

        let product_op = choice((
            just(Token::Star).to(BinaryOp::Mul),
            just(Token::Slash).to(BinaryOp::Div),
            just(Token::Percent).to(BinaryOp::Mod),
        ));

        let product = unary
            .clone()
            .foldl(product_op.then(unary).repeated(), |left, (op, right)| {
                binary(op, left, right)
            })
            .boxed();

        let sum_op = choice((
            just(Token::Plus).to(BinaryOp::Add),
            just(Token::Minus).to(BinaryOp::Sub),
            just(Token::Concat).to(BinaryOp::Concat),
        ));

        product
            .clone()
            .foldl(sum_op.then(product).repeated(), |left, (op, right)| {
                binary(op, left, right)
            })
            .labelled("expression")
            .boxed()
    })
    .boxed();

    // ==========================================================================
    // Predicates
    // ==========================================================================

    let comparison_op = select! {
        Token::Eq => ComparisonOp::Eq,
        Token::NotEq => ComparisonOp::NotEq,
        Token::Lt => ComparisonOp::Lt,
        Token::LtEq => ComparisonOp::LtEq,
        Token::Gt => ComparisonOp::Gt,
        Token::GtEq => ComparisonOp::GtEq,
    }
    .labelled("comparison operator");

    let parenthesized_spec = query_spec
        .clone()
        .delimited_by(just(Token::LParen), just(Token::RParen))
        .map(Box::new)
        .boxed();

    let predicate_parser = {
        let negation = kw(Keyword::Not).or_not().map(|n| n.is_some());

        let in_list = choice((
            parenthesized_spec.clone().map(InList::Subquery),
            expr.clone()
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen))
                .map(InList::Values),
            parameter.clone().map(InList::Parameter),
        ));

        let negatable = choice((
            kw(Keyword::Between)
                .ignore_then(expr.clone())
                .then_ignore(kw(Keyword::And))
                .then(expr.clone())
                .map(|(low, high)| NegatableTail::Between(low, high)),
            kw(Keyword::Like)
                .ignore_then(expr.clone())
                .then(kw(Keyword::Escape).ignore_then(expr.clone()).or_not())
                .map(|(pattern, escape)| NegatableTail::Like(pattern, escape)),
            kw(Keyword::In).ignore_then(in_list).map(NegatableTail::In),
            kw(Keyword::Member)
                .then(kw(Keyword::Of).or_not())
                .ignore_then(path.clone())
                .map(NegatableTail::MemberOf),
        ));

        let tail = choice((
            comparison_op
                .then(expr.clone())
                .map(|(op, right)| PredicateTail::Compare(op, right)),
            kw(Keyword::Is)
                .ignore_then(negation.clone())
                .then(choice((
                    kw(Keyword::Null).to(true),
                    kw(Keyword::Empty).to(false),
                )))
                .map(|(negated, is_null)| {
                    if is_null {
                        PredicateTail::IsNull(negated)
                    } else {
                        PredicateTail::IsEmpty(negated)
                    }
                }),
            negation
                .then(negatable)
                .map(|(negated, tail)| PredicateTail::Negatable(negated, tail)),
        ));

        let simple = expr
            .clone()
            .then(tail)
            .map_with(|(left, tail), e| tail.into_predicate(left, to_span(e.span())));

        let exists = kw(Keyword::Exists)
            .ignore_then(parenthesized_spec.clone())
            .map_with(|subquery, e| Predicate::Exists {
                subquery,
                negated: false,
                span: to_span(e.span()),
            });

        let primary = choice((
            exists,
            predicate
                .clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
            simple,
        ))
        .boxed();

        let negated = kw(Keyword::Not)
            .repeated()
            .foldr(primary, |_, p| Predicate::Not(Box::new(p)))
            .boxed();

        let conjunction = negated
            .clone()
            .foldl(
                kw(Keyword::And).ignore_then(negated).repeated(),
                |left, right| Predicate::And(Box::new(left), Box::new(right)),
            )
            .boxed();

        conjunction
            .clone()
            .foldl(
                kw(Keyword::Or).ignore_then(conjunction).repeated(),
                |left, right| Predicate::Or(Box::new(left), Box::new(right)),
            )
            .labelled("predicate")
    };
    predicate.define(predicate_parser);

    let where_clause = kw(Keyword::Where)
        .ignore_then(predicate.clone())
        .or_not()
        .boxed();

    // ==========================================================================
    // Query specification
    // ==========================================================================

    let select_item = expr
        .clone()
        .then(alias.clone().or_not())
        .map_with(|(expr, alias), e| SelectItem {
            expr,
            alias,
            span: to_span(e.span()),
        });

    let select_clause = kw(Keyword::Select)
        .ignore_then(kw(Keyword::Distinct).or_not().map(|d| d.is_some()))
        .then(
            select_item
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map_with(|(distinct, items), e| SelectClause {
            distinct,
            items,
            span: to_span(e.span()),
        });

    let join_type = choice((
        kw(Keyword::Inner).to(JoinType::Inner),
        kw(Keyword::Left)
            .then(kw(Keyword::Outer).or_not())
            .to(JoinType::Left),
        kw(Keyword::Right)
            .then(kw(Keyword::Outer).or_not())
            .to(JoinType::Right),
        kw(Keyword::Full)
            .then(kw(Keyword::Outer).or_not())
            .to(JoinType::Full),
        kw(Keyword::Cross).to(JoinType::Cross),
    ))
    .or_not()
    .then_ignore(kw(Keyword::Join))
    .map(|join_type| join_type.unwrap_or(JoinType::Inner));

    let join = join_type
        .then(kw(Keyword::Fetch).or_not().map(|f| f.is_some()))
        .then(join_target)
        .then(alias.clone().or_not())
        .then(
            choice((kw(Keyword::On), kw(Keyword::With)))
                .ignore_then(predicate.clone())
                .or_not(),
        )
        .map_with(|((((join_type, fetch), target), alias), condition), e| Join {
            join_type,
            fetch,
            target,
            alias,
            condition,
            span: to_span(e.span()),
        });

    let space = entity_ref
        .clone()
        .then(join.repeated().collect::<Vec<_>>())
        .map_with(|(root, joins), e| FromSpace {
            root,
            joins,
            span: to_span(e.span()),
        });

    let from_clause = kw(Keyword::From)
        .ignore_then(
            space
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map_with(|spaces, e| FromClause {
            spaces,
            span: to_span(e.span()),
        });

    let sort = expr
        .clone()
        .then(
            choice((
                kw(Keyword::Asc).to(SortOrder::Asc),
                kw(Keyword::Desc).to(SortOrder::Desc),
            ))
            .or_not(),
        )
        .then(
            kw(Keyword::Nulls)
                .ignore_then(choice((
                    kw(Keyword::First).to(NullPrecedence::First),
                    kw(Keyword::Last).to(NullPrecedence::Last),
                )))
                .or_not(),
        )
        .map_with(|((expr, order), nulls), e| SortSpec {
            expr,
            order: order.unwrap_or(SortOrder::Asc),
            nulls,
            span: to_span(e.span()),
        });

    query_spec.define(
        select_clause
            .or_not()
            .then(from_clause)
            .then(where_clause.clone())
            .then(
                kw(Keyword::Group)
                    .then(kw(Keyword::By))
                    .ignore_then(
                        expr.clone()
                            .separated_by(just(Token::Comma))
                            .at_least(1)
                            .collect::<Vec<_>>(),
                    )
                    .or_not(),
            )
            .then(kw(Keyword::Having).ignore_then(predicate.clone()).or_not())
            .then(
                kw(Keyword::Order)
                    .then(kw(Keyword::By))
                    .ignore_then(
                        sort.separated_by(just(Token::Comma))
                            .at_least(1)
                            .collect::<Vec<_>>(),
                    )
                    .or_not(),
            )
            .then(kw(Keyword::Limit).ignore_then(expr.clone()).or_not())
            .then(kw(Keyword::Offset).ignore_then(expr.clone()).or_not())
            .map_with(
                |(((((((select, from), where_clause), group_by), having), order_by), limit), offset),
                 e| {
                    let span = to_span(e.span());
                    QuerySpec {
                        id: QuerySpecId(span.start),
                        select,
                        from,
                        where_clause,
                        group_by: group_by.unwrap_or_default(),
                        having,
                        order_by: order_by.unwrap_or_default(),
                        limit,
                        offset,
                        span,
                    }
                },
            ),
    );

    // ==========================================================================
    // Statements
    // ==========================================================================

    let values_row = expr
        .clone()
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let insert_source = choice((
        kw(Keyword::Values)
            .ignore_then(
                values_row
                    .separated_by(just(Token::Comma))
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .map(InsertSource::Values),
        query_spec
            .clone()
            .map(|spec| InsertSource::Query(Box::new(spec))),
    ));

    let insert = kw(Keyword::Insert)
        .ignore_then(kw(Keyword::Into))
        .ignore_then(entity_ref.clone())
        .then(
            path.clone()
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then(insert_source)
        .map_with(|((target, fields), source), e| {
            let span = to_span(e.span());
            Statement::Insert(InsertStatement {
                id: QuerySpecId(span.start),
                target,
                fields,
                source,
                span,
            })
        });

    let assignment = path
        .clone()
        .then_ignore(just(Token::Eq))
        .then(expr.clone())
        .map_with(|(path, value), e| Assignment {
            path,
            value,
            span: to_span(e.span()),
        });

    let update = kw(Keyword::Update)
        .ignore_then(kw(Keyword::Versioned).or_not().map(|v| v.is_some()))
        .then(entity_ref.clone())
        .then_ignore(kw(Keyword::Set))
        .then(
            assignment
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .then(where_clause.clone())
        .map_with(|(((versioned, target), assignments), where_clause), e| {
            let span = to_span(e.span());
            Statement::Update(UpdateStatement {
                id: QuerySpecId(span.start),
                versioned,
                target,
                assignments,
                where_clause,
                span,
            })
        });

    let delete = kw(Keyword::Delete)
        .ignore_then(kw(Keyword::From).or_not().map(|f| f.is_some()))
        .then(entity_ref)
        .then(where_clause)
        .map_with(|((from_keyword, target), where_clause), e| {
            let span = to_span(e.span());
            Statement::Delete(DeleteStatement {
                id: QuerySpecId(span.start),
                from_keyword,
                target,
                where_clause,
                span,
            })
        });

    choice((
        insert,
        update,
        delete,
        query_spec.map(Statement::Select),
    ))
    .then_ignore(end())
}
