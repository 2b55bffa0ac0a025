//! Lexer for the object query language.
//!
//! This module provides lexical analysis (tokenization) for query text,
//! converting source text into a sequence of tokens with span information.
//! Keywords are case-insensitive; the original spelling is kept so that a
//! keyword can still be used as an entity or attribute name where the grammar
//! allows it (`from Order o`, `o.first`).

use chumsky::prelude::*;

/// Reserved words of the query language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    // Clauses
    Select,
    From,
    Where,
    Group,
    By,
    Having,
    Order,
    Limit,
    Offset,

    // Joins
    As,
    Join,
    Inner,
    Left,
    Right,
    Full,
    Outer,
    Cross,
    Fetch,
    On,
    With,
    Treat,

    // Predicates
    And,
    Or,
    Not,
    Is,
    Null,
    Empty,
    Between,
    Like,
    Escape,
    In,
    Member,
    Of,
    Exists,

    // Select modifiers and sorting
    Distinct,
    Asc,
    Desc,
    Nulls,
    First,
    Last,

    // DML
    Insert,
    Into,
    Values,
    Update,
    Versioned,
    Set,
    Delete,

    // Literals
    True,
    False,
}

impl Keyword {
    /// Look up a keyword by its (case-insensitive) spelling.
    pub fn from_word(word: &str) -> Option<Self> {
        let keyword = match word.to_ascii_lowercase().as_str() {
            "select" => Keyword::Select,
            "from" => Keyword::From,
            "where" => Keyword::Where,
            "group" => Keyword::Group,
            "by" => Keyword::By,
            "having" => Keyword::Having,
            "order" => Keyword::Order,
            "limit" => Keyword::Limit,
            "offset" => Keyword::Offset,
            "as" => Keyword::As,
            "join" => Keyword::Join,
            "inner" => Keyword::Inner,
            "left" => Keyword::Left,
            "right" => Keyword::Right,
            "full" => Keyword::Full,
            "outer" => Keyword::Outer,
            "cross" => Keyword::Cross,
            "fetch" => Keyword::Fetch,
            "on" => Keyword::On,
            "with" => Keyword::With,
            "treat" => Keyword::Treat,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "not" => Keyword::Not,
            "is" => Keyword::Is,
            "null" => Keyword::Null,
            "empty" => Keyword::Empty,
            "between" => Keyword::Between,
            "like" => Keyword::Like,
            "escape" => Keyword::Escape,
            "in" => Keyword::In,
            "member" => Keyword::Member,
            "of" => Keyword::Of,
            "exists" => Keyword::Exists,
            "distinct" => Keyword::Distinct,
            "asc" => Keyword::Asc,
            "desc" => Keyword::Desc,
            "nulls" => Keyword::Nulls,
            "first" => Keyword::First,
            "last" => Keyword::Last,
            "insert" => Keyword::Insert,
            "into" => Keyword::Into,
            "values" => Keyword::Values,
            "update" => Keyword::Update,
            "versioned" => Keyword::Versioned,
            "set" => Keyword::Set,
            "delete" => Keyword::Delete,
            "true" => Keyword::True,
            "false" => Keyword::False,
            _ => return None,
        };
        Some(keyword)
    }

    /// Canonical (lowercase) spelling, used in error labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Select => "select",
            Keyword::From => "from",
            Keyword::Where => "where",
            Keyword::Group => "group",
            Keyword::By => "by",
            Keyword::Having => "having",
            Keyword::Order => "order",
            Keyword::Limit => "limit",
            Keyword::Offset => "offset",
            Keyword::As => "as",
            Keyword::Join => "join",
            Keyword::Inner => "inner",
            Keyword::Left => "left",
            Keyword::Right => "right",
            Keyword::Full => "full",
            Keyword::Outer => "outer",
            Keyword::Cross => "cross",
            Keyword::Fetch => "fetch",
            Keyword::On => "on",
            Keyword::With => "with",
            Keyword::Treat => "treat",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
            Keyword::Is => "is",
            Keyword::Null => "null",
            Keyword::Empty => "empty",
            Keyword::Between => "between",
            Keyword::Like => "like",
            Keyword::Escape => "escape",
            Keyword::In => "in",
            Keyword::Member => "member",
            Keyword::Of => "of",
            Keyword::Exists => "exists",
            Keyword::Distinct => "distinct",
            Keyword::Asc => "asc",
            Keyword::Desc => "desc",
            Keyword::Nulls => "nulls",
            Keyword::First => "first",
            Keyword::Last => "last",
            Keyword::Insert => "insert",
            Keyword::Into => "into",
            Keyword::Values => "values",
            Keyword::Update => "update",
            Keyword::Versioned => "versioned",
            Keyword::Set => "set",
            Keyword::Delete => "delete",
            Keyword::True => "true",
            Keyword::False => "false",
        }
    }
}

/// A token of the query language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    /// A reserved word, with its original spelling.
    Keyword(Keyword, &'src str),
    /// An identifier (not a keyword).
    Ident(&'src str),
    /// A string literal (contents between the quotes, `''` escapes still doubled).
    StringLit(&'src str),
    /// An integer or decimal number.
    Number(&'src str),

    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `=`
    Eq,
    /// `<>` or `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `||`
    Concat,
    /// `:`
    Colon,
    /// `?`
    Question,
}

impl<'src> Token<'src> {
    /// Build a word token: a keyword when the word is reserved, otherwise an identifier.
    pub fn word(text: &'src str) -> Self {
        match Keyword::from_word(text) {
            Some(keyword) => Token::Keyword(keyword, text),
            None => Token::Ident(text),
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self, Token::Keyword(k, _) if *k == keyword)
    }
}

impl<'src> std::fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Keyword(_, text) => write!(f, "{}", text),
            Token::Ident(s) => write!(f, "{}", s),
            Token::StringLit(s) => write!(f, "'{}'", s),
            Token::Number(s) => write!(f, "{}", s),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Eq => write!(f, "="),
            Token::NotEq => write!(f, "<>"),
            Token::Lt => write!(f, "<"),
            Token::LtEq => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::GtEq => write!(f, ">="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Concat => write!(f, "||"),
            Token::Colon => write!(f, ":"),
            Token::Question => write!(f, "?"),
        }
    }
}

/// Create a lexer for query text.
///
/// Returns a parser that tokenizes the input string into a sequence of
/// tokens with span information, skipping whitespace and comments.
pub fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(Token<'src>, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    let word = text::ident().map(Token::word);

    // '...' with '' as the escaped quote
    let string_lit = just('\'')
        .ignore_then(
            choice((just("''").ignored(), none_of('\'').ignored()))
                .repeated()
                .to_slice(),
        )
        .then_ignore(just('\''))
        .map(Token::StringLit);

    let number = text::digits(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .map(Token::Number);

    // Multi-char symbols first
    let symbol = choice((
        just("<>").to(Token::NotEq),
        just("!=").to(Token::NotEq),
        just("<=").to(Token::LtEq),
        just(">=").to(Token::GtEq),
        just("||").to(Token::Concat),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
        just('=').to(Token::Eq),
        just('<').to(Token::Lt),
        just('>').to(Token::Gt),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
        just(':').to(Token::Colon),
        just('?').to(Token::Question),
    ));

    let single_line_comment = just("--")
        .then(any().and_is(just('\n').not()).repeated())
        .ignored();

    let multi_line_comment = just("/*")
        .then(any().and_is(just("*/").not()).repeated())
        .then(just("*/"))
        .ignored();

    let comment = single_line_comment.or(multi_line_comment);

    let token = choice((word, string_lit, number, symbol)).map_with(|tok, e| (tok, e.span()));

    token
        .padded_by(comment.padded().repeated())
        .padded()
        .repeated()
        .collect()
        .padded_by(comment.padded().repeated())
        .padded()
        .then_ignore(end())
}

/// Lex a source string into tokens.
///
/// Returns Ok with the token list on success, or Err with the lexer errors.
pub fn lex(source: &str) -> Result<Vec<(Token<'_>, SimpleSpan)>, Vec<Rich<'_, char>>> {
    let (tokens, errs) = lexer().parse(source).into_output_errors();
    if errs.is_empty() {
        Ok(tokens.unwrap_or_default())
    } else {
        Err(errs)
    }
}
