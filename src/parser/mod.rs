//! Text front end for the object query language.
//!
//! This module turns query text into the read-only parse tree consumed by the
//! semantic phases. The language is a SQL-like query language over an entity
//! model:
//!
//! - **Select**: `select o.number, c from Order o join o.customer c where ...`
//! - **Insert**: `insert into Customer (name, email) select ...`
//! - **Update**: `update Customer c set c.name = :name where c.id = :id`
//! - **Delete**: `delete from Customer c where c.name = :name`
//!
//! # Example
//!
//! ```ignore
//! use sqm::parser;
//!
//! let result = parser::parse("select o from Order o where o.total > 100");
//! if let Some(statement) = result.statement {
//!     println!("Parsed a {} statement", statement.kind());
//! }
//! for diag in &result.diagnostics {
//!     eprintln!("{}", diag);
//! }
//! ```

pub mod ast;
pub mod grammar;
pub mod lexer;
pub mod span;

pub use ast::*;
pub use span::{Span, Spanned};

/// Result of parsing query text.
#[derive(Debug)]
pub struct ParseResult {
    /// The parsed statement, if parsing succeeded.
    pub statement: Option<Statement>,
    /// Diagnostic messages (errors and warnings).
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    /// Returns true if parsing succeeded without errors.
    pub fn is_ok(&self) -> bool {
        self.statement.is_some() && !self.has_errors()
    }

    /// Returns true if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Returns only the error diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    /// Convert into the statement, or the collected diagnostics on failure.
    pub fn into_result(self) -> Result<Statement, Vec<Diagnostic>> {
        match self.statement {
            Some(statement)
                if !self
                    .diagnostics
                    .iter()
                    .any(|d| d.severity == Severity::Error) =>
            {
                Ok(statement)
            }
            _ => Err(self.diagnostics),
        }
    }
}

/// A diagnostic message with source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// The span in the source where the diagnostic applies.
    pub span: Span,
    /// The severity level.
    pub severity: Severity,
    /// The diagnostic message.
    pub message: String,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// A fatal error that prevents interpretation.
    Error,
    /// A warning that doesn't prevent interpretation.
    Warning,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} (at {:?})", level, self.message, self.span)
    }
}

impl std::error::Error for Diagnostic {}

/// Parse query text.
///
/// Returns a `ParseResult` containing the parsed statement (if successful)
/// and any diagnostic messages from the lexer and the grammar.
pub fn parse(source: &str) -> ParseResult {
    use chumsky::error::Rich;
    use chumsky::input::Input;
    use chumsky::span::SimpleSpan;
    use chumsky::span::Span as _;
    use chumsky::Parser as _;

    // Step 1: Lexical analysis
    let (tokens, lex_errs) = lexer::lexer().parse(source).into_output_errors();

    let mut diagnostics: Vec<Diagnostic> = lex_errs
        .into_iter()
        .map(|e: Rich<'_, char>| {
            let span = e.span();
            Diagnostic::error(span.start()..span.end(), e.to_string())
        })
        .collect();

    // If lexing failed completely, return early
    let tokens: Vec<(lexer::Token<'_>, SimpleSpan)> = match tokens {
        Some(t) if diagnostics.is_empty() => t,
        _ => {
            return ParseResult {
                statement: None,
                diagnostics,
            };
        }
    };

    // Step 2: Parsing
    let len = source.len();
    let eoi: SimpleSpan = (len..len).into();
    let token_stream = tokens.as_slice().map(
        eoi,
        |(tok, span): &(lexer::Token<'_>, SimpleSpan)| (tok, span),
    );

    let (statement, parse_errs) = grammar::parser().parse(token_stream).into_output_errors();

    diagnostics.extend(
        parse_errs
            .into_iter()
            .map(|e: Rich<'_, lexer::Token<'_>, SimpleSpan>| {
                let span = e.span();
                Diagnostic::error(span.start()..span.end(), e.to_string())
            }),
    );

    tracing::trace!(
        ok = statement.is_some(),
        diagnostics = diagnostics.len(),
        "parsed query text"
    );

    ParseResult {
        statement,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select() {
        let result = parse("select o from Order o where o.total > 100");
        assert!(result.is_ok());
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.statement.map(|s| s.kind()), Some("select"));
    }

    #[test]
    fn test_parse_reports_lexer_errors() {
        let result = parse("select o from Order o where o.total > #");
        assert!(result.has_errors());
        assert!(result.statement.is_none());
    }

    #[test]
    fn test_parse_reports_grammar_errors_with_span() {
        let result = parse("select o from Order o where");
        assert!(result.has_errors());
        let err = result.errors().next().expect("an error diagnostic");
        assert_eq!(err.span, 27..27);
    }

    #[test]
    fn test_into_result() {
        assert!(parse("delete from Customer").into_result().is_ok());
        assert!(parse("delete").into_result().is_err());
    }
}
