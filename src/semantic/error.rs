//! Error types for semantic analysis.
//!
//! [`SemanticError`] covers mistakes in the query itself. [`BuildError`] adds
//! the two failure classes that are not the query author's fault: statement
//! shapes that are recognised but not supported, and internal invariant
//! violations.

/// Result type for semantic operations.
pub type SemanticResult<T> = Result<T, SemanticError>;

/// Result type for the statement builders.
pub type BuildResult<T> = Result<T, BuildError>;

/// A problem with the query that makes it invalid against the domain model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SemanticError {
    /// Two from-elements of one scope declare the same identification variable.
    #[error("Duplicate alias '{alias}' in from clause")]
    DuplicateAlias { alias: String },

    /// Referenced an entity that doesn't exist.
    #[error("Unknown entity: '{0}'")]
    UnknownEntity(String),

    /// Referenced an attribute that doesn't exist on a managed type.
    #[error("Unknown attribute '{attribute}' on '{owner}'")]
    UnknownAttribute { owner: String, attribute: String },

    /// An unqualified attribute name is declared by several from-elements.
    #[error("Ambiguous attribute '{attribute}' - declared by: {}. Qualify it with an alias.", .candidates.join(", "))]
    AmbiguousAttribute {
        attribute: String,
        candidates: Vec<String>,
    },

    /// Neither an alias nor an attribute of any from-element in scope.
    #[error("Could not resolve '{0}' as an alias or attribute")]
    UnresolvableIdentifier(String),

    /// An `on` clause referenced a from-element outside the join's space.
    #[error("'{path}' in on clause refers to '{alias}', which is outside the joined from-element space")]
    CrossSpaceOnClauseReference { path: String, alias: String },

    /// An `on` clause navigated through an association.
    #[error("On clause may not navigate association '{path}'; declare an explicit join instead")]
    NavigationInOnClause { path: String },

    /// Update and delete targets cannot carry joins.
    #[error("Joins are not allowed in DML statements: '{path}' on target '{entity}'")]
    JoinInDmlStatement { entity: String, path: String },

    /// `set` target that is not a singular basic or embedded attribute of the target.
    #[error("Invalid assignment target '{path}': {reason}")]
    InvalidAssignmentTarget { path: String, reason: String },

    /// Insert state field that is not a direct basic or embedded attribute.
    #[error("Invalid insert target field '{path}': {reason}")]
    InvalidInsertTarget { path: String, reason: String },

    /// Insert state-field count differs from the select list arity.
    #[error("Insert lists {fields} target field(s) but its select clause produces {selections}")]
    InsertArityMismatch { fields: usize, selections: usize },

    /// Dereferenced a basic attribute: `o.number.length`.
    #[error("Cannot dereference basic attribute '{attribute}' in '{path}'")]
    BasicAttributeDereference { path: String, attribute: String },

    /// Path used as a join target does not name an association.
    #[error("'{path}' is not an association and cannot be joined")]
    InvalidJoinTarget { path: String },

    /// `is empty` / `member of` applied to a non-collection path.
    #[error("'{path}' is not a collection-valued path")]
    NotACollection { path: String },

    /// `treat` to a type that is not a subtype of the path's type.
    #[error("Cannot treat '{path}' as '{subtype}'")]
    InvalidTreatTarget { path: String, subtype: String },

    /// A construct outside the JPA standard while strict compliance is on.
    #[error("Strict JPA compliance violation: {0}")]
    StrictJpaViolation(String),

    /// Named and positional parameters mixed in one statement.
    #[error("Cannot mix named and positional parameters in one statement")]
    MixedParameterStyles,

    /// `?` without an ordinal.
    #[error("Legacy positional parameter '?' is not supported; use '?1', '?2', ...")]
    LegacyPositionalParameter,

    /// Subquery used as a value selects more or fewer than one item.
    #[error("Subquery used as an expression must select exactly one item, found {found}")]
    SubqueryArity { found: usize },

    /// `limit` / `offset` given something other than an integer literal or parameter.
    #[error("{clause} must be an integer literal or a parameter")]
    InvalidLimitOffset { clause: &'static str },

    /// Compared values of incompatible types.
    #[error("Cannot compare {left} with {right}")]
    ComparisonTypeMismatch { left: String, right: String },

    /// Two select items share a result alias.
    #[error("Duplicate result alias '{0}' in select clause")]
    DuplicateResultAlias(String),

    /// Explicit join rooted at an alias of another from-element space.
    #[error("Join '{path}' is rooted at '{alias}', which belongs to another from-element space")]
    CrossSpaceExplicitJoin { path: String, alias: String },

    /// Alias referenced before the explicit join declaring it was resolved.
    #[error("Alias '{alias}' is used before its join is resolved")]
    JoinNotYetResolved { alias: String },
}

/// Failure of a statement builder.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Semantic(#[from] SemanticError),

    /// Recognised statement shape that is not wired up yet.
    #[error("Not yet implemented: {0}")]
    NotYetImplemented(String),

    /// Internal invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BuildError {
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(%message, "semantic analysis invariant violated");
        BuildError::Internal(message)
    }
}
