//! Lexical query scopes.
//!
//! A [`Scope`] names the query specification being visited and links to the
//! enclosing one. Nested scopes are borrowed from their parent on the call
//! stack, so leaving a subquery, normally or by `?`, drops back to the
//! enclosing scope without any bookkeeping.

use crate::parser::ast::QuerySpecId;

#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub spec: QuerySpecId,
    pub parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    /// Scope of a top-level statement.
    pub fn root(spec: QuerySpecId) -> Self {
        Self { spec, parent: None }
    }

    /// Scope of a query specification nested in this one.
    pub fn nested(&'a self, spec: QuerySpecId) -> Scope<'a> {
        Scope {
            spec,
            parent: Some(self),
        }
    }

    /// This scope and its ancestors, innermost first.
    pub fn chain(&self) -> ScopeChain<'_> {
        ScopeChain { next: Some(self) }
    }

    pub fn depth(&self) -> usize {
        self.chain().count() - 1
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

pub struct ScopeChain<'a> {
    next: Option<&'a Scope<'a>>,
}

impl<'a> Iterator for ScopeChain<'a> {
    type Item = QuerySpecId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent;
        Some(current.spec)
    }
}
