//! Statement parameter registry.

use crate::parser::ast::ParameterRef;
use crate::sqm::expr::{ExpressionType, ParameterKey, SqmParameter};

use super::error::{SemanticError, SemanticResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Named,
    Positional,
}

/// Collects the parameters of one statement in order of first occurrence.
#[derive(Debug, Default)]
pub struct ParameterCollector {
    parameters: Vec<SqmParameter>,
    style: Option<Style>,
}

impl ParameterCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a parameter occurrence and return its key.
    pub fn register(&mut self, reference: &ParameterRef, multi_valued: bool) -> SemanticResult<ParameterKey> {
        let (key, style) = match reference {
            ParameterRef::Named(name) => (ParameterKey::Named(name.clone()), Style::Named),
            ParameterRef::Positional(position) => (ParameterKey::Positional(*position), Style::Positional),
            ParameterRef::Anonymous => return Err(SemanticError::LegacyPositionalParameter),
        };
        match self.style {
            Some(existing) if existing != style => return Err(SemanticError::MixedParameterStyles),
            _ => self.style = Some(style),
        }

        match self.parameters.iter_mut().find(|p| p.key == key) {
            Some(existing) => existing.allows_multi_valued_binding |= multi_valued,
            None => self.parameters.push(SqmParameter {
                key: key.clone(),
                anticipated_type: ExpressionType::Unknown,
                allows_multi_valued_binding: multi_valued,
            }),
        }
        Ok(key)
    }

    /// Record the type a parameter is expected to bind to. The first known type wins.
    pub fn anticipate(&mut self, key: &ParameterKey, ty: &ExpressionType) {
        if !ty.is_known() {
            return;
        }
        if let Some(parameter) = self.parameters.iter_mut().find(|p| &p.key == key) {
            if !parameter.anticipated_type.is_known() {
                parameter.anticipated_type = ty.clone();
            }
        }
    }

    pub fn anticipated_type(&self, key: &ParameterKey) -> ExpressionType {
        self.parameters
            .iter()
            .find(|p| &p.key == key)
            .map(|p| p.anticipated_type.clone())
            .unwrap_or(ExpressionType::Unknown)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn into_parameters(self) -> Vec<SqmParameter> {
        self.parameters
    }
}
