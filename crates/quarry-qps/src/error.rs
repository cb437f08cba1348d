//! Query pipeline errors.
//!
//! Both variants are recoverable: [`crate::Session::evaluate`] maps either
//! one to the `Error: Invalid query` sentinel result. The split matters for
//! diagnostics and tests: a query that does not parse is a syntax error, a
//! query that parses but references synonyms or attributes inconsistently is
//! a semantic error.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("semantic error: {0}")]
    Semantic(String),
}

impl QueryError {
    pub fn is_syntax(&self) -> bool {
        matches!(self, QueryError::Syntax(_))
    }

    pub fn is_semantic(&self) -> bool {
        matches!(self, QueryError::Semantic(_))
    }
}
