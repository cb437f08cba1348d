//! One analyzed program and the query entry point.

use std::fs;
use std::path::Path;

use anyhow::Context as _;

use quarry_pkb::Pkb;
use quarry_simple::parse_program;

use crate::analyzer::analyze;
use crate::error::QueryError;
use crate::eval::evaluate;
use crate::optimize::pipeline;
use crate::parser::parse_query;

/// The single row returned for a query that fails to parse or type-check.
pub const INVALID_QUERY: &str = "Error: Invalid query";

/// A built knowledge base plus the query pipeline over it. Building is
/// fallible; querying never is.
#[derive(Debug)]
pub struct Session {
    pkb: Pkb,
}

impl Session {
    /// Parse a source program and populate the knowledge base.
    pub fn from_source(source: &str) -> anyhow::Result<Session> {
        let program = parse_program(source).context("parsing program")?;
        let pkb = Pkb::build(program).context("building knowledge base")?;
        Ok(Session { pkb })
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Session> {
        let path = path.as_ref();
        let source =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Session::from_source(&source)
    }

    pub fn pkb(&self) -> &Pkb {
        &self.pkb
    }

    /// Answer one query. Malformed or ill-typed queries yield the sentinel
    /// row rather than an error; an empty vector means a valid query with
    /// no results.
    pub fn evaluate(&self, query: &str) -> Vec<String> {
        match self.try_evaluate(query) {
            Ok(rows) => rows,
            Err(err) => {
                tracing::debug!(error = %err, "query rejected");
                vec![INVALID_QUERY.to_string()]
            }
        }
    }

    fn try_evaluate(&self, query: &str) -> Result<Vec<String>, QueryError> {
        let untyped = parse_query(query)?;
        let typed = analyze(untyped)?;
        let groups = pipeline(typed);
        Ok(evaluate(&self.pkb.read(), &groups))
    }
}
