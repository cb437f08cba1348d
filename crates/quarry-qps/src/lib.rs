//! Query processing: the declarative query language answered against a
//! populated knowledge base.
//!
//! A query travels a fixed pipeline:
//!
//! ```text
//! text -> parser -> analyzer -> optimize -> eval -> Vec<String>
//!         untyped    typed       groups     tables
//! ```
//!
//! - [`parser`]: nom grammar for declarations, the select reference and
//!   `such that`/`pattern`/`with` clause chains; quoted expressions are
//!   normalized to postfix on the way through.
//! - [`analyzer`]: binds synonyms to declarations and type-checks clause
//!   arguments, producing the closed [`query::Query`] model.
//! - [`optimize`]: clause grouping by shared synonyms, duplicate and
//!   subsumption dropping, contradiction collapse, positive-first ordering.
//! - [`eval`]: shape-dispatched clause evaluation into named-column
//!   [`table::Table`]s, sort-merge joins, domain fill and projection.
//! - [`session::Session`]: owns the knowledge base and exposes the
//!   infallible `evaluate` entry point; parse and type errors become the
//!   [`session::INVALID_QUERY`] sentinel row.

pub mod analyzer;
pub mod ast;
pub mod error;
pub mod eval;
pub mod optimize;
pub mod parser;
pub mod query;
pub mod session;
pub mod table;

pub use error::QueryError;
pub use query::{Query, Select, SynonymKind};
pub use session::{Session, INVALID_QUERY};
pub use table::{Cell, EvalOutcome, Table};
