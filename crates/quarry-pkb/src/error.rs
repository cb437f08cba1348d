use thiserror::Error;

/// Fatal conditions found while populating the knowledge base.
///
/// Any of these aborts population; there is no partially usable store
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PkbError {
    #[error("duplicate procedure `{0}`")]
    DuplicateProcedure(String),

    #[error("procedure `{caller}` calls undefined procedure `{callee}`")]
    UndefinedCallee { caller: String, callee: String },

    #[error("procedure `{0}` calls itself")]
    RecursiveProcedure(String),

    #[error("cyclic call chain among procedures: {}", .0.join(", "))]
    CallCycle(Vec<String>),
}
