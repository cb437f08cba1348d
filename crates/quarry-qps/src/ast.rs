//! Untyped query tree, straight out of the parser.
//!
//! Synonym references are bare strings here; binding them to declarations
//! and checking argument types happens in [`crate::analyzer`].

use crate::query::{AttrName, SynonymKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UntypedQuery {
    pub declarations: Vec<Declaration>,
    pub select: SelectRef,
    pub clauses: Vec<UntypedClause>,
}

/// One declaration statement, e.g. `assign a1, a2;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: SynonymKind,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectRef {
    /// `Select BOOLEAN` with no attribute. Resolves to a synonym instead if
    /// one named `BOOLEAN` is declared.
    Boolean,
    Single(ElemRef),
    Tuple(Vec<ElemRef>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElemRef {
    pub synonym: String,
    pub attr: Option<AttrName>,
}

/// Argument of a relation or the first argument of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawArg {
    Wildcard,
    Number(u32),
    /// Quoted name, `"main"` or `"x"`.
    Name(String),
    Synonym(String),
}

/// Expression slot of a pattern clause. Quoted expressions are normalized to
/// postfix at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSpec {
    Any,
    Exact(String),
    Partial(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawWithArg {
    Number(u32),
    Name(String),
    Attr { synonym: String, attr: AttrName },
    Synonym(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UntypedClause {
    pub negated: bool,
    pub body: RawClause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawClause {
    SuchThat {
        relation: String,
        left: RawArg,
        right: RawArg,
    },
    Pattern {
        synonym: String,
        var: RawArg,
        specs: Vec<RawSpec>,
    },
    With {
        left: RawWithArg,
        right: RawWithArg,
    },
}
