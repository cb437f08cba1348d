//! Typed query model, the output of semantic analysis.
//!
//! Every hierarchy here is a closed enum: the supported design entities,
//! relations, clause kinds and attribute names are fixed sets, so the
//! optimizer and evaluator dispatch by exhaustive match.

use serde::{Deserialize, Serialize};

use quarry_pkb::StmtNo;

// ============================================================================
// Vocabulary
// ============================================================================

/// Design entity a synonym can be declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynonymKind {
    Stmt,
    Read,
    Print,
    Call,
    While,
    If,
    Assign,
    Variable,
    Constant,
    Procedure,
}

impl SynonymKind {
    pub fn keyword(self) -> &'static str {
        match self {
            SynonymKind::Stmt => "stmt",
            SynonymKind::Read => "read",
            SynonymKind::Print => "print",
            SynonymKind::Call => "call",
            SynonymKind::While => "while",
            SynonymKind::If => "if",
            SynonymKind::Assign => "assign",
            SynonymKind::Variable => "variable",
            SynonymKind::Constant => "constant",
            SynonymKind::Procedure => "procedure",
        }
    }

    pub fn from_keyword(word: &str) -> Option<SynonymKind> {
        Some(match word {
            "stmt" => SynonymKind::Stmt,
            "read" => SynonymKind::Read,
            "print" => SynonymKind::Print,
            "call" => SynonymKind::Call,
            "while" => SynonymKind::While,
            "if" => SynonymKind::If,
            "assign" => SynonymKind::Assign,
            "variable" => SynonymKind::Variable,
            "constant" => SynonymKind::Constant,
            "procedure" => SynonymKind::Procedure,
            _ => return None,
        })
    }

    /// Statement-valued kinds; their instances are statement numbers.
    pub fn is_stmt(self) -> bool {
        !matches!(
            self,
            SynonymKind::Variable | SynonymKind::Constant | SynonymKind::Procedure
        )
    }
}

/// Attribute of a synonym (`syn.attrName`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrName {
    ProcName,
    VarName,
    Value,
    StmtNo,
}

impl AttrName {
    pub fn keyword(self) -> &'static str {
        match self {
            AttrName::ProcName => "procName",
            AttrName::VarName => "varName",
            AttrName::Value => "value",
            AttrName::StmtNo => "stmt#",
        }
    }

    pub fn from_keyword(word: &str) -> Option<AttrName> {
        Some(match word {
            "procName" => AttrName::ProcName,
            "varName" => AttrName::VarName,
            "value" => AttrName::Value,
            "stmt#" => AttrName::StmtNo,
            _ => return None,
        })
    }

    /// `procName`/`varName` compare as names, `value`/`stmt#` as integers.
    pub fn is_name_valued(self) -> bool {
        matches!(self, AttrName::ProcName | AttrName::VarName)
    }
}

/// A declared synonym reference with its resolved kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synonym {
    pub name: String,
    pub kind: SynonymKind,
}

// ============================================================================
// Clause arguments
// ============================================================================

/// Argument in statement position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StmtArg {
    Synonym(Synonym),
    Number(StmtNo),
    Wildcard,
}

impl StmtArg {
    pub fn synonym(&self) -> Option<&Synonym> {
        match self {
            StmtArg::Synonym(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, StmtArg::Wildcard)
    }
}

/// Argument in name-entity position (a variable or a procedure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntArg {
    Synonym(Synonym),
    Name(String),
    Wildcard,
}

impl EntArg {
    pub fn synonym(&self) -> Option<&Synonym> {
        match self {
            EntArg::Synonym(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, EntArg::Wildcard)
    }
}

/// First argument of Modifies/Uses, already split by form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subject {
    Stmt(StmtArg),
    Proc(EntArg),
}

impl Subject {
    pub fn synonym(&self) -> Option<&Synonym> {
        match self {
            Subject::Stmt(arg) => arg.synonym(),
            Subject::Proc(arg) => arg.synonym(),
        }
    }
}

// ============================================================================
// Relations
// ============================================================================

/// The statement-to-statement relations, which all evaluate over the same
/// store shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StmtRelKind {
    Follows,
    FollowsStar,
    Parent,
    ParentStar,
    Next,
    NextStar,
    Affects,
}

impl StmtRelKind {
    pub fn keyword(self) -> &'static str {
        match self {
            StmtRelKind::Follows => "Follows",
            StmtRelKind::FollowsStar => "Follows*",
            StmtRelKind::Parent => "Parent",
            StmtRelKind::ParentStar => "Parent*",
            StmtRelKind::Next => "Next",
            StmtRelKind::NextStar => "Next*",
            StmtRelKind::Affects => "Affects",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    Stmt {
        kind: StmtRelKind,
        left: StmtArg,
        right: StmtArg,
    },
    Calls {
        transitive: bool,
        left: EntArg,
        right: EntArg,
    },
    Modifies {
        subject: Subject,
        var: EntArg,
    },
    Uses {
        subject: Subject,
        var: EntArg,
    },
}

// ============================================================================
// Pattern and with clauses
// ============================================================================

/// Expression side of an assign pattern, in postfix form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExprSpec {
    Any,
    Exact(String),
    Partial(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    Assign {
        synonym: Synonym,
        var: EntArg,
        spec: ExprSpec,
    },
    While {
        synonym: Synonym,
        var: EntArg,
    },
    If {
        synonym: Synonym,
        var: EntArg,
    },
}

impl Pattern {
    pub fn synonym(&self) -> &Synonym {
        match self {
            Pattern::Assign { synonym, .. }
            | Pattern::While { synonym, .. }
            | Pattern::If { synonym, .. } => synonym,
        }
    }

    pub fn var(&self) -> &EntArg {
        match self {
            Pattern::Assign { var, .. } | Pattern::While { var, .. } | Pattern::If { var, .. } => {
                var
            }
        }
    }
}

/// One side of a `with` comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithValue {
    Number(u32),
    Name(String),
    Attr { synonym: Synonym, attr: AttrName },
}

impl WithValue {
    pub fn is_name_valued(&self) -> bool {
        match self {
            WithValue::Number(_) => false,
            WithValue::Name(_) => true,
            WithValue::Attr { attr, .. } => attr.is_name_valued(),
        }
    }

    pub fn synonym(&self) -> Option<&Synonym> {
        match self {
            WithValue::Attr { synonym, .. } => Some(synonym),
            _ => None,
        }
    }
}

// ============================================================================
// Clauses and the query
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClauseKind {
    SuchThat(Relation),
    Pattern(Pattern),
    With { left: WithValue, right: WithValue },
    /// Constant-false marker planted by the optimizer when a clause and its
    /// negation coexist.
    Contradiction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub negated: bool,
    pub kind: ClauseKind,
}

fn push_unique<'a>(out: &mut Vec<&'a Synonym>, synonym: Option<&'a Synonym>) {
    if let Some(s) = synonym {
        if !out.iter().any(|o| o.name == s.name) {
            out.push(s);
        }
    }
}

impl Clause {
    /// Synonyms this clause mentions, first occurrence order, deduplicated.
    pub fn synonyms(&self) -> Vec<&Synonym> {
        let mut out = Vec::new();
        match &self.kind {
            ClauseKind::SuchThat(rel) => match rel {
                Relation::Stmt { left, right, .. } => {
                    push_unique(&mut out, left.synonym());
                    push_unique(&mut out, right.synonym());
                }
                Relation::Calls { left, right, .. } => {
                    push_unique(&mut out, left.synonym());
                    push_unique(&mut out, right.synonym());
                }
                Relation::Modifies { subject, var } | Relation::Uses { subject, var } => {
                    push_unique(&mut out, subject.synonym());
                    push_unique(&mut out, var.synonym());
                }
            },
            ClauseKind::Pattern(pat) => {
                push_unique(&mut out, Some(pat.synonym()));
                push_unique(&mut out, pat.var().synonym());
            }
            ClauseKind::With { left, right } => {
                push_unique(&mut out, left.synonym());
                push_unique(&mut out, right.synonym());
            }
            ClauseKind::Contradiction => {}
        }
        out
    }

    /// True when the clause binds no synonym at all; such clauses only gate
    /// the result, they never contribute columns.
    pub fn is_boolean(&self) -> bool {
        self.synonyms().is_empty()
    }
}

/// Projected element: a synonym, optionally narrowed to one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elem {
    pub synonym: Synonym,
    pub attr: Option<AttrName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Select {
    Boolean,
    Elems(Vec<Elem>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub select: Select,
    pub clauses: Vec<Clause>,
}
