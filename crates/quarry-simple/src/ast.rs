//! Typed AST for SIMPLE programs.
//!
//! All node kinds are closed enums: the statement and expression vocabularies
//! of SIMPLE are fixed, so downstream passes dispatch by `match` and the
//! compiler checks exhaustiveness whenever a kind is added.

use serde::{Deserialize, Serialize};

/// 1-based statement number, unique across the whole program.
///
/// `0` means "not yet numbered": the parser leaves numbers unassigned and the
/// PKB population pipeline fills them in with a pre-order walk.
pub type StmtNo = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub procedures: Vec<Procedure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    pub body: StmtList,
}

/// A non-empty, ordered list of statements (procedure body, loop body, or
/// if-branch). Follows relations are scoped to a single `StmtList`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StmtList {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stmt {
    pub number: StmtNo,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum StmtKind {
    Read {
        var: String,
    },
    Print {
        var: String,
    },
    Call {
        callee: String,
    },
    Assign {
        target: String,
        value: Expr,
    },
    While {
        cond: CondExpr,
        body: StmtList,
    },
    If {
        cond: CondExpr,
        then_branch: StmtList,
        else_branch: StmtList,
    },
}

impl StmtKind {
    /// The design-entity name of this statement kind, as it appears in query
    /// declarations (`assign a;`, `while w;` ...).
    pub fn entity_name(&self) -> &'static str {
        match self {
            StmtKind::Read { .. } => "read",
            StmtKind::Print { .. } => "print",
            StmtKind::Call { .. } => "call",
            StmtKind::Assign { .. } => "assign",
            StmtKind::While { .. } => "while",
            StmtKind::If { .. } => "if",
        }
    }

    /// While and if statements contain nested statement lists.
    pub fn is_container(&self) -> bool {
        matches!(self, StmtKind::While { .. } | StmtKind::If { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum Expr {
    Var { name: String },
    /// Constants keep their source spelling; SIMPLE integers have no leading
    /// zeros, so the spelling is already canonical.
    Const { value: String },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cond", rename_all = "snake_case")]
pub enum CondExpr {
    Not { inner: Box<CondExpr> },
    And { lhs: Box<CondExpr>, rhs: Box<CondExpr> },
    Or { lhs: Box<CondExpr>, rhs: Box<CondExpr> },
    Rel { op: RelOp, lhs: Expr, rhs: Expr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl RelOp {
    pub fn symbol(self) -> &'static str {
        match self {
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
        }
    }
}

impl Expr {
    /// Collect variable names read by this expression, left to right.
    pub fn collect_vars<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Var { name } => out.push(name),
            Expr::Const { .. } => {}
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
        }
    }

    /// Collect constant spellings appearing in this expression.
    pub fn collect_consts<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Var { .. } => {}
            Expr::Const { value } => out.push(value),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_consts(out);
                rhs.collect_consts(out);
            }
        }
    }
}

impl CondExpr {
    pub fn collect_vars<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            CondExpr::Not { inner } => inner.collect_vars(out),
            CondExpr::And { lhs, rhs } | CondExpr::Or { lhs, rhs } => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
            CondExpr::Rel { lhs, rhs, .. } => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
        }
    }

    pub fn collect_consts<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            CondExpr::Not { inner } => inner.collect_consts(out),
            CondExpr::And { lhs, rhs } | CondExpr::Or { lhs, rhs } => {
                lhs.collect_consts(out);
                rhs.collect_consts(out);
            }
            CondExpr::Rel { lhs, rhs, .. } => {
                lhs.collect_consts(out);
                rhs.collect_consts(out);
            }
        }
    }
}

impl StmtList {
    pub fn iter(&self) -> std::slice::Iter<'_, Stmt> {
        self.stmts.iter()
    }

    /// Visit every statement in this list and all nested lists, pre-order.
    pub fn for_each_stmt<'a>(&'a self, f: &mut impl FnMut(&'a Stmt)) {
        for stmt in &self.stmts {
            f(stmt);
            match &stmt.kind {
                StmtKind::While { body, .. } => body.for_each_stmt(f),
                StmtKind::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    then_branch.for_each_stmt(f);
                    else_branch.for_each_stmt(f);
                }
                _ => {}
            }
        }
    }
}

impl Program {
    /// Visit every statement in the program, pre-order, procedures in source
    /// order. With numbering applied this is ascending statement number.
    pub fn for_each_stmt<'a>(&'a self, f: &mut impl FnMut(&'a Procedure, &'a Stmt)) {
        for proc in &self.procedures {
            proc.body.for_each_stmt(&mut |stmt| f(proc, stmt));
        }
    }
}
