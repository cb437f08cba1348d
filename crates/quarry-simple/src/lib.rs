//! SIMPLE language front end.
//!
//! SIMPLE is a small imperative teaching language: a program is a list of
//! procedures, each a non-empty statement list of `read`, `print`, `call`,
//! `while`, `if` and assignment statements. This crate owns the surface
//! syntax only:
//!
//! - [`ast`]: the typed tree the parser produces. Statement numbers are part
//!   of the tree but are *not* assigned here; the knowledge-base population
//!   pipeline numbers statements as its first stage, so a freshly parsed
//!   `Program` carries `0` in every `number` field.
//! - [`parser`]: a nom-based recursive-descent parser for the grammar below.
//! - [`postfix`]: the canonical reverse-Polish form of expressions, shared by
//!   the pattern index and the query language's pattern specs so that
//!   structural matching degrades to token-sequence comparison.
//!
//! Grammar:
//!
//! ```text
//! program   : procedure+
//! procedure : 'procedure' NAME '{' stmt+ '}'
//! stmt      : 'read' NAME ';' | 'print' NAME ';' | 'call' NAME ';'
//!           | 'while' '(' cond ')' '{' stmt+ '}'
//!           | 'if' '(' cond ')' 'then' '{' stmt+ '}' 'else' '{' stmt+ '}'
//!           | NAME '=' expr ';'
//! cond      : '!' '(' cond ')'
//!           | '(' cond ')' '&&' '(' cond ')'
//!           | '(' cond ')' '||' '(' cond ')'
//!           | expr relop expr
//! expr      : term (('+'|'-') term)*
//! term      : factor (('*'|'/'|'%') factor)*
//! factor    : NAME | INTEGER | '(' expr ')'
//! ```
//!
//! Keywords are contextual, not reserved: `read = read + 1;` assigns to a
//! variable named `read`. `NAME` is a letter followed by letters/digits;
//! `INTEGER` has no leading zeros.

pub mod ast;
pub mod parser;
pub mod postfix;

pub use ast::{
    BinOp, CondExpr, Expr, Procedure, Program, RelOp, Stmt, StmtKind, StmtList, StmtNo,
};
pub use parser::{parse_expr, parse_program, ParseError};
pub use postfix::{contains_subexpr, postfix_of};
