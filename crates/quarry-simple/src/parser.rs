//! Recursive-descent parser for SIMPLE, built on nom combinators.
//!
//! The grammar has no reserved words: `procedure`, `read`, `while` and the
//! rest are ordinary names wherever a name is expected. Statement parsing
//! therefore tries each keyword form first and falls back to assignment via
//! `alt` backtracking; a keyword only commits once its full syntactic shape
//! matches.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, char, digit1, multispace0},
    combinator::{all_consuming, cut, map, recognize, value, verify},
    multi::{many0, many1},
    sequence::{delimited, pair},
    IResult,
};
use thiserror::Error;

use crate::ast::{BinOp, CondExpr, Expr, Procedure, Program, RelOp, Stmt, StmtKind, StmtList};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("syntax error at line {line}, column {column}, near `{fragment}`")]
    Syntax {
        line: u32,
        column: u32,
        fragment: String,
    },
    #[error("program has no procedures")]
    EmptyProgram,
}

/// Parse a complete SIMPLE source text into a [`Program`].
///
/// Statement numbers are left at `0`; callers number the tree afterwards
/// with a pre-order walk.
pub fn parse_program(input: &str) -> Result<Program, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::EmptyProgram);
    }
    match all_consuming(many1(procedure))(input) {
        Ok((_, procedures)) => Ok(Program { procedures }),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(locate(input, e.input)),
        Err(nom::Err::Incomplete(_)) => Err(locate(input, "")),
    }
}

/// Parse a standalone arithmetic expression, as used in assignment patterns.
pub fn parse_expr(input: &str) -> Result<Expr, ParseError> {
    match all_consuming(expr)(input) {
        Ok((_, e)) => Ok(e),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(locate(input, e.input)),
        Err(nom::Err::Incomplete(_)) => Err(locate(input, "")),
    }
}

/// Turn the unconsumed remainder of a failed parse into a positioned error.
fn locate(source: &str, remaining: &str) -> ParseError {
    let consumed = source.len() - remaining.len();
    let prefix = &source[..consumed];
    let line = prefix.bytes().filter(|&b| b == b'\n').count() as u32 + 1;
    let column = prefix.rsplit('\n').next().unwrap_or("").chars().count() as u32 + 1;
    let fragment: String = remaining
        .lines()
        .next()
        .unwrap_or("")
        .chars()
        .take(32)
        .collect();
    ParseError::Syntax {
        line,
        column,
        fragment: fragment.trim_end().to_string(),
    }
}

// =============================================================================
// Lexical building blocks
// =============================================================================

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// NAME: a letter followed by letters and digits.
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(alpha1, take_while(|c: char| c.is_ascii_alphanumeric())))(input)
}

/// INTEGER: digits with no leading zero (a lone `0` is fine).
fn integer(input: &str) -> IResult<&str, &str> {
    verify(digit1, |digits: &str| {
        digits.len() == 1 || !digits.starts_with('0')
    })(input)
}

/// Match `kw` as a whole word. `readx` never matches `read`, and since the
/// match is checked against the full identifier, failing here backtracks
/// cleanly into the assignment rule.
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    verify(identifier, move |word: &str| word == kw)
}

// =============================================================================
// Expressions
// =============================================================================

fn add_op(input: &str) -> IResult<&str, BinOp> {
    alt((value(BinOp::Add, char('+')), value(BinOp::Sub, char('-'))))(input)
}

fn mul_op(input: &str) -> IResult<&str, BinOp> {
    alt((
        value(BinOp::Mul, char('*')),
        value(BinOp::Div, char('/')),
        value(BinOp::Mod, char('%')),
    ))(input)
}

fn factor(input: &str) -> IResult<&str, Expr> {
    alt((
        map(ws(integer), |digits: &str| Expr::Const {
            value: digits.to_string(),
        }),
        map(ws(identifier), |name: &str| Expr::Var {
            name: name.to_string(),
        }),
        delimited(ws(char('(')), expr, ws(char(')'))),
    ))(input)
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = factor(input)?;
    let (input, rest) = many0(pair(ws(mul_op), factor))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(ws(add_op), term))(input)?;
    Ok((input, fold_binary(first, rest)))
}

/// Left-associative fold: `a - b + c` becomes `(a - b) + c`.
fn fold_binary(first: Expr, rest: Vec<(BinOp, Expr)>) -> Expr {
    rest.into_iter().fold(first, |lhs, (op, rhs)| Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

// =============================================================================
// Conditions
// =============================================================================

fn rel_op(input: &str) -> IResult<&str, RelOp> {
    // Two-character operators first so `>=` is not read as `>` `=`.
    alt((
        value(RelOp::Ge, tag(">=")),
        value(RelOp::Le, tag("<=")),
        value(RelOp::Eq, tag("==")),
        value(RelOp::Ne, tag("!=")),
        value(RelOp::Gt, char('>')),
        value(RelOp::Lt, char('<')),
    ))(input)
}

fn rel_expr(input: &str) -> IResult<&str, CondExpr> {
    let (input, lhs) = expr(input)?;
    let (input, op) = ws(rel_op)(input)?;
    let (input, rhs) = expr(input)?;
    Ok((input, CondExpr::Rel { op, lhs, rhs }))
}

fn paren_cond(input: &str) -> IResult<&str, CondExpr> {
    delimited(ws(char('(')), cond_expr, ws(char(')')))(input)
}

fn not_cond(input: &str) -> IResult<&str, CondExpr> {
    let (input, _) = ws(char('!'))(input)?;
    let (input, inner) = paren_cond(input)?;
    Ok((
        input,
        CondExpr::Not {
            inner: Box::new(inner),
        },
    ))
}

/// `( cond ) && ( cond )` and `( cond ) || ( cond )`, parsing the left
/// operand once and dispatching on the operator that follows.
fn binary_cond(input: &str) -> IResult<&str, CondExpr> {
    let (input, lhs) = paren_cond(input)?;
    let (input, op) = ws(alt((tag("&&"), tag("||"))))(input)?;
    let (input, rhs) = paren_cond(input)?;
    let lhs = Box::new(lhs);
    let rhs = Box::new(rhs);
    let cond = if op == "&&" {
        CondExpr::And { lhs, rhs }
    } else {
        CondExpr::Or { lhs, rhs }
    };
    Ok((input, cond))
}

/// A condition is either `!(...)`, a parenthesised `&&`/`||` pair, or a bare
/// relational comparison. `(x + 1) > 2` starts with `(` like the binary
/// forms, so those are tried first and backtrack into `rel_expr`.
fn cond_expr(input: &str) -> IResult<&str, CondExpr> {
    alt((not_cond, binary_cond, rel_expr))(input)
}

// =============================================================================
// Statements and procedures
// =============================================================================

fn read_stmt(input: &str) -> IResult<&str, StmtKind> {
    let (input, _) = ws(keyword("read"))(input)?;
    let (input, var) = ws(identifier)(input)?;
    let (input, _) = ws(char(';'))(input)?;
    Ok((
        input,
        StmtKind::Read {
            var: var.to_string(),
        },
    ))
}

fn print_stmt(input: &str) -> IResult<&str, StmtKind> {
    let (input, _) = ws(keyword("print"))(input)?;
    let (input, var) = ws(identifier)(input)?;
    let (input, _) = ws(char(';'))(input)?;
    Ok((
        input,
        StmtKind::Print {
            var: var.to_string(),
        },
    ))
}

fn call_stmt(input: &str) -> IResult<&str, StmtKind> {
    let (input, _) = ws(keyword("call"))(input)?;
    let (input, callee) = ws(identifier)(input)?;
    let (input, _) = ws(char(';'))(input)?;
    Ok((
        input,
        StmtKind::Call {
            callee: callee.to_string(),
        },
    ))
}

fn while_stmt(input: &str) -> IResult<&str, StmtKind> {
    let (input, _) = ws(keyword("while"))(input)?;
    let (input, cond) = paren_cond(input)?;
    let (input, body) = braced_stmt_list(input)?;
    Ok((input, StmtKind::While { cond, body }))
}

fn if_stmt(input: &str) -> IResult<&str, StmtKind> {
    let (input, _) = ws(keyword("if"))(input)?;
    let (input, cond) = paren_cond(input)?;
    let (input, _) = ws(keyword("then"))(input)?;
    let (input, then_branch) = braced_stmt_list(input)?;
    let (input, _) = ws(keyword("else"))(input)?;
    let (input, else_branch) = braced_stmt_list(input)?;
    Ok((
        input,
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        },
    ))
}

fn assign_stmt(input: &str) -> IResult<&str, StmtKind> {
    let (input, target) = ws(identifier)(input)?;
    let (input, _) = ws(char('='))(input)?;
    let (input, value) = expr(input)?;
    let (input, _) = ws(char(';'))(input)?;
    Ok((
        input,
        StmtKind::Assign {
            target: target.to_string(),
            value,
        },
    ))
}

fn stmt(input: &str) -> IResult<&str, Stmt> {
    map(
        alt((
            read_stmt,
            print_stmt,
            call_stmt,
            while_stmt,
            if_stmt,
            assign_stmt,
        )),
        |kind| Stmt { number: 0, kind },
    )(input)
}

/// `{ stmt+ }`; statement lists are non-empty by grammar.
fn braced_stmt_list(input: &str) -> IResult<&str, StmtList> {
    let (input, _) = ws(char('{'))(input)?;
    let (input, stmts) = many1(stmt)(input)?;
    let (input, _) = ws(char('}'))(input)?;
    Ok((input, StmtList { stmts }))
}

fn procedure(input: &str) -> IResult<&str, Procedure> {
    let (input, _) = ws(keyword("procedure"))(input)?;
    // Top level admits nothing but procedures, so commit once the keyword
    // matched; errors inside a body then surface at the offending token.
    let (input, (name, body)) = cut(pair(ws(identifier), braced_stmt_list))(input)?;
    Ok((
        input,
        Procedure {
            name: name.to_string(),
            body,
        },
    ))
}

// =============================================================================
// Tests
// =============================================================================
