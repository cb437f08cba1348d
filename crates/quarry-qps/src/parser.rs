//! PQL parser, producing the untyped tree.
//!
//! The language is `declarations… Select ref clauses…` where each clause
//! chain is `such that`/`pattern`/`with` followed by one condition and any
//! number of `and`-joined conditions of the same kind. Keywords are
//! contextual: `Select`, `pattern`, `such`, `and` and the design-entity
//! words are all usable as synonym names, so the grammar backtracks via
//! `alt` and only commits (`cut`) once a construct is unambiguous.
//!
//! Quoted expressions in pattern specs are parsed with the SIMPLE expression
//! grammar and normalized to postfix here, so later stages only ever see
//! the canonical token-sequence form.

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{alpha1, char, digit1, multispace0},
    combinator::{all_consuming, cut, map, map_opt, map_res, opt, recognize, verify},
    error::{Error as NomError, ErrorKind},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult,
};

use quarry_simple::{parse_expr, postfix_of};

use crate::ast::{
    Declaration, ElemRef, RawArg, RawClause, RawSpec, RawWithArg, SelectRef, UntypedClause,
    UntypedQuery,
};
use crate::error::QueryError;
use crate::query::{AttrName, SynonymKind};

/// Parse a complete query string into the untyped tree.
pub fn parse_query(input: &str) -> Result<UntypedQuery, QueryError> {
    match all_consuming(terminated(untyped_query, multispace0))(input) {
        Ok((_, query)) => Ok(query),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(locate(input, e.input)),
        Err(nom::Err::Incomplete(_)) => Err(locate(input, "")),
    }
}

/// Describe the unconsumed remainder of a failed parse.
fn locate(source: &str, remaining: &str) -> QueryError {
    let column = source.len() - remaining.len() + 1;
    let fragment: String = remaining.trim_start().chars().take(24).collect();
    if fragment.is_empty() {
        QueryError::Syntax(format!("query ends unexpectedly at column {column}"))
    } else {
        QueryError::Syntax(format!("unexpected `{fragment}` at column {column}"))
    }
}

fn untyped_query(input: &str) -> IResult<&str, UntypedQuery> {
    let (input, declarations) = many0(declaration)(input)?;
    let (input, _) = ws(keyword("Select"))(input)?;
    let (input, select) = cut(select_ref)(input)?;
    let (input, chains) = many0(clause_chain)(input)?;
    Ok((
        input,
        UntypedQuery {
            declarations,
            select,
            clauses: chains.concat(),
        },
    ))
}

// ============================================================================
// Lexical building blocks
// ============================================================================

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(alpha1, take_while(|c: char| c.is_ascii_alphanumeric())))(input)
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    verify(identifier, move |word: &str| word == kw)
}

/// Digits with no leading zero, same lexical rule as SIMPLE's INTEGER.
fn number(input: &str) -> IResult<&str, u32> {
    map_res(
        verify(digit1, |digits: &str| {
            digits.len() == 1 || !digits.starts_with('0')
        }),
        |digits: &str| digits.parse::<u32>(),
    )(input)
}

/// `"name"`, whitespace-tolerant inside the quotes.
fn quoted_name(input: &str) -> IResult<&str, String> {
    delimited(
        pair(char('"'), multispace0),
        map(identifier, str::to_string),
        pair(multispace0, char('"')),
    )(input)
}

/// `procName`, `varName`, `value` or `stmt#`.
fn attr_name(input: &str) -> IResult<&str, AttrName> {
    let (rest, word) = recognize(pair(identifier, opt(char('#'))))(input)?;
    match AttrName::from_keyword(word) {
        Some(attr) => Ok((rest, attr)),
        None => Err(nom::Err::Error(NomError::new(input, ErrorKind::Verify))),
    }
}

// ============================================================================
// Declarations and the select reference
// ============================================================================

fn declaration(input: &str) -> IResult<&str, Declaration> {
    let (input, kind) = ws(map_opt(identifier, SynonymKind::from_keyword))(input)?;
    let (input, names) = separated_list1(ws(char(',')), map(ws(identifier), str::to_string))(input)?;
    let (input, _) = cut(char(';'))(input)?;
    Ok((input, Declaration { kind, names }))
}

fn select_ref(input: &str) -> IResult<&str, SelectRef> {
    alt((
        map(tuple_ref, SelectRef::Tuple),
        map(elem_ref, |elem| {
            // `Select BOOLEAN` is the boolean marker unless an attribute
            // pins it down as a synonym; the analyzer re-resolves it if a
            // synonym of that name is actually declared.
            if elem.attr.is_none() && elem.synonym == "BOOLEAN" {
                SelectRef::Boolean
            } else {
                SelectRef::Single(elem)
            }
        }),
    ))(input)
}

fn tuple_ref(input: &str) -> IResult<&str, Vec<ElemRef>> {
    delimited(
        ws(char('<')),
        separated_list1(ws(char(',')), elem_ref),
        ws(char('>')),
    )(input)
}

fn elem_ref(input: &str) -> IResult<&str, ElemRef> {
    let (input, synonym) = ws(identifier)(input)?;
    let (input, attr) = opt(preceded(ws(char('.')), attr_name))(input)?;
    Ok((
        input,
        ElemRef {
            synonym: synonym.to_string(),
            attr,
        },
    ))
}

// ============================================================================
// Clause chains
// ============================================================================

fn clause_chain(input: &str) -> IResult<&str, Vec<UntypedClause>> {
    alt((such_that_chain, pattern_chain, with_chain))(input)
}

fn such_that_chain(input: &str) -> IResult<&str, Vec<UntypedClause>> {
    let (input, _) = ws(keyword("such"))(input)?;
    let (input, _) = cut(ws(keyword("that")))(input)?;
    let (input, first) = cut(rel_cond)(input)?;
    and_chain(input, first, rel_cond)
}

fn pattern_chain(input: &str) -> IResult<&str, Vec<UntypedClause>> {
    let (input, _) = ws(keyword("pattern"))(input)?;
    let (input, first) = pat_cond(input)?;
    and_chain(input, first, pat_cond)
}

fn with_chain(input: &str) -> IResult<&str, Vec<UntypedClause>> {
    let (input, _) = ws(keyword("with"))(input)?;
    let (input, first) = with_cond(input)?;
    and_chain(input, first, with_cond)
}

/// `and`-joined conditions after the first one. The chain keyword fixes the
/// condition kind, so `such that X(…) and Y(…)` only admits relations at Y.
fn and_chain<'a, F>(
    input: &'a str,
    first: UntypedClause,
    mut cond: F,
) -> IResult<&'a str, Vec<UntypedClause>>
where
    F: FnMut(&'a str) -> IResult<&'a str, UntypedClause>,
{
    let (input, mut rest) = many0(preceded(ws(keyword("and")), cut(|i| cond(i))))(input)?;
    let mut clauses = vec![first];
    clauses.append(&mut rest);
    Ok((input, clauses))
}

/// Optional `not` in front of a condition. Tried as a keyword first and
/// backtracked if the remainder is not a condition, so a synonym named
/// `not` still works: `pattern not(v, _)` parses as a positive pattern.
fn negated<'a, F>(body: F) -> impl FnMut(&'a str) -> IResult<&'a str, UntypedClause>
where
    F: FnMut(&'a str) -> IResult<&'a str, UntypedClause> + Copy,
{
    move |input| {
        alt((
            map(preceded(ws(keyword("not")), body), |mut clause| {
                clause.negated = true;
                clause
            }),
            body,
        ))(input)
    }
}

// ============================================================================
// such that conditions
// ============================================================================

fn rel_cond(input: &str) -> IResult<&str, UntypedClause> {
    negated(rel_ref)(input)
}

fn rel_ref(input: &str) -> IResult<&str, UntypedClause> {
    let (input, relation) = ws(relation_name)(input)?;
    let (input, (left, right)) = cut(delimited(
        ws(char('(')),
        separated_pair(rel_arg, ws(char(',')), rel_arg),
        ws(char(')')),
    ))(input)?;
    Ok((
        input,
        UntypedClause {
            negated: false,
            body: RawClause::SuchThat {
                relation: relation.to_string(),
                left,
                right,
            },
        },
    ))
}

/// The relation names form a closed set; anything else fails the whole
/// chain as a syntax error rather than an unknown-relation semantic one.
fn relation_name(input: &str) -> IResult<&str, &str> {
    verify(recognize(pair(identifier, opt(char('*')))), |name: &str| {
        matches!(
            name,
            "Follows"
                | "Follows*"
                | "Parent"
                | "Parent*"
                | "Next"
                | "Next*"
                | "Affects"
                | "Calls"
                | "Calls*"
                | "Modifies"
                | "Uses"
        )
    })(input)
}

fn rel_arg(input: &str) -> IResult<&str, RawArg> {
    ws(alt((
        map(char('_'), |_| RawArg::Wildcard),
        map(number, RawArg::Number),
        map(quoted_name, RawArg::Name),
        map(identifier, |name| RawArg::Synonym(name.to_string())),
    )))(input)
}

// ============================================================================
// pattern conditions
// ============================================================================

fn pat_cond(input: &str) -> IResult<&str, UntypedClause> {
    negated(pat_ref)(input)
}

fn pat_ref(input: &str) -> IResult<&str, UntypedClause> {
    let (input, synonym) = ws(identifier)(input)?;
    let (input, _) = char('(')(input)?;
    let (input, var) = cut(rel_arg)(input)?;
    let (input, specs) = cut(many1(preceded(ws(char(',')), expr_spec)))(input)?;
    let (input, _) = cut(ws(char(')')))(input)?;
    Ok((
        input,
        UntypedClause {
            negated: false,
            body: RawClause::Pattern {
                synonym: synonym.to_string(),
                var,
                specs,
            },
        },
    ))
}

fn expr_spec(input: &str) -> IResult<&str, RawSpec> {
    ws(alt((
        map(
            delimited(
                pair(ws(char('_')), char('"')),
                expr_postfix,
                pair(char('"'), ws(char('_'))),
            ),
            RawSpec::Partial,
        ),
        map(char('_'), |_| RawSpec::Any),
        map(
            delimited(char('"'), expr_postfix, char('"')),
            RawSpec::Exact,
        ),
    )))(input)
}

/// Text up to the closing quote, parsed as a SIMPLE expression and rendered
/// in postfix. A malformed expression is a hard failure: the quotes already
/// committed us to an expression spec.
fn expr_postfix(input: &str) -> IResult<&str, String> {
    let (rest, raw) = take_while1(|c| c != '"')(input)?;
    match parse_expr(raw) {
        Ok(expr) => Ok((rest, postfix_of(&expr))),
        Err(_) => Err(nom::Err::Failure(NomError::new(input, ErrorKind::Verify))),
    }
}

// ============================================================================
// with conditions
// ============================================================================

fn with_cond(input: &str) -> IResult<&str, UntypedClause> {
    negated(with_ref)(input)
}

fn with_ref(input: &str) -> IResult<&str, UntypedClause> {
    let (input, (left, right)) =
        separated_pair(with_arg, ws(char('=')), cut(with_arg))(input)?;
    Ok((
        input,
        UntypedClause {
            negated: false,
            body: RawClause::With { left, right },
        },
    ))
}

fn with_arg(input: &str) -> IResult<&str, RawWithArg> {
    ws(alt((
        map(number, RawWithArg::Number),
        map(quoted_name, RawWithArg::Name),
        attr_or_synonym,
    )))(input)
}

fn attr_or_synonym(input: &str) -> IResult<&str, RawWithArg> {
    let (input, name) = identifier(input)?;
    let (input, attr) = opt(preceded(ws(char('.')), attr_name))(input)?;
    Ok((
        input,
        match attr {
            Some(attr) => RawWithArg::Attr {
                synonym: name.to_string(),
                attr,
            },
            None => RawWithArg::Synonym(name.to_string()),
        },
    ))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{RawArg, RawClause, RawSpec, RawWithArg, SelectRef};
    use crate::query::{AttrName, SynonymKind};

    fn parsed(input: &str) -> UntypedQuery {
        match parse_query(input) {
            Ok(q) => q,
            Err(e) => panic!("query {input:?} failed to parse: {e}"),
        }
    }

    #[test]
    fn declarations_collect_kinds_and_names() {
        let q = parsed("stmt s; assign a1, a2; variable v; Select s");
        assert_eq!(q.declarations.len(), 3);
        assert_eq!(q.declarations[0].kind, SynonymKind::Stmt);
        assert_eq!(q.declarations[1].names, vec!["a1", "a2"]);
        assert_eq!(q.declarations[2].kind, SynonymKind::Variable);
        assert_eq!(q.select, SelectRef::Single(ElemRef { synonym: "s".into(), attr: None }));
        assert!(q.clauses.is_empty());
    }

    #[test]
    fn select_boolean_tuple_and_attributes() {
        assert_eq!(parsed("Select BOOLEAN").select, SelectRef::Boolean);

        let q = parsed("procedure p; stmt s; Select <p.procName, s>");
        match q.select {
            SelectRef::Tuple(elems) => {
                assert_eq!(elems[0].synonym, "p");
                assert_eq!(elems[0].attr, Some(AttrName::ProcName));
                assert_eq!(elems[1].attr, None);
            }
            other => panic!("expected tuple, got {other:?}"),
        }

        let q = parsed("call c; Select c.stmt#");
        assert_eq!(
            q.select,
            SelectRef::Single(ElemRef { synonym: "c".into(), attr: Some(AttrName::StmtNo) })
        );
    }

    #[test]
    fn boolean_with_attribute_is_a_synonym_reference() {
        let q = parsed("stmt BOOLEAN; Select BOOLEAN.stmt#");
        assert_eq!(
            q.select,
            SelectRef::Single(ElemRef { synonym: "BOOLEAN".into(), attr: Some(AttrName::StmtNo) })
        );
    }

    #[test]
    fn such_that_chain_with_and() {
        let q = parsed("stmt s; Select s such that Follows(1, s) and Parent*(s, 5)");
        assert_eq!(q.clauses.len(), 2);
        assert_eq!(
            q.clauses[0].body,
            RawClause::SuchThat {
                relation: "Follows".into(),
                left: RawArg::Number(1),
                right: RawArg::Synonym("s".into()),
            }
        );
        assert_eq!(
            q.clauses[1].body,
            RawClause::SuchThat {
                relation: "Parent*".into(),
                left: RawArg::Synonym("s".into()),
                right: RawArg::Number(5),
            }
        );
    }

    #[test]
    fn not_marks_a_clause_negated() {
        let q = parsed("stmt s; Select s such that not Next*(s, s) and Follows(s, _)");
        assert!(q.clauses[0].negated);
        assert!(!q.clauses[1].negated);
    }

    #[test]
    fn a_synonym_named_not_still_parses_as_a_pattern() {
        let q = parsed("assign not; Select not pattern not(_, _)");
        assert!(!q.clauses[0].negated);
        match &q.clauses[0].body {
            RawClause::Pattern { synonym, .. } => assert_eq!(synonym, "not"),
            other => panic!("expected pattern, got {other:?}"),
        }

        let q = parsed("assign not; Select not pattern not not(_, _)");
        assert!(q.clauses[0].negated);
    }

    #[test]
    fn pattern_specs_normalize_expressions_to_postfix() {
        let q = parsed(r#"assign a; Select a pattern a("x", "y + z * 2")"#);
        match &q.clauses[0].body {
            RawClause::Pattern { var, specs, .. } => {
                assert_eq!(*var, RawArg::Name("x".into()));
                assert_eq!(specs.as_slice(), [RawSpec::Exact("y z 2 * +".into())]);
            }
            other => panic!("expected pattern, got {other:?}"),
        }

        let q = parsed(r#"assign a; variable v; Select a pattern a(v, _"cenX * cenX"_)"#);
        match &q.clauses[0].body {
            RawClause::Pattern { specs, .. } => {
                assert_eq!(specs.as_slice(), [RawSpec::Partial("cenX cenX *".into())]);
            }
            other => panic!("expected pattern, got {other:?}"),
        }
    }

    #[test]
    fn if_patterns_take_two_wildcard_specs() {
        let q = parsed("if ifs; variable v; Select ifs pattern ifs(v, _, _)");
        match &q.clauses[0].body {
            RawClause::Pattern { specs, .. } => {
                assert_eq!(specs.as_slice(), [RawSpec::Any, RawSpec::Any]);
            }
            other => panic!("expected pattern, got {other:?}"),
        }
    }

    #[test]
    fn with_compares_attributes_literals_and_numbers() {
        let q = parsed(r#"procedure p; call c; Select p with p.procName = c.procName and c.stmt# = 13"#);
        assert_eq!(
            q.clauses[0].body,
            RawClause::With {
                left: RawWithArg::Attr { synonym: "p".into(), attr: AttrName::ProcName },
                right: RawWithArg::Attr { synonym: "c".into(), attr: AttrName::ProcName },
            }
        );
        assert_eq!(
            q.clauses[1].body,
            RawClause::With {
                left: RawWithArg::Attr { synonym: "c".into(), attr: AttrName::StmtNo },
                right: RawWithArg::Number(13),
            }
        );
    }

    #[test]
    fn chains_of_different_kinds_follow_each_other() {
        let q = parsed(
            r#"assign a; stmt s; variable v;
               Select <a, v> such that Modifies(a, v) pattern a(v, _) with a.stmt# = 10"#,
        );
        assert_eq!(q.clauses.len(), 3);
    }

    #[test]
    fn malformed_queries_are_syntax_errors() {
        let bad = [
            "stmt s Select s",                               // missing semicolon
            "stmt s; Select",                                // missing ref
            "stmt s; Select s such that",                    // missing relation
            "stmt s; Select s such that Knows(1, 2)",        // unknown relation
            "stmt s; Select s such that Follows(1 2)",       // missing comma
            "stmt s; Select s such that Follows(1, 2",       // unbalanced paren
            "assign a; Select a pattern a(_, \"x +\")",      // malformed expr
            "assign a; Select a pattern a(_, _\"x\")",       // half-partial spec
            "stmt s; Select <s,>",                           // dangling tuple comma
            "stmt s; Select s with s.stmt# =",               // missing rhs
            "stmt s; Select s and Follows(1, 2)",            // and without a chain
            "stmt s; Select s such that Follows*(1, 2) extra",
            "stmt s; Select s such that Follows(01, s)",     // leading zero
            "stmt s; Select s with s.stmt# = 007",
        ];
        for input in bad {
            let err = parse_query(input).unwrap_err();
            assert!(err.is_syntax(), "{input:?} should be a syntax error, got {err:?}");
        }
    }

    #[test]
    fn a_lone_zero_is_a_valid_number() {
        let q = parsed("stmt s; Select s such that Follows(0, s) with 0 = 0");
        assert_eq!(
            q.clauses[0].body,
            RawClause::SuchThat {
                relation: "Follows".into(),
                left: RawArg::Number(0),
                right: RawArg::Synonym("s".into()),
            }
        );
        assert_eq!(
            q.clauses[1].body,
            RawClause::With {
                left: RawWithArg::Number(0),
                right: RawWithArg::Number(0),
            }
        );
    }

    #[test]
    fn design_entity_words_are_usable_as_synonym_names() {
        let q = parsed("stmt stmt; Select stmt such that Follows(stmt, 2)");
        assert_eq!(q.declarations[0].names, vec!["stmt"]);

        // `Select` itself can be declared; the first `Select` keyword below
        // is the clause head, the second is the synonym.
        let q = parsed("stmt Select; Select Select");
        assert_eq!(
            q.select,
            SelectRef::Single(ElemRef { synonym: "Select".into(), attr: None })
        );
    }
}
