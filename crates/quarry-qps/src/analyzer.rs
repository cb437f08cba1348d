//! Semantic analysis: binds synonym references to declarations and checks
//! argument kinds, turning the untyped tree into the typed [`Query`].
//!
//! Everything rejected here is a [`QueryError::Semantic`]: the query parsed,
//! but its types do not line up. Statement numbers that do not exist in the
//! program are *not* errors; they simply evaluate to nothing.

use ahash::AHashMap;

use crate::ast::{
    Declaration, ElemRef, RawArg, RawClause, RawSpec, RawWithArg, SelectRef, UntypedClause,
    UntypedQuery,
};
use crate::error::QueryError;
use crate::query::{
    AttrName, Clause, ClauseKind, Elem, EntArg, ExprSpec, Pattern, Query, Relation, Select,
    StmtArg, StmtRelKind, Subject, Synonym, SynonymKind, WithValue,
};

/// Resolve and type-check an untyped query.
pub fn analyze(untyped: UntypedQuery) -> Result<Query, QueryError> {
    let symbols = declare(&untyped.declarations)?;
    let cx = Context { symbols };
    let select = cx.select(untyped.select)?;
    let clauses = untyped
        .clauses
        .into_iter()
        .map(|clause| cx.clause(clause))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Query { select, clauses })
}

fn declare(declarations: &[Declaration]) -> Result<AHashMap<String, SynonymKind>, QueryError> {
    let mut symbols = AHashMap::new();
    for decl in declarations {
        for name in &decl.names {
            if symbols.insert(name.clone(), decl.kind).is_some() {
                return Err(QueryError::Semantic(format!(
                    "synonym `{name}` is declared more than once"
                )));
            }
        }
    }
    Ok(symbols)
}

struct Context {
    symbols: AHashMap<String, SynonymKind>,
}

impl Context {
    fn resolve(&self, name: &str) -> Result<Synonym, QueryError> {
        match self.symbols.get(name) {
            Some(&kind) => Ok(Synonym {
                name: name.to_string(),
                kind,
            }),
            None => Err(QueryError::Semantic(format!(
                "synonym `{name}` is not declared"
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Select
    // ------------------------------------------------------------------

    fn select(&self, select: SelectRef) -> Result<Select, QueryError> {
        match select {
            // `Select BOOLEAN` names the synonym if one is declared as
            // `BOOLEAN`, and the boolean marker otherwise.
            SelectRef::Boolean => {
                if self.symbols.contains_key("BOOLEAN") {
                    let elem = self.elem(ElemRef {
                        synonym: "BOOLEAN".to_string(),
                        attr: None,
                    })?;
                    Ok(Select::Elems(vec![elem]))
                } else {
                    Ok(Select::Boolean)
                }
            }
            SelectRef::Single(elem) => Ok(Select::Elems(vec![self.elem(elem)?])),
            SelectRef::Tuple(elems) => Ok(Select::Elems(
                elems
                    .into_iter()
                    .map(|elem| self.elem(elem))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
        }
    }

    fn elem(&self, elem: ElemRef) -> Result<Elem, QueryError> {
        let synonym = self.resolve(&elem.synonym)?;
        if let Some(attr) = elem.attr {
            check_attr(&synonym, attr)?;
        }
        Ok(Elem {
            synonym,
            attr: elem.attr,
        })
    }

    // ------------------------------------------------------------------
    // Clauses
    // ------------------------------------------------------------------

    fn clause(&self, clause: UntypedClause) -> Result<Clause, QueryError> {
        let kind = match clause.body {
            RawClause::SuchThat {
                relation,
                left,
                right,
            } => ClauseKind::SuchThat(self.relation(&relation, left, right)?),
            RawClause::Pattern {
                synonym,
                var,
                specs,
            } => ClauseKind::Pattern(self.pattern(&synonym, var, specs)?),
            RawClause::With { left, right } => self.with(left, right)?,
        };
        Ok(Clause {
            negated: clause.negated,
            kind,
        })
    }

    fn relation(&self, name: &str, left: RawArg, right: RawArg) -> Result<Relation, QueryError> {
        if let Some(kind) = stmt_rel_kind(name) {
            return Ok(Relation::Stmt {
                kind,
                left: self.stmt_arg(name, left)?,
                right: self.stmt_arg(name, right)?,
            });
        }
        match name {
            "Calls" | "Calls*" => Ok(Relation::Calls {
                transitive: name == "Calls*",
                left: self.proc_arg(name, left)?,
                right: self.proc_arg(name, right)?,
            }),
            "Modifies" => Ok(Relation::Modifies {
                subject: self.subject(name, left)?,
                var: self.var_arg(name, right)?,
            }),
            "Uses" => Ok(Relation::Uses {
                subject: self.subject(name, left)?,
                var: self.var_arg(name, right)?,
            }),
            // The parser only lets the fixed relation set through.
            _ => Err(QueryError::Semantic(format!("unknown relation `{name}`"))),
        }
    }

    /// Statement position: wildcard, statement number, or a statement-kind
    /// synonym. A kind that can never satisfy the relation (a `print`
    /// synonym in `Affects`, say) stays legal and evaluates to nothing.
    fn stmt_arg(&self, relation: &str, arg: RawArg) -> Result<StmtArg, QueryError> {
        match arg {
            RawArg::Wildcard => Ok(StmtArg::Wildcard),
            RawArg::Number(n) => Ok(StmtArg::Number(n)),
            RawArg::Name(name) => Err(QueryError::Semantic(format!(
                "{relation} takes statement arguments, `\"{name}\"` is a name"
            ))),
            RawArg::Synonym(name) => {
                let synonym = self.resolve(&name)?;
                if !synonym.kind.is_stmt() {
                    return Err(QueryError::Semantic(format!(
                        "`{name}` is a {} synonym, {relation} needs a statement",
                        synonym.kind.keyword()
                    )));
                }
                Ok(StmtArg::Synonym(synonym))
            }
        }
    }

    fn proc_arg(&self, relation: &str, arg: RawArg) -> Result<EntArg, QueryError> {
        match arg {
            RawArg::Wildcard => Ok(EntArg::Wildcard),
            RawArg::Name(name) => Ok(EntArg::Name(name)),
            RawArg::Number(n) => Err(QueryError::Semantic(format!(
                "{relation} takes procedure arguments, `{n}` is a number"
            ))),
            RawArg::Synonym(name) => {
                let synonym = self.resolve(&name)?;
                if synonym.kind != SynonymKind::Procedure {
                    return Err(QueryError::Semantic(format!(
                        "`{name}` is a {} synonym, {relation} needs a procedure",
                        synonym.kind.keyword()
                    )));
                }
                Ok(EntArg::Synonym(synonym))
            }
        }
    }

    /// First argument of Modifies/Uses. The two surface forms share one
    /// relation name, so the argument decides: numbers and statement
    /// synonyms select the statement form, quoted names and procedure
    /// synonyms the procedure form. A wildcard is ambiguous and rejected.
    fn subject(&self, relation: &str, arg: RawArg) -> Result<Subject, QueryError> {
        match arg {
            RawArg::Wildcard => Err(QueryError::Semantic(format!(
                "the first argument of {relation} cannot be `_`"
            ))),
            RawArg::Number(n) => Ok(Subject::Stmt(StmtArg::Number(n))),
            RawArg::Name(name) => Ok(Subject::Proc(EntArg::Name(name))),
            RawArg::Synonym(name) => {
                let synonym = self.resolve(&name)?;
                if synonym.kind.is_stmt() {
                    Ok(Subject::Stmt(StmtArg::Synonym(synonym)))
                } else if synonym.kind == SynonymKind::Procedure {
                    Ok(Subject::Proc(EntArg::Synonym(synonym)))
                } else {
                    Err(QueryError::Semantic(format!(
                        "`{name}` is a {} synonym, {relation} needs a statement or procedure",
                        synonym.kind.keyword()
                    )))
                }
            }
        }
    }

    fn var_arg(&self, relation: &str, arg: RawArg) -> Result<EntArg, QueryError> {
        match arg {
            RawArg::Wildcard => Ok(EntArg::Wildcard),
            RawArg::Name(name) => Ok(EntArg::Name(name)),
            RawArg::Number(n) => Err(QueryError::Semantic(format!(
                "{relation} takes a variable argument, `{n}` is a number"
            ))),
            RawArg::Synonym(name) => {
                let synonym = self.resolve(&name)?;
                if synonym.kind != SynonymKind::Variable {
                    return Err(QueryError::Semantic(format!(
                        "`{name}` is a {} synonym, {relation} needs a variable",
                        synonym.kind.keyword()
                    )));
                }
                Ok(EntArg::Synonym(synonym))
            }
        }
    }

    fn pattern(
        &self,
        name: &str,
        var: RawArg,
        specs: Vec<RawSpec>,
    ) -> Result<Pattern, QueryError> {
        let synonym = self.resolve(name)?;
        let var = self.var_arg("pattern", var)?;
        match synonym.kind {
            SynonymKind::Assign => {
                let [spec] = <[RawSpec; 1]>::try_from(specs).map_err(|_| {
                    QueryError::Semantic(format!(
                        "pattern on assign synonym `{name}` takes one expression spec"
                    ))
                })?;
                Ok(Pattern::Assign {
                    synonym,
                    var,
                    spec: match spec {
                        RawSpec::Any => ExprSpec::Any,
                        RawSpec::Exact(postfix) => ExprSpec::Exact(postfix),
                        RawSpec::Partial(postfix) => ExprSpec::Partial(postfix),
                    },
                })
            }
            SynonymKind::While => {
                if specs.as_slice() != [RawSpec::Any] {
                    return Err(QueryError::Semantic(format!(
                        "pattern on while synonym `{name}` takes a single `_`"
                    )));
                }
                Ok(Pattern::While { synonym, var })
            }
            SynonymKind::If => {
                if specs.as_slice() != [RawSpec::Any, RawSpec::Any] {
                    return Err(QueryError::Semantic(format!(
                        "pattern on if synonym `{name}` takes `_, _`"
                    )));
                }
                Ok(Pattern::If { synonym, var })
            }
            kind => Err(QueryError::Semantic(format!(
                "`{name}` is a {} synonym, pattern needs assign, while or if",
                kind.keyword()
            ))),
        }
    }

    fn with(&self, left: RawWithArg, right: RawWithArg) -> Result<ClauseKind, QueryError> {
        let left = self.with_value(left)?;
        let right = self.with_value(right)?;
        if left.is_name_valued() != right.is_name_valued() {
            return Err(QueryError::Semantic(
                "with compares a name against a number".to_string(),
            ));
        }
        Ok(ClauseKind::With { left, right })
    }

    fn with_value(&self, arg: RawWithArg) -> Result<WithValue, QueryError> {
        match arg {
            RawWithArg::Number(n) => Ok(WithValue::Number(n)),
            RawWithArg::Name(name) => Ok(WithValue::Name(name)),
            RawWithArg::Attr { synonym, attr } => {
                let synonym = self.resolve(&synonym)?;
                check_attr(&synonym, attr)?;
                Ok(WithValue::Attr { synonym, attr })
            }
            RawWithArg::Synonym(name) => {
                self.resolve(&name)?;
                Err(QueryError::Semantic(format!(
                    "bare synonym `{name}` in with, use an attribute like `{name}.stmt#`"
                )))
            }
        }
    }
}

fn stmt_rel_kind(name: &str) -> Option<StmtRelKind> {
    Some(match name {
        "Follows" => StmtRelKind::Follows,
        "Follows*" => StmtRelKind::FollowsStar,
        "Parent" => StmtRelKind::Parent,
        "Parent*" => StmtRelKind::ParentStar,
        "Next" => StmtRelKind::Next,
        "Next*" => StmtRelKind::NextStar,
        "Affects" => StmtRelKind::Affects,
        _ => return None,
    })
}

/// Which attributes each synonym kind carries.
fn check_attr(synonym: &Synonym, attr: AttrName) -> Result<(), QueryError> {
    let ok = match attr {
        AttrName::ProcName => matches!(
            synonym.kind,
            SynonymKind::Procedure | SynonymKind::Call
        ),
        AttrName::VarName => matches!(
            synonym.kind,
            SynonymKind::Variable | SynonymKind::Read | SynonymKind::Print
        ),
        AttrName::Value => synonym.kind == SynonymKind::Constant,
        AttrName::StmtNo => synonym.kind.is_stmt(),
    };
    if ok {
        Ok(())
    } else {
        Err(QueryError::Semantic(format!(
            "attribute `{}` does not apply to {} synonym `{}`",
            attr.keyword(),
            synonym.kind.keyword(),
            synonym.name
        )))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_query;

    fn typed(input: &str) -> Result<Query, QueryError> {
        analyze(parse_query(input).unwrap_or_else(|e| panic!("{input:?}: {e}")))
    }

    fn semantic(input: &str) -> QueryError {
        match typed(input) {
            Ok(q) => panic!("{input:?} should be a semantic error, got {q:?}"),
            Err(e) => {
                assert!(e.is_semantic(), "{input:?}: expected semantic, got {e:?}");
                e
            }
        }
    }

    #[test]
    fn synonyms_bind_to_their_declarations() {
        let q = typed("assign a; variable v; Select a such that Uses(a, v)").unwrap();
        match &q.clauses[0].kind {
            ClauseKind::SuchThat(Relation::Uses { subject, var }) => {
                assert_eq!(
                    *subject,
                    Subject::Stmt(StmtArg::Synonym(Synonym {
                        name: "a".into(),
                        kind: SynonymKind::Assign,
                    }))
                );
                assert_eq!(
                    *var,
                    EntArg::Synonym(Synonym {
                        name: "v".into(),
                        kind: SynonymKind::Variable,
                    })
                );
            }
            other => panic!("unexpected clause {other:?}"),
        }
    }

    #[test]
    fn duplicate_and_missing_declarations_are_rejected() {
        semantic("stmt s; assign s; Select s");
        semantic("stmt s; Select t");
        semantic("Select s such that Follows(s, 2)");
    }

    #[test]
    fn statement_relations_reject_names_and_entity_synonyms() {
        semantic(r#"stmt s; Select s such that Follows("main", s)"#);
        semantic("variable v; stmt s; Select s such that Parent(v, s)");
        semantic("procedure p; Select p such that Next*(p, 3)");
    }

    #[test]
    fn affects_accepts_any_statement_synonym() {
        // A print synonym can never affect anything, but the query is still
        // well-typed and simply evaluates empty.
        assert!(typed("print pn; Select pn such that Affects(pn, 3)").is_ok());
    }

    #[test]
    fn calls_takes_procedures_only() {
        assert!(typed(r#"procedure p, q; Select p such that Calls*(p, q)"#).is_ok());
        semantic("procedure p; stmt s; Select p such that Calls(p, s)");
        semantic("procedure p; Select p such that Calls(3, p)");
    }

    #[test]
    fn modifies_and_uses_split_into_statement_and_procedure_forms() {
        let q = typed(r#"variable v; Select v such that Modifies("main", v)"#).unwrap();
        match &q.clauses[0].kind {
            ClauseKind::SuchThat(Relation::Modifies { subject, .. }) => {
                assert_eq!(*subject, Subject::Proc(EntArg::Name("main".into())));
            }
            other => panic!("unexpected clause {other:?}"),
        }

        let q = typed("variable v; Select v such that Uses(7, v)").unwrap();
        match &q.clauses[0].kind {
            ClauseKind::SuchThat(Relation::Uses { subject, .. }) => {
                assert_eq!(*subject, Subject::Stmt(StmtArg::Number(7)));
            }
            other => panic!("unexpected clause {other:?}"),
        }

        semantic("variable v; Select v such that Modifies(_, v)");
        semantic("constant c; variable v; Select v such that Uses(c, v)");
        semantic("stmt s; Select s such that Modifies(s, 3)");
    }

    #[test]
    fn pattern_synonym_kind_fixes_the_spec_arity() {
        assert!(typed(r#"assign a; Select a pattern a(_, "x + 1")"#).is_ok());
        assert!(typed("while w; variable v; Select w pattern w(v, _)").is_ok());
        assert!(typed("if ifs; Select ifs pattern ifs(_, _, _)").is_ok());

        semantic("stmt s; Select s pattern s(_, _)");
        semantic("assign a; Select a pattern a(_, _, _)");
        semantic("while w; Select w pattern w(_, _, _)");
        semantic(r#"while w; Select w pattern w(_, "x")"#);
        semantic("if ifs; Select ifs pattern ifs(_, _)");
        semantic("assign a; Select a pattern a(3, _)");
    }

    #[test]
    fn with_operands_must_share_a_value_category() {
        assert!(typed(r#"procedure p; Select p with p.procName = "main""#).is_ok());
        assert!(typed("constant c; stmt s; Select s with c.value = s.stmt#").is_ok());

        semantic(r#"stmt s; Select s with s.stmt# = "main""#);
        semantic(r#"procedure p; Select p with p.procName = 3"#);
        semantic("stmt s; Select s with s = 3");
    }

    #[test]
    fn attributes_check_against_the_synonym_kind() {
        assert!(typed("call c; Select c.procName").is_ok());
        assert!(typed("read r; Select r.varName").is_ok());

        semantic("stmt s; Select s.procName");
        semantic("assign a; Select a.varName");
        semantic("variable v; Select v.value");
        semantic("procedure p; Select p.stmt#");
    }

    #[test]
    fn declared_boolean_shadows_the_marker() {
        let q = typed("stmt BOOLEAN; Select BOOLEAN").unwrap();
        match q.select {
            Select::Elems(elems) => assert_eq!(elems[0].synonym.name, "BOOLEAN"),
            Select::Boolean => panic!("BOOLEAN should resolve to the declared synonym"),
        }

        let q = typed("stmt s; Select BOOLEAN").unwrap();
        assert_eq!(q.select, Select::Boolean);
    }
}
