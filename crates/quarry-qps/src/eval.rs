//! Clause evaluation against the knowledge base, group joining and final
//! projection.
//!
//! Each clause is classified by the shape of its arguments and dispatched
//! to a rule producing an [`EvalOutcome`]: `Unit` for a synonym-free clause
//! that holds, otherwise a [`Table`] of satisfying bindings. The seven
//! statement-to-statement relations all read through the same store shape,
//! so one dispatcher covers Follows, Parent, Next, their closures and
//! Affects.
//!
//! A negated clause is evaluated closed-world: the positive rows are
//! subtracted from the cross product of the mentioned synonyms' domains.
//!
//! Groups produced by the optimizer are independent: their tables share no
//! columns. A group with an empty table falsifies the whole query;
//! otherwise tables carrying selected synonyms are cross-joined, synonyms
//! the clauses never constrained are filled from their full domains, and
//! the select list is rendered row by row with first-seen deduplication.

use ahash::{AHashMap, AHashSet};

use quarry_pkb::{NameId, OneToManyStore, ReadFacade, StmtNo, StmtType};
use quarry_simple::contains_subexpr;

use crate::query::{
    AttrName, Clause, ClauseKind, Elem, EntArg, ExprSpec, Pattern, Query, Relation, Select,
    StmtArg, StmtRelKind, Subject, Synonym, SynonymKind, WithValue,
};
use crate::table::{Cell, EvalOutcome, Table};

/// Evaluate optimizer output (one or more clause groups sharing a select
/// list) and render the projected results.
pub fn evaluate(read: &ReadFacade<'_>, queries: &[Query]) -> Vec<String> {
    let Some(first) = queries.first() else {
        return Vec::new();
    };
    let select = &first.select;

    let mut tables: Vec<Table> = Vec::new();
    for query in queries {
        match eval_group(read, &query.clauses) {
            None => {
                return match select {
                    Select::Boolean => vec!["FALSE".to_string()],
                    Select::Elems(_) => Vec::new(),
                };
            }
            Some(EvalOutcome::Unit) => {}
            Some(EvalOutcome::Rows(table)) => tables.push(table),
        }
    }

    let elems = match select {
        Select::Boolean => return vec!["TRUE".to_string()],
        Select::Elems(elems) => elems,
    };

    // Only group tables carrying a selected synonym shape the output; the
    // rest already proved themselves nonempty. Groups are synonym-disjoint,
    // so joining them degenerates to cross products.
    let mut combined: Option<Table> = None;
    for table in tables {
        if elems
            .iter()
            .any(|e| table.col_index(&e.synonym.name).is_some())
        {
            combined = Some(match combined {
                None => table,
                Some(done) => done.join(table),
            });
        }
    }
    for elem in elems {
        let present = combined
            .as_ref()
            .is_some_and(|c| c.col_index(&elem.synonym.name).is_some());
        if !present {
            let domain = domain_table(read, &elem.synonym);
            combined = Some(match combined {
                None => domain,
                Some(done) => done.join(domain),
            });
        }
    }
    let Some(combined) = combined else {
        return Vec::new();
    };
    tracing::debug!(
        rows = combined.rows().len(),
        cols = combined.cols().len(),
        "projecting result table"
    );

    let indices: Vec<usize> = elems
        .iter()
        .filter_map(|e| combined.col_index(&e.synonym.name))
        .collect();
    let mut seen = AHashSet::new();
    let mut out = Vec::new();
    for row in combined.rows() {
        let text = elems
            .iter()
            .zip(&indices)
            .map(|(elem, &i)| render_elem(read, elem, row[i]))
            .collect::<Vec<_>>()
            .join(" ");
        if seen.insert(text.clone()) {
            out.push(text);
        }
    }
    out
}

/// Join one group's clause tables. `None` means the group fails; `Unit`
/// means it holds without binding anything.
fn eval_group(read: &ReadFacade<'_>, clauses: &[Clause]) -> Option<EvalOutcome> {
    let mut acc: Option<Table> = None;
    for clause in clauses {
        match eval_clause(read, clause) {
            EvalOutcome::Unit => {}
            EvalOutcome::Rows(table) => {
                if table.is_empty() {
                    return None;
                }
                let joined = match acc {
                    None => table,
                    Some(done) => done.join(table),
                };
                if joined.is_empty() {
                    return None;
                }
                acc = Some(joined);
            }
        }
    }
    Some(match acc {
        None => EvalOutcome::Unit,
        Some(table) => EvalOutcome::Rows(table),
    })
}

fn eval_clause(read: &ReadFacade<'_>, clause: &Clause) -> EvalOutcome {
    let positive = eval_kind(read, &clause.kind);
    if !clause.negated {
        return positive;
    }

    let synonyms = clause.synonyms();
    if synonyms.is_empty() {
        let held = matches!(positive, EvalOutcome::Unit);
        return EvalOutcome::truth(!held);
    }

    // Closed world: full domain cross product minus the positive rows.
    let mut domain = domain_table(read, synonyms[0]);
    for &synonym in &synonyms[1..] {
        domain = domain.join(domain_table(read, synonym));
    }
    let positive_rows = match positive {
        EvalOutcome::Rows(table) => reordered_row_set(domain.cols(), &table),
        EvalOutcome::Unit => AHashSet::new(),
    };
    let mut out = Table::new(domain.cols().to_vec());
    for row in domain.rows() {
        if !positive_rows.contains(row) {
            out.push_row(row.clone());
        }
    }
    EvalOutcome::Rows(out)
}

/// Rows of `table` rearranged into `cols` order, as a set.
fn reordered_row_set(cols: &[String], table: &Table) -> AHashSet<Vec<Cell>> {
    let map: Vec<usize> = cols
        .iter()
        .filter_map(|col| table.col_index(col))
        .collect();
    table
        .rows()
        .iter()
        .map(|row| map.iter().map(|&i| row[i]).collect())
        .collect()
}

fn eval_kind(read: &ReadFacade<'_>, kind: &ClauseKind) -> EvalOutcome {
    match kind {
        ClauseKind::SuchThat(rel) => eval_relation(read, rel),
        ClauseKind::Pattern(pat) => eval_pattern(read, pat),
        ClauseKind::With { left, right } => eval_with(read, left, right),
        ClauseKind::Contradiction => EvalOutcome::truth(false),
    }
}

// ============================================================================
// Statement-to-statement relations
// ============================================================================

fn eval_relation(read: &ReadFacade<'_>, rel: &Relation) -> EvalOutcome {
    match rel {
        Relation::Stmt { kind, left, right } => {
            eval_stmt_pair(read, stmt_store(read, *kind), left, right)
        }
        Relation::Calls {
            transitive,
            left,
            right,
        } => {
            let store = if *transitive {
                read.calls().rel().star()
            } else {
                read.calls().rel().base()
            };
            eval_proc_pair(read, store, left, right)
        }
        Relation::Modifies { subject, var } => match subject {
            Subject::Stmt(stmt) => eval_stmt_var(read, read.modifies().stmts(), stmt, var),
            Subject::Proc(proc) => eval_proc_var(read, read.modifies().procs(), proc, var),
        },
        Relation::Uses { subject, var } => match subject {
            Subject::Stmt(stmt) => eval_stmt_var(read, read.uses().stmts(), stmt, var),
            Subject::Proc(proc) => eval_proc_var(read, read.uses().procs(), proc, var),
        },
    }
}

/// All seven statement relations answer through the same dual-indexed
/// store, base or closed.
fn stmt_store<'a>(
    read: &ReadFacade<'a>,
    kind: StmtRelKind,
) -> &'a OneToManyStore<StmtNo, StmtNo> {
    match kind {
        StmtRelKind::Follows => read.follows().rel().base(),
        StmtRelKind::FollowsStar => read.follows().rel().star(),
        StmtRelKind::Parent => read.parent().rel().base(),
        StmtRelKind::ParentStar => read.parent().rel().star(),
        StmtRelKind::Next => read.next().rel().base(),
        StmtRelKind::NextStar => read.next().rel().star(),
        StmtRelKind::Affects => read.affects().pairs(),
    }
}

fn eval_stmt_pair(
    read: &ReadFacade<'_>,
    store: &OneToManyStore<StmtNo, StmtNo>,
    left: &StmtArg,
    right: &StmtArg,
) -> EvalOutcome {
    match (left, right) {
        (StmtArg::Number(a), StmtArg::Number(b)) => EvalOutcome::truth(store.contains(*a, *b)),
        (StmtArg::Number(a), StmtArg::Wildcard) => EvalOutcome::truth(store.contains_key(*a)),
        (StmtArg::Wildcard, StmtArg::Number(b)) => EvalOutcome::truth(store.contains_value(*b)),
        (StmtArg::Wildcard, StmtArg::Wildcard) => EvalOutcome::truth(!store.is_empty()),
        (StmtArg::Number(a), StmtArg::Synonym(s)) => {
            single_col(s, store.values_of(*a).filter(|&n| kind_admits(read, s.kind, n)))
        }
        (StmtArg::Synonym(s), StmtArg::Number(b)) => {
            single_col(s, store.keys_of(*b).filter(|&n| kind_admits(read, s.kind, n)))
        }
        (StmtArg::Wildcard, StmtArg::Synonym(s)) => {
            single_col(s, store.values().filter(|&n| kind_admits(read, s.kind, n)))
        }
        (StmtArg::Synonym(s), StmtArg::Wildcard) => {
            single_col(s, store.keys().filter(|&n| kind_admits(read, s.kind, n)))
        }
        (StmtArg::Synonym(a), StmtArg::Synonym(b)) if a.name == b.name => {
            // Same synonym twice: only reflexive pairs qualify, which exist
            // for Next* inside loops and nowhere else.
            single_col(
                a,
                store
                    .pairs()
                    .filter(|&(k, v)| k == v && kind_admits(read, a.kind, k))
                    .map(|(k, _)| k),
            )
        }
        (StmtArg::Synonym(a), StmtArg::Synonym(b)) => {
            let mut table = Table::new(vec![a.name.clone(), b.name.clone()]);
            for (k, v) in store.pairs() {
                if kind_admits(read, a.kind, k) && kind_admits(read, b.kind, v) {
                    table.push_row(vec![k, v]);
                }
            }
            EvalOutcome::Rows(table)
        }
    }
}

// ============================================================================
// Calls
// ============================================================================

fn eval_proc_pair(
    read: &ReadFacade<'_>,
    store: &OneToManyStore<NameId, NameId>,
    left: &EntArg,
    right: &EntArg,
) -> EvalOutcome {
    let id = |name: &str| read.id_of(name);
    match (left, right) {
        (EntArg::Name(a), EntArg::Name(b)) => EvalOutcome::truth(match (id(a), id(b)) {
            (Some(x), Some(y)) => store.contains(x, y),
            _ => false,
        }),
        (EntArg::Name(a), EntArg::Wildcard) => {
            EvalOutcome::truth(id(a).is_some_and(|x| store.contains_key(x)))
        }
        (EntArg::Wildcard, EntArg::Name(b)) => {
            EvalOutcome::truth(id(b).is_some_and(|y| store.contains_value(y)))
        }
        (EntArg::Wildcard, EntArg::Wildcard) => EvalOutcome::truth(!store.is_empty()),
        (EntArg::Name(a), EntArg::Synonym(s)) => match id(a) {
            Some(x) => single_col(s, store.values_of(x).map(NameId::raw)),
            None => single_col(s, std::iter::empty()),
        },
        (EntArg::Synonym(s), EntArg::Name(b)) => match id(b) {
            Some(y) => single_col(s, store.keys_of(y).map(NameId::raw)),
            None => single_col(s, std::iter::empty()),
        },
        (EntArg::Wildcard, EntArg::Synonym(s)) => single_col(s, store.values().map(NameId::raw)),
        (EntArg::Synonym(s), EntArg::Wildcard) => single_col(s, store.keys().map(NameId::raw)),
        (EntArg::Synonym(a), EntArg::Synonym(b)) if a.name == b.name => {
            // Calls(p, p) would be direct recursion, rejected at build time.
            single_col(
                a,
                store
                    .pairs()
                    .filter(|(k, v)| k == v)
                    .map(|(k, _)| k.raw()),
            )
        }
        (EntArg::Synonym(a), EntArg::Synonym(b)) => {
            let mut table = Table::new(vec![a.name.clone(), b.name.clone()]);
            for (k, v) in store.pairs() {
                table.push_row(vec![k.raw(), v.raw()]);
            }
            EvalOutcome::Rows(table)
        }
    }
}

// ============================================================================
// Modifies and Uses
// ============================================================================

fn eval_stmt_var(
    read: &ReadFacade<'_>,
    store: &OneToManyStore<StmtNo, NameId>,
    subject: &StmtArg,
    var: &EntArg,
) -> EvalOutcome {
    match (subject, var) {
        (StmtArg::Number(n), EntArg::Wildcard) => EvalOutcome::truth(store.contains_key(*n)),
        (StmtArg::Number(n), EntArg::Name(name)) => EvalOutcome::truth(
            read.id_of(name)
                .is_some_and(|v| store.contains(*n, v)),
        ),
        (StmtArg::Number(n), EntArg::Synonym(s)) => {
            single_col(s, store.values_of(*n).map(NameId::raw))
        }
        (StmtArg::Synonym(s), EntArg::Wildcard) => {
            single_col(s, store.keys().filter(|&n| kind_admits(read, s.kind, n)))
        }
        (StmtArg::Synonym(s), EntArg::Name(name)) => match read.id_of(name) {
            Some(v) => single_col(s, store.keys_of(v).filter(|&n| kind_admits(read, s.kind, n))),
            None => single_col(s, std::iter::empty()),
        },
        (StmtArg::Synonym(s), EntArg::Synonym(v)) => {
            let mut table = Table::new(vec![s.name.clone(), v.name.clone()]);
            for (n, var_id) in store.pairs() {
                if kind_admits(read, s.kind, n) {
                    table.push_row(vec![n, var_id.raw()]);
                }
            }
            EvalOutcome::Rows(table)
        }
        // A wildcard subject never reaches evaluation.
        (StmtArg::Wildcard, _) => EvalOutcome::truth(false),
    }
}

fn eval_proc_var(
    read: &ReadFacade<'_>,
    store: &OneToManyStore<NameId, NameId>,
    subject: &EntArg,
    var: &EntArg,
) -> EvalOutcome {
    let id = |name: &str| read.id_of(name);
    match (subject, var) {
        (EntArg::Name(p), EntArg::Wildcard) => {
            EvalOutcome::truth(id(p).is_some_and(|x| store.contains_key(x)))
        }
        (EntArg::Name(p), EntArg::Name(v)) => EvalOutcome::truth(match (id(p), id(v)) {
            (Some(x), Some(y)) => store.contains(x, y),
            _ => false,
        }),
        (EntArg::Name(p), EntArg::Synonym(s)) => match id(p) {
            Some(x) => single_col(s, store.values_of(x).map(NameId::raw)),
            None => single_col(s, std::iter::empty()),
        },
        (EntArg::Synonym(s), EntArg::Wildcard) => single_col(s, store.keys().map(NameId::raw)),
        (EntArg::Synonym(s), EntArg::Name(v)) => match id(v) {
            Some(y) => single_col(s, store.keys_of(y).map(NameId::raw)),
            None => single_col(s, std::iter::empty()),
        },
        (EntArg::Synonym(s), EntArg::Synonym(v)) => {
            let mut table = Table::new(vec![s.name.clone(), v.name.clone()]);
            for (p, var_id) in store.pairs() {
                table.push_row(vec![p.raw(), var_id.raw()]);
            }
            EvalOutcome::Rows(table)
        }
        (EntArg::Wildcard, _) => EvalOutcome::truth(false),
    }
}

// ============================================================================
// Patterns
// ============================================================================

fn eval_pattern(read: &ReadFacade<'_>, pat: &Pattern) -> EvalOutcome {
    match pat {
        Pattern::Assign { synonym, var, spec } => match var {
            EntArg::Wildcard => single_col(
                synonym,
                read.patterns()
                    .assigns()
                    .filter(|(_, row)| spec_matches(spec, &row.postfix))
                    .map(|(s, _)| s),
            ),
            EntArg::Name(name) => match read.id_of(name) {
                Some(lhs) => single_col(
                    synonym,
                    read.patterns()
                        .assigns()
                        .filter(|(_, row)| row.lhs == lhs && spec_matches(spec, &row.postfix))
                        .map(|(s, _)| s),
                ),
                None => single_col(synonym, std::iter::empty()),
            },
            EntArg::Synonym(v) => {
                let mut table = Table::new(vec![synonym.name.clone(), v.name.clone()]);
                for (s, row) in read.patterns().assigns() {
                    if spec_matches(spec, &row.postfix) {
                        table.push_row(vec![s, row.lhs.raw()]);
                    }
                }
                EvalOutcome::Rows(table)
            }
        },
        Pattern::While { synonym, var } => {
            eval_control(read, read.patterns().while_vars(), synonym, var)
        }
        Pattern::If { synonym, var } => eval_control(read, read.patterns().if_vars(), synonym, var),
    }
}

fn spec_matches(spec: &ExprSpec, postfix: &str) -> bool {
    match spec {
        ExprSpec::Any => true,
        ExprSpec::Exact(wanted) => postfix == wanted,
        ExprSpec::Partial(wanted) => contains_subexpr(postfix, wanted),
    }
}

/// While/if patterns over the container's condition variables. A wildcard
/// variable matches any container that tests at least one variable.
fn eval_control(
    read: &ReadFacade<'_>,
    store: &OneToManyStore<StmtNo, NameId>,
    synonym: &Synonym,
    var: &EntArg,
) -> EvalOutcome {
    match var {
        EntArg::Wildcard => single_col(synonym, store.keys()),
        EntArg::Name(name) => match read.id_of(name) {
            Some(v) => single_col(synonym, store.keys_of(v)),
            None => single_col(synonym, std::iter::empty()),
        },
        EntArg::Synonym(v) => {
            let mut table = Table::new(vec![synonym.name.clone(), v.name.clone()]);
            for (s, var_id) in store.pairs() {
                table.push_row(vec![s, var_id.raw()]);
            }
            EvalOutcome::Rows(table)
        }
    }
}

// ============================================================================
// with
// ============================================================================

fn eval_with(read: &ReadFacade<'_>, left: &WithValue, right: &WithValue) -> EvalOutcome {
    match (left, right) {
        (WithValue::Number(a), WithValue::Number(b)) => EvalOutcome::truth(a == b),
        (WithValue::Name(a), WithValue::Name(b)) => EvalOutcome::truth(a == b),
        (WithValue::Attr { synonym, attr }, WithValue::Number(n))
        | (WithValue::Number(n), WithValue::Attr { synonym, attr }) => {
            attr_filter(read, synonym, *attr, &n.to_string())
        }
        (WithValue::Attr { synonym, attr }, WithValue::Name(name))
        | (WithValue::Name(name), WithValue::Attr { synonym, attr }) => {
            attr_filter(read, synonym, *attr, name)
        }
        (
            WithValue::Attr { synonym: a, attr: aa },
            WithValue::Attr { synonym: b, attr: ba },
        ) => attr_join(read, a, *aa, b, *ba),
        // Name against number is rejected by analysis.
        _ => EvalOutcome::truth(false),
    }
}

/// Bindings of `synonym` whose attribute renders as `wanted`.
fn attr_filter(
    read: &ReadFacade<'_>,
    synonym: &Synonym,
    attr: AttrName,
    wanted: &str,
) -> EvalOutcome {
    single_col(
        synonym,
        domain_cells(read, synonym.kind)
            .into_iter()
            .filter(|&cell| {
                attr_text(read, synonym.kind, attr, cell).as_deref() == Some(wanted)
            }),
    )
}

/// Attribute-to-attribute comparison, grouped by rendered value so two
/// full domains never pair up quadratically.
fn attr_join(
    read: &ReadFacade<'_>,
    a: &Synonym,
    a_attr: AttrName,
    b: &Synonym,
    b_attr: AttrName,
) -> EvalOutcome {
    if a.name == b.name {
        // Same synonym on both sides means the same attribute on both
        // sides, which holds for every instance.
        return single_col(a, domain_cells(read, a.kind).into_iter());
    }

    let mut by_text: AHashMap<String, Vec<Cell>> = AHashMap::new();
    for cell in domain_cells(read, b.kind) {
        if let Some(text) = attr_text(read, b.kind, b_attr, cell) {
            by_text.entry(text).or_default().push(cell);
        }
    }
    let mut table = Table::new(vec![a.name.clone(), b.name.clone()]);
    for cell in domain_cells(read, a.kind) {
        if let Some(text) = attr_text(read, a.kind, a_attr, cell) {
            if let Some(partners) = by_text.get(&text) {
                for &partner in partners {
                    table.push_row(vec![cell, partner]);
                }
            }
        }
    }
    EvalOutcome::Rows(table)
}

// ============================================================================
// Domains, attributes, rendering
// ============================================================================

fn single_col(synonym: &Synonym, cells: impl Iterator<Item = Cell>) -> EvalOutcome {
    let mut table = Table::new(vec![synonym.name.clone()]);
    for cell in cells {
        table.push_row(vec![cell]);
    }
    EvalOutcome::Rows(table)
}

fn stmt_type_of(kind: SynonymKind) -> Option<StmtType> {
    match kind {
        SynonymKind::Read => Some(StmtType::Read),
        SynonymKind::Print => Some(StmtType::Print),
        SynonymKind::Call => Some(StmtType::Call),
        SynonymKind::While => Some(StmtType::While),
        SynonymKind::If => Some(StmtType::If),
        SynonymKind::Assign => Some(StmtType::Assign),
        SynonymKind::Stmt | SynonymKind::Variable | SynonymKind::Constant | SynonymKind::Procedure => {
            None
        }
    }
}

/// Whether statement `n` can bind a synonym of statement kind `kind`.
fn kind_admits(read: &ReadFacade<'_>, kind: SynonymKind, n: StmtNo) -> bool {
    match stmt_type_of(kind) {
        None => read.entities().is_stmt(n),
        Some(ty) => read.entities().stmt_type(n) == Some(ty),
    }
}

/// Every value a synonym of this kind can take.
fn domain_cells(read: &ReadFacade<'_>, kind: SynonymKind) -> Vec<Cell> {
    match kind {
        SynonymKind::Stmt => (1..=read.entities().stmt_count()).collect(),
        SynonymKind::Variable => read.entities().variables().iter().collect(),
        SynonymKind::Constant => read.entities().constants().iter().collect(),
        SynonymKind::Procedure => read.entities().procedures().iter().collect(),
        _ => match stmt_type_of(kind) {
            Some(ty) => read.entities().of_type(ty).iter().collect(),
            None => Vec::new(),
        },
    }
}

fn domain_table(read: &ReadFacade<'_>, synonym: &Synonym) -> Table {
    let mut table = Table::new(vec![synonym.name.clone()]);
    for cell in domain_cells(read, synonym.kind) {
        table.push_row(vec![cell]);
    }
    table
}

/// Render one attribute of one binding. `None` when the attribute does not
/// apply, which analysis rules out for well-typed queries.
fn attr_text(
    read: &ReadFacade<'_>,
    kind: SynonymKind,
    attr: AttrName,
    cell: Cell,
) -> Option<String> {
    match attr {
        AttrName::StmtNo => Some(cell.to_string()),
        AttrName::Value => read.name_of(NameId::new(cell)),
        AttrName::ProcName => match kind {
            SynonymKind::Procedure => read.name_of(NameId::new(cell)),
            SynonymKind::Call => read
                .entities()
                .attr_of(cell)
                .and_then(|callee| read.name_of(callee)),
            _ => None,
        },
        AttrName::VarName => match kind {
            SynonymKind::Variable => read.name_of(NameId::new(cell)),
            SynonymKind::Read | SynonymKind::Print => read
                .entities()
                .attr_of(cell)
                .and_then(|var| read.name_of(var)),
            _ => None,
        },
    }
}

/// Render a select-list element for one row.
fn render_elem(read: &ReadFacade<'_>, elem: &Elem, cell: Cell) -> String {
    match elem.attr {
        Some(attr) => attr_text(read, elem.synonym.kind, attr, cell).unwrap_or_default(),
        None => match elem.synonym.kind {
            SynonymKind::Variable | SynonymKind::Constant | SynonymKind::Procedure => {
                read.name_of(NameId::new(cell)).unwrap_or_default()
            }
            _ => cell.to_string(),
        },
    }
}
