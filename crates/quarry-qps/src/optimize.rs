//! Query rewrites between analysis and evaluation.
//!
//! The pipeline is a fixed list of passes, each `Query -> Vec<Query>`:
//!
//! 1. split the clause list into groups connected by shared synonyms,
//! 2. drop exact duplicate clauses,
//! 3. drop clauses subsumed by a stricter clause of the same polarity,
//! 4. collapse a clause/negated-clause pair into a constant-false marker,
//! 5. stable-partition positive clauses ahead of negated ones.
//!
//! Every pass preserves the final projected result and is idempotent, so
//! the pipeline can be re-run on its own output without changing it. The
//! evaluator treats the resulting queries as a conjunction of independent
//! groups sharing one select list.

use crate::query::{Clause, ClauseKind, EntArg, ExprSpec, Pattern, Query, Relation, StmtArg};

/// Run the full rewrite pipeline.
pub fn pipeline(query: Query) -> Vec<Query> {
    let passes: [fn(Query) -> Vec<Query>; 5] = [
        split_into_groups,
        drop_redundant,
        drop_subsumed,
        detect_contradiction,
        prioritize,
    ];
    let mut queries = vec![query];
    for pass in passes {
        queries = queries.into_iter().flat_map(pass).collect();
    }
    queries
}

// ============================================================================
// Grouping
// ============================================================================

/// Split clauses into connected components over shared synonyms. Clauses
/// with no synonyms at all gate the whole result and join a single
/// boolean group. Groups keep clause order and appear in the order of
/// their first clause.
fn split_into_groups(query: Query) -> Vec<Query> {
    if query.clauses.len() <= 1 {
        return vec![query];
    }

    let n = query.clauses.len();
    let mut parent: Vec<usize> = (0..n).collect();

    // Union by synonym name: the first clause seen with a synonym owns it,
    // later clauses union into the owner's component.
    let mut owner: Vec<(&str, usize)> = Vec::new();
    let mut boolean_rep: Option<usize> = None;
    for (i, clause) in query.clauses.iter().enumerate() {
        let synonyms = clause.synonyms();
        if synonyms.is_empty() {
            match boolean_rep {
                Some(rep) => union(&mut parent, rep, i),
                None => boolean_rep = Some(i),
            }
            continue;
        }
        for synonym in synonyms {
            match owner.iter().find(|(name, _)| *name == synonym.name) {
                Some(&(_, rep)) => union(&mut parent, rep, i),
                None => owner.push((synonym.name.as_str(), i)),
            }
        }
    }

    let roots: Vec<usize> = (0..n).map(|i| find(&mut parent, i)).collect();

    let mut groups: Vec<(usize, Query)> = Vec::new();
    for (i, clause) in query.clauses.into_iter().enumerate() {
        match groups.iter_mut().find(|(root, _)| *root == roots[i]) {
            Some((_, group)) => group.clauses.push(clause),
            None => groups.push((
                roots[i],
                Query {
                    select: query.select.clone(),
                    clauses: vec![clause],
                },
            )),
        }
    }
    groups.into_iter().map(|(_, group)| group).collect()
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[rb] = ra;
    }
}

// ============================================================================
// Redundancy and subsumption
// ============================================================================

/// Drop clauses that are exact duplicates of an earlier one, negation
/// included.
fn drop_redundant(mut query: Query) -> Vec<Query> {
    let mut seen: Vec<Clause> = Vec::new();
    query.clauses.retain(|clause| {
        if seen.contains(clause) {
            false
        } else {
            seen.push(clause.clone());
            true
        }
    });
    vec![query]
}

/// Drop a clause implied by a stricter clause of the same polarity.
///
/// A positive `Follows(s, _)` adds nothing next to `Follows(s, 13)`: every
/// binding surviving the strict clause satisfies the loose one. For negated
/// clauses the implication runs the other way, so the loose clause wins:
/// `not Follows(s, _)` implies `not Follows(s, 13)`.
fn drop_subsumed(mut query: Query) -> Vec<Query> {
    let clauses = query.clauses.clone();
    query.clauses.retain(|a| {
        !clauses.iter().any(|b| {
            a != b
                && a.negated == b.negated
                && if a.negated {
                    more_general(&b.kind, &a.kind)
                } else {
                    more_general(&a.kind, &b.kind)
                }
        })
    });
    vec![query]
}

/// Pointwise comparison: `a` is more general than `b` when every argument
/// is either equal or a wildcard on `a`'s side. Equal clauses are excluded
/// by the caller.
fn more_general(a: &ClauseKind, b: &ClauseKind) -> bool {
    match (a, b) {
        (ClauseKind::SuchThat(ra), ClauseKind::SuchThat(rb)) => match (ra, rb) {
            (
                Relation::Stmt { kind: ka, left: la, right: rga },
                Relation::Stmt { kind: kb, left: lb, right: rgb },
            ) => ka == kb && stmt_cede(la, lb) && stmt_cede(rga, rgb),
            (
                Relation::Calls { transitive: ta, left: la, right: rga },
                Relation::Calls { transitive: tb, left: lb, right: rgb },
            ) => ta == tb && ent_cede(la, lb) && ent_cede(rga, rgb),
            (
                Relation::Modifies { subject: sa, var: va },
                Relation::Modifies { subject: sb, var: vb },
            )
            | (
                Relation::Uses { subject: sa, var: va },
                Relation::Uses { subject: sb, var: vb },
            ) => sa == sb && ent_cede(va, vb),
            _ => false,
        },
        (ClauseKind::Pattern(pa), ClauseKind::Pattern(pb)) => match (pa, pb) {
            (
                Pattern::Assign { synonym: na, var: va, spec: ea },
                Pattern::Assign { synonym: nb, var: vb, spec: eb },
            ) => na == nb && ent_cede(va, vb) && (ea == eb || *ea == ExprSpec::Any),
            (
                Pattern::While { synonym: na, var: va },
                Pattern::While { synonym: nb, var: vb },
            )
            | (
                Pattern::If { synonym: na, var: va },
                Pattern::If { synonym: nb, var: vb },
            ) => na == nb && ent_cede(va, vb),
            _ => false,
        },
        // `with` has no wildcard form, so only exact duplicates arise and
        // the redundancy pass already took them.
        _ => false,
    }
}

fn stmt_cede(a: &StmtArg, b: &StmtArg) -> bool {
    a == b || a.is_wildcard()
}

fn ent_cede(a: &EntArg, b: &EntArg) -> bool {
    a == b || a.is_wildcard()
}

// ============================================================================
// Contradiction and ordering
// ============================================================================

/// A clause alongside its own negation can never hold; the whole group
/// collapses to a constant-false marker.
fn detect_contradiction(mut query: Query) -> Vec<Query> {
    let contradicts = query.clauses.iter().any(|a| {
        query
            .clauses
            .iter()
            .any(|b| a.kind == b.kind && a.negated != b.negated)
    });
    if contradicts {
        query.clauses = vec![Clause {
            negated: false,
            kind: ClauseKind::Contradiction,
        }];
    }
    vec![query]
}

/// Evaluate positive clauses first: negation needs the positive row set
/// anyway, and a failed positive clause short-circuits the group.
fn prioritize(mut query: Query) -> Vec<Query> {
    let (positive, negated): (Vec<_>, Vec<_>) =
        query.clauses.into_iter().partition(|clause| !clause.negated);
    query.clauses = positive;
    query.clauses.extend(negated);
    vec![query]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::parser::parse_query;

    fn groups(input: &str) -> Vec<Query> {
        pipeline(analyze(parse_query(input).unwrap()).unwrap())
    }

    #[test]
    fn clauses_group_by_shared_synonyms() {
        let out = groups(
            "stmt s, t; assign a; variable v;
             Select s such that Follows(s, t) and Parent(1, a) and Follows*(t, 3) \
             pattern a(v, _)",
        );
        assert_eq!(out.len(), 2);
        // s-t chain first, then the a-v chain, each keeping clause order.
        assert_eq!(out[0].clauses.len(), 2);
        assert_eq!(out[1].clauses.len(), 2);
    }

    #[test]
    fn synonym_free_clauses_share_one_boolean_group() {
        let out = groups(
            "stmt s; Select s such that Follows(1, 2) and Next(3, 4) and Parent(1, s)",
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].clauses.len(), 2);
        assert!(out[0].clauses.iter().all(|c| c.synonyms().is_empty()));
        assert_eq!(out[1].clauses.len(), 1);
    }

    #[test]
    fn duplicate_clauses_collapse() {
        let out = groups("stmt s; Select s such that Follows(s, 2) and Follows(s, 2)");
        assert_eq!(out[0].clauses.len(), 1);
    }

    #[test]
    fn wildcard_clauses_yield_to_strict_ones() {
        let out = groups("stmt s; Select s such that Follows(s, _) and Follows(s, 13)");
        assert_eq!(out[0].clauses.len(), 1);
        match &out[0].clauses[0].kind {
            ClauseKind::SuchThat(Relation::Stmt { right, .. }) => {
                assert_eq!(*right, StmtArg::Number(13));
            }
            other => panic!("unexpected clause {other:?}"),
        }

        // Negated polarity keeps the loose clause instead.
        let out = groups("stmt s; Select s such that not Follows(s, _) and not Follows(s, 13)");
        assert_eq!(out[0].clauses.len(), 1);
        match &out[0].clauses[0].kind {
            ClauseKind::SuchThat(Relation::Stmt { right, .. }) => {
                assert_eq!(*right, StmtArg::Wildcard);
            }
            other => panic!("unexpected clause {other:?}"),
        }
    }

    #[test]
    fn opposite_polarity_pair_becomes_a_contradiction() {
        let out = groups("stmt s; Select s such that Follows(s, 2) and not Follows(s, 2)");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].clauses.len(), 1);
        assert_eq!(out[0].clauses[0].kind, ClauseKind::Contradiction);
    }

    #[test]
    fn positive_clauses_run_before_negated_ones() {
        let out = groups(
            "stmt s; Select s such that not Follows(s, 2) and Parent(1, s) and not Next(2, s)",
        );
        let negs: Vec<bool> = out[0].clauses.iter().map(|c| c.negated).collect();
        assert_eq!(negs, vec![false, true, true]);
    }

    #[test]
    fn pattern_wildcards_are_subsumed_too() {
        let out = groups(r#"assign a; Select a pattern a(_, _) and a("x", _"y"_)"#);
        assert_eq!(out[0].clauses.len(), 1);
        match &out[0].clauses[0].kind {
            ClauseKind::Pattern(Pattern::Assign { var, spec, .. }) => {
                assert_eq!(*var, EntArg::Name("x".into()));
                assert_eq!(*spec, ExprSpec::Partial("y".into()));
            }
            other => panic!("unexpected clause {other:?}"),
        }
    }

    #[test]
    fn pipeline_is_idempotent() {
        let inputs = [
            "stmt s, t; Select s such that Follows(s, t) and not Next(t, s)",
            "stmt s; Select s such that Follows(1, 2) and Follows(s, _) and Follows(s, 13)",
            "assign a; variable v; Select a pattern a(v, _) and not a(v, _)",
            "stmt s; Select BOOLEAN",
        ];
        for input in inputs {
            let once = groups(input);
            let twice: Vec<Query> = once.clone().into_iter().flat_map(pipeline).collect();
            assert_eq!(once, twice, "pipeline not idempotent for {input:?}");
        }
    }
}
