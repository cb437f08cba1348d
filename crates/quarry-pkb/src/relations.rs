//! Typed relation stores, one per program-fact relation.
//!
//! Each store is a thin wrapper over [`StarredRelation`] or
//! [`OneToManyStore`] with mutation restricted to the population pass;
//! everything the evaluator touches is read-only.

use std::collections::BTreeMap;

use crate::store::{OneToManyStore, StarredRelation};
use crate::NameId;
use quarry_simple::StmtNo;

// ============================================================================
// Statement ordering and nesting
// ============================================================================

/// `Follows(s1, s2)`: s2 immediately succeeds s1 in the same statement list.
/// Each statement has at most one follower and one predecessor; the starred
/// side is closed once after population.
#[derive(Debug, Clone, Default)]
pub struct FollowsStore {
    rel: StarredRelation<StmtNo>,
}

impl FollowsStore {
    pub(crate) fn add(&mut self, before: StmtNo, after: StmtNo) {
        self.rel.add(before, after);
    }

    pub(crate) fn close(&mut self) {
        self.rel.close_transitive_desc();
    }

    pub fn follows(&self, before: StmtNo, after: StmtNo) -> bool {
        self.rel.has(before, after)
    }

    pub fn follows_star(&self, before: StmtNo, after: StmtNo) -> bool {
        self.rel.has_star(before, after)
    }

    pub fn rel(&self) -> &StarredRelation<StmtNo> {
        &self.rel
    }
}

/// `Parent(s1, s2)`: container s1 directly holds s2 in one of its branches.
/// Only while and if statements appear as keys.
#[derive(Debug, Clone, Default)]
pub struct ParentStore {
    rel: StarredRelation<StmtNo>,
}

impl ParentStore {
    pub(crate) fn add(&mut self, parent: StmtNo, child: StmtNo) {
        self.rel.add(parent, child);
    }

    pub(crate) fn close(&mut self) {
        self.rel.close_transitive_desc();
    }

    pub fn parent(&self, parent: StmtNo, child: StmtNo) -> bool {
        self.rel.has(parent, child)
    }

    pub fn parent_star(&self, ancestor: StmtNo, descendant: StmtNo) -> bool {
        self.rel.has_star(ancestor, descendant)
    }

    /// Direct children of a container statement.
    pub fn children_of(&self, parent: StmtNo) -> impl Iterator<Item = StmtNo> + '_ {
        self.rel.base().values_of(parent)
    }

    /// All statements nested anywhere below a container statement.
    pub fn descendants_of(&self, ancestor: StmtNo) -> impl Iterator<Item = StmtNo> + '_ {
        self.rel.star().values_of(ancestor)
    }

    pub fn rel(&self) -> &StarredRelation<StmtNo> {
        &self.rel
    }
}

// ============================================================================
// Call graph
// ============================================================================

/// `Calls(p, q)`: procedure p contains a call statement targeting q. The
/// starred side is closed along the validated topological order, so cyclic
/// graphs never reach it.
#[derive(Debug, Clone, Default)]
pub struct CallsStore {
    rel: StarredRelation<NameId>,
}

impl CallsStore {
    pub(crate) fn add(&mut self, caller: NameId, callee: NameId) {
        self.rel.add(caller, callee);
    }

    pub(crate) fn close_in(&mut self, callees_first: impl IntoIterator<Item = NameId>) {
        self.rel.close_transitive_in(callees_first);
    }

    pub fn calls(&self, caller: NameId, callee: NameId) -> bool {
        self.rel.has(caller, callee)
    }

    pub fn calls_star(&self, caller: NameId, callee: NameId) -> bool {
        self.rel.has_star(caller, callee)
    }

    pub fn callees_of(&self, caller: NameId) -> impl Iterator<Item = NameId> + '_ {
        self.rel.base().values_of(caller)
    }

    pub fn rel(&self) -> &StarredRelation<NameId> {
        &self.rel
    }
}

// ============================================================================
// Control flow
// ============================================================================

/// `Next(s1, s2)`: control-flow successor within one procedure, including
/// loop-back and branch edges. The starred side is filled from CFG
/// reachability rather than the ordered closure, since loops make it cyclic
/// (`Next*(s, s)` holds for any statement on a loop path).
#[derive(Debug, Clone, Default)]
pub struct NextStore {
    rel: StarredRelation<StmtNo>,
}

impl NextStore {
    pub(crate) fn add(&mut self, from: StmtNo, to: StmtNo) {
        self.rel.add(from, to);
    }

    pub(crate) fn add_star(&mut self, from: StmtNo, to: StmtNo) {
        self.rel.add_star(from, to);
    }

    pub fn next(&self, from: StmtNo, to: StmtNo) -> bool {
        self.rel.has(from, to)
    }

    pub fn next_star(&self, from: StmtNo, to: StmtNo) -> bool {
        self.rel.has_star(from, to)
    }

    pub fn successors_of(&self, from: StmtNo) -> impl Iterator<Item = StmtNo> + '_ {
        self.rel.base().values_of(from)
    }

    pub fn rel(&self) -> &StarredRelation<StmtNo> {
        &self.rel
    }
}

/// `Affects(a1, a2)`: assignment a1's value can reach assignment a2 along
/// some Next path on which no intermediate statement redefines the variable.
#[derive(Debug, Clone, Default)]
pub struct AffectsStore {
    pairs: OneToManyStore<StmtNo, StmtNo>,
}

impl AffectsStore {
    pub(crate) fn add(&mut self, src: StmtNo, dst: StmtNo) {
        self.pairs.add(src, dst);
    }

    pub fn affects(&self, src: StmtNo, dst: StmtNo) -> bool {
        self.pairs.contains(src, dst)
    }

    pub fn pairs(&self) -> &OneToManyStore<StmtNo, StmtNo> {
        &self.pairs
    }
}

// ============================================================================
// Data access
// ============================================================================

/// `Modifies(s, v)` and `Modifies(p, v)` over statements and procedures.
#[derive(Debug, Clone, Default)]
pub struct ModifiesStore {
    stmts: OneToManyStore<StmtNo, NameId>,
    procs: OneToManyStore<NameId, NameId>,
}

impl ModifiesStore {
    pub(crate) fn add_stmt(&mut self, stmt: StmtNo, var: NameId) {
        self.stmts.add(stmt, var);
    }

    pub(crate) fn add_proc(&mut self, proc: NameId, var: NameId) {
        self.procs.add(proc, var);
    }

    pub fn stmt_modifies(&self, stmt: StmtNo, var: NameId) -> bool {
        self.stmts.contains(stmt, var)
    }

    pub fn proc_modifies(&self, proc: NameId, var: NameId) -> bool {
        self.procs.contains(proc, var)
    }

    pub fn stmts(&self) -> &OneToManyStore<StmtNo, NameId> {
        &self.stmts
    }

    pub fn procs(&self) -> &OneToManyStore<NameId, NameId> {
        &self.procs
    }
}

/// `Uses(s, v)` and `Uses(p, v)`. Reads never use; prints always do.
#[derive(Debug, Clone, Default)]
pub struct UsesStore {
    stmts: OneToManyStore<StmtNo, NameId>,
    procs: OneToManyStore<NameId, NameId>,
}

impl UsesStore {
    pub(crate) fn add_stmt(&mut self, stmt: StmtNo, var: NameId) {
        self.stmts.add(stmt, var);
    }

    pub(crate) fn add_proc(&mut self, proc: NameId, var: NameId) {
        self.procs.add(proc, var);
    }

    pub fn stmt_uses(&self, stmt: StmtNo, var: NameId) -> bool {
        self.stmts.contains(stmt, var)
    }

    pub fn proc_uses(&self, proc: NameId, var: NameId) -> bool {
        self.procs.contains(proc, var)
    }

    pub fn stmts(&self) -> &OneToManyStore<StmtNo, NameId> {
        &self.stmts
    }

    pub fn procs(&self) -> &OneToManyStore<NameId, NameId> {
        &self.procs
    }
}

// ============================================================================
// Pattern index
// ============================================================================

/// Everything recorded for one assignment statement.
#[derive(Debug, Clone)]
pub struct AssignRow {
    /// Target variable.
    pub lhs: NameId,
    /// Distinct variables read on the right-hand side.
    pub rhs_vars: Vec<NameId>,
    /// Right-hand side in canonical postfix form.
    pub postfix: String,
}

/// Index backing `pattern` clauses: assignment rows keyed by statement,
/// the reverse target-variable index, and condition-variable sets for
/// while and if statements.
#[derive(Debug, Clone, Default)]
pub struct PatternStore {
    assigns: BTreeMap<StmtNo, AssignRow>,
    by_lhs: OneToManyStore<NameId, StmtNo>,
    while_vars: OneToManyStore<StmtNo, NameId>,
    if_vars: OneToManyStore<StmtNo, NameId>,
}

impl PatternStore {
    pub(crate) fn add_assign(&mut self, stmt: StmtNo, row: AssignRow) {
        self.by_lhs.add(row.lhs, stmt);
        self.assigns.insert(stmt, row);
    }

    pub(crate) fn add_while_var(&mut self, stmt: StmtNo, var: NameId) {
        self.while_vars.add(stmt, var);
    }

    pub(crate) fn add_if_var(&mut self, stmt: StmtNo, var: NameId) {
        self.if_vars.add(stmt, var);
    }

    pub fn assign(&self, stmt: StmtNo) -> Option<&AssignRow> {
        self.assigns.get(&stmt)
    }

    pub fn assigns(&self) -> impl Iterator<Item = (StmtNo, &AssignRow)> {
        self.assigns.iter().map(|(&s, row)| (s, row))
    }

    /// Assignments whose target is `var`.
    pub fn assigns_to(&self, var: NameId) -> impl Iterator<Item = StmtNo> + '_ {
        self.by_lhs.values_of(var)
    }

    pub fn while_vars(&self) -> &OneToManyStore<StmtNo, NameId> {
        &self.while_vars
    }

    pub fn if_vars(&self) -> &OneToManyStore<StmtNo, NameId> {
        &self.if_vars
    }
}
