//! Phase-restricted access to the knowledge base.
//!
//! [`WriteFacade`] exists only inside [`crate::Pkb::build`]; the population
//! traversers receive it and nothing else ever mutates the store.
//! [`ReadFacade`] is the complementary read-only view handed to query
//! evaluation.

use crate::cfg::Cfg;
use crate::entities::{EntityStore, StmtInfo};
use crate::error::PkbError;
use crate::relations::{
    AffectsStore, AssignRow, CallsStore, FollowsStore, ModifiesStore, NextStore, ParentStore,
    PatternStore, UsesStore,
};
use crate::{NameId, NameInterner, Pkb};
use quarry_simple::StmtNo;

/// Read-only view over a populated knowledge base.
#[derive(Clone, Copy)]
pub struct ReadFacade<'a> {
    pkb: &'a Pkb,
}

impl<'a> ReadFacade<'a> {
    pub(crate) fn new(pkb: &'a Pkb) -> Self {
        Self { pkb }
    }

    pub fn names(&self) -> &'a NameInterner {
        &self.pkb.names
    }

    pub fn name_of(&self, id: NameId) -> Option<String> {
        self.pkb.names.lookup(id)
    }

    pub fn id_of(&self, name: &str) -> Option<NameId> {
        self.pkb.names.id_of(name)
    }

    pub fn entities(&self) -> &'a EntityStore {
        &self.pkb.entities
    }

    pub fn follows(&self) -> &'a FollowsStore {
        &self.pkb.follows
    }

    pub fn parent(&self) -> &'a ParentStore {
        &self.pkb.parent
    }

    pub fn calls(&self) -> &'a CallsStore {
        &self.pkb.calls
    }

    pub fn modifies(&self) -> &'a ModifiesStore {
        &self.pkb.modifies
    }

    pub fn uses(&self) -> &'a UsesStore {
        &self.pkb.uses
    }

    pub fn next(&self) -> &'a NextStore {
        &self.pkb.next
    }

    pub fn affects(&self) -> &'a AffectsStore {
        &self.pkb.affects
    }

    pub fn patterns(&self) -> &'a PatternStore {
        &self.pkb.patterns
    }

    pub fn cfg_of(&self, proc: NameId) -> Option<&'a Cfg> {
        self.pkb.cfgs.get(&proc)
    }
}

/// Mutable population-phase handle over the knowledge base.
pub struct WriteFacade<'a> {
    pkb: &'a mut Pkb,
}

impl<'a> WriteFacade<'a> {
    pub(crate) fn new(pkb: &'a mut Pkb) -> Self {
        Self { pkb }
    }

    /// Read-only view of everything written so far. Later pipeline stages
    /// fold in facts recorded by earlier ones through this.
    pub fn read(&self) -> ReadFacade<'_> {
        ReadFacade::new(self.pkb)
    }

    pub fn intern(&self, name: &str) -> NameId {
        self.pkb.names.intern(name)
    }

    /// Register a procedure, rejecting duplicates.
    pub fn add_procedure(&mut self, name: &str) -> Result<NameId, PkbError> {
        let id = self.pkb.names.intern(name);
        if !self.pkb.entities.add_procedure(id) {
            return Err(PkbError::DuplicateProcedure(name.to_string()));
        }
        Ok(id)
    }

    pub fn add_variable(&mut self, name: &str) -> NameId {
        let id = self.pkb.names.intern(name);
        self.pkb.entities.add_variable(id);
        id
    }

    pub fn add_constant(&mut self, spelling: &str) -> NameId {
        let id = self.pkb.names.intern(spelling);
        self.pkb.entities.add_constant(id);
        id
    }

    pub fn add_stmt(&mut self, number: StmtNo, info: StmtInfo) {
        self.pkb.entities.add_stmt(number, info);
    }

    pub fn set_proc_range(&mut self, proc: NameId, first: StmtNo, last: StmtNo) {
        self.pkb.entities.set_proc_range(proc, first, last);
    }

    pub fn add_follows(&mut self, before: StmtNo, after: StmtNo) {
        self.pkb.follows.add(before, after);
    }

    pub fn close_follows(&mut self) {
        self.pkb.follows.close();
    }

    pub fn add_parent(&mut self, parent: StmtNo, child: StmtNo) {
        self.pkb.parent.add(parent, child);
    }

    pub fn close_parent(&mut self) {
        self.pkb.parent.close();
    }

    pub fn add_call(&mut self, caller: NameId, callee: NameId) {
        self.pkb.calls.add(caller, callee);
    }

    pub fn close_calls(&mut self, callees_first: &[NameId]) {
        self.pkb.calls.close_in(callees_first.iter().copied());
    }

    pub fn set_cfg(&mut self, proc: NameId, cfg: Cfg) {
        self.pkb.cfgs.insert(proc, cfg);
    }

    pub fn add_next(&mut self, from: StmtNo, to: StmtNo) {
        self.pkb.next.add(from, to);
    }

    pub fn add_next_star(&mut self, from: StmtNo, to: StmtNo) {
        self.pkb.next.add_star(from, to);
    }

    pub fn add_stmt_modifies(&mut self, stmt: StmtNo, var: NameId) {
        self.pkb.modifies.add_stmt(stmt, var);
    }

    pub fn add_proc_modifies(&mut self, proc: NameId, var: NameId) {
        self.pkb.modifies.add_proc(proc, var);
    }

    pub fn add_stmt_uses(&mut self, stmt: StmtNo, var: NameId) {
        self.pkb.uses.add_stmt(stmt, var);
    }

    pub fn add_proc_uses(&mut self, proc: NameId, var: NameId) {
        self.pkb.uses.add_proc(proc, var);
    }

    pub fn add_assign_pattern(&mut self, stmt: StmtNo, row: AssignRow) {
        self.pkb.patterns.add_assign(stmt, row);
    }

    pub fn add_while_control(&mut self, stmt: StmtNo, var: NameId) {
        self.pkb.patterns.add_while_var(stmt, var);
    }

    pub fn add_if_control(&mut self, stmt: StmtNo, var: NameId) {
        self.pkb.patterns.add_if_var(stmt, var);
    }

    pub fn add_affects(&mut self, src: StmtNo, dst: StmtNo) {
        self.pkb.affects.add(src, dst);
    }
}
