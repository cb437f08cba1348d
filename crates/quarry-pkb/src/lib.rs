//! Program knowledge base for SIMPLE programs.
//!
//! [`Pkb::build`] takes a freshly parsed program, numbers its statements,
//! and runs the population pipeline: design entities, Follows, Parent, the
//! validated call graph, per-procedure control-flow graphs with Next,
//! Modifies/Uses folded over the call graph in callees-first order, and
//! finally Affects. After that the store never changes; query evaluation
//! works exclusively through the [`ReadFacade`] view.
//!
//! Names (procedures, variables, constant spellings) are interned to compact
//! `NameId`s; statements are identified by their 1-based number.

pub mod cfg;
pub mod entities;
pub mod error;
pub mod facade;
pub mod relations;
pub mod store;

mod traverse;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use quarry_simple::Program;

pub use cfg::{Cfg, CfgNode, CfgNodeId};
pub use entities::{EntityStore, StmtInfo, StmtType};
pub use error::PkbError;
pub use facade::{ReadFacade, WriteFacade};
pub use quarry_simple::StmtNo;
pub use relations::{
    AffectsStore, AssignRow, CallsStore, FollowsStore, ModifiesStore, NextStore, ParentStore,
    PatternStore, UsesStore,
};
pub use store::{OneToManyStore, StarredRelation};

// ============================================================================
// Name interning
// ============================================================================

/// Interned name ID (4 bytes instead of a heap string per occurrence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NameId(u32);

impl NameId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Name interner: maps name strings to compact IDs.
#[derive(Debug)]
pub struct NameInterner {
    /// String to ID mapping
    str_to_id: DashMap<String, NameId>,
    /// ID to string mapping (for reverse lookup)
    id_to_str: DashMap<NameId, String>,
    /// Next available ID
    next_id: AtomicU32,
}

impl NameInterner {
    pub fn new() -> Self {
        Self {
            str_to_id: DashMap::new(),
            id_to_str: DashMap::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Intern a name, returning its ID.
    pub fn intern(&self, s: &str) -> NameId {
        if let Some(id) = self.str_to_id.get(s) {
            return *id;
        }

        let id = NameId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.str_to_id.insert(s.to_string(), id);
        self.id_to_str.insert(id, s.to_string());
        id
    }

    /// Look up an existing ID without inserting.
    pub fn id_of(&self, s: &str) -> Option<NameId> {
        self.str_to_id.get(s).map(|id| *id)
    }

    /// Look up the name behind an ID.
    pub fn lookup(&self, id: NameId) -> Option<String> {
        self.id_to_str.get(&id).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NameInterner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Knowledge base
// ============================================================================

/// The populated fact store for one program.
///
/// Construct with [`Pkb::build`]; read through [`Pkb::read`].
#[derive(Debug, Default)]
pub struct Pkb {
    pub(crate) names: NameInterner,
    pub(crate) entities: EntityStore,
    pub(crate) follows: FollowsStore,
    pub(crate) parent: ParentStore,
    pub(crate) calls: CallsStore,
    pub(crate) modifies: ModifiesStore,
    pub(crate) uses: UsesStore,
    pub(crate) next: NextStore,
    pub(crate) affects: AffectsStore,
    pub(crate) patterns: PatternStore,
    pub(crate) cfgs: BTreeMap<NameId, Cfg>,
}

impl Pkb {
    /// Number the program's statements and run the full population pipeline.
    ///
    /// Fails on call-graph violations (duplicate procedure, undefined
    /// callee, recursion or a call cycle); nothing of the partially built
    /// store survives a failure.
    pub fn build(mut program: Program) -> Result<Pkb, PkbError> {
        let mut pkb = Pkb::default();
        let mut writer = WriteFacade::new(&mut pkb);
        traverse::populate(&mut writer, &mut program)?;
        Ok(pkb)
    }

    /// Read-only view for query evaluation.
    pub fn read(&self) -> ReadFacade<'_> {
        ReadFacade::new(self)
    }
}
