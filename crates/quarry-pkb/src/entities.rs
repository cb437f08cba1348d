//! Design-entity storage: procedures, variables, constants, statements.

use std::collections::BTreeMap;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::NameId;
use quarry_simple::StmtNo;

/// The six statement kinds of the language, as query declarations name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StmtType {
    Read,
    Print,
    Call,
    Assign,
    While,
    If,
}

impl StmtType {
    pub const ALL: [StmtType; 6] = [
        StmtType::Read,
        StmtType::Print,
        StmtType::Call,
        StmtType::Assign,
        StmtType::While,
        StmtType::If,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            StmtType::Read => "read",
            StmtType::Print => "print",
            StmtType::Call => "call",
            StmtType::Assign => "assign",
            StmtType::While => "while",
            StmtType::If => "if",
        }
    }

    fn index(self) -> usize {
        match self {
            StmtType::Read => 0,
            StmtType::Print => 1,
            StmtType::Call => 2,
            StmtType::Assign => 3,
            StmtType::While => 4,
            StmtType::If => 5,
        }
    }
}

/// Per-statement record. `attr` is the statement's name attribute where one
/// exists: the callee for calls, the variable for reads and prints.
#[derive(Debug, Clone, Copy)]
pub struct StmtInfo {
    pub ty: StmtType,
    pub proc: NameId,
    pub attr: Option<NameId>,
}

/// Columnar statement storage plus name-entity sets.
///
/// Statements are appended in number order during population, so the i-th
/// row is statement i+1 and per-procedure statements form contiguous ranges.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    /// Interned procedure names.
    procedures: RoaringBitmap,
    /// Interned variable names.
    variables: RoaringBitmap,
    /// Interned constant spellings.
    constants: RoaringBitmap,
    /// Statement column: statement number - 1 -> record.
    stmts: Vec<StmtInfo>,
    /// Type index: statement numbers per statement type.
    by_type: [RoaringBitmap; 6],
    /// procedure -> inclusive statement range of its body.
    proc_ranges: BTreeMap<NameId, (StmtNo, StmtNo)>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a procedure name. Returns `false` on a duplicate.
    pub fn add_procedure(&mut self, id: NameId) -> bool {
        self.procedures.insert(id.raw())
    }

    pub fn add_variable(&mut self, id: NameId) -> bool {
        self.variables.insert(id.raw())
    }

    pub fn add_constant(&mut self, id: NameId) -> bool {
        self.constants.insert(id.raw())
    }

    pub fn is_procedure(&self, id: NameId) -> bool {
        self.procedures.contains(id.raw())
    }

    pub fn is_variable(&self, id: NameId) -> bool {
        self.variables.contains(id.raw())
    }

    pub fn procedures(&self) -> &RoaringBitmap {
        &self.procedures
    }

    pub fn variables(&self) -> &RoaringBitmap {
        &self.variables
    }

    pub fn constants(&self) -> &RoaringBitmap {
        &self.constants
    }

    /// Append a statement record. Statements must arrive in number order.
    pub fn add_stmt(&mut self, number: StmtNo, info: StmtInfo) {
        debug_assert_eq!(number as usize, self.stmts.len() + 1);
        self.by_type[info.ty.index()].insert(number);
        self.stmts.push(info);
    }

    pub fn set_proc_range(&mut self, proc: NameId, first: StmtNo, last: StmtNo) {
        self.proc_ranges.insert(proc, (first, last));
    }

    pub fn proc_range(&self, proc: NameId) -> Option<(StmtNo, StmtNo)> {
        self.proc_ranges.get(&proc).copied()
    }

    pub fn stmt_count(&self) -> u32 {
        self.stmts.len() as u32
    }

    pub fn is_stmt(&self, number: StmtNo) -> bool {
        number >= 1 && number <= self.stmt_count()
    }

    pub fn stmt(&self, number: StmtNo) -> Option<&StmtInfo> {
        self.stmts.get((number as usize).checked_sub(1)?)
    }

    pub fn stmt_type(&self, number: StmtNo) -> Option<StmtType> {
        self.stmt(number).map(|info| info.ty)
    }

    pub fn proc_of(&self, number: StmtNo) -> Option<NameId> {
        self.stmt(number).map(|info| info.proc)
    }

    pub fn attr_of(&self, number: StmtNo) -> Option<NameId> {
        self.stmt(number).and_then(|info| info.attr)
    }

    /// All statement numbers of one statement type.
    pub fn of_type(&self, ty: StmtType) -> &RoaringBitmap {
        &self.by_type[ty.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_rows_index_by_number() {
        let mut store = EntityStore::new();
        let p = NameId::new(0);
        let v = NameId::new(1);
        assert!(store.add_procedure(p));
        assert!(!store.add_procedure(p));

        store.add_stmt(
            1,
            StmtInfo {
                ty: StmtType::Read,
                proc: p,
                attr: Some(v),
            },
        );
        store.add_stmt(
            2,
            StmtInfo {
                ty: StmtType::Assign,
                proc: p,
                attr: None,
            },
        );
        store.set_proc_range(p, 1, 2);

        assert_eq!(store.stmt_count(), 2);
        assert_eq!(store.stmt_type(1), Some(StmtType::Read));
        assert_eq!(store.attr_of(1), Some(v));
        assert_eq!(store.attr_of(2), None);
        assert_eq!(store.stmt_type(3), None);
        assert!(!store.is_stmt(0));
        assert_eq!(store.of_type(StmtType::Read).iter().collect::<Vec<_>>(), [1]);
        assert_eq!(store.proc_range(p), Some((1, 2)));
    }
}
