//! Per-procedure control-flow graphs.
//!
//! Nodes live in an arena and reference each other by integer handle, so
//! loop-back edges form cycles without any ownership gymnastics. A node
//! holds a run of consecutive straight-line statements; while and if
//! statements always sit alone in a node of their own, and the code after a
//! construct starts in a fresh continuation node. Continuation and join
//! nodes can stay empty (a while at the end of a procedure, nested ifs);
//! they are kept in the arena and looked through when successors are
//! resolved.

use ahash::AHashMap;

use quarry_simple::{StmtKind, StmtList, StmtNo};

pub type CfgNodeId = u32;

#[derive(Debug, Clone, Default)]
pub struct CfgNode {
    /// Statements in execution order.
    pub stmts: Vec<StmtNo>,
    /// Out-edges in decision order: loop body before loop exit, then-branch
    /// before else-branch.
    pub succs: Vec<CfgNodeId>,
}

#[derive(Debug, Clone)]
pub struct Cfg {
    nodes: Vec<CfgNode>,
    entry: CfgNodeId,
    stmt_node: AHashMap<StmtNo, CfgNodeId>,
}

impl Cfg {
    pub fn build(body: &StmtList) -> Cfg {
        CfgBuilder::default().finish(body)
    }

    pub fn entry(&self) -> CfgNodeId {
        self.entry
    }

    pub fn node(&self, id: CfgNodeId) -> &CfgNode {
        &self.nodes[id as usize]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (CfgNodeId, &CfgNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (i as CfgNodeId, node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node holding a statement.
    pub fn node_of(&self, stmt: StmtNo) -> Option<CfgNodeId> {
        self.stmt_node.get(&stmt).copied()
    }

    /// Successor nodes that carry statements, looking through empty
    /// continuation/join nodes. An empty node without out-edges (control
    /// falling off the procedure) contributes nothing.
    pub fn real_succs(&self, id: CfgNodeId) -> Vec<CfgNodeId> {
        let mut out = Vec::new();
        let mut seen = vec![false; self.nodes.len()];
        let mut stack: Vec<CfgNodeId> = self.nodes[id as usize].succs.clone();
        while let Some(next) = stack.pop() {
            if seen[next as usize] {
                continue;
            }
            seen[next as usize] = true;
            let node = &self.nodes[next as usize];
            if node.stmts.is_empty() {
                stack.extend(node.succs.iter().copied());
            } else {
                out.push(next);
            }
        }
        out.sort_unstable();
        out
    }
}

#[derive(Default)]
struct CfgBuilder {
    nodes: Vec<CfgNode>,
    stmt_node: AHashMap<StmtNo, CfgNodeId>,
}

impl CfgBuilder {
    fn finish(mut self, body: &StmtList) -> Cfg {
        let entry = self.new_node();
        self.walk_list(body, entry);
        Cfg {
            nodes: self.nodes,
            entry,
            stmt_node: self.stmt_node,
        }
    }

    fn new_node(&mut self) -> CfgNodeId {
        let id = self.nodes.len() as CfgNodeId;
        self.nodes.push(CfgNode::default());
        id
    }

    fn link(&mut self, from: CfgNodeId, to: CfgNodeId) {
        self.nodes[from as usize].succs.push(to);
    }

    fn append(&mut self, node: CfgNodeId, stmt: StmtNo) {
        self.nodes[node as usize].stmts.push(stmt);
        self.stmt_node.insert(stmt, node);
    }

    /// Place a branching statement in a node of its own, reusing the cursor
    /// node only while it is still empty.
    fn branch_node(&mut self, cursor: CfgNodeId, stmt: StmtNo) -> CfgNodeId {
        let node = if self.nodes[cursor as usize].stmts.is_empty() {
            cursor
        } else {
            let fresh = self.new_node();
            self.link(cursor, fresh);
            fresh
        };
        self.append(node, stmt);
        node
    }

    /// Walk one statement list with `cursor` as the current node; returns
    /// the node where control sits after the list.
    fn walk_list(&mut self, list: &StmtList, mut cursor: CfgNodeId) -> CfgNodeId {
        for stmt in list.iter() {
            match &stmt.kind {
                StmtKind::While { body, .. } => {
                    let head = self.branch_node(cursor, stmt.number);
                    let body_entry = self.new_node();
                    self.link(head, body_entry);
                    let body_exit = self.walk_list(body, body_entry);
                    self.link(body_exit, head);
                    let after = self.new_node();
                    self.link(head, after);
                    cursor = after;
                }
                StmtKind::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    let head = self.branch_node(cursor, stmt.number);
                    let then_entry = self.new_node();
                    let else_entry = self.new_node();
                    self.link(head, then_entry);
                    self.link(head, else_entry);
                    let then_exit = self.walk_list(then_branch, then_entry);
                    let else_exit = self.walk_list(else_branch, else_entry);
                    let join = self.new_node();
                    self.link(then_exit, join);
                    self.link(else_exit, join);
                    cursor = join;
                }
                _ => self.append(cursor, stmt.number),
            }
        }
        cursor
    }
}
