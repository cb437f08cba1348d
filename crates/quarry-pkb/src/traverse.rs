//! Population pipeline: one traversal pass per relation.
//!
//! Stage order is load-bearing. Numbering runs first so every later pass
//! sees final statement numbers. Parent must be closed before Modifies and
//! Uses, whose container sets fold over Parent* descendants. The call graph
//! is validated and topologically ordered before Calls* is closed and before
//! Modifies/Uses run, so a callee's complete sets exist when a caller folds
//! them in. Affects runs last; it reads Next, Modifies and Uses.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use roaring::RoaringBitmap;

use quarry_simple::{postfix_of, Program, Stmt, StmtKind, StmtList, StmtNo};

use crate::cfg::{Cfg, CfgNodeId};
use crate::entities::{StmtInfo, StmtType};
use crate::error::PkbError;
use crate::facade::{ReadFacade, WriteFacade};
use crate::relations::AssignRow;
use crate::NameId;

pub(crate) fn populate(w: &mut WriteFacade<'_>, program: &mut Program) -> Result<(), PkbError> {
    number_statements(program);
    collect_entities(w, program)?;
    collect_follows(w, program);
    collect_parent(w, program);
    let order = collect_calls(w, program)?;
    build_flow(w, program);
    collect_modifies(w, &order);
    collect_uses(w, &order);
    collect_affects(w);

    tracing::debug!(
        procedures = w.read().entities().procedures().len(),
        statements = w.read().entities().stmt_count(),
        "knowledge base populated"
    );
    Ok(())
}

// ============================================================================
// Statement numbering
// ============================================================================

/// Assign 1-based statement numbers in a pre-order, left-to-right walk.
fn number_statements(program: &mut Program) {
    fn number_list(list: &mut StmtList, next: &mut StmtNo) {
        for stmt in &mut list.stmts {
            *next += 1;
            stmt.number = *next;
            match &mut stmt.kind {
                StmtKind::While { body, .. } => number_list(body, next),
                StmtKind::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    number_list(then_branch, next);
                    number_list(else_branch, next);
                }
                _ => {}
            }
        }
    }

    let mut next = 0;
    for proc in &mut program.procedures {
        number_list(&mut proc.body, &mut next);
    }
}

// ============================================================================
// Design entities and the pattern index
// ============================================================================

fn collect_entities(w: &mut WriteFacade<'_>, program: &Program) -> Result<(), PkbError> {
    for proc in &program.procedures {
        let proc_id = w.add_procedure(&proc.name)?;
        register_list(w, &proc.body, proc_id);
        if let Some(first) = proc.body.stmts.first().map(|s| s.number) {
            w.set_proc_range(proc_id, first, last_number(&proc.body));
        }
    }
    Ok(())
}

/// Number of the last statement in a list, following nesting: the final
/// pre-order number inside the list.
fn last_number(list: &StmtList) -> StmtNo {
    match list.stmts.last() {
        None => 0,
        Some(stmt) => match &stmt.kind {
            StmtKind::While { body, .. } => last_number(body),
            StmtKind::If { else_branch, .. } => last_number(else_branch),
            _ => stmt.number,
        },
    }
}

fn register_list(w: &mut WriteFacade<'_>, list: &StmtList, proc: NameId) {
    for stmt in list.iter() {
        register_stmt(w, stmt, proc);
    }
}

fn register_stmt(w: &mut WriteFacade<'_>, stmt: &Stmt, proc: NameId) {
    let number = stmt.number;
    match &stmt.kind {
        StmtKind::Read { var } => {
            let v = w.add_variable(var);
            w.add_stmt(
                number,
                StmtInfo {
                    ty: StmtType::Read,
                    proc,
                    attr: Some(v),
                },
            );
        }
        StmtKind::Print { var } => {
            let v = w.add_variable(var);
            w.add_stmt(
                number,
                StmtInfo {
                    ty: StmtType::Print,
                    proc,
                    attr: Some(v),
                },
            );
        }
        StmtKind::Call { callee } => {
            // The callee is interned but deliberately not registered as a
            // variable; the call graph pass validates it against the
            // procedure set.
            let target = w.intern(callee);
            w.add_stmt(
                number,
                StmtInfo {
                    ty: StmtType::Call,
                    proc,
                    attr: Some(target),
                },
            );
        }
        StmtKind::Assign { target, value } => {
            let lhs = w.add_variable(target);
            let mut vars = Vec::new();
            value.collect_vars(&mut vars);
            let mut rhs_vars = BTreeSet::new();
            for name in vars {
                rhs_vars.insert(w.add_variable(name));
            }
            let mut consts = Vec::new();
            value.collect_consts(&mut consts);
            for spelling in consts {
                w.add_constant(spelling);
            }
            w.add_stmt(
                number,
                StmtInfo {
                    ty: StmtType::Assign,
                    proc,
                    attr: None,
                },
            );
            w.add_assign_pattern(
                number,
                AssignRow {
                    lhs,
                    rhs_vars: rhs_vars.into_iter().collect(),
                    postfix: postfix_of(value),
                },
            );
        }
        StmtKind::While { cond, body } => {
            w.add_stmt(
                number,
                StmtInfo {
                    ty: StmtType::While,
                    proc,
                    attr: None,
                },
            );
            let mut vars = Vec::new();
            cond.collect_vars(&mut vars);
            for name in vars {
                let v = w.add_variable(name);
                w.add_while_control(number, v);
            }
            let mut consts = Vec::new();
            cond.collect_consts(&mut consts);
            for spelling in consts {
                w.add_constant(spelling);
            }
            register_list(w, body, proc);
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            w.add_stmt(
                number,
                StmtInfo {
                    ty: StmtType::If,
                    proc,
                    attr: None,
                },
            );
            let mut vars = Vec::new();
            cond.collect_vars(&mut vars);
            for name in vars {
                let v = w.add_variable(name);
                w.add_if_control(number, v);
            }
            let mut consts = Vec::new();
            cond.collect_consts(&mut consts);
            for spelling in consts {
                w.add_constant(spelling);
            }
            register_list(w, then_branch, proc);
            register_list(w, else_branch, proc);
        }
    }
}

// ============================================================================
// Follows
// ============================================================================

fn collect_follows(w: &mut WriteFacade<'_>, program: &Program) {
    fn walk(w: &mut WriteFacade<'_>, list: &StmtList) {
        for pair in list.stmts.windows(2) {
            w.add_follows(pair[0].number, pair[1].number);
        }
        for stmt in list.iter() {
            match &stmt.kind {
                StmtKind::While { body, .. } => walk(w, body),
                StmtKind::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    walk(w, then_branch);
                    walk(w, else_branch);
                }
                _ => {}
            }
        }
    }

    for proc in &program.procedures {
        walk(w, &proc.body);
    }
    w.close_follows();
}

// ============================================================================
// Parent
// ============================================================================

fn collect_parent(w: &mut WriteFacade<'_>, program: &Program) {
    fn walk(w: &mut WriteFacade<'_>, list: &StmtList) {
        for stmt in list.iter() {
            match &stmt.kind {
                StmtKind::While { body, .. } => {
                    for child in body.iter() {
                        w.add_parent(stmt.number, child.number);
                    }
                    walk(w, body);
                }
                StmtKind::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    for child in then_branch.iter().chain(else_branch.iter()) {
                        w.add_parent(stmt.number, child.number);
                    }
                    walk(w, then_branch);
                    walk(w, else_branch);
                }
                _ => {}
            }
        }
    }

    for proc in &program.procedures {
        walk(w, &proc.body);
    }
    w.close_parent();
}

// ============================================================================
// Call graph: validation and topological order
// ============================================================================

/// Record Calls pairs, validate the call graph, and return every procedure
/// in callees-first order.
fn collect_calls(w: &mut WriteFacade<'_>, program: &Program) -> Result<Vec<NameId>, PkbError> {
    let mut pairs: BTreeSet<(NameId, NameId)> = BTreeSet::new();
    for proc in &program.procedures {
        let caller = w.intern(&proc.name);
        let mut targets = Vec::new();
        call_targets(&proc.body, &mut targets);
        for callee_name in targets {
            let callee = w.intern(callee_name);
            if callee == caller {
                return Err(PkbError::RecursiveProcedure(proc.name.clone()));
            }
            if !w.read().entities().is_procedure(callee) {
                return Err(PkbError::UndefinedCallee {
                    caller: proc.name.clone(),
                    callee: callee_name.to_string(),
                });
            }
            pairs.insert((caller, callee));
        }
    }

    for &(caller, callee) in &pairs {
        w.add_call(caller, callee);
    }

    let order = callees_first_order(w, program, &pairs)?;
    w.close_calls(&order);
    tracing::debug!(procedures = order.len(), "call graph validated");
    Ok(order)
}

fn call_targets<'p>(list: &'p StmtList, out: &mut Vec<&'p str>) {
    for stmt in list.iter() {
        match &stmt.kind {
            StmtKind::Call { callee } => out.push(callee),
            StmtKind::While { body, .. } => call_targets(body, out),
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                call_targets(then_branch, out);
                call_targets(else_branch, out);
            }
            _ => {}
        }
    }
}

/// Kahn's algorithm over the call graph. A procedure becomes ready once all
/// of its callees are emitted; anything left waiting sits on a cycle or
/// calls into one, and the error names only the actual cycle members.
fn callees_first_order(
    w: &WriteFacade<'_>,
    program: &Program,
    pairs: &BTreeSet<(NameId, NameId)>,
) -> Result<Vec<NameId>, PkbError> {
    let procs: Vec<NameId> = program
        .procedures
        .iter()
        .map(|p| w.intern(&p.name))
        .collect();
    let mut waiting: BTreeMap<NameId, usize> = procs.iter().map(|&p| (p, 0)).collect();
    let mut callers_of: BTreeMap<NameId, Vec<NameId>> = BTreeMap::new();
    for &(caller, callee) in pairs {
        if let Some(n) = waiting.get_mut(&caller) {
            *n += 1;
        }
        callers_of.entry(callee).or_default().push(caller);
    }

    let mut ready: VecDeque<NameId> = procs
        .iter()
        .copied()
        .filter(|p| waiting.get(p) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(procs.len());
    while let Some(next) = ready.pop_front() {
        order.push(next);
        for &caller in callers_of.get(&next).into_iter().flatten() {
            if let Some(n) = waiting.get_mut(&caller) {
                *n -= 1;
                if *n == 0 {
                    ready.push_back(caller);
                }
            }
        }
    }

    if order.len() != procs.len() {
        let mut callees_of: BTreeMap<NameId, Vec<NameId>> = BTreeMap::new();
        for &(caller, callee) in pairs {
            callees_of.entry(caller).or_default().push(callee);
        }
        let mut cyclic: Vec<String> = waiting
            .iter()
            .filter(|&(_, &n)| n > 0)
            .map(|(&p, _)| p)
            .filter(|&p| on_cycle(p, &callees_of))
            .filter_map(|p| w.read().name_of(p))
            .collect();
        cyclic.sort();
        return Err(PkbError::CallCycle(cyclic));
    }
    Ok(order)
}

/// True iff `start` reaches itself over one or more call edges. A stuck
/// procedure that merely calls into a cycle fails this test and stays out
/// of the cycle report.
fn on_cycle(start: NameId, callees_of: &BTreeMap<NameId, Vec<NameId>>) -> bool {
    let mut seen = BTreeSet::new();
    let mut frontier = vec![start];
    while let Some(p) = frontier.pop() {
        for &callee in callees_of.get(&p).into_iter().flatten() {
            if callee == start {
                return true;
            }
            if seen.insert(callee) {
                frontier.push(callee);
            }
        }
    }
    false
}

// ============================================================================
// Control flow: CFG, Next and Next*
// ============================================================================

fn build_flow(w: &mut WriteFacade<'_>, program: &Program) {
    for proc in &program.procedures {
        let proc_id = w.intern(&proc.name);
        let cfg = Cfg::build(&proc.body);

        // Direct edges: consecutive statements inside a node, then the last
        // statement of each node to the first of every (resolved) successor.
        for (id, node) in cfg.nodes() {
            for pair in node.stmts.windows(2) {
                w.add_next(pair[0], pair[1]);
            }
            if let Some(&last) = node.stmts.last() {
                for succ in cfg.real_succs(id) {
                    if let Some(&first) = cfg.node(succ).stmts.first() {
                        w.add_next(last, first);
                    }
                }
            }
        }

        // Next*: later statements of the same node, plus every statement in
        // a node reachable over at least one edge. A node on a loop path
        // reaches itself, which yields the reflexive pairs loops induce.
        for (id, node) in cfg.nodes() {
            if node.stmts.is_empty() {
                continue;
            }
            let reach = reachable_nodes(&cfg, id);
            let mut reach_stmts: BTreeSet<StmtNo> = BTreeSet::new();
            for &m in &reach {
                reach_stmts.extend(cfg.node(m).stmts.iter().copied());
            }
            for (i, &s) in node.stmts.iter().enumerate() {
                for &t in &node.stmts[i + 1..] {
                    w.add_next_star(s, t);
                }
                for &t in &reach_stmts {
                    w.add_next_star(s, t);
                }
            }
        }

        w.set_cfg(proc_id, cfg);
    }
}

/// Statement-bearing nodes reachable from `from` via at least one edge.
fn reachable_nodes(cfg: &Cfg, from: CfgNodeId) -> BTreeSet<CfgNodeId> {
    let mut seen = BTreeSet::new();
    let mut stack = cfg.real_succs(from);
    while let Some(node) = stack.pop() {
        if seen.insert(node) {
            stack.extend(cfg.real_succs(node));
        }
    }
    seen
}

// ============================================================================
// Modifies
// ============================================================================

/// Leaf write set of one statement: the read/assign target, or a called
/// procedure's complete modifies set. Containers contribute nothing of
/// their own.
fn leaf_modifies(r: &ReadFacade<'_>, s: StmtNo) -> BTreeSet<NameId> {
    match r.entities().stmt_type(s) {
        Some(StmtType::Read) => r.entities().attr_of(s).into_iter().collect(),
        Some(StmtType::Assign) => r.patterns().assign(s).map(|row| row.lhs).into_iter().collect(),
        Some(StmtType::Call) => match r.entities().attr_of(s) {
            Some(callee) => r.modifies().procs().values_of(callee).collect(),
            None => BTreeSet::new(),
        },
        _ => BTreeSet::new(),
    }
}

fn collect_modifies(w: &mut WriteFacade<'_>, callees_first: &[NameId]) {
    for &proc in callees_first {
        let Some((first, last)) = w.read().entities().proc_range(proc) else {
            continue;
        };
        let mut stmt_adds: Vec<(StmtNo, NameId)> = Vec::new();
        let mut proc_vars: BTreeSet<NameId> = BTreeSet::new();
        {
            let r = w.read();
            let span = (last - first + 1) as usize;
            let mut leaf: Vec<BTreeSet<NameId>> = vec![BTreeSet::new(); span];
            for s in first..=last {
                let set = leaf_modifies(&r, s);
                proc_vars.extend(set.iter().copied());
                for &v in &set {
                    stmt_adds.push((s, v));
                }
                leaf[(s - first) as usize] = set;
            }
            // Containers write whatever any nested statement writes.
            for s in first..=last {
                if matches!(
                    r.entities().stmt_type(s),
                    Some(StmtType::While | StmtType::If)
                ) {
                    let mut vars: BTreeSet<NameId> = BTreeSet::new();
                    for d in r.parent().descendants_of(s) {
                        vars.extend(leaf[(d - first) as usize].iter().copied());
                    }
                    for v in vars {
                        stmt_adds.push((s, v));
                    }
                }
            }
        }
        for (s, v) in stmt_adds {
            w.add_stmt_modifies(s, v);
        }
        for v in proc_vars {
            w.add_proc_modifies(proc, v);
        }
    }
}

// ============================================================================
// Uses
// ============================================================================

/// Leaf read set of one statement. Condition variables count as the
/// container's own contribution, so enclosing containers pick them up
/// through Parent* like any other nested fact.
fn leaf_uses(r: &ReadFacade<'_>, s: StmtNo) -> BTreeSet<NameId> {
    match r.entities().stmt_type(s) {
        Some(StmtType::Print) => r.entities().attr_of(s).into_iter().collect(),
        Some(StmtType::Assign) => match r.patterns().assign(s) {
            Some(row) => row.rhs_vars.iter().copied().collect(),
            None => BTreeSet::new(),
        },
        Some(StmtType::Call) => match r.entities().attr_of(s) {
            Some(callee) => r.uses().procs().values_of(callee).collect(),
            None => BTreeSet::new(),
        },
        Some(StmtType::While) => r.patterns().while_vars().values_of(s).collect(),
        Some(StmtType::If) => r.patterns().if_vars().values_of(s).collect(),
        _ => BTreeSet::new(),
    }
}

fn collect_uses(w: &mut WriteFacade<'_>, callees_first: &[NameId]) {
    for &proc in callees_first {
        let Some((first, last)) = w.read().entities().proc_range(proc) else {
            continue;
        };
        let mut stmt_adds: Vec<(StmtNo, NameId)> = Vec::new();
        let mut proc_vars: BTreeSet<NameId> = BTreeSet::new();
        {
            let r = w.read();
            let span = (last - first + 1) as usize;
            let mut leaf: Vec<BTreeSet<NameId>> = vec![BTreeSet::new(); span];
            for s in first..=last {
                let set = leaf_uses(&r, s);
                proc_vars.extend(set.iter().copied());
                for &v in &set {
                    stmt_adds.push((s, v));
                }
                leaf[(s - first) as usize] = set;
            }
            for s in first..=last {
                if matches!(
                    r.entities().stmt_type(s),
                    Some(StmtType::While | StmtType::If)
                ) {
                    let mut vars: BTreeSet<NameId> = BTreeSet::new();
                    for d in r.parent().descendants_of(s) {
                        vars.extend(leaf[(d - first) as usize].iter().copied());
                    }
                    for v in vars {
                        stmt_adds.push((s, v));
                    }
                }
            }
        }
        for (s, v) in stmt_adds {
            w.add_stmt_uses(s, v);
        }
        for v in proc_vars {
            w.add_proc_uses(proc, v);
        }
    }
}

// ============================================================================
// Affects
// ============================================================================

/// For each assignment, walk forward over Next edges and record every
/// assignment that reads the defined variable before anything redefines it.
/// A statement that kills the variable (assign, read, or a call whose
/// target writes it) is still inspected but never expanded past; while and
/// if statements only test their condition, so they never kill.
fn collect_affects(w: &mut WriteFacade<'_>) {
    let mut found: Vec<(StmtNo, StmtNo)> = Vec::new();
    {
        let r = w.read();
        for a in r.entities().of_type(StmtType::Assign).iter() {
            let Some(row) = r.patterns().assign(a) else {
                continue;
            };
            let var = row.lhs;
            let mut seen = RoaringBitmap::new();
            let mut queue: VecDeque<StmtNo> = r.next().successors_of(a).collect();
            while let Some(t) = queue.pop_front() {
                if !seen.insert(t) {
                    continue;
                }
                if r.entities().stmt_type(t) == Some(StmtType::Assign) && r.uses().stmt_uses(t, var)
                {
                    found.push((a, t));
                }
                let kills = matches!(
                    r.entities().stmt_type(t),
                    Some(StmtType::Assign | StmtType::Read | StmtType::Call)
                ) && r.modifies().stmt_modifies(t, var);
                if !kills {
                    queue.extend(r.next().successors_of(t));
                }
            }
        }
    }
    for (a, b) in found {
        w.add_affects(a, b);
    }
}
