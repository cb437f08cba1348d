//! End-to-end population tests over a fixed SIMPLE program.

use quarry_pkb::{NameId, Pkb, PkbError, StmtType};
use quarry_simple::parse_program;

// ============================================================================
// Fixture
// ============================================================================

/// The centroid example. Statement numbers: main 1-3, readPoint 4-5,
/// printResults 6-9, computeCentroid 10-23 (while at 14 with body 15-18,
/// if at 19 with then branch 20 and else branch 21-22, normSq at 23).
const CENTROID: &str = "
procedure main {
    flag = 0;
    call computeCentroid;
    call printResults;
}
procedure readPoint {
    read x;
    read y;
}
procedure printResults {
    print flag;
    print cenX;
    print cenY;
    print normSq;
}
procedure computeCentroid {
    count = 0;
    cenX = 0;
    cenY = 0;
    call readPoint;
    while ((x != 0) && (y != 0)) {
        count = count + 1;
        cenX = cenX + x;
        cenY = cenY + y;
        call readPoint;
    }
    if (count == 0) then {
        flag = 1;
    } else {
        cenX = cenX / count;
        cenY = cenY / count;
    }
    normSq = cenX * cenX + cenY * cenY;
}
";

fn centroid() -> Pkb {
    let program = parse_program(CENTROID).unwrap();
    Pkb::build(program).unwrap()
}

fn name(pkb: &Pkb, s: &str) -> NameId {
    pkb.read().id_of(s).unwrap()
}

// ============================================================================
// Entities
// ============================================================================

#[test]
fn entities_are_registered_with_types_and_ranges() {
    let pkb = centroid();
    let r = pkb.read();

    assert_eq!(r.entities().procedures().len(), 4);
    assert_eq!(r.entities().stmt_count(), 23);

    let whiles: Vec<u32> = r.entities().of_type(StmtType::While).iter().collect();
    assert_eq!(whiles, vec![14]);
    let ifs: Vec<u32> = r.entities().of_type(StmtType::If).iter().collect();
    assert_eq!(ifs, vec![19]);
    let assigns = r.entities().of_type(StmtType::Assign);
    assert_eq!(assigns.len(), 11);

    assert_eq!(
        r.entities().proc_range(name(&pkb, "computeCentroid")),
        Some((10, 23))
    );
    assert_eq!(r.entities().proc_range(name(&pkb, "readPoint")), Some((4, 5)));

    // read x at 4 carries the variable as its attribute; call readPoint at
    // 13 carries the callee.
    assert_eq!(r.entities().attr_of(4), Some(name(&pkb, "x")));
    assert_eq!(r.entities().attr_of(13), Some(name(&pkb, "readPoint")));

    assert!(r.entities().constants().contains(name(&pkb, "0").raw()));
    assert!(r.entities().constants().contains(name(&pkb, "1").raw()));
}

// ============================================================================
// Follows and Parent
// ============================================================================

#[test]
fn follows_holds_between_list_neighbours_only() {
    let pkb = centroid();
    let r = pkb.read();

    assert!(r.follows().follows(10, 11));
    assert!(r.follows().follows(14, 19));
    assert!(!r.follows().follows(10, 12));
    // Crossing a container boundary is not Follows.
    assert!(!r.follows().follows(18, 19));
    assert!(!r.follows().follows(20, 21));

    assert!(r.follows().follows_star(10, 23));
    assert!(r.follows().follows_star(11, 19));
    assert!(!r.follows().follows_star(23, 10));
    // Irreflexive.
    assert!(!r.follows().follows_star(14, 14));
}

#[test]
fn nothing_follows_the_last_statement_of_a_list() {
    let pkb = centroid();
    let r = pkb.read();

    // 18 ends the while body, 22 the else branch, 23 the procedure.
    for s in [18, 22, 23] {
        assert!(r.follows().rel().star().values_of(s).next().is_none());
    }
}

#[test]
fn parent_relates_containers_to_direct_children() {
    let pkb = centroid();
    let r = pkb.read();

    assert!(r.parent().parent(14, 16));
    let children: Vec<u32> = r.parent().children_of(19).collect();
    assert_eq!(children, vec![20, 21, 22]);

    assert!(r.parent().parent_star(19, 22));
    assert!(!r.parent().parent(14, 19));
    assert!(!r.parent().parent_star(14, 19));
    // Only one nesting level here, so base and star agree.
    assert_eq!(
        r.parent().descendants_of(14).collect::<Vec<_>>(),
        r.parent().children_of(14).collect::<Vec<_>>()
    );
}

// ============================================================================
// Call graph
// ============================================================================

#[test]
fn call_graph_and_its_closure() {
    let pkb = centroid();
    let r = pkb.read();
    let main = name(&pkb, "main");
    let centroid = name(&pkb, "computeCentroid");
    let read_point = name(&pkb, "readPoint");

    assert!(r.calls().calls(main, centroid));
    assert!(r.calls().calls(centroid, read_point));
    assert!(!r.calls().calls(main, read_point));
    assert!(r.calls().calls_star(main, read_point));
}

#[test]
fn duplicate_procedure_is_rejected() {
    let program = parse_program("procedure a { x = 1; } procedure a { y = 2; }").unwrap();
    assert_eq!(
        Pkb::build(program).unwrap_err(),
        PkbError::DuplicateProcedure("a".to_string())
    );
}

#[test]
fn undefined_callee_is_rejected() {
    let program = parse_program("procedure a { call ghost; }").unwrap();
    assert_eq!(
        Pkb::build(program).unwrap_err(),
        PkbError::UndefinedCallee {
            caller: "a".to_string(),
            callee: "ghost".to_string(),
        }
    );
}

#[test]
fn self_call_is_rejected() {
    let program = parse_program("procedure a { call a; }").unwrap();
    assert_eq!(
        Pkb::build(program).unwrap_err(),
        PkbError::RecursiveProcedure("a".to_string())
    );
}

#[test]
fn mutual_recursion_is_reported_as_a_cycle() {
    let program =
        parse_program("procedure a { call b; } procedure b { call a; }").unwrap();
    assert_eq!(
        Pkb::build(program).unwrap_err(),
        PkbError::CallCycle(vec!["a".to_string(), "b".to_string()])
    );
}

#[test]
fn cycle_report_excludes_procedures_that_only_call_into_it() {
    // c never resolves either, but it is not on the a-b cycle.
    let program = parse_program(
        "procedure a { call b; } procedure b { call a; } procedure c { call a; }",
    )
    .unwrap();
    assert_eq!(
        Pkb::build(program).unwrap_err(),
        PkbError::CallCycle(vec!["a".to_string(), "b".to_string()])
    );
}

// ============================================================================
// Next and Next*
// ============================================================================

#[test]
fn next_covers_straight_line_branch_and_loop_back_edges() {
    let pkb = centroid();
    let r = pkb.read();

    // Straight-line run into the while head.
    assert!(r.next().next(10, 11));
    assert!(r.next().next(13, 14));
    // Loop entry, loop-back and loop exit.
    assert!(r.next().next(14, 15));
    assert!(r.next().next(18, 14));
    assert!(r.next().next(14, 19));
    // Branch fan-out and rejoin.
    assert!(r.next().next(19, 20));
    assert!(r.next().next(19, 21));
    assert!(r.next().next(20, 23));
    assert!(r.next().next(22, 23));

    assert!(!r.next().next(18, 19));
    // Control flow never crosses a procedure boundary.
    assert!(!r.next().next(3, 4));
    assert!(!r.next().next(9, 10));
}

#[test]
fn next_star_is_reflexive_exactly_on_loop_paths() {
    let pkb = centroid();
    let r = pkb.read();

    for s in [14, 15, 16, 17, 18] {
        assert!(r.next().next_star(s, s), "stmt {s} sits on the loop");
    }
    for s in [10, 11, 12, 13, 19, 20, 21, 22, 23] {
        assert!(!r.next().next_star(s, s), "stmt {s} is not on a cycle");
    }

    assert!(r.next().next_star(10, 23));
    assert!(r.next().next_star(16, 15));
    assert!(!r.next().next_star(23, 10));
    assert!(!r.next().next_star(20, 21));
}

// ============================================================================
// Modifies and Uses
// ============================================================================

#[test]
fn modifies_folds_containers_and_calls() {
    let pkb = centroid();
    let r = pkb.read();
    let count = name(&pkb, "count");
    let cen_x = name(&pkb, "cenX");
    let x = name(&pkb, "x");
    let flag = name(&pkb, "flag");

    assert!(r.modifies().stmt_modifies(10, count));
    assert!(!r.modifies().stmt_modifies(10, cen_x));

    // The while folds in its body, including the nested call's writes.
    assert!(r.modifies().stmt_modifies(14, count));
    assert!(r.modifies().stmt_modifies(14, x));
    assert!(!r.modifies().stmt_modifies(14, flag));

    // A call statement writes whatever the callee writes, transitively.
    assert!(r.modifies().stmt_modifies(2, count));
    assert!(r.modifies().stmt_modifies(2, x));

    assert!(r.modifies().proc_modifies(name(&pkb, "readPoint"), x));
    assert!(r.modifies().proc_modifies(name(&pkb, "main"), count));
    assert!(!r.modifies().proc_modifies(name(&pkb, "printResults"), flag));
}

#[test]
fn uses_includes_conditions_and_callee_reads() {
    let pkb = centroid();
    let r = pkb.read();
    let count = name(&pkb, "count");
    let cen_x = name(&pkb, "cenX");
    let x = name(&pkb, "x");
    let flag = name(&pkb, "flag");

    assert!(r.uses().stmt_uses(15, count));
    assert!(r.uses().stmt_uses(23, cen_x));
    assert!(!r.uses().stmt_uses(23, count));

    // The while condition reads x; the if folds its else branch.
    assert!(r.uses().stmt_uses(14, x));
    assert!(r.uses().stmt_uses(19, count));
    assert!(r.uses().stmt_uses(19, cen_x));
    assert!(!r.uses().stmt_uses(19, x));

    // print flag at 6, surfaced through the call at 3.
    assert!(r.uses().stmt_uses(6, flag));
    assert!(r.uses().stmt_uses(3, flag));
    assert!(r.uses().proc_uses(name(&pkb, "main"), flag));
    // readPoint only reads input.
    assert!(
        r.uses()
            .procs()
            .values_of(name(&pkb, "readPoint"))
            .next()
            .is_none()
    );
}

// ============================================================================
// Affects
// ============================================================================

#[test]
fn affects_follows_definition_free_paths() {
    let pkb = centroid();
    let r = pkb.read();

    // count = 0 at 10 reaches both its readers.
    assert!(r.affects().affects(10, 15));
    assert!(r.affects().affects(10, 21));
    // Around the loop, including back onto itself.
    assert!(r.affects().affects(15, 15));
    assert!(r.affects().affects(16, 16));
    assert!(r.affects().affects(11, 16));
    assert!(r.affects().affects(16, 21));
    assert!(r.affects().affects(21, 23));

    // 16 reads cenX and x, not count.
    assert!(!r.affects().affects(10, 16));
    // flag = 1 at 20 is never read by an assignment.
    assert!(r.affects().pairs().values_of(20).next().is_none());
    // The call at 2 reaches a write to flag, killing the definition from 1
    // before any assignment could read it.
    assert!(r.affects().pairs().values_of(1).next().is_none());
}

#[test]
fn assignment_to_itself_through_a_kill_is_blocked() {
    let program = parse_program(
        "procedure p { a = 1; b = a; a = 2; c = a; }",
    )
    .unwrap();
    let pkb = Pkb::build(program).unwrap();
    let r = pkb.read();

    assert!(r.affects().affects(1, 2));
    assert!(r.affects().affects(3, 4));
    // The write at 3 kills the value from 1 before 4 reads it.
    assert!(!r.affects().affects(1, 4));
}

// ============================================================================
// Pattern index
// ============================================================================

#[test]
fn pattern_index_stores_postfix_and_control_vars() {
    let pkb = centroid();
    let r = pkb.read();

    let row = r.patterns().assign(23).unwrap();
    assert_eq!(row.lhs, name(&pkb, "normSq"));
    assert_eq!(row.postfix, "cenX cenX * cenY cenY * +");

    let mut to_cen_x: Vec<u32> = r.patterns().assigns_to(name(&pkb, "cenX")).collect();
    to_cen_x.sort_unstable();
    assert_eq!(to_cen_x, vec![11, 16, 21]);

    let mut while_vars: Vec<NameId> = r.patterns().while_vars().values_of(14).collect();
    while_vars.sort_unstable();
    let mut expected = vec![name(&pkb, "x"), name(&pkb, "y")];
    expected.sort_unstable();
    assert_eq!(while_vars, expected);

    assert_eq!(
        r.patterns().if_vars().values_of(19).collect::<Vec<_>>(),
        vec![name(&pkb, "count")]
    );
}
