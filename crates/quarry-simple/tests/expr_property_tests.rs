use proptest::prelude::*;
use quarry_simple::{contains_subexpr, parse_expr, postfix_of, BinOp, Expr};

fn arb_binop() -> impl Strategy<Value = BinOp> {
    prop_oneof![
        Just(BinOp::Add),
        Just(BinOp::Sub),
        Just(BinOp::Mul),
        Just(BinOp::Div),
        Just(BinOp::Mod),
    ]
}

fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        "[a-z][a-z0-9]{0,2}".prop_map(|name| Expr::Var { name }),
        "0|[1-9][0-9]{0,2}".prop_map(|value| Expr::Const { value }),
    ];
    leaf.prop_recursive(5, 48, 2, |inner| {
        (arb_binop(), inner.clone(), inner).prop_map(|(op, lhs, rhs)| Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    })
}

/// Render with every binary node parenthesised, so the text is unambiguous
/// regardless of precedence.
fn render_full_parens(expr: &Expr) -> String {
    match expr {
        Expr::Var { name } => name.clone(),
        Expr::Const { value } => value.clone(),
        Expr::Binary { op, lhs, rhs } => format!(
            "({} {} {})",
            render_full_parens(lhs),
            op.symbol(),
            render_full_parens(rhs)
        ),
    }
}

fn collect_subtrees<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    out.push(expr);
    if let Expr::Binary { lhs, rhs, .. } = expr {
        collect_subtrees(lhs, out);
        collect_subtrees(rhs, out);
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn fully_parenthesised_text_parses_back(expr in arb_expr()) {
        let rendered = render_full_parens(&expr);
        let reparsed = parse_expr(&rendered).expect("rendered expression parses");
        prop_assert_eq!(reparsed, expr);
    }

    #[test]
    fn every_subtree_is_found_by_window_matching(
        (expr, pick) in (arb_expr(), any::<prop::sample::Index>())
    ) {
        let mut subs = Vec::new();
        collect_subtrees(&expr, &mut subs);
        let sub = subs[pick.index(subs.len())];
        prop_assert!(contains_subexpr(&postfix_of(&expr), &postfix_of(sub)));
    }

    #[test]
    fn window_matching_agrees_with_structural_containment(
        (target, probe) in (arb_expr(), arb_expr())
    ) {
        let probe_postfix = postfix_of(&probe);
        let mut subs = Vec::new();
        collect_subtrees(&target, &mut subs);
        let structural = subs.iter().any(|s| postfix_of(s) == probe_postfix);
        prop_assert_eq!(
            contains_subexpr(&postfix_of(&target), &probe_postfix),
            structural
        );
    }
}
