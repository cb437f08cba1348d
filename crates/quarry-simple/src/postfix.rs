//! Postfix rendering of expressions, the canonical form used by assignment
//! pattern matching.
//!
//! A subtree of an expression is exactly a contiguous run of its postfix
//! tokens, so "does this assignment contain that subexpression" reduces to a
//! token-window comparison over the two rendered strings.

use crate::ast::Expr;

/// Render an expression as space-separated postfix (reverse Polish) tokens.
///
/// `v + x * y + z * t` renders as `v x y * + z t * +`.
pub fn postfix_of(expr: &Expr) -> String {
    let mut out = String::new();
    push_postfix(expr, &mut out);
    out
}

fn push_postfix(expr: &Expr, out: &mut String) {
    match expr {
        Expr::Var { name } => push_token(out, name),
        Expr::Const { value } => push_token(out, value),
        Expr::Binary { op, lhs, rhs } => {
            push_postfix(lhs, out);
            push_postfix(rhs, out);
            push_token(out, op.symbol());
        }
    }
}

fn push_token(out: &mut String, token: &str) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(token);
}

/// Whether `pattern` occurs as a complete subtree of `target`, both in the
/// form produced by [`postfix_of`]. Comparison is per token, so `x` never
/// matches inside `x1`.
pub fn contains_subexpr(target: &str, pattern: &str) -> bool {
    let hay: Vec<&str> = target.split_whitespace().collect();
    let needle: Vec<&str> = pattern.split_whitespace().collect();
    if needle.is_empty() {
        return true;
    }
    if needle.len() > hay.len() {
        return false;
    }
    hay.windows(needle.len()).any(|w| w == needle.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expr;

    fn postfix(src: &str) -> String {
        postfix_of(&parse_expr(src).unwrap())
    }

    #[test]
    fn renders_left_to_right_with_precedence() {
        assert_eq!(postfix("v + x * y + z * t"), "v x y * + z t * +");
        assert_eq!(postfix("a - b + c"), "a b - c +");
        assert_eq!(postfix("(a + b) * c"), "a b + c *");
        assert_eq!(postfix("count + 1"), "count 1 +");
    }

    #[test]
    fn subtree_windows_match() {
        let target = postfix("v + x * y + z * t");
        for sub in ["v", "x y *", "v x y * +", "z t *", &target] {
            assert!(contains_subexpr(&target, sub), "expected {sub:?} in {target:?}");
        }
    }

    #[test]
    fn non_subtrees_do_not_match() {
        let target = postfix("v + x * y + z * t");
        // `v + x` parses fine on its own but is no subtree of the target,
        // which groups as `(v + (x * y)) + (z * t)`.
        for non_sub in [postfix("v + x"), postfix("y + z"), postfix("x * t")] {
            assert!(!contains_subexpr(&target, &non_sub), "{non_sub:?} unexpectedly matched");
        }
    }

    #[test]
    fn tokens_never_match_partially() {
        let target = postfix("x1 + y");
        assert!(!contains_subexpr(&target, "x"));
        assert!(contains_subexpr(&target, "x1"));
    }

    #[test]
    fn oversized_patterns_never_match() {
        assert!(!contains_subexpr("x", "x y +"));
    }
}
