//! Dependency collection: which (store, tag) pairs an expression needs
//!
//! Pure traversal, no I/O. The resolver unions the result across every root
//! in a spec before fetching, so a tag referenced from several outputs is
//! requested once.

use crate::ast::Expr;
use std::collections::HashSet;

/// A remote value required by an expression: store key (`None` for the
/// default store) and tag identifier.
pub type Dependency = (Option<String>, String);

/// Collect the dependency set of a single expression
pub fn collect(expr: &Expr) -> HashSet<Dependency> {
    let mut out = HashSet::new();
    collect_into(expr, &mut out);
    out
}

/// Collect the union of dependency sets over several expressions
pub fn collect_all<'a>(exprs: impl IntoIterator<Item = &'a Expr>) -> HashSet<Dependency> {
    let mut out = HashSet::new();
    for expr in exprs {
        collect_into(expr, &mut out);
    }
    out
}

fn collect_into(expr: &Expr, out: &mut HashSet<Dependency>) {
    match expr {
        Expr::Leaf { tag, store } => {
            out.insert((store.clone(), tag.clone()));
        }
        Expr::Literal { .. } => {}
        Expr::Binary { left, right, .. } => {
            collect_into(left, out);
            collect_into(right, out);
        }
        Expr::Unary { operand, .. } => {
            collect_into(operand, out);
        }
        Expr::Apply { args, .. } => {
            for arg in args {
                collect_into(arg, out);
            }
        }
    }
}
