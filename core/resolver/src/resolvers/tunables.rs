//! `tunableif` evaluation.

use cil_ast::nodes::{Expr, ExprItem, ExprOperator, NodeId, Statement};

use crate::copy_ast::copy_children;
use crate::db::PolicyDb;
use crate::errors::ResolveResult;
use crate::resolvers::expr::resolve_expr;

/// Replaces a `tunableif` by the statements of the branch its condition selects.
///
/// The branch is copied into the parent of the `tunableif`, which is left
/// without children.
pub(crate) fn resolve_tunif(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(Statement::TunableIf(mut conditional)) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    resolve_expr(db, node, &mut conditional.condition)?;
    let value = evaluate(db, &conditional.condition);
    db.arena.set_statement(node, Statement::TunableIf(conditional));

    let branch = db
        .arena
        .children(node)
        .iter()
        .take(2)
        .copied()
        .find(|c| db.arena.statement(*c) == Some(&Statement::CondBlock(value)));
    if let (Some(branch), Some(parent)) = (branch, db.arena.parent(node)) {
        copy_children(db, branch, parent)?;
    }
    db.destroy_children(node);
    Ok(())
}

fn evaluate(db: &PolicyDb, expr: &Expr) -> bool {
    let operand = |item: &ExprItem| match item {
        ExprItem::Name(name) => name
            .datum
            .and_then(|d| db.datum(d))
            .and_then(crate::datum::Datum::first_node)
            .and_then(|n| db.arena.statement(n))
            .is_some_and(|s| matches!(s, Statement::Tunable(t) if t.value)),
        ExprItem::List(inner) => evaluate(db, inner),
        ExprItem::Operand(_) => false,
    };
    let first = || expr.items.first().is_some_and(operand);
    let second = || expr.items.get(1).is_some_and(operand);
    match expr.operator {
        None => expr.items.iter().any(operand),
        Some(ExprOperator::Not) => !first(),
        Some(ExprOperator::And) => first() && second(),
        Some(ExprOperator::Or) => first() || second(),
        Some(ExprOperator::Xor | ExprOperator::Neq) => first() != second(),
        Some(ExprOperator::Eq) => first() == second(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::declare_tree;
    use crate::options::ResolverOptions;
    use crate::symtab::{ScopeKey, SymIndex};
    use cil_ast::builder::Builder;
    use cil_ast::nodes::Flavor;

    fn declared(source: &str) -> PolicyDb {
        let mut builder = Builder::new();
        builder.add_source_code("test.cil", source);
        let mut db = PolicyDb::new(builder.build_ast().unwrap(), ResolverOptions::default());
        declare_tree(&mut db).unwrap();
        db
    }

    fn run(source: &str) -> PolicyDb {
        let mut db = declared(source);
        for node in db.arena().find_nodes(|s| s.flavor() == Flavor::TunableIf) {
            resolve_tunif(&mut db, node).unwrap();
        }
        db
    }

    #[test]
    fn true_branch_is_spliced() {
        let db = run("(tunable on true) (tunableif on (true (type yes)) (false (type no)))");
        assert!(db.lookup(ScopeKey::Root, SymIndex::Types, "yes").is_some());
        assert!(db.lookup(ScopeKey::Root, SymIndex::Types, "no").is_none());
        let tunif = db.arena().find_nodes(|s| s.flavor() == Flavor::TunableIf)[0];
        assert!(db.arena().children(tunif).is_empty());
    }

    #[test]
    fn operators() {
        let db = run(
            "(tunable on true) (tunable off false) \
             (tunableif (and on (not off)) (true (type a))) \
             (tunableif (xor on on) (false (type b))) \
             (tunableif (eq off off) (true (type c))) \
             (tunableif (or off off) (true (type d)))",
        );
        for (name, present) in [("a", true), ("b", true), ("c", true), ("d", false)] {
            assert_eq!(
                db.lookup(ScopeKey::Root, SymIndex::Types, name).is_some(),
                present,
                "type {name}"
            );
        }
    }

    #[test]
    fn missing_branch_leaves_nothing() {
        let db = run("(tunable off false) (tunableif off (true (type a)))");
        assert!(db.lookup(ScopeKey::Root, SymIndex::Types, "a").is_none());
    }

    #[test]
    fn unknown_tunable_is_recoverable() {
        let mut db = declared("(tunableif nope (true (type a)))");
        let node = db.arena().find_nodes(|s| s.flavor() == Flavor::TunableIf)[0];
        assert!(resolve_tunif(&mut db, node).unwrap_err().is_recoverable());
    }
}
