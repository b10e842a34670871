//! Name binding inside prefix expressions.

use cil_ast::nodes::{DatumId, Expr, ExprFlavor, ExprItem, ExprOperator, Flavor, NodeId};

use crate::db::PolicyDb;
use crate::errors::{ResolveError, ResolveResult};
use crate::name_resolver::bind;
use crate::symtab::SymIndex;

/// Table the names of an expression of `flavor` live in.
///
/// Permissions depend on the class and constraint structure holds no names,
/// so neither has a table.
fn table_of(flavor: ExprFlavor) -> Option<SymIndex> {
    match flavor {
        ExprFlavor::Type => Some(SymIndex::Types),
        ExprFlavor::Role => Some(SymIndex::Roles),
        ExprFlavor::User => Some(SymIndex::Users),
        ExprFlavor::Boolean => Some(SymIndex::Bools),
        ExprFlavor::Tunable => Some(SymIndex::Tunables),
        ExprFlavor::Category => Some(SymIndex::Cats),
        ExprFlavor::Permission | ExprFlavor::Constraint | ExprFlavor::Literal => None,
    }
}

/// Binds every name of `expr` as seen from `origin`.
pub(crate) fn resolve_expr(db: &PolicyDb, origin: NodeId, expr: &mut Expr) -> ResolveResult<()> {
    let in_range = expr.operator == Some(ExprOperator::Range);
    let table = table_of(expr.flavor);
    for item in &mut expr.items {
        match item {
            ExprItem::Name(name) => {
                let Some(sym) = table else {
                    continue;
                };
                let datum = bind(db, origin, name, sym)?;
                if in_range && db.node_flavor_of(datum) == Some(Flavor::CategorySet) {
                    return Err(ResolveError::invalid(
                        format!("category set `{}` not allowed in category range", name.name),
                        &db.arena.location(origin),
                    ));
                }
            }
            ExprItem::List(inner) => resolve_expr(db, origin, inner)?,
            ExprItem::Operand(_) => {}
        }
    }
    Ok(())
}

/// Bound datums of the names of `expr` whose subexpression has `flavor`.
pub(crate) fn bound_names(expr: &Expr, flavor: ExprFlavor) -> Vec<DatumId> {
    let mut out = Vec::new();
    for item in &expr.items {
        match item {
            ExprItem::Name(n) if expr.flavor == flavor => out.extend(n.datum),
            ExprItem::List(inner) => out.extend(bound_names(inner, flavor)),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::declare_tree;
    use crate::options::ResolverOptions;
    use cil_ast::builder::Builder;
    use cil_ast::nodes::Statement;

    fn declared(source: &str) -> PolicyDb {
        let mut builder = Builder::new();
        builder.add_source_code("test.cil", source);
        let mut db = PolicyDb::new(builder.build_ast().unwrap(), ResolverOptions::default());
        declare_tree(&mut db).unwrap();
        db
    }

    fn catset_expr(db: &PolicyDb, name: &str) -> (NodeId, Expr) {
        let node = db.arena().find_nodes(|s| matches!(s, Statement::CategorySet(c) if c.name == name))[0];
        match db.arena().statement(node) {
            Some(Statement::CategorySet(c)) => (node, c.categories.clone()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn nested_lists_are_bound() {
        let db = declared("(category c0) (category c1) (category c2) (categoryset cs (c0 (range c1 c2)))");
        let (node, mut expr) = catset_expr(&db, "cs");
        resolve_expr(&db, node, &mut expr).unwrap();
        assert_eq!(bound_names(&expr, ExprFlavor::Category).len(), 3);
    }

    #[test]
    fn set_inside_range_is_rejected() {
        let db = declared(
            "(category c0) (category c1) (categoryset inner (c0)) (categoryset cs (range inner c1))",
        );
        let (node, mut expr) = catset_expr(&db, "cs");
        let err = resolve_expr(&db, node, &mut expr).unwrap_err();
        assert!(err.to_string().contains("not allowed in category range"), "{err}");
    }

    #[test]
    fn named_sets_may_be_referenced() {
        let db = declared("(category c0) (categoryset inner (c0)) (categoryset cs (inner))");
        let (node, mut expr) = catset_expr(&db, "cs");
        resolve_expr(&db, node, &mut expr).unwrap();
        let inner = db.lookup(crate::symtab::ScopeKey::Root, SymIndex::Cats, "inner");
        assert_eq!(bound_names(&expr, ExprFlavor::Category), vec![inner.unwrap()]);
    }

    #[test]
    fn missing_category_is_not_found() {
        let db = declared("(categoryset cs (c9))");
        let (node, mut expr) = catset_expr(&db, "cs");
        assert!(resolve_expr(&db, node, &mut expr).unwrap_err().is_recoverable());
    }
}
