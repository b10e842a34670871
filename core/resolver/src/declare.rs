//! Initial population of the symbol tables from the built tree.

use cil_ast::nodes::{Conditional, Expr, ExprFlavor, ExprItem, Flavor, Statement};

use crate::datum::Datum;
use crate::db::PolicyDb;
use crate::errors::ResolveResult;
use crate::symtab::{ScopeKey, SymIndex};

/// Declares every named statement of the tree, parents before children.
///
/// With `preserve_tunables` set, tunables become booleans and `tunableif`s
/// become `booleanif`s before anything is declared.
pub(crate) fn declare_tree(db: &mut PolicyDb) -> ResolveResult<()> {
    let root = db.arena.root();
    for node in db.arena.descendants(root) {
        if db.options.preserve_tunables {
            preserve_tunable(db, node);
        }
        if db
            .arena
            .statement(node)
            .is_some_and(Statement::is_declaration)
        {
            db.add_decl(node)?;
        }
    }
    if db.lookup(ScopeKey::Root, SymIndex::Roles, "object_r").is_none() {
        let mut object_r = Datum::new("object_r", Flavor::Role);
        object_r.scope = Some((ScopeKey::Root, SymIndex::Roles));
        let id = db.alloc(object_r);
        db.symtabs.insert(ScopeKey::Root, SymIndex::Roles, "object_r", id);
    }
    Ok(())
}

fn preserve_tunable(db: &mut PolicyDb, node: cil_ast::nodes::NodeId) {
    let replacement = match db.arena.statement(node) {
        Some(Statement::Tunable(decl)) => Statement::Boolean(decl.clone()),
        Some(Statement::TunableIf(cond)) => Statement::BooleanIf(Conditional {
            condition: as_boolean(&cond.condition),
            preserved_tunable: true,
        }),
        _ => return,
    };
    db.arena.set_statement(node, replacement);
}

fn as_boolean(expr: &Expr) -> Expr {
    Expr {
        flavor: ExprFlavor::Boolean,
        operator: expr.operator,
        items: expr
            .items
            .iter()
            .map(|item| match item {
                ExprItem::List(inner) => ExprItem::List(as_boolean(inner)),
                other => other.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ResolverOptions;
    use cil_ast::builder::Builder;

    fn declared(source: &str, options: ResolverOptions) -> ResolveResult<PolicyDb> {
        let mut builder = Builder::new();
        builder.add_source_code("test.cil", source);
        let arena = builder.build_ast().unwrap();
        let mut db = PolicyDb::new(arena, options);
        declare_tree(&mut db)?;
        Ok(db)
    }

    #[test]
    fn nested_declarations_get_their_block_scope() {
        let db = declared("(block a (block b (type t)))", ResolverOptions::default()).unwrap();
        let t = db.lookup_path("a.b.t", SymIndex::Types).unwrap();
        assert_eq!(db.qualified_name(t), "a.b.t");
        assert!(db.lookup(ScopeKey::Root, SymIndex::Types, "t").is_none());
    }

    #[test]
    fn class_permissions_are_scoped_to_the_class() {
        let db = declared("(class file (read write))", ResolverOptions::default()).unwrap();
        let file = db.lookup(ScopeKey::Root, SymIndex::Classes, "file").unwrap();
        assert!(db.lookup(ScopeKey::Datum(file), SymIndex::Perms, "read").is_some());
        assert!(db.lookup(ScopeKey::Root, SymIndex::Perms, "read").is_none());
    }

    #[test]
    fn duplicate_type_is_a_conflict() {
        let err = declared("(type t) (type t)", ResolverOptions::default()).unwrap_err();
        assert!(err.to_string().contains("re-declaration of type `t`"), "{err}");
    }

    #[test]
    fn object_r_is_provided_when_missing() {
        let db = declared("(type t)", ResolverOptions::default()).unwrap();
        let object_r = db.lookup(ScopeKey::Root, SymIndex::Roles, "object_r").unwrap();
        assert!(db.datum(object_r).unwrap().nodes.is_empty());

        let db = declared("(role object_r)", ResolverOptions::default()).unwrap();
        let object_r = db.lookup(ScopeKey::Root, SymIndex::Roles, "object_r").unwrap();
        assert_eq!(db.datum(object_r).unwrap().nodes.len(), 1);
    }

    #[test]
    fn preserved_tunables_become_booleans() {
        let options = ResolverOptions {
            preserve_tunables: true,
            ..ResolverOptions::default()
        };
        let db = declared("(tunable tun true) (tunableif tun (true (type t)))", options).unwrap();
        assert!(db.lookup(ScopeKey::Root, SymIndex::Bools, "tun").is_some());
        assert!(db.lookup(ScopeKey::Root, SymIndex::Tunables, "tun").is_none());
        let ifs = db
            .arena()
            .find_nodes(|s| matches!(s, Statement::BooleanIf(c) if c.preserved_tunable));
        assert_eq!(ifs.len(), 1);
        // branches of a booleanif declare into the enclosing scope
        assert!(db.lookup(ScopeKey::Root, SymIndex::Types, "t").is_some());
    }
}
