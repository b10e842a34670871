//! Deep copy of statement subtrees.
//!
//! Used to splice inherited blocks, `in` bodies, tunable branches and macro
//! bodies. Copies are unresolved: every reference is looked up again from the
//! copy's own position. Declarations made by copied nodes are entered into the
//! destination scope as they are created.

use cil_ast::nodes::{ArgValue, NodeId, Statement};

use crate::db::PolicyDb;
use crate::diagnostics::Severity;
use crate::errors::{ResolveError, ResolveResult};
use crate::symtab::SymIndex;

/// Appends copies of the children of `source` to `dest`.
pub(crate) fn copy_children(db: &mut PolicyDb, source: NodeId, dest: NodeId) -> ResolveResult<()> {
    let for_inherit = matches!(db.arena.statement(dest), Some(Statement::BlockInherit(_)));
    let children = db.arena.children(source).to_vec();
    for child in children {
        copy_node(db, child, dest, for_inherit)?;
    }
    Ok(())
}

fn copy_node(db: &mut PolicyDb, orig: NodeId, parent: NodeId, for_inherit: bool) -> ResolveResult<()> {
    let Some(node) = db.arena.node(orig).cloned() else {
        return Ok(());
    };
    let location = node.location;

    match &node.statement {
        Statement::BlockAbstract(_) if for_inherit => return Ok(()),
        Statement::Macro(m) => {
            let scope = db.scope_for(parent);
            if let Some(existing) = db.symtabs.get(scope, SymIndex::Blocks, &m.name) {
                if !for_inherit {
                    return Err(ResolveError::Conflict {
                        reason: format!(
                            "re-declaration of macro `{}` is only allowed when inheriting a block",
                            m.name
                        ),
                        location,
                        previous: db.datum_location(existing),
                    });
                }
                // the inheriting block keeps its own definition
                return Ok(());
            }
        }
        _ => {}
    }

    let statement = copy_statement(db, &node.statement);
    let new = db.arena.add_node(parent, location.clone(), statement);

    match &node.statement {
        Statement::Block(name) => {
            let scope = db.scope_for(parent);
            match db.symtabs.get(scope, SymIndex::Blocks, name) {
                Some(existing) if db.node_flavor_of(existing) != Some(cil_ast::nodes::Flavor::Block) => {
                    return Err(ResolveError::Conflict {
                        reason: format!("block `{name}` being copied conflicts with an existing declaration"),
                        location,
                        previous: db.datum_location(existing),
                    });
                }
                Some(existing) if for_inherit => {
                    db.report(Severity::Warning, Some(&location), format!("block {name} being copied"));
                    db.attach(existing, new);
                }
                Some(existing) => {
                    return Err(ResolveError::Conflict {
                        reason: format!("re-declaration of block `{name}` is only allowed when inheriting a block"),
                        location,
                        previous: db.datum_location(existing),
                    });
                }
                None => {
                    db.add_decl(new)?;
                }
            }
        }
        statement if statement.is_declaration() => {
            db.add_decl(new)?;
        }
        Statement::BlockInherit(target) => {
            if let Some(block) = target.datum.and_then(|b| db.datum_mut(b)) {
                block.state.inheritors.push(new);
            }
        }
        _ => {}
    }

    let children = db.arena.children(orig).to_vec();
    for child in children {
        copy_node(db, child, new, for_inherit)?;
    }
    Ok(())
}

/// Unresolved copy of a payload.
///
/// `blockinherit` keeps its link to the inherited block. A `call` keeps its
/// macro and expansion state; its inline arguments get fresh anonymous nodes.
fn copy_statement(db: &mut PolicyDb, statement: &Statement) -> Statement {
    match statement {
        Statement::BlockInherit(target) => Statement::BlockInherit(target.clone()),
        Statement::Call(call) => {
            let mut copy = call.clone();
            for arg in &mut copy.bindings {
                match &mut arg.value {
                    ArgValue::Named(n) => n.datum = None,
                    ArgValue::Anonymous(anon) => {
                        if let Some(fresh) = copy_anonymous(db, *anon) {
                            *anon = fresh;
                        }
                    }
                }
            }
            Statement::Call(copy)
        }
        other => {
            let mut copy = other.clone();
            copy.clear_bindings();
            copy
        }
    }
}

fn copy_anonymous(db: &mut PolicyDb, anon: cil_ast::nodes::DatumId) -> Option<cil_ast::nodes::DatumId> {
    let node = db.anonymous_node(anon)?;
    let mut statement = db.arena.statement(node)?.clone();
    statement.clear_bindings();
    let location = db.arena.location(node);
    Some(db.alloc_anonymous(location, statement))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::declare_tree;
    use crate::options::ResolverOptions;
    use crate::symtab::ScopeKey;
    use cil_ast::builder::Builder;
    use cil_ast::nodes::Flavor;

    fn declared(source: &str) -> PolicyDb {
        let mut builder = Builder::new();
        builder.add_source_code("test.cil", source);
        let mut db = PolicyDb::new(builder.build_ast().unwrap(), ResolverOptions::default());
        declare_tree(&mut db).unwrap();
        db
    }

    fn block_node(db: &PolicyDb, name: &str) -> NodeId {
        let block = db.lookup(ScopeKey::Root, SymIndex::Blocks, name).unwrap();
        db.datum(block).unwrap().first_node().unwrap()
    }

    #[test]
    fn copies_declare_into_the_destination() {
        let mut db = declared("(block a (type t) (allow t self (file (read)))) (block b)");
        let (a, b) = (block_node(&db, "a"), block_node(&db, "b"));
        copy_children(&mut db, a, b).unwrap();
        assert_eq!(db.arena().children(b).len(), 2);
        let copied = db.lookup_path("b.t", SymIndex::Types).unwrap();
        assert_ne!(Some(copied), db.lookup_path("a.t", SymIndex::Types));
        let allow = db.arena().children(b)[1];
        assert_eq!(db.arena().flavor(allow), Some(Flavor::Allow));
    }

    #[test]
    fn inheriting_skips_blockabstract() {
        let mut db = declared("(block a (blockabstract a) (type t)) (block b (blockinherit a))");
        let a = block_node(&db, "a");
        let inherit = db.arena().children(block_node(&db, "b"))[0];
        copy_children(&mut db, a, inherit).unwrap();
        let flavors: Vec<_> = db
            .arena()
            .children(inherit)
            .iter()
            .map(|n| db.arena().flavor(*n).unwrap())
            .collect();
        assert_eq!(flavors, vec![Flavor::Type]);
    }

    #[test]
    fn nested_block_redeclaration_needs_inheritance() {
        let mut db = declared("(block a (block inner)) (block b (block inner))");
        let (a, b) = (block_node(&db, "a"), block_node(&db, "b"));
        let err = copy_children(&mut db, a, b).unwrap_err();
        assert!(err.to_string().contains("only allowed when inheriting"), "{err}");
    }

    #[test]
    fn inherited_macro_keeps_the_local_definition() {
        let mut db = declared("(block a (macro m () (type x))) (block b (blockinherit a) (macro m () (type y)))");
        let a = block_node(&db, "a");
        let inherit = db.arena().children(block_node(&db, "b"))[0];
        copy_children(&mut db, a, inherit).unwrap();
        assert!(db.arena().children(inherit).is_empty());
    }

    #[test]
    fn copies_are_unbound() {
        let mut db = declared("(type t) (block a (typepermissive t)) (block b)");
        let a = block_node(&db, "a");
        let permissive = db.arena().children(a)[0];
        let t = db.lookup(ScopeKey::Root, SymIndex::Types, "t").unwrap();
        if let Some(Statement::TypePermissive(n)) = db.arena.statement_mut(permissive) {
            n.datum = Some(t);
        }
        let b = block_node(&db, "b");
        copy_children(&mut db, a, b).unwrap();
        let copy = db.arena().children(b)[0];
        assert!(matches!(db.arena().statement(copy), Some(Statement::TypePermissive(n)) if n.datum.is_none()));
    }
}
