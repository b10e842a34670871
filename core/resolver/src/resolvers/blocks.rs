//! Block inheritance, abstract blocks and `in` statements.

use cil_ast::nodes::{Flavor, NodeId, Statement};

use crate::copy_ast::copy_children;
use crate::db::PolicyDb;
use crate::errors::{ResolveError, ResolveResult};
use crate::name_resolver::{bind, resolve_name};
use crate::symtab::SymIndex;

/// Links a `blockinherit` to the block it names.
pub(crate) fn link_blockinherit(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(Statement::BlockInherit(mut target)) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    if target.is_resolved() {
        return Ok(());
    }
    let block = bind(db, node, &mut target, SymIndex::Blocks)?;
    if db.node_flavor_of(block) != Some(Flavor::Block) {
        return Err(ResolveError::invalid(
            format!("{} is not a block", target.name),
            &db.arena.location(node),
        ));
    }
    db.arena.set_statement(node, Statement::BlockInherit(target));
    if let Some(datum) = db.datum_mut(block)
        && !datum.state.inheritors.contains(&node)
    {
        datum.state.inheritors.push(node);
    }
    Ok(())
}

/// Copies the block owned by `node` into every `blockinherit` naming it.
pub(crate) fn copy_blockinherit(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(block) = db.decl_of(node) else {
        return Ok(());
    };
    let Some(datum) = db.datum(block) else {
        return Ok(());
    };
    if datum.first_node() != Some(node) {
        return Ok(());
    }
    let inheritors = datum.state.inheritors.clone();
    for inheritor in inheritors {
        tracing::debug!(block = %db.qualified_name(block), inheritor, "copying inherited block");
        copy_children(db, node, inheritor)?;
    }
    Ok(())
}

pub(crate) fn resolve_blockabstract(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(Statement::BlockAbstract(mut target)) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    let block = bind(db, node, &mut target, SymIndex::Blocks)?;
    if db.node_flavor_of(block) != Some(Flavor::Block) {
        return Err(ResolveError::invalid(
            format!("{} is not a block", target.name),
            &db.arena.location(node),
        ));
    }
    db.arena.set_statement(node, Statement::BlockAbstract(target));
    if let Some(datum) = db.datum_mut(block) {
        datum.state.is_abstract = true;
    }
    Ok(())
}

/// Blocks nested in an abstract block are abstract too.
pub(crate) fn mark_abstract_subtrees(db: &mut PolicyDb) {
    let blocks = db.arena.find_nodes(|s| matches!(s, Statement::Block(_)));
    let mut nested = Vec::new();
    for node in blocks {
        let is_abstract = db
            .decl_of(node)
            .and_then(|b| db.datum(b))
            .is_some_and(|d| d.state.is_abstract);
        if !is_abstract {
            continue;
        }
        nested.extend(
            db.arena
                .descendants(node)
                .into_iter()
                .filter(|n| matches!(db.arena.statement(*n), Some(Statement::Block(_))))
                .filter_map(|n| db.decl_of(n)),
        );
    }
    for block in nested {
        if let Some(datum) = db.datum_mut(block) {
            datum.state.is_abstract = true;
        }
    }
}

/// Splices the body of one `in` statement into its target.
fn apply_in(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(Statement::In(stmt)) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    let target = resolve_name(db, node, &stmt.target, SymIndex::Blocks)?;
    let Some(datum) = db.datum(target) else {
        return Ok(());
    };
    if db.node_flavor_of(target) == Some(Flavor::Optional) && datum.nodes.len() > 1 {
        return Err(ResolveError::invalid(
            "multiple optional blocks referred to by in-statement",
            &db.arena.location(node),
        ));
    }
    let Some(dest) = datum.first_node() else {
        return Ok(());
    };
    copy_children(db, node, dest)?;
    db.destroy_children(node);
    Ok(())
}

/// Applies gathered `in` statements until none is left.
///
/// Each round applies every statement whose target resolves. A round in which
/// nothing could be applied fails with the first lookup error.
pub(crate) fn apply_ins(db: &mut PolicyDb, ins: &mut Vec<NodeId>) -> ResolveResult<()> {
    while !ins.is_empty() {
        let mut progress = false;
        let mut first_missing = None;
        let mut pending = Vec::new();
        for node in std::mem::take(ins) {
            if !db.arena.contains(node) {
                continue;
            }
            match apply_in(db, node) {
                Ok(()) => progress = true,
                Err(err) if err.is_recoverable() => {
                    first_missing.get_or_insert(err);
                    pending.push(node);
                }
                Err(err) => return Err(err),
            }
        }
        *ins = pending;
        if !progress {
            if let Some(err) = first_missing {
                return Err(err);
            }
            break;
        }
    }
    Ok(())
}
