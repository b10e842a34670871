//! Name resolution
//!
//! Finds the datum a name refers to from the position of the statement that
//! uses it. Unqualified names walk the enclosing scopes outwards and fall back
//! to the root tables:
//!
//! - a non-abstract `block` offers its own tables
//! - a `macro` offers its own tables
//! - a `call` offers its argument bindings first, which win over anything
//!   the macro body declares; names the body declares are then looked up on
//!   the caller side, everything else in the scopes around the macro
//!   declaration
//! - a `blockinherit` continues above itself and, failing that, above the
//!   inherited block
//!
//! Dotted names (`a.b.t`) walk block tables from the first segment, unless
//! qualified names are enabled, in which case they are plain keys.

use cil_ast::nodes::{Call, DatumId, NameRef, NodeId, Statement};

use crate::db::PolicyDb;
use crate::errors::{ResolveError, ResolveResult};
use crate::symtab::{ScopeKey, SymIndex};

/// Resolves `name` as seen from `origin`, returning aliases themselves.
pub(crate) fn resolve_name_keep_aliases(
    db: &PolicyDb,
    origin: NodeId,
    name: &str,
    sym: SymIndex,
) -> ResolveResult<DatumId> {
    let not_found = || ResolveError::NotFound {
        kind: sym.describe(),
        name: name.to_string(),
        location: db.arena.location(origin),
    };

    if db.options.qualified_names || !name.contains('.') {
        return resolve_from(db, db.arena.parent(origin), name, sym).ok_or_else(not_found);
    }

    let segments: Vec<&str> = name.split('.').filter(|s| !s.is_empty()).collect();
    let Some((last, blocks)) = segments.split_last() else {
        return Err(ResolveError::invalid(
            format!("invalid name `{name}`"),
            &db.arena.location(origin),
        ));
    };

    let mut scope = if name.starts_with('.') {
        ScopeKey::Root
    } else {
        let first = resolve_from(db, db.arena.parent(origin), blocks.first().unwrap_or(last), SymIndex::Blocks)
            .ok_or_else(not_found)?;
        match db.datum(first).and_then(|d| d.scope) {
            Some((scope, _)) => scope,
            None => return Err(not_found()),
        }
    };

    let from_in = matches!(db.arena.statement(origin), Some(Statement::In(_)));
    for segment in blocks {
        let found = db
            .symtabs
            .get(scope, SymIndex::Blocks, segment)
            .ok_or_else(not_found)?;
        match db.node_flavor_of(found) {
            Some(cil_ast::nodes::Flavor::Block) => scope = ScopeKey::Datum(found),
            Some(flavor) if from_in => {
                if flavor == cil_ast::nodes::Flavor::Macro {
                    scope = ScopeKey::Datum(found);
                }
            }
            flavor => {
                tracing::warn!(
                    "can only use {} name for name resolution in \"in\" blocks",
                    flavor.map_or("unknown", cil_ast::nodes::Flavor::keyword)
                );
                return Err(not_found());
            }
        }
    }
    db.symtabs.get(scope, sym, last).ok_or_else(not_found)
}

/// Resolves `name` as seen from `origin`, replacing a bound alias by its actual.
pub(crate) fn resolve_name(
    db: &PolicyDb,
    origin: NodeId,
    name: &str,
    sym: SymIndex,
) -> ResolveResult<DatumId> {
    let found = resolve_name_keep_aliases(db, origin, name, sym)?;
    Ok(actual_of(db, found))
}

/// The actual behind an alias, or `datum` itself.
pub(crate) fn actual_of(db: &PolicyDb, datum: DatumId) -> DatumId {
    if db.node_flavor_of(datum).is_some_and(|f| f.is_alias())
        && let Some(actual) = db.datum(datum).and_then(|d| d.state.actual)
    {
        return actual;
    }
    datum
}

/// Binds `reference` unless it already is.
pub(crate) fn bind(
    db: &PolicyDb,
    origin: NodeId,
    reference: &mut NameRef,
    sym: SymIndex,
) -> ResolveResult<DatumId> {
    if let Some(datum) = reference.datum {
        return Ok(datum);
    }
    let datum = resolve_name(db, origin, &reference.name, sym)?;
    reference.datum = Some(datum);
    Ok(datum)
}

/// Like [`bind`] but keeps aliases.
pub(crate) fn bind_keep_aliases(
    db: &PolicyDb,
    origin: NodeId,
    reference: &mut NameRef,
    sym: SymIndex,
) -> ResolveResult<DatumId> {
    if let Some(datum) = reference.datum {
        return Ok(datum);
    }
    let datum = resolve_name_keep_aliases(db, origin, &reference.name, sym)?;
    reference.datum = Some(datum);
    Ok(datum)
}

fn resolve_from(db: &PolicyDb, start: Option<NodeId>, name: &str, sym: SymIndex) -> Option<DatumId> {
    with_parents(db, start, name, sym).or_else(|| db.symtabs.get(ScopeKey::Root, sym, name))
}

fn with_parents(db: &PolicyDb, start: Option<NodeId>, name: &str, sym: SymIndex) -> Option<DatumId> {
    let mut node = start;
    while let Some(current) = node {
        match db.arena.statement(current)? {
            Statement::Root => return None,
            Statement::Block(_) => {
                if let Some(block) = db.decl_of(current)
                    && !db.datum(block).is_some_and(|d| d.state.is_abstract)
                    && let Some(found) = db.symtabs.get(ScopeKey::Datum(block), sym, name)
                {
                    return Some(found);
                }
            }
            Statement::Macro(_) => {
                if let Some(found) = db
                    .decl_of(current)
                    .and_then(|m| db.symtabs.get(ScopeKey::Datum(m), sym, name))
                {
                    return Some(found);
                }
            }
            Statement::BlockInherit(target) => {
                if let Some(found) = with_parents(db, db.arena.parent(current), name, sym) {
                    return Some(found);
                }
                let block_parent = target
                    .datum
                    .and_then(|b| db.datum(b))
                    .and_then(crate::datum::Datum::first_node)
                    .and_then(|n| db.arena.parent(n));
                return with_parents(db, block_parent, name, sym);
            }
            Statement::Call(call) => {
                if let Some(found) = through_call(db, call, name, sym) {
                    return Some(found);
                }
            }
            _ => {}
        }
        node = db.arena.parent(current);
    }
    None
}

fn through_call(db: &PolicyDb, call: &Call, name: &str, sym: SymIndex) -> Option<DatumId> {
    if let Some(found) = call_argument(call, name, sym) {
        return Some(found);
    }
    let macro_datum = call.macro_ref.datum?;
    // declared by the macro body: the expanded copy lives on the caller side
    if db.symtabs.get(ScopeKey::Datum(macro_datum), sym, name).is_some() {
        return None;
    }
    let macro_parent = db
        .datum(macro_datum)
        .and_then(crate::datum::Datum::first_node)
        .and_then(|n| db.arena.parent(n));
    with_parents(db, macro_parent, name, sym)
}

/// Datum bound to the parameter `name` of table `sym`, if the call binds one.
pub(crate) fn call_argument(call: &Call, name: &str, sym: SymIndex) -> Option<DatumId> {
    call.bindings
        .iter()
        .find(|arg| SymIndex::for_param(arg.flavor) == sym && arg.param == name)
        .and_then(cil_ast::nodes::CallArg::datum)
}
