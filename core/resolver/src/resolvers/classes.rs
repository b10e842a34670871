//! Classes, permissions and everything that names them.

use cil_ast::nodes::{ClassPerms, DatumId, Expr, ExprItem, Flavor, NodeId, PermXRef, PermXSpec, Statement};

use crate::db::PolicyDb;
use crate::errors::{ResolveError, ResolveResult};
use crate::name_resolver::bind;
use crate::symtab::{ScopeKey, SymIndex};

/// `classcommon`: attaches a common to a kernel class.
pub(crate) fn resolve_classcommon(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(Statement::ClassCommon(mut stmt)) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    let location = db.arena.location(node);
    let class = bind(db, node, &mut stmt.class, SymIndex::Classes)?;
    if db.node_flavor_of(class) != Some(Flavor::Class) {
        return Err(ResolveError::invalid(
            format!("{} is not a kernel class", stmt.class.name),
            &location,
        ));
    }
    let common = bind(db, node, &mut stmt.common, SymIndex::Commons)?;
    if db.datum(class).is_some_and(|d| d.state.common.is_some()) {
        return Err(ResolveError::Conflict {
            reason: format!("class {} cannot be associated with more than one common", stmt.class.name),
            location,
            previous: db.datum_location(class),
        });
    }
    db.arena.set_statement(node, Statement::ClassCommon(stmt));
    if let Some(datum) = db.datum_mut(class) {
        datum.state.common = Some(common);
    }
    Ok(())
}

fn lookup_perm(db: &PolicyDb, class: DatumId, name: &str) -> Option<DatumId> {
    db.symtabs
        .get(ScopeKey::Datum(class), SymIndex::Perms, name)
        .or_else(|| {
            let common = db.datum(class)?.state.common?;
            db.symtabs.get(ScopeKey::Datum(common), SymIndex::Perms, name)
        })
}

/// Binds permission names against the class and its common.
fn resolve_perms(db: &PolicyDb, origin: NodeId, class: DatumId, perms: &mut Expr) -> ResolveResult<()> {
    for item in &mut perms.items {
        match item {
            ExprItem::Name(name) if name.datum.is_none() => {
                let Some(perm) = lookup_perm(db, class, &name.name) else {
                    return Err(ResolveError::NotFound {
                        kind: "permission",
                        name: name.name.clone(),
                        location: db.arena.location(origin),
                    });
                };
                name.datum = Some(perm);
            }
            ExprItem::List(inner) => resolve_perms(db, origin, class, inner)?,
            _ => {}
        }
    }
    Ok(())
}

/// Binds a class permissions list: `(class (perms))` items and named
/// `classpermission` sets.
pub(crate) fn resolve_classperms(db: &PolicyDb, origin: NodeId, list: &mut [ClassPerms]) -> ResolveResult<()> {
    for classperms in list {
        match classperms {
            ClassPerms::Perms { class, perms } => {
                let class = bind(db, origin, class, SymIndex::Classes)?;
                resolve_perms(db, origin, class, perms)?;
            }
            ClassPerms::Set(name) => {
                let set = bind(db, origin, name, SymIndex::ClassPermSets)?;
                if db.node_flavor_of(set) != Some(Flavor::ClassPermission) {
                    return Err(ResolveError::invalid(
                        format!("{} is not a classpermission", name.name),
                        &db.arena.location(origin),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// `classpermissionset`: contributes permissions to a `classpermission`.
pub(crate) fn resolve_classpermissionset(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(Statement::ClassPermissionSet(mut stmt)) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    let set = bind(db, node, &mut stmt.set, SymIndex::ClassPermSets)?;
    if db.node_flavor_of(set) != Some(Flavor::ClassPermission) {
        return Err(ResolveError::invalid(
            format!("{} is not a classpermission", stmt.set.name),
            &db.arena.location(node),
        ));
    }
    resolve_classperms(db, node, &mut stmt.classperms)?;
    let contributed = stmt.classperms.clone();
    db.arena.set_statement(node, Statement::ClassPermissionSet(stmt));
    if let Some(datum) = db.datum_mut(set) {
        datum.state.classperms.extend(contributed.into_iter().map(|cp| (node, cp)));
    }
    Ok(())
}

/// `classmapping`: what a map class permission stands for.
pub(crate) fn resolve_classmapping(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(Statement::ClassMapping(mut stmt)) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    let location = db.arena.location(node);
    let map = bind(db, node, &mut stmt.map_class, SymIndex::Classes)?;
    if db.node_flavor_of(map) != Some(Flavor::ClassMap) {
        return Err(ResolveError::invalid(
            format!("{} is not a classmap", stmt.map_class.name),
            &location,
        ));
    }
    let Some(perm) = db.symtabs.get(ScopeKey::Datum(map), SymIndex::Perms, &stmt.map_perm.name) else {
        return Err(ResolveError::NotFound {
            kind: "permission",
            name: stmt.map_perm.name.clone(),
            location,
        });
    };
    stmt.map_perm.datum = Some(perm);
    resolve_classperms(db, node, &mut stmt.classperms)?;
    let contributed = stmt.classperms.clone();
    db.arena.set_statement(node, Statement::ClassMapping(stmt));
    if let Some(datum) = db.datum_mut(perm) {
        datum.state.classperms.extend(contributed.into_iter().map(|cp| (node, cp)));
    }
    Ok(())
}

pub(crate) fn resolve_permx_spec(db: &PolicyDb, origin: NodeId, permx: &mut PermXSpec) -> ResolveResult<()> {
    let class = bind(db, origin, &mut permx.class, SymIndex::Classes)?;
    if db.node_flavor_of(class) != Some(Flavor::Class) {
        return Err(ResolveError::invalid(
            format!("{} must be a kernel class, not a class map", permx.class.name),
            &db.arena.location(origin),
        ));
    }
    Ok(())
}

pub(crate) fn resolve_permx_ref(db: &PolicyDb, origin: NodeId, permx: &mut PermXRef) -> ResolveResult<()> {
    match permx {
        PermXRef::Named(name) => bind(db, origin, name, SymIndex::PermXs).map(|_| ()),
        PermXRef::Anonymous(spec) => resolve_permx_spec(db, origin, spec),
    }
}

/// `permissionx` declarations and the `default*` statements.
pub(crate) fn resolve_class_statement(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(mut statement) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    match &mut statement {
        Statement::PermissionX(decl) => resolve_permx_spec(db, node, &mut decl.permx)?,
        Statement::Default(rule) => {
            for class in &mut rule.classes {
                bind(db, node, class, SymIndex::Classes)?;
            }
        }
        Statement::DefaultRange(rule) => {
            for class in &mut rule.classes {
                bind(db, node, class, SymIndex::Classes)?;
            }
        }
        _ => return Ok(()),
    }
    db.arena.set_statement(node, statement);
    Ok(())
}
