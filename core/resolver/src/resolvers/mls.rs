//! Categories, sensitivities, levels and level ranges.

use cil_ast::nodes::{Flavor, LevelRangeRef, LevelRangeSpec, LevelRef, LevelSpec, NodeId, Statement};

use crate::db::PolicyDb;
use crate::errors::{ResolveError, ResolveResult};
use crate::name_resolver::bind;
use crate::resolvers::expr::{bound_names, resolve_expr};
use crate::symtab::SymIndex;

pub(crate) fn resolve_catset(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(Statement::CategorySet(mut set)) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    resolve_expr(db, node, &mut set.categories)?;
    let own = db.decl_of(node);
    if own.is_some()
        && bound_names(&set.categories, cil_ast::nodes::ExprFlavor::Category)
            .into_iter()
            .any(|d| Some(d) == own)
    {
        return Err(ResolveError::CycleDetected {
            kind: "category set",
            chain: vec![set.name.clone(), set.name.clone()],
            location: db.arena.location(node),
        });
    }
    db.arena.set_statement(node, Statement::CategorySet(set));
    Ok(())
}

/// `sensitivitycategory`: records the categories on the sensitivity.
pub(crate) fn resolve_senscat(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(Statement::SensitivityCategory(mut senscat)) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    let sens = bind(db, node, &mut senscat.sensitivity, SymIndex::Sens)?;
    resolve_expr(db, node, &mut senscat.categories)?;
    let categories = senscat.categories.clone();
    db.arena.set_statement(node, Statement::SensitivityCategory(senscat));
    if let Some(datum) = db.datum_mut(sens) {
        datum.state.sens_cats.push((node, categories));
    }
    Ok(())
}

pub(crate) fn resolve_level_spec(db: &PolicyDb, origin: NodeId, level: &mut LevelSpec) -> ResolveResult<()> {
    let sens = bind(db, origin, &mut level.sensitivity, SymIndex::Sens)?;
    if db.node_flavor_of(sens) != Some(Flavor::Sensitivity) {
        return Err(ResolveError::invalid(
            format!("{} is not a sensitivity", level.sensitivity.name),
            &db.arena.location(origin),
        ));
    }
    if let Some(categories) = &mut level.categories {
        resolve_expr(db, origin, categories)?;
    }
    Ok(())
}

pub(crate) fn resolve_level_ref(db: &PolicyDb, origin: NodeId, level: &mut LevelRef) -> ResolveResult<()> {
    match level {
        LevelRef::Named(name) => bind(db, origin, name, SymIndex::Levels).map(|_| ()),
        LevelRef::Anonymous(spec) => resolve_level_spec(db, origin, spec),
    }
}

pub(crate) fn resolve_range_spec(db: &PolicyDb, origin: NodeId, range: &mut LevelRangeSpec) -> ResolveResult<()> {
    resolve_level_ref(db, origin, &mut range.low)?;
    resolve_level_ref(db, origin, &mut range.high)
}

pub(crate) fn resolve_range_ref(db: &PolicyDb, origin: NodeId, range: &mut LevelRangeRef) -> ResolveResult<()> {
    match range {
        LevelRangeRef::Named(name) => bind(db, origin, name, SymIndex::LevelRanges).map(|_| ()),
        LevelRangeRef::Anonymous(spec) => resolve_range_spec(db, origin, spec),
    }
}

/// `level` and `levelrange` declarations.
pub(crate) fn resolve_level_decl(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(mut statement) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    match &mut statement {
        Statement::Level(decl) => resolve_level_spec(db, node, &mut decl.level)?,
        Statement::LevelRange(decl) => resolve_range_spec(db, node, &mut decl.range)?,
        _ => return Ok(()),
    }
    db.arena.set_statement(node, statement);
    Ok(())
}
