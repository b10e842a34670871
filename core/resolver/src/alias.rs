//! Alias binding and chain collapse for types, sensitivities and categories.

use cil_ast::nodes::{DatumId, Flavor, NodeId, Statement};

use crate::db::PolicyDb;
use crate::errors::{ResolveError, ResolveResult};
use crate::name_resolver::bind_keep_aliases;
use crate::symtab::SymIndex;

fn alias_flavor_of(statement: Flavor) -> Option<Flavor> {
    match statement {
        Flavor::TypeAliasActual => Some(Flavor::TypeAlias),
        Flavor::SensitivityAliasActual => Some(Flavor::SensitivityAlias),
        Flavor::CategoryAliasActual => Some(Flavor::CategoryAlias),
        _ => None,
    }
}

/// Binds the alias named by an `*aliasactual` statement to its actual.
pub(crate) fn resolve_aliasactual(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(Statement::AliasActual(mut stmt)) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    let location = db.arena.location(node);
    let Some(alias_flavor) = alias_flavor_of(stmt.flavor) else {
        return Ok(());
    };
    let Some(concrete) = alias_flavor.alias_target() else {
        return Ok(());
    };
    let Some(sym) = SymIndex::for_flavor(concrete) else {
        return Ok(());
    };

    let alias = bind_keep_aliases(db, node, &mut stmt.alias, sym)?;
    if db.node_flavor_of(alias) != Some(alias_flavor) {
        return Err(ResolveError::invalid(
            format!("{} is not a {alias_flavor}", stmt.alias.name),
            &location,
        ));
    }

    let actual = bind_keep_aliases(db, node, &mut stmt.actual, sym)?;
    let actual_flavor = db.node_flavor_of(actual);
    if actual_flavor != Some(concrete) && actual_flavor != Some(alias_flavor) {
        return Err(ResolveError::invalid(
            format!(
                "{} is a {}, but aliases a {}",
                stmt.alias.name,
                alias_flavor,
                actual_flavor.map_or("unknown", Flavor::keyword)
            ),
            &location,
        ));
    }

    if db.datum(alias).is_some_and(|d| d.state.actual.is_some()) {
        return Err(ResolveError::Conflict {
            reason: format!("{} {} cannot bind more than one value", alias_flavor, stmt.alias.name),
            location,
            previous: db.datum_location(alias),
        });
    }

    db.arena.set_statement(node, Statement::AliasActual(stmt));
    if let Some(datum) = db.datum_mut(alias) {
        datum.state.actual = Some(actual);
    }
    Ok(())
}

/// Follows the chain of an alias declaration down to a concrete datum and
/// stores that datum as the alias's actual.
///
/// Uses Brent's algorithm so that cycles of any length are found after a
/// bounded number of steps.
pub(crate) fn resolve_alias_to_actual(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(flavor) = db.arena.flavor(node) else {
        return Ok(());
    };
    let Some(concrete) = flavor.alias_target() else {
        return Ok(());
    };
    let Some(alias) = db.decl_of(node) else {
        return Ok(());
    };
    // Only the owning node of the alias drives the collapse.
    if db.datum(alias).and_then(crate::datum::Datum::first_node) != Some(node) {
        return Ok(());
    }
    let location = db.arena.location(node);
    let name = db.name_of(alias).to_string();

    let Some(first) = db.datum(alias).and_then(|d| d.state.actual) else {
        return Err(ResolveError::invalid(
            format!("alias {name} declared but not used"),
            &location,
        ));
    };

    let mut power = 1_u32;
    let mut steps = 1_u32;
    let mut tortoise = alias;
    let mut hare = first;
    while db.node_flavor_of(hare) != Some(concrete) {
        if hare == tortoise {
            return Err(ResolveError::CycleDetected {
                kind: "alias",
                chain: cycle_members(db, hare, alias),
                location,
            });
        }
        if power == steps {
            tortoise = hare;
            power *= 2;
            steps = 0;
        }
        let Some(next) = db.datum(hare).and_then(|d| d.state.actual) else {
            return Err(ResolveError::invalid(
                format!("alias {name} references an unused alias {}", db.name_of(hare)),
                &location,
            ));
        };
        hare = next;
        steps += 1;
    }

    if let Some(datum) = db.datum_mut(alias) {
        datum.state.actual = Some(hare);
    }
    Ok(())
}

/// Names of the aliases on the cycle through `start`, rotated so that `origin`
/// comes first when it is part of the cycle.
fn cycle_members(db: &PolicyDb, start: DatumId, origin: DatumId) -> Vec<String> {
    let mut members = vec![start];
    let mut current = db.datum(start).and_then(|d| d.state.actual);
    while let Some(next) = current {
        if next == start || members.contains(&next) {
            break;
        }
        members.push(next);
        current = db.datum(next).and_then(|d| d.state.actual);
    }
    if let Some(pos) = members.iter().position(|m| *m == origin) {
        members.rotate_left(pos);
    }
    members.iter().map(|m| db.name_of(*m).to_string()).collect()
}
