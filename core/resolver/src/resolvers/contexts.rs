//! Security contexts and the labeling statements that carry them.

use std::net::IpAddr;

use cil_ast::nodes::{ContextRef, ContextSpec, Flavor, IpAddrRef, NodeId, Statement};

use crate::db::PolicyDb;
use crate::errors::{ResolveError, ResolveResult};
use crate::name_resolver::bind;
use crate::resolvers::mls::resolve_range_ref;
use crate::symtab::SymIndex;

pub(crate) fn resolve_context_spec(db: &PolicyDb, origin: NodeId, context: &mut ContextSpec) -> ResolveResult<()> {
    let location = db.arena.location(origin);
    let user = bind(db, origin, &mut context.user, SymIndex::Users)?;
    if db.node_flavor_of(user) != Some(Flavor::User) {
        return Err(ResolveError::invalid(
            format!("context user must be a user, `{}` is not", context.user.name),
            &location,
        ));
    }
    let role = bind(db, origin, &mut context.role, SymIndex::Roles)?;
    if db.node_flavor_of(role) != Some(Flavor::Role) {
        return Err(ResolveError::invalid(
            format!("context role must be a role, `{}` is not", context.role.name),
            &location,
        ));
    }
    let type_ = bind(db, origin, &mut context.type_, SymIndex::Types)?;
    if !matches!(db.node_flavor_of(type_), Some(Flavor::Type | Flavor::TypeAlias)) {
        return Err(ResolveError::invalid(
            format!("type `{}` is not allowed in contexts", context.type_.name),
            &location,
        ));
    }
    resolve_range_ref(db, origin, &mut context.range)
}

pub(crate) fn resolve_context_ref(db: &PolicyDb, origin: NodeId, context: &mut ContextRef) -> ResolveResult<()> {
    match context {
        ContextRef::Named(name) => bind(db, origin, name, SymIndex::Contexts).map(|_| ()),
        ContextRef::Anonymous(spec) => resolve_context_spec(db, origin, spec),
    }
}

/// Address an `ipaddr` reference stands for.
fn ipaddr_value(db: &PolicyDb, origin: NodeId, addr: &mut IpAddrRef) -> ResolveResult<IpAddr> {
    match addr {
        IpAddrRef::Literal(value) => Ok(*value),
        IpAddrRef::Named(name) => {
            let datum = bind(db, origin, name, SymIndex::IpAddrs)?;
            let node = db.datum(datum).and_then(crate::datum::Datum::first_node);
            match node.and_then(|n| db.arena.statement(n)) {
                Some(Statement::IpAddr(decl)) => Ok(decl.addr),
                _ => Err(ResolveError::invalid(
                    format!("{} is not an ip address", name.name),
                    &db.arena.location(origin),
                )),
            }
        }
    }
}

fn resolve_sidcontext(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(Statement::SidContext(mut stmt)) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    let location = db.arena.location(node);
    let sid = bind(db, node, &mut stmt.sid, SymIndex::Sids)?;
    resolve_context_ref(db, node, &mut stmt.context)?;
    if db.datum(sid).is_some_and(|d| d.state.context.is_some()) {
        return Err(ResolveError::Conflict {
            reason: format!("sid {} already has a context", stmt.sid.name),
            location,
            previous: db.datum_location(sid),
        });
    }
    let context = stmt.context.clone();
    db.arena.set_statement(node, Statement::SidContext(stmt));
    if let Some(datum) = db.datum_mut(sid) {
        datum.state.context = Some(context);
    }
    Ok(())
}

/// `context` declarations, `sidcontext` and the labeling statements.
pub(crate) fn resolve_context_statement(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(mut statement) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    match &mut statement {
        Statement::SidContext(_) => return resolve_sidcontext(db, node),
        Statement::Context(decl) => resolve_context_spec(db, node, &mut decl.context)?,
        Statement::FileCon(con) => {
            if let Some(context) = &mut con.context {
                resolve_context_ref(db, node, context)?;
            }
        }
        Statement::PortCon(con) => resolve_context_ref(db, node, &mut con.context)?,
        Statement::GenfsCon(con) => resolve_context_ref(db, node, &mut con.context)?,
        Statement::FsUse(con) => resolve_context_ref(db, node, &mut con.context)?,
        Statement::DeviceCon(con) => resolve_context_ref(db, node, &mut con.context)?,
        Statement::NetifCon(con) => {
            resolve_context_ref(db, node, &mut con.if_context)?;
            resolve_context_ref(db, node, &mut con.packet_context)?;
        }
        Statement::NodeCon(con) => {
            let addr = ipaddr_value(db, node, &mut con.addr)?;
            let mask = ipaddr_value(db, node, &mut con.mask)?;
            if addr.is_ipv4() != mask.is_ipv4() {
                return Err(ResolveError::invalid(
                    "nodecon address and mask must be of the same family",
                    &db.arena.location(node),
                ));
            }
            resolve_context_ref(db, node, &mut con.context)?;
        }
        _ => return Ok(()),
    }
    db.arena.set_statement(node, statement);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::declare_tree;
    use crate::options::ResolverOptions;
    use crate::symtab::ScopeKey;
    use cil_ast::builder::Builder;

    const BASE: &str = "(user u) (role r) (roleattribute ra) (type t) (typeattribute ta) \
                        (sensitivity s0) (level low (s0)) (sid kernel) ";

    fn declared(source: &str) -> PolicyDb {
        let mut builder = Builder::new();
        builder.add_source_code("test.cil", &format!("{BASE}{source}"));
        let mut db = PolicyDb::new(builder.build_ast().unwrap(), ResolverOptions::default());
        declare_tree(&mut db).unwrap();
        db
    }

    fn nodes(db: &PolicyDb, flavor: Flavor) -> Vec<NodeId> {
        db.arena().find_nodes(|s| s.flavor() == flavor)
    }

    #[test]
    fn anonymous_context_binds_every_part() {
        let mut db = declared("(sidcontext kernel (u r t (low low)))");
        let node = nodes(&db, Flavor::SidContext)[0];
        resolve_context_statement(&mut db, node).unwrap();
        let kernel = db.lookup(ScopeKey::Root, SymIndex::Sids, "kernel").unwrap();
        let Some(ContextRef::Anonymous(spec)) = &db.datum(kernel).unwrap().state.context else {
            panic!("expected an inline context");
        };
        assert!(spec.user.is_resolved() && spec.role.is_resolved() && spec.type_.is_resolved());
    }

    #[test]
    fn role_attribute_is_rejected() {
        let mut db = declared("(context c (u ra t (low low)))");
        let node = nodes(&db, Flavor::Context)[0];
        let err = resolve_context_statement(&mut db, node).unwrap_err();
        assert!(err.to_string().contains("context role must be a role"), "{err}");
    }

    #[test]
    fn type_attribute_is_rejected() {
        let mut db = declared("(context c (u object_r ta (low low)))");
        let node = nodes(&db, Flavor::Context)[0];
        let err = resolve_context_statement(&mut db, node).unwrap_err();
        assert!(err.to_string().contains("not allowed in contexts"), "{err}");
    }

    #[test]
    fn sid_takes_one_context() {
        let mut db = declared(
            "(context c (u r t (low low))) (sidcontext kernel c) (sidcontext kernel c)",
        );
        let sidcontexts = nodes(&db, Flavor::SidContext);
        resolve_context_statement(&mut db, sidcontexts[0]).unwrap();
        let err = resolve_context_statement(&mut db, sidcontexts[1]).unwrap_err();
        assert!(matches!(err, ResolveError::Conflict { .. }), "{err}");
    }

    #[test]
    fn nodecon_families_must_match() {
        let mut db = declared(
            "(ipaddr mask6 ffff::) (context c (u r t (low low))) (nodecon 10.0.0.0 mask6 c)",
        );
        let node = nodes(&db, Flavor::NodeCon)[0];
        let err = resolve_context_statement(&mut db, node).unwrap_err();
        assert!(err.to_string().contains("same family"), "{err}");

        let mut db = declared("(context c (u r t (low low))) (nodecon 10.0.0.0 255.0.0.0 c)");
        let node = nodes(&db, Flavor::NodeCon)[0];
        resolve_context_statement(&mut db, node).unwrap();
    }

    #[test]
    fn filecon_without_context() {
        let mut db = declared("(filecon \"/tmp\" dir ())");
        let node = nodes(&db, Flavor::FileCon)[0];
        resolve_context_statement(&mut db, node).unwrap();
    }
}
