//! Access rules, type and role rules, attributes, bounds, user statements,
//! constraints and conditionals.
//!
//! Every resolver binds a clone of the payload and only writes it back, and
//! records what it derived on the datums, once every name has been bound.

use cil_ast::nodes::{
    AvPerms, DatumId, Expr, ExprFlavor, Flavor, LevelRangeRef, LevelRef, NameRef, NodeId, Statement,
};

use crate::db::PolicyDb;
use crate::diagnostics::Severity;
use crate::errors::{ResolveError, ResolveResult};
use crate::name_resolver::{bind, resolve_name};
use crate::resolvers::classes::{resolve_classperms, resolve_permx_ref};
use crate::resolvers::expr::{bound_names, resolve_expr};
use crate::resolvers::mls::{resolve_level_ref, resolve_range_ref};
use crate::symtab::SymIndex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Use {
    AvRule,
    NeverAllow,
    Constraint,
    Expand(bool),
}

/// What a statement contributes to the datums it names.
enum Effect {
    Used(DatumId, Use),
    AttrExpr(DatumId, Expr),
    Bounds { child: DatumId, parent: DatumId },
    UserLevel(DatumId, LevelRef),
    UserRange(DatumId, LevelRangeRef),
}

/// Resolves the rule statement at `node`.
pub(crate) fn resolve_rule(db: &mut PolicyDb, node: NodeId) -> ResolveResult<()> {
    let Some(mut statement) = db.arena.statement(node).cloned() else {
        return Ok(());
    };
    let effects = bind_rule(db, node, &mut statement)?;
    db.arena.set_statement(node, statement);
    for effect in effects {
        apply(db, node, effect);
    }
    Ok(())
}

#[allow(clippy::too_many_lines)]
fn bind_rule(db: &mut PolicyDb, node: NodeId, statement: &mut Statement) -> ResolveResult<Vec<Effect>> {
    let location = db.arena.location(node);
    let mut effects = Vec::new();
    match statement {
        Statement::AvRule(rule) => {
            let usage = if rule.is_neverallow() { Use::NeverAllow } else { Use::AvRule };
            let source = bind(db, node, &mut rule.source, SymIndex::Types)?;
            effects.push(Effect::Used(source, usage));
            if let Some(target) = bind_target(db, node, &mut rule.target)? {
                effects.push(Effect::Used(target, usage));
            }
            match &mut rule.perms {
                AvPerms::ClassPerms(classperms) => resolve_classperms(db, node, classperms)?,
                AvPerms::PermX(permx) => resolve_permx_ref(db, node, permx)?,
            }
        }
        Statement::TypeRule(rule) => {
            bind(db, node, &mut rule.source, SymIndex::Types)?;
            bind_target(db, node, &mut rule.target)?;
            bind(db, node, &mut rule.class, SymIndex::Classes)?;
            let result = bind(db, node, &mut rule.result, SymIndex::Types)?;
            if db.node_flavor_of(result) != Some(Flavor::Type) {
                return Err(ResolveError::invalid("type rule result must be a type", &location));
            }
        }
        Statement::NameTypeTransition(rule) => {
            bind(db, node, &mut rule.source, SymIndex::Types)?;
            bind_target(db, node, &mut rule.target)?;
            bind(db, node, &mut rule.class, SymIndex::Classes)?;
            if rule.name.datum.is_none() {
                let name = match resolve_name(db, node, &rule.name.name, SymIndex::Names) {
                    Ok(found) => found,
                    Err(_) => db.insert_name(&rule.name.name),
                };
                rule.name.datum = Some(name);
            }
            let result = bind(db, node, &mut rule.result, SymIndex::Types)?;
            if !matches!(db.node_flavor_of(result), Some(Flavor::Type | Flavor::TypeAlias)) {
                return Err(ResolveError::invalid(
                    "typetransition result is not a type or type alias",
                    &location,
                ));
            }
        }
        Statement::RangeTransition(rule) => {
            bind(db, node, &mut rule.source, SymIndex::Types)?;
            bind(db, node, &mut rule.exec, SymIndex::Types)?;
            bind(db, node, &mut rule.class, SymIndex::Classes)?;
            resolve_range_ref(db, node, &mut rule.range)?;
        }
        Statement::TypePermissive(name) => {
            let datum = bind(db, node, name, SymIndex::Types)?;
            if !matches!(db.node_flavor_of(datum), Some(Flavor::Type | Flavor::TypeAlias)) {
                return Err(ResolveError::invalid(
                    "typepermissive must be a type or type alias",
                    &location,
                ));
            }
        }
        Statement::AttributeSet(set) => {
            let (sym, attribute_flavor) = match set.flavor {
                Flavor::RoleAttributeSet => (SymIndex::Roles, Flavor::RoleAttribute),
                Flavor::UserAttributeSet => (SymIndex::Users, Flavor::UserAttribute),
                _ => (SymIndex::Types, Flavor::TypeAttribute),
            };
            let attribute = bind(db, node, &mut set.attribute, sym)?;
            if db.node_flavor_of(attribute) != Some(attribute_flavor) {
                return Err(ResolveError::invalid(
                    format!("attribute {} is not a {attribute_flavor}", set.attribute.name),
                    &location,
                ));
            }
            resolve_expr(db, node, &mut set.expr)?;
            effects.push(Effect::AttrExpr(attribute, set.expr.clone()));
        }
        Statement::ExpandTypeAttribute(expand) => {
            for name in &mut expand.attributes {
                let attribute = bind(db, node, name, SymIndex::Types)?;
                if db.node_flavor_of(attribute) != Some(Flavor::TypeAttribute) {
                    return Err(ResolveError::invalid(
                        format!("{} is not a typeattribute", name.name),
                        &location,
                    ));
                }
                effects.push(Effect::Used(attribute, Use::Expand(expand.expand)));
            }
        }
        Statement::Bounds(bounds) => {
            let sym = match bounds.flavor {
                Flavor::RoleBounds => SymIndex::Roles,
                Flavor::UserBounds => SymIndex::Users,
                _ => SymIndex::Types,
            };
            let parent = bind(db, node, &mut bounds.parent, sym)?;
            let child = bind(db, node, &mut bounds.child, sym)?;
            for (datum, name) in [(parent, &bounds.parent), (child, &bounds.child)] {
                if db.node_flavor_of(datum).is_some_and(Flavor::is_attribute) {
                    return Err(ResolveError::invalid(
                        format!("bounds must not use attributes, {} is an attribute", name.name),
                        &location,
                    ));
                }
            }
            if db.datum(child).is_some_and(|d| d.state.bounds.is_some()) {
                return Err(ResolveError::invalid(
                    format!("{} already bound by parent", bounds.child.name),
                    &location,
                ));
            }
            effects.push(Effect::Bounds { child, parent });
        }
        Statement::RoleType(rule) => {
            bind(db, node, &mut rule.role, SymIndex::Roles)?;
            bind(db, node, &mut rule.type_, SymIndex::Types)?;
        }
        Statement::RoleAllow(rule) => {
            bind(db, node, &mut rule.source, SymIndex::Roles)?;
            bind(db, node, &mut rule.target, SymIndex::Roles)?;
        }
        Statement::RoleTransition(rule) => {
            bind(db, node, &mut rule.source, SymIndex::Roles)?;
            bind(db, node, &mut rule.target, SymIndex::Types)?;
            bind(db, node, &mut rule.class, SymIndex::Classes)?;
            let result = bind(db, node, &mut rule.result, SymIndex::Roles)?;
            if db.node_flavor_of(result) != Some(Flavor::Role) {
                return Err(ResolveError::invalid("roletransition result must be a role", &location));
            }
        }
        Statement::UserRole(rule) => {
            bind(db, node, &mut rule.user, SymIndex::Users)?;
            bind(db, node, &mut rule.role, SymIndex::Roles)?;
        }
        Statement::UserLevel(rule) => {
            let user = bind_user(db, node, &mut rule.user)?;
            resolve_level_ref(db, node, &mut rule.level)?;
            effects.push(Effect::UserLevel(user, rule.level.clone()));
        }
        Statement::UserRange(rule) => {
            let user = bind_user(db, node, &mut rule.user)?;
            resolve_range_ref(db, node, &mut rule.range)?;
            effects.push(Effect::UserRange(user, rule.range.clone()));
        }
        Statement::UserPrefix(rule) => {
            bind_user(db, node, &mut rule.user)?;
        }
        Statement::SelinuxUser(rule) => {
            bind_user(db, node, &mut rule.user)?;
            resolve_range_ref(db, node, &mut rule.range)?;
        }
        Statement::Constrain(rule) => {
            resolve_classperms(db, node, &mut rule.classperms)?;
            resolve_expr(db, node, &mut rule.expr)?;
            effects.extend(constrained_types(&rule.expr));
        }
        Statement::ValidateTrans(rule) => {
            bind(db, node, &mut rule.class, SymIndex::Classes)?;
            resolve_expr(db, node, &mut rule.expr)?;
            effects.extend(constrained_types(&rule.expr));
        }
        Statement::BooleanIf(conditional) => {
            resolve_expr(db, node, &mut conditional.condition)?;
        }
        _ => {}
    }
    Ok(effects)
}

/// `self` as a target stands for the source type of the rule.
fn bind_target(db: &PolicyDb, node: NodeId, target: &mut NameRef) -> ResolveResult<Option<DatumId>> {
    if target.datum.is_none() && target.name == "self" {
        target.datum = Some(db.self_type);
        return Ok(None);
    }
    if target.datum == Some(db.self_type) {
        return Ok(None);
    }
    bind(db, node, target, SymIndex::Types).map(Some)
}

fn bind_user(db: &PolicyDb, node: NodeId, user: &mut NameRef) -> ResolveResult<DatumId> {
    let datum = bind(db, node, user, SymIndex::Users)?;
    if db.node_flavor_of(datum) != Some(Flavor::User) {
        return Err(ResolveError::invalid(
            format!("{} must be a user", user.name),
            &db.arena.location(node),
        ));
    }
    Ok(datum)
}

fn constrained_types(expr: &Expr) -> Vec<Effect> {
    bound_names(expr, ExprFlavor::Type)
        .into_iter()
        .map(|d| Effect::Used(d, Use::Constraint))
        .collect()
}

fn apply(db: &mut PolicyDb, node: NodeId, effect: Effect) {
    match effect {
        Effect::Used(datum, usage) => mark_used(db, node, datum, usage),
        Effect::AttrExpr(attribute, expr) => {
            if let Some(d) = db.datum_mut(attribute) {
                d.state.attr_exprs.push((node, expr));
            }
        }
        Effect::Bounds { child, parent } => {
            if let Some(d) = db.datum_mut(child) {
                d.state.bounds = Some(parent);
            }
        }
        Effect::UserLevel(user, level) => {
            if let Some(d) = db.datum_mut(user) {
                d.state.user_level = Some(level);
            }
        }
        Effect::UserRange(user, range) => {
            if let Some(d) = db.datum_mut(user) {
                d.state.user_range = Some(range);
            }
        }
    }
}

/// Records how a type attribute is used. Plain types are not tracked.
fn mark_used(db: &mut PolicyDb, node: NodeId, datum: DatumId, usage: Use) {
    if db.node_flavor_of(datum) != Some(Flavor::TypeAttribute) {
        return;
    }
    let Some(d) = db.datum_mut(datum) else {
        return;
    };
    let used = &mut d.state.used;
    match usage {
        Use::AvRule => used.avrule = true,
        Use::NeverAllow => used.neverallow = true,
        Use::Constraint => used.constraint = true,
        Use::Expand(true) => used.expand_true = true,
        Use::Expand(false) => used.expand_false = true,
    }
    if used.expand_true && used.expand_false {
        used.expand_true = false;
        let name = d.name.clone();
        let location = db.arena.location(node);
        db.report(
            Severity::Warning,
            Some(&location),
            format!("conflicting use of expandtypeattribute for {name}, resolving to false"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::declare_tree;
    use crate::options::ResolverOptions;
    use crate::symtab::ScopeKey;
    use cil_ast::builder::Builder;

    fn declared(source: &str) -> PolicyDb {
        let mut builder = Builder::new();
        builder.add_source_code("test.cil", source);
        let mut db = PolicyDb::new(builder.build_ast().unwrap(), ResolverOptions::default());
        declare_tree(&mut db).unwrap();
        db
    }

    fn nodes(db: &PolicyDb, flavor: Flavor) -> Vec<NodeId> {
        db.arena().find_nodes(|s| s.flavor() == flavor)
    }

    fn type_datum(db: &PolicyDb, name: &str) -> DatumId {
        db.lookup(ScopeKey::Root, SymIndex::Types, name).unwrap()
    }

    #[test]
    fn self_target_is_the_builtin() {
        let mut db = declared("(class file (read)) (typeattribute ta) (allow ta self (file (read)))");
        let allow = nodes(&db, Flavor::Allow)[0];
        resolve_rule(&mut db, allow).unwrap();
        let Some(Statement::AvRule(rule)) = db.arena().statement(allow) else {
            panic!("expected an access rule");
        };
        assert_eq!(rule.target.datum, Some(db.self_type()));
        assert!(db.datum(type_datum(&db, "ta")).unwrap().state.used.avrule);
    }

    #[test]
    fn neverallow_marks_attributes_separately() {
        let mut db = declared("(class file (read)) (type t) (typeattribute ta) (neverallow t ta (file (read)))");
        let rule = nodes(&db, Flavor::NeverAllow)[0];
        resolve_rule(&mut db, rule).unwrap();
        let used = db.datum(type_datum(&db, "ta")).unwrap().state.used;
        assert!(used.neverallow && !used.avrule);
        assert_eq!(db.datum(type_datum(&db, "t")).unwrap().state.used, Default::default());
    }

    #[test]
    fn type_rule_result_must_be_a_type() {
        let mut db = declared("(class file (read)) (type a) (typeattribute ta) (typetransition a a file ta)");
        let rule = nodes(&db, Flavor::TypeTransition)[0];
        let err = resolve_rule(&mut db, rule).unwrap_err();
        assert!(err.to_string().ends_with("type rule result must be a type"), "{err}");
    }

    #[test]
    fn named_transition_interns_the_file_name() {
        let mut db = declared("(class file (read)) (type a) (type b) (typetransition a a file \"f\" b)");
        let rule = nodes(&db, Flavor::NameTypeTransition)[0];
        resolve_rule(&mut db, rule).unwrap();
        let name = db.lookup(ScopeKey::Root, SymIndex::Names, "f").unwrap();
        assert_eq!(db.flavor_of(name), Some(Flavor::Name));
    }

    #[test]
    fn attribute_sets_contribute_expressions() {
        let mut db = declared("(type a) (typeattribute ta) (typeattributeset ta (a)) (typeattributeset a (ta))");
        let sets = nodes(&db, Flavor::TypeAttributeSet);
        resolve_rule(&mut db, sets[0]).unwrap();
        assert_eq!(db.datum(type_datum(&db, "ta")).unwrap().state.attr_exprs.len(), 1);
        let err = resolve_rule(&mut db, sets[1]).unwrap_err();
        assert!(err.to_string().contains("is not a typeattribute"), "{err}");
    }

    #[test]
    fn conflicting_expansion_resolves_to_false() {
        let mut db = declared(
            "(typeattribute ta) (expandtypeattribute (ta) true) (expandtypeattribute (ta) false)",
        );
        for node in nodes(&db, Flavor::ExpandTypeAttribute) {
            resolve_rule(&mut db, node).unwrap();
        }
        let used = db.datum(type_datum(&db, "ta")).unwrap().state.used;
        assert!(used.expand_false && !used.expand_true);
        assert_eq!(db.diagnostics().with_severity(Severity::Warning).count(), 1);
    }

    #[test]
    fn child_is_bound_once() {
        let mut db = declared("(type p) (type q) (type c) (typebounds p c) (typebounds q c)");
        let bounds = nodes(&db, Flavor::TypeBounds);
        resolve_rule(&mut db, bounds[0]).unwrap();
        let err = resolve_rule(&mut db, bounds[1]).unwrap_err();
        assert!(err.to_string().contains("already bound by parent"), "{err}");
    }

    #[test]
    fn bounds_reject_attributes() {
        let mut db = declared("(type p) (typeattribute ta) (typebounds p ta)");
        let node = nodes(&db, Flavor::TypeBounds)[0];
        assert!(resolve_rule(&mut db, node).is_err());
    }

    #[test]
    fn roletransition_result_must_be_a_role() {
        let mut db = declared(
            "(class process (transition)) (role r) (roleattribute ra) (type t) (roletransition r t process ra)",
        );
        let node = nodes(&db, Flavor::RoleTransition)[0];
        let err = resolve_rule(&mut db, node).unwrap_err();
        assert!(err.to_string().contains("must be a role"), "{err}");
    }

    #[test]
    fn constraints_mark_attributes() {
        let mut db = declared(
            "(class file (read)) (typeattribute ta) (constrain (file (read)) (eq t1 ta))",
        );
        let node = nodes(&db, Flavor::Constrain)[0];
        resolve_rule(&mut db, node).unwrap();
        assert!(db.datum(type_datum(&db, "ta")).unwrap().state.used.constraint);
    }

    #[test]
    fn userlevel_is_recorded() {
        let mut db = declared("(user u) (sensitivity s0) (userlevel u (s0))");
        let node = nodes(&db, Flavor::UserLevel)[0];
        resolve_rule(&mut db, node).unwrap();
        let u = db.lookup(ScopeKey::Root, SymIndex::Users, "u").unwrap();
        assert!(db.datum(u).unwrap().state.user_level.is_some());
    }
}
