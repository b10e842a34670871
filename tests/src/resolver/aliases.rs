use cil_ast::nodes::{Flavor, Statement};
use cil_resolver::errors::ResolveError;
use cil_resolver::symtab::SymIndex;

use crate::utils::{resolve, resolve_error, root_lookup, type_named};

#[test]
fn three_alias_loop_names_every_member() {
    let err = resolve_error(
        "(typealias a) (typealias b) (typealias c) \
         (typealiasactual a b) (typealiasactual b c) (typealiasactual c a)",
    );
    let ResolveError::CycleDetected { kind, chain, .. } = err else {
        panic!("expected a cycle, got {err}");
    };
    assert_eq!(kind, "alias");
    for name in ["a", "b", "c"] {
        assert!(chain.iter().any(|n| n == name), "{chain:?}");
    }
}

#[test]
fn alias_chain_collapses_to_the_type() {
    let db = resolve(
        "(type real_t) (typealias mid) (typealias outer) \
         (typealiasactual outer mid) (typealiasactual mid real_t) \
         (typepermissive outer)",
    );
    let real = type_named(&db, "real_t");
    for alias in ["mid", "outer"] {
        let id = root_lookup(&db, SymIndex::Types, alias).unwrap();
        assert_eq!(db.datum(id).unwrap().state.actual, real, "{alias}");
    }
    let permissive = db.arena().find_nodes(|s| s.flavor() == Flavor::TypePermissive)[0];
    let Some(Statement::TypePermissive(target)) = db.arena().statement(permissive) else {
        panic!("expected typepermissive");
    };
    assert_eq!(target.datum, real);
}

#[test]
fn unused_alias_is_rejected() {
    let err = resolve_error("(typealias lonely)");
    assert!(err.to_string().contains("declared but not used"), "{err}");
}

#[test]
fn alias_binds_one_actual() {
    let err = resolve_error(
        "(type a_t) (type b_t) (typealias al) (typealiasactual al a_t) (typealiasactual al b_t)",
    );
    assert!(matches!(err, ResolveError::Conflict { .. }), "{err}");
}

#[test]
fn sensitivity_alias_resolves() {
    let db = resolve(
        "(sensitivity s0) (sensitivityalias low) (sensitivityaliasactual low s0) \
         (sensitivityorder (s0))",
    );
    let low = root_lookup(&db, SymIndex::Sens, "low").unwrap();
    assert_eq!(db.datum(low).unwrap().state.actual, root_lookup(&db, SymIndex::Sens, "s0"));
}
