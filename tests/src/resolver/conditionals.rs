use cil_ast::nodes::{Flavor, Statement};
use cil::ResolverOptions;
use cil_resolver::errors::ResolveError;
use cil_resolver::symtab::SymIndex;

use crate::utils::{resolve, resolve_error, root_lookup, try_resolve_with, type_named};

#[test]
fn tunable_picks_the_matching_branch() {
    let db = resolve(
        "(tunable on true) (tunable off false) \
         (tunableif on (true (type yes_t)) (false (type no_t))) \
         (tunableif (not off) (true (type also_t)))",
    );
    assert!(type_named(&db, "yes_t").is_some());
    assert!(type_named(&db, "also_t").is_some());
    assert!(type_named(&db, "no_t").is_none());
    assert!(db.arena().find_nodes(|s| s.flavor() == Flavor::CondBlock).is_empty());
}

#[test]
fn preserved_tunables_become_booleans() {
    let options: ResolverOptions = serde_json::from_str(r#"{ "preserve-tunables": true }"#).unwrap();
    let db = try_resolve_with(
        "(tunable on true) (type t) (tunableif on (true (allow t self (file (read)))))",
        options,
    )
    .unwrap();
    assert!(root_lookup(&db, SymIndex::Bools, "on").is_some());
    assert!(root_lookup(&db, SymIndex::Tunables, "on").is_none());
    let conditionals = db.arena().find_nodes(|s| matches!(s, Statement::BooleanIf(c) if c.preserved_tunable));
    assert_eq!(conditionals.len(), 1);
}

#[test]
fn preserved_tunableif_keeps_booleanif_restrictions() {
    let options = ResolverOptions {
        preserve_tunables: true,
        ..ResolverOptions::default()
    };
    let err = try_resolve_with(
        "(tunable on true) (type t) (tunableif on (true (typepermissive t)))",
        options,
    )
    .unwrap_err()
    .downcast::<ResolveError>()
    .unwrap();
    assert!(
        matches!(&err, ResolveError::StructuralViolation { container, .. }
            if container == "tunableifs treated as booleanifs"),
        "{err}"
    );
}

#[test]
fn booleanif_resolves_both_branches() {
    let db = resolve(
        "(boolean b false) (type t) \
         (booleanif (and b (not b)) (true (allow t self (file (read)))) (false (allow t self (file (write)))))",
    );
    for node in db.arena().find_nodes(|s| s.flavor() == Flavor::Allow) {
        let Some(Statement::AvRule(rule)) = db.arena().statement(node) else {
            continue;
        };
        assert!(rule.source.is_resolved() && rule.target.is_resolved());
    }
}

#[test]
fn unknown_boolean_is_not_found() {
    let err = resolve_error("(type t) (booleanif nope (true (allow t self (file (read)))))");
    assert!(matches!(err, ResolveError::NotFound { .. }), "{err}");
}
